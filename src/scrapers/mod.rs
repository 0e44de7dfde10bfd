//! Telegraph feed crawling, from navigation to analyzed posts.
//!
//! One section is crawled at a time through a single browser page:
//!
//! 1. **Navigation**: [`navigator`] reaches the feed and selects the section tab
//! 2. **Extraction**: [`extractor`] turns the displayed page into post records,
//!    using the text parsers in [`parse`] and the time window in [`cutoff`]
//! 3. **Comments**: [`comments`] opens each post's comments and steps back
//! 4. **Pagination**: [`pagination`] repeats extraction after loading more
//!    content until the section is exhausted or the cutoff is crossed
//!
//! # Page Dialects
//!
//! The feed has been served with several different DOM layouts. Every lookup is
//! therefore an ordered list of selector variants, most specific first, with
//! an in-page script as the final fallback where one makes sense.
//!
//! | Concern | Module | Fallback |
//! |---------|--------|----------|
//! | Reaching a section | [`navigator`] | Anchor-click script |
//! | Finding posts | [`extractor`] | Heuristic full-page scan |
//! | Opening comments | [`comments`] | None (post keeps zero comments) |
//! | Loading more | [`pagination`] | Pagination-function probe |

pub mod comments;
pub mod cutoff;
pub mod extractor;
pub mod navigator;
pub mod pagination;
pub mod parse;
