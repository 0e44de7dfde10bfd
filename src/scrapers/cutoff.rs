//! Time-window admission.
//!
//! A post is in the window iff its timestamp is at or after the cutoff and, when
//! an end is configured, at or before it. The feed is newest-first and pages are
//! appended, so seeing anything older than the cutoff means every later page is
//! older still. That observation is recorded in a [`CutoffFlag`], which can be
//! raised but never lowered.

use chrono::NaiveDateTime;

/// The requested time window. Read-only for the duration of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub cutoff: NaiveDateTime,
    pub until: Option<NaiveDateTime>,
}

/// Where a timestamp falls relative to a [`Window`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    InWindow,
    /// Newer than `until`. Skipped, but older posts may still follow.
    TooNew,
    /// Strictly before the cutoff.
    BeforeCutoff,
    /// No timestamp to compare.
    Unknown,
}

impl Window {
    pub fn new(cutoff: NaiveDateTime, until: Option<NaiveDateTime>) -> Self {
        Self { cutoff, until }
    }

    pub fn place(&self, at: Option<NaiveDateTime>) -> Placement {
        match at {
            None => Placement::Unknown,
            Some(t) if t < self.cutoff => Placement::BeforeCutoff,
            Some(t) if self.until.is_some_and(|end| t > end) => Placement::TooNew,
            Some(_) => Placement::InWindow,
        }
    }
}

/// Monotonic "the cutoff has been crossed" marker for one section run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CutoffFlag(bool);

impl CutoffFlag {
    pub fn raise(&mut self) {
        self.0 = true;
    }

    pub fn is_raised(&self) -> bool {
        self.0
    }
}
