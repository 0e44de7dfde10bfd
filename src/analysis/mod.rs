//! Comment analysis: sentiment scoring and keyword extraction.
//!
//! Both collaborators sit behind small traits so the merge step can run them
//! side by side without caring which backend is configured.
//!
//! # Submodules
//!
//! - [`lexicon`]: Local word-list sentiment scoring
//! - [`llm`]: Sentiment scoring through an OpenAI-compatible API
//! - [`keywords`]: Frequency-ranked Chinese keywords and financial terms
//! - [`merge`]: Combines a post, its comments and both analyses

pub mod keywords;
pub mod lexicon;
pub mod llm;
pub mod merge;

use crate::models::SentimentResult;
use clap::ValueEnum;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("analysis backend request failed: {0}")]
    Backend(String),

    #[error("analysis backend returned an unusable response: {0}")]
    Response(String),
}

/// Scores the overall mood of a post's comments.
pub trait SentimentAnalyzer {
    async fn analyze_comments(&self, comments: &[String]) -> Result<SentimentResult, AnalysisError>;
}

/// Picks the most telling terms out of a block of text.
pub trait KeywordExtractor {
    async fn extract_keywords(&self, text: &str, top_n: usize) -> Result<Vec<String>, AnalysisError>;
}

/// Which sentiment backend a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SentimentBackendKind {
    Lexicon,
    Llm,
}

/// The configured sentiment backend.
#[derive(Debug)]
pub enum SentimentBackend<'a> {
    Lexicon(lexicon::LexiconAnalyzer),
    Llm(llm::LlmAnalyzer<'a>),
}

impl SentimentAnalyzer for SentimentBackend<'_> {
    async fn analyze_comments(&self, comments: &[String]) -> Result<SentimentResult, AnalysisError> {
        match self {
            SentimentBackend::Lexicon(a) => a.analyze_comments(comments).await,
            SentimentBackend::Llm(a) => a.analyze_comments(comments).await,
        }
    }
}
