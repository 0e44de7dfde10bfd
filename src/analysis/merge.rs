//! Combine a post, its comments and both analyses into an [`AnalyzedPost`].

use super::{KeywordExtractor, SentimentAnalyzer};
use crate::models::{AnalyzedPost, PostRecord, SentimentResult};
use futures::future::join;
use tracing::{instrument, warn};

/// Runs sentiment and keyword analysis side by side for each post.
///
/// A failure in either branch degrades the post to neutral sentiment and no
/// keywords rather than dropping it.
#[derive(Debug)]
pub struct ResultMerger<S, K> {
    sentiment: S,
    keywords: K,
    top_n: usize,
}

impl<S, K> ResultMerger<S, K>
where
    S: SentimentAnalyzer,
    K: KeywordExtractor,
{
    pub fn new(sentiment: S, keywords: K, top_n: usize) -> Self {
        Self {
            sentiment,
            keywords,
            top_n,
        }
    }

    /// # Arguments
    ///
    /// * `post` - The parsed post
    /// * `comments` - Comment texts gathered for it, possibly empty
    ///
    /// # Returns
    ///
    /// The post with sentiment, keywords and comments attached.
    #[instrument(level = "info", skip_all, fields(title = %post.title, comments = comments.len()))]
    pub async fn merge<E>(&self, post: &PostRecord<E>, comments: Vec<String>) -> AnalyzedPost {
        let (sentiment, keywords) = if comments.is_empty() {
            (SentimentResult::neutral(), Vec::new())
        } else {
            let joined = comments.join("\n");
            let (sentiment, keywords) = join(
                self.sentiment.analyze_comments(&comments),
                self.keywords.extract_keywords(&joined, self.top_n),
            )
            .await;

            match (sentiment, keywords) {
                (Ok(s), Ok(k)) => (s, k),
                (Err(e), _) | (_, Err(e)) => {
                    warn!(error = %e, "Comment analysis failed; reporting neutral");
                    (SentimentResult::neutral(), Vec::new())
                }
            }
        };

        AnalyzedPost {
            title: post.title.clone(),
            date: post.date,
            time: post.time,
            section: post.section.clone(),
            comment_count: post.comment_count,
            sentiment_label: sentiment.label,
            sentiment_score: sentiment.score,
            sentiment_distribution: sentiment.distribution,
            keywords,
            key_comments: sentiment.key_comments,
            comments,
            stock_codes: post.stock_codes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::keywords::FrequencyKeywords;
    use crate::analysis::lexicon::LexiconAnalyzer;
    use crate::analysis::AnalysisError;
    use crate::models::{SentimentLabel, Validity};
    use chrono::{NaiveDate, NaiveTime};

    struct BrokenSentiment;

    impl SentimentAnalyzer for BrokenSentiment {
        async fn analyze_comments(&self, _: &[String]) -> Result<SentimentResult, AnalysisError> {
            Err(AnalysisError::Backend("connection refused".to_string()))
        }
    }

    struct BrokenKeywords;

    impl KeywordExtractor for BrokenKeywords {
        async fn extract_keywords(&self, _: &str, _: usize) -> Result<Vec<String>, AnalysisError> {
            Err(AnalysisError::Response("empty".to_string()))
        }
    }

    fn post() -> PostRecord<()> {
        PostRecord {
            title: "两市成交额突破万亿".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 4, 11),
            time: NaiveTime::from_hms_opt(9, 45, 0),
            comment_count: 3,
            section: "看盘".to_string(),
            validity: Validity::Valid,
            stock_codes: vec!["600519".to_string()],
            source: None,
            origin: None,
        }
    }

    fn comments() -> Vec<String> {
        vec!["大盘看好，继续拉升".to_string(), "大盘突破了".to_string()]
    }

    #[tokio::test]
    async fn test_merge_attaches_both_analyses() {
        let merger = ResultMerger::new(LexiconAnalyzer, FrequencyKeywords, 5);
        let analyzed = merger.merge(&post(), comments()).await;
        assert_eq!(analyzed.title, "两市成交额突破万亿");
        assert_eq!(analyzed.section, "看盘");
        assert_eq!(analyzed.comment_count, 3);
        assert_eq!(analyzed.sentiment_label, SentimentLabel::VeryPositive);
        assert_eq!(analyzed.keywords.first().map(String::as_str), Some("大盘"));
        assert_eq!(analyzed.comments.len(), 2);
        assert_eq!(analyzed.stock_codes, vec!["600519"]);
    }

    #[tokio::test]
    async fn test_no_comments_is_neutral_without_calling_backends() {
        let merger = ResultMerger::new(BrokenSentiment, BrokenKeywords, 5);
        let analyzed = merger.merge(&post(), Vec::new()).await;
        assert_eq!(analyzed.sentiment_label, SentimentLabel::Neutral);
        assert_eq!(analyzed.sentiment_score, None);
        assert!(analyzed.keywords.is_empty());
    }

    #[tokio::test]
    async fn test_sentiment_failure_degrades_to_neutral() {
        let merger = ResultMerger::new(BrokenSentiment, FrequencyKeywords, 5);
        let analyzed = merger.merge(&post(), comments()).await;
        assert_eq!(analyzed.sentiment_label, SentimentLabel::Neutral);
        assert!(analyzed.sentiment_distribution.is_none());
        assert!(analyzed.keywords.is_empty());
        assert_eq!(analyzed.comments.len(), 2);
    }

    #[tokio::test]
    async fn test_keyword_failure_degrades_to_neutral() {
        let merger = ResultMerger::new(LexiconAnalyzer, BrokenKeywords, 5);
        let analyzed = merger.merge(&post(), comments()).await;
        assert_eq!(analyzed.sentiment_label, SentimentLabel::Neutral);
        assert!(analyzed.keywords.is_empty());
    }
}
