//! Word-list sentiment scoring.
//!
//! Counts market-slang positive and negative terms across all comments. The
//! share of positive hits picks a point on the five-step scale, and each
//! comment is separately classed to build the distribution.

use super::{AnalysisError, SentimentAnalyzer};
use crate::models::{Distribution, SentimentLabel, SentimentResult};
use tracing::debug;

pub const POSITIVE_WORDS: [&str; 19] = [
    "好", "涨", "利好", "上涨", "看多", "看好", "利多", "牛", "赚", "盈利", "增长", "利润", "吸筹",
    "拉升", "暴涨", "突破", "牛市", "牛股", "强势",
];

pub const NEGATIVE_WORDS: [&str; 17] = [
    "差", "跌", "利空", "下跌", "看空", "看淡", "熊", "亏", "亏损", "下降", "被套", "套牢", "暴跌",
    "破位", "熊市", "熊股", "弱势",
];

fn hits(text: &str, words: &[&str]) -> usize {
    words.iter().map(|w| text.matches(w).count()).sum()
}

/// Map a positive share onto the 1-5 scale.
pub fn score_for_ratio(positive_ratio: f64) -> u8 {
    match positive_ratio {
        r if r >= 0.8 => 5,
        r if r >= 0.6 => 4,
        r if r >= 0.4 => 3,
        r if r >= 0.2 => 2,
        _ => 1,
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    (part as f64 * 100.0 / whole as f64).round()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconAnalyzer;

impl LexiconAnalyzer {
    pub fn score(&self, comments: &[String]) -> SentimentResult {
        if comments.is_empty() {
            return SentimentResult::neutral();
        }

        let (mut pos, mut neg) = (0usize, 0usize);
        let (mut pos_comments, mut neg_comments) = (0usize, 0usize);
        for comment in comments {
            let p = hits(comment, &POSITIVE_WORDS);
            let n = hits(comment, &NEGATIVE_WORDS);
            pos += p;
            neg += n;
            if p > n {
                pos_comments += 1;
            } else if n > p {
                neg_comments += 1;
            }
        }

        let score = if pos + neg == 0 {
            3
        } else {
            score_for_ratio(pos as f64 / (pos + neg) as f64)
        };
        let total = comments.len();
        let distribution = Distribution {
            positive: percent(pos_comments, total),
            negative: percent(neg_comments, total),
            neutral: percent(total - pos_comments - neg_comments, total),
        };
        debug!(pos, neg, score, "Lexicon sentiment scored");

        SentimentResult {
            label: SentimentLabel::from_score(score),
            score: Some(score),
            distribution: Some(distribution),
            key_comments: Vec::new(),
        }
    }
}

impl SentimentAnalyzer for LexiconAnalyzer {
    async fn analyze_comments(&self, comments: &[String]) -> Result<SentimentResult, AnalysisError> {
        Ok(self.score(comments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_ratio_thresholds() {
        assert_eq!(score_for_ratio(1.0), 5);
        assert_eq!(score_for_ratio(0.8), 5);
        assert_eq!(score_for_ratio(0.6), 4);
        assert_eq!(score_for_ratio(0.5), 3);
        assert_eq!(score_for_ratio(0.2), 2);
        assert_eq!(score_for_ratio(0.1), 1);
    }

    #[test]
    fn test_bullish_comments() {
        let result = LexiconAnalyzer.score(&texts(&["看好，明天继续拉升", "突破前高了", "今天吃饭了吗"]));
        assert_eq!(result.score, Some(5));
        assert_eq!(result.label, SentimentLabel::VeryPositive);
        let d = result.distribution.unwrap();
        assert_eq!(d.positive, 67.0);
        assert_eq!(d.neutral, 33.0);
        assert_eq!(d.negative, 0.0);
    }

    #[test]
    fn test_bearish_comments() {
        let result = LexiconAnalyzer.score(&texts(&["又被套了", "破位下跌，看空"]));
        assert_eq!(result.score, Some(1));
        assert_eq!(result.label, SentimentLabel::VeryNegative);
    }

    #[test]
    fn test_no_lexicon_hits_is_neutral_with_score() {
        let result = LexiconAnalyzer.score(&texts(&["什么时候开会", "楼上说得对"]));
        assert_eq!(result.score, Some(3));
        assert_eq!(result.label, SentimentLabel::Neutral);
        assert_eq!(result.distribution.unwrap().neutral, 100.0);
    }

    #[test]
    fn test_empty_is_neutral_without_score() {
        let result = LexiconAnalyzer.score(&[]);
        assert_eq!(result, SentimentResult::neutral());
    }
}
