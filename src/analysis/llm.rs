//! Sentiment scoring through an OpenAI-compatible LLM.
//!
//! The comments are sent as a numbered list through the chat template named on
//! the command line. The template is expected to make the model answer with a
//! JSON object like:
//!
//! ```json
//! {"sentiment": "积极", "distribution": "积极 60% | 中性 30% | 消极 10%", "key_comments": ["..."]}
//! ```
//!
//! `key_comments` may also be a single comma-separated string.
//!
//! Models often wrap that object in prose or code fences, so the first `{...}`
//! block is used when the whole reply does not parse.

use super::{AnalysisError, SentimentAnalyzer};
use crate::api::ask_with_backoff;
use crate::models::{Distribution, SentimentLabel, SentimentResult};
use crate::utils::truncate_for_log;
use awful_aj::{config::AwfulJadeConfig, template::ChatTemplate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

/// Comments beyond this many are not sent.
pub const MAX_PROMPT_COMMENTS: usize = 50;

static JSON_BLOCK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

static DISTRIBUTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"积极\s*(\d+(?:\.\d+)?)\s*%.*?中性\s*(\d+(?:\.\d+)?)\s*%.*?消极\s*(\d+(?:\.\d+)?)\s*%")
        .unwrap()
});

/// Key comments arrive either as a list or as one comma-separated string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum KeyComments {
    List(Vec<String>),
    Joined(String),
}

impl KeyComments {
    fn into_vec(self) -> Vec<String> {
        let items = match self {
            KeyComments::List(items) => items,
            KeyComments::Joined(joined) => joined
                .split([',', '，', '、'])
                .map(str::to_string)
                .collect(),
        };
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct Verdict {
    sentiment: String,
    #[serde(default)]
    distribution: Option<String>,
    #[serde(default)]
    key_comments: Option<KeyComments>,
}

/// Number the comments the way the template refers to them.
pub fn build_prompt(comments: &[String]) -> String {
    comments
        .iter()
        .take(MAX_PROMPT_COMMENTS)
        .enumerate()
        .map(|(i, c)| format!("评论{}: {}", i + 1, c))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse `积极 X% | 中性 Y% | 消极 Z%`.
pub fn parse_distribution(text: &str) -> Option<Distribution> {
    let c = DISTRIBUTION_RE.captures(text)?;
    Some(Distribution {
        positive: c[1].parse().ok()?,
        neutral: c[2].parse().ok()?,
        negative: c[3].parse().ok()?,
    })
}

/// Turn a model reply into a [`SentimentResult`].
pub fn parse_reply(reply: &str) -> Result<SentimentResult, AnalysisError> {
    let verdict = match serde_json::from_str::<Verdict>(reply.trim()) {
        Ok(v) => v,
        Err(_) => {
            let block = JSON_BLOCK_RE
                .find(reply)
                .ok_or_else(|| AnalysisError::Response(truncate_for_log(reply, 200)))?;
            serde_json::from_str::<Verdict>(block.as_str())
                .map_err(|e| AnalysisError::Response(format!("{e}: {}", truncate_for_log(reply, 200))))?
        }
    };

    let label = SentimentLabel::from_text(&verdict.sentiment).ok_or_else(|| {
        AnalysisError::Response(format!("unknown sentiment label {:?}", verdict.sentiment))
    })?;

    Ok(SentimentResult {
        label,
        score: Some(label.score()),
        distribution: verdict.distribution.as_deref().and_then(parse_distribution),
        key_comments: verdict
            .key_comments
            .map(KeyComments::into_vec)
            .unwrap_or_default(),
    })
}

/// LLM-backed [`SentimentAnalyzer`].
#[derive(Debug)]
pub struct LlmAnalyzer<'a> {
    pub config: &'a AwfulJadeConfig,
    pub template: &'a ChatTemplate,
}

impl SentimentAnalyzer for LlmAnalyzer<'_> {
    #[instrument(level = "info", skip_all, fields(comments = comments.len()))]
    async fn analyze_comments(&self, comments: &[String]) -> Result<SentimentResult, AnalysisError> {
        if comments.is_empty() {
            return Ok(SentimentResult::neutral());
        }
        let prompt = build_prompt(comments);
        let reply = ask_with_backoff(self.config, &prompt, self.template)
            .await
            .map_err(|e| AnalysisError::Backend(e.to_string()))?;
        debug!(reply = %truncate_for_log(&reply, 300), "LLM sentiment reply");

        parse_reply(&reply).inspect_err(|e| warn!(error = %e, "Discarding LLM sentiment reply"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_numbering_and_cap() {
        let comments: Vec<String> = (0..60).map(|i| format!("第{i}条")).collect();
        let prompt = build_prompt(&comments);
        assert!(prompt.starts_with("评论1: 第0条\n评论2: 第1条"));
        assert_eq!(prompt.lines().count(), MAX_PROMPT_COMMENTS);
    }

    #[test]
    fn test_parse_plain_json_reply() {
        let result = parse_reply(
            r#"{"sentiment": "积极", "distribution": "积极 60% | 中性 30% | 消极 10%", "key_comments": ["看好"]}"#,
        )
        .unwrap();
        assert_eq!(result.label, SentimentLabel::Positive);
        assert_eq!(result.score, Some(4));
        assert_eq!(
            result.distribution,
            Some(Distribution {
                positive: 60.0,
                neutral: 30.0,
                negative: 10.0
            })
        );
        assert_eq!(result.key_comments, vec!["看好"]);
    }

    #[test]
    fn test_parse_wrapped_reply() {
        let reply = "分析如下：\n```json\n{\"sentiment\": \"极度消极\"}\n```";
        let result = parse_reply(reply).unwrap();
        assert_eq!(result.label, SentimentLabel::VeryNegative);
        assert!(result.distribution.is_none());
    }

    #[test]
    fn test_comma_separated_key_comments() {
        let result =
            parse_reply(r#"{"sentiment": "中性", "key_comments": "大盘, 反弹，缩量、 "}"#).unwrap();
        assert_eq!(result.key_comments, vec!["大盘", "反弹", "缩量"]);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_reply("no json here"), Err(AnalysisError::Response(_))));
        assert!(parse_reply(r#"{"sentiment": "乐观"}"#).is_err());
    }
}
