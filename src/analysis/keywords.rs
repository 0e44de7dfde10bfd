//! Keyword extraction for comment threads.
//!
//! Without a segmenter, runs of two or more CJK characters serve as tokens.
//! Financial terms are matched as substrings, since they usually sit inside
//! longer runs. Tokens and terms are ranked together by frequency.

use super::{AnalysisError, KeywordExtractor};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static CJK_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\u{4e00}-\u{9fff}]{2,}").unwrap());

pub const STOPWORDS: [&str; 28] = [
    "的", "了", "在", "是", "我", "有", "和", "就", "不", "人", "都", "一", "一个", "上", "也", "很",
    "到", "说", "要", "去", "你", "会", "着", "没有", "看", "好", "自己", "这",
];

pub const FINANCIAL_TERMS: [&str; 50] = [
    "股票", "基金", "债券", "期货", "外汇", "投资", "融资", "分红", "股利", "交易", "市场", "指数",
    "涨停", "跌停", "牛市", "熊市", "波动", "趋势", "回调", "反弹", "大盘", "个股", "板块", "行业",
    "业绩", "财报", "营收", "利润", "亏损", "营业额", "解禁", "增发", "回购", "配股", "承销", "开盘",
    "收盘", "高开", "低开", "高走", "流通股", "限售股", "总股本", "市值", "市盈率", "市净率",
    "股息率", "换手率", "主力", "北向资金",
];

/// Frequency-ranked keywords. Ties keep first-seen order.
pub fn rank_keywords(text: &str, top_n: usize) -> Vec<String> {
    let tokens = CJK_RUN_RE
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|t| !STOPWORDS.contains(t));

    let terms = FINANCIAL_TERMS
        .iter()
        .copied()
        .filter_map(|term| text.find(term).map(|pos| (pos, term)))
        .sorted_by_key(|(pos, _)| *pos)
        .flat_map(|(_, term)| std::iter::repeat_n(term, text.matches(term).count()));

    let mut first_seen: HashMap<&str, usize> = HashMap::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for (i, token) in tokens.chain(terms).enumerate() {
        first_seen.entry(token).or_insert(i);
        *counts.entry(token).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .sorted_by_key(|(token, count)| (std::cmp::Reverse(*count), first_seen[token]))
        .take(top_n)
        .map(|(token, _)| token.to_string())
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FrequencyKeywords;

impl KeywordExtractor for FrequencyKeywords {
    async fn extract_keywords(&self, text: &str, top_n: usize) -> Result<Vec<String>, AnalysisError> {
        Ok(rank_keywords(text, top_n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_financial_terms_inside_runs_are_counted() {
        let text = "明天大盘继续反弹\n大盘要涨\n反弹无力";
        let keywords = rank_keywords(text, 3);
        assert_eq!(keywords, vec!["大盘", "反弹", "明天大盘继续反弹"]);
    }

    #[test]
    fn test_stopwords_and_short_runs_are_dropped() {
        let keywords = rank_keywords("自己 没有 好 A股 的", 5);
        assert!(keywords.is_empty());
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let keywords = rank_keywords("券商 银行 地产", 2);
        assert_eq!(keywords, vec!["券商", "银行"]);
    }

    #[test]
    fn test_top_n_zero() {
        assert!(rank_keywords("大盘 大盘", 0).is_empty());
    }
}
