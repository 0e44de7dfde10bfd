//! Plain-text summary printed at the end of a run.

use crate::models::AnalyzedPost;

/// One post as a block of `label：value` lines.
pub fn post_to_text(post: &AnalyzedPost) -> String {
    let mut lines = vec![
        format!("标题：{}", post.title),
        format!("日期：{}", post.display_date()),
        format!("时间：{}", post.display_time()),
        format!("所属板块：{}", post.section),
        format!("评论数量：{}", post.comment_count),
        format!("评论情绪：{}", post.sentiment_label),
    ];
    if let Some(distribution) = &post.sentiment_distribution {
        lines.push(format!("情感分布：{distribution}"));
    }
    if !post.keywords.is_empty() {
        lines.push(format!("关键词：{}", post.keywords.join(", ")));
    }
    if !post.stock_codes.is_empty() {
        lines.push(format!("相关股票：{}", post.stock_codes.join(", ")));
    }
    lines.join("\n")
}

/// All posts separated by rule lines, or a notice when there are none.
pub fn posts_to_text(posts: &[AnalyzedPost]) -> String {
    if posts.is_empty() {
        return "没有找到符合条件的电报".to_string();
    }
    posts
        .iter()
        .map(post_to_text)
        .collect::<Vec<_>>()
        .join(&format!("\n{}\n", "-".repeat(40)))
}
