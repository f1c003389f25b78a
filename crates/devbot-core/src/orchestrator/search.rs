use chrono::DateTime;

use super::wiki::WikiAccess;
use super::{user_failure, Artifact, Failure, Finished, Reporter, Step};
use crate::command::{Route, SearchRequest};
use crate::services::{SearchHit, Services};

pub(super) async fn run(
    services: &Services,
    route: Route,
    text: &str,
    reporter: &Reporter<'_>,
) -> Step<Finished> {
    let wiki = WikiAccess::resolve(services, route).map_err(user_failure)?;
    let request = SearchRequest::parse(text).map_err(user_failure)?;

    let scope_note = request
        .scope
        .as_deref()
        .map(|s| format!(" (スペース: {s})"))
        .unwrap_or_default();
    reporter
        .send(&format!(
            "🔍 Confluenceを検索しています: `{}`{scope_note}",
            request.query
        ))
        .await;

    let hits = wiki
        .search(&request.query, request.scope.as_deref())
        .await
        .map_err(|e| Failure(format!("❌ Confluenceの検索中にエラーが発生しました: {e}")))?;

    Ok(Finished {
        message: format_results(&request.query, &hits, services.settings.max_search_hits),
        artifact: Artifact::SearchResults { count: hits.len() },
    })
}

/// Render hits as a numbered list, at most `limit` entries.
pub(super) fn format_results(query: &str, hits: &[SearchHit], limit: usize) -> String {
    if hits.is_empty() {
        return format!("🔍 「{query}」に一致するページは見つかりませんでした。");
    }

    let mut out = format!("🔍 「{query}」の検索結果: {}件\n", hits.len());
    for (i, hit) in hits.iter().take(limit).enumerate() {
        out.push_str(&format!("\n{}. <{}|{}>", i + 1, hit.url, hit.title));
        let mut meta = Vec::new();
        if !hit.space.is_empty() {
            meta.push(hit.space.clone());
        }
        if let Some(date) = display_date(&hit.last_modified) {
            meta.push(format!("最終更新: {date}"));
        }
        if !meta.is_empty() {
            out.push_str(&format!(" ({})", meta.join(", ")));
        }
        let excerpt = collapse_whitespace(&hit.excerpt);
        if !excerpt.is_empty() {
            out.push_str(&format!("\n   {excerpt}"));
        }
    }
    if hits.len() > limit {
        out.push_str(&format!("\n\n…他 {}件", hits.len() - limit));
    }
    out
}

/// Dates come back as RFC 3339 timestamps; show only the day. Anything that
/// does not parse is shown as-is.
fn display_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    Some(
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|_| raw.to_string()),
    )
}

/// Excerpts are reported as the wiki returned them, on one line.
fn collapse_whitespace(excerpt: &str) -> String {
    excerpt
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
