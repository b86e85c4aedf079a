//! Plain-text tables for command line output.

use std::fmt::Write;

use serde_json::Value;

use crate::models::{Document, EpisodeRecord, EpisodesAnalytics};
use crate::reconcile::FailedEpisode;

/// Shorten a title to `max_len` characters, marking the cut with "..."
pub fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let kept: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

fn text<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}

/// ID / Title / Status table for a list of shows
pub fn shows_table(doc: &Document) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<10} {:<30} {:<10}", "ID", "Title", "Status");
    let _ = writeln!(out, "{}", "-".repeat(52));

    for show in doc.data.as_array().into_iter().flatten() {
        let attributes = show.get("attributes").unwrap_or(&Value::Null);
        let _ = writeln!(
            out,
            "{:<10} {:<30} {:<10}",
            text(show, "id"),
            truncate_title(text(attributes, "title"), 30),
            text(attributes, "status")
        );
    }
    out
}

/// ID / Title / Status table for episode records
pub fn episodes_table(records: &[EpisodeRecord]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<10} {:<30} {:<10}", "ID", "Title", "Status");
    let _ = writeln!(out, "{}", "-".repeat(52));

    for record in records {
        let _ = writeln!(
            out,
            "{:<10} {:<30} {:<10}",
            record.id,
            truncate_title(record.title().unwrap_or(""), 30),
            record.status().unwrap_or("")
        );
    }
    out
}

/// One block per analytics item, for single or list payloads
pub fn analytics_items(doc: &Document) -> String {
    let items: Vec<&Value> = match &doc.data {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        item => vec![item],
    };
    if items.is_empty() {
        return "No analytics data found\n".to_string();
    }

    let mut out = String::new();
    for item in items {
        let attributes = item.get("attributes").unwrap_or(&Value::Null);
        let field = |key: &str| display_value(attributes.get(key));

        let _ = writeln!(out, "Analytics ID: {}", display_value(item.get("id")));
        let _ = writeln!(out, "Downloads: {}", field("downloads"));
        if attributes.get("start_date").is_some() {
            let _ = writeln!(out, "Range: {} to {}", field("start_date"), field("end_date"));
        }
        if attributes.get("country").is_some() {
            let _ = writeln!(out, "Country: {}", field("country"));
        }
        if attributes.get("app").is_some() {
            let _ = writeln!(out, "App: {}", field("app"));
        }
        let _ = writeln!(out, "---");
    }
    out
}

/// Strings as-is, download series summed, anything else as JSON
fn display_value(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(days)) => days
            .iter()
            .filter_map(|d| d.get("downloads").and_then(Value::as_u64))
            .sum::<u64>()
            .to_string(),
        Some(other) => other.to_string(),
        None => "N/A".to_string(),
    }
}

/// Episode / Total Downloads table for the all-episodes analytics payload
pub fn episodes_analytics_table(analytics: &EpisodesAnalytics) -> String {
    let episodes = &analytics.attributes.episodes;
    if episodes.is_empty() {
        return "No episodes analytics data found\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "{:<50} {:<15}", "Episode", "Total Downloads");
    let _ = writeln!(out, "{}", "-".repeat(65));
    for episode in episodes {
        let title = truncate_title(episode.title.as_deref().unwrap_or("Unknown"), 50);
        let _ = writeln!(out, "{:<50} {:<15}", title, episode.total_downloads());
    }
    out
}

/// One line per episode that could not be fetched
pub fn failed_episodes(failed: &[FailedEpisode]) -> String {
    let mut out = String::new();
    for episode in failed {
        let _ = writeln!(out, "{} - {} ({})", episode.id, episode.message, episode.kind);
    }
    out
}
