//! Input normalization shared by the services.

use chrono::{DateTime, Duration, Utc};
use domains::ValidationError;

/// Length, duration and nesting limits for user-supplied content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentLimits {
    pub max_title_len: usize,
    pub max_message_len: usize,
    pub max_gossip_len: usize,
    pub max_comment_len: usize,
    pub max_reason_len: usize,
    pub max_thread_duration: Duration,
    pub max_gossip_duration: Duration,
    /// Replies nest at most this many levels; root comments are level 1.
    pub max_reply_depth: usize,
}

impl Default for ContentLimits {
    fn default() -> Self {
        Self {
            max_title_len: 120,
            max_message_len: 2000,
            max_gossip_len: 1000,
            max_comment_len: 500,
            max_reason_len: 500,
            max_thread_duration: Duration::hours(168),
            max_gossip_duration: Duration::hours(720),
            max_reply_depth: 16,
        }
    }
}

/// Trims `raw` and checks it is non-empty and at most `max` characters.
pub fn required_text(raw: &str, field: &'static str, max: usize) -> Result<String, ValidationError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    bounded(text, field, max)
}

/// Trims `raw`; empty is allowed.
pub fn optional_text(raw: &str, field: &'static str, max: usize) -> Result<String, ValidationError> {
    bounded(raw.trim(), field, max)
}

fn bounded(text: &str, field: &'static str, max: usize) -> Result<String, ValidationError> {
    if text.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(text.to_string())
}

/// `now` plus `hours`, rejecting zero and anything past `max`.
pub fn expiry_after(now: DateTime<Utc>, hours: u32, max: Duration) -> Result<DateTime<Utc>, ValidationError> {
    if hours == 0 {
        return Err(ValidationError::InvalidExpiry("duration must be positive".into()));
    }
    let duration = Duration::hours(i64::from(hours));
    if duration > max {
        return Err(ValidationError::InvalidExpiry(format!(
            "may last at most {} hours",
            max.num_hours()
        )));
    }
    now.checked_add_signed(duration)
        .ok_or_else(|| ValidationError::InvalidExpiry("expiry is out of range".into()))
}

/// Trims tags, drops empty ones and removes case-insensitive duplicates,
/// keeping the first spelling and position.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = std::collections::HashSet::new();
    tags.into_iter()
        .map(|tag| tag.as_ref().trim().to_string())
        .filter(|tag| !tag.is_empty() && seen.insert(tag.to_lowercase()))
        .collect()
}

/// First `max_chars` characters of `text`, with an ellipsis when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}
