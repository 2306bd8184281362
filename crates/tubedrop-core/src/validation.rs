//! Source URL validation and title sanitization.
//!
//! A request is only handed to the resolver once its URL matches one of the
//! known YouTube URL shapes; nothing external is contacted for invalid input.

use crate::error::AppError;
use regex::Regex;
use std::sync::LazyLock;

const MAX_SAFE_TITLE_LENGTH: usize = 100;

static WATCH_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:https?://)?(?:www\.|m\.|music\.)?youtube\.com/watch/?\?(?:[^#]*&)?v=([A-Za-z0-9_-]{1,64})(?:[&#].*)?$",
    )
    .expect("watch URL pattern is valid")
});

static PATH_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:https?://)?(?:www\.|m\.|music\.)?youtube\.com/(?:shorts|embed|live)/([A-Za-z0-9_-]{1,64})/?(?:[?#].*)?$",
    )
    .expect("path URL pattern is valid")
});

static SHORT_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?youtu\.be/([A-Za-z0-9_-]{1,64})/?(?:[?#].*)?$")
        .expect("short URL pattern is valid")
});

/// A syntactically valid source URL and the video id it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUrl {
    url: String,
    video_id: String,
}

impl SourceUrl {
    /// Validate `raw` against the accepted host patterns.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let url = raw.trim();
        if url.is_empty() {
            return Err(AppError::InvalidInput(
                "youtube_url must not be empty".to_string(),
            ));
        }

        let video_id = [&*WATCH_URL, &*PATH_URL, &*SHORT_URL]
            .iter()
            .find_map(|pattern| pattern.captures(url))
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| {
                AppError::InvalidInput(format!("Invalid YouTube URL: {}", url))
            })?;

        Ok(Self {
            url: url.to_string(),
            video_id,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }
}

/// Turn a human-readable title into a string safe for file names and storage keys.
///
/// Keeps ASCII alphanumerics and `-`; runs of anything else collapse to one
/// `_`. Falls back to `video` when nothing usable remains.
pub fn sanitize_title(title: &str) -> String {
    let mut sanitized = String::with_capacity(title.len().min(MAX_SAFE_TITLE_LENGTH));
    let mut last_was_separator = true;

    for c in title.chars() {
        if sanitized.len() >= MAX_SAFE_TITLE_LENGTH {
            break;
        }
        if c.is_ascii_alphanumeric() || c == '-' {
            sanitized.push(c);
            last_was_separator = false;
        } else if !last_was_separator {
            sanitized.push('_');
            last_was_separator = true;
        }
    }

    let trimmed = sanitized.trim_matches('_');
    if trimmed.is_empty() {
        "video".to_string()
    } else {
        trimmed.to_string()
    }
}
