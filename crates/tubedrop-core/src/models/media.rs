//! Media domain models: the requested source, its available encodings and
//! the assembly/publish results derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The requested remote video once its metadata is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSource {
    pub url: String,
    /// Stable identifier derived from the URL (the platform video id).
    pub video_id: String,
    pub title: String,
    /// Filename-safe rendition of `title`.
    pub safe_title: String,
}

/// Descriptive metadata returned to the caller alongside the download link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDetails {
    pub title: String,
    pub description: String,
    pub thumbnail_url: Option<String>,
    pub length_seconds: u64,
    pub views: u64,
    pub author: String,
    /// `YYYY-MM-DD`, when the platform reports it.
    pub publish_date: Option<String>,
    pub keywords: Vec<String>,
}

/// Opaque reference to a remote byte stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamHandle {
    pub format_id: String,
    pub url: String,
    /// Headers the remote host expects on the stream request.
    #[serde(default)]
    pub headers: Vec<(String, String)>,
}

/// Which tracks an encoding carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    Combined,
    VideoOnly,
    AudioOnly,
    Other,
}

impl CandidateKind {
    pub fn from_tracks(has_video: bool, has_audio: bool) -> Self {
        match (has_video, has_audio) {
            (true, true) => CandidateKind::Combined,
            (true, false) => CandidateKind::VideoOnly,
            (false, true) => CandidateKind::AudioOnly,
            (false, false) => CandidateKind::Other,
        }
    }

    /// Tie-break rank among candidates of equal resolution; lower wins.
    pub fn rank(self) -> u8 {
        match self {
            CandidateKind::Combined => 0,
            CandidateKind::VideoOnly => 1,
            CandidateKind::AudioOnly => 2,
            CandidateKind::Other => 3,
        }
    }
}

/// One available format of a source. Immutable once listed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingCandidate {
    /// Vertical resolution in pixels, for video-bearing encodings.
    pub height: Option<u32>,
    /// Audio bitrate in kbps, for audio-bearing encodings.
    pub audio_bitrate_kbps: Option<u32>,
    /// Overall bitrate in kbps, when known.
    pub total_bitrate_kbps: Option<u32>,
    pub has_video: bool,
    pub has_audio: bool,
    /// Container extension (`mp4`, `webm`, `m4a`, ...).
    pub container: String,
    pub handle: StreamHandle,
}

impl EncodingCandidate {
    pub fn kind(&self) -> CandidateKind {
        CandidateKind::from_tracks(self.has_video, self.has_audio)
    }

    pub fn resolution(&self) -> u32 {
        if self.has_video {
            self.height.unwrap_or(0)
        } else {
            0
        }
    }

    /// Human-readable quality label (`720p`, `128kbps`), if the encoding has one.
    pub fn quality_label(&self) -> Option<String> {
        match self.kind() {
            CandidateKind::Combined | CandidateKind::VideoOnly => {
                self.height.map(|h| format!("{}p", h))
            }
            CandidateKind::AudioOnly => self.audio_bitrate_kbps.map(|abr| format!("{}kbps", abr)),
            CandidateKind::Other => None,
        }
    }
}

/// The chosen assembly strategy. Exactly one variant per request.
#[derive(Debug, Clone, PartialEq)]
pub enum AssemblyPlan {
    Combined(EncodingCandidate),
    SeparateMerge {
        video: EncodingCandidate,
        audio: EncodingCandidate,
    },
}

impl AssemblyPlan {
    /// Short name used in logs and in the response envelope.
    pub fn strategy(&self) -> &'static str {
        match self {
            AssemblyPlan::Combined(_) => "combined",
            AssemblyPlan::SeparateMerge { .. } => "merged",
        }
    }
}

/// The durable artifact. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedObject {
    pub storage_key: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub download_url: String,
    pub expires_at: DateTime<Utc>,
}
