//! Constants shared across crates.

/// Content type of every published artifact.
pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// Combined encodings below this height are not accepted on their own.
pub const DEFAULT_MIN_COMBINED_HEIGHT: u32 = 360;

/// Default validity window of a download link (1 hour).
pub const DEFAULT_LINK_TTL_SECS: u64 = 3600;

/// Longest validity window object stores accept for presigned URLs (7 days).
pub const MAX_LINK_TTL_SECS: u64 = 7 * 24 * 3600;

/// Prefix of per-request scratch directories.
pub const SCRATCH_DIR_PREFIX: &str = "tubedrop-";
