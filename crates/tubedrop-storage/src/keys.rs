//! Shared key generation for storage backends.

/// Storage key for a published video: `{prefix}/{safe_title}_{video_id}.mp4`.
///
/// `safe_title` must already be sanitized; `video_id` only contains URL-safe
/// id characters once the source URL has been validated.
pub fn video_object_key(prefix: &str, safe_title: &str, video_id: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{}_{}.mp4", safe_title, video_id)
    } else {
        format!("{}/{}_{}.mp4", prefix, safe_title, video_id)
    }
}

/// Reject keys that could escape a backend's root.
pub(crate) fn is_safe_key(storage_key: &str) -> bool {
    !storage_key.is_empty()
        && !storage_key.contains("..")
        && !storage_key.starts_with('/')
        && !storage_key.contains('\\')
        && !storage_key.contains('\0')
}
