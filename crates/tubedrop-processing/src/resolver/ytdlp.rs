use super::{ResolvedSource, SourceResolver};
use crate::error::ResolveError;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::process::Stdio;
use tokio::process::Command;
use tubedrop_core::{
    sanitize_title, EncodingCandidate, MediaSource, SourceUrl, StreamHandle, VideoDetails,
};

/// Stderr fragments that point at connectivity rather than the video itself.
const NETWORK_MARKERS: &[&str] = &[
    "timed out",
    "Temporary failure in name resolution",
    "Connection reset",
    "Connection refused",
    "Unable to download webpage",
    "HTTP Error 5",
    "HTTP Error 429",
];

#[derive(Debug, Deserialize)]
struct InfoJson {
    id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    thumbnail: Option<String>,
    duration: Option<f64>,
    view_count: Option<u64>,
    uploader: Option<String>,
    channel: Option<String>,
    upload_date: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    formats: Vec<FormatJson>,
}

#[derive(Debug, Deserialize)]
struct FormatJson {
    format_id: String,
    url: Option<String>,
    ext: Option<String>,
    vcodec: Option<String>,
    acodec: Option<String>,
    height: Option<u32>,
    abr: Option<f64>,
    tbr: Option<f64>,
    protocol: Option<String>,
    #[serde(default)]
    http_headers: HashMap<String, String>,
}

fn has_track(codec: Option<&str>) -> bool {
    matches!(codec, Some(c) if !c.is_empty() && c != "none")
}

fn kbps(value: Option<f64>) -> Option<u32> {
    value
        .filter(|v| v.is_finite() && *v > 0.0)
        .map(|v| v.round() as u32)
}

impl FormatJson {
    fn into_candidate(self) -> Option<EncodingCandidate> {
        let url = self.url?;
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return None;
        }
        if let Some(protocol) = self.protocol.as_deref() {
            if protocol != "https" && protocol != "http" {
                return None;
            }
        }

        let has_video = has_track(self.vcodec.as_deref());
        let has_audio = has_track(self.acodec.as_deref());
        if !has_video && !has_audio {
            return None;
        }

        let mut headers: Vec<(String, String)> = self.http_headers.into_iter().collect();
        headers.sort();

        Some(EncodingCandidate {
            height: if has_video { self.height } else { None },
            audio_bitrate_kbps: if has_audio { kbps(self.abr) } else { None },
            total_bitrate_kbps: kbps(self.tbr),
            has_video,
            has_audio,
            container: self.ext.unwrap_or_default(),
            handle: StreamHandle {
                format_id: self.format_id,
                url,
                headers,
            },
        })
    }
}

/// `20091025` -> `2009-10-25`.
fn format_upload_date(raw: &str) -> Option<String> {
    if raw.len() == 8 && raw.bytes().all(|b| b.is_ascii_digit()) {
        Some(format!("{}-{}-{}", &raw[0..4], &raw[4..6], &raw[6..8]))
    } else {
        None
    }
}

/// Build a [`ResolvedSource`] from a `yt-dlp -J` document.
pub(crate) fn parse_info(json: &[u8], url: &SourceUrl) -> Result<ResolvedSource, ResolveError> {
    let info: InfoJson =
        serde_json::from_slice(json).map_err(|e| ResolveError::Parse(e.to_string()))?;

    let title = info.title.unwrap_or_default();
    let source = MediaSource {
        url: url.as_str().to_string(),
        video_id: info.id.unwrap_or_else(|| url.video_id().to_string()),
        safe_title: sanitize_title(&title),
        title: title.clone(),
    };

    let details = VideoDetails {
        title,
        description: info.description.unwrap_or_default(),
        thumbnail_url: info.thumbnail,
        length_seconds: info
            .duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| d.round() as u64)
            .unwrap_or(0),
        views: info.view_count.unwrap_or(0),
        author: info.uploader.or(info.channel).unwrap_or_default(),
        publish_date: info.upload_date.as_deref().and_then(format_upload_date),
        keywords: info.tags.unwrap_or_default(),
    };

    let candidates = info
        .formats
        .into_iter()
        .filter_map(FormatJson::into_candidate)
        .collect();

    Ok(ResolvedSource {
        source,
        details,
        candidates,
    })
}

/// Classify a failed extractor run by its last stderr line.
fn classify_failure(stderr: &str) -> ResolveError {
    let line = stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("extractor exited without diagnostics")
        .trim_start_matches("ERROR: ")
        .to_string();

    if NETWORK_MARKERS.iter().any(|m| line.contains(m)) {
        ResolveError::Network(line)
    } else {
        ResolveError::Unavailable(line)
    }
}

/// Resolves sources by running `yt-dlp -J`.
pub struct YtDlpResolver {
    ytdlp_path: String,
}

impl YtDlpResolver {
    pub fn new(ytdlp_path: String) -> Self {
        Self { ytdlp_path }
    }
}

#[async_trait]
impl SourceResolver for YtDlpResolver {
    #[tracing::instrument(skip(self, url), fields(video_id = %url.video_id()))]
    async fn resolve(&self, url: &SourceUrl) -> Result<ResolvedSource, ResolveError> {
        let start = std::time::Instant::now();

        let output = Command::new(&self.ytdlp_path)
            .args([
                "-J",
                "--no-playlist",
                "--no-warnings",
                "--skip-download",
                url.as_str(),
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ResolveError::Spawn(format!("{}: {}", self.ytdlp_path, e)))?;

        if !output.status.success() {
            let err = classify_failure(&String::from_utf8_lossy(&output.stderr));
            tracing::warn!(
                error = %err,
                status = %output.status,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "yt-dlp failed"
            );
            return Err(err);
        }

        let resolved = parse_info(&output.stdout, url)?;

        tracing::info!(
            candidates = resolved.candidates.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Source resolved"
        );

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tubedrop_core::CandidateKind;

    const INFO: &str = r#"{
        "id": "dQw4w9WgXcQ",
        "title": "Never Gonna Give You Up (Official Video)",
        "description": "The official video",
        "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg",
        "duration": 212.4,
        "view_count": 1500000000,
        "uploader": "Rick Astley",
        "channel": "RickAstleyVEVO",
        "upload_date": "20091025",
        "tags": ["rick astley", "never gonna give you up"],
        "formats": [
            {"format_id": "sb0", "url": "https://i.ytimg.com/sb/x.jpg", "ext": "mhtml",
             "vcodec": "none", "acodec": "none", "protocol": "mhtml"},
            {"format_id": "140", "url": "https://rr1.googlevideo.com/140", "ext": "m4a",
             "vcodec": "none", "acodec": "mp4a.40.2", "abr": 129.478, "tbr": 129.478,
             "protocol": "https", "http_headers": {"User-Agent": "Mozilla/5.0"}},
            {"format_id": "18", "url": "https://rr1.googlevideo.com/18", "ext": "mp4",
             "vcodec": "avc1.42001E", "acodec": "mp4a.40.2", "height": 360, "abr": 96.0,
             "protocol": "https"},
            {"format_id": "137", "url": "https://rr1.googlevideo.com/137", "ext": "mp4",
             "vcodec": "avc1.640028", "acodec": "none", "height": 1080, "tbr": 4400.1,
             "protocol": "https"},
            {"format_id": "hls-1080", "url": "https://manifest.googlevideo.com/x.m3u8",
             "ext": "mp4", "vcodec": "avc1", "acodec": "mp4a", "height": 1080,
             "protocol": "m3u8_native"}
        ]
    }"#;

    fn url() -> SourceUrl {
        SourceUrl::parse("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap()
    }

    #[test]
    fn parses_metadata() {
        let resolved = parse_info(INFO.as_bytes(), &url()).unwrap();
        assert_eq!(resolved.source.video_id, "dQw4w9WgXcQ");
        assert_eq!(
            resolved.source.safe_title,
            "Never_Gonna_Give_You_Up_Official_Video"
        );
        assert_eq!(resolved.details.length_seconds, 212);
        assert_eq!(resolved.details.views, 1_500_000_000);
        assert_eq!(resolved.details.author, "Rick Astley");
        assert_eq!(resolved.details.publish_date.as_deref(), Some("2009-10-25"));
        assert_eq!(resolved.details.keywords.len(), 2);
    }

    #[test]
    fn keeps_only_direct_http_candidates() {
        let resolved = parse_info(INFO.as_bytes(), &url()).unwrap();
        let ids: Vec<&str> = resolved
            .candidates
            .iter()
            .map(|c| c.handle.format_id.as_str())
            .collect();
        assert_eq!(ids, vec!["140", "18", "137"]);

        let audio = &resolved.candidates[0];
        assert_eq!(audio.kind(), CandidateKind::AudioOnly);
        assert_eq!(audio.audio_bitrate_kbps, Some(129));
        assert_eq!(
            audio.handle.headers,
            vec![("User-Agent".to_string(), "Mozilla/5.0".to_string())]
        );
        assert_eq!(resolved.candidates[1].kind(), CandidateKind::Combined);
        assert_eq!(resolved.candidates[2].kind(), CandidateKind::VideoOnly);
    }

    #[test]
    fn tolerates_sparse_documents() {
        let resolved = parse_info(br#"{"formats": []}"#, &url()).unwrap();
        assert_eq!(resolved.source.video_id, "dQw4w9WgXcQ");
        assert_eq!(resolved.source.safe_title, "video");
        assert_eq!(resolved.details, VideoDetails::default());
        assert!(resolved.candidates.is_empty());
    }

    #[test]
    fn rejects_non_json_output() {
        assert!(matches!(
            parse_info(b"not json", &url()),
            Err(ResolveError::Parse(_))
        ));
    }

    #[test]
    fn classifies_stderr() {
        let err = classify_failure("WARNING: x\nERROR: [youtube] abc: Private video\n");
        assert!(matches!(err, ResolveError::Unavailable(ref m) if m == "[youtube] abc: Private video"));

        let err = classify_failure("ERROR: Unable to download webpage: timed out\n");
        assert!(matches!(err, ResolveError::Network(_)));
    }

    #[test]
    fn upload_date_formatting() {
        assert_eq!(format_upload_date("20240131").as_deref(), Some("2024-01-31"));
        assert_eq!(format_upload_date("2024-01-31"), None);
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let resolver = YtDlpResolver::new("/nonexistent/yt-dlp".to_string());
        let err = resolver.resolve(&url()).await.unwrap_err();
        assert!(matches!(err, ResolveError::Spawn(_)));
    }
}
