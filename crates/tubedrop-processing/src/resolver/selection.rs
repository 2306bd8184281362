use crate::error::PipelineError;
use std::cmp::Ordering;
use std::collections::HashSet;
use tubedrop_core::{AssemblyPlan, CandidateKind, EncodingCandidate};

fn container_rank(candidate: &EncodingCandidate) -> u8 {
    match candidate.container.as_str() {
        "mp4" | "m4a" => 0,
        _ => 1,
    }
}

/// Total order over candidates; the best candidate sorts first.
fn compare(a: &EncodingCandidate, b: &EncodingCandidate) -> Ordering {
    b.resolution()
        .cmp(&a.resolution())
        .then_with(|| a.kind().rank().cmp(&b.kind().rank()))
        .then_with(|| {
            b.audio_bitrate_kbps
                .unwrap_or(0)
                .cmp(&a.audio_bitrate_kbps.unwrap_or(0))
        })
        .then_with(|| container_rank(a).cmp(&container_rank(b)))
        .then_with(|| {
            b.total_bitrate_kbps
                .unwrap_or(0)
                .cmp(&a.total_bitrate_kbps.unwrap_or(0))
        })
        .then_with(|| a.handle.format_id.cmp(&b.handle.format_id))
        .then_with(|| a.handle.url.cmp(&b.handle.url))
}

/// Candidates in quality order, independent of input order.
pub fn rank_candidates(candidates: &[EncodingCandidate]) -> Vec<&EncodingCandidate> {
    let mut ranked: Vec<&EncodingCandidate> = candidates.iter().collect();
    ranked.sort_by(|a, b| compare(a, b));
    ranked
}

fn best_of_kind<'a>(ranked: &[&'a EncodingCandidate], kind: CandidateKind) -> Option<&'a EncodingCandidate> {
    ranked.iter().copied().find(|c| c.kind() == kind)
}

/// Choose how to assemble the output file.
///
/// The best combined encoding wins when it reaches `min_combined_height`;
/// otherwise the best video-only and best audio-only encodings are merged.
pub fn select_plan(
    candidates: &[EncodingCandidate],
    min_combined_height: u32,
) -> Result<AssemblyPlan, PipelineError> {
    let ranked = rank_candidates(candidates);

    if let Some(combined) = best_of_kind(&ranked, CandidateKind::Combined) {
        if combined.resolution() >= min_combined_height {
            return Ok(AssemblyPlan::Combined(combined.clone()));
        }
    }

    let video = best_of_kind(&ranked, CandidateKind::VideoOnly);
    let audio = best_of_kind(&ranked, CandidateKind::AudioOnly);

    match (video, audio) {
        (Some(video), Some(audio)) => Ok(AssemblyPlan::SeparateMerge {
            video: video.clone(),
            audio: audio.clone(),
        }),
        (None, Some(_)) => Err(PipelineError::NoSuitableStream(format!(
            "no combined stream of at least {}p and no video-only stream",
            min_combined_height
        ))),
        (Some(_), None) => Err(PipelineError::NoSuitableStream(format!(
            "no combined stream of at least {}p and no audio-only stream",
            min_combined_height
        ))),
        (None, None) => Err(PipelineError::NoSuitableStream(format!(
            "no combined stream of at least {}p and no separate video/audio streams",
            min_combined_height
        ))),
    }
}

/// Human-readable quality labels in ranking order, first occurrence kept.
pub fn quality_labels(candidates: &[EncodingCandidate]) -> Vec<String> {
    let mut seen = HashSet::new();
    rank_candidates(candidates)
        .into_iter()
        .filter_map(|c| c.quality_label())
        .filter(|label| seen.insert(label.clone()))
        .collect()
}
