pub mod media;

pub use media::{
    AssemblyPlan, CandidateKind, EncodingCandidate, MediaSource, PublishedObject, StreamHandle,
    VideoDetails,
};
