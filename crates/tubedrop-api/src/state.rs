//! Application state shared by all handlers.

use std::sync::Arc;
use tubedrop_processing::DownloadPipeline;
use tubedrop_storage::LocalStorage;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<DownloadPipeline>,
    /// Backs `/files`. Set only for the local backend.
    pub local_files: Option<Arc<LocalStorage>>,
}
