//! Shared request-handler state

use std::sync::Arc;

use segmentify_core::SegmentationService;

/// State handed to every handler; cheap to clone
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SegmentationService>,
}

impl AppState {
    pub fn new(service: Arc<SegmentationService>) -> Self {
        Self { service }
    }
}
