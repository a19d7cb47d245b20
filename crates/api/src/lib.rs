//! # Segmentify App
//!
//! HTTP adapter over the segmentation core: routing, input validation,
//! error rendering, CSV export and process lifecycle.

pub mod handlers;
pub mod logging;
pub mod response;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
