//! # Segmentify Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits) over the segmentation storage engine
//! - Rollout arithmetic
//! - The `SegmentationService` facade used by the HTTP adapter
//!
//! ## Architecture Principles
//! - Only depends on `segmentify-domain`
//! - No database or HTTP code
//! - All external dependencies via traits

pub mod segmentation;

// Re-export specific items to avoid ambiguity
pub use segmentation::ports::{MembershipReaper, MembershipStore, SegmentCatalog, UserDirectory};
pub use segmentation::rollout::rollout_size;
pub use segmentation::SegmentationService;
