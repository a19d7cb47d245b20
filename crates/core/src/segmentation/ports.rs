//! Port interfaces for the segmentation storage engine
//!
//! These traits define the boundaries between core business logic
//! and the relational storage implementation. Every multi-step operation
//! behind these ports runs in a single store transaction; the first error
//! rolls the whole operation back.

use async_trait::async_trait;
use segmentify_domain::{AuditEntry, MembershipChange, Period, Result, Segment};

/// Segment catalog: create, lookup and delete segment rows
#[async_trait]
pub trait SegmentCatalog: Send + Sync {
    /// Insert a segment and, when `percent > 0`, enroll a random
    /// `floor(users * percent / 100)` slice of the existing population in
    /// the same transaction.
    ///
    /// A slug collision yields `SegmentifyError::SegmentExists`.
    async fn create_segment(&self, segment: Segment) -> Result<Segment>;

    /// Single-row lookup; absence yields `SegmentifyError::SegmentNotFound`
    async fn get_segment(&self, slug: &str) -> Result<Segment>;

    /// Delete by slug, cascading dependent memberships. Audit history is
    /// retained. Zero rows removed yields `SegmentifyError::SegmentNotFound`.
    async fn delete_segment(&self, slug: &str) -> Result<()>;
}

/// User population: creation and existence probing
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Insert a user with a server-assigned id and return it
    async fn create_user(&self) -> Result<i64>;

    /// Existence probe; absence yields `SegmentifyError::UserNotFound`
    async fn get_user(&self, id: i64) -> Result<i64>;
}

/// Membership reads and the combined add/remove batch write
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Apply a combined batch to one user's memberships: adds first, then
    /// removes, each list in client order, all inside one transaction with
    /// one audit row per transition.
    async fn update_user_segments(
        &self,
        user_id: i64,
        to_add: &[MembershipChange],
        to_remove: &[String],
    ) -> Result<()>;

    /// Slugs of the user's active memberships (`expire_at` null or in the
    /// future at query time). Order is unspecified.
    async fn get_user_segments(&self, user_id: i64) -> Result<Vec<String>>;

    /// Audit rows for the user whose `created_at` falls inside the given
    /// month, in the server's time zone.
    async fn get_user_segments_history(
        &self,
        user_id: i64,
        period: Period,
    ) -> Result<Vec<AuditEntry>>;
}

/// Bulk removal of expired memberships
///
/// Expiry is a system event: no audit rows are written.
#[async_trait]
pub trait MembershipReaper: Send + Sync {
    /// Delete memberships whose `expire_at` is non-null and past; returns
    /// the number of rows removed.
    async fn reap_expired_memberships(&self) -> Result<u64>;
}
