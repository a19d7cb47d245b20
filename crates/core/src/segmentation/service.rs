//! Segmentation service - core business logic
//!
//! Thin facade over the storage ports. Input invariants that the storage
//! engine cannot express cheaply (rollout percentage range, empty slugs,
//! the legacy "zero timestamp means no expiry" convention) are enforced
//! here, before a transaction is ever opened.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use segmentify_domain::{
    AuditEntry, MembershipChange, Period, Result, Segment, SegmentifyError,
};
use tracing::debug;

use super::ports::{MembershipStore, SegmentCatalog, UserDirectory};

/// Segmentation service facade used by the HTTP adapter
pub struct SegmentationService {
    catalog: Arc<dyn SegmentCatalog>,
    users: Arc<dyn UserDirectory>,
    memberships: Arc<dyn MembershipStore>,
}

impl SegmentationService {
    /// Create a new segmentation service over the given storage ports
    pub fn new(
        catalog: Arc<dyn SegmentCatalog>,
        users: Arc<dyn UserDirectory>,
        memberships: Arc<dyn MembershipStore>,
    ) -> Self {
        Self { catalog, users, memberships }
    }

    /// Create a segment, rolling it out to a random slice of the population
    /// when `percent > 0`
    pub async fn create_segment(&self, segment: Segment) -> Result<Segment> {
        if segment.slug.is_empty() {
            return Err(SegmentifyError::InvalidRequest("slug must not be empty".into()));
        }
        if !(0..=100).contains(&segment.percent) {
            return Err(SegmentifyError::InvalidRequest(format!(
                "percent must be between 0 and 100, got {}",
                segment.percent
            )));
        }

        debug!(slug = %segment.slug, percent = segment.percent, "creating segment");
        self.catalog.create_segment(segment).await
    }

    /// Look up a segment by slug
    pub async fn get_segment(&self, slug: &str) -> Result<Segment> {
        self.catalog.get_segment(slug).await
    }

    /// Delete a segment; its memberships cascade away, audit rows remain
    pub async fn delete_segment(&self, slug: &str) -> Result<()> {
        self.catalog.delete_segment(slug).await
    }

    /// Create a user and return the server-assigned id
    pub async fn create_user(&self) -> Result<i64> {
        self.users.create_user().await
    }

    /// Apply a combined add/remove batch to one user's memberships
    pub async fn update_user_segments(
        &self,
        user_id: i64,
        to_add: Vec<MembershipChange>,
        to_remove: Vec<String>,
    ) -> Result<()> {
        let to_add: Vec<MembershipChange> = to_add
            .into_iter()
            .map(|change| MembershipChange {
                slug: change.slug,
                expire_at: normalize_expiry(change.expire_at),
            })
            .collect();

        debug!(
            user_id,
            adds = to_add.len(),
            removes = to_remove.len(),
            "updating user segments"
        );
        self.memberships.update_user_segments(user_id, &to_add, &to_remove).await
    }

    /// Slugs of the user's currently active memberships
    pub async fn get_user_segments(&self, user_id: i64) -> Result<Vec<String>> {
        self.memberships.get_user_segments(user_id).await
    }

    /// Audit rows for the user within the given month
    pub async fn get_user_segments_history(
        &self,
        user_id: i64,
        period: Period,
    ) -> Result<Vec<AuditEntry>> {
        self.memberships.get_user_segments_history(user_id, period).await
    }
}

/// Clients that serialize a default-initialized timestamp send the year-one
/// instant instead of omitting the field; both mean "never expires".
fn normalize_expiry(expire_at: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    expire_at.filter(|ts| ts.year() > 1)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::TimeZone;

    use super::*;

    #[derive(Default)]
    struct MockCatalog {
        created: Mutex<Vec<Segment>>,
    }

    #[async_trait]
    impl SegmentCatalog for MockCatalog {
        async fn create_segment(&self, segment: Segment) -> Result<Segment> {
            self.created.lock().unwrap().push(segment.clone());
            Ok(segment)
        }

        async fn get_segment(&self, slug: &str) -> Result<Segment> {
            Err(SegmentifyError::SegmentNotFound { slug: slug.into() })
        }

        async fn delete_segment(&self, _slug: &str) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockUsers;

    #[async_trait]
    impl UserDirectory for MockUsers {
        async fn create_user(&self) -> Result<i64> {
            Ok(1)
        }

        async fn get_user(&self, id: i64) -> Result<i64> {
            Ok(id)
        }
    }

    #[derive(Default)]
    struct MockMemberships {
        updates: Mutex<Vec<(i64, Vec<MembershipChange>, Vec<String>)>>,
        fail_with_user_not_found: bool,
    }

    #[async_trait]
    impl MembershipStore for MockMemberships {
        async fn update_user_segments(
            &self,
            user_id: i64,
            to_add: &[MembershipChange],
            to_remove: &[String],
        ) -> Result<()> {
            if self.fail_with_user_not_found {
                return Err(SegmentifyError::UserNotFound { id: user_id });
            }
            self.updates.lock().unwrap().push((
                user_id,
                to_add.to_vec(),
                to_remove.to_vec(),
            ));
            Ok(())
        }

        async fn get_user_segments(&self, _user_id: i64) -> Result<Vec<String>> {
            Ok(vec!["AVITO_50".into()])
        }

        async fn get_user_segments_history(
            &self,
            _user_id: i64,
            _period: Period,
        ) -> Result<Vec<AuditEntry>> {
            Ok(Vec::new())
        }
    }

    fn service_with(
        catalog: Arc<MockCatalog>,
        memberships: Arc<MockMemberships>,
    ) -> SegmentationService {
        SegmentationService::new(catalog, Arc::new(MockUsers), memberships)
    }

    #[tokio::test]
    async fn create_segment_rejects_out_of_range_percent() {
        let catalog = Arc::new(MockCatalog::default());
        let service = service_with(Arc::clone(&catalog), Arc::new(MockMemberships::default()));

        for percent in [-1, 101, 200] {
            let err = service
                .create_segment(Segment { slug: "X".into(), percent })
                .await
                .unwrap_err();
            assert!(matches!(err, SegmentifyError::InvalidRequest(_)));
        }

        assert!(catalog.created.lock().unwrap().is_empty(), "catalog must not be touched");
    }

    #[tokio::test]
    async fn create_segment_rejects_empty_slug() {
        let catalog = Arc::new(MockCatalog::default());
        let service = service_with(Arc::clone(&catalog), Arc::new(MockMemberships::default()));

        let err = service
            .create_segment(Segment { slug: String::new(), percent: 0 })
            .await
            .unwrap_err();
        assert!(matches!(err, SegmentifyError::InvalidRequest(_)));
        assert!(catalog.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_segment_passes_valid_input_through() {
        let catalog = Arc::new(MockCatalog::default());
        let service = service_with(Arc::clone(&catalog), Arc::new(MockMemberships::default()));

        let segment = service
            .create_segment(Segment { slug: "WOW".into(), percent: 50 })
            .await
            .unwrap();
        assert_eq!(segment.slug, "WOW");
        assert_eq!(catalog.created.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_drops_zero_value_expiry_sentinel() {
        let memberships = Arc::new(MockMemberships::default());
        let service = service_with(Arc::new(MockCatalog::default()), Arc::clone(&memberships));

        let zero = Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).unwrap();
        let real = Utc.with_ymd_and_hms(2023, 9, 1, 10, 0, 0).unwrap();
        service
            .update_user_segments(
                1,
                vec![
                    MembershipChange { slug: "A".into(), expire_at: Some(zero) },
                    MembershipChange { slug: "B".into(), expire_at: Some(real) },
                ],
                vec![],
            )
            .await
            .unwrap();

        let updates = memberships.updates.lock().unwrap();
        let (_, to_add, _) = &updates[0];
        assert_eq!(to_add[0].expire_at, None);
        assert_eq!(to_add[1].expire_at, Some(real));
    }

    #[tokio::test]
    async fn update_propagates_store_errors() {
        let memberships = Arc::new(MockMemberships {
            fail_with_user_not_found: true,
            ..Default::default()
        });
        let service = service_with(Arc::new(MockCatalog::default()), memberships);

        let err = service.update_user_segments(999, vec![], vec![]).await.unwrap_err();
        assert!(matches!(err, SegmentifyError::UserNotFound { id: 999 }));
    }

    #[tokio::test]
    async fn get_user_segments_delegates_to_store() {
        let service =
            service_with(Arc::new(MockCatalog::default()), Arc::new(MockMemberships::default()));
        let segments = service.get_user_segments(1).await.unwrap();
        assert_eq!(segments, vec!["AVITO_50".to_string()]);
    }
}
