//! Staleness-driven re-sync of catalog entities
//!
//! Selects entities whose last successful sync is older than a threshold,
//! oldest first, and re-fetches their profile and recent content through the
//! pool. Entities with measured engagement also get a trust score from a
//! follower sample. Each entity is fetched completely before anything is written, so a
//! cancelled or failed refresh never leaves a half-updated record.

use std::collections::HashSet;
use std::sync::Arc;

use access_pool::{Pool, report_outcome};
use chrono::Utc;
use platform::{ContentSnapshot, FollowerSnapshot, ProfileRef, ProfileSnapshot, RemoteError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::catalog::{CatalogEntity, EntityCatalog};
use crate::entity::{DiscoveredEntity, EngagementStats};
use crate::error::Result;
use crate::pacing::{Pacing, acquire_lease, checkpoint, pause};
use crate::report::RefreshReport;
use crate::requirements::MinimumRequirements;
use crate::trust::{DEFAULT_FOLLOWER_SAMPLE, TrustAnalysis};

/// Posts sampled per entity for engagement metrics.
pub const DEFAULT_RECENT_POSTS: usize = 12;

fn count(outcome: &'static str) {
    metrics::counter!("refresh_entities_total", "outcome" => outcome).increment(1);
}

pub struct StalenessRefresher {
    pool: Arc<Pool>,
    catalog: Arc<dyn EntityCatalog>,
    requirements: MinimumRequirements,
    pacing: Pacing,
    cancel: CancellationToken,
    recent_posts: usize,
    follower_sample: usize,
}

impl StalenessRefresher {
    pub fn new(
        pool: Arc<Pool>,
        catalog: Arc<dyn EntityCatalog>,
        requirements: MinimumRequirements,
        pacing: Pacing,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            pool,
            catalog,
            requirements,
            pacing,
            cancel,
            recent_posts: DEFAULT_RECENT_POSTS,
            follower_sample: DEFAULT_FOLLOWER_SAMPLE,
        }
    }

    pub fn with_recent_posts(mut self, recent_posts: usize) -> Self {
        self.recent_posts = recent_posts;
        self
    }

    /// Followers sampled for trust scoring; zero disables scoring.
    pub fn with_follower_sample(mut self, follower_sample: usize) -> Self {
        self.follower_sample = follower_sample;
        self
    }

    /// Re-sync up to `limit` entities not synced within `max_age_days`.
    ///
    /// Per-entity failures are stored on the entity and skipped. Pool
    /// exhaustion, catalog failures and cancellation stop the refresh with
    /// `aborted` set; entities already updated stay updated.
    pub async fn refresh_stale(&self, max_age_days: u32, limit: usize) -> RefreshReport {
        let mut report = RefreshReport::start(max_age_days);
        info!(run_id = %report.run_id, max_age_days, limit, "starting staleness refresh");

        if let Err(e) = self.refresh_into(max_age_days, limit, &mut report).await {
            error!(run_id = %report.run_id, error = %e, "refresh aborted");
            report.aborted = Some(e.to_string());
        }

        let report = report.finish();
        info!(
            run_id = %report.run_id,
            selected = report.selected,
            updated = report.updated,
            failed = report.failed,
            disqualified = report.disqualified,
            "refresh complete"
        );
        report
    }

    async fn refresh_into(
        &self,
        max_age_days: u32,
        limit: usize,
        report: &mut RefreshReport,
    ) -> Result<()> {
        let stale = self.catalog.list_stale(max_age_days, limit).await?;
        let mut seen = HashSet::new();
        let stale: Vec<CatalogEntity> = stale
            .into_iter()
            .filter(|e| seen.insert(e.id))
            .take(limit)
            .collect();
        report.selected = stale.len();

        for (i, entity) in stale.iter().enumerate() {
            if i > 0 {
                pause(self.pacing.entity, &self.cancel).await?;
            }
            checkpoint(&self.cancel)?;
            self.refresh_entity(entity, report).await?;
        }
        Ok(())
    }

    async fn refresh_entity(&self, entity: &CatalogEntity, report: &mut RefreshReport) -> Result<()> {
        let external_id = entity.external_id();
        let fresh = match self.fetch(external_id).await? {
            Ok(fresh) => fresh,
            Err(reason) => {
                warn!(entity_id = %entity.id, external_id, error = %reason, "refresh failed");
                self.catalog.record_sync_error(entity.id, reason).await?;
                report.failed += 1;
                count("failed");
                return Ok(());
            }
        };

        let (snapshot, profile) = fresh;
        if let Err(rejection) = self.requirements.evaluate(&profile) {
            debug!(
                external_id,
                reason = rejection.reason(),
                detail = %rejection,
                "entity no longer meets minimum requirements"
            );
            report.disqualified += 1;
            count("disqualified");
        }

        self.catalog.update(entity, snapshot).await?;
        report.updated += 1;
        count("updated");
        debug!(entity_id = %entity.id, external_id, "entity refreshed");
        Ok(())
    }

    /// Fetch everything needed for one entity.
    ///
    /// The outer result carries abort-class errors; the inner one a per-entity
    /// failure message to store on the record.
    async fn fetch(
        &self,
        external_id: &str,
    ) -> Result<std::result::Result<(DiscoveredEntity, ProfileSnapshot), String>> {
        let target = ProfileRef::Id(external_id.to_string());
        let lease = acquire_lease(&self.pool, &self.pacing, &self.cancel).await?;
        let result = lease.lookup_profile(&target).await;
        report_outcome(&self.pool, &lease.account_id, &result).await;
        let profile = match result {
            Ok(profile) => profile,
            Err(e) => {
                log_remote_error(&lease.account_id, external_id, &e);
                return Ok(Err(e.to_string()));
            }
        };

        let mut snapshot = match DiscoveredEntity::from_profile(&profile, None, None, Utc::now()) {
            Ok(snapshot) => snapshot,
            Err(e) => return Ok(Err(e.to_string())),
        };

        if !profile.is_private
            && let Some(posts) = self.recent(external_id).await?
        {
            snapshot = snapshot.with_engagement(EngagementStats::from_content(
                &posts,
                profile.follower_count,
            ));
        }

        if snapshot.engagement.is_some() && self.follower_sample > 0 {
            let followers = if profile.follower_count > 0 {
                self.followers(external_id).await?
            } else {
                Vec::new()
            };
            let trust = TrustAnalysis::evaluate(&snapshot, &followers);
            debug!(
                external_id,
                trust_score = trust.trust_score,
                level = trust.level.label(),
                sampled = trust.followers_sampled,
                "trust scored"
            );
            snapshot = snapshot.with_trust(trust);
        }

        Ok(Ok((snapshot, profile)))
    }

    /// Recent content for engagement metrics. A failure keeps the stored
    /// engagement rather than failing the whole entity.
    async fn recent(&self, external_id: &str) -> Result<Option<Vec<ContentSnapshot>>> {
        if self.recent_posts == 0 {
            return Ok(None);
        }
        let lease = acquire_lease(&self.pool, &self.pacing, &self.cancel).await?;
        let result = lease.recent_content(external_id, self.recent_posts).await;
        report_outcome(&self.pool, &lease.account_id, &result).await;
        match result {
            Ok(posts) => Ok(Some(posts)),
            Err(e) => {
                log_remote_error(&lease.account_id, external_id, &e);
                Ok(None)
            }
        }
    }

    /// Follower sample for trust scoring. A failed sample scores as empty.
    async fn followers(&self, external_id: &str) -> Result<Vec<FollowerSnapshot>> {
        let lease = acquire_lease(&self.pool, &self.pacing, &self.cancel).await?;
        let result = lease.sample_followers(external_id, self.follower_sample).await;
        report_outcome(&self.pool, &lease.account_id, &result).await;
        match result {
            Ok(followers) => Ok(followers),
            Err(e) => {
                log_remote_error(&lease.account_id, external_id, &e);
                Ok(Vec::new())
            }
        }
    }
}

fn log_remote_error(account_id: &str, external_id: &str, err: &RemoteError) {
    match err {
        RemoteError::ChallengeRequired(_) => {
            error!(account_id, external_id, error = %err, "account challenged during refresh")
        }
        _ => warn!(account_id, external_id, kind = err.kind(), error = %err, "remote call failed"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::catalog::tests::synced;
    use crate::entity::tests::{post, profile};
    use crate::error::CatalogError;
    use crate::test_support::{no_pacing_policy, test_pool};
    use crate::trust::TrustLevel;
    use crate::trust::tests::follower;
    use platform::{BoxFuture, ScriptedPlatform};

    fn refresher(pool: Arc<Pool>, catalog: Arc<dyn EntityCatalog>) -> StalenessRefresher {
        StalenessRefresher::new(
            pool,
            catalog,
            MinimumRequirements::default(),
            Pacing::default(),
            CancellationToken::new(),
        )
    }

    fn seed(platform: &ScriptedPlatform, ids: &[&str]) {
        for id in ids {
            platform.add_profile(profile(id, &format!("User{id}"), 20_000, 80));
            platform.set_recent(id, vec![post("p1", 400, 40), post("p2", 200, 20)]);
        }
    }

    fn stale_catalog() -> Arc<MemoryCatalog> {
        Arc::new(MemoryCatalog::from_entities(vec![
            synced("fresh", Some(1)),
            synced("old", Some(30)),
            synced("never", None),
            synced("older", Some(60)),
        ]))
    }

    #[tokio::test(start_paused = true)]
    async fn refreshes_oldest_first() {
        let (_dir, platform, pool) = test_pool(&["a", "b"], no_pacing_policy()).await;
        seed(&platform, &["fresh", "old", "never", "older"]);
        let catalog = stale_catalog();

        let report = refresher(pool, catalog.clone()).refresh_stale(7, 10).await;

        assert!(report.aborted.is_none());
        assert_eq!(report.selected, 3);
        assert_eq!(report.updated, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(platform.call_args("profile"), ["id:never", "id:older", "id:old"]);

        let refreshed = catalog.find_by_external_id("never").await.unwrap().unwrap();
        assert_eq!(refreshed.snapshot.follower_count, 20_000);
        assert_eq!(refreshed.snapshot.handle, "usernever");
        assert!(refreshed.last_synced_at.is_some());
        let engagement = refreshed.snapshot.engagement.unwrap();
        assert_eq!(engagement.avg_likes, 300);
        assert_eq!(engagement.avg_comments, 30);
        assert_eq!(engagement.engagement_rate, 1.65);
        // Category from discovery survives the refresh
        assert_eq!(refreshed.snapshot.category.as_deref(), Some("Travel"));

        assert!(catalog.list_stale(7, 10).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn limit_caps_selection() {
        let (_dir, platform, pool) = test_pool(&["a"], no_pacing_policy()).await;
        seed(&platform, &["old", "never", "older"]);
        let report = refresher(pool, stale_catalog()).refresh_stale(7, 2).await;
        assert_eq!(report.selected, 2);
        assert_eq!(platform.call_args("profile"), ["id:never", "id:older"]);
    }

    #[tokio::test(start_paused = true)]
    async fn entities_are_paced() {
        let (_dir, platform, pool) = test_pool(&["a"], no_pacing_policy()).await;
        seed(&platform, &["old", "never", "older"]);
        let start = tokio::time::Instant::now();
        refresher(pool, stale_catalog()).refresh_stale(7, 10).await;
        assert_eq!(start.elapsed(), Pacing::default().entity * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_is_stored_on_entity() {
        let (_dir, platform, pool) = test_pool(&["a"], no_pacing_policy()).await;
        seed(&platform, &["old", "never"]);
        // "older" has no profile on the platform
        let catalog = stale_catalog();

        let report = refresher(pool, catalog.clone()).refresh_stale(7, 10).await;

        assert!(report.aborted.is_none());
        assert_eq!(report.updated, 2);
        assert_eq!(report.failed, 1);
        let failed = catalog.find_by_external_id("older").await.unwrap().unwrap();
        assert_eq!(failed.sync_error.as_deref(), Some("not found: profile id:older"));
        let ok = catalog.find_by_external_id("old").await.unwrap().unwrap();
        assert!(ok.sync_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn disqualified_entities_are_still_updated() {
        let (_dir, platform, pool) = test_pool(&["a"], no_pacing_policy()).await;
        platform.add_profile(profile("never", "shrunk", 300, 80));
        let catalog = Arc::new(MemoryCatalog::from_entities(vec![synced("never", None)]));

        let report = refresher(pool, catalog.clone()).refresh_stale(7, 10).await;
        assert_eq!(report.updated, 1);
        assert_eq!(report.disqualified, 1);
        let entity = catalog.find_by_external_id("never").await.unwrap().unwrap();
        assert_eq!(entity.snapshot.follower_count, 300);
    }

    #[tokio::test(start_paused = true)]
    async fn private_profiles_skip_recent_content() {
        let (_dir, platform, pool) = test_pool(&["a"], no_pacing_policy()).await;
        let mut private = profile("never", "hidden", 20_000, 80);
        private.is_private = true;
        platform.add_profile(private);
        let catalog = Arc::new(MemoryCatalog::from_entities(vec![synced("never", None)]));

        let report = refresher(pool, catalog.clone()).refresh_stale(7, 10).await;
        assert_eq!(report.updated, 1);
        assert_eq!(platform.calls("recent_content"), 0);
        let entity = catalog.find_by_external_id("never").await.unwrap().unwrap();
        assert!(entity.snapshot.engagement.is_none());
        assert!(entity.snapshot.is_private);
    }

    #[tokio::test(start_paused = true)]
    async fn engagement_sampling_can_be_disabled() {
        let (_dir, platform, pool) = test_pool(&["a"], no_pacing_policy()).await;
        seed(&platform, &["never"]);
        let catalog = Arc::new(MemoryCatalog::from_entities(vec![synced("never", None)]));

        let report = refresher(pool, catalog)
            .with_recent_posts(0)
            .refresh_stale(7, 10)
            .await;
        assert_eq!(report.updated, 1);
        assert_eq!(platform.calls("recent_content"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn trust_is_scored_from_follower_sample() {
        let (_dir, platform, pool) = test_pool(&["a", "b"], no_pacing_policy()).await;
        seed(&platform, &["never"]);
        platform.set_followers(
            "never",
            vec![
                follower("seoul.eats", true),
                follower("busan.trip", true),
                follower("user83920174", true),
                follower("nopic", false),
            ],
        );
        let catalog = Arc::new(MemoryCatalog::from_entities(vec![synced("never", None)]));

        let report = refresher(pool, catalog.clone())
            .with_follower_sample(4)
            .refresh_stale(7, 10)
            .await;
        assert_eq!(report.updated, 1);
        assert_eq!(platform.call_args("followers"), ["never"]);

        let entity = catalog.find_by_external_id("never").await.unwrap().unwrap();
        let trust = entity.snapshot.trust.unwrap();
        assert_eq!(trust.followers_sampled, 4);
        assert_eq!(trust.suspicious_follower_ratio, 50.0);
        assert_eq!(trust.follower_quality_score, 50.0);
        // engagement 1.65% scores 33
        assert_eq!(trust.engagement_score, 33.0);
        assert_eq!(trust.level, TrustLevel::Suspicious);
    }

    #[tokio::test(start_paused = true)]
    async fn trust_needs_measured_engagement() {
        let (_dir, platform, pool) = test_pool(&["a"], no_pacing_policy()).await;
        seed(&platform, &["never"]);
        let catalog = Arc::new(MemoryCatalog::from_entities(vec![synced("never", None)]));

        refresher(pool, catalog.clone())
            .with_recent_posts(0)
            .refresh_stale(7, 10)
            .await;
        assert_eq!(platform.calls("followers"), 0);
        let entity = catalog.find_by_external_id("never").await.unwrap().unwrap();
        assert!(entity.snapshot.trust.is_none());
    }

    /// Returns every stale entity twice.
    struct DuplicatingCatalog(MemoryCatalog);

    impl EntityCatalog for DuplicatingCatalog {
        fn find_by_external_id<'a>(
            &'a self,
            external_id: &'a str,
        ) -> BoxFuture<'a, std::result::Result<Option<CatalogEntity>, CatalogError>> {
            self.0.find_by_external_id(external_id)
        }

        fn create<'a>(
            &'a self,
            entity: DiscoveredEntity,
        ) -> BoxFuture<'a, std::result::Result<CatalogEntity, CatalogError>> {
            self.0.create(entity)
        }

        fn update<'a>(
            &'a self,
            existing: &'a CatalogEntity,
            fresh: DiscoveredEntity,
        ) -> BoxFuture<'a, std::result::Result<CatalogEntity, CatalogError>> {
            self.0.update(existing, fresh)
        }

        fn list_stale<'a>(
            &'a self,
            max_age_days: u32,
            limit: usize,
        ) -> BoxFuture<'a, std::result::Result<Vec<CatalogEntity>, CatalogError>> {
            Box::pin(async move {
                let stale = self.0.list_stale(max_age_days, limit).await?;
                Ok(stale.iter().flat_map(|e| [e.clone(), e.clone()]).collect())
            })
        }

        fn record_sync_error<'a>(
            &'a self,
            id: uuid::Uuid,
            error: String,
        ) -> BoxFuture<'a, std::result::Result<(), CatalogError>> {
            self.0.record_sync_error(id, error)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn never_refreshes_an_entity_twice() {
        let (_dir, platform, pool) = test_pool(&["a"], no_pacing_policy()).await;
        seed(&platform, &["old", "never", "older"]);
        let catalog = Arc::new(DuplicatingCatalog(MemoryCatalog::from_entities(vec![
            synced("old", Some(30)),
            synced("never", None),
        ])));

        let report = refresher(pool, catalog).refresh_stale(7, 10).await;
        assert_eq!(report.selected, 2);
        assert_eq!(report.updated, 2);
        assert_eq!(platform.call_args("profile"), ["id:never", "id:old"]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_between_entities() {
        let (_dir, platform, pool) = test_pool(&["a"], no_pacing_policy()).await;
        seed(&platform, &["old", "never", "older"]);
        let cancel = CancellationToken::new();
        let refresher = Arc::new(StalenessRefresher::new(
            pool,
            stale_catalog(),
            MinimumRequirements::default(),
            Pacing::default(),
            cancel.clone(),
        ));

        let run = tokio::spawn({
            let refresher = refresher.clone();
            async move { refresher.refresh_stale(7, 10).await }
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();

        let report = run.await.unwrap();
        assert_eq!(report.aborted.as_deref(), Some("cancelled"));
        assert_eq!(report.selected, 3);
        assert_eq!(report.updated, 1);
        assert_eq!(platform.calls("profile"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_pool_aborts() {
        let (_dir, platform, pool) = test_pool(&["a"], no_pacing_policy()).await;
        seed(&platform, &["old", "never", "older"]);
        pool.report_suspended("a", access_pool::SuspendReason::Challenge)
            .await
            .unwrap();

        let report = refresher(pool, stale_catalog()).refresh_stale(7, 10).await;
        assert!(report.aborted.as_deref().unwrap().contains("no available account"));
        assert_eq!(report.updated, 0);
        assert_eq!(platform.calls("profile"), 0);
    }
}
