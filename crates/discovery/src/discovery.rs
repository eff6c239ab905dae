//! Tag-driven entity discovery
//!
//! Walks tag feeds to find profiles worth cataloging. For each tag:
//! 1. Lease an account and fetch the tag's top content
//! 2. Extract author references in feed order, skipping ones already seen
//! 3. Fetch each new author's profile through a fresh lease, pacing between fetches
//! 4. Drop profiles that resolve to an external id already handled this run
//! 5. Filter through `MinimumRequirements`, then create or update the catalog record
//!
//! Deduplication state lives for one `discover_from_tag` call, or for a whole
//! category/full run when driven from there, so an author who shows up under
//! several tags is fetched once per run.
//!
//! Per-candidate failures are reported to the pool and skipped. Only pool
//! exhaustion, catalog failures and cancellation end a run early.

use std::collections::HashSet;
use std::sync::Arc;

use access_pool::{Pool, report_outcome};
use chrono::Utc;
use platform::{ProfileRef, RemoteError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::catalog::EntityCatalog;
use crate::categories::{Category, CategoryTable};
use crate::entity::DiscoveredEntity;
use crate::error::{DiscoveryError, Result};
use crate::pacing::{Pacing, acquire_lease, checkpoint, pause};
use crate::report::{CategoryReport, RunReport, TagReport};
use crate::requirements::MinimumRequirements;

/// Candidates already handled in the current call or run.
#[derive(Debug, Default)]
struct Seen {
    refs: HashSet<ProfileRef>,
    external_ids: HashSet<String>,
}

fn count(kind: &'static str) {
    metrics::counter!("discovery_entities_total", "kind" => kind).increment(1);
}

pub struct DiscoveryOrchestrator {
    pool: Arc<Pool>,
    catalog: Arc<dyn EntityCatalog>,
    requirements: MinimumRequirements,
    categories: CategoryTable,
    pacing: Pacing,
    cancel: CancellationToken,
}

impl DiscoveryOrchestrator {
    pub fn new(
        pool: Arc<Pool>,
        catalog: Arc<dyn EntityCatalog>,
        requirements: MinimumRequirements,
        categories: CategoryTable,
        pacing: Pacing,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            pool,
            catalog,
            requirements,
            categories,
            pacing,
            cancel,
        }
    }

    pub fn categories(&self) -> &CategoryTable {
        &self.categories
    }

    /// Discover entities from one tag's top content.
    ///
    /// `category` is the display name written to new records.
    pub async fn discover_from_tag(
        &self,
        tag: &str,
        category: &str,
        max_candidates: usize,
    ) -> Result<TagReport> {
        self.discover_tag_with(tag, category, max_candidates, &mut Seen::default())
            .await
    }

    /// Crawl up to `max_tags` of a category's tags in priority order.
    ///
    /// A tag whose feed cannot be fetched is recorded and skipped; abort-class
    /// errors are returned.
    pub async fn discover_category(
        &self,
        category_key: &str,
        max_tags: usize,
        max_candidates_per_tag: usize,
    ) -> Result<CategoryReport> {
        let Some(category) = self.categories.get(category_key) else {
            warn!(category = category_key, "unknown category");
            let mut report = CategoryReport::new(category_key);
            report.errors.push(format!("unknown category {category_key}"));
            return Ok(report);
        };
        self.discover_category_with(category, max_tags, max_candidates_per_tag, &mut Seen::default())
            .await
    }

    /// Crawl the top `max_categories` categories by priority.
    ///
    /// Never fails: errors are collected into the report, and an abort-class
    /// error stops the run with `aborted` set.
    pub async fn run_full_discovery(
        &self,
        max_categories: usize,
        max_tags_per_category: usize,
        max_candidates_per_tag: usize,
    ) -> RunReport {
        let mut report = RunReport::start();
        let mut seen = Seen::default();
        info!(
            run_id = %report.run_id,
            max_categories,
            max_tags_per_category,
            max_candidates_per_tag,
            "starting full discovery"
        );

        for (i, category) in self
            .categories
            .by_priority()
            .into_iter()
            .take(max_categories)
            .enumerate()
        {
            if i > 0
                && let Err(e) = pause(self.pacing.category, &self.cancel).await
            {
                report.aborted = Some(e.to_string());
                break;
            }

            info!(category = %category.key, "processing category");
            match self
                .discover_category_with(
                    category,
                    max_tags_per_category,
                    max_candidates_per_tag,
                    &mut seen,
                )
                .await
            {
                Ok(category_report) => report.absorb(category_report),
                Err(e) => {
                    error!(category = %category.key, error = %e, "discovery run aborted");
                    report.errors.push(format!("{}: {e}", category.key));
                    report.aborted = Some(e.to_string());
                    break;
                }
            }
        }

        let report = report.finish();
        info!(
            run_id = %report.run_id,
            categories = report.categories_processed,
            new = report.total_new,
            updated = report.total_updated,
            errors = report.errors.len(),
            aborted = report.aborted.as_deref(),
            "discovery complete"
        );
        report
    }

    async fn discover_category_with(
        &self,
        category: &Category,
        max_tags: usize,
        max_candidates_per_tag: usize,
        seen: &mut Seen,
    ) -> Result<CategoryReport> {
        let mut report = CategoryReport::new(&category.key);

        for (i, tag) in category.tags.iter().take(max_tags).enumerate() {
            if i > 0 {
                pause(self.pacing.tag, &self.cancel).await?;
            }

            match self
                .discover_tag_with(tag, &category.name, max_candidates_per_tag, seen)
                .await
            {
                Ok(tag_report) => report.absorb(&tag_report),
                Err(e) if !e.is_abort() => {
                    warn!(category = %category.key, tag = %tag, error = %e, "tag failed, continuing");
                    report.errors.push(e.to_string());
                }
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }

    async fn discover_tag_with(
        &self,
        tag: &str,
        category: &str,
        max_candidates: usize,
        seen: &mut Seen,
    ) -> Result<TagReport> {
        let mut report = TagReport::new(tag, category);
        info!(tag, category, "starting tag discovery");

        let lease = acquire_lease(&self.pool, &self.pacing, &self.cancel).await?;
        let feed = lease.list_top_content_for_tag(tag, max_candidates).await;
        report_outcome(&self.pool, &lease.account_id, &feed).await;
        let feed = feed.map_err(|source| DiscoveryError::Remote {
            target: format!("#{tag}"),
            source,
        })?;
        report.items = feed.len();

        let mut fetched = 0;
        for item in &feed {
            checkpoint(&self.cancel)?;

            let Some(target) = item.owner_ref() else {
                debug!(tag, content_id = %item.id, "content has no usable owner");
                report.no_owner += 1;
                continue;
            };
            if !seen.refs.insert(target.clone()) {
                report.duplicates += 1;
                count("duplicate");
                continue;
            }

            if fetched > 0 {
                pause(self.pacing.candidate, &self.cancel).await?;
            }
            fetched += 1;
            report.candidates += 1;

            self.process_candidate(&target, tag, category, seen, &mut report)
                .await?;
        }

        info!(
            tag,
            new = report.new_count,
            updated = report.updated_count,
            filtered = report.filtered,
            failed = report.failed,
            "tag discovery complete"
        );
        Ok(report)
    }

    /// Fetch, qualify and upsert one candidate. Only abort-class errors escape.
    async fn process_candidate(
        &self,
        target: &ProfileRef,
        tag: &str,
        category: &str,
        seen: &mut Seen,
        report: &mut TagReport,
    ) -> Result<()> {
        let lease = acquire_lease(&self.pool, &self.pacing, &self.cancel).await?;
        let result = lease.lookup_profile(target).await;
        report_outcome(&self.pool, &lease.account_id, &result).await;

        let profile = match result {
            Ok(profile) => profile,
            Err(e) => {
                log_candidate_error(&lease.account_id, target, &e);
                report.failed += 1;
                count("failed");
                return Ok(());
            }
        };

        if !seen.external_ids.insert(profile.external_id.clone()) {
            debug!(external_id = %profile.external_id, candidate = %target, "already handled under another reference");
            report.duplicates += 1;
            count("duplicate");
            return Ok(());
        }

        if let Err(rejection) = self.requirements.evaluate(&profile) {
            debug!(
                external_id = %profile.external_id,
                handle = %profile.handle,
                reason = rejection.reason(),
                detail = %rejection,
                "candidate filtered"
            );
            report.filtered += 1;
            count("filtered");
            return Ok(());
        }

        let entity = match DiscoveredEntity::from_profile(&profile, Some(category), Some(tag), Utc::now()) {
            Ok(entity) => entity,
            Err(e) => {
                warn!(candidate = %target, error = %e, "incomplete profile snapshot");
                report.failed += 1;
                count("failed");
                return Ok(());
            }
        };

        match self.catalog.find_by_external_id(&entity.external_id).await? {
            Some(existing) => {
                self.catalog.update(&existing, entity).await?;
                report.updated_count += 1;
                count("updated");
                debug!(external_id = %profile.external_id, "catalog entity updated");
            }
            None => {
                self.catalog.create(entity).await?;
                report.new_count += 1;
                count("created");
                info!(external_id = %profile.external_id, handle = %profile.handle, tag, "new entity discovered");
            }
        }
        Ok(())
    }
}

fn log_candidate_error(account_id: &str, target: &ProfileRef, err: &RemoteError) {
    match err {
        RemoteError::ChallengeRequired(_) => {
            error!(account_id, candidate = %target, error = %err, "account challenged while fetching candidate")
        }
        _ => warn!(account_id, candidate = %target, kind = err.kind(), error = %err, "candidate skipped"),
    }
}
