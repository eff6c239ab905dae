//! Crawl orchestration on top of the access pool
//!
//! Three long-running jobs share one `Pool`:
//! - `DiscoveryOrchestrator` explores tag feeds for new qualifying entities
//! - `StalenessRefresher` re-syncs catalog entities oldest-first and scores
//!   their audience trust
//! - `ContentMonitor` polls tracked content for deletion or loss of visibility
//!
//! Each job runs sequentially, pacing itself between units of work and
//! checking its `CancellationToken` at every pause. Per-item failures are
//! logged, reported to the pool, and skipped; only pool exhaustion, catalog
//! failures and cancellation end a job early. Jobs return structured reports
//! rather than raising.

pub mod catalog;
pub mod categories;
pub mod content_ref;
pub mod discovery;
pub mod entity;
pub mod error;
pub mod monitor;
pub mod pacing;
pub mod refresher;
pub mod report;
pub mod requirements;
pub mod trust;

pub use catalog::{CatalogEntity, EntityCatalog, MemoryCatalog};
pub use categories::{Category, CategoryTable};
pub use content_ref::{ContentRefError, resolve_content_id};
pub use discovery::DiscoveryOrchestrator;
pub use entity::{DiscoveredEntity, EngagementStats, SnapshotError, Tier};
pub use error::{CatalogError, DiscoveryError, Result};
pub use monitor::{
    ContentMonitor, ContentStatus, MetricsSnapshot, MonitoringResult, Transition, should_alert,
    transition,
};
pub use pacing::{Pacing, acquire_lease};
pub use refresher::{DEFAULT_RECENT_POSTS, StalenessRefresher};
pub use report::{CategoryReport, RefreshReport, RunReport, TagReport};
pub use requirements::{MinimumRequirements, Rejection};
pub use trust::{DEFAULT_FOLLOWER_SAMPLE, TrustAnalysis, TrustLevel};
