//! Entity catalog boundary
//!
//! The catalog is the persistent home of discovered entities. Orchestrators
//! only talk to it through `EntityCatalog`; each call is treated as its own
//! transaction. `MemoryCatalog` is the in-process implementation used by
//! tests and wrapped by the service's file-backed catalog.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use platform::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::entity::DiscoveredEntity;
use crate::error::CatalogError;

/// A persisted entity record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntity {
    pub id: Uuid,
    #[serde(flatten)]
    pub snapshot: DiscoveredEntity,
    pub created_at: DateTime<Utc>,
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Last sync failure, cleared by the next successful sync.
    pub sync_error: Option<String>,
}

impl CatalogEntity {
    pub fn new(snapshot: DiscoveredEntity) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: snapshot.fetched_at,
            last_synced_at: Some(snapshot.fetched_at),
            sync_error: None,
            snapshot,
        }
    }

    pub fn external_id(&self) -> &str {
        &self.snapshot.external_id
    }

    /// Overwrite mutable fields from a fresh snapshot and mark it synced.
    ///
    /// An already assigned category and the original discovery tag are kept.
    /// Engagement and trust are only replaced when the fresh snapshot carries
    /// them.
    pub fn apply(&mut self, fresh: DiscoveredEntity) {
        let synced_at = fresh.fetched_at;
        let category = self.snapshot.category.take().or(fresh.category.clone());
        let source_tag = self.snapshot.source_tag.take().or(fresh.source_tag.clone());
        let engagement = fresh.engagement.clone().or(self.snapshot.engagement.take());
        let trust = fresh.trust.clone().or(self.snapshot.trust.take());

        self.snapshot = DiscoveredEntity {
            category,
            source_tag,
            engagement,
            trust,
            ..fresh
        };
        self.last_synced_at = Some(synced_at);
        self.sync_error = None;
    }

    fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        self.last_synced_at.is_none_or(|t| t < cutoff)
    }
}

/// Read/write access to persisted entities.
///
/// Uses `BoxFuture` return types for dyn-compatibility (`Arc<dyn EntityCatalog>`).
pub trait EntityCatalog: Send + Sync {
    fn find_by_external_id<'a>(
        &'a self,
        external_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<CatalogEntity>, CatalogError>>;

    fn create<'a>(
        &'a self,
        entity: DiscoveredEntity,
    ) -> BoxFuture<'a, Result<CatalogEntity, CatalogError>>;

    fn update<'a>(
        &'a self,
        existing: &'a CatalogEntity,
        fresh: DiscoveredEntity,
    ) -> BoxFuture<'a, Result<CatalogEntity, CatalogError>>;

    /// Up to `limit` entities not synced within `max_age_days`, never-synced
    /// first, then oldest sync first.
    fn list_stale<'a>(
        &'a self,
        max_age_days: u32,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<CatalogEntity>, CatalogError>>;

    /// Store a sync failure on the entity without touching its data.
    fn record_sync_error<'a>(
        &'a self,
        id: Uuid,
        error: String,
    ) -> BoxFuture<'a, Result<(), CatalogError>>;
}

/// In-memory catalog keyed by entity id.
#[derive(Default)]
pub struct MemoryCatalog {
    entities: RwLock<HashMap<Uuid, CatalogEntity>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entities(entities: Vec<CatalogEntity>) -> Self {
        Self {
            entities: RwLock::new(entities.into_iter().map(|e| (e.id, e)).collect()),
        }
    }

    /// All records, oldest created first.
    pub async fn entities(&self) -> Vec<CatalogEntity> {
        let mut all: Vec<CatalogEntity> = self.entities.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        all
    }

    pub async fn get(&self, id: Uuid) -> Option<CatalogEntity> {
        self.entities.read().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entities.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl EntityCatalog for MemoryCatalog {
    fn find_by_external_id<'a>(
        &'a self,
        external_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<CatalogEntity>, CatalogError>> {
        Box::pin(async move {
            Ok(self
                .entities
                .read()
                .await
                .values()
                .find(|e| e.external_id() == external_id)
                .cloned())
        })
    }

    fn create<'a>(
        &'a self,
        entity: DiscoveredEntity,
    ) -> BoxFuture<'a, Result<CatalogEntity, CatalogError>> {
        Box::pin(async move {
            let mut entities = self.entities.write().await;
            if entities
                .values()
                .any(|e| e.external_id() == entity.external_id)
            {
                return Err(CatalogError::Conflict(entity.external_id));
            }
            let record = CatalogEntity::new(entity);
            entities.insert(record.id, record.clone());
            Ok(record)
        })
    }

    fn update<'a>(
        &'a self,
        existing: &'a CatalogEntity,
        fresh: DiscoveredEntity,
    ) -> BoxFuture<'a, Result<CatalogEntity, CatalogError>> {
        Box::pin(async move {
            let mut entities = self.entities.write().await;
            let record = entities
                .get_mut(&existing.id)
                .ok_or_else(|| CatalogError::NotFound(existing.id.to_string()))?;
            record.apply(fresh);
            Ok(record.clone())
        })
    }

    fn list_stale<'a>(
        &'a self,
        max_age_days: u32,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<CatalogEntity>, CatalogError>> {
        Box::pin(async move {
            let cutoff = Utc::now() - Duration::days(i64::from(max_age_days));
            let mut stale: Vec<CatalogEntity> = self
                .entities
                .read()
                .await
                .values()
                .filter(|e| e.is_stale(cutoff))
                .cloned()
                .collect();
            // None sorts before Some
            stale.sort_by(|a, b| {
                a.last_synced_at
                    .cmp(&b.last_synced_at)
                    .then(a.created_at.cmp(&b.created_at))
            });
            stale.truncate(limit);
            Ok(stale)
        })
    }

    fn record_sync_error<'a>(
        &'a self,
        id: Uuid,
        error: String,
    ) -> BoxFuture<'a, Result<(), CatalogError>> {
        Box::pin(async move {
            let mut entities = self.entities.write().await;
            let record = entities
                .get_mut(&id)
                .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;
            record.sync_error = Some(error);
            Ok(())
        })
    }
}
