//! JSON-file entity catalog
//!
//! Keeps the catalog in memory and rewrites the whole file atomically after
//! every write, so each catalog call stays a transaction on its own. Suitable
//! for a single crawler process; concurrent processes need a real store.

use std::path::{Path, PathBuf};

use discovery::{CatalogEntity, CatalogError, DiscoveredEntity, EntityCatalog, MemoryCatalog};
use platform::BoxFuture;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};

pub struct FileCatalog {
    path: PathBuf,
    inner: MemoryCatalog,
    /// Held across write-then-persist so file snapshots never interleave.
    write_lock: Mutex<()>,
}

impl FileCatalog {
    /// Open the catalog at `path`; a missing file starts an empty catalog.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entities: Vec<CatalogEntity> = common::fs::read_json(&path)
            .await
            .map_err(|source| Error::CatalogFile {
                path: path.clone(),
                source,
            })?
            .unwrap_or_default();
        info!(path = %path.display(), entities = entities.len(), "catalog loaded");
        Ok(Self {
            inner: MemoryCatalog::from_entities(entities),
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn len(&self) -> usize {
        self.inner.len().await
    }

    async fn persist(&self) -> std::result::Result<(), CatalogError> {
        let entities = self.inner.entities().await;
        common::fs::write_json_atomic(&self.path, &entities)
            .await
            .map_err(|e| CatalogError::Unavailable(format!("{}: {e}", self.path.display())))?;
        debug!(path = %self.path.display(), entities = entities.len(), "catalog persisted");
        Ok(())
    }
}

impl EntityCatalog for FileCatalog {
    fn find_by_external_id<'a>(
        &'a self,
        external_id: &'a str,
    ) -> BoxFuture<'a, std::result::Result<Option<CatalogEntity>, CatalogError>> {
        self.inner.find_by_external_id(external_id)
    }

    fn create<'a>(
        &'a self,
        entity: DiscoveredEntity,
    ) -> BoxFuture<'a, std::result::Result<CatalogEntity, CatalogError>> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            let created = self.inner.create(entity).await?;
            self.persist().await?;
            Ok(created)
        })
    }

    fn update<'a>(
        &'a self,
        existing: &'a CatalogEntity,
        fresh: DiscoveredEntity,
    ) -> BoxFuture<'a, std::result::Result<CatalogEntity, CatalogError>> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            let updated = self.inner.update(existing, fresh).await?;
            self.persist().await?;
            Ok(updated)
        })
    }

    fn list_stale<'a>(
        &'a self,
        max_age_days: u32,
        limit: usize,
    ) -> BoxFuture<'a, std::result::Result<Vec<CatalogEntity>, CatalogError>> {
        self.inner.list_stale(max_age_days, limit)
    }

    fn record_sync_error<'a>(
        &'a self,
        id: Uuid,
        error: String,
    ) -> BoxFuture<'a, std::result::Result<(), CatalogError>> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            self.inner.record_sync_error(id, error).await?;
            self.persist().await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use platform::ProfileSnapshot;

    fn entity(id: &str, followers: u64) -> DiscoveredEntity {
        let profile = ProfileSnapshot {
            external_id: id.into(),
            handle: format!("user{id}"),
            full_name: String::new(),
            biography: String::new(),
            avatar_url: None,
            follower_count: followers,
            following_count: 10,
            media_count: 40,
            is_verified: false,
            is_business: false,
            is_private: false,
            category: None,
            public_email: None,
            public_phone: None,
            external_url: None,
        };
        DiscoveredEntity::from_profile(&profile, Some("Travel"), Some("여행"), Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = FileCatalog::open(dir.path().join("catalog.json")).await.unwrap();
        assert_eq!(catalog.len().await, 0);
        assert!(!catalog.path().exists());
    }

    #[tokio::test]
    async fn writes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");

        let catalog = FileCatalog::open(&path).await.unwrap();
        let created = catalog.create(entity("1", 5_000)).await.unwrap();
        catalog.create(entity("2", 7_000)).await.unwrap();
        catalog.update(&created, entity("1", 9_000)).await.unwrap();
        catalog
            .record_sync_error(created.id, "transient error: reset".into())
            .await
            .unwrap();

        let reopened = FileCatalog::open(&path).await.unwrap();
        assert_eq!(reopened.len().await, 2);
        let one = reopened.find_by_external_id("1").await.unwrap().unwrap();
        assert_eq!(one.id, created.id);
        assert_eq!(one.snapshot.follower_count, 9_000);
        assert_eq!(one.sync_error.as_deref(), Some("transient error: reset"));
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, "[{\"id\": 1").unwrap();
        let result = FileCatalog::open(&path).await;
        assert!(matches!(result, Err(Error::CatalogFile { .. })));
    }

    #[tokio::test]
    async fn failed_create_does_not_touch_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let catalog = FileCatalog::open(&path).await.unwrap();
        catalog.create(entity("1", 5_000)).await.unwrap();
        let before = std::fs::read_to_string(&path).unwrap();

        let result = catalog.create(entity("1", 5_000)).await;
        assert!(matches!(result, Err(CatalogError::Conflict(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }
}
