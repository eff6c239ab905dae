//! Tracked-content ledger
//!
//! JSON file of content ids the `monitor` command checks, each with its last
//! known status and a bounded history of engagement readings. Inconclusive
//! readings never overwrite a known status.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use discovery::{ContentStatus, MetricsSnapshot, MonitoringResult, Transition, transition};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::metrics::record_alert;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedContent {
    pub content_id: String,
    pub status: ContentStatus,
    #[serde(default)]
    pub last_checked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_error: Option<String>,
    /// Oldest first.
    #[serde(default)]
    pub history: Vec<MetricsSnapshot>,
}

impl TrackedContent {
    fn new(content_id: &str) -> Self {
        Self {
            content_id: content_id.to_string(),
            status: ContentStatus::Active,
            last_checked_at: None,
            last_error: None,
            history: Vec::new(),
        }
    }
}

/// What one monitoring pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerSummary {
    pub checked: usize,
    /// Newly deleted or made private.
    pub alerts: Vec<String>,
    /// Active again after being deleted or private.
    pub rediscovered: Vec<String>,
    pub changed: usize,
    pub inconclusive: usize,
}

pub struct Ledger {
    path: PathBuf,
    entries: Vec<TrackedContent>,
    history_limit: usize,
}

impl Ledger {
    /// Load the ledger at `path`; a missing file is an empty ledger.
    pub async fn load(path: impl Into<PathBuf>, history_limit: usize) -> Result<Self> {
        let path = path.into();
        let entries = common::fs::read_json(&path)
            .await
            .map_err(|source| Error::Ledger {
                path: path.clone(),
                source,
            })?
            .unwrap_or_default();
        Ok(Self {
            path,
            entries,
            history_limit,
        })
    }

    pub async fn save(&self) -> Result<()> {
        common::fs::write_json_atomic(&self.path, &self.entries)
            .await
            .map_err(|source| Error::Ledger {
                path: self.path.clone(),
                source,
            })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[TrackedContent] {
        &self.entries
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.content_id.clone()).collect()
    }

    pub fn get(&self, content_id: &str) -> Option<&TrackedContent> {
        self.entries.iter().find(|e| e.content_id == content_id)
    }

    /// Start tracking `content_id`. Returns false if it was already tracked.
    pub fn track(&mut self, content_id: &str) -> bool {
        if self.get(content_id).is_some() {
            return false;
        }
        self.entries.push(TrackedContent::new(content_id));
        true
    }

    /// Fold one pass of monitoring results into the ledger.
    pub fn apply(&mut self, results: &[MonitoringResult]) -> LedgerSummary {
        let mut summary = LedgerSummary::default();

        for result in results {
            let Some(entry) = self
                .entries
                .iter_mut()
                .find(|e| e.content_id == result.content_id)
            else {
                debug!(content_id = %result.content_id, "result for untracked content ignored");
                continue;
            };
            summary.checked += 1;
            entry.last_checked_at = Some(result.checked_at);
            entry.last_error = result.error.clone();

            if let Some(metrics) = &result.metrics {
                entry.history.push(metrics.clone());
                let excess = entry.history.len().saturating_sub(self.history_limit);
                entry.history.drain(..excess);
            }

            if result.is_inconclusive() {
                summary.inconclusive += 1;
                continue;
            }

            match transition(entry.status, result.status) {
                Transition::Unchanged => continue,
                Transition::Alert => {
                    warn!(
                        content_id = %entry.content_id,
                        from = entry.status.label(),
                        to = result.status.label(),
                        "tracked content is no longer visible"
                    );
                    record_alert("alert");
                    summary.alerts.push(entry.content_id.clone());
                }
                Transition::Rediscovered => {
                    warn!(
                        content_id = %entry.content_id,
                        from = entry.status.label(),
                        "tracked content is visible again"
                    );
                    record_alert("rediscovered");
                    summary.rediscovered.push(entry.content_id.clone());
                }
                Transition::Changed => {
                    info!(
                        content_id = %entry.content_id,
                        from = entry.status.label(),
                        to = result.status.label(),
                        "tracked content status changed"
                    );
                    summary.changed += 1;
                }
            }
            entry.status = result.status;
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, status: ContentStatus, likes: Option<u64>) -> MonitoringResult {
        MonitoringResult {
            content_id: id.into(),
            status,
            metrics: likes.map(|like_count| MetricsSnapshot {
                content_id: id.into(),
                like_count,
                comment_count: 0,
                play_count: None,
                collected_at: Utc::now(),
            }),
            checked_at: Utc::now(),
            error: None,
        }
    }

    async fn ledger_with(ids: &[&str]) -> (tempfile::TempDir, Ledger) {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = Ledger::load(dir.path().join("tracked.json"), 3).await.unwrap();
        for id in ids {
            ledger.track(id);
        }
        (dir, ledger)
    }

    #[tokio::test]
    async fn track_is_idempotent() {
        let (_dir, mut ledger) = ledger_with(&["1"]).await;
        assert!(!ledger.track("1"));
        assert!(ledger.track("2"));
        assert_eq!(ledger.ids(), ["1", "2"]);
        assert_eq!(ledger.get("2").unwrap().status, ContentStatus::Active);
    }

    #[tokio::test]
    async fn deletion_alerts_once() {
        let (_dir, mut ledger) = ledger_with(&["1"]).await;

        let first = ledger.apply(&[result("1", ContentStatus::Deleted, None)]);
        assert_eq!(first.alerts, ["1"]);
        let second = ledger.apply(&[result("1", ContentStatus::Deleted, None)]);
        assert!(second.alerts.is_empty());
        assert_eq!(ledger.get("1").unwrap().status, ContentStatus::Deleted);
    }

    #[tokio::test]
    async fn reappearance_is_reported_separately() {
        let (_dir, mut ledger) = ledger_with(&["1"]).await;
        ledger.apply(&[result("1", ContentStatus::Private, None)]);

        let summary = ledger.apply(&[result("1", ContentStatus::Active, Some(10))]);
        assert!(summary.alerts.is_empty());
        assert_eq!(summary.rediscovered, ["1"]);
        assert_eq!(ledger.get("1").unwrap().status, ContentStatus::Active);
    }

    #[tokio::test]
    async fn unknown_keeps_last_known_status() {
        let (_dir, mut ledger) = ledger_with(&["1"]).await;
        ledger.apply(&[result("1", ContentStatus::Deleted, None)]);

        let mut flaky = result("1", ContentStatus::Unknown, None);
        flaky.error = Some("transient error: 502".into());
        let summary = ledger.apply(&[flaky]);

        assert_eq!(summary.inconclusive, 1);
        let entry = ledger.get("1").unwrap();
        assert_eq!(entry.status, ContentStatus::Deleted);
        assert_eq!(entry.last_error.as_deref(), Some("transient error: 502"));
    }

    #[tokio::test]
    async fn skipped_check_does_not_flip_deleted_content() {
        let (_dir, mut ledger) = ledger_with(&["1"]).await;
        assert_eq!(ledger.apply(&[result("1", ContentStatus::Deleted, None)]).alerts, ["1"]);

        let mut skipped = result("1", ContentStatus::Active, None);
        skipped.error = Some("no available account: all accounts suspended".into());
        let summary = ledger.apply(&[skipped]);
        assert!(summary.rediscovered.is_empty());
        assert_eq!(summary.inconclusive, 1);
        assert_eq!(ledger.get("1").unwrap().status, ContentStatus::Deleted);

        let again = ledger.apply(&[result("1", ContentStatus::Deleted, None)]);
        assert!(again.alerts.is_empty());
    }

    #[tokio::test]
    async fn history_is_bounded() {
        let (_dir, mut ledger) = ledger_with(&["1"]).await;
        for likes in 1..=5 {
            ledger.apply(&[result("1", ContentStatus::Active, Some(likes))]);
        }
        let likes: Vec<u64> = ledger
            .get("1")
            .unwrap()
            .history
            .iter()
            .map(|m| m.like_count)
            .collect();
        assert_eq!(likes, [3, 4, 5]);
    }

    #[tokio::test]
    async fn untracked_results_are_ignored() {
        let (_dir, mut ledger) = ledger_with(&["1"]).await;
        let summary = ledger.apply(&[result("9", ContentStatus::Deleted, None)]);
        assert_eq!(summary.checked, 0);
        assert!(ledger.get("9").is_none());
    }

    #[tokio::test]
    async fn save_and_reload() {
        let (dir, mut ledger) = ledger_with(&["1", "2"]).await;
        ledger.apply(&[result("2", ContentStatus::Deleted, None)]);
        ledger.save().await.unwrap();

        let reloaded = Ledger::load(dir.path().join("tracked.json"), 3).await.unwrap();
        assert_eq!(reloaded.entries(), ledger.entries());
        assert_eq!(reloaded.path(), ledger.path());
    }
}
