//! Structured reports returned by crawl operations

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Outcome of crawling one tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagReport {
    pub tag: String,
    pub category: String,
    /// Content items returned by the tag feed.
    pub items: usize,
    /// Distinct candidates whose profile was fetched.
    pub candidates: usize,
    pub new_count: usize,
    pub updated_count: usize,
    /// Candidates that failed the minimum requirements.
    pub filtered: usize,
    /// Candidates skipped because of a remote or snapshot error.
    pub failed: usize,
    /// Items whose author was already handled in this run.
    pub duplicates: usize,
    /// Items without any usable author reference.
    pub no_owner: usize,
}

impl TagReport {
    pub fn new(tag: &str, category: &str) -> Self {
        Self {
            tag: tag.to_string(),
            category: category.to_string(),
            ..Self::default()
        }
    }

    /// `(new, updated)`.
    pub fn counts(&self) -> (usize, usize) {
        (self.new_count, self.updated_count)
    }
}

/// Outcome of crawling one category's tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryReport {
    pub category: String,
    pub tags_processed: usize,
    pub new_count: usize,
    pub updated_count: usize,
    pub filtered: usize,
    pub failed: usize,
    /// Tags that failed and were skipped.
    pub errors: Vec<String>,
}

impl CategoryReport {
    pub fn new(category: &str) -> Self {
        Self {
            category: category.to_string(),
            ..Self::default()
        }
    }

    pub fn absorb(&mut self, tag: &TagReport) {
        self.tags_processed += 1;
        self.new_count += tag.new_count;
        self.updated_count += tag.updated_count;
        self.filtered += tag.filtered;
        self.failed += tag.failed;
    }

    pub fn counts(&self) -> (usize, usize) {
        (self.new_count, self.updated_count)
    }
}

/// Outcome of a full discovery run across categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub categories_processed: usize,
    pub total_new: usize,
    pub total_updated: usize,
    pub total_filtered: usize,
    pub total_failed: usize,
    pub categories: Vec<CategoryReport>,
    pub errors: Vec<String>,
    /// Set when the run stopped early (pool exhaustion, catalog failure,
    /// cancellation). Work committed before that point stands.
    pub aborted: Option<String>,
}

impl RunReport {
    pub fn start() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            completed_at: None,
            categories_processed: 0,
            total_new: 0,
            total_updated: 0,
            total_filtered: 0,
            total_failed: 0,
            categories: Vec::new(),
            errors: Vec::new(),
            aborted: None,
        }
    }

    pub fn absorb(&mut self, category: CategoryReport) {
        self.categories_processed += 1;
        self.total_new += category.new_count;
        self.total_updated += category.updated_count;
        self.total_filtered += category.filtered;
        self.total_failed += category.failed;
        self.errors.extend(
            category
                .errors
                .iter()
                .map(|e| format!("{}: {e}", category.category)),
        );
        self.categories.push(category);
    }

    pub fn finish(mut self) -> Self {
        self.completed_at = Some(Utc::now());
        self
    }
}

/// Outcome of a staleness refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub max_age_days: u32,
    /// Distinct entities selected for refresh.
    pub selected: usize,
    pub updated: usize,
    pub failed: usize,
    /// Updated entities that no longer meet the minimum requirements.
    pub disqualified: usize,
    pub aborted: Option<String>,
}

impl RefreshReport {
    pub fn start(max_age_days: u32) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            completed_at: None,
            max_age_days,
            selected: 0,
            updated: 0,
            failed: 0,
            disqualified: 0,
            aborted: None,
        }
    }

    pub fn finish(mut self) -> Self {
        self.completed_at = Some(Utc::now());
        self
    }
}
