//! Normalized entity snapshots

use chrono::{DateTime, Utc};
use platform::{ContentSnapshot, ProfileSnapshot};
use serde::{Deserialize, Serialize};

use crate::trust::TrustAnalysis;

/// Audience size bucket, derived from the follower count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Nano,
    Micro,
    Macro,
    Mega,
}

impl Tier {
    pub fn from_follower_count(followers: u64) -> Self {
        match followers {
            0..10_000 => Tier::Nano,
            10_000..100_000 => Tier::Micro,
            100_000..1_000_000 => Tier::Macro,
            _ => Tier::Mega,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tier::Nano => "nano",
            Tier::Micro => "micro",
            Tier::Macro => "macro",
            Tier::Mega => "mega",
        }
    }
}

/// Engagement averaged over a profile's recent content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementStats {
    pub avg_likes: u64,
    pub avg_comments: u64,
    /// `(avg_likes + avg_comments) / followers * 100`, two decimals.
    pub engagement_rate: f64,
    pub posts_analyzed: usize,
}

impl EngagementStats {
    pub fn from_content(posts: &[ContentSnapshot], followers: u64) -> Self {
        if posts.is_empty() {
            return Self {
                avg_likes: 0,
                avg_comments: 0,
                engagement_rate: 0.0,
                posts_analyzed: 0,
            };
        }

        let n = posts.len() as u64;
        let avg_likes = posts.iter().map(|p| p.like_count).sum::<u64>() / n;
        let avg_comments = posts.iter().map(|p| p.comment_count).sum::<u64>() / n;
        let engagement_rate = if followers > 0 {
            let raw = (avg_likes + avg_comments) as f64 / followers as f64 * 100.0;
            (raw * 100.0).round() / 100.0
        } else {
            0.0
        };

        Self {
            avg_likes,
            avg_comments,
            engagement_rate,
            posts_analyzed: posts.len(),
        }
    }
}

/// A fetched profile that cannot be turned into a catalog record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    #[error("profile snapshot has no external id")]
    MissingExternalId,

    #[error("profile {0} has no handle")]
    MissingHandle(String),
}

/// A complete, validated profile snapshot ready to be written to the catalog.
///
/// Produced by discovery and refresh, consumed by `EntityCatalog`. It either
/// exists in full or not at all; there is no partially filled variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredEntity {
    pub external_id: String,
    /// Always lowercase.
    pub handle: String,
    pub full_name: String,
    pub biography: String,
    pub avatar_url: Option<String>,
    pub external_url: Option<String>,
    pub follower_count: u64,
    pub following_count: u64,
    pub media_count: u64,
    pub is_verified: bool,
    pub is_business: bool,
    pub is_private: bool,
    pub public_email: Option<String>,
    pub public_phone: Option<String>,
    /// The platform's own category label, if the profile sets one.
    pub category_hint: Option<String>,
    /// Catalog category the discovering tag belongs to.
    pub category: Option<String>,
    /// Tag the entity was found through.
    pub source_tag: Option<String>,
    pub tier: Tier,
    pub engagement: Option<EngagementStats>,
    #[serde(default)]
    pub trust: Option<TrustAnalysis>,
    pub fetched_at: DateTime<Utc>,
}

impl DiscoveredEntity {
    pub fn from_profile(
        profile: &ProfileSnapshot,
        category: Option<&str>,
        source_tag: Option<&str>,
        fetched_at: DateTime<Utc>,
    ) -> Result<Self, SnapshotError> {
        if profile.external_id.trim().is_empty() {
            return Err(SnapshotError::MissingExternalId);
        }
        if profile.handle.trim().is_empty() {
            return Err(SnapshotError::MissingHandle(profile.external_id.clone()));
        }

        Ok(Self {
            external_id: profile.external_id.clone(),
            handle: profile.handle.to_lowercase(),
            full_name: profile.full_name.clone(),
            biography: profile.biography.clone(),
            avatar_url: profile.avatar_url.clone(),
            external_url: profile.external_url.clone(),
            follower_count: profile.follower_count,
            following_count: profile.following_count,
            media_count: profile.media_count,
            is_verified: profile.is_verified,
            is_business: profile.is_business,
            is_private: profile.is_private,
            public_email: profile.public_email.clone(),
            public_phone: profile.public_phone.clone(),
            category_hint: profile.category.clone(),
            category: category.map(str::to_string),
            source_tag: source_tag.map(str::to_string),
            tier: Tier::from_follower_count(profile.follower_count),
            engagement: None,
            trust: None,
            fetched_at,
        })
    }

    pub fn with_engagement(mut self, engagement: EngagementStats) -> Self {
        self.engagement = Some(engagement);
        self
    }

    pub fn with_trust(mut self, trust: TrustAnalysis) -> Self {
        self.trust = Some(trust);
        self
    }
}
