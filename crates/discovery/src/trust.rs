//! Audience trust scoring
//!
//! Combines engagement, the share of suspicious accounts in a follower sample
//! and the verified/business flags into a 0-100 score.

use platform::FollowerSnapshot;
use serde::{Deserialize, Serialize};

use crate::entity::DiscoveredEntity;

/// Followers sampled per entity for trust scoring.
pub const DEFAULT_FOLLOWER_SAMPLE: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    Verified,
    Normal,
    Suspicious,
}

impl TrustLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            TrustLevel::Verified
        } else if score >= 60.0 {
            TrustLevel::Normal
        } else {
            TrustLevel::Suspicious
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TrustLevel::Verified => "verified",
            TrustLevel::Normal => "normal",
            TrustLevel::Suspicious => "suspicious",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustAnalysis {
    pub trust_score: f64,
    pub level: TrustLevel,
    pub engagement_score: f64,
    pub follower_quality_score: f64,
    /// Percentage of the sample flagged as suspicious.
    pub suspicious_follower_ratio: f64,
    /// Zero when no sample could be taken; quality then defaults to 100.
    pub followers_sampled: usize,
}

impl TrustAnalysis {
    pub fn evaluate(entity: &DiscoveredEntity, followers: &[FollowerSnapshot]) -> Self {
        let engagement_rate = entity
            .engagement
            .as_ref()
            .map_or(0.0, |e| e.engagement_rate);
        let engagement_score = (engagement_rate * 20.0).min(100.0);

        let suspicious = followers.iter().filter(|f| is_suspicious_follower(f)).count();
        let ratio = if followers.is_empty() {
            0.0
        } else {
            suspicious as f64 / followers.len() as f64
        };
        let follower_quality_score = (100.0 - ratio * 100.0).max(0.0);

        let flag = |set: bool| if set { 100.0 } else { 50.0 };
        let trust_score = engagement_score * 0.4
            + follower_quality_score * 0.4
            + flag(entity.is_verified) * 0.1
            + flag(entity.is_business) * 0.1;

        Self {
            trust_score: round2(trust_score),
            level: TrustLevel::from_score(trust_score),
            engagement_score: round2(engagement_score),
            follower_quality_score: round2(follower_quality_score),
            suspicious_follower_ratio: round2(ratio * 100.0),
            followers_sampled: followers.len(),
        }
    }
}

/// Likely bot: no avatar, or a handle longer than five characters that is
/// mostly digits.
pub fn is_suspicious_follower(follower: &FollowerSnapshot) -> bool {
    if follower.avatar_url.as_deref().is_none_or(str::is_empty) {
        return true;
    }
    let len = follower.handle.chars().count();
    let digits = follower.handle.chars().filter(char::is_ascii_digit).count();
    len > 5 && digits * 2 > len
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
