//! Minimum-quality filter for candidate profiles
//!
//! Discovery and refresh both qualify profiles through `MinimumRequirements`
//! so the two can never disagree about what belongs in the catalog. A
//! rejection is a filtered-out result, not a failure: it is logged and
//! counted separately from errors.

use platform::ProfileSnapshot;
use serde::Deserialize;

/// Thresholds a profile must meet to be cataloged.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MinimumRequirements {
    pub min_followers: u64,
    pub min_media: u64,
}

impl Default for MinimumRequirements {
    fn default() -> Self {
        Self {
            min_followers: 1_000,
            min_media: 10,
        }
    }
}

/// Why a profile was filtered out.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("profile is private")]
    Private,

    #[error("{count} followers, need {min}")]
    TooFewFollowers { count: u64, min: u64 },

    #[error("{count} posts, need {min}")]
    TooFewMedia { count: u64, min: u64 },
}

impl Rejection {
    /// Stable label for metrics and structured logs.
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::Private => "private",
            Rejection::TooFewFollowers { .. } => "followers",
            Rejection::TooFewMedia { .. } => "media",
        }
    }
}

impl MinimumRequirements {
    pub fn evaluate(&self, profile: &ProfileSnapshot) -> Result<(), Rejection> {
        if profile.follower_count < self.min_followers {
            return Err(Rejection::TooFewFollowers {
                count: profile.follower_count,
                min: self.min_followers,
            });
        }
        if profile.media_count < self.min_media {
            return Err(Rejection::TooFewMedia {
                count: profile.media_count,
                min: self.min_media,
            });
        }
        if profile.is_private {
            return Err(Rejection::Private);
        }
        Ok(())
    }

    pub fn meets(&self, profile: &ProfileSnapshot) -> bool {
        self.evaluate(profile).is_ok()
    }
}
