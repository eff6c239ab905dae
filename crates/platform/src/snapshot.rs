//! Normalized snapshots returned by the platform

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a profile is addressed on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum ProfileRef {
    Handle(String),
    Id(String),
}

impl std::fmt::Display for ProfileRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProfileRef::Handle(handle) => write!(f, "@{handle}"),
            ProfileRef::Id(id) => write!(f, "id:{id}"),
        }
    }
}

/// Profile data as reported by the platform at fetch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub external_id: String,
    pub handle: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub biography: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub follower_count: u64,
    pub following_count: u64,
    pub media_count: u64,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub is_business: bool,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub public_email: Option<String>,
    #[serde(default)]
    pub public_phone: Option<String>,
    #[serde(default)]
    pub external_url: Option<String>,
}

/// Media type codes used by the platform (1 = photo, 2 = video, 8 = album).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    Album,
    Other,
}

impl MediaKind {
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => MediaKind::Photo,
            2 => MediaKind::Video,
            8 => MediaKind::Album,
            _ => MediaKind::Other,
        }
    }
}

/// A single piece of published content and its engagement counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSnapshot {
    pub id: String,
    #[serde(default)]
    pub code: String,
    #[serde(default = "default_media_kind")]
    pub media_kind: MediaKind,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub comment_count: u64,
    #[serde(default)]
    pub play_count: Option<u64>,
    #[serde(default)]
    pub taken_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub owner_handle: Option<String>,
}

fn default_media_kind() -> MediaKind {
    MediaKind::Other
}

impl ContentSnapshot {
    /// Best available reference to the content's author.
    ///
    /// Prefers the owner id, then the owner handle. Content ids of the form
    /// `{content}_{owner}` carry the owner id as their second segment, which
    /// is used when the payload omits owner fields entirely.
    pub fn owner_ref(&self) -> Option<ProfileRef> {
        if let Some(id) = self.owner_id.as_deref().filter(|id| !id.is_empty()) {
            return Some(ProfileRef::Id(id.to_string()));
        }
        if let Some(handle) = self.owner_handle.as_deref().filter(|h| !h.is_empty()) {
            return Some(ProfileRef::Handle(handle.to_string()));
        }
        self.id
            .split_once('_')
            .map(|(_, owner)| owner)
            .filter(|owner| !owner.is_empty())
            .map(|owner| ProfileRef::Id(owner.to_string()))
    }
}

/// Minimal profile information for a follower sample entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowerSnapshot {
    pub external_id: String,
    pub handle: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_private: bool,
}
