//! Core domain types for tracked channels and their items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder title for a search result whose provider supplied none.
pub const NO_TITLE: &str = "No title available";

/// Placeholder snippet for a search result whose provider supplied none.
pub const NO_SNIPPET: &str = "No description available";

// ---------------------------------------------------------------------------
// SearchResult
// ---------------------------------------------------------------------------

/// One enriched web search result, embedded in an item's payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub snippet: String,
    /// Plain text scraped from the result page (bounded length, may be empty).
    pub context: String,
}

// ---------------------------------------------------------------------------
// ChannelItem
// ---------------------------------------------------------------------------

/// The payload describing one published item of a channel.
///
/// This is what extraction produces, what `latest_items` stores, and what
/// `archived_items` snapshots when an item is superseded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelItem {
    pub channel_id: String,
    pub item_id: String,
    pub title: String,
    pub url: String,
    pub thumbnail_url: String,
    /// Possibly empty; already truncated to the description word limit.
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub search_results: Vec<SearchResult>,
}

// ---------------------------------------------------------------------------
// LatestItem / ArchivedItem
// ---------------------------------------------------------------------------

/// The currently known latest item of a channel (one row per channel).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestItem {
    #[serde(flatten)]
    pub item: ChannelItem,
    pub updated_at: DateTime<Utc>,
}

/// Why an item left the "latest" slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveAction {
    Replaced,
    Removed,
}

impl ArchiveAction {
    /// Value stored in the `action` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Replaced => "replaced",
            Self::Removed => "removed",
        }
    }
}

impl std::fmt::Display for ArchiveAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ArchiveAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "replaced" => Ok(Self::Replaced),
            "removed" => Ok(Self::Removed),
            other => Err(format!("unknown archive action '{other}'")),
        }
    }
}

/// Immutable snapshot of an item that used to be a channel's latest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedItem {
    /// Surrogate key assigned by the database.
    pub id: i64,
    #[serde(flatten)]
    pub item: ChannelItem,
    pub archived_at: DateTime<Utc>,
    pub action: ArchiveAction,
}
