//! Per-channel state transitions.
//!
//! Compares a freshly extracted item against the stored latest item and
//! records the outcome. The archive-then-overwrite step for a changed item is
//! one storage transaction, so a failure leaves the previous row intact.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};

use channelwatch_shared::{ChannelItem, Result};
use channelwatch_storage::{Storage, Transition};

use crate::extractor::ChannelExtractor;

/// Result of one channel update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UpdateOutcome {
    /// No prior record; the item was stored.
    FirstSeen,
    /// The stored item is still the newest one.
    Unchanged,
    /// A new item replaced `previous_item_id`, which was archived.
    Changed { previous_item_id: String },
    /// Extraction failed; nothing was written.
    Failed,
}

impl UpdateOutcome {
    /// Whether this outcome wrote a new latest item.
    pub fn is_update(&self) -> bool {
        matches!(self, Self::FirstSeen | Self::Changed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::FirstSeen => "first_seen",
            Self::Unchanged => "unchanged",
            Self::Changed { .. } => "changed",
            Self::Failed => "failed",
        }
    }
}

/// Drives extraction and persists the resulting transition.
pub struct StateTracker {
    extractor: ChannelExtractor,
    storage: Storage,
}

impl StateTracker {
    pub fn new(extractor: ChannelExtractor, storage: Storage) -> Self {
        Self { extractor, storage }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Extract the newest item of `channel_id` and record it.
    ///
    /// Returns `Err` only when persistence fails.
    #[instrument(skip_all, fields(channel_id = %channel_id))]
    pub async fn update(&self, channel_id: &str) -> Result<UpdateOutcome> {
        let Some(item) = self.extractor.fetch_latest(channel_id).await else {
            warn!("could not fetch item data for channel");
            return Ok(UpdateOutcome::Failed);
        };
        self.apply(&item).await
    }

    /// Record an already extracted item.
    pub async fn apply(&self, item: &ChannelItem) -> Result<UpdateOutcome> {
        let transition = self.storage.record_latest(item, Utc::now()).await?;

        let outcome = match transition {
            Transition::Inserted => {
                info!(item_id = %item.item_id, title = %item.title, "added first item for channel");
                UpdateOutcome::FirstSeen
            }
            Transition::Unchanged => {
                info!(item_id = %item.item_id, "no new item for channel");
                UpdateOutcome::Unchanged
            }
            Transition::Replaced { previous } => {
                info!(
                    item_id = %item.item_id,
                    previous_item_id = %previous.item.item_id,
                    title = %item.title,
                    "new item found for channel"
                );
                UpdateOutcome::Changed {
                    previous_item_id: previous.item.item_id,
                }
            }
        };

        Ok(outcome)
    }
}
