//! Multi-channel sweep and the periodic watch loop.
//!
//! [`Watcher`] is built once per process and holds every collaborator the
//! pipeline needs. Channels are processed strictly one after another and a
//! failure in one channel never stops the sweep.

use std::future::Future;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use channelwatch_crawler::HttpFetcher;
use channelwatch_shared::{ChannelWatchError, Result, WatchConfig};
use channelwatch_storage::Storage;

use crate::enrichment::SearchEnricher;
use crate::extractor::ChannelExtractor;
use crate::tracker::{StateTracker, UpdateOutcome};

// ---------------------------------------------------------------------------
// Sweep report
// ---------------------------------------------------------------------------

/// Outcome of one channel within a sweep.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelReport {
    pub channel_id: String,
    pub outcome: UpdateOutcome,
    /// Persistence error message, when the update could not be recorded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of one pass over every configured channel.
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub run_id: String,
    pub channels: Vec<ChannelReport>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl SweepReport {
    fn count(&self, label: &str) -> usize {
        self.channels
            .iter()
            .filter(|c| c.error.is_none() && c.outcome.label() == label)
            .count()
    }

    pub fn first_seen(&self) -> usize {
        self.count("first_seen")
    }

    pub fn changed(&self) -> usize {
        self.count("changed")
    }

    pub fn unchanged(&self) -> usize {
        self.count("unchanged")
    }

    /// Channels that failed extraction or persistence.
    pub fn failed(&self) -> usize {
        self.channels
            .iter()
            .filter(|c| c.error.is_some() || c.outcome == UpdateOutcome::Failed)
            .count()
    }

    pub fn has_updates(&self) -> bool {
        self.channels
            .iter()
            .any(|c| c.error.is_none() && c.outcome.is_update())
    }
}

// ---------------------------------------------------------------------------
// Watcher
// ---------------------------------------------------------------------------

/// Explicit pipeline context: storage, HTTP, search provider and config.
pub struct Watcher {
    tracker: StateTracker,
    config: WatchConfig,
}

impl Watcher {
    /// Wire up every collaborator from the runtime config.
    pub fn new(config: WatchConfig, storage: Storage) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config.user_agent, config.http_timeout)?;
        let enricher = SearchEnricher::from_config(&config, fetcher.clone())?;
        let extractor = ChannelExtractor::new(fetcher, enricher, config.site_base_url.clone());
        Ok(Self::from_parts(StateTracker::new(extractor, storage), config))
    }

    pub fn from_parts(tracker: StateTracker, config: WatchConfig) -> Self {
        Self { tracker, config }
    }

    pub fn tracker(&self) -> &StateTracker {
        &self.tracker
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Update every channel in order and report per-channel outcomes.
    #[instrument(skip_all, fields(channels = channels.len()))]
    pub async fn sweep(&self, channels: &[String]) -> SweepReport {
        let start = Instant::now();
        let run_id = Uuid::now_v7().to_string();
        let mut reports = Vec::new();

        info!(%run_id, "starting update check");

        let ids: Vec<&str> = channels
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .collect();

        if ids.is_empty() {
            error!("no channel ids configured");
        }

        for channel_id in ids {
            info!(%channel_id, "checking channel");
            let report = match self.tracker.update(channel_id).await {
                Ok(outcome) => ChannelReport {
                    channel_id: channel_id.to_string(),
                    outcome,
                    error: None,
                },
                Err(e) => {
                    error!(%channel_id, error = %e, "failed to record channel update");
                    ChannelReport {
                        channel_id: channel_id.to_string(),
                        outcome: UpdateOutcome::Failed,
                        error: Some(e.to_string()),
                    }
                }
            };
            reports.push(report);
        }

        let report = SweepReport {
            run_id,
            channels: reports,
            elapsed: start.elapsed(),
        };

        if !report.has_updates() {
            info!("no new items found in this check");
        }
        info!(
            first_seen = report.first_seen(),
            changed = report.changed(),
            unchanged = report.unchanged(),
            failed = report.failed(),
            elapsed_ms = report.elapsed.as_millis(),
            "update check complete"
        );

        report
    }

    /// Sweep the configured channels now and then once per interval until
    /// `shutdown` resolves.
    ///
    /// A sweep always runs to completion; ticks missed while it runs are
    /// delayed rather than replayed.
    pub async fn watch<F>(&self, shutdown: F, mut on_report: impl FnMut(&SweepReport)) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        if self.config.interval.is_zero() {
            return Err(ChannelWatchError::validation(
                "check interval must be at least one minute",
            ));
        }

        info!(
            interval_secs = self.config.interval.as_secs(),
            channels = self.config.channels.len(),
            "watcher starting"
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    warn!("shutdown requested, stopping watcher");
                    break;
                }
                _ = ticker.tick() => {
                    let report = self.sweep(&self.config.channels).await;
                    on_report(&report);
                }
            }
        }

        Ok(())
    }
}
