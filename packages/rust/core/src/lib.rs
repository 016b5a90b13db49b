//! Change detection and enrichment pipeline for channelwatch.
//!
//! This crate ties together page extraction, search enrichment, and state
//! persistence into the per-channel update flow and the multi-channel sweep.

pub mod enrichment;
pub mod extractor;
pub mod pipeline;
pub mod tracker;

pub use enrichment::SearchEnricher;
pub use extractor::ChannelExtractor;
pub use pipeline::{ChannelReport, SweepReport, Watcher};
pub use tracker::{StateTracker, UpdateOutcome};
