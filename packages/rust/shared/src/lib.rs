//! Shared types, error model, and configuration for channelwatch.
//!
//! This crate is the foundation depended on by all other channelwatch crates.
//! It provides:
//! - [`ChannelWatchError`] — the unified error type
//! - Domain types ([`ChannelItem`], [`LatestItem`], [`ArchivedItem`], [`SearchResult`])
//! - Configuration ([`AppConfig`], [`WatchConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ChannelsConfig, DEFAULT_USER_AGENT, HttpConfig, ScheduleConfig, SearchConfig,
    SearchProviderKind, SiteConfig, StorageConfig, WatchConfig, config_dir, config_file_path,
    database_path, init_config, interval_from_minutes, load_config, load_config_from,
    parse_channel_list, validate_api_key,
};
pub use error::{ChannelWatchError, Result};
pub use types::{
    ArchiveAction, ArchivedItem, ChannelItem, LatestItem, NO_SNIPPET, NO_TITLE, SearchResult,
};
