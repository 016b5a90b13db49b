//! Application configuration for channelwatch.
//!
//! User config lives at `~/.channelwatch/channelwatch.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ChannelWatchError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "channelwatch.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".channelwatch";

/// Browser-like identification header sent with every request.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

// ---------------------------------------------------------------------------
// Config structs (matching channelwatch.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Tracked channels.
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Polling schedule.
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Search enrichment settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// HTTP client settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Channel site settings.
    #[serde(default)]
    pub site: SiteConfig,

    /// Database location.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// `[channels]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelsConfig {
    /// Channel identifiers to check on every sweep.
    #[serde(default)]
    pub ids: Vec<String>,
}

/// `[schedule]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Minutes between sweeps in `watch` mode.
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
        }
    }
}

fn default_interval_minutes() -> u64 {
    15
}

/// Which external search provider backs enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchProviderKind {
    /// DuckDuckGo's HTML endpoint (no key required).
    #[default]
    DuckDuckGo,
    /// Serper.dev Google search API (key required).
    Serper,
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Provider backend.
    #[serde(default)]
    pub provider: SearchProviderKind,

    /// Maximum organic results per enrichment call.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Pause between consecutive result page fetches.
    #[serde(default = "default_politeness_delay")]
    pub politeness_delay_ms: u64,

    /// Name of the env var holding the provider API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Override for the provider's base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: SearchProviderKind::default(),
            max_results: default_max_results(),
            politeness_delay_ms: default_politeness_delay(),
            api_key_env: default_api_key_env(),
            endpoint: None,
        }
    }
}

fn default_max_results() -> usize {
    5
}
fn default_politeness_delay() -> u64 {
    2000
}
fn default_api_key_env() -> String {
    "SERPER_API_KEY".into()
}

/// `[http]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Identification header string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.into()
}

/// `[site]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Base URL that channel listing and item pages hang off.
    #[serde(default = "default_site_base_url")]
    pub base_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_site_base_url(),
        }
    }
}

fn default_site_base_url() -> String {
    "https://www.youtube.com".into()
}

/// `[storage]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file. Defaults to `~/.channelwatch/channelwatch.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<String>,
}

// ---------------------------------------------------------------------------
// Watch config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime configuration consumed by the tracking pipeline.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Channel identifiers to sweep.
    pub channels: Vec<String>,
    /// Time between sweeps.
    pub interval: Duration,
    /// Maximum search results per enrichment call.
    pub max_results: usize,
    /// Pause between result page fetches.
    pub politeness_delay: Duration,
    /// HTTP timeout for every request.
    pub http_timeout: Duration,
    /// Identification header string.
    pub user_agent: String,
    /// Channel site base URL.
    pub site_base_url: String,
    /// Search provider backend.
    pub provider: SearchProviderKind,
    /// Provider base URL override.
    pub provider_endpoint: Option<String>,
    /// Env var holding the provider API key.
    pub api_key_env: String,
}

impl TryFrom<&AppConfig> for WatchConfig {
    type Error = ChannelWatchError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            channels: config.channels.ids.clone(),
            interval: interval_from_minutes(config.schedule.interval_minutes)?,
            max_results: config.search.max_results,
            politeness_delay: Duration::from_millis(config.search.politeness_delay_ms),
            http_timeout: Duration::from_secs(config.http.timeout_secs),
            user_agent: config.http.user_agent.clone(),
            site_base_url: config.site.base_url.clone(),
            provider: config.search.provider,
            provider_endpoint: config.search.endpoint.clone(),
            api_key_env: config.search.api_key_env.clone(),
        })
    }
}

/// Convert a sweep interval in minutes, rejecting values that overflow.
pub fn interval_from_minutes(minutes: u64) -> Result<Duration> {
    minutes
        .checked_mul(60)
        .map(Duration::from_secs)
        .ok_or_else(|| {
            ChannelWatchError::config(format!("interval of {minutes} minutes is out of range"))
        })
}

/// Split a comma-separated channel list, trimming blanks.
pub fn parse_channel_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.channelwatch/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ChannelWatchError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.channelwatch/channelwatch.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Resolve the database path: explicit config value, else `~/.channelwatch/channelwatch.db`.
pub fn database_path(config: &AppConfig) -> Result<PathBuf> {
    match &config.storage.database_path {
        Some(path) => Ok(expand_home(path)),
        None => Ok(config_dir()?.join("channelwatch.db")),
    }
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ChannelWatchError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ChannelWatchError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ChannelWatchError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ChannelWatchError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ChannelWatchError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the provider API key env var is set when the provider needs one.
pub fn validate_api_key(config: &WatchConfig) -> Result<()> {
    if config.provider != SearchProviderKind::Serper {
        return Ok(());
    }
    let var_name = &config.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(ChannelWatchError::config(format!(
            "Serper API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://serper.dev"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("interval_minutes"));
        assert!(toml_str.contains("SERPER_API_KEY"));
        assert!(toml_str.contains("duckduckgo"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.schedule.interval_minutes, 15);
        assert_eq!(parsed.search.max_results, 5);
        assert_eq!(parsed.search.politeness_delay_ms, 2000);
    }

    #[test]
    fn config_with_channels_and_serper() {
        let toml_str = r#"
[channels]
ids = ["UC_one", "UC_two"]

[search]
provider = "serper"
max_results = 3
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.channels.ids, vec!["UC_one", "UC_two"]);
        assert_eq!(config.search.provider, SearchProviderKind::Serper);
        assert_eq!(config.search.max_results, 3);
        assert_eq!(config.http.timeout_secs, 10);
    }

    #[test]
    fn watch_config_from_app_config() {
        let app = AppConfig::default();
        let watch = WatchConfig::try_from(&app).unwrap();
        assert_eq!(watch.interval, Duration::from_secs(15 * 60));
        assert_eq!(watch.politeness_delay, Duration::from_secs(2));
        assert_eq!(watch.http_timeout, Duration::from_secs(10));
        assert_eq!(watch.user_agent, DEFAULT_USER_AGENT);
        assert!(watch.channels.is_empty());
    }

    #[test]
    fn oversized_interval_is_a_config_error() {
        let mut app = AppConfig::default();
        app.schedule.interval_minutes = u64::MAX;

        let err = WatchConfig::try_from(&app).unwrap_err();
        assert!(matches!(err, ChannelWatchError::Config { .. }));
        assert!(err.to_string().contains("out of range"));
        assert_eq!(interval_from_minutes(2).unwrap(), Duration::from_secs(120));
    }

    #[test]
    fn channel_list_parsing_skips_blanks() {
        assert_eq!(parse_channel_list(" UC1, ,UC2 ,"), vec!["UC1", "UC2"]);
        assert!(parse_channel_list("").is_empty());
    }

    #[test]
    fn api_key_only_required_for_serper() {
        let mut watch = WatchConfig::try_from(&AppConfig::default()).unwrap();
        watch.api_key_env = "CW_TEST_NONEXISTENT_KEY_12345".into();
        assert!(validate_api_key(&watch).is_ok());

        watch.provider = SearchProviderKind::Serper;
        let result = validate_api_key(&watch);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }

    #[test]
    fn explicit_database_path_wins() {
        let mut config = AppConfig::default();
        config.storage.database_path = Some("/tmp/cw/test.db".into());
        assert_eq!(database_path(&config).unwrap(), PathBuf::from("/tmp/cw/test.db"));
    }
}
