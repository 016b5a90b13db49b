//! CLI command definitions, routing, and tracing setup.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::info;

use channelwatch_core::{SearchEnricher, SweepReport, Watcher};
use channelwatch_crawler::HttpFetcher;
use channelwatch_shared::{
    AppConfig, SearchResult, WatchConfig, database_path, init_config, interval_from_minutes,
    load_config, load_config_from, parse_channel_list, validate_api_key,
};
use channelwatch_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// channelwatch: track channels for new items and enrich them with web context.
#[derive(Parser)]
#[command(
    name = "channelwatch",
    version,
    about = "Track channels for newly published items and enrich them with web search context.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Load configuration from this file instead of ~/.channelwatch/channelwatch.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Channel selection shared by the sweep commands.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct ChannelArgs {
    /// Channel ids to track (repeatable or comma-separated). Overrides the config file.
    #[arg(
        long = "channel",
        value_delimiter = ',',
        env = "CHANNELWATCH_CHANNEL_IDS"
    )]
    pub channels: Vec<String>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Check all channels now, then again every interval until interrupted.
    Watch {
        #[command(flatten)]
        channels: ChannelArgs,

        /// Minutes between checks (overrides the config file).
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Run a single check over all channels and print a summary.
    Check {
        #[command(flatten)]
        channels: ChannelArgs,

        /// Print the sweep report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Run a web search with page context extraction (diagnostic).
    Search {
        /// Free-text search query.
        #[arg(short, long)]
        query: String,

        /// Number of results to request.
        #[arg(short = 'n', long, default_value = "5")]
        results: usize,

        /// Write the full result set as JSON to this file.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write this run's log to a file.
        #[arg(long)]
        log_file: Option<PathBuf>,
    },

    /// Show the latest known item of every channel.
    Status,

    /// Show archived items of a channel, newest first.
    History {
        /// Channel id.
        #[arg(long)]
        channel: String,
    },

    /// Stop tracking a channel's latest item, archiving it as removed.
    Forget {
        /// Channel id.
        #[arg(long)]
        channel: String,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) -> Result<()> {
    use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = match cli.verbose {
        0 => "channelwatch=info",
        1 => "channelwatch=debug",
        _ => "channelwatch=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let console = match cli.log_format {
        LogFormat::Text => fmt::layer().with_target(false).boxed(),
        LogFormat::Json => fmt::layer().json().boxed(),
    };

    let file = match cli.log_file() {
        Some(path) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(log_file_writer(path)?),
        ),
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file)
        .init();
    Ok(())
}

impl Cli {
    /// Log file requested by the subcommand, if any.
    fn log_file(&self) -> Option<&Path> {
        match &self.command {
            Command::Search { log_file, .. } => log_file.as_deref(),
            _ => None,
        }
    }
}

/// Create (or truncate) the log file, creating parent directories as needed.
fn log_file_writer(path: &Path) -> Result<Mutex<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .wrap_err_with(|| format!("failed to create {}", parent.display()))?;
    }
    let file = File::create(path)
        .wrap_err_with(|| format!("failed to open log file {}", path.display()))?;
    Ok(Mutex::new(file))
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Watch { channels, interval } => {
            cmd_watch(config_path, &channels.channels, interval).await
        }
        Command::Check { channels, json } => cmd_check(config_path, &channels.channels, json).await,
        Command::Search {
            query,
            results,
            output,
            ..
        } => cmd_search(config_path, &query, results, output.as_deref()).await,
        Command::Status => cmd_status(config_path).await,
        Command::History { channel } => cmd_history(config_path, &channel).await,
        Command::Forget { channel } => cmd_forget(config_path, &channel).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

// ---------------------------------------------------------------------------
// Config resolution
// ---------------------------------------------------------------------------

fn load_app_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

/// Merge CLI overrides into the runtime config.
fn resolve_watch_config(
    app: &AppConfig,
    channels: &[String],
    interval_minutes: Option<u64>,
) -> Result<WatchConfig> {
    let mut config = WatchConfig::try_from(app)?;

    let overrides = parse_channel_list(&channels.join(","));
    if !overrides.is_empty() {
        config.channels = overrides;
    }

    if let Some(minutes) = interval_minutes {
        config.interval = interval_from_minutes(minutes)?;
    }
    if config.interval.is_zero() {
        return Err(eyre!("check interval must be at least one minute"));
    }

    validate_api_key(&config)?;
    Ok(config)
}

async fn open_watcher(app: &AppConfig, config: WatchConfig) -> Result<Watcher> {
    if config.channels.is_empty() {
        return Err(eyre!(
            "no channels configured. Pass --channel, set CHANNELWATCH_CHANNEL_IDS, \
             or add ids under [channels] in the config file"
        ));
    }

    let db_path = database_path(app)?;
    let storage = Storage::open(&db_path).await?;
    info!(db = %db_path.display(), channels = config.channels.len(), "storage ready");
    Ok(Watcher::new(config, storage)?)
}

async fn open_readonly_storage(app: &AppConfig) -> Result<Storage> {
    let db_path = database_path(app)?;
    Storage::open_readonly(&db_path)
        .await
        .map_err(|e| eyre!("{e}. Run `channelwatch check` first to create it."))
}

// ---------------------------------------------------------------------------
// Sweep commands
// ---------------------------------------------------------------------------

async fn cmd_watch(
    config_path: Option<&Path>,
    channels: &[String],
    interval: Option<u64>,
) -> Result<()> {
    let app = load_app_config(config_path)?;
    let config = resolve_watch_config(&app, channels, interval)?;
    let minutes = config.interval.as_secs() / 60;
    let watcher = open_watcher(&app, config).await?;

    info!(minutes, "channelwatch starting");

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    watcher
        .watch(shutdown, |report| {
            info!(
                first_seen = report.first_seen(),
                changed = report.changed(),
                failed = report.failed(),
                "check finished"
            );
        })
        .await?;

    Ok(())
}

async fn cmd_check(config_path: Option<&Path>, channels: &[String], json: bool) -> Result<()> {
    let app = load_app_config(config_path)?;
    let config = resolve_watch_config(&app, channels, None)?;
    let watcher = open_watcher(&app, config).await?;

    let spinner = spinner("Checking channels");
    let report = watcher.sweep(&watcher.config().channels).await;
    spinner.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_sweep(&report);
    }

    Ok(())
}

fn print_sweep(report: &SweepReport) {
    println!();
    for channel in &report.channels {
        match &channel.error {
            Some(err) => println!("  {:<28} error: {err}", channel.channel_id),
            None => println!("  {:<28} {}", channel.channel_id, channel.outcome.label()),
        }
    }
    println!();
    println!("  First seen: {}", report.first_seen());
    println!("  Changed:    {}", report.changed());
    println!("  Unchanged:  {}", report.unchanged());
    println!("  Failed:     {}", report.failed());
    println!("  Time:       {:.1}s", report.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// Diagnostic search
// ---------------------------------------------------------------------------

/// JSON document written by `search --output`.
#[derive(Serialize)]
struct SearchDump<'a> {
    query: &'a str,
    timestamp: String,
    num_results_requested: usize,
    num_results_found: usize,
    results: &'a [SearchResult],
}

async fn cmd_search(
    config_path: Option<&Path>,
    query: &str,
    results: usize,
    output: Option<&Path>,
) -> Result<()> {
    let app = load_app_config(config_path)?;
    let config = resolve_watch_config(&app, &[], None)?;

    let fetcher = HttpFetcher::new(&config.user_agent, config.http_timeout)?;
    let enricher = SearchEnricher::from_config(&config, fetcher)?;

    info!(query, results, "running diagnostic search");

    let spinner = spinner(&format!("Searching for: {query}"));
    let found = enricher.search_with_limit(query, results).await;
    spinner.finish_and_clear();

    println!();
    println!("  Query:   {query}");
    println!("  Results: {} of {results} requested", found.len());

    for (i, result) in found.iter().enumerate() {
        println!();
        println!("  [{}] {}", i + 1, result.title);
        println!("      URL:     {}", result.url);
        println!("      Snippet: {}", result.snippet);
        println!("      Context: {} chars", result.context.chars().count());
        if !result.context.is_empty() {
            let preview: String = result.context.chars().take(200).collect();
            println!("      Preview: {preview}...");
        }
    }
    println!();

    if let Some(path) = output {
        write_search_dump(path, query, results, &found)?;
        println!("  Results written to {}", path.display());
    }

    Ok(())
}

fn write_search_dump(
    path: &Path,
    query: &str,
    requested: usize,
    results: &[SearchResult],
) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let dump = SearchDump {
        query,
        timestamp: Utc::now().to_rfc3339(),
        num_results_requested: requested,
        num_results_found: results.len(),
        results,
    };
    std::fs::write(path, serde_json::to_string_pretty(&dump)?)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Inspection commands
// ---------------------------------------------------------------------------

async fn cmd_status(config_path: Option<&Path>) -> Result<()> {
    let app = load_app_config(config_path)?;
    let storage = open_readonly_storage(&app).await?;

    let latest = storage.list_latest().await?;
    if latest.is_empty() {
        println!("No items recorded yet.");
        return Ok(());
    }

    println!();
    for entry in &latest {
        println!("  {}", entry.item.channel_id);
        println!("      Item:    {} ({})", entry.item.title, entry.item.item_id);
        println!("      URL:     {}", entry.item.url);
        println!("      Updated: {}", entry.updated_at.to_rfc3339());
        println!("      Search:  {} results", entry.item.search_results.len());
    }
    println!();
    println!("  Archived items: {}", storage.count_archived().await?);
    println!();

    Ok(())
}

async fn cmd_history(config_path: Option<&Path>, channel: &str) -> Result<()> {
    let app = load_app_config(config_path)?;
    let storage = open_readonly_storage(&app).await?;

    let archived = storage.list_archived(channel).await?;
    if archived.is_empty() {
        println!("No archived items for {channel}.");
        return Ok(());
    }

    println!();
    for entry in &archived {
        println!(
            "  {}  {:<8}  {} ({})",
            entry.archived_at.to_rfc3339(),
            entry.action.as_str(),
            entry.item.title,
            entry.item.item_id
        );
    }
    println!();

    Ok(())
}

async fn cmd_forget(config_path: Option<&Path>, channel: &str) -> Result<()> {
    let app = load_app_config(config_path)?;
    let storage = Storage::open(&database_path(&app)?).await?;

    match storage.remove_latest(channel, Utc::now()).await? {
        Some(removed) => {
            info!(channel, item_id = %removed.item.item_id, "latest item archived as removed");
            println!(
                "Archived {} ({}) for {channel}.",
                removed.item.title, removed.item.item_id
            );
        }
        None => println!("Nothing recorded for {channel}."),
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Config commands
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = load_app_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        spinner.set_style(
            style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}
