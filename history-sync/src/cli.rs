///
/// This module implements the CLI for history-sync: command parsing, argument validation and
/// wiring concrete clients and stores into the core pipeline.
///
/// All pipeline logic (fetching, dedup, media, import) lives in the [`history-sync-core`] crate.
/// This module is CLI glue only.
///
/// ## Commands
/// - `sync`: reconcile the history of an account group into the local file store
/// - `history`: fetch and print a platform's history as JSON, optionally filtered
/// - `serve`: run the HTTP surface
///
/// ## How To Use
/// - From the shell: `history-sync --help`.
/// - From tests: call [`run`] with a constructed [`Cli`].
///
/// [`history-sync-core`]: ../../history-sync-core/
use crate::load_config::{load_config, AppConfig};
use crate::provider::ProviderClient;
use crate::server::{self, matches_lookup, AppState};
use crate::store::FileStore;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use history_sync_core::contract::HistoryFilter;
use history_sync_core::history;
use history_sync_core::media::HttpMediaFetcher;
use history_sync_core::model::{HistoryStatus, Platform};
use history_sync_core::synchronise::{synchronise_group, GroupSyncOptions, SyncDeps};
use std::path::PathBuf;
use std::sync::Arc;

/// CLI for history-sync: import previously published social posts into a local post store.
#[derive(Parser)]
#[clap(
    name = "history-sync",
    version,
    about = "Import previously published social posts and their media into a local post store"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Synchronise the post history of an account group into the local store
    Sync {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Account group id from the config
        #[clap(long)]
        group: String,
        /// Restrict to these platforms (repeatable); defaults to every platform of the group
        #[clap(long = "platform")]
        platforms: Vec<Platform>,
        /// Fetch even when local coverage reaches the configured threshold
        #[clap(long)]
        force: bool,
        /// Report what would be imported without writing anything
        #[clap(long)]
        dry_run: bool,
    },
    /// Fetch a platform's history and print it as JSON
    History(HistoryArgs),
    /// Run the HTTP server
    Serve {
        #[clap(long)]
        config: PathBuf,
        /// Overrides `server.bind` from the config
        #[clap(long)]
        bind: Option<String>,
    },
}

#[derive(Args)]
pub struct HistoryArgs {
    #[clap(long)]
    pub config: PathBuf,
    #[clap(long, conflicts_with = "profile_key", required_unless_present = "profile_key")]
    pub group: Option<String>,
    #[clap(long)]
    pub profile_key: Option<String>,
    #[clap(long)]
    pub platform: Platform,
    #[clap(long)]
    pub limit: Option<u32>,
    #[clap(long)]
    pub last_days: Option<u32>,
    #[clap(long)]
    pub status: Option<HistoryStatus>,
    /// Keep only records with this provider or destination post id
    #[clap(long)]
    pub post_id: Option<String>,
    /// Keep only records with this reference id
    #[clap(long)]
    pub ref_id: Option<String>,
    /// Print the unvalidated provider records instead
    #[clap(long)]
    pub raw: bool,
}

/// Concrete provider client, media fetcher and file store for `config`.
pub fn build_deps(config: &AppConfig) -> Result<SyncDeps> {
    let provider = ProviderClient::from_config(&config.provider)
        .map_err(|e| anyhow::anyhow!("Failed to build provider client: {e}"))?;
    let media = HttpMediaFetcher::from_config(&config.sync.media)
        .map_err(|e| anyhow::anyhow!("Failed to build media client: {e}"))?;
    let store = Arc::new(
        FileStore::open(&config.store.data_dir)
            .map_err(|e| anyhow::anyhow!("Failed to open store {:?}: {e}", config.store.data_dir))?,
    );
    Ok(SyncDeps {
        provider: Arc::new(provider),
        posts: store.clone(),
        accounts: store.clone(),
        media: Arc::new(media),
        blobs: store,
    })
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sync {
            config,
            group,
            platforms,
            force,
            dry_run,
        } => {
            let config = load_config(config)?;
            config.trace_loaded();
            let group = config
                .group(&group)
                .ok_or_else(|| anyhow::anyhow!("Unknown account group '{group}'"))?;
            let deps = build_deps(&config)?;
            tracing::info!(command = "sync", group = %group.id, dry_run, "Starting synchronisation process");

            let selected = (!platforms.is_empty()).then_some(platforms.as_slice());
            let report = synchronise_group(
                &deps,
                &config.sync,
                group,
                selected,
                GroupSyncOptions { force, dry_run },
            )
            .await;
            println!("{}", serde_json::to_string_pretty(&report)?);

            if report.success() {
                tracing::info!(command = "sync", updated = report.updated, "Synchronisation complete");
                Ok(())
            } else {
                tracing::error!(command = "sync", failed = report.failed, errors = ?report.errors, "Synchronisation failed");
                Err(anyhow::anyhow!(
                    "{} platform(s) failed to synchronise",
                    report.failed
                ))
            }
        }
        Commands::History(args) => {
            let config = load_config(&args.config)?;
            let profile_key = match (&args.group, &args.profile_key) {
                (Some(group), _) => config
                    .group(group)
                    .map(|g| g.profile_key.clone())
                    .ok_or_else(|| anyhow::anyhow!("Unknown account group '{group}'"))?,
                (None, Some(key)) => key.clone(),
                (None, None) => anyhow::bail!("--group or --profile-key is required"),
            };
            let deps = build_deps(&config)?;
            let filter = HistoryFilter {
                limit: args.limit,
                last_days: args.last_days,
                status: args.status,
            };
            tracing::info!(command = "history", platform = %args.platform, "Fetching history");

            let raw = history::fetch_raw_history(
                deps.provider.as_ref(),
                args.platform,
                &profile_key,
                &filter,
            )
            .await?;
            let output = if args.raw {
                serde_json::to_string_pretty(&raw)?
            } else {
                let matches: Vec<_> = history::validate_records(args.platform, raw)
                    .into_iter()
                    .filter(|p| matches_lookup(p, args.post_id.as_deref(), args.ref_id.as_deref()))
                    .collect();
                serde_json::to_string_pretty(&matches)?
            };
            println!("{output}");
            Ok(())
        }
        Commands::Serve { config, bind } => {
            let config = load_config(config)?;
            config.trace_loaded();
            let deps = build_deps(&config)?;
            let addr = bind.unwrap_or_else(|| config.server.bind.clone());
            let state = AppState {
                config: Arc::new(config),
                deps,
            };
            server::serve(state, &addr).await
        }
    }
}
