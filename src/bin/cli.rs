//! Timetable Crawler CLI
//!
//! Local execution entry point: serve timetables, run sweeps by hand and
//! refresh the group association map.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use reqwest::Client;
use timetable_crawler::{
    error::{AppError, Result},
    models::{Config, GroupAssociations, TimetableKey},
    pipeline::{self, Coordinator},
    services::{GroupScraper, HttpFetcher},
    storage::{LocalStorage, TimetableStore},
    utils::http,
};

/// Timetable Crawler - university timetable cache and change watcher
#[derive(Parser, Debug)]
#[command(
    name = "timetable",
    version,
    about = "Fetches, caches and watches group timetables"
)]
struct Cli {
    /// Path to the directory containing config.toml
    #[arg(short, long, default_value = "storage")]
    config_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the refresh worker and the HTTP server
    #[cfg(feature = "server")]
    Serve,

    /// Run one refresh sweep over all known groups
    Sweep,

    /// Print one timetable
    Fetch {
        /// Group id
        #[arg(long, required_unless_present = "name", conflicts_with = "name")]
        group: Option<u32>,

        /// Group display name, resolved through the association map
        #[arg(long)]
        name: Option<String>,

        /// Period id (default: sweep.period from config)
        #[arg(long)]
        period: Option<u32>,

        /// Bypass both caches and fetch from upstream
        #[arg(long)]
        force: bool,
    },

    /// Show the group association map, scraping it if missing
    Groups {
        /// Re-scrape even if a cached map exists
        #[arg(long)]
        force: bool,
    },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Everything a subcommand may need, built from the configuration.
struct Context {
    config: Config,
    client: Client,
    storage: Arc<LocalStorage>,
}

impl Context {
    fn new(config: Config) -> Result<Self> {
        let client = http::create_async_client(&config.fetcher)?;
        let storage = Arc::new(LocalStorage::new(&config.storage.root_dir));
        Ok(Self {
            config,
            client,
            storage,
        })
    }

    fn coordinator(&self) -> Result<Arc<Coordinator>> {
        let fetcher = Arc::new(HttpFetcher::new(
            self.client.clone(),
            self.config.fetcher.base_url.clone(),
        ));
        let store = Arc::new(TimetableStore::new(self.storage.clone(), fetcher)?);
        let directory = Arc::from(pipeline::directory::from_config(&self.config.sweep));
        Ok(Arc::new(Coordinator::new(
            store,
            directory,
            self.config.sweep.clone(),
        )))
    }

    async fn associations(&self, force: bool) -> Result<GroupAssociations> {
        let scraper = GroupScraper::new(
            &self.client,
            &self.config.fetcher.base_url,
            self.config.groups.category_delay(),
        )?;
        let scraper = &scraper;
        pipeline::load_or_scrape_associations(self.storage.as_ref(), force, move || {
            scraper.scrape()
        })
        .await
    }
}

#[cfg(feature = "server")]
async fn serve(ctx: Context) -> Result<()> {
    use timetable_crawler::server::{AppState, create_router};

    let associations = ctx.associations(false).await?;
    let coordinator = ctx.coordinator()?;
    let worker = coordinator.spawn();

    let state = Arc::new(AppState {
        coordinator: Arc::clone(&coordinator),
        associations,
    });
    let listener = tokio::net::TcpListener::bind(ctx.config.server.bind.as_str()).await?;
    log::info!("Listening on {}", ctx.config.server.bind);

    let shutdown = {
        let coordinator = Arc::clone(&coordinator);
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {}", e);
            }
            log::info!("Shutting down...");
            coordinator.stop();
        }
    };
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    coordinator.stop();
    if let Err(e) = worker.await {
        log::error!("Timetable worker panicked: {}", e);
    }
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("Timetable Crawler starting...");

    let config_path = cli.config_dir.join("config.toml");
    let config = Config::load_or_default(&config_path);

    log::info!("Loaded configuration from {}", cli.config_dir.display());

    match cli.command {
        #[cfg(feature = "server")]
        Command::Serve => {
            config.validate()?;
            serve(Context::new(config)?).await?;
        }

        Command::Sweep => {
            config.validate()?;
            let ctx = Context::new(config)?;
            let summary = ctx.coordinator()?.sweep().await?;
            log::info!(
                "Checked {} groups: {} changed, {} failed",
                summary.groups,
                summary.changed,
                summary.failed
            );
        }

        Command::Fetch {
            group,
            name,
            period,
            force,
        } => {
            let period = period.unwrap_or(config.sweep.period);
            let ctx = Context::new(config)?;
            let group = match (group, name) {
                (Some(group), _) => group,
                (None, Some(name)) => ctx
                    .associations(false)
                    .await?
                    .find(&name)
                    .ok_or_else(|| AppError::validation(format!("unknown group '{name}'")))?,
                (None, None) => return Err(AppError::NoGroup),
            };
            let coordinator = ctx.coordinator()?;
            let lookup = coordinator
                .store()
                .get(TimetableKey::new(group, period), force)
                .await?;

            log::info!(
                "Timetable {}-{} ({} classes) served from {:?}",
                group,
                period,
                lookup.timetable.len(),
                lookup.source
            );
            println!("{}", serde_json::to_string_pretty(&*lookup.timetable)?);
        }

        Command::Groups { force } => {
            let ctx = Context::new(config)?;
            let associations = ctx.associations(force).await?;
            println!("{}", serde_json::to_string_pretty(&associations)?);
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
        }
    }

    log::info!("Done!");

    Ok(())
}
