//! Fit Battler CLI - Migrations, seeding and poll management.
//!
//! # Usage
//!
//! ```bash
//! # Run PostgreSQL migrations
//! fb-cli migrate
//!
//! # Load seed data (catalog, polls, saved fits) into the configured store
//! fb-cli seed ./data/seed
//!
//! # Publish a poll
//! fb-cli --user alice poll create -d "Brunch fit?" --fit-a i1,i2,i3 --fit-b i4,i5,i6
//!
//! # Vote on the newest open poll you have not voted on
//! fb-cli --user bob poll next
//! fb-cli --user bob poll vote <POLL_ID> a
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Load catalog, polls and saved fits from JSON or YAML
//! - `poll` - Create, inspect, vote on and close polls
//! - `save` - Toggle and list saved fits
//! - `comment` - Comment on fits
//! - `catalog` - Search the item catalog
//!
//! The store is chosen by `FIT_BATTLER_STORE` (`json` by default, writing to
//! `FIT_BATTLER_DATA_DIR`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fit_battler_core::{Choice, FitId, PollId, UserId};
use fit_battler_engine::BattlerConfig;

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "fb-cli")]
#[command(author, version, about = "Fit Battler CLI tools")]
struct Cli {
    /// Acting user ID
    #[arg(long, global = true, env = "FIT_BATTLER_USER", default_value = "user_local")]
    user: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Load seed data into the configured store
    Seed {
        /// Seed directory (catalog / polls / saved files) or a single seed file
        path: PathBuf,
    },
    /// Publish, inspect and vote on polls
    Poll {
        #[command(subcommand)]
        action: PollAction,
    },
    /// Manage saved fits
    Save {
        #[command(subcommand)]
        action: SaveAction,
    },
    /// Comment on fits
    Comment {
        #[command(subcommand)]
        action: CommentAction,
    },
    /// Browse the item catalog
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
}

#[derive(Subcommand)]
enum PollAction {
    /// Publish a new poll
    Create {
        /// What the author is asking voters
        #[arg(short, long)]
        description: String,

        /// Comma-separated item IDs for fit A
        #[arg(long, value_delimiter = ',', required = true)]
        fit_a: Vec<String>,

        /// Comma-separated item IDs for fit B
        #[arg(long, value_delimiter = ',', required = true)]
        fit_b: Vec<String>,

        /// Display name for fit A
        #[arg(long, default_value = "")]
        name_a: String,

        /// Display name for fit B
        #[arg(long, default_value = "")]
        name_b: String,
    },
    /// Show a poll with its items resolved against the catalog
    Show { poll_id: PollId },
    /// List the most recent polls
    Recent {
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show the newest open poll the user has not voted on
    Next {
        /// Publish a random battle from the catalog when none is left
        #[arg(long)]
        synthesize: bool,
    },
    /// Vote for fit A or B
    Vote { poll_id: PollId, choice: Choice },
    /// Close a poll to further votes
    Close { poll_id: PollId },
}

#[derive(Subcommand)]
enum SaveAction {
    /// Save a fit, or remove it if already saved
    Toggle { poll_id: PollId, fit_id: FitId },
    /// List the user's saved fits, newest first
    List,
}

#[derive(Subcommand)]
enum CommentAction {
    /// Comment on a fit
    Add { fit_id: FitId, body: String },
    /// List comments on a fit, oldest first
    List { fit_id: FitId },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// Search items, falling back to popular items
    Search {
        query: String,

        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &BattlerConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fit_battler=info,fb_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match BattlerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing();
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let sentry_guard = init_sentry(&config);
    init_tracing();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli, &config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        drop(sentry_guard);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &BattlerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let user = UserId::new(cli.user);

    match cli.command {
        Commands::Migrate => commands::migrate::run(config).await?,
        Commands::Seed { path } => commands::seed::run(config, &path, &user).await?,
        Commands::Poll { action } => match action {
            PollAction::Create {
                description,
                fit_a,
                fit_b,
                name_a,
                name_b,
            } => {
                let draft = commands::poll::draft(description, (name_a, fit_a), (name_b, fit_b));
                commands::poll::create(config, &user, &draft).await?;
            }
            PollAction::Show { poll_id } => commands::poll::show(config, poll_id).await?,
            PollAction::Recent { limit } => commands::poll::recent(config, limit).await?,
            PollAction::Next { synthesize } => {
                commands::poll::next(config, &user, synthesize).await?;
            }
            PollAction::Vote { poll_id, choice } => {
                commands::poll::vote(config, &user, poll_id, choice).await?;
            }
            PollAction::Close { poll_id } => commands::poll::close(config, poll_id).await?,
        },
        Commands::Save { action } => match action {
            SaveAction::Toggle { poll_id, fit_id } => {
                commands::save::toggle(config, &user, poll_id, fit_id).await?;
            }
            SaveAction::List => commands::save::list(config, &user).await?,
        },
        Commands::Comment { action } => match action {
            CommentAction::Add { fit_id, body } => {
                commands::comment::add(config, &user, fit_id, &body).await?;
            }
            CommentAction::List { fit_id } => commands::comment::list(config, fit_id).await?,
        },
        Commands::Catalog { action } => match action {
            CatalogAction::Search { query, limit } => {
                commands::catalog::search(config, &query, limit).await?;
            }
        },
    }
    Ok(())
}
