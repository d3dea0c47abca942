//! Ditorja CLI
//!
//! Runs the article query functions against the hosted store, or against a
//! local JSON fixture with `--fixture`, and prints the results as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use ditorja::{
    ArticleService, ArticleStatus, QueryOutcome,
    backend::{ArticleBackend, MemoryBackend},
    config,
    error::{AppError, Result},
};
use serde::Serialize;

/// Ditorja - Albanian news article retrieval
#[derive(Parser, Debug)]
#[command(name = "ditorja", version, about = "Query Ditorja news articles")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Serve rows from a JSON array file instead of the hosted store
    #[arg(long)]
    fixture: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Newest articles
    Feed,

    /// Homepage feed split into featured, editors' picks and latest
    Home,

    /// Newest articles with a placement status
    Status {
        /// featured, normal or editors
        status: String,

        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// A single article
    Get {
        #[arg(long, conflicts_with = "slug", required_unless_present = "slug")]
        id: Option<String>,

        #[arg(long)]
        slug: Option<String>,
    },

    /// Articles in a category
    Category {
        /// Category slug (partial match)
        slug: String,
    },

    /// Full-text search over titles and summaries
    Search { query: String },

    /// Articles sharing hashtags with the article at `slug`
    Related {
        slug: String,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Distinct categories
    Categories,

    /// Number of articles
    Count {
        #[arg(long)]
        category: Option<String>,
    },

    /// Validate configuration
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Print a query result as JSON. `Empty` prints `empty`; `Failed` becomes
/// the command's error.
fn emit<T: Serialize>(outcome: QueryOutcome<T>, empty: serde_json::Value) -> Result<()> {
    let json = match outcome {
        QueryOutcome::Found(value) => serde_json::to_string_pretty(&value)?,
        QueryOutcome::Empty => serde_json::to_string_pretty(&empty)?,
        QueryOutcome::Failed(reason) => return Err(AppError::query(reason)),
    };
    println!("{json}");
    Ok(())
}

async fn build_service(cli: &Cli) -> Result<ArticleService> {
    match &cli.fixture {
        Some(path) => {
            let config = config::load_config(&cli.config)?;
            let backend: Arc<dyn ArticleBackend> =
                Arc::new(MemoryBackend::from_json_file(&config.backend.table, path).await?);
            Ok(ArticleService::with_backend(backend, &config))
        }
        None => {
            let config = config::load_validated(&cli.config)?;
            log::info!("Using row store at {}", config.backend.url);
            ArticleService::from_config(&config)
        }
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Command::Validate = cli.command {
        log::info!("Validating configuration...");
        let config = config::load_config(&cli.config)?;
        if let Err(e) = config.validate() {
            log::error!("Config validation failed: {}", e);
            return Err(e);
        }
        log::info!("✓ Config OK (table {})", config.backend.table);
        return Ok(());
    }

    let service = build_service(&cli).await?;
    let none = serde_json::Value::Null;
    let empty = serde_json::json!([]);

    match cli.command {
        Command::Feed => emit(service.list_all().await, empty)?,

        Command::Home => emit(service.home_feed().await, none)?,

        Command::Status { status, limit } => {
            let status = ArticleStatus::parse(&status).ok_or_else(|| {
                AppError::validation(format!(
                    "unknown status '{status}', expected one of: {}",
                    ArticleStatus::ALL.map(|s| s.as_str()).join(", ")
                ))
            })?;
            emit(service.list_by_status(status, limit).await, empty)?
        }

        Command::Get { id, slug } => {
            let outcome = match (id, slug) {
                (Some(id), _) => service.get_by_id(&id).await,
                (None, Some(slug)) => service.get_by_slug(&slug).await,
                (None, None) => return Err(AppError::validation("--id or --slug is required")),
            };
            emit(outcome, none)?
        }

        Command::Category { slug } => {
            let name = service.category_display_name(&slug).await;
            log::info!("Category: {}", name);
            emit(service.list_by_category(&slug).await, empty)?
        }

        Command::Search { query } => emit(service.search(&query).await, empty)?,

        Command::Related { slug, limit } => match service.get_by_slug(&slug).await {
            QueryOutcome::Found(article) => emit(service.related(&article, limit).await, empty)?,
            QueryOutcome::Empty => {
                log::warn!("No article with slug '{}'", slug);
                emit::<()>(QueryOutcome::Empty, empty)?
            }
            QueryOutcome::Failed(reason) => return Err(AppError::query(reason)),
        },

        Command::Categories => emit(service.list_categories().await, empty)?,

        Command::Count { category } => {
            let outcome = match category {
                Some(slug) => service.count_by_category(&slug).await,
                None => service.count_all().await,
            };
            emit(outcome, serde_json::json!(0))?
        }

        Command::Validate => {}
    }

    Ok(())
}
