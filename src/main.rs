//! # rustfaq CLI
//!
//! - `rustfaq serve` - Run the MCP operator server on stdio
//! - `rustfaq init` - Create the database schema
//! - `rustfaq seed <FILE>` - Import question/answer pairs from JSON
//! - `rustfaq ask <TEXT>` - Match one question and print the reply
//! - `rustfaq list` - List stored pairs
//! - `rustfaq eval <FILE>` - Score matching against labeled queries
//! - `rustfaq eval --loo` - Leave-one-out over the stored corpus

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rustfaq::admin::AdminService;
use rustfaq::cache::CacheManager;
use rustfaq::config::Config;
use rustfaq::db::SqliteStore;
use rustfaq::db::seed::load_seed_file;
use rustfaq::eval::{evaluate, evaluate_leave_one_out, load_labeled};
use rustfaq::matcher::MatchIndex;
use rustfaq::mcp::{McpContext, McpServer};
use rustfaq::query::{QueryContext, QueryEngine};
use rustfaq::store::QaStore;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "rustfaq")]
#[command(about = "Fuzzy FAQ matching over an admin-curated corpus")]
#[command(version)]
struct Cli {
    /// Path to config file (default: ./config.json)
    #[arg(short, long, global = true, default_value = "")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve MCP tools on stdio
    Serve,

    /// Create the database schema
    Init,

    /// Import a JSON array of {question, answer, category?}
    Seed {
        file: PathBuf,
    },

    /// Match a question and print the reply
    Ask {
        text: String,

        /// Use the mention threshold
        #[arg(long)]
        mention: bool,
    },

    /// List stored question/answer pairs
    List {
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },

    /// Evaluate matching against a labeled JSON file of {query, expected_id},
    /// or leave-one-out over the stored corpus with --loo
    Eval {
        #[arg(required_unless_present = "loo")]
        file: Option<PathBuf>,

        /// Hold out each stored question and match it against the rest
        #[arg(long, conflicts_with = "file")]
        loo: bool,

        /// Thresholds to report precision/recall for
        #[arg(long, value_delimiter = ',', default_value = "50,60,70,80")]
        thresholds: Vec<f64>,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout carries MCP JSON-RPC, logs go to stderr
    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn open_store(config: &Config) -> Result<Arc<SqliteStore>> {
    let store = SqliteStore::open(&config.db_path)
        .with_context(|| format!("Failed to open database: {}", config.db_path))?;
    Ok(Arc::new(store))
}

fn build_cache(config: &Config, store: Arc<SqliteStore>) -> Arc<CacheManager> {
    Arc::new(CacheManager::new(store, config.to_cache_config()))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    config.validate().context("Invalid configuration")?;

    match cli.command {
        Commands::Serve => serve(config).await,
        Commands::Init => {
            open_store(&config)?;
            info!("Database ready at {}", config.db_path);
            Ok(())
        }
        Commands::Seed { file } => {
            let items = load_seed_file(&file)?;
            let store = open_store(&config)?;
            let report = store.db()?.import_seed(&items)?;
            println!(
                "Seeded {}: {} inserted, {} updated",
                file.display(),
                report.inserted,
                report.updated
            );
            Ok(())
        }
        Commands::Ask { text, mention } => {
            let store = open_store(&config)?;
            let engine = QueryEngine::new(build_cache(&config, store), config.to_match_config());
            let context = if mention {
                QueryContext::Mention
            } else {
                QueryContext::Direct
            };
            let result = engine.answer(&text, context).await?;
            println!("{}", engine.reply_text(&result));
            println!(
                "(score {:.1}, threshold {:.1}, matched: {})",
                result.score,
                engine.config().threshold_for(context),
                result.matched
            );
            Ok(())
        }
        Commands::List { limit } => {
            let store = open_store(&config)?;
            let entries = store.db()?.list_qa_page(0, limit)?;
            let total = store.db()?.count_qa()?;
            for e in &entries {
                println!("#{} [{}] {}", e.id, e.category.as_deref().unwrap_or("-"), e.question);
                println!("    {}", e.answer);
            }
            println!("{} of {total} entries", entries.len());
            Ok(())
        }
        Commands::Eval {
            file,
            loo,
            thresholds,
        } => {
            let store = open_store(&config)?;
            let entries = store.list_all().context("Failed to read corpus")?;
            let report = match file {
                Some(file) if !loo => {
                    let labeled = load_labeled(&file)?;
                    evaluate(&MatchIndex::build(1, entries), &labeled, &thresholds)
                }
                _ => evaluate_leave_one_out(&entries, &thresholds),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting rustfaq MCP server...");

    let store = open_store(&config)?;
    let cache = build_cache(&config, store.clone());

    match cache.warm_up().await {
        Ok(index) => info!("Warm-up loaded {} entries", index.len()),
        Err(e) => warn!("Warm-up failed, first query will retry: {e}"),
    }
    let mut auto_refresh = cache.start_auto_refresh();

    let engine = Arc::new(QueryEngine::new(cache.clone(), config.to_match_config()));
    let admin = Arc::new(AdminService::new(store.clone(), store, cache.clone()));

    let server = McpServer::new(McpContext {
        engine,
        admin,
        cache,
    });
    let result = server.start().await;

    if let Some(handle) = auto_refresh.as_mut() {
        handle.stop().await;
    }
    result
}
