// Contest ledger entry point.
//
// Startup sequence:
// 1. Parse command line
// 2. Load config
// 3. Build the run context (data root, day)
// 4. Initialize tracing (log to file under the data root)
// 5. Open database
// 6. Run the requested step

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::info;

use ledger_app::config;
use ledger_app::context::{self, RunContext};
use ledger_app::db;
use ledger_app::pipeline::Pipeline;
use ledger_app::scraper::DumpScraper;
use ledger_app::store::FileStore;
use ledger_core::lineup::LineupParser;
use ledger_core::results::ResultRecordBuilder;

#[derive(Parser)]
#[command(name = "ledger")]
#[command(about = "Normalize and correlate daily fantasy contest data")]
struct Cli {
    /// Day to process (dd_mm_YYYY); defaults to today
    #[arg(long, value_parser = parse_day)]
    date: Option<NaiveDate>,

    /// Directory holding config/ and defaults/; defaults to the current directory
    #[arg(long)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add new lobby rows to the day's listing
    Contests,
    /// Build the day's contest snapshot and plan salary downloads
    Salaries,
    /// Fold every day's snapshot into the history table and SQLite
    History,
    /// Clean results exports (the previous day unless --date is given)
    Results,
    /// Save entrant badges and record players
    Entrants,
    /// Run every step for the day
    Daily,
    /// Write datasets/players.csv from the database
    ExportPlayers,
}

fn parse_day(raw: &str) -> Result<NaiveDate, String> {
    context::parse_day_label(raw).ok_or_else(|| format!("`{raw}` is not a dd_mm_YYYY date"))
}

fn main() -> anyhow::Result<()> {
    // 1. Parse command line
    let cli = Cli::parse();

    // 2. Load config
    let config = match &cli.config_dir {
        Some(dir) => config::load_config_at(dir),
        None => config::load_config(),
    }
    .context("failed to load configuration")?;

    // 3. Build the run context
    let ctx = RunContext::from_config(&config, cli.date).context("failed to resolve data root")?;

    // 4. Initialize tracing
    init_tracing(&ctx.logs_dir(), &config.logging.filter)?;
    info!(
        "Contest ledger starting: sport={}, root={}, day={}",
        config.scrape.sport,
        ctx.root.display(),
        context::day_label(ctx.today)
    );

    // 5. Open database
    let db_path = config.database_path()?;
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let db_path = db_path.to_string_lossy().into_owned();
    let db = db::Database::open(&db_path).context("failed to open database")?;
    info!("Database opened at {db_path}");

    // 6. Run the requested step
    let today = ctx.today;
    let results_day = cli.date.unwrap_or_else(|| ctx.yesterday());
    let pipeline = Pipeline::new(
        FileStore::new(ctx.clone()),
        DumpScraper::new(ctx.inbox.clone()),
        db,
        ResultRecordBuilder::new(LineupParser::new(config.lineup.positions.iter().cloned())),
    );

    match cli.command {
        Commands::Contests => {
            pipeline.refresh_listings(today)?;
        }
        Commands::Salaries => {
            pipeline.refresh_contests(today)?;
            let plan = pipeline.plan_salaries(today)?;
            for id in &plan.pending {
                println!("{id}");
            }
        }
        Commands::History => {
            pipeline.update_history()?;
            pipeline.persist_contests(today)?;
        }
        Commands::Results => {
            pipeline.process_results(results_day)?;
        }
        Commands::Entrants => {
            pipeline.record_entrants(today)?;
        }
        Commands::Daily => {
            pipeline.daily()?;
        }
        Commands::ExportPlayers => {
            pipeline.export_players()?;
        }
    }

    info!("Contest ledger finished");
    Ok(())
}

/// Initialize tracing to log to `<log_dir>/ledger.log`.
fn init_tracing(log_dir: &Path, default_filter: &str) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("ledger.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
