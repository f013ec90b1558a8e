// Survivor pool assistant entry point.
//
// Startup sequence:
// 1. Parse the command line
// 2. Initialize tracing (log to file, stdout is the command's output)
// 3. Load config (copying defaults on first run)
// 4. Open the database
// 5. Run the requested command

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use lms_app::app::{App, PoolStatus, RecommendOptions};
use lms_app::config;
use lms_app::db::Database;
use lms_app::odds_client::TheOddsApiClient;
use lms_core::{Strategy, Week};

#[derive(Debug, Parser)]
#[command(author, version, about = "Last-man-standing NFL pick recommender", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Recommend a pick for the first week without one
    Recommend {
        /// Weeks to look ahead, current week included
        #[arg(long)]
        horizon: Option<Week>,
        /// `lookahead` or `greedy`
        #[arg(long)]
        strategy: Option<Strategy>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record the team picked for a week
    Pick { week: Week, team: String },
    /// Clear the pick for a week
    Unpick { week: Week },
    /// Show the pick history
    Picks,
    /// Clear every pick of the pool
    Reset,
    /// Replace the picks with a saved-picks JSON file
    ImportPicks { file: PathBuf },
    /// Fetch moneylines and store them as one week of probabilities
    FetchOdds {
        #[arg(long)]
        week: Week,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing()?;
    info!("lms starting up");

    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: pool={} ({}), {} weeks, horizon {}, {}",
        config.pool.name,
        config.pool.id,
        config.pool.total_weeks,
        config.pool.horizon_weeks,
        config.pool.strategy
    );

    if let Some(parent) = Path::new(&config.db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let db = Database::open(&config.db_path).context("failed to open database")?;
    info!("Database opened at {}", config.db_path);

    let base_dir = std::env::current_dir()?;
    let app = App::new(config, db, base_dir);

    let result = run(&app, cli.command.unwrap_or(Command::Picks)).await;
    if let Err(e) = &result {
        error!("command failed: {:#}", e);
    }
    result
}

async fn run(app: &App, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Recommend {
            horizon,
            strategy,
            json,
        } => {
            let recommendation = app.recommend(RecommendOptions { horizon, strategy })?;
            if json {
                println!("{}", serde_json::to_string_pretty(&recommendation)?);
            } else {
                println!("{recommendation}");
            }
        }
        Command::Pick { week, team } => {
            let recorded = app.record_pick(week, &team)?;
            println!("Week {}: {}", recorded.week, recorded.team);
            if !recorded.recognized {
                println!("warning: '{}' has no win probability data", recorded.team);
            }
        }
        Command::Unpick { week } => {
            if app.clear_pick(week)? {
                println!("Week {week} cleared");
            } else {
                println!("Week {week} had no pick");
            }
        }
        Command::Picks => print_status(&app.status()?),
        Command::Reset => {
            let removed = app.reset()?;
            println!("Removed {removed} picks");
        }
        Command::ImportPicks { file } => {
            let written = app.import_picks(&file)?;
            println!("Imported {written} picks from {}", file.display());
        }
        Command::FetchOdds { week } => {
            let provider = TheOddsApiClient::from_config(&app.config)?;
            let fetched = app.fetch_odds(&provider, week).await?;
            println!(
                "Week {}: stored {} teams from {} events ({}, {})",
                fetched.week,
                fetched.probabilities.len(),
                fetched.events.len(),
                fetched.bookmaker,
                fetched.requested_at.to_rfc3339()
            );
        }
    }
    Ok(())
}

fn print_status(status: &PoolStatus) {
    println!("{}", status.pool_name);
    for (i, slot) in status.history.slots().iter().enumerate() {
        println!("  Week {:>2}: {}", i + 1, slot.as_deref().unwrap_or("-"));
    }
    match status.current_week {
        Some(week) => println!("Current week: {week}"),
        None => println!("All weeks have picks"),
    }
    for stored in &status.fetched_weeks {
        println!(
            "Fetched odds: Week {} ({} teams, {})",
            stored.week, stored.teams, stored.fetched_at
        );
    }
    if let Some(last) = &status.last_recommendation {
        match serde_json::from_value::<LastRecommendation>(last.clone()) {
            Ok(LastRecommendation::Pick { week, team, probability }) => println!(
                "Last recommendation: Week {week}: {team} ({:.1}%)",
                probability * 100.0
            ),
            Ok(LastRecommendation::Message { message }) => {
                println!("Last recommendation: {message}")
            }
            Err(_) => {}
        }
    }
}

/// Stored shape of a `Recommendation`.
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum LastRecommendation {
    Pick {
        week: Week,
        team: String,
        probability: f64,
    },
    Message {
        message: String,
    },
}

/// Initialize tracing to log to a file (stdout carries command output).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("lms.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("lms_app=info,lms_core=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}

