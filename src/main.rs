use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod analysis;
mod db;
mod models;
mod report;
mod scoring;
mod simulate;
mod source;
mod synthetic;

#[derive(Parser)]
#[command(name = "student-analytics")]
#[command(about = "Student performance analytics and what-if simulation", long_about = None)]
struct Cli {
    /// Postgres connection string for the student store
    #[arg(long, global = true, env = "DATABASE_URL")]
    database_url: Option<String>,
    /// Upper bound on store access before falling back to synthetic data
    #[arg(
        long,
        global = true,
        env = "STUDENT_ANALYTICS_CONNECT_TIMEOUT_MS",
        default_value_t = 2000
    )]
    connect_timeout_ms: u64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Read students from a CSV file instead of the store. An unreadable file is
    /// an error; a file with no usable rows falls back to synthetic data
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Size of the synthetic fallback batch
    #[arg(long, default_value_t = synthetic::DEFAULT_COUNT)]
    synthetic_count: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a synthetic student batch into the store
    Seed {
        #[arg(long, default_value_t = synthetic::DEFAULT_COUNT)]
        count: usize,
    },
    /// Import students from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print the population statistics report as JSON
    Analyze {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Re-score one student under hypothetical metric changes
    Simulate {
        /// JSON request: {"current": {...}, "changes": {...}}
        #[arg(long)]
        input: String,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("STUDENT_ANALYTICS_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn pool(cli: &Cli) -> anyhow::Result<sqlx::PgPool> {
    let database_url = cli
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set to a production Postgres instance")?;
    db::connect(database_url, Duration::from_millis(cli.connect_timeout_ms)).await
}

async fn run_analysis(
    cli: &Cli,
    args: &SourceArgs,
) -> anyhow::Result<(models::AnalyticsReport, String)> {
    let options = source::SourceOptions {
        csv: args.csv.clone(),
        database_url: cli.database_url.clone(),
        connect_timeout: Duration::from_millis(cli.connect_timeout_ms),
        synthetic_count: args.synthetic_count,
    };
    let acquired = source::acquire(&options).await?;
    let mut report = analysis::analyze(&acquired.records, acquired.is_mock())?;
    let mut rejected = acquired.rejected;
    rejected.append(&mut report.rejected);
    report.rejected = rejected;
    Ok((report, acquired.origin.to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match &cli.command {
        Commands::InitDb => {
            db::init_db(&pool(&cli).await?).await?;
            println!("Schema ready.");
        }
        Commands::Seed { count } => {
            let records = synthetic::generate(*count, synthetic::DEFAULT_SEED)?;
            let stored = db::seed(&pool(&cli).await?, &records).await?;
            println!("Stored {stored} synthetic students.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool(&cli).await?, csv).await?;
            println!("Imported {inserted} students from {}.", csv.display());
        }
        Commands::Analyze { source } => {
            let (report, _) = run_analysis(&cli, source).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Report { source, out } => {
            let (report, origin) = run_analysis(&cli, source).await?;
            std::fs::write(out, report::build_report(&origin, &report))
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Simulate { input } => match simulate::simulate_request(input) {
            Ok(response) => println!("{}", serde_json::to_string_pretty(&response)?),
            Err(error) => {
                println!("{error}");
                std::process::exit(1);
            }
        },
    }

    Ok(())
}
