//! Command line interface for the property localisation engine.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use proploc_core::model::{GeoPoint, SearchZone, VisualSignature};
use proploc_engine::{MoreOutcome, SearchBatch, SearchEngine};
use proploc_providers::Collaborators;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "proploc")]
#[command(about = "Image-driven property localisation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start a new localisation search and print the first batch.
    Search {
        #[arg(long)]
        lat: f64,
        #[arg(long)]
        lng: f64,
        #[arg(long, default_value_t = 500.0)]
        radius_m: f64,
        #[arg(long)]
        postal_code: Option<String>,
        #[arg(long)]
        city: Option<String>,
        /// Path to the visual signature JSON produced by the image analyzer.
        #[arg(long)]
        signature: PathBuf,
        /// Free-text context from the user (neighbourhood, sea view, ...).
        #[arg(long)]
        hints: Option<String>,
    },
    /// Ask an existing request for another batch of candidates.
    More {
        id: Uuid,
    },
    /// Show a request's status and its run history.
    Show {
        id: Uuid,
    },
    /// Apply pending database migrations.
    Migrate,
}

type CliEngine = SearchEngine<
    proploc_providers::GeocodingClient,
    proploc_providers::PoolDetectionClient,
    proploc_providers::ImageryClient,
    proploc_db::PgRequestRepository,
>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = proploc_core::load_app_config()?;
    let pool_config = proploc_db::PoolConfig::from_app_config(&config);
    let pool = proploc_db::connect_pool(&config.database_url, pool_config)
        .await
        .context("connecting to the database")?;

    if matches!(cli.command, Commands::Migrate) {
        proploc_db::run_migrations(&pool).await?;
        println!("migrations applied");
        return Ok(());
    }

    let collaborators = Collaborators::from_config(&config)?;
    let engine = SearchEngine::new(
        collaborators.geocoder,
        collaborators.detector,
        collaborators.imagery,
        proploc_db::PgRequestRepository::new(pool.clone()),
        proploc_core::SearchPolicy::default(),
    );

    match cli.command {
        Commands::Search {
            lat,
            lng,
            radius_m,
            postal_code,
            city,
            signature,
            hints,
        } => {
            let zone = SearchZone {
                center: GeoPoint { lat, lng },
                radius_m,
                postal_code,
                city,
            };
            let signature = read_signature(&signature)?;
            run_search(&engine, &zone, &signature, hints.as_deref()).await?;
        }
        Commands::More { id } => run_more(&engine, id).await?,
        Commands::Show { id } => run_show(&pool, id).await?,
        Commands::Migrate => unreachable!("handled before engine construction"),
    }

    Ok(())
}

fn read_signature(path: &PathBuf) -> anyhow::Result<VisualSignature> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading signature file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing signature {}", path.display()))
}

async fn run_search(
    engine: &CliEngine,
    zone: &SearchZone,
    signature: &VisualSignature,
    hints: Option<&str>,
) -> anyhow::Result<()> {
    let batch = engine.start_search(zone, signature, hints).await?;
    println!("request {}", batch.request_id);
    print_batch(&batch);
    Ok(())
}

async fn run_more(engine: &CliEngine, id: Uuid) -> anyhow::Result<()> {
    match engine.request_more(id).await? {
        MoreOutcome::Batch(batch) => print_batch(&batch),
        MoreOutcome::Exhausted => {
            println!("request {id} is exhausted: the whole area has been explored");
        }
    }
    Ok(())
}

async fn run_show(pool: &sqlx::PgPool, id: Uuid) -> anyhow::Result<()> {
    let Some(row) = proploc_db::get_localisation_request(pool, id).await? else {
        anyhow::bail!("localisation request {id} not found");
    };
    let zone = row.zone();
    println!(
        "request {id}: status={} center=({}, {}) radius={}m",
        row.status, zone.center.lat, zone.center.lng, zone.radius_m
    );
    for run in proploc_db::list_search_runs(pool, id).await? {
        println!(
            "  run level {}: {} candidates, {} excluded, at {}",
            run.level, run.candidate_count, run.excluded_count, run.created_at
        );
    }
    Ok(())
}

fn print_batch(batch: &SearchBatch) {
    println!(
        "level {} — {} candidates ({} excluded as already seen)",
        batch.level,
        batch.candidates.len(),
        batch.excluded_count
    );
    for (rank, candidate) in batch.candidates.iter().enumerate() {
        let marker = if candidate.is_fallback { " [fallback]" } else { "" };
        println!(
            "  {}. [{:>3}/100]{} {} — {}",
            rank + 1,
            candidate.score,
            marker,
            candidate.address,
            candidate.explanation
        );
    }
}
