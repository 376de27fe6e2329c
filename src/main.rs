use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

use isitopen::{
    init_tracing, load_places_csv, place_detail, search, Config, NewPlace, NewStatusReport,
    Pagination, PlaceCategory, Reporter, ReportStatus, SqliteStore,
};

#[derive(Parser)]
#[command(name = "isitopen", version, about = "Crowd-sourced open/closed status for places")]
struct Cli {
    /// SQLite database (overrides ISITOPEN_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database schema
    Init,

    /// Seed places from a CSV file (name,category,city,area[,lat,lng,image,maps_link])
    Import { csv: PathBuf },

    /// Add a single place
    AddPlace {
        #[arg(long)]
        name: String,
        #[arg(long)]
        category: PlaceCategory,
        #[arg(long)]
        city: String,
        #[arg(long)]
        area: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        lng: Option<f64>,
        #[arg(long)]
        image: Option<String>,
        #[arg(long)]
        maps_link: Option<String>,
    },

    /// Report a place as open or closed
    Report {
        place_id: String,
        status: ReportStatus,
        #[arg(long = "by", default_value = "public")]
        updated_by: Reporter,
    },

    /// Search places, e.g. `search "pharmacy at Hyderabad"`
    Search {
        #[arg(default_value = "")]
        query: String,
        #[arg(long, default_value = "")]
        city: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Show one place with its current status
    Show { place_id: String },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    init_tracing(config.log_json);
    config.log_rejected();

    let store = SqliteStore::open(&config.db_path)?;

    match cli.command {
        Command::Init => {
            info!(db = %config.db_path.display(), "database ready");
        }
        Command::Import { csv } => {
            let places = load_places_csv(&csv, Utc::now())
                .with_context(|| format!("Failed to load {}", csv.display()))?;
            info!(rows = places.len(), "loaded CSV");

            let summary = store.import_places(&places)?;
            let total = store.count_places()?;
            print_json(&serde_json::json!({
                "inserted": summary.inserted,
                "duplicates": summary.duplicates,
                "total": total,
            }))?;
        }
        Command::AddPlace {
            name,
            category,
            city,
            area,
            lat,
            lng,
            image,
            maps_link,
        } => {
            let place = NewPlace {
                name,
                category,
                city,
                area,
                lat,
                lng,
                image,
                maps_link,
            }
            .into_place(Utc::now())?;

            store.insert_place(&place)?;
            print_json(&place)?;
        }
        Command::Report {
            place_id,
            status,
            updated_by,
        } => {
            let report = NewStatusReport {
                place_id,
                status,
                updated_by,
            }
            .into_report(Utc::now())?;

            store.insert_report(&report)?;
            print_json(&report)?;
        }
        Command::Search {
            query,
            city,
            page,
            limit,
        } => {
            let pagination = Pagination::new(page, limit.unwrap_or(config.page_size));
            let results = search(
                &store,
                &query,
                &city,
                pagination,
                &config.status_policy,
                Utc::now(),
            )?;
            print_json(&results)?;
        }
        Command::Show { place_id } => {
            let detail = place_detail(&store, &place_id, &config.status_policy, Utc::now())?;
            print_json(&detail)?;
        }
    }

    Ok(())
}
