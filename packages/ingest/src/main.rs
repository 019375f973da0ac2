#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the arbovirus surveillance ingestion tool.

use std::path::PathBuf;
use std::time::Instant;

use arbo_map_ingest::{
    FailurePolicy, RunConfig, load_municipalities, run_merge, sync_surveillance,
};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "arbo_map_ingest", about = "Arbovirus surveillance data ingestion tool")]
struct Cli {
    /// Path to a TOML run configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Root of the data tree (overrides the configured value)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or load the geography catalog and list its municipalities
    Catalog {
        /// Comma-separated list of state codes to keep (e.g., "MG,SP")
        #[arg(long)]
        states: Option<String>,
        /// Comma-separated list of municipality names to keep
        #[arg(long)]
        cities: Option<String>,
    },
    /// Reconcile the weekly surveillance cache of every configured location
    Sync {
        /// Comma-separated list of state codes to keep
        #[arg(long)]
        states: Option<String>,
        /// Comma-separated list of municipality names to keep
        #[arg(long)]
        cities: Option<String>,
        /// Target epidemiological year (overrides the configured value)
        #[arg(long)]
        year: Option<i32>,
        /// Abort on the first failed location/disease pair instead of
        /// skipping it
        #[arg(long)]
        abort_on_error: bool,
    },
    /// Merge weekly caches into city, state, and country artifacts
    Merge {
        /// Comma-separated list of state codes to keep
        #[arg(long)]
        states: Option<String>,
        /// Comma-separated list of municipality names to keep
        #[arg(long)]
        cities: Option<String>,
        /// Abort on the first failed merge step instead of skipping it
        #[arg(long)]
        abort_on_error: bool,
    },
    /// Sync every cache, then run the full merge
    All {
        /// Comma-separated list of state codes to keep
        #[arg(long)]
        states: Option<String>,
        /// Comma-separated list of municipality names to keep
        #[arg(long)]
        cities: Option<String>,
        /// Target epidemiological year (overrides the configured value)
        #[arg(long)]
        year: Option<i32>,
        /// Abort on the first failure instead of skipping it
        #[arg(long)]
        abort_on_error: bool,
    },
}

fn split_csv(value: Option<String>) -> Vec<String> {
    value
        .map(|s| s.split(',').map(|item| item.trim().to_owned()).collect())
        .unwrap_or_default()
}

fn apply_filters(config: &mut RunConfig, states: Option<String>, cities: Option<String>) {
    let states = split_csv(states);
    if !states.is_empty() {
        config.list_uf = states;
    }
    let cities = split_csv(cities);
    if !cities.is_empty() {
        config.list_city = cities;
    }
}

const fn policy(abort_on_error: bool) -> FailurePolicy {
    if abort_on_error {
        FailurePolicy::Abort
    } else {
        FailurePolicy::SkipAndLog
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(path) => RunConfig::from_toml_file(&path)?,
        None => RunConfig::default(),
    };
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    match cli.command {
        Commands::Catalog { states, cities } => {
            apply_filters(&mut config, states, cities);
            let municipalities = load_municipalities(&config).await?;
            println!("{:<10} {:<30} UF", "GEOCODE", "MUNICIPALITY");
            println!("{}", "-".repeat(50));
            for municipality in &municipalities {
                println!(
                    "{:<10} {:<30} {}",
                    municipality.geocode, municipality.municipio, municipality.mesorregiao_uf
                );
            }
            log::info!("{} municipalities in catalog", municipalities.len());
        }
        Commands::Sync {
            states,
            cities,
            year,
            abort_on_error,
        } => {
            apply_filters(&mut config, states, cities);
            if let Some(year) = year {
                config.year = year;
            }
            let start = Instant::now();
            sync_surveillance(&config, policy(abort_on_error)).await?;
            log::info!("Sync finished in {:.1}s", start.elapsed().as_secs_f64());
        }
        Commands::Merge {
            states,
            cities,
            abort_on_error,
        } => {
            apply_filters(&mut config, states, cities);
            let start = Instant::now();
            run_merge(&config, policy(abort_on_error)).await?;
            log::info!("Merge finished in {:.1}s", start.elapsed().as_secs_f64());
        }
        Commands::All {
            states,
            cities,
            year,
            abort_on_error,
        } => {
            apply_filters(&mut config, states, cities);
            if let Some(year) = year {
                config.year = year;
            }
            let policy = policy(abort_on_error);
            let start = Instant::now();
            sync_surveillance(&config, policy).await?;
            run_merge(&config, policy).await?;
            log::info!("Run finished in {:.1}s", start.elapsed().as_secs_f64());
        }
    }

    Ok(())
}
