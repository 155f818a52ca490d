#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the layoff map pipeline.
//!
//! `layoff_map run` reads the WARN site export and the school directory,
//! geocodes the sites against Nominatim, and writes the enriched site ×
//! school table with distances and census tracts. Log output goes through
//! [`layoff_map_cli_utils::init_logger`] so it does not break the
//! geocoding progress bar.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use layoff_map_cli_utils::{IndicatifProgress, MultiProgress};
use layoff_map_geocoder::cache::CachedGeocoder;
use layoff_map_geocoder::nominatim::NominatimGeocoder;
use layoff_map_pipeline::config::PipelineConfig;
use layoff_map_pipeline::{PipelineInputs, input, output};
use layoff_map_registry::GeocodeOptions;

/// Link layoff sites to nearby schools and census tracts.
#[derive(Parser)]
#[command(name = "layoff_map")]
#[command(about = "Link layoff sites to nearby schools and census tracts")]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Geocode sites, pair them with every school-year, and attach tracts.
    Run {
        /// Site CSV (`id,address,city,state,zip[,excl]`).
        #[arg(long)]
        sites: PathBuf,

        /// School CSV (`year,ncessch,latitude,longitude`).
        #[arg(long)]
        schools: PathBuf,

        /// Run configuration (geocoder settings and boundary files).
        #[arg(long)]
        config: PathBuf,

        /// Output CSV (default: stdout).
        #[arg(long)]
        out: Option<PathBuf>,

        /// Geocoded-site checkpoint. Replayed before geocoding if it
        /// exists, then rewritten with this run's results.
        #[arg(long)]
        checkpoint: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = layoff_map_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            sites,
            schools,
            config,
            out,
            checkpoint,
        } => {
            cmd_run(
                &multi,
                &sites,
                &schools,
                &config,
                out.as_deref(),
                checkpoint.as_deref(),
            )
            .await
        }
    }
}

/// Runs the pipeline end to end and writes its outputs.
async fn cmd_run(
    multi: &MultiProgress,
    sites: &Path,
    schools: &Path,
    config: &Path,
    out: Option<&Path>,
    checkpoint: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = PipelineConfig::from_path(config)?;
    let geocoder_config = config.geocoder.clone().with_env_overrides();
    let catalog = config.load_catalog()?;

    let inputs = PipelineInputs {
        sites: input::read_sites_path(sites)?,
        schools: input::read_schools_path(schools)?,
    };

    let geocoder = CachedGeocoder::new(NominatimGeocoder::from_config(&geocoder_config)?);
    log::info!(
        "Geocoding with {} ({})",
        geocoder_config.name,
        geocoder_config.base_url
    );

    if let Some(path) = checkpoint.filter(|p| p.exists()) {
        let located = output::read_sites_checkpoint(File::open(path)?)?;
        log::info!(
            "Replaying {} geocoded sites from {}",
            located.len(),
            path.display()
        );
        geocoder.seed_all(located);
    }

    let options = GeocodeOptions::from_config(&geocoder_config);
    let progress = IndicatifProgress::lookups_bar(multi, "Geocoding sites");

    let result =
        layoff_map_pipeline::run(inputs, &geocoder, &catalog, &options, Some(&progress)).await?;

    if let Some(path) = checkpoint {
        output::write_sites_csv(&result.geocoded_sites, BufWriter::new(File::create(path)?))?;
        log::info!("Wrote site checkpoint to {}", path.display());
    }

    match out {
        Some(path) => {
            output::write_csv(&result.records, BufWriter::new(File::create(path)?))?;
            log::info!("Wrote {} rows to {}", result.records.len(), path.display());
        }
        None => output::write_csv(&result.records, std::io::stdout().lock())?,
    }

    let summary = &result.summary;
    if summary.failed_geocodes > 0 {
        log::warn!(
            "{} sites could not be geocoded after retries; rerun with --checkpoint to retry only those",
            summary.failed_geocodes
        );
    }

    Ok(())
}
