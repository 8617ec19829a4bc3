#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the crime OLAP toolchain.
//!
//! Uses `indicatif-log-bridge` (via [`crime_olap_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod pipeline;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use crime_olap_aggregate::config::load_config;

#[derive(Parser)]
#[command(
    name = "crime_olap",
    about = "Crime incident aggregation and OLAP star-schema loader"
)]
struct Cli {
    /// Pipeline config TOML (column layout, date format, reducers).
    /// Defaults to the built-in San Francisco layout.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Count incidents per category and per district into month/week buckets
    Weekly {
        /// Incident CSV file or directory of files
        input: PathBuf,
        /// Output directory for the per-category report
        category_out: PathBuf,
        /// Output directory for the per-district report
        district_out: PathBuf,
    },
    /// Count incidents per category and per district by day of the week
    Weekday {
        /// Incident CSV file or directory of files
        input: PathBuf,
        /// Output directory for the per-category report
        category_out: PathBuf,
        /// Output directory for the per-district report
        district_out: PathBuf,
    },
    /// Build the per-date category x district heat map for the star loader
    Prep {
        /// Per-category weekly report (file or job output directory)
        category_report: PathBuf,
        /// Per-district weekly report (file or job output directory)
        district_report: PathBuf,
        /// Incident CSV file or directory of files
        input: PathBuf,
        /// Output directory for the heat map
        output: PathBuf,
    },
    /// Reset the star schema and load dimensions and the heat map into it
    Load {
        /// Per-category weekly report (file or job output directory)
        category_report: PathBuf,
        /// Per-district weekly report (file or job output directory)
        district_report: PathBuf,
        /// Heat-map report (file or job output directory)
        heatmap: PathBuf,
        /// `DuckDB` file to load (overrides `CRIME_OLAP_DATABASE`;
        /// default `data/star.duckdb`)
        #[arg(long)]
        database: Option<PathBuf>,
    },
    /// Run weekly, prep, and load end to end under one work directory
    Pipeline {
        /// Incident CSV file or directory of files
        input: PathBuf,
        /// Directory receiving `bycategory/`, `bydistrict/` and `star/`
        work_dir: PathBuf,
        /// `DuckDB` file to load (overrides `CRIME_OLAP_DATABASE`;
        /// default `data/star.duckdb`)
        #[arg(long)]
        database: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = crime_olap_cli_utils::init_logger();
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::Weekly {
            input,
            category_out,
            district_out,
        } => pipeline::weekly(&multi, &config, &input, &category_out, &district_out).await,
        Commands::Weekday {
            input,
            category_out,
            district_out,
        } => pipeline::weekday(&multi, &config, &input, &category_out, &district_out).await,
        Commands::Prep {
            category_report,
            district_report,
            input,
            output,
        } => pipeline::prep(
            &multi,
            &config,
            &category_report,
            &district_report,
            &input,
            &output,
        )
        .await
        .map(|_| ()),
        Commands::Load {
            category_report,
            district_report,
            heatmap,
            database,
        } => pipeline::load_reports(
            &multi,
            &category_report,
            &district_report,
            &heatmap,
            database.as_deref(),
        )
        .await
        .map(|_| ()),
        Commands::Pipeline {
            input,
            work_dir,
            database,
        } => pipeline::run(&multi, &config, &input, &work_dir, database.as_deref())
            .await
            .map(|_| ()),
    };

    if let Err(e) = &result {
        log::error!("{e}");
    }
    result
}
