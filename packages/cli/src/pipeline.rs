//! Job runners behind each subcommand, plus the end-to-end pipeline.
//!
//! Every runner takes the shared [`MultiProgress`] registered with the log
//! bridge, so log lines are suspended while progress bars redraw.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crime_olap_aggregate::config::PipelineConfig;
use crime_olap_aggregate::dimensions::load_index;
use crime_olap_aggregate::jobs::{self, JobSummary};
use crime_olap_aggregate::progress::ProgressCallback;
use crime_olap_cli_utils::{IndicatifProgress, MultiProgress};
use crime_olap_database::duck::DuckDbStore;
use crime_olap_database::paths::resolve_star_db_path;
use crime_olap_incident_models::DimensionIndex;
use crime_olap_loader::{LoadError, LoadSummary, StarLoader};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn log_job(name: &str, summary: &JobSummary, started: Instant) {
    log::info!(
        "{name}: {} lines ({} rejected, {} header rows) in {:.1}s",
        summary.stats.lines,
        summary.stats.rejected,
        summary.stats.headers,
        started.elapsed().as_secs_f64()
    );
    for report in &summary.reports {
        log::info!("  {}: {} keys, {} lines", report.dir.display(), report.keys, report.lines);
    }
}

/// `weekly`: per-category and per-district week-bucket reports.
///
/// # Errors
///
/// Returns an error if the input cannot be read or a report cannot be
/// written.
pub async fn weekly(
    multi: &MultiProgress,
    config: &PipelineConfig,
    input: &Path,
    category_out: &Path,
    district_out: &Path,
) -> CliResult<()> {
    let started = Instant::now();
    let bar = IndicatifProgress::job_bar(multi, "Weekly counts");
    let summary = jobs::run_weekly(config, input, category_out, district_out, bar).await?;
    log_job("Weekly counts", &summary, started);
    Ok(())
}

/// `weekday`: per-category and per-district day-of-week reports.
///
/// # Errors
///
/// Returns an error if the input cannot be read or a report cannot be
/// written.
pub async fn weekday(
    multi: &MultiProgress,
    config: &PipelineConfig,
    input: &Path,
    category_out: &Path,
    district_out: &Path,
) -> CliResult<()> {
    let started = Instant::now();
    let bar = IndicatifProgress::job_bar(multi, "Weekday counts");
    let summary = jobs::run_weekday(config, input, category_out, district_out, bar).await?;
    log_job("Weekday counts", &summary, started);
    Ok(())
}

/// `prep`: the date-keyed heat map, indexed against the weekly reports.
///
/// # Errors
///
/// Returns an error if a report or the input cannot be read, or the output
/// cannot be written.
pub async fn prep(
    multi: &MultiProgress,
    config: &PipelineConfig,
    category_report: &Path,
    district_report: &Path,
    input: &Path,
    output: &Path,
) -> CliResult<Arc<DimensionIndex>> {
    let started = Instant::now();
    let bar = IndicatifProgress::job_bar(multi, "Heat map");
    let (summary, index) =
        jobs::run_prep(config, category_report, district_report, input, output, bar).await?;
    log_job("Heat map", &summary, started);
    Ok(index)
}

fn load_star(
    database: &Path,
    index: DimensionIndex,
    heatmap: &Path,
    progress: Arc<dyn ProgressCallback>,
) -> Result<LoadSummary, LoadError> {
    let store = DuckDbStore::open(database)?;
    StarLoader::new(store)
        .with_progress(progress)
        .run(index, heatmap)
}

/// Full-refresh load of the star schema at `database` (or the default
/// location).
///
/// # Errors
///
/// Returns an error if the database cannot be opened, a table cannot be
/// reset, a dimension row cannot be inserted, or the heat map cannot be
/// read.
pub async fn load(
    multi: &MultiProgress,
    index: DimensionIndex,
    heatmap: &Path,
    database: Option<&Path>,
) -> CliResult<LoadSummary> {
    let database = resolve_star_db_path(database);
    let heatmap = heatmap.to_path_buf();
    let bar = IndicatifProgress::load_bar(multi, &format!("Loading {}", database.display()));

    let started = Instant::now();
    let summary =
        tokio::task::spawn_blocking(move || load_star(&database, index, &heatmap, bar)).await??;
    log::info!("Star load took {:.1}s", started.elapsed().as_secs_f64());
    Ok(summary)
}

/// `load`: reads the dimension lists from the two weekly reports, then
/// loads the heat map.
///
/// # Errors
///
/// Returns an error if a report cannot be read or the load fails.
pub async fn load_reports(
    multi: &MultiProgress,
    category_report: &Path,
    district_report: &Path,
    heatmap: &Path,
    database: Option<&Path>,
) -> CliResult<LoadSummary> {
    let categories = category_report.to_path_buf();
    let districts = district_report.to_path_buf();
    let index = tokio::task::spawn_blocking(move || load_index(&categories, &districts)).await??;
    load(multi, index, heatmap, database).await
}

/// Output locations of a pipeline run under one work directory.
struct WorkDirs {
    by_category: PathBuf,
    by_district: PathBuf,
    star: PathBuf,
}

impl WorkDirs {
    fn new(work_dir: &Path) -> Self {
        Self {
            by_category: work_dir.join("bycategory"),
            by_district: work_dir.join("bydistrict"),
            star: work_dir.join("star"),
        }
    }
}

/// `pipeline`: weekly, then prep, then load.
///
/// # Errors
///
/// Returns an error from the first stage that fails; later stages do not
/// run.
pub async fn run(
    multi: &MultiProgress,
    config: &PipelineConfig,
    input: &Path,
    work_dir: &Path,
    database: Option<&Path>,
) -> CliResult<LoadSummary> {
    let pipeline_start = Instant::now();
    let dirs = WorkDirs::new(work_dir);
    let total_steps = 3;
    let steps = IndicatifProgress::steps_bar(multi, "Pipeline", total_steps);

    steps.set_message(format!("[1/{total_steps}] Weekly counts"));
    weekly(multi, config, input, &dirs.by_category, &dirs.by_district).await?;
    steps.inc(1);

    steps.set_message(format!("[2/{total_steps}] Heat map"));
    let index = prep(multi, config, &dirs.by_category, &dirs.by_district, input, &dirs.star).await?;
    steps.inc(1);

    steps.set_message(format!("[3/{total_steps}] Star load"));
    let index = Arc::try_unwrap(index).unwrap_or_else(|shared| (*shared).clone());
    let summary = load(multi, index, &dirs.star, database).await?;
    steps.inc(1);

    steps.finish(format!(
        "Pipeline finished in {:.1}s",
        pipeline_start.elapsed().as_secs_f64()
    ));
    Ok(summary)
}
