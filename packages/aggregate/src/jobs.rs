//! The three aggregation jobs: weekly counts, weekday counts and the
//! date-keyed heat map that feeds the star loader.
//!
//! Each job maps its input once, then reduces and writes one report
//! directory per output.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crime_olap_incident_models::DimensionIndex;

use crate::JobError;
use crate::bucketer::WeeklyBucketer;
use crate::config::PipelineConfig;
use crate::dimensions::load_index;
use crate::heatmap::HeatMapBuilder;
use crate::progress::ProgressCallback;
use crate::projector::Projector;
use crate::report::{input_files, write_report};
use crate::shuffle::{Groups, MapStats, Reducer, map_files, reduce_partitioned};
use crate::weekday::WeekdayCounter;

/// One report directory written by a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSummary {
    /// Output directory.
    pub dir: PathBuf,
    /// Distinct keys reduced.
    pub keys: usize,
    /// Lines written across all part files.
    pub lines: usize,
}

/// Outcome of a job run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    /// Map phase counts.
    pub stats: MapStats,
    /// Reports in output order.
    pub reports: Vec<ReportSummary>,
}

async fn map_input(
    input: &Path,
    projectors: Vec<Projector>,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<(Vec<Groups>, MapStats), JobError> {
    let files = input_files(input)?;
    log::info!("Reading {} input file(s) from {}", files.len(), input.display());
    progress.set_message(format!("Mapping {}", input.display()));

    let progress = Arc::clone(progress);
    tokio::task::spawn_blocking(move || map_files(&files, &projectors, &progress)).await?
}

async fn reduce_into<R: Reducer + 'static>(
    groups: Groups,
    reducer: Arc<R>,
    reducers: usize,
    out: &Path,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<ReportSummary, JobError> {
    let keys = groups.len();
    progress.set_message(format!("Reducing {keys} keys into {}", out.display()));

    let partitions = reduce_partitioned(groups, reducer, reducers, Arc::clone(progress)).await?;
    let lines = partitions.iter().map(Vec::len).sum();

    let dir = out.to_path_buf();
    let written = tokio::task::spawn_blocking(move || write_report(&dir, &partitions)).await??;
    log::info!(
        "Wrote {lines} lines for {keys} keys to {} ({} part files)",
        out.display(),
        written.len()
    );

    Ok(ReportSummary {
        dir: out.to_path_buf(),
        keys,
        lines,
    })
}

/// Maps `input` with a category projector and a district projector, then
/// reduces both groupings with `reducer`.
async fn run_category_and_district<R: Reducer + 'static>(
    config: &PipelineConfig,
    input: &Path,
    projectors: [Projector; 2],
    reducer: R,
    outputs: [&Path; 2],
    progress: Arc<dyn ProgressCallback>,
) -> Result<JobSummary, JobError> {
    let (groups, stats) = map_input(input, projectors.into(), &progress).await?;
    let reducer = Arc::new(reducer);

    let mut reports = Vec::with_capacity(outputs.len());
    for (groups, out) in groups.into_iter().zip(outputs) {
        reports.push(
            reduce_into(groups, Arc::clone(&reducer), config.jobs.reducers, out, &progress).await?,
        );
    }

    progress.finish(format!("{} lines mapped", stats.lines));
    Ok(JobSummary { stats, reports })
}

/// Weekly report: per category and per district, incidents counted into
/// month/week buckets.
///
/// # Errors
///
/// Returns [`JobError`] if the input cannot be read or a report cannot be
/// written.
pub async fn run_weekly(
    config: &PipelineConfig,
    input: &Path,
    category_out: &Path,
    district_out: &Path,
    progress: Arc<dyn ProgressCallback>,
) -> Result<JobSummary, JobError> {
    log::info!("Weekly job: {} -> {}, {}", input.display(), category_out.display(), district_out.display());
    let layout = config.columns;
    run_category_and_district(
        config,
        input,
        [
            Projector::new(layout, layout.category_by_date(), config.date_parser()),
            Projector::new(layout, layout.district_by_date(), config.date_parser()),
        ],
        WeeklyBucketer::new(config.date_parser()),
        [category_out, district_out],
        progress,
    )
    .await
}

/// Weekday report: per category and per district, incidents counted by
/// day of the week.
///
/// # Errors
///
/// Returns [`JobError`] if the input cannot be read or a report cannot be
/// written.
pub async fn run_weekday(
    config: &PipelineConfig,
    input: &Path,
    category_out: &Path,
    district_out: &Path,
    progress: Arc<dyn ProgressCallback>,
) -> Result<JobSummary, JobError> {
    log::info!("Weekday job: {} -> {}, {}", input.display(), category_out.display(), district_out.display());
    let layout = config.columns;
    run_category_and_district(
        config,
        input,
        [
            Projector::new(layout, layout.category_by_day_of_week(), config.date_parser()),
            Projector::new(layout, layout.district_by_day_of_week(), config.date_parser()),
        ],
        WeekdayCounter,
        [category_out, district_out],
        progress,
    )
    .await
}

/// Heat-map report: per date, the non-zero category x district counts,
/// indexed against the dimension lists read from the two weekly reports.
///
/// Returns the summary along with the dimension index the offsets refer to.
///
/// # Errors
///
/// Returns [`JobError`] if a report or the input cannot be read, or the
/// output cannot be written.
pub async fn run_prep(
    config: &PipelineConfig,
    category_report: &Path,
    district_report: &Path,
    input: &Path,
    output: &Path,
    progress: Arc<dyn ProgressCallback>,
) -> Result<(JobSummary, Arc<DimensionIndex>), JobError> {
    log::info!("Prep job: {} -> {}", input.display(), output.display());
    let index = {
        let categories = category_report.to_path_buf();
        let districts = district_report.to_path_buf();
        Arc::new(tokio::task::spawn_blocking(move || load_index(&categories, &districts)).await??)
    };

    let layout = config.columns;
    let projector = Projector::new(layout, layout.date_by_district_and_category(), config.date_parser());
    let (groups, stats) = map_input(input, vec![projector], &progress).await?;
    let groups = groups.into_iter().next().unwrap_or_default();

    let builder = Arc::new(HeatMapBuilder::new(Arc::clone(&index)));
    let report = reduce_into(groups, builder, config.jobs.reducers, output, &progress).await?;

    progress.finish(format!("{} lines mapped", stats.lines));
    Ok((
        JobSummary {
            stats,
            reports: vec![report],
        },
        index,
    ))
}

#[cfg(test)]
mod tests {
    use crime_olap_incident_models::ReportLine;

    use super::*;
    use crate::config::parse_config;
    use crate::progress::null_progress;
    use crate::report::{SUCCESS_MARKER, read_report};

    const INCIDENTS: &str = "\
IncidntNum,Category,Descript,DayOfWeek,Date,Time,PdDistrict,Resolution
130000001,ASSAULT,BATTERY,Saturday,01/05/2013,23:10,NORTHERN,NONE
130000002,LARCENY/THEFT,PETTY THEFT,Saturday,01/12/2013,10:00,SOUTHERN,NONE
130000003,ASSAULT,THREATS,Saturday,01/12/2013,11:00,NORTHERN,NONE
130000004,ASSAULT,THREATS,Saturday,01/05/2013,12:00,NORTHERN,NONE
130000005,broken row
";

    fn workspace() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input");
        std::fs::create_dir(&input).unwrap();
        std::fs::write(input.join("incidents.csv"), INCIDENTS).unwrap();
        (dir, input)
    }

    #[tokio::test]
    async fn weekly_job_writes_both_reports() {
        let (dir, input) = workspace();
        let cat = dir.path().join("bycategory");
        let dist = dir.path().join("bydistrict");

        let summary = run_weekly(&PipelineConfig::default(), &input, &cat, &dist, null_progress())
            .await
            .unwrap();

        assert_eq!(summary.stats.headers, 1);
        assert_eq!(summary.stats.rejected, 1);
        assert_eq!(summary.reports[0].keys, 2);
        assert!(cat.join(SUCCESS_MARKER).is_file());

        let categories = read_report(&cat).unwrap();
        assert_eq!(
            categories,
            vec![
                ReportLine::new("ASSAULT", "0,2,1,0,0,0,0,0,0,0,0,0,0,0,0,0"),
                ReportLine::new("LARCENY/THEFT", "0,0,1,0,0,0,0,0,0,0,0,0,0,0,0,0"),
            ]
        );
        let districts: Vec<String> = read_report(&dist).unwrap().into_iter().map(|l| l.key).collect();
        assert_eq!(districts, vec!["NORTHERN", "SOUTHERN"]);
    }

    #[tokio::test]
    async fn weekly_job_drops_row_with_bad_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("incidents.csv");
        std::fs::write(
            &input,
            b"130000001,ASSAULT,BATTERY,Saturday,01/05/2013,23:10,NORTHERN,NONE\n\
130000002,ASSAULT,CAF\xC9,Saturday,01/05/2013,23:20,NORTHERN,NONE\n\
130000003,ASSAULT,THREATS,Saturday,01/12/2013,11:00,NORTHERN,NONE\n",
        )
        .unwrap();
        let cat = dir.path().join("bycategory");
        let dist = dir.path().join("bydistrict");

        let summary = run_weekly(&PipelineConfig::default(), &input, &cat, &dist, null_progress())
            .await
            .unwrap();

        assert_eq!(summary.stats.lines, 3);
        assert_eq!(summary.stats.rejected, 1);
        assert_eq!(
            read_report(&cat).unwrap(),
            vec![ReportLine::new("ASSAULT", "0,1,1,0,0,0,0,0,0,0,0,0,0,0,0,0")]
        );
    }

    #[tokio::test]
    async fn weekday_job_counts_days() {
        let (dir, input) = workspace();
        let cat = dir.path().join("weekday-category");
        let dist = dir.path().join("weekday-district");

        run_weekday(&PipelineConfig::default(), &input, &cat, &dist, null_progress())
            .await
            .unwrap();

        let districts = read_report(&dist).unwrap();
        assert_eq!(districts[0], ReportLine::new("NORTHERN", "0,0,0,0,0,0,3"));
    }

    #[tokio::test]
    async fn prep_job_indexes_against_weekly_reports() {
        let (dir, input) = workspace();
        let cat = dir.path().join("bycategory");
        let dist = dir.path().join("bydistrict");
        let star = dir.path().join("star");
        let config = parse_config("[jobs]\nreducers = 3\n").unwrap();

        run_weekly(&config, &input, &cat, &dist, null_progress()).await.unwrap();
        let (summary, index) = run_prep(&config, &cat, &dist, &input, &star, null_progress())
            .await
            .unwrap();

        assert_eq!(index.categories.index_of("LARCENY/THEFT"), Some(1));
        assert_eq!(summary.reports[0].keys, 2);
        assert_eq!(summary.reports[0].lines, 3);

        let mut lines = read_report(&star).unwrap();
        lines.sort();
        assert_eq!(
            lines,
            vec![
                ReportLine::new("2013/01/05", "0,0,2"),
                ReportLine::new("2013/01/12", "0,0,1"),
                ReportLine::new("2013/01/12", "1,1,1"),
            ]
        );
    }

    #[tokio::test]
    async fn missing_input_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_weekly(
            &PipelineConfig::default(),
            &dir.path().join("nope"),
            &dir.path().join("a"),
            &dir.path().join("b"),
            null_progress(),
        )
        .await;
        assert!(matches!(result, Err(JobError::Io { .. })));
    }
}
