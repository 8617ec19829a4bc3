use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use crime_olap_aggregate::dates::parse_canonical;
use crime_olap_aggregate::progress::{ProgressCallback, null_progress};
use crime_olap_aggregate::report::report_files;
use crime_olap_database::StarStore;
use crime_olap_database::star::{self, StarRow};
use crime_olap_incident_models::{
    DimensionIndex, DimensionList, HeatMapCell, ReportLine, StarTable, TimePeriod,
};

use crate::{KeySequence, LoadError, LoadState, LoadSummary};

/// Surrogate key of the dimension row at zero-based `offset`.
fn dimension_key(offset: usize) -> i64 {
    i64::try_from(offset).map_or(i64::MAX, |n| n + 1)
}

/// Loads one run's dimensions and heat map into a [`StarStore`].
///
/// The loader is the only writer for the duration of a run, so its key
/// sequences and time-period cache need no locking.
pub struct StarLoader<S: StarStore> {
    store: S,
    state: LoadState,
    index: DimensionIndex,
    categories: KeySequence,
    districts: KeySequence,
    time_periods: KeySequence,
    facts: KeySequence,
    periods: HashMap<NaiveDate, i64>,
    summary: LoadSummary,
    progress: Arc<dyn ProgressCallback>,
}

impl<S: StarStore> StarLoader<S> {
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            state: LoadState::Uninitialized,
            index: DimensionIndex::default(),
            categories: KeySequence::new(),
            districts: KeySequence::new(),
            time_periods: KeySequence::new(),
            facts: KeySequence::new(),
            periods: HashMap::new(),
            summary: LoadSummary::default(),
            progress: null_progress(),
        }
    }

    /// Reports heat-map lines read to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub const fn state(&self) -> LoadState {
        self.state
    }

    /// Counts so far.
    #[must_use]
    pub const fn summary(&self) -> LoadSummary {
        self.summary
    }

    fn require(&self, operation: &'static str, allowed: &[LoadState]) -> Result<(), LoadError> {
        if allowed.contains(&self.state) {
            return Ok(());
        }
        Err(LoadError::InvalidState {
            operation,
            state: self.state,
        })
    }

    fn fail(&mut self, error: LoadError) -> LoadError {
        log::error!("Star load failed: {error}");
        self.state = LoadState::Failed;
        error
    }

    /// Creates any missing tables and empties all four, fact first, then
    /// restarts every key sequence. Repeating it is harmless.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Db`] if the schema cannot be created or a table
    /// cannot be emptied; the loader is then [`LoadState::Failed`].
    pub fn reset(&mut self) -> Result<(), LoadError> {
        self.require(
            "reset",
            &[
                LoadState::Uninitialized,
                LoadState::DimensionsLoaded,
                LoadState::Ready,
                LoadState::Complete,
                LoadState::Failed,
            ],
        )?;

        if let Err(e) = star::create_schema(&mut self.store).and_then(|()| star::truncate_all(&mut self.store)) {
            return Err(self.fail(e.into()));
        }

        for seq in [
            &mut self.categories,
            &mut self.districts,
            &mut self.time_periods,
            &mut self.facts,
        ] {
            seq.reset();
        }
        self.periods.clear();
        self.index = DimensionIndex::default();
        self.summary = LoadSummary::default();
        self.state = LoadState::Uninitialized;

        log::info!("Star schema reset");
        Ok(())
    }

    fn insert_dimension(
        &mut self,
        table: StarTable,
        names: &DimensionList,
    ) -> Result<u64, LoadError> {
        let mut inserted = 0;
        for name in names.iter() {
            let (seq, row) = match table {
                StarTable::District => (
                    &mut self.districts,
                    StarRow::District {
                        name: name.to_string(),
                    },
                ),
                _ => (
                    &mut self.categories,
                    StarRow::Category {
                        name: name.to_string(),
                    },
                ),
            };
            let id = seq.peek();
            if let Err(source) = star::insert(&mut self.store, id, &row) {
                return Err(self.fail(LoadError::Dimension {
                    table,
                    name: name.to_string(),
                    source,
                }));
            }
            seq.commit();
            inserted += 1;
        }
        Ok(inserted)
    }

    /// Inserts every category, then every district, in list order, so the
    /// row at offset `i` gets surrogate key `i + 1`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::InvalidState`] unless freshly reset, or
    /// [`LoadError::Dimension`] on the first failed insert, after which the
    /// loader is [`LoadState::Failed`].
    pub fn load_dimensions(&mut self, index: DimensionIndex) -> Result<(), LoadError> {
        self.require("load dimensions", &[LoadState::Uninitialized])?;

        self.summary.categories = self.insert_dimension(StarTable::Category, &index.categories)?;
        self.summary.districts = self.insert_dimension(StarTable::District, &index.districts)?;
        log::info!(
            "Inserted {} categories and {} districts",
            self.summary.categories,
            self.summary.districts
        );

        self.index = index;
        self.state = LoadState::DimensionsLoaded;
        Ok(())
    }

    /// Key of the `timeperiod` row for `date`, inserting it on first sight.
    /// `None` if the insert failed.
    fn time_period_key(&mut self, date: NaiveDate) -> Option<i64> {
        if let Some(id) = self.periods.get(&date) {
            return Some(*id);
        }

        let id = self.time_periods.peek();
        let row = StarRow::TimePeriod(TimePeriod::from_date(date));
        match star::insert(&mut self.store, id, &row) {
            Ok(()) => {
                self.time_periods.commit();
                self.periods.insert(date, id);
                self.summary.time_periods += 1;
                Some(id)
            }
            Err(e) => {
                log::warn!("Failed to insert time period for {date}: {e}");
                self.summary.failed_inserts += 1;
                None
            }
        }
    }

    fn skip(&mut self, line: &str, reason: &dyn std::fmt::Display) {
        log::warn!("Skipping heat-map line {line:?}: {reason}");
        self.summary.skipped_lines += 1;
    }

    fn ingest_line(&mut self, line: &str) {
        let Some(record) = ReportLine::parse(line) else {
            return;
        };

        let date = match parse_canonical(&record.key) {
            Ok(date) => date,
            Err(e) => return self.skip(line, &e),
        };
        let fields: Vec<&str> = record.value.split(',').collect();
        let cell = match HeatMapCell::from_fields(&fields) {
            Ok(cell) => cell,
            Err(e) => return self.skip(line, &e),
        };
        if cell.category >= self.index.categories.len() {
            return self.skip(line, &format!("no category at offset {}", cell.category));
        }
        if cell.district >= self.index.districts.len() {
            return self.skip(line, &format!("no district at offset {}", cell.district));
        }

        let Some(time_id) = self.time_period_key(date) else {
            return;
        };

        let row = StarRow::Fact {
            district_id: dimension_key(cell.district),
            category_id: dimension_key(cell.category),
            time_id,
            crimes: cell.count,
        };
        match star::insert(&mut self.store, self.facts.peek(), &row) {
            Ok(()) => {
                self.facts.commit();
                self.summary.facts += 1;
            }
            Err(e) => {
                log::warn!("Failed to insert fact for {line:?}: {e}");
                self.summary.failed_inserts += 1;
            }
        }
    }

    /// Reads heat-map lines (`YYYY/MM/DD<TAB>category,district,count`) from
    /// `reader`, one time-period lookup and one fact insert per line.
    ///
    /// Malformed lines, offsets outside the dimension lists, and failed
    /// inserts are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::InvalidState`] before [`Self::load_dimensions`],
    /// or [`LoadError::Io`] if `reader` fails, after which the loader is
    /// [`LoadState::Failed`].
    pub fn ingest(&mut self, source: &str, mut reader: impl BufRead) -> Result<(), LoadError> {
        self.require("ingest", &[LoadState::DimensionsLoaded, LoadState::Ready])?;
        if self.state == LoadState::DimensionsLoaded {
            log::debug!("Dimensions in place, ready for facts");
            self.state = LoadState::Ready;
        }

        self.state = LoadState::Loading;
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {}
                Err(source_err) => {
                    return Err(self.fail(LoadError::Io {
                        path: source.to_string(),
                        source: source_err,
                    }));
                }
            }
            let bytes = buf.strip_suffix(b"\n").unwrap_or(&buf[..]);
            let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
            match std::str::from_utf8(bytes) {
                Ok(line) => self.ingest_line(line),
                Err(_) => self.skip(&String::from_utf8_lossy(bytes), &"not UTF-8"),
            }
            self.progress.inc(1);
        }

        self.state = LoadState::Ready;
        Ok(())
    }

    /// Ingests a heat-map report file, or every part file of a job output
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] if the path cannot be listed or a file cannot
    /// be read; the loader is then [`LoadState::Failed`].
    pub fn ingest_path(&mut self, path: &Path) -> Result<(), LoadError> {
        self.require("ingest", &[LoadState::DimensionsLoaded, LoadState::Ready])?;

        let files = match report_files(path) {
            Ok(files) => files,
            Err(e) => return Err(self.fail(e.into())),
        };
        self.progress.set_message(format!("Loading {}", path.display()));

        for file in files {
            let reader = match File::open(&file) {
                Ok(f) => BufReader::new(f),
                Err(source) => {
                    return Err(self.fail(LoadError::Io {
                        path: file.display().to_string(),
                        source,
                    }));
                }
            };
            log::debug!("Ingesting {}", file.display());
            self.ingest(&file.display().to_string(), reader)?;
        }
        Ok(())
    }

    /// Ends the run. The stored fact count is checked against the inserts
    /// made; a mismatch or a failed count is only logged.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::InvalidState`] unless dimensions are loaded and
    /// no ingest has failed.
    pub fn finish(&mut self) -> Result<LoadSummary, LoadError> {
        self.require("finish", &[LoadState::DimensionsLoaded, LoadState::Ready])?;
        self.state = LoadState::Complete;

        let s = self.summary;
        match star::row_count(&mut self.store, StarTable::Fact) {
            Ok(stored) if stored != s.facts => {
                log::warn!("Fact table holds {stored} rows after inserting {}", s.facts);
            }
            Ok(_) => {}
            Err(e) => log::warn!("Could not count stored facts: {e}"),
        }
        self.progress.finish(format!("{} facts loaded", s.facts));
        log::info!(
            "Star load complete: {} categories, {} districts, {} time periods, {} facts ({} lines skipped, {} inserts failed)",
            s.categories,
            s.districts,
            s.time_periods,
            s.facts,
            s.skipped_lines,
            s.failed_inserts
        );
        Ok(s)
    }

    /// Full refresh: reset, load `index`, ingest `heatmap`, finish.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] from whichever step aborts the run.
    pub fn run(&mut self, index: DimensionIndex, heatmap: &Path) -> Result<LoadSummary, LoadError> {
        self.reset()?;
        self.load_dimensions(index)?;
        self.ingest_path(heatmap)?;
        self.finish()
    }
}

#[cfg(test)]
mod tests {
    use crime_olap_database::duck::DuckDbStore;
    use crime_olap_database::{DbError, SqlValue};

    use super::*;

    /// Wraps a real store and fails the statements `fails` picks.
    struct FlakyStore {
        inner: DuckDbStore,
        fails: fn(&str, &[SqlValue]) -> bool,
    }

    impl StarStore for FlakyStore {
        fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<usize, DbError> {
            if (self.fails)(sql, params) {
                return self
                    .inner
                    .execute("INSERT INTO no_such_table VALUES (1)", &[]);
            }
            self.inner.execute(sql, params)
        }

        fn count(&mut self, sql: &str) -> Result<u64, DbError> {
            if (self.fails)(sql, &[]) {
                return self.inner.count("SELECT COUNT(*) FROM no_such_table");
            }
            self.inner.count(sql)
        }
    }

    fn flaky(fails: fn(&str, &[SqlValue]) -> bool) -> StarLoader<FlakyStore> {
        StarLoader::new(FlakyStore {
            inner: DuckDbStore::open_in_memory().unwrap(),
            fails,
        })
    }

    fn list(names: &[&str]) -> DimensionList {
        DimensionList::from_keys(names.iter().map(ToString::to_string).collect())
    }

    fn index() -> DimensionIndex {
        DimensionIndex::new(
            list(&["ASSAULT", "BURGLARY", "THEFT"]),
            list(&["BAYVIEW", "NORTHERN"]),
        )
    }

    fn query_i64(store: &DuckDbStore, sql: &str) -> i64 {
        store
            .connection()
            .query_row(sql, [], |row| row.get(0))
            .unwrap()
    }

    fn ready_loader() -> StarLoader<DuckDbStore> {
        let mut loader = StarLoader::new(DuckDbStore::open_in_memory().unwrap());
        loader.reset().unwrap();
        loader.load_dimensions(index()).unwrap();
        loader
    }

    const HEATMAP: &str = "2013/01/05\t0,0,2\n2013/01/05\t2,1,1\n\n2013/01/12\t1,0,3\n";

    #[test]
    fn loads_dimensions_periods_and_facts() {
        let mut loader = ready_loader();
        loader.ingest("heatmap", HEATMAP.as_bytes()).unwrap();
        let summary = loader.finish().unwrap();

        assert_eq!(loader.state(), LoadState::Complete);
        assert_eq!(
            summary,
            LoadSummary {
                categories: 3,
                districts: 2,
                time_periods: 2,
                facts: 3,
                skipped_lines: 0,
                failed_inserts: 0,
            }
        );

        let store = &loader.store;
        assert_eq!(query_i64(store, "SELECT id FROM category WHERE name = 'ASSAULT'"), 1);
        assert_eq!(query_i64(store, "SELECT id FROM category WHERE name = 'BURGLARY'"), 2);
        assert_eq!(query_i64(store, "SELECT id FROM category WHERE name = 'THEFT'"), 3);
        assert_eq!(query_i64(store, "SELECT id FROM district WHERE name = 'NORTHERN'"), 2);

        assert_eq!(query_i64(store, "SELECT category_id FROM fact WHERE id = 2"), 3);
        assert_eq!(query_i64(store, "SELECT district_id FROM fact WHERE id = 2"), 2);
        assert_eq!(query_i64(store, "SELECT crimes FROM fact WHERE id = 3"), 3);
        assert_eq!(query_i64(store, "SELECT time_id FROM fact WHERE id = 2"), 1);
        assert_eq!(query_i64(store, "SELECT time_id FROM fact WHERE id = 3"), 2);

        assert_eq!(query_i64(store, "SELECT month FROM timeperiod WHERE id = 1"), 0);
        assert_eq!(query_i64(store, "SELECT week FROM timeperiod WHERE id = 2"), 2);
        assert_eq!(query_i64(store, "SELECT day FROM timeperiod WHERE id = 2"), 12);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let mut loader = ready_loader();
        let input = "\
not-a-date\t0,0,1
2013/01/05\t0,0
2013/01/05\tx,0,1
2013/01/05\t3,0,1
2013/01/05\t0,2,1
2013/01/05
2013/01/05\t0,1,4
";
        loader.ingest("heatmap", input.as_bytes()).unwrap();
        let summary = loader.finish().unwrap();
        assert_eq!(summary.skipped_lines, 6);
        assert_eq!(summary.facts, 1);
        assert_eq!(summary.time_periods, 1);
    }

    #[test]
    fn repeated_runs_restart_keys() {
        let dir = tempfile::tempdir().unwrap();
        let heatmap = dir.path().join("part-00000");
        std::fs::write(&heatmap, HEATMAP).unwrap();

        let mut loader = StarLoader::new(DuckDbStore::open_in_memory().unwrap());
        loader.run(index(), &heatmap).unwrap();
        let second = loader.run(index(), &heatmap).unwrap();

        assert_eq!(second.facts, 3);
        let store = &loader.store;
        assert_eq!(query_i64(store, "SELECT COUNT(*) FROM category"), 3);
        assert_eq!(query_i64(store, "SELECT MIN(id) FROM category"), 1);
        assert_eq!(query_i64(store, "SELECT MIN(id) FROM fact"), 1);
        assert_eq!(query_i64(store, "SELECT MAX(id) FROM timeperiod"), 2);
    }

    #[test]
    fn reset_twice_leaves_empty_tables() {
        let mut loader = ready_loader();
        loader.ingest("heatmap", HEATMAP.as_bytes()).unwrap();
        loader.reset().unwrap();
        loader.reset().unwrap();

        let store = &loader.store;
        for table in ["fact", "category", "district", "timeperiod"] {
            assert_eq!(query_i64(store, &format!("SELECT COUNT(*) FROM {table}")), 0);
        }
        assert_eq!(loader.state(), LoadState::Uninitialized);
    }

    #[test]
    fn operations_out_of_order_are_rejected() {
        let mut loader = StarLoader::new(DuckDbStore::open_in_memory().unwrap());
        assert!(matches!(
            loader.ingest("heatmap", HEATMAP.as_bytes()),
            Err(LoadError::InvalidState {
                state: LoadState::Uninitialized,
                ..
            })
        ));

        loader.reset().unwrap();
        loader.load_dimensions(index()).unwrap();
        assert!(matches!(
            loader.load_dimensions(index()),
            Err(LoadError::InvalidState { .. })
        ));

        loader.finish().unwrap();
        assert!(matches!(
            loader.ingest("heatmap", HEATMAP.as_bytes()),
            Err(LoadError::InvalidState {
                state: LoadState::Complete,
                ..
            })
        ));
    }

    #[test]
    fn failed_fact_insert_does_not_consume_a_key() {
        let mut loader = flaky(|sql, params| {
            sql.starts_with("INSERT INTO fact") && params.last() == Some(&SqlValue::Integer(13))
        });
        loader.reset().unwrap();
        loader.load_dimensions(index()).unwrap();
        loader
            .ingest(
                "heatmap",
                "2013/01/05\t0,0,1\n2013/01/05\t1,0,13\n2013/01/05\t2,0,1\n".as_bytes(),
            )
            .unwrap();
        let summary = loader.finish().unwrap();

        assert_eq!(summary.facts, 2);
        assert_eq!(summary.failed_inserts, 1);
        assert_eq!(query_i64(&loader.store.inner, "SELECT MAX(id) FROM fact"), 2);
    }

    #[test]
    fn failed_time_period_insert_skips_its_facts() {
        let mut loader = flaky(|sql, params| {
            sql.starts_with("INSERT INTO timeperiod") && params.last() == Some(&SqlValue::Integer(12))
        });
        loader.reset().unwrap();
        loader.load_dimensions(index()).unwrap();
        loader.ingest("heatmap", HEATMAP.as_bytes()).unwrap();
        let summary = loader.finish().unwrap();

        assert_eq!(summary.time_periods, 1);
        assert_eq!(summary.facts, 2);
        assert_eq!(summary.failed_inserts, 1);
    }

    #[test]
    fn undecodable_heatmap_line_is_skipped() {
        let mut loader = ready_loader();
        loader
            .ingest("heatmap", &b"2013/01/05\t0,0,2\n2013/01/05\t1,\xFF,1\n2013/01/12\t1,0,3\n"[..])
            .unwrap();
        let summary = loader.finish().unwrap();

        assert_eq!(summary.skipped_lines, 1);
        assert_eq!(summary.facts, 2);
        assert_eq!(loader.state(), LoadState::Complete);
    }

    #[test]
    fn failed_fact_count_does_not_fail_finish() {
        let mut loader = flaky(|sql, _| sql.starts_with("SELECT COUNT(*) FROM fact"));
        loader.reset().unwrap();
        loader.load_dimensions(index()).unwrap();
        loader.ingest("heatmap", HEATMAP.as_bytes()).unwrap();

        let summary = loader.finish().unwrap();
        assert_eq!(summary.facts, 3);
        assert_eq!(star::row_count(&mut loader.store.inner, StarTable::Fact).unwrap(), 3);
    }

    #[test]
    fn failed_dimension_insert_is_fatal() {
        let mut loader = flaky(|_, params| params.contains(&SqlValue::from("BURGLARY")));
        loader.reset().unwrap();
        let err = loader.load_dimensions(index()).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Dimension {
                table: StarTable::Category,
                ..
            }
        ));
        assert_eq!(loader.state(), LoadState::Failed);
    }

    #[test]
    fn missing_heatmap_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = ready_loader();
        assert!(matches!(
            loader.ingest_path(&dir.path().join("missing")),
            Err(LoadError::Input(_))
        ));
        assert_eq!(loader.state(), LoadState::Failed);
    }
}
