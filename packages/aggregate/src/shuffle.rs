//! In-process grouping stage between projection and aggregation.
//!
//! The map phase streams lines through one or more [`Projector`]s and
//! groups the emitted values by key. The reduce phase hash-partitions the
//! keys and runs a [`Reducer`] over each partition on its own blocking
//! task. Partitions share nothing, and keys within a partition are visited
//! in sorted order, so every part file comes out sorted.

use std::collections::BTreeMap;
use std::hash::{DefaultHasher, Hash as _, Hasher as _};
use std::path::PathBuf;
use std::sync::Arc;

use crime_olap_incident_models::ReportLine;

use crate::JobError;
use crate::progress::ProgressCallback;
use crate::projector::Projector;
use crate::report::for_each_line;

/// Values grouped by key, keys in sorted order.
pub type Groups = BTreeMap<String, Vec<String>>;

/// Line counts from one map phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapStats {
    /// Lines read.
    pub lines: u64,
    /// Key/value pairs emitted across all projectors.
    pub emitted: u64,
    /// Header rows skipped.
    pub headers: u64,
    /// Malformed lines dropped (one warning each).
    pub rejected: u64,
}

/// Groups the output of a fixed set of projectors, one [`Groups`] per
/// projector.
pub struct MapPhase<'a> {
    projectors: &'a [Projector],
    groups: Vec<Groups>,
    stats: MapStats,
}

impl<'a> MapPhase<'a> {
    #[must_use]
    pub fn new(projectors: &'a [Projector]) -> Self {
        Self {
            projectors,
            groups: vec![Groups::new(); projectors.len()],
            stats: MapStats::default(),
        }
    }

    /// Projects one line through every projector.
    ///
    /// A header line is skipped quietly. A malformed line is logged once
    /// and dropped; processing carries on with the next line.
    pub fn accept(&mut self, line: &str) {
        self.stats.lines += 1;
        let mut header = false;
        let mut rejection = None;

        for (projector, groups) in self.projectors.iter().zip(&mut self.groups) {
            match projector.project(line) {
                Ok(pair) => {
                    groups.entry(pair.key).or_default().push(pair.value);
                    self.stats.emitted += 1;
                }
                Err(e) if e.is_header() => header = true,
                Err(e) => {
                    rejection.get_or_insert(e);
                }
            }
        }

        if header {
            log::debug!("Skipping header row: {line}");
            self.stats.headers += 1;
        } else if let Some(e) = rejection {
            log::warn!("Dropping row {line:?}: {e}");
            self.stats.rejected += 1;
        }
    }

    /// Counts a line that could not be decoded as UTF-8 as rejected.
    pub fn reject_undecodable(&mut self, bytes: &[u8]) {
        self.stats.lines += 1;
        self.stats.rejected += 1;
        log::warn!(
            "Dropping row that is not UTF-8: {:?}",
            String::from_utf8_lossy(bytes)
        );
    }

    /// Consumes the phase, returning the groups in projector order.
    #[must_use]
    pub fn finish(self) -> (Vec<Groups>, MapStats) {
        (self.groups, self.stats)
    }
}

/// Runs the map phase over every line of `files`.
///
/// # Errors
///
/// Returns [`JobError::Io`] if an input file cannot be read.
pub fn map_files(
    files: &[PathBuf],
    projectors: &[Projector],
    progress: &Arc<dyn ProgressCallback>,
) -> Result<(Vec<Groups>, MapStats), JobError> {
    let mut phase = MapPhase::new(projectors);
    for_each_line(files, |line| {
        match line {
            Ok(line) => phase.accept(line),
            Err(bytes) => phase.reject_undecodable(bytes),
        }
        progress.inc(1);
    })?;
    let (groups, stats) = phase.finish();

    log::info!(
        "Map phase: {} lines, {} pairs, {} header rows, {} rejected",
        stats.lines,
        stats.emitted,
        stats.headers,
        stats.rejected
    );

    Ok((groups, stats))
}

/// Aggregates all values of one key.
///
/// Values arrive in no particular order; an implementation that cares
/// about order sorts them itself.
pub trait Reducer: Send + Sync {
    /// Returns the report values to write for `key`.
    fn reduce(&self, key: &str, values: Vec<String>) -> Vec<String>;
}

/// Partition `key` is assigned to.
#[must_use]
pub fn partition_of(key: &str, partitions: usize) -> usize {
    if partitions <= 1 {
        return 0;
    }
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    #[allow(clippy::cast_possible_truncation)]
    let partition = (hasher.finish() % partitions as u64) as usize;
    partition
}

/// Runs `reducer` over every group, `partitions` groups of keys at a time
/// on blocking tasks. Returns one list of report lines per partition.
///
/// # Errors
///
/// Returns [`JobError::Join`] if a reduce task panics.
pub async fn reduce_partitioned<R: Reducer + 'static>(
    groups: Groups,
    reducer: Arc<R>,
    partitions: usize,
    progress: Arc<dyn ProgressCallback>,
) -> Result<Vec<Vec<ReportLine>>, JobError> {
    let partitions = partitions.max(1);
    progress.set_total(groups.len() as u64);

    let mut assigned: Vec<Vec<(String, Vec<String>)>> = vec![Vec::new(); partitions];
    for (key, values) in groups {
        assigned[partition_of(&key, partitions)].push((key, values));
    }

    let tasks = assigned.into_iter().map(|keys| {
        let reducer = Arc::clone(&reducer);
        let progress = Arc::clone(&progress);
        tokio::task::spawn_blocking(move || {
            let mut lines = Vec::new();
            for (key, values) in keys {
                for value in reducer.reduce(&key, values) {
                    lines.push(ReportLine::new(key.clone(), value));
                }
                progress.inc(1);
            }
            lines
        })
    });

    Ok(futures::future::try_join_all(tasks).await?)
}
