//! Reading and writing `KEY<TAB>VALUE` report files.
//!
//! A job writes its output as a directory holding one `part-NNNNN` file per
//! reduce partition and an empty `_SUCCESS` marker. Readers accept either
//! such a directory or a single file.

use std::fs::File;
use std::io::{BufRead as _, BufReader, BufWriter, Write as _};
use std::path::{Path, PathBuf};

use crime_olap_incident_models::ReportLine;

use crate::JobError;

/// Name of the marker written after every part file is complete.
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// File name of reduce partition `index`.
#[must_use]
pub fn part_file_name(index: usize) -> String {
    format!("part-{index:05}")
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_none_or(|n| n.starts_with('_') || n.starts_with('.'))
}

fn is_part_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("part-"))
}

fn list_dir(dir: &Path, keep: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>, JobError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| JobError::io(dir, e))? {
        let path = entry.map_err(|e| JobError::io(dir, e))?.path();
        if path.is_file() && keep(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Raw input files under `path`: the file itself, or every visible file of
/// a directory in name order.
///
/// # Errors
///
/// Returns [`JobError::Io`] if `path` does not exist or cannot be listed.
pub fn input_files(path: &Path) -> Result<Vec<PathBuf>, JobError> {
    if path.is_dir() {
        list_dir(path, |p| !is_hidden(p))
    } else if path.is_file() {
        Ok(vec![path.to_path_buf()])
    } else {
        Err(JobError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file or directory"),
        ))
    }
}

/// Report files under `path`: the file itself, or the `part-*` files of a
/// job output directory in name order.
///
/// # Errors
///
/// Returns [`JobError::Io`] if `path` does not exist or cannot be listed.
pub fn report_files(path: &Path) -> Result<Vec<PathBuf>, JobError> {
    if path.is_dir() {
        list_dir(path, is_part_file)
    } else {
        input_files(path)
    }
}

/// Calls `f` with every line of `files`, in order, without its line
/// terminator. A line that is not valid UTF-8 is passed as `Err` with its
/// raw bytes so the caller can drop it and carry on.
///
/// # Errors
///
/// Returns [`JobError::Io`] on the first file that cannot be opened or
/// read.
pub fn for_each_line(
    files: &[PathBuf],
    mut f: impl FnMut(Result<&str, &[u8]>),
) -> Result<(), JobError> {
    let mut buf = Vec::new();
    for path in files {
        let file = File::open(path).map_err(|e| JobError::io(path, e))?;
        let mut reader = BufReader::new(file);
        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|e| JobError::io(path, e))?;
            if read == 0 {
                break;
            }
            let bytes = buf.strip_suffix(b"\n").unwrap_or(&buf[..]);
            let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
            f(std::str::from_utf8(bytes).map_err(|_| bytes));
        }
    }
    Ok(())
}

/// Reads every record of a report file or job output directory.
///
/// # Errors
///
/// Returns [`JobError::Io`] if the report cannot be read.
pub fn read_report(path: &Path) -> Result<Vec<ReportLine>, JobError> {
    let files = report_files(path)?;
    let mut lines = Vec::new();
    for_each_line(&files, |line| match line {
        Ok(line) => {
            if let Some(record) = ReportLine::parse(line) {
                lines.push(record);
            }
        }
        Err(bytes) => log::warn!(
            "Skipping report line that is not UTF-8 in {}: {:?}",
            path.display(),
            String::from_utf8_lossy(bytes)
        ),
    })?;
    Ok(lines)
}

/// Writes one part file per partition into `dir`, then the `_SUCCESS`
/// marker. Part files and markers left by an earlier run are replaced.
///
/// Returns the paths of the part files written.
///
/// # Errors
///
/// Returns [`JobError::Io`] if the directory or any file cannot be written.
pub fn write_report(dir: &Path, partitions: &[Vec<ReportLine>]) -> Result<Vec<PathBuf>, JobError> {
    std::fs::create_dir_all(dir).map_err(|e| JobError::io(dir, e))?;

    for stale in list_dir(dir, |p| is_part_file(p) || p.ends_with(SUCCESS_MARKER))? {
        log::debug!("Removing stale output {}", stale.display());
        std::fs::remove_file(&stale).map_err(|e| JobError::io(&stale, e))?;
    }

    let mut written = Vec::with_capacity(partitions.len());
    for (i, lines) in partitions.iter().enumerate() {
        let path = dir.join(part_file_name(i));
        let file = File::create(&path).map_err(|e| JobError::io(&path, e))?;
        let mut writer = BufWriter::new(file);
        for line in lines {
            writeln!(writer, "{line}").map_err(|e| JobError::io(&path, e))?;
        }
        writer.flush().map_err(|e| JobError::io(&path, e))?;
        written.push(path);
    }

    let marker = dir.join(SUCCESS_MARKER);
    File::create(&marker).map_err(|e| JobError::io(&marker, e))?;

    Ok(written)
}
