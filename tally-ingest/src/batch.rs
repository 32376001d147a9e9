//! Parsing many files at once.
//!
//! Each file runs its own [`ParseSession`](crate::pipeline::ParseSession);
//! a file that is skipped or fails never stops the others.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use tally_core::{Transaction, TransactionTable};

use crate::detect::Detector;
use crate::error::{IngestError, Result};
use crate::pipeline::parse_file;

/// What happened to one file.
#[derive(Debug)]
pub enum FileOutcome {
    Parsed(TransactionTable),
    /// No handler recognised the file.
    Skipped,
    Failed(IngestError),
}

pub fn parse_one(path: &Path, detector: &Detector) -> FileOutcome {
    match parse_file(path, detector) {
        Ok(table) => FileOutcome::Parsed(table),
        Err(IngestError::NoHandler(_)) => FileOutcome::Skipped,
        Err(e) => FileOutcome::Failed(e),
    }
}

/// Outcome of a batch, every list ordered by path.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub tables: BTreeMap<PathBuf, TransactionTable>,
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, IngestError)>,
}

impl BatchReport {
    pub fn record(&mut self, path: PathBuf, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Parsed(table) => {
                self.tables.insert(path, table);
            }
            FileOutcome::Skipped => self.skipped.push(path),
            FileOutcome::Failed(e) => self.failed.push((path, e)),
        }
    }

    fn sort(&mut self) {
        self.skipped.sort();
        self.failed.sort_by(|a, b| a.0.cmp(&b.0));
    }

    pub fn files_seen(&self) -> usize {
        self.tables.len() + self.skipped.len() + self.failed.len()
    }

    pub fn total_rows(&self) -> usize {
        self.tables.values().map(TransactionTable::len).sum()
    }

    /// Every parsed row, file by file.
    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.tables.values().flat_map(|t| t.rows.iter())
    }

    /// Failures caused by overlapping handler signatures rather than bad data.
    pub fn configuration_faults(&self) -> Vec<&(PathBuf, IngestError)> {
        self.failed
            .iter()
            .filter(|(_, e)| e.is_configuration_fault())
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Regular files directly inside `dir`, sorted.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let io_err = |source| IngestError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut out = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

/// Parse files one after another.
pub fn parse_paths<I, P>(paths: I, detector: &Detector) -> BatchReport
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    let mut report = BatchReport::default();
    for path in paths {
        let path = path.into();
        let outcome = parse_one(&path, detector);
        report.record(path, outcome);
    }
    report.sort();
    report
}

pub fn parse_directory(dir: &Path, detector: &Detector) -> Result<BatchReport> {
    Ok(parse_paths(list_files(dir)?, detector))
}

/// Parse files on blocking worker threads, at most `workers` at a time.
///
/// The report is the same as [`parse_paths`] would produce.
pub async fn parse_paths_concurrent(
    paths: Vec<PathBuf>,
    detector: &Detector,
    workers: usize,
) -> Result<BatchReport> {
    let permits = Arc::new(Semaphore::new(workers.max(1)));
    let mut tasks = JoinSet::new();

    for path in paths {
        let permit = permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| IngestError::Worker(e.to_string()))?;
        let detector = detector.clone();
        tasks.spawn_blocking(move || {
            let _permit = permit;
            let outcome = parse_one(&path, &detector);
            (path, outcome)
        });
    }

    let mut report = BatchReport::default();
    while let Some(joined) = tasks.join_next().await {
        let (path, outcome) = joined.map_err(|e| IngestError::Worker(e.to_string()))?;
        report.record(path, outcome);
    }
    report.sort();
    Ok(report)
}
