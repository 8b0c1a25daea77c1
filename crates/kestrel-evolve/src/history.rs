//! Run history: append-only JSON Lines, one file per run. Every append is
//! flushed, so a crash mid-run leaves a valid prefix.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::EvolveError;

/// Summary of one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub generation: u32,
    pub best_score: f64,
    pub mean_score: f64,
    pub best_genome_id: String,
    pub timestamp: DateTime<Utc>,
}

pub struct HistoryLog {
    file: File,
    path: PathBuf,
}

impl HistoryLog {
    /// Creates `history/<run_id>.log` under the given directory.
    pub fn create(dir: &Path, run_id: &str) -> Result<Self, EvolveError> {
        fs::create_dir_all(dir)
            .map_err(|e| EvolveError::History(format!("create {}: {e}", dir.display())))?;
        let path = dir.join(format!("{run_id}.log"));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| EvolveError::History(format!("open {}: {e}", path.display())))?;
        Ok(Self { file, path })
    }

    /// Appends one complete record and flushes it to disk.
    pub fn append(&mut self, record: &GenerationRecord) -> Result<(), EvolveError> {
        let line = serde_json::to_string(record)
            .map_err(|e| EvolveError::History(format!("serialize record: {e}")))?;
        writeln!(self.file, "{line}")
            .and_then(|_| self.file.flush())
            .map_err(|e| EvolveError::History(format!("append {}: {e}", self.path.display())))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Reads a history file back, in append order.
pub fn read_history(path: &Path) -> Result<Vec<GenerationRecord>, EvolveError> {
    let file = File::open(path)
        .map_err(|e| EvolveError::History(format!("open {}: {e}", path.display())))?;
    let mut records = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| EvolveError::History(format!("read {}: {e}", path.display())))?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line)
            .map_err(|e| EvolveError::History(format!("parse {}: {e}", path.display())))?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(generation: u32, best_score: f64) -> GenerationRecord {
        GenerationRecord {
            generation,
            best_score,
            mean_score: best_score - 0.1,
            best_genome_id: format!("genome-{generation}"),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn append_then_read_preserves_order_and_content() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = HistoryLog::create(dir.path(), "run-1").unwrap();

        let records = vec![record(0, 0.5), record(1, 0.7), record(2, 0.9)];
        for r in &records {
            log.append(r).unwrap();
        }

        let read = read_history(log.path()).unwrap();
        assert_eq!(read, records);
        assert_eq!(read.last().unwrap(), &records[2]);
    }

    #[test]
    fn a_partial_file_of_complete_lines_reads_fine() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = HistoryLog::create(dir.path(), "run-2").unwrap();
        log.append(&record(0, 0.4)).unwrap();

        // Simulates a crash after one complete append.
        let read = read_history(log.path()).unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].generation, 0);
    }
}
