//! # Analysis Report Log
//!
//! Appends one JSON line per analysed flight to rotating JSONL files.
//!
//! Files are named `analysis_<n>.jsonl` with a monotonically increasing
//! sequence number. A new file is started after `max_records_per_file`
//! records, and only the newest `max_files_to_keep` files are retained.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::ReportConfig;
use crate::error::Result;
use crate::service::UploadResponse;
use crate::session::SessionId;
use crate::telemetry::labels::{CanonicalLabel, Dialect};
use crate::telemetry::metrics::MetricsMap;

const FILE_PREFIX: &str = "analysis_";
const FILE_EXTENSION: &str = "jsonl";

/// One report line
#[derive(Debug, Clone, Serialize)]
pub struct ReportRecord<'a> {
    pub timestamp: DateTime<Utc>,
    pub session_id: SessionId,
    /// Where the telemetry came from (file path, upload name)
    pub source: &'a str,
    pub dialects: &'a [Dialect],
    pub metrics: &'a MetricsMap,
    pub residual_labels: Vec<CanonicalLabel>,
}

impl<'a> ReportRecord<'a> {
    /// Record for an answered upload
    pub fn from_upload(source: &'a str, response: &'a UploadResponse) -> Self {
        Self {
            timestamp: Utc::now(),
            session_id: response.session_id,
            source,
            dialects: &response.dialects,
            metrics: &response.metrics,
            residual_labels: response.filtered_info.labels().collect(),
        }
    }
}

/// Rotating JSONL writer for analysis reports
#[derive(Debug)]
pub struct ReportLogger {
    dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    sequence: u64,
    records_in_file: usize,
    file: Option<File>,
}

impl ReportLogger {
    /// Open the report directory, continuing the newest existing file
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created or read
    pub fn open(config: &ReportConfig) -> Result<Self> {
        let dir = PathBuf::from(&config.log_dir);
        fs::create_dir_all(&dir)?;

        let mut logger = Self {
            dir,
            max_records_per_file: config.max_records_per_file.max(1),
            max_files_to_keep: config.max_files_to_keep.max(1),
            sequence: 0,
            records_in_file: 0,
            file: None,
        };

        if let Some(&newest) = logger.existing_sequences()?.last() {
            logger.sequence = newest;
            logger.records_in_file = count_lines(&logger.path_for(newest))?;
        }

        debug!(
            "Report log at {} (file #{}, {} records)",
            logger.dir.display(),
            logger.sequence,
            logger.records_in_file
        );
        Ok(logger)
    }

    /// Append a record, rotating first if the current file is full
    pub fn append(&mut self, record: &ReportRecord<'_>) -> Result<()> {
        if self.file.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }

        let line = serde_json::to_string(record)?;
        if let Some(file) = self.file.as_mut() {
            writeln!(file, "{}", line)?;
            file.flush()?;
        }
        self.records_in_file += 1;
        Ok(())
    }

    /// Path of the file currently written to
    pub fn current_path(&self) -> PathBuf {
        self.path_for(self.sequence)
    }

    fn rotate(&mut self) -> Result<()> {
        if self.sequence == 0 || self.records_in_file >= self.max_records_per_file {
            self.sequence += 1;
            self.records_in_file = 0;
        }

        let path = self.current_path();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        self.file = Some(file);
        debug!("Writing reports to {}", path.display());

        self.prune()
    }

    fn prune(&self) -> Result<()> {
        let sequences = self.existing_sequences()?;
        if sequences.len() <= self.max_files_to_keep {
            return Ok(());
        }

        let excess = sequences.len() - self.max_files_to_keep;
        for sequence in &sequences[..excess] {
            let path = self.path_for(*sequence);
            if let Err(e) = fs::remove_file(&path) {
                warn!("Failed to remove old report {}: {}", path.display(), e);
            }
        }
        Ok(())
    }

    fn path_for(&self, sequence: u64) -> PathBuf {
        self.dir
            .join(format!("{}{:06}.{}", FILE_PREFIX, sequence, FILE_EXTENSION))
    }

    /// Sequence numbers of report files on disk, ascending
    fn existing_sequences(&self) -> Result<Vec<u64>> {
        let mut sequences: Vec<u64> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| parse_sequence(&entry.path()))
            .collect();
        sequences.sort_unstable();
        Ok(sequences)
    }
}

fn parse_sequence(path: &Path) -> Option<u64> {
    if path.extension()?.to_str()? != FILE_EXTENSION {
        return None;
    }
    path.file_stem()?
        .to_str()?
        .strip_prefix(FILE_PREFIX)?
        .parse()
        .ok()
}

fn count_lines(path: &Path) -> Result<usize> {
    let file = File::open(path)?;
    Ok(BufReader::new(file).lines().count())
}
