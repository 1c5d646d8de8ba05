// Prediction log - bounded history of confident predictions
//
// Records are kept in memory (newest at the back) and, when a path is
// configured, appended to a JSON-lines file. Opening an existing file reloads
// its most recent records so `/history` survives restarts.

use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::classifier::ClassificationResult;
use crate::config::CONFIDENCE_LOG_THRESHOLD;

/// One logged prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub prediction: String,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    /// Uploaded file name or path the prediction was made for
    #[serde(default)]
    pub audio_file_path: Option<String>,
}

impl PredictionRecord {
    /// Record stamped with the current time at millisecond precision
    pub fn now(prediction: String, confidence: f64, audio_file_path: Option<String>) -> Self {
        let now = Utc::now();
        let timestamp = Utc
            .timestamp_millis_opt(now.timestamp_millis())
            .single()
            .unwrap_or(now);
        Self {
            prediction,
            confidence,
            timestamp,
            audio_file_path,
        }
    }
}

/// Whether a prediction is confident enough to be logged
pub fn is_confident(confidence: f64) -> bool {
    confidence > CONFIDENCE_LOG_THRESHOLD
}

pub struct PredictionLog {
    capacity: usize,
    records: Mutex<VecDeque<PredictionRecord>>,
    path: Option<PathBuf>,
}

impl PredictionLog {
    /// Memory-only log holding at most `capacity` records
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            records: Mutex::new(VecDeque::new()),
            path: None,
        }
    }

    /// File-backed log; the last `capacity` valid lines of `path` are reloaded
    pub fn open<P: AsRef<Path>>(path: P, capacity: usize) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let log = Self {
            path: Some(path.clone()),
            ..Self::in_memory(capacity)
        };

        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            let mut records = log.lock();
            for (line_no, line) in contents.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<PredictionRecord>(line) {
                    Ok(record) => {
                        records.push_back(record);
                        if records.len() > log.capacity {
                            records.pop_front();
                        }
                    }
                    Err(err) => log::warn!(
                        "[PredictionLog] Skipping malformed line {} in {:?}: {}",
                        line_no + 1,
                        path,
                        err
                    ),
                }
            }
            log::info!(
                "[PredictionLog] Reloaded {} records from {:?}",
                records.len(),
                path
            );
        } else if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        Ok(log)
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<PredictionRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| {
            log::error!("[PredictionLog] Lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Append a record to memory and, if configured, to the file
    pub fn append(&self, record: PredictionRecord) -> io::Result<()> {
        let mut records = self.lock();

        if let Some(path) = &self.path {
            let mut line = serde_json::to_string(&record)?;
            line.push('\n');
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            file.write_all(line.as_bytes())?;
        }

        records.push_back(record);
        while records.len() > self.capacity {
            records.pop_front();
        }
        Ok(())
    }

    /// Log `result` if its confidence is strictly above the threshold
    ///
    /// Returns whether a record was written.
    pub fn record_if_confident(
        &self,
        result: &ClassificationResult,
        source: Option<String>,
    ) -> io::Result<bool> {
        if !is_confident(result.confidence) {
            return Ok(false);
        }
        self.append(PredictionRecord::now(
            result.label.clone(),
            result.confidence,
            source,
        ))?;
        Ok(true)
    }

    /// Up to `limit` records, newest first
    pub fn recent(&self, limit: usize) -> Vec<PredictionRecord> {
        self.lock().iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
