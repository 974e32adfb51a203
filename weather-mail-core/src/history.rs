//! Bounded, file-backed series of daily snapshots.
//!
//! The file is a pretty-printed JSON array, oldest record first. Reads never fail
//! the caller: a missing or corrupt file is simply "no history". Writes go through
//! a temporary file in the same directory that is renamed over the old one, so a
//! crash mid-write leaves the previous history intact.
//!
//! Two overlapping runs are not coordinated; the last rename wins.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::{error::HistoryError, model::WeatherSnapshot};

/// Records kept on disk; older ones are dropped in append order.
pub const MAX_RECORDS: usize = 30;

/// One persisted day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub date: NaiveDate,
    pub timestamp: DateTime<Utc>,
    pub data: Vec<WeatherSnapshot>,
}

/// Latest prior record, keyed by full location name.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviousDay {
    pub date: NaiveDate,
    pub weather: HashMap<String, WeatherSnapshot>,
}

#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every record so far, oldest first. Empty on first run or unreadable file.
    pub fn load(&self) -> Vec<HistoryRecord> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no history file yet");
            return Vec::new();
        }

        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to read history");
                return Vec::new();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(records) => records,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to parse history");
                Vec::new()
            }
        }
    }

    /// Replace any record for `today` with the given snapshots and trim to
    /// [`MAX_RECORDS`].
    pub fn save_daily_record(
        &self,
        snapshots: &[WeatherSnapshot],
        today: NaiveDate,
    ) -> Result<(), HistoryError> {
        let mut history = self.load();
        history.retain(|record| record.date != today);

        history.push(HistoryRecord {
            date: today,
            timestamp: Utc::now(),
            data: snapshots.to_vec(),
        });

        if history.len() > MAX_RECORDS {
            let excess = history.len() - MAX_RECORDS;
            history.drain(..excess);
        }

        self.write_atomically(&history)?;
        debug!(records = history.len(), %today, "history saved");
        Ok(())
    }

    /// Snapshots from the most recent record that is not `today`.
    ///
    /// This is the last day the job ran, which need not be yesterday.
    pub fn get_previous_day_data(&self, today: NaiveDate) -> Option<PreviousDay> {
        let history = self.load();
        let record = history.into_iter().rev().find(|record| record.date != today)?;

        let weather =
            record.data.into_iter().map(|snapshot| (snapshot.name.clone(), snapshot)).collect();

        Some(PreviousDay { date: record.date, weather })
    }

    fn write_atomically(&self, history: &[HistoryRecord]) -> Result<(), HistoryError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let json = serde_json::to_string_pretty(history)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)?;

        Ok(())
    }
}
