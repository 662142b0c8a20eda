use std::fs;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::calendar::WeekKey;
use crate::domain::{Activity, DayJournal, Planner, PlannerError, PlannerHeader, Transaction};

const RECORDS_MARKER: &str = "\n=== RECORDS ===\n";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse TOML header: {0}")]
    TomlDecode(#[from] toml::de::Error),
    #[error("failed to encode TOML header: {0}")]
    TomlEncode(#[from] toml::ser::Error),
    #[error("failed to parse record on line {line}: {source}")]
    JsonDecode {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid record on line {line}: {source}")]
    InvalidRecord {
        line: usize,
        #[source]
        source: PlannerError,
    },
    #[error("failed to encode record: {0}")]
    JsonEncode(#[source] serde_json::Error),
}

/// Persistence boundary for a planner.
///
/// `init` loads (or creates) the planner, `flush` writes the full state,
/// and `teardown` releases whatever the store holds.
pub trait PlannerStore {
    fn init(&mut self) -> Result<Planner, StorageError>;
    fn flush(&mut self, planner: &Planner) -> Result<(), StorageError>;
    fn teardown(&mut self) -> Result<(), StorageError> {
        Ok(())
    }
}

// Externally tagged: integer-keyed maps do not survive serde's buffered
// internally-tagged path.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Record {
    Activity(Activity),
    Journal { date: NaiveDate, entry: DayJournal },
    Achievements { week: WeekKey, items: Vec<String> },
    Transaction(Transaction),
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum RecordRef<'a> {
    Activity(&'a Activity),
    Journal {
        date: &'a NaiveDate,
        entry: &'a DayJournal,
    },
    Achievements {
        week: &'a WeekKey,
        items: &'a [String],
    },
    Transaction(&'a Transaction),
}

pub fn encode_planner(planner: &Planner) -> Result<String, StorageError> {
    let mut out = toml::to_string_pretty(&planner.header)?;
    out.push_str(RECORDS_MARKER);

    let records = planner
        .activities
        .iter()
        .map(RecordRef::Activity)
        .chain(
            planner
                .journals
                .iter()
                .map(|(date, entry)| RecordRef::Journal { date, entry }),
        )
        .chain(
            planner
                .achievements
                .iter()
                .map(|(week, items)| RecordRef::Achievements { week, items }),
        )
        .chain(planner.transactions.iter().map(RecordRef::Transaction));

    for record in records {
        let line = serde_json::to_string(&record).map_err(StorageError::JsonEncode)?;
        out.push_str(&line);
        out.push('\n');
    }

    Ok(out)
}

pub fn decode_planner(raw: &str) -> Result<Planner, StorageError> {
    if raw.trim().is_empty() {
        return Ok(Planner::new());
    }

    let (header_blob, records_blob) = raw.split_once(RECORDS_MARKER).unwrap_or((raw, ""));
    let header: PlannerHeader = toml::from_str(header_blob)?;
    let mut planner = Planner {
        header,
        ..Planner::new()
    };

    let first_line = header_blob.matches('\n').count() + RECORDS_MARKER.matches('\n').count() + 1;
    for (offset, line) in records_blob.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let line_number = first_line + offset;
        let record = serde_json::from_str::<Record>(line).map_err(|source| StorageError::JsonDecode {
            line: line_number,
            source,
        })?;
        match record {
            Record::Activity(activity) => {
                activity.validate().map_err(|source| StorageError::InvalidRecord {
                    line: line_number,
                    source,
                })?;
                planner.activities.push(activity);
            }
            Record::Journal { date, entry } => {
                planner.journals.insert(date, entry);
            }
            Record::Achievements { week, items } => {
                planner.achievements.insert(week, items);
            }
            Record::Transaction(transaction) => planner.transactions.push(transaction),
        }
    }

    Ok(planner)
}

/// Planner file on disk: TOML header, marker line, one JSON record per line.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl PlannerStore for FileStore {
    fn init(&mut self) -> Result<Planner, StorageError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "planner file missing, starting empty");
                return Ok(Planner::new());
            }
            Err(err) => return Err(self.io_error(err)),
        };

        let planner = decode_planner(&raw)?;
        info!(
            path = %self.path.display(),
            activities = planner.activities.len(),
            transactions = planner.transactions.len(),
            "planner loaded"
        );
        Ok(planner)
    }

    fn flush(&mut self, planner: &Planner) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
            }
        }

        let encoded = encode_planner(planner)?;
        let mut file = fs::File::create(&self.path).map_err(|err| self.io_error(err))?;
        file.write_all(encoded.as_bytes())
            .map_err(|err| self.io_error(err))?;
        file.sync_all().map_err(|err| self.io_error(err))?;

        debug!(path = %self.path.display(), bytes = encoded.len(), "planner flushed");
        Ok(())
    }
}

/// Keeps the encoded planner in memory; used by tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    contents: Option<String>,
}

impl MemoryStore {
    pub fn contents(&self) -> Option<&str> {
        self.contents.as_deref()
    }
}

impl PlannerStore for MemoryStore {
    fn init(&mut self) -> Result<Planner, StorageError> {
        match &self.contents {
            Some(raw) => decode_planner(raw),
            None => Ok(Planner::new()),
        }
    }

    fn flush(&mut self, planner: &Planner) -> Result<(), StorageError> {
        self.contents = Some(encode_planner(planner)?);
        Ok(())
    }

    fn teardown(&mut self) -> Result<(), StorageError> {
        self.contents = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{FileStore, MemoryStore, PlannerStore, StorageError};
    use crate::calendar::WeekKey;
    use crate::domain::{NewActivity, NewTransaction, Planner, TransactionKind};

    fn sample_planner() -> Planner {
        let now = Utc.with_ymd_and_hms(2024, 3, 6, 8, 0, 0).unwrap();
        let week = WeekKey::new(10, 2024).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 6).unwrap();

        let mut planner = Planner::new();
        planner.set_utc_offset_minutes(180).unwrap();
        let mut activity = NewActivity::new("رياضة", week);
        activity.selected_days = vec![1, 3];
        let id = planner.add_activity(activity, now).expect("activity should be added");
        planner.set_day_completed(&id, 3, true).unwrap();
        planner.set_positive_note(date, 0, "coffee with a friend").unwrap();
        planner.set_decisions(date, "sleep earlier");
        planner.add_achievement(week, "finished the report").unwrap();
        planner
            .add_transaction(
                NewTransaction {
                    kind: TransactionKind::Income,
                    name: "salary".to_string(),
                    amount: 1200.0,
                    date,
                    create_activity: true,
                },
                now,
            )
            .unwrap();
        planner
    }

    #[test]
    fn round_trips_toml_and_jsonl() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("week.planner");
        let planner = sample_planner();

        let mut store = FileStore::new(&path);
        store.flush(&planner).expect("flush should succeed");
        let loaded = store.init().expect("init should succeed");

        assert_eq!(loaded.header.utc_offset_minutes, 180);
        assert_eq!(loaded.activities, planner.activities);
        assert_eq!(loaded.journals, planner.journals);
        assert_eq!(loaded.achievements, planner.achievements);
        assert_eq!(loaded.transactions, planner.transactions);

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("schema_version = 1"));
        assert!(raw.contains("{\"activity\":{"));
        assert!(raw.contains("\"domainId\":\"health\""));
    }

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut store = FileStore::new(dir.path().join("absent.planner"));
        let planner = store.init().expect("init should succeed");
        assert!(planner.activities.is_empty());
        assert_eq!(planner.header.schema_version, 1);
    }

    #[test]
    fn reports_line_of_malformed_record() {
        let mut store = MemoryStore::default();
        store.flush(&Planner::new()).unwrap();
        let broken = format!("{}{{\"activity\":{{\"id\":\"x\"}}}}\n", store.contents().unwrap());
        let header_lines = store.contents().unwrap().lines().count();

        let err = super::decode_planner(&broken).expect_err("record is incomplete");
        match err {
            StorageError::JsonDecode { line, .. } => assert_eq!(line, header_lines + 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_records_outside_the_week_range() {
        let mut store = MemoryStore::default();
        store.flush(&sample_planner()).unwrap();
        let raw = store.contents().unwrap().to_string();

        let bad_activity = raw.replacen("\"weekNumber\":10", "\"weekNumber\":0", 1);
        assert!(matches!(
            super::decode_planner(&bad_activity),
            Err(StorageError::InvalidRecord { .. })
        ));

        let bad_bucket = raw.replace("\"week\":{\"week\":10", "\"week\":{\"week\":0");
        assert_ne!(bad_bucket, raw);
        assert!(matches!(
            super::decode_planner(&bad_bucket),
            Err(StorageError::JsonDecode { .. })
        ));
    }

    #[test]
    fn memory_store_lifecycle() {
        let mut store = MemoryStore::default();
        assert!(store.init().unwrap().activities.is_empty());

        store.flush(&sample_planner()).unwrap();
        assert_eq!(store.init().unwrap().activities.len(), 2);

        store.teardown().unwrap();
        assert!(store.contents().is_none());
        assert!(store.init().unwrap().transactions.is_empty());
    }
}
