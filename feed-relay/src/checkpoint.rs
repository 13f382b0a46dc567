use crate::types::{RelayError, Result};
use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::{debug, info};

const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Publish-time watermark. Entries published at or before it were already relayed.
///
/// Always held at whole-second precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Checkpoint(DateTime<Utc>);

impl Checkpoint {
    /// The watermark of a relay that never ran: every entry is newer.
    pub fn earliest() -> Self {
        Self(DateTime::<Utc>::MIN_UTC)
    }

    pub fn at(time: DateTime<Utc>) -> Self {
        Self(time.trunc_subsecs(0))
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.0
    }

    /// True when `published` lies strictly after the watermark, compared in whole seconds.
    pub fn precedes(&self, published: DateTime<Utc>) -> bool {
        published.trunc_subsecs(0) > self.0
    }

    /// Moves the watermark forward to `time`; never moves it back.
    pub fn advance_to(self, time: DateTime<Utc>) -> Self {
        self.max(Self::at(time))
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DATE_FORMAT))
    }
}

impl FromStr for Checkpoint {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match NaiveDateTime::parse_from_str(s, DATE_FORMAT) {
            Ok(naive) => Ok(Self::at(naive.and_utc())),
            // Hand-edited records sometimes carry an explicit offset.
            Err(err) => DateTime::parse_from_rfc3339(s)
                .map(|dt| Self::at(dt.with_timezone(&Utc)))
                .map_err(|_| err),
        }
    }
}

/// Durable storage for the single checkpoint of a relay.
pub trait CheckpointStore {
    /// Reads the stored watermark, or [`Checkpoint::earliest`] if nothing was stored yet.
    fn load(&self) -> Result<Checkpoint>;

    /// Replaces the stored watermark.
    fn save(&self, checkpoint: Checkpoint) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointRecord {
    last_post_date: String,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

/// JSON file holding `{"last_post_date": "..."}`.
///
/// Fields it does not recognise are carried over from `load` to `save`.
pub struct FileCheckpointStore {
    path: PathBuf,
    extra: Mutex<serde_json::Map<String, serde_json::Value>>,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            extra: Mutex::new(serde_json::Map::new()),
        }
    }

    fn corrupt(&self, reason: impl fmt::Display) -> RelayError {
        RelayError::CorruptCheckpoint {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_atomically(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.temp_path();
        let written = (|| -> std::io::Result<()> {
            let mut temp_file = fs::File::create(&temp_path)?;
            temp_file.write_all(bytes)?;
            temp_file.sync_all()?;
            drop(temp_file);
            fs::rename(&temp_path, &self.path)
        })();

        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        Ok(())
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self) -> Result<Checkpoint> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No checkpoint at {}, starting from scratch", self.path.display());
                return Ok(Checkpoint::earliest());
            }
            Err(e) => return Err(self.corrupt(e)),
        };

        let record: CheckpointRecord =
            serde_json::from_slice(&bytes).map_err(|e| self.corrupt(e))?;
        let checkpoint = record
            .last_post_date
            .parse::<Checkpoint>()
            .map_err(|e| self.corrupt(format!("last_post_date {:?}: {}", record.last_post_date, e)))?;

        *self.extra.lock().unwrap_or_else(|e| e.into_inner()) = record.extra;

        debug!("Loaded checkpoint {} from {}", checkpoint, self.path.display());
        Ok(checkpoint)
    }

    fn save(&self, checkpoint: Checkpoint) -> Result<()> {
        let record = CheckpointRecord {
            last_post_date: checkpoint.to_string(),
            extra: self.extra.lock().unwrap_or_else(|e| e.into_inner()).clone(),
        };
        let bytes = serde_json::to_vec(&record)?;

        self.write_atomically(&bytes)?;

        info!("Saved checkpoint {} to {}", checkpoint, self.path.display());
        Ok(())
    }
}
