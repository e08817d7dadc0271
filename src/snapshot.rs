use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::Error;

/// A persisted desired-set together with the time it was last refreshed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub media: BTreeSet<PathBuf>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotRecord {
    #[serde(default)]
    media: Vec<PathBuf>,
    #[serde(default)]
    timestamp: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredSnapshot {
    Record(SnapshotRecord),
    Legacy(Vec<PathBuf>),
}

/// JSON file holding one category's snapshot, e.g. the watchlist.
#[derive(Debug, Clone)]
pub struct CacheSnapshotStore {
    path: PathBuf,
}

impl CacheSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or corrupt files load as an empty snapshot.
    pub fn load(&self) -> Snapshot {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Snapshot::default(),
            Err(e) => {
                warn!("Could not read snapshot {}: {}", self.path.display(), e);
                return Snapshot::default();
            }
        };

        match serde_json::from_str::<StoredSnapshot>(&raw) {
            Ok(StoredSnapshot::Record(record)) => Snapshot {
                media: record.media.into_iter().collect(),
                timestamp: record.timestamp.and_then(epoch_to_datetime),
            },
            Ok(StoredSnapshot::Legacy(media)) => Snapshot {
                media: media.into_iter().collect(),
                timestamp: None,
            },
            Err(e) => {
                warn!(
                    "Snapshot {} is corrupt ({}), treating as empty",
                    self.path.display(),
                    e
                );
                Snapshot::default()
            }
        }
    }

    pub fn save<'a>(
        &self,
        media: impl IntoIterator<Item = &'a PathBuf>,
        timestamp: DateTime<Utc>,
    ) -> Result<(), Error> {
        let mut media: Vec<PathBuf> = media.into_iter().cloned().collect();
        media.sort();
        media.dedup();

        let record = SnapshotRecord {
            media,
            timestamp: Some(timestamp.timestamp_millis() as f64 / 1000.0),
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(&record)?)?;
        fs::rename(&tmp, &self.path)?;

        debug!(
            "Saved {} entries to snapshot {}",
            record.media.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Whether the snapshot must be refetched: forced, dry run, missing, or
    /// the file was last written longer than `expiry` ago.
    pub fn is_expired(&self, expiry: Duration, force: bool, dry_run: bool) -> bool {
        if force || dry_run {
            return true;
        }

        let modified = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(modified) => DateTime::<Utc>::from(modified),
            Err(_) => return true,
        };

        Utc::now() - modified > expiry
    }
}

fn epoch_to_datetime(secs: f64) -> Option<DateTime<Utc>> {
    let whole = secs.trunc() as i64;
    let nanos = ((secs - secs.trunc()) * 1e9) as u32;
    DateTime::from_timestamp(whole, nanos)
}
