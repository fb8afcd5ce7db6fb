//! Snapshot history.
//!
//! Snapshots are stored one JSON object per line and only ever appended.
//! Reads filter by keyword id and return snapshots oldest first.
//!
//! [`SnapshotStore`] does blocking file I/O. Async callers that share one
//! file go through [`SharedStore`], which serializes access and runs the
//! I/O on the blocking pool.

use crate::error::HistoryError;
use crate::models::RankingSnapshot;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Append-only JSON-lines store of ranking snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a snapshot. Snapshots for one keyword must arrive in time order.
    pub fn append(&self, snapshot: &RankingSnapshot) -> Result<(), HistoryError> {
        if let Some(latest) = self.latest(&snapshot.keyword_id)? {
            if snapshot.timestamp < latest.timestamp {
                return Err(HistoryError::OutOfOrder {
                    keyword_id: snapshot.keyword_id.clone(),
                    timestamp: snapshot.timestamp,
                });
            }
        }

        let mut line = serde_json::to_string(snapshot)?;
        line.push('\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.io_error(source))?;
        file.write_all(line.as_bytes())
            .map_err(|source| self.io_error(source))?;

        debug!(
            "Appended snapshot for '{}' to {}",
            snapshot.keyword_id,
            self.path.display()
        );
        Ok(())
    }

    /// Every stored snapshot, in file order. A missing file is empty history.
    pub fn load_all(&self) -> Result<Vec<RankingSnapshot>, HistoryError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|source| self.io_error(source))?;

        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str(line).map_err(|source| HistoryError::Corrupt {
                    path: self.path.clone(),
                    line: i + 1,
                    source,
                })
            })
            .collect()
    }

    /// Snapshots for one keyword, oldest first.
    pub fn history(&self, keyword_id: &str) -> Result<Vec<RankingSnapshot>, HistoryError> {
        let mut snapshots: Vec<_> = self
            .load_all()?
            .into_iter()
            .filter(|s| s.keyword_id == keyword_id)
            .collect();
        snapshots.sort_by_key(|s| s.timestamp);
        Ok(snapshots)
    }

    pub fn latest(&self, keyword_id: &str) -> Result<Option<RankingSnapshot>, HistoryError> {
        Ok(self.history(keyword_id)?.pop())
    }

    /// Compare against the latest snapshot for the keyword, append, and
    /// return the change with the keyword's full history.
    pub fn record(&self, snapshot: &RankingSnapshot) -> Result<Recorded, HistoryError> {
        let previous = self.latest(&snapshot.keyword_id)?;
        let change = RankChange::between(previous.as_ref(), snapshot.rank);
        self.append(snapshot)?;
        let history = self.history(&snapshot.keyword_id)?;
        Ok(Recorded { change, history })
    }

    fn io_error(&self, source: std::io::Error) -> HistoryError {
        HistoryError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

/// Result of [`SnapshotStore::record`].
#[derive(Debug, Clone)]
pub struct Recorded {
    pub change: RankChange,
    /// Snapshots for the keyword, oldest first, including the new one.
    pub history: Vec<RankingSnapshot>,
}

/// A [`SnapshotStore`] shared between concurrent tracking tasks.
///
/// One record at a time holds the lock, so the read-compare-append
/// sequence is atomic and readers never see a half-written line.
#[derive(Debug, Clone)]
pub struct SharedStore {
    path: PathBuf,
    inner: Arc<Mutex<SnapshotStore>>,
}

impl SharedStore {
    pub fn new(store: SnapshotStore) -> Self {
        Self {
            path: store.path().to_path_buf(),
            inner: Arc::new(Mutex::new(store)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn record(&self, snapshot: RankingSnapshot) -> Result<Recorded, HistoryError> {
        let store = self.inner.lock().await;
        let worker = store.clone();
        tokio::task::spawn_blocking(move || worker.record(&snapshot)).await?
    }
}

/// Movement of the composite rank between two runs. Lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RankChange {
    /// No earlier snapshot, or one side has no data (rank 0).
    NoBaseline,
    Unchanged { rank: u32 },
    Improved { from: u32, to: u32 },
    Dropped { from: u32, to: u32 },
}

impl RankChange {
    pub fn between(previous: Option<&RankingSnapshot>, current_rank: u32) -> Self {
        match previous.map(|p| p.rank) {
            None | Some(0) => RankChange::NoBaseline,
            Some(_) if current_rank == 0 => RankChange::NoBaseline,
            Some(from) if current_rank < from => RankChange::Improved {
                from,
                to: current_rank,
            },
            Some(from) if current_rank > from => RankChange::Dropped {
                from,
                to: current_rank,
            },
            Some(rank) => RankChange::Unchanged { rank },
        }
    }

    /// Whether this change should raise an alert.
    pub fn is_alert(&self) -> bool {
        matches!(self, RankChange::Improved { .. } | RankChange::Dropped { .. })
    }

    pub fn is_drop(&self) -> bool {
        matches!(self, RankChange::Dropped { .. })
    }
}

impl fmt::Display for RankChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RankChange::NoBaseline => write!(f, "no baseline"),
            RankChange::Unchanged { rank } => write!(f, "unchanged at #{}", rank),
            RankChange::Improved { from, to } => write!(f, "improved #{} → #{}", from, to),
            RankChange::Dropped { from, to } => write!(f, "dropped #{} → #{}", from, to),
        }
    }
}
