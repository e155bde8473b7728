use crate::error::{Error, Result};
use crate::playlist::{PlaylistEntry, StoredEntry, SyncOp, plan_sync};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A playlist as last written: rows with stable ids plus total length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredPlaylist {
    pub id: String,
    #[serde(default)]
    pub length: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub entries: Vec<StoredEntry>,
    #[serde(default)]
    next_row: u64,
}

impl StoredPlaylist {
    pub fn new(id: impl Into<String>) -> Self {
        StoredPlaylist {
            id: id.into(),
            next_row: 1,
            ..StoredPlaylist::default()
        }
    }

    /// Entries in position order.
    pub fn ordered(&self) -> Vec<&PlaylistEntry> {
        let mut entries: Vec<&PlaylistEntry> = self.entries.iter().map(|s| &s.entry).collect();
        entries.sort_by_key(|e| e.position);
        entries
    }

    fn row_mut(&mut self, row: u64) -> Result<&mut StoredEntry> {
        self.entries
            .iter_mut()
            .find(|s| s.row == row)
            .ok_or_else(|| Error::UnknownRow {
                playlist: self.id.clone(),
                row,
            })
    }

    /// Apply a sync plan. Ops are applied in order; an op naming an unknown
    /// row stops the run.
    pub fn apply(&mut self, ops: &[SyncOp]) -> Result<()> {
        for op in ops {
            match op {
                SyncOp::Update { row, entry } => {
                    self.row_mut(*row)?.entry = entry.clone();
                }
                SyncOp::Create(entry) => {
                    let after_existing = self.entries.iter().map(|s| s.row + 1).max();
                    let row = self.next_row.max(after_existing.unwrap_or(1)).max(1);
                    self.next_row = row + 1;
                    self.entries.push(StoredEntry {
                        row,
                        entry: entry.clone(),
                    });
                }
                SyncOp::Delete { row } => {
                    let before = self.entries.len();
                    self.entries.retain(|s| s.row != *row);
                    if self.entries.len() == before {
                        return Err(Error::UnknownRow {
                            playlist: self.id.clone(),
                            row: *row,
                        });
                    }
                }
                SyncOp::SetLength(length) => self.length = length.clone(),
            }
        }
        Ok(())
    }
}

/// JSON file holding one stored playlist.
pub struct PlaylistStore {
    path: PathBuf,
    pub playlist: StoredPlaylist,
}

impl PlaylistStore {
    /// Open the store at `path`, starting an empty playlist `id` if the file
    /// does not exist yet.
    pub fn load(path: &Path, id: &str) -> Result<Self> {
        let playlist = if path.exists() {
            let data = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
            let playlist: StoredPlaylist =
                serde_json::from_str(&data).map_err(|e| Error::json(path, e))?;
            if playlist.id != id {
                warn!(
                    stored = %playlist.id,
                    requested = %id,
                    "stored playlist id differs, keeping stored id"
                );
            }
            playlist
        } else {
            StoredPlaylist::new(id)
        };
        Ok(PlaylistStore {
            path: path.to_path_buf(),
            playlist,
        })
    }

    /// Diff the stored rows against `entries` and apply the result.
    pub fn sync(&mut self, entries: &[PlaylistEntry]) -> Result<Vec<SyncOp>> {
        let ops = plan_sync(&self.playlist.entries, entries);
        self.playlist.apply(&ops)?;
        info!(
            ops = ops.len(),
            length = %self.playlist.length,
            "playlist synced"
        );
        Ok(ops)
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(&self.playlist)
            .map_err(|e| Error::json(&self.path, e))?;
        fs::write(&self.path, json).map_err(|e| Error::io(&self.path, e))
    }
}
