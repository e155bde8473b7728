use crate::config::ComposerSettings;
use crate::duration::runtime;
use crate::item::{Item, ItemKind, Trimmed};
use crate::timecode::format_delta;
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

/// One formatted row of a composed playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub position: usize,
    /// Reference of the source item.
    pub item: String,
    /// Reference of the playlist this row belongs to.
    pub playlist: String,
    pub kind: ItemKind,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cue_in: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cue_out: Option<String>,
    pub clip_length: String,
    pub fade_in: String,
    pub fade_out: String,
    pub track_offset: f64,
}

impl PlaylistEntry {
    pub fn format(
        position: usize,
        item: &Item,
        playlist: &str,
        settings: &ComposerSettings,
    ) -> Self {
        let fade_ms = (settings.fade_secs * 1000.0).round() as i64;
        let fade = format_delta(TimeDelta::milliseconds(fade_ms));
        PlaylistEntry {
            position,
            item: item.id.clone(),
            playlist: playlist.to_string(),
            kind: item.kind,
            title: item.title.clone(),
            artist: item.group.clone(),
            cue_in: item.cue_in.clone(),
            cue_out: item.cue_out.clone(),
            clip_length: format_delta(runtime([item], false)),
            fade_in: fade.clone(),
            fade_out: fade,
            track_offset: settings.track_offset,
        }
    }
}

impl Trimmed for PlaylistEntry {
    fn cue_in(&self) -> Option<&str> {
        self.cue_in.as_deref()
    }

    fn cue_out(&self) -> Option<&str> {
        self.cue_out.as_deref()
    }
}

/// The composer's result for one show.
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub playlist: String,
    pub entries: Vec<PlaylistEntry>,
    /// Final runtime (every item pays its gap).
    pub runtime: TimeDelta,
    /// Show name override from the config.
    pub name: Option<String>,
    /// Show description override from the config.
    pub description: Option<String>,
}

impl Composition {
    pub fn new(playlist: &str, entries: Vec<PlaylistEntry>) -> Self {
        let runtime = runtime(&entries, true);
        Composition {
            playlist: playlist.to_string(),
            entries,
            runtime,
            name: None,
            description: None,
        }
    }

    pub fn count_of(&self, kind: ItemKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    /// Format runtime as H:MM:SS.
    pub fn runtime_display(&self) -> String {
        let secs = self.runtime.num_seconds();
        format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
    }
}

/// A previously stored row, identified by a stable row id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub row: u64,
    #[serde(flatten)]
    pub entry: PlaylistEntry,
}

/// One write needed to turn the stored playlist into the new one.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOp {
    Update { row: u64, entry: PlaylistEntry },
    Create(PlaylistEntry),
    Delete { row: u64 },
    /// Always last: the playlist's total length.
    SetLength(String),
}

/// Pair stored rows (by position) with new entries: rows present on both
/// sides are updated, extra stored rows deleted, extra new entries created.
pub fn plan_sync(old: &[StoredEntry], new: &[PlaylistEntry]) -> Vec<SyncOp> {
    let mut old: Vec<&StoredEntry> = old.iter().collect();
    old.sort_by_key(|s| s.entry.position);

    let mut ops = Vec::with_capacity(old.len().max(new.len()) + 1);
    for i in 0..old.len().max(new.len()) {
        match (old.get(i), new.get(i)) {
            (Some(stored), Some(entry)) => ops.push(SyncOp::Update {
                row: stored.row,
                entry: entry.clone(),
            }),
            (Some(stored), None) => ops.push(SyncOp::Delete { row: stored.row }),
            (None, Some(entry)) => ops.push(SyncOp::Create(entry.clone())),
            (None, None) => {}
        }
    }
    ops.push(SyncOp::SetLength(format_delta(runtime(new, true))));
    ops
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_item(id: &str, secs: i64) -> Item {
        let mut item = Item::new(id, ItemKind::Track);
        item.cue_in = Some("00:00:00".into());
        item.cue_out = Some(format_delta(TimeDelta::seconds(secs)));
        item.group = "X".into();
        item
    }

    fn entry(position: usize, id: &str) -> PlaylistEntry {
        PlaylistEntry::format(position, &make_item(id, 60), "pl/1", &ComposerSettings::default())
    }

    #[test]
    fn format_uses_fixed_fades_and_offset() {
        let e = entry(3, "a");
        assert_eq!(e.position, 3);
        assert_eq!(e.fade_in, "00:00:00.500000");
        assert_eq!(e.fade_out, "00:00:00.500000");
        assert_eq!(e.track_offset, 1.0);
        assert_eq!(e.clip_length, "00:01:00.000000");
        assert_eq!(e.playlist, "pl/1");
        assert_eq!(e.artist, "X");
    }

    #[test]
    fn composition_runtime_is_final() {
        let entries = vec![entry(0, "a"), entry(1, "b")];
        let c = Composition::new("pl/1", entries);
        assert_eq!(c.runtime, TimeDelta::seconds(118));
        assert_eq!(c.runtime_display(), "0:01:58");
        assert_eq!(c.count_of(ItemKind::Track), 2);
    }

    #[test]
    fn sync_updates_then_creates() {
        let old = vec![StoredEntry {
            row: 7,
            entry: entry(0, "old"),
        }];
        let new = vec![entry(0, "a"), entry(1, "b")];
        let ops = plan_sync(&old, &new);
        assert_eq!(ops.len(), 3);
        assert!(matches!(&ops[0], SyncOp::Update { row: 7, entry } if entry.item == "a"));
        assert!(matches!(&ops[1], SyncOp::Create(entry) if entry.item == "b"));
        assert_eq!(ops[2], SyncOp::SetLength("00:01:58.000000".into()));
    }

    #[test]
    fn sync_deletes_leftovers_in_position_order() {
        let old = vec![
            StoredEntry { row: 3, entry: entry(2, "z") },
            StoredEntry { row: 1, entry: entry(0, "x") },
            StoredEntry { row: 2, entry: entry(1, "y") },
        ];
        let new = vec![entry(0, "a")];
        let ops = plan_sync(&old, &new);
        assert!(matches!(&ops[0], SyncOp::Update { row: 1, .. }));
        assert_eq!(ops[1], SyncOp::Delete { row: 2 });
        assert_eq!(ops[2], SyncOp::Delete { row: 3 });
        assert!(matches!(&ops[3], SyncOp::SetLength(_)));
    }

    #[test]
    fn sync_empty_new_list_clears_everything() {
        let old = vec![StoredEntry { row: 1, entry: entry(0, "x") }];
        let ops = plan_sync(&old, &[]);
        assert_eq!(
            ops,
            vec![
                SyncOp::Delete { row: 1 },
                SyncOp::SetLength("00:00:00.000000".into())
            ]
        );
    }

    #[test]
    fn stored_entry_serializes_flat() {
        let stored = StoredEntry { row: 4, entry: entry(0, "a") };
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["row"], 4);
        assert_eq!(json["item"], "a");
        assert_eq!(json["kind"], "SONG");
        let back: StoredEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, stored);
    }
}
