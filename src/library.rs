//! Builds a candidate pool from a folder of audio files.
//!
//! Layout: `<root>/<kind>/...`, where the top folder names the item kind
//! (`tracks`, `sweepers`, `bulletins`, `intros` and their synonyms). Files
//! outside a recognised folder come in as [`ItemKind::Other`].

use crate::error::{Error, Result};
use crate::item::{Item, ItemKind};
use crate::timecode::format_delta;
use chrono::{DateTime, TimeDelta, Utc};
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::tag::Accessor;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const AUDIO_EXTENSIONS: [&str; 8] = ["mp3", "flac", "ogg", "opus", "wav", "m4a", "aac", "aiff"];

fn kind_for_folder(name: &str) -> ItemKind {
    match name.to_ascii_lowercase().as_str() {
        "tracks" | "songs" | "music" => ItemKind::Track,
        "sweepers" | "jingles" | "idents" => ItemKind::Sweeper,
        "bulletins" | "news" => ItemKind::Bulletin,
        "intros" | "bulletin_intros" => ItemKind::BulletinIntro,
        _ => ItemKind::Other,
    }
}

fn is_audio(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|e| AUDIO_EXTENSIONS.contains(&e.as_str()))
}

/// Scan `root` recursively. Files whose tags or properties cannot be read
/// are skipped with a warning; an unreadable `root` is an error.
pub fn scan(root: &Path) -> Result<Vec<Item>> {
    let mut files = Vec::new();
    collect_audio(root, &mut files)?;
    files.sort();

    let mut items = Vec::with_capacity(files.len());
    for path in &files {
        let kind = path
            .strip_prefix(root)
            .ok()
            .and_then(|rel| rel.components().next())
            .filter(|_| path.parent() != Some(root))
            .map(|top| kind_for_folder(&top.as_os_str().to_string_lossy()))
            .unwrap_or_default();
        match read_item(path, kind) {
            Ok(item) => items.push(item),
            Err(e) => warn!("skipping {}: {}", path.display(), e),
        }
    }
    info!(root = %root.display(), items = items.len(), "library scanned");
    Ok(items)
}

fn collect_audio(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_audio(&path, files)?;
        } else if is_audio(&path) {
            files.push(path);
        } else {
            debug!(path = %path.display(), "not an audio file");
        }
    }
    Ok(())
}

/// Read one audio file into a pool item trimmed to its full length.
pub fn read_item(path: &Path, kind: ItemKind) -> Result<Item> {
    let tagged_file = lofty::read_from_path(path).map_err(|e| Error::Audio {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let length = tagged_file.properties().duration();
    let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag());

    let mut item = Item::new(path.to_string_lossy(), kind);
    item.title = tag
        .and_then(|t| t.title().map(|s| s.to_string()))
        .unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default()
        });
    item.group = tag
        .and_then(|t| t.artist().map(|s| s.to_string()))
        .unwrap_or_default();
    item.tags = tag
        .and_then(|t| t.genre().map(|s| s.to_string()))
        .map(|genre| genre.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();

    let millis = i64::try_from(length.as_millis()).unwrap_or(i64::MAX);
    item.cue_in = Some("00:00:00".to_string());
    item.cue_out = Some(format_delta(TimeDelta::milliseconds(millis)));
    item.uploaded = fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(|t| {
            DateTime::<Utc>::from(t)
                .naive_utc()
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        });
    Ok(item)
}
