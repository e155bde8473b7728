use crate::timecode;
use chrono::TimeDelta;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// What role an item plays in a show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ItemKind {
    Track,
    Sweeper,
    Bulletin,
    BulletinIntro,
    #[default]
    Other,
}

impl ItemKind {
    /// Parse a kind tag (case-insensitive). Accepts both the library's
    /// `SONG`/`SWEEP` spelling and plain names. Unknown tags become `Other`.
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "SONG" | "TRACK" => ItemKind::Track,
            "SWEEP" | "SWEEPER" | "JINGLE" => ItemKind::Sweeper,
            "BULLETIN" | "NEWS" => ItemKind::Bulletin,
            "INTRO" | "BULLETIN_INTRO" => ItemKind::BulletinIntro,
            _ => ItemKind::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Track => "SONG",
            ItemKind::Sweeper => "SWEEP",
            ItemKind::Bulletin => "BULLETIN",
            ItemKind::BulletinIntro => "BULLETIN_INTRO",
            ItemKind::Other => "OTHER",
        }
    }
}

impl From<String> for ItemKind {
    fn from(s: String) -> Self {
        ItemKind::from_str_loose(&s)
    }
}

impl From<ItemKind> for String {
    fn from(kind: ItemKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anything with trim points. Lets the duration model work over pool items
/// and formatted playlist entries alike.
pub trait Trimmed {
    fn cue_in(&self) -> Option<&str>;
    fn cue_out(&self) -> Option<&str>;

    /// `|cue_out - cue_in|` truncated to whole milliseconds, or `None` when a
    /// trim point is missing or unparseable.
    fn clip_length(&self) -> Option<TimeDelta> {
        let delta = timecode::parse_delta(self.cue_out()?, self.cue_in()?).ok()?;
        Some(timecode::truncate_to_millis(delta))
    }
}

impl<T: Trimmed + ?Sized> Trimmed for &T {
    fn cue_in(&self) -> Option<&str> {
        (**self).cue_in()
    }

    fn cue_out(&self) -> Option<&str> {
        (**self).cue_out()
    }
}

/// One playable asset in the candidate pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ItemRecord")]
pub struct Item {
    pub id: String,
    pub title: String,
    pub kind: ItemKind,
    /// Spacing key for the grouped shuffle, usually the artist.
    pub group: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cue_in: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cue_out: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_played: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded: Option<String>,
    /// Every other field of the source record, available to category rules.
    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

/// A pool record as it arrives. Library field names (`item_url`,
/// `track_type`, ...) take precedence over the plain ones when a record
/// carries both, and `null` reads as absent.
#[derive(Deserialize)]
struct ItemRecord {
    id: Option<serde_json::Value>,
    item_url: Option<String>,
    title: Option<String>,
    track_title: Option<String>,
    kind: Option<String>,
    track_type: Option<String>,
    group: Option<String>,
    artist_name: Option<String>,
    #[serde(default, deserialize_with = "words_or_list")]
    tags: Vec<String>,
    #[serde(default, deserialize_with = "words_or_list")]
    mood: Vec<String>,
    cue_in: Option<String>,
    cuein: Option<String>,
    cue_out: Option<String>,
    cueout: Option<String>,
    last_played: Option<String>,
    lptime: Option<String>,
    uploaded: Option<String>,
    utime: Option<String>,
    #[serde(flatten)]
    fields: BTreeMap<String, serde_json::Value>,
}

impl TryFrom<ItemRecord> for Item {
    type Error = String;

    fn try_from(r: ItemRecord) -> Result<Self, Self::Error> {
        let id = r
            .item_url
            .or_else(|| r.id.as_ref().and_then(value_as_text))
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| "item record has neither `item_url` nor `id`".to_string())?;
        Ok(Item {
            id,
            title: r.track_title.or(r.title).unwrap_or_default(),
            kind: r
                .track_type
                .or(r.kind)
                .map(|k| ItemKind::from_str_loose(&k))
                .unwrap_or_default(),
            group: r.artist_name.or(r.group).unwrap_or_default(),
            tags: if r.mood.is_empty() { r.tags } else { r.mood },
            cue_in: r.cuein.or(r.cue_in),
            cue_out: r.cueout.or(r.cue_out),
            last_played: r.lptime.or(r.last_played),
            uploaded: r.utime.or(r.uploaded),
            fields: r.fields,
        })
    }
}

impl Item {
    pub fn new(id: impl Into<String>, kind: ItemKind) -> Self {
        Item {
            id: id.into(),
            title: String::new(),
            kind,
            group: String::new(),
            tags: Vec::new(),
            cue_in: None,
            cue_out: None,
            last_played: None,
            uploaded: None,
            fields: BTreeMap::new(),
        }
    }

    /// Look up a field by name for category matching. Well-known names map to
    /// the typed attributes; the rest read the raw field map. Empty values
    /// count as absent.
    pub fn field(&self, name: &str) -> Option<String> {
        let value = match name {
            "kind" | "track_type" => Some(self.kind.as_str().to_string()),
            "group" | "artist_name" => Some(self.group.clone()),
            "tags" | "mood" => Some(self.tags.join(" ")),
            "title" | "track_title" => Some(self.title.clone()),
            _ => self.fields.get(name).and_then(value_as_text),
        };
        value.filter(|v| !v.trim().is_empty())
    }

    /// Format duration as M:SS for listings.
    pub fn duration_display(&self) -> String {
        match self.clip_length() {
            Some(d) => {
                let secs = d.num_seconds();
                format!("{}:{:02}", secs / 60, secs % 60)
            }
            None => "-:--".to_string(),
        }
    }
}

impl Trimmed for Item {
    fn cue_in(&self) -> Option<&str> {
        self.cue_in.as_deref()
    }

    fn cue_out(&self) -> Option<&str> {
        self.cue_out.as_deref()
    }
}

fn value_as_text(value: &serde_json::Value) -> Option<String> {
    use serde_json::Value;
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(values) => Some(
            values
                .iter()
                .filter_map(value_as_text)
                .collect::<Vec<_>>()
                .join(" "),
        ),
        Value::Object(_) => None,
    }
}

/// Accept tags either as a list or as one whitespace separated string.
fn words_or_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Words(String),
        List(Vec<String>),
        Missing(()),
    }

    Ok(match Repr::deserialize(d)? {
        Repr::Words(s) => s.split_whitespace().map(str::to_string).collect(),
        Repr::List(v) => v,
        Repr::Missing(()) => Vec::new(),
    })
}
