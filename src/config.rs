//! Show configs, composer settings, and where they are loaded from.

use crate::category::Category;
use crate::error::{Error, Result};
use crate::fit::FitPolicy;
use crate::shuffle::{DEFAULT_JITTER, RecencyCurve};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SETTINGS_FILE: &str = "settings.json";

/// Alias chains deeper than this are treated as a cycle.
pub const MAX_ALIAS_DEPTH: usize = 8;

/// A show's declarative content rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Replacement show name to write back, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Prepend the news bulletin block.
    #[serde(default)]
    pub bulletin: bool,
    /// Weighted categories, drawn round-robin.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<Category>,
    /// Mood words for song selection when no `content` is given.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tracks: Vec<String>,
    /// Mood words for sweeper selection when no `content` is given.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sweepers: Vec<String>,
    /// Alternative config names; one is picked at random in place of this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl Config {
    /// Parse a config from JSON, tolerating HTML-escaped quotes as they come
    /// back from web form fields.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .or_else(|_| serde_json::from_str(&unescape_html(text)))
            .map_err(|e| Error::config(format!("Invalid config JSON: {}", e)))
    }

    pub fn uses_categories(&self) -> bool {
        !self.content.is_empty()
    }
}

fn unescape_html(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Which bulletin qualifies for the bulletin block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulletinPolicy {
    /// Newest bulletin uploaded within `bulletin_max_age_hours`.
    #[default]
    Fresh,
    /// Newest bulletin regardless of age.
    Newest,
}

fn default_max_age() -> f64 {
    24.0
}
fn default_sweeper_ratio() -> f64 {
    0.5
}
fn default_fade() -> f64 {
    0.5
}
fn default_track_offset() -> f64 {
    1.0
}
fn default_jitter() -> f64 {
    DEFAULT_JITTER
}

/// Tunables for the composer. Every field has a default so a partial (or
/// missing) settings file is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposerSettings {
    #[serde(default)]
    pub fit_policy: FitPolicy,
    #[serde(default)]
    pub bulletin_policy: BulletinPolicy,
    #[serde(default = "default_max_age")]
    pub bulletin_max_age_hours: f64,
    #[serde(default)]
    pub recency: RecencyCurve,
    #[serde(default = "default_jitter")]
    pub group_jitter: f64,
    /// Warn when sweepers outnumber this fraction of tracks.
    #[serde(default = "default_sweeper_ratio")]
    pub sweeper_ratio: f64,
    /// Fade in and fade out, seconds.
    #[serde(default = "default_fade")]
    pub fade_secs: f64,
    #[serde(default = "default_track_offset")]
    pub track_offset: f64,
    /// Fixed RNG seed for reproducible playlists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for ComposerSettings {
    fn default() -> Self {
        ComposerSettings {
            fit_policy: FitPolicy::default(),
            bulletin_policy: BulletinPolicy::default(),
            bulletin_max_age_hours: default_max_age(),
            recency: RecencyCurve::default(),
            group_jitter: default_jitter(),
            sweeper_ratio: default_sweeper_ratio(),
            fade_secs: default_fade(),
            track_offset: default_track_offset(),
            seed: None,
        }
    }
}

/// Fades at or beyond this length are rejected.
pub const MAX_FADE_SECS: f64 = 3600.0;

impl ComposerSettings {
    /// Check the values the composer does arithmetic with.
    pub fn validate(&self) -> Result<()> {
        let in_range = |v: f64, max: f64| v.is_finite() && (0.0..max).contains(&v);
        if !in_range(self.fade_secs, MAX_FADE_SECS) {
            return Err(Error::config(format!(
                "fade_secs must be in [0, {}), got {}",
                MAX_FADE_SECS, self.fade_secs
            )));
        }
        if !self.track_offset.is_finite() {
            return Err(Error::config(format!(
                "track_offset must be finite, got {}",
                self.track_offset
            )));
        }
        if !(self.recency.x_lim.is_finite() && self.recency.x_lim > 0.0)
            || !(self.recency.y_lim.is_finite() && self.recency.y_lim > 0.0)
        {
            return Err(Error::config(format!(
                "recency limits must be positive, got x_lim {} y_lim {}",
                self.recency.x_lim, self.recency.y_lim
            )));
        }
        for (name, value) in [
            ("group_jitter", self.group_jitter),
            ("sweeper_ratio", self.sweeper_ratio),
            ("bulletin_max_age_hours", self.bulletin_max_age_hours),
        ] {
            if !in_range(value, f64::INFINITY) {
                return Err(Error::config(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Random source for one composition: seeded if configured.
    pub fn rng(&self) -> fastrand::Rng {
        match self.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        }
    }
}

/// Resolves config names to configs.
pub trait ConfigSource {
    fn load(&self, name: &str) -> Result<Config>;
}

impl ConfigSource for HashMap<String, Config> {
    fn load(&self, name: &str) -> Result<Config> {
        self.get(name)
            .cloned()
            .ok_or_else(|| Error::config(format!("Config '{}' not found", name)))
    }
}

/// Resolve a show's config reference, following aliases.
///
/// A reference starting with `{` is an inline config; anything else is a
/// name looked up in `source`. A config with aliases is replaced by one of
/// them chosen at random.
pub fn resolve(
    reference: &str,
    source: &dyn ConfigSource,
    rng: &mut fastrand::Rng,
) -> Result<Config> {
    let reference = reference.trim();
    let mut config = if reference.starts_with('{') {
        Config::from_json(reference)?
    } else {
        source.load(reference)?
    };

    let mut depth = 0;
    while !config.aliases.is_empty() {
        depth += 1;
        if depth > MAX_ALIAS_DEPTH {
            return Err(Error::config(format!(
                "Config '{}' aliases more than {} levels deep",
                reference, MAX_ALIAS_DEPTH
            )));
        }
        let pick = &config.aliases[rng.usize(..config.aliases.len())];
        debug!(alias = %pick, "following config alias");
        config = source.load(pick)?;
    }
    Ok(config)
}

/// A directory of `<name>.json` show configs plus an optional
/// `settings.json`.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ConfigStore { dir: dir.into() }
    }

    /// `$XDG_CONFIG_HOME/showfill` or the platform equivalent.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("showfill"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load composer settings, or defaults if the file is missing, corrupt or
    /// holds values the composer cannot use.
    pub fn load_settings(&self) -> ComposerSettings {
        let path = self.dir.join(SETTINGS_FILE);
        if path.exists() {
            match fs::read_to_string(&path) {
                Ok(data) => match serde_json::from_str::<ComposerSettings>(&data) {
                    Ok(settings) => match settings.validate() {
                        Ok(()) => return settings,
                        Err(e) => warn!("unusable {}, using defaults: {}", path.display(), e),
                    },
                    Err(e) => warn!("corrupt {}, using defaults: {}", path.display(), e),
                },
                Err(e) => warn!("could not read {}: {}", path.display(), e),
            }
        }
        ComposerSettings::default()
    }

    pub fn save_settings(&self, settings: &ComposerSettings) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| Error::io(&self.dir, e))?;
        let path = self.dir.join(SETTINGS_FILE);
        let json = serde_json::to_string_pretty(settings).map_err(|e| Error::json(&path, e))?;
        fs::write(&path, json).map_err(|e| Error::io(&path, e))
    }

    /// Names of every config in the directory, sorted.
    pub fn names(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| Error::io(&self.dir, e))?;
        let mut names: Vec<String> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().to_string()))
            .filter(|name| name != "settings")
            .collect();
        names.sort();
        Ok(names)
    }
}

impl ConfigSource for ConfigStore {
    fn load(&self, name: &str) -> Result<Config> {
        if name.is_empty() || name.contains(['/', '\\']) || name == ".." {
            return Err(Error::config(format!("Invalid config name '{}'", name)));
        }
        let path = self.dir.join(format!("{}.json", name));
        let data = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::config(format!("Config '{}' not found in {}", name, self.dir.display()))
            } else {
                Error::io(&path, e)
            }
        })?;
        Config::from_json(&data)
    }
}
