//! Category filtering and the weighted round-robin item stream.

use crate::error::{Error, Result};
use crate::item::Item;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// How a category compares a constraint against an item field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Field value equals the constraint value.
    #[default]
    Exact,
    /// Field value shares at least one word with the constraint value.
    Fuzzy,
}

/// A constraint value: one string, or a list of acceptable alternatives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Wanted {
    One(String),
    Any(Vec<String>),
}

impl Wanted {
    fn values(&self) -> &[String] {
        match self {
            Wanted::One(s) => std::slice::from_ref(s),
            Wanted::Any(v) => v,
        }
    }
}

fn default_weight() -> f64 {
    1.0
}

/// A named filter over the pool plus its relative draw weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub mode: MatchMode,
    /// Field name -> required value. Every entry must hold.
    #[serde(default, rename = "where")]
    pub constraints: BTreeMap<String, Wanted>,
}

impl Category {
    pub fn new(name: impl Into<String>, weight: f64, mode: MatchMode) -> Self {
        Category {
            name: name.into(),
            weight,
            mode,
            constraints: BTreeMap::new(),
        }
    }

    /// Builder-style helper for adding a single-value constraint.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.constraints
            .insert(field.into(), Wanted::One(value.into()));
        self
    }

    pub fn matches(&self, item: &Item) -> bool {
        self.constraints.iter().all(|(field, wanted)| {
            let Some(value) = item.field(field) else {
                return false;
            };
            match self.mode {
                MatchMode::Exact => wanted.values().iter().any(|w| *w == value),
                MatchMode::Fuzzy => wanted.values().iter().any(|w| any_common(w, &value)),
            }
        })
    }
}

/// Normalised words of a value: lower-cased, punctuation stripped, split on
/// whitespace and list separators.
pub fn tokens(s: &str) -> BTreeSet<String> {
    s.split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | '/'))
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// True if the two values share at least one word.
pub fn any_common(a: &str, b: &str) -> bool {
    let left = tokens(a);
    tokens(b).iter().any(|t| left.contains(t))
}

/// A category's matches as indices into the pool, read round-robin.
#[derive(Debug)]
struct Ring {
    name: String,
    members: Vec<usize>,
    head: usize,
}

impl Ring {
    fn advance(&mut self) -> usize {
        let index = self.members[self.head];
        self.head = (self.head + 1) % self.members.len();
        index
    }
}

/// Endless stream of pool items. Each draw picks a category with probability
/// proportional to its weight and takes the next item of that category's ring.
///
/// The stream never ends on its own; callers bound it (see `fit::fit_stream`).
/// It is single-use: there is no way to rewind the rings.
#[derive(Debug)]
pub struct CategoryStream<'a, T> {
    pool: &'a [T],
    rings: Vec<Ring>,
    cumulative: Vec<f64>,
    total_weight: f64,
    rng: fastrand::Rng,
}

impl<'a, T: Borrow<Item>> CategoryStream<'a, T> {
    /// Partition `pool` by `categories`. Fails if any category matches nothing
    /// or the weights cannot be drawn from.
    pub fn new(categories: &[Category], pool: &'a [T], rng: fastrand::Rng) -> Result<Self> {
        if categories.is_empty() {
            return Err(Error::config("Config has no content categories"));
        }

        let mut rings = Vec::with_capacity(categories.len());
        let mut cumulative = Vec::with_capacity(categories.len());
        let mut total_weight = 0.0;

        for category in categories {
            if !category.weight.is_finite() || category.weight < 0.0 {
                return Err(Error::config(format!(
                    "Category '{}' has invalid weight {}",
                    category.name, category.weight
                )));
            }

            let members: Vec<usize> = pool
                .iter()
                .enumerate()
                .filter(|(_, item)| category.matches(<T as Borrow<Item>>::borrow(*item)))
                .map(|(i, _)| i)
                .collect();
            if members.is_empty() {
                return Err(Error::config(format!(
                    "Category '{}' matches no items",
                    category.name
                )));
            }
            debug!(
                category = %category.name,
                matches = members.len(),
                weight = category.weight,
                "category pooled"
            );

            total_weight += category.weight;
            cumulative.push(total_weight);
            rings.push(Ring {
                name: category.name.clone(),
                members,
                head: 0,
            });
        }

        if total_weight <= 0.0 {
            return Err(Error::config("All category weights are zero"));
        }

        Ok(CategoryStream {
            pool,
            rings,
            cumulative,
            total_weight,
            rng,
        })
    }

    /// Number of pool items each category matched, in config order.
    pub fn category_sizes(&self) -> Vec<(&str, usize)> {
        self.rings
            .iter()
            .map(|r| (r.name.as_str(), r.members.len()))
            .collect()
    }

    fn pick_category(&mut self) -> usize {
        let x = self.rng.f64() * self.total_weight;
        self.cumulative
            .partition_point(|&c| c <= x)
            .min(self.rings.len() - 1)
    }
}

impl<'a, T: Borrow<Item>> Iterator for CategoryStream<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let category = self.pick_category();
        let index = self.rings[category].advance();
        let pool = self.pool;
        Some(&pool[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemKind;

    fn item(id: &str, kind: ItemKind, mood: &str) -> Item {
        let mut item = Item::new(id, kind);
        item.tags = mood.split_whitespace().map(str::to_string).collect();
        item
    }

    fn pool() -> Vec<Item> {
        vec![
            item("s1", ItemKind::Track, "chill"),
            item("w1", ItemKind::Sweeper, "station"),
            item("s2", ItemKind::Track, "Upbeat, summer"),
            item("s3", ItemKind::Track, "chill night"),
            item("w2", ItemKind::Sweeper, "station"),
        ]
    }

    #[test]
    fn tokens_normalise() {
        let t = tokens("Chill, Late-Night; jazz/Soul!");
        let expected: BTreeSet<String> = ["chill", "latenight", "jazz", "soul"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(t, expected);
    }

    #[test]
    fn any_common_overlap() {
        assert!(any_common("chill upbeat", "Upbeat!"));
        assert!(!any_common("chill", "upbeat"));
        assert!(!any_common("", "chill"));
    }

    #[test]
    fn exact_match_by_kind() {
        let cat = Category::new("sweep", 1.0, MatchMode::Exact).with("track_type", "SWEEP");
        let hits: Vec<_> = pool().into_iter().filter(|i| cat.matches(i)).collect();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn fuzzy_match_by_mood() {
        let cat = Category::new("chill", 1.0, MatchMode::Fuzzy)
            .with("track_type", "song")
            .with("mood", "CHILL, ambient");
        let ids: Vec<String> = pool()
            .into_iter()
            .filter(|i| cat.matches(i))
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec!["s1", "s3"]);
    }

    #[test]
    fn exact_match_any_of_list() {
        let mut cat = Category::new("songs", 1.0, MatchMode::Exact);
        cat.constraints.insert(
            "artist_name".into(),
            Wanted::Any(vec!["A".into(), "B".into()]),
        );
        let mut a = Item::new("a", ItemKind::Track);
        a.group = "B".into();
        let mut c = Item::new("c", ItemKind::Track);
        c.group = "C".into();
        assert!(cat.matches(&a));
        assert!(!cat.matches(&c));
    }

    #[test]
    fn missing_field_fails_constraint() {
        let cat = Category::new("rock", 1.0, MatchMode::Fuzzy).with("genre", "rock");
        assert!(!cat.matches(&item("x", ItemKind::Track, "rock")));
    }

    #[test]
    fn empty_category_is_a_configuration_error() {
        let pool = pool();
        let cats = vec![
            Category::new("songs", 1.0, MatchMode::Exact).with("track_type", "SONG"),
            Category::new("rock", 1.0, MatchMode::Exact).with("genre", "rock"),
        ];
        let err = CategoryStream::new(&cats, &pool, fastrand::Rng::with_seed(1)).unwrap_err();
        assert!(matches!(err, Error::Configuration(msg) if msg.contains("rock")));
    }

    #[test]
    fn invalid_weights_rejected() {
        let pool = pool();
        let negative = vec![Category::new("all", -1.0, MatchMode::Exact)];
        assert!(CategoryStream::new(&negative, &pool, fastrand::Rng::with_seed(1)).is_err());
        let zero = vec![Category::new("all", 0.0, MatchMode::Exact)];
        assert!(CategoryStream::new(&zero, &pool, fastrand::Rng::with_seed(1)).is_err());
        assert!(CategoryStream::new(&[], &pool, fastrand::Rng::with_seed(1)).is_err());
    }

    #[test]
    fn single_category_cycles_through_matches() {
        let pool = pool();
        let cats = vec![Category::new("songs", 1.0, MatchMode::Exact).with("track_type", "SONG")];
        let stream = CategoryStream::new(&cats, &pool, fastrand::Rng::with_seed(7)).unwrap();
        let ids: Vec<&str> = stream.take(7).map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2", "s3", "s1", "s2", "s3", "s1"]);
    }

    #[test]
    fn weighted_draw_ratio() {
        let pool = pool();
        let cats = vec![
            Category::new("sweep", 1.0, MatchMode::Exact).with("track_type", "SWEEP"),
            Category::new("song", 4.0, MatchMode::Exact).with("track_type", "SONG"),
        ];
        let stream = CategoryStream::new(&cats, &pool, fastrand::Rng::with_seed(42)).unwrap();
        let (mut songs, mut sweeps) = (0u32, 0u32);
        for item in stream.take(1000) {
            match item.kind {
                ItemKind::Track => songs += 1,
                ItemKind::Sweeper => sweeps += 1,
                _ => unreachable!(),
            }
        }
        assert_eq!(songs + sweeps, 1000);
        let ratio = songs as f64 / sweeps as f64;
        assert!(ratio > 3.0 && ratio < 5.5, "ratio {ratio}");
    }

    #[test]
    fn zero_weight_category_never_drawn() {
        let pool = pool();
        let cats = vec![
            Category::new("sweep", 0.0, MatchMode::Exact).with("track_type", "SWEEP"),
            Category::new("song", 1.0, MatchMode::Exact).with("track_type", "SONG"),
        ];
        let stream = CategoryStream::new(&cats, &pool, fastrand::Rng::with_seed(3)).unwrap();
        assert!(stream.take(200).all(|i| i.kind == ItemKind::Track));
    }

    #[test]
    fn streams_over_borrowed_items() {
        let pool = pool();
        let refs: Vec<&Item> = pool.iter().collect();
        let cats = vec![Category::new("sweep", 1.0, MatchMode::Exact).with("track_type", "SWEEP")];
        let stream = CategoryStream::new(&cats, &refs, fastrand::Rng::with_seed(3)).unwrap();
        let ids: Vec<&str> = stream.copied().take(3).map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["w1", "w2", "w1"]);
        assert_eq!(
            CategoryStream::new(&cats, &refs, fastrand::Rng::with_seed(3))
                .unwrap()
                .category_sizes(),
            vec![("sweep", 2)]
        );
    }

    #[test]
    fn category_deserializes_with_defaults() {
        let json = r#"{"name": "songs", "where": {"track_type": "SONG", "mood": ["chill", "warm"]}}"#;
        let cat: Category = serde_json::from_str(json).unwrap();
        assert_eq!(cat.weight, 1.0);
        assert_eq!(cat.mode, MatchMode::Exact);
        assert_eq!(
            cat.constraints.get("mood"),
            Some(&Wanted::Any(vec!["chill".into(), "warm".into()]))
        );
    }
}
