//! Non-uniform shuffles: recency-weighted and group-spreading.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;

/// Keys are held this far below `x_lim` so the curve stays finite.
const KEY_CEILING_MARGIN: f64 = 0.01;

/// Default jitter for [`grouped_shuffle`].
pub const DEFAULT_JITTER: f64 = 0.1;

fn default_lim() -> f64 {
    4.0
}

/// Bounded sigmoid mapping a key (typically hours since last play) to a
/// selection weight in `[0, y_lim)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecencyCurve {
    #[serde(default = "default_lim")]
    pub x_lim: f64,
    #[serde(default = "default_lim")]
    pub y_lim: f64,
}

impl Default for RecencyCurve {
    fn default() -> Self {
        RecencyCurve {
            x_lim: default_lim(),
            y_lim: default_lim(),
        }
    }
}

impl RecencyCurve {
    /// `y_lim / (1 + (x / (x_lim - x))^-3)` with `x` clamped to the curve's
    /// domain. Zero at `x = 0`, approaching `y_lim` near `x_lim`.
    pub fn weight(&self, x: f64) -> f64 {
        let x = x.max(0.0).min(self.x_lim - KEY_CEILING_MARGIN);
        self.y_lim / (1.0 + (x / (self.x_lim - x)).powi(-3))
    }

    /// Largest key the curve distinguishes; anything above weighs the same.
    pub fn saturation(&self) -> f64 {
        self.x_lim
    }
}

/// Reorder `items` so higher-weighted ones tend toward the front.
///
/// Each item is keyed `U^(1/w)` with a fresh uniform `U` and sorted
/// descending: weighted sampling without replacement, so a heavy item is
/// likely but never certain to lead. Zero-weight items sink to the back.
pub fn weighted_shuffle<T, F>(
    items: &mut Vec<T>,
    mut key: F,
    curve: RecencyCurve,
    rng: &mut fastrand::Rng,
) where
    F: FnMut(&T) -> f64,
{
    let mut keyed: Vec<(f64, T)> = items
        .drain(..)
        .map(|item| {
            let weight = curve.weight(key(&item));
            (rng.f64().powf(1.0 / weight), item)
        })
        .collect();
    keyed.sort_by(|a, b| b.0.total_cmp(&a.0));
    items.extend(keyed.into_iter().map(|(_, item)| item));
}

/// Synthetic sort keys that spread each group evenly over the unit interval.
///
/// A group of `n` gets spacing `1/(n+1)`, one random phase in
/// `[0, 2 * spacing)`, and per-member jitter in `[-jitter, jitter)`. Members
/// keep their arrival order within the group.
pub fn group_sort_keys<T, K, F>(
    items: &[T],
    group_key: F,
    jitter: f64,
    rng: &mut fastrand::Rng,
) -> Vec<f64>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let groups: Vec<K> = items.iter().map(&group_key).collect();

    let mut sizes: HashMap<&K, usize> = HashMap::new();
    for group in &groups {
        *sizes.entry(group).or_default() += 1;
    }

    // group -> (spacing, offset, members seen)
    let mut phases: HashMap<&K, (f64, f64, usize)> = HashMap::new();
    let mut keys = Vec::with_capacity(items.len());
    for group in &groups {
        let (spacing, offset, seen) = {
            let phase = phases.entry(group).or_insert_with(|| {
                let spacing = 1.0 / (sizes[group] as f64 + 1.0);
                (spacing, rng.f64() * 2.0 * spacing, 0)
            });
            let snapshot = *phase;
            phase.2 += 1;
            snapshot
        };
        let wobble = (rng.f64() * 2.0 - 1.0) * jitter;
        keys.push(offset + seen as f64 * spacing + wobble);
    }
    keys
}

/// Reorder `items` so members of the same group are spread apart.
pub fn grouped_shuffle<T, K, F>(
    items: &mut Vec<T>,
    group_key: F,
    jitter: f64,
    rng: &mut fastrand::Rng,
) where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let keys = group_sort_keys(items, group_key, jitter, rng);
    let mut keyed: Vec<(f64, T)> = keys.into_iter().zip(items.drain(..)).collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
    items.extend(keyed.into_iter().map(|(_, item)| item));
}
