//! Trim a stream or list of items to a target runtime.

use crate::duration::{RuntimeTally, runtime};
use crate::error::{Error, Result};
use crate::item::Trimmed;
use crate::timecode::format_delta;
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Upper bound on items drawn from an endless stream before giving up.
pub const FIT_ITEM_LIMIT: usize = 10_000;

/// What to do with the item that carries the runtime past the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitPolicy {
    /// Drop it: the result stays at or under the target.
    Under,
    /// Keep it: the result reaches the target, overshooting by at most one item.
    #[default]
    Over,
}

impl fmt::Display for FitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitPolicy::Under => write!(f, "under"),
            FitPolicy::Over => write!(f, "over"),
        }
    }
}

impl FitPolicy {
    pub fn from_str_loose(s: &str) -> std::result::Result<Self, String> {
        match s.to_lowercase().as_str() {
            "under" => Ok(FitPolicy::Under),
            "over" => Ok(FitPolicy::Over),
            _ => Err(format!("Unknown fit policy '{}'. Expected: under, over", s)),
        }
    }
}

fn unfittable(source_name: &str, target: TimeDelta) -> Error {
    Error::Unfittable {
        source_name: source_name.to_string(),
        target: format_delta(target),
    }
}

/// Pull items until the accumulated runtime reaches `target`.
///
/// A finite source that runs dry returns what it produced. An endless source
/// that has not reached the target after [`FIT_ITEM_LIMIT`] items is
/// unfittable.
pub fn fit_stream<T, I>(source: I, target: TimeDelta, policy: FitPolicy) -> Result<Vec<T>>
where
    T: Trimmed,
    I: IntoIterator<Item = T>,
{
    let mut source = source.into_iter();
    let mut fitted = Vec::new();
    let mut tally = RuntimeTally::default();

    while tally.total(false) < target {
        if fitted.len() >= FIT_ITEM_LIMIT {
            return Err(unfittable("item stream", target));
        }
        let Some(item) = source.next() else {
            break;
        };
        tally.push(&item);
        if policy == FitPolicy::Under && tally.total(false) > target {
            break;
        }
        fitted.push(item);
    }
    Ok(fitted)
}

/// Fit a finite list, repeating it as often as needed.
///
/// Walks prefixes of the repeated list and stops at the first one whose
/// runtime exceeds `target`; [`FitPolicy::Under`] drops that final item. If
/// no prefix exceeds the target the whole repeated list is returned.
pub fn fit_list<T: Trimmed + Clone>(
    items: &[T],
    target: TimeDelta,
    policy: FitPolicy,
) -> Result<Vec<T>> {
    if items.is_empty() {
        return Ok(Vec::new());
    }
    // Each extra pass over the list adds its clips minus one gap per item.
    if runtime(items, false) < target && runtime(items, true) <= TimeDelta::zero() {
        return Err(unfittable("item list", target));
    }

    let mut fitted = Vec::new();
    let mut tally = RuntimeTally::default();
    for (i, item) in items.iter().cycle().enumerate() {
        tally.push(item);
        if tally.total(false) > target {
            if policy == FitPolicy::Over {
                fitted.push(item.clone());
            }
            break;
        }
        fitted.push(item.clone());
        let cycle_done = (i + 1) % items.len() == 0;
        if cycle_done && tally.total(false) >= target {
            break;
        }
    }
    Ok(fitted)
}
