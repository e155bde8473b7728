//! The composer: turns a pool of items and a show config into a fitted,
//! ordered playlist.
//!
//! The stages always run in the same order: resolve config, build the
//! bulletin block, recency-shuffle the pool, draw and fit content, spread
//! artists apart, interleave sweepers, prepend the bulletin, number rows.

use crate::category::{CategoryStream, any_common};
use crate::config::{self, BulletinPolicy, ComposerSettings, Config, ConfigSource};
use crate::duration::runtime;
use crate::error::{Error, Result};
use crate::fit::{FitPolicy, fit_list, fit_stream};
use crate::interleave::interleave;
use crate::item::{Item, ItemKind, Trimmed};
use crate::playlist::{Composition, PlaylistEntry};
use crate::shuffle::{grouped_shuffle, weighted_shuffle};
use crate::timecode::{format_delta, hours_since, parse_delta, parse_time};
use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// The show being filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Show {
    #[serde(default)]
    pub name: String,
    pub starts: String,
    pub ends: String,
    /// Config name or inline config JSON.
    #[serde(alias = "genre")]
    pub config: String,
    /// Reference of the playlist the show plays from.
    #[serde(alias = "autoplaylist")]
    pub playlist: String,
}

impl Show {
    pub fn duration(&self) -> Result<TimeDelta> {
        Ok(parse_delta(&self.ends, &self.starts)?)
    }
}

pub struct Composer<'a> {
    settings: &'a ComposerSettings,
    configs: &'a dyn ConfigSource,
    rng: fastrand::Rng,
}

impl<'a> Composer<'a> {
    pub fn new(settings: &'a ComposerSettings, configs: &'a dyn ConfigSource) -> Self {
        Composer {
            settings,
            configs,
            rng: settings.rng(),
        }
    }

    /// Replace the random source, e.g. with a seeded one in tests.
    pub fn with_rng(mut self, rng: fastrand::Rng) -> Self {
        self.rng = rng;
        self
    }

    /// Compose the playlist for `show` from `pool`. `now` anchors the
    /// recency and bulletin freshness calculations.
    pub fn compose(
        &mut self,
        show: &Show,
        pool: &[Item],
        now: NaiveDateTime,
    ) -> Result<Composition> {
        self.settings.validate()?;
        info!(show = %show.name, "reading show config");
        let config = config::resolve(&show.config, self.configs, &mut self.rng)?;
        report_untrimmed(pool);

        let bulletin = if config.bulletin {
            info!("processing bulletin");
            self.bulletin_block(pool, now)?
        } else {
            Vec::new()
        };

        let target = show.duration()? - runtime(&bulletin, false);
        info!(target = %format_delta(target), "fitting to length");

        let shuffled = self.recency_shuffle(pool, now)?;
        let (mut tracks, sweepers) = if config.uses_categories() {
            self.fill_from_categories(&config, &shuffled, target)?
        } else {
            self.fill_from_moods(&config, &shuffled, target)?
        };

        if too_many_sweepers(sweepers.len(), tracks.len(), self.settings.sweeper_ratio) {
            warn!(
                sweepers = sweepers.len(),
                tracks = tracks.len(),
                "sweeper density is high for this show"
            );
        }

        info!("shuffling");
        grouped_shuffle(
            &mut tracks,
            |item: &&Item| item.group.clone(),
            self.settings.group_jitter,
            &mut self.rng,
        );
        let ordered: Vec<&Item> = bulletin
            .into_iter()
            .chain(interleave(sweepers, tracks))
            .collect();

        let entries = ordered
            .iter()
            .enumerate()
            .map(|(position, item)| {
                PlaylistEntry::format(position, item, &show.playlist, self.settings)
            })
            .collect();
        let mut composition = Composition::new(&show.playlist, entries);
        composition.name = config.name;
        composition.description = config.description;

        info!(
            entries = composition.entries.len(),
            runtime = %format_delta(composition.runtime),
            "playlist composed"
        );
        Ok(composition)
    }

    /// The intro plus the newest qualifying bulletin, or nothing at all.
    fn bulletin_block<'p>(&self, pool: &'p [Item], now: NaiveDateTime) -> Result<Vec<&'p Item>> {
        let mut newest: Option<(NaiveDateTime, &Item)> = None;
        for item in pool.iter().filter(|i| i.kind == ItemKind::Bulletin) {
            let Some(uploaded) = item.uploaded.as_deref() else {
                debug!(item = %item.id, "bulletin has no upload time, skipping");
                continue;
            };
            let at = parse_time(uploaded)?;
            if self.settings.bulletin_policy == BulletinPolicy::Fresh
                && hours_since(uploaded, now)? >= self.settings.bulletin_max_age_hours
            {
                continue;
            }
            if newest.is_none_or(|(best, _)| at > best) {
                newest = Some((at, item));
            }
        }

        let Some((_, bulletin)) = newest else {
            info!("no qualifying bulletin, omitting bulletin block");
            return Ok(Vec::new());
        };
        let Some(intro) = pool.iter().find(|i| i.kind == ItemKind::BulletinIntro) else {
            warn!(bulletin = %bulletin.id, "no bulletin intro in pool, omitting bulletin block");
            return Ok(Vec::new());
        };
        Ok(vec![intro, bulletin])
    }

    /// Whole pool, biased so long-unplayed items come first. Never-played
    /// items take the curve's maximum key.
    fn recency_shuffle<'p>(
        &mut self,
        pool: &'p [Item],
        now: NaiveDateTime,
    ) -> Result<Vec<&'p Item>> {
        let curve = self.settings.recency;
        let mut keyed = pool
            .iter()
            .map(|item| {
                let hours = match item.last_played.as_deref() {
                    Some(ts) => hours_since(ts, now)?,
                    None => curve.saturation(),
                };
                Ok((hours, item))
            })
            .collect::<Result<Vec<(f64, &Item)>>>()?;
        weighted_shuffle(&mut keyed, |(hours, _)| *hours, curve, &mut self.rng);
        Ok(keyed.into_iter().map(|(_, item)| item).collect())
    }

    /// Draw from the weighted category stream until the target is reached,
    /// then split off the sweepers.
    fn fill_from_categories<'p>(
        &mut self,
        config: &Config,
        shuffled: &[&'p Item],
        target: TimeDelta,
    ) -> Result<(Vec<&'p Item>, Vec<&'p Item>)> {
        info!(categories = config.content.len(), "pooling categories");
        let stream = CategoryStream::new(&config.content, shuffled, self.rng.fork())?;
        let fitted = fit_stream(stream.copied(), target, self.settings.fit_policy)?;
        let (sweepers, tracks): (Vec<&Item>, Vec<&Item>) = fitted
            .into_iter()
            .partition(|item| item.kind == ItemKind::Sweeper);
        Ok((tracks, sweepers))
    }

    /// Mood-list configs: songs fitted under the target, sweepers fitted to
    /// whatever time the songs leave.
    fn fill_from_moods<'p>(
        &mut self,
        config: &Config,
        shuffled: &[&'p Item],
        target: TimeDelta,
    ) -> Result<(Vec<&'p Item>, Vec<&'p Item>)> {
        if config.tracks.is_empty() {
            return Err(Error::config(
                "Config has neither content categories nor track moods",
            ));
        }
        info!("pooling valid tracks and jingles");
        let songs = mood_pool(shuffled, ItemKind::Track, &config.tracks);
        if songs.is_empty() {
            return Err(Error::config(format!(
                "No songs match track moods '{}'",
                config.tracks.join(" ")
            )));
        }
        let sweeps = mood_pool(shuffled, ItemKind::Sweeper, &config.sweepers);
        if sweeps.is_empty() && !config.sweepers.is_empty() {
            warn!(moods = %config.sweepers.join(" "), "no sweepers match, show will have none");
        }

        let tracks = fit_list(&songs, target, FitPolicy::Under)?;
        let remaining = target - runtime(&tracks, false);
        let sweepers = match fit_list(&sweeps, remaining, FitPolicy::Over) {
            Ok(sweepers) => sweepers,
            Err(Error::Unfittable { .. }) => {
                warn!(
                    sweepers = sweeps.len(),
                    "matching sweepers have no usable trim points, show will have none"
                );
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        Ok((tracks, sweepers))
    }
}

/// True when sweepers outnumber `ratio` of the track count.
fn too_many_sweepers(sweepers: usize, tracks: usize, ratio: f64) -> bool {
    sweepers as f64 > tracks as f64 * ratio
}

fn mood_pool<'p>(items: &[&'p Item], kind: ItemKind, moods: &[String]) -> Vec<&'p Item> {
    if moods.is_empty() {
        return Vec::new();
    }
    let wanted = moods.join(" ");
    items
        .iter()
        .copied()
        .filter(|item| item.kind == kind && any_common(&wanted, &item.tags.join(" ")))
        .collect()
}

fn report_untrimmed(pool: &[Item]) {
    let untrimmed: Vec<&str> = pool
        .iter()
        .filter(|item| item.clip_length().is_none())
        .map(|item| item.id.as_str())
        .collect();
    if !untrimmed.is_empty() {
        warn!(
            count = untrimmed.len(),
            "items without usable trim points count as zero length"
        );
        debug!(items = ?untrimmed, "untrimmed items");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::{Category, MatchMode};
    use std::collections::HashMap;

    fn now() -> NaiveDateTime {
        parse_time("2024-05-01 17:00:00").unwrap()
    }

    fn clip(id: &str, kind: ItemKind, secs: i64) -> Item {
        let mut item = Item::new(id, kind);
        item.cue_in = Some("00:00:00".into());
        item.cue_out = Some(format_delta(TimeDelta::seconds(secs)));
        item
    }

    fn bulletin(id: &str, uploaded: &str) -> Item {
        let mut item = clip(id, ItemKind::Bulletin, 120);
        item.uploaded = Some(uploaded.into());
        item
    }

    fn composer<'a>(
        settings: &'a ComposerSettings,
        configs: &'a HashMap<String, Config>,
    ) -> Composer<'a> {
        Composer::new(settings, configs).with_rng(fastrand::Rng::with_seed(21))
    }

    #[test]
    fn bulletin_block_picks_newest_fresh() {
        let settings = ComposerSettings::default();
        let configs = HashMap::new();
        let pool = vec![
            bulletin("old", "2024-04-29 09:00:00"),
            bulletin("morning", "2024-05-01 06:00:00"),
            bulletin("noon", "2024-05-01 12:00:00"),
            clip("intro", ItemKind::BulletinIntro, 5),
        ];
        let block = composer(&settings, &configs).bulletin_block(&pool, now()).unwrap();
        let ids: Vec<&str> = block.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["intro", "noon"]);
    }

    #[test]
    fn bulletin_block_stale_is_omitted() {
        let settings = ComposerSettings::default();
        let configs = HashMap::new();
        let pool = vec![
            bulletin("old", "2024-04-29 09:00:00"),
            clip("intro", ItemKind::BulletinIntro, 5),
        ];
        let block = composer(&settings, &configs).bulletin_block(&pool, now()).unwrap();
        assert!(block.is_empty());
    }

    #[test]
    fn bulletin_block_newest_policy_ignores_age() {
        let settings = ComposerSettings {
            bulletin_policy: BulletinPolicy::Newest,
            ..ComposerSettings::default()
        };
        let configs = HashMap::new();
        let pool = vec![
            bulletin("old", "2024-04-29 09:00:00"),
            clip("intro", ItemKind::BulletinIntro, 5),
        ];
        let block = composer(&settings, &configs).bulletin_block(&pool, now()).unwrap();
        assert_eq!(block.len(), 2);
    }

    #[test]
    fn bulletin_block_without_intro_is_omitted() {
        let settings = ComposerSettings::default();
        let configs = HashMap::new();
        let pool = vec![bulletin("noon", "2024-05-01 12:00:00")];
        let block = composer(&settings, &configs).bulletin_block(&pool, now()).unwrap();
        assert!(block.is_empty());
    }

    #[test]
    fn bulletin_bad_timestamp_is_an_error() {
        let settings = ComposerSettings::default();
        let configs = HashMap::new();
        let pool = vec![bulletin("noon", "midday")];
        let result = composer(&settings, &configs).bulletin_block(&pool, now());
        assert!(matches!(result, Err(Error::TimeParse(_))));
    }

    #[test]
    fn recency_shuffle_keeps_every_item() {
        let settings = ComposerSettings::default();
        let configs = HashMap::new();
        let mut pool: Vec<Item> = (0..20)
            .map(|i| clip(&format!("t{i}"), ItemKind::Track, 180))
            .collect();
        pool[3].last_played = Some("2024-05-01 16:59:00".into());
        let shuffled = composer(&settings, &configs).recency_shuffle(&pool, now()).unwrap();
        assert_eq!(shuffled.len(), 20);
        assert_eq!(shuffled.last().map(|i| i.id.as_str()), Some("t3"));
    }

    #[test]
    fn recency_shuffle_bad_last_played_is_an_error() {
        let settings = ComposerSettings::default();
        let configs = HashMap::new();
        let mut pool = vec![clip("t", ItemKind::Track, 180)];
        pool[0].last_played = Some("last week".into());
        assert!(composer(&settings, &configs).recency_shuffle(&pool, now()).is_err());
    }

    #[test]
    fn sweeper_density_threshold() {
        assert!(!too_many_sweepers(0, 0, 0.5));
        assert!(!too_many_sweepers(5, 10, 0.5));
        assert!(too_many_sweepers(6, 10, 0.5));
        assert!(too_many_sweepers(1, 0, 0.5));
    }

    #[test]
    fn mood_sweepers_without_trims_are_dropped() {
        let settings = ComposerSettings::default();
        let configs = HashMap::new();
        let mut song = clip("s1", ItemKind::Track, 200);
        song.tags = vec!["chill".into()];
        let mut sweep = Item::new("w1", ItemKind::Sweeper);
        sweep.tags = vec!["station".into()];
        let refs = vec![&song, &sweep];
        let config = Config {
            tracks: vec!["chill".into()],
            sweepers: vec!["station".into()],
            ..Config::default()
        };
        let (tracks, sweepers) = composer(&settings, &configs)
            .fill_from_moods(&config, &refs, TimeDelta::minutes(10))
            .unwrap();
        assert!(!tracks.is_empty());
        assert!(sweepers.is_empty());
    }

    #[test]
    fn mood_pool_filters_kind_and_mood() {
        let mut a = clip("a", ItemKind::Track, 60);
        a.tags = vec!["Chill".into()];
        let mut b = clip("b", ItemKind::Sweeper, 60);
        b.tags = vec!["chill".into()];
        let mut c = clip("c", ItemKind::Track, 60);
        c.tags = vec!["loud".into()];
        let items = vec![&a, &b, &c];
        let hits = mood_pool(&items, ItemKind::Track, &["chill".to_string(), "warm".to_string()]);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
        assert!(mood_pool(&items, ItemKind::Track, &[]).is_empty());
    }

    #[test]
    fn categories_split_sweepers_from_tracks() {
        let settings = ComposerSettings::default();
        let configs = HashMap::new();
        let pool = vec![
            clip("s1", ItemKind::Track, 200),
            clip("s2", ItemKind::Track, 200),
            clip("w1", ItemKind::Sweeper, 10),
        ];
        let refs: Vec<&Item> = pool.iter().collect();
        let config = Config {
            content: vec![
                Category::new("songs", 3.0, MatchMode::Exact).with("track_type", "SONG"),
                Category::new("sweeps", 1.0, MatchMode::Exact).with("track_type", "SWEEP"),
            ],
            ..Config::default()
        };
        let (tracks, sweepers) = composer(&settings, &configs)
            .fill_from_categories(&config, &refs, TimeDelta::minutes(30))
            .unwrap();
        assert!(tracks.iter().all(|i| i.kind == ItemKind::Track));
        assert!(sweepers.iter().all(|i| i.kind == ItemKind::Sweeper));
        let mut all = tracks.clone();
        all.extend(sweepers);
        assert!(runtime(&all, false) >= TimeDelta::minutes(30));
    }

    #[test]
    fn moods_without_tracks_is_a_configuration_error() {
        let settings = ComposerSettings::default();
        let configs = HashMap::new();
        let pool = vec![clip("s1", ItemKind::Track, 200)];
        let refs: Vec<&Item> = pool.iter().collect();
        let result = composer(&settings, &configs).fill_from_moods(
            &Config::default(),
            &refs,
            TimeDelta::minutes(30),
        );
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
