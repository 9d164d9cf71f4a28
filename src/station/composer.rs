use crate::models::{CandidateTrack, Provenance};
use crate::station::banlist::BanList;
use crate::station::filters::TrackFilters;
use crate::station::history::PlaylistHistory;
use log::{debug, warn};
use std::collections::HashSet;

/// How the mix divides between the gathering strategies, in percent.
#[derive(Debug, Clone)]
pub struct MixPolicy {
    pub favorites_percent: usize,
    pub ai_percent: usize,
    pub similar_percent: usize,
}

impl Default for MixPolicy {
    fn default() -> Self {
        MixPolicy {
            favorites_percent: 50,
            ai_percent: 20,
            similar_percent: 30,
        }
    }
}

impl MixPolicy {
    /// Per-bucket track quotas for a playlist of the given size. Rounding
    /// shortfall lands in the similar bucket so the quotas cover the target.
    pub fn quotas(&self, target: usize) -> (usize, usize, usize) {
        let favorites = target * self.favorites_percent / 100;
        let ai = target * self.ai_percent / 100;
        let mut similar = target * self.similar_percent / 100;
        similar += target.saturating_sub(favorites + ai + similar);
        (favorites, ai, similar)
    }
}

/// The three candidate pools, one per gathering strategy.
#[derive(Debug, Default)]
pub struct MixPools {
    pub favorites: Vec<CandidateTrack>,
    pub ai: Vec<CandidateTrack>,
    pub similar: Vec<CandidateTrack>,
}

impl MixPools {
    pub fn iter_all(&self) -> impl Iterator<Item = &CandidateTrack> {
        self.favorites
            .iter()
            .chain(self.ai.iter())
            .chain(self.similar.iter())
    }

    pub fn total_len(&self) -> usize {
        self.favorites.len() + self.ai.len() + self.similar.len()
    }
}

/// Backfill passes drop checks one rank at a time until the mix is full.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Relaxation {
    /// Everything except the cooldown check.
    DropCooldown,
    /// Only the ban check remains.
    KeepBansOnly,
    /// Admit any track not already in the mix.
    Everything,
}

/// Assemble the final mix from the pools.
///
/// The strict pass walks each bucket up to its quota, enforcing suitability,
/// bans, cooldown and one-track-per-artist. When the pools cannot fill the
/// target that way, progressively relaxed backfill passes top the mix up, so
/// the result only falls short when the pools hold fewer distinct tracks
/// than requested. Backfilled tracks lose their bucket's provenance.
pub fn compose_mix(
    pools: &MixPools,
    target: usize,
    policy: &MixPolicy,
    history: &PlaylistHistory,
    banned: &BanList,
) -> Vec<CandidateTrack> {
    let (favorites_quota, ai_quota, similar_quota) = policy.quotas(target);

    let mut selected: Vec<CandidateTrack> = Vec::with_capacity(target);
    let mut used_keys: HashSet<String> = HashSet::new();
    let mut used_artists: HashSet<String> = HashSet::new();

    let buckets: [(&str, &[CandidateTrack], usize); 3] = [
        ("favorites", &pools.favorites, favorites_quota),
        ("ai discovery", &pools.ai, ai_quota),
        ("similar artists", &pools.similar, similar_quota),
    ];

    for (label, bucket, quota) in buckets {
        let before = selected.len();
        for candidate in bucket {
            if selected.len() >= target || selected.len() - before >= quota {
                break;
            }
            let key = candidate.track.key();
            if used_keys.contains(&key) {
                continue;
            }
            if used_artists.contains(&candidate.track.artist_key()) {
                continue;
            }
            if !TrackFilters::is_suitable(&candidate.track) {
                continue;
            }
            if banned.is_banned(&candidate.track.title, &candidate.track.artist, None, &[]) {
                continue;
            }
            if history.is_in_cooldown(&candidate.track) {
                continue;
            }
            used_keys.insert(key);
            used_artists.insert(candidate.track.artist_key());
            selected.push(candidate.clone());
        }
        debug!(
            "{} bucket contributed {} of a quota of {}",
            label,
            selected.len() - before,
            quota
        );
    }

    for relaxation in [
        Relaxation::DropCooldown,
        Relaxation::KeepBansOnly,
        Relaxation::Everything,
    ] {
        if selected.len() >= target {
            break;
        }
        let before = selected.len();
        for candidate in pools.iter_all() {
            if selected.len() >= target {
                break;
            }
            let key = candidate.track.key();
            if used_keys.contains(&key) {
                continue;
            }
            let admit = match relaxation {
                Relaxation::DropCooldown => {
                    !used_artists.contains(&candidate.track.artist_key())
                        && TrackFilters::is_suitable(&candidate.track)
                        && !banned.is_banned(
                            &candidate.track.title,
                            &candidate.track.artist,
                            None,
                            &[],
                        )
                }
                Relaxation::KeepBansOnly => !banned.is_banned(
                    &candidate.track.title,
                    &candidate.track.artist,
                    None,
                    &[],
                ),
                Relaxation::Everything => true,
            };
            if !admit {
                continue;
            }
            used_keys.insert(key);
            used_artists.insert(candidate.track.artist_key());
            selected.push(CandidateTrack::with_playcount(
                candidate.track.clone(),
                Provenance::Discovery,
                candidate.playcount,
            ));
        }
        if selected.len() > before {
            debug!(
                "Backfill ({:?}) added {} tracks",
                relaxation,
                selected.len() - before
            );
        }
    }

    if selected.len() < target {
        warn!(
            "Pools only yielded {} of the {} requested tracks",
            selected.len(),
            target
        );
    }

    selected
}
