use crate::models::CandidateTrack;
use rand::seq::SliceRandom;
use std::collections::HashSet;

/// At or above this factor the ordering is a plain full shuffle.
const FULL_SHUFFLE_FACTOR: u8 = 80;
const MIN_WINDOW: usize = 2;

/// Reorder the mix according to the randomness factor.
///
/// Zero keeps the composed order untouched. High factors shuffle outright.
/// In between, overlapping windows are shuffled locally and then dealt out
/// in random window order, so tracks drift further from their original
/// position as the factor rises. The output is always a permutation of the
/// input.
pub fn mix_order(tracks: Vec<CandidateTrack>, factor: u8) -> Vec<CandidateTrack> {
    if factor == 0 || tracks.len() < 2 {
        return tracks;
    }

    let mut rng = rand::thread_rng();

    if factor >= FULL_SHUFFLE_FACTOR {
        let mut shuffled = tracks;
        shuffled.shuffle(&mut rng);
        return shuffled;
    }

    let len = tracks.len();
    let window = window_size(len, factor);
    let step = (window / 2).max(1);

    let mut windows: Vec<Vec<usize>> = Vec::new();
    let mut start = 0;
    while start < len {
        let end = (start + window).min(len);
        let mut indices: Vec<usize> = (start..end).collect();
        indices.shuffle(&mut rng);
        windows.push(indices);
        start += step;
    }
    windows.shuffle(&mut rng);

    // Windows overlap, so their concatenation repeats indices. Place each
    // index at its first key sighting only.
    let mut placed = vec![false; len];
    let mut seen_keys: HashSet<String> = HashSet::new();
    let mut order: Vec<usize> = Vec::with_capacity(len);

    for indices in windows {
        for i in indices {
            if !placed[i] && seen_keys.insert(tracks[i].track.key()) {
                placed[i] = true;
                order.push(i);
            }
        }
    }

    // Tracks sharing a key with an earlier pick never place above; append
    // them in their original positions so the output stays a permutation.
    for (i, was_placed) in placed.iter().copied().enumerate() {
        if !was_placed {
            order.push(i);
        }
    }

    order.into_iter().map(|i| tracks[i].clone()).collect()
}

fn window_size(len: usize, factor: u8) -> usize {
    let raw = (len as f64) * (1.0 - f64::from(factor) / 100.0) * 0.5;
    (raw.floor() as usize).max(MIN_WINDOW)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Provenance, Track};

    fn numbered_tracks(count: usize) -> Vec<CandidateTrack> {
        (0..count)
            .map(|i| {
                CandidateTrack::new(
                    Track::new(&format!("Track {}", i), &format!("Artist {}", i)),
                    Provenance::Favorite,
                )
            })
            .collect()
    }

    fn sorted_keys(tracks: &[CandidateTrack]) -> Vec<String> {
        let mut keys: Vec<String> = tracks.iter().map(|c| c.track.key()).collect();
        keys.sort();
        keys
    }

    #[test]
    fn test_factor_zero_keeps_order() {
        let tracks = numbered_tracks(20);
        let before: Vec<String> = tracks.iter().map(|c| c.track.key()).collect();
        let mixed = mix_order(tracks, 0);
        let after: Vec<String> = mixed.iter().map(|c| c.track.key()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_output_is_a_permutation_at_every_factor() {
        for factor in [1, 25, 50, 79, 80, 100] {
            let tracks = numbered_tracks(50);
            let expected = sorted_keys(&tracks);
            let mixed = mix_order(tracks, factor);
            assert_eq!(mixed.len(), 50, "factor {}", factor);
            assert_eq!(sorted_keys(&mixed), expected, "factor {}", factor);
        }
    }

    #[test]
    fn test_duplicate_keys_survive_mixing() {
        let mut tracks = numbered_tracks(10);
        tracks.push(tracks[3].clone());
        tracks.push(tracks[7].clone());
        let expected = sorted_keys(&tracks);

        let mixed = mix_order(tracks, 50);
        assert_eq!(mixed.len(), 12);
        assert_eq!(sorted_keys(&mixed), expected);
    }

    #[test]
    fn test_mid_factor_actually_reorders() {
        let tracks = numbered_tracks(40);
        let before: Vec<String> = tracks.iter().map(|c| c.track.key()).collect();

        let mut changed = false;
        for _ in 0..20 {
            let mixed = mix_order(tracks.clone(), 50);
            let after: Vec<String> = mixed.iter().map(|c| c.track.key()).collect();
            if after != before {
                changed = true;
                break;
            }
        }
        assert!(changed);
    }

    #[test]
    fn test_tiny_inputs_pass_through() {
        let one = numbered_tracks(1);
        assert_eq!(mix_order(one, 100).len(), 1);
        let none = mix_order(Vec::new(), 50);
        assert!(none.is_empty());
    }

    #[test]
    fn test_window_size_shrinks_with_factor() {
        assert_eq!(window_size(100, 50), 25);
        assert_eq!(window_size(100, 20), 40);
        assert_eq!(window_size(100, 79), 10);
        assert_eq!(window_size(10, 79), MIN_WINDOW);
        assert_eq!(window_size(10, 10), 4);
    }
}
