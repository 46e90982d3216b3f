//! # Selector
//!
//! Picks the next album to listen to and retires the current one.
//!
//! ## Inverse-frequency weighting
//!
//! Every artist with outstanding albums gets weight `1 / outstanding`, so an
//! artist with a single album left is twice as likely to come up as one with
//! two. Weights are normalized over all such artists, one artist is drawn,
//! and then one of its albums is drawn uniformly.
//!
//! ```text
//! A: [x, y]  -> 1/2 -> P(A) = 1/3
//! B: [z]     -> 1   -> P(B) = 2/3
//! ```
//!
//! Only one album is in progress at a time: a new one can only be chosen
//! after the current one has been retired.

use crate::error::StateError;
use crate::model::{ArtistRef, RecommendationRecord, RecommendationSet, Selection};
use log::{debug, info};
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;

/// Normalized selection probability of every artist with outstanding albums.
///
/// Empty when there is nothing to recommend.
#[must_use]
pub fn artist_weights(recs: &RecommendationSet) -> Vec<(&ArtistRef, f64)> {
    #[allow(clippy::cast_precision_loss)]
    let raw: Vec<(&ArtistRef, f64)> = recs
        .iter()
        .filter(|(_, albums)| !albums.is_empty())
        .map(|(artist, albums)| (artist, 1.0 / albums.len() as f64))
        .collect();

    let total: f64 = raw.iter().map(|(_, w)| w).sum();
    if total <= 0.0 {
        return Vec::new();
    }
    raw.into_iter().map(|(artist, w)| (artist, w / total)).collect()
}

/// Draw the next album and make it the current selection.
///
/// Returns `Ok(None)` when no album is left to recommend.
///
/// # Errors
///
/// [`StateError::SelectionActive`] if an album is still in progress.
pub fn choose_next<R: Rng + ?Sized>(
    record: &mut RecommendationRecord,
    rng: &mut R,
) -> Result<Option<Selection>, StateError> {
    if let Some(current) = &record.selection {
        return Err(StateError::SelectionActive {
            album: record.labels.album(&current.album).to_string(),
            artist: record.labels.artist(&current.artist).to_string(),
        });
    }

    let weights = artist_weights(&record.recommendations);
    if weights.is_empty() {
        info!("Nothing left to recommend");
        return Ok(None);
    }
    let Ok(distribution) = WeightedIndex::new(weights.iter().map(|(_, w)| *w)) else {
        return Ok(None);
    };

    let artist = weights[distribution.sample(rng)].0.clone();
    let Some(album) = record.recommendations.albums(&artist).choose(rng).cloned() else {
        return Ok(None);
    };
    debug!("Picked {album} by {artist} out of {} artists", weights.len());

    let selection = Selection { album, artist };
    record.selection = Some(selection.clone());
    Ok(Some(selection))
}

/// What happened to the current selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retirement {
    /// Not finished yet; still the current album.
    Kept(Selection),
    /// Finished, removed from the recommendations, selection cleared.
    Retired(Selection),
}

/// Retire the current album if the user has finished it.
///
/// # Errors
///
/// - [`StateError::NoActiveSelection`] if nothing is selected.
/// - [`StateError::AlbumNotRecommended`] if the selected album is no longer
///   in the recommendations; the selection is left untouched.
pub fn retire_current(record: &mut RecommendationRecord, finished: bool) -> Result<Retirement, StateError> {
    let selection = record.selection.clone().ok_or(StateError::NoActiveSelection)?;
    if !finished {
        return Ok(Retirement::Kept(selection));
    }

    if !record.recommendations.remove(&selection.artist, &selection.album) {
        return Err(StateError::AlbumNotRecommended {
            album: selection.album.to_string(),
            artist: selection.artist.to_string(),
        });
    }
    record.selection = None;
    info!(
        "Retired {} by {}",
        record.labels.album(&selection.album),
        record.labels.artist(&selection.artist)
    );
    Ok(Retirement::Retired(selection))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AlbumRef;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn record(recs: RecommendationSet) -> RecommendationRecord {
        let mut record = RecommendationRecord::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        record.recommendations = recs;
        record
    }

    fn sample_set() -> RecommendationSet {
        [("A", vec!["x", "y"]), ("B", vec!["z"])].into_iter().collect()
    }

    #[test]
    fn test_weights_favor_artists_with_fewer_albums() {
        let recs = sample_set();
        let weights = artist_weights(&recs);
        assert_eq!(weights.len(), 2);
        assert!((weights[0].1 - 1.0 / 3.0).abs() < 1e-9);
        assert!((weights[1].1 - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_artist_frequencies_converge() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut record = record(sample_set());
        let trials = 30_000;
        let mut b = 0;

        for _ in 0..trials {
            let picked = choose_next(&mut record, &mut rng).unwrap().unwrap();
            if picked.artist.as_str() == "B" {
                b += 1;
            }
            record.selection = None;
        }

        let share = f64::from(b) / f64::from(trials);
        assert!((share - 2.0 / 3.0).abs() < 0.02, "P(B) = {share}");
    }

    #[test]
    fn test_empty_set_has_nothing_to_recommend() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut record = record(RecommendationSet::new());
        assert!(artist_weights(&record.recommendations).is_empty());
        assert_eq!(choose_next(&mut record, &mut rng), Ok(None));
        assert_eq!(record.selection, None);
    }

    #[test]
    fn test_choose_requires_retired_selection() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut record = record(sample_set());
        choose_next(&mut record, &mut rng).unwrap();
        assert!(matches!(
            choose_next(&mut record, &mut rng),
            Err(StateError::SelectionActive { .. })
        ));
    }

    #[test]
    fn test_retire_removes_exactly_one_album() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut record = record(sample_set());
        let picked = choose_next(&mut record, &mut rng).unwrap().unwrap();

        assert_eq!(retire_current(&mut record, true), Ok(Retirement::Retired(picked.clone())));
        assert_eq!(record.recommendations.album_count(), 2);
        assert!(!record.recommendations.contains(&picked.artist, &picked.album));
        assert_eq!(record.selection, None);

        assert_eq!(retire_current(&mut record, true), Err(StateError::NoActiveSelection));
    }

    #[test]
    fn test_retiring_a_stale_selection_is_an_invariant_violation() {
        let mut record = record(sample_set());
        let stale = Selection {
            album: AlbumRef::new("gone"),
            artist: ArtistRef::new("A"),
        };
        record.selection = Some(stale.clone());

        assert!(matches!(
            retire_current(&mut record, true),
            Err(StateError::AlbumNotRecommended { .. })
        ));
        assert_eq!(record.selection, Some(stale));
        assert_eq!(record.recommendations.album_count(), 3);
    }

    #[test]
    fn test_unfinished_album_stays_selected() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut record = record(sample_set());
        let picked = choose_next(&mut record, &mut rng).unwrap().unwrap();

        assert_eq!(retire_current(&mut record, false), Ok(Retirement::Kept(picked.clone())));
        assert_eq!(record.selection, Some(picked));
        assert_eq!(record.recommendations.album_count(), 3);
    }
}
