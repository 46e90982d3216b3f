//! # Recommendation Set Builder
//!
//! Decides, album by album, which parts of each artist's discography are
//! still worth listening to.
//!
//! ## Coverage
//!
//! For an album the user has saved tracks from:
//!
//! ```text
//! coverage = saved_tracks / total_tracks
//! ```
//!
//! An album whose coverage is strictly above the cutoff counts as heard and
//! stays out of the recommendations. Exactly at the cutoff it is still
//! recommended: three of four tracks at 0.75 is not enough.
//!
//! Albums with no saved tracks are always recommended, and albums the catalog
//! reports as empty are never recommended.

use crate::catalog::{AlbumSummary, Catalog};
use crate::error::{CatalogError, StateError};
use crate::model::{AlbumRef, ArtistRef, Labels, RecommendationRecord, SavedIndex};
use log::{debug, info, warn};
use std::collections::HashMap;

/// Cutoff used when none is configured.
pub const DEFAULT_CUTOFF: f64 = 0.75;

/// Coverage threshold, guaranteed to lie strictly between 0 and 1.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Cutoff(f64);

impl Cutoff {
    /// # Errors
    ///
    /// [`StateError::InvalidCutoff`] unless `0 < value < 1`.
    pub fn new(value: f64) -> Result<Self, StateError> {
        if value > 0.0 && value < 1.0 {
            Ok(Self(value))
        } else {
            Err(StateError::InvalidCutoff(value))
        }
    }

    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for Cutoff {
    fn default() -> Self {
        Self(DEFAULT_CUTOFF)
    }
}

/// How much of an album the user has heard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlbumVerdict {
    /// No saved tracks at all.
    Unheard,
    /// Some saved tracks, coverage at or below the cutoff.
    UnderHeard { coverage: f64 },
    /// Coverage above the cutoff.
    Heard { coverage: f64 },
    /// The catalog lists no tracks for this album.
    NoTracks,
}

impl AlbumVerdict {
    /// Whether the album belongs in the recommendations.
    #[must_use]
    pub fn recommend(self) -> bool {
        matches!(self, Self::Unheard | Self::UnderHeard { .. })
    }
}

/// Judge an album from its saved and total track counts.
#[must_use]
pub fn judge_saved(saved: usize, total: usize, cutoff: Cutoff) -> AlbumVerdict {
    if total == 0 {
        return AlbumVerdict::NoTracks;
    }
    if saved == 0 {
        return AlbumVerdict::Unheard;
    }
    #[allow(clippy::cast_precision_loss)]
    let coverage = saved as f64 / total as f64;
    if coverage > cutoff.value() {
        AlbumVerdict::Heard { coverage }
    } else {
        AlbumVerdict::UnderHeard { coverage }
    }
}

/// Per-run memo of catalog lookups that do not change during a run.
///
/// Discographies and album sizes are fetched at most once, however many
/// saved tracks point at the same artist or album.
pub struct CatalogCache<'c, C: Catalog + ?Sized> {
    catalog: &'c C,
    discographies: HashMap<ArtistRef, Vec<AlbumSummary>>,
    track_counts: HashMap<AlbumRef, usize>,
}

impl<'c, C: Catalog + ?Sized> CatalogCache<'c, C> {
    pub fn new(catalog: &'c C) -> Self {
        Self {
            catalog,
            discographies: HashMap::new(),
            track_counts: HashMap::new(),
        }
    }

    pub fn catalog(&self) -> &'c C {
        self.catalog
    }

    /// The artist's complete discography.
    ///
    /// # Errors
    ///
    /// The catalog error if the listing failed. Failures are not cached.
    pub fn discography(&mut self, artist: &ArtistRef) -> Result<&[AlbumSummary], CatalogError> {
        if !self.discographies.contains_key(artist) {
            let albums = self.catalog.list_artist_albums(artist)?;
            debug!("Artist {artist} has {} albums", albums.len());
            self.discographies.insert(artist.clone(), albums);
        }
        Ok(self.discographies.get(artist).map(Vec::as_slice).unwrap_or(&[]))
    }

    /// Total number of tracks on `album`.
    ///
    /// # Errors
    ///
    /// The catalog error if the listing failed. Failures are not cached.
    pub fn track_count(&mut self, album: &AlbumRef) -> Result<usize, CatalogError> {
        if let Some(count) = self.track_counts.get(album) {
            return Ok(*count);
        }
        let count = self.catalog.list_album_tracks(album)?.len();
        self.track_counts.insert(album.clone(), count);
        Ok(count)
    }
}

/// Make sure `labels` has a display name for `artist`, asking the catalog
/// only when none is known yet. A failed lookup leaves the id as the label.
pub fn label_artist<C: Catalog + ?Sized>(catalog: &C, labels: &mut Labels, artist: &ArtistRef) {
    if labels.artists.contains_key(artist) {
        return;
    }
    match catalog.get_artist(artist) {
        Ok(profile) => labels.name_artist(artist, Some(&profile.name)),
        Err(e) => debug!("Could not resolve name of artist {artist}: {e}"),
    }
}

/// Outcome of [`build_recommendations`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub artists: usize,
    pub albums_judged: usize,
    /// Albums newly added to the recommendations.
    pub added: usize,
    pub heard: usize,
    pub empty_albums: usize,
    /// Artists whose discography could not be fetched.
    pub failed_artists: usize,
    /// Albums whose track count could not be fetched.
    pub failed_albums: usize,
}

impl BuildReport {
    /// Whether every lookup succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed_artists == 0 && self.failed_albums == 0
    }
}

/// Fill `record.recommendations` from the saved index and each saved
/// artist's discography.
///
/// Existing recommendations are kept; albums are appended, never duplicated.
/// Catalog failures skip the artist or album concerned and are counted in
/// the report.
pub fn build_recommendations<C: Catalog + ?Sized>(
    catalog: &C,
    saved: &SavedIndex,
    cutoff: Cutoff,
    record: &mut RecommendationRecord,
) -> BuildReport {
    let mut cache = CatalogCache::new(catalog);
    let mut report = BuildReport::default();

    for artist in saved.artists() {
        report.artists += 1;
        label_artist(catalog, &mut record.labels, artist);

        let albums = match cache.discography(artist) {
            Ok(albums) => albums.to_vec(),
            Err(e) => {
                warn!("Skipping artist {}: {e}", record.labels.artist(artist));
                report.failed_artists += 1;
                continue;
            }
        };

        for album in &albums {
            record.labels.name_album(&album.id, Some(&album.name));
            let total = match cache.track_count(&album.id) {
                Ok(total) => total,
                Err(e) => {
                    warn!("Skipping album {}: {e}", album.name);
                    report.failed_albums += 1;
                    continue;
                }
            };

            report.albums_judged += 1;
            let verdict = judge_saved(saved.saved_count(artist, &album.id), total, cutoff);
            debug!("{} / {}: {verdict:?}", record.labels.artist(artist), album.name);
            match verdict {
                AlbumVerdict::NoTracks => report.empty_albums += 1,
                AlbumVerdict::Heard { .. } => report.heard += 1,
                AlbumVerdict::Unheard | AlbumVerdict::UnderHeard { .. } => {
                    if record.recommendations.add(artist, &album.id) {
                        report.added += 1;
                    }
                }
            }
        }
    }

    info!(
        "Judged {} albums across {} artists: {} recommended, {} heard",
        report.albums_judged, report.artists, report.added, report.heard
    );
    report
}
