//! # Incremental Reconciler
//!
//! Brings an initialized library state up to date with tracks added to the
//! user's playlists since the last update, without rebuilding anything.
//!
//! Reconciliation runs in two phases so that nothing here ever waits on a
//! human:
//!
//! 1. [`Reconciler::plan`] scans for tracks added strictly after the
//!    watermark, handles every case that needs no input (artists never seen
//!    before), and returns the albums the user has to be asked about.
//! 2. [`apply_answers`] records the user's answers and moves the watermark.
//!
//! ## Watermark
//!
//! Tracks whose lookups fail transiently are left for the next run. The new
//! watermark is therefore the day before the earliest such track when
//! anything failed, today otherwise, and never earlier than the old one. If a
//! playlist could not be read at all, the watermark stays where it was.
//!
//! Permanent failures (an artist or track the catalog no longer knows, a
//! rejected credential, an undecodable answer) would fail the same way on
//! every run. Those rows are dropped like malformed ones and do not hold the
//! watermark back.
//!
//! Dates are calendar days in UTC, the clock `added_at` is written in; see
//! [`today`].

use crate::catalog::{Catalog, Credits, PlaylistEntry};
use crate::error::CatalogError;
use crate::index::scan_playlists;
use crate::model::{AlbumRef, ArtistRef, LibraryState, TrackRef};
use crate::prompt::Answer;
use crate::recommend::{label_artist, CatalogCache};
use chrono::{NaiveDate, Utc};
use log::{debug, info, trace, warn};
use std::collections::HashSet;

/// Calendar date of an ISO-8601 `added_at` timestamp.
///
/// Only the `YYYY-MM-DD` prefix is read; `None` if it is absent or invalid.
#[must_use]
pub fn added_date(added_at: &str) -> Option<NaiveDate> {
    let prefix = added_at.trim().get(..10)?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

/// The current UTC date, comparable with [`added_date`].
#[must_use]
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Rows added strictly after `watermark`, with their dates.
pub fn select_new_entries(entries: &[PlaylistEntry], watermark: NaiveDate) -> Vec<(NaiveDate, &PlaylistEntry)> {
    entries
        .iter()
        .filter_map(|entry| {
            let Some(date) = entry.added_at.as_deref().and_then(added_date) else {
                trace!("Skipping playlist row without a usable date: {entry:?}");
                return None;
            };
            (date > watermark).then_some((date, entry))
        })
        .collect()
}

/// An album the user must confirm having listened to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub artist: ArtistRef,
    pub album: AlbumRef,
    /// The newly added track that raised the question.
    pub track: TrackRef,
}

/// Result of the planning phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// One entry per (artist, album), in discovery order.
    pub confirmations: Vec<Confirmation>,
    /// New rows with complete identifiers.
    pub new_tracks: usize,
    /// New rows dropped for missing identifiers.
    pub skipped: usize,
    /// New rows left for the next run after a transient lookup failure.
    pub failed: usize,
    /// New rows dropped after a lookup that can never succeed.
    pub unresolvable: usize,
    pub failed_playlists: usize,
    /// New artists whose discography was added to the recommendations.
    pub seeded_artists: usize,
    /// New artists first seen through a one-track release.
    pub singles: usize,
    /// Watermark to store once the answers are applied.
    pub next_watermark: NaiveDate,
}

/// Outcome of [`apply_answers`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub confirmed: usize,
    pub declined: usize,
    /// "No" answers for albums that were already recommended.
    pub inconsistent: usize,
}

enum Seeded {
    Single,
    Discography,
}

/// Plans an update against one catalog, caching lookups for the run.
pub struct Reconciler<'c, C: Catalog + ?Sized> {
    cache: CatalogCache<'c, C>,
    today: NaiveDate,
}

impl<'c, C: Catalog + ?Sized> Reconciler<'c, C> {
    pub fn new(catalog: &'c C, today: NaiveDate) -> Self {
        Self {
            cache: CatalogCache::new(catalog),
            today,
        }
    }

    /// Scan for new tracks and apply everything that needs no confirmation.
    ///
    /// `state` is modified for artists seen for the first time. The watermark
    /// is left alone until [`apply_answers`].
    ///
    /// # Errors
    ///
    /// Fails only if the user's playlists cannot be listed. Every other
    /// lookup failure is logged and counted in the plan, as `failed` if a
    /// later run may succeed and as `unresolvable` otherwise.
    pub fn plan(&mut self, user: &str, state: &mut LibraryState) -> Result<ReconcilePlan, CatalogError> {
        let scan = scan_playlists(self.cache.catalog(), user)?;
        let watermark = state.record.watermark;
        let fresh = select_new_entries(&scan.entries, watermark);
        info!("{} tracks added since {watermark}", fresh.len());

        let mut plan = ReconcilePlan {
            confirmations: Vec::new(),
            new_tracks: 0,
            skipped: 0,
            failed: 0,
            unresolvable: 0,
            failed_playlists: scan.failed_playlists,
            seeded_artists: 0,
            singles: 0,
            next_watermark: watermark,
        };
        let mut asked: HashSet<(ArtistRef, AlbumRef)> = HashSet::new();
        let mut earliest_failure: Option<NaiveDate> = None;

        for (added, entry) in fresh {
            let credits = match self.resolve(entry) {
                Ok(Some(credits)) => credits,
                Ok(None) => {
                    plan.skipped += 1;
                    continue;
                }
                Err(e) if e.is_transient() => {
                    warn!("Could not resolve track added {added}, retrying next update: {e}");
                    plan.failed += 1;
                    earliest_failure = Some(earliest_failure.map_or(added, |d| d.min(added)));
                    continue;
                }
                Err(e) => {
                    warn!("Dropping track added {added}: {e}");
                    plan.unresolvable += 1;
                    continue;
                }
            };
            plan.new_tracks += 1;
            state
                .record
                .labels
                .name_album(&credits.album, credits.album_name.as_deref());

            let mut track_failed = false;
            let mut track_dropped = false;
            for (artist, name) in &credits.artists {
                state.record.labels.name_artist(artist, name.as_deref());

                if !state.saved.contains_artist(artist) {
                    match self.seed_artist(state, artist, &credits) {
                        Ok(Seeded::Single) => plan.singles += 1,
                        Ok(Seeded::Discography) => plan.seeded_artists += 1,
                        Err(e) if e.is_transient() => {
                            warn!("Could not seed new artist {}: {e}", state.record.labels.artist(artist));
                            track_failed = true;
                        }
                        Err(e) => {
                            warn!("Skipping new artist {}: {e}", state.record.labels.artist(artist));
                            track_dropped = true;
                        }
                    }
                } else if !state.saved.contains_album(artist, &credits.album) {
                    if asked.insert((artist.clone(), credits.album.clone())) {
                        plan.confirmations.push(Confirmation {
                            artist: artist.clone(),
                            album: credits.album.clone(),
                            track: credits.track.clone(),
                        });
                    }
                } else {
                    trace!("{} already saved for {artist}", credits.album);
                }
            }

            if track_failed {
                plan.failed += 1;
                earliest_failure = Some(earliest_failure.map_or(added, |d| d.min(added)));
            } else if track_dropped {
                plan.unresolvable += 1;
            }
        }

        plan.next_watermark = next_watermark(watermark, self.today, scan.is_complete(), earliest_failure);
        debug!(
            "Plan: {} confirmations, {} seeded, {} singles, {} failed, {} unresolvable",
            plan.confirmations.len(),
            plan.seeded_artists,
            plan.singles,
            plan.failed,
            plan.unresolvable
        );
        Ok(plan)
    }

    fn resolve(&self, entry: &PlaylistEntry) -> Result<Option<Credits>, CatalogError> {
        let Some(raw) = &entry.track else {
            return Ok(None);
        };
        if let Some(credits) = raw.credits() {
            return Ok(Some(credits));
        }
        let Some(track) = TrackRef::parse(raw.id.as_deref()) else {
            return Ok(None);
        };
        Ok(self.cache.catalog().get_track(&track)?.credits())
    }

    /// Handle an artist with no saved albums yet.
    ///
    /// A one-track release is taken as heard and kept out of the
    /// recommendations; otherwise the whole discography is merged in.
    fn seed_artist(
        &mut self,
        state: &mut LibraryState,
        artist: &ArtistRef,
        credits: &Credits,
    ) -> Result<Seeded, CatalogError> {
        let discography = self.cache.discography(artist)?.to_vec();
        let single = self.cache.track_count(&credits.album)? == 1;

        label_artist(self.cache.catalog(), &mut state.record.labels, artist);
        for album in &discography {
            state.record.labels.name_album(&album.id, Some(&album.name));
        }

        let recs = &mut state.record.recommendations;
        if single {
            state.saved.insert(artist, &credits.album, &credits.track);
            let added = recs.extend(artist, discography.iter().map(|a| &a.id).filter(|id| *id != &credits.album));
            recs.remove(artist, &credits.album);
            debug!("New artist {artist} via single {}: {added} albums recommended", credits.album);
            Ok(Seeded::Single)
        } else {
            let added = recs.extend(artist, discography.iter().map(|a| &a.id));
            debug!("New artist {artist}: {added} albums recommended");
            Ok(Seeded::Discography)
        }
    }
}

fn next_watermark(old: NaiveDate, today: NaiveDate, scan_complete: bool, earliest_failure: Option<NaiveDate>) -> NaiveDate {
    if !scan_complete {
        return old;
    }
    match earliest_failure {
        Some(failed) => old.max(failed.pred_opt().unwrap_or(failed)),
        None => old.max(today),
    }
}

/// Record the user's answers and advance the watermark.
///
/// "Yes" saves the album and drops it from the recommendations; if it was
/// the album in progress, the selection is cleared. "No" recommends it.
pub fn apply_answers<'p>(
    state: &mut LibraryState,
    plan: &ReconcilePlan,
    answers: impl IntoIterator<Item = (&'p Confirmation, Answer)>,
) -> ApplyReport {
    let mut report = ApplyReport::default();

    for (confirmation, answer) in answers {
        let Confirmation { artist, album, track } = confirmation;
        match answer {
            Answer::Yes => {
                state.saved.insert(artist, album, track);
                state.record.recommendations.remove(artist, album);
                if state
                    .record
                    .selection
                    .as_ref()
                    .is_some_and(|s| &s.artist == artist && &s.album == album)
                {
                    info!("Current album {} was listened to; clearing selection", state.record.labels.album(album));
                    state.record.selection = None;
                }
                report.confirmed += 1;
            }
            Answer::No => {
                if state.record.recommendations.add(artist, album) {
                    report.declined += 1;
                } else {
                    warn!(
                        "{} by {} was already recommended; leaving it in place",
                        state.record.labels.album(album),
                        state.record.labels.artist(artist)
                    );
                    report.inconsistent += 1;
                }
            }
        }
    }

    if plan.next_watermark != state.record.watermark {
        info!("Watermark {} -> {}", state.record.watermark, plan.next_watermark);
    }
    state.record.watermark = plan.next_watermark;
    report
}
