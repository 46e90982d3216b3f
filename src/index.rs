//! # Listened-Index Builder
//!
//! Walks every track in every playlist of the user once and records which
//! albums each credited artist has saved tracks from.
//!
//! Rows with a missing track, album, or artist identifier are skipped
//! entirely: no artist gains an entry from a half-identified track.

use crate::catalog::{Catalog, PlaylistEntry};
use crate::error::CatalogError;
use crate::model::{Labels, SavedIndex};
use log::{debug, info, trace, warn};

/// All rows of all of a user's playlists.
#[derive(Debug, Clone, Default)]
pub struct PlaylistScan {
    pub entries: Vec<PlaylistEntry>,
    pub playlists: usize,
    /// Playlists whose tracks could not be listed.
    pub failed_playlists: usize,
}

impl PlaylistScan {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed_playlists == 0
    }
}

/// Fetch every row of every playlist owned or followed by `user`.
///
/// A playlist that fails to load is logged, counted, and skipped.
///
/// # Errors
///
/// Fails only if the playlists themselves cannot be listed.
pub fn scan_playlists<C: Catalog + ?Sized>(catalog: &C, user: &str) -> Result<PlaylistScan, CatalogError> {
    let playlists = catalog.list_playlists(user)?;
    info!("Scanning {} playlists of {user}", playlists.len());

    let mut scan = PlaylistScan {
        playlists: playlists.len(),
        ..PlaylistScan::default()
    };
    for playlist in &playlists {
        match catalog.list_playlist_tracks(playlist) {
            Ok(entries) => {
                debug!("Playlist '{}': {} tracks", playlist.name, entries.len());
                scan.entries.extend(entries);
            }
            Err(e) => {
                warn!("Skipping playlist '{}': {e}", playlist.name);
                scan.failed_playlists += 1;
            }
        }
    }
    Ok(scan)
}

/// Counts from [`index_entries`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexReport {
    /// Rows with complete identifiers.
    pub indexed: usize,
    /// Rows dropped for a missing identifier.
    pub skipped: usize,
}

/// Add every well-formed row to `saved`, harvesting display names on the way.
pub fn index_entries<'a>(
    saved: &mut SavedIndex,
    labels: &mut Labels,
    entries: impl IntoIterator<Item = &'a PlaylistEntry>,
) -> IndexReport {
    let mut report = IndexReport::default();

    for entry in entries {
        let Some(credits) = entry.track.as_ref().and_then(|t| t.credits()) else {
            trace!("Skipping playlist row with missing identifiers: {entry:?}");
            report.skipped += 1;
            continue;
        };

        labels.name_album(&credits.album, credits.album_name.as_deref());
        for (artist, name) in &credits.artists {
            labels.name_artist(artist, name.as_deref());
            saved.insert(artist, &credits.album, &credits.track);
        }
        report.indexed += 1;
    }

    report
}

/// Result of a full library scan.
#[derive(Debug, Clone, Default)]
pub struct SavedScan {
    pub saved: SavedIndex,
    pub labels: Labels,
    pub playlists: usize,
    pub failed_playlists: usize,
    pub report: IndexReport,
}

/// Build the saved index from scratch.
///
/// # Errors
///
/// Fails only if the user's playlists cannot be listed.
pub fn build_saved_index<C: Catalog + ?Sized>(catalog: &C, user: &str) -> Result<SavedScan, CatalogError> {
    let scan = scan_playlists(catalog, user)?;
    let mut saved = SavedIndex::new();
    let mut labels = Labels::default();
    let report = index_entries(&mut saved, &mut labels, &scan.entries);

    info!(
        "Indexed {} tracks by {} artists ({} rows skipped)",
        saved.track_count(),
        saved.artist_count(),
        report.skipped
    );

    Ok(SavedScan {
        saved,
        labels,
        playlists: scan.playlists,
        failed_playlists: scan.failed_playlists,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory::MemoryCatalog;
    use crate::catalog::{RawArtist, RawTrack};
    use crate::model::{AlbumRef, ArtistRef};

    fn entry(track: Option<&str>, album: Option<&str>, artists: &[Option<&str>]) -> PlaylistEntry {
        PlaylistEntry {
            added_at: Some("2024-01-02T10:00:00Z".into()),
            track: Some(RawTrack {
                id: track.map(String::from),
                album_id: album.map(String::from),
                album_name: None,
                artists: artists
                    .iter()
                    .map(|a| RawArtist {
                        id: a.map(String::from),
                        name: None,
                    })
                    .collect(),
            }),
        }
    }

    #[test]
    fn test_malformed_rows_leave_index_unchanged() {
        let rows = vec![
            PlaylistEntry::default(),
            entry(None, Some("al"), &[Some("ar")]),
            entry(Some("t"), None, &[Some("ar")]),
            entry(Some("t"), Some("al"), &[]),
            entry(Some("t"), Some("al"), &[Some("ar"), None]),
            entry(Some("t"), Some("al"), &[Some("ar"), Some("")]),
        ];

        let mut saved = SavedIndex::new();
        let mut labels = Labels::default();
        let report = index_entries(&mut saved, &mut labels, &rows);

        assert!(saved.is_empty());
        assert_eq!(report, IndexReport { indexed: 0, skipped: 6 });
    }

    #[test]
    fn test_every_credited_artist_gets_the_track() {
        let rows = vec![entry(Some("t"), Some("al"), &[Some("a1"), Some("a2")])];
        let mut saved = SavedIndex::new();
        index_entries(&mut saved, &mut Labels::default(), &rows);

        assert!(saved.contains_album(&ArtistRef::new("a1"), &AlbumRef::new("al")));
        assert!(saved.contains_album(&ArtistRef::new("a2"), &AlbumRef::new("al")));
        assert_eq!(saved.track_count(), 2);
    }

    #[test]
    fn test_indexing_twice_is_idempotent() {
        let rows = vec![
            entry(Some("t1"), Some("al"), &[Some("ar")]),
            entry(Some("t2"), Some("al"), &[Some("ar")]),
        ];
        let mut once = SavedIndex::new();
        index_entries(&mut once, &mut Labels::default(), &rows);

        let mut twice = once.clone();
        index_entries(&mut twice, &mut Labels::default(), &rows);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_build_spans_playlists_and_pages() {
        let mut catalog = MemoryCatalog::new().with_page_size(1);
        catalog
            .add_artist("ar1", "Broadcast")
            .add_album("ar1", "al1", "Tender Buttons", &["t1", "t2"])
            .add_playlist("me", "p1")
            .add_playlist("me", "p2")
            .add_saved_track("p1", "2024-01-02T10:00:00Z", "t1", "al1", &["ar1"])
            .add_saved_track("p2", "2024-01-03T10:00:00Z", "t2", "al1", &["ar1"])
            .add_saved_track("p2", "2024-01-03T10:00:00Z", "t1", "al1", &["ar1"]);

        let scan = build_saved_index(&catalog, "me").unwrap();
        assert_eq!(scan.playlists, 2);
        assert_eq!(scan.saved.saved_count(&ArtistRef::new("ar1"), &AlbumRef::new("al1")), 2);
        assert_eq!(scan.report.indexed, 3);
        assert_eq!(scan.labels.album(&AlbumRef::new("al1")), "Tender Buttons");
    }

    #[test]
    fn test_failed_playlist_is_skipped() {
        let mut catalog = MemoryCatalog::new();
        catalog
            .add_artist("ar1", "Artist")
            .add_album("ar1", "al1", "One", &["t1"])
            .add_playlist("me", "p1")
            .add_playlist("me", "p2")
            .add_saved_track("p1", "2024-01-02T10:00:00Z", "t1", "al1", &["ar1"])
            .fail_on("p2");

        let scan = build_saved_index(&catalog, "me").unwrap();
        assert_eq!(scan.failed_playlists, 1);
        assert_eq!(scan.saved.track_count(), 1);
    }

    #[test]
    fn test_unlistable_user_is_an_error() {
        let mut catalog = MemoryCatalog::new();
        catalog.fail_on("me");
        assert!(build_saved_index(&catalog, "me").is_err());
    }
}
