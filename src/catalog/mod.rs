//! # Catalog Client Interface
//!
//! The music service as the rest of the crate sees it. Everything the
//! recommendation engine needs goes through the [`Catalog`] trait; how the
//! lookups are performed, paginated, authorized, or retried is the
//! implementation's business.
//!
//! Implementations:
//! - [`spotify::SpotifyClient`] talks to the Spotify Web API.
//! - [`memory::MemoryCatalog`] serves fixed data, for tests and benchmarks.
//!
//! All list operations return complete results: pagination is exhausted
//! with [`exhaust`] before anything is handed back.

pub mod memory;
pub mod spotify;

use crate::error::CatalogError;
use crate::model::{AlbumRef, ArtistRef, TrackRef};

/// One of the user's playlists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistRef {
    pub id: String,
    pub name: String,
}

/// An artist credit as the catalog reports it. Either field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawArtist {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// A track as the catalog reports it, before any validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTrack {
    pub id: Option<String>,
    pub album_id: Option<String>,
    pub album_name: Option<String>,
    pub artists: Vec<RawArtist>,
}

/// One row of a playlist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistEntry {
    /// ISO-8601 timestamp of when the track was added, e.g. `2024-01-02T10:00:00Z`.
    pub added_at: Option<String>,
    /// Absent for removed or unavailable items.
    pub track: Option<RawTrack>,
}

/// A validated track: every identifier present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credits {
    pub track: TrackRef,
    pub album: AlbumRef,
    pub album_name: Option<String>,
    /// Credited artists with their names, in catalog order.
    pub artists: Vec<(ArtistRef, Option<String>)>,
}

impl RawTrack {
    /// Validate identifiers. `None` if the track, its album, or any credited
    /// artist lacks an id, or no artist is credited at all.
    #[must_use]
    pub fn credits(&self) -> Option<Credits> {
        let track = TrackRef::parse(self.id.as_deref())?;
        let album = AlbumRef::parse(self.album_id.as_deref())?;
        if self.artists.is_empty() {
            return None;
        }
        let artists = self
            .artists
            .iter()
            .map(|a| ArtistRef::parse(a.id.as_deref()).map(|id| (id, a.name.clone())))
            .collect::<Option<Vec<_>>>()?;

        Some(Credits {
            track,
            album,
            album_name: self.album_name.clone(),
            artists,
        })
    }
}

/// An album from an artist's discography.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumSummary {
    pub id: AlbumRef,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistProfile {
    pub name: String,
}

/// Read-only lookups against the music service.
///
/// Every list method returns the complete sequence. Implementations are free
/// to retry or reconnect internally; an error means the lookup gave up.
pub trait Catalog {
    fn list_playlists(&self, user: &str) -> Result<Vec<PlaylistRef>, CatalogError>;

    fn list_playlist_tracks(&self, playlist: &PlaylistRef) -> Result<Vec<PlaylistEntry>, CatalogError>;

    fn get_artist(&self, artist: &ArtistRef) -> Result<ArtistProfile, CatalogError>;

    fn list_artist_albums(&self, artist: &ArtistRef) -> Result<Vec<AlbumSummary>, CatalogError>;

    fn list_album_tracks(&self, album: &AlbumRef) -> Result<Vec<TrackRef>, CatalogError>;

    fn get_track(&self, track: &TrackRef) -> Result<RawTrack, CatalogError>;
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor for the next page; `None` on the last one.
    pub next: Option<String>,
}

/// Follow `next` cursors until the listing is complete.
///
/// Stops with an error if a cursor repeats, so a misbehaving service cannot
/// loop forever.
///
/// # Errors
///
/// Returns the first error produced by `fetch_next`.
pub fn exhaust<T, F>(first: Page<T>, mut fetch_next: F) -> Result<Vec<T>, CatalogError>
where
    F: FnMut(&str) -> Result<Page<T>, CatalogError>,
{
    let mut items = first.items;
    let mut cursor = first.next;
    let mut seen = std::collections::HashSet::new();

    while let Some(next) = cursor {
        if !seen.insert(next.clone()) {
            return Err(CatalogError::Decode(format!("pagination cursor repeated: {next}")));
        }
        let page = fetch_next(&next)?;
        log::trace!("Fetched page {next} with {} items", page.items.len());
        items.extend(page.items);
        cursor = page.next;
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: Option<&str>, album: Option<&str>, artists: &[Option<&str>]) -> RawTrack {
        RawTrack {
            id: id.map(String::from),
            album_id: album.map(String::from),
            album_name: Some("Album".into()),
            artists: artists
                .iter()
                .map(|a| RawArtist {
                    id: a.map(String::from),
                    name: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_credits_requires_every_identifier() {
        assert!(raw(Some("t"), Some("a"), &[Some("x")]).credits().is_some());
        assert!(raw(None, Some("a"), &[Some("x")]).credits().is_none());
        assert!(raw(Some("t"), None, &[Some("x")]).credits().is_none());
        assert!(raw(Some("t"), Some("a"), &[]).credits().is_none());
        assert!(raw(Some("t"), Some("a"), &[Some("x"), None]).credits().is_none());
        assert!(raw(Some("t"), Some("a"), &[Some("x"), Some("")]).credits().is_none());
    }

    #[test]
    fn test_exhaust_follows_cursors() {
        let first = Page {
            items: vec![1, 2],
            next: Some("p2".to_string()),
        };
        let all = exhaust(first, |cursor| {
            Ok(match cursor {
                "p2" => Page { items: vec![3], next: Some("p3".into()) },
                _ => Page { items: vec![4, 5], next: None },
            })
        })
        .unwrap();
        assert_eq!(all, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_exhaust_rejects_cursor_loops() {
        let first = Page {
            items: vec![1],
            next: Some("again".to_string()),
        };
        let result = exhaust(first, |_| {
            Ok(Page {
                items: vec![2],
                next: Some("again".into()),
            })
        });
        assert!(matches!(result, Err(CatalogError::Decode(_))));
    }

    #[test]
    fn test_exhaust_propagates_page_errors() {
        let first = Page {
            items: vec![1],
            next: Some("boom".to_string()),
        };
        let result: Result<Vec<i32>, _> = exhaust(first, |_| Err(CatalogError::Transport("reset".into())));
        assert!(matches!(result, Err(CatalogError::Transport(_))));
    }
}
