//! In-memory [`Catalog`] with deterministic data.
//!
//! Listings are split into pages of `page_size` and reassembled through
//! [`exhaust`], so callers see the same pagination contract as with the real
//! service. Individual ids can be marked as failing to simulate dropped
//! connections.

use super::{exhaust, AlbumSummary, ArtistProfile, Catalog, Page, PlaylistEntry, PlaylistRef, RawArtist, RawTrack};
use crate::error::CatalogError;
use crate::model::{AlbumRef, ArtistRef, TrackRef};
use std::cell::Cell;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct MemoryCatalog {
    page_size: usize,
    playlists: HashMap<String, Vec<PlaylistRef>>,
    entries: HashMap<String, Vec<PlaylistEntry>>,
    artists: HashMap<ArtistRef, ArtistProfile>,
    discographies: HashMap<ArtistRef, Vec<AlbumSummary>>,
    album_tracks: HashMap<AlbumRef, Vec<TrackRef>>,
    tracks: HashMap<TrackRef, RawTrack>,
    failing: HashSet<String>,
    calls: Cell<usize>,
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self {
            page_size: 50,
            playlists: HashMap::new(),
            entries: HashMap::new(),
            artists: HashMap::new(),
            discographies: HashMap::new(),
            album_tracks: HashMap::new(),
            tracks: HashMap::new(),
            failing: HashSet::new(),
            calls: Cell::new(0),
        }
    }
}

impl MemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn add_artist(&mut self, id: &str, name: &str) -> &mut Self {
        self.artists.insert(ArtistRef::new(id), ArtistProfile { name: name.to_string() });
        self.discographies.entry(ArtistRef::new(id)).or_default();
        self
    }

    /// Add an album to `artist`'s discography with the given track list.
    pub fn add_album(&mut self, artist: &str, id: &str, name: &str, tracks: &[&str]) -> &mut Self {
        let album = AlbumRef::new(id);
        let discography = self.discographies.entry(ArtistRef::new(artist)).or_default();
        if !discography.iter().any(|a| a.id == album) {
            discography.push(AlbumSummary {
                id: album.clone(),
                name: name.to_string(),
            });
        }
        self.album_tracks
            .insert(album, tracks.iter().map(|t| TrackRef::new(*t)).collect());
        self
    }

    pub fn add_playlist(&mut self, user: &str, id: &str) -> &mut Self {
        self.playlists.entry(user.to_string()).or_default().push(PlaylistRef {
            id: id.to_string(),
            name: format!("Playlist {id}"),
        });
        self.entries.entry(id.to_string()).or_default();
        self
    }

    /// Append a raw row to a playlist, exactly as given.
    pub fn add_entry(&mut self, playlist: &str, entry: PlaylistEntry) -> &mut Self {
        if let Some(track) = &entry.track {
            if let Some(id) = TrackRef::parse(track.id.as_deref()) {
                self.tracks.insert(id, track.clone());
            }
        }
        self.entries.entry(playlist.to_string()).or_default().push(entry);
        self
    }

    /// Append a well-formed track to a playlist. Names are taken from the
    /// artists and albums registered so far.
    pub fn add_saved_track(
        &mut self,
        playlist: &str,
        added_at: &str,
        track: &str,
        album: &str,
        artists: &[&str],
    ) -> &mut Self {
        let album_name = self
            .discographies
            .values()
            .flatten()
            .find(|a| a.id.as_str() == album)
            .map(|a| a.name.clone());
        let raw = RawTrack {
            id: Some(track.to_string()),
            album_id: Some(album.to_string()),
            album_name,
            artists: artists
                .iter()
                .map(|a| RawArtist {
                    id: Some((*a).to_string()),
                    name: self.artists.get(&ArtistRef::new(*a)).map(|p| p.name.clone()),
                })
                .collect(),
        };
        self.add_entry(
            playlist,
            PlaylistEntry {
                added_at: Some(added_at.to_string()),
                track: Some(raw),
            },
        )
    }

    /// Every lookup keyed by `id` fails with a transport error from now on.
    pub fn fail_on(&mut self, id: &str) -> &mut Self {
        self.failing.insert(id.to_string());
        self
    }

    pub fn recover(&mut self, id: &str) -> &mut Self {
        self.failing.remove(id);
        self
    }

    /// Number of catalog calls served so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    fn check(&self, id: &str) -> Result<(), CatalogError> {
        self.calls.set(self.calls.get() + 1);
        if self.failing.contains(id) {
            return Err(CatalogError::Transport(format!("simulated connection drop on {id}")));
        }
        Ok(())
    }

    fn paged<T: Clone>(&self, items: &[T]) -> Result<Vec<T>, CatalogError> {
        let page = |offset: usize| Page {
            items: items.iter().skip(offset).take(self.page_size).cloned().collect(),
            next: (offset + self.page_size < items.len()).then(|| (offset + self.page_size).to_string()),
        };
        exhaust(page(0), |cursor| {
            cursor
                .parse::<usize>()
                .map(&page)
                .map_err(|e| CatalogError::Decode(e.to_string()))
        })
    }
}

impl Catalog for MemoryCatalog {
    fn list_playlists(&self, user: &str) -> Result<Vec<PlaylistRef>, CatalogError> {
        self.check(user)?;
        let playlists = self.playlists.get(user).map(Vec::as_slice).unwrap_or(&[]);
        self.paged(playlists)
    }

    fn list_playlist_tracks(&self, playlist: &PlaylistRef) -> Result<Vec<PlaylistEntry>, CatalogError> {
        self.check(&playlist.id)?;
        let entries = self
            .entries
            .get(&playlist.id)
            .ok_or_else(|| CatalogError::NotFound(format!("playlist {}", playlist.id)))?;
        self.paged(entries)
    }

    fn get_artist(&self, artist: &ArtistRef) -> Result<ArtistProfile, CatalogError> {
        self.check(artist.as_str())?;
        self.artists
            .get(artist)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("artist {artist}")))
    }

    fn list_artist_albums(&self, artist: &ArtistRef) -> Result<Vec<AlbumSummary>, CatalogError> {
        self.check(artist.as_str())?;
        let albums = self
            .discographies
            .get(artist)
            .ok_or_else(|| CatalogError::NotFound(format!("artist {artist}")))?;
        self.paged(albums)
    }

    fn list_album_tracks(&self, album: &AlbumRef) -> Result<Vec<TrackRef>, CatalogError> {
        self.check(album.as_str())?;
        let tracks = self
            .album_tracks
            .get(album)
            .ok_or_else(|| CatalogError::NotFound(format!("album {album}")))?;
        self.paged(tracks)
    }

    fn get_track(&self, track: &TrackRef) -> Result<RawTrack, CatalogError> {
        self.check(track.as_str())?;
        self.tracks
            .get(track)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("track {track}")))
    }
}
