//! # Recommendation State Model
//!
//! Identifiers and the two durable structures the whole tool revolves around:
//!
//! - [`SavedIndex`]: artist → album → set of tracks the user has in their playlists.
//! - [`RecommendationRecord`]: artist → ordered albums still to listen to, plus the
//!   update watermark and the single album currently in progress.
//!
//! Albums are always keyed by catalog id, never by display name, so two albums
//! sharing a title cannot collapse into one entry. Names live in [`Labels`] and
//! are only used for output.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

macro_rules! catalog_ref {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a catalog identifier. Callers must not pass an empty string;
            /// use [`Self::parse`] for raw catalog data.
            pub fn new(id: impl Into<String>) -> Self {
                let id = id.into();
                debug_assert!(!id.trim().is_empty(), "empty catalog identifier");
                Self(id)
            }

            /// Accept a raw identifier from the catalog, rejecting missing or blank ones.
            #[must_use]
            pub fn parse(raw: Option<&str>) -> Option<Self> {
                raw.map(str::trim)
                    .filter(|id| !id.is_empty() && *id != "None")
                    .map(|id| Self(id.to_string()))
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

catalog_ref!(
    /// Catalog identifier of one track.
    TrackRef
);
catalog_ref!(
    /// Catalog identifier of one album (never its display name).
    AlbumRef
);
catalog_ref!(
    /// Catalog identifier of one artist.
    ArtistRef
);

/// Albums the user has saved tracks from, per artist.
///
/// Every track under an (artist, album) pair was seen in one of the user's
/// playlists, or confirmed by the user during an update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SavedIndex {
    artists: BTreeMap<ArtistRef, BTreeMap<AlbumRef, BTreeSet<TrackRef>>>,
}

impl SavedIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `track` under `artist`/`album`. Returns `false` if it was already there.
    pub fn insert(&mut self, artist: &ArtistRef, album: &AlbumRef, track: &TrackRef) -> bool {
        self.artists
            .entry(artist.clone())
            .or_default()
            .entry(album.clone())
            .or_default()
            .insert(track.clone())
    }

    #[must_use]
    pub fn contains_artist(&self, artist: &ArtistRef) -> bool {
        self.artists.contains_key(artist)
    }

    #[must_use]
    pub fn contains_album(&self, artist: &ArtistRef, album: &AlbumRef) -> bool {
        self.artists
            .get(artist)
            .is_some_and(|albums| albums.contains_key(album))
    }

    /// Number of distinct saved tracks for this artist on this album.
    #[must_use]
    pub fn saved_count(&self, artist: &ArtistRef, album: &AlbumRef) -> usize {
        self.artists
            .get(artist)
            .and_then(|albums| albums.get(album))
            .map_or(0, BTreeSet::len)
    }

    pub fn albums(&self, artist: &ArtistRef) -> Option<&BTreeMap<AlbumRef, BTreeSet<TrackRef>>> {
        self.artists.get(artist)
    }

    pub fn artists(&self) -> impl Iterator<Item = &ArtistRef> {
        self.artists.keys()
    }

    #[must_use]
    pub fn artist_count(&self) -> usize {
        self.artists.len()
    }

    #[must_use]
    pub fn track_count(&self) -> usize {
        self.artists
            .values()
            .flat_map(BTreeMap::values)
            .map(BTreeSet::len)
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artists.is_empty()
    }
}

/// Albums still to listen to, per artist, in the order they were added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecommendationSet {
    artists: BTreeMap<ArtistRef, Vec<AlbumRef>>,
}

impl RecommendationSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `album` for `artist` unless it is already listed. Returns whether it was added.
    pub fn add(&mut self, artist: &ArtistRef, album: &AlbumRef) -> bool {
        let albums = self.artists.entry(artist.clone()).or_default();
        if albums.contains(album) {
            false
        } else {
            albums.push(album.clone());
            true
        }
    }

    /// Merge a whole discography into the artist's list, keeping existing order.
    pub fn extend<'a>(&mut self, artist: &ArtistRef, albums: impl IntoIterator<Item = &'a AlbumRef>) -> usize {
        albums
            .into_iter()
            .filter(|album| self.add(artist, album))
            .count()
    }

    /// Remove `album` from `artist`'s list. An artist left with nothing is dropped.
    pub fn remove(&mut self, artist: &ArtistRef, album: &AlbumRef) -> bool {
        let Some(albums) = self.artists.get_mut(artist) else {
            return false;
        };
        let before = albums.len();
        albums.retain(|a| a != album);
        let removed = albums.len() != before;
        if albums.is_empty() {
            self.artists.remove(artist);
        }
        removed
    }

    #[must_use]
    pub fn contains(&self, artist: &ArtistRef, album: &AlbumRef) -> bool {
        self.artists
            .get(artist)
            .is_some_and(|albums| albums.contains(album))
    }

    #[must_use]
    pub fn albums(&self, artist: &ArtistRef) -> &[AlbumRef] {
        self.artists.get(artist).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ArtistRef, &[AlbumRef])> {
        self.artists.iter().map(|(artist, albums)| (artist, albums.as_slice()))
    }

    #[must_use]
    pub fn artist_count(&self) -> usize {
        self.artists.values().filter(|albums| !albums.is_empty()).count()
    }

    #[must_use]
    pub fn album_count(&self) -> usize {
        self.artists.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.album_count() == 0
    }
}

impl<A, B, I> FromIterator<(A, I)> for RecommendationSet
where
    A: Into<String>,
    B: Into<String>,
    I: IntoIterator<Item = B>,
{
    fn from_iter<T: IntoIterator<Item = (A, I)>>(iter: T) -> Self {
        let mut set = Self::new();
        for (artist, albums) in iter {
            let artist = ArtistRef::new(artist);
            for album in albums {
                set.add(&artist, &AlbumRef::new(album));
            }
        }
        set
    }
}

/// The album currently offered to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub album: AlbumRef,
    pub artist: ArtistRef,
}

/// Display names, harvested while scanning. Never consulted by the algorithm.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Labels {
    #[serde(default)]
    pub artists: BTreeMap<ArtistRef, String>,
    #[serde(default)]
    pub albums: BTreeMap<AlbumRef, String>,
}

impl Labels {
    /// Remember a name unless one is already known.
    pub fn name_artist(&mut self, artist: &ArtistRef, name: Option<&str>) {
        if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
            self.artists
                .entry(artist.clone())
                .or_insert_with(|| name.to_string());
        }
    }

    pub fn name_album(&mut self, album: &AlbumRef, name: Option<&str>) {
        if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
            self.albums
                .entry(album.clone())
                .or_insert_with(|| name.to_string());
        }
    }

    #[must_use]
    pub fn artist<'a>(&'a self, artist: &'a ArtistRef) -> &'a str {
        self.artists.get(artist).map_or(artist.as_str(), String::as_str)
    }

    #[must_use]
    pub fn album<'a>(&'a self, album: &'a AlbumRef) -> &'a str {
        self.albums.get(album).map_or(album.as_str(), String::as_str)
    }
}

/// The recommendation record: what to listen to next, and bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationRecord {
    pub recommendations: RecommendationSet,
    /// Tracks added to playlists strictly after this date are "new" on the next update.
    pub watermark: NaiveDate,
    pub selection: Option<Selection>,
    #[serde(default)]
    pub labels: Labels,
}

impl RecommendationRecord {
    #[must_use]
    pub fn new(watermark: NaiveDate) -> Self {
        Self {
            recommendations: RecommendationSet::new(),
            watermark,
            selection: None,
            labels: Labels::default(),
        }
    }
}

/// Everything persisted for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryState {
    pub saved: SavedIndex,
    pub record: RecommendationRecord,
}

impl LibraryState {
    #[must_use]
    pub fn new(watermark: NaiveDate) -> Self {
        Self {
            saved: SavedIndex::new(),
            record: RecommendationRecord::new(watermark),
        }
    }
}
