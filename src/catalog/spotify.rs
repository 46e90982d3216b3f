//! Spotify Web API implementation of [`Catalog`].
//!
//! Blocking client. Each request is retried on transport errors, `429` and
//! `5xx` responses with exponential back-off (honouring `Retry-After`), and a
//! `401` triggers one refresh-token grant when credentials allow it. None of
//! this is visible to callers: a returned error means the request gave up.

use super::{exhaust, AlbumSummary, ArtistProfile, Catalog, Page, PlaylistEntry, PlaylistRef, RawArtist, RawTrack};
use crate::config::CatalogConfig;
use crate::error::CatalogError;
use crate::model::{AlbumRef, ArtistRef, TrackRef};
use log::{debug, info, warn};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::cell::RefCell;
use std::time::Duration;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct Paging<T> {
    items: Vec<T>,
    next: Option<String>,
}

impl<T> From<Paging<T>> for Page<T> {
    fn from(paging: Paging<T>) -> Self {
        Page {
            items: paging.items,
            next: paging.next,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlaylistObject {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    #[serde(default)]
    added_at: Option<String>,
    #[serde(default)]
    track: Option<TrackObject>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TrackObject {
    id: Option<String>,
    album: Option<AlbumObject>,
    artists: Vec<ArtistObject>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AlbumObject {
    id: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ArtistObject {
    id: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArtistFull {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SimpleTrack {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl From<TrackObject> for RawTrack {
    fn from(track: TrackObject) -> Self {
        let (album_id, album_name) = track
            .album
            .map_or((None, None), |album| (album.id, album.name));
        RawTrack {
            id: track.id,
            album_id,
            album_name,
            artists: track
                .artists
                .into_iter()
                .map(|a| RawArtist { id: a.id, name: a.name })
                .collect(),
        }
    }
}

/// Spotify Web API client.
pub struct SpotifyClient {
    http: Client,
    config: CatalogConfig,
    token: RefCell<Option<String>>,
}

impl SpotifyClient {
    /// Build a client from catalog settings.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be constructed, or if neither an access
    /// token nor refresh credentials are configured.
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        if config.access_token.is_none() && !config.can_refresh() {
            return Err(CatalogError::Auth(
                "no access token configured; set SPOTIFY_ACCESS_TOKEN or refresh credentials".to_string(),
            ));
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("gimme/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            config: config.clone(),
            token: RefCell::new(config.access_token.clone()),
        })
    }

    fn endpoint(&self, segments: &[&str], params: &[(&str, &str)]) -> Result<String, CatalogError> {
        build_endpoint(&self.config.api_base, segments, params)
    }

    fn bearer(&self) -> Result<String, CatalogError> {
        if let Some(token) = self.token.borrow().as_ref() {
            return Ok(token.clone());
        }
        self.refresh_access_token()
    }

    /// Exchange the refresh token for a new access token.
    fn refresh_access_token(&self) -> Result<String, CatalogError> {
        let (Some(refresh), Some(id), Some(secret)) = (
            self.config.refresh_token.as_deref(),
            self.config.client_id.as_deref(),
            self.config.client_secret.as_deref(),
        ) else {
            return Err(CatalogError::Auth("access token expired and no refresh credentials configured".to_string()));
        };

        info!("Refreshing Spotify access token");
        let response = self
            .http
            .post(&self.config.token_url)
            .basic_auth(id, Some(secret))
            .form(&[("grant_type", "refresh_token"), ("refresh_token", refresh)])
            .send()?;

        if !response.status().is_success() {
            return Err(CatalogError::Auth(format!("token refresh rejected with HTTP {}", response.status())));
        }
        let token: TokenResponse = response.json()?;
        *self.token.borrow_mut() = Some(token.access_token.clone());
        Ok(token.access_token)
    }

    fn back_off(&self, attempt: u32, advertised: Option<Duration>) {
        let wait = advertised.unwrap_or_else(|| backoff_delay(self.config.retry_backoff_ms, attempt));
        debug!("Retry {attempt}/{} in {wait:?}", self.config.max_retries);
        std::thread::sleep(wait);
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, CatalogError> {
        let max_retries = self.config.max_retries;
        let mut attempt = 0;
        let mut refreshed = false;

        loop {
            let token = self.bearer()?;
            let response = match self.http.get(url).bearer_auth(&token).send() {
                Ok(response) => response,
                Err(e) => {
                    let err = CatalogError::from(e);
                    if err.is_transient() && attempt < max_retries {
                        attempt += 1;
                        warn!("Request to {url} failed ({err}), retrying");
                        self.back_off(attempt, None);
                        continue;
                    }
                    return Err(err);
                }
            };

            let status = response.status().as_u16();
            if response.status().is_success() {
                return response.json::<T>().map_err(CatalogError::from);
            }

            match status {
                401 if !refreshed && self.config.can_refresh() => {
                    refreshed = true;
                    self.refresh_access_token()?;
                }
                401 | 403 => {
                    return Err(CatalogError::Auth(format!("HTTP {status} for {url}")));
                }
                404 => return Err(CatalogError::NotFound(url.to_string())),
                429 => {
                    if attempt >= max_retries {
                        return Err(CatalogError::RateLimited(url.to_string()));
                    }
                    attempt += 1;
                    let advertised = retry_after(response.headers());
                    warn!("Rate limited on {url}");
                    self.back_off(attempt, advertised);
                }
                s if s >= 500 && attempt < max_retries => {
                    attempt += 1;
                    warn!("Server error {s} on {url}, retrying");
                    self.back_off(attempt, None);
                }
                s => {
                    return Err(CatalogError::Status {
                        status: s,
                        url: url.to_string(),
                    })
                }
            }
        }
    }

    fn paged<T: DeserializeOwned>(&self, first_url: &str) -> Result<Vec<T>, CatalogError> {
        let first: Paging<T> = self.get_json(first_url)?;
        exhaust(first.into(), |next| self.get_json::<Paging<T>>(next).map(Page::from))
    }
}

impl Catalog for SpotifyClient {
    fn list_playlists(&self, user: &str) -> Result<Vec<PlaylistRef>, CatalogError> {
        let url = self.endpoint(&["users", user, "playlists"], &[("limit", "50")])?;
        let playlists: Vec<PlaylistObject> = self.paged(&url)?;
        Ok(playlists
            .into_iter()
            .map(|p| PlaylistRef {
                name: p.name.unwrap_or_else(|| p.id.clone()),
                id: p.id,
            })
            .collect())
    }

    fn list_playlist_tracks(&self, playlist: &PlaylistRef) -> Result<Vec<PlaylistEntry>, CatalogError> {
        let url = self.endpoint(&["playlists", &playlist.id, "tracks"], &[("limit", "100")])?;
        let items: Vec<PlaylistItem> = self.paged(&url)?;
        Ok(items
            .into_iter()
            .map(|item| PlaylistEntry {
                added_at: item.added_at,
                track: item.track.map(RawTrack::from),
            })
            .collect())
    }

    fn get_artist(&self, artist: &ArtistRef) -> Result<ArtistProfile, CatalogError> {
        let url = self.endpoint(&["artists", artist.as_str()], &[])?;
        let full: ArtistFull = self.get_json(&url)?;
        Ok(ArtistProfile { name: full.name })
    }

    fn list_artist_albums(&self, artist: &ArtistRef) -> Result<Vec<AlbumSummary>, CatalogError> {
        let url = self.endpoint(
            &["artists", artist.as_str(), "albums"],
            &[("include_groups", "album,single"), ("limit", "50")],
        )?;
        let albums: Vec<AlbumObject> = self.paged(&url)?;
        Ok(albums
            .into_iter()
            .filter_map(|a| {
                let id = AlbumRef::parse(a.id.as_deref())?;
                Some(AlbumSummary {
                    name: a.name.unwrap_or_else(|| id.to_string()),
                    id,
                })
            })
            .collect())
    }

    fn list_album_tracks(&self, album: &AlbumRef) -> Result<Vec<TrackRef>, CatalogError> {
        let url = self.endpoint(&["albums", album.as_str(), "tracks"], &[("limit", "50")])?;
        let tracks: Vec<SimpleTrack> = self.paged(&url)?;
        Ok(tracks
            .into_iter()
            .filter_map(|t| TrackRef::parse(t.id.as_deref()))
            .collect())
    }

    fn get_track(&self, track: &TrackRef) -> Result<RawTrack, CatalogError> {
        let url = self.endpoint(&["tracks", track.as_str()], &[])?;
        let full: TrackObject = self.get_json(&url)?;
        Ok(full.into())
    }
}

fn build_endpoint(base: &str, segments: &[&str], params: &[(&str, &str)]) -> Result<String, CatalogError> {
    let mut url = reqwest::Url::parse(base).map_err(|e| CatalogError::Decode(format!("invalid api_base {base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| CatalogError::Decode(format!("api_base {base} cannot take a path")))?
        .pop_if_empty()
        .extend(segments);
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params);
    }
    Ok(url.to_string())
}

/// Delay requested by a `Retry-After` header given in seconds.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(base_ms.saturating_mul(factor)).min(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_endpoint_encodes_segments() {
        let url = build_endpoint("https://api.spotify.com/v1", &["users", "a b", "playlists"], &[("limit", "50")]).unwrap();
        assert_eq!(url, "https://api.spotify.com/v1/users/a%20b/playlists?limit=50");

        let bare = build_endpoint("https://api.spotify.com/v1/", &["tracks", "abc"], &[]).unwrap();
        assert_eq!(bare, "https://api.spotify.com/v1/tracks/abc");
    }

    #[test]
    fn test_playlist_page_decoding() {
        let json = r#"{
            "items": [
                {"added_at": "2024-01-02T10:00:00Z", "track": {
                    "id": "t1",
                    "album": {"id": "al1", "name": "Blue"},
                    "artists": [{"id": "ar1", "name": "Joni Mitchell"}]
                }},
                {"added_at": "2024-01-03T10:00:00Z", "track": null},
                {"added_at": "2024-01-04T10:00:00Z", "track": {"id": null, "album": {}, "artists": []}}
            ],
            "next": "https://api.spotify.com/v1/playlists/p/tracks?offset=100&limit=100"
        }"#;
        let page: Paging<PlaylistItem> = serde_json::from_str(json).unwrap();
        assert!(page.next.is_some());
        assert_eq!(page.items.len(), 3);

        let entries: Vec<PlaylistEntry> = page
            .items
            .into_iter()
            .map(|item| PlaylistEntry {
                added_at: item.added_at,
                track: item.track.map(RawTrack::from),
            })
            .collect();
        let credits = entries[0].track.as_ref().unwrap().credits().unwrap();
        assert_eq!(credits.album.as_str(), "al1");
        assert_eq!(credits.artists[0].1.as_deref(), Some("Joni Mitchell"));
        assert!(entries[1].track.is_none());
        assert!(entries[2].track.as_ref().unwrap().credits().is_none());
    }

    #[test]
    fn test_retry_after_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("3"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(3)));
        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        assert_eq!(backoff_delay(500, 1), Duration::from_millis(500));
        assert_eq!(backoff_delay(500, 2), Duration::from_millis(1000));
        assert_eq!(backoff_delay(500, 4), Duration::from_millis(4000));
        assert_eq!(backoff_delay(500, 20), MAX_BACKOFF);
    }

    #[test]
    fn test_client_requires_credentials() {
        let result = SpotifyClient::new(&CatalogConfig::default());
        assert!(matches!(result, Err(CatalogError::Auth(_))));

        let config = CatalogConfig {
            access_token: Some("token".into()),
            ..CatalogConfig::default()
        };
        assert!(SpotifyClient::new(&config).is_ok());
    }
}
