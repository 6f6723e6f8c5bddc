use std::path::Path;

use log::{debug, info};

use crate::clients::config::ClientConfig;
use crate::clients::entities::{Album, Artist, EntityKind, Item, Track, normalize_uri};
use crate::clients::errors::{Error, Result};
use crate::clients::local_storage::{CachedFetcher, LocalStorage, cache_key};
use crate::clients::playbutton::PlayButton;
use crate::clients::transport::{ReqwestTransport, Transport};
use crate::clients::xml;

/// Client for the metadata web service.
///
/// Every operation makes at most one request, answered from the local cache
/// when a fresh copy exists. Tracks can be collected into a list that feeds
/// the play button; with `auto_add_tracks` set, searched and looked-up tracks
/// are appended automatically.
pub struct MetadataClient {
    fetcher: CachedFetcher,
    config: ClientConfig,
    track_list: Vec<Track>,
}

impl MetadataClient {
    pub fn new(transport: Box<dyn Transport>, config: ClientConfig) -> Result<Self> {
        let storage = if config.use_cache {
            LocalStorage::new(&config.cache_dir)?
        } else {
            debug!("Response cache disabled");
            LocalStorage::disabled()
        };
        Ok(MetadataClient {
            fetcher: CachedFetcher::new(transport, storage),
            config,
            track_list: Vec::new(),
        })
    }

    // Create a client from METATUNE_* environment variables over the default HTTP transport
    pub fn try_default() -> Result<Self> {
        MetadataClientBuilder::new().build()
    }

    pub fn builder() -> MetadataClientBuilder {
        MetadataClientBuilder::new()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Directory holding cached responses, `None` when caching is off.
    pub fn cache_dir(&self) -> Option<&Path> {
        self.fetcher.storage().cache_dir()
    }

    pub fn search_track(&mut self, query: &str, page: u32) -> Result<Vec<Track>> {
        let url = self.search_url(EntityKind::Track, query, page);
        let tracks = xml::parse_tracks(&self.request(&url)?)?.into_vec();
        info!("Found {} tracks for {query:?}", tracks.len());
        if self.config.auto_add_tracks {
            self.append_tracks(tracks.iter().cloned());
        }
        Ok(tracks)
    }

    pub fn search_artist(&self, query: &str, page: u32) -> Result<Vec<Artist>> {
        let url = self.search_url(EntityKind::Artist, query, page);
        let artists = xml::parse_artists(&self.request(&url)?)?.into_vec();
        info!("Found {} artists for {query:?}", artists.len());
        Ok(artists)
    }

    pub fn search_album(&self, query: &str, page: u32) -> Result<Vec<Album>> {
        let url = self.search_url(EntityKind::Album, query, page);
        let albums = xml::parse_albums(&self.request(&url)?)?.into_vec();
        info!("Found {} albums for {query:?}", albums.len());
        Ok(albums)
    }

    /// Looks up any identifier, dispatching on its kind segment.
    /// Anything that is neither an artist nor an album is looked up as a track.
    pub fn lookup(&mut self, uri: &str, detailed: bool) -> Result<Item> {
        let mut segments = uri.split(':');
        let kind = match (segments.next(), segments.next()) {
            (Some(_), Some(kind)) => kind,
            _ => return Err(Error::InvalidIdentifier(uri.to_string())),
        };
        match kind {
            "artist" => self.lookup_artist(uri, detailed).map(Item::Artist),
            "album" => self.lookup_album(uri, detailed).map(Item::Album),
            _ => self.lookup_track(uri).map(Item::Track),
        }
    }

    /// Accepts a full `spotify:track:` identifier or a bare token. The
    /// returned track carries the requested identifier.
    pub fn lookup_track(&mut self, id: &str) -> Result<Track> {
        let uri = normalize_uri(EntityKind::Track, id);
        let url = self.lookup_url(&uri, None);
        let bytes = self.request(&url)?;
        let mut track = xml::parse_single(&bytes, EntityKind::Track, |node| {
            xml::decode_track(node, None)
        })?;
        track.set_uri(uri);
        if self.config.auto_add_tracks {
            self.track_list.push(track.clone());
        }
        Ok(track)
    }

    /// With `detailed` the artist's albums are included.
    pub fn lookup_artist(&self, id: &str, detailed: bool) -> Result<Artist> {
        let uri = normalize_uri(EntityKind::Artist, id);
        let url = self.lookup_url(&uri, detailed.then_some("albumdetail"));
        let bytes = self.request(&url)?;
        let mut artist = xml::parse_single(&bytes, EntityKind::Artist, xml::decode_artist)?;
        artist.set_uri(uri);
        Ok(artist)
    }

    pub fn lookup_artist_detailed(&self, id: &str) -> Result<Artist> {
        self.lookup_artist(id, true)
    }

    /// With `detailed` the album's tracks are included.
    pub fn lookup_album(&self, id: &str, detailed: bool) -> Result<Album> {
        let uri = normalize_uri(EntityKind::Album, id);
        let url = self.lookup_url(&uri, detailed.then_some("trackdetail"));
        let bytes = self.request(&url)?;
        let mut album = xml::parse_single(&bytes, EntityKind::Album, |node| {
            xml::decode_album(node, Some(uri.as_str()))
        })?;
        album.set_uri(uri);
        Ok(album)
    }

    pub fn lookup_album_detailed(&self, id: &str) -> Result<Album> {
        self.lookup_album(id, true)
    }

    /// `<search base><kind>?q=<query>[&page=<n>]`
    pub fn search_url(&self, kind: EntityKind, query: &str, page: u32) -> String {
        format!(
            "{}{}?q={}{}",
            self.config.search_base_url,
            kind,
            translate_query(query),
            page_suffix(page)
        )
    }

    /// `<lookup base>?uri=<uri>[&extras=<extras>]`
    pub fn lookup_url(&self, uri: &str, extras: Option<&str>) -> String {
        let mut url = format!("{}?uri={uri}", self.config.lookup_base_url);
        if let Some(extras) = extras {
            url.push_str("&extras=");
            url.push_str(extras);
        }
        url
    }

    pub fn append_tracks(&mut self, tracks: impl IntoIterator<Item = Track>) -> &[Track] {
        self.track_list.extend(tracks);
        &self.track_list
    }

    /// Tracks collected for the play button so far.
    pub fn auto_generated_list(&self) -> &[Track] {
        &self.track_list
    }

    pub fn clear_track_list(&mut self) {
        self.track_list.clear();
    }

    /// Play button source for `tracks`, or for the collected list when
    /// `tracks` is empty.
    pub fn play_button_source(&self, tracks: &[Track], title: &str) -> Result<String> {
        if tracks.is_empty() {
            PlayButton::source_from_tracks(&self.track_list, title)
        } else {
            PlayButton::source_from_tracks(tracks, title)
        }
    }

    fn request(&self, url: &str) -> Result<Vec<u8>> {
        debug!("Requesting {url}");
        self.fetcher
            .fetch(url, &cache_key(url), self.config.cache_ttl)
    }
}

/// Prepares free text for the `q` parameter.
///
/// Trims, drops a leading run of non-letters ending in a dash (`"01 - Title"`),
/// turns `_`, `(` and `)` into spaces, collapses whitespace and percent-encodes.
/// Dashes inside tag searches such as `genre:brit-pop` are kept.
pub fn translate_query(query: &str) -> String {
    let query = strip_leading_dash_run(query.trim());
    let spaced: String = query
        .chars()
        .map(|c| if matches!(c, '_' | '(' | ')') { ' ' } else { c })
        .collect();
    let collapsed = spaced.split_whitespace().collect::<Vec<_>>().join(" ");
    urlencoding::encode(&collapsed).into_owned()
}

fn strip_leading_dash_run(query: &str) -> &str {
    let run_end = query
        .find(|c: char| c.is_ascii_alphabetic() || c == ':')
        .unwrap_or(query.len());
    match query[..run_end].rfind('-') {
        Some(dash) if dash > 0 => &query[dash + 1..],
        _ => query,
    }
}

fn page_suffix(page: u32) -> String {
    if page > 1 {
        format!("&page={page}")
    } else {
        String::new()
    }
}

pub struct MetadataClientBuilder {
    transport: Option<Box<dyn Transport>>,
    config: Option<ClientConfig>,
    auto_add_tracks: Option<bool>,
}

impl Default for MetadataClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataClientBuilder {
    pub fn new() -> Self {
        Self {
            transport: None,
            config: None, // Read from METATUNE_* environment variables when not given
            auto_add_tracks: None,
        }
    }

    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn auto_add_tracks(mut self, enabled: bool) -> Self {
        self.auto_add_tracks = Some(enabled);
        self
    }

    pub fn build(self) -> Result<MetadataClient> {
        let mut config = match self.config {
            Some(c) => c,
            None => ClientConfig::try_from_env()?,
        };
        if let Some(enabled) = self.auto_add_tracks {
            config.auto_add_tracks = enabled;
        }
        let transport = match self.transport {
            Some(t) => t,
            None => Box::new(ReqwestTransport::new(config.connect_timeout)?),
        };
        MetadataClient::new(transport, config)
    }
}
