use std::fmt;

use serde::Serialize;

use crate::clients::errors::Result;
use crate::clients::xml;

/// Scheme every metadata identifier starts with.
pub const URI_SCHEME: &str = "spotify";

/// Start of the HTTP URL that opens an item in the web player.
pub const WEB_BASE_URL: &str = "http://open.spotify.com/";

/// The three kinds of item the metadata service knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Track,
    Artist,
    Album,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Track => "track",
            EntityKind::Artist => "artist",
            EntityKind::Album => "album",
        }
    }

    /// Name of the wrapper element used for collections of this kind.
    pub fn plural(&self) -> &'static str {
        match self {
            EntityKind::Track => "tracks",
            EntityKind::Artist => "artists",
            EntityKind::Album => "albums",
        }
    }

    /// `spotify:<kind>:`
    pub fn uri_prefix(&self) -> String {
        format!("{URI_SCHEME}:{}:", self.as_str())
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prefixes `id` with `spotify:<kind>:` unless it already carries that prefix.
pub fn normalize_uri(kind: EntityKind, id: &str) -> String {
    let prefix = kind.uri_prefix();
    if id.starts_with(&prefix) {
        id.to_string()
    } else {
        format!("{prefix}{id}")
    }
}

/// Last colon-delimited segment of an identifier.
pub fn uri_token(uri: &str) -> &str {
    uri.rsplit(':').next().unwrap_or(uri)
}

/// Either exactly one value or an ordered sequence of them.
///
/// A track may be performed by several artists; the service then repeats the
/// `artist` element. Decoding collapses a single element to [`OneOrMany::One`].
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Exactly one value becomes `One`, anything else stays a sequence.
    pub fn collapse(mut values: Vec<T>) -> Self {
        if values.len() == 1 {
            if let Some(value) = values.pop() {
                return OneOrMany::One(value);
            }
        }
        OneOrMany::Many(values)
    }

    pub fn first(&self) -> Option<&T> {
        match self {
            OneOrMany::One(value) => Some(value),
            OneOrMany::Many(values) => values.first(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            OneOrMany::One(_) => 1,
            OneOrMany::Many(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        match self {
            OneOrMany::One(value) => std::slice::from_ref(value).iter(),
            OneOrMany::Many(values) => values.iter(),
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

impl<T: PartialEq> PartialEq for OneOrMany<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (OneOrMany::One(a), OneOrMany::One(b)) => a == b,
            (OneOrMany::Many(a), OneOrMany::Many(b)) => a == b,
            _ => false,
        }
    }
}

/// Capabilities shared by tracks, artists and albums.
pub trait SpotifyItem {
    fn kind(&self) -> EntityKind;

    fn uri(&self) -> &str;

    fn popularity(&self) -> f64;

    /// Serializes the item into the service's XML vocabulary.
    fn to_xml(&self) -> Result<String>;

    fn id(&self) -> &str {
        uri_token(self.uri())
    }

    /// Web player URL, e.g. `http://open.spotify.com/track/<id>`.
    fn url(&self) -> String {
        format!("{WEB_BASE_URL}{}/{}", self.kind(), self.id())
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn popularity_as_percent(&self) -> u32 {
        (self.popularity() * 100.0).round().max(0.0) as u32
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Artist {
    pub uri: String,
    pub name: String,
    pub popularity: f64,
    /// Empty unless the artist was fetched with album detail.
    pub albums: Vec<Album>,
}

impl Artist {
    pub fn new(uri: impl Into<String>, name: impl Into<String>, popularity: f64) -> Self {
        Artist {
            uri: uri.into(),
            name: name.into(),
            popularity,
            albums: Vec::new(),
        }
    }

    pub fn set_uri(&mut self, uri: impl Into<String>) {
        self.uri = uri.into();
    }
}

impl PartialEq for Artist {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri && self.name == other.name && self.albums == other.albums
    }
}

impl fmt::Display for Artist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl SpotifyItem for Artist {
    fn kind(&self) -> EntityKind {
        EntityKind::Artist
    }

    fn uri(&self) -> &str {
        &self.uri
    }

    fn popularity(&self) -> f64 {
        self.popularity
    }

    fn to_xml(&self) -> Result<String> {
        xml::encode_item(&Item::Artist(self.clone()))
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Album {
    pub uri: String,
    pub name: String,
    pub released: String,
    pub popularity: f64,
    pub artist: Option<Artist>,
    /// Empty unless the album was fetched with track detail.
    pub tracks: Vec<Track>,
    /// Territory tags; `worldwide` means available everywhere.
    pub territories: Vec<String>,
}

impl Album {
    pub fn new(
        uri: impl Into<String>,
        name: impl Into<String>,
        released: impl Into<String>,
        artist: Option<Artist>,
    ) -> Self {
        Album {
            uri: uri.into(),
            name: name.into(),
            released: released.into(),
            artist,
            ..Album::default()
        }
    }

    pub fn set_uri(&mut self, uri: impl Into<String>) {
        self.uri = uri.into();
    }

    pub fn is_available(&self, territory: &str) -> bool {
        self.territories
            .iter()
            .any(|t| t == "worldwide" || t == territory)
    }
}

impl PartialEq for Album {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
            && self.name == other.name
            && self.artist == other.artist
            && self.tracks == other.tracks
    }
}

impl fmt::Display for Album {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl SpotifyItem for Album {
    fn kind(&self) -> EntityKind {
        EntityKind::Album
    }

    fn uri(&self) -> &str {
        &self.uri
    }

    fn popularity(&self) -> f64 {
        self.popularity
    }

    fn to_xml(&self) -> Result<String> {
        xml::encode_item(&Item::Album(self.clone()))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Track {
    pub uri: String,
    pub title: String,
    pub artist: OneOrMany<Artist>,
    pub album: Album,
    /// Length in seconds.
    pub length: f64,
    pub popularity: f64,
    pub track_number: u32,
    /// 0 when the service does not report it.
    pub disc_number: u32,
}

impl Track {
    pub fn set_uri(&mut self, uri: impl Into<String>) {
        self.uri = uri.into();
    }

    /// All performer names joined with `", "`.
    pub fn artist_names(&self) -> String {
        self.artist
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Length formatted as `mm:ss`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn length_as_minutes(&self) -> String {
        let seconds = self.length.round().max(0.0) as u64;
        format!("{:02}:{:02}", seconds / 60, seconds % 60)
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.uri == other.uri
            && self.title == other.title
            && self.artist == other.artist
            && self.album == other.album
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} ({})", self.title, self.artist_names(), self.album)
    }
}

impl SpotifyItem for Track {
    fn kind(&self) -> EntityKind {
        EntityKind::Track
    }

    fn uri(&self) -> &str {
        &self.uri
    }

    fn popularity(&self) -> f64 {
        self.popularity
    }

    fn to_xml(&self) -> Result<String> {
        xml::encode_item(&Item::Track(self.clone()))
    }
}

/// Any metadata item. Items of different kinds never compare equal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Item {
    Track(Track),
    Artist(Artist),
    Album(Album),
}

impl Item {
    fn as_spotify_item(&self) -> &dyn SpotifyItem {
        match self {
            Item::Track(track) => track,
            Item::Artist(artist) => artist,
            Item::Album(album) => album,
        }
    }
}

impl SpotifyItem for Item {
    fn kind(&self) -> EntityKind {
        self.as_spotify_item().kind()
    }

    fn uri(&self) -> &str {
        self.as_spotify_item().uri()
    }

    fn popularity(&self) -> f64 {
        self.as_spotify_item().popularity()
    }

    fn to_xml(&self) -> Result<String> {
        xml::encode_item(self)
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Item::Track(track) => track.fmt(f),
            Item::Artist(artist) => artist.fmt(f),
            Item::Album(album) => album.fmt(f),
        }
    }
}

impl From<Track> for Item {
    fn from(track: Track) -> Self {
        Item::Track(track)
    }
}

impl From<Artist> for Item {
    fn from(artist: Artist) -> Self {
        Item::Artist(artist)
    }
}

impl From<Album> for Item {
    fn from(album: Album) -> Self {
        Item::Album(album)
    }
}
