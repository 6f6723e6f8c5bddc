//! Decoding and encoding of the metadata service's XML vocabulary.
//!
//! Responses are read into a small owned element tree first ([`XmlNode`]),
//! which the decoders then walk. Namespace prefixes are dropped, so
//! `opensearch:totalResults` is seen as `totalResults`.

use log::debug;
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::clients::entities::{Album, Artist, EntityKind, Item, OneOrMany, Track};
use crate::clients::errors::{Error, Result};

/// Attribute carrying an item's identifier.
const ID_ATTRIBUTE: &str = "href";

/// One element of a parsed document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    /// Parses a whole document and returns its root element.
    pub fn parse(xml: &[u8]) -> Result<XmlNode> {
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        let mut stack: Vec<XmlNode> = Vec::new();
        let mut root: Option<XmlNode> = None;

        loop {
            let event = reader.read_event_into(&mut buf).map_err(|e| {
                Error::ParseError(format!("{e} at position {}", reader.buffer_position()))
            })?;
            match event {
                Event::Start(start) => stack.push(XmlNode::from_start(&start)?),
                Event::Empty(start) => {
                    let node = XmlNode::from_start(&start)?;
                    attach(&mut stack, &mut root, node)?;
                }
                Event::End(_) => {
                    let node = stack
                        .pop()
                        .ok_or_else(|| Error::ParseError("unexpected closing tag".into()))?;
                    attach(&mut stack, &mut root, node)?;
                }
                Event::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        let text = text
                            .unescape()
                            .map_err(|e| Error::ParseError(e.to_string()))?;
                        current.text.push_str(&text);
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = stack.last_mut() {
                        current
                            .text
                            .push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if let Some(open) = stack.last() {
            return Err(Error::ParseError(format!(
                "element <{}> is never closed",
                open.name
            )));
        }
        root.ok_or_else(|| Error::ParseError("document has no root element".into()))
    }

    fn from_start(start: &BytesStart<'_>) -> Result<XmlNode> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| Error::ParseError(e.to_string()))?;
            let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
            let value = attribute
                .unescape_value()
                .map_err(|e| Error::ParseError(e.to_string()))?
                .into_owned();
            attributes.push((key, value));
        }
        Ok(XmlNode {
            name,
            attributes,
            ..XmlNode::default()
        })
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Trimmed text of the first child called `name`, or `""`.
    pub fn child_text(&self, name: &str) -> &str {
        self.child(name).map_or("", |c| c.text.trim())
    }

    fn child_number<T: std::str::FromStr + Default>(&self, name: &str) -> T {
        self.child_text(name).parse().unwrap_or_default()
    }

    fn id(&self) -> String {
        self.attr(ID_ATTRIBUTE).unwrap_or_default().to_string()
    }
}

fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    } else if root.is_none() {
        *root = Some(node);
    } else {
        return Err(Error::ParseError("document has more than one root element".into()));
    }
    Ok(())
}

// Decoding

/// How deep the album being decoded sits in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AlbumDepth {
    /// Album is the thing being decoded; its tracks are decoded too.
    TopLevel,
    /// Album listed under an artist; tracks are never decoded from here.
    WithinArtist,
}

/// Decodes a `<track>` element.
///
/// With `owner_album` the track belongs to an album that is already decoded and
/// the track's own `<album>` element is ignored.
pub fn decode_track(node: &XmlNode, owner_album: Option<Album>) -> Track {
    let artists: Vec<Artist> = node.children_named("artist").map(decode_artist).collect();
    let artist = OneOrMany::collapse(artists);

    let album = match owner_album {
        Some(album) => album,
        None => decode_track_album(node.child("album"), artist.first()),
    };

    Track {
        uri: node.id(),
        title: node.child_text("name").to_string(),
        artist,
        album,
        length: node.child_number("length"),
        popularity: node.child_number("popularity"),
        track_number: node.child_number("track-number"),
        disc_number: node.child_number("disc-number"),
    }
}

/// Album embedded in a track. Search results carry no artist for it, so the
/// first track artist stands in unless the element names its own.
fn decode_track_album(node: Option<&XmlNode>, first_artist: Option<&Artist>) -> Album {
    let Some(node) = node else {
        return Album::new("", "", "", first_artist.cloned());
    };
    let artist = match node.child("artist") {
        Some(artist) => Some(decode_shallow_artist(artist)),
        None => first_artist.cloned(),
    };
    let mut album = Album::new(
        node.id(),
        node.child_text("name"),
        node.child_text("released"),
        artist,
    );
    album.popularity = node.child_number("popularity");
    album.territories = decode_territories(node);
    album
}

/// Decodes an `<artist>` element, including its `<albums>` block if present.
pub fn decode_artist(node: &XmlNode) -> Artist {
    let mut artist = decode_shallow_artist(node);
    if let Some(albums) = node.child("albums") {
        artist.albums = albums
            .children_named("album")
            .map(|album| decode_album_at(album, None, AlbumDepth::WithinArtist))
            .collect();
    }
    artist
}

fn decode_shallow_artist(node: &XmlNode) -> Artist {
    Artist::new(
        node.id(),
        node.child_text("name"),
        node.child_number("popularity"),
    )
}

/// Decodes an `<album>` element and its `<tracks>` block.
///
/// `uri_override` replaces the identifier embedded in the element; every
/// decoded track receives its own copy of the album carrying that identifier.
pub fn decode_album(node: &XmlNode, uri_override: Option<&str>) -> Album {
    decode_album_at(node, uri_override, AlbumDepth::TopLevel)
}

fn decode_album_at(node: &XmlNode, uri_override: Option<&str>, depth: AlbumDepth) -> Album {
    let artist = node.child("artist").map(|artist| match depth {
        AlbumDepth::TopLevel => decode_artist(artist),
        AlbumDepth::WithinArtist => decode_shallow_artist(artist),
    });
    let uri = uri_override.map_or_else(|| node.id(), str::to_string);

    let mut album = Album::new(
        uri,
        node.child_text("name"),
        node.child_text("released"),
        artist,
    );
    album.popularity = node.child_number("popularity");
    album.territories = decode_territories(node);

    if depth == AlbumDepth::TopLevel {
        if let Some(tracks) = node.child("tracks") {
            let decoded: Vec<Track> = tracks
                .children_named("track")
                .map(|track| decode_track(track, Some(album.clone())))
                .collect();
            album.tracks = decoded;
        }
    }
    album
}

fn decode_territories(album: &XmlNode) -> Vec<String> {
    album
        .child("availability")
        .map(|availability| availability.child_text("territories"))
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Finds the items of `kind` in a response.
///
/// A repeated-item document (`<tracks><track/>...</tracks>`) yields `Many`,
/// possibly empty; a single-item document yields `One` for its root.
fn locate<'a>(root: &'a XmlNode, kind: EntityKind) -> Result<OneOrMany<&'a XmlNode>> {
    let items: Vec<&XmlNode> = root.children_named(kind.as_str()).collect();
    if !items.is_empty() || root.name == kind.plural() {
        return Ok(OneOrMany::Many(items));
    }
    if root.child("name").is_some() {
        return Ok(OneOrMany::One(root));
    }
    Err(Error::malformed(
        kind,
        format!("root element <{}> holds no {kind} data", root.name),
    ))
}

fn decode_document<T>(
    xml: &[u8],
    kind: EntityKind,
    decode: impl Fn(&XmlNode) -> T,
) -> Result<OneOrMany<T>> {
    let root = XmlNode::parse(xml)?;
    let decoded = match locate(&root, kind)? {
        OneOrMany::One(node) => OneOrMany::One(decode(node)),
        OneOrMany::Many(nodes) => OneOrMany::Many(nodes.into_iter().map(decode).collect()),
    };
    debug!("Decoded {} {kind} item(s)", decoded.len());
    Ok(decoded)
}

pub fn parse_tracks(xml: &[u8]) -> Result<OneOrMany<Track>> {
    decode_document(xml, EntityKind::Track, |node| decode_track(node, None))
}

pub fn parse_artists(xml: &[u8]) -> Result<OneOrMany<Artist>> {
    decode_document(xml, EntityKind::Artist, decode_artist)
}

pub fn parse_albums(xml: &[u8]) -> Result<OneOrMany<Album>> {
    decode_document(xml, EntityKind::Album, |node| decode_album(node, None))
}

/// Decodes a direct lookup response, where the root element is the item itself.
pub fn parse_single<T>(
    xml: &[u8],
    kind: EntityKind,
    decode: impl Fn(&XmlNode) -> T,
) -> Result<T> {
    let root = XmlNode::parse(xml)?;
    if root.name != kind.as_str() && root.child("name").is_none() {
        return Err(Error::malformed(
            kind,
            format!("expected a single <{kind}>, got <{}>", root.name),
        ));
    }
    Ok(decode(&root))
}

// Encoding

type XmlWriter = Writer<Vec<u8>>;

/// Encodes one item as a standalone XML document.
pub fn encode_item(item: &Item) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    write_declaration(&mut writer)?;
    write_item(&mut writer, item)?;
    finish(writer)
}

/// Encodes a homogeneous collection under `<tracks>`, `<artists>` or `<albums>`.
pub fn encode_items(items: &[Item]) -> Result<String> {
    let Some(first) = items.first() else {
        return Err(Error::EmptyInput);
    };
    let kind = item_kind(first);
    if let Some(other) = items.iter().find(|item| item_kind(item) != kind) {
        return Err(Error::UnsupportedType(format!(
            "a {} in a collection of {}s",
            item_kind(other),
            kind
        )));
    }

    let mut writer = Writer::new(Vec::new());
    write_declaration(&mut writer)?;
    write(&mut writer, Event::Start(BytesStart::new(kind.plural())))?;
    for item in items {
        write_item(&mut writer, item)?;
    }
    write(&mut writer, Event::End(BytesEnd::new(kind.plural())))?;
    finish(writer)
}

fn item_kind(item: &Item) -> EntityKind {
    match item {
        Item::Track(_) => EntityKind::Track,
        Item::Artist(_) => EntityKind::Artist,
        Item::Album(_) => EntityKind::Album,
    }
}

fn write_item(writer: &mut XmlWriter, item: &Item) -> Result<()> {
    match item {
        Item::Track(track) => write_track(writer, track),
        Item::Artist(artist) => write_artist(writer, artist),
        Item::Album(album) => write_album(writer, album),
    }
}

fn write_track(writer: &mut XmlWriter, track: &Track) -> Result<()> {
    open(writer, "track", &track.uri)?;
    write_name(writer, &track.title)?;
    for artist in track.artist.iter() {
        write_artist(writer, artist)?;
    }
    write_album(writer, &track.album)?;
    write_scalar(writer, "length", track.length)?;
    write_scalar(writer, "popularity", track.popularity)?;
    write_scalar(writer, "track-number", track.track_number)?;
    write_scalar(writer, "disc-number", track.disc_number)?;
    close(writer, "track")
}

fn write_artist(writer: &mut XmlWriter, artist: &Artist) -> Result<()> {
    open(writer, "artist", &artist.uri)?;
    write_name(writer, &artist.name)?;
    write(writer, Event::Start(BytesStart::new("albums")))?;
    for album in &artist.albums {
        write_album(writer, album)?;
    }
    write(writer, Event::End(BytesEnd::new("albums")))?;
    write_scalar(writer, "popularity", artist.popularity)?;
    close(writer, "artist")
}

fn write_album(writer: &mut XmlWriter, album: &Album) -> Result<()> {
    open(writer, "album", &album.uri)?;
    write_name(writer, &album.name)?;
    if let Some(artist) = &album.artist {
        write_artist(writer, artist)?;
    }
    write(writer, Event::Start(BytesStart::new("tracks")))?;
    for track in &album.tracks {
        write_track(writer, track)?;
    }
    write(writer, Event::End(BytesEnd::new("tracks")))?;
    write_scalar(writer, "popularity", album.popularity)?;
    write_scalar(writer, "released", &album.released)?;
    write(writer, Event::Start(BytesStart::new("availability")))?;
    write_scalar(writer, "territories", album.territories.join(" "))?;
    write(writer, Event::End(BytesEnd::new("availability")))?;
    close(writer, "album")
}

fn open(writer: &mut XmlWriter, name: &str, uri: &str) -> Result<()> {
    let mut start = BytesStart::new(name);
    start.push_attribute((ID_ATTRIBUTE, uri));
    write(writer, Event::Start(start))
}

fn close(writer: &mut XmlWriter, name: &str) -> Result<()> {
    write(writer, Event::End(BytesEnd::new(name)))
}

/// Names go out as character data unless they contain the CDATA terminator.
fn write_name(writer: &mut XmlWriter, name: &str) -> Result<()> {
    write(writer, Event::Start(BytesStart::new("name")))?;
    if name.contains("]]>") {
        write(writer, Event::Text(BytesText::new(name)))?;
    } else {
        write(writer, Event::CData(BytesCData::new(name)))?;
    }
    write(writer, Event::End(BytesEnd::new("name")))
}

fn write_scalar(writer: &mut XmlWriter, name: &str, value: impl ToString) -> Result<()> {
    let value = value.to_string();
    write(writer, Event::Start(BytesStart::new(name)))?;
    write(writer, Event::Text(BytesText::new(&value)))?;
    write(writer, Event::End(BytesEnd::new(name)))
}

fn write_declaration(writer: &mut XmlWriter) -> Result<()> {
    write(
        writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )
}

fn write(writer: &mut XmlWriter, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| Error::ParseError(e.to_string()))
}

fn finish(writer: XmlWriter) -> Result<String> {
    String::from_utf8(writer.into_inner()).map_err(|e| Error::ParseError(e.to_string()))
}
