//! Embeddable play button sources.
//!
//! A play button plays either a single track, an ad hoc set of tracks
//! (`spotify:trackset:<title>:<id>,<id>,...`) or a user playlist. Settings are
//! checked when they are set, never at render time.

use std::fmt;
use std::str::FromStr;

use crate::clients::entities::{Album, SpotifyItem, Track};
use crate::clients::errors::{Error, Result};

pub const PLAYBUTTON_BASE_URL: &str = "https://embed.spotify.com/?uri=";

/// Title used for track sets without one.
pub const DEFAULT_TITLE: &str = "Playlist";

pub const WIDTH_RANGE: std::ops::RangeInclusive<u32> = 250..=640;
pub const HEIGHT_RANGE: std::ops::RangeInclusive<u32> = 80..=720;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Black,
    White,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Black => "black",
            Theme::White => "white",
        }
    }
}

impl FromStr for Theme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "black" => Ok(Theme::Black),
            "white" => Ok(Theme::White),
            other => Err(Error::ConfigurationError(format!(
                "play button theme must be black or white, got {other:?}"
            ))),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum View {
    #[default]
    List,
    CoverArt,
}

impl View {
    pub fn as_str(&self) -> &'static str {
        match self {
            View::List => "list",
            View::CoverArt => "coverart",
        }
    }
}

impl FromStr for View {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "list" => Ok(View::List),
            "coverart" => Ok(View::CoverArt),
            other => Err(Error::ConfigurationError(format!(
                "play button view must be list or coverart, got {other:?}"
            ))),
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Appearance of a play button. Width and height are always within
/// [`WIDTH_RANGE`] and [`HEIGHT_RANGE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayButtonSettings {
    theme: Theme,
    view: View,
    width: u32,
    height: u32,
}

impl Default for PlayButtonSettings {
    fn default() -> Self {
        PlayButtonSettings {
            theme: Theme::Black,
            view: View::List,
            width: 250,
            height: 330,
        }
    }
}

impl PlayButtonSettings {
    pub fn new(theme: Theme, view: View, width: u32, height: u32) -> Result<Self> {
        let mut settings = PlayButtonSettings {
            theme,
            view,
            ..PlayButtonSettings::default()
        };
        settings.set_size(width, height)?;
        Ok(settings)
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    pub fn set_view(&mut self, view: View) {
        self.view = view;
    }

    /// Rejects sizes outside the allowed ranges and leaves the settings untouched.
    pub fn set_size(&mut self, width: u32, height: u32) -> Result<()> {
        if !WIDTH_RANGE.contains(&width) {
            return Err(Error::ConfigurationError(format!(
                "play button width must be within {}..={}, got {width}",
                WIDTH_RANGE.start(),
                WIDTH_RANGE.end()
            )));
        }
        if !HEIGHT_RANGE.contains(&height) {
            return Err(Error::ConfigurationError(format!(
                "play button height must be within {}..={}, got {height}",
                HEIGHT_RANGE.start(),
                HEIGHT_RANGE.end()
            )));
        }
        self.width = width;
        self.height = height;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlayButton {
    pub settings: PlayButtonSettings,
}

impl PlayButton {
    pub fn new(settings: PlayButtonSettings) -> Self {
        PlayButton { settings }
    }

    pub fn source_from_track(track: &Track) -> String {
        track.uri.clone()
    }

    /// One track plays as itself; several become a titled track set.
    pub fn source_from_tracks(tracks: &[Track], title: &str) -> Result<String> {
        match tracks {
            [] => Err(Error::EmptyInput),
            [track] => Ok(Self::source_from_track(track)),
            tracks => {
                let title = if title.is_empty() { DEFAULT_TITLE } else { title };
                let ids = tracks
                    .iter()
                    .map(|track| track.id())
                    .collect::<Vec<_>>()
                    .join(",");
                Ok(format!("spotify:trackset:{title}:{ids}"))
            }
        }
    }

    /// The album's tracks, titled with the album name.
    pub fn source_from_album(album: &Album) -> Result<String> {
        Self::source_from_tracks(&album.tracks, &album.name)
    }

    pub fn source_from_playlist(uri: &str) -> String {
        if uri.starts_with("spotify:user:") {
            uri.to_string()
        } else {
            format!("spotify:user:{uri}")
        }
    }

    /// Embed URL for `source` with the current theme and view.
    pub fn embed_url(&self, source: &str) -> String {
        format!(
            "{PLAYBUTTON_BASE_URL}{source}&theme={}&view={}",
            self.settings.theme, self.settings.view
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::entities::{Artist, OneOrMany};

    fn track(id: &str) -> Track {
        Track {
            uri: format!("spotify:track:{id}"),
            title: id.to_string(),
            artist: OneOrMany::One(Artist::new("spotify:artist:a", "A", 0.0)),
            album: Album::new("spotify:album:b", "B", "2010", None),
            length: 0.0,
            popularity: 0.0,
            track_number: 1,
            disc_number: 0,
        }
    }

    #[test]
    fn settings_are_validated_eagerly() {
        assert!(PlayButtonSettings::new(Theme::White, View::CoverArt, 300, 380).is_ok());
        assert!(matches!(
            PlayButtonSettings::new(Theme::Black, View::List, 800, 380),
            Err(Error::ConfigurationError(_))
        ));

        let mut settings = PlayButtonSettings::default();
        assert!(settings.set_size(250, 20).is_err());
        assert_eq!((settings.width(), settings.height()), (250, 330));
    }

    #[test]
    fn theme_and_view_parse_known_values_only() {
        assert_eq!("white".parse::<Theme>().unwrap(), Theme::White);
        assert_eq!("coverart".parse::<View>().unwrap(), View::CoverArt);
        assert!("pink".parse::<Theme>().is_err());
        assert!("grid".parse::<View>().is_err());
    }

    #[test]
    fn track_sets() {
        assert!(matches!(
            PlayButton::source_from_tracks(&[], "x"),
            Err(Error::EmptyInput)
        ));
        assert_eq!(
            PlayButton::source_from_tracks(&[track("1")], "x").unwrap(),
            "spotify:track:1"
        );
        assert_eq!(
            PlayButton::source_from_tracks(&[track("1"), track("2")], "").unwrap(),
            "spotify:trackset:Playlist:1,2"
        );
    }

    #[test]
    fn album_and_playlist_sources() {
        let mut album = Album::new("spotify:album:b", "Moonshine", "2007", None);
        album.tracks = vec![track("1"), track("2")];
        assert_eq!(
            PlayButton::source_from_album(&album).unwrap(),
            "spotify:trackset:Moonshine:1,2"
        );
        assert_eq!(
            PlayButton::source_from_playlist("joe:playlist:42"),
            "spotify:user:joe:playlist:42"
        );
    }

    #[test]
    fn embed_url_carries_theme_and_view() {
        let button = PlayButton::new(
            PlayButtonSettings::new(Theme::White, View::CoverArt, 300, 380).unwrap(),
        );
        assert_eq!(
            button.embed_url("spotify:track:1"),
            "https://embed.spotify.com/?uri=spotify:track:1&theme=white&view=coverart"
        );
    }
}
