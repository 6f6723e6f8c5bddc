use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::clients::errors::{Error, Result};
use crate::clients::local_storage::default_cache_dir;

pub const SERVICE_BASE_URL_SEARCH: &str = "http://ws.spotify.com/search/1/";
pub const SERVICE_BASE_URL_LOOKUP: &str = "http://ws.spotify.com/lookup/1/";

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings of a [`MetadataClient`](crate::clients::MetadataClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub use_cache: bool,
    pub cache_dir: PathBuf,
    /// How long a cached response is served without asking the service.
    pub cache_ttl: Duration,
    pub connect_timeout: Duration,
    pub search_base_url: String,
    pub lookup_base_url: String,
    /// Append every searched or looked-up track to the play-button list.
    pub auto_add_tracks: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            use_cache: true,
            cache_dir: default_cache_dir(),
            cache_ttl: DEFAULT_CACHE_TTL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            search_base_url: SERVICE_BASE_URL_SEARCH.to_string(),
            lookup_base_url: SERVICE_BASE_URL_LOOKUP.to_string(),
            auto_add_tracks: false,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `METATUNE_*` environment variables.
    ///
    /// - `METATUNE_CACHE_DIR`
    /// - `METATUNE_USE_CACHE` (`true`/`false`, `1`/`0`, `yes`/`no`)
    /// - `METATUNE_CACHE_TTL_HOURS`
    /// - `METATUNE_CONNECT_TIMEOUT_SECS`
    pub fn try_from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key))
    }

    /// Like [`ClientConfig::try_from_env`], reading variables through `lookup`.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> std::result::Result<String, env::VarError>,
    {
        let read = |key: &str| match lookup(key) {
            Ok(value) => Ok(Some(value)),
            Err(env::VarError::NotPresent) => Ok(None),
            Err(err) => Err(Error::from(err)),
        };

        let mut config = ClientConfig::default();
        if let Some(dir) = read("METATUNE_CACHE_DIR")? {
            config.cache_dir = PathBuf::from(dir);
        }
        if let Some(value) = read("METATUNE_USE_CACHE")? {
            config.use_cache = parse_flag("METATUNE_USE_CACHE", &value)?;
        }
        if let Some(value) = read("METATUNE_CACHE_TTL_HOURS")? {
            let hours: u64 = parse_number("METATUNE_CACHE_TTL_HOURS", &value)?;
            config.cache_ttl = Duration::from_secs(hours * 60 * 60);
        }
        if let Some(value) = read("METATUNE_CONNECT_TIMEOUT_SECS")? {
            let secs: u64 = parse_number("METATUNE_CONNECT_TIMEOUT_SECS", &value)?;
            config.connect_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::ConfigurationError(format!(
            "{key} must be a boolean, got {other:?}"
        ))),
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        Error::ConfigurationError(format!("{key} must be a whole number, got {value:?}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(
        pairs: &[(&str, &str)],
    ) -> impl Fn(&str) -> std::result::Result<String, env::VarError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned().ok_or(env::VarError::NotPresent)
    }

    #[test]
    fn defaults_match_the_service() {
        let config = ClientConfig::from_vars(vars(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert!(config.use_cache);
        assert_eq!(config.cache_ttl, Duration::from_secs(86_400));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.search_base_url, "http://ws.spotify.com/search/1/");
        assert_eq!(config.lookup_base_url, "http://ws.spotify.com/lookup/1/");
        assert!(config.cache_dir.ends_with("metatune"));
    }

    #[test]
    fn variables_override_defaults() {
        let config = ClientConfig::from_vars(vars(&[
            ("METATUNE_CACHE_DIR", "/var/cache/mt"),
            ("METATUNE_USE_CACHE", "no"),
            ("METATUNE_CACHE_TTL_HOURS", "2"),
            ("METATUNE_CONNECT_TIMEOUT_SECS", " 10 "),
        ]))
        .unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/var/cache/mt"));
        assert!(!config.use_cache);
        assert_eq!(config.cache_ttl, Duration::from_secs(7200));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn flags_accept_common_spellings() {
        assert!(parse_flag("X", "yes").unwrap());
        assert!(parse_flag("X", " TRUE ").unwrap());
        assert!(!parse_flag("X", "0").unwrap());
    }

    #[test]
    fn bad_values_are_configuration_errors() {
        let err = ClientConfig::from_vars(vars(&[("METATUNE_USE_CACHE", "maybe")])).unwrap_err();
        assert!(matches!(err, Error::ConfigurationError(msg) if msg.contains("METATUNE_USE_CACHE")));

        let err =
            ClientConfig::from_vars(vars(&[("METATUNE_CACHE_TTL_HOURS", "1.5")])).unwrap_err();
        assert!(matches!(err, Error::ConfigurationError(_)));
    }
}
