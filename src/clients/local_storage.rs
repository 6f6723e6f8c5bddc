use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use log::{debug, info, warn};

use crate::clients::errors::{Error, Result};
use crate::clients::transport::{HttpRequest, Transport};

/// Prefix of every cache file name.
pub const CACHE_PREFIX: &str = "METATUNE_CACHE_";

const MARKER_OPEN: &[u8] = b"\n<!-- last-modified: ";
const MARKER_CLOSE: &[u8] = b" -->";

/// Cache file name for a request URL: prefix, MD5 of the full URL, `.xml`.
pub fn cache_key(url: &str) -> String {
    format!("{CACHE_PREFIX}{:x}.xml", md5::compute(url.as_bytes()))
}

/// A cached response body and the origin's `Last-Modified` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub body: Vec<u8>,
    pub last_modified: Option<String>,
}

impl CacheEntry {
    /// Body followed by the trailing marker comment. The marker is always
    /// written, an empty value meaning the origin sent no `Last-Modified`.
    fn to_bytes(&self) -> Vec<u8> {
        let marker = self.last_modified.as_deref().unwrap_or_default();
        let mut bytes =
            Vec::with_capacity(self.body.len() + MARKER_OPEN.len() + marker.len() + 4);
        bytes.extend_from_slice(&self.body);
        bytes.extend_from_slice(MARKER_OPEN);
        bytes.extend_from_slice(marker.as_bytes());
        bytes.extend_from_slice(MARKER_CLOSE);
        bytes
    }

    /// `None` when the trailing marker is missing or damaged.
    fn from_bytes(mut bytes: Vec<u8>) -> Option<Self> {
        let start = bytes
            .windows(MARKER_OPEN.len())
            .rposition(|window| window == MARKER_OPEN)?;
        let value = bytes[start + MARKER_OPEN.len()..].strip_suffix(MARKER_CLOSE)?;
        let value = std::str::from_utf8(value).ok()?.to_string();
        bytes.truncate(start);
        Some(CacheEntry {
            body: bytes,
            last_modified: (!value.is_empty()).then_some(value),
        })
    }
}

/// File-per-entry response cache. A storage without a directory is disabled:
/// reads always miss and writes are dropped.
pub struct LocalStorage {
    cache_dir: Option<PathBuf>,
}

impl LocalStorage {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Result<Self> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir)?;
        debug!("Using response cache in {cache_dir:?}");
        Ok(LocalStorage {
            cache_dir: Some(cache_dir),
        })
    }

    pub fn disabled() -> Self {
        LocalStorage { cache_dir: None }
    }

    pub fn cache_dir(&self) -> Option<&Path> {
        self.cache_dir.as_deref()
    }

    fn path(&self, key: &str) -> Option<PathBuf> {
        self.cache_dir.as_ref().map(|dir| dir.join(key))
    }

    /// Reads an entry and its age. Unreadable or damaged files count as a miss.
    pub fn read(&self, key: &str) -> Option<(CacheEntry, Duration)> {
        let path = self.path(key)?;
        let age = match fs::metadata(&path).and_then(|meta| meta.modified()) {
            Ok(modified) => SystemTime::now()
                .duration_since(modified)
                .unwrap_or(Duration::ZERO),
            Err(_) => return None,
        };
        match fs::read(&path) {
            Ok(bytes) => {
                let entry = CacheEntry::from_bytes(bytes);
                if entry.is_none() {
                    debug!("Ignoring damaged cache file {path:?}");
                }
                entry.map(|entry| (entry, age))
            }
            Err(e) => {
                debug!("Failed to read cache file {path:?}: {e}");
                None
            }
        }
    }

    /// Writes through a temporary file so readers never see half an entry.
    pub fn write(&self, key: &str, entry: &CacheEntry) {
        let Some(path) = self.path(key) else {
            return;
        };
        let tmp_path = path.with_extension("xml.tmp");
        let result =
            fs::write(&tmp_path, entry.to_bytes()).and_then(|()| fs::rename(&tmp_path, &path));
        match result {
            Ok(()) => debug!("Stored response in cache file {path:?}"),
            Err(e) => {
                warn!("Failed to store cache file {path:?}: {e}");
                let _ = fs::remove_file(&tmp_path);
            }
        }
    }

    pub fn remove(&self, key: &str) {
        if let Some(path) = self.path(key) {
            if let Err(e) = fs::remove_file(&path) {
                debug!("Failed to remove cache file {path:?}: {e}");
            }
        }
    }
}

/// `<user cache dir>/metatune`, or `/tmp/metatune`.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp")) // Fallback to /tmp if cache directory can't be determined
        .join("metatune")
}

/// Fetches response bodies through a [`LocalStorage`] cache.
///
/// Fresh entries are served without touching the network. Stale entries are
/// dropped and revalidated with `If-Modified-Since`; a `304` answer restores
/// the previous body.
pub struct CachedFetcher {
    transport: Box<dyn Transport>,
    storage: LocalStorage,
}

impl CachedFetcher {
    pub fn new(transport: Box<dyn Transport>, storage: LocalStorage) -> Self {
        CachedFetcher { transport, storage }
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    pub fn fetch(&self, url: &str, cache_key: &str, ttl: Duration) -> Result<Vec<u8>> {
        let previous = match self.storage.read(cache_key) {
            Some((entry, age)) if age < ttl => {
                debug!("Cache hit for {url} (age {}s)", age.as_secs());
                return Ok(entry.body);
            }
            Some((entry, age)) => {
                debug!("Cache entry for {url} is stale (age {}s)", age.as_secs());
                self.storage.remove(cache_key);
                Some(entry)
            }
            None => None,
        };

        let mut request = HttpRequest::get(url).header("Accept", "application/xml");
        if let Some(last_modified) = previous.as_ref().and_then(|e| e.last_modified.as_deref()) {
            request = request.header("If-Modified-Since", last_modified);
        }

        let response = self.transport.execute(request)?;

        if response.is_not_modified() {
            if let Some(entry) = previous {
                info!("{url} not modified, reusing cached response");
                self.storage.write(cache_key, &entry);
                return Ok(entry.body);
            }
        }
        if !response.is_success() {
            warn!("{url} answered with status {}", response.status);
            return Err(Error::service(response.status));
        }

        let last_modified = response.header("last-modified").map(str::to_string);
        let entry = CacheEntry {
            body: response.body,
            last_modified,
        };
        self.storage.write(cache_key, &entry);
        Ok(entry.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::transport::HttpResponse;
    use mockall::mock;

    mock! {
        Transport {}

        impl Transport for Transport {
            fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
        }
    }

    const URL: &str = "http://ws.spotify.com/lookup/1/?uri=spotify:track:abc";
    const HOUR: Duration = Duration::from_secs(60 * 60);

    fn stored_entry(body: &str, last_modified: Option<&str>) -> CacheEntry {
        CacheEntry {
            body: body.as_bytes().to_vec(),
            last_modified: last_modified.map(str::to_string),
        }
    }

    #[test]
    fn cache_key_hashes_the_full_url() {
        let a = cache_key("http://ws.spotify.com/search/1/track?q=x");
        let b = cache_key("http://ws.spotify.com/search/1/track?q=x&page=2");
        assert_ne!(a, b);
        assert_eq!(a, cache_key("http://ws.spotify.com/search/1/track?q=x"));
        assert!(a.starts_with(CACHE_PREFIX));
        assert!(a.ends_with(".xml"));
    }

    #[test]
    fn entry_marker_round_trips() {
        let entry = stored_entry("<track/>", Some("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(CacheEntry::from_bytes(entry.to_bytes()), Some(entry));

        let bare = stored_entry("<track/>", None);
        assert_eq!(CacheEntry::from_bytes(bare.to_bytes()), Some(bare));

        assert_eq!(CacheEntry::from_bytes(b"<track/>".to_vec()), None);
    }

    #[test]
    fn second_fetch_within_ttl_is_served_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .withf(|req| {
                req.url == URL
                    && req.headers.get("Accept").map(String::as_str) == Some("application/xml")
                    && !req.headers.contains_key("If-Modified-Since")
            })
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, "<track/>")));

        let fetcher =
            CachedFetcher::new(Box::new(transport), LocalStorage::new(dir.path()).unwrap());
        let key = cache_key(URL);
        assert_eq!(fetcher.fetch(URL, &key, HOUR).unwrap(), b"<track/>");
        assert_eq!(fetcher.fetch(URL, &key, HOUR).unwrap(), b"<track/>");
        assert!(dir.path().join(&key).exists());
    }

    #[test]
    fn stale_entry_is_revalidated_and_reused_when_not_modified() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();
        let key = cache_key(URL);
        storage.write(
            &key,
            &stored_entry("<track>old</track>", Some("Wed, 21 Oct 2015 07:28:00 GMT")),
        );

        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .withf(|req| {
                req.headers.get("If-Modified-Since").map(String::as_str)
                    == Some("Wed, 21 Oct 2015 07:28:00 GMT")
            })
            .times(1)
            .returning(|_| Ok(HttpResponse::new(304, "")));

        let fetcher = CachedFetcher::new(Box::new(transport), storage);
        let body = fetcher.fetch(URL, &key, Duration::ZERO).unwrap();
        assert_eq!(body, b"<track>old</track>");

        let (entry, _) = fetcher.storage().read(&key).unwrap();
        assert_eq!(entry.body, b"<track>old</track>");
        assert_eq!(
            entry.last_modified.as_deref(),
            Some("Wed, 21 Oct 2015 07:28:00 GMT")
        );
    }

    #[test]
    fn stale_entry_is_replaced_by_a_new_body() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();
        let key = cache_key(URL);
        storage.write(&key, &stored_entry("<track>old</track>", None));

        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .withf(|req| !req.headers.contains_key("If-Modified-Since"))
            .times(1)
            .returning(|_| {
                Ok(HttpResponse::new(200, "<track>new</track>")
                    .with_header("Last-Modified", "Thu, 22 Oct 2015 07:28:00 GMT"))
            });

        let fetcher = CachedFetcher::new(Box::new(transport), storage);
        let body = fetcher.fetch(URL, &key, Duration::ZERO).unwrap();
        assert_eq!(body, b"<track>new</track>");

        let (entry, _) = fetcher.storage().read(&key).unwrap();
        assert_eq!(entry.body, b"<track>new</track>");
        assert_eq!(
            entry.last_modified.as_deref(),
            Some("Thu, 22 Oct 2015 07:28:00 GMT")
        );
    }

    #[test]
    fn error_status_becomes_service_error_and_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(503, "busy")));

        let fetcher =
            CachedFetcher::new(Box::new(transport), LocalStorage::new(dir.path()).unwrap());
        let key = cache_key(URL);
        let err = fetcher.fetch(URL, &key, HOUR).unwrap_err();
        assert!(matches!(err, Error::ServiceError { status: 503, .. }));
        assert!(!dir.path().join(&key).exists());
    }

    #[test]
    fn transport_errors_surface_unchanged() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .times(1)
            .returning(|_| Err(Error::TransportError("connection refused".into())));

        let fetcher = CachedFetcher::new(Box::new(transport), LocalStorage::disabled());
        let err = fetcher.fetch(URL, &cache_key(URL), HOUR).unwrap_err();
        assert!(matches!(err, Error::TransportError(msg) if msg == "connection refused"));
    }

    #[test]
    fn disabled_cache_always_goes_to_the_network() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .times(2)
            .returning(|_| Ok(HttpResponse::new(200, "<track/>")));

        let fetcher = CachedFetcher::new(Box::new(transport), LocalStorage::disabled());
        let key = cache_key(URL);
        fetcher.fetch(URL, &key, HOUR).unwrap();
        fetcher.fetch(URL, &key, HOUR).unwrap();
        assert!(fetcher.storage().read(&key).is_none());
    }

    #[test]
    fn damaged_cache_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let key = cache_key(URL);
        fs::write(dir.path().join(&key), "<track>half").unwrap();

        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, "<track>full</track>")));

        let fetcher =
            CachedFetcher::new(Box::new(transport), LocalStorage::new(dir.path()).unwrap());
        assert_eq!(
            fetcher.fetch(URL, &key, HOUR).unwrap(),
            b"<track>full</track>"
        );
    }
}
