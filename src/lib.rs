//! Metatune - Search and lookup client for the Spotify metadata web service
//!
//! This library searches for and looks up tracks, artists and albums, decodes
//! the service's XML into typed entities and can encode them back. Responses
//! are cached on disk and revalidated once they expire.

/// Client modules for the metadata service, the response cache and play buttons
pub mod clients;
