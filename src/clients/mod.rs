/// Client configuration
pub mod config;
/// Data entities for tracks, artists and albums
pub mod entities;
/// Error types and result aliases
pub mod errors;
/// File cache for service responses
pub mod local_storage;
/// Embeddable play buttons
pub mod playbutton;
/// Metadata web service client
pub mod spotify;
/// HTTP transport
pub mod transport;
/// XML decoding and encoding
pub mod xml;

pub use config::ClientConfig;
pub use entities::{Album, Artist, EntityKind, Item, OneOrMany, SpotifyItem, Track};
pub use local_storage::LocalStorage;
pub use playbutton::{PlayButton, PlayButtonSettings};
pub use spotify::{MetadataClient, MetadataClientBuilder};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
