use thiserror::Error;

use crate::clients::entities::EntityKind;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Metadata service error [{status}]: {reason}")]
    ServiceError { status: u16, reason: String },

    #[error("The XML document is not in a proper format for {kind}s: {detail}")]
    MalformedResponse { kind: EntityKind, detail: String },

    #[error("Nothing to encode, the given collection is empty")]
    EmptyInput,

    #[error("The given items are not recognized as one kind of metadata item: {0}")]
    UnsupportedType(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Failed to process XML data, error: {0}")]
    ParseError(String),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Builds a [`Error::ServiceError`] carrying the reason the service documents for `status`.
    pub fn service(status: u16) -> Self {
        Error::ServiceError {
            status,
            reason: service_reason(status).to_string(),
        }
    }

    pub(crate) fn malformed(kind: EntityKind, detail: impl Into<String>) -> Self {
        Error::MalformedResponse {
            kind,
            detail: detail.into(),
        }
    }

    /// HTTP status of a service failure, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::ServiceError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn service_reason(status: u16) -> &'static str {
    match status {
        400 => {
            "The request was not understood. Used for example when a required parameter was omitted."
        }
        403 => "The rate limiting has kicked in.",
        406 => "The requested format isn't available.",
        500 => "The server encountered an unexpected problem. Should not happen.",
        503 => "The API is temporarily unavailable.",
        _ => {
            "The requested resource was not found. Also used if a format is requested using the url and the format isn't available."
        }
    }
}

impl From<std::env::VarError> for Error {
    fn from(err: std::env::VarError) -> Self {
        Error::ConfigurationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_statuses_carry_their_reason() {
        let err = Error::service(403);
        assert_eq!(err.status(), Some(403));
        assert!(err.to_string().contains("rate limiting"));

        let err = Error::service(503);
        assert!(err.to_string().contains("temporarily unavailable"));
    }

    #[test]
    fn unknown_status_falls_back_to_not_found() {
        let err = Error::service(418);
        assert_eq!(err.status(), Some(418));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn non_service_errors_have_no_status() {
        assert_eq!(Error::EmptyInput.status(), None);
    }

    #[test]
    fn json_failures_have_their_own_variant() {
        let err = Error::from(serde_json::from_str::<u8>("not json").unwrap_err());
        assert!(matches!(err, Error::JsonError(_)));
        assert!(err.to_string().starts_with("JSON serialization error"));
        assert!(!err.to_string().contains("XML"));
    }
}
