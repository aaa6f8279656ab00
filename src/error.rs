//! Unified error type.

/// The error type returned by ply's fallible server operations.
///
/// Application-level errors (404, 422, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, and body-decoding failures have their
/// own types ([`JsonError`](crate::json::JsonError),
/// [`FormError`](crate::form::FormError), ...). This type surfaces
/// infrastructure failures: binding to a port or accepting a connection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
