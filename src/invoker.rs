//! Transport abstraction used to reach a plugin process.
//!
//! An [`Invoker`] performs exactly one request/response exchange per call
//! and knows nothing about envelopes: it moves bytes to a route and bytes
//! back. Whether the plugin reported an application error is decided by the
//! caller after decoding.
use crate::env::Env;
use crate::routes::Route;
use async_trait::async_trait;
use hyper::body::Bytes;
use std::time::Duration;
use thiserror::Error;

mod http;

pub use http::HttpInvoker;

/// Infrastructure failures: the plugin could not be reached or did not
/// answer with something decodable.
///
/// These are distinct from application errors, which arrive as a populated
/// `Err` field inside a successfully decoded envelope.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The plugin address could not be understood
    #[error("invalid plugin address '{0}'")]
    Address(String),

    #[error("failed to connect to plugin at {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// HTTP level failure while exchanging the request
    #[error("plugin request failed: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Non-success HTTP status without a body to decode
    #[error("plugin responded with status {status} and an empty body")]
    Status { status: u16 },

    #[error("invalid tls configuration: {0}")]
    Tls(String),

    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode plugin response: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("plugin did not respond within {0:?}")]
    Timeout(Duration),

    #[error("request cancelled")]
    Cancelled,
}

impl TransportError {
    pub(crate) fn http<E>(e: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Http(Box::new(e))
    }
}

/// Performs one exchange with a plugin.
///
/// Implementations must be safe to call concurrently and are responsible
/// for honoring the cancellation signal carried by `env`.
#[async_trait]
pub trait Invoker: Send + Sync {
    /// Sends `body` to the plugin endpoint identified by `route` and returns
    /// the raw response body.
    async fn invoke(&self, env: &Env, route: Route, body: Vec<u8>)
    -> Result<Bytes, TransportError>;
}
