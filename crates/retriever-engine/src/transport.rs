//! Blocking URL retrieval.
//!
//! A [`Transport`] answers one question: what did the remote say for this
//! URL? Status interpretation (404 as "not found", other failures) is left to
//! the caller.

use tracing::debug;

use crate::error::TransportError;

/// A fully buffered response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl Response {
    /// Build a response from a status and body.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Response {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the remote reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// The body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Blocking retrieval of a single URL.
pub trait Transport: Send + Sync {
    /// Issue a GET request and buffer the whole response.
    fn get(&self, url: &str) -> Result<Response, TransportError>;
}

/// HTTP(S) transport backed by [`reqwest::blocking::Client`].
///
/// Redirects are followed by the client. No retry is attempted here.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Create a transport with a client identifying itself as the retriever.
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("retriever/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(TransportError::Client)?;
        Ok(HttpTransport { client })
    }

    /// Create a transport reusing an existing client.
    pub fn with_client(client: reqwest::blocking::Client) -> Self {
        HttpTransport { client }
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<Response, TransportError> {
        let request_error = |source| TransportError::Request {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().map_err(request_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(request_error)?.to_vec();
        debug!(url, status, bytes = body.len(), "GET");

        Ok(Response { status, body })
    }
}

/// Transport that refuses every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineTransport;

impl Transport for OfflineTransport {
    fn get(&self, url: &str) -> Result<Response, TransportError> {
        debug!(url, "offline, request refused");
        Err(TransportError::Offline {
            url: url.to_string(),
        })
    }
}
