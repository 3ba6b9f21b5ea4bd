//! The HTTP seam under the request cache.
//!
//! The cache only needs "method, URL, headers in; status and body out".
//! The browser implementation lives in [`crate::utils::FetchTransport`];
//! tests script their own.

use std::collections::BTreeMap;

use futures::future::LocalBoxFuture;
use http::Method;
use url::Url;

use super::error::FetchError;

/// An outbound request.
///
/// Header names are stored lowercased in a sorted map, so two requests
/// that set the same headers in a different order are identical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: BTreeMap<String, String>,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: BTreeMap::new(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Set a header, replacing any previous value for the same name.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Whether the request is read-only and therefore cacheable.
    #[inline]
    pub fn is_read_only(&self) -> bool {
        self.method == Method::GET
    }
}

/// Status and raw body of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Host HTTP primitive.
///
/// Implementations report only transport failures (`FetchError::Network`);
/// any status code is a successful exchange at this level.
pub trait HttpTransport {
    fn send(&self, request: &HttpRequest) -> LocalBoxFuture<'static, Result<HttpResponse, FetchError>>;
}
