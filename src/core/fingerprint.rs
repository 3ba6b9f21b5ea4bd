//! Canonical request identity for the request cache.

use std::fmt::{self, Write};

use crate::utils::url::canonical_url;

use super::transport::HttpRequest;

/// Deterministic identity of a request: method, canonical URL, headers.
///
/// Query pairs are ordered by key and headers by lowercased name, so
/// enumeration order never produces a false cache miss.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(request: &HttpRequest) -> Self {
        let mut key = format!("{} {}", request.method, canonical_url(&request.url));
        for (name, value) in &request.headers {
            let _ = write!(key, "\n{}: {}", name, value);
        }
        Self(key)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
