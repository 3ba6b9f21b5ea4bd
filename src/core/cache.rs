//! Session-scoped request cache with in-flight de-duplication.
//!
//! Each read-only request is identified by its [`Fingerprint`]. The first
//! caller for a fingerprint registers the pending network operation in the
//! map *before* anything is awaited, so every concurrent caller joins that
//! operation instead of issuing its own request.
//!
//! ```text
//! fetch A ─┐
//!          │      entries[fp] = InFlight(shared)       transport
//! fetch B ─┼──► ───────────────────────────────────► one request
//!          │                                              │
//! fetch C ─┘      ok  → entries[fp] = Ready(payload) ◄────┤
//!                 err → entries.remove(fp)           ◄────┘
//! ```
//!
//! Entries never expire: the backing data is treated as immutable for the
//! lifetime of the page, and a reload starts from an empty cache.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::{Rc, Weak};

use futures::FutureExt;
use futures::future::{self, LocalBoxFuture, Shared};
use serde::de::{DeserializeOwned, IgnoredAny};
use tracing::{debug, trace, warn};

use crate::config::DEFAULT_ACCEPT;
use crate::utils::url::build_url;

use super::error::FetchError;
use super::fingerprint::Fingerprint;
use super::transport::{HttpRequest, HttpResponse, HttpTransport};

/// Raw response body, shared between every caller that asked for it.
pub type Payload = Rc<[u8]>;

type SharedFetch = Shared<LocalBoxFuture<'static, Result<Payload, FetchError>>>;
type EntryMap = RefCell<HashMap<Fingerprint, Entry>>;

enum Entry {
    /// Network request started, not yet settled.
    InFlight(SharedFetch),
    /// Successful, validated payload.
    Ready(Payload),
}

/// Counters for monitoring cache effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Served from a resolved entry.
    pub hits: u64,
    /// Joined an in-flight request.
    pub joined: u64,
    /// Went to the network.
    pub network: u64,
}

/// De-duplicating, memoizing front for an [`HttpTransport`].
///
/// Construct one per application and share it; there is no global
/// instance.
pub struct RequestCache {
    transport: Rc<dyn HttpTransport>,
    headers: BTreeMap<String, String>,
    entries: Rc<EntryMap>,
    stats: Cell<CacheStats>,
}

impl RequestCache {
    /// Create an empty cache over `transport`, sending `Accept: application/json`.
    pub fn new(transport: Rc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            headers: BTreeMap::from([("accept".to_string(), DEFAULT_ACCEPT.to_string())]),
            entries: Rc::new(RefCell::new(HashMap::new())),
            stats: Cell::new(CacheStats::default()),
        }
    }

    /// Add a header to every request built by this cache.
    ///
    /// Headers are part of the fingerprint.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Build a GET request for `url` plus `params`, carrying the default headers.
    pub fn request<I, K, V>(&self, url: &str, params: I) -> Result<HttpRequest, FetchError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut request = HttpRequest::get(build_url(url, params)?);
        request.headers = self.headers.clone();
        Ok(request)
    }

    /// Fetch `url` with `params` and decode the JSON body as `T`.
    ///
    /// A cached payload is returned without revalidation. Errors are never
    /// cached: the next call for the same fingerprint goes to the network.
    pub async fn fetch_cached<T, I, K, V>(&self, url: &str, params: I) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let request = self.request(url, params)?;
        let payload = self.send(request).await?;
        decode(&payload)
    }

    /// Send `request`, consulting the cache first when it is read-only.
    ///
    /// The lookup and the in-flight registration happen synchronously,
    /// before the returned future is first polled. Requests that are not
    /// read-only bypass the cache entirely.
    pub fn send(&self, request: HttpRequest) -> LocalBoxFuture<'static, Result<Payload, FetchError>> {
        if !request.is_read_only() {
            debug!(method = %request.method, url = %request.url, "uncached request");
            return self.dispatch(request);
        }

        let fingerprint = Fingerprint::of(&request);
        let mut entries = self.entries.borrow_mut();

        match entries.get(&fingerprint) {
            Some(Entry::Ready(payload)) => {
                trace!(%fingerprint, "cache hit");
                self.bump(|s| s.hits += 1);
                return future::ready(Ok(payload.clone())).boxed_local();
            }
            Some(Entry::InFlight(shared)) => {
                trace!(%fingerprint, "joining in-flight request");
                self.bump(|s| s.joined += 1);
                return shared.clone().boxed_local();
            }
            None => {}
        }

        debug!(%fingerprint, in_flight = self.in_flight_count_locked(&entries), "cache miss");
        let shared = settle(Rc::downgrade(&self.entries), fingerprint.clone(), self.dispatch(request))
            .boxed_local()
            .shared();
        entries.insert(fingerprint, Entry::InFlight(shared.clone()));
        shared.boxed_local()
    }

    /// Number of resolved entries.
    pub fn len(&self) -> usize {
        self.entries
            .borrow()
            .values()
            .filter(|entry| matches!(entry, Entry::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of requests currently on the wire.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight_count_locked(&self.entries.borrow())
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.get()
    }

    fn in_flight_count_locked(&self, entries: &HashMap<Fingerprint, Entry>) -> usize {
        entries
            .values()
            .filter(|entry| matches!(entry, Entry::InFlight(_)))
            .count()
    }

    /// Start the network exchange and check the status code.
    fn dispatch(&self, request: HttpRequest) -> LocalBoxFuture<'static, Result<Payload, FetchError>> {
        self.bump(|s| s.network += 1);
        let response = self.transport.send(&request);
        let url = request.url.to_string();
        async move { accept(response.await?, &url) }.boxed_local()
    }

    fn bump(&self, f: impl FnOnce(&mut CacheStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }
}

/// Await a cacheable exchange, then promote or drop its entry.
///
/// Runs once per network request no matter how many callers joined it.
async fn settle(
    entries: Weak<EntryMap>,
    fingerprint: Fingerprint,
    exchange: LocalBoxFuture<'static, Result<Payload, FetchError>>,
) -> Result<Payload, FetchError> {
    let result = exchange.await.and_then(validate_json);

    if let Some(entries) = entries.upgrade() {
        let mut entries = entries.borrow_mut();
        match &result {
            Ok(payload) => {
                debug!(%fingerprint, bytes = payload.len(), "cached response");
                entries.insert(fingerprint, Entry::Ready(payload.clone()));
            }
            Err(err) => {
                warn!(
                    %fingerprint,
                    error = %err,
                    transient = err.is_transient(),
                    "request failed; entry dropped"
                );
                entries.remove(&fingerprint);
            }
        }
    }

    result
}

fn accept(response: HttpResponse, url: &str) -> Result<Payload, FetchError> {
    if !response.is_success() {
        return Err(FetchError::ResponseNotOk {
            status: response.status,
            url: url.to_string(),
        });
    }
    Ok(Payload::from(response.body))
}

/// Reject bodies that are not well-formed JSON before they are cached.
fn validate_json(payload: Payload) -> Result<Payload, FetchError> {
    serde_json::from_slice::<IgnoredAny>(&payload)?;
    Ok(payload)
}

/// Decode a cached payload into the caller's type.
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, FetchError> {
    Ok(serde_json::from_slice(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::oneshot;
    use http::Method;
    use serde_json::{Value, json};
    use std::collections::VecDeque;

    type Reply = Result<HttpResponse, FetchError>;

    /// Transport whose replies are released by the test.
    #[derive(Default)]
    struct GatedTransport {
        calls: RefCell<Vec<HttpRequest>>,
        gates: RefCell<VecDeque<oneshot::Sender<Reply>>>,
    }

    impl GatedTransport {
        fn calls(&self) -> usize {
            self.calls.borrow().len()
        }

        fn release(&self, reply: Reply) {
            let gate = self.gates.borrow_mut().pop_front().expect("no pending request");
            gate.send(reply).expect("request was dropped");
        }
    }

    impl HttpTransport for GatedTransport {
        fn send(&self, request: &HttpRequest) -> LocalBoxFuture<'static, Reply> {
            self.calls.borrow_mut().push(request.clone());
            let (tx, rx) = oneshot::channel();
            self.gates.borrow_mut().push_back(tx);
            Box::pin(async move {
                rx.await
                    .unwrap_or_else(|_| Err(FetchError::Network("gate dropped".into())))
            })
        }
    }

    fn setup() -> (Rc<GatedTransport>, RequestCache) {
        let transport = Rc::new(GatedTransport::default());
        let cache = RequestCache::new(transport.clone());
        (transport, cache)
    }

    fn ok(body: Value) -> Reply {
        Ok(HttpResponse::new(200, body.to_string()))
    }

    const URL: &str = "https://api.example.org/stats/measures";
    const NO_PARAMS: [(&str, &str); 0] = [];

    /// Fetch through the cache, releasing `reply` once the request is on the wire.
    async fn fetch_with<T: DeserializeOwned>(
        transport: &GatedTransport,
        cache: &RequestCache,
        params: &[(&str, &str)],
        reply: Reply,
    ) -> Result<T, FetchError> {
        let fetch = cache.fetch_cached::<T, _, _, _>(URL, params.iter().copied());
        let release = async {
            tokio::task::yield_now().await;
            transport.release(reply);
        };
        let (result, ()) = futures::join!(fetch, release);
        result
    }

    #[tokio::test]
    async fn test_concurrent_calls_share_one_request() {
        let (transport, cache) = setup();

        let a = cache.fetch_cached::<Value, _, _, _>(URL, [("level", "county")]);
        let b = cache.fetch_cached::<Value, _, _, _>(URL, [("level", "county")]);
        let release = async {
            tokio::task::yield_now().await;
            assert_eq!(transport.calls(), 1);
            assert_eq!(cache.in_flight_count(), 1);
            transport.release(ok(json!({"county": 1})));
        };

        let (a, b, ()) = futures::join!(a, b, release);

        assert_eq!(a.unwrap(), json!({"county": 1}));
        assert_eq!(b.unwrap(), json!({"county": 1}));
        assert_eq!(transport.calls(), 1);
        assert_eq!(cache.stats(), CacheStats { hits: 0, joined: 1, network: 1 });
    }

    #[tokio::test]
    async fn test_registration_happens_before_first_poll() {
        let (transport, cache) = setup();
        let request = cache.request(URL, NO_PARAMS).unwrap();

        let first = cache.send(request.clone());
        let second = cache.send(request);
        assert_eq!(transport.calls(), 1);

        transport.release(ok(json!([1, 2])));
        let (first, second) = futures::join!(first, second);
        assert_eq!(&*first.unwrap(), &*second.unwrap());
    }

    #[tokio::test]
    async fn test_resolved_entry_is_served_without_network() {
        let (transport, cache) = setup();

        let first: Value = fetch_with(&transport, &cache, &[], ok(json!({"a": 1}))).await.unwrap();
        assert_eq!(first, json!({"a": 1}));
        assert_eq!(cache.len(), 1);

        let second: Value = cache.fetch_cached(URL, NO_PARAMS).await.unwrap();
        assert_eq!(second, json!({"a": 1}));
        assert_eq!(transport.calls(), 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_param_order_hits_same_entry() {
        let (transport, cache) = setup();

        let _: Value = fetch_with(&transport, &cache, &[("a", "1"), ("b", "2")], ok(json!(true)))
            .await
            .unwrap();

        let second: Value = cache.fetch_cached(URL, [("b", "2"), ("a", "1")]).await.unwrap();
        assert_eq!(second, json!(true));
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_post_is_never_cached() {
        let (transport, cache) = setup();
        let url = url::Url::parse(URL).unwrap();

        let get = cache.send(HttpRequest::get(url.clone()));
        transport.release(ok(json!("get")));
        get.await.unwrap();

        let post = cache.send(HttpRequest::new(Method::POST, url.clone()));
        transport.release(ok(json!("post")));
        assert_eq!(&*post.await.unwrap(), br#""post""#);

        let post = cache.send(HttpRequest::new(Method::POST, url));
        transport.release(ok(json!("post")));
        post.await.unwrap();

        assert_eq!(transport.calls(), 3);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_not_ok_is_retryable() {
        let (transport, cache) = setup();

        let first = fetch_with::<Value>(&transport, &cache, &[], Ok(HttpResponse::new(503, "busy")));
        assert_eq!(
            first.await.unwrap_err(),
            FetchError::ResponseNotOk { status: 503, url: URL.to_string() }
        );
        assert!(cache.is_empty());
        assert_eq!(cache.in_flight_count(), 0);

        let second: Value = fetch_with(&transport, &cache, &[], ok(json!({"ok": true})))
            .await
            .unwrap();
        assert_eq!(second, json!({"ok": true}));
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_network_error_propagates_to_all_joiners() {
        let (transport, cache) = setup();
        let request = cache.request(URL, NO_PARAMS).unwrap();

        let a = cache.send(request.clone());
        let b = cache.send(request);
        transport.release(Err(FetchError::Network("offline".into())));

        let (a, b) = futures::join!(a, b);
        assert_eq!(a.unwrap_err(), FetchError::Network("offline".into()));
        assert_eq!(b.unwrap_err(), FetchError::Network("offline".into()));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error_and_not_cached() {
        let (transport, cache) = setup();

        let first = fetch_with::<Value>(&transport, &cache, &[], Ok(HttpResponse::new(200, "<html>oops")));
        assert!(matches!(first.await, Err(FetchError::Parse(_))));
        assert!(cache.is_empty());

        let second: Value = fetch_with(&transport, &cache, &[], ok(json!([]))).await.unwrap();
        assert_eq!(second, json!([]));
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_shape_mismatch_is_parse_error() {
        let (transport, cache) = setup();

        let first = fetch_with::<Vec<u32>>(&transport, &cache, &[], ok(json!({"not": "a list"})));
        assert!(matches!(first.await, Err(FetchError::Parse(_))));
    }

    #[tokio::test]
    async fn test_invalid_base_url() {
        let (transport, cache) = setup();
        let result = cache.fetch_cached::<Value, _, _, _>("no scheme", NO_PARAMS).await;
        assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn test_default_headers_are_sent() {
        let (_, cache) = setup();
        let cache = cache.with_header("X-Client", "dashboard");
        let request = cache.request(URL, NO_PARAMS).unwrap();
        assert_eq!(request.headers.get("accept").map(String::as_str), Some(DEFAULT_ACCEPT));
        assert_eq!(request.headers.get("x-client").map(String::as_str), Some("dashboard"));
    }
}
