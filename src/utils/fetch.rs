//! Browser HTTP transport built on the Fetch API.

use std::collections::BTreeMap;

use futures::future::LocalBoxFuture;
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Request, RequestInit, RequestMode, Response};

use crate::core::{FetchError, HttpRequest, HttpResponse, HttpTransport};

use super::dom;

/// [`HttpTransport`] backed by `window.fetch`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchTransport;

impl HttpTransport for FetchTransport {
    fn send(&self, request: &HttpRequest) -> LocalBoxFuture<'static, Result<HttpResponse, FetchError>> {
        let method = request.method.to_string();
        let url = request.url.to_string();
        let headers = request.headers.clone();

        Box::pin(async move { fetch_raw(&method, &url, &headers).await })
    }
}

/// Issue a CORS request and read the whole body as bytes.
async fn fetch_raw(
    method: &str,
    url: &str,
    headers: &BTreeMap<String, String>,
) -> Result<HttpResponse, FetchError> {
    let window = dom::window().ok_or_else(|| network("Browser window not available"))?;

    let opts = RequestInit::new();
    opts.set_method(method);
    opts.set_mode(RequestMode::Cors);

    let request = Request::new_with_str_and_init(url, &opts).map_err(js_network)?;
    for (name, value) in headers {
        request.headers().set(name, value).map_err(js_network)?;
    }

    let result = JsFuture::from(window.fetch_with_request(&request))
        .await
        .map_err(js_network)?;
    let resp: Response = result
        .dyn_into()
        .map_err(|_| network("fetch did not resolve to a Response"))?;

    let buffer = JsFuture::from(resp.array_buffer().map_err(js_network)?)
        .await
        .map_err(js_network)?;
    let body = js_sys::Uint8Array::new(&buffer).to_vec();

    Ok(HttpResponse::new(resp.status(), body))
}

fn network(msg: &str) -> FetchError {
    FetchError::Network(msg.to_string())
}

fn js_network(value: JsValue) -> FetchError {
    FetchError::Network(
        value
            .as_string()
            .unwrap_or_else(|| format!("{:?}", value)),
    )
}
