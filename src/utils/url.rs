//! URL and query-string utilities.
//!
//! Builds request URLs from a base plus parameters, canonicalizes query
//! strings for request fingerprints, and edits single parameters the way a
//! history replace does.

use url::Url;
use url::form_urlencoded;

/// Parse `base` and append every `(key, value)` pair to its query string.
///
/// Repeated keys are kept, so multi-valued parameters round-trip.
pub fn build_url<I, K, V>(base: &str, params: I) -> Result<Url, url::ParseError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut url = Url::parse(base)?;
    let mut params = params.into_iter().peekable();
    if params.peek().is_some() {
        let mut query = url.query_pairs_mut();
        for (key, value) in params {
            query.append_pair(key.as_ref(), value.as_ref());
        }
    }
    Ok(url)
}

/// Query string with pairs ordered by key.
///
/// The sort is stable: values of a repeated key keep their relative order,
/// since some endpoints read multi-valued parameters positionally.
pub fn canonical_query(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

/// URL without its query and fragment, followed by [`canonical_query`].
pub fn canonical_url(url: &Url) -> String {
    let mut base = url.clone();
    base.set_query(None);
    base.set_fragment(None);

    let query = canonical_query(url);
    if query.is_empty() {
        base.to_string()
    } else {
        format!("{}?{}", base, query)
    }
}

/// All decoded values of `name`, in URL order.
pub fn param_values(url: &Url, name: &str) -> Vec<String> {
    url.query_pairs()
        .filter(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .collect()
}

/// Copy of `url` with `name` set to `value`, or removed when `value` is `None`.
///
/// An existing parameter keeps its position, collapsing repeated keys into
/// one; a new parameter is appended. Other pairs are untouched.
pub fn with_param(url: &Url, name: &str, value: Option<&str>) -> Url {
    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    let position = pairs.iter().position(|(key, _)| key == name);
    pairs.retain(|(key, _)| key != name);

    if let Some(value) = value {
        let index = position.unwrap_or(pairs.len());
        pairs.insert(index, (name.to_string(), value.to_string()));
    }

    let mut next = url.clone();
    if pairs.is_empty() {
        next.set_query(None);
    } else {
        next.query_pairs_mut().clear().extend_pairs(pairs);
    }
    next
}
