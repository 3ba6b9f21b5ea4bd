//! Typed endpoints of the dashboard backend.
//!
//! Every read goes through the shared [`RequestCache`], so switching back
//! to a previously viewed level or measure costs no network round trip.

mod schema;

pub use schema::{DataProps, Facet, Facets, Feature, FeatureCollection, MeasureValue, Values};

use std::collections::BTreeMap;
use std::rc::Rc;

use url::form_urlencoded;

use crate::config::{API_ROOT, normalize_root};
use crate::core::{FetchError, RequestCache};

use schema::{RawLevel, RawRow, RawValues, facets_from_raw};

const NO_PARAMS: [(&str, &str); 0] = [];

/// Client for the dashboard API rooted at one base URL.
#[derive(Clone)]
pub struct DashboardApi {
    cache: Rc<RequestCache>,
    root: String,
}

impl DashboardApi {
    pub fn new(cache: Rc<RequestCache>, root: &str) -> Self {
        Self {
            cache,
            root: normalize_root(root),
        }
    }

    /// Client for the API root configured at build time.
    pub fn from_config(cache: Rc<RequestCache>) -> Self {
        Self::new(cache, API_ROOT)
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn cache(&self) -> &RequestCache {
        &self.cache
    }

    /// Geography of `kind` (e.g. `counties`) as GeoJSON, with each
    /// feature's `id` taken from the `id_field` column.
    pub async fn get_data(
        &self,
        kind: &str,
        id_field: &str,
    ) -> Result<FeatureCollection<DataProps>, FetchError> {
        let rows: Vec<RawRow> = self
            .cache
            .fetch_cached(&format!("{}/{}", self.root, kind), NO_PARAMS)
            .await?;

        let features = rows
            .into_iter()
            .map(|row| row.into_feature(id_field))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FeatureCollection { features })
    }

    /// Geographic levels, measure categories and measures.
    pub async fn get_facets(&self) -> Result<Facets, FetchError> {
        let raw: BTreeMap<String, RawLevel> = self
            .cache
            .fetch_cached(&format!("{}/stats/measures", self.root), NO_PARAMS)
            .await?;
        Ok(facets_from_raw(raw))
    }

    /// Per-feature values of one measure.
    pub async fn get_values(
        &self,
        level: &str,
        category: &str,
        measure: &str,
    ) -> Result<Values, FetchError> {
        let url = format!("{}/stats/{}/{}/fips-value", self.root, level, category);
        let raw: RawValues = self.cache.fetch_cached(&url, [("measure", measure)]).await?;
        Ok(Values::from(raw))
    }

    /// Link to the CSV export of one measure. Makes no request.
    pub fn data_download_url(&self, level: &str, category: &str, measure: &str) -> String {
        let measure: String = form_urlencoded::byte_serialize(measure.as_bytes()).collect();
        format!(
            "{}/stats/{}/{}/as-csv?measure={}",
            self.root, level, category, measure
        )
    }
}
