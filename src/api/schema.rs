//! Wire formats of the dashboard backend and the types handed to callers.
//!
//! `Raw*` structs mirror the JSON exactly and exist only long enough to be
//! validated by serde; the public types are what the rest of the app uses.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::FetchError;

// ============================================================================
// Geography data
// ============================================================================

/// One row of `/{kind}` (counties, tracts, ...).
#[derive(Debug, Deserialize)]
pub(crate) struct RawRow {
    pub objectid: i64,
    pub ogc_fid: i64,
    /// GeoJSON geometry serialized as a string.
    pub wkb_geometry: String,
    #[serde(default)]
    pub full: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fips: Option<String>,
    #[serde(default)]
    pub us_fips: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawRow {
    /// Value of any field by its wire name.
    fn field(&self, name: &str) -> Option<Value> {
        let text = |v: &Option<String>| v.clone().map(Value::String);
        match name {
            "objectid" => Some(self.objectid.into()),
            "ogc_fid" => Some(self.ogc_fid.into()),
            "full" => text(&self.full),
            "name" => text(&self.name),
            "fips" => text(&self.fips),
            "us_fips" => text(&self.us_fips),
            other => self.extra.get(other).cloned(),
        }
    }

    pub fn into_feature(self, id_field: &str) -> Result<Feature<DataProps>, FetchError> {
        let geometry: Value = serde_json::from_str(&self.wkb_geometry)?;
        let id = self.field(id_field).filter(|v| !v.is_null());
        let name = [&self.full, &self.name]
            .into_iter()
            .flatten()
            .find(|s| !s.is_empty())
            .cloned()
            .unwrap_or_default();

        Ok(Feature {
            geometry,
            properties: DataProps {
                id,
                name,
                full: self.full,
                fips: self.fips,
                us_fips: self.us_fips,
                objectid: self.objectid,
                ogc_fid: self.ogc_fid,
                extra: self.extra,
            },
        })
    }
}

/// GeoJSON feature collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub struct FeatureCollection<P> {
    pub features: Vec<Feature<P>>,
}

/// GeoJSON feature. The geometry is passed through uninterpreted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub struct Feature<P> {
    pub geometry: Value,
    pub properties: P,
}

/// Properties of a geography feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataProps {
    /// Value of the id field the caller asked for; `None` when missing.
    pub id: Option<Value>,
    /// `full`, else `name`, else empty.
    pub name: String,
    pub full: Option<String>,
    pub fips: Option<String>,
    pub us_fips: Option<String>,
    pub objectid: i64,
    pub ogc_fid: i64,
    /// Any other columns of the row.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// Facets
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct RawLevel {
    pub label: String,
    pub categories: BTreeMap<String, RawCategory>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCategory {
    pub label: String,
    pub measures: BTreeMap<String, RawMeasure>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawMeasure {
    pub label: String,
}

/// Node of the level → category → measure tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Facet {
    pub id: String,
    pub label: String,
    /// Children keyed by id. Empty for measures.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub list: BTreeMap<String, Facet>,
}

impl Facet {
    fn node(id: String, label: String, list: BTreeMap<String, Facet>) -> Self {
        Self { id, label, list }
    }

    pub fn is_leaf(&self) -> bool {
        self.list.is_empty()
    }
}

/// Geographic levels keyed by id.
pub type Facets = BTreeMap<String, Facet>;

pub(crate) fn facets_from_raw(raw: BTreeMap<String, RawLevel>) -> Facets {
    raw.into_iter()
        .map(|(level_id, level)| {
            let categories = level
                .categories
                .into_iter()
                .map(|(category_id, category)| {
                    let measures = category
                        .measures
                        .into_iter()
                        .map(|(measure_id, measure)| {
                            let leaf = Facet::node(measure_id.clone(), measure.label, BTreeMap::new());
                            (measure_id, leaf)
                        })
                        .collect();
                    let node = Facet::node(category_id.clone(), category.label, measures);
                    (category_id, node)
                })
                .collect();
            let node = Facet::node(level_id.clone(), level.label, categories);
            (level_id, node)
        })
        .collect()
}

// ============================================================================
// Values
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct RawValues {
    pub values: BTreeMap<String, MeasureValue>,
}

/// Measure value of one feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasureValue {
    /// `None` when the backend has no value for this feature.
    #[serde(default)]
    pub value: Option<f64>,
    /// Average annual change, when reported.
    #[serde(default)]
    pub aac: Option<f64>,
}

/// Measure values plus summary statistics over the present values.
///
/// Statistics are `None` when no feature has a value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Values {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    /// Keyed by feature id.
    pub values: BTreeMap<String, MeasureValue>,
}

impl From<RawValues> for Values {
    fn from(raw: RawValues) -> Self {
        let mut present: Vec<f64> = raw
            .values
            .values()
            .filter_map(|v| v.value)
            .filter(|v| !v.is_nan())
            .collect();
        present.sort_by(f64::total_cmp);

        let min = present.first().copied();
        let max = present.last().copied();
        let mean = (!present.is_empty()).then(|| present.iter().sum::<f64>() / present.len() as f64);

        Self {
            min,
            max,
            mean,
            median: median(&present),
            values: raw.values,
        }
    }
}

/// Median of an ascending slice.
fn median(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    match n {
        0 => None,
        _ if n % 2 == 1 => Some(sorted[n / 2]),
        _ => Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0),
    }
}
