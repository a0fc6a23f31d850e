//! Country outlines the overview map is drawn on.

use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, Context};
use geojson::{Feature, FeatureCollection, GeoJson};
use log::{debug, warn};
use serde_json::Value;

use crate::country::SupportedCountries;
use crate::error::CovidashResult;
use crate::selection::{Choropleth, MapMode};

/// Feature property matched against canonical country names.
pub const NAME_PROPERTY: &str = "name_long";
pub const VALUE_PROPERTY: &str = "value";
pub const HOVER_PROPERTY: &str = "hover";

#[derive(Debug, Clone)]
pub struct GeographyReference {
    features: FeatureCollection,
}

fn feature_name(feature: &Feature) -> Option<&str> {
    feature.property(NAME_PROPERTY).and_then(Value::as_str)
}

impl GeographyReference {
    pub fn from_geojson_str(raw: &str) -> CovidashResult<Self> {
        let features = match GeoJson::from_str(raw).context("Invalid geography reference")? {
            GeoJson::FeatureCollection(features) => features,
            _ => return Err(anyhow!("Geography reference is not a FeatureCollection").into()),
        };
        debug!("Loaded {} geography features", features.features.len());
        Ok(Self { features })
    }

    pub fn from_path(path: &Path) -> CovidashResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_geojson_str(&raw)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.features.features.iter().filter_map(feature_name)
    }

    pub fn len(&self) -> usize {
        self.features.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.features.is_empty()
    }

    /// Supported countries with no feature to draw them with.
    pub fn missing<'a>(&self, supported: &'a SupportedCountries) -> Vec<&'a str> {
        let missing: Vec<&str> = supported
            .iter()
            .filter(|country| !self.names().any(|name| name == *country))
            .collect();
        if !missing.is_empty() {
            warn!("No geography for {} supported countries: {missing:?}", missing.len());
        }
        missing
    }

    /// Features of the countries on the map with their value and rendered hover text attached.
    /// Countries without a value keep the feature with null properties so they are still drawn.
    pub fn choropleth_features(&self, choropleth: &Choropleth, mode: MapMode) -> FeatureCollection {
        let features = self
            .features
            .features
            .iter()
            .filter_map(|feature| {
                let name = feature_name(feature)?;
                choropleth.locations.iter().position(|l| l == name)?;
                let value = choropleth.value(name);
                let mut feature = feature.clone();
                feature.set_property(VALUE_PROPERTY, value);
                feature.set_property(HOVER_PROPERTY, value.map(|v| mode.render_hover(v)));
                Some(feature)
            })
            .collect();
        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }
}
