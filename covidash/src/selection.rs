//! Display selections offered to the presentation layer and the chart payloads they produce.

use std::fmt::Display;
use std::str::FromStr;

use itertools::Itertools;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use crate::error::{CovidashError, CovidashResult};
use crate::metrics::{daily_differences, rolling_mean, DerivedMetrics, NegativeDeltaPolicy};
use crate::COL;

/// Property of a geography feature holding the canonical country name.
pub const FEATURE_ID_KEY: &str = "properties.name_long";

pub const CHART_DATE_COLUMN: &str = "Date";

/// Parse a mode string, rejecting anything outside the enumeration as an unknown selection.
pub fn parse_mode<T>(raw: &str) -> CovidashResult<T>
where
    T: FromStr + IntoEnumIterator + Display,
{
    T::from_str(raw.trim()).map_err(|_| {
        CovidashError::UnknownSelection(format!(
            "'{raw}' is not one of: {}",
            T::iter().join(", ")
        ))
    })
}

/// What the overview map colours countries by.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MapMode {
    #[default]
    FullyVaccinated,
    PartiallyVaccinated,
    ThreeDayAvg,
    SevenDayAvg,
    FourteenDayAvg,
    ThreeDayIncidence,
    SevenDayIncidence,
    FourteenDayIncidence,
}

impl MapMode {
    pub fn title(&self) -> &'static str {
        match self {
            Self::FullyVaccinated => "Full Vaccinations",
            Self::PartiallyVaccinated => "Partial Vaccinations",
            Self::ThreeDayAvg => "Three day average of daily infections",
            Self::SevenDayAvg => "Seven day average of daily infections",
            Self::FourteenDayAvg => "Fourteen day average of daily infections",
            Self::ThreeDayIncidence => "Incidence over the last 3 days per 100 000",
            Self::SevenDayIncidence => "Incidence over the last 7 days per 100 000",
            Self::FourteenDayIncidence => "Incidence over the last 14 days per 100 000",
        }
    }

    /// Column of the derived metrics table the map is coloured by.
    pub fn column(&self) -> &'static str {
        match self {
            Self::FullyVaccinated => COL::FULL_VACCINATION_PERCENTAGE,
            Self::PartiallyVaccinated => COL::PARTIAL_VACCINATION_PERCENTAGE,
            Self::ThreeDayAvg => COL::THREE_DAY_AVG_INFECTIONS,
            Self::SevenDayAvg => COL::SEVEN_DAY_AVG_INFECTIONS,
            Self::FourteenDayAvg => COL::FOURTEEN_DAY_AVG_INFECTIONS,
            Self::ThreeDayIncidence => COL::THREE_DAY_INCIDENCE,
            Self::SevenDayIncidence => COL::SEVEN_DAY_INCIDENCE,
            Self::FourteenDayIncidence => COL::FOURTEEN_DAY_INCIDENCE,
        }
    }

    pub fn value(&self, metrics: &DerivedMetrics) -> Option<f64> {
        match self {
            Self::FullyVaccinated => metrics.full_vaccination_percentage,
            Self::PartiallyVaccinated => metrics.partial_vaccination_percentage,
            Self::ThreeDayAvg => metrics.three_day_avg_infections,
            Self::SevenDayAvg => metrics.seven_day_avg_infections,
            Self::FourteenDayAvg => metrics.fourteen_day_avg_infections,
            Self::ThreeDayIncidence => metrics.three_day_incidence,
            Self::SevenDayIncidence => metrics.seven_day_incidence,
            Self::FourteenDayIncidence => metrics.fourteen_day_incidence,
        }
    }

    /// Hover text for one country; `%{z}` stands for the value.
    pub fn hover_text(&self) -> &'static str {
        match self {
            Self::FullyVaccinated => "<b>%{z}%</b> of population fully vaccinated",
            Self::PartiallyVaccinated => "<b>%{z}%</b> of population partially vaccinated",
            Self::ThreeDayAvg => "On average <b>%{z}</b> new cases over the last <b>3 days</b>",
            Self::SevenDayAvg => "On average <b>%{z}</b> new cases over the last <b>7 days</b>",
            Self::FourteenDayAvg => "On average <b>%{z}</b> new cases over the last <b>14 days</b>",
            Self::ThreeDayIncidence => "<b>%{z}</b> new cases over the last <b>3 days</b>",
            Self::SevenDayIncidence => "<b>%{z}</b> new cases over the last <b>7 days</b>",
            Self::FourteenDayIncidence => "<b>%{z}</b> new cases over the last <b>14 days</b>",
        }
    }

    /// Full hover template including the country name, `%{location}`.
    pub fn hover_template(&self) -> String {
        format!("<b>%{{location}}</b><br><extra>{}</extra>", self.hover_text())
    }

    /// Hover text with the value substituted, for renderers without template support.
    pub fn render_hover(&self, value: f64) -> String {
        self.hover_text().replace("%{z}", &value.to_string())
    }
}

/// Which cumulative case series a case chart shows.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CaseDataset {
    Infections,
    Recoveries,
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
pub enum CaseMode {
    #[serde(rename = "total")]
    #[strum(serialize = "total")]
    Total,
    #[default]
    #[serde(rename = "daily")]
    #[strum(serialize = "daily")]
    Daily,
    #[serde(rename = "3_day_average")]
    #[strum(serialize = "3_day_average")]
    ThreeDayAverage,
    #[serde(rename = "7_day_average")]
    #[strum(serialize = "7_day_average")]
    SevenDayAverage,
    #[serde(rename = "14_day_average")]
    #[strum(serialize = "14_day_average")]
    FourteenDayAverage,
}

impl CaseMode {
    fn window(&self) -> Option<usize> {
        match self {
            Self::Total | Self::Daily => None,
            Self::ThreeDayAverage => Some(3),
            Self::SevenDayAverage => Some(7),
            Self::FourteenDayAverage => Some(14),
        }
    }

    pub fn title(&self, dataset: CaseDataset) -> String {
        match self.window() {
            None if *self == Self::Total => format!("Total number of {dataset}"),
            None => format!("Daily {dataset}"),
            Some(k) => format!("{k}-day average of daily {dataset}"),
        }
    }

    /// Transform one cumulative series into the values plotted for this mode.
    pub fn apply(&self, cumulative: &[f64], policy: NegativeDeltaPolicy) -> Vec<f64> {
        match (self, self.window()) {
            (Self::Total, _) => cumulative
                .iter()
                .map(|v| if v.is_nan() { 0.0 } else { *v })
                .collect(),
            (_, None) => daily_differences(cumulative, policy),
            (_, Some(k)) => rolling_mean(&daily_differences(cumulative, policy), k),
        }
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VaccinationMode {
    Partial,
    PartialPercentage,
    Full,
    #[default]
    FullPercentage,
}

impl VaccinationMode {
    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full | Self::FullPercentage)
    }

    pub fn is_percentage(&self) -> bool {
        matches!(self, Self::PartialPercentage | Self::FullPercentage)
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Partial => "Partial Vaccinations",
            Self::PartialPercentage => "Partial Vaccinations (% of population)",
            Self::Full => "Full Vaccinations",
            Self::FullPercentage => "Full Vaccinations (% of population)",
        }
    }

    pub fn y_axis(&self) -> Option<YAxis> {
        self.is_percentage().then(|| YAxis {
            title: "% of population".to_string(),
            range: Some((0.0, 100.0)),
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct YAxis {
    pub title: String,
    pub range: Option<(f64, f64)>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub name: String,
    pub y: Vec<f64>,
}

/// One line per selected country over a shared date axis.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Chart {
    pub title: String,
    /// `DD/MM/YY` labels in chronological order
    pub x: Vec<String>,
    pub series: Vec<ChartSeries>,
    pub y_axis: Option<YAxis>,
}

impl Chart {
    /// One `Date` column followed by one column per series.
    pub fn to_frame(&self) -> PolarsResult<DataFrame> {
        let mut columns = vec![Series::new(CHART_DATE_COLUMN, self.x.clone())];
        columns.extend(
            self.series
                .iter()
                .map(|series| Series::new(&series.name, series.y.clone())),
        );
        DataFrame::new(columns)
    }
}

/// Per-country values for the overview map, keyed on the geography's `name_long` property.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Choropleth {
    pub title: String,
    pub hover_template: String,
    pub feature_id_key: String,
    pub locations: Vec<String>,
    pub z: Vec<Option<f64>>,
}

impl Choropleth {
    pub fn value(&self, country: &str) -> Option<f64> {
        self.locations
            .iter()
            .position(|location| location == country)
            .and_then(|idx| self.z[idx])
    }

    /// One row per location, with the map values under `value_column`.
    pub fn to_frame(&self, value_column: &str) -> PolarsResult<DataFrame> {
        DataFrame::new(vec![
            Series::new(COL::COUNTRY, self.locations.clone()),
            Series::new(value_column, self.z.clone()),
        ])
    }
}
