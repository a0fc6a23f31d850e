use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use crate::country::SupportedCountries;
use crate::error::CovidashResult;
use crate::metrics::NegativeDeltaPolicy;

/// The four upstream datasets the dashboard is built from.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DatasetCategory {
    Population,
    Infections,
    Recoveries,
    Vaccinations,
}

/// Where a dataset comes from and who to credit for it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct DatasetSource {
    pub data_url: String,
    pub source_institution: String,
    pub source_url: String,
}

impl DatasetSource {
    fn new(data_url: &str, source_institution: &str, source_url: &str) -> Self {
        Self {
            data_url: data_url.into(),
            source_institution: source_institution.into(),
            source_url: source_url.into(),
        }
    }
}

/// Credit line for one dataset, shown in the about view.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SourceAttribution {
    pub category: DatasetCategory,
    pub institution: String,
    pub url: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub backoff_millis: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            timeout_secs: 30,
            max_attempts: 3,
            backoff_millis: 500,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub population: DatasetSource,
    pub infections: DatasetSource,
    pub recoveries: DatasetSource,
    pub vaccinations: DatasetSource,
    /// Supported countries in canonical form. Ignored when `countries_file` is set.
    pub countries: Vec<String>,
    /// JSON document of the form `{"countries": [...]}`
    pub countries_file: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub population_year: i64,
    pub population_variant: String,
    pub geometry_path: Option<PathBuf>,
    pub fetch: FetchConfig,
    pub negative_deltas: NegativeDeltaPolicy,
}

const JHU_TIME_SERIES: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series";

impl Default for Config {
    fn default() -> Self {
        Config {
            population: DatasetSource::new(
                "https://population.un.org/wpp/Download/Files/1_Indicators%20(Standard)/CSV_FILES/WPP2019_TotalPopulationBySex.csv",
                "United Nations, Department of Economic and Social Affairs, Population Division",
                "https://population.un.org/wpp/",
            ),
            infections: DatasetSource::new(
                &format!("{JHU_TIME_SERIES}/time_series_covid19_confirmed_global.csv"),
                "Johns Hopkins University CSSE",
                "https://github.com/CSSEGISandData/COVID-19",
            ),
            recoveries: DatasetSource::new(
                &format!("{JHU_TIME_SERIES}/time_series_covid19_recovered_global.csv"),
                "Johns Hopkins University CSSE",
                "https://github.com/CSSEGISandData/COVID-19",
            ),
            vaccinations: DatasetSource::new(
                "https://raw.githubusercontent.com/govex/COVID-19/master/data_tables/vaccine_data/global_data/time_series_covid19_vaccine_global.csv",
                "Johns Hopkins University Centers for Civic Impact",
                "https://github.com/govex/COVID-19",
            ),
            countries: DEFAULT_COUNTRIES.iter().map(|c| c.to_string()).collect(),
            countries_file: None,
            cache_dir: None,
            population_year: 2020,
            population_variant: "Medium".into(),
            geometry_path: None,
            fetch: FetchConfig::default(),
            negative_deltas: NegativeDeltaPolicy::default(),
        }
    }
}

const DEFAULT_COUNTRIES: &[&str] = &[
    "Albania",
    "Austria",
    "Belarus",
    "Belgium",
    "Bosnia and Herzegovina",
    "Bulgaria",
    "Croatia",
    "Cyprus",
    "Czech Republic",
    "Denmark",
    "Estonia",
    "Finland",
    "France",
    "Germany",
    "Greece",
    "Hungary",
    "Iceland",
    "Ireland",
    "Italy",
    "Latvia",
    "Lithuania",
    "Luxembourg",
    "Malta",
    "Montenegro",
    "Netherlands",
    "North Macedonia",
    "Norway",
    "Poland",
    "Portugal",
    "Republic of Moldova",
    "Romania",
    "Russian Federation",
    "Serbia",
    "Slovakia",
    "Slovenia",
    "Spain",
    "Sweden",
    "Switzerland",
    "Ukraine",
    "United Kingdom",
];

impl Config {
    pub fn from_toml_str(contents: &str) -> CovidashResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> CovidashResult<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    pub fn source(&self, category: DatasetCategory) -> &DatasetSource {
        match category {
            DatasetCategory::Population => &self.population,
            DatasetCategory::Infections => &self.infections,
            DatasetCategory::Recoveries => &self.recoveries,
            DatasetCategory::Vaccinations => &self.vaccinations,
        }
    }

    pub fn sources(&self) -> Vec<SourceAttribution> {
        DatasetCategory::iter()
            .map(|category| {
                let source = self.source(category);
                SourceAttribution {
                    category,
                    institution: source.source_institution.clone(),
                    url: source.source_url.clone(),
                }
            })
            .collect()
    }

    /// Resolve the supported-country allow-list, reading `countries_file` if one is configured.
    pub fn supported_countries(&self) -> CovidashResult<SupportedCountries> {
        match &self.countries_file {
            Some(path) => SupportedCountries::from_json_path(path),
            None => Ok(SupportedCountries::new(self.countries.iter().cloned())),
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("covidash")
        })
    }

    /// File the population table for the configured year and variant is cached in.
    pub fn population_cache_path(&self) -> PathBuf {
        self.cache_dir().join(format!(
            "population_{}_{}.csv",
            self.population_year,
            self.population_variant.to_lowercase()
        ))
    }
}
