//! Population estimates per country, cached on disk after the first download.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use log::{info, warn};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::{canonicalize_and_filter, group_and_sum, read_csv, require_columns};
use crate::config::{Config, DatasetCategory};
use crate::country::SupportedCountries;
use crate::error::CovidashResult;
use crate::fetch::SourceFetcher;
use crate::COL;

const CATEGORY: DatasetCategory = DatasetCategory::Population;

/// The source reports population in thousands.
const POPULATION_MULTIPLIER: f64 = 1000.0;

const RECORD_COLUMNS: [&str; 3] = [
    COL::POPULATION_MALE,
    COL::POPULATION_FEMALE,
    COL::POPULATION_TOTAL,
];

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopulationRecord {
    pub male: i64,
    pub female: i64,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PopulationTable(BTreeMap<String, PopulationRecord>);

impl PopulationTable {
    pub fn get(&self, country: &str) -> Option<&PopulationRecord> {
        self.0.get(country)
    }

    /// Total population as a divisor; `None` when unknown or zero.
    pub fn total(&self, country: &str) -> Option<f64> {
        self.get(country)
            .map(|record| record.total as f64)
            .filter(|total| *total > 0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PopulationRecord)> {
        self.0.iter().map(|(country, record)| (country.as_str(), record))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Frame in the cache file schema: Location, PopMale, PopFemale, PopTotal.
    pub fn to_frame(&self) -> PolarsResult<DataFrame> {
        let records: Vec<&PopulationRecord> = self.0.values().collect();
        DataFrame::new(vec![
            Series::new(
                COL::POPULATION_LOCATION,
                self.0.keys().cloned().collect::<Vec<_>>(),
            ),
            Series::new(
                COL::POPULATION_MALE,
                records.iter().map(|r| r.male).collect::<Vec<_>>(),
            ),
            Series::new(
                COL::POPULATION_FEMALE,
                records.iter().map(|r| r.female).collect::<Vec<_>>(),
            ),
            Series::new(
                COL::POPULATION_TOTAL,
                records.iter().map(|r| r.total).collect::<Vec<_>>(),
            ),
        ])
    }

    /// Read a frame with Location and the three population columns. `scale` is applied before
    /// rounding to whole people.
    fn from_frame(df: &DataFrame, scale: f64) -> CovidashResult<Self> {
        let names = df.column(COL::POPULATION_LOCATION)?.str()?;
        let columns = RECORD_COLUMNS
            .iter()
            .map(|c| df.column(c)?.cast(&DataType::Float64))
            .collect::<PolarsResult<Vec<Series>>>()?;
        let (male, female, total) = (columns[0].f64()?, columns[1].f64()?, columns[2].f64()?);

        let to_people = |value: Option<f64>| (value.unwrap_or(0.0) * scale).round() as i64;
        let mut records = BTreeMap::new();
        for (idx, name) in names.into_iter().enumerate() {
            if let Some(name) = name {
                records.insert(
                    name.to_string(),
                    PopulationRecord {
                        male: to_people(male.get(idx)),
                        female: to_people(female.get(idx)),
                        total: to_people(total.get(idx)),
                    },
                );
            }
        }
        Ok(Self(records))
    }

    fn retain_supported(mut self, supported: &SupportedCountries) -> Self {
        self.0.retain(|country, _| supported.contains(country));
        self
    }
}

/// Loads population figures for one reference year and projection variant. The cache file name
/// is derived from both so different configurations never read each other's cache.
pub struct PopulationLoader {
    year: i64,
    variant: String,
    cache_path: PathBuf,
}

impl PopulationLoader {
    pub fn new(year: i64, variant: impl Into<String>, cache_path: impl Into<PathBuf>) -> Self {
        Self {
            year,
            variant: variant.into(),
            cache_path: cache_path.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.population_year,
            config.population_variant.clone(),
            config.population_cache_path(),
        )
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    /// Read the cache if it exists, otherwise download, derive and write the cache.
    pub async fn load(
        &self,
        fetcher: &SourceFetcher,
        location: &str,
        supported: &SupportedCountries,
    ) -> CovidashResult<PopulationTable> {
        if self.cache_path.exists() {
            info!("Reading population from cache {}", self.cache_path.display());
            return self.read_cache(supported);
        }
        let bytes = fetcher.fetch_table(CATEGORY, location).await?;
        let table = self.parse(bytes, supported)?;
        if let Err(e) = self.write_cache(&table) {
            warn!(
                "Failed to write population cache {}: {e}",
                self.cache_path.display()
            );
        }
        Ok(table)
    }

    /// Derive the population table from the raw source.
    pub fn parse(
        &self,
        bytes: Vec<u8>,
        supported: &SupportedCountries,
    ) -> CovidashResult<PopulationTable> {
        let df = read_csv(CATEGORY, bytes)?;
        require_columns(
            CATEGORY,
            &df,
            &[
                COL::POPULATION_LOCATION,
                COL::POPULATION_TIME,
                COL::POPULATION_VARIANT,
                COL::POPULATION_MALE,
                COL::POPULATION_FEMALE,
                COL::POPULATION_TOTAL,
            ],
        )?;

        let df = df
            .lazy()
            .filter(
                col(COL::POPULATION_TIME)
                    .cast(DataType::Int64)
                    .eq(lit(self.year))
                    .and(col(COL::POPULATION_VARIANT).eq(lit(self.variant.as_str()))),
            )
            .collect()?;
        info!(
            "Population rows for {} ({}): {}",
            self.year,
            self.variant,
            df.height()
        );

        let df = canonicalize_and_filter(df, COL::POPULATION_LOCATION, supported)?;
        let values: Vec<String> = RECORD_COLUMNS.iter().map(|c| c.to_string()).collect();
        let df = group_and_sum(df, &[COL::POPULATION_LOCATION], &values)?;
        PopulationTable::from_frame(&df, POPULATION_MULTIPLIER)
    }

    fn read_cache(&self, supported: &SupportedCountries) -> CovidashResult<PopulationTable> {
        let df = read_csv(CATEGORY, std::fs::read(&self.cache_path)?)?;
        require_columns(
            CATEGORY,
            &df,
            &[COL::POPULATION_LOCATION, COL::POPULATION_MALE, COL::POPULATION_FEMALE, COL::POPULATION_TOTAL],
        )?;
        Ok(PopulationTable::from_frame(&df, 1.0)?.retain_supported(supported))
    }

    fn write_cache(&self, table: &PopulationTable) -> CovidashResult<()> {
        if let Some(parent) = self.cache_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = File::create(&self.cache_path)?;
        CsvWriter::new(&mut file).finish(&mut table.to_frame()?)?;
        info!("Wrote population cache {}", self.cache_path.display());
        Ok(())
    }
}
