//! Cumulative case series (infections, recoveries) published with one column per date.

use log::{debug, info, warn};

use super::{canonicalize_and_filter, group_and_sum, read_csv, require_columns};
use crate::config::DatasetCategory;
use crate::country::SupportedCountries;
use crate::date::DateKey;
use crate::error::{CovidashError, CovidashResult};
use crate::fetch::SourceFetcher;
use crate::table::TimeSeriesTable;
use crate::COL;

const SOURCE_DATE_DELIMITER: char = '/';

/// Columns expected next to the dates and dropped without comment.
const GEOGRAPHIC_COLUMNS: &[&str] = &[COL::CASES_PROVINCE, COL::CASES_LATITUDE, COL::CASES_LONGITUDE];

/// Loads a wide cumulative case table. Infections and recoveries share the schema and differ
/// only in category.
pub struct CaseLoader {
    category: DatasetCategory,
}

impl CaseLoader {
    pub fn new(category: DatasetCategory) -> Self {
        Self { category }
    }

    pub async fn load(
        &self,
        fetcher: &SourceFetcher,
        location: &str,
        supported: &SupportedCountries,
    ) -> CovidashResult<TimeSeriesTable> {
        let bytes = fetcher.fetch_table(self.category, location).await?;
        self.parse(bytes, supported)
    }

    /// Parse the raw CSV into a canonical table.
    pub fn parse(
        &self,
        bytes: Vec<u8>,
        supported: &SupportedCountries,
    ) -> CovidashResult<TimeSeriesTable> {
        let df = read_csv(self.category, bytes)?;
        require_columns(self.category, &df, &[COL::CASES_COUNTRY])?;

        let mut date_columns: Vec<(String, DateKey)> = vec![];
        for name in df.get_column_names() {
            if name == COL::CASES_COUNTRY {
                continue;
            }
            match DateKey::from_mdy_token(name, SOURCE_DATE_DELIMITER) {
                Ok(date) => date_columns.push((name.to_string(), date)),
                Err(_) if GEOGRAPHIC_COLUMNS.contains(&name) => {
                    debug!("Dropping column '{name}' from {} data", self.category)
                }
                Err(_) => warn!("Dropping unexpected column '{name}' from {} data", self.category),
            }
        }
        if date_columns.is_empty() {
            return Err(CovidashError::source_format(
                self.category,
                "no date columns found",
            ));
        }

        let value_columns: Vec<String> = date_columns.iter().map(|(name, _)| name.clone()).collect();
        let df = canonicalize_and_filter(df, COL::CASES_COUNTRY, supported)?;
        let df = group_and_sum(df, &[COL::CASES_COUNTRY], &value_columns)?;
        info!(
            "Grouped {} data with shape: {:?}",
            self.category,
            df.shape()
        );
        TimeSeriesTable::from_wide_frame(&df, COL::CASES_COUNTRY, &date_columns)
    }
}
