//! Loaders turning the raw upstream tables into canonical, country-filtered tables.
//!
//! Every loader follows the same steps: fetch, drop columns that are not needed, rewrite country
//! aliases, restrict to the supported countries, then group by country and sum.

use std::io::Cursor;

use log::info;
use polars::prelude::*;
use tokio::try_join;

use crate::config::{Config, DatasetCategory};
use crate::country::{canonicalize, SupportedCountries};
use crate::error::{CovidashError, CovidashResult};
use crate::fetch::SourceFetcher;
use crate::table::TimeSeriesTable;

pub mod cases;
pub mod population;
pub mod vaccinations;

pub use cases::CaseLoader;
pub use population::{PopulationLoader, PopulationRecord, PopulationTable};
pub use vaccinations::{VaccinationLoader, VaccinationTables};

/// Every table the dashboard is built from, loaded once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Datasets {
    pub population: PopulationTable,
    pub infections: TimeSeriesTable,
    pub recoveries: TimeSeriesTable,
    pub vaccinations: VaccinationTables,
}

/// Load all four datasets. Any failure is fatal: there is no partial fallback.
pub async fn load_all(
    config: &Config,
    supported: &SupportedCountries,
) -> CovidashResult<Datasets> {
    let fetcher = SourceFetcher::new(&config.fetch)?;
    let population_loader = PopulationLoader::from_config(config);
    let infections_loader = CaseLoader::new(DatasetCategory::Infections);
    let recoveries_loader = CaseLoader::new(DatasetCategory::Recoveries);

    let (population, infections, recoveries, vaccinations) = try_join!(
        population_loader.load(&fetcher, &config.population.data_url, supported),
        infections_loader.load(&fetcher, &config.infections.data_url, supported),
        recoveries_loader.load(&fetcher, &config.recoveries.data_url, supported),
        VaccinationLoader.load(&fetcher, &config.vaccinations.data_url, supported),
    )?;
    info!(
        "Loaded population for {} countries, infections for {}, recoveries for {}, vaccinations for {}",
        population.len(),
        infections.len(),
        recoveries.len(),
        vaccinations.full.len()
    );
    Ok(Datasets {
        population,
        infections,
        recoveries,
        vaccinations,
    })
}

/// Parse CSV bytes into a frame.
pub(crate) fn read_csv(category: DatasetCategory, bytes: Vec<u8>) -> CovidashResult<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(10_000))
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
        .map_err(|e| CovidashError::unavailable(category, format!("unparsable table: {e}")))?;
    if df.width() == 0 {
        return Err(CovidashError::unavailable(category, "table has no columns"));
    }
    Ok(df)
}

pub(crate) fn require_columns(
    category: DatasetCategory,
    df: &DataFrame,
    columns: &[&str],
) -> CovidashResult<()> {
    let present = df.get_column_names();
    let missing: Vec<&str> = columns
        .iter()
        .filter(|c| !present.contains(*c))
        .copied()
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(CovidashError::source_format(
            category,
            format!("missing column(s) {missing:?}"),
        ))
    }
}

/// Rewrite country aliases in `key` to their canonical names and keep only supported countries.
pub(crate) fn canonicalize_and_filter(
    mut df: DataFrame,
    key: &str,
    supported: &SupportedCountries,
) -> CovidashResult<DataFrame> {
    let canonical: Vec<Option<String>> = df
        .column(key)?
        .str()?
        .into_iter()
        .map(|name| name.map(|n| canonicalize(n.trim()).to_string()))
        .collect();
    df.with_column(Series::new(key, canonical))?;

    let supported = Series::new("supported", supported.as_slice());
    Ok(df
        .lazy()
        .filter(col(key).is_in(lit(supported)))
        .collect()?)
}

/// Group by the `keys` columns and sum `values`, which are cast to floats first.
pub(crate) fn group_and_sum(
    df: DataFrame,
    keys: &[&str],
    values: &[String],
) -> CovidashResult<DataFrame> {
    let key_exprs: Vec<Expr> = keys.iter().map(|k| col(k)).collect();
    let mut selection = key_exprs.clone();
    selection.extend(values.iter().map(|v| col(v).cast(DataType::Float64)));
    Ok(df
        .lazy()
        .select(selection)
        .group_by(key_exprs)
        .agg(values.iter().map(|v| col(v).sum()).collect::<Vec<_>>())
        .collect()?)
}
