use geojson::FeatureCollection;
use log::{debug, info};

use crate::config::{Config, DatasetCategory, SourceAttribution};
use crate::country::SupportedCountries;
use crate::error::{CovidashError, CovidashResult};
use crate::geo::GeographyReference;
use crate::loaders::{Datasets, PopulationTable, VaccinationTables};
use crate::metrics::MetricsTable;
use crate::selection::{
    CaseDataset, CaseMode, Chart, ChartSeries, Choropleth, MapMode, VaccinationMode,
    FEATURE_ID_KEY,
};
use crate::table::TimeSeriesTable;

// Re-exports
pub use column_names as COL;

// Modules
pub mod column_names;
pub mod config;
pub mod country;
pub mod date;
pub mod error;
pub mod fetch;
pub mod formatters;
pub mod geo;
pub mod loaders;
pub mod metrics;
pub mod selection;
pub mod table;

/// Type for the dashboard data and API. Built once at startup and read-only afterwards.
pub struct Covidash {
    pub config: Config,
    supported: SupportedCountries,
    datasets: Datasets,
    metrics: MetricsTable,
    geography: Option<GeographyReference>,
}

impl Covidash {
    /// Setup the Covidash object with default configuration
    pub async fn new() -> CovidashResult<Self> {
        Self::new_with_config(Config::default()).await
    }

    /// Setup the Covidash object with custom configuration, downloading every dataset
    pub async fn new_with_config(config: Config) -> CovidashResult<Self> {
        debug!("config: {config:?}");
        let supported = config.supported_countries()?;
        let datasets = loaders::load_all(&config, &supported).await?;
        let geography = config
            .geometry_path
            .as_deref()
            .map(GeographyReference::from_path)
            .transpose()?;
        let covidash = Self::from_datasets(config, supported, datasets);
        Ok(match geography {
            Some(geography) => covidash.with_geography(geography),
            None => covidash,
        })
    }

    /// Build from datasets that are already loaded
    pub fn from_datasets(config: Config, supported: SupportedCountries, datasets: Datasets) -> Self {
        let metrics = MetricsTable::derive(
            &datasets.infections,
            &datasets.population,
            &datasets.vaccinations,
            config.negative_deltas,
        );
        info!("Derived metrics for {} countries", metrics.len());
        Self {
            config,
            supported,
            datasets,
            metrics,
            geography: None,
        }
    }

    pub fn with_geography(mut self, geography: GeographyReference) -> Self {
        // Logs the supported countries the map cannot draw
        geography.missing(&self.supported);
        self.geography = Some(geography);
        self
    }

    pub fn supported(&self) -> &SupportedCountries {
        &self.supported
    }

    pub fn population(&self) -> &PopulationTable {
        &self.datasets.population
    }

    pub fn infections(&self) -> &TimeSeriesTable {
        &self.datasets.infections
    }

    pub fn recoveries(&self) -> &TimeSeriesTable {
        &self.datasets.recoveries
    }

    pub fn vaccinations(&self) -> &VaccinationTables {
        &self.datasets.vaccinations
    }

    pub fn metrics(&self) -> &MetricsTable {
        &self.metrics
    }

    pub fn geography(&self) -> Option<&GeographyReference> {
        self.geography.as_ref()
    }

    pub fn case_table(&self, dataset: CaseDataset) -> &TimeSeriesTable {
        match dataset {
            CaseDataset::Infections => self.infections(),
            CaseDataset::Recoveries => self.recoveries(),
        }
    }

    pub fn sources(&self) -> Vec<SourceAttribution> {
        self.config.sources()
    }

    /// Overview map values for every country with derived metrics
    pub fn choropleth(&self, mode: MapMode) -> Choropleth {
        let (locations, z) = self
            .metrics
            .iter()
            .map(|(country, metrics)| (country.to_string(), mode.value(metrics)))
            .unzip();
        Choropleth {
            title: mode.title().to_string(),
            hover_template: mode.hover_template(),
            feature_id_key: FEATURE_ID_KEY.to_string(),
            locations,
            z,
        }
    }

    /// The overview map joined onto the geography reference, if one is configured
    pub fn choropleth_features(&self, mode: MapMode) -> Option<FeatureCollection> {
        self.geography
            .as_ref()
            .map(|geography| geography.choropleth_features(&self.choropleth(mode), mode))
    }

    /// One line per selected country of a cumulative case series
    pub fn case_chart<S: AsRef<str>>(
        &self,
        dataset: CaseDataset,
        mode: CaseMode,
        countries: &[S],
    ) -> CovidashResult<Chart> {
        let countries = self.supported.validate_selection(countries)?;
        let table = self.case_table(dataset);
        let series = countries
            .into_iter()
            .map(|name| {
                let cumulative = self.row_or_zeros(table, &name);
                let y = mode.apply(&cumulative, self.config.negative_deltas);
                ChartSeries { name, y }
            })
            .collect();
        Ok(Chart {
            title: mode.title(dataset),
            x: table.date_labels(),
            series,
            y_axis: None,
        })
    }

    /// One line per selected country of vaccination counts or population coverage
    pub fn vaccination_chart<S: AsRef<str>>(
        &self,
        mode: VaccinationMode,
        countries: &[S],
    ) -> CovidashResult<Chart> {
        let countries = self.supported.validate_selection(countries)?;
        let table = if mode.is_full() {
            &self.datasets.vaccinations.full
        } else {
            &self.datasets.vaccinations.partial
        };
        let series = countries
            .into_iter()
            .map(|name| {
                let mut y = self.row_or_zeros(table, &name);
                if mode.is_percentage() {
                    let total = self.population().total(&name).ok_or_else(|| {
                        CovidashError::unavailable(
                            DatasetCategory::Population,
                            format!("no population figure for {name}"),
                        )
                    })?;
                    y.iter_mut().for_each(|v| *v = 100.0 * *v / total);
                }
                Ok(ChartSeries { name, y })
            })
            .collect::<CovidashResult<Vec<_>>>()?;
        Ok(Chart {
            title: mode.title().to_string(),
            x: table.date_labels(),
            series,
            y_axis: mode.y_axis(),
        })
    }

    /// A supported country the source never reported on is plotted as zeros.
    fn row_or_zeros(&self, table: &TimeSeriesTable, country: &str) -> Vec<f64> {
        match table.series(country) {
            Some(series) => series.to_vec(),
            None => {
                debug!("No data for {country}, plotting zeros");
                vec![0.0; table.dates().len()]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use tempfile::TempDir;

    use super::*;

    const CONFIRMED: &str = "\
Province/State,Country/Region,Lat,Long,1/1/21,1/2/21,1/3/21,1/4/21
,Austria,47.5,14.5,0,100,200,300
North,Czechia,50.0,14.0,5,6,7,8
South,Czechia,49.0,15.0,7,8,9,10
,Narnia,0.0,0.0,1,1,1,1
";

    const RECOVERED: &str = "\
Province/State,Country/Region,Lat,Long,1/1/21,1/2/21,1/3/21,1/4/21
,Austria,47.5,14.5,0,10,20,30
";

    const VACCINATIONS: &str = "\
Country_Region,Date,People_partially_vaccinated,People_fully_vaccinated
Austria,2021-01-03,300000,100000
Austria,2021-01-04,600000,450000
Czechia,2021-01-04,10,5
";

    const POPULATION: &str = "\
LocID,Location,VarID,Variant,Time,MidPeriod,PopMale,PopFemale,PopTotal,PopDensity
40,Austria,2,Medium,2020,2020.5,500.0,500.0,1000.0,100.0
203,Czechia,2,Medium,2020,2020.5,5262.5,5446.2,10708.9,138.7
";

    fn write(dir: &Path, name: &str, contents: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path.to_string_lossy().to_string()
    }

    async fn covidash(dir: &TempDir) -> Covidash {
        let mut config = Config {
            countries: vec!["Austria".into(), "Czech Republic".into(), "Germany".into()],
            cache_dir: Some(dir.path().join("cache")),
            ..Config::default()
        };
        config.infections.data_url = write(dir.path(), "confirmed.csv", CONFIRMED);
        config.recoveries.data_url = write(dir.path(), "recovered.csv", RECOVERED);
        config.vaccinations.data_url = write(dir.path(), "vaccinations.csv", VACCINATIONS);
        config.population.data_url = write(dir.path(), "population.csv", POPULATION);
        Covidash::new_with_config(config).await.unwrap()
    }

    #[tokio::test]
    async fn datasets_are_loaded_and_metrics_derived() {
        let dir = TempDir::new().unwrap();
        let covidash = covidash(&dir).await;

        assert_eq!(
            covidash.infections().series("Czech Republic").unwrap(),
            &[12.0, 14.0, 16.0, 18.0]
        );
        assert!(!covidash.infections().contains("Narnia"));
        assert_eq!(covidash.population().total("Austria"), Some(1_000_000.0));

        let austria = covidash.metrics().get("Austria").unwrap();
        assert_eq!(austria.three_day_avg_infections, Some(100.0));
        assert_eq!(austria.three_day_incidence, Some(30.0));
        assert_eq!(austria.full_vaccination_percentage, Some(45.0));
        assert_eq!(austria.partial_vaccination_percentage, Some(60.0));
        assert!(dir.path().join("cache/population_2020_medium.csv").exists());
    }

    #[tokio::test]
    async fn choropleth_covers_countries_with_metrics() {
        let dir = TempDir::new().unwrap();
        let covidash = covidash(&dir).await;
        let map = covidash.choropleth(MapMode::ThreeDayIncidence);
        assert_eq!(map.locations, vec!["Austria", "Czech Republic"]);
        assert_eq!(map.value("Austria"), Some(30.0));
        assert_eq!(map.feature_id_key, "properties.name_long");
        assert_eq!(map.title, "Incidence over the last 3 days per 100 000");
        assert!(covidash.choropleth_features(MapMode::ThreeDayIncidence).is_none());
    }

    #[tokio::test]
    async fn case_chart_follows_mode_and_selection() {
        let dir = TempDir::new().unwrap();
        let covidash = covidash(&dir).await;
        let chart = covidash
            .case_chart(CaseDataset::Infections, CaseMode::Daily, &["Austria", "Czechia"])
            .unwrap();
        assert_eq!(chart.x, vec!["01/01/21", "02/01/21", "03/01/21", "04/01/21"]);
        assert_eq!(chart.series[0].y, vec![0.0, 100.0, 100.0, 100.0]);
        assert_eq!(chart.series[1].name, "Czech Republic");
        assert_eq!(chart.series[1].y, vec![0.0, 2.0, 2.0, 2.0]);

        let chart = covidash
            .case_chart(CaseDataset::Recoveries, CaseMode::ThreeDayAverage, &["Austria", "Germany"])
            .unwrap();
        assert_eq!(chart.series[0].y, vec![0.0, 0.0, 0.0, 10.0]);
        assert_eq!(chart.series[1].y, vec![0.0; 4]);
        assert_eq!(chart.title, "3-day average of daily recoveries");

        let err = covidash
            .case_chart(CaseDataset::Infections, CaseMode::Total, &["Narnia"])
            .unwrap_err();
        assert!(err.is_selection_error());
    }

    #[tokio::test]
    async fn vaccination_percentages_use_total_population() {
        let dir = TempDir::new().unwrap();
        let covidash = covidash(&dir).await;
        let chart = covidash
            .vaccination_chart(VaccinationMode::FullPercentage, &["Austria"])
            .unwrap();
        assert_eq!(chart.x, vec!["03/01/21", "04/01/21"]);
        assert_eq!(chart.series[0].y, vec![10.0, 45.0]);
        assert_eq!(chart.y_axis.unwrap().range, Some((0.0, 100.0)));

        let chart = covidash
            .vaccination_chart(VaccinationMode::Partial, &["Austria"])
            .unwrap();
        assert_eq!(chart.series[0].y, vec![300000.0, 600000.0]);
        assert!(chart.y_axis.is_none());

        let err = covidash
            .vaccination_chart(VaccinationMode::PartialPercentage, &["Germany"])
            .unwrap_err();
        assert!(matches!(
            err,
            CovidashError::DataUnavailable {
                category: DatasetCategory::Population,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn unreachable_source_fails_startup() {
        let dir = TempDir::new().unwrap();
        let mut config = Config {
            cache_dir: Some(dir.path().join("cache")),
            ..Config::default()
        };
        config.population.data_url = write(dir.path(), "population.csv", POPULATION);
        config.infections.data_url = write(dir.path(), "confirmed.csv", CONFIRMED);
        config.recoveries.data_url = write(dir.path(), "recovered.csv", RECOVERED);
        config.vaccinations.data_url = dir.path().join("missing.csv").to_string_lossy().to_string();
        let err = Covidash::new_with_config(config).await.err().unwrap();
        assert!(matches!(
            err,
            CovidashError::DataUnavailable {
                category: DatasetCategory::Vaccinations,
                ..
            }
        ));
    }
}
