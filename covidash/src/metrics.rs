//! Derived summary metrics: trailing averages of new infections, incidence per 100 000 and
//! vaccination coverage.

use std::collections::{BTreeMap, BTreeSet};

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::loaders::{PopulationTable, VaccinationTables};
use crate::table::TimeSeriesTable;
use crate::COL;

pub const INCIDENCE_BASE: f64 = 100_000.0;

/// How to treat a day on which a cumulative series goes down, e.g. after an upstream correction.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NegativeDeltaPolicy {
    /// Report the negative difference as-is
    #[default]
    Keep,
    /// Floor negative differences at zero
    Clamp,
}

/// Round to 2 decimal places for display.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Backward first difference of a cumulative series. The first element has nothing to subtract
/// from and is 0; missing (NaN) values count as 0.
pub fn daily_differences(cumulative: &[f64], policy: NegativeDeltaPolicy) -> Vec<f64> {
    let mut out = Vec::with_capacity(cumulative.len());
    for (idx, current) in cumulative.iter().enumerate() {
        // A delta with a missing operand is itself missing, and missing deltas are zero
        let delta = match idx {
            0 => 0.0,
            _ if current.is_nan() || cumulative[idx - 1].is_nan() => 0.0,
            _ => current - cumulative[idx - 1],
        };
        out.push(match policy {
            NegativeDeltaPolicy::Clamp => delta.max(0.0),
            NegativeDeltaPolicy::Keep => delta,
        });
    }
    out
}

fn tail(values: &[f64], window: usize) -> &[f64] {
    &values[values.len().saturating_sub(window)..]
}

/// Mean of the last `window` values, or of all values if there are fewer. `None` when empty.
pub fn trailing_mean(values: &[f64], window: usize) -> Option<f64> {
    let tail = tail(values, window);
    if tail.is_empty() {
        None
    } else {
        Some(tail.iter().sum::<f64>() / tail.len() as f64)
    }
}

pub fn trailing_sum(values: &[f64], window: usize) -> f64 {
    tail(values, window).iter().sum()
}

/// New cases over the trailing `window` per 100 000 inhabitants.
pub fn incidence(daily: &[f64], window: usize, population: f64) -> f64 {
    trailing_sum(daily, window) * INCIDENCE_BASE / population
}

pub fn percentage(count: f64, population: f64) -> f64 {
    count * 100.0 / population
}

/// Rolling mean over `window` days of a first-difference series whose first element is undefined.
/// A position is 0 until the window holds `window` defined differences.
pub fn rolling_mean(daily: &[f64], window: usize) -> Vec<f64> {
    (0..daily.len())
        .map(|idx| {
            if window == 0 || idx < window {
                0.0
            } else {
                daily[idx + 1 - window..=idx].iter().sum::<f64>() / window as f64
            }
        })
        .collect()
}

/// Summary figures for one country. A field is `None` when the table it depends on has no row
/// for the country or the population is unknown.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct DerivedMetrics {
    pub three_day_avg_infections: Option<f64>,
    pub seven_day_avg_infections: Option<f64>,
    pub fourteen_day_avg_infections: Option<f64>,
    pub three_day_incidence: Option<f64>,
    pub seven_day_incidence: Option<f64>,
    pub fourteen_day_incidence: Option<f64>,
    pub partial_vaccination_percentage: Option<f64>,
    pub full_vaccination_percentage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetricsTable(BTreeMap<String, DerivedMetrics>);

impl MetricsTable {
    pub fn derive(
        infections: &TimeSeriesTable,
        population: &PopulationTable,
        vaccinations: &VaccinationTables,
        policy: NegativeDeltaPolicy,
    ) -> Self {
        let countries: BTreeSet<&str> = infections
            .countries()
            .chain(vaccinations.partial.countries())
            .chain(vaccinations.full.countries())
            .chain(population.iter().map(|(country, _)| country))
            .collect();

        let metrics = countries
            .into_iter()
            .map(|country| {
                let total = population.total(country);
                let daily = infections
                    .series(country)
                    .map(|series| daily_differences(series, policy));
                let average = |window| {
                    daily
                        .as_deref()
                        .and_then(|d| trailing_mean(d, window))
                        .map(round2)
                };
                let incidence_over = |window| {
                    daily
                        .as_deref()
                        .zip(total)
                        .map(|(d, total)| round2(incidence(d, window, total)))
                };
                let coverage = |table: &TimeSeriesTable| {
                    table
                        .latest(country)
                        .zip(total)
                        .map(|(count, total)| round2(percentage(count, total)))
                };
                let derived = DerivedMetrics {
                    three_day_avg_infections: average(3),
                    seven_day_avg_infections: average(7),
                    fourteen_day_avg_infections: average(14),
                    three_day_incidence: incidence_over(3),
                    seven_day_incidence: incidence_over(7),
                    fourteen_day_incidence: incidence_over(14),
                    partial_vaccination_percentage: coverage(&vaccinations.partial),
                    full_vaccination_percentage: coverage(&vaccinations.full),
                };
                (country.to_string(), derived)
            })
            .collect();
        Self(metrics)
    }

    pub fn get(&self, country: &str) -> Option<&DerivedMetrics> {
        self.0.get(country)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DerivedMetrics)> {
        self.0.iter().map(|(country, metrics)| (country.as_str(), metrics))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_frame(&self) -> PolarsResult<DataFrame> {
        let column = |name: &str, f: fn(&DerivedMetrics) -> Option<f64>| {
            Series::new(name, self.0.values().map(f).collect::<Vec<_>>())
        };
        DataFrame::new(vec![
            Series::new(COL::COUNTRY, self.0.keys().cloned().collect::<Vec<_>>()),
            column(COL::THREE_DAY_AVG_INFECTIONS, |m| m.three_day_avg_infections),
            column(COL::SEVEN_DAY_AVG_INFECTIONS, |m| m.seven_day_avg_infections),
            column(COL::FOURTEEN_DAY_AVG_INFECTIONS, |m| m.fourteen_day_avg_infections),
            column(COL::THREE_DAY_INCIDENCE, |m| m.three_day_incidence),
            column(COL::SEVEN_DAY_INCIDENCE, |m| m.seven_day_incidence),
            column(COL::FOURTEEN_DAY_INCIDENCE, |m| m.fourteen_day_incidence),
            column(COL::PARTIAL_VACCINATION_PERCENTAGE, |m| m.partial_vaccination_percentage),
            column(COL::FULL_VACCINATION_PERCENTAGE, |m| m.full_vaccination_percentage),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchConfig;
    use crate::country::SupportedCountries;
    use crate::date::DateKey;
    use crate::fetch::SourceFetcher;
    use crate::loaders::PopulationLoader;

    fn series_table(country: &str, values: &[f64]) -> TimeSeriesTable {
        TimeSeriesTable::from_cells(values.iter().enumerate().map(|(idx, v)| {
            let date = DateKey::from_ymd(2021, 1, 1 + idx as u32).unwrap();
            (country.to_string(), date, *v)
        }))
    }

    async fn population(country: &str, total: i64) -> PopulationTable {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = dir.path().join("population.csv");
        std::fs::write(
            &cache,
            format!("Location,PopMale,PopFemale,PopTotal\n{country},0,0,{total}\n"),
        )
        .unwrap();
        let fetcher = SourceFetcher::new(&FetchConfig::default()).unwrap();
        PopulationLoader::new(2020, "Medium", &cache)
            .load(&fetcher, "unused", &SupportedCountries::new([country]))
            .await
            .unwrap()
    }

    #[test]
    fn first_difference_starts_at_zero() {
        assert_eq!(
            daily_differences(&[5.0, 15.0, 35.0, 65.0], NegativeDeltaPolicy::Keep),
            vec![0.0, 10.0, 20.0, 30.0]
        );
        assert!(daily_differences(&[], NegativeDeltaPolicy::Keep).is_empty());
    }

    #[test]
    fn missing_values_become_zero() {
        let daily = daily_differences(&[f64::NAN, 10.0, f64::NAN], NegativeDeltaPolicy::Keep);
        assert_eq!(daily, vec![0.0, 0.0, 0.0]);
        assert!(daily.iter().all(|v| !v.is_nan()));

        // A gap in the cumulative series must not show up as a drop followed by a spike
        let daily = daily_differences(&[5.0, f64::NAN, 15.0, 20.0], NegativeDeltaPolicy::Keep);
        assert_eq!(daily, vec![0.0, 0.0, 0.0, 5.0]);
    }

    #[test]
    fn negative_delta_policy_is_applied() {
        let cumulative = [10.0, 8.0, 12.0];
        assert_eq!(
            daily_differences(&cumulative, NegativeDeltaPolicy::Keep),
            vec![0.0, -2.0, 4.0]
        );
        assert_eq!(
            daily_differences(&cumulative, NegativeDeltaPolicy::Clamp),
            vec![0.0, 0.0, 4.0]
        );
    }

    #[test]
    fn trailing_average_uses_last_entries() {
        let daily = [0.0, 10.0, 20.0, 30.0];
        assert_eq!(trailing_mean(&daily, 3), Some(20.0));
        assert_eq!(trailing_mean(&daily, 7), Some(15.0));
        assert_eq!(trailing_mean(&[], 3), None);
    }

    #[test]
    fn incidence_and_percentage() {
        assert_eq!(incidence(&[0.0, 100.0, 100.0, 100.0], 3, 1_000_000.0), 30.0);
        assert_eq!(percentage(450_000.0, 1_000_000.0), 45.0);
        assert_eq!(round2(2.0 / 3.0), 0.67);
    }

    #[test]
    fn rolling_mean_waits_for_a_full_window() {
        let daily = [0.0, 10.0, 20.0, 30.0, 40.0];
        assert_eq!(rolling_mean(&daily, 3), vec![0.0, 0.0, 0.0, 20.0, 30.0]);
        assert_eq!(rolling_mean(&daily, 14), vec![0.0; 5]);
    }

    #[tokio::test]
    async fn metrics_table_combines_sources() {
        let infections = series_table("Austria", &[0.0, 10.0, 30.0, 60.0]);
        let vaccinations = VaccinationTables {
            partial: series_table("Austria", &[100_000.0, 600_000.0]),
            full: series_table("Austria", &[0.0, 450_000.0]),
        };
        let population = population("Austria", 1_000_000).await;
        let metrics = MetricsTable::derive(
            &infections,
            &population,
            &vaccinations,
            NegativeDeltaPolicy::Keep,
        );
        let austria = metrics.get("Austria").unwrap();
        assert_eq!(austria.three_day_avg_infections, Some(20.0));
        assert_eq!(austria.seven_day_avg_infections, Some(15.0));
        assert_eq!(austria.three_day_incidence, Some(6.0));
        assert_eq!(austria.full_vaccination_percentage, Some(45.0));
        assert_eq!(austria.partial_vaccination_percentage, Some(60.0));

        let frame = metrics.to_frame().unwrap();
        assert_eq!(frame.shape(), (1, 9));
    }

    #[test]
    fn unknown_population_leaves_rates_absent() {
        let infections = series_table("Austria", &[0.0, 3.0]);
        let metrics = MetricsTable::derive(
            &infections,
            &PopulationTable::default(),
            &VaccinationTables::default(),
            NegativeDeltaPolicy::Keep,
        );
        let austria = metrics.get("Austria").unwrap();
        assert_eq!(austria.three_day_avg_infections, Some(1.5));
        assert_eq!(austria.three_day_incidence, None);
        assert_eq!(austria.full_vaccination_percentage, None);
    }
}
