//! Country x date matrices shared by every time-series dataset.

use std::collections::{BTreeMap, BTreeSet};

use polars::prelude::*;

use crate::date::DateKey;
use crate::error::CovidashResult;

/// A dense Country x [`DateKey`] matrix. Dates are strictly ascending and every country row has
/// exactly one value per date; a cell that is absent from the source holds `0.0`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeSeriesTable {
    dates: Vec<DateKey>,
    rows: BTreeMap<String, Vec<f64>>,
}

impl TimeSeriesTable {
    /// Pivot `(country, date, value)` cells into a table. Cells sharing a (country, date) pair are
    /// summed, which also merges rows of countries that were split into regions upstream.
    pub fn from_cells<I>(cells: I) -> Self
    where
        I: IntoIterator<Item = (String, DateKey, f64)>,
    {
        let mut dates = BTreeSet::new();
        let mut sparse: BTreeMap<String, BTreeMap<DateKey, f64>> = BTreeMap::new();
        for (country, date, value) in cells {
            dates.insert(date);
            *sparse.entry(country).or_default().entry(date).or_insert(0.0) += value;
        }
        let dates: Vec<DateKey> = dates.into_iter().collect();
        let rows = sparse
            .into_iter()
            .map(|(country, values)| {
                let row = dates
                    .iter()
                    .map(|date| values.get(date).copied().unwrap_or(0.0))
                    .collect();
                (country, row)
            })
            .collect();
        Self { dates, rows }
    }

    /// Build from a wide frame with one row per country and one numeric column per date.
    /// `date_columns` pairs each frame column name with its parsed date; their order is
    /// irrelevant.
    pub fn from_wide_frame(
        df: &DataFrame,
        key: &str,
        date_columns: &[(String, DateKey)],
    ) -> CovidashResult<Self> {
        let names = df.column(key)?.str()?;
        let mut cells = Vec::with_capacity(df.height() * date_columns.len());
        for (column_name, date) in date_columns {
            let values = df.column(column_name)?.f64()?;
            for (name, value) in names.into_iter().zip(values.into_iter()) {
                if let Some(name) = name {
                    cells.push((name.to_string(), *date, value.unwrap_or(0.0)));
                }
            }
        }
        Ok(Self::from_cells(cells))
    }

    /// Build from a long frame with one row per (country, date) observation.
    pub fn from_long_frame<F>(
        df: &DataFrame,
        key: &str,
        date_column: &str,
        value_column: &str,
        parse_date: F,
    ) -> CovidashResult<Self>
    where
        F: Fn(&str) -> CovidashResult<DateKey>,
    {
        let names = df.column(key)?.str()?;
        let dates = df.column(date_column)?.str()?;
        let values = df.column(value_column)?.f64()?;
        let mut cells = Vec::with_capacity(df.height());
        for ((name, date), value) in names.into_iter().zip(dates).zip(values) {
            if let (Some(name), Some(date)) = (name, date) {
                cells.push((name.to_string(), parse_date(date)?, value.unwrap_or(0.0)));
            }
        }
        Ok(Self::from_cells(cells))
    }

    pub fn dates(&self) -> &[DateKey] {
        &self.dates
    }

    /// Date columns as `DD/MM/YY` labels, in chronological order.
    pub fn date_labels(&self) -> Vec<String> {
        self.dates.iter().map(|d| d.to_string()).collect()
    }

    pub fn countries(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn contains(&self, country: &str) -> bool {
        self.rows.contains_key(country)
    }

    pub fn series(&self, country: &str) -> Option<&[f64]> {
        self.rows.get(country).map(Vec::as_slice)
    }

    /// Most recent value for `country`.
    pub fn latest(&self, country: &str) -> Option<f64> {
        self.series(country).and_then(|s| s.last().copied())
    }

    pub fn value(&self, country: &str, date: &DateKey) -> Option<f64> {
        let idx = self.dates.binary_search(date).ok()?;
        self.series(country).map(|s| s[idx])
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Wide frame with `key` as the first column followed by one column per date label.
    pub fn to_frame(&self, key: &str) -> PolarsResult<DataFrame> {
        let mut columns = Vec::with_capacity(self.dates.len() + 1);
        columns.push(Series::new(key, self.rows.keys().cloned().collect::<Vec<_>>()));
        for (idx, date) in self.dates.iter().enumerate() {
            let values: Vec<f64> = self.rows.values().map(|row| row[idx]).collect();
            columns.push(Series::new(&date.to_string(), values));
        }
        DataFrame::new(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(raw: &str) -> DateKey {
        raw.parse().unwrap()
    }

    #[test]
    fn cells_are_pivoted_sorted_and_summed() {
        let table = TimeSeriesTable::from_cells(vec![
            ("Austria".to_string(), date("02/01/21"), 4.0),
            ("Austria".to_string(), date("31/12/20"), 1.0),
            ("Germany".to_string(), date("01/01/21"), 7.0),
            ("Austria".to_string(), date("02/01/21"), 6.0),
        ]);
        assert_eq!(table.date_labels(), vec!["31/12/20", "01/01/21", "02/01/21"]);
        assert_eq!(table.series("Austria").unwrap(), &[1.0, 0.0, 10.0]);
        assert_eq!(table.series("Germany").unwrap(), &[0.0, 7.0, 0.0]);
        assert_eq!(table.latest("Austria"), Some(10.0));
        assert_eq!(table.value("Germany", &date("01/01/21")), Some(7.0));
        assert_eq!(table.countries().collect::<Vec<_>>(), vec!["Austria", "Germany"]);
        assert!(table.series("France").is_none());
    }

    #[test]
    fn dates_are_strictly_ascending_for_any_input_order() {
        let labels = ["05/03/21", "28/02/21", "01/01/20", "15/12/20", "01/03/21"];
        let forward = TimeSeriesTable::from_cells(
            labels.iter().map(|l| ("Austria".to_string(), date(l), 1.0)),
        );
        let backward = TimeSeriesTable::from_cells(
            labels.iter().rev().map(|l| ("Austria".to_string(), date(l), 1.0)),
        );
        assert_eq!(forward, backward);
        assert!(forward.dates().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn wide_frame_columns_follow_their_dates() {
        let df = df!(
            "Country/Region" => &["Austria", "Germany"],
            "1/23/20" => &[3.0, 30.0],
            "1/22/20" => &[1.0, 10.0]
        )
        .unwrap();
        let date_columns = vec![
            ("1/23/20".to_string(), DateKey::from_mdy_token("1/23/20", '/').unwrap()),
            ("1/22/20".to_string(), DateKey::from_mdy_token("1/22/20", '/').unwrap()),
        ];
        let table = TimeSeriesTable::from_wide_frame(&df, "Country/Region", &date_columns).unwrap();
        assert_eq!(table.date_labels(), vec!["22/01/20", "23/01/20"]);
        assert_eq!(table.series("Germany").unwrap(), &[10.0, 30.0]);
    }

    #[test]
    fn frame_export_has_one_column_per_date() {
        let table = TimeSeriesTable::from_cells(vec![
            ("Austria".to_string(), date("01/01/21"), 1.0),
            ("Austria".to_string(), date("02/01/21"), 2.0),
        ]);
        let df = table.to_frame("Country").unwrap();
        assert_eq!(df.shape(), (1, 3));
        assert_eq!(
            df.get_column_names(),
            vec!["Country", "01/01/21", "02/01/21"]
        );
    }
}
