//! Conversion of upstream date tokens into the `DD/MM/YY` display form and a chronological key.
//!
//! The infection feeds label their columns `month/day/year` while the vaccination feed uses
//! `year-month-day`. Both end up as a [`DateKey`], which orders by (year, month, day) no matter
//! how the display string would sort.

use std::fmt::Display;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{CovidashError, CovidashResult};

pub const DISPLAY_DELIMITER: char = '/';

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DateKey(NaiveDate);

/// Order of the fields inside a raw token.
#[derive(Clone, Copy, Debug)]
enum FieldOrder {
    YearMonthDay,
    MonthDayYear,
    DayMonthYear,
}

fn split_three<'a>(raw: &'a str, delimiter: char) -> CovidashResult<[&'a str; 3]> {
    let parts: Vec<&str> = raw.trim().split(delimiter).collect();
    match parts.as_slice() {
        [a, b, c] => Ok([*a, *b, *c]),
        _ => Err(CovidashError::Format(format!(
            "'{raw}' does not split into 3 parts on '{delimiter}'"
        ))),
    }
}

fn parse_part(raw: &str, part: &str) -> CovidashResult<u32> {
    part.trim()
        .parse::<u32>()
        .map_err(|_| CovidashError::Format(format!("'{part}' in '{raw}' is not a number")))
}

impl DateKey {
    pub fn from_ymd(year: i32, month: u32, day: u32) -> CovidashResult<Self> {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(DateKey)
            .ok_or_else(|| CovidashError::Format(format!("{year}-{month}-{day} is not a date")))
    }

    fn parse(raw: &str, delimiter: char, order: FieldOrder) -> CovidashResult<Self> {
        let [a, b, c] = split_three(raw, delimiter)?;
        let (year, month, day) = match order {
            FieldOrder::YearMonthDay => (a, b, c),
            FieldOrder::MonthDayYear => (c, a, b),
            FieldOrder::DayMonthYear => (c, b, a),
        };
        let mut year_value = i32::try_from(parse_part(raw, year)?)
            .map_err(|_| CovidashError::Format(format!("'{year}' in '{raw}' is out of range")))?;
        // Two digit years only ever come from the pandemic era feeds
        if year.trim().len() <= 2 {
            year_value += 2000;
        }
        Self::from_ymd(year_value, parse_part(raw, month)?, parse_part(raw, day)?)
    }

    /// Parse a `year-month-day` style token, e.g. `2021-03-07`.
    pub fn from_ymd_token(raw: &str, delimiter: char) -> CovidashResult<Self> {
        Self::parse(raw, delimiter, FieldOrder::YearMonthDay)
    }

    /// Parse a `month/day/year` style token, e.g. `3/7/21`.
    pub fn from_mdy_token(raw: &str, delimiter: char) -> CovidashResult<Self> {
        Self::parse(raw, delimiter, FieldOrder::MonthDayYear)
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn day(&self) -> u32 {
        self.0.day()
    }

    /// Composite chronological key
    pub fn sort_key(&self) -> (i32, u32, u32) {
        (self.year(), self.month(), self.day())
    }
}

impl Display for DateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02}{DISPLAY_DELIMITER}{:02}{DISPLAY_DELIMITER}{:02}",
            self.day(),
            self.month(),
            self.year().rem_euclid(100)
        )
    }
}

/// Parses the canonical `DD/MM/YY` display token.
impl FromStr for DateKey {
    type Err = CovidashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, DISPLAY_DELIMITER, FieldOrder::DayMonthYear)
    }
}

/// Convert a `year-month-day` token into the `DD/MM/YY` display format.
pub fn to_display_format(raw: &str, delimiter: char) -> CovidashResult<String> {
    Ok(DateKey::from_ymd_token(raw, delimiter)?.to_string())
}

/// Convert a `month/day/year` token into the `DD/MM/YY` display format.
pub fn change_to_dmy(raw: &str, delimiter: char) -> CovidashResult<String> {
    Ok(DateKey::from_mdy_token(raw, delimiter)?.to_string())
}

/// Sort display tokens chronologically.
pub fn sort_display_tokens(tokens: &[String]) -> CovidashResult<Vec<String>> {
    let mut keys = tokens
        .iter()
        .map(|token| token.parse::<DateKey>())
        .collect::<CovidashResult<Vec<_>>>()?;
    keys.sort();
    Ok(keys.into_iter().map(|key| key.to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ymd_tokens_are_reformatted() {
        assert_eq!(to_display_format("2021-03-07", '-').unwrap(), "07/03/21");
        assert_eq!(to_display_format("2020-12-31", '-').unwrap(), "31/12/20");
    }

    #[test]
    fn mdy_tokens_are_zero_padded() {
        assert_eq!(change_to_dmy("1/22/20", '/').unwrap(), "22/01/20");
        assert_eq!(change_to_dmy("12/3/2021", '/').unwrap(), "03/12/21");
    }

    #[test]
    fn wrong_number_of_parts_is_a_format_error() {
        for raw in ["2021-03", "2021-03-07-01", "", "1/22/20"] {
            let result = to_display_format(raw, '-');
            assert!(
                matches!(result, Err(CovidashError::Format(_))),
                "'{raw}' should not parse"
            );
        }
        assert!(matches!(
            change_to_dmy("Lat", '/'),
            Err(CovidashError::Format(_))
        ));
    }

    #[test]
    fn impossible_dates_are_rejected() {
        assert!(change_to_dmy("13/1/20", '/').is_err());
        assert!(to_display_format("2021-02-30", '-').is_err());
        assert!(to_display_format("2021-xx-01", '-').is_err());
        assert!(matches!(
            to_display_format("4294967295-01-01", '-'),
            Err(CovidashError::Format(_))
        ));
        assert!(matches!(
            change_to_dmy("1/22/2147483648", '/'),
            Err(CovidashError::Format(_))
        ));
    }

    #[test]
    fn display_round_trip_preserves_ordering() {
        let triples = [
            (2020, 1, 22),
            (2020, 12, 1),
            (2021, 1, 2),
            (2021, 10, 30),
            (2022, 2, 28),
        ];
        for window in triples.windows(2) {
            let (y0, m0, d0) = window[0];
            let (y1, m1, d1) = window[1];
            let first: DateKey = DateKey::from_ymd(y0, m0, d0)
                .unwrap()
                .to_string()
                .parse()
                .unwrap();
            let second: DateKey = DateKey::from_ymd(y1, m1, d1)
                .unwrap()
                .to_string()
                .parse()
                .unwrap();
            assert_eq!(first.sort_key(), (y0, m0, d0));
            assert_eq!(first.cmp(&second), (y0, m0, d0).cmp(&(y1, m1, d1)));
        }
    }

    #[test]
    fn sorting_is_chronological_not_lexicographic() {
        // Lexicographic order would put 01/02/21 before 31/12/20
        let tokens = vec![
            "01/02/21".to_string(),
            "31/12/20".to_string(),
            "02/01/21".to_string(),
            "15/06/20".to_string(),
        ];
        let sorted = sort_display_tokens(&tokens).unwrap();
        assert_eq!(sorted, vec!["15/06/20", "31/12/20", "02/01/21", "01/02/21"]);

        let mut reversed = tokens.clone();
        reversed.reverse();
        assert_eq!(sort_display_tokens(&reversed).unwrap(), sorted);
    }
}
