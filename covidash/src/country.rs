//! Canonical country names and the supported-country allow-list.

use std::path::Path;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::{CovidashError, CovidashResult};

/// Source spellings rewritten to the canonical vocabulary.
const ALIASES: &[(&str, &str)] = &[
    ("Moldova", "Republic of Moldova"),
    ("Russia", "Russian Federation"),
    ("Czechia", "Czech Republic"),
];

/// Map a source-specific country name to its canonical name. Unknown names pass through.
pub fn canonicalize(name: &str) -> &str {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(name)
}

/// Ordered, de-duplicated list of canonical country names that every table is restricted to.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct SupportedCountries {
    countries: Vec<String>,
}

impl SupportedCountries {
    /// Names are canonicalized on the way in so configuration may use either spelling.
    pub fn new<I, S>(countries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            countries: countries
                .into_iter()
                .map(|c| canonicalize(c.as_ref().trim()).to_string())
                .unique()
                .collect(),
        }
    }

    pub fn from_json_str(contents: &str) -> CovidashResult<Self> {
        let parsed: SupportedCountries = serde_json::from_str(contents)?;
        Ok(Self::new(parsed.countries))
    }

    pub fn from_json_path<P: AsRef<Path>>(path: P) -> CovidashResult<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.countries.iter().any(|c| c == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.countries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.countries
    }

    /// Validate a display selection of countries, rejecting anything outside the allow-list.
    /// Aliases are accepted and returned in canonical form.
    pub fn validate_selection<S: AsRef<str>>(&self, selection: &[S]) -> CovidashResult<Vec<String>> {
        if selection.is_empty() {
            return Err(CovidashError::UnknownSelection(
                "no countries selected".into(),
            ));
        }
        selection
            .iter()
            .map(|s| {
                let name = canonicalize(s.as_ref().trim());
                if self.contains(name) {
                    Ok(name.to_string())
                } else {
                    Err(CovidashError::UnknownSelection(format!(
                        "'{name}' is not a supported country"
                    )))
                }
            })
            .collect()
    }
}
