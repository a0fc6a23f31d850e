//! Error types.

use std::fmt::Display;

use crate::config::DatasetCategory;

#[derive(thiserror::Error, Debug)]
pub enum CovidashError {
    #[error("{category} data unavailable: {reason}")]
    DataUnavailable {
        category: DatasetCategory,
        reason: String,
    },
    #[error("{category} source has an unexpected format: {reason}")]
    SourceFormat {
        category: DatasetCategory,
        reason: String,
    },
    #[error("Malformed date token: {0}")]
    Format(String),
    #[error("Unknown selection: {0}")]
    UnknownSelection(String),
    #[error("Wrapped polars error: {0}")]
    PolarsError(#[from] polars::error::PolarsError),
    #[error("Wrapped IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Wrapped serde JSON error: {0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("Invalid TOML configuration: {0}")]
    TomlError(#[from] toml::de::Error),
    #[error("Wrapped anyhow error: {0}")]
    AnyhowError(#[from] anyhow::Error),
}

pub type CovidashResult<T> = Result<T, CovidashError>;

impl CovidashError {
    pub fn unavailable(category: DatasetCategory, reason: impl Display) -> Self {
        Self::DataUnavailable {
            category,
            reason: reason.to_string(),
        }
    }

    pub fn source_format(category: DatasetCategory, reason: impl Display) -> Self {
        Self::SourceFormat {
            category,
            reason: reason.to_string(),
        }
    }

    /// Whether the error came from an invalid user selection rather than from loading.
    pub fn is_selection_error(&self) -> bool {
        matches!(self, Self::UnknownSelection(_))
    }
}
