//! Acquisition of raw dataset bytes from HTTP(S) or local sources.
//!
//! Transient network failures (timeouts, refused connections, HTTP 5xx and 429) are retried with
//! exponential backoff; everything else fails on the first attempt.

use std::io::{Cursor, Read};
use std::time::Duration;

use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use zip::ZipArchive;

use crate::config::{DatasetCategory, FetchConfig};
use crate::error::{CovidashError, CovidashResult};

/// Local file header, end of central directory (empty archive) and spanned archive markers.
const ZIP_SIGNATURES: [&[u8]; 3] = [b"PK\x03\x04", b"PK\x05\x06", b"PK\x07\x08"];
const TABLE_EXTENSION: &str = ".csv";

#[derive(Debug)]
enum FetchFailure {
    Transient(String),
    Fatal(String),
}

fn classify(err: reqwest::Error) -> FetchFailure {
    if err.is_timeout() || err.is_connect() {
        FetchFailure::Transient(err.to_string())
    } else {
        FetchFailure::Fatal(err.to_string())
    }
}

pub struct SourceFetcher {
    client: Client,
    config: FetchConfig,
}

impl SourceFetcher {
    pub fn new(config: &FetchConfig) -> CovidashResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("covidash/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(anyhow::Error::from)?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Fetch the tabular content for `category` from `location`, unpacking it if it arrives as
    /// an archive.
    pub async fn fetch_table(
        &self,
        category: DatasetCategory,
        location: &str,
    ) -> CovidashResult<Vec<u8>> {
        let bytes = self.fetch_bytes(category, location).await?;
        extract_single_table(category, bytes)
    }

    /// Fetch raw bytes. Locations without an `http(s)://` scheme are read from the filesystem.
    pub async fn fetch_bytes(
        &self,
        category: DatasetCategory,
        location: &str,
    ) -> CovidashResult<Vec<u8>> {
        if !(location.starts_with("http://") || location.starts_with("https://")) {
            let path = location.strip_prefix("file://").unwrap_or(location);
            info!("Reading {category} data from {path}");
            return tokio::fs::read(path)
                .await
                .map_err(|e| CovidashError::unavailable(category, format!("{path}: {e}")));
        }

        let max_attempts = self.config.max_attempts.max(1);
        let mut delay = Duration::from_millis(self.config.backoff_millis);
        let mut attempt = 1;
        loop {
            info!("Attempting to download {category} data from {location} (attempt {attempt}/{max_attempts})");
            match self.try_get(location).await {
                Ok(bytes) => {
                    debug!("Downloaded {} bytes of {category} data", bytes.len());
                    return Ok(bytes);
                }
                Err(FetchFailure::Transient(reason)) if attempt < max_attempts => {
                    warn!("Transient failure fetching {category} data: {reason}; retrying in {delay:?}");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(FetchFailure::Transient(reason)) | Err(FetchFailure::Fatal(reason)) => {
                    return Err(CovidashError::unavailable(category, reason));
                }
            }
        }
    }

    async fn try_get(&self, url: &str) -> Result<Vec<u8>, FetchFailure> {
        let response = self.client.get(url).send().await.map_err(classify)?;
        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchFailure::Transient(format!("HTTP {status} from {url}")));
        }
        if !status.is_success() {
            return Err(FetchFailure::Fatal(format!("HTTP {status} from {url}")));
        }
        Ok(response.bytes().await.map_err(classify)?.to_vec())
    }
}

/// If `bytes` is a zip archive, return the content of its single CSV entry; otherwise return
/// `bytes` unchanged.
pub fn extract_single_table(category: DatasetCategory, bytes: Vec<u8>) -> CovidashResult<Vec<u8>> {
    if !ZIP_SIGNATURES.iter().any(|magic| bytes.starts_with(magic)) {
        return Ok(bytes);
    }
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| CovidashError::unavailable(category, format!("unreadable archive: {e}")))?;

    let mut candidates = vec![];
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|e| CovidashError::unavailable(category, format!("unreadable archive: {e}")))?;
        if entry.is_file() && entry.name().to_lowercase().ends_with(TABLE_EXTENSION) {
            candidates.push(i);
        }
    }
    let index = match candidates.as_slice() {
        [index] => *index,
        _ => {
            return Err(CovidashError::source_format(
                category,
                format!(
                    "archive must contain exactly one {TABLE_EXTENSION} file, found {}",
                    candidates.len()
                ),
            ))
        }
    };

    let mut entry = archive
        .by_index(index)
        .map_err(|e| CovidashError::unavailable(category, format!("unreadable archive: {e}")))?;
    debug!("Extracting {} from {category} archive", entry.name());
    let mut contents = vec![];
    entry.read_to_end(&mut contents)?;
    Ok(contents)
}
