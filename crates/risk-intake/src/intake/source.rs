use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use super::mapping::{MappingTable, MappingTableError};

/// Where the mapping resource comes from. Fetched exactly once per process.
#[async_trait]
pub trait MappingSource: Send + Sync {
    fn describe(&self) -> String;

    async fn fetch(&self) -> Result<Vec<u8>, MappingFetchError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MappingFetchError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
}

#[derive(Debug, thiserror::Error)]
pub enum MappingLoadError {
    #[error(transparent)]
    Fetch(#[from] MappingFetchError),
    #[error(transparent)]
    Table(#[from] MappingTableError),
}

/// Reads the mapping document from the local filesystem.
#[derive(Debug, Clone)]
pub struct FileMappingSource {
    path: PathBuf,
}

impl FileMappingSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MappingSource for FileMappingSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<Vec<u8>, MappingFetchError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|source| MappingFetchError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

/// Issues a single GET for a statically served mapping document.
#[derive(Debug, Clone)]
pub struct HttpMappingSource {
    client: reqwest::Client,
    url: String,
}

impl HttpMappingSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl MappingSource for HttpMappingSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> Result<Vec<u8>, MappingFetchError> {
        let http_error = |source| MappingFetchError::Http {
            url: self.url.clone(),
            source,
        };

        let response = self.client.get(&self.url).send().await.map_err(http_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(MappingFetchError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(http_error)?;
        Ok(body.to_vec())
    }
}

/// In-memory payload, for embedded tables and tests.
#[derive(Debug, Clone)]
pub struct StaticMappingSource {
    payload: Vec<u8>,
}

impl StaticMappingSource {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
        }
    }
}

#[async_trait]
impl MappingSource for StaticMappingSource {
    fn describe(&self) -> String {
        format!("inline payload ({} bytes)", self.payload.len())
    }

    async fn fetch(&self) -> Result<Vec<u8>, MappingFetchError> {
        Ok(self.payload.clone())
    }
}

/// Picks an HTTP source for `http://`/`https://` locations and a file source otherwise.
pub fn source_from_location(location: &str) -> Box<dyn MappingSource> {
    let trimmed = location.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Box::new(HttpMappingSource::new(trimmed))
    } else {
        Box::new(FileMappingSource::new(trimmed))
    }
}

pub async fn load_table(source: &dyn MappingSource) -> Result<MappingTable, MappingLoadError> {
    debug!(source = %source.describe(), "fetching mapping table");
    let payload = source.fetch().await?;
    let table = MappingTable::from_slice(&payload)?;
    Ok(table)
}
