use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::{IngestError, Result};
use crate::models::SourceIdentifier;

/// Retrieves the raw bytes behind a source identifier.
pub trait PayloadFetcher: Send {
    fn fetch(&self, identifier: &SourceIdentifier) -> Result<Vec<u8>>;
}

/// Blocking HTTP fetcher. Clones share the underlying connection pool
/// settings but each worker holds its own handle.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("weather-ingest/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl PayloadFetcher for HttpFetcher {
    fn fetch(&self, identifier: &SourceIdentifier) -> Result<Vec<u8>> {
        let response = self.client.get(identifier.as_str()).send()?;

        if !response.status().is_success() {
            return Err(IngestError::FetchStatus {
                identifier: identifier.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(response.bytes()?.to_vec())
    }
}
