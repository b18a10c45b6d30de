use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use tracing::debug;

use crate::{config::RemoteConfig, error::FetchError, event::Event};

use super::{DataSource, FetchRequest, FetchResponse};

const GET_DATA_PATH: &str = "/getData";

/// Fetches events from a capture server over HTTP.
#[derive(Clone)]
pub struct HttpSource {
    client: Client,
    endpoint: String,
}

impl std::fmt::Debug for HttpSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSource")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl HttpSource {
    pub fn new(cfg: &RemoteConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: cfg.endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self) -> String {
        format!("{}{GET_DATA_PATH}", self.endpoint)
    }
}

#[async_trait]
impl DataSource for HttpSource {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse, FetchError> {
        let body = serde_json::to_vec(req).map_err(|e| FetchError::Encode(e.to_string()))?;

        let res = self
            .client
            .post(self.url())
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = res.status();
        let content_length = res.content_length();
        let bytes = res.bytes().await?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        let events: Vec<Event> = serde_json::from_slice(&bytes)?;
        let byte_len = content_length.unwrap_or(bytes.len() as u64);
        debug!(events = events.len(), byte_len, "fetched");

        Ok(FetchResponse { events, byte_len })
    }
}
