use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{error::FetchError, event::Event};

pub mod http;

pub use http::HttpSource;

/// Body of a `/getData` request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRequest {
    pub serial_number: String,
    pub start_epoch_ms: i64,
    pub end_epoch_ms: i64,
}

#[derive(Debug, Clone, Default)]
pub struct FetchResponse {
    /// ascending by epoch, covering at least the requested range
    pub events: Vec<Event>,
    /// size of the response body, for accounting
    pub byte_len: u64,
}

/// Where device events come from.
///
/// An `Err` means the range is unresolved; an empty `Ok` means there is no data.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse, FetchError>;
}
