use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, Serialize, PartialEq)]
pub enum FetchError {
    #[error("transport error `{0}`")]
    Transport(String),
    #[error("remote responded {status} {reason}: `{body}`")]
    Status {
        status: u16,
        reason: String,
        body: String,
    },
    #[error("could not decode response `{0}`")]
    Decode(String),
    #[error("could not encode request `{0}`")]
    Encode(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

#[derive(Error, Debug, Serialize)]
pub enum ConfigError {
    #[error("config error `{0}`")]
    Load(String),
    #[error("wrong config version. got {got}, expected {expected}")]
    WrongVersion { got: f32, expected: f32 },
    #[error("bad duration `{0}`: {1}")]
    BadDuration(String, String),
}

impl From<::config::ConfigError> for ConfigError {
    fn from(value: ::config::ConfigError) -> Self {
        Self::Load(value.to_string())
    }
}

#[derive(Error, Debug, Clone, Serialize, PartialEq)]
pub enum QueryError {
    #[error("range needs {buckets} timeline buckets, at most {max} are allowed")]
    TooManyBuckets { buckets: i64, max: usize },
}
