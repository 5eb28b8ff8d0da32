use async_trait::async_trait;
use derive_builder::Builder;
use reqwest::StatusCode;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const LIGHT_STATUS_PATH: &str = "/home/light/status";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Error, Debug)]
pub enum StoreClientError {
    #[error("Invalid store configuration: {0}")]
    Config(String),
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Store answered with status {0}")]
    Status(StatusCode),
    #[error("Unexpected document payload: {0}")]
    UnexpectedPayload(String),
}

#[derive(Builder)]
#[builder(setter(into))]
pub struct StoreOptions {
    pub base_url: String,
    pub secret: String,
    #[builder(default = "LIGHT_STATUS_PATH.to_string()")]
    pub document_path: String,
}

impl StoreOptions {
    pub fn builder() -> StoreOptionsBuilder {
        StoreOptionsBuilder::default()
    }
}

impl fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOptions")
            .field("base_url", &self.base_url)
            .field("secret", &"<redacted>")
            .field("document_path", &self.document_path)
            .finish()
    }
}

/// Remote access to the single light document. Reads yield `None` when the
/// document holds JSON `null`, which callers must treat as "no update".
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn read_power(&self) -> Result<Option<bool>, StoreClientError>;
    async fn write_power(&self, value: bool) -> Result<(), StoreClientError>;
}

pub struct StoreClient {
    http: reqwest::Client,
    base_url: String,
    secret: String,
    document_path: String,
}

impl StoreClient {
    pub fn new(options: StoreOptions) -> Result<Self, StoreClientError> {
        if options.base_url.trim().is_empty() {
            return Err(StoreClientError::Config(
                "database URL must not be empty".to_string(),
            ));
        }
        if options.secret.trim().is_empty() {
            return Err(StoreClientError::Config(
                "database secret must not be empty".to_string(),
            ));
        }
        let http = reqwest::Client::builder()
            .build()
            .map_err(StoreClientError::Transport)?;
        Ok(StoreClient {
            http,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            secret: options.secret,
            document_path: options.document_path,
        })
    }

    // Full REST endpoint for the document. Carries the secret, so it must
    // never end up in logs.
    fn value_url(&self) -> String {
        format!(
            "{}{}.json?auth={}",
            self.base_url, self.document_path, self.secret
        )
    }

    pub async fn read_power(&self) -> Result<Option<bool>, StoreClientError> {
        debug!("Reading {}", self.document_path);
        let response = self.http.get(self.value_url()).send().await?;
        if !response.status().is_success() {
            return Err(StoreClientError::Status(response.status()));
        }
        let payload = response.json::<Value>().await?;
        match payload {
            Value::Null => Ok(None),
            Value::Bool(value) => Ok(Some(value)),
            other => Err(StoreClientError::UnexpectedPayload(other.to_string())),
        }
    }

    pub async fn write_power(&self, value: bool) -> Result<(), StoreClientError> {
        debug!("Writing {} to {}", value, self.document_path);
        let response = self.http.put(self.value_url()).json(&value).send().await?;
        if !response.status().is_success() {
            return Err(StoreClientError::Status(response.status()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for StoreClient {
    async fn read_power(&self) -> Result<Option<bool>, StoreClientError> {
        StoreClient::read_power(self).await
    }

    async fn write_power(&self, value: bool) -> Result<(), StoreClientError> {
        StoreClient::write_power(self, value).await
    }
}
