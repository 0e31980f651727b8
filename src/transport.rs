use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use tracing::debug;

use crate::settings::SETTINGS;
use crate::RemoteError;

/// Command channel to the device. Implemented by [`crate::AdbClient`];
/// tests substitute their own.
#[async_trait]
pub trait DeviceChannel: Send + Sync {
    /// Drop the connection to `address`, or every connection when `None`.
    async fn host_disconnect(&self, address: Option<&str>) -> Result<String, RemoteError>;

    /// Ask the server to connect to `address`; the reply text reports success.
    async fn host_connect(&self, address: &str) -> Result<String, RemoteError>;

    /// Run a shell command on the connected device and return its output.
    async fn shell(&self, command: &str) -> Result<String, RemoteError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }
}

/// Plain HTTP GET returning the body text.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn get(&self, request: FetchRequest) -> Result<String, RemoteError>;
}

pub struct ReqwestFetcher {
    client: Arc<Client>,
}

impl ReqwestFetcher {
    pub fn new(custom_client: Option<Arc<Client>>) -> Result<Self, RemoteError> {
        let client = match custom_client {
            Some(client) => client,
            None => Arc::new(
                Client::builder()
                    .pool_idle_timeout(Some(std::time::Duration::from_secs(90)))
                    .timeout(SETTINGS.request_timeout)
                    .connect_timeout(SETTINGS.request_timeout)
                    .build()?,
            ),
        };
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get(&self, request: FetchRequest) -> Result<String, RemoteError> {
        debug!(url = %request.url, "Sending GET");
        let mut builder = self.client.get(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            // Body is still handed on; callers treat an unexpected payload as data-absent
            debug!(%status, "GET returned non-success status");
        }
        Ok(body)
    }
}
