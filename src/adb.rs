use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, trace};

use crate::codec::{AdbCodec, AdbReply};
use crate::settings::SETTINGS;
use crate::transport::DeviceChannel;
use crate::RemoteError;

const DEFAULT_ADB_PORT: u16 = 5037;

/// Talks to an ADB server over TCP. Each call opens a fresh socket, as the
/// server closes it after one host request.
#[derive(Debug, Clone)]
pub struct AdbClient {
    server_address: String,
}

impl AdbClient {
    pub fn new(server_address: &str) -> Self {
        let server_address = if server_address.trim().is_empty() {
            format!("127.0.0.1:{}", DEFAULT_ADB_PORT)
        } else if server_address.contains(':') {
            server_address.trim().to_string()
        } else {
            format!("{}:{}", server_address.trim(), DEFAULT_ADB_PORT)
        };
        Self { server_address }
    }

    pub fn server_address(&self) -> &str {
        &self.server_address
    }

    async fn open(&self, expect_payload: bool) -> Result<Framed<TcpStream, AdbCodec>, RemoteError> {
        let stream = timeout(
            SETTINGS.request_timeout,
            TcpStream::connect(&self.server_address),
        )
        .await
        .map_err(|_| {
            RemoteError::Device(format!(
                "Timed out connecting to ADB server {}",
                self.server_address
            ))
        })??;
        Ok(Framed::new(stream, AdbCodec::new(expect_payload)))
    }

    async fn request(
        framed: &mut Framed<TcpStream, AdbCodec>,
        command: &str,
    ) -> Result<AdbReply, RemoteError> {
        trace!(command, "Sending ADB request");
        framed.send(command).await?;
        match timeout(SETTINGS.request_timeout, framed.next()).await {
            Ok(Some(reply)) => Ok(reply?),
            Ok(None) => Err(RemoteError::Device(format!(
                "ADB server closed the socket during '{}'",
                command
            ))),
            Err(_) => Err(RemoteError::Device(format!(
                "Timed out waiting for ADB reply to '{}'",
                command
            ))),
        }
    }

    /// Run a `host:` query and return its payload text.
    async fn host_query(&self, command: &str) -> Result<String, RemoteError> {
        let mut framed = self.open(true).await?;
        match Self::request(&mut framed, command).await? {
            AdbReply::Okay(payload) => {
                let payload = payload.unwrap_or_default();
                debug!(command, response = %payload, "ADB host response");
                Ok(payload)
            }
            AdbReply::Fail(message) => Err(RemoteError::Device(message)),
        }
    }
}

#[async_trait]
impl DeviceChannel for AdbClient {
    async fn host_disconnect(&self, address: Option<&str>) -> Result<String, RemoteError> {
        match address {
            Some(addr) => self.host_query(&format!("host:disconnect:{}", addr)).await,
            None => self.host_query("host:disconnect:").await,
        }
    }

    async fn host_connect(&self, address: &str) -> Result<String, RemoteError> {
        self.host_query(&format!("host:connect:{}", address)).await
    }

    async fn shell(&self, command: &str) -> Result<String, RemoteError> {
        let mut framed = self.open(false).await?;
        if let AdbReply::Fail(message) = Self::request(&mut framed, "host:transport-any").await? {
            return Err(RemoteError::Device(message));
        }
        if let AdbReply::Fail(message) =
            Self::request(&mut framed, &format!("shell:{}", command)).await?
        {
            return Err(RemoteError::Device(message));
        }

        // Shell output is raw until EOF
        let parts = framed.into_parts();
        let mut output = parts.read_buf.to_vec();
        let mut io = parts.io;
        timeout(SETTINGS.request_timeout, io.read_to_end(&mut output))
            .await
            .map_err(|_| RemoteError::Device(format!("Timed out reading output of '{}'", command)))??;
        let text = String::from_utf8_lossy(&output).into_owned();
        debug!(command, bytes = output.len(), "ADB shell finished");
        Ok(text)
    }
}
