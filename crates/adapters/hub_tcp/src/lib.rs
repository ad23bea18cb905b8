//! # spokes-adapter-hub-tcp
//!
//! [`HubGateway`] implementation speaking the hub's socket protocol.
//!
//! One call is one exchange: connect, write the JSON message, half-close the
//! write side, read the reply until EOF, parse it, close. Connections are
//! never reused since the half-close is how the hub detects the end of a
//! message.

mod config;
mod error;

pub use config::HubConfig;
pub use error::GatewayError;

use serde_json::Value;
use spokes_app::ports::HubGateway;
use spokes_domain::message::HubMessage;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Sends each message on a fresh TCP connection to the hub.
#[derive(Debug, Clone)]
pub struct TcpHubGateway {
    config: HubConfig,
}

impl TcpHubGateway {
    #[must_use]
    pub fn new(config: HubConfig) -> Self {
        Self { config }
    }

    /// Perform one bounded exchange and return the parsed reply.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] for encode, connect, IO or decode failures
    /// and when the whole exchange exceeds the configured timeout.
    pub async fn exchange(&self, message: &HubMessage) -> Result<Value, GatewayError> {
        let payload = serde_json::to_vec(message).map_err(GatewayError::Encode)?;
        let timeout = self.config.timeout();

        let exchange = async {
            let mut stream = TcpStream::connect((self.config.host.as_str(), self.config.port))
                .await
                .map_err(GatewayError::Connect)?;
            stream.write_all(&payload).await.map_err(GatewayError::Io)?;
            stream.shutdown().await.map_err(GatewayError::Io)?;

            let mut reply = Vec::new();
            stream
                .read_to_end(&mut reply)
                .await
                .map_err(GatewayError::Io)?;
            serde_json::from_slice(&reply).map_err(GatewayError::Decode)
        };

        tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| GatewayError::Timeout(timeout))?
    }
}

impl HubGateway for TcpHubGateway {
    async fn send(&self, message: HubMessage) -> Option<Value> {
        match self.exchange(&message).await {
            Ok(reply) => {
                tracing::debug!(command = message.command(), "hub replied");
                Some(reply)
            }
            Err(err) => {
                tracing::warn!(
                    command = message.command(),
                    host = %self.config.host,
                    port = self.config.port,
                    error = %err,
                    "hub exchange failed"
                );
                None
            }
        }
    }
}
