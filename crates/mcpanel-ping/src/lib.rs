//! mcpanel Ping - live status probe
//!
//! The rest of the panel only sees the [`Pinger`] trait; [`SlpPinger`]
//! speaks the Server List Ping protocol over TCP.

pub mod protocol;

use async_trait::async_trait;
use mcpanel_core::{Error, OnlineStats, Result};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

pub use protocol::{parse_status, PingStatus};

/// Probe for a server's live status
#[async_trait]
pub trait Pinger: Send + Sync {
    /// Ask the server at `host:port` for its status.
    ///
    /// Any failure (refused, timeout, garbage) is an error; callers treat
    /// an error as "not reachable".
    async fn ping(&self, host: &str, port: u16) -> Result<PingStatus>;
}

impl PingStatus {
    pub fn online_stats(&self) -> OnlineStats {
        OnlineStats {
            online: self.online,
            max: self.max,
            players: self.players.clone(),
        }
    }
}

/// Server List Ping client
#[derive(Debug, Clone)]
pub struct SlpPinger {
    timeout: Duration,
}

impl SlpPinger {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn exchange(&self, host: &str, port: u16) -> Result<PingStatus> {
        let mut stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| Error::ping(format!("{}:{}: {}", host, port, e)))?;

        stream.write_all(&protocol::status_request(host, port)).await?;
        stream.flush().await?;

        let json = protocol::read_status_response(&mut stream).await?;
        parse_status(&json)
    }
}

impl Default for SlpPinger {
    fn default() -> Self {
        Self::new(Duration::from_millis(mcpanel_core::constants::DEFAULT_PING_TIMEOUT_MS))
    }
}

#[async_trait]
impl Pinger for SlpPinger {
    async fn ping(&self, host: &str, port: u16) -> Result<PingStatus> {
        match tokio::time::timeout(self.timeout, self.exchange(host, port)).await {
            Ok(result) => {
                if let Err(e) = &result {
                    debug!("Ping {}:{} failed: {}", host, port, e);
                }
                result
            }
            Err(_) => Err(Error::Timeout(format!("ping {}:{}", host, port))),
        }
    }
}
