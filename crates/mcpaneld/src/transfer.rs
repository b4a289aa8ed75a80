//! File-transfer service seam
//!
//! The panel only starts and stops the service; the protocol itself is
//! out of process.

use async_trait::async_trait;
use mcpanel_core::{Error, Result};
use tracing::info;

#[async_trait]
pub trait TransferService: Send + Sync {
    async fn start(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    fn is_running(&self) -> bool;
}

/// Used when no transfer backend is configured: start fails, stop is a no-op
#[derive(Debug, Default)]
pub struct DisabledTransfer;

#[async_trait]
impl TransferService for DisabledTransfer {
    async fn start(&self) -> Result<()> {
        Err(Error::TransferError(
            "no file-transfer backend configured".to_string(),
        ))
    }

    async fn stop(&self) -> Result<()> {
        info!("File-transfer service not running");
        Ok(())
    }

    fn is_running(&self) -> bool {
        false
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_transfer() {
        let transfer = DisabledTransfer;
        assert!(matches!(transfer.start().await, Err(Error::TransferError(_))));
        assert!(transfer.stop().await.is_ok());
        assert!(!transfer.is_running());
    }
}
