//! Tunnel liveness
//!
//! The tunnel proxy itself lives outside this crate. A run only attaches
//! the tunnel's connection info to every payload and watches whether the
//! keepalive is still running once polling is over.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use synthetics_protocol::TunnelInfo;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TunnelError {
    #[error("tunnel connection lost: {0}")]
    ConnectionLost(String),
}

/// An established tunnel
#[async_trait]
pub trait Tunnel: Send + Sync {
    /// Connection info sent to the backend with each test
    fn info(&self) -> TunnelInfo;

    /// Runs for as long as the tunnel is up
    async fn keep_alive(&self) -> Result<(), TunnelError>;
}

/// Background keepalive of a tunnel.
///
/// The task is the only writer of the connected flag; readers only look
/// at it after polling.
pub struct TunnelMonitor {
    connected: Arc<AtomicBool>,
    info: TunnelInfo,
    handle: JoinHandle<()>,
}

impl TunnelMonitor {
    /// Start the keepalive task. Must be called from a tokio runtime.
    pub fn spawn(tunnel: Arc<dyn Tunnel>) -> Self {
        let connected = Arc::new(AtomicBool::new(true));
        let info = tunnel.info();
        let flag = connected.clone();

        let handle = tokio::spawn(async move {
            match tunnel.keep_alive().await {
                Ok(()) => debug!("tunnel closed"),
                Err(e) => warn!(error = %e, "tunnel keepalive failed"),
            }
            flag.store(false, Ordering::SeqCst);
        });

        Self { connected, info, handle }
    }

    pub fn info(&self) -> &TunnelInfo {
        &self.info
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl Drop for TunnelMonitor {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl std::fmt::Debug for TunnelMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunnelMonitor")
            .field("tunnel_id", &self.info.id)
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct StubTunnel {
        lifetime: Option<Duration>,
    }

    #[async_trait]
    impl Tunnel for StubTunnel {
        fn info(&self) -> TunnelInfo {
            TunnelInfo {
                host: "tunnel.example.org".to_string(),
                id: "tunnel-1".to_string(),
                private_key: "key".to_string(),
            }
        }

        async fn keep_alive(&self) -> Result<(), TunnelError> {
            match self.lifetime {
                Some(lifetime) => {
                    tokio::time::sleep(lifetime).await;
                    Err(TunnelError::ConnectionLost("heartbeat timeout".to_string()))
                }
                None => std::future::pending().await,
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stays_connected() {
        let monitor = TunnelMonitor::spawn(Arc::new(StubTunnel { lifetime: None }));
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert!(monitor.is_connected());
        assert_eq!(monitor.info().id, "tunnel-1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_flag_flips_on_failure() {
        let monitor = TunnelMonitor::spawn(Arc::new(StubTunnel {
            lifetime: Some(Duration::from_secs(10)),
        }));
        assert!(monitor.is_connected());

        tokio::time::sleep(Duration::from_secs(11)).await;
        tokio::task::yield_now().await;

        assert!(!monitor.is_connected());
    }
}
