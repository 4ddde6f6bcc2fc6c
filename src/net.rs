//! Connectivity probe

use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, warn};

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// TCP connect to `probe` (host:port). No probe means assume online.
pub async fn is_online(probe: Option<&str>) -> bool {
    let Some(addr) = probe else {
        return true;
    };

    match tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect(addr)).await {
        Ok(Ok(_)) => {
            debug!("🌐 Connectivity probe to {} ok", addr);
            true
        }
        Ok(Err(e)) => {
            warn!("📴 Connectivity probe to {} failed: {}", addr, e);
            false
        }
        Err(_) => {
            warn!("📴 Connectivity probe to {} timed out", addr);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_probe_is_online() {
        assert!(is_online(None).await);
    }

    #[tokio::test]
    async fn test_local_listener_is_reachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        assert!(is_online(Some(&addr)).await);
    }

    #[tokio::test]
    async fn test_closed_port_is_offline() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);
        assert!(!is_online(Some(&addr)).await);
    }
}
