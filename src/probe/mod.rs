//! Liveness probing
//!
//! An endpoint counts as reachable when a TCP connection to its game port
//! completes within the probe timeout. Failures of any kind (refused, timed
//! out, unresolvable host) simply mean "unreachable".

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;

use crate::models::Endpoint;

/// Default bound on a single connection attempt
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Reachability check for an endpoint
#[async_trait]
pub trait Prober: Send + Sync {
    /// Return `true` iff the endpoint answered within `timeout`
    async fn probe(&self, endpoint: &Endpoint, timeout: Duration) -> bool;
}

/// Probes endpoints with a plain TCP connect
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProber;

impl TcpProber {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, endpoint: &Endpoint, timeout: Duration) -> bool {
        let target = (endpoint.ip.as_str(), endpoint.port);

        match tokio::time::timeout(timeout, TcpStream::connect(target)).await {
            // The stream is dropped here, closing the connection
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                tracing::debug!(
                    endpoint = %endpoint.name,
                    address = %endpoint.address(),
                    error = %e,
                    "Liveness probe failed"
                );
                false
            }
            Err(_) => {
                tracing::debug!(
                    endpoint = %endpoint.name,
                    address = %endpoint.address(),
                    timeout_ms = timeout.as_millis() as u64,
                    "Liveness probe timed out"
                );
                false
            }
        }
    }
}
