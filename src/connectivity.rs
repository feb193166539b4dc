//! Best-effort outbound connectivity check

use std::future::Future;
use std::time::Duration;
use log::{debug, warn};
use tokio::net::TcpStream;

/// Public DNS resolver, reachable from nearly every network
pub const DEFAULT_PROBE_ADDR: &str = "8.8.8.8:53";
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Fast-fail gate consulted before any request is attempted.
/// False positives and negatives are tolerated.
pub trait ConnectivityProbe: Send + Sync
{   fn is_online(&self) -> impl Future<Output = bool> + Send;
}

/// Opens (and immediately drops) a TCP connection
#[derive(Debug, Clone)]
pub struct TcpProbe
{   pub addr: String
  , pub timeout: Duration
}

impl TcpProbe
{   pub fn new(addr: impl Into<String>, timeout: Duration) -> Self
    {   TcpProbe
        {   addr: addr.into()
          , timeout
        }
    }
}

impl Default for TcpProbe
{   fn default() -> Self
    {   TcpProbe::new(DEFAULT_PROBE_ADDR, DEFAULT_PROBE_TIMEOUT)
    }
}

impl ConnectivityProbe for TcpProbe
{   async fn is_online(&self) -> bool
    {   debug!("Probing connectivity via {}", self.addr);
        match tokio::time::timeout(
          self.timeout,
          TcpStream::connect(self.addr.as_str())
        ).await
        {   Ok(Ok(_)) => true
          , Ok(Err(e)) => {
              warn!("Connectivity probe failed: {}", e);
              false
            }
          , Err(_) => {
              warn!("Connectivity probe timed out after {:?}", self.timeout);
              false
            }
        }
    }
}

/// Skips the gate entirely
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

impl ConnectivityProbe for AlwaysOnline
{   async fn is_online(&self) -> bool
    {   true
    }
}
