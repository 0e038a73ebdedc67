//! Probe implementations.
//!
//! A prober answers one question: did this address respond to a single
//! round-trip check within the timeout? Every failure mode is folded into a
//! non-reachable [`ProbeResult`]; nothing is ever returned as an error.

use crate::types::ProbeResult;
use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Extra time granted to the ping child on top of its own deadline.
const PING_GRACE: Duration = Duration::from_millis(500);

/// Prober trait
#[async_trait]
pub trait Prober: Send + Sync {
    /// Perform one probe against `address`
    async fn check(&self, address: &str) -> ProbeResult;

    /// Get the name of this prober
    fn name(&self) -> &str;

    /// Perform one probe and report only whether the target answered
    async fn probe(&self, address: &str) -> bool {
        self.check(address).await.is_up()
    }
}

/// Reject inputs that must never reach a socket or a command line.
fn validate_address(address: &str) -> Result<&str, ProbeResult> {
    let address = address.trim();
    if address.is_empty() {
        return Err(ProbeResult::unreachable(Duration::ZERO, "Empty address"));
    }
    if address.starts_with('-') || address.chars().any(char::is_whitespace) {
        return Err(ProbeResult::error(
            Duration::ZERO,
            format!("Invalid address: {address}"),
        ));
    }
    Ok(address)
}

/// ICMP echo prober backed by the system `ping` binary
pub struct IcmpProber {
    command: String,
    timeout_duration: Duration,
}

impl IcmpProber {
    /// Create a new ICMP prober using `ping` from PATH
    pub fn new(timeout_duration: Duration) -> Self {
        Self::with_command("ping", timeout_duration)
    }

    /// Create a new ICMP prober running the given ping command
    pub fn with_command(command: impl Into<String>, timeout_duration: Duration) -> Self {
        Self {
            command: command.into(),
            timeout_duration,
        }
    }

    fn wait_seconds(&self) -> u64 {
        self.timeout_duration.as_secs().max(1)
    }
}

#[async_trait]
impl Prober for IcmpProber {
    async fn check(&self, address: &str) -> ProbeResult {
        let address = match validate_address(address) {
            Ok(address) => address,
            Err(result) => return result,
        };

        let start = Instant::now();
        let mut command = Command::new(&self.command);
        command
            .arg("-c")
            .arg("1")
            .arg("-W")
            .arg(self.wait_seconds().to_string())
            .arg(address)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let deadline = Duration::from_secs(self.wait_seconds()) + PING_GRACE;
        match timeout(deadline, command.status()).await {
            Ok(Ok(status)) if status.success() => {
                let duration = start.elapsed();
                debug!(address, duration_ms = duration.as_millis(), "ICMP probe successful");
                ProbeResult::reachable(duration)
            }
            Ok(Ok(status)) => {
                let duration = start.elapsed();
                debug!(address, %status, "ICMP probe got no reply");
                ProbeResult::unreachable(duration, format!("ping exited with {status}"))
            }
            Ok(Err(e)) => {
                let duration = start.elapsed();
                warn!(address, command = %self.command, error = %e, "ICMP probe could not run");
                ProbeResult::error(duration, format!("Failed to run {}: {}", self.command, e))
            }
            Err(_) => {
                let duration = start.elapsed();
                debug!(address, "ICMP probe timed out");
                ProbeResult::timeout(duration)
            }
        }
    }

    fn name(&self) -> &str {
        "icmp"
    }
}

/// TCP connect prober
///
/// Addresses carrying an explicit port (`10.0.0.1:443`, `[::1]:22`) are used
/// as is; bare hosts are paired with the default port.
pub struct TcpProber {
    default_port: u16,
    timeout_duration: Duration,
}

impl TcpProber {
    /// Create a new TCP prober
    pub fn new(default_port: u16, timeout_duration: Duration) -> Self {
        Self {
            default_port,
            timeout_duration,
        }
    }

    fn target(&self, address: &str) -> String {
        if address.parse::<SocketAddr>().is_ok() {
            return address.to_string();
        }
        match address.parse::<IpAddr>() {
            Ok(ip) => SocketAddr::new(ip, self.default_port).to_string(),
            Err(_) if address.contains(':') => address.to_string(),
            Err(_) => format!("{}:{}", address, self.default_port),
        }
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn check(&self, address: &str) -> ProbeResult {
        let address = match validate_address(address) {
            Ok(address) => address,
            Err(result) => return result,
        };

        let target = self.target(address);
        let start = Instant::now();

        match timeout(self.timeout_duration, TcpStream::connect(target.as_str())).await {
            Ok(Ok(_stream)) => {
                let duration = start.elapsed();
                debug!(target = %target, duration_ms = duration.as_millis(), "TCP probe successful");
                ProbeResult::reachable(duration)
            }
            Ok(Err(e)) => {
                let duration = start.elapsed();
                debug!(target = %target, error = %e, "TCP probe failed");
                ProbeResult::unreachable(duration, format!("Connection failed: {}", e))
            }
            Err(_) => {
                let duration = start.elapsed();
                debug!(target = %target, "TCP probe timed out");
                ProbeResult::timeout(duration)
            }
        }
    }

    fn name(&self) -> &str {
        "tcp"
    }
}
