use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use crate::error::TransportError;

const DISCONNECT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A single OSC argument as carried by the transport.
pub type OscArg = rosc::OscType;

/// Host and port of a console.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

impl ServerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// True when the host is an IP literal or a plausible host name and the
    /// port is non-zero.
    pub fn is_valid(&self) -> bool {
        if self.port == 0 || self.host.is_empty() {
            return false;
        }
        if self.host.parse::<IpAddr>().is_ok() {
            return true;
        }
        // Dotted-quad shaped hosts that failed to parse as IPs are typos, not names.
        if self.host.chars().all(|c| c.is_ascii_digit() || c == '.') {
            return false;
        }
        self.host
            .split('.')
            .all(|label| !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'))
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for ServerAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("Invalid address {:?}, expected host:port", s))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        let port = port
            .parse::<u16>()
            .map_err(|e| format!("Invalid port in {:?}: {}", s, e))?;

        let address = ServerAddress::new(host, port);
        if !address.is_valid() {
            return Err(format!("Invalid address {:?}", s));
        }
        Ok(address)
    }
}

/// An already-framed duplex OSC client connected to one console.
///
/// Inbound messages are delivered by the implementation to the
/// [`Dispatcher`](super::Dispatcher) it was built with.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one addressed message.
    async fn send(&self, address: &str, args: Vec<OscArg>) -> Result<(), TransportError>;

    /// Long-lived receive loop. Runs until the socket closes or the task is
    /// cancelled.
    async fn run(&self) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;

    /// Resolves once the connection is lost. Transports with a close signal
    /// should override the polling default.
    async fn disconnected(&self) {
        while self.is_connected() {
            sleep(DISCONNECT_POLL_INTERVAL).await;
        }
    }

    /// Point the next `run` at a different console.
    fn set_server_address(&self, address: ServerAddress);

    fn server_address(&self) -> ServerAddress;
}

/// The one UI callback used when a console cannot be reached.
#[async_trait]
pub trait AddressPrompt: Send + Sync {
    /// Ask the operator for a replacement address. `None` means give up.
    async fn prompt_for_new_address(&self, current: &ServerAddress) -> Option<ServerAddress>;
}
