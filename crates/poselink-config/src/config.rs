//! Effective session configuration

use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

/// Default telemetry target
pub const DEFAULT_TARGET_ADDRESS: Ipv4Addr = Ipv4Addr::LOCALHOST;

/// Default pose send port
pub const DEFAULT_SEND_PORT: u16 = 17200;

/// Default pose receive port
pub const DEFAULT_RECEIVE_PORT: u16 = 20001;

/// Default send cadence (~30 Hz)
pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_millis(33);

/// Fully populated session configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Where pose updates are sent
    pub target_address: Ipv4Addr,
    /// Destination port for pose updates and the self-announce broadcast
    pub send_port: u16,
    /// Minimum time between two pose updates
    pub send_interval: Duration,
    /// Local port pose receivers listen on
    pub receive_port: u16,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            target_address: DEFAULT_TARGET_ADDRESS,
            send_port: DEFAULT_SEND_PORT,
            send_interval: DEFAULT_SEND_INTERVAL,
            receive_port: DEFAULT_RECEIVE_PORT,
        }
    }
}

impl SessionConfig {
    /// Endpoint pose updates are sent to
    pub fn target(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.target_address, self.send_port)
    }

    pub fn with_target(mut self, address: Ipv4Addr) -> Self {
        self.target_address = address;
        self
    }

    pub fn with_send_port(mut self, port: u16) -> Self {
        self.send_port = port;
        self
    }

    pub fn with_send_interval(mut self, interval: Duration) -> Self {
        self.send_interval = interval;
        self
    }

    pub fn with_receive_port(mut self, port: u16) -> Self {
        self.receive_port = port;
        self
    }
}

/// Anything that can produce an effective configuration on demand
pub trait ConfigSource: Send + Sync {
    fn resolve(&self) -> SessionConfig;
}

/// Config source that always yields the same value
#[derive(Clone, Debug, Default)]
pub struct FixedConfig(pub SessionConfig);

impl ConfigSource for FixedConfig {
    fn resolve(&self) -> SessionConfig {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();

        assert_eq!(config.target(), SocketAddrV4::new(Ipv4Addr::LOCALHOST, 17200));
        assert_eq!(config.send_interval, Duration::from_millis(33));
        assert_eq!(config.receive_port, 20001);
    }

    #[test]
    fn test_fixed_source() {
        let config = SessionConfig::default().with_send_port(9000);
        let source = FixedConfig(config.clone());
        assert_eq!(source.resolve(), config);
    }
}
