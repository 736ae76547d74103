//! Config file parser
//!
//! One directive per line:
//! - blank lines and `#` comments are skipped
//! - `key=value` with case-insensitive keys
//! - a bare IPv4 literal sets the target (first one wins)
//!
//! Bad lines are reported and skipped; they never abort the parse.

use std::net::Ipv4Addr;
use std::time::Duration;

use poselink_core::PoseLinkError;

use crate::SessionConfig;

/// Recognized config keys
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigKey {
    TargetIp,
    SendPort,
    SendInterval,
    ReceivePort,
}

impl ConfigKey {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "target_ip" | "targetip" => Some(ConfigKey::TargetIp),
            "send_port" | "sendport" => Some(ConfigKey::SendPort),
            "send_interval" | "sendinterval" => Some(ConfigKey::SendInterval),
            "receive_port" | "receiveport" => Some(ConfigKey::ReceivePort),
            _ => None,
        }
    }
}

/// Values found in a config file; `None` means "keep the layer below"
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    /// Last valid `target_ip=` entry
    pub keyed_target: Option<Ipv4Addr>,
    /// First valid bare IPv4 line
    pub bare_target: Option<Ipv4Addr>,
    pub send_port: Option<u16>,
    pub send_interval: Option<Duration>,
    pub receive_port: Option<u16>,
}

impl ConfigOverrides {
    /// Effective target: a keyed entry beats any bare line
    pub fn target(&self) -> Option<Ipv4Addr> {
        self.keyed_target.or(self.bare_target)
    }

    pub fn is_empty(&self) -> bool {
        *self == ConfigOverrides::default()
    }

    /// Layer these overrides on top of `base`
    pub fn apply(&self, base: SessionConfig) -> SessionConfig {
        SessionConfig {
            target_address: self.target().unwrap_or(base.target_address),
            send_port: self.send_port.unwrap_or(base.send_port),
            send_interval: self.send_interval.unwrap_or(base.send_interval),
            receive_port: self.receive_port.unwrap_or(base.receive_port),
        }
    }
}

/// Parse result: overrides plus the lines that were skipped
#[derive(Clone, Debug, Default)]
pub struct ParsedConfig {
    pub overrides: ConfigOverrides,
    pub skipped: Vec<PoseLinkError>,
}

/// Parse config file text
pub fn parse_config(text: &str) -> ParsedConfig {
    let mut parsed = ParsedConfig::default();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim().trim_start_matches('\u{feff}');

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Err(reason) = parse_line(line, &mut parsed.overrides) {
            parsed.skipped.push(PoseLinkError::ConfigParse {
                line: line_no,
                reason,
            });
        }
    }

    parsed
}

fn parse_line(line: &str, overrides: &mut ConfigOverrides) -> Result<(), String> {
    let Some((key, value)) = line.split_once('=') else {
        let address: Ipv4Addr = line
            .parse()
            .map_err(|_| format!("not a directive or IPv4 address: {:?}", line))?;
        if overrides.bare_target.is_none() {
            overrides.bare_target = Some(address);
        }
        return Ok(());
    };

    let key = ConfigKey::from_name(key).ok_or_else(|| format!("unknown key {:?}", key.trim()))?;
    let value = value.trim();

    match key {
        ConfigKey::TargetIp => {
            let address = value
                .parse()
                .map_err(|_| format!("invalid IPv4 address {:?}", value))?;
            overrides.keyed_target = Some(address);
        }
        ConfigKey::SendPort => overrides.send_port = Some(parse_port(value)?),
        ConfigKey::ReceivePort => overrides.receive_port = Some(parse_port(value)?),
        ConfigKey::SendInterval => overrides.send_interval = Some(parse_interval(value)?),
    }

    Ok(())
}

/// Port in 1..=65535
pub fn parse_port(value: &str) -> Result<u16, String> {
    let port: u32 = value
        .parse()
        .map_err(|_| format!("invalid port {:?}", value))?;
    match u16::try_from(port) {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(format!("port {} out of range 1-65535", port)),
    }
}

/// Positive interval: plain seconds (`0.033`) or a humantime duration (`33ms`)
pub fn parse_interval(value: &str) -> Result<Duration, String> {
    let interval = match value.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs > 0.0 => Duration::try_from_secs_f64(secs)
            .map_err(|e| format!("interval {:?} out of range: {}", value, e))?,
        Ok(secs) => return Err(format!("interval must be positive, got {}", secs)),
        Err(_) => humantime::parse_duration(value)
            .map_err(|e| format!("invalid interval {:?}: {}", value, e))?,
    };

    if interval.is_zero() {
        return Err("interval must be positive".into());
    }
    Ok(interval)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyed_target_after_bare_line() {
        let parsed = parse_config("192.168.0.5\ntarget_ip=10.0.0.9\n");
        let config = parsed.overrides.apply(SessionConfig::default());
        assert_eq!(config.target_address, Ipv4Addr::new(10, 0, 0, 9));
    }

    #[test]
    fn test_keyed_target_before_bare_line() {
        let parsed = parse_config("target_ip=10.0.0.9\n192.168.0.5\n");
        let config = parsed.overrides.apply(SessionConfig::default());
        assert_eq!(config.target_address, Ipv4Addr::new(10, 0, 0, 9));
    }

    #[test]
    fn test_first_bare_line_wins() {
        let parsed = parse_config("# comment\n\n192.168.0.5\n192.168.0.6\n");
        assert_eq!(parsed.overrides.target(), Some(Ipv4Addr::new(192, 168, 0, 5)));
        assert!(parsed.skipped.is_empty());
    }

    #[test]
    fn test_last_keyed_entry_wins() {
        let parsed = parse_config("send_port=9000\nsend_port=9001\ntarget_ip=10.0.0.1\ntargetip=10.0.0.2");
        assert_eq!(parsed.overrides.send_port, Some(9001));
        assert_eq!(parsed.overrides.target(), Some(Ipv4Addr::new(10, 0, 0, 2)));
    }

    #[test]
    fn test_invalid_port_keeps_default_and_valid_interval_applies() {
        let parsed = parse_config("send_port=99999\nsend_interval=0.05\n");
        let config = parsed.overrides.apply(SessionConfig::default());

        assert_eq!(config.send_port, 17200);
        assert_eq!(config.send_interval, Duration::from_millis(50));
        assert_eq!(parsed.skipped.len(), 1);
        assert!(matches!(parsed.skipped[0], PoseLinkError::ConfigParse { line: 1, .. }));
    }

    #[test]
    fn test_invalid_value_keeps_prior_valid_value() {
        let parsed = parse_config("send_port=9000\nsend_port=0\nsend_port=abc");
        assert_eq!(parsed.overrides.send_port, Some(9000));
        assert_eq!(parsed.skipped.len(), 2);
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let parsed = parse_config("SEND_PORT = 18000\nSendInterval=20ms\nReceivePort=21000");
        assert_eq!(parsed.overrides.send_port, Some(18000));
        assert_eq!(parsed.overrides.send_interval, Some(Duration::from_millis(20)));
        assert_eq!(parsed.overrides.receive_port, Some(21000));
    }

    #[test]
    fn test_interval_rejects_non_positive() {
        assert!(parse_interval("0").is_err());
        assert!(parse_interval("-0.1").is_err());
        assert!(parse_interval("0ms").is_err());
        assert!(parse_interval("soon").is_err());
        assert_eq!(parse_interval("1s"), Ok(Duration::from_secs(1)));
    }

    #[test]
    fn test_oversized_interval_is_skipped() {
        let parsed = parse_config("send_interval=1e30\nsend_port=9000\n");
        assert_eq!(parsed.skipped.len(), 1);
        assert!(matches!(parsed.skipped[0], PoseLinkError::ConfigParse { line: 1, .. }));
        assert_eq!(parsed.overrides.send_interval, None);
        assert_eq!(parsed.overrides.send_port, Some(9000));

        assert!(parse_interval("inf").is_err());
        assert!(parse_interval("NaN").is_err());
    }

    #[test]
    fn test_garbage_lines_are_skipped() {
        let parsed = parse_config("hello\ncolor=blue\n999.1.1.1\nsend_port=9100");
        assert_eq!(parsed.skipped.len(), 3);
        assert_eq!(parsed.overrides.send_port, Some(9100));
        assert_eq!(parsed.overrides.target(), None);
    }

    #[test]
    fn test_empty_file_has_no_overrides() {
        assert!(parse_config("").overrides.is_empty());
    }
}
