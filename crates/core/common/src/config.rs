//! Environment-driven configuration with sensible defaults
//!
//! Every tunable the two binaries share comes from a `VELOX_*` environment
//! variable; unset or unparsable values fall back to the documented default.

use std::env;
use std::net::Ipv4Addr;

/// Read a string configuration value from the environment.
#[must_use]
pub fn env_or(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.is_empty() => v,
        _ => fallback.to_string(),
    }
}

/// Read a parsed configuration value from the environment. Values that fail
/// to parse fall back, they do not abort startup.
#[must_use]
pub fn env_or_parse<T: std::str::FromStr>(var: &str, fallback: T) -> T {
    match env::var(var) {
        Ok(v) => v.parse().unwrap_or(fallback),
        _ => fallback,
    }
}

/// Network endpoints shared by the exchange and every client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetConfig {
    /// Address of the local interface to bind/connect on.
    pub iface: Ipv4Addr,
    /// TCP port the order gateway listens on.
    pub order_gateway_port: u16,
    /// Incremental market data multicast group.
    pub incremental_ip: Ipv4Addr,
    pub incremental_port: u16,
    /// Snapshot market data multicast group.
    pub snapshot_ip: Ipv4Addr,
    pub snapshot_port: u16,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            iface: Ipv4Addr::LOCALHOST,
            order_gateway_port: 9000,
            incremental_ip: Ipv4Addr::new(239, 0, 0, 1),
            incremental_port: 9001,
            snapshot_ip: Ipv4Addr::new(239, 0, 0, 2),
            snapshot_port: 9002,
        }
    }
}

impl NetConfig {
    /// Load from `VELOX_*` environment variables, defaulting per field.
    #[must_use]
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            iface: env_or_parse("VELOX_IFACE", d.iface),
            order_gateway_port: env_or_parse("VELOX_ORDER_GATEWAY_PORT", d.order_gateway_port),
            incremental_ip: env_or_parse("VELOX_MARKET_DATA_INCREMENTAL_IP", d.incremental_ip),
            incremental_port: env_or_parse(
                "VELOX_MARKET_DATA_INCREMENTAL_PORT",
                d.incremental_port,
            ),
            snapshot_ip: env_or_parse("VELOX_MARKET_DATA_SNAPSHOT_IP", d.snapshot_ip),
            snapshot_port: env_or_parse("VELOX_MARKET_DATA_SNAPSHOT_PORT", d.snapshot_port),
        }
    }
}

/// Optional log file destination (`VELOX_LOG`); empty means stderr.
#[must_use]
pub fn log_path() -> Option<String> {
    match env::var("VELOX_LOG") {
        Ok(v) if !v.is_empty() => Some(v),
        _ => None,
    }
}
