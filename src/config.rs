//! Collector and daemon configuration.
//!
//! [`AppConfig::load`] layers the embedded defaults, an optional TOML file and
//! `CISCO_SYSLOG__*` environment variables, in that order. The collector only
//! ever sees a [`CollectorConfig`], which can just as well be built in code.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

use crate::message::MessageType;

// ---------------------------------------------------------------------------
// Embedded defaults
// ---------------------------------------------------------------------------

const DEFAULT_CONFIG: &str = r#"
log_level = "info"

[collector]
port                    = 514
ipv4                    = "0.0.0.0"
ipv6                    = "::"
max_datagram_size       = 8192
recv_buffer_size        = 262144
max_in_flight           = 1024
resolver_cache_capacity = 4096

[[watch]]
facility = "SYS"
mnemonic = "CONFIG_I"
"#;

const ENV_PREFIX: &str = "CISCO_SYSLOG";

/// Standard syslog port (privileged).
const DEFAULT_PORT: u16 = 514;

/// Largest datagram we read; anything longer is truncated by the socket.
const DEFAULT_MAX_DATAGRAM_SIZE: usize = 8192;

const DEFAULT_RECV_BUFFER_SIZE: usize = 256 * 1024;

const DEFAULT_MAX_IN_FLIGHT: usize = 1024;

const DEFAULT_RESOLVER_CACHE_CAPACITY: usize = 4096;

// ---------------------------------------------------------------------------
// Collector
// ---------------------------------------------------------------------------

/// Everything the collector needs to bind its sockets and dispatch datagrams.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CollectorConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    /// IPv4 listen address, `None` (or `"off"` in a file) to skip IPv4.
    #[serde(default = "default_ipv4", deserialize_with = "address_or_off")]
    pub ipv4: Option<Ipv4Addr>,

    /// IPv6 listen address, `None` (or `"off"` in a file) to skip IPv6.
    #[serde(default = "default_ipv6", deserialize_with = "address_or_off")]
    pub ipv6: Option<Ipv6Addr>,

    #[serde(default = "default_max_datagram_size")]
    pub max_datagram_size: usize,

    /// Requested SO_RCVBUF. The kernel may grant less.
    #[serde(default = "default_recv_buffer_size")]
    pub recv_buffer_size: usize,

    /// Datagrams being decoded and dispatched at once, across both families.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Per-family capacity of the local address cache.
    #[serde(default = "default_resolver_cache_capacity")]
    pub resolver_cache_capacity: usize,

    /// Overrides the host name reported in records.
    #[serde(default)]
    pub host_name: Option<String>,

    /// Appended to the host name when it is not already qualified. Left
    /// unset, the system's DNS domain is used; an empty string turns
    /// qualification off.
    #[serde(default)]
    pub domain_name: Option<String>,
}

fn default_port() -> u16 { DEFAULT_PORT }
fn default_ipv4() -> Option<Ipv4Addr> { Some(Ipv4Addr::UNSPECIFIED) }
fn default_ipv6() -> Option<Ipv6Addr> { Some(Ipv6Addr::UNSPECIFIED) }
fn default_max_datagram_size() -> usize { DEFAULT_MAX_DATAGRAM_SIZE }
fn default_recv_buffer_size() -> usize { DEFAULT_RECV_BUFFER_SIZE }
fn default_max_in_flight() -> usize { DEFAULT_MAX_IN_FLIGHT }
fn default_resolver_cache_capacity() -> usize { DEFAULT_RESOLVER_CACHE_CAPACITY }

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            ipv4: default_ipv4(),
            ipv6: default_ipv6(),
            max_datagram_size: default_max_datagram_size(),
            recv_buffer_size: default_recv_buffer_size(),
            max_in_flight: default_max_in_flight(),
            resolver_cache_capacity: default_resolver_cache_capacity(),
            host_name: None,
            domain_name: None,
        }
    }
}

impl CollectorConfig {
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// IPv4 loopback only, on an ephemeral port.
    pub fn loopback() -> Self {
        Self {
            port: 0,
            ipv4: Some(Ipv4Addr::LOCALHOST),
            ipv6: None,
            ..Default::default()
        }
    }

    pub fn v4_bind_address(&self) -> Option<SocketAddr> {
        self.ipv4.map(|ip| SocketAddr::new(ip.into(), self.port))
    }

    pub fn v6_bind_address(&self) -> Option<SocketAddr> {
        self.ipv6.map(|ip| SocketAddr::new(ip.into(), self.port))
    }

    /// The host name to stamp on records: the configured one, or the
    /// system's, qualified with `domain_name` (or the system's DNS domain)
    /// when it has no dot yet.
    pub fn receiver_host_name(&self) -> String {
        let host = self
            .host_name
            .clone()
            .or_else(|| hostname::get().ok().and_then(|h| h.into_string().ok()))
            .unwrap_or_else(|| "localhost".to_string());

        match &self.domain_name {
            Some(domain) => qualify(host, domain),
            None => match system_domain_name() {
                Some(domain) => qualify(host, &domain),
                None => host,
            },
        }
    }
}

fn qualify(host: String, domain: &str) -> String {
    let domain = domain.trim_start_matches('.');
    if domain.is_empty() || host.contains('.') {
        host
    } else {
        format!("{host}.{domain}")
    }
}

const RESOLV_CONF: &str = "/etc/resolv.conf";

/// The resolver's DNS domain, if one is configured.
fn system_domain_name() -> Option<String> {
    std::fs::read_to_string(RESOLV_CONF)
        .ok()
        .and_then(|text| domain_from_resolv_conf(&text))
}

/// `domain` wins over the first `search` entry, like the resolver itself.
fn domain_from_resolv_conf(text: &str) -> Option<String> {
    let mut search = None;

    for line in text.lines() {
        let mut words = line.split_whitespace();
        match words.next() {
            Some("domain") => {
                if let Some(domain) = words.next() {
                    return Some(domain.trim_end_matches('.').to_string());
                }
            }
            Some("search") if search.is_none() => {
                search = words.next().map(|d| d.trim_end_matches('.').to_string());
            }
            _ => {}
        }
    }

    search.filter(|d| !d.is_empty())
}

fn address_or_off<'de, D, A>(deserializer: D) -> Result<Option<A>, D::Error>
where
    D: Deserializer<'de>,
    A: FromStr,
    A::Err: std::fmt::Display,
{
    let text = Option::<String>::deserialize(deserializer)?;
    match text.as_deref().map(str::trim) {
        None | Some("") | Some("off") | Some("none") => Ok(None),
        Some(addr) => addr.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

// ---------------------------------------------------------------------------
// Daemon
// ---------------------------------------------------------------------------

/// A facility/mnemonic pair that triggers a notification when seen.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WatchRule {
    pub facility: String,
    pub mnemonic: String,
}

impl WatchRule {
    pub fn matches(&self, message_type: &MessageType) -> bool {
        message_type.is(&self.facility, &self.mnemonic)
    }
}

/// Top-level configuration of the `cisco-syslogd` daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub watch: Vec<WatchRule>,
}

fn default_log_level() -> String { "info".to_string() }

impl AppConfig {
    /// Defaults, then `path` if given (it must exist), then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml));

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Defaults overlaid with `toml`, without looking at files or the
    /// environment.
    pub fn from_toml(toml: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    pub fn defaults() -> Result<Self, config::ConfigError> {
        Self::from_toml("")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
