//! Server configuration and hosting modes.

use asking_core::ValidationRules;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Port the standalone socket server listens on by default.
pub const DEFAULT_PORT: u16 = 3001;

/// How the server is deployed.
///
/// `Standalone` runs next to a separately hosted web app and only
/// accepts browser connections from known origins. `Container` is the
/// combined deployment behind a proxy: any origin, all interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostingMode {
    #[default]
    Standalone,
    Container,
}

/// Which browser origins may open a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginPolicy {
    Any,
    AllowList(Vec<String>),
}

impl OriginPolicy {
    /// Checks an `Origin` header value.
    ///
    /// Requests without an `Origin` header come from non-browser clients
    /// and are always let through.
    pub fn allows(&self, origin: Option<&str>) -> bool {
        match (self, origin) {
            (Self::Any, _) | (_, None) => true,
            (Self::AllowList(allowed), Some(origin)) => {
                let origin = origin.trim_end_matches('/');
                allowed
                    .iter()
                    .any(|a| a.trim_end_matches('/').eq_ignore_ascii_case(origin))
            }
        }
    }
}

impl Default for OriginPolicy {
    fn default() -> Self {
        Self::AllowList(vec!["http://localhost:3000".to_string()])
    }
}

/// Configuration for the sync server.
#[derive(Debug, Clone)]
pub struct SyncServerConfig {
    /// Address to bind the WebSocket listener.
    pub addr: SocketAddr,
    /// Origin check applied during the handshake.
    pub origins: OriginPolicy,
    /// Frames buffered per connection before it counts as too slow.
    pub outbound_capacity: usize,
    /// Pending mutations queued for the control loop.
    pub command_capacity: usize,
    /// Rules applied to create requests.
    pub rules: ValidationRules,
}

impl Default for SyncServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT),
            origins: OriginPolicy::default(),
            outbound_capacity: 256,
            command_capacity: 256,
            rules: ValidationRules::default(),
        }
    }
}

impl SyncServerConfig {
    /// Builds the configuration for a hosting mode.
    ///
    /// `headless` binds every interface even in standalone mode.
    /// `allowed_origins` is only consulted in standalone mode; an empty
    /// list keeps the default allow-list.
    pub fn for_mode(
        mode: HostingMode,
        port: u16,
        headless: bool,
        allowed_origins: Vec<String>,
    ) -> Self {
        let all_interfaces = headless || mode == HostingMode::Container;
        let ip = if all_interfaces {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        } else {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        };

        let origins = match mode {
            HostingMode::Container => OriginPolicy::Any,
            HostingMode::Standalone if allowed_origins.is_empty() => OriginPolicy::default(),
            HostingMode::Standalone => OriginPolicy::AllowList(allowed_origins),
        };

        Self {
            addr: SocketAddr::new(ip, port),
            origins,
            ..Self::default()
        }
    }
}
