use std::collections::HashSet;
use std::fmt;
use std::net::TcpListener;

use tracing::{debug, info};

use crate::config::model::PortsConfig;

/// The five roles a port plays for one server instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortCategory {
    Main,
    Server,
    Debug,
    Connector,
    Redirect,
}

impl PortCategory {
    /// Allocation order. Each category sees every port picked before it.
    pub const ALL: [PortCategory; 5] = [
        PortCategory::Main,
        PortCategory::Server,
        PortCategory::Debug,
        PortCategory::Connector,
        PortCategory::Redirect,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PortCategory::Main => "main",
            PortCategory::Server => "server",
            PortCategory::Debug => "debug",
            PortCategory::Connector => "connector",
            PortCategory::Redirect => "redirect",
        }
    }

    /// Substitution key for this port, e.g. `main_port`.
    pub fn key(&self) -> String {
        format!("{}_port", self.as_str())
    }

    /// Placeholder token that carries this port into templates.
    pub fn token(&self) -> String {
        crate::templates::token(&self.key())
    }

    fn start(&self, ranges: &PortsConfig) -> u16 {
        match self {
            PortCategory::Main => ranges.main,
            PortCategory::Server => ranges.server,
            PortCategory::Debug => ranges.debug,
            PortCategory::Connector => ranges.connector,
            PortCategory::Redirect => ranges.redirect,
        }
    }
}

impl fmt::Display for PortCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("no free {category} port in {start}..={end}; free some ports or raise ports.scan_limit")]
    Exhausted {
        category: PortCategory,
        start: u16,
        end: u16,
    },
}

/// One instance's allocated ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSet {
    pub main: u16,
    pub server: u16,
    pub debug: u16,
    pub connector: u16,
    pub redirect: u16,
}

impl PortSet {
    pub fn get(&self, category: PortCategory) -> u16 {
        match category {
            PortCategory::Main => self.main,
            PortCategory::Server => self.server,
            PortCategory::Debug => self.debug,
            PortCategory::Connector => self.connector,
            PortCategory::Redirect => self.redirect,
        }
    }

    pub fn iter(&self) -> std::array::IntoIter<(PortCategory, u16), 5> {
        (*self).into_iter()
    }
}

impl IntoIterator for PortSet {
    type Item = (PortCategory, u16);
    type IntoIter = std::array::IntoIter<(PortCategory, u16), 5>;

    fn into_iter(self) -> Self::IntoIter {
        PortCategory::ALL.map(|c| (c, self.get(c))).into_iter()
    }
}

/// Check whether `port` can be bound on `host` right now. The listener is
/// dropped before returning.
pub fn check_port_available(host: &str, port: u16) -> bool {
    TcpListener::bind((host, port)).is_ok()
}

/// Find the lowest port at or above `start` that is neither in `used` nor
/// bound by any process. At most `limit` candidates are considered.
pub fn allocate(
    category: PortCategory,
    used: &HashSet<u16>,
    start: u16,
    limit: u16,
    host: &str,
) -> Result<u16, PortError> {
    let end = start.saturating_add(limit.saturating_sub(1));
    for port in start..=end {
        if used.contains(&port) {
            continue;
        }
        if check_port_available(host, port) {
            debug!(%category, port, "found free port");
            return Ok(port);
        }
        debug!(
            %category,
            port,
            owner = crate::platform::identify_port_owner(port).as_deref().unwrap_or("unknown"),
            "port not available"
        );
    }
    Err(PortError::Exhausted {
        category,
        start,
        end,
    })
}

/// Allocate all five categories for a new instance.
///
/// `used` holds every port of every registered instance regardless of
/// category; each pick is added to it before the next scan, so the result is
/// pairwise distinct and disjoint from `used`.
pub fn allocate_set(
    used: &HashSet<u16>,
    ranges: &PortsConfig,
    host: &str,
) -> Result<PortSet, PortError> {
    let mut claimed = used.clone();
    let mut picked = [0u16; 5];
    for (slot, category) in PortCategory::ALL.iter().enumerate() {
        let port = allocate(
            *category,
            &claimed,
            category.start(ranges),
            ranges.scan_limit,
            host,
        )?;
        claimed.insert(port);
        picked[slot] = port;
    }
    let [main, server, debug, connector, redirect] = picked;
    let set = PortSet {
        main,
        server,
        debug,
        connector,
        redirect,
    };
    info!(
        main = set.main,
        server = set.server,
        debug = set.debug,
        connector = set.connector,
        redirect = set.redirect,
        "ports allocated"
    );
    Ok(set)
}
