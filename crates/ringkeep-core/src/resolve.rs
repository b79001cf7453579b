//! Local host resolution.
//!
//! The daemon resolves its configured hostname exactly once at startup.
//! A name that does not resolve is fatal; restarting is the supervisor's job.

use std::io;
use std::net::ToSocketAddrs;

use tracing::debug;

use crate::error::ResolveError;
use crate::types::HostAddress;

impl HostAddress {
    /// Resolve `hostname` through the system resolver and build the address.
    ///
    /// The configured hostname is kept as-is: it is the name the topology
    /// and coordinator know this host by.
    pub fn resolve(hostname: &str, port: u16) -> Result<Self, ResolveError> {
        let lookup = format!("{hostname}:{port}");
        let mut addrs = lookup
            .to_socket_addrs()
            .map_err(|source| ResolveError::HostResolution {
                hostname: hostname.to_string(),
                source,
            })?;

        let first = addrs.next().ok_or_else(|| ResolveError::HostResolution {
            hostname: hostname.to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "no addresses returned"),
        })?;

        debug!(%hostname, port, resolved = %first.ip(), "host resolved");
        Ok(HostAddress::new(hostname, port))
    }
}
