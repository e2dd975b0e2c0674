//! Remote encode server addresses.

use std::fmt;

use crate::{Error, Result};

/// A remote encode server: host name or address plus port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerDescriptor {
    /// Host name or IP address (without brackets for IPv6)
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl ServerDescriptor {
    /// Creates a descriptor.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parses `host`, `host:port`, `[v6]` or `[v6]:port`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use dcpenc_core::ServerDescriptor;
    ///
    /// let s = ServerDescriptor::parse("render3:7000", 6192).unwrap();
    /// assert_eq!(s.port, 7000);
    /// let s = ServerDescriptor::parse("[::1]", 6192).unwrap();
    /// assert_eq!((s.host.as_str(), s.port), ("::1", 6192));
    /// ```
    pub fn parse(s: &str, default_port: u16) -> Result<Self> {
        let s = s.trim();
        let bad = || Error::invalid_parameter(format!("bad server address '{s}'"));

        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(bad)?;
            match tail {
                "" => (host, None),
                _ => (host, Some(tail.strip_prefix(':').ok_or_else(bad)?)),
            }
        } else if s.matches(':').count() == 1 {
            let (host, port) = s.split_once(':').ok_or_else(bad)?;
            (host, Some(port))
        } else {
            (s, None)
        };

        if host.is_empty() {
            return Err(bad());
        }
        let port = match port {
            Some(p) => p.parse::<u16>().ok().filter(|p| *p != 0).ok_or_else(bad)?,
            None => default_port,
        };
        Ok(Self::new(host, port))
    }
}

impl fmt::Display for ServerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
