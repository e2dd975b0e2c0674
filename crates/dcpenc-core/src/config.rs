//! Encoder configuration.
//!
//! Values here are read when a [`FrameJob`](crate::FrameJob) is built and
//! become immutable fields of that job; changing the configuration never
//! affects jobs already constructed.
//!
//! # File format
//!
//! ```yaml
//! server_port: 6192
//! colour_lut_index: 0
//! j2k_bandwidth: 250000000
//! socket_timeout_secs: 30
//! num_local_encoding_threads: 8
//! servers:
//!   - render1
//!   - render2:6200
//! ```
//!
//! Every key is optional; missing keys take the defaults shown by
//! [`Config::default`].

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{ColourLut, Error, Result, ServerDescriptor};

/// Port the encode server listens on by default.
pub const DEFAULT_SERVER_PORT: u16 = 6192;

/// Default J2K bandwidth in bits per second.
pub const DEFAULT_J2K_BANDWIDTH: u64 = 250_000_000;

/// Default per-operation socket timeout in seconds.
pub const DEFAULT_SOCKET_TIMEOUT_SECS: u64 = 30;

/// Encoder settings shared by the CLI, the client and the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// TCP port of encode servers
    pub server_port: u16,
    /// Default colour LUT (see [`ColourLut::index`])
    pub colour_lut_index: usize,
    /// Default bandwidth target in bits per second
    pub j2k_bandwidth: u64,
    /// Timeout applied to every socket operation
    pub socket_timeout_secs: u64,
    /// Worker threads for local encoding
    pub num_local_encoding_threads: usize,
    /// Remote encode servers as `host` or `host:port`
    pub servers: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: DEFAULT_SERVER_PORT,
            colour_lut_index: ColourLut::default().index(),
            j2k_bandwidth: DEFAULT_J2K_BANDWIDTH,
            socket_timeout_secs: DEFAULT_SOCKET_TIMEOUT_SECS,
            num_local_encoding_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            servers: Vec::new(),
        }
    }
}

impl Config {
    /// Loads and validates a YAML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&text)?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parses and validates YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)
            .map_err(|e| Error::invalid_parameter(format!("configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes to YAML.
    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| Error::invalid_parameter(format!("configuration: {e}")))
    }

    /// Checks value ranges and server addresses.
    pub fn validate(&self) -> Result<()> {
        if self.server_port == 0 {
            return Err(Error::invalid_parameter("server_port must be non-zero"));
        }
        if self.j2k_bandwidth == 0 {
            return Err(Error::invalid_parameter("j2k_bandwidth must be positive"));
        }
        if self.socket_timeout_secs == 0 {
            return Err(Error::invalid_parameter("socket_timeout_secs must be positive"));
        }
        if self.num_local_encoding_threads == 0 {
            return Err(Error::invalid_parameter("num_local_encoding_threads must be positive"));
        }
        self.colour_lut()?;
        self.server_descriptors()?;
        Ok(())
    }

    /// Default colour LUT.
    pub fn colour_lut(&self) -> Result<ColourLut> {
        ColourLut::from_index(self.colour_lut_index)
    }

    /// Socket timeout as a [`Duration`].
    pub fn socket_timeout(&self) -> Duration {
        Duration::from_secs(self.socket_timeout_secs)
    }

    /// Parsed server list, defaulting ports to [`Config::server_port`].
    pub fn server_descriptors(&self) -> Result<Vec<ServerDescriptor>> {
        self.servers
            .iter()
            .map(|s| ServerDescriptor::parse(s, self.server_port))
            .collect()
    }
}
