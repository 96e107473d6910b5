use serde::{Deserialize, Serialize};

use std::time::Duration;

pub const DEFAULT_PORT_RANGE_START: u16 = 8000;
pub const DEFAULT_PORT_RANGE_END: u16 = 9000;

/// Upper bound for the startup connectivity check against the destination.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub enum ConfigError {
    MissingArgument(String),
    ConfigFileError((String, String)),
    WrongArgument(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ConfigError::MissingArgument(s) => {
                write!(f, "Argument required but not given: {s}")
            },
            ConfigError::ConfigFileError(s) => {
                write!(f, "Error when reading file \"{}\": {}", s.1, s.0)
            },
            ConfigError::WrongArgument(s) => {
                write!(f, "Wrong Argument: {s}")
            },
        }
    }
}

impl std::error::Error for ConfigError {}

///
/// Configuration for a [`crate::forwarder::Forwarder`].
///
/// Every field is optional so the same struct can be read partially from a
/// TOML file, overridden from the command line and then completed with
/// [`ForwarderConfig::fill_defaults`]. `dest_addr` is the only field without
/// a default; [`ForwarderConfig::validate`] rejects a config that misses it.
///
#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ForwarderConfig {
    pub listen_addr: Option<String>,
    pub dest_addr: Option<String>,
    pub port_range_start: Option<u16>,
    pub port_range_end: Option<u16>,
    pub enable_graceful_shutdown: Option<bool>,
}

impl ForwarderConfig {
    /// Fills every unset field except `listen_addr` and `dest_addr` with its
    /// default value.
    pub fn fill_defaults(&mut self) {
        if self.port_range_start.is_none() {
            self.port_range_start = Some(DEFAULT_PORT_RANGE_START);
        }

        if self.port_range_end.is_none() {
            self.port_range_end = Some(DEFAULT_PORT_RANGE_END);
        }

        if self.enable_graceful_shutdown.is_none() {
            self.enable_graceful_shutdown = Some(true);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dest_addr.is_none() {
            return Err(ConfigError::MissingArgument("dest_addr".to_owned()));
        }

        if let (Some(start), Some(end)) = (self.port_range_start, self.port_range_end) {
            if start > end {
                return Err(ConfigError::WrongArgument(format!(
                    "port_range_start ({start}) must not be larger than port_range_end ({end})"
                )));
            }
        }

        Ok(())
    }
}

impl std::fmt::Display for ForwarderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "\
            listen_addr              = {:?}\n\
            dest_addr                = {:?}\n\
            port_range_start         = {:?}\n\
            port_range_end           = {:?}\n\
            enable_graceful_shutdown = {:?}\n\
            ",
            self.listen_addr,
            self.dest_addr,
            self.port_range_start,
            self.port_range_end,
            self.enable_graceful_shutdown,
        )
    }
}
