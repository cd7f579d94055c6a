//! Configuration structure

use std::net::{IpAddr, Ipv4Addr};
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use human_repr::HumanCount as _;
use serde::{Deserialize, Serialize};

use crate::util::{io::timeout_from_secs, TimeFormat};

/// The set of configurable options supported by ftclient.
///
/// ### Configuration files
///
/// Files are TOML. Field names are as below (snake case); any field may be omitted.
///
/// [More details about the configuration mechanism](crate::config).
///
/// ### Command line
///
/// All configurable options may be used on the command line, in kebab-case.
/// See [`ConfigurationOverrides`].
///
/// ### Developer notes
/// There is no `default()`.
/// You can access the hard-wired configuration defaults through [`Configuration::system_default()`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Configuration {
    /// Timeout for connecting, accepting the data connection, and every individual read, in seconds.
    /// 0 waits forever.
    pub timeout: u64,

    /// Size of the chunks in which file data is copied off the wire, in bytes
    pub chunk_size: usize,

    /// The largest listing Message we will accept, in bytes.
    /// Anything bigger is treated as a protocol error before any of it is read.
    pub max_message_size: u64,

    /// Check the server's reply tokens against the command we sent.
    ///
    /// When off, the client follows whatever the server echoes back (except where that
    /// cannot work, such as a `GET_REPLY` to a `LIST`).
    pub strict_replies: bool,

    /// The local address the data channel listener binds to
    pub bind_address: IpAddr,

    /// The format for log message timestamps
    pub time_format: TimeFormat,
}

/// Upper bound on `chunk_size`; the receive buffer is allocated at this size
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

static SYSTEM_DEFAULT_CONFIG: LazyLock<Configuration> = LazyLock::new(|| Configuration {
    timeout: 30,
    chunk_size: 1024,
    max_message_size: 16 * 1024 * 1024,
    strict_replies: false,
    bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
    time_format: TimeFormat::Local,
});

impl Configuration {
    /// Hard-wired configuration
    #[must_use]
    pub fn system_default() -> &'static Self {
        &SYSTEM_DEFAULT_CONFIG
    }

    /// The names of all the fields, in display order
    pub const FIELD_NAMES: [&'static str; 6] = [
        "timeout",
        "chunk_size",
        "max_message_size",
        "strict_replies",
        "bind_address",
        "time_format",
    ];

    /// The network timeout as a [`Duration`], or `None` if disabled
    #[must_use]
    pub fn timeout_duration(&self) -> Option<Duration> {
        timeout_from_secs(self.timeout)
    }

    /// Renders a field's value for humans
    pub(crate) fn field_value(&self, field: &str) -> Option<String> {
        Some(match field {
            "timeout" => match self.timeout {
                0 => "0 (disabled)".into(),
                t => format!("{t}s"),
            },
            "chunk_size" => self.chunk_size.to_string(),
            "max_message_size" => format!(
                "{} ({})",
                self.max_message_size,
                self.max_message_size.human_count_bytes()
            ),
            "strict_replies" => self.strict_replies.to_string(),
            "bind_address" => self.bind_address.to_string(),
            "time_format" => self.time_format.to_string(),
            _ => return None,
        })
    }

    /// Performs additional validation checks on the configuration
    pub fn validate(self) -> Result<Self> {
        if self.chunk_size == 0 {
            anyhow::bail!("chunk_size must be greater than zero");
        }
        if self.chunk_size > MAX_CHUNK_SIZE {
            anyhow::bail!("chunk_size must be at most {MAX_CHUNK_SIZE} bytes");
        }
        if self.max_message_size == 0 {
            anyhow::bail!("max_message_size must be greater than zero");
        }
        Ok(self)
    }
}

/// Configuration options which may be given on the command line.
///
/// Anything not given falls through to the environment, configuration files or defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Args, Serialize)]
pub struct ConfigurationOverrides {
    /// Network timeout in seconds (0 waits forever)
    /// [default: 30]
    #[arg(short('t'), long, value_name("seconds"), help_heading("Configuration"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Chunk size for receiving file data, in bytes (at most 16 MiB)
    /// [default: 1024]
    #[arg(long, value_name("bytes"), help_heading("Configuration"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,

    /// Largest acceptable listing, in bytes
    /// [default: 16777216]
    #[arg(long, value_name("bytes"), help_heading("Configuration"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_message_size: Option<u64>,

    /// Refuse reply tokens that do not match the command sent
    #[arg(
        long,
        num_args(0..=1),
        default_missing_value("true"),
        require_equals(true),
        value_name("bool"),
        help_heading("Configuration")
    )]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict_replies: Option<bool>,

    /// Local address for the data channel listener
    /// [default: 0.0.0.0]
    #[arg(long, value_name("address"), help_heading("Configuration"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<IpAddr>,

    /// Format for log message timestamps
    /// [default: local]
    #[arg(long, value_name("format"), help_heading("Configuration"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_format: Option<TimeFormat>,
}

impl figment::Provider for ConfigurationOverrides {
    fn metadata(&self) -> figment::Metadata {
        figment::Metadata::named("command line")
    }

    fn data(
        &self,
    ) -> std::result::Result<
        figment::value::Map<figment::Profile, figment::value::Dict>,
        figment::Error,
    > {
        figment::providers::Serialized::defaults(self).data()
    }
}
