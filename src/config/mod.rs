//! # 📖 Configuration management
//!
//! ftclient obtains run-time configuration from the following sources, in order:
//! 1. Command-line options
//! 2. Environment variables, named `FTCLIENT_` plus the field name in upper case (e.g. `FTCLIENT_TIMEOUT=5`)
//! 3. The user's configuration file
//!    * On Linux, this is `~/.config/ftclient/ftclient.toml`
//!    * On other platforms, `ftclient.toml` in an `ftclient` directory under the platform's user configuration directory
//! 4. The system-wide configuration file
//!    * On Unix, this is `/etc/ftclient.toml`
//! 5. Hard-wired defaults
//!
//! Run `ftclient --config-files` for a list of which files we read.
//!
//! Each option may appear in multiple places, but only the first match is used.
//!
//! ## File format
//!
//! Files are [TOML](https://toml.io/). Each option is a top-level key.
//!
//! ## Configurable options
//!
//! The set of supported fields is the [Configuration] structure.
//!
//! * `ftclient --show-config` outputs the supported fields, their current values, and where each value came from.
//! * `ftclient --config-files` outputs the list of configuration files for the current user and platform.
//!
//! ## Example
//!
//! ```text
//! # A slow server on the other side of the world
//! timeout = 120
//! chunk_size = 65536
//! # Accept data connections on the VPN interface only
//! bind_address = "10.8.0.2"
//! ```

mod manager;
mod structure;
mod sysdefault;

pub use manager::{DisplayAdapter, Manager, ENV_PREFIX};
pub use structure::{Configuration, ConfigurationOverrides, MAX_CHUNK_SIZE};
use sysdefault::SystemDefault;
