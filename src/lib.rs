//! `ftclient` is the client half of a simple two-socket file transfer protocol.
//!
//! It asks a companion server either for a listing of its working directory (`LIST`) or for a
//! single file (`GET`). Commands travel on a control connection; the server delivers the
//! result by connecting _back_ to a data port the client is listening on.
//!
//! ## Usage
//!
//! ```text
//! ftclient HOST CONTROL_PORT -l DATA_PORT
//! ftclient HOST CONTROL_PORT -g FILE DATA_PORT
//! ```
//!
//! A listing is written to stdout exactly as the server sent it.
//! A file is saved in the current directory under its own name; an existing file is never
//! overwritten.
//!
//! ## 📖 Documentation
//!
//! * [The protocol](protocol)
//! * [Configuring ftclient](config)
//! * [Troubleshooting](doc::troubleshooting)
//!
//! ## Library use
//!
//! The sessions are available directly as [`client::run_list`] and [`client::run_get`],
//! which take a [`Configuration`] and return typed results.

pub mod cli;
pub mod client;
pub mod config;
pub mod doc;
pub mod error;
pub mod protocol;
pub mod util;

pub use cli::cli as main;
pub use client::Parameters;
pub use config::Configuration;
pub use error::TransferError;
