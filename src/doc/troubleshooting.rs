//! ## 🕵️ Troubleshooting
//!
//! The `--debug` option reports each step of a session, including the addresses tried,
//! the data port announced and every status token received.
//!
//! This program also understands the `RUST_LOG` environment variable which might let you probe deeper.
//! Some possible settings for this variable are:
//!
//! * `ftclient=trace` outputs tracing-level output from this crate, including session state transitions
//! * `trace` sets all the Rust components to trace mode
//!
//! To capture the log in a file as well, use `--log-file`. The file gets the same detail as
//! the console unless you set `RUST_LOG_FILE_DETAIL`.
//!
//! ### Connection refused on the control port
//!
//! The server is not running, or is listening on a different port. Check the host and
//! `CONTROL_PORT` arguments.
//!
//! ### Timed out waiting for the server to open the data connection
//!
//! The server accepted the command but could not reach back to us.
//!
//! * Is there a firewall on the client machine blocking inbound connections to `DATA_PORT`?
//! * Is the client behind NAT? The server connects to the address it saw the control
//!   connection come from, on the port we announced. That only works if the port is forwarded.
//! * If the client has several interfaces, `--bind-address` restricts the listener to one of them.
//!
//! The wait is bounded by `--timeout` (30 seconds by default).
//!
//! ### Address already in use
//!
//! Something else is listening on `DATA_PORT`. Choose another port.
//!
//! ### "filename is taken"
//!
//! A file of that name already exists in the current directory. Move it out of the way
//! or run from a different directory. The server's copy of the data is read and discarded.
//!
//! ### The server replied with something unexpected
//!
//! By default the client follows whatever reply the server gives: a `LIST_REPLY` to a `GET`
//! is treated as a listing. `--strict-replies` refuses any reply that does not match the
//! command sent.
