//! # 📖 The LIST/GET file transfer protocol
//!
//! A session uses two TCP connections:
//!
//! * The **control channel**, opened by the client to the server's control port.
//!   It carries the handshake and the server's status tokens.
//!   See [control].
//! * The **data channel**, opened by the server _back_ to a port the client is listening on.
//!   It carries one directory listing or one file.
//!   See [data].
//!
//! Because the server calls back, the client must be listening on its data port
//! before it sends a command.
//!
//! ## Sequence
//!
//! ```text
//!  client                                   server
//!    |  listen on DATA_PORT                    |
//!    |---- connect control channel ----------->|
//!    |---- "DATA_PORT" ----------------------->|
//!    |---- "LIST" | "GET" -------------------->|
//!    |---- filename (GET only) --------------->|
//!    |<--- connect data channel ---------------|
//!    |<--- "LIST_REPLY" | "GET_REPLY" | "UNK_CMD"
//!    |<--- "OK" | "FAIL" (after GET_REPLY) ----|
//!    |<=== listing or file (data channel) =====|
//! ```
//!
//! Every item on the control channel, and the listing on the data channel, is a Message:
//! an 8-byte big-endian length followed by that many bytes. See [common].
//!
//! There is no authentication, no encryption and no versioning.

pub mod common;
pub mod control;
pub mod data;
