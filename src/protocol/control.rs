//! # Control channel protocol definitions
//!
//! The control channel is a TCP connection opened by the client to the server's control port.
//! Every item on it is a framed Message (see [common](super::common)).
//!
//! * Client ➡️ Server: [`DataPort`], the port the client is listening on for the data channel
//! * C ➡️ S: the [`Command`] word, `LIST` or `GET`
//! * C ➡️ S: (GET only) the [`Filename`]
//! * S: ⚙️ connects back to the client's data port
//! * S ➡️ C: a [`StatusCode`]: `LIST_REPLY`, `GET_REPLY` or `UNK_CMD`
//! * S ➡️ C: (after `GET_REPLY` only) a second [`StatusCode`]: `OK` or `FAIL`
//!
//! Status codes are plain ASCII tokens, compared exactly.
//! The server echoes the command it understood, and the client's next step depends on that echo.
//! See [`client::session`](crate::client::session) for the client-side state machine.

use std::borrow::Cow;

use bytes::Bytes;
use tracing::warn;

use super::common::{ProtocolMessage, SendingStream};
use crate::error::TransferError;

/// Response tokens sent by the server on the control channel
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, strum::Display, strum::EnumString, strum::IntoStaticStr,
)]
pub enum StatusCode {
    /// The server did not recognise the command.
    /// Also used for anything *we* do not recognise.
    #[strum(serialize = "UNK_CMD")]
    UnknownCommand,
    /// A directory listing follows on the data channel
    #[strum(serialize = "LIST_REPLY")]
    ListReply,
    /// A file request was understood; [`StatusCode::Ok`] or [`StatusCode::Fail`] follows
    #[strum(serialize = "GET_REPLY")]
    GetReply,
    /// The requested file is on its way over the data channel
    #[strum(serialize = "OK")]
    Ok,
    /// The requested file could not be opened
    #[strum(serialize = "FAIL")]
    Fail,
}

impl ProtocolMessage for StatusCode {
    const WIRE_ENCODING_LIMIT: u64 = 64;

    fn to_payload(&self) -> Cow<'_, [u8]> {
        let s: &'static str = self.into();
        Cow::Borrowed(s.as_bytes())
    }

    /// Anything unrecognised is treated as [`StatusCode::UnknownCommand`]
    fn from_payload(payload: Bytes) -> Result<Self, TransferError> {
        let parsed = std::str::from_utf8(&payload)
            .ok()
            .and_then(|s| s.parse().ok());
        Ok(parsed.unwrap_or_else(|| {
            warn!(
                "unrecognised status token {:?}",
                String::from_utf8_lossy(&payload)
            );
            StatusCode::UnknownCommand
        }))
    }
}

/// A request the client can make
#[derive(Clone, Debug, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
pub enum Command {
    /// Lists the server's working directory
    #[strum(serialize = "LIST")]
    List,
    /// Retrieves a named file from the server's working directory
    #[strum(serialize = "GET")]
    Get(Filename),
}

impl Command {
    /// The command word, as sent on the wire
    #[must_use]
    pub fn word(&self) -> &'static str {
        self.into()
    }

    /// Sends the command word, followed by the filename if there is one
    pub async fn send<W: SendingStream>(&self, writer: &mut W) -> Result<(), TransferError> {
        super::common::send_message(writer, self.word().as_bytes()).await?;
        if let Command::Get(filename) = self {
            filename.to_writer_framed(writer).await?;
        }
        Ok(())
    }

    /// Is this status the echo we expect for this command?
    #[must_use]
    pub fn expects(&self, status: StatusCode) -> bool {
        matches!(
            (self, status),
            (Command::List, StatusCode::ListReply) | (Command::Get(_), StatusCode::GetReply)
        )
    }
}

/// The port number the client listens on for the data channel, sent as a decimal string
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataPort(pub u16);

impl std::fmt::Display for DataPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A remote filename, sent as-is.
///
/// The protocol places no constraints on it beyond being non-empty. The server interprets
/// it relative to its own working directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Filename(String);

impl Filename {
    /// Validating constructor
    pub fn new<S: Into<String>>(name: S) -> Result<Self, TransferError> {
        let name = name.into();
        if name.is_empty() {
            return Err(TransferError::Protocol("filename must not be empty".into()));
        }
        Ok(Self(name))
    }

    /// Accessor
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Filename {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl ProtocolMessage for Filename {
    fn to_payload(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.0.as_bytes())
    }

    fn from_payload(payload: Bytes) -> Result<Self, TransferError> {
        let s = String::from_utf8(payload.to_vec())
            .map_err(|e| TransferError::Protocol(format!("filename is not UTF-8: {e}")))?;
        Self::new(s)
    }
}

impl ProtocolMessage for DataPort {
    const WIRE_ENCODING_LIMIT: u64 = 16;

    fn to_payload(&self) -> Cow<'_, [u8]> {
        Cow::Owned(self.0.to_string().into_bytes())
    }

    fn from_payload(payload: Bytes) -> Result<Self, TransferError> {
        std::str::from_utf8(&payload)
            .ok()
            .and_then(|s| s.parse().ok())
            .map(DataPort)
            .ok_or_else(|| {
                TransferError::Protocol(format!(
                    "invalid data port {:?}",
                    String::from_utf8_lossy(&payload)
                ))
            })
    }
}
