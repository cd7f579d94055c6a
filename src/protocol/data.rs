//! # Data channel protocol definitions
//!
//! The data channel is a TCP connection made by the **server** back to the port the client
//! announced on the control channel. It carries exactly one payload, then closes.
//!
//! * LIST: one framed Message containing the directory entries, each followed by `\n`.
//!   See [`Listing`].
//! * GET (after `OK`): a [`FileHeader`] giving the file size, then that many raw bytes.
//!   The bytes are not framed any further; the client copies them off the wire in chunks.
//!
//! The file header has the same 8-byte shape as a message length prefix, but the server
//! writes it as an unsigned quantity. Sizes with the top bit set are refused.

use std::borrow::Cow;

use bytes::Bytes;

use super::common::{LengthPrefix, ProtocolMessage, ReceivingStream, SendingStream};
use crate::error::TransferError;

/// A directory listing, exactly as the server sent it
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Listing(Bytes);

impl Listing {
    /// Accessor for the raw bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Iterates over the entries in the listing.
    ///
    /// This is a convenience view; the listing itself is never altered.
    pub fn entries(&self) -> impl Iterator<Item = Cow<'_, str>> {
        self.0
            .split(|b| *b == b'\n')
            .filter(|e| !e.is_empty())
            .map(String::from_utf8_lossy)
    }
}

impl From<Bytes> for Listing {
    fn from(value: Bytes) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for Listing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl ProtocolMessage for Listing {
    /// Directories can be large. The client normally uses the configured
    /// `max_message_size` instead of this limit.
    const WIRE_ENCODING_LIMIT: u64 = 16 * 1024 * 1024;

    fn to_payload(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(&self.0)
    }

    fn from_payload(payload: Bytes) -> Result<Self, TransferError> {
        Ok(Self(payload))
    }
}

/// Announces the size of a file payload on the data channel
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FileHeader {
    /// Number of raw bytes that follow
    pub size: u64,
}

impl FileHeader {
    /// Reads the header from the data channel
    pub async fn read<R: ReceivingStream>(reader: &mut R) -> Result<Self, TransferError> {
        let prefix = LengthPrefix::read(reader, u64::MAX).await?;
        Ok(Self { size: prefix.size })
    }

    /// Writes the header (used by test servers)
    pub async fn write<W: SendingStream>(self, writer: &mut W) -> Result<(), TransferError> {
        LengthPrefix { size: self.size }.write(writer).await
    }
}
