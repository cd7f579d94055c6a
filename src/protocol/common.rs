//! Common functions and definitions shared by the [control](super::control) and [data](super::data) channels
//!
//! # On-Wire Framing
//!
//! All protocol messages are sent in two parts:
//!
//! * [`LengthPrefix`]: the payload length as an 8-byte big-endian **signed** integer
//! * The payload, exactly that many bytes
//!
//! There is no type tag, version or checksum. What a message means is decided purely by
//! where it falls in the exchange (see the [protocol overview](super)).
//!
//! The signed width is a legacy of the companion server; we keep it bit-for-bit.
//! Internally lengths are handled as `u64`, and a negative length on the wire is
//! rejected as a protocol error.

use std::borrow::Cow;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::error::TransferError;

/////////////////////////////////////////////////////////////////////////////////////////////
// STREAM TYPEDEFS

/// Marker trait for streams used for sending data
pub trait SendingStream: AsyncWrite + Send + Unpin {}
impl SendingStream for tokio::net::TcpStream {}
impl SendingStream for tokio::net::tcp::OwnedWriteHalf {}
impl SendingStream for Vec<u8> {}

#[cfg(test)]
impl SendingStream for tokio_test::io::Mock {}

/// Marker trait for streams used for receiving data
pub trait ReceivingStream: AsyncRead + Send + Unpin {}
impl ReceivingStream for tokio::net::TcpStream {}
impl ReceivingStream for tokio::net::tcp::OwnedReadHalf {}
impl ReceivingStream for &[u8] {}

#[cfg(test)]
impl ReceivingStream for tokio_test::io::Mock {}

/// Syntactic sugar helper type
#[derive(Debug)]
pub struct SendReceivePair<S: SendingStream, R: ReceivingStream> {
    /// outbound data
    pub send: S,
    /// inbound data
    pub recv: R,
}

impl<S: SendingStream, R: ReceivingStream> From<(S, R)> for SendReceivePair<S, R> {
    fn from(value: (S, R)) -> Self {
        Self {
            send: value.0,
            recv: value.1,
        }
    }
}

/// The halves of a TCP connection, as used by the control channel
pub type TcpStreamPair =
    SendReceivePair<tokio::net::tcp::OwnedWriteHalf, tokio::net::tcp::OwnedReadHalf>;

impl From<tokio::net::TcpStream> for TcpStreamPair {
    fn from(stream: tokio::net::TcpStream) -> Self {
        let (recv, send) = stream.into_split();
        Self { send, recv }
    }
}

/////////////////////////////////////////////////////////////////////////////////////////////
// WIRE MESSAGE FRAMING

/// Length header used on the wire, for both [Messages](send_message) and file payloads.
#[derive(PartialEq, Eq, Debug, Default, Clone, Copy)]
pub struct LengthPrefix {
    /// Number of bytes that follow the header
    pub size: u64,
}

impl LengthPrefix {
    /// The on-wire size of the header, which is fixed (any change would constitute a breaking protocol change)
    pub const SIZE: usize = 8;

    /// Creates a header for a payload of the given length
    pub fn for_payload(len: usize) -> Result<Self, TransferError> {
        let size = u64::try_from(len)
            .ok()
            .filter(|s| i64::try_from(*s).is_ok())
            .ok_or_else(|| {
                TransferError::Protocol(format!("payload of {len} bytes is too long to frame"))
            })?;
        Ok(Self { size })
    }

    /// Encodes the header (big-endian, signed 64-bit)
    #[must_use]
    pub fn to_bytes(self) -> [u8; Self::SIZE] {
        // for_payload() and from_bytes() never let through a size above i64::MAX
        i64::try_from(self.size).unwrap_or(i64::MAX).to_be_bytes()
    }

    /// Decodes a header, rejecting negative lengths and anything above `limit`
    pub fn from_bytes(bytes: [u8; Self::SIZE], limit: u64) -> Result<Self, TransferError> {
        let raw = i64::from_be_bytes(bytes);
        let size = u64::try_from(raw).map_err(|_| {
            TransferError::Protocol(format!("negative length prefix ({raw}) on the wire"))
        })?;
        if size > limit {
            return Err(TransferError::Protocol(format!(
                "length prefix {size} exceeds the limit of {limit} bytes"
            )));
        }
        Ok(Self { size })
    }

    /// Reads a header from a stream
    pub async fn read<R: ReceivingStream>(reader: &mut R, limit: u64) -> Result<Self, TransferError> {
        let mut buf = [0u8; Self::SIZE];
        read_fully(reader, &mut buf).await?;
        Self::from_bytes(buf, limit)
    }

    /// Writes this header to a stream
    pub async fn write<W: SendingStream>(self, writer: &mut W) -> Result<(), TransferError> {
        writer.write_all(&self.to_bytes()).await?;
        Ok(())
    }
}

/// Fills `buf` from the reader, looping over partial reads.
///
/// If the stream ends first, the error reports how far we got.
pub(crate) async fn read_fully<R: ReceivingStream>(
    reader: &mut R,
    buf: &mut [u8],
) -> Result<(), TransferError> {
    let mut received = 0;
    while received < buf.len() {
        let n = reader.read(&mut buf[received..]).await?;
        if n == 0 {
            return Err(TransferError::ConnectionClosed {
                expected: buf.len() as u64,
                received: received as u64,
            });
        }
        received += n;
    }
    Ok(())
}

/// Sends a Message: the length prefix, then every byte of the payload.
pub async fn send_message<W: SendingStream>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), TransferError> {
    LengthPrefix::for_payload(payload.len())?
        .write(writer)
        .await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    trace!("sent message of {} bytes", payload.len());
    Ok(())
}

/// Receives a Message, reassembling the payload however the transport chops it up.
///
/// Length prefixes above `limit` are refused before any payload is read.
pub async fn receive_message<R: ReceivingStream>(
    reader: &mut R,
    limit: u64,
) -> Result<Bytes, TransferError> {
    let header = LengthPrefix::read(reader, limit).await?;
    let len = usize::try_from(header.size).map_err(|_| {
        TransferError::Protocol(format!("message of {} bytes is too large", header.size))
    })?;
    let mut buffer = BytesMut::zeroed(len);
    read_fully(reader, &mut buffer).await.map_err(|e| match e {
        // Count the header too, so the numbers describe the whole message
        TransferError::ConnectionClosed { expected, received } => {
            TransferError::ConnectionClosed {
                expected: expected + LengthPrefix::SIZE as u64,
                received: received + LengthPrefix::SIZE as u64,
            }
        }
        other => other,
    })?;
    trace!("received message of {len} bytes");
    Ok(buffer.freeze())
}

/// Provides I/O functions for all typed payloads taking part in our protocol.
///
/// Callers are expected to use the `..._framed` functions, which include framing.
///
/// N.B. Message types are not expected to override the provided implementations.
pub trait ProtocolMessage
where
    Self: Sized + Sync,
{
    /// Specifies an absolute limit on the payload length of this type.
    /// [`from_reader_framed`](Self::from_reader_framed) rejects any length prefix longer than this.
    const WIRE_ENCODING_LIMIT: u64 = 4_096;

    /// The payload bytes representing this value
    fn to_payload(&self) -> Cow<'_, [u8]>;

    /// Parses a payload into this type
    fn from_payload(payload: Bytes) -> Result<Self, TransferError>;

    /// Reads a Message and parses its payload as this type
    fn from_reader_framed<R>(
        reader: &mut R,
    ) -> impl std::future::Future<Output = Result<Self, TransferError>> + Send
    where
        R: ReceivingStream,
    {
        async move {
            let payload = receive_message(reader, Self::WIRE_ENCODING_LIMIT).await?;
            Self::from_payload(payload)
        }
    }

    /// Writes this value as a Message
    fn to_writer_framed<W>(
        &self,
        writer: &mut W,
    ) -> impl std::future::Future<Output = Result<(), TransferError>> + Send
    where
        W: SendingStream,
    {
        async move { send_message(writer, &self.to_payload()).await }
    }
}

#[cfg(test)]
mod test {
    use super::{LengthPrefix, ProtocolMessage as _, receive_message, send_message};
    use crate::error::TransferError;
    use crate::protocol::control::StatusCode;

    use assertables::assert_contains;
    use pretty_assertions::assert_eq;
    use tokio_test::io::Builder;

    const NO_LIMIT: u64 = u64::MAX;

    #[test]
    fn header_is_big_endian() {
        let h = LengthPrefix::for_payload(0x0102).unwrap();
        assert_eq!(h.to_bytes(), [0, 0, 0, 0, 0, 0, 1, 2]);
        assert_eq!(LengthPrefix::from_bytes(h.to_bytes(), NO_LIMIT).unwrap(), h);
    }

    #[test]
    fn negative_length_is_refused() {
        let bytes = (-1i64).to_be_bytes();
        let e = LengthPrefix::from_bytes(bytes, NO_LIMIT).unwrap_err();
        assert!(matches!(e, TransferError::Protocol(_)));
        assert_contains!(e.to_string(), "negative");
    }

    #[test]
    fn oversized_length_is_refused() {
        let bytes = 1025i64.to_be_bytes();
        let e = LengthPrefix::from_bytes(bytes, 1024).unwrap_err();
        assert_contains!(e.to_string(), "exceeds the limit");
        assert!(LengthPrefix::from_bytes(1024i64.to_be_bytes(), 1024).is_ok());
    }

    #[tokio::test]
    async fn wire_format() {
        let mut out = Vec::new();
        send_message(&mut out, b"LIST").await.unwrap();
        assert_eq!(out, b"\0\0\0\0\0\0\0\x04LIST");
    }

    #[tokio::test]
    async fn roundtrip_empty() {
        let mut out = Vec::new();
        send_message(&mut out, b"").await.unwrap();
        assert_eq!(out.len(), 8);
        let got = receive_message(&mut out.as_slice(), NO_LIMIT).await.unwrap();
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn reassembles_partial_reads() {
        // header split across two reads, payload dribbled out a byte or two at a time
        let mut mock = Builder::new()
            .read(&[0, 0, 0])
            .read(&[0, 0, 0, 0, 12])
            .read(b"a")
            .read(b".t")
            .read(b"xt\nb.")
            .read(b"txt\n")
            .build();
        let got = receive_message(&mut mock, NO_LIMIT).await.unwrap();
        assert_eq!(&got[..], b"a.txt\nb.txt\n");
    }

    #[tokio::test]
    async fn reassembles_large_payload() {
        let payload: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        let mut wire = Vec::new();
        send_message(&mut wire, &payload).await.unwrap();

        let mut builder = Builder::new();
        for chunk in wire.chunks(777) {
            let _ = builder.read(chunk);
        }
        let mut mock = builder.build();
        let got = receive_message(&mut mock, NO_LIMIT).await.unwrap();
        assert_eq!(got.len(), payload.len());
        assert_eq!(&got[..], &payload[..]);
    }

    #[tokio::test]
    async fn early_close_mid_payload() {
        let mut wire: &[u8] = b"\0\0\0\0\0\0\0\x0ahello";
        let e = receive_message(&mut wire, NO_LIMIT).await.unwrap_err();
        let TransferError::ConnectionClosed { expected, received } = e else {
            panic!("unexpected error {e}");
        };
        assert_eq!(expected, 18);
        assert_eq!(received, 13);
    }

    #[tokio::test]
    async fn early_close_mid_header() {
        let mut wire: &[u8] = b"\0\0\0";
        let e = receive_message(&mut wire, NO_LIMIT).await.unwrap_err();
        assert!(matches!(
            e,
            TransferError::ConnectionClosed {
                expected: 8,
                received: 3
            }
        ));
    }

    #[tokio::test]
    async fn typed_message_limit() {
        // A "status" that is far too long to be one
        let mut wire = Vec::new();
        send_message(&mut wire, &[b'x'; 10_000]).await.unwrap();
        let e = StatusCode::from_reader_framed(&mut wire.as_slice())
            .await
            .unwrap_err();
        assert!(matches!(e, TransferError::Protocol(_)));
    }

    #[tokio::test]
    async fn typed_roundtrip() {
        let mut wire = Vec::new();
        StatusCode::GetReply
            .to_writer_framed(&mut wire)
            .await
            .unwrap();
        let got = StatusCode::from_reader_framed(&mut wire.as_slice())
            .await
            .unwrap();
        assert_eq!(got, StatusCode::GetReply);
    }
}
