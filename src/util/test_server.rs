//! A scripted stand-in for the companion server, for tests.
//!
//! It speaks the real protocol over localhost TCP: accepts one control connection, reads the
//! handshake, connects back to the announced data port, then plays out whatever it was told to.

use std::net::SocketAddr;

use anyhow::Result;
use tokio::io::AsyncWriteExt as _;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::protocol::{
    common::{receive_message, send_message, ProtocolMessage as _, TcpStreamPair},
    control::{DataPort, StatusCode},
    data::FileHeader,
};

/// What the fake server sends on the data channel
#[derive(Debug, Clone)]
pub(crate) enum DataReply {
    /// Connect back, then close without sending anything
    Nothing,
    /// A single framed Message (as for LIST)
    Message(Vec<u8>),
    /// A file header and the file contents (as for GET)
    File(Vec<u8>),
    /// A file header announcing `declared` bytes, followed by only `body`
    Truncated {
        /// The size announced in the header
        declared: u64,
        /// The bytes actually sent
        body: Vec<u8>,
    },
    /// Do not connect back at all
    NoConnection,
}

/// A script for one session
#[derive(Debug, Clone)]
pub(crate) struct Script {
    /// Status tokens sent on the control channel, in order
    pub(crate) control: Vec<&'static str>,
    /// What goes on the data channel
    pub(crate) data: DataReply,
}

impl Script {
    pub(crate) fn list(listing: &[u8]) -> Self {
        Self {
            control: vec![StatusCode::ListReply.into()],
            data: DataReply::Message(listing.to_vec()),
        }
    }

    pub(crate) fn get_ok(contents: &[u8]) -> Self {
        Self {
            control: vec![StatusCode::GetReply.into(), StatusCode::Ok.into()],
            data: DataReply::File(contents.to_vec()),
        }
    }

    pub(crate) fn get_fail() -> Self {
        Self {
            control: vec![StatusCode::GetReply.into(), StatusCode::Fail.into()],
            data: DataReply::Nothing,
        }
    }

    pub(crate) fn unknown() -> Self {
        Self {
            control: vec![StatusCode::UnknownCommand.into()],
            data: DataReply::Nothing,
        }
    }
}

/// What the fake server saw from the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Handshake {
    pub(crate) data_port: u16,
    pub(crate) command: String,
    pub(crate) filename: Option<String>,
}

/// Starts a fake server on an ephemeral localhost port.
///
/// The join handle yields what the client sent.
pub(crate) async fn start(script: Script) -> Result<(SocketAddr, JoinHandle<Result<Handshake>>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(serve_one(listener, script));
    Ok((addr, handle))
}

async fn serve_one(listener: TcpListener, script: Script) -> Result<Handshake> {
    let (control, _) = listener.accept().await?;
    let mut control = TcpStreamPair::from(control);

    let DataPort(data_port) = DataPort::from_reader_framed(&mut control.recv).await?;
    let command = String::from_utf8(receive_message(&mut control.recv, 64).await?.to_vec())?;
    let filename = if command == "GET" {
        Some(String::from_utf8(
            receive_message(&mut control.recv, 4096).await?.to_vec(),
        )?)
    } else {
        None
    };
    let handshake = Handshake {
        data_port,
        command,
        filename,
    };

    let mut data = match script.data {
        DataReply::NoConnection => None,
        _ => Some(TcpStream::connect(("127.0.0.1", data_port)).await?),
    };

    for token in &script.control {
        send_message(&mut control.send, token.as_bytes()).await?;
    }

    if let Some(stream) = data.as_mut() {
        match script.data {
            DataReply::Nothing | DataReply::NoConnection => (),
            DataReply::Message(m) => send_message(stream, &m).await?,
            DataReply::File(contents) => {
                FileHeader {
                    size: contents.len() as u64,
                }
                .write(stream)
                .await?;
                stream.write_all(&contents).await?;
            }
            DataReply::Truncated { declared, body } => {
                FileHeader { size: declared }.write(stream).await?;
                stream.write_all(&body).await?;
            }
        }
        stream.shutdown().await?;
    }
    control.send.shutdown().await?;
    Ok(handshake)
}
