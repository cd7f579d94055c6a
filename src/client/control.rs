//! Control channel management for the client

use std::time::Duration;

use tokio::io::AsyncWriteExt as _;
use tokio::net::{
    tcp::{OwnedReadHalf, OwnedWriteHalf},
    TcpStream,
};
use tracing::{debug, trace};

use crate::error::TransferError;
use crate::protocol::common::{
    ProtocolMessage as _, ReceivingStream, SendReceivePair, SendingStream, TcpStreamPair,
};
use crate::protocol::control::{Command, DataPort, StatusCode};
use crate::util::io::with_timeout;

/// The client's end of the control channel.
///
/// The stream types are generic so that the protocol logic can be exercised without a network.
#[derive(Debug)]
pub struct ControlChannel<S = OwnedWriteHalf, R = OwnedReadHalf>
where
    S: SendingStream,
    R: ReceivingStream,
{
    stream: SendReceivePair<S, R>,
    timeout: Option<Duration>,
}

impl ControlChannel {
    /// Resolves the server's address and opens the control connection.
    ///
    /// Every address the name resolves to is tried in turn; the last failure is reported.
    pub async fn connect(
        host: &str,
        port: u16,
        timeout: Option<Duration>,
    ) -> Result<Self, TransferError> {
        let endpoint = format!("{host}:{port}");
        let addrs: Vec<_> = with_timeout(timeout, "resolving the server address", async {
            tokio::net::lookup_host((host, port))
                .await
                .map_err(|e| TransferError::connection(format!("to {endpoint}"), e))
        })
        .await?
        .collect();
        debug!("{endpoint} resolves to {addrs:?}");

        let mut last_error = std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            "no addresses found",
        );
        for addr in addrs {
            trace!("connecting control channel to {addr}");
            let attempt = with_timeout(timeout, "connecting to the server", async {
                Ok(TcpStream::connect(addr).await)
            })
            .await?;
            match attempt {
                Ok(stream) => {
                    debug!("control channel connected to {addr}");
                    return Ok(Self::new(TcpStreamPair::from(stream), timeout));
                }
                Err(e) => {
                    debug!("connecting to {addr}: {e}");
                    last_error = e;
                }
            }
        }
        Err(TransferError::connection(
            format!("control channel to {endpoint}"),
            last_error,
        ))
    }
}

impl<S: SendingStream, R: ReceivingStream> ControlChannel<S, R> {
    /// Wraps an existing connection
    pub fn new(stream: SendReceivePair<S, R>, timeout: Option<Duration>) -> Self {
        Self { stream, timeout }
    }

    /// Tells the server which port to connect back to
    pub async fn announce_data_port(&mut self, port: u16) -> Result<(), TransferError> {
        trace!("announcing data port {port}");
        DataPort(port).to_writer_framed(&mut self.stream.send).await
    }

    /// Sends the command word, and the filename for GET
    pub async fn send_command(&mut self, command: &Command) -> Result<(), TransferError> {
        trace!("sending command {command}");
        command.send(&mut self.stream.send).await
    }

    /// Reads one status token.
    /// Anything unrecognised comes back as [`StatusCode::UnknownCommand`].
    pub async fn read_response(&mut self) -> Result<StatusCode, TransferError> {
        let status = with_timeout(
            self.timeout,
            "waiting for a reply on the control channel",
            StatusCode::from_reader_framed(&mut self.stream.recv),
        )
        .await?;
        trace!("received status {status}");
        Ok(status)
    }

    /// Shuts down our side of the connection.
    /// This consumes the channel; the socket is released when it drops.
    pub async fn close(mut self) -> Result<(), TransferError> {
        self.stream.send.shutdown().await?;
        trace!("control channel closed");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::ControlChannel;
    use crate::error::TransferError;
    use crate::protocol::common::{receive_message, send_message, SendReceivePair};
    use crate::protocol::control::{Command, Filename, StatusCode};
    use crate::util::test_protocol::test_plumbing;

    use pretty_assertions::assert_eq;
    use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};

    #[tokio::test]
    async fn handshake() {
        let (ours, mut theirs) = test_plumbing();
        let mut channel = ControlChannel::new(ours, None);
        channel.announce_data_port(30020).await.unwrap();
        channel
            .send_command(&Command::Get(Filename::new("x.txt").unwrap()))
            .await
            .unwrap();

        for expected in [&b"30020"[..], b"GET", b"x.txt"] {
            let got = receive_message(&mut theirs.recv, 100).await.unwrap();
            assert_eq!(&got[..], expected);
        }

        send_message(&mut theirs.send, b"GET_REPLY").await.unwrap();
        send_message(&mut theirs.send, b"FAIL").await.unwrap();
        assert_eq!(channel.read_response().await.unwrap(), StatusCode::GetReply);
        assert_eq!(channel.read_response().await.unwrap(), StatusCode::Fail);

        channel.close().await.unwrap();
        let mut rest = Vec::new();
        let _ = theirs.recv.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn reply_timeout() {
        let (ours, _theirs) = test_plumbing();
        let mut channel = ControlChannel::new(ours, Some(Duration::from_millis(20)));
        let e = channel.read_response().await.unwrap_err();
        assert!(matches!(e, TransferError::Timeout(_)));
    }

    #[tokio::test]
    async fn server_hangs_up() {
        let (ours, mut theirs) = test_plumbing();
        theirs.send.shutdown().await.unwrap();
        drop(theirs);
        let mut channel = ControlChannel::new(ours, Some(Duration::from_secs(5)));
        let e = channel.read_response().await.unwrap_err();
        assert!(matches!(e, TransferError::ConnectionClosed { .. }));
    }

    #[tokio::test]
    async fn reads_from_mock() {
        let recv = tokio_test::io::Builder::new()
            .read(&[0, 0, 0, 0, 0, 0, 0, 10])
            .read(b"LIST_")
            .read(b"REPLY")
            .build();
        let mut channel = ControlChannel::new(SendReceivePair::from((Vec::new(), recv)), None);
        assert_eq!(channel.read_response().await.unwrap(), StatusCode::ListReply);
    }

    #[tokio::test]
    async fn connection_refused() {
        // Grab a free port, then let it go so nothing is listening there
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let e = ControlChannel::connect("127.0.0.1", port, Some(Duration::from_secs(5)))
            .await
            .unwrap_err();
        assert!(matches!(e, TransferError::Connection { .. }), "{e}");
    }

    #[tokio::test]
    async fn unresolvable_host() {
        let e = ControlChannel::connect("no-such-host.invalid", 30021, Some(Duration::from_secs(10)))
            .await
            .unwrap_err();
        assert!(
            matches!(e, TransferError::Connection { .. } | TransferError::Timeout(_)),
            "{e}"
        );
    }
}
