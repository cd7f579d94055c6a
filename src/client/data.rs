//! Data channel management for the client
//!
//! The server makes the data connection, so the client has to be listening first.
//! [`DataListener`] is created before the control channel is opened; once the command has been
//! sent, [`DataListener::accept_one`] yields the single [`DataChannel`] for the session.

use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use indicatif::ProgressBar;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncReadExt as _, AsyncWrite, AsyncWriteExt as _};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tracing::{debug, trace, warn};

use crate::error::TransferError;
use crate::protocol::common::{receive_message, ReceivingStream};
use crate::protocol::data::{FileHeader, Listing};
use crate::util::io::with_timeout;

/// A listening socket waiting for the server to call back
#[derive(Debug)]
pub struct DataListener {
    listener: TcpListener,
    port: u16,
}

impl DataListener {
    /// Binds and listens, with address reuse and a backlog of one.
    ///
    /// Port 0 selects an ephemeral port; [`port()`](Self::port) reports the one actually bound.
    pub fn listen(bind_address: IpAddr, port: u16) -> Result<Self, TransferError> {
        let addr = SocketAddr::new(bind_address, port);
        let what = || format!("data listener on {addr}");
        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(|e| TransferError::connection(what(), e))?;
        socket
            .set_reuseaddr(true)
            .map_err(|e| TransferError::connection(what(), e))?;
        socket
            .bind(addr)
            .map_err(|e| TransferError::connection(what(), e))?;
        let listener = socket
            .listen(1)
            .map_err(|e| TransferError::connection(what(), e))?;
        let port = listener.local_addr()?.port();
        debug!("listening for the data connection on port {port}");
        Ok(Self { listener, port })
    }

    /// The port we are listening on
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Waits for the server to connect. Only one connection is ever accepted; the listener is
    /// closed as soon as it arrives.
    pub async fn accept_one(
        self,
        timeout: Option<Duration>,
        chunk_size: usize,
    ) -> Result<DataChannel<TcpStream>, TransferError> {
        let (stream, peer) = with_timeout(
            timeout,
            "waiting for the server to open the data connection",
            async {
                self.listener.accept().await.map_err(|e| {
                    TransferError::connection(format!("data channel on port {}", self.port), e)
                })
            },
        )
        .await?;
        debug!("data connection from {peer}");
        Ok(DataChannel::new(stream, timeout, chunk_size))
    }
}

/// The client's end of the data channel
#[derive(Debug)]
pub struct DataChannel<R: ReceivingStream> {
    stream: R,
    timeout: Option<Duration>,
    chunk_size: usize,
}

impl<R: ReceivingStream> DataChannel<R> {
    /// Wraps an existing stream
    pub fn new(stream: R, timeout: Option<Duration>, chunk_size: usize) -> Self {
        Self {
            stream,
            timeout,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Reads a directory listing (one Message), refusing anything longer than `limit`
    pub async fn receive_listing(&mut self, limit: u64) -> Result<Listing, TransferError> {
        let payload = with_timeout(
            self.timeout,
            "reading the directory listing",
            receive_message(&mut self.stream, limit),
        )
        .await?;
        trace!("received listing of {} bytes", payload.len());
        Ok(Listing::from(payload))
    }

    /// Reads a file payload into a new file at `destination`.
    ///
    /// The file must not already exist. If anything goes wrong once it has been created,
    /// the partial file is removed.
    ///
    /// Returns the number of bytes written.
    pub async fn receive_file(
        &mut self,
        destination: &Path,
        progress: &ProgressBar,
    ) -> Result<u64, TransferError> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(destination)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    TransferError::LocalFileExists(destination.to_path_buf())
                }
                _ => TransferError::Io(e),
            })?;

        let result = async {
            let size = self.copy_payload(&mut file, Some(progress)).await?;
            file.flush().await?;
            Ok::<_, TransferError>(size)
        }
        .await;

        if result.is_err() {
            drop(file);
            if let Err(e) = tokio::fs::remove_file(destination).await {
                warn!("could not remove partial file {}: {e}", destination.display());
            } else {
                debug!("removed partial file {}", destination.display());
            }
        }
        result
    }

    /// Reads and discards a file payload, so the server is not left mid-send.
    ///
    /// Returns the number of bytes discarded.
    pub async fn drain(&mut self) -> Result<u64, TransferError> {
        let n = self.copy_payload(&mut tokio::io::sink(), None).await?;
        debug!("discarded {n} bytes from the data channel");
        Ok(n)
    }

    /// Reads the file header, then copies that many bytes to `sink` in chunks.
    /// The timeout applies to each read individually.
    async fn copy_payload<W: AsyncWrite + Unpin>(
        &mut self,
        sink: &mut W,
        progress: Option<&ProgressBar>,
    ) -> Result<u64, TransferError> {
        let header = with_timeout(
            self.timeout,
            "reading the file size",
            FileHeader::read(&mut self.stream),
        )
        .await?;
        let size = header.size;
        trace!("file payload of {size} bytes follows");
        if let Some(p) = progress {
            p.set_length(size);
        }

        // never allocate more than the payload needs
        let buffer_size = usize::try_from(size).map_or(self.chunk_size, |s| s.min(self.chunk_size));
        let mut buffer = vec![0u8; buffer_size];
        let mut received = 0u64;
        while received < size {
            let want = usize::try_from(size - received)
                .unwrap_or(usize::MAX)
                .min(buffer.len());
            let n = with_timeout(self.timeout, "reading file data", async {
                Ok(self.stream.read(&mut buffer[..want]).await?)
            })
            .await?;
            if n == 0 {
                return Err(TransferError::ConnectionClosed {
                    expected: size,
                    received,
                });
            }
            sink.write_all(&buffer[..n]).await?;
            received += n as u64;
            if let Some(p) = progress {
                p.inc(n as u64);
            }
        }
        Ok(received)
    }
}

#[cfg(test)]
mod test {
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    use super::{DataChannel, DataListener};
    use crate::error::TransferError;

    use indicatif::ProgressBar;
    use pretty_assertions::assert_eq;
    use tokio::io::AsyncWriteExt as _;
    use tokio_test::io::Builder;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    fn file_payload(contents: &[u8]) -> Vec<u8> {
        let mut v = (contents.len() as u64).to_be_bytes().to_vec();
        v.extend_from_slice(contents);
        v
    }

    #[tokio::test]
    async fn listing() {
        let wire = b"\0\0\0\0\0\0\0\x0ca.txt\nb.txt\n";
        let mut ch = DataChannel::new(&wire[..], None, 1024);
        let l = ch.receive_listing(1024).await.unwrap();
        assert_eq!(l.as_bytes(), b"a.txt\nb.txt\n");
    }

    #[tokio::test]
    async fn listing_too_long() {
        let wire = b"\0\0\0\0\0\0\x10\0";
        let mut ch = DataChannel::new(&wire[..], None, 1024);
        let e = ch.receive_listing(1024).await.unwrap_err();
        assert!(matches!(e, TransferError::Protocol(_)));
    }

    #[tokio::test]
    async fn file_in_small_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("x.txt");
        let contents: Vec<u8> = (0..5000u32).map(|i| (i % 253) as u8).collect();
        let wire = file_payload(&contents);

        let mut builder = Builder::new();
        for chunk in wire.chunks(300) {
            let _ = builder.read(chunk);
        }
        let mut ch = DataChannel::new(builder.build(), None, 1024);
        let progress = ProgressBar::hidden();
        let n = ch.receive_file(&dest, &progress).await.unwrap();
        assert_eq!(n, 5000);
        assert_eq!(progress.position(), 5000);
        assert_eq!(std::fs::read(&dest).unwrap(), contents);
    }

    #[tokio::test]
    async fn empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("empty");
        let wire = file_payload(b"");
        let mut ch = DataChannel::new(&wire[..], None, 1024);
        let n = ch.receive_file(&dest, &ProgressBar::hidden()).await.unwrap();
        assert_eq!(n, 0);
        assert!(std::fs::read(&dest).unwrap().is_empty());
    }

    #[tokio::test]
    async fn truncated_file_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("x.txt");
        let mut wire = 10u64.to_be_bytes().to_vec();
        wire.extend_from_slice(b"hello");
        let mut ch = DataChannel::new(&wire[..], None, 1024);
        let e = ch
            .receive_file(&dest, &ProgressBar::hidden())
            .await
            .unwrap_err();
        assert!(matches!(
            e,
            TransferError::ConnectionClosed {
                expected: 10,
                received: 5
            }
        ));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn existing_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("x.txt");
        std::fs::write(&dest, b"precious").unwrap();
        let wire = file_payload(b"hello");
        let mut ch = DataChannel::new(&wire[..], None, 1024);
        let e = ch
            .receive_file(&dest, &ProgressBar::hidden())
            .await
            .unwrap_err();
        assert!(matches!(e, TransferError::LocalFileExists(_)));
        assert_eq!(std::fs::read(&dest).unwrap(), b"precious");
        // the payload can still be drained
        assert_eq!(ch.drain().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn drain_in_tiny_chunks() {
        let wire = file_payload(&[7u8; 100]);
        let mut ch = DataChannel::new(&wire[..], None, 3);
        assert_eq!(ch.drain().await.unwrap(), 100);
    }

    #[tokio::test]
    async fn oversized_chunk_size_is_harmless() {
        let wire = file_payload(&[7u8; 100]);
        let mut ch = DataChannel::new(&wire[..], None, usize::MAX);
        assert_eq!(ch.drain().await.unwrap(), 100);
    }

    #[tokio::test]
    async fn listener_accepts_one() {
        let listener = DataListener::listen(LOCALHOST, 0).unwrap();
        let port = listener.port();
        assert_ne!(port, 0);
        let client = tokio::spawn(async move {
            let mut s = tokio::net::TcpStream::connect((LOCALHOST, port)).await.unwrap();
            s.write_all(b"\0\0\0\0\0\0\0\x02ok").await.unwrap();
        });
        let mut ch = listener
            .accept_one(Some(Duration::from_secs(5)), 1024)
            .await
            .unwrap();
        assert_eq!(ch.receive_listing(100).await.unwrap().as_bytes(), b"ok");
        client.await.unwrap();
    }

    #[tokio::test]
    async fn accept_timeout() {
        let listener = DataListener::listen(LOCALHOST, 0).unwrap();
        let e = listener
            .accept_one(Some(Duration::from_millis(20)), 1024)
            .await
            .unwrap_err();
        assert!(matches!(e, TransferError::Timeout(_)));
    }

    #[tokio::test]
    async fn port_in_use() {
        let first = std::net::TcpListener::bind((LOCALHOST, 0)).unwrap();
        let port = first.local_addr().unwrap().port();
        let e = DataListener::listen(LOCALHOST, port).unwrap_err();
        assert!(matches!(e, TransferError::Connection { .. }));
    }
}
