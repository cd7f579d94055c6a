//! The client side of a LIST or GET session.
//!
//! One session is one command: a listener for the data channel, one control connection,
//! one data connection. The sequence is
//!
//! 1. Listen for the data connection. This has to happen first, as the server may call back
//!    the moment it has read the command.
//! 2. Connect the control channel; send the data port, the command, and (GET) the filename.
//! 3. Accept the server's data connection.
//! 4. Read the server's reply on the control channel and act on it:
//!    * `UNK_CMD`: the server rejected the command.
//!    * `LIST_REPLY`: read the listing from the data channel.
//!    * `GET_REPLY`: read a second status. `OK` means the file follows on the data channel;
//!      `FAIL` means the server could not open it.
//!
//! Both connections are closed when the session ends, however it ends.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use human_repr::{HumanCount as _, HumanDuration as _};
use indicatif::{MultiProgress, ProgressBar};
use tokio::io::{AsyncWrite, AsyncWriteExt as _};
use tracing::{debug, info, trace};

use super::control::ControlChannel;
use super::data::{DataChannel, DataListener};
use super::progress::file_progress_bar;
use super::{Parameters, TransferJob};
use crate::config::Configuration;
use crate::error::TransferError;
use crate::protocol::common::{ReceivingStream, SendingStream};
use crate::protocol::control::{Command, Filename, StatusCode};
use crate::protocol::data::Listing;
use crate::util::stats::DataRate;

/// Where a session has got to
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum SessionState {
    /// Nothing has happened yet
    Idle,
    /// The data listener is open
    Listening,
    /// The handshake has been sent; waiting for the server's reply
    AwaitingResponse,
    /// Reading a listing from the data channel
    ConsumingListing,
    /// The server accepted a GET; waiting for OK or FAIL
    AwaitingStatus,
    /// Receiving file data
    TransferringFile,
    /// Discarding file data we will not write
    Draining,
    /// Finished successfully
    Done,
    /// Finished unsuccessfully
    Failed,
}

/// Tracks and logs state transitions
#[derive(Debug)]
struct StateTracker(SessionState);

impl StateTracker {
    fn new() -> Self {
        Self(SessionState::Idle)
    }

    fn to(&mut self, next: SessionState) {
        trace!("session state {} -> {next}", self.0);
        self.0 = next;
    }
}

/// The result of a successful GET
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetOutcome {
    /// Where the file was written
    pub path: PathBuf,
    /// File size
    pub bytes: u64,
    /// How long the data transfer took
    pub elapsed: Duration,
}

impl std::fmt::Display for GetOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} in {} ({})",
            self.bytes.human_count_bytes(),
            self.elapsed.human_duration(),
            DataRate::new(self.bytes, self.elapsed)
        )
    }
}

/// What a session produced
#[derive(Debug)]
pub enum SessionOutcome {
    /// A directory listing
    Listing(Listing),
    /// A file, now saved locally
    File(GetOutcome),
}

/// The settings a session needs from the [`Configuration`]
#[derive(Debug, Clone, Copy)]
struct Settings {
    timeout: Option<Duration>,
    chunk_size: usize,
    max_message_size: u64,
    strict_replies: bool,
}

impl From<&Configuration> for Settings {
    fn from(config: &Configuration) -> Self {
        Self {
            timeout: config.timeout_duration(),
            chunk_size: config.chunk_size,
            max_message_size: config.max_message_size,
            strict_replies: config.strict_replies,
        }
    }
}

/// The local name for a remote file: its last path component
fn local_name(filename: &Filename) -> Result<PathBuf, TransferError> {
    Path::new(filename.as_str())
        .file_name()
        .map(PathBuf::from)
        .ok_or_else(|| {
            TransferError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("cannot save {filename} locally: it does not name a file"),
            ))
        })
}

/// Lists the server's working directory.
///
/// Returns the listing exactly as the server sent it.
pub async fn run_list(
    config: &Configuration,
    host: &str,
    control_port: u16,
    data_port: u16,
) -> Result<Listing, TransferError> {
    let job = TransferJob {
        host: host.to_owned(),
        control_port,
        data_port,
        command: Command::List,
    };
    match run_job(config, &job, Path::new("."), &ProgressBar::hidden()).await? {
        SessionOutcome::Listing(l) => Ok(l),
        // A GET_REPLY to LIST is always refused, so this cannot happen
        SessionOutcome::File(_) => Err(TransferError::Protocol(
            "server sent a file in reply to LIST".into(),
        )),
    }
}

/// Retrieves a file from the server into `destination_dir`.
///
/// The local name is the last path component of `filename`: `GET sub/x.txt` saves
/// `destination_dir/x.txt`. A name with no file component (such as `..`) is refused before
/// anything is written. An existing file is never overwritten.
/// Unlike [`run_job`], a listing in reply is an error here whatever the `strict_replies` setting.
pub async fn run_get(
    config: &Configuration,
    host: &str,
    control_port: u16,
    data_port: u16,
    filename: &Filename,
    destination_dir: &Path,
    progress: &ProgressBar,
) -> Result<GetOutcome, TransferError> {
    let job = TransferJob {
        host: host.to_owned(),
        control_port,
        data_port,
        command: Command::Get(filename.clone()),
    };
    match run_job(config, &job, destination_dir, progress).await? {
        SessionOutcome::File(f) => Ok(f),
        SessionOutcome::Listing(_) => Err(TransferError::Protocol(
            "server sent a listing in reply to GET".into(),
        )),
    }
}

/// Runs one session end to end.
///
/// Unless `strict_replies` is set, the client follows the server's echo: a `LIST_REPLY` to a
/// GET yields a listing.
pub async fn run_job(
    config: &Configuration,
    job: &TransferJob,
    destination_dir: &Path,
    progress: &ProgressBar,
) -> Result<SessionOutcome, TransferError> {
    let settings = Settings::from(config);
    let mut state = StateTracker::new();

    let result = async {
        let listener = DataListener::listen(config.bind_address, job.data_port)?;
        state.to(SessionState::Listening);

        let mut control =
            ControlChannel::connect(&job.host, job.control_port, settings.timeout).await?;
        let result = async {
            control.announce_data_port(listener.port()).await?;
            control.send_command(&job.command).await?;
            state.to(SessionState::AwaitingResponse);

            let mut data = listener
                .accept_one(settings.timeout, settings.chunk_size)
                .await?;
            interpret(
                &mut control,
                &mut data,
                &job.command,
                settings,
                destination_dir,
                progress,
                &mut state,
            )
            .await
        }
        .await;
        // The data connection and listener have already dropped, one way or another.
        if let Err(e) = control.close().await {
            debug!("closing control channel: {e}");
        }
        result
    }
    .await;

    match &result {
        Ok(SessionOutcome::File(f)) => {
            info!("transfer complete: {} {f}", f.path.display());
            state.to(SessionState::Done);
        }
        Ok(SessionOutcome::Listing(_)) => state.to(SessionState::Done),
        Err(_) => state.to(SessionState::Failed),
    }
    result
}

/// Reads the server's reply and consumes the data channel accordingly
async fn interpret<S, R, D>(
    control: &mut ControlChannel<S, R>,
    data: &mut DataChannel<D>,
    command: &Command,
    settings: Settings,
    destination_dir: &Path,
    progress: &ProgressBar,
    state: &mut StateTracker,
) -> Result<SessionOutcome, TransferError>
where
    S: SendingStream,
    R: ReceivingStream,
    D: ReceivingStream,
{
    let reply = control.read_response().await?;
    if settings.strict_replies && reply != StatusCode::UnknownCommand && !command.expects(reply) {
        return Err(TransferError::Protocol(format!(
            "server replied {reply} to {}",
            command.word()
        )));
    }

    match reply {
        StatusCode::UnknownCommand => Err(TransferError::RemoteRejected),
        StatusCode::ListReply => {
            state.to(SessionState::ConsumingListing);
            let listing = data.receive_listing(settings.max_message_size).await?;
            Ok(SessionOutcome::Listing(listing))
        }
        StatusCode::GetReply => {
            let Command::Get(filename) = command else {
                // there is no filename to write to
                return Err(TransferError::Protocol(format!(
                    "server replied {reply} to {}",
                    command.word()
                )));
            };
            state.to(SessionState::AwaitingStatus);
            match control.read_response().await? {
                StatusCode::Ok => {
                    let path = destination_dir.join(local_name(filename)?);
                    receive_file(data, &path, progress, state).await
                }
                StatusCode::Fail => Err(TransferError::RemoteNotFound(filename.to_string())),
                other => Err(TransferError::Protocol(format!(
                    "expected {} or {} after {reply}, got {other}",
                    StatusCode::Ok,
                    StatusCode::Fail
                ))),
            }
        }
        StatusCode::Ok | StatusCode::Fail => Err(TransferError::Protocol(format!(
            "unexpected {reply} in reply to {}",
            command.word()
        ))),
    }
}

async fn receive_file<D: ReceivingStream>(
    data: &mut DataChannel<D>,
    path: &Path,
    progress: &ProgressBar,
    state: &mut StateTracker,
) -> Result<SessionOutcome, TransferError> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(refuse(data, path.to_path_buf(), state).await);
    }
    state.to(SessionState::TransferringFile);
    let start = Instant::now();
    match data.receive_file(path, progress).await {
        Ok(bytes) => Ok(SessionOutcome::File(GetOutcome {
            path: path.to_path_buf(),
            bytes,
            elapsed: start.elapsed(),
        })),
        // Someone else created it in the meantime
        Err(TransferError::LocalFileExists(p)) => Err(refuse(data, p, state).await),
        Err(e) => Err(e),
    }
}

/// Drains the payload we are not going to write, and reports the collision
async fn refuse<D: ReceivingStream>(
    data: &mut DataChannel<D>,
    path: PathBuf,
    state: &mut StateTracker,
) -> TransferError {
    state.to(SessionState::Draining);
    if let Err(e) = data.drain().await {
        debug!("draining the data channel: {e}");
    }
    TransferError::LocalFileExists(path)
}

/// Entrypoint for a client session run from the command line.
///
/// A listing is written to stdout exactly as received; a file is saved in the current
/// directory.
pub async fn client_main(
    config: &Configuration,
    display: MultiProgress,
    parameters: Parameters,
) -> anyhow::Result<bool> {
    client_main_with_output(config, display, parameters, &mut tokio::io::stdout()).await
}

/// As [`client_main`], with the listing going to `out`
async fn client_main_with_output<W: AsyncWrite + Unpin>(
    config: &Configuration,
    display: MultiProgress,
    parameters: Parameters,
    out: &mut W,
) -> anyhow::Result<bool> {
    let job = TransferJob::try_from(&parameters)?;
    debug!("job: {} to {}", job.command, job.control_endpoint());
    let bar = match &job.command {
        Command::Get(filename) => display.add(file_progress_bar(filename.as_str())),
        Command::List => ProgressBar::hidden(),
    };
    let result = run_job(config, &job, Path::new("."), &bar).await;
    bar.finish_and_clear();

    if let SessionOutcome::Listing(listing) = result? {
        out.write_all(listing.as_bytes()).await?;
        out.flush().await?;
    }
    Ok(true)
}
