//! Job specifications for the client

use crate::protocol::control::{Command, Filename};

use super::Parameters;

/// Details of one session: where the server is, where it should call back, and what to ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    /// The server's hostname or IP address
    pub host: String,
    /// The server's control port
    pub control_port: u16,
    /// The local port to listen on for the data channel (0 picks any free port)
    pub data_port: u16,
    /// What to ask for
    pub command: Command,
}

impl TransferJob {
    /// The `host:port` of the control channel, for messages
    #[must_use]
    pub fn control_endpoint(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.control_port)
        } else {
            format!("{}:{}", self.host, self.control_port)
        }
    }
}

impl TryFrom<&Parameters> for TransferJob {
    type Error = anyhow::Error;

    fn try_from(args: &Parameters) -> Result<Self, Self::Error> {
        let (Some(host), Some(control_port), Some(data_port)) =
            (args.host.as_ref(), args.control_port, args.data_port)
        else {
            anyhow::bail!("host, control port and data port are required");
        };
        let command = match (args.list, args.get.as_ref()) {
            (true, None) => Command::List,
            (false, Some(f)) => Command::Get(Filename::new(f.as_str())?),
            (false, None) => anyhow::bail!("no command provided (use -l or -g FILE)"),
            (true, Some(_)) => anyhow::bail!("only one of -l and -g may be given"),
        };
        Ok(Self {
            host: host.clone(),
            control_port,
            data_port,
            command,
        })
    }
}
