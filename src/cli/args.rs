//! Command line argument definitions

use std::ffi::OsString;

use clap::Parser;

use crate::{client::Parameters, config::ConfigurationOverrides};

/// File transfer client for the LIST/GET protocol.
///
/// Connects to the server's control port, then listens on DATA_PORT for the server to connect
/// back with the directory listing or the file contents.
#[derive(Debug, Parser, Clone)]
#[command(
    author,
    version,
    about,
    override_usage(
        "ftclient [OPTIONS] HOST CONTROL_PORT -l DATA_PORT\n       ftclient [OPTIONS] HOST CONTROL_PORT -g FILE DATA_PORT\n       ftclient [--show-config | --config-files]"
    ),
    styles(super::styles::CLAP_STYLES)
)]
pub(crate) struct CliArgs {
    // MODE SELECTION ======================================================================
    /// Outputs the configuration, then exits
    ///
    /// Each setting is shown with the place it was read from.
    #[arg(long, help_heading("Configuration"), display_order(0))]
    pub(crate) show_config: bool,

    /// Outputs the paths to configuration file(s), then exits
    #[arg(long, help_heading("Configuration"), display_order(0))]
    pub(crate) config_files: bool,

    // CONFIGURABLE OPTIONS ================================================================
    #[command(flatten)]
    pub(crate) config: ConfigurationOverrides,

    // CLIENT-ONLY OPTIONS =================================================================
    #[command(flatten)]
    pub(crate) client_params: Parameters,
}

impl CliArgs {
    /// Parses the given arguments. Help and version requests come back as errors of the
    /// corresponding kind.
    pub(crate) fn custom_parse<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::try_parse_from(args)
    }
}

/// What the program has been asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MainMode {
    Client,
    ShowConfig,
    ShowConfigFiles,
}

impl From<&CliArgs> for MainMode {
    fn from(args: &CliArgs) -> Self {
        if args.show_config {
            MainMode::ShowConfig
        } else if args.config_files {
            MainMode::ShowConfigFiles
        } else {
            MainMode::Client
        }
    }
}
