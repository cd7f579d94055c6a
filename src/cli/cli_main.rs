//! Main CLI for ftclient

use std::ffi::OsString;
use std::process::ExitCode;

use super::args::{CliArgs, MainMode};
use super::styles::{ERROR, RESET};
use crate::{
    client::{client_main, Parameters, MAX_UPDATE_FPS},
    config::Manager,
    util::{setup_tracing, trace_level, ConsoleTraceType},
};

use anyhow::Result;
use indicatif::{MultiProgress, ProgressDrawTarget};

/// Main CLI entrypoint
///
/// Call this from `main`, passing the arguments to use.
/// Normally you will call `cli(std::env::args_os())` but you can pass in alternate arguments for CLI testing.
///
/// Any failure is reported (to the log if tracing is up, otherwise to stderr) and yields
/// [`ExitCode::FAILURE`].
///
/// # Note
/// This function starts a tokio runtime and performs work in it.
#[must_use]
pub fn cli<I, T>(args: I) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    cli_inner(args)
        .inspect_err(|e| {
            if crate::util::tracing_is_initialised() {
                tracing::error!("{e:#}");
            } else {
                eprintln!("{ERROR}Error:{RESET} {e:#}");
            }
        })
        .map_or(ExitCode::FAILURE, |success| {
            if success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        })
}

/// Inner CLI logic
///
/// # Return
/// true indicates success. false indicates a failure that has already been reported.
fn cli_inner<I, T>(args: I) -> Result<bool>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let Some(args) = parse_args(args)? else {
        return Ok(true); // help/version shown; exit
    };
    let mode = MainMode::from(&args);

    // Fold the command line in with the config files and environment (which may fail)
    let mut config_manager = Manager::standard();
    config_manager.merge_provider(args.config);
    config_manager.apply_system_default();

    handle_mode(mode, config_manager, args.client_params)
}

fn parse_args<I, T>(args: I) -> Result<Option<CliArgs>>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    use clap::error::ErrorKind::{DisplayHelp, DisplayVersion};
    match CliArgs::custom_parse(args) {
        Ok(args) => Ok(Some(args)),
        Err(e) if matches!(e.kind(), DisplayHelp | DisplayVersion) => {
            e.print()?;
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

// MODE HANDLERS ///////////////////////////////////////////////////////////

fn handle_mode(mode: MainMode, config_manager: Manager, client_params: Parameters) -> Result<bool> {
    match mode {
        MainMode::ShowConfigFiles => {
            println!("{:?}", Manager::config_files());
            Ok(true)
        }
        MainMode::ShowConfig => {
            println!("{}", show_config_data(&config_manager));
            let _ = config_manager.configuration()?;
            Ok(true)
        }
        MainMode::Client => run_client(&config_manager, client_params),
    }
}

fn show_config_data(config_manager: &Manager) -> String {
    format!(
        "Client configuration:\n{}",
        config_manager.to_display_adapter()
    )
}

fn run_client(config_manager: &Manager, client_params: Parameters) -> Result<bool> {
    let config = config_manager.configuration()?;

    let progress = if client_params.quiet {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    } else {
        MultiProgress::with_draw_target(ProgressDrawTarget::stderr_with_hz(MAX_UPDATE_FPS))
    };
    let console = if client_params.quiet {
        ConsoleTraceType::Standard
    } else {
        ConsoleTraceType::Indicatif(progress.clone())
    };
    setup_tracing(
        trace_level(&client_params),
        console,
        client_params.log_file.as_ref(),
        config.time_format,
    )?; // to provoke error: set RUST_LOG=.

    run_session(&config, progress, client_params)
}

#[tokio::main(flavor = "current_thread")]
async fn run_session(
    config: &crate::config::Configuration,
    progress: MultiProgress,
    client_params: Parameters,
) -> Result<bool> {
    client_main(config, progress, client_params).await
}
