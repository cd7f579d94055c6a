//! Options specific to a client session

use clap::Parser;

/// Ports below this are reserved
const LOWEST_PORT: i64 = 1024;

#[derive(Debug, Parser, Clone, Default)]
/// Client-side options which may be provided on the command line, but are not persistent configuration options.
pub struct Parameters {
    /// Enable detailed debug output
    ///
    /// This has the same effect as setting `RUST_LOG=ftclient=debug` in the environment.
    /// If present, `RUST_LOG` overrides this option.
    #[arg(short, long, action, help_heading("Debug"), display_order(0))]
    pub debug: bool,

    /// Log to a file
    ///
    /// By default the log receives everything printed to stderr.
    /// To override this behaviour, set the environment variable `RUST_LOG_FILE_DETAIL` (same semantics as `RUST_LOG`).
    #[arg(
        long,
        action,
        value_name("FILE"),
        help_heading("Output"),
        next_line_help(true),
        display_order(0)
    )]
    pub log_file: Option<String>,

    /// Quiet mode
    ///
    /// Switches off progress display and the transfer summary; reports only errors
    #[arg(short, long, action, conflicts_with("debug"), help_heading("Output"))]
    pub quiet: bool,

    // COMMAND =============================================================================
    /// List the server's directory
    #[arg(short('l'), long, action, conflicts_with("get"), help_heading("Command"))]
    pub list: bool,

    /// Retrieve a file from the server, saving it under the same name in the current directory
    #[arg(short('g'), long, value_name("FILE"), help_heading("Command"))]
    pub get: Option<String>,

    // JOB SPECIFICATION ===================================================================
    // (POSITIONAL ARGUMENTS!)
    /// The server to connect to (hostname or IP address)
    #[arg(value_name = "HOST")]
    pub host: Option<String>,

    /// The server's control port
    #[arg(value_name = "CONTROL_PORT", value_parser = clap::value_parser!(u16).range(LOWEST_PORT..))]
    pub control_port: Option<u16>,

    /// The local port the server should connect back to for the data channel
    #[arg(value_name = "DATA_PORT", value_parser = clap::value_parser!(u16).range(LOWEST_PORT..))]
    pub data_port: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::Parameters;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[test]
    fn debug_option() {
        let params = Parameters::parse_from(["test", "--debug"]);
        assert!(params.debug);
    }

    #[test]
    fn log_file_option() {
        let params = Parameters::parse_from(["test", "--log-file", "log.txt"]);
        assert_eq!(params.log_file, Some("log.txt".to_string()));
    }

    #[test]
    fn quiet_option() {
        let params = Parameters::parse_from(["test", "-q"]);
        assert!(params.quiet);
        assert!(Parameters::try_parse_from(["test", "-q", "-d"]).is_err());
    }

    #[test]
    fn list_form() {
        let params = Parameters::parse_from(["test", "flip1", "30021", "-l", "30020"]);
        assert!(params.list);
        assert_eq!(params.get, None);
        assert_eq!(params.host.as_deref(), Some("flip1"));
        assert_eq!(params.control_port, Some(30021));
        assert_eq!(params.data_port, Some(30020));
    }

    #[test]
    fn get_form() {
        let params = Parameters::parse_from(["test", "flip1", "30021", "-g", "x.txt", "30020"]);
        assert!(!params.list);
        assert_eq!(params.get.as_deref(), Some("x.txt"));
        assert_eq!(params.data_port, Some(30020));
    }

    #[test]
    fn list_and_get_conflict() {
        assert!(
            Parameters::try_parse_from(["test", "h", "30021", "-l", "-g", "x", "30020"]).is_err()
        );
    }

    #[test]
    fn port_range() {
        assert!(Parameters::try_parse_from(["test", "h", "1023", "-l", "30020"]).is_err());
        assert!(Parameters::try_parse_from(["test", "h", "30021", "-l", "65536"]).is_err());
        assert!(Parameters::try_parse_from(["test", "h", "1024", "-l", "65535"]).is_ok());
        assert!(Parameters::try_parse_from(["test", "h", "port", "-l", "30020"]).is_err());
    }
}
