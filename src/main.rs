//! ftclient - main entrypoint

fn main() -> std::process::ExitCode {
    ftclient::main(std::env::args_os())
}
