//! General utility code that didn't fit anywhere else

pub mod io;
pub(crate) mod stats;
mod tracing;

pub use tracing::{is_initialized as tracing_is_initialised, TimeFormat};
pub(crate) use tracing::{setup as setup_tracing, trace_level, ConsoleTraceType};

#[cfg(test)]
pub(crate) mod test_protocol;
#[cfg(test)]
pub(crate) mod test_server;
