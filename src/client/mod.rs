//! client-side main loop and supporting structures

pub mod control;
pub mod data;
pub mod job;
mod options;
mod progress;
pub mod session;

pub use job::TransferJob;
pub use options::Parameters;
pub use session::{client_main, run_get, run_job, run_list, GetOutcome, SessionOutcome, SessionState};

pub(crate) use progress::MAX_UPDATE_FPS;
