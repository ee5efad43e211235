//! Command implementation modules
//!
//! Each subcommand lives in its own module and returns the process exit code.

pub mod log;
pub mod run;
pub mod show;
pub mod trace;

pub use log::run_log_command;
pub use run::{run_tracked_command, TrackedRunArgs};
pub use show::run_show_command;
pub use trace::run_trace_command;
