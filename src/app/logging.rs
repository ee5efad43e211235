//! Logging configuration and initialization
//!
//! Log output goes to stderr so that a redirected stdout only ever holds the
//! tracked command's own output. When stderr itself is a file inside the
//! repository, everything lineage would print there goes to a log file in the
//! git directory instead, so the tracked file holds only what the command wrote.

use std::fs::{File, OpenOptions};
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

use crate::app::config::AppConfig;
use crate::git::{Git2Repository, VersionControl};
use crate::tool::{PathResolver, StreamMapper};

/// Name of the diagnostics file below `<git-dir>/lineage`
pub const DIAGNOSTICS_FILE: &str = "lineage.log";

/// Where lineage's own diagnostics are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogDestination {
    Stderr,
    File(PathBuf),
}

impl LogDestination {
    /// Destination for `lineage run` invoked from `config.working_dir`.
    ///
    /// Falls back to stderr when the directory is not in a repository; the
    /// run itself reports that error.
    pub fn for_tracked_run(config: &AppConfig) -> Self {
        let Ok(repository) = Git2Repository::discover(&config.working_dir) else {
            return Self::Stderr;
        };
        let Ok(cwd) = config.working_dir.canonicalize() else {
            return Self::Stderr;
        };
        let mapping = StreamMapper::new(PathResolver::new(repository.root(), cwd)).map();
        Self::for_stderr_target(mapping.stderr.as_deref(), repository.state_dir())
    }

    /// `stderr_target` is the repository-relative file stderr points at
    pub fn for_stderr_target(stderr_target: Option<&Path>, state_dir: &Path) -> Self {
        match stderr_target {
            Some(_) => Self::File(state_dir.join("lineage").join(DIAGNOSTICS_FILE)),
            None => Self::Stderr,
        }
    }
}

static DIAGNOSTICS: OnceLock<Arc<File>> = OnceLock::new();

fn open_diagnostics(path: &Path) -> std::io::Result<Arc<File>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Arc::clone(DIAGNOSTICS.get_or_init(|| Arc::new(file))))
}

/// Print a line meant for the user next to the log output
pub fn diagnostic_line(line: &str) {
    match DIAGNOSTICS.get() {
        Some(file) => {
            let _ = writeln!(&**file, "{line}");
        }
        None => eprintln!("{line}"),
    }
}

/// Filter from `RUST_LOG` when set, otherwise from the verbosity level
fn env_filter(config: &AppConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_level()))
}

/// Initialize tracing/logging for the application
pub fn init_logging(config: &AppConfig) {
    init_logging_to(config, LogDestination::Stderr);
}

/// Initialize tracing/logging, writing to `destination`
pub fn init_logging_to(config: &AppConfig, destination: LogDestination) {
    let (writer, ansi) = match &destination {
        LogDestination::Stderr => (
            BoxMakeWriter::new(std::io::stderr),
            std::io::stderr().is_terminal(),
        ),
        LogDestination::File(path) => match open_diagnostics(path) {
            Ok(file) => (BoxMakeWriter::new(file), false),
            // Nothing may reach the redirected stderr
            Err(_) => (BoxMakeWriter::new(std::io::sink), false),
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(config.verbose >= 3)
        .with_thread_ids(config.verbose >= 3)
        .with_line_number(config.verbose >= 3);

    if subscriber.try_init().is_err() {
        debug!("Tracing subscriber already installed");
    }

    debug!("lineage started with verbosity level: {}", config.verbose);
    debug!("Diagnostics go to {:?}", destination);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());
}

/// Initialize tracing with just a verbosity level
pub fn init_tracing(verbose: u8) {
    init_logging(&AppConfig {
        verbose,
        ..AppConfig::default()
    });
}
