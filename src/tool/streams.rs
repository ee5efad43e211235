//! Standard-stream destinations as redirection data

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::model::{Redirection, Stream};
use super::paths::PathResolver;

/// Where the stream targets came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSource {
    /// Inherited from the invoking shell, which already opened the files
    Ambient,
    /// Requested by the caller; the runner opens the files itself
    Declared,
}

/// Repository-relative file targets of the three standard streams
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMapping {
    pub stdin: Option<PathBuf>,
    pub stdout: Option<PathBuf>,
    pub stderr: Option<PathBuf>,
    pub source: StreamSource,
}

impl Default for StreamMapping {
    fn default() -> Self {
        Self {
            stdin: None,
            stdout: None,
            stderr: None,
            source: StreamSource::Ambient,
        }
    }
}

impl StreamMapping {
    pub fn target(&self, stream: Stream) -> Option<&Path> {
        match stream {
            Stream::Stdin => self.stdin.as_deref(),
            Stream::Stdout => self.stdout.as_deref(),
            Stream::Stderr => self.stderr.as_deref(),
        }
    }

    pub fn redirections(&self) -> Vec<Redirection> {
        Stream::ALL
            .into_iter()
            .filter_map(|stream| {
                self.target(stream).map(|target| Redirection {
                    stream,
                    target: target.to_path_buf(),
                })
            })
            .collect()
    }

    /// Files the command writes through its stdout/stderr
    pub fn output_targets(&self) -> BTreeSet<PathBuf> {
        self.stdout.iter().chain(&self.stderr).cloned().collect()
    }

    pub fn is_declared(&self) -> bool {
        self.source == StreamSource::Declared
    }
}

/// Works out which standard streams point at files inside the repository
#[derive(Debug, Clone)]
pub struct StreamMapper {
    resolver: PathResolver,
}

impl StreamMapper {
    pub fn new(resolver: PathResolver) -> Self {
        Self { resolver }
    }

    /// Inspect the streams this process inherited
    pub fn map(&self) -> StreamMapping {
        self.map_with(ambient_target)
    }

    /// Build an ambient mapping from `probe`, which reports the file each
    /// stream is attached to (if it is a regular file)
    pub fn map_with<F>(&self, probe: F) -> StreamMapping
    where
        F: Fn(Stream) -> Option<PathBuf>,
    {
        let resolve = |stream: Stream| {
            let file = probe(stream)?;
            match self.resolver.relative(&file) {
                Some(relative) => {
                    debug!("{} is redirected to {}", stream, relative.display());
                    Some(relative)
                }
                None => {
                    warn!(
                        "{} is redirected outside the repository ({}), not recording it",
                        stream,
                        file.display()
                    );
                    None
                }
            }
        };

        StreamMapping {
            stdin: resolve(Stream::Stdin),
            stdout: resolve(Stream::Stdout),
            stderr: resolve(Stream::Stderr),
            source: StreamSource::Ambient,
        }
    }

    /// Streams requested explicitly, relative to the invocation directory
    pub fn declare(
        &self,
        stdin: Option<&Path>,
        stdout: Option<&Path>,
        stderr: Option<&Path>,
    ) -> StreamMapping {
        let resolve = |stream: Stream, path: Option<&Path>| {
            let path = path?;
            let relative = self.resolver.relative(path);
            if relative.is_none() {
                warn!(
                    "{} target {} is outside the repository, not recording it",
                    stream,
                    path.display()
                );
            }
            relative
        };

        StreamMapping {
            stdin: resolve(Stream::Stdin, stdin),
            stdout: resolve(Stream::Stdout, stdout),
            stderr: resolve(Stream::Stderr, stderr),
            source: StreamSource::Declared,
        }
    }
}

/// The regular file behind one of our own standard streams
#[cfg(target_os = "linux")]
fn ambient_target(stream: Stream) -> Option<PathBuf> {
    let link = PathBuf::from(format!("/proc/self/fd/{}", stream.fd()));
    let target = std::fs::read_link(&link).ok()?;
    let metadata = std::fs::metadata(&link).ok()?;
    metadata.is_file().then_some(target)
}

#[cfg(not(target_os = "linux"))]
fn ambient_target(stream: Stream) -> Option<PathBuf> {
    debug!("Cannot inspect {} on this platform", stream);
    None
}
