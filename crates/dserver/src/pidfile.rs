// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `dserver.pid` handling.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;

/// PID file name inside the data directory.
pub const PID_FILE: &str = "dserver.pid";

const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum PidFileError {
    #[error("dserver already running with pid {0}")]
    AlreadyRunning(i32),

    #[error("no server running ({0} not found)")]
    NotRunning(PathBuf),

    #[error("invalid pid file {path}: {content:?}")]
    Invalid { path: PathBuf, content: String },

    #[error("cannot signal pid {pid}: {source}")]
    Signal {
        pid: i32,
        #[source]
        source: std::io::Error,
    },

    #[error("pid {0} still alive after {1:?}")]
    Timeout(i32, Duration),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The server's PID file.
#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn in_dir(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(PID_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// PID recorded in the file, if the file exists.
    pub fn read(&self) -> Result<Option<i32>, PidFileError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(PidFileError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        content
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| PidFileError::Invalid {
                path: self.path.clone(),
                content,
            })
    }

    /// PID of a live server, removing the file if it is stale.
    pub fn check_running(&self) -> Result<Option<i32>, PidFileError> {
        match self.read() {
            Ok(Some(pid)) if process_alive(pid) => Ok(Some(pid)),
            Ok(Some(pid)) => {
                tracing::warn!("Removing stale pid file for {}", pid);
                self.remove();
                Ok(None)
            }
            Ok(None) => Ok(None),
            Err(PidFileError::Invalid { .. }) => {
                tracing::warn!("Removing unreadable pid file {}", self.path.display());
                self.remove();
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Record the current process, refusing if another server is alive.
    pub fn create(&self) -> Result<(), PidFileError> {
        if let Some(pid) = self.check_running()? {
            return Err(PidFileError::AlreadyRunning(pid));
        }
        std::fs::write(&self.path, format!("{}\n", std::process::id())).map_err(|source| {
            PidFileError::Io {
                path: self.path.clone(),
                source,
            }
        })
    }

    pub fn remove(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Whether a process with this PID exists.
#[cfg(unix)]
pub fn process_alive(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    // SAFETY: signal 0 only performs the existence and permission check.
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() != Some(libc::ESRCH)
}

#[cfg(not(unix))]
pub fn process_alive(_pid: i32) -> bool {
    false
}

/// Send SIGTERM to `pid`, optionally waiting up to `wait` for it to exit.
#[cfg(unix)]
pub fn terminate(pid: i32, wait: Option<Duration>) -> Result<(), PidFileError> {
    if pid <= 0 {
        return Err(PidFileError::Signal {
            pid,
            source: std::io::Error::from(std::io::ErrorKind::InvalidInput),
        });
    }
    // SAFETY: plain kill(2) on a positive pid.
    if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
        return Err(PidFileError::Signal {
            pid,
            source: std::io::Error::last_os_error(),
        });
    }

    let Some(wait) = wait else {
        return Ok(());
    };

    let deadline = Instant::now() + wait;
    while process_alive(pid) {
        if Instant::now() >= deadline {
            return Err(PidFileError::Timeout(pid, wait));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn terminate(pid: i32, _wait: Option<Duration>) -> Result<(), PidFileError> {
    Err(PidFileError::Signal {
        pid,
        source: std::io::Error::from(std::io::ErrorKind::Unsupported),
    })
}
