//! Capture commands and handles to running captures.

use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::process::ChildStdin;
use tokio::sync::watch;
use tracing::debug;

/// A fully built capture invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Id of the recording this capture belongs to.
    pub owner_id: String,
}

impl CaptureCommand {
    /// The output path, which is always the last argument.
    pub fn output_path(&self) -> Option<PathBuf> {
        self.args.last().map(PathBuf::from)
    }
}

/// How a capture process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    pub code: Option<i32>,
    pub success: bool,
    /// The process tree had to be killed after the grace period.
    pub forced: bool,
}

impl ExitOutcome {
    pub(crate) fn from_status(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
            success: status.success(),
            forced: false,
        }
    }

    /// The exit could not be observed.
    pub(crate) fn unknown() -> Self {
        Self {
            code: None,
            success: false,
            forced: false,
        }
    }
}

pub(crate) struct HandleInner {
    pub(crate) id: u64,
    pub(crate) pid: u32,
    pub(crate) owner_id: String,
    pub(crate) output_path: Option<PathBuf>,
    pub(crate) started_at: DateTime<Utc>,
    pub(crate) stdin: tokio::sync::Mutex<Option<ChildStdin>>,
    pub(crate) last_output: Mutex<Option<String>>,
    pub(crate) exit_rx: watch::Receiver<Option<ExitOutcome>>,
}

/// Cheaply clonable handle to a supervised capture process.
#[derive(Clone)]
pub struct ProcessHandle {
    pub(crate) inner: Arc<HandleInner>,
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("id", &self.inner.id)
            .field("pid", &self.inner.pid)
            .field("owner_id", &self.inner.owner_id)
            .finish()
    }
}

impl ProcessHandle {
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn pid(&self) -> u32 {
        self.inner.pid
    }

    pub fn owner_id(&self) -> &str {
        &self.inner.owner_id
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.inner.output_path.as_deref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.inner.started_at
    }

    /// Last line the process wrote to stderr.
    pub fn last_output(&self) -> Option<String> {
        self.inner.last_output.lock().clone()
    }

    /// Exit outcome, if the process has already been reaped.
    pub fn exit_status(&self) -> Option<ExitOutcome> {
        *self.inner.exit_rx.borrow()
    }

    pub fn has_exited(&self) -> bool {
        self.exit_status().is_some()
    }

    /// Wait for the process to exit.
    pub async fn wait(&self) -> ExitOutcome {
        let mut rx = self.inner.exit_rx.clone();
        match rx.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome).unwrap_or_else(ExitOutcome::unknown),
            Err(_) => ExitOutcome::unknown(),
        }
    }

    /// Ask ffmpeg to finish by writing `q` to its stdin.
    pub(crate) async fn request_quit(&self) -> bool {
        let mut stdin = self.inner.stdin.lock().await;
        let Some(pipe) = stdin.as_mut() else {
            return false;
        };
        match pipe.write_all(b"q").await {
            Ok(()) => {
                let _ = pipe.flush().await;
                true
            }
            Err(e) => {
                debug!(pid = self.inner.pid, error = %e, "failed to write quit command");
                false
            }
        }
    }
}
