//! Spawning, stopping and tracking capture processes.

use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::handle::{CaptureCommand, ExitOutcome, HandleInner, ProcessHandle};
use crate::{Error, Result};

/// Owns every running capture process.
///
/// Each spawned child is reaped by a dedicated task that removes it from the
/// registry and publishes its [`ExitOutcome`]; callers observe completion
/// through [`ProcessHandle::wait`].
pub struct ProcessSupervisor {
    registry: Arc<DashMap<u64, ProcessHandle>>,
    next_id: AtomicU64,
    kill_timeout: Duration,
}

impl ProcessSupervisor {
    pub fn new(kill_timeout: Duration) -> Self {
        Self {
            registry: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
            kill_timeout,
        }
    }

    /// Launch `command` and start supervising it.
    pub fn spawn(&self, command: CaptureCommand) -> Result<ProcessHandle> {
        let mut cmd = process_utils::capture_command(&command.program);
        cmd.args(&command.args)
            .env("LC_ALL", "C")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(false);
        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| {
            Error::ProcessSpawn(format!("{}: {}", command.program, e))
        })?;
        let pid = child
            .id()
            .ok_or_else(|| Error::ProcessSpawn("process exited before it could be tracked".into()))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (exit_tx, exit_rx) = watch::channel(None);
        let handle = ProcessHandle {
            inner: Arc::new(HandleInner {
                id,
                pid,
                owner_id: command.owner_id.clone(),
                output_path: command.output_path(),
                started_at: Utc::now(),
                stdin: tokio::sync::Mutex::new(child.stdin.take()),
                last_output: Mutex::new(None),
                exit_rx,
            }),
        };
        self.registry.insert(id, handle.clone());

        if let Some(stderr) = child.stderr.take() {
            let handle = handle.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(pid, owner_id = %handle.owner_id(), "{}", line);
                    *handle.inner.last_output.lock() = Some(line);
                }
            });
        }

        let registry = Arc::clone(&self.registry);
        let owner_id = command.owner_id.clone();
        tokio::spawn(async move {
            let outcome = match child.wait().await {
                Ok(status) => ExitOutcome::from_status(status),
                Err(e) => {
                    error!(pid, error = %e, "failed to wait for capture process");
                    ExitOutcome::unknown()
                }
            };
            registry.remove(&id);
            debug!(pid, owner_id = %owner_id, code = ?outcome.code, "capture process exited");
            let _ = exit_tx.send(Some(outcome));
        });

        info!(
            pid,
            handle_id = id,
            owner_id = %command.owner_id,
            program = %command.program,
            "capture process started"
        );
        Ok(handle)
    }

    /// Stop a capture: ask it to finish, wait up to `grace`, then kill the
    /// whole process tree and wait up to the kill timeout.
    pub async fn stop(&self, handle: &ProcessHandle, grace: Duration) -> Result<ExitOutcome> {
        if let Some(outcome) = handle.exit_status() {
            return Ok(outcome);
        }

        let pid = handle.pid();
        if self.request_graceful_stop(handle).await {
            if let Ok(outcome) = tokio::time::timeout(grace, handle.wait()).await {
                info!(pid, code = ?outcome.code, "capture process stopped gracefully");
                return Ok(outcome);
            }
            warn!(pid, grace_secs = grace.as_secs_f64(), "capture ignored stop request, killing process tree");
        }

        let killed = process_utils::kill_tree(pid);
        match tokio::time::timeout(self.kill_timeout, handle.wait()).await {
            Ok(mut outcome) => {
                outcome.forced = true;
                info!(pid, killed, "capture process tree killed");
                Ok(outcome)
            }
            Err(_) => {
                self.registry.remove(&handle.id());
                Err(Error::Other(format!(
                    "capture process {pid} still running {}s after kill",
                    self.kill_timeout.as_secs()
                )))
            }
        }
    }

    #[cfg(windows)]
    async fn request_graceful_stop(&self, handle: &ProcessHandle) -> bool {
        handle.request_quit().await
    }

    #[cfg(not(windows))]
    async fn request_graceful_stop(&self, handle: &ProcessHandle) -> bool {
        process_utils::send_interrupt(handle.pid()) || handle.request_quit().await
    }

    /// Handles of every capture still registered.
    pub fn list_active(&self) -> Vec<ProcessHandle> {
        self.registry.iter().map(|e| e.value().clone()).collect()
    }

    pub fn get(&self, id: u64) -> Option<ProcessHandle> {
        self.registry.get(&id).map(|e| e.value().clone())
    }

    /// Whether the process behind `handle` still exists in the OS process
    /// table, independent of what the reaper task has observed.
    pub fn verify_alive(&self, handle: &ProcessHandle) -> bool {
        !handle.has_exited() && process_utils::is_process_alive(handle.pid())
    }

    /// Drop registry entries whose process is gone and return them.
    ///
    /// A child that exited but is not reaped yet stays in the process table
    /// as a zombie and is left to its reaper task, which reports the real
    /// exit outcome.
    pub fn reconcile(&self) -> Vec<ProcessHandle> {
        let mut stale = Vec::new();
        for handle in self.list_active() {
            if handle.has_exited() || process_utils::process_exists(handle.pid()) {
                continue;
            }
            // reaped between the two checks above
            if handle.has_exited() {
                continue;
            }
            if self.registry.remove(&handle.id()).is_some() {
                warn!(
                    pid = handle.pid(),
                    owner_id = %handle.owner_id(),
                    "pruned capture whose process vanished"
                );
                stale.push(handle);
            }
        }
        stale
    }

    /// Register a handle for `pid` without spawning or reaping anything.
    #[cfg(test)]
    pub(crate) fn track_pid(
        &self,
        owner_id: &str,
        pid: u32,
    ) -> (ProcessHandle, watch::Sender<Option<ExitOutcome>>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (exit_tx, exit_rx) = watch::channel(None);
        let handle = ProcessHandle {
            inner: Arc::new(HandleInner {
                id,
                pid,
                owner_id: owner_id.to_string(),
                output_path: None,
                started_at: Utc::now(),
                stdin: tokio::sync::Mutex::new(None),
                last_output: Mutex::new(None),
                exit_rx,
            }),
        };
        self.registry.insert(id, handle.clone());
        (handle, exit_tx)
    }

    /// Stop every capture concurrently and wait for all of them.
    pub async fn shutdown_all(&self, grace: Duration) -> Vec<Result<ExitOutcome>> {
        let handles = self.list_active();
        if handles.is_empty() {
            return Vec::new();
        }
        info!(count = handles.len(), "stopping all captures");
        join_all(handles.iter().map(|h| self.stop(h, grace))).await
    }

    pub fn active_count(&self) -> usize {
        self.registry.len()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sleep_command(secs: &str) -> CaptureCommand {
        CaptureCommand {
            program: "sleep".into(),
            args: vec![secs.into()],
            working_dir: None,
            owner_id: "rec-1".into(),
        }
    }

    #[tokio::test]
    async fn test_spawn_and_natural_exit() {
        let supervisor = ProcessSupervisor::new(Duration::from_secs(5));
        let handle = supervisor.spawn(sleep_command("0")).unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.code, Some(0));
        assert!(handle.has_exited());
        assert!(supervisor.list_active().is_empty());
    }

    #[tokio::test]
    async fn test_spawn_missing_binary() {
        let supervisor = ProcessSupervisor::new(Duration::from_secs(5));
        let err = supervisor
            .spawn(CaptureCommand {
                program: "/nonexistent/ffmpeg".into(),
                args: vec![],
                working_dir: None,
                owner_id: "rec".into(),
            })
            .unwrap_err();
        assert!(matches!(err, Error::ProcessSpawn(_)));
    }

    #[tokio::test]
    async fn test_graceful_stop() {
        let supervisor = ProcessSupervisor::new(Duration::from_secs(5));
        let handle = supervisor.spawn(sleep_command("30")).unwrap();
        assert!(supervisor.verify_alive(&handle));
        assert_eq!(supervisor.list_active().len(), 1);

        let outcome = supervisor.stop(&handle, Duration::from_secs(5)).await.unwrap();
        assert!(!outcome.forced);
        assert!(!outcome.success);
        assert!(!supervisor.verify_alive(&handle));
    }

    #[tokio::test]
    async fn test_shutdown_all() {
        let supervisor = ProcessSupervisor::new(Duration::from_secs(5));
        for _ in 0..3 {
            supervisor.spawn(sleep_command("30")).unwrap();
        }
        assert_eq!(supervisor.active_count(), 3);

        let results = supervisor.shutdown_all(Duration::from_secs(5)).await;
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(supervisor.active_count(), 0);
    }

    #[tokio::test]
    async fn test_reconcile_leaves_reaped_captures_alone() {
        let supervisor = ProcessSupervisor::new(Duration::from_secs(5));
        let handle = supervisor.spawn(sleep_command("30")).unwrap();
        assert!(supervisor.reconcile().is_empty());

        process_utils::kill_tree(handle.pid());
        tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .unwrap();

        // already gone from the registry by the reaper, nothing left to prune
        assert!(supervisor.reconcile().is_empty());
        assert!(!supervisor.verify_alive(&handle));
    }

    #[tokio::test]
    async fn test_reconcile_prunes_vanished_process() {
        let supervisor = ProcessSupervisor::new(Duration::from_secs(5));
        let mut gone = std::process::Command::new("true").spawn().unwrap();
        let pid = gone.id();
        gone.wait().unwrap();

        let (handle, _exit_tx) = supervisor.track_pid("rec-1", pid);
        assert_eq!(supervisor.active_count(), 1);

        let pruned = supervisor.reconcile();
        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned[0].id(), handle.id());
        assert_eq!(supervisor.active_count(), 0);
        assert!(supervisor.reconcile().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_keeps_unreaped_exit() {
        let supervisor = ProcessSupervisor::new(Duration::from_secs(5));
        let mut zombie = std::process::Command::new("true").spawn().unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        let (_handle, _exit_tx) = supervisor.track_pid("rec-1", zombie.id());
        assert!(supervisor.reconcile().is_empty());
        assert_eq!(supervisor.active_count(), 1);
        zombie.wait().unwrap();
    }
}
