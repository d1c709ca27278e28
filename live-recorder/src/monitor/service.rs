//! The recording orchestrator.
//!
//! Owns the collection of recordings and is the only place their runtime
//! state is mutated. Every mutation goes through [`Recording::apply`]; the
//! orchestrator then carries out the returned effects (pushes, capture
//! spawn/teardown, re-checks) without holding the entity lock across I/O.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{Local, NaiveTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use platforms_resolver::ResolverRegistry;
use reqwest::Client;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::detector::{CheckRequest, LiveStatus, StreamDetector};
use super::events::{EventBroadcaster, RecordingEvent};
use crate::capture::{broadcast_dir, capture_command};
use crate::config::AppConfig;
use crate::dedup::{
    DedupEngine, DedupTarget, DuplicateReason, HttpShortLinkResolver, ResolverAnchorLookup,
};
use crate::domain::{Effects, Recording, RecordingConfig, RecordingUrl, StateInput};
use crate::notification::{Notifier, notifier_from_config, stream_started_message};
use crate::persistence::{JsonFileStore, RecordingDto, RecordingStore};
use crate::supervisor::{ExitOutcome, ProcessHandle, ProcessSupervisor};
use crate::utils::fs::ensure_dir_all_with_op;
use crate::{Error, Result};

/// Services the orchestrator drives.
pub struct Collaborators {
    pub detector: Arc<StreamDetector>,
    pub dedup: Arc<DedupEngine>,
    pub supervisor: Arc<ProcessSupervisor>,
    pub notifier: Arc<dyn Notifier>,
    pub store: Arc<dyn RecordingStore>,
}

impl Collaborators {
    /// Production wiring: built-in resolvers, HTTP short links, the
    /// configured notifier and the JSON data file.
    pub fn from_config(config: &AppConfig, client: Client) -> Self {
        let resolve_timeout = Duration::from_secs(config.scheduler.resolve_timeout_secs);
        let registry =
            Arc::new(ResolverRegistry::with_defaults(client.clone()).with_timeout(resolve_timeout));

        let detector = StreamDetector::new(Arc::clone(&registry), resolve_timeout)
            .with_credentials(&config.credentials)
            .with_proxy(config.proxy.active());

        let credentials = config.credentials.clone();
        let anchors = ResolverAnchorLookup::new(registry)
            .with_credentials(move |key| credentials.get(key).cloned());
        let dedup = DedupEngine::new(
            &config.dedup,
            Arc::new(HttpShortLinkResolver::new(client.clone())),
            Arc::new(anchors),
        );

        Self {
            detector: Arc::new(detector),
            dedup: Arc::new(dedup),
            supervisor: Arc::new(ProcessSupervisor::new(config.scheduler.kill_timeout())),
            notifier: notifier_from_config(&config.notification, client),
            store: Arc::new(JsonFileStore::new(config.paths.data_file.clone())),
        }
    }
}

struct EntryState {
    recording: Recording,
    capture: Option<ProcessHandle>,
    /// Cancels in-flight checks of the current monitoring session.
    cancel: CancellationToken,
}

struct Entry {
    seq: u64,
    state: Mutex<EntryState>,
}

pub struct RecordingOrchestrator {
    config: AppConfig,
    entries: DashMap<String, Arc<Entry>>,
    next_seq: AtomicU64,
    detector: Arc<StreamDetector>,
    dedup: Arc<DedupEngine>,
    supervisor: Arc<ProcessSupervisor>,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn RecordingStore>,
    events: EventBroadcaster,
    /// Global disk gate; `false` refuses new captures.
    recording_enabled: AtomicBool,
    shutting_down: AtomicBool,
    /// Makes the final duplicate check and the insert of an add atomic.
    add_lock: Mutex<()>,
    /// Orders snapshots with the saves that write them.
    save_lock: tokio::sync::Mutex<()>,
}

impl RecordingOrchestrator {
    pub fn new(config: AppConfig, collaborators: Collaborators) -> Arc<Self> {
        Arc::new(Self {
            config,
            entries: DashMap::new(),
            next_seq: AtomicU64::new(0),
            detector: collaborators.detector,
            dedup: collaborators.dedup,
            supervisor: collaborators.supervisor,
            notifier: collaborators.notifier,
            store: collaborators.store,
            events: EventBroadcaster::new(),
            recording_enabled: AtomicBool::new(true),
            shutting_down: AtomicBool::new(false),
            add_lock: Mutex::new(()),
            save_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn supervisor(&self) -> &Arc<ProcessSupervisor> {
        &self.supervisor
    }

    pub fn detector(&self) -> &Arc<StreamDetector> {
        &self.detector
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventBroadcaster {
        &self.events
    }

    fn entry(&self, id: &str) -> Result<Arc<Entry>> {
        self.entries
            .get(id)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| Error::not_found("recording", id))
    }

    /// Entries in insertion order.
    fn ordered_entries(&self) -> Vec<Arc<Entry>> {
        let mut entries: Vec<Arc<Entry>> =
            self.entries.iter().map(|e| Arc::clone(e.value())).collect();
        entries.sort_by_key(|e| e.seq);
        entries
    }

    fn insert(&self, recording: Recording) -> Recording {
        let snapshot = recording.clone();
        let entry = Entry {
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(EntryState {
                recording,
                capture: None,
                cancel: CancellationToken::new(),
            }),
        };
        self.entries.insert(snapshot.id.clone(), Arc::new(entry));
        snapshot
    }

    pub fn list(&self) -> Vec<Recording> {
        self.ordered_entries()
            .iter()
            .map(|e| e.state.lock().recording.clone())
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<Recording> {
        self.entries
            .get(id)
            .map(|e| e.value().state.lock().recording.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn publish_changed(&self, recording: &Recording) {
        self.events.publish(RecordingEvent::Changed {
            recording_id: recording.id.clone(),
            status: recording.runtime.status,
            message: recording.runtime.status_message.clone(),
        });
    }

    // ---------------------------------------------------------------------
    // persistence
    // ---------------------------------------------------------------------

    /// Restore recordings from the store. Those saved as monitored come back
    /// monitored but unchecked. Invalid entries are skipped.
    pub async fn load(&self) -> Result<usize> {
        let dtos = self.store.load_recordings().await?;
        let mut loaded = 0;
        let mut monitored = Vec::new();

        for dto in dtos {
            let id = dto.id.clone();
            match dto.into_recording() {
                Ok((recording, monitor)) => {
                    if self.entries.contains_key(&recording.id) {
                        warn!(recording_id = %id, "duplicate id in stored recordings, skipping");
                        continue;
                    }
                    self.insert(recording);
                    loaded += 1;
                    if monitor {
                        monitored.push(id);
                    }
                }
                Err(e) => warn!(recording_id = %id, error = %e, "skipping invalid stored recording"),
            }
        }

        // monitoring intent only; the scheduler's first tick runs the checks
        for id in &monitored {
            let entry = self.entry(id)?;
            let mut state = entry.state.lock();
            state.recording.apply(StateInput::MonitorStarted);
        }
        info!(loaded, monitored = monitored.len(), "recordings restored");
        Ok(loaded)
    }

    pub async fn save(&self) -> Result<()> {
        let _guard = self.save_lock.lock().await;
        let dtos: Vec<RecordingDto> = self
            .ordered_entries()
            .iter()
            .map(|e| RecordingDto::from(&e.state.lock().recording))
            .collect();
        self.store.save_recordings(&dtos).await
    }

    async fn persist(&self) {
        if let Err(e) = self.save().await {
            warn!(error = %e, "failed to save recordings");
        }
    }

    // ---------------------------------------------------------------------
    // collection management
    // ---------------------------------------------------------------------

    /// Whether `url` is already covered by a recording.
    pub async fn check_duplicate(
        &self,
        url: &str,
        streamer_name: Option<&str>,
    ) -> (bool, DuplicateReason) {
        let existing: Vec<DedupTarget> = self
            .ordered_entries()
            .iter()
            .map(|e| DedupTarget::from(&e.state.lock().recording))
            .collect();
        let candidate = RecordingUrl::new(url)
            .map(String::from)
            .unwrap_or_else(|_| url.trim().to_string());
        self.dedup.is_duplicate(&candidate, streamer_name, &existing).await
    }

    /// Validate and add a new recording. Monitoring is not started.
    pub async fn add_recording(&self, url: &str, config: RecordingConfig) -> Result<Recording> {
        let recording = Recording::new(RecordingUrl::new(url)?, config)?;

        let (duplicate, reason) = self
            .check_duplicate(
                recording.url.as_str(),
                recording.config.streamer_name.as_deref(),
            )
            .await;
        if duplicate {
            info!(url = %recording.url, reason = reason.code(), "rejected duplicate recording");
            return Err(Error::Duplicate {
                reason: reason.code(),
            });
        }

        let snapshot = {
            let _guard = self.add_lock.lock();
            // a concurrent add may have inserted the same room while we awaited
            let taken = self
                .ordered_entries()
                .iter()
                .any(|e| e.state.lock().recording.url == recording.url);
            if taken {
                info!(url = %recording.url, "rejected duplicate recording added concurrently");
                return Err(Error::Duplicate {
                    reason: DuplicateReason::UrlIdentical.code(),
                });
            }
            self.insert(recording)
        };
        info!(
            recording_id = %snapshot.id,
            url = %snapshot.url,
            platform = %snapshot.platform.key,
            "recording added"
        );
        self.persist().await;
        Ok(snapshot)
    }

    /// Remove a recording. Monitoring must be stopped first.
    pub async fn remove_recording(&self, id: &str) -> Result<()> {
        let entry = self.entry(id)?;
        {
            let state = entry.state.lock();
            let runtime = &state.recording.runtime;
            if runtime.monitor_enabled || state.capture.is_some() {
                return Err(Error::InvalidStateTransition {
                    from: runtime.status.to_string(),
                    to: "removed".to_string(),
                });
            }
        }
        self.entries.remove(id);
        info!(recording_id = %id, "recording removed");
        self.persist().await;
        Ok(())
    }

    /// Replace the configuration of a recording. Clears a halted check so an
    /// edited target is polled again.
    pub async fn update_recording(&self, id: &str, config: RecordingConfig) -> Result<Recording> {
        config.validate()?;
        let entry = self.entry(id)?;
        let snapshot = {
            let mut state = entry.state.lock();
            let recording = &mut state.recording;
            recording.config = config;
            recording.runtime.check_halted = false;
            recording.runtime.consecutive_errors = 0;
            self.publish_changed(recording);
            recording.clone()
        };
        debug!(recording_id = %id, "recording updated");
        self.persist().await;
        Ok(snapshot)
    }

    /// Stop every monitor and drop all recordings.
    pub async fn clear(&self) -> Result<()> {
        for entry in self.ordered_entries() {
            let id = entry.state.lock().recording.id.clone();
            self.stop_monitor(&id).await?;
        }
        self.entries.clear();
        info!("all recordings cleared");
        self.persist().await;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // monitoring
    // ---------------------------------------------------------------------

    /// Start monitoring and check right away.
    pub async fn start_monitor(self: &Arc<Self>, id: &str) -> Result<()> {
        let entry = self.entry(id)?;
        let effects = {
            let mut state = entry.state.lock();
            if state.recording.runtime.monitor_enabled {
                return Ok(());
            }
            state.cancel = CancellationToken::new();
            let effects = state.recording.apply(StateInput::MonitorStarted);
            self.publish_changed(&state.recording);
            effects
        };
        info!(recording_id = %id, "monitoring started");
        self.execute(id, effects, None);
        self.persist().await;
        Ok(())
    }

    /// Stop monitoring. A running capture is torn down before this returns.
    pub async fn stop_monitor(&self, id: &str) -> Result<()> {
        let entry = self.entry(id)?;
        let capture = {
            let mut state = entry.state.lock();
            if !state.recording.runtime.monitor_enabled && state.capture.is_none() {
                return Ok(());
            }
            state.cancel.cancel();
            state
                .recording
                .apply(StateInput::MonitorStopped { at: Utc::now() });
            self.publish_changed(&state.recording);
            state.capture.take()
        };

        if let Some(handle) = capture {
            self.stop_capture(id, &handle).await;
        }
        info!(recording_id = %id, "monitoring stopped");
        self.persist().await;
        Ok(())
    }

    async fn stop_capture(&self, id: &str, handle: &ProcessHandle) {
        match self
            .supervisor
            .stop(handle, self.config.scheduler.stop_grace())
            .await
        {
            Ok(outcome) => info!(
                recording_id = %id,
                pid = handle.pid(),
                forced = outcome.forced,
                "capture stopped"
            ),
            Err(e) => error!(recording_id = %id, pid = handle.pid(), error = %e, "failed to stop capture"),
        }
    }

    fn spawn_check(self: &Arc<Self>, id: &str) {
        if self.shutting_down.load(Ordering::Acquire) {
            return;
        }
        let this = Arc::clone(self);
        let id = id.to_string();
        tokio::spawn(async move {
            if let Err(e) = this.check_if_live(&id).await {
                debug!(recording_id = %id, error = %e, "check skipped");
            }
        });
    }

    /// Check one recording and act on the result. Returns immediately if a
    /// check for it is already in flight.
    pub async fn check_if_live(self: &Arc<Self>, id: &str) -> Result<()> {
        let entry = self.entry(id)?;
        let (request, cancel) = {
            let mut state = entry.state.lock();
            if !state.recording.try_begin_check() {
                debug!(recording_id = %id, "check already in flight or monitoring off");
                return Ok(());
            }
            state.recording.runtime.last_check_at = Some(Instant::now());
            self.publish_changed(&state.recording);
            (CheckRequest::from(&state.recording), state.cancel.clone())
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(recording_id = %id, "check cancelled");
                return Ok(());
            }
            result = self.detector.check(&request) => result,
        };

        let input = match &result {
            Ok(status) => StateInput::CheckSucceeded {
                is_live: status.is_live(),
                title: Some(status.title().to_string()),
                anchor_name: Some(status.anchor_name().to_string()),
                recording_allowed: self.recording_enabled(),
                at: Utc::now(),
            },
            Err(e) => {
                warn!(recording_id = %id, error = %e, "live check failed");
                StateInput::CheckFailed {
                    transient: e.is_transient(),
                    message: e.to_string(),
                }
            }
        };

        let (effects, went_live, snapshot) = {
            let mut state = entry.state.lock();
            if cancel.is_cancelled() {
                return Ok(());
            }
            let was_live = state.recording.runtime.is_live;
            let effects = state.recording.apply(input);
            self.publish_changed(&state.recording);
            let went_live = !was_live && state.recording.runtime.is_live;
            (effects, went_live, state.recording.clone())
        };

        if went_live {
            info!(
                recording_id = %id,
                streamer = %snapshot.display_name(),
                title = snapshot.runtime.live_title.as_deref().unwrap_or_default(),
                "stream is live"
            );
            self.events.publish(RecordingEvent::StreamStarted {
                recording_id: id.to_string(),
                streamer_name: snapshot.display_name().to_string(),
                title: snapshot.runtime.live_title.clone().unwrap_or_default(),
                timestamp: Utc::now(),
            });
        }
        if effects.notify {
            self.spawn_push(snapshot);
        }
        if effects.start_capture
            && let Ok(LiveStatus::Live { stream_url, .. }) = &result
        {
            self.start_capture(&entry, &cancel, stream_url).await;
        }
        self.execute(id, effects, None);
        Ok(())
    }

    /// Carry out the effects that need no further context.
    fn execute(self: &Arc<Self>, id: &str, effects: Effects, capture: Option<&ProcessHandle>) {
        if effects.stop_capture
            && let Some(handle) = capture
        {
            let this = Arc::clone(self);
            let handle = handle.clone();
            let id = id.to_string();
            tokio::spawn(async move { this.stop_capture(&id, &handle).await });
        }
        if effects.recheck {
            self.spawn_check(id);
        }
    }

    /// Send the "stream started" push without delaying the capture.
    fn spawn_push(&self, recording: Recording) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            let (title, body) = stream_started_message(&recording);
            if let Err(e) = notifier.push(&title, &body).await {
                warn!(recording_id = %recording.id, error = %e, "failed to send notification");
            }
        });
    }

    /// Spawn the capture for a live session.
    ///
    /// The spawn happens under the entry lock after checking `cancel`, so a
    /// `stop_monitor` either sees the new capture and tears it down or has
    /// already cancelled and no capture is spawned.
    async fn start_capture(
        self: &Arc<Self>,
        entry: &Arc<Entry>,
        cancel: &CancellationToken,
        stream_url: &str,
    ) {
        let (id, dir, command) = {
            let mut state = entry.state.lock();
            if cancel.is_cancelled() {
                return;
            }
            let recording = &mut state.recording;
            let dir = match recording.runtime.recording_dir.clone() {
                Some(dir) => dir,
                None => {
                    let dir = broadcast_dir(recording, &self.config.paths.save_dir);
                    recording.runtime.recording_dir = Some(dir.clone());
                    dir
                }
            };
            let command = capture_command(
                &self.config.ffmpeg,
                recording,
                stream_url,
                &dir,
                self.config.proxy.active(),
                Local::now(),
            );
            (recording.id.clone(), dir, command)
        };

        if let Err(e) = ensure_dir_all_with_op("creating recording directory", &dir).await {
            let mut state = entry.state.lock();
            if !cancel.is_cancelled() {
                self.capture_failed(&mut state, &e);
            }
            return;
        }

        let (handle, effects) = {
            let mut state = entry.state.lock();
            if cancel.is_cancelled() || !state.recording.runtime.monitor_enabled {
                debug!(recording_id = %id, "monitoring stopped before the capture started");
                return;
            }
            let handle = match self.supervisor.spawn(command) {
                Ok(handle) => handle,
                Err(e) => {
                    self.capture_failed(&mut state, &e);
                    return;
                }
            };
            let effects = state.recording.apply(StateInput::CaptureStarted {
                output_path: handle.output_path().map(Path::to_path_buf).unwrap_or_default(),
                at: Utc::now(),
            });
            if !effects.stop_capture {
                state.capture = Some(handle.clone());
                self.publish_changed(&state.recording);
            }
            (handle, effects)
        };

        if effects.stop_capture {
            warn!(recording_id = %id, pid = handle.pid(), "target changed while the capture started, stopping it");
            self.execute(&id, effects, Some(&handle));
            return;
        }

        info!(
            recording_id = %id,
            pid = handle.pid(),
            output = %handle.output_path().map(|p| p.display().to_string()).unwrap_or_default(),
            "capture started"
        );
        self.watch_capture(id, handle);
    }

    fn capture_failed(&self, state: &mut EntryState, err: &Error) {
        error!(recording_id = %state.recording.id, error = %err, "failed to start capture");
        state.recording.apply(StateInput::CaptureSpawnFailed {
            message: err.to_string(),
        });
        self.publish_changed(&state.recording);
    }

    fn watch_capture(self: &Arc<Self>, id: String, handle: ProcessHandle) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = handle.wait().await;
            this.on_capture_exit(&id, &handle, outcome);
        });
    }

    fn on_capture_exit(self: &Arc<Self>, id: &str, handle: &ProcessHandle, outcome: ExitOutcome) {
        let entry = self.entries.get(id).map(|e| Arc::clone(e.value()));
        let effects = match entry {
            Some(entry) => {
                let mut state = entry.state.lock();
                // a capture replaced or torn down by stop_monitor is already accounted for
                if state.capture.as_ref().map(ProcessHandle::id) == Some(handle.id()) {
                    state.capture = None;
                    let effects = state.recording.apply(StateInput::CaptureExited {
                        success: outcome.success,
                        code: outcome.code,
                        at: Utc::now(),
                    });
                    self.publish_changed(&state.recording);
                    effects
                } else {
                    Effects::default()
                }
            }
            None => Effects::default(),
        };

        if outcome.success || outcome.forced {
            info!(recording_id = %id, code = ?outcome.code, "capture finished");
        } else {
            warn!(
                recording_id = %id,
                error = %Error::ProcessAbnormalExit { code: outcome.code },
                last_output = %handle.last_output().unwrap_or_default(),
                "capture failed"
            );
        }
        self.events.publish(RecordingEvent::CaptureFinished {
            recording_id: id.to_string(),
            output_path: handle.output_path().map(Path::to_path_buf),
            success: outcome.success,
            timestamp: Utc::now(),
        });
        self.execute(id, effects, None);
    }

    // ---------------------------------------------------------------------
    // scheduler hooks
    // ---------------------------------------------------------------------

    pub fn recording_enabled(&self) -> bool {
        self.recording_enabled.load(Ordering::Acquire)
    }

    /// Set the disk gate, returning the previous value.
    pub fn set_recording_enabled(&self, enabled: bool) -> bool {
        self.recording_enabled.swap(enabled, Ordering::AcqRel)
    }

    /// Prune captures whose process vanished and fail their recordings.
    pub fn reconcile(&self) -> usize {
        let pruned = self.supervisor.reconcile();
        for handle in &pruned {
            let entry = self.entries.get(handle.owner_id()).map(|e| Arc::clone(e.value()));
            let Some(entry) = entry else {
                continue;
            };
            let mut state = entry.state.lock();
            // an exit observed by the reaper is reported by watch_capture
            if handle.has_exited() {
                continue;
            }
            if state.capture.as_ref().map(ProcessHandle::id) == Some(handle.id()) {
                warn!(recording_id = %handle.owner_id(), pid = handle.pid(), "capture process vanished");
                state.capture = None;
                state.recording.apply(StateInput::CaptureExited {
                    success: false,
                    code: None,
                    at: Utc::now(),
                });
                self.publish_changed(&state.recording);
            }
        }
        pruned.len()
    }

    /// Ids of the recordings to check on this tick.
    ///
    /// Skips targets not monitored, mid-check or halted. Targets outside
    /// their scheduled window are marked out of schedule instead. `slack`
    /// absorbs the delay between a tick and the check it dispatched.
    pub fn due_for_check(&self, now: Instant, local_time: NaiveTime, slack: Duration) -> Vec<String> {
        let base = self.config.scheduler.interval();
        let mut due = Vec::new();

        for entry in self.ordered_entries() {
            let mut state = entry.state.lock();
            let recording = &mut state.recording;
            let runtime = &recording.runtime;
            if !runtime.monitor_enabled || runtime.is_checking || runtime.check_halted {
                continue;
            }

            if let Ok(Some(window)) = recording.config.schedule()
                && !window.contains(local_time)
            {
                let before = recording.runtime.status;
                recording.apply(StateInput::OutOfSchedule);
                if recording.runtime.status != before {
                    debug!(recording_id = %recording.id, "outside scheduled window");
                    self.publish_changed(recording);
                }
                continue;
            }

            let interval = recording
                .config
                .loop_time_secs
                .map(Duration::from_secs)
                .unwrap_or(base);
            if recording.runtime.is_due(now + slack, interval) {
                due.push(recording.id.clone());
            }
        }
        due
    }

    /// Dispatch a check for each id without waiting for it.
    pub fn dispatch_checks(self: &Arc<Self>, ids: &[String]) {
        for id in ids {
            self.spawn_check(id);
        }
    }

    /// Stop all captures and save. Monitor flags are kept so monitoring
    /// resumes on the next start.
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);
        for entry in self.ordered_entries() {
            entry.state.lock().cancel.cancel();
        }
        let results = self
            .supervisor
            .shutdown_all(self.config.scheduler.stop_grace())
            .await;
        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            warn!(failed, "some captures did not stop cleanly");
        }
        self.persist().await;
        info!("orchestrator shut down");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::path::PathBuf;

    use platforms_resolver::default_client;

    use super::*;
    use crate::dedup::NoAnchorLookup;
    use crate::domain::RecordingStatus;
    use crate::notification::LogNotifier;
    use crate::persistence::MemoryStore;

    fn orchestrator() -> Arc<RecordingOrchestrator> {
        let config = AppConfig::default();
        let client = default_client().unwrap();
        let registry = Arc::new(ResolverRegistry::new(client.clone()));
        let collaborators = Collaborators {
            detector: Arc::new(StreamDetector::new(registry, Duration::from_secs(1))),
            dedup: Arc::new(DedupEngine::new(
                &config.dedup,
                Arc::new(HttpShortLinkResolver::new(client)),
                Arc::new(NoAnchorLookup),
            )),
            supervisor: Arc::new(ProcessSupervisor::new(Duration::from_secs(2))),
            notifier: Arc::new(LogNotifier),
            store: Arc::new(MemoryStore::new()),
        };
        RecordingOrchestrator::new(config, collaborators)
    }

    #[tokio::test]
    async fn test_reconcile_fails_recording_whose_capture_vanished() {
        let orchestrator = orchestrator();
        let id = orchestrator
            .add_recording("https://www.twitch.tv/alice", RecordingConfig::default())
            .await
            .unwrap()
            .id;

        let mut gone = std::process::Command::new("true").spawn().unwrap();
        let pid = gone.id();
        gone.wait().unwrap();
        let (handle, _exit_tx) = orchestrator.supervisor.track_pid(&id, pid);

        {
            let entry = orchestrator.entry(&id).unwrap();
            let mut state = entry.state.lock();
            let recording = &mut state.recording;
            recording.apply(StateInput::MonitorStarted);
            assert!(recording.try_begin_check());
            let effects = recording.apply(StateInput::CheckSucceeded {
                is_live: true,
                title: Some("late night".into()),
                anchor_name: Some("alice".into()),
                recording_allowed: true,
                at: Utc::now(),
            });
            assert!(effects.start_capture);
            recording.apply(StateInput::CaptureStarted {
                output_path: PathBuf::from("alice.ts"),
                at: Utc::now(),
            });
            state.capture = Some(handle);
        }
        assert_eq!(
            orchestrator.get(&id).unwrap().runtime.status,
            RecordingStatus::Recording
        );

        assert_eq!(orchestrator.reconcile(), 1);
        let recording = orchestrator.get(&id).unwrap();
        assert_eq!(recording.runtime.status, RecordingStatus::RecordingError);
        assert!(!recording.runtime.is_recording);
        assert!(recording.runtime.monitor_enabled);
        assert_eq!(orchestrator.supervisor.active_count(), 0);
        assert_eq!(orchestrator.reconcile(), 0);
    }
}
