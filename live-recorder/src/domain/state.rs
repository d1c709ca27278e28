//! Recording state machine.
//!
//! Transitions are pure: [`Recording::apply`] mutates the runtime for one
//! [`StateInput`] and returns the [`Effects`] the orchestrator must carry
//! out (notify, spawn or stop a capture, re-check). Keeping I/O out of here
//! lets the invariants be tested without processes or network.
//!
//! Invariants upheld by every transition:
//! - `is_recording` implies `is_live`.
//! - The notification is re-armed only when the stream is observed to end
//!   (live true -> false) or monitoring is stopped.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::recording::{Recording, RecordingStatus};

/// "Stream started" push bookkeeping for the current live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NotificationState {
    /// Next live detection pushes.
    #[default]
    Armed,
    /// Pushed for this session; no capture yet.
    Sent,
    /// Pushed and a capture ran; a capture ending mid-stream stays silent.
    SentAndRecorded,
}

impl NotificationState {
    /// Consume the armed state. Returns `true` exactly once per session.
    pub fn fire(&mut self) -> bool {
        if *self == Self::Armed {
            *self = Self::Sent;
            true
        } else {
            false
        }
    }

    pub fn mark_recorded(&mut self) {
        *self = Self::SentAndRecorded;
    }

    pub fn rearm(&mut self) {
        *self = Self::Armed;
    }

    pub fn is_armed(&self) -> bool {
        *self == Self::Armed
    }
}

/// Inputs driving a recording's state.
#[derive(Debug, Clone, PartialEq)]
pub enum StateInput {
    MonitorStarted,
    MonitorStopped {
        at: DateTime<Utc>,
    },
    CheckSucceeded {
        is_live: bool,
        title: Option<String>,
        anchor_name: Option<String>,
        /// Global disk gate; `false` refuses new captures.
        recording_allowed: bool,
        at: DateTime<Utc>,
    },
    CheckFailed {
        transient: bool,
        message: String,
    },
    CaptureStarted {
        output_path: PathBuf,
        at: DateTime<Utc>,
    },
    CaptureSpawnFailed {
        message: String,
    },
    CaptureExited {
        success: bool,
        code: Option<i32>,
        at: DateTime<Utc>,
    },
    OutOfSchedule,
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Effects {
    /// Push a "stream started" notification.
    pub notify: bool,
    /// Spawn a capture for the current live session.
    pub start_capture: bool,
    /// Tear down the running capture.
    pub stop_capture: bool,
    /// Check again without waiting for the next tick.
    pub recheck: bool,
}

impl Recording {
    /// Claim the single in-flight check slot. Returns `false` if a check is
    /// already running or monitoring is off.
    pub fn try_begin_check(&mut self) -> bool {
        let rt = &mut self.runtime;
        if rt.is_checking || !rt.monitor_enabled {
            return false;
        }
        rt.is_checking = true;
        if !rt.is_recording {
            rt.status = RecordingStatus::Checking;
        }
        true
    }

    /// Apply one input and return the effects to execute.
    pub fn apply(&mut self, input: StateInput) -> Effects {
        let mut effects = Effects::default();
        let captures = self.config.captures();
        let push_enabled = self.config.push_enabled;
        let rt = &mut self.runtime;

        match input {
            StateInput::MonitorStarted => {
                rt.monitor_enabled = true;
                rt.check_halted = false;
                rt.consecutive_errors = 0;
                rt.last_check_at = None;
                if !rt.is_recording {
                    rt.status = RecordingStatus::Checking;
                    rt.status_message = None;
                }
                effects.recheck = true;
            }
            StateInput::MonitorStopped { at } => {
                if rt.is_recording {
                    effects.stop_capture = true;
                    Self::finish_capture(rt, at);
                }
                rt.monitor_enabled = false;
                rt.is_checking = false;
                rt.is_live = false;
                rt.notification.rearm();
                rt.recording_dir = None;
                rt.detection_time = None;
                rt.status = RecordingStatus::Idle;
                rt.status_message = None;
            }
            StateInput::CheckSucceeded {
                is_live,
                title,
                anchor_name,
                recording_allowed,
                at,
            } => {
                rt.is_checking = false;
                rt.consecutive_errors = 0;
                if title.is_some() {
                    rt.live_title = title;
                }
                if anchor_name.as_deref().is_some_and(|n| !n.is_empty()) {
                    rt.anchor_name = anchor_name;
                }
                if !rt.monitor_enabled {
                    // stopped while the check was in flight
                    return effects;
                }

                if !is_live {
                    if rt.is_recording {
                        // the running capture is authoritative until it exits
                        return effects;
                    }
                    if rt.is_live {
                        rt.notification.rearm();
                        rt.recording_dir = None;
                        rt.detection_time = None;
                    }
                    rt.is_live = false;
                    rt.status = RecordingStatus::Offline;
                    rt.status_message = None;
                    return effects;
                }

                if !rt.is_live {
                    rt.is_live = true;
                    rt.detection_time = Some(at);
                }
                effects.notify = rt.notification.fire() && push_enabled;

                if rt.is_recording {
                    rt.status = RecordingStatus::Recording;
                } else if !captures {
                    rt.status = RecordingStatus::LiveNotRecording;
                    rt.status_message = None;
                } else if !recording_allowed {
                    rt.status = RecordingStatus::DiskFull;
                    rt.status_message = Some("free disk space below threshold".to_string());
                } else {
                    effects.start_capture = true;
                }
            }
            StateInput::CheckFailed { transient, message } => {
                rt.is_checking = false;
                if transient {
                    rt.consecutive_errors = rt.consecutive_errors.saturating_add(1);
                } else {
                    rt.check_halted = true;
                }
                if !rt.is_recording && rt.monitor_enabled {
                    rt.status = RecordingStatus::CheckError;
                    rt.status_message = Some(message);
                }
            }
            StateInput::CaptureStarted { output_path, at } => {
                if !captures || !rt.is_live || !rt.monitor_enabled || rt.is_recording {
                    // stale start; the caller must tear the process down
                    effects.stop_capture = true;
                    return effects;
                }
                rt.is_recording = true;
                rt.start_time = Some(at);
                rt.output_path = Some(output_path);
                rt.notification.mark_recorded();
                rt.status = RecordingStatus::Recording;
                rt.status_message = None;
            }
            StateInput::CaptureSpawnFailed { message } => {
                rt.status = RecordingStatus::RecordingError;
                rt.status_message = Some(message);
            }
            StateInput::CaptureExited { success, code, at } => {
                if !rt.is_recording {
                    return effects;
                }
                Self::finish_capture(rt, at);
                if success {
                    rt.status = if rt.monitor_enabled {
                        RecordingStatus::Offline
                    } else {
                        RecordingStatus::Idle
                    };
                    rt.status_message = None;
                    effects.recheck = rt.monitor_enabled;
                } else {
                    rt.status = RecordingStatus::RecordingError;
                    rt.status_message = Some(match code {
                        Some(code) => format!("capture exited with code {code}"),
                        None => "capture terminated by signal".to_string(),
                    });
                }
            }
            StateInput::OutOfSchedule => {
                if !rt.is_recording && !rt.is_checking {
                    rt.status = RecordingStatus::OutOfSchedule;
                    rt.status_message = None;
                }
            }
        }

        effects
    }

    fn finish_capture(rt: &mut super::recording::RecordingRuntime, at: DateTime<Utc>) {
        rt.is_recording = false;
        if let Some(start) = rt.start_time.take() {
            let elapsed = (at - start).to_std().unwrap_or_default();
            rt.last_duration = elapsed;
            rt.cumulative_duration += elapsed;
        }
    }
}
