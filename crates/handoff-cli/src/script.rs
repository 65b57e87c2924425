//! Replay scripts.
//!
//! A script is a JSON array of steps. Each step either plays the part of the
//! cast SDK (discovery and session callbacks, media status), the user (viewer
//! commands) or the OS (app lifecycle). Events published by the coordinator
//! are collected so the caller can print them.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Deserialize;

use handoff_core::config::ResolvedConfig;
use handoff_core::coordinator::CastCoordinator;
use handoff_core::events::HandoffEvent;
use handoff_core::media::MediaItem;
use handoff_core::sim::{SimPlayer, SimPlayerHandle, SimTransport, SimTransportHandle};
use handoff_core::transport::{RequestId, TransportEvent};
use handoff_types::{Device, MediaStatus, StreamType, SuspendReason};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    DeviceFound {
        id: String,
        name: String,
        #[serde(default)]
        model: Option<String>,
    },
    DeviceLost {
        id: String,
    },
    Connect {
        id: String,
    },
    Disconnect,
    SessionStarted {
        id: String,
        #[serde(default)]
        name: Option<String>,
    },
    SessionResumed {
        id: String,
        #[serde(default)]
        name: Option<String>,
    },
    SessionSuspended {
        reason: SuspendReason,
    },
    SessionEnded {
        #[serde(default)]
        error: Option<String>,
    },
    SessionFailed {
        error: String,
    },
    MediaStatus {
        status: MediaStatus,
    },
    RequestCompleted {
        request_id: RequestId,
        #[serde(default)]
        error: Option<String>,
    },
    /// Make the simulated receiver reject session starts (`None` clears it).
    RejectSessions {
        #[serde(default)]
        reason: Option<String>,
    },
    /// Make every remote media command fail synchronously.
    FailCommands {
        enabled: bool,
    },
    OpenViewer {
        content_id: String,
        #[serde(default)]
        title: String,
        #[serde(default)]
        studio: String,
        #[serde(default)]
        duration: f64,
        #[serde(default)]
        stream_type: StreamType,
        #[serde(default)]
        thumbnail: Option<String>,
        /// Duration reported by the local player; unknown when absent.
        #[serde(default)]
        local_duration: Option<f64>,
    },
    CloseViewer,
    Play,
    Pause,
    Stop,
    Seek {
        position: f64,
    },
    Tick,
    AdvanceRemote {
        seconds: f64,
    },
    /// Advance the local player; reaching the end reports end-of-stream.
    AdvanceLocal {
        seconds: f64,
    },
    LocalFinished,
    AppBackgrounded,
    AppTerminating,
    /// Let the position timer run for `ms` milliseconds.
    Wait {
        ms: u64,
    },
}

pub fn parse_script(raw: &str) -> Result<Vec<Step>> {
    serde_json::from_str(raw).context("parse script")
}

pub struct ScriptRunner {
    coordinator: CastCoordinator,
    remote: SimTransportHandle,
    player: Option<SimPlayerHandle>,
    events: Rc<RefCell<Vec<HandoffEvent>>>,
}

impl ScriptRunner {
    pub fn new(config: ResolvedConfig) -> Result<Self> {
        let (transport, remote) = SimTransport::new();
        let mut coordinator = CastCoordinator::new(config, Box::new(transport));
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        coordinator.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        coordinator.add_status_listener(|status| {
            tracing::debug!(status = ?status, "sim: session status");
        });
        coordinator
            .initialise()
            .context("start discovery")?;
        Ok(Self {
            coordinator,
            remote,
            player: None,
            events,
        })
    }

    pub fn coordinator(&self) -> &CastCoordinator {
        &self.coordinator
    }

    pub fn remote(&self) -> &SimTransportHandle {
        &self.remote
    }

    /// Events published since the last call.
    pub fn drain_events(&mut self) -> Vec<HandoffEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn apply(&mut self, step: Step) -> Result<()> {
        tracing::debug!(step = ?step, "sim: step");
        match step {
            Step::DeviceFound { id, name, model } => {
                let mut device = Device::new(id, name);
                device.model_name = model;
                self.transport(TransportEvent::DeviceFound { device });
            }
            Step::DeviceLost { id } => {
                self.transport(TransportEvent::DeviceLost { device_id: id });
            }
            Step::Connect { id } => {
                if let Err(err) = self.coordinator.connect(&id) {
                    tracing::warn!(device_id = %id, error = %err, "sim: connect failed");
                }
            }
            Step::Disconnect => {
                self.coordinator.disconnect();
            }
            Step::SessionStarted { id, name } => {
                let device = self.device(id, name);
                self.transport(TransportEvent::SessionStarted { device });
            }
            Step::SessionResumed { id, name } => {
                let device = self.device(id, name);
                self.transport(TransportEvent::SessionResumed { device });
            }
            Step::SessionSuspended { reason } => {
                self.transport(TransportEvent::SessionSuspended { reason });
            }
            Step::SessionEnded { error } => {
                self.transport(TransportEvent::SessionEnded { error });
            }
            Step::SessionFailed { error } => {
                self.transport(TransportEvent::SessionFailedToStart { error });
            }
            Step::MediaStatus { status } => {
                self.transport(TransportEvent::MediaStatusUpdated { status });
            }
            Step::RequestCompleted { request_id, error } => {
                self.transport(TransportEvent::RemoteRequestCompleted { request_id, error });
            }
            Step::RejectSessions { reason } => {
                self.remote.update(|state| state.reject_sessions = reason);
            }
            Step::FailCommands { enabled } => {
                self.remote.update(|state| state.fail_commands = enabled);
            }
            Step::OpenViewer {
                content_id,
                title,
                studio,
                duration,
                stream_type,
                thumbnail,
                local_duration,
            } => {
                let mut builder = MediaItem::builder(content_id)
                    .title(title)
                    .studio(studio)
                    .duration(duration)
                    .stream_type(stream_type);
                if let Some(url) = thumbnail {
                    builder = builder.thumbnail_url(url);
                }
                let item = builder.build().context("open_viewer")?;
                let (player, handle) = SimPlayer::new(local_duration);
                self.coordinator.open_viewer(item, Box::new(player));
                self.player = Some(handle);
            }
            Step::CloseViewer => {
                self.coordinator.close_viewer();
                self.player = None;
            }
            Step::Play => {
                self.coordinator.play().context("play")?;
            }
            Step::Pause => {
                self.coordinator.pause().context("pause")?;
            }
            Step::Stop => {
                self.coordinator.stop().context("stop")?;
            }
            Step::Seek { position } => {
                self.coordinator.seek(position).context("seek")?;
            }
            Step::Tick => {
                self.coordinator.tick().context("tick")?;
            }
            Step::AdvanceRemote { seconds } => self.remote.advance(seconds),
            Step::AdvanceLocal { seconds } => {
                let player = self
                    .player
                    .as_ref()
                    .context("advance_local needs an open viewer")?;
                if player.advance(seconds) {
                    self.coordinator.local_finished().context("advance_local")?;
                }
            }
            Step::LocalFinished => {
                self.coordinator.local_finished().context("local_finished")?;
            }
            Step::AppBackgrounded => self.coordinator.on_app_backgrounded(),
            Step::AppTerminating => {
                self.coordinator.on_app_terminating();
                self.player = None;
            }
            Step::Wait { ms } => {
                let deadline = Instant::now() + Duration::from_millis(ms);
                while let Some(left) = deadline.checked_duration_since(Instant::now()) {
                    if !self.coordinator.wait_for_input(left) {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn transport(&mut self, event: TransportEvent) {
        self.coordinator.handle_transport_event(event);
    }

    fn device(&self, id: String, name: Option<String>) -> Device {
        let known = self
            .coordinator
            .devices()
            .into_iter()
            .find(|device| device.id == id);
        match (known, name) {
            (_, Some(name)) => Device::new(id, name),
            (Some(device), None) => (*device).clone(),
            (None, None) => Device::new(id.clone(), id),
        }
    }
}

#[cfg(test)]
mod tests {
    use handoff_types::PlaybackState;

    use super::*;

    fn runner() -> ScriptRunner {
        ScriptRunner::new(ResolvedConfig {
            poll_interval: Duration::from_secs(3600),
            ..ResolvedConfig::default()
        })
        .unwrap()
    }

    fn run(runner: &mut ScriptRunner, raw: &str) {
        for step in parse_script(raw).unwrap() {
            runner.apply(step).unwrap();
        }
    }

    #[test]
    fn parses_tagged_steps() {
        let steps = parse_script(
            r#"[
                {"step": "device_found", "id": "tv-1", "name": "Den TV"},
                {"step": "session_suspended", "reason": "app_terminated"},
                {"step": "disconnect"},
                {"step": "seek", "position": 12.5}
            ]"#,
        )
        .unwrap();
        assert_eq!(
            steps,
            vec![
                Step::DeviceFound {
                    id: "tv-1".to_string(),
                    name: "Den TV".to_string(),
                    model: None,
                },
                Step::SessionSuspended {
                    reason: SuspendReason::AppTerminated,
                },
                Step::Disconnect,
                Step::Seek { position: 12.5 },
            ]
        );
    }

    #[test]
    fn unknown_step_is_rejected() {
        assert!(parse_script(r#"[{"step": "reboot"}]"#).is_err());
    }

    #[test]
    fn cast_and_terminate_scenario() {
        let mut runner = runner();
        run(
            &mut runner,
            r#"[
                {"step": "device_found", "id": "d", "name": "Living Room"},
                {"step": "open_viewer", "content_id": "https://cdn.example.net/bbb.mp4", "duration": 596.0, "local_duration": 596.0},
                {"step": "advance_local", "seconds": 42.0},
                {"step": "connect", "id": "d"},
                {"step": "session_started", "id": "d"},
                {"step": "advance_remote", "seconds": 10.0},
                {"step": "session_suspended", "reason": "app_terminated"}
            ]"#,
        );

        assert_eq!(
            runner.coordinator().viewer_state(),
            Some(PlaybackState::PausedLocal)
        );
        let events = runner.drain_events();
        assert!(events.contains(&HandoffEvent::SeekRequestedFromRemote { position: 52.0 }));
        assert!(runner.drain_events().is_empty());
    }

    #[test]
    fn local_end_of_stream_finishes_viewer() {
        let mut runner = runner();
        run(
            &mut runner,
            r#"[
                {"step": "open_viewer", "content_id": "clip", "local_duration": 5.0},
                {"step": "advance_local", "seconds": 6.0}
            ]"#,
        );
        assert_eq!(
            runner.coordinator().viewer_state(),
            Some(PlaybackState::FinishedLocal)
        );
    }

    #[test]
    fn viewer_command_without_viewer_fails_the_step() {
        let mut runner = runner();
        assert!(runner.apply(Step::Play).is_err());
    }

    #[test]
    fn rejected_session_is_reported_not_fatal() {
        let mut runner = runner();
        run(
            &mut runner,
            r#"[
                {"step": "device_found", "id": "d", "name": "Den"},
                {"step": "reject_sessions", "reason": "busy"},
                {"step": "connect", "id": "d"}
            ]"#,
        );
        assert!(!runner.coordinator().is_connected());
        runner
            .remote()
            .with(|state| assert_eq!(state.started_sessions, vec!["d".to_string()]));
    }
}
