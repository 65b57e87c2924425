//! In-memory transport and player.
//!
//! Used by the script runner and the test suites. Each double records what it
//! was asked to do in a shared state that the paired handle can inspect and
//! drive from outside the coordinator.

use std::sync::{Arc, Mutex, MutexGuard};

use handoff_types::{Device, MediaDescriptor, MediaStatus, RemotePlayerState, SuspendReason};

use crate::transport::{
    CastTransport, DiscoveryCriteria, LoadOptions, LocalPlayer, RemoteMediaClient, RequestId,
    ResumeState, SeekOptions, TransportError,
};

fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state.lock().unwrap_or_else(|err| err.into_inner())
}

/// Media command received by the simulated receiver.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCommand {
    Load {
        content_id: String,
        studio: String,
        position: f64,
    },
    Play,
    Pause,
    Seek {
        position: f64,
        resume_state: ResumeState,
    },
}

#[derive(Debug, Default)]
pub struct SimTransportState {
    pub discovery: Option<DiscoveryCriteria>,
    /// Device ids passed to `start_session`, in order.
    pub started_sessions: Vec<String>,
    pub ended_sessions: usize,
    pub stopped_casting: bool,
    pub suspensions: Vec<SuspendReason>,
    /// When set, `start_session` fails with this message.
    pub reject_sessions: Option<String>,
    /// When set, every media command fails synchronously.
    pub fail_commands: bool,
    pub commands: Vec<RemoteCommand>,
    pub stream_position: f64,
    pub remote_playing: bool,
    pub media_status: Option<MediaStatus>,
    pub listener_registered: bool,
    pub listener_registrations: usize,
    next_request: RequestId,
}

impl SimTransportState {
    fn issue(&mut self, command: RemoteCommand) -> Result<RequestId, TransportError> {
        if self.fail_commands {
            return Err(TransportError::Rejected("receiver unavailable".to_string()));
        }
        self.commands.push(command);
        self.next_request += 1;
        Ok(self.next_request)
    }
}

/// Inspection and control handle for [`SimTransport`].
#[derive(Clone, Default)]
pub struct SimTransportHandle {
    state: Arc<Mutex<SimTransportState>>,
}

impl SimTransportHandle {
    pub fn with<R>(&self, f: impl FnOnce(&SimTransportState) -> R) -> R {
        f(&lock(&self.state))
    }

    pub fn update(&self, f: impl FnOnce(&mut SimTransportState)) {
        f(&mut lock(&self.state));
    }

    pub fn commands(&self) -> Vec<RemoteCommand> {
        lock(&self.state).commands.clone()
    }

    pub fn stream_position(&self) -> f64 {
        lock(&self.state).stream_position
    }

    /// Move the receiver's playhead forward while it is playing.
    pub fn advance(&self, seconds: f64) {
        let mut state = lock(&self.state);
        if state.remote_playing {
            state.stream_position += seconds.max(0.0);
        }
    }
}

pub struct SimRemoteClient {
    state: Arc<Mutex<SimTransportState>>,
}

impl RemoteMediaClient for SimRemoteClient {
    fn load_media(
        &mut self,
        media: &MediaDescriptor,
        options: LoadOptions,
    ) -> Result<RequestId, TransportError> {
        let mut state = lock(&self.state);
        let id = state.issue(RemoteCommand::Load {
            content_id: media.content_id.clone(),
            studio: media.metadata.studio.clone(),
            position: options.play_position,
        })?;
        state.stream_position = options.play_position;
        state.remote_playing = options.autoplay;
        state.media_status = Some(MediaStatus {
            player_state: if options.autoplay {
                RemotePlayerState::Buffering
            } else {
                RemotePlayerState::Paused
            },
            idle_reason: None,
            stream_position: options.play_position,
            media: Some(media.clone()),
        });
        Ok(id)
    }

    fn play(&mut self) -> Result<RequestId, TransportError> {
        let mut state = lock(&self.state);
        let id = state.issue(RemoteCommand::Play)?;
        state.remote_playing = true;
        Ok(id)
    }

    fn pause(&mut self) -> Result<RequestId, TransportError> {
        let mut state = lock(&self.state);
        let id = state.issue(RemoteCommand::Pause)?;
        state.remote_playing = false;
        Ok(id)
    }

    fn seek(&mut self, options: SeekOptions) -> Result<RequestId, TransportError> {
        let mut state = lock(&self.state);
        let id = state.issue(RemoteCommand::Seek {
            position: options.interval,
            resume_state: options.resume_state,
        })?;
        state.stream_position = options.interval;
        match options.resume_state {
            ResumeState::Play => state.remote_playing = true,
            ResumeState::Pause => state.remote_playing = false,
            ResumeState::Unchanged => {}
        }
        Ok(id)
    }

    fn approximate_stream_position(&self) -> f64 {
        lock(&self.state).stream_position
    }

    fn media_status(&self) -> Option<MediaStatus> {
        lock(&self.state).media_status.clone()
    }

    fn set_status_listener(&mut self, enabled: bool) {
        let mut state = lock(&self.state);
        state.listener_registered = enabled;
        if enabled {
            state.listener_registrations += 1;
        }
    }
}

/// Transport double. The remote client is always reachable; the session
/// controller decides when it may be used.
pub struct SimTransport {
    state: Arc<Mutex<SimTransportState>>,
    client: SimRemoteClient,
}

impl SimTransport {
    pub fn new() -> (Self, SimTransportHandle) {
        let handle = SimTransportHandle::default();
        let transport = Self {
            state: handle.state.clone(),
            client: SimRemoteClient {
                state: handle.state.clone(),
            },
        };
        (transport, handle)
    }
}

impl CastTransport for SimTransport {
    fn start_discovery(&mut self, criteria: &DiscoveryCriteria) -> Result<(), TransportError> {
        lock(&self.state).discovery = Some(criteria.clone());
        Ok(())
    }

    fn stop_discovery(&mut self) {
        lock(&self.state).discovery = None;
    }

    fn is_discovery_active(&self) -> bool {
        lock(&self.state).discovery.is_some()
    }

    fn start_session(&mut self, device: &Device) -> Result<(), TransportError> {
        let mut state = lock(&self.state);
        state.started_sessions.push(device.id.clone());
        match state.reject_sessions.clone() {
            Some(reason) => Err(TransportError::Rejected(reason)),
            None => Ok(()),
        }
    }

    fn end_session(&mut self, stop_casting: bool) {
        let mut state = lock(&self.state);
        state.ended_sessions += 1;
        state.stopped_casting |= stop_casting;
        if stop_casting {
            state.remote_playing = false;
        }
    }

    fn suspend_session(&mut self, reason: SuspendReason) {
        lock(&self.state).suspensions.push(reason);
    }

    fn remote_client(&self) -> Option<&dyn RemoteMediaClient> {
        Some(&self.client)
    }

    fn remote_client_mut(&mut self) -> Option<&mut dyn RemoteMediaClient> {
        Some(&mut self.client)
    }
}

/// Call received by [`SimPlayer`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocalCall {
    Play,
    Pause,
    Seek(f64),
}

#[derive(Debug, Default)]
pub struct SimPlayerState {
    pub playing: bool,
    pub position: f64,
    pub duration: Option<f64>,
    pub calls: Vec<LocalCall>,
}

#[derive(Clone, Default)]
pub struct SimPlayerHandle {
    state: Arc<Mutex<SimPlayerState>>,
}

impl SimPlayerHandle {
    pub fn with<R>(&self, f: impl FnOnce(&SimPlayerState) -> R) -> R {
        f(&lock(&self.state))
    }

    pub fn is_playing(&self) -> bool {
        lock(&self.state).playing
    }

    pub fn position(&self) -> f64 {
        lock(&self.state).position
    }

    pub fn calls(&self) -> Vec<LocalCall> {
        lock(&self.state).calls.clone()
    }

    /// Move the playhead without recording a call, as a player reporting
    /// jitter would.
    pub fn set_position(&self, position: f64) {
        lock(&self.state).position = position;
    }

    pub fn set_duration(&self, duration: Option<f64>) {
        lock(&self.state).duration = duration;
    }

    /// Advance the playhead while playing. Returns `true` when it reached the
    /// end of a known, non-zero duration.
    pub fn advance(&self, seconds: f64) -> bool {
        let mut state = lock(&self.state);
        if !state.playing {
            return false;
        }
        state.position += seconds.max(0.0);
        match state.duration {
            Some(duration) if duration > 0.0 && state.position >= duration => {
                state.position = duration;
                state.playing = false;
                true
            }
            _ => false,
        }
    }
}

pub struct SimPlayer {
    state: Arc<Mutex<SimPlayerState>>,
}

impl SimPlayer {
    pub fn new(duration: Option<f64>) -> (Self, SimPlayerHandle) {
        let handle = SimPlayerHandle::default();
        handle.set_duration(duration);
        (
            Self {
                state: handle.state.clone(),
            },
            handle,
        )
    }
}

impl LocalPlayer for SimPlayer {
    fn play(&mut self) {
        let mut state = lock(&self.state);
        state.playing = true;
        state.calls.push(LocalCall::Play);
    }

    fn pause(&mut self) {
        let mut state = lock(&self.state);
        state.playing = false;
        state.calls.push(LocalCall::Pause);
    }

    fn seek(&mut self, position: f64) {
        let mut state = lock(&self.state);
        state.position = position.max(0.0);
        state.calls.push(LocalCall::Seek(position));
    }

    fn current_time(&self) -> f64 {
        lock(&self.state).position
    }

    fn duration(&self) -> Option<f64> {
        lock(&self.state).duration
    }
}
