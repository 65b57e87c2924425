//! Command routing between the local player and the remote session.
//!
//! The free functions are the remote command surface: each one checks for a
//! connected session and dispatches to its media client. [`PlaybackRouter`]
//! owns one viewer's local player and playback context and decides, for every
//! command, which transport carries it.

use handoff_types::{Affordances, MediaDescriptor, MediaStatus, PlaybackState, RemotePlayerState};

use crate::error::HandoffError;
use crate::playback_state::{PlaybackInput, PlaybackStateMachine};
use crate::session::SessionController;
use crate::transport::{LoadOptions, LocalPlayer, RequestId, ResumeState, SeekOptions};

/// Dispatch a load of `media` starting at `at` seconds.
pub fn load_remotely(
    session: &mut SessionController,
    media: &MediaDescriptor,
    at: f64,
    autoplay: bool,
) -> Result<RequestId, HandoffError> {
    let client = session
        .remote_client_mut()
        .ok_or(HandoffError::NoActiveSession)?;
    let id = client.load_media(
        media,
        LoadOptions {
            play_position: at.max(0.0),
            autoplay,
        },
    )?;
    tracing::info!(
        request_id = id,
        content_id = %media.content_id,
        position = at,
        "router: remote load dispatched"
    );
    Ok(id)
}

/// Resume remote playback, seeking first when `at` is given.
pub fn resume_remotely(
    session: &mut SessionController,
    at: Option<f64>,
) -> Result<RequestId, HandoffError> {
    let client = session
        .remote_client_mut()
        .ok_or(HandoffError::NoActiveSession)?;
    let id = match at {
        Some(position) => client.seek(SeekOptions {
            interval: position.max(0.0),
            resume_state: ResumeState::Play,
        })?,
        None => client.play()?,
    };
    tracing::debug!(request_id = id, position = ?at, "router: remote resume dispatched");
    Ok(id)
}

/// Pause remote playback, seeking first when `at` is given.
pub fn pause_remotely(
    session: &mut SessionController,
    at: Option<f64>,
) -> Result<RequestId, HandoffError> {
    let client = session
        .remote_client_mut()
        .ok_or(HandoffError::NoActiveSession)?;
    let id = match at {
        Some(position) => client.seek(SeekOptions {
            interval: position.max(0.0),
            resume_state: ResumeState::Pause,
        })?,
        None => client.pause()?,
    };
    tracing::debug!(request_id = id, position = ?at, "router: remote pause dispatched");
    Ok(id)
}

/// Approximate receiver position. `None` while disconnected.
pub fn current_remote_position(session: &SessionController) -> Option<f64> {
    session
        .remote_client()
        .map(|client| client.approximate_stream_position().max(0.0))
}

/// Receiver buffering state; `Unknown` while disconnected or before any status.
pub fn remote_player_buffer_state(session: &SessionController) -> RemotePlayerState {
    session
        .remote_client()
        .and_then(|client| client.media_status())
        .map(|status| status.player_state)
        .unwrap_or_default()
}

/// Which path a routed command took.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Local,
    /// Dispatched to the receiver.
    Remote(RequestId),
    /// The remote path failed and playback fell back to the local player.
    FellBack(HandoffError),
    /// Nothing to do in the current state.
    Ignored,
}

/// Position and ownership of one viewer's playback.
#[derive(Debug, Clone)]
pub struct PlaybackContext {
    machine: PlaybackStateMachine,
    position: f64,
    last_remote_position: Option<f64>,
}

pub struct PlaybackRouter {
    local: Box<dyn LocalPlayer>,
    context: PlaybackContext,
    outstanding: Vec<RequestId>,
}

impl PlaybackRouter {
    pub fn new(local: Box<dyn LocalPlayer>, remote_connected: bool, preserve_play_state: bool) -> Self {
        let position = local.current_time().max(0.0);
        Self {
            local,
            context: PlaybackContext {
                machine: PlaybackStateMachine::new(remote_connected, preserve_play_state),
                position,
                last_remote_position: None,
            },
            outstanding: Vec::new(),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.context.machine.state()
    }

    pub fn affordances(&self) -> Affordances {
        self.context.machine.affordances()
    }

    /// Playback position in seconds on the owning transport.
    pub fn position(&self) -> f64 {
        self.context.position
    }

    pub fn last_remote_position(&self) -> Option<f64> {
        self.context.last_remote_position
    }

    pub fn duration(&self) -> Option<f64> {
        self.local.duration()
    }

    /// Dispatched remote requests not yet acknowledged.
    pub fn outstanding_requests(&self) -> &[RequestId] {
        &self.outstanding
    }

    /// Move playback to the receiver at the local player's current time.
    ///
    /// Without a connected session nothing is touched. Otherwise the local
    /// player is paused first and ownership only changes once the load is
    /// dispatched; on failure local playback resumes.
    pub fn hand_off_to_remote(
        &mut self,
        session: &mut SessionController,
        media: &MediaDescriptor,
        autoplay: bool,
    ) -> Result<RequestId, HandoffError> {
        let at = self.local.current_time();
        self.load_at(session, media, at, autoplay)
    }

    /// Load `media` on the receiver at `at` seconds and take ownership of
    /// playback once the load is dispatched.
    ///
    /// A finished viewer restarts first. Without a connected session nothing
    /// is touched.
    pub fn load_at(
        &mut self,
        session: &mut SessionController,
        media: &MediaDescriptor,
        at: f64,
        autoplay: bool,
    ) -> Result<RequestId, HandoffError> {
        if !session.is_connected() {
            if self.state().is_remote() {
                self.fall_back_to_local();
            }
            return Err(HandoffError::NoActiveSession);
        }
        self.restart_if_finished(true);
        let at = at.max(0.0);
        self.local.pause();
        match load_remotely(session, media, at, autoplay) {
            Ok(id) => {
                self.context.machine.apply(PlaybackInput::RemoteLoadSucceeded);
                self.context.position = at;
                self.context.last_remote_position = Some(at);
                self.outstanding.push(id);
                Ok(id)
            }
            Err(err) => {
                tracing::warn!(error = %err, "router: remote load failed, staying local");
                self.fall_back_to_local();
                Err(err)
            }
        }
    }

    /// Resume on the receiver, seeking first when `at` is given.
    ///
    /// Only tracked while the receiver owns playback; otherwise the command
    /// goes to the session as is.
    pub fn resume_at(
        &mut self,
        session: &mut SessionController,
        at: Option<f64>,
    ) -> Result<RequestId, HandoffError> {
        if !self.owns_remote_playback() {
            return resume_remotely(session, at);
        }
        let result = resume_remotely(session, at);
        self.record_remote(result, Some(PlaybackInput::RemotePlay), at)
    }

    /// Pause on the receiver, seeking first when `at` is given.
    pub fn pause_at(
        &mut self,
        session: &mut SessionController,
        at: Option<f64>,
    ) -> Result<RequestId, HandoffError> {
        if !self.owns_remote_playback() {
            return pause_remotely(session, at);
        }
        let result = pause_remotely(session, at);
        self.record_remote(result, Some(PlaybackInput::RemotePause), at)
    }

    /// Stop the local player when its viewer goes away. Remote playback is
    /// left running on the receiver.
    pub fn release(&mut self) {
        if self.state().is_remote() {
            return;
        }
        self.local.pause();
        self.local.seek(0.0);
        self.context.position = 0.0;
        self.context.machine.apply(PlaybackInput::LocalStop);
    }

    /// Continue remote playback of whatever the receiver has loaded.
    pub fn continue_remote(&mut self, session: &mut SessionController) -> Result<RequestId, HandoffError> {
        self.local.pause();
        match resume_remotely(session, None) {
            Ok(id) => {
                self.context.machine.apply(PlaybackInput::RemotePlay);
                self.outstanding.push(id);
                Ok(id)
            }
            Err(err) => {
                tracing::warn!(error = %err, "router: remote resume failed, falling back");
                self.fall_back_to_local();
                Err(err)
            }
        }
    }

    /// Move playback back to the local player after the session went away.
    ///
    /// Returns the position the local player was moved to, or `None` when the
    /// receiver did not own playback.
    pub fn hand_off_to_local(&mut self) -> Option<f64> {
        let previous = self.state();
        let next = self.context.machine.apply(PlaybackInput::SessionLost)?;
        self.outstanding.clear();
        if !matches!(previous, PlaybackState::PlayingRemote | PlaybackState::PausedRemote) {
            return None;
        }
        let at = self
            .context
            .last_remote_position
            .unwrap_or(self.context.position);
        self.local.seek(at);
        self.context.position = at;
        if next == PlaybackState::PlayingLocal {
            self.local.play();
        } else {
            self.local.pause();
        }
        tracing::info!(position = at, state = ?next, "router: handed off to local player");
        Some(at)
    }

    /// Resume locally after a failed remote command, from the last known
    /// remote position when the receiver owned playback.
    pub fn fall_back_to_local(&mut self) {
        self.outstanding.clear();
        if self.state().is_remote() {
            if let Some(at) = self.context.last_remote_position {
                self.local.seek(at);
                self.context.position = at;
            }
        }
        self.context.machine.apply(PlaybackInput::RemoteCommandFailed);
        self.local.play();
    }

    /// Completion of a dispatched request. Returns `true` when the request
    /// belonged to this router.
    pub fn on_remote_request_completed(&mut self, request_id: RequestId, ok: bool) -> bool {
        let Some(index) = self.outstanding.iter().position(|id| *id == request_id) else {
            return false;
        };
        self.outstanding.remove(index);
        if !ok {
            tracing::warn!(request_id, "router: remote request failed, falling back");
            self.fall_back_to_local();
        }
        true
    }

    /// Receiver pushed a media status.
    pub fn on_media_status(&mut self, status: &MediaStatus) {
        if !self.owns_remote_playback() {
            return;
        }
        let position = status.stream_position.max(0.0);
        self.context.last_remote_position = Some(position);
        self.context.position = position;
        if status.reached_end() {
            self.context.machine.apply(PlaybackInput::RemoteEnded);
            return;
        }
        match status.player_state {
            RemotePlayerState::Playing => {
                self.context.machine.apply(PlaybackInput::RemotePlay);
            }
            RemotePlayerState::Paused => {
                self.context.machine.apply(PlaybackInput::RemotePause);
            }
            _ => {}
        }
    }

    /// Local player reached the end of the media.
    pub fn on_local_finished(&mut self) {
        if self.state().is_remote() {
            return;
        }
        self.context.position = self.local.current_time().max(0.0);
        self.context.machine.apply(PlaybackInput::LocalEnded);
    }

    /// Refresh the position from the owning transport.
    ///
    /// While playing locally the position never moves backwards; seeks set it
    /// directly.
    pub fn refresh_position(&mut self, session: &SessionController) -> f64 {
        if self.state().is_remote() {
            if let Some(remote) = current_remote_position(session) {
                self.context.last_remote_position = Some(remote);
                self.context.position = remote;
            }
        } else {
            let now = self.local.current_time().max(0.0);
            if !self.state().is_playing() || now >= self.context.position {
                self.context.position = now;
            }
        }
        self.context.position
    }

    /// Play on whichever transport owns playback.
    pub fn play(
        &mut self,
        session: &mut SessionController,
        media: &MediaDescriptor,
        autoplay: bool,
    ) -> CommandOutcome {
        self.restart_if_finished(session.is_connected());
        match self.state() {
            PlaybackState::Created | PlaybackState::PausedLocal | PlaybackState::PlayingLocal => {
                self.local.play();
                self.context.machine.apply(PlaybackInput::LocalPlay);
                CommandOutcome::Local
            }
            PlaybackState::CreatedRemote => match self.hand_off_to_remote(session, media, autoplay) {
                Ok(id) => CommandOutcome::Remote(id),
                Err(err) => CommandOutcome::FellBack(err),
            },
            PlaybackState::PlayingRemote | PlaybackState::PausedRemote => {
                let at = self.context.last_remote_position;
                self.remote_command(resume_remotely(session, at), Some(PlaybackInput::RemotePlay), None)
            }
            PlaybackState::FinishedLocal | PlaybackState::FinishedRemote => CommandOutcome::Ignored,
        }
    }

    pub fn pause(&mut self, session: &mut SessionController) -> CommandOutcome {
        match self.state() {
            PlaybackState::PlayingLocal | PlaybackState::PausedLocal | PlaybackState::Created => {
                self.local.pause();
                self.context.machine.apply(PlaybackInput::LocalPause);
                CommandOutcome::Local
            }
            PlaybackState::PlayingRemote | PlaybackState::PausedRemote => {
                self.remote_command(pause_remotely(session, None), Some(PlaybackInput::RemotePause), None)
            }
            _ => CommandOutcome::Ignored,
        }
    }

    /// Pause and rewind to the start.
    pub fn stop(&mut self, session: &mut SessionController) -> CommandOutcome {
        match self.state() {
            PlaybackState::PlayingLocal | PlaybackState::PausedLocal => {
                self.local.pause();
                self.local.seek(0.0);
                self.context.position = 0.0;
                self.context.machine.apply(PlaybackInput::LocalStop);
                CommandOutcome::Local
            }
            PlaybackState::PlayingRemote | PlaybackState::PausedRemote => {
                let result = pause_remotely(session, Some(0.0));
                self.remote_command(result, Some(PlaybackInput::RemotePause), Some(0.0))
            }
            _ => CommandOutcome::Ignored,
        }
    }

    pub fn seek(&mut self, session: &mut SessionController, position: f64) -> CommandOutcome {
        let position = position.max(0.0);
        match self.state() {
            PlaybackState::FinishedLocal | PlaybackState::FinishedRemote => CommandOutcome::Ignored,
            state if state.is_remote() && state != PlaybackState::CreatedRemote => {
                let result = session
                    .remote_client_mut()
                    .ok_or(HandoffError::NoActiveSession)
                    .and_then(|client| {
                        client
                            .seek(SeekOptions {
                                interval: position,
                                resume_state: ResumeState::Unchanged,
                            })
                            .map_err(HandoffError::from)
                    });
                self.remote_command(result, None, Some(position))
            }
            _ => {
                self.local.seek(position);
                self.context.position = position;
                CommandOutcome::Local
            }
        }
    }

    fn owns_remote_playback(&self) -> bool {
        matches!(self.state(), PlaybackState::PlayingRemote | PlaybackState::PausedRemote)
    }

    fn restart_if_finished(&mut self, remote_connected: bool) {
        if !self.state().is_finished() {
            return;
        }
        self.context
            .machine
            .apply(PlaybackInput::Restart { remote_connected });
        self.local.seek(0.0);
        self.context.position = 0.0;
        self.context.last_remote_position = None;
    }

    fn remote_command(
        &mut self,
        result: Result<RequestId, HandoffError>,
        on_success: Option<PlaybackInput>,
        at: Option<f64>,
    ) -> CommandOutcome {
        match self.record_remote(result, on_success, at) {
            Ok(id) => CommandOutcome::Remote(id),
            Err(err) => CommandOutcome::FellBack(err),
        }
    }

    /// Track a dispatched remote command, or fall back to the local player
    /// when it failed.
    fn record_remote(
        &mut self,
        result: Result<RequestId, HandoffError>,
        on_success: Option<PlaybackInput>,
        at: Option<f64>,
    ) -> Result<RequestId, HandoffError> {
        match result {
            Ok(id) => {
                if let Some(input) = on_success {
                    self.context.machine.apply(input);
                }
                if let Some(at) = at {
                    let at = at.max(0.0);
                    self.context.position = at;
                    self.context.last_remote_position = Some(at);
                }
                self.outstanding.push(id);
                Ok(id)
            }
            Err(err) => {
                tracing::warn!(error = %err, "router: remote command failed, falling back");
                self.fall_back_to_local();
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use handoff_types::{Device, IdleReason};

    use super::*;
    use crate::device_registry::DeviceRegistry;
    use crate::events::EventBus;
    use crate::media::MediaItem;
    use crate::sim::{LocalCall, RemoteCommand, SimPlayer, SimPlayerHandle, SimTransport, SimTransportHandle};

    struct Fixture {
        session: SessionController,
        registry: DeviceRegistry,
        events: EventBus,
        remote: SimTransportHandle,
        player: SimPlayerHandle,
        router: PlaybackRouter,
        device: Arc<Device>,
    }

    fn fixture() -> Fixture {
        let (transport, remote) = SimTransport::new();
        let (player, player_handle) = SimPlayer::new(Some(596.0));
        let mut events = EventBus::new();
        let mut registry = DeviceRegistry::new();
        let device = registry.on_device_found(Device::new("tv-1", "Den TV"), &mut events);
        Fixture {
            session: SessionController::new(Box::new(transport)),
            registry,
            events,
            remote,
            player: player_handle,
            router: PlaybackRouter::new(Box::new(player), false, false),
            device,
        }
    }

    fn media() -> MediaDescriptor {
        MediaItem::builder("https://cdn.example.net/bbb.mp4")
            .title("Big Buck Bunny")
            .duration(596.0)
            .build()
            .unwrap()
            .descriptor(Some("Den TV"), (480, 360))
    }

    impl Fixture {
        fn connect(&mut self) {
            let device = self.device.clone();
            self.session
                .connect(&device, &self.registry, &mut self.events)
                .unwrap();
            self.session.on_session_started(&device, &mut self.events);
        }

        fn play_locally_to(&mut self, position: f64) {
            let media = media();
            assert_eq!(self.router.play(&mut self.session, &media, true), CommandOutcome::Local);
            self.player.advance(position);
        }
    }

    #[test]
    fn load_while_disconnected_leaves_local_playback_untouched() {
        let mut fx = fixture();
        fx.play_locally_to(12.0);
        let calls_before = fx.player.calls();

        let err = fx
            .router
            .hand_off_to_remote(&mut fx.session, &media(), true)
            .unwrap_err();

        assert_eq!(err, HandoffError::NoActiveSession);
        assert_eq!(fx.router.state(), PlaybackState::PlayingLocal);
        assert_eq!(fx.player.calls(), calls_before);
        assert!(fx.remote.commands().is_empty());
        assert_eq!(
            load_remotely(&mut fx.session, &media(), 1.0, true),
            Err(HandoffError::NoActiveSession)
        );
    }

    #[test]
    fn remote_position_is_unknown_while_disconnected() {
        let mut fx = fixture();
        assert_eq!(current_remote_position(&fx.session), None);
        assert_eq!(remote_player_buffer_state(&fx.session), RemotePlayerState::Unknown);

        fx.connect();
        fx.remote.update(|state| state.stream_position = -3.0);
        assert_eq!(current_remote_position(&fx.session), Some(0.0));

        fx.session.disconnect(&mut fx.events);
        assert_eq!(current_remote_position(&fx.session), None);
    }

    #[test]
    fn hand_off_to_remote_loads_at_local_time() {
        let mut fx = fixture();
        fx.play_locally_to(30.0);
        fx.connect();

        let id = fx
            .router
            .hand_off_to_remote(&mut fx.session, &media(), true)
            .unwrap();

        assert_eq!(fx.router.state(), PlaybackState::PlayingRemote);
        assert_eq!(fx.router.outstanding_requests(), &[id]);
        assert!(!fx.player.is_playing());
        assert_eq!(
            fx.remote.commands(),
            vec![RemoteCommand::Load {
                content_id: "https://cdn.example.net/bbb.mp4".to_string(),
                studio: "Den TV".to_string(),
                position: 30.0,
            }]
        );
        assert_eq!(remote_player_buffer_state(&fx.session), RemotePlayerState::Buffering);
    }

    #[test]
    fn session_loss_while_paused_remote_resumes_locally_at_exact_position() {
        let mut fx = fixture();
        fx.play_locally_to(10.0);
        fx.connect();
        fx.router.hand_off_to_remote(&mut fx.session, &media(), true).unwrap();
        fx.remote.advance(7.5);
        fx.router.pause(&mut fx.session);
        fx.router.refresh_position(&fx.session);
        assert_eq!(fx.router.state(), PlaybackState::PausedRemote);

        fx.session.on_session_ended(None, &mut fx.events);
        let at = fx.router.hand_off_to_local();

        assert_eq!(at, Some(17.5));
        assert_eq!(fx.router.state(), PlaybackState::PlayingLocal);
        assert_eq!(fx.player.position(), 17.5);
        assert!(fx.player.is_playing());
    }

    #[test]
    fn session_loss_while_playing_remote_pauses_locally_at_exact_position() {
        let mut fx = fixture();
        fx.connect();
        let mut router = PlaybackRouter::new(Box::new(SimPlayer::new(None).0), true, false);
        router.play(&mut fx.session, &media(), true);
        assert_eq!(router.state(), PlaybackState::PlayingRemote);
        fx.remote.advance(4.0);
        router.refresh_position(&fx.session);

        fx.session.on_session_ended(None, &mut fx.events);
        assert_eq!(router.hand_off_to_local(), Some(4.0));
        assert_eq!(router.state(), PlaybackState::PausedLocal);
        assert_eq!(router.position(), 4.0);
    }

    #[test]
    fn session_loss_while_local_does_not_seek() {
        let mut fx = fixture();
        fx.play_locally_to(3.0);
        assert_eq!(fx.router.hand_off_to_local(), None);
        assert!(!fx.player.calls().iter().any(|c| matches!(c, LocalCall::Seek(_))));
    }

    #[test]
    fn failed_remote_command_falls_back_from_last_remote_position() {
        let mut fx = fixture();
        fx.connect();
        fx.router.play(&mut fx.session, &media(), true);
        fx.router.hand_off_to_remote(&mut fx.session, &media(), true).unwrap();
        fx.remote.advance(20.0);
        fx.router.refresh_position(&fx.session);
        fx.remote.update(|state| state.fail_commands = true);

        let outcome = fx.router.pause(&mut fx.session);

        assert!(matches!(
            outcome,
            CommandOutcome::FellBack(HandoffError::RemoteCommandFailure(_))
        ));
        assert_eq!(fx.router.state(), PlaybackState::PlayingLocal);
        assert_eq!(fx.player.position(), 20.0);
        assert!(fx.player.is_playing());
    }

    #[test]
    fn acknowledged_failure_of_outstanding_request_falls_back() {
        let mut fx = fixture();
        fx.play_locally_to(5.0);
        fx.connect();
        let id = fx
            .router
            .hand_off_to_remote(&mut fx.session, &media(), true)
            .unwrap();

        assert!(!fx.router.on_remote_request_completed(id + 100, false));
        assert_eq!(fx.router.state(), PlaybackState::PlayingRemote);
        assert!(fx.router.on_remote_request_completed(id, false));
        assert_eq!(fx.router.state(), PlaybackState::PlayingLocal);
        assert!(fx.router.outstanding_requests().is_empty());
    }

    #[test]
    fn remote_end_of_stream_finishes_and_play_restarts_remotely() {
        let mut fx = fixture();
        fx.connect();
        fx.router.play(&mut fx.session, &media(), true);
        fx.router.hand_off_to_remote(&mut fx.session, &media(), true).unwrap();
        fx.router.on_media_status(&MediaStatus {
            player_state: RemotePlayerState::Idle,
            idle_reason: Some(IdleReason::Finished),
            stream_position: 596.0,
            media: None,
        });
        assert_eq!(fx.router.state(), PlaybackState::FinishedRemote);
        assert_eq!(fx.router.pause(&mut fx.session), CommandOutcome::Ignored);

        let outcome = fx.router.play(&mut fx.session, &media(), true);
        assert!(matches!(outcome, CommandOutcome::Remote(_)));
        assert_eq!(fx.router.state(), PlaybackState::PlayingRemote);
        assert!(matches!(
            fx.remote.commands().last(),
            Some(RemoteCommand::Load { position, .. }) if *position == 0.0
        ));
    }

    #[test]
    fn receiver_pause_is_mirrored() {
        let mut fx = fixture();
        fx.connect();
        fx.router.hand_off_to_remote(&mut fx.session, &media(), true).unwrap();
        fx.router.on_media_status(&MediaStatus {
            player_state: RemotePlayerState::Paused,
            stream_position: 9.0,
            ..MediaStatus::default()
        });
        assert_eq!(fx.router.state(), PlaybackState::PausedRemote);
        assert_eq!(fx.router.last_remote_position(), Some(9.0));
    }

    #[test]
    fn local_position_is_monotonic_while_playing_except_for_seeks() {
        let mut fx = fixture();
        fx.play_locally_to(50.0);
        assert_eq!(fx.router.refresh_position(&fx.session), 50.0);

        fx.player.set_position(49.5);
        assert_eq!(fx.router.refresh_position(&fx.session), 50.0);

        assert_eq!(fx.router.seek(&mut fx.session, 10.0), CommandOutcome::Local);
        assert_eq!(fx.router.position(), 10.0);
        assert_eq!(fx.router.refresh_position(&fx.session), 10.0);
    }

    #[test]
    fn explicit_load_takes_ownership_at_requested_position() {
        let mut fx = fixture();
        fx.connect();
        let mut router = PlaybackRouter::new(Box::new(SimPlayer::new(None).0), true, false);

        let id = router.load_at(&mut fx.session, &media(), 42.0, true).unwrap();

        assert_eq!(router.state(), PlaybackState::PlayingRemote);
        assert_eq!(router.position(), 42.0);
        assert_eq!(router.last_remote_position(), Some(42.0));
        assert_eq!(router.outstanding_requests(), &[id]);

        assert!(matches!(router.play(&mut fx.session, &media(), true), CommandOutcome::Remote(_)));
        assert!(matches!(
            fx.remote.commands().as_slice(),
            [RemoteCommand::Load { .. }, RemoteCommand::Seek { position, resume_state: ResumeState::Play }]
                if *position == 42.0
        ));
    }

    #[test]
    fn tracked_pause_and_resume_follow_remote_ownership() {
        let mut fx = fixture();
        fx.connect();
        fx.router.hand_off_to_remote(&mut fx.session, &media(), true).unwrap();

        let paused = fx.router.pause_at(&mut fx.session, Some(30.0)).unwrap();
        assert_eq!(fx.router.state(), PlaybackState::PausedRemote);
        assert_eq!(fx.router.last_remote_position(), Some(30.0));
        assert!(fx.router.outstanding_requests().contains(&paused));

        fx.router.resume_at(&mut fx.session, None).unwrap();
        assert_eq!(fx.router.state(), PlaybackState::PlayingRemote);
        assert_eq!(fx.router.position(), 30.0);
    }

    #[test]
    fn untracked_resume_leaves_local_playback_alone() {
        let mut fx = fixture();
        fx.play_locally_to(6.0);
        fx.connect();

        assert!(fx.router.resume_at(&mut fx.session, None).is_ok());
        assert_eq!(fx.router.state(), PlaybackState::PlayingLocal);
        assert!(fx.router.outstanding_requests().is_empty());
        assert!(fx.player.is_playing());
    }

    #[test]
    fn release_stops_local_player_but_not_receiver() {
        let mut fx = fixture();
        fx.play_locally_to(10.0);
        fx.router.release();
        assert!(!fx.player.is_playing());
        assert_eq!(fx.player.position(), 0.0);
        assert_eq!(fx.router.state(), PlaybackState::PausedLocal);

        fx.connect();
        let mut remote = PlaybackRouter::new(Box::new(SimPlayer::new(None).0), true, false);
        remote.load_at(&mut fx.session, &media(), 5.0, true).unwrap();
        remote.release();
        assert_eq!(remote.state(), PlaybackState::PlayingRemote);
        fx.remote.with(|state| assert!(state.remote_playing));
    }

    #[test]
    fn stop_rewinds_local_player() {
        let mut fx = fixture();
        fx.play_locally_to(40.0);
        assert_eq!(fx.router.stop(&mut fx.session), CommandOutcome::Local);
        assert_eq!(fx.router.state(), PlaybackState::PausedLocal);
        assert_eq!(fx.player.position(), 0.0);
        assert!(!fx.player.is_playing());
    }
}
