//! Playback screen lifetime.
//!
//! A [`ViewerSession`] exists from the moment a media item is opened until it
//! is closed. It owns the playback router for that item and the periodic
//! position timer; closing or dropping it cancels the timer.

use handoff_types::{Affordances, MediaDescriptor, MediaStatus, PlaybackState, SessionStatus};

use crate::config::ResolvedConfig;
use crate::error::HandoffError;
use crate::events::{EventBus, HandoffEvent};
use crate::media::MediaItem;
use crate::router::{CommandOutcome, PlaybackRouter};
use crate::session::SessionController;
use crate::ticker::PeriodicTimer;
use crate::transport::{LocalPlayer, RequestId};

pub type ViewerId = u64;

/// Borrowed coordinator state a viewer needs while handling an input.
pub struct ViewerContext<'a> {
    pub session: &'a mut SessionController,
    pub events: &'a mut EventBus,
    pub config: &'a ResolvedConfig,
}

/// One-shot notification fired the first time the local duration is known.
#[derive(Default)]
struct DurationWatch {
    callback: Option<Box<dyn FnOnce(f64)>>,
    known: Option<f64>,
}

impl DurationWatch {
    /// Record `duration`. Returns `true` only the first time a non-zero
    /// duration is seen.
    fn observe(&mut self, duration: Option<f64>) -> bool {
        if self.known.is_some() {
            return false;
        }
        let Some(duration) = duration.filter(|d| d.is_finite() && *d > 0.0) else {
            return false;
        };
        self.known = Some(duration);
        if let Some(callback) = self.callback.take() {
            callback(duration);
        }
        true
    }
}

pub struct ViewerSession {
    id: ViewerId,
    item: MediaItem,
    router: PlaybackRouter,
    duration: DurationWatch,
    timer: Option<PeriodicTimer>,
    published_state: Option<PlaybackState>,
}

impl ViewerSession {
    /// Open a viewer. Starts local playback right away when no session is
    /// connected and autoplay is enabled.
    pub fn open(
        id: ViewerId,
        item: MediaItem,
        local: Box<dyn LocalPlayer>,
        timer: Option<PeriodicTimer>,
        ctx: &mut ViewerContext<'_>,
    ) -> Self {
        let connected = ctx.session.is_connected();
        let mut viewer = Self {
            id,
            item,
            router: PlaybackRouter::new(local, connected, ctx.config.preserve_play_state),
            duration: DurationWatch::default(),
            timer,
            published_state: None,
        };
        tracing::info!(
            viewer_id = id,
            content_id = %viewer.item.content_id(),
            connected,
            "viewer: opened"
        );
        viewer.publish_state(ctx.events);
        if !connected && ctx.config.autoplay {
            viewer.play(ctx);
        }
        viewer.check_duration(ctx.events);
        viewer
    }

    pub fn id(&self) -> ViewerId {
        self.id
    }

    pub fn item(&self) -> &MediaItem {
        &self.item
    }

    pub fn state(&self) -> PlaybackState {
        self.router.state()
    }

    pub fn affordances(&self) -> Affordances {
        self.router.affordances()
    }

    pub fn position(&self) -> f64 {
        self.router.position()
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration.known
    }

    pub fn has_timer(&self) -> bool {
        self.timer.as_ref().is_some_and(PeriodicTimer::is_running)
    }

    /// Register the one-shot duration callback. Fires immediately when the
    /// duration is already known.
    pub fn on_duration_known(&mut self, callback: impl FnOnce(f64) + 'static) {
        match self.duration.known {
            Some(duration) => callback(duration),
            None => self.duration.callback = Some(Box::new(callback)),
        }
    }

    /// Descriptor for the receiver, labelled with the connected device name.
    pub fn descriptor(&self, session: &SessionController, config: &ResolvedConfig) -> MediaDescriptor {
        let device = session.current_device();
        self.item.descriptor(
            device.as_ref().map(|d| d.friendly_name.as_str()),
            (config.thumbnail_width, config.thumbnail_height),
        )
    }

    pub fn on_session_status(&mut self, status: SessionStatus, ctx: &mut ViewerContext<'_>) {
        match status {
            SessionStatus::Started | SessionStatus::Resumed if self.state().is_finished() => {
                tracing::debug!(viewer_id = self.id, status = ?status, "viewer: finished, not casting");
            }
            SessionStatus::Started => self.start_remote_playback(ctx),
            SessionStatus::Resumed => match self.state() {
                PlaybackState::CreatedRemote => self.start_remote_playback(ctx),
                state if state.is_remote() => {
                    if let Err(err) = self.router.continue_remote(ctx.session) {
                        tracing::debug!(viewer_id = self.id, error = %err, "viewer: resume fell back to local player");
                    }
                }
                _ => self.start_remote_playback(ctx),
            },
            SessionStatus::Ended | SessionStatus::FailedToStart => {
                if let Some(position) = self.router.hand_off_to_local() {
                    ctx.events
                        .publish(HandoffEvent::SeekRequestedFromRemote { position });
                }
            }
            SessionStatus::AlreadyConnected => {}
        }
        self.publish_state(ctx.events);
    }

    pub fn on_media_status(&mut self, status: &MediaStatus, ctx: &mut ViewerContext<'_>) {
        self.router.on_media_status(status);
        self.publish_state(ctx.events);
    }

    /// Returns `true` when the request was issued by this viewer.
    pub fn on_remote_request_completed(
        &mut self,
        request_id: RequestId,
        ok: bool,
        ctx: &mut ViewerContext<'_>,
    ) -> bool {
        let owned = self.router.on_remote_request_completed(request_id, ok);
        self.publish_state(ctx.events);
        owned
    }

    /// Periodic position refresh.
    pub fn on_tick(&mut self, ctx: &mut ViewerContext<'_>) {
        let position = self.router.refresh_position(ctx.session);
        self.check_duration(ctx.events);
        ctx.events.publish(HandoffEvent::PositionUpdated {
            viewer_id: self.id,
            position,
            duration: self.router.duration(),
        });
        self.publish_state(ctx.events);
    }

    pub fn on_local_finished(&mut self, ctx: &mut ViewerContext<'_>) {
        self.router.on_local_finished();
        self.publish_state(ctx.events);
    }

    /// Capture the receiver position while the session is still reachable.
    pub fn sync_remote_position(&mut self, session: &SessionController) {
        if self.state().is_remote() {
            self.router.refresh_position(session);
        }
    }

    pub fn play(&mut self, ctx: &mut ViewerContext<'_>) -> CommandOutcome {
        let loads = self.state() == PlaybackState::CreatedRemote
            || (self.state().is_finished() && ctx.session.is_connected());
        let media = self.descriptor(ctx.session, ctx.config);
        let outcome = self.router.play(ctx.session, &media, true);
        if loads && matches!(outcome, CommandOutcome::Remote(_)) {
            ctx.session.notify_already_connected(ctx.events);
        }
        self.after_command(outcome, ctx)
    }

    pub fn pause(&mut self, ctx: &mut ViewerContext<'_>) -> CommandOutcome {
        let outcome = self.router.pause(ctx.session);
        self.after_command(outcome, ctx)
    }

    pub fn stop(&mut self, ctx: &mut ViewerContext<'_>) -> CommandOutcome {
        let outcome = self.router.stop(ctx.session);
        self.after_command(outcome, ctx)
    }

    pub fn seek(&mut self, position: f64, ctx: &mut ViewerContext<'_>) -> CommandOutcome {
        let outcome = self.router.seek(ctx.session, position);
        self.after_command(outcome, ctx)
    }

    /// Load `item` on the receiver at `at` seconds on behalf of this viewer.
    pub fn load_remotely(
        &mut self,
        item: &MediaItem,
        at: f64,
        ctx: &mut ViewerContext<'_>,
    ) -> Result<RequestId, HandoffError> {
        let device = ctx.session.current_device();
        let media = item.descriptor(
            device.as_ref().map(|d| d.friendly_name.as_str()),
            (ctx.config.thumbnail_width, ctx.config.thumbnail_height),
        );
        let result = self.router.load_at(ctx.session, &media, at, true);
        if result.is_ok() {
            ctx.session.notify_already_connected(ctx.events);
        }
        self.publish_state(ctx.events);
        result
    }

    pub fn resume_remotely(
        &mut self,
        at: Option<f64>,
        ctx: &mut ViewerContext<'_>,
    ) -> Result<RequestId, HandoffError> {
        let result = self.router.resume_at(ctx.session, at);
        self.publish_state(ctx.events);
        result
    }

    pub fn pause_remotely(
        &mut self,
        at: Option<f64>,
        ctx: &mut ViewerContext<'_>,
    ) -> Result<RequestId, HandoffError> {
        let result = self.router.pause_at(ctx.session, at);
        self.publish_state(ctx.events);
        result
    }

    /// Tear down: stops the local player and cancels the position timer.
    pub fn close(mut self) {
        self.router.release();
        self.cancel_timer();
        tracing::info!(viewer_id = self.id, "viewer: closed");
    }

    fn cancel_timer(&mut self) {
        if let Some(mut timer) = self.timer.take() {
            timer.cancel();
        }
    }

    fn start_remote_playback(&mut self, ctx: &mut ViewerContext<'_>) {
        if matches!(
            self.state(),
            PlaybackState::PlayingRemote | PlaybackState::PausedRemote
        ) {
            return;
        }
        let media = self.descriptor(ctx.session, ctx.config);
        match self.router.hand_off_to_remote(ctx.session, &media, true) {
            Ok(_) => ctx.session.notify_already_connected(ctx.events),
            Err(err) => {
                tracing::warn!(viewer_id = self.id, error = %err, "viewer: staying on local player");
            }
        }
    }

    fn after_command(&mut self, outcome: CommandOutcome, ctx: &mut ViewerContext<'_>) -> CommandOutcome {
        if let CommandOutcome::FellBack(err) = &outcome {
            tracing::warn!(viewer_id = self.id, error = %err, "viewer: command fell back to local player");
        }
        self.publish_state(ctx.events);
        outcome
    }

    fn check_duration(&mut self, events: &mut EventBus) {
        if self.duration.observe(self.router.duration()) {
            if let Some(duration) = self.duration.known {
                events.publish(HandoffEvent::DurationKnown {
                    viewer_id: self.id,
                    duration,
                });
            }
        }
    }

    fn publish_state(&mut self, events: &mut EventBus) {
        let state = self.router.state();
        if self.published_state == Some(state) {
            return;
        }
        self.published_state = Some(state);
        events.publish(HandoffEvent::PlaybackStateChanged {
            viewer_id: self.id,
            state,
            affordances: self.router.affordances(),
        });
    }
}

impl Drop for ViewerSession {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}
