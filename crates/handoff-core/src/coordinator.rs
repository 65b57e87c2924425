//! Cast coordinator.
//!
//! Single owner of the registry, the session controller, the event bus and the
//! open viewer. Transport callbacks, app lifecycle hooks and viewer commands
//! all run through `&mut self`, so no component needs its own locking.
//! Adapters on other threads post [`CoordinatorInput`]s into the inbox and the
//! owning thread drains it.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use handoff_types::{
    Device, MediaDescriptor, MediaStatus, PlaybackState, RemotePlayerState, SessionStatus,
    SuspendReason,
};
use tokio::sync::broadcast;

use crate::config::ResolvedConfig;
use crate::device_registry::DeviceRegistry;
use crate::error::HandoffError;
use crate::events::{EventBus, HandoffEvent, SubscriptionId};
use crate::media::MediaItem;
use crate::router::{self, CommandOutcome};
use crate::session::{ConnectOutcome, SessionController};
use crate::ticker::PeriodicTimer;
use crate::transport::{CastTransport, DiscoveryCriteria, LocalPlayer, RequestId, TransportError, TransportEvent};
use crate::viewer::{ViewerContext, ViewerId, ViewerSession};

/// Inputs held before senders block; position ticks are dropped instead.
pub const INBOX_CAPACITY: usize = 256;

/// Work item delivered through the coordinator inbox.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorInput {
    Transport(TransportEvent),
    /// Position timer fired for a viewer.
    Tick { viewer: ViewerId },
}

pub struct CastCoordinator {
    config: ResolvedConfig,
    registry: DeviceRegistry,
    session: SessionController,
    events: EventBus,
    viewer: Option<ViewerSession>,
    next_viewer_id: ViewerId,
    inbox_tx: Sender<CoordinatorInput>,
    inbox_rx: Receiver<CoordinatorInput>,
    last_media: Option<MediaDescriptor>,
}

impl CastCoordinator {
    pub fn new(config: ResolvedConfig, transport: Box<dyn CastTransport>) -> Self {
        let (inbox_tx, inbox_rx) = crossbeam_channel::bounded(INBOX_CAPACITY);
        Self {
            config,
            registry: DeviceRegistry::new(),
            session: SessionController::new(transport),
            events: EventBus::new(),
            viewer: None,
            next_viewer_id: 1,
            inbox_tx,
            inbox_rx,
            last_media: None,
        }
    }

    /// Start device discovery with the configured criteria.
    pub fn initialise(&mut self) -> Result<(), TransportError> {
        let criteria = DiscoveryCriteria {
            receiver_app_id: self.config.receiver_app_id.clone(),
            passive_scan: self.config.passive_scan,
        };
        self.session.start_discovery(&criteria)
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Sender for adapters that deliver callbacks from other threads.
    pub fn inbox(&self) -> Sender<CoordinatorInput> {
        self.inbox_tx.clone()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&HandoffEvent) + 'static) -> SubscriptionId {
        self.events.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn subscribe_stream(&self) -> broadcast::Receiver<HandoffEvent> {
        self.events.subscribe_stream()
    }

    /// Register the session status listener, replacing any previous one.
    pub fn add_status_listener(&mut self, listener: impl FnMut(SessionStatus) + 'static) {
        self.session.add_status_listener(listener);
    }

    pub fn devices(&self) -> Vec<std::sync::Arc<Device>> {
        self.registry.list_devices()
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Last media descriptor reported by the receiver.
    pub fn last_media(&self) -> Option<&MediaDescriptor> {
        self.last_media.as_ref()
    }

    pub fn viewer(&self) -> Option<&ViewerSession> {
        self.viewer.as_ref()
    }

    pub fn viewer_state(&self) -> Option<PlaybackState> {
        self.viewer.as_ref().map(ViewerSession::state)
    }

    /// Connect to a visible device.
    ///
    /// Ignored while a session is connected and no device is visible.
    pub fn connect(&mut self, device_id: &str) -> Result<ConnectOutcome, HandoffError> {
        if self.registry.is_empty() && self.session.is_connected() {
            tracing::info!(device_id = %device_id, "coordinator: connect ignored, already connected");
            return Ok(ConnectOutcome::Ignored);
        }
        let device = self
            .registry
            .get(device_id)
            .ok_or_else(|| HandoffError::UnknownDevice(device_id.to_string()))?;
        self.sync_remote_position();
        let result = self.session.connect(&device, &self.registry, &mut self.events);
        self.dispatch_session_statuses();
        result
    }

    pub fn disconnect(&mut self) -> bool {
        self.sync_remote_position();
        let ended = self.session.disconnect(&mut self.events);
        self.dispatch_session_statuses();
        ended
    }

    /// Load `item` on the receiver at `at` seconds.
    ///
    /// With a viewer open the load goes through its router, so the viewer
    /// takes ownership of playback at `at`.
    pub fn load_remotely(&mut self, item: &MediaItem, at: f64) -> Result<RequestId, HandoffError> {
        if self.viewer.is_some() {
            return self.with_viewer(|viewer, ctx| viewer.load_remotely(item, at, ctx))?;
        }
        let device = self.session.current_device();
        let media = item.descriptor(
            device.as_ref().map(|d| d.friendly_name.as_str()),
            (self.config.thumbnail_width, self.config.thumbnail_height),
        );
        let id = router::load_remotely(&mut self.session, &media, at, true)?;
        self.session.notify_already_connected(&mut self.events);
        self.dispatch_session_statuses();
        Ok(id)
    }

    /// Resume on the receiver, seeking first when `at` is given.
    pub fn resume_remotely(&mut self, at: Option<f64>) -> Result<RequestId, HandoffError> {
        if self.viewer.is_some() {
            return self.with_viewer(|viewer, ctx| viewer.resume_remotely(at, ctx))?;
        }
        router::resume_remotely(&mut self.session, at)
    }

    /// Pause on the receiver, seeking first when `at` is given.
    pub fn pause_remotely(&mut self, at: Option<f64>) -> Result<RequestId, HandoffError> {
        if self.viewer.is_some() {
            return self.with_viewer(|viewer, ctx| viewer.pause_remotely(at, ctx))?;
        }
        router::pause_remotely(&mut self.session, at)
    }

    pub fn current_remote_position(&self) -> Option<f64> {
        router::current_remote_position(&self.session)
    }

    pub fn remote_player_buffer_state(&self) -> RemotePlayerState {
        router::remote_player_buffer_state(&self.session)
    }

    /// Open a viewer for `item`, closing any open one first.
    pub fn open_viewer(&mut self, item: MediaItem, player: Box<dyn LocalPlayer>) -> ViewerId {
        self.close_viewer();
        let id = self.next_viewer_id;
        self.next_viewer_id += 1;
        let timer = PeriodicTimer::start(self.config.poll_interval, self.inbox_tx.clone(), move || {
            CoordinatorInput::Tick { viewer: id }
        });
        let mut ctx = ViewerContext {
            session: &mut self.session,
            events: &mut self.events,
            config: &self.config,
        };
        let viewer = ViewerSession::open(id, item, player, Some(timer), &mut ctx);
        self.viewer = Some(viewer);
        self.dispatch_session_statuses();
        id
    }

    /// Close the open viewer. Returns `false` when none was open.
    pub fn close_viewer(&mut self) -> bool {
        match self.viewer.take() {
            Some(viewer) => {
                viewer.close();
                true
            }
            None => false,
        }
    }

    pub fn play(&mut self) -> Result<CommandOutcome, HandoffError> {
        self.with_viewer(|viewer, ctx| viewer.play(ctx))
    }

    pub fn pause(&mut self) -> Result<CommandOutcome, HandoffError> {
        self.with_viewer(|viewer, ctx| viewer.pause(ctx))
    }

    pub fn stop(&mut self) -> Result<CommandOutcome, HandoffError> {
        self.with_viewer(|viewer, ctx| viewer.stop(ctx))
    }

    pub fn seek(&mut self, position: f64) -> Result<CommandOutcome, HandoffError> {
        self.with_viewer(|viewer, ctx| viewer.seek(position, ctx))
    }

    /// Refresh the open viewer's position now, outside the timer cadence.
    pub fn tick(&mut self) -> Result<(), HandoffError> {
        self.with_viewer(|viewer, ctx| viewer.on_tick(ctx))
    }

    /// The local player reached the end of the media.
    pub fn local_finished(&mut self) -> Result<(), HandoffError> {
        self.with_viewer(|viewer, ctx| viewer.on_local_finished(ctx))
    }

    /// App moved to the background: suspend the connected session.
    pub fn on_app_backgrounded(&mut self) {
        if !self.session.is_connected() {
            return;
        }
        self.sync_remote_position();
        self.session
            .suspend(SuspendReason::AppBackgrounded, &mut self.events);
        self.dispatch_session_statuses();
    }

    /// App is terminating: stop discovery, suspend and end the session, and
    /// close the viewer.
    pub fn on_app_terminating(&mut self) {
        self.session.stop_discovery();
        self.sync_remote_position();
        if self.session.is_connected() {
            self.session
                .suspend(SuspendReason::AppTerminated, &mut self.events);
        }
        self.session.end_and_stop_casting(&mut self.events);
        self.dispatch_session_statuses();
        self.close_viewer();
        tracing::info!("coordinator: terminated");
    }

    /// Handle everything already queued in the inbox. Returns the count.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(input) = self.inbox_rx.try_recv() {
            self.handle_input(input);
            handled += 1;
        }
        handled
    }

    /// Wait up to `timeout` for one inbox input and handle it.
    pub fn wait_for_input(&mut self, timeout: Duration) -> bool {
        match self.inbox_rx.recv_timeout(timeout) {
            Ok(input) => {
                self.handle_input(input);
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    pub fn handle_input(&mut self, input: CoordinatorInput) {
        match input {
            CoordinatorInput::Transport(event) => self.handle_transport_event(event),
            CoordinatorInput::Tick { viewer } => {
                if self.viewer.as_ref().map(ViewerSession::id) != Some(viewer) {
                    tracing::debug!(viewer_id = viewer, "coordinator: dropping tick for closed viewer");
                    return;
                }
                if let Err(err) = self.tick() {
                    tracing::debug!(viewer_id = viewer, error = %err, "coordinator: tick skipped");
                }
            }
        }
    }

    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::DiscoveryStarted { device_category } => {
                tracing::info!(category = %device_category, "discovery: category reported");
                self.registry.set_device_category(device_category);
            }
            TransportEvent::DeviceFound { device } => {
                self.registry.on_device_found(device, &mut self.events);
            }
            TransportEvent::DeviceLost { device_id } => {
                self.registry.on_device_lost(&device_id, &mut self.events);
            }
            TransportEvent::SessionStarted { device } => {
                let device = self.known_device(device);
                self.session.on_session_started(&device, &mut self.events);
            }
            TransportEvent::SessionResumed { device } => {
                let device = self.known_device(device);
                self.session.on_session_resumed(&device, &mut self.events);
            }
            TransportEvent::SessionSuspended { reason } => {
                self.sync_remote_position();
                self.session.on_session_suspended(reason, &mut self.events);
            }
            TransportEvent::SessionEnded { error } => {
                self.sync_remote_position();
                self.session.on_session_ended(error, &mut self.events);
            }
            TransportEvent::SessionFailedToStart { error } => {
                self.session
                    .on_session_failed_to_start(error, &mut self.events);
            }
            TransportEvent::MediaStatusUpdated { status } => self.on_media_status(status),
            TransportEvent::RemoteRequestCompleted { request_id, error } => {
                let ok = error.is_none();
                if let Some(error) = error.as_deref() {
                    tracing::warn!(request_id, error = %error, "coordinator: remote request failed");
                }
                self.events
                    .publish(HandoffEvent::RemoteCommandAcknowledged { request_id, ok });
                match self.with_viewer(|viewer, ctx| {
                    viewer.on_remote_request_completed(request_id, ok, ctx)
                }) {
                    Ok(owned) => {
                        tracing::debug!(request_id, owned, "coordinator: remote request completed");
                    }
                    Err(err) => {
                        tracing::debug!(request_id, error = %err, "coordinator: completion without viewer");
                    }
                }
            }
            TransportEvent::SdkLog {
                class,
                function,
                message,
            } => {
                if self.config.forwards_sdk_class(&class) {
                    tracing::debug!(target: "cast_sdk", class = %class, function = %function, "{message}");
                }
            }
        }
        self.dispatch_session_statuses();
    }

    fn on_media_status(&mut self, status: MediaStatus) {
        if !self.session.is_listening_for_media_status() {
            tracing::debug!("coordinator: media status without listener, dropped");
            return;
        }
        self.last_media = status.media.clone();
        self.events.publish(HandoffEvent::MediaStatusUpdated {
            media: status.media.clone(),
        });
        if let Err(err) = self.with_viewer(|viewer, ctx| viewer.on_media_status(&status, ctx)) {
            tracing::debug!(error = %err, "coordinator: media status without viewer");
        }
    }

    /// Registry entry for a device reported by the transport, adding it when
    /// discovery has not seen it.
    fn known_device(&mut self, device: Device) -> std::sync::Arc<Device> {
        match self.registry.get(&device.id) {
            Some(known) => known,
            None => self.registry.on_device_found(device, &mut self.events),
        }
    }

    fn sync_remote_position(&mut self) {
        if let Some(viewer) = self.viewer.as_mut() {
            viewer.sync_remote_position(&self.session);
        }
    }

    /// Forward statuses emitted by the session controller to the viewer.
    fn dispatch_session_statuses(&mut self) {
        while let Some(status) = self.session.next_emitted() {
            let Some(viewer) = self.viewer.as_mut() else {
                continue;
            };
            let mut ctx = ViewerContext {
                session: &mut self.session,
                events: &mut self.events,
                config: &self.config,
            };
            viewer.on_session_status(status, &mut ctx);
        }
    }

    fn with_viewer<R>(
        &mut self,
        f: impl FnOnce(&mut ViewerSession, &mut ViewerContext<'_>) -> R,
    ) -> Result<R, HandoffError> {
        let viewer = self.viewer.as_mut().ok_or(HandoffError::NoViewer)?;
        let mut ctx = ViewerContext {
            session: &mut self.session,
            events: &mut self.events,
            config: &self.config,
        };
        let result = f(viewer, &mut ctx);
        self.dispatch_session_statuses();
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::sim::{RemoteCommand, SimPlayer, SimPlayerHandle, SimTransport, SimTransportHandle};

    struct Harness {
        coordinator: CastCoordinator,
        remote: SimTransportHandle,
        events: Rc<RefCell<Vec<HandoffEvent>>>,
        statuses: Rc<RefCell<Vec<SessionStatus>>>,
    }

    fn harness_with(config: ResolvedConfig) -> Harness {
        let (transport, remote) = SimTransport::new();
        let mut coordinator = CastCoordinator::new(config, Box::new(transport));
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        coordinator.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        let statuses = Rc::new(RefCell::new(Vec::new()));
        let sink = statuses.clone();
        coordinator.add_status_listener(move |status| sink.borrow_mut().push(status));
        Harness {
            coordinator,
            remote,
            events,
            statuses,
        }
    }

    fn harness() -> Harness {
        // Keep the timer out of the way; tests tick by hand.
        harness_with(ResolvedConfig {
            poll_interval: Duration::from_secs(3600),
            ..ResolvedConfig::default()
        })
    }

    fn item() -> MediaItem {
        MediaItem::builder("https://cdn.example.net/bbb.mp4")
            .title("Big Buck Bunny (2008)")
            .duration(596.0)
            .thumbnail_url("https://cdn.example.net/bbb.jpg")
            .build()
            .unwrap()
    }

    impl Harness {
        fn found(&mut self, id: &str) {
            self.coordinator
                .handle_transport_event(TransportEvent::DeviceFound {
                    device: Device::new(id, format!("{id} tv")),
                });
        }

        fn started(&mut self, id: &str) {
            self.coordinator
                .handle_transport_event(TransportEvent::SessionStarted {
                    device: Device::new(id, format!("{id} tv")),
                });
        }

        fn open(&mut self) -> SimPlayerHandle {
            let (player, handle) = SimPlayer::new(Some(596.0));
            self.coordinator.open_viewer(item(), Box::new(player));
            handle
        }

        fn count(&self, pred: impl Fn(&HandoffEvent) -> bool) -> usize {
            self.events.borrow().iter().filter(|e| pred(e)).count()
        }
    }

    #[test]
    fn initialise_starts_discovery_with_configured_receiver() {
        let mut h = harness();
        h.coordinator.initialise().unwrap();
        h.remote.with(|t| {
            let criteria = t.discovery.as_ref().unwrap();
            assert_eq!(criteria.receiver_app_id, "CC1AD845");
            assert!(criteria.passive_scan);
        });
    }

    #[test]
    fn cast_then_terminate_hands_back_paused_at_remote_position() {
        let mut h = harness();
        h.found("d");
        let player = h.open();
        player.advance(42.0);
        assert_eq!(h.coordinator.viewer_state(), Some(PlaybackState::PlayingLocal));

        assert_eq!(h.coordinator.connect("d").unwrap(), ConnectOutcome::Starting);
        h.started("d");

        let started = h
            .statuses
            .borrow()
            .iter()
            .filter(|s| **s == SessionStatus::Started)
            .count();
        assert_eq!(started, 1);
        assert_eq!(h.coordinator.viewer_state(), Some(PlaybackState::PlayingRemote));
        assert!(matches!(
            h.remote.commands().as_slice(),
            [RemoteCommand::Load { position, studio, .. }] if *position == 42.0 && studio == "d tv"
        ));

        h.remote.advance(13.0);
        h.coordinator
            .handle_transport_event(TransportEvent::SessionSuspended {
                reason: SuspendReason::AppTerminated,
            });

        assert_eq!(h.coordinator.viewer_state(), Some(PlaybackState::PausedLocal));
        assert_eq!(player.position(), 55.0);
        assert!(!player.is_playing());
        assert_eq!(
            h.count(|e| *e == HandoffEvent::SeekRequestedFromRemote { position: 55.0 }),
            1
        );
        assert_eq!(h.statuses.borrow().last(), Some(&SessionStatus::Ended));
    }

    #[test]
    fn load_remotely_reports_dispatch_and_fails_when_disconnected() {
        let mut h = harness();
        assert_eq!(
            h.coordinator.load_remotely(&item(), 42.0),
            Err(HandoffError::NoActiveSession)
        );
        assert!(h.remote.commands().is_empty());

        h.found("d");
        h.coordinator.connect("d").unwrap();
        h.started("d");
        assert!(h.coordinator.load_remotely(&item(), 42.0).is_ok());
        assert_eq!(
            *h.statuses.borrow(),
            vec![SessionStatus::Started, SessionStatus::AlreadyConnected]
        );
        assert_eq!(h.coordinator.current_remote_position(), Some(42.0));
    }

    #[test]
    fn remote_load_with_open_viewer_is_not_repeated_by_play() {
        let mut h = harness();
        h.found("d");
        h.coordinator.connect("d").unwrap();
        h.started("d");
        h.open();
        assert_eq!(h.coordinator.viewer_state(), Some(PlaybackState::CreatedRemote));

        h.coordinator.load_remotely(&item(), 42.0).unwrap();
        assert_eq!(h.coordinator.viewer_state(), Some(PlaybackState::PlayingRemote));
        assert_eq!(h.coordinator.viewer().map(ViewerSession::position), Some(42.0));

        h.coordinator.pause_remotely(None).unwrap();
        assert_eq!(h.coordinator.viewer_state(), Some(PlaybackState::PausedRemote));
        h.coordinator.play().unwrap();
        assert_eq!(h.coordinator.viewer_state(), Some(PlaybackState::PlayingRemote));

        let loads: Vec<f64> = h
            .remote
            .commands()
            .iter()
            .filter_map(|c| match c {
                RemoteCommand::Load { position, .. } => Some(*position),
                _ => None,
            })
            .collect();
        assert_eq!(loads, vec![42.0]);
        assert!(matches!(
            h.remote.commands().last(),
            Some(RemoteCommand::Seek { position, .. }) if *position == 42.0
        ));
    }

    #[test]
    fn remote_commands_without_viewer_go_straight_to_session() {
        let mut h = harness();
        h.found("d");
        h.coordinator.connect("d").unwrap();
        h.started("d");
        assert!(h.coordinator.resume_remotely(Some(12.0)).is_ok());
        assert!(h.coordinator.pause_remotely(None).is_ok());
        assert_eq!(
            h.remote.commands(),
            vec![
                RemoteCommand::Seek {
                    position: 12.0,
                    resume_state: crate::transport::ResumeState::Play,
                },
                RemoteCommand::Pause,
            ]
        );
    }

    #[test]
    fn closing_viewer_stops_local_player() {
        let mut h = harness();
        let player = h.open();
        player.advance(10.0);
        assert!(player.is_playing());

        assert!(h.coordinator.close_viewer());

        assert!(!player.is_playing());
        assert_eq!(player.position(), 0.0);
    }

    #[test]
    fn inbox_is_bounded() {
        let h = harness();
        assert_eq!(h.coordinator.inbox().capacity(), Some(INBOX_CAPACITY));
    }

    #[test]
    fn connecting_to_second_device_ends_first() {
        let mut h = harness();
        h.found("a");
        h.found("b");
        h.coordinator.connect("a").unwrap();
        h.started("a");
        h.coordinator.connect("b").unwrap();

        h.remote.with(|t| {
            assert_eq!(t.started_sessions, vec!["a".to_string(), "b".to_string()]);
            assert_eq!(t.ended_sessions, 1);
        });
        assert_eq!(
            *h.statuses.borrow(),
            vec![SessionStatus::Started, SessionStatus::Ended]
        );
    }

    #[test]
    fn redundant_connect_without_visible_devices_is_a_no_op() {
        let mut h = harness();
        h.found("d");
        h.coordinator.connect("d").unwrap();
        h.started("d");
        h.coordinator
            .handle_transport_event(TransportEvent::DeviceLost {
                device_id: "d".to_string(),
            });

        assert_eq!(h.coordinator.connect("d").unwrap(), ConnectOutcome::Ignored);
        assert!(h.coordinator.is_connected());
        h.remote.with(|t| assert_eq!(t.started_sessions.len(), 1));
    }

    #[test]
    fn connect_to_unknown_device_is_an_error() {
        let mut h = harness();
        h.found("a");
        assert_eq!(
            h.coordinator.connect("ghost"),
            Err(HandoffError::UnknownDevice("ghost".to_string()))
        );
    }

    #[test]
    fn externally_started_session_registers_device() {
        let mut h = harness();
        h.started("sdk-picked");
        assert!(h.coordinator.is_connected());
        assert_eq!(h.coordinator.devices().len(), 1);
    }

    #[test]
    fn ticks_for_closed_viewer_are_discarded() {
        let mut h = harness();
        h.open();
        let inbox = h.coordinator.inbox();
        assert!(h.coordinator.close_viewer());

        inbox.send(CoordinatorInput::Tick { viewer: 1 }).unwrap();
        assert_eq!(h.coordinator.process_pending(), 1);
        assert_eq!(h.count(|e| matches!(e, HandoffEvent::PositionUpdated { .. })), 0);
    }

    #[test]
    fn position_timer_drives_updates_until_viewer_closes() {
        let mut h = harness_with(ResolvedConfig {
            poll_interval: Duration::from_millis(5),
            ..ResolvedConfig::default()
        });
        let player = h.open();
        player.advance(3.0);
        assert!(h.coordinator.wait_for_input(Duration::from_secs(2)));
        assert!(h.coordinator.wait_for_input(Duration::from_secs(2)));
        assert!(h.count(|e| matches!(e, HandoffEvent::PositionUpdated { position, .. } if *position == 3.0)) >= 1);
        assert_eq!(h.count(|e| matches!(e, HandoffEvent::DurationKnown { .. })), 1);

        h.coordinator.close_viewer();
        h.coordinator.process_pending();
        let before = h.count(|e| matches!(e, HandoffEvent::PositionUpdated { .. }));
        std::thread::sleep(Duration::from_millis(30));
        h.coordinator.process_pending();
        assert_eq!(
            h.count(|e| matches!(e, HandoffEvent::PositionUpdated { .. })),
            before
        );
    }

    #[test]
    fn media_status_is_ignored_without_listener() {
        let mut h = harness();
        h.coordinator
            .handle_transport_event(TransportEvent::MediaStatusUpdated {
                status: MediaStatus::default(),
            });
        assert_eq!(h.count(|e| matches!(e, HandoffEvent::MediaStatusUpdated { .. })), 0);

        h.found("d");
        h.coordinator.connect("d").unwrap();
        h.started("d");
        h.coordinator
            .handle_transport_event(TransportEvent::MediaStatusUpdated {
                status: MediaStatus::default(),
            });
        assert_eq!(h.count(|e| matches!(e, HandoffEvent::MediaStatusUpdated { .. })), 1);
    }

    #[test]
    fn rejected_acknowledgement_falls_back_to_local() {
        let mut h = harness();
        h.found("d");
        let player = h.open();
        player.advance(5.0);
        h.coordinator.connect("d").unwrap();
        h.started("d");
        assert_eq!(h.coordinator.viewer().map(ViewerSession::position), Some(5.0));

        h.coordinator
            .handle_transport_event(TransportEvent::RemoteRequestCompleted {
                request_id: 1,
                error: Some("LOAD_FAILED".to_string()),
            });

        assert_eq!(h.coordinator.viewer_state(), Some(PlaybackState::PlayingLocal));
        assert!(player.is_playing());
        assert_eq!(
            h.count(|e| *e == HandoffEvent::RemoteCommandAcknowledged { request_id: 1, ok: false }),
            1
        );
    }

    #[test]
    fn session_start_failure_keeps_local_playback() {
        let mut h = harness();
        h.found("d");
        let player = h.open();
        h.remote
            .update(|t| t.reject_sessions = Some("busy".to_string()));

        assert!(matches!(
            h.coordinator.connect("d"),
            Err(HandoffError::SessionStartFailure(_))
        ));
        assert_eq!(*h.statuses.borrow(), vec![SessionStatus::FailedToStart]);
        assert_eq!(h.coordinator.viewer_state(), Some(PlaybackState::PlayingLocal));
        assert!(player.is_playing());
    }

    #[test]
    fn backgrounding_suspends_connected_session() {
        let mut h = harness();
        h.coordinator.on_app_backgrounded();
        h.remote.with(|t| assert!(t.suspensions.is_empty()));

        h.found("d");
        h.coordinator.connect("d").unwrap();
        h.started("d");
        h.coordinator.on_app_backgrounded();

        h.remote
            .with(|t| assert_eq!(t.suspensions, vec![SuspendReason::AppBackgrounded]));
        assert!(!h.coordinator.is_connected());
        assert_eq!(h.statuses.borrow().last(), Some(&SessionStatus::Ended));
    }

    #[test]
    fn termination_stops_discovery_ends_session_and_closes_viewer() {
        let mut h = harness();
        h.coordinator.initialise().unwrap();
        h.found("d");
        h.open();
        h.coordinator.connect("d").unwrap();
        h.started("d");

        h.coordinator.on_app_terminating();

        h.remote.with(|t| {
            assert!(t.discovery.is_none());
            assert_eq!(t.suspensions, vec![SuspendReason::AppTerminated]);
            assert!(t.stopped_casting);
        });
        assert!(h.coordinator.viewer().is_none());
        assert!(!h.coordinator.is_connected());
    }

    #[test]
    fn viewer_commands_require_open_viewer() {
        let mut h = harness();
        assert_eq!(h.coordinator.play(), Err(HandoffError::NoViewer));
        assert_eq!(h.coordinator.tick(), Err(HandoffError::NoViewer));
    }

    #[test]
    fn stream_subscribers_receive_device_updates() {
        let mut h = harness();
        let mut rx = h.coordinator.subscribe_stream();
        h.found("d");
        assert_eq!(rx.try_recv().unwrap(), HandoffEvent::DeviceListChanged { count: 1 });
    }
}
