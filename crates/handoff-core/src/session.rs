//! Cast session lifecycle.
//!
//! Owns the connection to at most one receiver at a time and publishes status
//! transitions. Every emitted status goes to the single-slot status listener,
//! to the event bus, and into a queue the coordinator drains to drive the
//! open viewer.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use handoff_types::{Device, SessionStatus, SuspendReason};
use uuid::Uuid;

use crate::device_registry::DeviceRegistry;
use crate::error::HandoffError;
use crate::events::EventBus;
use crate::transport::{CastTransport, DiscoveryCriteria, RemoteMediaClient, TransportError};

/// Lifecycle state of the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Started,
    Resumed,
    Suspended(SuspendReason),
    Ended,
    /// Start failed; carries the transport error.
    Failed(String),
}

impl SessionState {
    /// `true` until the session has ended or failed.
    fn is_live(&self) -> bool {
        matches!(
            self,
            SessionState::Starting
                | SessionState::Started
                | SessionState::Resumed
                | SessionState::Suspended(_)
        )
    }
}

/// Connection to one receiver.
///
/// Holds a weak reference to the device: the registry owns device lifetime.
#[derive(Debug, Clone)]
pub struct Session {
    /// Stable session id (`sess:<uuid>`).
    pub id: String,
    pub device_id: String,
    device: Weak<Device>,
    pub state: SessionState,
}

impl Session {
    fn new(device: &Arc<Device>, state: SessionState) -> Self {
        Self {
            id: format!("sess:{}", Uuid::new_v4()),
            device_id: device.id.clone(),
            device: Arc::downgrade(device),
            state,
        }
    }

    /// The target device, while the registry still holds it.
    pub fn device(&self) -> Option<Arc<Device>> {
        self.device.upgrade()
    }
}

/// Result of a connect request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The transport accepted the request; the outcome arrives later.
    Starting,
    /// Redundant connect while already connected and no device is visible.
    Ignored,
}

type StatusListener = Box<dyn FnMut(SessionStatus)>;

pub struct SessionController {
    transport: Box<dyn CastTransport>,
    session: Option<Session>,
    status_listener: Option<StatusListener>,
    media_listener_registered: bool,
    last_status: Option<SessionStatus>,
    emitted: VecDeque<SessionStatus>,
}

impl SessionController {
    pub fn new(transport: Box<dyn CastTransport>) -> Self {
        Self {
            transport,
            session: None,
            status_listener: None,
            media_listener_registered: false,
            last_status: None,
            emitted: VecDeque::new(),
        }
    }

    pub fn start_discovery(&mut self, criteria: &DiscoveryCriteria) -> Result<(), TransportError> {
        self.transport.start_discovery(criteria)?;
        tracing::info!(
            receiver_app_id = %criteria.receiver_app_id,
            passive_scan = criteria.passive_scan,
            "discovery: started"
        );
        Ok(())
    }

    /// Stop discovery if it is running. Returns `true` when it was stopped.
    pub fn stop_discovery(&mut self) -> bool {
        if !self.transport.is_discovery_active() {
            return false;
        }
        self.transport.stop_discovery();
        tracing::info!("discovery: stopped");
        true
    }

    pub fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map(|s| s.state.clone())
            .unwrap_or(SessionState::Idle)
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// `true` while a session is started or resumed.
    pub fn is_connected(&self) -> bool {
        matches!(
            self.session.as_ref().map(|s| &s.state),
            Some(SessionState::Started | SessionState::Resumed)
        )
    }

    /// The device of a connected session.
    pub fn current_device(&self) -> Option<Arc<Device>> {
        if !self.is_connected() {
            return None;
        }
        self.session.as_ref().and_then(Session::device)
    }

    /// Last status delivered to listeners.
    pub fn last_status(&self) -> Option<SessionStatus> {
        self.last_status
    }

    /// Register the status listener, replacing any previous one.
    ///
    /// Only one listener is kept. Observers that need to coexist should
    /// subscribe to the event bus instead.
    pub fn add_status_listener(&mut self, listener: impl FnMut(SessionStatus) + 'static) {
        if self.status_listener.is_some() {
            tracing::debug!("session: replacing status listener");
        }
        self.status_listener = Some(Box::new(listener));
    }

    /// Media channel of the connected session.
    pub fn remote_client(&self) -> Option<&dyn RemoteMediaClient> {
        if !self.is_connected() {
            return None;
        }
        self.transport.remote_client()
    }

    pub fn remote_client_mut(&mut self) -> Option<&mut dyn RemoteMediaClient> {
        if !self.is_connected() {
            return None;
        }
        self.transport.remote_client_mut()
    }

    /// `true` while media status updates are registered on the remote client.
    pub fn is_listening_for_media_status(&self) -> bool {
        self.media_listener_registered
    }

    /// Pop the next status emitted since the last call.
    pub fn next_emitted(&mut self) -> Option<SessionStatus> {
        self.emitted.pop_front()
    }

    /// Open a session to `device`, ending any live session first.
    ///
    /// A connect while the registry is empty and a session is already
    /// connected is ignored.
    pub fn connect(
        &mut self,
        device: &Arc<Device>,
        registry: &DeviceRegistry,
        events: &mut EventBus,
    ) -> Result<ConnectOutcome, HandoffError> {
        if registry.is_empty() && self.is_connected() {
            tracing::info!(device_id = %device.id, "session: connect ignored, already connected");
            return Ok(ConnectOutcome::Ignored);
        }
        if self.session.as_ref().is_some_and(|s| s.state.is_live()) {
            tracing::info!(device_id = %device.id, "session: ending previous session before connect");
            self.end(false, events);
        }

        self.session = Some(Session::new(device, SessionState::Starting));
        match self.transport.start_session(device) {
            Ok(()) => {
                tracing::info!(device_id = %device.id, "session: starting");
                Ok(ConnectOutcome::Starting)
            }
            Err(err) => {
                let message = err.to_string();
                self.on_session_failed_to_start(message.clone(), events);
                Err(HandoffError::SessionStartFailure(message))
            }
        }
    }

    /// End the connected session. Returns `false` when nothing was connected.
    pub fn disconnect(&mut self, events: &mut EventBus) -> bool {
        if !self.is_connected() {
            return false;
        }
        self.end(false, events);
        true
    }

    /// Suspend the connected session on behalf of the app.
    pub fn suspend(&mut self, reason: SuspendReason, events: &mut EventBus) -> bool {
        if !self.is_connected() {
            return false;
        }
        self.transport.suspend_session(reason);
        self.on_session_suspended(reason, events);
        true
    }

    /// End the live session and tell the receiver to stop playback.
    pub fn end_and_stop_casting(&mut self, events: &mut EventBus) -> bool {
        if !self.session.as_ref().is_some_and(|s| s.state.is_live()) {
            return false;
        }
        self.end(true, events);
        true
    }

    /// Report that a remote load went to an already connected session.
    pub fn notify_already_connected(&mut self, events: &mut EventBus) {
        if self.is_connected() {
            self.emit(SessionStatus::AlreadyConnected, events);
        }
    }

    /// Transport reported a started session.
    ///
    /// Sessions started outside [`connect`](Self::connect) (for example from
    /// the SDK's own device picker) are adopted.
    pub fn on_session_started(&mut self, device: &Arc<Device>, events: &mut EventBus) {
        match self.session.as_mut() {
            Some(session) if session.state == SessionState::Starting => {
                if session.device_id != device.id {
                    tracing::warn!(
                        expected = %session.device_id,
                        actual = %device.id,
                        "session: started on a different device"
                    );
                    *session = Session::new(device, SessionState::Started);
                } else {
                    session.state = SessionState::Started;
                }
            }
            Some(session) if session.state.is_live() => {
                tracing::debug!(state = ?session.state, "session: duplicate start ignored");
                return;
            }
            _ => {
                tracing::info!(device_id = %device.id, "session: adopting externally started session");
                self.session = Some(Session::new(device, SessionState::Started));
            }
        }
        tracing::info!(device_id = %device.id, "session: started");
        self.register_media_listener();
        self.emit(SessionStatus::Started, events);
    }

    /// Transport resumed a session.
    pub fn on_session_resumed(&mut self, device: &Arc<Device>, events: &mut EventBus) {
        match self.session.as_mut() {
            Some(session) if matches!(session.state, SessionState::Suspended(_)) => {
                session.state = SessionState::Resumed;
            }
            Some(session) if session.state.is_live() => {
                tracing::debug!(state = ?session.state, "session: resume ignored");
                return;
            }
            _ => {
                self.session = Some(Session::new(device, SessionState::Resumed));
            }
        }
        tracing::info!(device_id = %device.id, "session: resumed");
        self.register_media_listener();
        self.emit(SessionStatus::Resumed, events);
    }

    /// Transport suspended the session. Listeners observe this as `Ended`.
    pub fn on_session_suspended(&mut self, reason: SuspendReason, events: &mut EventBus) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !matches!(session.state, SessionState::Started | SessionState::Resumed) {
            tracing::debug!(state = ?session.state, "session: suspend ignored");
            return;
        }
        session.state = SessionState::Suspended(reason);
        tracing::info!(reason = ?reason, "session: suspended");
        self.deregister_media_listener();
        self.emit(SessionStatus::Ended, events);
    }

    /// Transport ended the session, possibly because of an error.
    pub fn on_session_ended(&mut self, error: Option<String>, events: &mut EventBus) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.state.is_live() {
            tracing::debug!(state = ?session.state, "session: end ignored");
            return;
        }
        let was_suspended = matches!(session.state, SessionState::Suspended(_));
        session.state = SessionState::Ended;
        match error.as_deref() {
            Some(error) => tracing::warn!(error = %error, "session: ended with error"),
            None => tracing::info!("session: ended"),
        }
        self.deregister_media_listener();
        if !was_suspended {
            self.emit(SessionStatus::Ended, events);
        }
    }

    /// Transport could not start the session.
    pub fn on_session_failed_to_start(&mut self, error: String, events: &mut EventBus) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.state != SessionState::Starting {
            tracing::debug!(state = ?session.state, "session: start failure ignored");
            return;
        }
        tracing::warn!(device_id = %session.device_id, error = %error, "session: failed to start");
        session.state = SessionState::Failed(error);
        self.emit(SessionStatus::FailedToStart, events);
    }

    fn end(&mut self, stop_casting: bool, events: &mut EventBus) {
        self.deregister_media_listener();
        self.transport.end_session(stop_casting);
        self.on_session_ended(None, events);
    }

    fn register_media_listener(&mut self) {
        if self.media_listener_registered {
            return;
        }
        if let Some(client) = self.transport.remote_client_mut() {
            client.set_status_listener(true);
            self.media_listener_registered = true;
        } else {
            tracing::warn!("session: no remote client to listen on");
        }
    }

    fn deregister_media_listener(&mut self) {
        if !self.media_listener_registered {
            return;
        }
        if let Some(client) = self.transport.remote_client_mut() {
            client.set_status_listener(false);
        }
        self.media_listener_registered = false;
    }

    fn emit(&mut self, status: SessionStatus, events: &mut EventBus) {
        self.last_status = Some(status);
        if let Some(listener) = self.status_listener.as_mut() {
            listener(status);
        }
        events.session_status_changed(status);
        self.emitted.push_back(status);
    }
}
