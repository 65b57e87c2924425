//! In-process event bus for coordinator updates.
//!
//! Listeners are invoked synchronously, in registration order, on the context
//! that publishes. A broadcast channel mirrors every event for observers that
//! live on other threads.

use handoff_types::{Affordances, MediaDescriptor, PlaybackState, SessionStatus};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::transport::RequestId;

/// Event payloads published by the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HandoffEvent {
    SessionStatusChanged {
        status: SessionStatus,
    },
    MediaStatusUpdated {
        media: Option<MediaDescriptor>,
    },
    DeviceListChanged {
        count: usize,
    },
    /// The local player was moved to `position` after a remote session went away.
    SeekRequestedFromRemote {
        position: f64,
    },
    PlaybackStateChanged {
        viewer_id: u64,
        state: PlaybackState,
        affordances: Affordances,
    },
    PositionUpdated {
        viewer_id: u64,
        position: f64,
        duration: Option<f64>,
    },
    DurationKnown {
        viewer_id: u64,
        duration: f64,
    },
    /// The receiver acknowledged (or rejected) a dispatched media command.
    RemoteCommandAcknowledged {
        request_id: RequestId,
        ok: bool,
    },
}

/// Token returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&HandoffEvent)>;

pub struct EventBus {
    listeners: Vec<(SubscriptionId, Listener)>,
    next_id: u64,
    sender: broadcast::Sender<HandoffEvent>,
}

impl EventBus {
    /// Create a new event bus with a bounded broadcast mirror.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self {
            listeners: Vec::new(),
            next_id: 1,
            sender,
        }
    }

    /// Register a listener. Every registration is independent.
    pub fn subscribe(&mut self, listener: impl FnMut(&HandoffEvent) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` when the token is unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    /// Subscribe to the broadcast mirror of the event stream.
    pub fn subscribe_stream(&self) -> broadcast::Receiver<HandoffEvent> {
        self.sender.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Deliver an event to every listener, then to stream subscribers.
    pub fn publish(&mut self, event: HandoffEvent) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(&event);
        }
        let _ = self.sender.send(event);
    }

    /// Notify subscribers that the session status changed.
    pub fn session_status_changed(&mut self, status: SessionStatus) {
        self.publish(HandoffEvent::SessionStatusChanged { status });
    }

    /// Notify subscribers that the device list changed.
    pub fn device_list_changed(&mut self, count: usize) {
        self.publish(HandoffEvent::DeviceListChanged { count });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
