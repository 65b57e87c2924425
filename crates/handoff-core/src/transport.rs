//! Boundary with the external cast SDK and the on-device player.
//!
//! Adapters implement these traits; everything above them is transport-agnostic.
//! Callbacks from the SDK come back in as [`TransportEvent`]s.

use handoff_types::{Device, MediaDescriptor, MediaStatus, SuspendReason};
use serde::{Deserialize, Serialize};

/// Identifier assigned by the remote client to an issued media command.
pub type RequestId = u64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("transport offline")]
    Offline,
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// Discovery filter passed to the SDK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryCriteria {
    /// Receiver application the devices must support.
    pub receiver_app_id: String,
    /// Scan without keeping the radio busy (lower power, slower updates).
    pub passive_scan: bool,
}

/// Options for a remote load.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadOptions {
    /// Start position in seconds.
    pub play_position: f64,
    pub autoplay: bool,
}

/// Playback state the receiver should end up in after a seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeState {
    Play,
    Pause,
    Unchanged,
}

/// Options for a remote seek.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekOptions {
    /// Target position in seconds.
    pub interval: f64,
    pub resume_state: ResumeState,
}

/// Media channel of a connected session.
///
/// Commands are fire-and-forget: `Ok` means the command was dispatched.
/// Completion arrives later as [`TransportEvent::RemoteRequestCompleted`].
pub trait RemoteMediaClient {
    fn load_media(
        &mut self,
        media: &MediaDescriptor,
        options: LoadOptions,
    ) -> Result<RequestId, TransportError>;
    fn play(&mut self) -> Result<RequestId, TransportError>;
    fn pause(&mut self) -> Result<RequestId, TransportError>;
    fn seek(&mut self, options: SeekOptions) -> Result<RequestId, TransportError>;
    /// Position extrapolated from the last status update, in seconds.
    fn approximate_stream_position(&self) -> f64;
    /// Last media status pushed by the receiver.
    fn media_status(&self) -> Option<MediaStatus>;
    /// Enable or disable media status push updates for this client.
    fn set_status_listener(&mut self, enabled: bool);
}

/// Discovery and session management provided by the SDK.
pub trait CastTransport {
    fn start_discovery(&mut self, criteria: &DiscoveryCriteria) -> Result<(), TransportError>;
    fn stop_discovery(&mut self);
    fn is_discovery_active(&self) -> bool;
    /// Ask the SDK to open a session. The outcome is reported through
    /// [`TransportEvent::SessionStarted`] or [`TransportEvent::SessionFailedToStart`].
    fn start_session(&mut self, device: &Device) -> Result<(), TransportError>;
    fn end_session(&mut self, stop_casting: bool);
    fn suspend_session(&mut self, reason: SuspendReason);
    fn remote_client(&self) -> Option<&dyn RemoteMediaClient>;
    fn remote_client_mut(&mut self) -> Option<&mut dyn RemoteMediaClient>;
}

/// On-device player. Positions and durations are in seconds.
pub trait LocalPlayer {
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, position: f64);
    fn current_time(&self) -> f64;
    /// Duration once the asset is loaded; `None` while unknown.
    fn duration(&self) -> Option<f64>;
}

/// Callbacks delivered by the SDK adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TransportEvent {
    DiscoveryStarted { device_category: String },
    DeviceFound { device: Device },
    DeviceLost { device_id: String },
    SessionStarted { device: Device },
    SessionResumed { device: Device },
    SessionSuspended { reason: SuspendReason },
    SessionEnded {
        #[serde(default)]
        error: Option<String>,
    },
    SessionFailedToStart { error: String },
    MediaStatusUpdated { status: MediaStatus },
    RemoteRequestCompleted {
        request_id: RequestId,
        #[serde(default)]
        error: Option<String>,
    },
    /// Log line emitted by one of the SDK's internal classes.
    SdkLog {
        class: String,
        function: String,
        message: String,
    },
}
