use serde::{Deserialize, Serialize};

/// Capability flags advertised by a receiver device during discovery.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceCapabilities {
    /// Device can render video.
    pub video_out: bool,
    /// Device can capture video.
    pub video_in: bool,
    /// Device can render audio.
    pub audio_out: bool,
    /// Device can capture audio.
    pub audio_in: bool,
    /// Device is a multizone speaker group.
    pub multizone_group: bool,
}

impl DeviceCapabilities {
    /// Capabilities of a regular video receiver (video + audio out).
    pub fn video_receiver() -> Self {
        Self {
            video_out: true,
            audio_out: true,
            ..Self::default()
        }
    }
}

/// Receiver device reported by the discovery layer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Device {
    /// Stable device identifier assigned by the transport.
    pub id: String,
    /// Human-readable name shown to users (for example `Living Room TV`).
    pub friendly_name: String,
    /// Hardware model, when the transport reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    /// Advertised capabilities.
    #[serde(default)]
    pub capabilities: DeviceCapabilities,
}

impl Device {
    /// Build a video receiver with the given id and name.
    pub fn new(id: impl Into<String>, friendly_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            friendly_name: friendly_name.into(),
            model_name: None,
            capabilities: DeviceCapabilities::video_receiver(),
        }
    }
}

/// How the media is streamed to the receiver.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    #[default]
    Buffered,
    Live,
    None,
}

/// Session status as observed by listeners.
///
/// Suspension is reported as `Ended`: playback logic treats a suspended
/// session the same way as an ended one.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Started,
    Resumed,
    Ended,
    FailedToStart,
    /// A remote load was dispatched to a session that was already connected.
    AlreadyConnected,
}

/// Why the transport suspended a session.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SuspendReason {
    AppBackgrounded,
    AppTerminated,
    NetworkLoss,
    UserInitiated,
}

/// Which engine currently owns playback.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    #[default]
    Local,
    Remote,
}

/// Per-viewer playback state.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    #[default]
    Created,
    CreatedRemote,
    PlayingRemote,
    PlayingLocal,
    PausedRemote,
    PausedLocal,
    FinishedRemote,
    FinishedLocal,
}

impl PlaybackState {
    /// Transport that owns playback in this state.
    pub fn transport(self) -> TransportKind {
        match self {
            PlaybackState::CreatedRemote
            | PlaybackState::PlayingRemote
            | PlaybackState::PausedRemote
            | PlaybackState::FinishedRemote => TransportKind::Remote,
            PlaybackState::Created
            | PlaybackState::PlayingLocal
            | PlaybackState::PausedLocal
            | PlaybackState::FinishedLocal => TransportKind::Local,
        }
    }

    /// `true` when the remote transport owns playback.
    pub fn is_remote(self) -> bool {
        self.transport() == TransportKind::Remote
    }

    /// `true` while media is actively playing on either transport.
    pub fn is_playing(self) -> bool {
        matches!(self, PlaybackState::PlayingLocal | PlaybackState::PlayingRemote)
    }

    /// `true` once end-of-stream has been reached.
    pub fn is_finished(self) -> bool {
        matches!(self, PlaybackState::FinishedLocal | PlaybackState::FinishedRemote)
    }
}

/// Which transport controls are actionable for a playback state.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Affordances {
    /// Play/pause button is enabled.
    pub play_pause_enabled: bool,
    /// Play/pause button should show the pause glyph.
    pub shows_pause: bool,
    /// Stop button is enabled.
    pub stop_enabled: bool,
    /// Seek bar accepts input.
    pub seek_enabled: bool,
    /// Remote mini controls should be shown instead of the local chrome.
    pub remote_controls_visible: bool,
}

/// Buffering/playback state reported by the receiver.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RemotePlayerState {
    #[default]
    Unknown,
    Idle,
    Buffering,
    Loading,
    Playing,
    Paused,
}

/// Why the receiver went idle.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IdleReason {
    Finished,
    Cancelled,
    Interrupted,
    Error,
}

/// Image attached to the media metadata.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MediaImage {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

/// Metadata section of a media descriptor (movie metadata).
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct MediaMetadata {
    pub title: String,
    pub description: String,
    /// Studio label; replaced by the receiver name while casting.
    pub studio: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<MediaImage>,
}

/// Media descriptor handed to the receiver for a load.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MediaDescriptor {
    pub content_id: String,
    pub stream_type: StreamType,
    /// MIME type; left empty so the receiver sniffs it.
    pub content_type: String,
    pub metadata: MediaMetadata,
    /// Duration in seconds. `0` marks live or unknown duration.
    pub stream_duration: f64,
}

/// Media status pushed by the receiver.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct MediaStatus {
    pub player_state: RemotePlayerState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_reason: Option<IdleReason>,
    /// Stream position in seconds at the time of the update.
    #[serde(default)]
    pub stream_position: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaDescriptor>,
}

impl MediaStatus {
    /// `true` when the receiver reports that the media played to the end.
    pub fn reached_end(&self) -> bool {
        self.player_state == RemotePlayerState::Idle && self.idle_reason == Some(IdleReason::Finished)
    }
}
