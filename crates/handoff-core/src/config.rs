//! Configuration loading and parsing.
//!
//! Defines the coordinator config schema and resolves defaults.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Application id of the default media receiver.
pub const DEFAULT_RECEIVER_APP_ID: &str = "CC1AD845";
const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
const DEFAULT_THUMBNAIL_WIDTH: u32 = 480;
const DEFAULT_THUMBNAIL_HEIGHT: u32 = 360;
const DEFAULT_LOG_FILTER: &str = "info,handoff_core=info";
const DEFAULT_LOG_CLASSES: &[&str] = &[
    "GCKDeviceScanner",
    "GCKDeviceProvider",
    "GCKDiscoveryManager",
    "GCKCastChannel",
    "GCKMediaControlChannel",
    "GCKUICastButton",
    "GCKUIMediaController",
    "NSMutableDictionary",
];

/// Top-level coordinator configuration loaded from TOML.
#[derive(Debug, Default, Deserialize)]
pub struct CoordinatorConfig {
    /// Receiver application devices must support.
    pub receiver_app_id: Option<String>,
    /// Use passive discovery scanning.
    pub passive_scan: Option<bool>,
    /// Forward SDK log lines to tracing.
    pub debug_logging: Option<bool>,
    /// SDK classes whose log lines are forwarded.
    pub log_classes: Option<Vec<String>>,
    /// Default tracing filter for binaries (overridden by `RUST_LOG`).
    pub log_filter: Option<String>,
    /// Playback settings.
    pub playback: Option<PlaybackSettings>,
    /// Media descriptor settings.
    pub media: Option<MediaSettings>,
    /// Remote-to-local handoff settings.
    pub handoff: Option<HandoffSettings>,
}

/// Playback settings.
#[derive(Debug, Default, Deserialize)]
pub struct PlaybackSettings {
    /// Position polling cadence in milliseconds (default: 500).
    pub position_poll_interval_ms: Option<u64>,
    /// Start local playback when a viewer opens without a connected session.
    pub autoplay: Option<bool>,
}

/// Media descriptor settings.
#[derive(Debug, Default, Deserialize)]
pub struct MediaSettings {
    /// Thumbnail width advertised to the receiver.
    pub thumbnail_width: Option<u32>,
    /// Thumbnail height advertised to the receiver.
    pub thumbnail_height: Option<u32>,
}

/// Handoff settings.
#[derive(Debug, Default, Deserialize)]
pub struct HandoffSettings {
    /// Keep play/pause as-is when a remote session ends.
    ///
    /// When `false` (default) a session that ends while playing leaves local
    /// playback paused, and one that ends while paused resumes local playback.
    pub preserve_play_state: Option<bool>,
}

/// Config with every default applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub receiver_app_id: String,
    pub passive_scan: bool,
    pub debug_logging: bool,
    pub log_classes: Vec<String>,
    pub log_filter: String,
    pub poll_interval: Duration,
    pub autoplay: bool,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
    pub preserve_play_state: bool,
}

impl CoordinatorConfig {
    /// Load configuration from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        Self::parse(&raw).with_context(|| format!("parse config {:?}", path))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str::<CoordinatorConfig>(raw)?)
    }
}

impl ResolvedConfig {
    /// Apply defaults and validate.
    pub fn from_config(cfg: &CoordinatorConfig) -> Result<Self> {
        let receiver_app_id = receiver_app_id_from_config(cfg);
        let poll_interval = poll_interval_from_config(cfg)?;
        let playback = cfg.playback.as_ref();
        let media = cfg.media.as_ref();
        Ok(Self {
            receiver_app_id,
            passive_scan: cfg.passive_scan.unwrap_or(true),
            debug_logging: cfg.debug_logging.unwrap_or(true),
            log_classes: cfg
                .log_classes
                .clone()
                .unwrap_or_else(default_log_classes),
            log_filter: cfg
                .log_filter
                .clone()
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            poll_interval,
            autoplay: playback.and_then(|p| p.autoplay).unwrap_or(true),
            thumbnail_width: media
                .and_then(|m| m.thumbnail_width)
                .unwrap_or(DEFAULT_THUMBNAIL_WIDTH),
            thumbnail_height: media
                .and_then(|m| m.thumbnail_height)
                .unwrap_or(DEFAULT_THUMBNAIL_HEIGHT),
            preserve_play_state: cfg
                .handoff
                .as_ref()
                .and_then(|h| h.preserve_play_state)
                .unwrap_or(false),
        })
    }

    /// `true` when SDK log lines from `class` should be forwarded.
    pub fn forwards_sdk_class(&self, class: &str) -> bool {
        self.debug_logging && self.log_classes.iter().any(|c| c == class)
    }
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            receiver_app_id: DEFAULT_RECEIVER_APP_ID.to_string(),
            passive_scan: true,
            debug_logging: true,
            log_classes: default_log_classes(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            autoplay: true,
            thumbnail_width: DEFAULT_THUMBNAIL_WIDTH,
            thumbnail_height: DEFAULT_THUMBNAIL_HEIGHT,
            preserve_play_state: false,
        }
    }
}

fn default_log_classes() -> Vec<String> {
    DEFAULT_LOG_CLASSES.iter().map(|c| c.to_string()).collect()
}

/// Resolve the receiver app id, falling back to the default media receiver.
pub fn receiver_app_id_from_config(cfg: &CoordinatorConfig) -> String {
    cfg.receiver_app_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or(DEFAULT_RECEIVER_APP_ID)
        .to_string()
}

/// Resolve the position polling cadence.
pub fn poll_interval_from_config(cfg: &CoordinatorConfig) -> Result<Duration> {
    let ms = cfg
        .playback
        .as_ref()
        .and_then(|p| p.position_poll_interval_ms)
        .unwrap_or(DEFAULT_POLL_INTERVAL_MS);
    if ms == 0 {
        return Err(anyhow::anyhow!(
            "playback.position_poll_interval_ms must be greater than 0"
        ));
    }
    Ok(Duration::from_millis(ms))
}
