//! Media items and the descriptor sent to the receiver.

use handoff_types::{MediaDescriptor, MediaImage, MediaMetadata, StreamType};
use url::Url;

use crate::error::HandoffError;

/// Playable item shown in a viewer. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaItem {
    content_id: String,
    title: String,
    description: String,
    studio: String,
    duration: f64,
    stream_type: StreamType,
    thumbnail_url: Option<Url>,
}

impl MediaItem {
    pub fn builder(content_id: impl Into<String>) -> MediaItemBuilder {
        MediaItemBuilder {
            content_id: content_id.into(),
            title: String::new(),
            description: String::new(),
            studio: String::new(),
            duration: 0.0,
            stream_type: StreamType::Buffered,
            thumbnail_url: None,
        }
    }

    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn studio(&self) -> &str {
        &self.studio
    }

    /// Duration in seconds; `0` for live or unknown.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn stream_type(&self) -> StreamType {
        self.stream_type
    }

    pub fn thumbnail_url(&self) -> Option<&Url> {
        self.thumbnail_url.as_ref()
    }

    /// Build the receiver descriptor.
    ///
    /// `device_name` replaces the studio label while a session is connected.
    pub fn descriptor(&self, device_name: Option<&str>, thumbnail: (u32, u32)) -> MediaDescriptor {
        let studio = device_name.unwrap_or(&self.studio).to_string();
        let images = self
            .thumbnail_url
            .iter()
            .map(|url| MediaImage {
                url: url.to_string(),
                width: thumbnail.0,
                height: thumbnail.1,
            })
            .collect();
        MediaDescriptor {
            content_id: self.content_id.clone(),
            stream_type: self.stream_type,
            content_type: String::new(),
            metadata: MediaMetadata {
                title: self.title.clone(),
                description: self.description.clone(),
                studio,
                images,
            },
            stream_duration: self.duration,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaItemBuilder {
    content_id: String,
    title: String,
    description: String,
    studio: String,
    duration: f64,
    stream_type: StreamType,
    thumbnail_url: Option<String>,
}

impl MediaItemBuilder {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn studio(mut self, studio: impl Into<String>) -> Self {
        self.studio = studio.into();
        self
    }

    pub fn duration(mut self, seconds: f64) -> Self {
        self.duration = seconds;
        self
    }

    pub fn stream_type(mut self, stream_type: StreamType) -> Self {
        self.stream_type = stream_type;
        self
    }

    pub fn thumbnail_url(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(url.into());
        self
    }

    pub fn build(self) -> Result<MediaItem, HandoffError> {
        if self.content_id.trim().is_empty() {
            return Err(HandoffError::InvalidMedia("content id is empty".to_string()));
        }
        if !self.duration.is_finite() || self.duration < 0.0 {
            return Err(HandoffError::InvalidMedia(format!(
                "duration must be a non-negative number of seconds, got {}",
                self.duration
            )));
        }
        let thumbnail_url = self
            .thumbnail_url
            .map(|raw| {
                Url::parse(&raw).map_err(|err| {
                    HandoffError::InvalidMedia(format!("thumbnail url {raw:?}: {err}"))
                })
            })
            .transpose()?;
        Ok(MediaItem {
            content_id: self.content_id,
            title: self.title,
            description: self.description,
            studio: self.studio,
            duration: self.duration,
            stream_type: self.stream_type,
            thumbnail_url,
        })
    }
}
