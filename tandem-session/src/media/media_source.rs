use crate::config::MediaConstraints;
use crate::error::SessionError;
use async_trait::async_trait;
use tandem_core::{LocalTrack, TrackKind};
use uuid::Uuid;

/// Tracks captured for one call.
#[derive(Debug, Clone)]
pub struct LocalMedia {
    pub stream_id: String,
    pub tracks: Vec<LocalTrack>,
}

/// Local capture capability. Fails with [`SessionError::MediaUnavailable`].
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn acquire(&self) -> Result<LocalMedia, SessionError>;
}

/// Declares an Opus audio and a VP8 video track without touching devices.
/// Samples are written by whoever owns the capture pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticMedia {
    constraints: MediaConstraints,
}

impl SyntheticMedia {
    pub fn new(constraints: MediaConstraints) -> Self {
        Self { constraints }
    }
}

#[async_trait]
impl MediaSource for SyntheticMedia {
    async fn acquire(&self) -> Result<LocalMedia, SessionError> {
        let stream_id = format!("tandem-{}", Uuid::new_v4().simple());
        let mut tracks = Vec::new();

        if self.constraints.audio {
            tracks.push(LocalTrack {
                id: format!("{stream_id}-audio"),
                stream_id: stream_id.clone(),
                kind: TrackKind::Audio,
            });
        }
        if self.constraints.video {
            tracks.push(LocalTrack {
                id: format!("{stream_id}-video"),
                stream_id: stream_id.clone(),
                kind: TrackKind::Video,
            });
        }

        if tracks.is_empty() {
            return Err(SessionError::MediaUnavailable(
                "neither audio nor video was requested".to_owned(),
            ));
        }

        Ok(LocalMedia { stream_id, tracks })
    }
}
