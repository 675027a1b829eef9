use crate::config::{MediaConstraints, SessionConfig};
use crate::error::SessionError;
use crate::media::{MediaSource, SyntheticMedia};
use crate::peer::{PeerConnector, WebRtcConnector};
use crate::session::call_handle::CallHandle;
use crate::session::call_session::CallSession;
use crate::session::session_state::Role;
use crate::store::SignalingStore;
use std::sync::Arc;
use tandem_core::RoomId;
use tracing::info;

/// Starts calls. Every call gets its own session and peer connection.
#[derive(Clone)]
pub struct Coordinator {
    pub(crate) config: SessionConfig,
    pub(crate) store: Arc<dyn SignalingStore>,
    pub(crate) connector: Arc<dyn PeerConnector>,
    pub(crate) media: Arc<dyn MediaSource>,
}

impl Coordinator {
    pub fn new(
        config: SessionConfig,
        store: Arc<dyn SignalingStore>,
        connector: Arc<dyn PeerConnector>,
        media: Arc<dyn MediaSource>,
    ) -> Self {
        Self {
            config,
            store,
            connector,
            media,
        }
    }

    /// `webrtc` peer connections with synthetic local tracks.
    pub fn with_webrtc(
        config: SessionConfig,
        store: Arc<dyn SignalingStore>,
        constraints: MediaConstraints,
    ) -> Self {
        Self::new(
            config,
            store,
            Arc::new(WebRtcConnector),
            Arc::new(SyntheticMedia::new(constraints)),
        )
    }

    /// Publishes an offer in a new room and returns once it is awaiting the answer.
    pub async fn create_call(&self) -> Result<CallHandle, SessionError> {
        let mut session = CallSession::new(Role::Creator, self.clone());

        match session.start_as_creator().await {
            Ok(room_id) => {
                info!("Created room {}", room_id);
                Ok(session.spawn(room_id))
            }
            Err(e) => {
                session.abort(&e).await;
                Err(e)
            }
        }
    }

    /// Answers the offer stored under `room_id`.
    pub async fn join_call(&self, room_id: RoomId) -> Result<CallHandle, SessionError> {
        let mut session = CallSession::new(Role::Joiner, self.clone());

        match session.start_as_joiner(room_id).await {
            Ok(room_id) => {
                info!("Joined room {}", room_id);
                Ok(session.spawn(room_id))
            }
            Err(e) => {
                session.abort(&e).await;
                Err(e)
            }
        }
    }
}
