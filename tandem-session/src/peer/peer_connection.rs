use crate::config::SessionConfig;
use anyhow::Result;
use async_trait::async_trait;
use tandem_core::{ConnectionState, LocalTrack, RemoteTrack, SessionDescription};
use tokio::sync::mpsc;

/// Callbacks of the peer connection, delivered as messages.
#[derive(Debug, Clone)]
pub enum PeerEvent {
    /// A new outgoing connectivity candidate, serialized for the store.
    LocalCandidate(serde_json::Value),
    RemoteTrack(RemoteTrack),
    ConnectionState(ConnectionState),
}

/// The negotiation engine of one call.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn add_track(&self, track: &LocalTrack) -> Result<()>;

    async fn create_offer(&self) -> Result<SessionDescription>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()>;

    async fn has_remote_description(&self) -> bool;

    /// Adds a candidate exactly as the remote peer serialized it.
    async fn add_remote_candidate(&self, candidate: serde_json::Value) -> Result<()>;

    /// Releases media and stops further callbacks.
    async fn close(&self) -> Result<()>;
}

/// Builds a fresh peer connection for every call attempt.
#[async_trait]
pub trait PeerConnector: Send + Sync {
    async fn connect(
        &self,
        config: &SessionConfig,
        events: mpsc::Sender<PeerEvent>,
    ) -> Result<Box<dyn PeerConnection>>;
}
