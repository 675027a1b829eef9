use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use tandem_core::{ConnectionState, LocalTrack, SessionDescription};
use tandem_session::{PeerConnection, PeerConnector, PeerEvent, SessionConfig};
use tokio::sync::{Mutex, mpsc};

/// One call made by the coordinator on a [`MockPeer`].
#[derive(Debug, Clone, PartialEq)]
pub enum PeerCall {
    AddTrack(String),
    CreateOffer,
    CreateAnswer,
    SetLocal(SessionDescription),
    SetRemote(SessionDescription),
    AddCandidate(Value),
    Close,
}

/// A host candidate in the browser's JSON shape.
pub fn candidate(n: u32) -> Value {
    json!({
        "candidate": format!("candidate:{n} 1 udp 2122260223 192.168.1.{n} 5{n:04} typ host"),
        "sdpMid": "0",
        "sdpMLineIndex": 0,
    })
}

#[derive(Default)]
struct MockPeerState {
    calls: Vec<PeerCall>,
    remote: Option<SessionDescription>,
}

/// Test-side view of a [`MockPeer`]: inspect its calls, push callbacks into it.
#[derive(Clone)]
pub struct MockPeerHandle {
    state: Arc<Mutex<MockPeerState>>,
    events: mpsc::Sender<PeerEvent>,
}

impl MockPeerHandle {
    pub async fn calls(&self) -> Vec<PeerCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn remote_candidates(&self) -> Vec<Value> {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter_map(|c| match c {
                PeerCall::AddCandidate(v) => Some(v.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn set_remote_count(&self) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| matches!(c, PeerCall::SetRemote(_)))
            .count()
    }

    pub async fn close_count(&self) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| matches!(c, PeerCall::Close))
            .count()
    }

    /// Simulates a peer connection callback.
    pub async fn emit(&self, event: PeerEvent) {
        let _ = self.events.send(event).await;
    }

    pub async fn emit_local_candidate(&self, n: u32) {
        self.emit(PeerEvent::LocalCandidate(candidate(n))).await;
    }

    pub async fn emit_state(&self, state: ConnectionState) {
        self.emit(PeerEvent::ConnectionState(state)).await;
    }
}

/// Records every call. Candidates are refused until a remote description is
/// set, like a real peer connection.
pub struct MockPeer {
    label: String,
    handle: MockPeerHandle,
    gathered: Vec<Value>,
}

#[async_trait]
impl PeerConnection for MockPeer {
    async fn add_track(&self, track: &LocalTrack) -> Result<()> {
        let mut state = self.handle.state.lock().await;
        state.calls.push(PeerCall::AddTrack(track.id.clone()));
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        let mut state = self.handle.state.lock().await;
        state.calls.push(PeerCall::CreateOffer);
        Ok(SessionDescription::offer(format!("{}-offer", self.label)))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let mut state = self.handle.state.lock().await;
        if state.remote.is_none() {
            bail!("cannot answer without a remote offer");
        }
        state.calls.push(PeerCall::CreateAnswer);
        Ok(SessionDescription::answer(format!("{}-answer", self.label)))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        self.handle
            .state
            .lock()
            .await
            .calls
            .push(PeerCall::SetLocal(desc));

        // Gathering starts once the local description is in place.
        for c in &self.gathered {
            self.handle
                .emit(PeerEvent::LocalCandidate(c.clone()))
                .await;
        }
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        let mut state = self.handle.state.lock().await;
        state.calls.push(PeerCall::SetRemote(desc.clone()));
        state.remote = Some(desc);
        Ok(())
    }

    async fn has_remote_description(&self) -> bool {
        self.handle.state.lock().await.remote.is_some()
    }

    async fn add_remote_candidate(&self, candidate: Value) -> Result<()> {
        let mut state = self.handle.state.lock().await;
        if state.remote.is_none() {
            bail!("remote description not set");
        }
        if candidate.get("candidate").is_none() {
            bail!("malformed candidate: {candidate}");
        }
        state.calls.push(PeerCall::AddCandidate(candidate));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.handle.state.lock().await.calls.push(PeerCall::Close);
        Ok(())
    }
}

/// Hands out [`MockPeer`]s and keeps a handle to each of them.
#[derive(Clone)]
pub struct MockConnector {
    label: String,
    gathered: Vec<Value>,
    peers: Arc<Mutex<Vec<MockPeerHandle>>>,
}

impl MockConnector {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_owned(),
            gathered: Vec::new(),
            peers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Local candidates every peer reports right after its local description is set.
    pub fn gathering(mut self, candidates: Vec<Value>) -> Self {
        self.gathered = candidates;
        self
    }

    pub async fn peer_count(&self) -> usize {
        self.peers.lock().await.len()
    }

    /// The most recently connected peer.
    pub async fn last_peer(&self) -> MockPeerHandle {
        self.peers
            .lock()
            .await
            .last()
            .cloned()
            .expect("no peer connection was created")
    }
}

#[async_trait]
impl PeerConnector for MockConnector {
    async fn connect(
        &self,
        _config: &SessionConfig,
        events: mpsc::Sender<PeerEvent>,
    ) -> Result<Box<dyn PeerConnection>> {
        let handle = MockPeerHandle {
            state: Arc::new(Mutex::new(MockPeerState::default())),
            events,
        };
        self.peers.lock().await.push(handle.clone());

        Ok(Box::new(MockPeer {
            label: self.label.clone(),
            handle,
            gathered: self.gathered.clone(),
        }))
    }
}
