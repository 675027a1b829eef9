use tandem_core::{CandidateDirection, RemoteTrack, RoomId};

/// Progress of one call. `Disconnected` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Capturing,
    OfferCreated,
    OfferPublished,
    AwaitingAnswer,
    AnswerCreated,
    AnswerPublished,
    NegotiatingCandidates,
    Connected,
    Disconnected,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Disconnected | SessionState::Failed)
    }

    /// The remote description is in place, so remote candidates can be applied.
    pub(crate) fn has_remote_description(&self) -> bool {
        matches!(
            self,
            SessionState::NegotiatingCandidates | SessionState::Connected
        )
    }
}

/// Which side of the handshake this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Creator,
    Joiner,
}

impl Role {
    /// Collection this side appends its own candidates to.
    pub fn local_direction(&self) -> CandidateDirection {
        match self {
            Role::Creator => CandidateDirection::OffererCandidates,
            Role::Joiner => CandidateDirection::AnswererCandidates,
        }
    }

    pub fn remote_direction(&self) -> CandidateDirection {
        self.local_direction().opposite()
    }
}

/// What the UI sees of a call.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub role: Role,
    pub state: SessionState,
    pub room_id: Option<RoomId>,
    pub remote_tracks: Vec<RemoteTrack>,
    /// Why the call failed, once it has.
    pub error: Option<String>,
}

impl SessionStatus {
    pub(crate) fn new(role: Role) -> Self {
        Self {
            role,
            state: SessionState::Idle,
            room_id: None,
            remote_tracks: Vec::new(),
            error: None,
        }
    }
}
