use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

/// A captured local track, attached to the peer connection before negotiation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalTrack {
    pub id: String,
    pub stream_id: String,
    pub kind: TrackKind,
}

/// A track received from the remote peer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteTrack {
    pub id: String,
    pub stream_id: String,
    pub kind: TrackKind,
}
