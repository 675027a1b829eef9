use crate::model::candidate::{CandidateChange, CandidateDirection, CandidateId, CandidateRecord};
use crate::model::request::{RequestId, SubscriptionId};
use crate::model::room::{RoomId, RoomRecord};
use serde::{Deserialize, Serialize};

/// A store operation sent by a client to the rendezvous server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreRequest {
    pub id: RequestId,
    pub op: StoreOp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", content = "d")]
pub enum StoreOp {
    CreateRoom {
        record: RoomRecord,
    },
    GetRoom {
        room: RoomId,
    },
    MergeRoom {
        room: RoomId,
        record: RoomRecord,
    },
    AddCandidate {
        room: RoomId,
        direction: CandidateDirection,
        payload: serde_json::Value,
    },
    ListCandidates {
        room: RoomId,
        direction: CandidateDirection,
    },
    DeleteCandidate {
        room: RoomId,
        direction: CandidateDirection,
        candidate: CandidateId,
    },
    DeleteRoom {
        room: RoomId,
    },
    /// The subscription id is chosen by the client so pushes can be routed
    /// before the reply arrives.
    WatchRoom {
        room: RoomId,
        subscription: SubscriptionId,
    },
    WatchCandidates {
        room: RoomId,
        direction: CandidateDirection,
        subscription: SubscriptionId,
    },
    Unwatch {
        subscription: SubscriptionId,
    },
}

/// Outcome of one [`StoreOp`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "d")]
pub enum StoreReply {
    Created(RoomId),
    Record(Option<RoomRecord>),
    Candidate(CandidateId),
    Candidates(Vec<CandidateRecord>),
    Done,
    NotFound(RoomId),
    /// The merge would overwrite a field that is already set.
    Conflict(RoomId),
    Error(String),
}

/// Everything the server sends down the socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", content = "d")]
pub enum StoreMessage {
    Reply {
        id: RequestId,
        reply: StoreReply,
    },
    RoomChanged {
        subscription: SubscriptionId,
        record: Option<RoomRecord>,
    },
    CandidateChanged {
        subscription: SubscriptionId,
        change: CandidateChange,
    },
}
