use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq)]
#[serde(transparent)]
pub struct CandidateId(pub String);

impl CandidateId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which of the two per-room candidate collections a record lives in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Hash, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum CandidateDirection {
    /// Written by the creating peer, read by the joining peer.
    OffererCandidates,
    /// Written by the joining peer, read by the creating peer.
    AnswererCandidates,
}

impl CandidateDirection {
    pub const ALL: [CandidateDirection; 2] = [
        CandidateDirection::OffererCandidates,
        CandidateDirection::AnswererCandidates,
    ];

    pub fn collection_name(&self) -> &'static str {
        match self {
            CandidateDirection::OffererCandidates => "offerCandidates",
            CandidateDirection::AnswererCandidates => "answerCandidates",
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            CandidateDirection::OffererCandidates => CandidateDirection::AnswererCandidates,
            CandidateDirection::AnswererCandidates => CandidateDirection::OffererCandidates,
        }
    }
}

impl fmt::Display for CandidateDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection_name())
    }
}

/// One connectivity candidate, stored verbatim as produced by the peer connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateRecord {
    pub id: CandidateId,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "doc", rename_all = "lowercase")]
pub enum CandidateChange {
    Added(CandidateRecord),
    Removed(CandidateId),
}
