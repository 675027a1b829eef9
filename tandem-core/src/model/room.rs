use crate::model::description::SessionDescription;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Join code of a call. Generated by the store when the room record is created.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.trim().to_owned())
    }
}

impl From<String> for RoomId {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shared document of one call: `{ offer?, answer? }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer: Option<SessionDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<SessionDescription>,
}

impl RoomRecord {
    pub fn with_offer(offer: SessionDescription) -> Self {
        Self {
            offer: Some(offer),
            answer: None,
        }
    }

    pub fn with_answer(answer: SessionDescription) -> Self {
        Self {
            offer: None,
            answer: Some(answer),
        }
    }

    /// Each description is written once: true if `update` sets a field
    /// that already holds a value.
    pub fn conflicts_with(&self, update: &RoomRecord) -> bool {
        (self.offer.is_some() && update.offer.is_some())
            || (self.answer.is_some() && update.answer.is_some())
    }

    /// Copies the fields present in `update`, leaving the others untouched.
    pub fn merge(&mut self, update: RoomRecord) {
        if let Some(offer) = update.offer {
            self.offer = Some(offer);
        }
        if let Some(answer) = update.answer {
            self.answer = Some(answer);
        }
    }
}
