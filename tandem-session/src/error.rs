use std::time::Duration;
use tandem_core::RoomId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("room {0} does not exist")]
    RoomNotFound(RoomId),

    #[error("room {0} already holds that description")]
    Conflict(RoomId),

    #[error("store connection failed: {0}")]
    Transport(String),

    #[error("unexpected store response: {0}")]
    Protocol(String),

    #[error("store rejected the request: {0}")]
    Rejected(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("local media unavailable: {0}")]
    MediaUnavailable(String),

    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    #[error("room {0} already has two participants")]
    RoomOccupied(RoomId),

    #[error("signaling store failed: {0}")]
    Store(#[source] StoreError),

    #[error("negotiation failed: {0:#}")]
    Negotiation(#[source] anyhow::Error),

    #[error("no answer received within {0:?}")]
    AnswerTimeout(Duration),

    #[error("call session is closed")]
    Closed,
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RoomNotFound(room) => SessionError::RoomNotFound(room),
            StoreError::Conflict(room) => SessionError::RoomOccupied(room),
            other => SessionError::Store(other),
        }
    }
}
