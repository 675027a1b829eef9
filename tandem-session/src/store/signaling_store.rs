use crate::error::StoreError;
use async_trait::async_trait;
use tandem_core::{
    CandidateChange, CandidateDirection, CandidateId, CandidateRecord, RoomId, RoomRecord,
};
use tokio::sync::mpsc;

/// Snapshots of one room record: the current value first, then one per change.
/// `None` means the record does not exist (or was deleted).
pub type RoomWatch = mpsc::UnboundedReceiver<Option<RoomRecord>>;

/// Changes of one candidate collection: every existing record as `Added`
/// first, in insertion order, then live changes.
pub type CandidateWatch = mpsc::UnboundedReceiver<CandidateChange>;

/// The shared rendezvous store both peers can reach.
///
/// Dropping a watch receiver ends that subscription.
#[async_trait]
pub trait SignalingStore: Send + Sync {
    /// Creates a room record under a store-generated identifier.
    async fn create_room(&self, record: RoomRecord) -> Result<RoomId, StoreError>;

    async fn get_room(&self, room: &RoomId) -> Result<Option<RoomRecord>, StoreError>;

    /// Sets the fields present in `record`. Fails if the room does not exist.
    async fn merge_room(&self, room: &RoomId, record: RoomRecord) -> Result<(), StoreError>;

    async fn add_candidate(
        &self,
        room: &RoomId,
        direction: CandidateDirection,
        payload: serde_json::Value,
    ) -> Result<CandidateId, StoreError>;

    async fn list_candidates(
        &self,
        room: &RoomId,
        direction: CandidateDirection,
    ) -> Result<Vec<CandidateRecord>, StoreError>;

    async fn delete_candidate(
        &self,
        room: &RoomId,
        direction: CandidateDirection,
        candidate: &CandidateId,
    ) -> Result<(), StoreError>;

    /// Deletes the room record only. Candidate collections are removed separately.
    async fn delete_room(&self, room: &RoomId) -> Result<(), StoreError>;

    async fn watch_room(&self, room: &RoomId) -> Result<RoomWatch, StoreError>;

    async fn watch_candidates(
        &self,
        room: &RoomId,
        direction: CandidateDirection,
    ) -> Result<CandidateWatch, StoreError>;
}
