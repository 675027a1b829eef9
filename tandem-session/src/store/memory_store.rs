use crate::error::StoreError;
use crate::store::signaling_store::{CandidateWatch, RoomWatch, SignalingStore};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tandem_core::{
    CandidateChange, CandidateDirection, CandidateId, CandidateRecord, RoomId, RoomRecord,
};
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Default)]
struct Collection {
    records: Vec<CandidateRecord>,
    watchers: Vec<mpsc::UnboundedSender<CandidateChange>>,
}

impl Collection {
    fn notify(&mut self, change: CandidateChange) {
        self.watchers.retain(|w| w.send(change.clone()).is_ok());
    }
}

#[derive(Default)]
struct RoomEntry {
    record: Option<RoomRecord>,
    offerer: Collection,
    answerer: Collection,
    watchers: Vec<mpsc::UnboundedSender<Option<RoomRecord>>>,
}

impl RoomEntry {
    fn collection(&self, direction: CandidateDirection) -> &Collection {
        match direction {
            CandidateDirection::OffererCandidates => &self.offerer,
            CandidateDirection::AnswererCandidates => &self.answerer,
        }
    }

    fn collection_mut(&mut self, direction: CandidateDirection) -> &mut Collection {
        match direction {
            CandidateDirection::OffererCandidates => &mut self.offerer,
            CandidateDirection::AnswererCandidates => &mut self.answerer,
        }
    }

    fn notify(&mut self) {
        let snapshot = self.record.clone();
        self.watchers.retain(|w| w.send(snapshot.clone()).is_ok());
    }

    /// Nothing stored and nobody listening.
    fn is_vacant(&self) -> bool {
        self.record.is_none()
            && self.offerer.records.is_empty()
            && self.answerer.records.is_empty()
            && self.watchers.iter().all(|w| w.is_closed())
            && self.offerer.watchers.iter().all(|w| w.is_closed())
            && self.answerer.watchers.iter().all(|w| w.is_closed())
    }
}

/// In-process store with the same watch semantics as the networked one.
///
/// Cloning shares the underlying rooms.
#[derive(Clone, Default)]
pub struct MemoryStore {
    rooms: Arc<DashMap<RoomId, RoomEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rooms that currently have a record.
    pub fn room_count(&self) -> usize {
        self.rooms
            .iter()
            .filter(|entry| entry.value().record.is_some())
            .count()
    }

    /// Drops every entry left behind by watches on rooms that were never
    /// written, once their receivers are gone.
    fn sweep(&self) {
        let before = self.rooms.len();
        self.rooms.retain(|_, entry| !entry.is_vacant());
        let swept = before.saturating_sub(self.rooms.len());
        if swept > 0 {
            debug!("Swept {} abandoned room entries", swept);
        }
    }

    fn prune(&self, room: &RoomId) {
        if self.rooms.remove_if(room, |_, entry| entry.is_vacant()).is_some() {
            debug!("Dropped empty room entry {}", room);
        }
    }
}

#[async_trait]
impl SignalingStore for MemoryStore {
    async fn create_room(&self, record: RoomRecord) -> Result<RoomId, StoreError> {
        let room = RoomId::generate();
        let mut entry = self.rooms.entry(room.clone()).or_default();
        entry.record = Some(record);
        entry.notify();
        Ok(room)
    }

    async fn get_room(&self, room: &RoomId) -> Result<Option<RoomRecord>, StoreError> {
        Ok(self
            .rooms
            .get(room)
            .and_then(|entry| entry.record.clone()))
    }

    async fn merge_room(&self, room: &RoomId, update: RoomRecord) -> Result<(), StoreError> {
        let Some(mut entry) = self.rooms.get_mut(room) else {
            return Err(StoreError::RoomNotFound(room.clone()));
        };
        let Some(record) = entry.record.as_mut() else {
            return Err(StoreError::RoomNotFound(room.clone()));
        };
        if record.conflicts_with(&update) {
            return Err(StoreError::Conflict(room.clone()));
        }
        record.merge(update);
        entry.notify();
        Ok(())
    }

    async fn add_candidate(
        &self,
        room: &RoomId,
        direction: CandidateDirection,
        payload: serde_json::Value,
    ) -> Result<CandidateId, StoreError> {
        let record = CandidateRecord {
            id: CandidateId::generate(),
            payload,
        };
        let id = record.id.clone();

        let mut entry = self.rooms.entry(room.clone()).or_default();
        let collection = entry.collection_mut(direction);
        collection.records.push(record.clone());
        collection.notify(CandidateChange::Added(record));
        Ok(id)
    }

    async fn list_candidates(
        &self,
        room: &RoomId,
        direction: CandidateDirection,
    ) -> Result<Vec<CandidateRecord>, StoreError> {
        Ok(self
            .rooms
            .get(room)
            .map(|entry| entry.collection(direction).records.clone())
            .unwrap_or_default())
    }

    async fn delete_candidate(
        &self,
        room: &RoomId,
        direction: CandidateDirection,
        candidate: &CandidateId,
    ) -> Result<(), StoreError> {
        if let Some(mut entry) = self.rooms.get_mut(room) {
            let collection = entry.collection_mut(direction);
            if let Some(pos) = collection.records.iter().position(|r| &r.id == candidate) {
                collection.records.remove(pos);
                collection.notify(CandidateChange::Removed(candidate.clone()));
            }
        }
        self.prune(room);
        Ok(())
    }

    async fn delete_room(&self, room: &RoomId) -> Result<(), StoreError> {
        if let Some(mut entry) = self.rooms.get_mut(room) {
            if entry.record.take().is_some() {
                entry.notify();
            }
        }
        self.prune(room);
        Ok(())
    }

    async fn watch_room(&self, room: &RoomId) -> Result<RoomWatch, StoreError> {
        self.sweep();
        let (tx, rx) = mpsc::unbounded_channel();
        let mut entry = self.rooms.entry(room.clone()).or_default();
        let _ = tx.send(entry.record.clone());
        entry.watchers.push(tx);
        Ok(rx)
    }

    async fn watch_candidates(
        &self,
        room: &RoomId,
        direction: CandidateDirection,
    ) -> Result<CandidateWatch, StoreError> {
        self.sweep();
        let (tx, rx) = mpsc::unbounded_channel();
        let mut entry = self.rooms.entry(room.clone()).or_default();
        let collection = entry.collection_mut(direction);
        for record in &collection.records {
            let _ = tx.send(CandidateChange::Added(record.clone()));
        }
        collection.watchers.push(tx);
        Ok(rx)
    }
}
