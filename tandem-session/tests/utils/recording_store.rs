use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tandem_core::{CandidateDirection, CandidateId, CandidateRecord, RoomId, RoomRecord};
use tandem_session::{CandidateWatch, MemoryStore, RoomWatch, SignalingStore, StoreError};
use tokio::sync::{Mutex, mpsc};

/// A write made through a [`RecordingStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    CreateRoom(RoomRecord),
    MergeRoom(RoomRecord),
    AddCandidate(CandidateDirection),
    DeleteCandidate(CandidateDirection),
    DeleteRoom,
}

/// Wraps a [`MemoryStore`], logging writes in order. Can deliver every
/// notification twice, refuse candidate writes and hand out room watches
/// that end immediately.
#[derive(Clone)]
pub struct RecordingStore {
    inner: MemoryStore,
    calls: Arc<Mutex<Vec<StoreCall>>>,
    duplicate_notifications: bool,
    reject_candidates: Arc<AtomicBool>,
    end_room_watches: Arc<AtomicBool>,
}

impl RecordingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            calls: Arc::new(Mutex::new(Vec::new())),
            duplicate_notifications: false,
            reject_candidates: Arc::new(AtomicBool::new(false)),
            end_room_watches: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn duplicating(inner: MemoryStore) -> Self {
        Self {
            duplicate_notifications: true,
            ..Self::new(inner)
        }
    }

    pub fn reject_candidate_writes(&self) {
        self.reject_candidates.store(true, Ordering::SeqCst);
    }

    /// Room watches succeed but their sender is already gone, like a
    /// subscription dropped by the store.
    pub fn end_room_watches(&self) {
        self.end_room_watches.store(true, Ordering::SeqCst);
    }

    pub async fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().await.clone()
    }

    async fn record(&self, call: StoreCall) {
        self.calls.lock().await.push(call);
    }

    fn relay<T: Clone + Send + 'static>(
        &self,
        mut rx: mpsc::UnboundedReceiver<T>,
    ) -> mpsc::UnboundedReceiver<T> {
        if !self.duplicate_notifications {
            return rx;
        }
        let (tx, out) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(item) = rx.recv().await {
                if tx.send(item.clone()).is_err() || tx.send(item).is_err() {
                    break;
                }
            }
        });
        out
    }
}

#[async_trait]
impl SignalingStore for RecordingStore {
    async fn create_room(&self, record: RoomRecord) -> Result<RoomId, StoreError> {
        self.record(StoreCall::CreateRoom(record.clone())).await;
        self.inner.create_room(record).await
    }

    async fn get_room(&self, room: &RoomId) -> Result<Option<RoomRecord>, StoreError> {
        self.inner.get_room(room).await
    }

    async fn merge_room(&self, room: &RoomId, record: RoomRecord) -> Result<(), StoreError> {
        self.record(StoreCall::MergeRoom(record.clone())).await;
        self.inner.merge_room(room, record).await
    }

    async fn add_candidate(
        &self,
        room: &RoomId,
        direction: CandidateDirection,
        payload: serde_json::Value,
    ) -> Result<CandidateId, StoreError> {
        if self.reject_candidates.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("write refused".to_owned()));
        }
        self.record(StoreCall::AddCandidate(direction)).await;
        self.inner.add_candidate(room, direction, payload).await
    }

    async fn list_candidates(
        &self,
        room: &RoomId,
        direction: CandidateDirection,
    ) -> Result<Vec<CandidateRecord>, StoreError> {
        self.inner.list_candidates(room, direction).await
    }

    async fn delete_candidate(
        &self,
        room: &RoomId,
        direction: CandidateDirection,
        candidate: &CandidateId,
    ) -> Result<(), StoreError> {
        self.record(StoreCall::DeleteCandidate(direction)).await;
        self.inner.delete_candidate(room, direction, candidate).await
    }

    async fn delete_room(&self, room: &RoomId) -> Result<(), StoreError> {
        self.record(StoreCall::DeleteRoom).await;
        self.inner.delete_room(room).await
    }

    async fn watch_room(&self, room: &RoomId) -> Result<RoomWatch, StoreError> {
        if self.end_room_watches.load(Ordering::SeqCst) {
            let (_, rx) = mpsc::unbounded_channel();
            return Ok(rx);
        }
        let rx = self.inner.watch_room(room).await?;
        Ok(self.relay(rx))
    }

    async fn watch_candidates(
        &self,
        room: &RoomId,
        direction: CandidateDirection,
    ) -> Result<CandidateWatch, StoreError> {
        let rx = self.inner.watch_candidates(room, direction).await?;
        Ok(self.relay(rx))
    }
}
