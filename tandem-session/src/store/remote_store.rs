use crate::error::StoreError;
use crate::store::signaling_store::{CandidateWatch, RoomWatch, SignalingStore};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tandem_core::{
    CandidateChange, CandidateDirection, CandidateId, CandidateRecord, RequestId, RoomId,
    RoomRecord, StoreMessage, StoreOp, StoreReply, StoreRequest, SubscriptionId,
};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

struct RemoteInner {
    outgoing: mpsc::UnboundedSender<Message>,
    pending: DashMap<RequestId, oneshot::Sender<StoreReply>>,
    room_watches: DashMap<SubscriptionId, mpsc::UnboundedSender<Option<RoomRecord>>>,
    candidate_watches: DashMap<SubscriptionId, mpsc::UnboundedSender<CandidateChange>>,
    closed: AtomicBool,
}

impl RemoteInner {
    /// Fire-and-forget request; its reply is ignored.
    fn send_op(&self, op: StoreOp) -> Result<(), StoreError> {
        if self.is_closed() {
            return Err(connection_closed());
        }
        let id = RequestId::new();
        let text = serde_json::to_string(&StoreRequest { id, op })?;
        self.outgoing
            .send(Message::Text(text))
            .map_err(|_| connection_closed())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn unwatch(&self, subscription: SubscriptionId) {
        debug!("Watch {} dropped, cancelling", subscription);
        let _ = self.send_op(StoreOp::Unwatch { subscription });
    }

    fn dispatch(&self, text: &str) {
        let msg: StoreMessage = match serde_json::from_str(text) {
            Ok(m) => m,
            Err(e) => {
                warn!("Invalid store message: {}", e);
                return;
            }
        };

        match msg {
            StoreMessage::Reply { id, reply } => match self.pending.remove(&id) {
                Some((_, tx)) => {
                    let _ = tx.send(reply);
                }
                None => debug!("Reply for untracked request {:?}", id),
            },

            StoreMessage::RoomChanged {
                subscription,
                record,
            } => {
                let closed = match self.room_watches.get(&subscription) {
                    Some(tx) => tx.send(record).is_err(),
                    None => false,
                };
                if closed {
                    self.room_watches.remove(&subscription);
                    self.unwatch(subscription);
                }
            }

            StoreMessage::CandidateChanged {
                subscription,
                change,
            } => {
                let closed = match self.candidate_watches.get(&subscription) {
                    Some(tx) => tx.send(change).is_err(),
                    None => false,
                };
                if closed {
                    self.candidate_watches.remove(&subscription);
                    self.unwatch(subscription);
                }
            }
        }
    }

    /// Fails every in-flight request and ends every watch.
    fn shut_down(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.pending.clear();
        self.room_watches.clear();
        self.candidate_watches.clear();
    }
}

/// [`SignalingStore`] backed by a `tandem-server` over WebSocket.
#[derive(Clone)]
pub struct RemoteStore {
    inner: Arc<RemoteInner>,
}

impl RemoteStore {
    /// Connects to a store endpoint such as `ws://127.0.0.1:7700/store`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let (socket, _) = connect_async(url)
            .await
            .map_err(|e| StoreError::Transport(format!("{url}: {e}")))?;
        info!("Connected to signaling store at {}", url);

        let (mut sink, mut stream) = socket.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

        let inner = Arc::new(RemoteInner {
            outgoing: tx,
            pending: DashMap::new(),
            room_watches: DashMap::new(),
            candidate_watches: DashMap::new(),
            closed: AtomicBool::new(false),
        });

        let weak: Weak<RemoteInner> = Arc::downgrade(&inner);
        let writer = weak.clone();
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if sink.send(msg).await.is_err() {
                    if let Some(inner) = writer.upgrade() {
                        warn!("Signaling store connection lost while writing");
                        inner.shut_down();
                    }
                    return;
                }
            }
            let _ = sink.send(Message::Close(None)).await;
        });

        tokio::spawn(async move {
            while let Some(Ok(msg)) = stream.next().await {
                let Some(inner) = weak.upgrade() else { break };
                match msg {
                    Message::Text(text) => inner.dispatch(&text),
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            if let Some(inner) = weak.upgrade() {
                warn!("Signaling store connection closed");
                inner.shut_down();
            }
        });

        Ok(Self { inner })
    }

    async fn request(&self, op: StoreOp) -> Result<StoreReply, StoreError> {
        let (tx, rx) = oneshot::channel();
        let id = RequestId::new();
        self.inner.pending.insert(id, tx);

        // Checked after inserting so a concurrent shut_down cannot strand the entry.
        if self.inner.is_closed() {
            self.inner.pending.remove(&id);
            return Err(connection_closed());
        }

        let text = match serde_json::to_string(&StoreRequest { id, op }) {
            Ok(text) => text,
            Err(e) => {
                self.inner.pending.remove(&id);
                return Err(e.into());
            }
        };
        if self.inner.outgoing.send(Message::Text(text)).is_err() {
            self.inner.pending.remove(&id);
            return Err(connection_closed());
        }

        let reply = rx
            .await
            .map_err(|_| StoreError::Transport("connection closed before reply".to_owned()))?;

        match reply {
            StoreReply::NotFound(room) => Err(StoreError::RoomNotFound(room)),
            StoreReply::Conflict(room) => Err(StoreError::Conflict(room)),
            StoreReply::Error(reason) => Err(StoreError::Rejected(reason)),
            other => Ok(other),
        }
    }
}

fn connection_closed() -> StoreError {
    StoreError::Transport("connection closed".to_owned())
}

fn unexpected(reply: StoreReply) -> StoreError {
    StoreError::Protocol(format!("{reply:?}"))
}

#[async_trait]
impl SignalingStore for RemoteStore {
    async fn create_room(&self, record: RoomRecord) -> Result<RoomId, StoreError> {
        match self.request(StoreOp::CreateRoom { record }).await? {
            StoreReply::Created(room) => Ok(room),
            other => Err(unexpected(other)),
        }
    }

    async fn get_room(&self, room: &RoomId) -> Result<Option<RoomRecord>, StoreError> {
        let op = StoreOp::GetRoom { room: room.clone() };
        match self.request(op).await? {
            StoreReply::Record(record) => Ok(record),
            other => Err(unexpected(other)),
        }
    }

    async fn merge_room(&self, room: &RoomId, record: RoomRecord) -> Result<(), StoreError> {
        let op = StoreOp::MergeRoom {
            room: room.clone(),
            record,
        };
        match self.request(op).await? {
            StoreReply::Done => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    async fn add_candidate(
        &self,
        room: &RoomId,
        direction: CandidateDirection,
        payload: serde_json::Value,
    ) -> Result<CandidateId, StoreError> {
        let op = StoreOp::AddCandidate {
            room: room.clone(),
            direction,
            payload,
        };
        match self.request(op).await? {
            StoreReply::Candidate(id) => Ok(id),
            other => Err(unexpected(other)),
        }
    }

    async fn list_candidates(
        &self,
        room: &RoomId,
        direction: CandidateDirection,
    ) -> Result<Vec<CandidateRecord>, StoreError> {
        let op = StoreOp::ListCandidates {
            room: room.clone(),
            direction,
        };
        match self.request(op).await? {
            StoreReply::Candidates(records) => Ok(records),
            other => Err(unexpected(other)),
        }
    }

    async fn delete_candidate(
        &self,
        room: &RoomId,
        direction: CandidateDirection,
        candidate: &CandidateId,
    ) -> Result<(), StoreError> {
        let op = StoreOp::DeleteCandidate {
            room: room.clone(),
            direction,
            candidate: candidate.clone(),
        };
        match self.request(op).await? {
            StoreReply::Done => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    async fn delete_room(&self, room: &RoomId) -> Result<(), StoreError> {
        let op = StoreOp::DeleteRoom { room: room.clone() };
        match self.request(op).await? {
            StoreReply::Done => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    async fn watch_room(&self, room: &RoomId) -> Result<RoomWatch, StoreError> {
        // Registered before the request goes out: the initial snapshot may
        // arrive right behind the reply.
        let subscription = SubscriptionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.room_watches.insert(subscription, tx);

        let op = StoreOp::WatchRoom {
            room: room.clone(),
            subscription,
        };
        match self.request(op).await {
            Ok(StoreReply::Done) => Ok(rx),
            Ok(other) => {
                self.inner.room_watches.remove(&subscription);
                Err(unexpected(other))
            }
            Err(e) => {
                self.inner.room_watches.remove(&subscription);
                Err(e)
            }
        }
    }

    async fn watch_candidates(
        &self,
        room: &RoomId,
        direction: CandidateDirection,
    ) -> Result<CandidateWatch, StoreError> {
        let subscription = SubscriptionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.candidate_watches.insert(subscription, tx);

        let op = StoreOp::WatchCandidates {
            room: room.clone(),
            direction,
            subscription,
        };
        match self.request(op).await {
            Ok(StoreReply::Done) => Ok(rx),
            Ok(other) => {
                self.inner.candidate_watches.remove(&subscription);
                Err(unexpected(other))
            }
            Err(e) => {
                self.inner.candidate_watches.remove(&subscription);
                Err(e)
            }
        }
    }
}
