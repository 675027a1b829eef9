use crate::signaling::subscriptions::Subscriptions;
use std::sync::Arc;
use tandem_core::{StoreMessage, StoreOp, StoreReply};
use tandem_session::{MemoryStore, SignalingStore, StoreError};
use tracing::debug;

/// Executes store requests on behalf of connected sockets.
#[derive(Clone)]
pub struct StoreService {
    store: Arc<dyn SignalingStore>,
}

impl StoreService {
    pub fn new(store: Arc<dyn SignalingStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub(crate) async fn execute(&self, op: StoreOp, subs: &mut Subscriptions) -> StoreReply {
        let store = &self.store;

        let result = match op {
            StoreOp::CreateRoom { record } => store.create_room(record).await.map(StoreReply::Created),

            StoreOp::GetRoom { room } => store.get_room(&room).await.map(StoreReply::Record),

            StoreOp::MergeRoom { room, record } => {
                store.merge_room(&room, record).await.map(|_| StoreReply::Done)
            }

            StoreOp::AddCandidate {
                room,
                direction,
                payload,
            } => store
                .add_candidate(&room, direction, payload)
                .await
                .map(StoreReply::Candidate),

            StoreOp::ListCandidates { room, direction } => store
                .list_candidates(&room, direction)
                .await
                .map(StoreReply::Candidates),

            StoreOp::DeleteCandidate {
                room,
                direction,
                candidate,
            } => store
                .delete_candidate(&room, direction, &candidate)
                .await
                .map(|_| StoreReply::Done),

            StoreOp::DeleteRoom { room } => store.delete_room(&room).await.map(|_| StoreReply::Done),

            StoreOp::WatchRoom { room, subscription } => {
                store.watch_room(&room).await.map(|rx| {
                    subs.forward(subscription, rx, |subscription, record| {
                        StoreMessage::RoomChanged {
                            subscription,
                            record,
                        }
                    });
                    debug!("Watching room {} as {}", room, subscription);
                    StoreReply::Done
                })
            }

            StoreOp::WatchCandidates {
                room,
                direction,
                subscription,
            } => store.watch_candidates(&room, direction).await.map(|rx| {
                subs.forward(subscription, rx, |subscription, change| {
                    StoreMessage::CandidateChanged {
                        subscription,
                        change,
                    }
                });
                debug!("Watching {} of room {} as {}", direction, room, subscription);
                StoreReply::Done
            }),

            StoreOp::Unwatch { subscription } => {
                subs.cancel(subscription);
                Ok(StoreReply::Done)
            }
        };

        into_reply(result)
    }
}

fn into_reply(result: Result<StoreReply, StoreError>) -> StoreReply {
    match result {
        Ok(reply) => reply,
        Err(StoreError::RoomNotFound(room)) => StoreReply::NotFound(room),
        Err(StoreError::Conflict(room)) => StoreReply::Conflict(room),
        Err(e) => StoreReply::Error(e.to_string()),
    }
}
