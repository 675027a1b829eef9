use crate::peer::PeerEvent;
use tandem_core::{CandidateChange, RoomRecord};
use tokio::sync::oneshot;

/// Everything that can move a running call forward, in arrival order.
#[derive(Debug)]
pub(crate) enum SessionEvent {
    /// Snapshot of the room record; `None` once it has been deleted.
    RoomUpdated(Option<RoomRecord>),
    /// Change in the remote peer's candidate collection.
    RemoteCandidate(CandidateChange),
    Peer(PeerEvent),
    /// A store subscription ended while the call still depended on it.
    WatchClosed(&'static str),
}

/// Requests from a [`CallHandle`](crate::CallHandle).
#[derive(Debug)]
pub(crate) enum SessionCommand {
    HangUp { done: oneshot::Sender<()> },
}
