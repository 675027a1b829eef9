use crate::error::SessionError;
use crate::session::session_event::SessionCommand;
use crate::session::session_state::{SessionState, SessionStatus};
use tandem_core::RoomId;
use tokio::sync::{mpsc, oneshot, watch};

/// Control surface of a running call.
///
/// Clones share the call. When the last handle is dropped the call hangs up.
#[derive(Clone)]
pub struct CallHandle {
    room_id: RoomId,
    commands: mpsc::Sender<SessionCommand>,
    status: watch::Receiver<SessionStatus>,
}

impl CallHandle {
    pub(crate) fn new(
        room_id: RoomId,
        commands: mpsc::Sender<SessionCommand>,
        status: watch::Receiver<SessionStatus>,
    ) -> Self {
        Self {
            room_id,
            commands,
            status,
        }
    }

    /// The join code to share with the other participant.
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> SessionState {
        self.status.borrow().state
    }

    /// A receiver that wakes on every status change.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    /// Waits until the call reaches `state`. Errors if it ends in another state first.
    pub async fn wait_for(&self, state: SessionState) -> Result<(), SessionError> {
        let mut rx = self.status.clone();
        let reached = rx
            .wait_for(|s| s.state == state || s.state.is_terminal())
            .await
            .map_err(|_| SessionError::Closed)?
            .state;

        if reached == state {
            Ok(())
        } else {
            Err(SessionError::Closed)
        }
    }

    /// Waits for the call to end and returns its final status.
    pub async fn ended(&self) -> SessionStatus {
        let mut rx = self.status.clone();
        let _ = rx.wait_for(|s| s.state.is_terminal()).await;
        rx.borrow().clone()
    }

    /// Ends the call and removes its room. Returns once teardown has run.
    /// Safe to call any number of times.
    pub async fn hang_up(&self) {
        let (done, ack) = oneshot::channel();
        if self
            .commands
            .send(SessionCommand::HangUp { done })
            .await
            .is_err()
        {
            return;
        }
        let _ = ack.await;
    }
}
