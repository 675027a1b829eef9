use crate::error::{SessionError, StoreError};
use crate::media::LocalMedia;
use crate::peer::{PeerConnection, PeerEvent};
use crate::session::call_handle::CallHandle;
use crate::session::coordinator::Coordinator;
use crate::session::session_event::{SessionCommand, SessionEvent};
use crate::session::session_state::{Role, SessionState, SessionStatus};
use std::collections::HashSet;
use tandem_core::{
    CandidateChange, CandidateDirection, CandidateId, CandidateRecord, ConnectionState, RoomId,
    RoomRecord,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// One call attempt. Owns its peer connection from construction to teardown.
pub(crate) struct CallSession {
    role: Role,
    deps: Coordinator,
    state: SessionState,
    room_id: Option<RoomId>,
    peer: Option<Box<dyn PeerConnection>>,
    status_tx: watch::Sender<SessionStatus>,
    inbox_tx: mpsc::Sender<SessionEvent>,
    inbox_rx: mpsc::Receiver<SessionEvent>,
    forwarders: Vec<JoinHandle<()>>,
    seen_candidates: HashSet<CandidateId>,
    /// Remote candidates that arrived before the remote description.
    pending_candidates: Vec<CandidateRecord>,
    torn_down: bool,
}

impl CallSession {
    pub(crate) fn new(role: Role, deps: Coordinator) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::channel(deps.config.inbox_capacity.max(1));
        let (status_tx, _) = watch::channel(SessionStatus::new(role));

        Self {
            role,
            deps,
            state: SessionState::Idle,
            room_id: None,
            peer: None,
            status_tx,
            inbox_tx,
            inbox_rx,
            forwarders: Vec::new(),
            seen_candidates: HashSet::new(),
            pending_candidates: Vec::new(),
            torn_down: false,
        }
    }

    /// Offer side: capture, offer, publish, then watch for the answer.
    pub(crate) async fn start_as_creator(&mut self) -> Result<RoomId, SessionError> {
        let media = self.capture().await?;
        self.connect_peer(&media).await?;

        let offer = self
            .peer()?
            .create_offer()
            .await
            .map_err(SessionError::Negotiation)?;
        self.peer()?
            .set_local_description(offer.clone())
            .await
            .map_err(SessionError::Negotiation)?;
        self.advance(&[SessionState::Capturing], SessionState::OfferCreated);

        let store = self.deps.store.clone();
        let room_id = store.create_room(RoomRecord::with_offer(offer)).await?;
        self.attach_room(room_id.clone());
        self.advance(&[SessionState::OfferCreated], SessionState::OfferPublished);

        let candidates = store
            .watch_candidates(&room_id, self.role.remote_direction())
            .await?;
        self.forward(candidates, SessionEvent::RemoteCandidate, "candidate");

        let room = store.watch_room(&room_id).await?;
        self.forward(room, SessionEvent::RoomUpdated, "room");

        self.advance(&[SessionState::OfferPublished], SessionState::AwaitingAnswer);
        Ok(room_id)
    }

    /// Answer side: read the offer once, answer it, then exchange candidates.
    pub(crate) async fn start_as_joiner(&mut self, room_id: RoomId) -> Result<RoomId, SessionError> {
        let media = self.capture().await?;

        let store = self.deps.store.clone();
        let offer = match store.get_room(&room_id).await? {
            Some(RoomRecord {
                answer: Some(_), ..
            }) => return Err(SessionError::RoomOccupied(room_id)),
            Some(RoomRecord {
                offer: Some(offer), ..
            }) => offer,
            _ => return Err(SessionError::RoomNotFound(room_id)),
        };

        self.connect_peer(&media).await?;
        self.peer()?
            .set_remote_description(offer)
            .await
            .map_err(SessionError::Negotiation)?;

        let answer = self
            .peer()?
            .create_answer()
            .await
            .map_err(SessionError::Negotiation)?;
        self.peer()?
            .set_local_description(answer.clone())
            .await
            .map_err(SessionError::Negotiation)?;
        self.advance(&[SessionState::Capturing], SessionState::AnswerCreated);

        store
            .merge_room(&room_id, RoomRecord::with_answer(answer))
            .await?;
        self.attach_room(room_id.clone());
        self.advance(&[SessionState::AnswerCreated], SessionState::AnswerPublished);

        let candidates = store
            .watch_candidates(&room_id, self.role.remote_direction())
            .await?;
        self.forward(candidates, SessionEvent::RemoteCandidate, "candidate");

        self.advance(
            &[SessionState::AnswerPublished],
            SessionState::NegotiatingCandidates,
        );
        Ok(room_id)
    }

    pub(crate) fn spawn(self, room_id: RoomId) -> CallHandle {
        let (command_tx, command_rx) = mpsc::channel(8);
        let handle = CallHandle::new(room_id, command_tx, self.status_tx.subscribe());
        tokio::spawn(self.run(command_rx));
        handle
    }

    /// Marks a failed setup and releases whatever it had acquired.
    pub(crate) async fn abort(&mut self, err: &SessionError) {
        self.fail(err).await;
    }

    async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        info!(
            "{:?} session event loop started for room {}",
            self.role,
            self.room_label()
        );

        let answer_timeout = match self.role {
            Role::Creator => self.deps.config.answer_timeout(),
            Role::Joiner => None,
        };
        let answer_deadline = answer_timeout.map(|t| Instant::now() + t);

        while !self.state.is_terminal() {
            let awaiting_answer =
                self.state == SessionState::AwaitingAnswer && answer_deadline.is_some();

            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(SessionCommand::HangUp { done }) => {
                        info!("Hang-up requested for room {}", self.room_label());
                        self.finish(SessionState::Disconnected).await;
                        let _ = done.send(());
                    }
                    None => {
                        info!("Every call handle was dropped. Hanging up.");
                        self.finish(SessionState::Disconnected).await;
                    }
                },

                evt = self.inbox_rx.recv() => {
                    let Some(event) = evt else {
                        warn!("Session inbox closed unexpectedly");
                        break;
                    };
                    if let Err(e) = self.handle_event(event).await {
                        self.fail(&e).await;
                    }
                }

                _ = sleep_until(answer_deadline), if awaiting_answer => {
                    let waited = answer_timeout.unwrap_or_default();
                    self.fail(&SessionError::AnswerTimeout(waited)).await;
                }
            }
        }

        // Later hang-ups are no-ops: acknowledge queued ones, refuse new ones.
        commands.close();
        while let Some(SessionCommand::HangUp { done }) = commands.recv().await {
            let _ = done.send(());
        }

        info!("Session event loop finished for room {}", self.room_label());
    }

    async fn handle_event(&mut self, event: SessionEvent) -> Result<(), SessionError> {
        match event {
            SessionEvent::RoomUpdated(Some(record)) => self.on_room_updated(record).await,

            SessionEvent::RoomUpdated(None) => {
                info!("Room {} was removed by the remote peer", self.room_label());
                self.finish(SessionState::Disconnected).await;
                Ok(())
            }

            SessionEvent::RemoteCandidate(CandidateChange::Added(record)) => {
                self.on_remote_candidate(record).await
            }

            SessionEvent::RemoteCandidate(CandidateChange::Removed(id)) => {
                debug!("Ignoring removal of remote candidate {}", id);
                Ok(())
            }

            SessionEvent::Peer(PeerEvent::LocalCandidate(payload)) => {
                self.publish_local_candidate(payload).await
            }

            SessionEvent::Peer(PeerEvent::RemoteTrack(track)) => {
                info!("Receiving remote {:?} track {}", track.kind, track.id);
                self.status_tx.send_modify(|s| s.remote_tracks.push(track));
                Ok(())
            }

            SessionEvent::Peer(PeerEvent::ConnectionState(state)) => {
                self.on_connection_state(state).await;
                Ok(())
            }

            SessionEvent::WatchClosed(what) => Err(SessionError::Store(StoreError::Transport(
                format!("{what} watch on room {} ended", self.room_label()),
            ))),
        }
    }

    async fn on_room_updated(&mut self, record: RoomRecord) -> Result<(), SessionError> {
        if self.state != SessionState::AwaitingAnswer {
            debug!("Room update ignored in state {:?}", self.state);
            return Ok(());
        }
        let Some(answer) = record.answer else {
            return Ok(());
        };

        let peer = self.peer()?;
        if peer.has_remote_description().await {
            return Ok(());
        }
        peer.set_remote_description(answer)
            .await
            .map_err(SessionError::Negotiation)?;

        self.advance(
            &[SessionState::AwaitingAnswer],
            SessionState::NegotiatingCandidates,
        );
        self.flush_pending_candidates().await
    }

    async fn on_remote_candidate(&mut self, record: CandidateRecord) -> Result<(), SessionError> {
        if !self.seen_candidates.insert(record.id.clone()) {
            debug!("Remote candidate {} already handled", record.id);
            return Ok(());
        }

        if !self.state.has_remote_description() {
            debug!("Buffering remote candidate {} until the answer", record.id);
            self.pending_candidates.push(record);
            return Ok(());
        }

        self.apply_candidate(record).await
    }

    async fn flush_pending_candidates(&mut self) -> Result<(), SessionError> {
        let pending = std::mem::take(&mut self.pending_candidates);
        if !pending.is_empty() {
            debug!("Applying {} buffered remote candidates", pending.len());
        }
        for record in pending {
            self.apply_candidate(record).await?;
        }
        Ok(())
    }

    async fn apply_candidate(&self, record: CandidateRecord) -> Result<(), SessionError> {
        debug!("Adding remote candidate {}", record.id);
        self.peer()?
            .add_remote_candidate(record.payload)
            .await
            .map_err(SessionError::Negotiation)
    }

    async fn publish_local_candidate(
        &mut self,
        payload: serde_json::Value,
    ) -> Result<(), SessionError> {
        let Some(room_id) = self.room_id.clone() else {
            warn!("Local candidate produced before a room exists, dropping it");
            return Ok(());
        };

        let direction = self.role.local_direction();
        let id = self
            .deps
            .store
            .add_candidate(&room_id, direction, payload)
            .await?;
        debug!("Published local candidate {} to {}", id, direction);
        Ok(())
    }

    async fn on_connection_state(&mut self, state: ConnectionState) {
        match state {
            ConnectionState::Connected => {
                if self.advance(
                    &[SessionState::NegotiatingCandidates],
                    SessionState::Connected,
                ) {
                    info!("Call in room {} connected", self.room_label());
                }
            }
            s if s.is_lost() => {
                info!("Connection {:?}, ending call", s);
                self.finish(SessionState::Disconnected).await;
            }
            s => debug!("Connection state {:?}", s),
        }
    }

    async fn capture(&mut self) -> Result<LocalMedia, SessionError> {
        self.advance(&[SessionState::Idle], SessionState::Capturing);
        let media = self.deps.media.acquire().await?;
        info!(
            "Captured {} local tracks on stream {}",
            media.tracks.len(),
            media.stream_id
        );
        Ok(media)
    }

    async fn connect_peer(&mut self, media: &LocalMedia) -> Result<(), SessionError> {
        let (events_tx, events_rx) = mpsc::channel(self.deps.config.inbox_capacity.max(1));
        let peer = self
            .deps
            .connector
            .connect(&self.deps.config, events_tx)
            .await
            .map_err(SessionError::Negotiation)?;
        self.peer = Some(peer);
        self.forward_peer_events(events_rx);

        for track in &media.tracks {
            self.peer()?
                .add_track(track)
                .await
                .map_err(SessionError::Negotiation)?;
        }
        Ok(())
    }

    /// Feeds a store watch into the inbox. Forwarders are aborted at
    /// teardown, so an ending watch always means the store dropped it.
    fn forward<T: Send + 'static>(
        &mut self,
        mut rx: mpsc::UnboundedReceiver<T>,
        wrap: fn(T) -> SessionEvent,
        what: &'static str,
    ) {
        let inbox = self.inbox_tx.clone();
        self.forwarders.push(tokio::spawn(async move {
            while let Some(item) = rx.recv().await {
                if inbox.send(wrap(item)).await.is_err() {
                    return;
                }
            }
            let _ = inbox.send(SessionEvent::WatchClosed(what)).await;
        }));
    }

    fn forward_peer_events(&mut self, mut rx: mpsc::Receiver<PeerEvent>) {
        let inbox = self.inbox_tx.clone();
        self.forwarders.push(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if inbox.send(SessionEvent::Peer(event)).await.is_err() {
                    break;
                }
            }
        }));
    }

    fn peer(&self) -> Result<&dyn PeerConnection, SessionError> {
        self.peer.as_deref().ok_or(SessionError::Closed)
    }

    fn attach_room(&mut self, room_id: RoomId) {
        self.status_tx
            .send_modify(|s| s.room_id = Some(room_id.clone()));
        self.room_id = Some(room_id);
    }

    fn room_label(&self) -> String {
        self.room_id
            .as_ref()
            .map_or_else(|| "<none>".to_owned(), RoomId::to_string)
    }

    /// Moves to `to` only from one of `from`.
    fn advance(&mut self, from: &[SessionState], to: SessionState) -> bool {
        if !from.contains(&self.state) {
            debug!("Transition {:?} -> {:?} refused", self.state, to);
            return false;
        }
        self.set_state(to);
        true
    }

    fn set_state(&mut self, to: SessionState) {
        info!("{:?} session: {:?} -> {:?}", self.role, self.state, to);
        self.state = to;
        self.status_tx.send_modify(|s| s.state = to);
    }

    async fn fail(&mut self, err: &SessionError) {
        error!("Call in room {} failed: {}", self.room_label(), err);
        let reason = err.to_string();
        self.status_tx.send_modify(|s| s.error = Some(reason));
        self.finish(SessionState::Failed).await;
    }

    async fn finish(&mut self, state: SessionState) {
        self.teardown().await;
        if !self.state.is_terminal() {
            self.set_state(state);
        }
    }

    /// Closes the peer connection and removes the room with both candidate
    /// collections. Runs at most once; store failures are only logged.
    async fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        for forwarder in self.forwarders.drain(..) {
            forwarder.abort();
        }

        if let Some(peer) = self.peer.take() {
            if let Err(e) = peer.close().await {
                warn!("Failed to close peer connection: {:?}", e);
            }
        }

        let Some(room_id) = self.room_id.clone() else {
            return;
        };
        let store = self.deps.store.clone();

        for direction in CandidateDirection::ALL {
            let records = match store.list_candidates(&room_id, direction).await {
                Ok(records) => records,
                Err(e) => {
                    warn!("Failed to list {} of room {}: {}", direction, room_id, e);
                    continue;
                }
            };
            for record in records {
                if let Err(e) = store.delete_candidate(&room_id, direction, &record.id).await {
                    warn!("Failed to delete candidate {}: {}", record.id, e);
                }
            }
        }

        match store.delete_room(&room_id).await {
            Ok(()) => info!("Room {} removed", room_id),
            Err(e) => warn!("Failed to delete room {}: {}", room_id, e),
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
