use tandem_core::{CandidateDirection, ConnectionState, RoomRecord, SessionDescription};
use tandem_session::{MemoryStore, SessionState, SignalingStore};

use super::{init_tracing, mock_coordinator, within};
use crate::utils::{MockConnector, RecordingStore, StoreCall, candidate, wait_until};

fn count(calls: &[StoreCall], call: &StoreCall) -> usize {
    calls.iter().filter(|c| *c == call).count()
}

#[tokio::test]
async fn test_hang_up_removes_room_and_both_collections() {
    init_tracing();

    let inner = MemoryStore::new();
    let store = RecordingStore::new(inner.clone());
    let connector =
        MockConnector::new("x").gathering(vec![candidate(1), candidate(2), candidate(3)]);
    let call = within(mock_coordinator(store.clone(), &connector).create_call())
        .await
        .unwrap();
    let room = call.room_id().clone();

    for n in 10..12 {
        inner
            .add_candidate(&room, CandidateDirection::AnswererCandidates, candidate(n))
            .await
            .unwrap();
    }
    let (s, r) = (&inner, &room);
    assert!(
        wait_until(2000, || async move {
            s.list_candidates(r, CandidateDirection::OffererCandidates)
                .await
                .map(|c| c.len() == 3)
                .unwrap_or(false)
        })
        .await
    );

    within(call.hang_up()).await;

    assert_eq!(call.state(), SessionState::Disconnected);
    assert!(inner.get_room(&room).await.unwrap().is_none());
    for direction in CandidateDirection::ALL {
        assert!(inner.list_candidates(&room, direction).await.unwrap().is_empty());
    }
    assert_eq!(inner.room_count(), 0);

    let calls = store.calls().await;
    assert_eq!(
        count(
            &calls,
            &StoreCall::DeleteCandidate(CandidateDirection::OffererCandidates)
        ),
        3
    );
    assert_eq!(
        count(
            &calls,
            &StoreCall::DeleteCandidate(CandidateDirection::AnswererCandidates)
        ),
        2
    );
    assert_eq!(calls.last(), Some(&StoreCall::DeleteRoom));
    assert_eq!(connector.last_peer().await.close_count().await, 1);
}

#[tokio::test]
async fn test_second_hang_up_is_a_no_op() {
    init_tracing();

    let store = RecordingStore::new(MemoryStore::new());
    let connector = MockConnector::new("x");
    let call = within(mock_coordinator(store.clone(), &connector).create_call())
        .await
        .unwrap();

    within(call.hang_up()).await;
    let after_first = store.calls().await;

    within(call.hang_up()).await;
    within(call.clone().hang_up()).await;

    assert_eq!(store.calls().await, after_first);
    assert_eq!(count(&after_first, &StoreCall::DeleteRoom), 1);
    assert_eq!(connector.last_peer().await.close_count().await, 1);
}

#[tokio::test]
async fn test_lost_connection_tears_down() {
    init_tracing();

    let store = MemoryStore::new();
    let connector = MockConnector::new("x");
    let call = within(mock_coordinator(store.clone(), &connector).create_call())
        .await
        .unwrap();
    let room = call.room_id().clone();

    store
        .merge_room(&room, RoomRecord::with_answer(SessionDescription::answer("y-answer")))
        .await
        .unwrap();
    within(call.wait_for(SessionState::NegotiatingCandidates))
        .await
        .unwrap();

    let peer = connector.last_peer().await;
    peer.emit_state(ConnectionState::Connected).await;
    within(call.wait_for(SessionState::Connected)).await.unwrap();

    peer.emit_state(ConnectionState::Disconnected).await;
    let status = within(call.ended()).await;

    assert_eq!(status.state, SessionState::Disconnected);
    assert!(store.get_room(&room).await.unwrap().is_none());
    assert_eq!(peer.close_count().await, 1);
}

#[tokio::test]
async fn test_connected_is_ignored_before_the_answer() {
    init_tracing();

    let store = MemoryStore::new();
    let connector = MockConnector::new("x");
    let call = within(mock_coordinator(store.clone(), &connector).create_call())
        .await
        .unwrap();

    connector
        .last_peer()
        .await
        .emit_state(ConnectionState::Connected)
        .await;
    super::settle().await;

    assert_eq!(call.state(), SessionState::AwaitingAnswer);
    call.hang_up().await;
}

#[tokio::test]
async fn test_dropping_every_handle_hangs_up() {
    init_tracing();

    let store = MemoryStore::new();
    let connector = MockConnector::new("x");
    let call = within(mock_coordinator(store.clone(), &connector).create_call())
        .await
        .unwrap();
    let room = call.room_id().clone();
    let status = call.subscribe();
    drop(call);

    let (s, r) = (&store, &room);
    assert!(
        wait_until(2000, || async move {
            s.get_room(r).await.map(|rec| rec.is_none()).unwrap_or(false)
        })
        .await
    );
    let p = &status;
    assert!(wait_until(2000, || async move { p.borrow().state.is_terminal() }).await);
    assert_eq!(status.borrow().state, SessionState::Disconnected);
}
