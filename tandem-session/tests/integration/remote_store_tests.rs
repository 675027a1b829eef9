use std::time::Duration;

use tandem_core::{CandidateDirection, RoomId};
use tandem_session::{RemoteStore, SignalingStore, StoreError};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;

use super::init_tracing;

/// A store endpoint that accepts one socket and closes it right away.
async fn closing_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut socket = accept_async(stream).await.unwrap();
        let _ = socket.close(None).await;
    });

    format!("ws://{addr}/store")
}

#[tokio::test]
async fn test_requests_fail_once_the_server_closes() {
    init_tracing();

    let store = RemoteStore::connect(&closing_server().await).await.unwrap();
    let room = RoomId::from("gone");

    let first = tokio::time::timeout(Duration::from_secs(3), store.get_room(&room))
        .await
        .expect("first request after close never returned");
    assert!(matches!(first, Err(StoreError::Transport(_))));

    let second = tokio::time::timeout(
        Duration::from_secs(3),
        store.list_candidates(&room, CandidateDirection::OffererCandidates),
    )
    .await
    .expect("second request after close never returned");
    assert!(matches!(second, Err(StoreError::Transport(_))));
}

#[tokio::test]
async fn test_watches_end_when_the_server_closes() {
    init_tracing();

    let store = RemoteStore::connect(&closing_server().await).await.unwrap();

    let watch = tokio::time::timeout(
        Duration::from_secs(3),
        store.watch_room(&RoomId::from("gone")),
    )
    .await
    .expect("watch request never returned");
    assert!(matches!(watch, Err(StoreError::Transport(_))));
}
