use crate::signaling::StoreService;
use crate::signaling::subscriptions::Subscriptions;
use axum::extract::State;
use axum::extract::WebSocketUpgrade;
use axum::extract::ws::{Message, WebSocket};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tandem_core::{RequestId, StoreMessage, StoreReply, StoreRequest};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

pub async fn store_ws_handler(
    ws: WebSocketUpgrade,
    State(service): State<StoreService>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, service))
}

async fn handle_socket(socket: WebSocket, service: StoreService) {
    let client = Uuid::new_v4().simple().to_string();
    info!("Store client {} connected", client);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let client = client.clone();

        async move {
            // Requests run one at a time so each client sees its writes in order.
            let mut subs = Subscriptions::new(tx);

            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => {
                        let (id, reply) = match serde_json::from_str::<StoreRequest>(&text) {
                            Ok(StoreRequest { id, op }) => (id, service.execute(op, &mut subs).await),
                            Err(e) => {
                                warn!("Invalid StoreRequest from {}: {:?}", client, e);
                                // Without an id nobody is waiting on a reply.
                                let Some(id) = request_id(&text) else { continue };
                                (id, StoreReply::Error(format!("invalid request: {e}")))
                            }
                        };

                        let json = match serde_json::to_string(&StoreMessage::Reply { id, reply }) {
                            Ok(json) => json,
                            Err(e) => {
                                error!("Failed to serialize store reply: {}", e);
                                continue;
                            }
                        };
                        if subs.outgoing().send(Message::Text(json.into())).is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    info!("Store client {} disconnected", client);
}

/// The `id` of a request whose operation could not be parsed.
fn request_id(text: &str) -> Option<RequestId> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    serde_json::from_value(value.get("id")?.clone()).ok()
}
