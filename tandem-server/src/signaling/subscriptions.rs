use axum::extract::ws::Message;
use std::collections::HashMap;
use tandem_core::{StoreMessage, SubscriptionId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Watches opened by one socket. Dropping it cancels all of them.
pub(crate) struct Subscriptions {
    outgoing: mpsc::UnboundedSender<Message>,
    tasks: HashMap<SubscriptionId, JoinHandle<()>>,
}

impl Subscriptions {
    pub(crate) fn new(outgoing: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            outgoing,
            tasks: HashMap::new(),
        }
    }

    pub(crate) fn outgoing(&self) -> &mpsc::UnboundedSender<Message> {
        &self.outgoing
    }

    /// Pushes every item of `rx` to the socket, tagged with `subscription`.
    pub(crate) fn forward<T: Send + 'static>(
        &mut self,
        subscription: SubscriptionId,
        mut rx: mpsc::UnboundedReceiver<T>,
        wrap: fn(SubscriptionId, T) -> StoreMessage,
    ) {
        let outgoing = self.outgoing.clone();
        let task = tokio::spawn(async move {
            while let Some(item) = rx.recv().await {
                let json = match serde_json::to_string(&wrap(subscription, item)) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize store notification: {}", e);
                        continue;
                    }
                };
                if outgoing.send(Message::Text(json.into())).is_err() {
                    break;
                }
            }
        });

        if let Some(previous) = self.tasks.insert(subscription, task) {
            debug!("Subscription {} reused, replacing it", subscription);
            previous.abort();
        }
    }

    pub(crate) fn cancel(&mut self, subscription: SubscriptionId) {
        if let Some(task) = self.tasks.remove(&subscription) {
            task.abort();
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}
