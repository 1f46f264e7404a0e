//! UI event bus
//!
//! Pushes tree-update notifications to the portal UI so it re-renders without
//! polling. Lossy by design: the store snapshot is the source of truth, a
//! lagging subscriber just misses intermediate repaints.

use log::trace;
use serde::Serialize;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiEvent {
    pub event_name: String,
    pub payload: serde_json::Value,
}

#[derive(Clone)]
pub struct UiEventBus {
    tx: broadcast::Sender<UiEvent>,
}

impl UiEventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(DEFAULT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event_name: &str, payload: serde_json::Value) {
        let event = UiEvent {
            event_name: event_name.to_string(),
            payload,
        };
        if self.tx.send(event).is_err() {
            trace!("No UI event subscribers: event_name={}", event_name);
        }
    }
}

impl Default for UiEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::UiEventBus;

    #[tokio::test]
    async fn subscriber_receives_emitted_event() {
        let bus = UiEventBus::new();
        let mut rx = bus.subscribe();
        bus.emit("chat://answer-updated", serde_json::json!({"modelId": "m-1"}));
        let event = rx.recv().await.expect("event");
        assert_eq!(event.event_name, "chat://answer-updated");
        assert_eq!(event.payload["modelId"], "m-1");
    }

    #[test]
    fn emit_without_subscribers_is_a_no_op() {
        let bus = UiEventBus::new();
        bus.emit("chat://session-reset", serde_json::json!({}));
    }
}
