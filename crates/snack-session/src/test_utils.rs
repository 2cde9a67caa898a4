//! Test utilities for session channel consumers
//!
//! [`MockWorker`] is an in-memory session worker: it sees every line the
//! channel writes and can answer, push, and exit on demand.

use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};

use snack_core::SessionState;

use crate::protocol;
use crate::worker::{WorkerEvent, WorkerLink, LINK_CAPACITY};

/// Worker side of an in-memory link
pub struct MockWorker {
    line_rx: mpsc::Receiver<String>,
    event_tx: mpsc::Sender<WorkerEvent>,
    kill_rx: oneshot::Receiver<()>,
    terminated: bool,
}

impl MockWorker {
    /// Create a mock and the link to hand to a `SessionChannel`.
    pub fn pair() -> (WorkerLink, MockWorker) {
        let (line_tx, line_rx) = mpsc::channel(LINK_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(LINK_CAPACITY);
        let (kill_tx, kill_rx) = oneshot::channel();

        let link = WorkerLink::new(line_tx, event_rx, kill_tx);
        let mock = MockWorker {
            line_rx,
            event_tx,
            kill_rx,
            terminated: false,
        };
        (link, mock)
    }

    /// Next message the channel wrote, parsed.
    pub async fn recv_message(&mut self) -> Option<Value> {
        let line = self.line_rx.recv().await?;
        serde_json::from_str(&line).ok()
    }

    /// Next message if one is already queued.
    pub fn try_recv_message(&mut self) -> Option<Value> {
        let line = self.line_rx.try_recv().ok()?;
        serde_json::from_str(&line).ok()
    }

    /// Receive the next message and assert its type.
    pub async fn expect_message(&mut self, message_type: &str) -> Value {
        let message = self
            .recv_message()
            .await
            .unwrap_or_else(|| panic!("channel closed while waiting for {message_type}"));
        assert_eq!(
            message["type"], message_type,
            "expected {message_type}, got {message}"
        );
        message
    }

    pub async fn send_raw(&self, line: impl Into<String>) {
        let _ = self.event_tx.send(WorkerEvent::Line(line.into())).await;
    }

    pub async fn send(&self, message_type: &str, payload: Value) {
        self.send_raw(json!({ "type": message_type, "payload": payload }).to_string())
            .await;
    }

    pub async fn ready(&self) {
        self.send(protocol::READY, Value::Null).await;
    }

    /// Settle `request` successfully.
    pub async fn respond_success(&self, request: &Value, data: Value) {
        self.reply(request, "_SUCCESS", data).await;
    }

    /// Settle `request` with a remote error.
    pub async fn respond_error(&self, request: &Value, message: &str, stack: Option<&str>) {
        self.reply(
            request,
            "_ERROR",
            json!({ "message": message, "stack": stack }),
        )
        .await;
    }

    /// Send a progress callback for `request`.
    pub async fn callback(&self, request: &Value, data: Value) {
        self.reply(request, "_CALLBACK", data).await;
    }

    async fn reply(&self, request: &Value, suffix: &str, data: Value) {
        let message_type = request["type"].as_str().unwrap_or_default();
        let version = request["payload"]["version"].clone();
        self.send(
            &format!("{message_type}{suffix}"),
            json!({ "version": version, "data": data }),
        )
        .await;
    }

    pub async fn push_state(&self, state: &SessionState) {
        let payload = serde_json::to_value(state).unwrap_or(Value::Null);
        self.send(protocol::STATE, payload).await;
    }

    pub async fn stderr(&self, line: impl Into<String>) {
        let _ = self.event_tx.send(WorkerEvent::Stderr(line.into())).await;
    }

    /// Simulate the worker process going away.
    pub async fn exit(&self, code: Option<i32>) {
        let _ = self.event_tx.send(WorkerEvent::Exited { code }).await;
    }

    /// Whether the channel asked the worker to terminate.
    pub fn was_terminated(&mut self) -> bool {
        if !self.terminated && self.kill_rx.try_recv().is_ok() {
            self.terminated = true;
        }
        self.terminated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_sees_lines_written_to_link() {
        let (link, mut mock) = MockWorker::pair();
        link.send_line(r#"{"type":"START","payload":{"version":"v","data":null}}"#.into())
            .await
            .unwrap();

        let msg = mock.expect_message("START").await;
        assert_eq!(msg["payload"]["version"], "v");
    }

    #[tokio::test]
    async fn test_mock_reply_shape() {
        let (mut link, mock) = MockWorker::pair();
        let request = json!({ "type": "SAVE", "payload": { "version": "t", "data": {} } });
        mock.respond_success(&request, json!({ "id": "1" })).await;

        match link.recv().await {
            Some(WorkerEvent::Line(line)) => {
                let value: Value = serde_json::from_str(&line).unwrap();
                assert_eq!(value["type"], "SAVE_SUCCESS");
                assert_eq!(value["payload"]["version"], "t");
                assert_eq!(value["payload"]["data"]["id"], "1");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_terminate_is_observed() {
        let (mut link, mut mock) = MockWorker::pair();
        assert!(!mock.was_terminated());
        link.terminate();
        assert!(mock.was_terminated());
        assert!(mock.was_terminated());
    }
}
