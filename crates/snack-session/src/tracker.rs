//! Correlation of in-flight requests with their responses
//!
//! Each request gets a fresh random token (the `version` field on the wire).
//! A `*_SUCCESS` or `*_ERROR` carrying that token settles the request and
//! removes it; `*_CALLBACK` messages are forwarded to the request's progress
//! handler and leave it pending. A reply whose type prefix names a different
//! request is ignored. There is no timeout.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::oneshot;

use snack_core::prelude::*;

use crate::protocol::Outcome;

/// Progress handler attached to a single request
pub type ProgressFn = Box<dyn FnMut(Value) + Send + 'static>;

/// 128 random bits, hex encoded.
pub fn generate_token() -> String {
    format!("{:032x}", rand::random::<u128>())
}

/// A request awaiting settlement
struct PendingCall {
    request_type: String,
    response_tx: oneshot::Sender<Result<Value>>,
    on_progress: Option<ProgressFn>,
}

/// Tracks pending requests by token.
///
/// Owned by the channel task; never shared.
#[derive(Default)]
pub struct RequestTracker {
    pending: HashMap<String, PendingCall>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request and return its token.
    pub fn register(
        &mut self,
        request_type: &str,
        response_tx: oneshot::Sender<Result<Value>>,
        on_progress: Option<ProgressFn>,
    ) -> String {
        let mut token = generate_token();
        while self.pending.contains_key(&token) {
            token = generate_token();
        }

        self.pending.insert(
            token.clone(),
            PendingCall {
                request_type: request_type.to_string(),
                response_tx,
                on_progress,
            },
        );
        token
    }

    /// Settle the request for `token`.
    /// Returns false if no request of `request_type` is pending under it.
    pub fn complete(&mut self, request_type: &str, token: &str, outcome: Outcome) -> bool {
        if !self.matches(request_type, token) {
            return false;
        }
        let Some(call) = self.pending.remove(token) else {
            return false;
        };

        trace!("Settling {} request {}", call.request_type, token);
        if call.response_tx.send(outcome.into_result()).is_err() {
            debug!(
                "{} request {} settled after its caller went away",
                call.request_type, token
            );
        }
        true
    }

    /// Deliver a progress callback to the request for `token`.
    /// Returns false if no request of `request_type` is pending under it.
    pub fn progress(&mut self, request_type: &str, token: &str, data: Value) -> bool {
        if !self.matches(request_type, token) {
            return false;
        }
        let Some(call) = self.pending.get_mut(token) else {
            return false;
        };

        match call.on_progress.as_mut() {
            Some(on_progress) => on_progress(data),
            None => trace!("{} request {} has no progress handler", call.request_type, token),
        }
        true
    }

    fn matches(&self, request_type: &str, token: &str) -> bool {
        match self.pending.get(token) {
            Some(call) if call.request_type == request_type => true,
            Some(call) => {
                warn!(
                    "{} reply carries the token of pending {} request {}",
                    request_type, call.request_type, token
                );
                false
            }
            None => false,
        }
    }

    pub fn is_pending(&self, token: &str) -> bool {
        self.pending.contains_key(token)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Request types of everything still pending, for diagnostics.
    pub fn pending_types(&self) -> Vec<&str> {
        self.pending
            .values()
            .map(|call| call.request_type.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use snack_core::RemoteError;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_token_shape() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_register_and_complete() {
        let mut tracker = RequestTracker::new();
        let (tx, rx) = oneshot::channel();
        let token = tracker.register("SAVE", tx, None);
        assert_eq!(tracker.pending_count(), 1);

        assert!(tracker.complete("SAVE", &token, Outcome::Success(json!({ "id": "x" }))));
        assert_eq!(tracker.pending_count(), 0);
        assert_eq!(rx.await.unwrap().unwrap()["id"], "x");
    }

    #[tokio::test]
    async fn test_complete_with_failure() {
        let mut tracker = RequestTracker::new();
        let (tx, rx) = oneshot::channel();
        let token = tracker.register("UPLOAD_ASSET", tx, None);

        tracker.complete(
            "UPLOAD_ASSET",
            &token,
            Outcome::Failure(RemoteError::new("quota", Some("stack".into()))),
        );
        let err = rx.await.unwrap().unwrap_err();
        assert_eq!(err.as_remote().unwrap().message, "quota");
    }

    #[test]
    fn test_unknown_token() {
        let mut tracker = RequestTracker::new();
        assert!(!tracker.complete("SAVE", "nope", Outcome::Success(Value::Null)));
        assert!(!tracker.progress("SAVE", "nope", Value::Null));
    }

    #[test]
    fn test_progress_routes_by_token() {
        let mut tracker = RequestTracker::new();
        let seen_a = Arc::new(Mutex::new(Vec::new()));
        let seen_b = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen_a);
        let (tx_a, _rx_a) = oneshot::channel();
        let a = tracker.register(
            "SYNC_DEPENDENCIES",
            tx_a,
            Some(Box::new(move |v| sink.lock().unwrap().push(v))),
        );
        let sink = Arc::clone(&seen_b);
        let (tx_b, _rx_b) = oneshot::channel();
        let b = tracker.register(
            "SYNC_DEPENDENCIES",
            tx_b,
            Some(Box::new(move |v| sink.lock().unwrap().push(v))),
        );

        for i in 0..3 {
            assert!(tracker.progress("SYNC_DEPENDENCIES", &a, json!(i)));
        }
        assert!(tracker.progress("SYNC_DEPENDENCIES", &b, json!("b")));

        assert_eq!(seen_a.lock().unwrap().len(), 3);
        assert_eq!(seen_b.lock().unwrap().as_slice(), &[json!("b")]);
        assert!(tracker.is_pending(&a));
    }

    #[test]
    fn test_complete_after_receiver_dropped() {
        let mut tracker = RequestTracker::new();
        let (tx, rx) = oneshot::channel();
        let token = tracker.register("SAVE", tx, None);
        drop(rx);
        assert!(tracker.complete("SAVE", &token, Outcome::Success(Value::Null)));
        assert!(tracker.pending_types().is_empty());
    }

    #[tokio::test]
    async fn test_reply_of_other_type_leaves_request_pending() {
        let mut tracker = RequestTracker::new();
        let (tx, rx) = oneshot::channel();
        let token = tracker.register("SAVE", tx, None);

        assert!(!tracker.complete("UPLOAD_ASSET", &token, Outcome::Success(json!("uri"))));
        assert!(!tracker.progress("SYNC_DEPENDENCIES", &token, json!({})));
        assert!(tracker.is_pending(&token));

        assert!(tracker.complete("SAVE", &token, Outcome::Success(json!({ "id": "x" }))));
        assert_eq!(rx.await.unwrap().unwrap()["id"], "x");
    }
}
