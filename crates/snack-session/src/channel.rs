//! Correlated request/response channel to the session worker.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       SessionChannel                          │
//! │                                                               │
//! │  ┌──────────────┐         ┌────────────────────────────────┐  │
//! │  │  Public API  │         │  Background Task               │  │
//! │  │              │         │                                │  │
//! │  │  call()    ──┼──cmd───▶│  buffer until READY, then      │  │
//! │  │  create()    │  queue  │  write lines to the worker     │  │
//! │  │  set_*()     │         │                                │  │
//! │  │              │         │  Route: response → tracker     │  │
//! │  │  subscribe() │◀─push───│         callback → progress fn │  │
//! │  │              │         │         push → listeners       │  │
//! │  └──────────────┘         └────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every public method enqueues synchronously onto an unbounded queue before
//! returning, so the order in which calls are made is the order in which the
//! worker sees them. The returned [`PendingRequest`] only awaits the outcome.
//!
//! Until the worker sends `READY`, outbound messages sit in a FIFO buffer.
//! The buffer is drained exactly once; `READY` messages after that are
//! ignored.
//!
//! There is no request timeout. When the channel is disposed, requests that
//! are still pending are abandoned and their futures never complete.

use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};

use snack_core::events::{PushKind, SessionEvent};
use snack_core::prelude::*;

use crate::protocol::{self, parse_inbound, InboundMessage, OutboundMessage, Property};
use crate::tracker::{ProgressFn, RequestTracker};
use crate::worker::{WorkerEvent, WorkerLink, WorkerSender};

// ---------------------------------------------------------------------------
// Listeners
// ---------------------------------------------------------------------------

type Handler = Arc<dyn Fn(&SessionEvent) + Send + Sync + 'static>;

struct Listener {
    kind: PushKind,
    handler: Handler,
}

/// Registered push listeners, in registration order.
#[derive(Default)]
struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<BTreeMap<u64, Listener>>,
}

impl ListenerRegistry {
    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<u64, Listener>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn add(&self, kind: PushKind, handler: Handler) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(id, Listener { kind, handler });
        id
    }

    fn remove(&self, id: u64) -> bool {
        self.lock().remove(&id).is_some()
    }

    fn clear(&self) {
        self.lock().clear();
    }

    fn len(&self) -> usize {
        self.lock().len()
    }

    /// Call every listener for the event's kind. Handlers run outside the
    /// lock so they may subscribe or dispose.
    fn dispatch(&self, event: &SessionEvent) -> usize {
        let kind = event.kind();
        let handlers: Vec<Handler> = self
            .lock()
            .values()
            .filter(|listener| listener.kind == kind)
            .map(|listener| Arc::clone(&listener.handler))
            .collect();

        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }
}

/// Handle for one push listener.
///
/// The listener stays registered until [`dispose`](Subscription::dispose)
/// is called or the handle is dropped.
#[must_use = "dropping a Subscription removes its listener"]
pub struct Subscription {
    registry: Weak<ListenerRegistry>,
    id: u64,
    kind: PushKind,
    disposed: bool,
}

impl Subscription {
    pub fn kind(&self) -> PushKind {
        self.kind
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Remove the listener. Calling this again does nothing.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("disposed", &self.disposed)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// PendingRequest
// ---------------------------------------------------------------------------

/// Outcome of a request that has already been queued.
///
/// Resolves to the `data` of the `*_SUCCESS` response, or to
/// [`Error::Remote`] for `*_ERROR`. If the channel is torn down first the
/// future stays pending forever.
pub struct PendingRequest {
    rx: oneshot::Receiver<Result<Value>>,
    abandoned: bool,
}

impl PendingRequest {
    fn new(rx: oneshot::Receiver<Result<Value>>) -> Self {
        Self {
            rx,
            abandoned: false,
        }
    }

    /// True once the channel has dropped this request unsettled.
    pub fn is_abandoned(&self) -> bool {
        self.abandoned
    }
}

impl Future for PendingRequest {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.abandoned {
            return Poll::Pending;
        }
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => {
                self.abandoned = true;
                Poll::Pending
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl std::fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequest")
            .field("abandoned", &self.abandoned)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Internal command type
// ---------------------------------------------------------------------------

enum ChannelCommand {
    /// Session bootstrap; must reach the worker before anything else
    Create {
        data: Value,
        response_tx: oneshot::Sender<Result<Value>>,
    },
    Call {
        request_type: String,
        data: Value,
        response_tx: oneshot::Sender<Result<Value>>,
        on_progress: Option<ProgressFn>,
    },
    /// Fire-and-forget message
    Notify(OutboundMessage),
    Dispose,
}

/// State observable from outside the task
struct ChannelStatus {
    ready_tx: watch::Sender<bool>,
    pending: AtomicUsize,
    disposed: AtomicBool,
}

// ---------------------------------------------------------------------------
// SessionChannel
// ---------------------------------------------------------------------------

/// Proxy for the session worker.
///
/// Cheap to clone; all clones share one background task. Must be created
/// inside a Tokio runtime.
#[derive(Clone)]
pub struct SessionChannel {
    cmd_tx: mpsc::UnboundedSender<ChannelCommand>,
    listeners: Arc<ListenerRegistry>,
    status: Arc<ChannelStatus>,
}

impl std::fmt::Debug for SessionChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionChannel")
            .field("ready", &self.is_ready())
            .field("pending", &self.pending_count())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl SessionChannel {
    /// Take over `link` and start the background task.
    pub fn new(link: WorkerLink) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (ready_tx, _) = watch::channel(false);
        let listeners = Arc::new(ListenerRegistry::default());
        let status = Arc::new(ChannelStatus {
            ready_tx,
            pending: AtomicUsize::new(0),
            disposed: AtomicBool::new(false),
        });

        let (sender, event_rx) = link.into_parts();
        let task = ChannelTask {
            sender,
            tracker: RequestTracker::new(),
            buffer: Some(VecDeque::new()),
            created: false,
            sent_any: false,
            listeners: Arc::clone(&listeners),
            status: Arc::clone(&status),
        };
        tokio::spawn(task.run(cmd_rx, event_rx));

        Self {
            cmd_tx,
            listeners,
            status,
        }
    }

    fn enqueue(&self, command: ChannelCommand) {
        if self.cmd_tx.send(command).is_err() {
            warn!("Session channel is closed; message dropped");
        }
    }

    /// Send `INIT`. It reaches the worker ahead of anything queued earlier.
    ///
    /// Fails with [`Error::Protocol`] if the session was already created or
    /// other traffic has already been delivered.
    pub fn create(&self, options: Value) -> impl Future<Output = Result<()>> + Send + 'static {
        let (response_tx, rx) = oneshot::channel();
        self.enqueue(ChannelCommand::Create {
            data: options,
            response_tx,
        });
        let pending = PendingRequest::new(rx);
        async move { pending.await.map(|_| ()) }
    }

    /// Queue a correlated request.
    pub fn call(&self, request_type: &str, data: Value) -> PendingRequest {
        self.call_inner(request_type, data, None)
    }

    /// Queue a correlated request whose `*_CALLBACK` messages go to
    /// `on_progress` until it settles.
    pub fn call_with_progress<F>(
        &self,
        request_type: &str,
        data: Value,
        on_progress: F,
    ) -> PendingRequest
    where
        F: FnMut(Value) + Send + 'static,
    {
        self.call_inner(request_type, data, Some(Box::new(on_progress)))
    }

    fn call_inner(
        &self,
        request_type: &str,
        data: Value,
        on_progress: Option<ProgressFn>,
    ) -> PendingRequest {
        let (response_tx, rx) = oneshot::channel();
        self.enqueue(ChannelCommand::Call {
            request_type: request_type.to_string(),
            data,
            response_tx,
            on_progress,
        });
        PendingRequest::new(rx)
    }

    /// Fire-and-forget property assignment (`SET_*`).
    pub fn set_property(&self, property: Property, value: impl Into<Value>) {
        self.enqueue(ChannelCommand::Notify(OutboundMessage::set_property(
            property,
            value.into(),
        )));
    }

    /// Fire-and-forget message of any type, e.g. `SEND_CODE`.
    pub fn notify(&self, message_type: &str, data: Value) {
        self.enqueue(ChannelCommand::Notify(OutboundMessage::notify(
            message_type,
            data,
        )));
    }

    /// Listen for worker pushes of `kind`.
    pub fn subscribe<F>(&self, kind: PushKind, handler: F) -> Subscription
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let id = self.listeners.add(kind, Arc::new(handler));
        Subscription {
            registry: Arc::downgrade(&self.listeners),
            id,
            kind,
            disposed: false,
        }
    }

    /// Whether `READY` has arrived and the buffer has been flushed.
    pub fn is_ready(&self) -> bool {
        *self.status.ready_tx.borrow()
    }

    /// Wait for `READY`. Returns immediately if it already arrived.
    pub async fn wait_ready(&self) {
        let mut rx = self.status.ready_tx.subscribe();
        let _ = rx.wait_for(|ready| *ready).await;
    }

    /// Requests registered and not yet settled, as of the task's last step.
    pub fn pending_count(&self) -> usize {
        self.status.pending.load(Ordering::Acquire)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_disposed(&self) -> bool {
        self.status.disposed.load(Ordering::Acquire)
    }

    /// Drop every listener and terminate the worker. Idempotent.
    pub fn dispose(&self) {
        if self.status.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Disposing session channel");
        self.listeners.clear();
        let _ = self.cmd_tx.send(ChannelCommand::Dispose);
    }
}

// ---------------------------------------------------------------------------
// Background task
// ---------------------------------------------------------------------------

struct ChannelTask {
    sender: WorkerSender,
    tracker: RequestTracker,
    /// Messages held until `READY`; `None` once drained
    buffer: Option<VecDeque<OutboundMessage>>,
    created: bool,
    sent_any: bool,
    listeners: Arc<ListenerRegistry>,
    status: Arc<ChannelStatus>,
}

impl ChannelTask {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<ChannelCommand>,
        mut event_rx: mpsc::Receiver<WorkerEvent>,
    ) {
        let mut worker_open = true;

        loop {
            // Commands first, so requests queued before READY are buffered
            // (and INIT moved to the front) before the buffer is flushed.
            tokio::select! {
                biased;

                command = cmd_rx.recv() => match command {
                    Some(ChannelCommand::Dispose) | None => break,
                    Some(command) => self.handle_command(command).await,
                },

                event = event_rx.recv(), if worker_open => match event {
                    Some(event) => self.handle_worker_event(event).await,
                    None => {
                        debug!("Session worker event stream closed");
                        worker_open = false;
                    }
                },
            }
        }

        self.teardown();
    }

    async fn handle_command(&mut self, command: ChannelCommand) {
        match command {
            ChannelCommand::Create { data, response_tx } => {
                if self.created {
                    let _ = response_tx.send(Err(Error::protocol("session already created")));
                    return;
                }
                if self.buffer.is_none() && self.sent_any {
                    let _ = response_tx.send(Err(Error::protocol(
                        "INIT must be the first request, but other messages were already delivered",
                    )));
                    return;
                }

                self.created = true;
                let token = self.tracker.register(protocol::INIT, response_tx, None);
                self.publish_pending();
                let message = OutboundMessage::request(protocol::INIT, token, data);
                match self.buffer.as_mut() {
                    Some(buffer) => buffer.push_front(message),
                    None => self.transmit(message).await,
                }
            }
            ChannelCommand::Call {
                request_type,
                data,
                response_tx,
                on_progress,
            } => {
                let token = self.tracker.register(&request_type, response_tx, on_progress);
                self.publish_pending();
                self.dispatch(OutboundMessage::request(request_type, token, data))
                    .await;
            }
            ChannelCommand::Notify(message) => self.dispatch(message).await,
            ChannelCommand::Dispose => {}
        }
    }

    fn publish_pending(&self) {
        self.status
            .pending
            .store(self.tracker.pending_count(), Ordering::Release);
    }

    /// Buffer before `READY`, write after.
    async fn dispatch(&mut self, message: OutboundMessage) {
        match self.buffer.as_mut() {
            Some(buffer) => {
                trace!("Buffering {} until READY", message.message_type);
                buffer.push_back(message);
            }
            None => self.transmit(message).await,
        }
    }

    async fn transmit(&mut self, message: OutboundMessage) {
        let line = match message.to_line() {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to encode {}: {}", message.message_type, e);
                return;
            }
        };

        self.sent_any = true;
        if let Err(e) = self.sender.send_line(line).await {
            warn!("Dropping {}: {}", message.message_type, e);
        }
    }

    async fn handle_worker_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Line(line) => self.handle_line(&line).await,
            WorkerEvent::Stderr(line) => warn!("[session worker] {}", line),
            WorkerEvent::Exited { code } => {
                warn!("Session worker exited with code {:?}", code);
                self.listeners.dispatch(&SessionEvent::Exited { code });
            }
        }
    }

    async fn handle_line(&mut self, line: &str) {
        match parse_inbound(line) {
            Ok(InboundMessage::Ready) => self.flush().await,
            Ok(InboundMessage::Response {
                request_type,
                version,
                outcome,
            }) => {
                if self.tracker.complete(&request_type, &version, outcome) {
                    self.publish_pending();
                } else {
                    debug!(
                        "Dropping {} response for token {}",
                        request_type, version
                    );
                }
            }
            Ok(InboundMessage::Callback {
                request_type,
                version,
                data,
            }) => {
                if !self.tracker.progress(&request_type, &version, data) {
                    debug!(
                        "Dropping {} callback for token {}",
                        request_type, version
                    );
                }
            }
            Ok(InboundMessage::Push(event)) => {
                let delivered = self.listeners.dispatch(&event);
                trace!(
                    "{} push delivered to {} listener(s)",
                    event.kind().wire_name(),
                    delivered
                );
            }
            Ok(InboundMessage::Unknown(message_type)) => {
                debug!("Ignoring unknown worker message type {}", message_type);
            }
            Err(e) => {
                let preview: String = line.chars().take(120).collect();
                warn!("Dropping malformed worker message ({}): {}", e, preview);
            }
        }
    }

    /// Drain the pre-ready buffer. Only the first `READY` does anything.
    async fn flush(&mut self) {
        let Some(buffer) = self.buffer.take() else {
            warn!("Ignoring duplicate READY from session worker");
            return;
        };

        info!(
            "Session worker ready, flushing {} buffered message(s)",
            buffer.len()
        );
        for message in buffer {
            self.transmit(message).await;
        }
        self.status.ready_tx.send_replace(true);
    }

    fn teardown(mut self) {
        self.status.disposed.store(true, Ordering::Release);
        self.listeners.clear();
        self.sender.terminate();

        let pending = self.tracker.pending_count();
        if pending > 0 {
            debug!(
                "Session channel closed with {} unsettled request(s): {:?}",
                pending,
                self.tracker.pending_types()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockWorker;
    use serde_json::json;
    use std::time::Duration;

    fn channel() -> (SessionChannel, MockWorker) {
        let (link, mock) = MockWorker::pair();
        (SessionChannel::new(link), mock)
    }

    async fn nothing_sent(mock: &mut MockWorker) -> bool {
        tokio::time::timeout(Duration::from_millis(50), mock.recv_message())
            .await
            .is_err()
    }

    #[tokio::test]
    async fn test_messages_buffered_until_ready_in_issue_order() {
        let (channel, mut mock) = channel();

        let _init = channel.call(protocol::INIT, json!({}));
        let _start = channel.call(protocol::START, Value::Null);
        channel.set_property(Property::Name, "Demo");

        assert!(nothing_sent(&mut mock).await);
        assert!(!channel.is_ready());

        mock.ready().await;
        mock.expect_message("INIT").await;
        mock.expect_message("START").await;
        let set = mock.expect_message("SET_NAME").await;
        assert_eq!(set["payload"]["data"], "Demo");

        channel.wait_ready().await;
        assert!(channel.is_ready());
    }

    #[tokio::test]
    async fn test_create_jumps_ahead_of_earlier_messages() {
        let (channel, mut mock) = channel();

        let _start = channel.call(protocol::START, Value::Null);
        channel.set_property(Property::DeviceId, "device-1");
        let _created = channel.create(json!({ "name": "Demo" }));

        mock.ready().await;
        let init = mock.expect_message("INIT").await;
        assert_eq!(init["payload"]["data"]["name"], "Demo");
        mock.expect_message("START").await;
        mock.expect_message("SET_DEVICE_ID").await;
    }

    #[tokio::test]
    async fn test_init_leads_when_ready_races_queued_commands() {
        for _ in 0..32 {
            let (channel, mut mock) = channel();
            channel.set_property(Property::DeviceId, "device-1");
            let _start = channel.call(protocol::START, Value::Null);
            let _created = channel.create(json!({ "name": "Demo" }));

            mock.ready().await;
            let first = mock.recv_message().await.unwrap();
            assert_eq!(first["type"], "INIT");
        }
    }

    #[tokio::test]
    async fn test_reply_with_wrong_type_does_not_settle() {
        let (channel, mut mock) = channel();
        mock.ready().await;

        let mut saved = channel.call(protocol::SAVE, json!({ "isDraft": true }));
        let save = mock.expect_message("SAVE").await;
        let version = save["payload"]["version"].clone();
        mock.send(
            "UPLOAD_ASSET_SUCCESS",
            json!({ "version": version, "data": "uri" }),
        )
        .await;
        assert!(
            tokio::time::timeout(Duration::from_millis(50), &mut saved)
                .await
                .is_err()
        );

        mock.respond_success(&save, json!({ "id": "x" })).await;
        assert_eq!(saved.await.unwrap()["id"], "x");
    }

    #[tokio::test]
    async fn test_create_resolves_on_success() {
        let (channel, mut mock) = channel();
        mock.ready().await;

        let created = channel.create(json!({}));
        let init = mock.expect_message("INIT").await;
        mock.respond_success(&init, Value::Null).await;
        created.await.unwrap();
    }

    #[tokio::test]
    async fn test_create_after_other_traffic_fails() {
        let (channel, mut mock) = channel();
        mock.ready().await;
        channel.notify(protocol::SEND_CODE, json!({}));
        mock.expect_message("SEND_CODE").await;

        let err = channel.create(json!({})).await.unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_create_twice_fails() {
        let (channel, _mock) = channel();
        let _first = channel.create(json!({}));
        let err = channel.create(json!({})).await.unwrap_err();
        assert!(err.to_string().contains("already created"));
    }

    #[tokio::test]
    async fn test_call_resolves_with_success_data() {
        let (channel, mut mock) = channel();
        mock.ready().await;

        let save = channel.call(protocol::SAVE, json!({ "isDraft": false }));
        let request = mock.expect_message("SAVE").await;
        mock.respond_success(&request, json!({ "id": "@me/demo" })).await;

        assert_eq!(save.await.unwrap()["id"], "@me/demo");
    }

    #[tokio::test]
    async fn test_call_rejects_with_remote_error() {
        let (channel, mut mock) = channel();
        mock.ready().await;

        let upload = channel.call(protocol::UPLOAD_ASSET, json!({}));
        let request = mock.expect_message("UPLOAD_ASSET").await;
        mock.respond_error(&request, "Asset too large", Some("at upload (worker.js:1)"))
            .await;

        let err = upload.await.unwrap_err();
        let remote = err.as_remote().unwrap();
        assert_eq!(remote.message, "Asset too large");
        assert_eq!(remote.stack.as_deref(), Some("at upload (worker.js:1)"));
    }

    #[tokio::test]
    async fn test_responses_correlate_by_token_not_order() {
        let (channel, mut mock) = channel();
        mock.ready().await;

        let first = channel.call(protocol::SAVE, json!({ "n": 1 }));
        let second = channel.call(protocol::SAVE, json!({ "n": 2 }));
        let req1 = mock.expect_message("SAVE").await;
        let req2 = mock.expect_message("SAVE").await;
        assert_ne!(req1["payload"]["version"], req2["payload"]["version"]);

        mock.respond_success(&req2, json!("second")).await;
        mock.respond_success(&req1, json!("first")).await;

        assert_eq!(first.await.unwrap(), json!("first"));
        assert_eq!(second.await.unwrap(), json!("second"));
    }

    #[tokio::test]
    async fn test_progress_goes_only_to_its_own_call() {
        let (channel, mut mock) = channel();
        mock.ready().await;

        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let sync_a = channel.call_with_progress(protocol::SYNC_DEPENDENCIES, json!({}), move |v| {
            let _ = tx_a.send(v);
        });
        let sync_b = channel.call_with_progress(protocol::SYNC_DEPENDENCIES, json!({}), move |v| {
            let _ = tx_b.send(v);
        });
        let req_a = mock.expect_message("SYNC_DEPENDENCIES").await;
        let req_b = mock.expect_message("SYNC_DEPENDENCIES").await;

        for name in ["a", "b", "c"] {
            mock.callback(&req_a, json!({ "name": name, "message": "not found" }))
                .await;
        }
        mock.respond_success(&req_a, Value::Null).await;
        mock.respond_success(&req_b, Value::Null).await;

        sync_a.await.unwrap();
        sync_b.await.unwrap();

        let mut names = Vec::new();
        while let Ok(v) = rx_a.try_recv() {
            names.push(v["name"].as_str().unwrap().to_string());
        }
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_pending_count_tracks_settlement() {
        let (channel, mut mock) = channel();
        let save = channel.call(protocol::SAVE, json!({}));
        mock.ready().await;
        let request = mock.expect_message("SAVE").await;
        assert_eq!(channel.pending_count(), 1);

        mock.respond_success(&request, Value::Null).await;
        save.await.unwrap();
        assert_eq!(channel.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_subscribe_and_dispose() {
        let (channel, mock) = channel();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut subscription = channel.subscribe(PushKind::Channel, move |event| {
            let _ = tx.send(event.clone());
        });
        assert_eq!(channel.listener_count(), 1);

        mock.send(protocol::CHANNEL, json!("ch-1")).await;
        match rx.recv().await {
            Some(SessionEvent::Channel(id)) => assert_eq!(id, "ch-1"),
            other => panic!("unexpected {other:?}"),
        }

        subscription.dispose();
        subscription.dispose();
        assert!(subscription.is_disposed());
        assert_eq!(channel.listener_count(), 0);

        mock.send(protocol::CHANNEL, json!("ch-2")).await;
        assert!(tokio::time::timeout(Duration::from_millis(50), rx.recv())
            .await
            .map(|e| e.is_none())
            .unwrap_or(true));
    }

    #[tokio::test]
    async fn test_listeners_filtered_by_kind() {
        let (channel, mock) = channel();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _logs = channel.subscribe(PushKind::Log, move |event| {
            let _ = tx.send(event.kind());
        });

        mock.send(protocol::CHANNEL, json!("ignored")).await;
        mock.send(protocol::LOG, json!({ "message": "hello" })).await;

        assert_eq!(rx.recv().await, Some(PushKind::Log));
    }

    #[tokio::test]
    async fn test_dropping_subscription_removes_listener() {
        let (channel, _mock) = channel();
        {
            let _sub = channel.subscribe(PushKind::State, |_| {});
            assert_eq!(channel.listener_count(), 1);
        }
        assert_eq!(channel.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_ready_does_not_reflush() {
        let (channel, mut mock) = channel();
        channel.notify(protocol::SEND_CODE, json!({}));
        mock.ready().await;
        mock.expect_message("SEND_CODE").await;

        mock.ready().await;
        assert!(nothing_sent(&mut mock).await);
    }

    #[tokio::test]
    async fn test_malformed_lines_are_dropped() {
        let (channel, mut mock) = channel();
        mock.send_raw("{ this is not json").await;
        mock.send_raw(r#"{"type":"STATE","payload":"not a state"}"#).await;
        mock.ready().await;

        let start = channel.call(protocol::START, Value::Null);
        let request = mock.expect_message("START").await;
        mock.respond_success(&request, Value::Null).await;
        start.await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_exit_is_pushed() {
        let (channel, mock) = channel();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _exit = channel.subscribe(PushKind::Exited, move |event| {
            let _ = tx.send(event.clone());
        });

        mock.exit(Some(1)).await;
        assert!(matches!(
            rx.recv().await,
            Some(SessionEvent::Exited { code: Some(1) })
        ));
    }

    #[tokio::test]
    async fn test_dispose_terminates_worker_and_abandons_pending() {
        let (channel, mut mock) = channel();
        mock.ready().await;
        let _sub = channel.subscribe(PushKind::State, |_| {});

        let mut save = channel.call(protocol::SAVE, json!({}));
        mock.expect_message("SAVE").await;

        channel.dispose();
        channel.dispose();
        assert!(channel.is_disposed());
        assert_eq!(channel.listener_count(), 0);

        assert!(
            tokio::time::timeout(Duration::from_millis(100), &mut save)
                .await
                .is_err(),
            "pending request must stay unsettled"
        );
        assert!(save.is_abandoned());
        assert!(mock.was_terminated());
    }
}
