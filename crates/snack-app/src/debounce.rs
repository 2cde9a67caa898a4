//! Restartable one-shot timers
//!
//! Each `schedule` aborts the previous sleep and starts a new one; when a
//! sleep runs to completion its message is sent to the controller queue.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use snack_core::prelude::*;

pub struct Debouncer {
    name: &'static str,
    delay: Duration,
    handle: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(name: &'static str, delay: Duration) -> Self {
        Self {
            name,
            delay,
            handle: None,
        }
    }

    /// (Re)start the timer; `message` is delivered once it expires.
    pub fn schedule<M>(&mut self, tx: &mpsc::UnboundedSender<M>, message: M)
    where
        M: Send + 'static,
    {
        self.cancel();

        let tx = tx.clone();
        let delay = self.delay;
        let name = self.name;
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            trace!("{} timer fired", name);
            let _ = tx.send(message);
        }));
    }

    /// Stop the timer if it is running.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Whether a scheduled message has not been delivered yet.
    pub fn is_pending(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("name", &self.name)
            .field("delay", &self.delay)
            .field("pending", &self.is_pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = Debouncer::new("test", Duration::from_millis(100));

        timer.schedule(&tx, 1);
        assert!(timer.is_pending());

        tokio::time::sleep(Duration::from_millis(99)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(rx.recv().await, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_coalesces() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = Debouncer::new("test", Duration::from_millis(100));

        for i in 0..5 {
            timer.schedule(&tx, i);
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(rx.recv().await, Some(4));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let (tx, mut rx) = mpsc::unbounded_channel::<u8>();
        let mut timer = Debouncer::new("test", Duration::from_millis(100));

        timer.schedule(&tx, 1);
        timer.cancel();
        assert!(!timer.is_pending());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(rx.try_recv().is_err());
    }
}
