//! Single-subscriber progress channel for one run.
//!
//! The sender half is fire-and-forget: once the subscriber is gone every
//! send is a no-op, so a disconnected client can never stall a run. The
//! terminal event is sent through [`ProgressSender::finish`], which consumes
//! the sender and therefore closes the channel.

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

use crate::models::{PageResult, ProgressEvent};

pub fn channel() -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ProgressSender { tx }, ProgressReceiver { rx })
}

#[derive(Debug)]
pub struct ProgressSender {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressSender {
    /// `{progress: 0, total, message: "starting"}`
    pub fn started(&self, total: usize) {
        self.send(ProgressEvent::started(total));
    }

    /// One event per finished attempt, success or failure.
    pub fn page(&self, completed: usize, total: usize, result: &PageResult) {
        self.send(ProgressEvent::page(completed, total, result));
    }

    /// Send the terminal event and close the channel.
    pub fn finish(self, event: ProgressEvent) {
        debug_assert!(event.is_terminal(), "finish() needs a terminal event");
        self.send(event);
    }

    fn send(&self, event: ProgressEvent) {
        if self.tx.send(event).is_err() {
            debug!("progress subscriber disconnected; dropping event");
        }
    }
}

#[derive(Debug)]
pub struct ProgressReceiver {
    rx: mpsc::UnboundedReceiver<ProgressEvent>,
}

impl ProgressReceiver {
    /// Next event, or `None` once the terminal event has been consumed.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }

    pub fn into_stream(self) -> UnboundedReceiverStream<ProgressEvent> {
        UnboundedReceiverStream::new(self.rx)
    }

    /// Drain the channel until it closes.
    pub async fn collect(mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            events.push(event);
        }
        events
    }
}
