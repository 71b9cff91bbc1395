use std::sync::mpsc;

use crate::BatchEvent;

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: BatchEvent);
}

/// Forwards batch events to a channel; a closed receiver drops events.
pub struct ChannelProgressSink {
    tx: mpsc::Sender<BatchEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: mpsc::Sender<BatchEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: BatchEvent) {
        let _ = self.tx.send(event);
    }
}
