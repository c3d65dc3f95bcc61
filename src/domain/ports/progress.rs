//! Progress port - where the engine sends its progress events.

use tokio::sync::mpsc;

use crate::domain::models::ProgressEvent;

/// Receives progress events. Implementations must not block.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: ProgressEvent) {
        self(event);
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Forwards events over an unbounded channel; a dropped receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgress {
    fn emit(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn sample_event() -> ProgressEvent {
        ProgressEvent::RunStart {
            total_calls: 4,
            population_size: 2,
            aggregation_size: 1,
            steps: 2,
            parallelism: 1,
        }
    }

    #[test]
    fn test_closure_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let sink = move |event: ProgressEvent| seen_clone.lock().unwrap().push(event.tag());

        sink.emit(sample_event());
        assert_eq!(*seen.lock().unwrap(), vec!["run_start"]);
    }

    #[tokio::test]
    async fn test_channel_sink_survives_dropped_receiver() {
        let (sink, mut rx) = ChannelProgress::new();
        sink.emit(sample_event());
        assert_eq!(rx.recv().await.map(|e| e.tag()), Some("run_start"));

        drop(rx);
        sink.emit(sample_event());
    }
}
