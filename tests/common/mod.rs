//! Common test utilities for integration tests
//!
//! Provides shared fixtures and helpers used across multiple integration
//! test files.

#![allow(dead_code)]

use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

use rsa_engine::adapters::substrates::{MockResponse, MockSubstrate};
use rsa_engine::{
    normalize, ChannelProgress, ConfigOverrides, EngineProfile, ProgressEvent, RsaEngine,
    RunConfig,
};

/// Normalized config for the given N, K, T, P and trace mode.
pub fn run_config(n: usize, k: usize, t: usize, p: usize, trace: &str) -> RunConfig {
    let overrides = ConfigOverrides::default()
        .with_population_size(n as u64)
        .with_aggregation_size(k as u64)
        .with_steps(t as u64)
        .with_parallelism(p as u64)
        .with_trace_mode(trace);
    let normalized = normalize(&overrides, EngineProfile::default()).expect("valid config");
    assert!(
        normalized.rejections.is_empty(),
        "unexpected rejections: {:?}",
        normalized.rejections
    );
    normalized.config
}

/// Engine over a mock substrate; the mock is returned for inspection.
pub fn mock_engine<F>(responder: F) -> (RsaEngine, Arc<MockSubstrate>)
where
    F: Fn(usize) -> MockResponse + Send + Sync + 'static,
{
    let mock = Arc::new(MockSubstrate::with_responder(move |_, seq| responder(seq)));
    (RsaEngine::new(mock.clone()), mock)
}

/// Channel sink plus its receiver.
pub fn channel() -> (Arc<ChannelProgress>, UnboundedReceiver<ProgressEvent>) {
    let (progress, rx) = ChannelProgress::new();
    (Arc::new(progress), rx)
}

/// Everything currently buffered on the receiver.
pub fn drain(rx: &mut UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn count(events: &[ProgressEvent], tag: &str) -> usize {
    events.iter().filter(|e| e.tag() == tag).count()
}

/// Initializes a tracing subscriber that writes through the test harness.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
