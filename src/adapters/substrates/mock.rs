//! Mock substrate for testing and dry runs.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::{RsaError, RsaResult};
use crate::domain::models::{CallRequest, ChunkSink};
use crate::domain::ports::Substrate;

/// Mock response configuration.
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// Output text
    pub output: String,
    /// Simulated call latency
    pub latency: Duration,
    /// Whether to simulate failure
    pub fail: bool,
    /// Error message if failing
    pub error_message: Option<String>,
}

impl Default for MockResponse {
    fn default() -> Self {
        Self {
            output: "Mock reasoning.\nFinal Answer: 42".to_string(),
            latency: Duration::from_millis(10),
            fail: false,
            error_message: None,
        }
    }
}

impl MockResponse {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Default::default()
        }
    }

    /// A successful response ending in `Final Answer: <answer>`.
    pub fn answer(answer: impl std::fmt::Display) -> Self {
        Self::success(format!("Working through it.\nFinal Answer: {answer}"))
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            fail: true,
            error_message: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

/// Chooses a response from the request and its zero-based call sequence number.
pub type Responder = Arc<dyn Fn(&CallRequest, usize) -> MockResponse + Send + Sync>;

/// Mock substrate for testing.
///
/// Honors deadlines and cancellation the same way a process would, streams
/// the response line by line to the chunk sink, and tracks how many calls
/// were in flight at once.
pub struct MockSubstrate {
    responder: Responder,
    requests: Arc<RwLock<Vec<CallRequest>>>,
    sequence: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockSubstrate {
    pub fn new() -> Self {
        Self::with_default_response(MockResponse::default())
    }

    pub fn with_default_response(response: MockResponse) -> Self {
        Self::with_responder(move |_, _| response.clone())
    }

    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&CallRequest, usize) -> MockResponse + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            requests: Arc::new(RwLock::new(Vec::new())),
            sequence: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Every request received so far, in arrival order.
    pub async fn requests(&self) -> Vec<CallRequest> {
        self.requests.read().await.clone()
    }

    pub fn call_count(&self) -> usize {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Default for MockSubstrate {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Substrate for MockSubstrate {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn invoke(
        &self,
        request: CallRequest,
        cancel: CancellationToken,
        on_chunk: Option<ChunkSink>,
    ) -> RsaResult<String> {
        if cancel.is_cancelled() {
            return Err(RsaError::Aborted);
        }

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let response = (self.responder)(&request, sequence);
        self.requests.write().await.push(request.clone());

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let deadline = async {
            match request.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };

        let outcome = tokio::select! {
            () = cancel.cancelled() => Err(RsaError::Aborted),
            () = deadline => Err(RsaError::Timeout { timeout_ms: request.timeout_ms() }),
            () = tokio::time::sleep(response.latency) => Ok(()),
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome?;

        if let Some(sink) = on_chunk {
            for line in response.output.split_inclusive('\n') {
                sink(line);
            }
        }

        if response.fail {
            return Err(RsaError::Call(
                response
                    .error_message
                    .unwrap_or_else(|| "mock failure".to_string()),
            ));
        }
        Ok(response.output)
    }
}
