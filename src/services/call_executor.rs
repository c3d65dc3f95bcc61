//! Executes one model call and extracts its answer.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::{RsaError, RsaResult};
use crate::domain::models::{CallOutput, CallRequest, ChunkSink, ModelRef};
use crate::domain::ports::Substrate;
use crate::services::answer_extractor::extract_answer;

/// Wraps a substrate with the checks every call needs.
#[derive(Clone)]
pub struct CallExecutor {
    substrate: Arc<dyn Substrate>,
}

impl CallExecutor {
    pub fn new(substrate: Arc<dyn Substrate>) -> Self {
        Self { substrate }
    }

    pub fn substrate_name(&self) -> &'static str {
        self.substrate.name()
    }

    /// Run `prompt` against `model`.
    ///
    /// Returns `Aborted` without launching anything if `cancel` already fired.
    pub async fn execute(
        &self,
        model: &ModelRef,
        prompt: String,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
        on_chunk: Option<ChunkSink>,
    ) -> RsaResult<CallOutput> {
        if cancel.is_cancelled() {
            return Err(RsaError::Aborted);
        }

        let request = CallRequest::new(model.clone(), prompt).with_timeout(timeout);
        let started = Instant::now();
        let raw = self
            .substrate
            .invoke(request, cancel.clone(), on_chunk)
            .await?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let response_text = raw.trim().to_string();
        if response_text.is_empty() {
            return Err(RsaError::Call("Model returned empty output".to_string()));
        }

        let extracted_answer = extract_answer(&response_text);
        tracing::debug!(
            substrate = self.substrate.name(),
            latency_ms,
            answer = extracted_answer.as_deref().unwrap_or("<none>"),
            "model call completed"
        );

        Ok(CallOutput {
            response_text,
            latency_ms,
            extracted_answer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::substrates::{MockResponse, MockSubstrate};

    fn executor(response: MockResponse) -> (CallExecutor, Arc<MockSubstrate>) {
        let mock = Arc::new(MockSubstrate::with_default_response(response));
        (CallExecutor::new(mock.clone()), mock)
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_extracts_answer() {
        let (executor, _) = executor(
            MockResponse::success("  Let me think.\nFinal Answer: 12  \n")
                .with_latency(Duration::from_millis(250)),
        );

        let output = executor
            .execute(
                &ModelRef::default(),
                "prompt".to_string(),
                None,
                &CancellationToken::new(),
                None,
            )
            .await
            .expect("call should succeed");

        assert_eq!(output.response_text, "Let me think.\nFinal Answer: 12");
        assert_eq!(output.extracted_answer.as_deref(), Some("12"));
        assert!(output.latency_ms >= 250);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_output_is_call_error() {
        let (executor, _) = executor(MockResponse::success("   \n"));
        let err = executor
            .execute(
                &ModelRef::default(),
                "prompt".to_string(),
                None,
                &CancellationToken::new(),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RsaError::Call(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_dispatch() {
        let (executor, mock) = executor(MockResponse::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = executor
            .execute(&ModelRef::default(), "p".to_string(), None, &cancel, None)
            .await
            .unwrap_err();
        assert!(err.is_aborted());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_propagates() {
        let (executor, _) =
            executor(MockResponse::default().with_latency(Duration::from_secs(60)));
        let err = executor
            .execute(
                &ModelRef::default(),
                "p".to_string(),
                Some(Duration::from_secs(5)),
                &CancellationToken::new(),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RsaError::Timeout { timeout_ms: 5000 }));
    }
}
