//! Substrate port - interface for model call backends.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::RsaResult;
use crate::domain::models::{CallRequest, ChunkSink};

/// Trait for substrate implementations.
///
/// A substrate performs exactly one model call per `invoke`. It owns the
/// call's deadline (`request.timeout`) and must honor `cancel`:
///
/// - deadline reached: stop the call and return `RsaError::Timeout`
/// - `cancel` fired: stop the call and return `RsaError::Aborted`
/// - non-zero exit or empty output: `RsaError::Call` with diagnostics
///
/// Raw output chunks are forwarded to `on_chunk` as they arrive.
#[async_trait]
pub trait Substrate: Send + Sync {
    /// Get the substrate type name.
    fn name(&self) -> &'static str;

    /// Run one call to completion and return its raw response text.
    async fn invoke(
        &self,
        request: CallRequest,
        cancel: CancellationToken,
        on_chunk: Option<ChunkSink>,
    ) -> RsaResult<String>;
}
