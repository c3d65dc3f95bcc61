//! Progress events emitted to an external reporter.

use serde::{Deserialize, Serialize};

use super::trace::{Phase, StepTrace};

/// Transient progress notification. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    RunStart {
        total_calls: usize,
        population_size: usize,
        aggregation_size: usize,
        steps: usize,
        parallelism: usize,
    },
    StepStart {
        phase: Phase,
        step: usize,
        total_steps: usize,
        calls: usize,
    },
    Heartbeat {
        phase: Phase,
        step: usize,
        completed_calls: usize,
        total_calls: usize,
        in_flight: usize,
        elapsed_ms: u64,
        preview: Option<String>,
    },
    CallStart {
        phase: Phase,
        step: usize,
        index: usize,
        launched_calls: usize,
        total_calls: usize,
    },
    CallDone {
        phase: Phase,
        step: usize,
        index: usize,
        completed_calls: usize,
        total_calls: usize,
        latency_ms: u64,
        preview: Option<String>,
    },
    StepDone {
        phase: Phase,
        step: usize,
        trace: StepTrace,
    },
}

impl ProgressEvent {
    /// Tag of the variant, as serialized.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::RunStart { .. } => "run_start",
            Self::StepStart { .. } => "step_start",
            Self::Heartbeat { .. } => "heartbeat",
            Self::CallStart { .. } => "call_start",
            Self::CallDone { .. } => "call_done",
            Self::StepDone { .. } => "step_done",
        }
    }
}
