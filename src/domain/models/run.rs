//! The durable output of a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::config::RunConfig;
use super::trace::{SelectionMethod, StepTrace};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub final_candidate_text: String,
    pub final_answer: Option<String>,
    pub selected_by: SelectionMethod,
    pub selected_index: usize,
    pub selected_votes: usize,
    pub total_calls: usize,
    pub total_duration_ms: u64,
    pub calls_per_second: f64,
    pub step_traces: Vec<StepTrace>,
    pub config: RunConfig,
}

/// Calls per second over a wall-clock duration; zero for an empty duration.
pub fn calls_per_second(calls: usize, duration_ms: u64) -> f64 {
    if duration_ms == 0 {
        return 0.0;
    }
    calls as f64 * 1000.0 / duration_ms as f64
}
