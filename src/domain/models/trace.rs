//! Per-phase statistics and the final selection.

use serde::{Deserialize, Serialize};

/// Which kind of phase produced a population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Seed,
    Aggregate,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seed => "seed",
            Self::Aggregate => "aggregate",
        }
    }

    /// Step 1 seeds the population; every later step aggregates.
    pub fn for_step(step: usize) -> Self {
        if step <= 1 {
            Self::Seed
        } else {
            Self::Aggregate
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statistics for one completed phase. Written once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepTrace {
    pub phase: Phase,
    pub step: usize,
    pub duration_ms: u64,
    pub call_count: usize,
    pub failed_calls: usize,
    pub avg_call_ms: u64,
    pub min_call_ms: u64,
    pub max_call_ms: u64,
    pub unique_answers: usize,
    pub top_answer: Option<String>,
    pub top_votes: usize,
}

/// How the final candidate was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    Majority,
    Deterministic,
}

impl SelectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Majority => "majority",
            Self::Deterministic => "deterministic",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub index: usize,
    pub method: SelectionMethod,
    pub answer: Option<String>,
    pub votes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_for_step() {
        assert_eq!(Phase::for_step(1), Phase::Seed);
        assert_eq!(Phase::for_step(2), Phase::Aggregate);
        assert_eq!(Phase::for_step(7).to_string(), "aggregate");
    }
}
