//! Run configuration models.
//!
//! `ConfigOverrides` is the loosely typed surface fed by a CLI or tool-call
//! layer; `RunConfig` is the resolved, immutable result of normalization.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Inclusive bounds and default for an integer run parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldBounds {
    pub name: &'static str,
    pub min: u64,
    pub max: u64,
    pub default: u64,
}

pub const POPULATION_SIZE: FieldBounds = FieldBounds {
    name: "populationSize",
    min: 1,
    max: 16,
    default: 4,
};

pub const AGGREGATION_SIZE: FieldBounds = FieldBounds {
    name: "aggregationSize",
    min: 1,
    max: 8,
    default: 2,
};

pub const STEPS: FieldBounds = FieldBounds {
    name: "steps",
    min: 1,
    max: 8,
    default: 3,
};

pub const TIMEOUT_MS: FieldBounds = FieldBounds {
    name: "timeoutMs",
    min: 1_000,
    max: 3_600_000,
    default: 300_000,
};

pub const PARALLELISM: FieldBounds = FieldBounds {
    name: "parallelism",
    min: 1,
    max: 16,
    default: 4,
};

/// Upper bound on `N * T` for a standard run.
pub const MAX_TOTAL_CALLS: usize = 96;

/// Caps applied when the stable profile is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StableCaps {
    pub population_size: usize,
    pub aggregation_size: usize,
    pub steps: usize,
    pub parallelism: usize,
    pub total_calls: usize,
}

pub const STABLE_CAPS: StableCaps = StableCaps {
    population_size: 6,
    aggregation_size: 3,
    steps: 4,
    parallelism: 1,
    total_calls: 24,
};

/// How much progress the engine reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceMode {
    Off,
    #[default]
    Summary,
    Verbose,
}

impl TraceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Summary => "summary",
            Self::Verbose => "verbose",
        }
    }

    /// Case-insensitive parse of the three literals.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "off" => Some(Self::Off),
            "summary" => Some(Self::Summary),
            "verbose" => Some(Self::Verbose),
            _ => None,
        }
    }
}

/// Engine-level switches chosen by the caller rather than per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineProfile {
    /// Clamp the run to the conservative `STABLE_CAPS`.
    pub stable_profile: bool,
    /// Keep going when individual calls fail, using a degraded candidate.
    pub tolerate_call_failures: bool,
}

/// Raw, unvalidated parameter overrides.
///
/// Values stay as JSON so that strings, floats and garbage can be rejected
/// field by field during normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    pub population_size: Option<Value>,
    pub aggregation_size: Option<Value>,
    pub steps: Option<Value>,
    pub timeout_ms: Option<Value>,
    pub disable_timeout: bool,
    pub parallelism: Option<Value>,
    pub trace_mode: Option<Value>,
}

impl ConfigOverrides {
    pub fn with_population_size(mut self, value: impl Into<Value>) -> Self {
        self.population_size = Some(value.into());
        self
    }

    pub fn with_aggregation_size(mut self, value: impl Into<Value>) -> Self {
        self.aggregation_size = Some(value.into());
        self
    }

    pub fn with_steps(mut self, value: impl Into<Value>) -> Self {
        self.steps = Some(value.into());
        self
    }

    pub fn with_timeout_ms(mut self, value: impl Into<Value>) -> Self {
        self.timeout_ms = Some(value.into());
        self
    }

    pub fn with_parallelism(mut self, value: impl Into<Value>) -> Self {
        self.parallelism = Some(value.into());
        self
    }

    pub fn with_trace_mode(mut self, value: impl Into<Value>) -> Self {
        self.trace_mode = Some(value.into());
        self
    }

    pub fn without_timeout(mut self) -> Self {
        self.disable_timeout = true;
        self
    }

    /// Layer `other` on top of `self`; set fields in `other` win.
    ///
    /// An explicit `timeout_ms` in `other` replaces a lower layer's `disable_timeout`.
    pub fn merged_with(self, other: Self) -> Self {
        let disable_timeout = if other.timeout_ms.is_some() {
            other.disable_timeout
        } else {
            self.disable_timeout || other.disable_timeout
        };
        Self {
            population_size: other.population_size.or(self.population_size),
            aggregation_size: other.aggregation_size.or(self.aggregation_size),
            steps: other.steps.or(self.steps),
            timeout_ms: other.timeout_ms.or(self.timeout_ms),
            disable_timeout,
            parallelism: other.parallelism.or(self.parallelism),
            trace_mode: other.trace_mode.or(self.trace_mode),
        }
    }
}

/// Fully resolved run parameters. Only produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub population_size: usize,
    pub aggregation_size: usize,
    pub steps: usize,
    /// Per-call deadline in milliseconds; 0 means no deadline.
    pub timeout_ms: u64,
    pub parallelism: usize,
    pub trace_mode: TraceMode,
    pub stable_profile: bool,
    pub tolerate_call_failures: bool,
}

impl RunConfig {
    pub fn total_calls(&self) -> usize {
        self.population_size * self.steps
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            population_size: POPULATION_SIZE.default as usize,
            aggregation_size: AGGREGATION_SIZE.default as usize,
            steps: STEPS.default as usize,
            timeout_ms: TIMEOUT_MS.default,
            parallelism: PARALLELISM.default as usize,
            trace_mode: TraceMode::default(),
            stable_profile: false,
            tolerate_call_failures: false,
        }
    }
}
