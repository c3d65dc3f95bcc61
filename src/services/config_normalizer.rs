//! Resolves raw overrides into an immutable `RunConfig`.
//!
//! Each integer field is validated on its own: a value that is not an integer
//! or falls outside the field's bounds is rejected and the field's default is
//! used instead. Rejections are returned alongside the config. Cross-field
//! constraints (`K <= N`, the total-call cap) are hard errors.

use serde_json::Value;

use crate::domain::errors::ConfigError;
use crate::domain::models::config::{
    FieldBounds, AGGREGATION_SIZE, MAX_TOTAL_CALLS, PARALLELISM, POPULATION_SIZE, STABLE_CAPS,
    STEPS, TIMEOUT_MS,
};
use crate::domain::models::{ConfigOverrides, EngineProfile, RunConfig, TraceMode};

/// Output of normalization: the config plus any per-field rejections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedConfig {
    pub config: RunConfig,
    pub rejections: Vec<ConfigError>,
}

/// Normalize `overrides` under `profile`.
pub fn normalize(
    overrides: &ConfigOverrides,
    profile: EngineProfile,
) -> Result<NormalizedConfig, ConfigError> {
    let mut rejections = Vec::new();
    let mut field = |value: Option<&Value>, bounds: FieldBounds| {
        resolve_integer(value, bounds).unwrap_or_else(|err| {
            rejections.push(err);
            bounds.default
        })
    };

    let mut population_size = field(overrides.population_size.as_ref(), POPULATION_SIZE) as usize;
    let mut aggregation_size =
        field(overrides.aggregation_size.as_ref(), AGGREGATION_SIZE) as usize;
    let mut steps = field(overrides.steps.as_ref(), STEPS) as usize;
    let mut parallelism = field(overrides.parallelism.as_ref(), PARALLELISM) as usize;
    let mut timeout_ms = if overrides.disable_timeout || is_zero(overrides.timeout_ms.as_ref()) {
        0
    } else {
        field(overrides.timeout_ms.as_ref(), TIMEOUT_MS)
    };

    let mut trace_mode = match resolve_trace_mode(overrides.trace_mode.as_ref()) {
        Ok(mode) => mode,
        Err(err) => {
            rejections.push(err);
            TraceMode::default()
        }
    };

    for rejection in &rejections {
        tracing::warn!(error = %rejection, "rejected run parameter, using default");
    }

    if aggregation_size > population_size {
        return Err(ConfigError::AggregationExceedsPopulation {
            k: aggregation_size,
            n: population_size,
        });
    }

    let cap = if profile.stable_profile {
        population_size = population_size.min(STABLE_CAPS.population_size);
        aggregation_size = aggregation_size
            .min(STABLE_CAPS.aggregation_size)
            .min(population_size);
        steps = steps.min(STABLE_CAPS.steps);
        parallelism = parallelism.min(STABLE_CAPS.parallelism);
        if trace_mode == TraceMode::Verbose {
            trace_mode = TraceMode::Summary;
        }
        if timeout_ms == 0 {
            timeout_ms = TIMEOUT_MS.default;
        }
        STABLE_CAPS.total_calls
    } else {
        MAX_TOTAL_CALLS
    };

    parallelism = parallelism.min(population_size);

    let total = population_size * steps;
    if total > cap {
        return Err(ConfigError::TotalCallsExceeded { total, cap });
    }

    Ok(NormalizedConfig {
        config: RunConfig {
            population_size,
            aggregation_size,
            steps,
            timeout_ms,
            parallelism,
            trace_mode,
            stable_profile: profile.stable_profile,
            tolerate_call_failures: profile.tolerate_call_failures,
        },
        rejections,
    })
}

/// An explicit integer zero, which disables the per-call deadline.
fn is_zero(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Number(n)) => n.as_u64() == Some(0) || n.as_f64() == Some(0.0),
        Some(Value::String(s)) => s.trim().parse::<i64>() == Ok(0),
        _ => false,
    }
}

/// Resolve one integer field; `None` yields the default.
fn resolve_integer(value: Option<&Value>, bounds: FieldBounds) -> Result<u64, ConfigError> {
    let Some(value) = value else {
        return Ok(bounds.default);
    };

    let parsed = match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_u64()
                .map(|u| i64::try_from(u).unwrap_or(i64::MAX))
                .or_else(|| {
                    n.as_f64()
                        .filter(|f| f.is_finite() && f.fract() == 0.0)
                        .map(|f| f as i64)
                })
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    let Some(parsed) = parsed else {
        return Err(ConfigError::NotAnInteger {
            field: bounds.name,
            value: value.to_string(),
        });
    };

    match u64::try_from(parsed) {
        Ok(v) if (bounds.min..=bounds.max).contains(&v) => Ok(v),
        _ => Err(ConfigError::OutOfRange {
            field: bounds.name,
            value: parsed,
            min: bounds.min,
            max: bounds.max,
        }),
    }
}

fn resolve_trace_mode(value: Option<&Value>) -> Result<TraceMode, ConfigError> {
    match value {
        None => Ok(TraceMode::default()),
        Some(Value::String(s)) => {
            TraceMode::parse(s).ok_or_else(|| ConfigError::InvalidTraceMode(s.clone()))
        }
        Some(other) => Err(ConfigError::InvalidTraceMode(other.to_string())),
    }
}
