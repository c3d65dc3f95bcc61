//! Substrate domain models.
//!
//! A substrate is the backend that performs one model call. The primary
//! substrate is an external CLI process; a mock substrate exists for tests
//! and dry runs.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Type of substrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubstrateType {
    /// External CLI process
    #[default]
    Process,
    /// Scripted mock
    Mock,
}

impl SubstrateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Process => "process",
            Self::Mock => "mock",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "process" | "cli" => Some(Self::Process),
            "mock" | "test" => Some(Self::Mock),
            _ => None,
        }
    }
}

/// Reasoning effort requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingLevel {
    Off,
    Minimal,
    Low,
    #[default]
    Medium,
    High,
}

impl ThinkingLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Minimal => "minimal",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "off" | "none" => Some(Self::Off),
            "minimal" => Some(Self::Minimal),
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Which model to call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelRef {
    pub provider: String,
    pub id: String,
    pub thinking_level: ThinkingLevel,
}

impl Default for ModelRef {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            id: "claude-sonnet-4-5".to_string(),
            thinking_level: ThinkingLevel::default(),
        }
    }
}

impl ModelRef {
    pub fn new(provider: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            id: id.into(),
            thinking_level: ThinkingLevel::default(),
        }
    }

    pub fn with_thinking(mut self, level: ThinkingLevel) -> Self {
        self.thinking_level = level;
        self
    }
}

/// One model invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub model: ModelRef,
    pub prompt: String,
    /// No deadline when `None`.
    pub timeout: Option<Duration>,
}

impl CallRequest {
    pub fn new(model: ModelRef, prompt: impl Into<String>) -> Self {
        Self {
            model,
            prompt: prompt.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout.map_or(0, |t| t.as_millis() as u64)
    }
}

/// Successful result of one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutput {
    pub response_text: String,
    pub latency_ms: u64,
    pub extracted_answer: Option<String>,
}

/// Receives raw output chunks as they stream in.
pub type ChunkSink = Arc<dyn Fn(&str) + Send + Sync>;
