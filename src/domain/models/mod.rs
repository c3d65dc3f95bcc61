pub mod candidate;
pub mod config;
pub mod progress;
pub mod run;
pub mod substrate;
pub mod trace;

pub use candidate::{Candidate, Population};
pub use config::{ConfigOverrides, EngineProfile, RunConfig, TraceMode};
pub use progress::ProgressEvent;
pub use run::RunResult;
pub use substrate::{
    CallOutput, CallRequest, ChunkSink, ModelRef, SubstrateType, ThinkingLevel,
};
pub use trace::{Phase, SelectionMethod, SelectionResult, StepTrace};
