//! Port trait definitions (Hexagonal Architecture)
//!
//! - Substrate: performs a single model call
//! - ProgressSink: consumes progress events
//!
//! These traits let the engine stay independent of the process runner and of
//! whatever renders progress.

pub mod progress;
pub mod substrate;

pub use progress::{ChannelProgress, NullProgress, ProgressSink};
pub use substrate::Substrate;
