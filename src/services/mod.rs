pub mod aggregation_driver;
pub mod answer_extractor;
pub mod bounded_mapper;
pub mod call_executor;
pub mod config_normalizer;
pub mod final_selector;
pub mod prompt_builder;
pub mod run_context;
pub mod stream_buffer;
pub mod subset_sampler;

pub use aggregation_driver::RsaEngine;
pub use answer_extractor::{extract_answer, normalize_answer};
pub use bounded_mapper::{map_with_concurrency, try_map_with_concurrency};
pub use call_executor::CallExecutor;
pub use config_normalizer::{normalize, NormalizedConfig};
pub use final_selector::{select, tally_votes, VoteBucket};
pub use run_context::RunContext;
pub use subset_sampler::sample;
