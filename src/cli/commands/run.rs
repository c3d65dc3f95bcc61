//! Implementation of the `rsa run` command.

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use serde::Serialize;
use std::io::Read;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::adapters::substrates::SubstrateRegistry;
use crate::cli::output::{output, CommandOutput, ProgressBarExt, RunProgress};
use crate::domain::errors::RsaError;
use crate::domain::models::{
    ConfigOverrides, EngineProfile, ModelRef, RunResult, SubstrateType, ThinkingLevel, TraceMode,
};
use crate::domain::ports::ProgressSink;
use crate::infrastructure::config::Settings;
use crate::services::{normalize, RsaEngine};

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Question to answer; `-` reads it from stdin
    pub question: String,

    /// Population size (N)
    #[arg(short = 'n', long = "population")]
    pub population: Option<i64>,

    /// Candidates merged per aggregation call (K)
    #[arg(short = 'k', long = "aggregation")]
    pub aggregation: Option<i64>,

    /// Number of phases including the seed phase (T)
    #[arg(short = 't', long = "steps")]
    pub steps: Option<i64>,

    /// Maximum concurrent calls (P)
    #[arg(short = 'p', long = "parallel")]
    pub parallel: Option<i64>,

    /// Per-call timeout in milliseconds
    #[arg(long, conflicts_with = "no_timeout")]
    pub timeout_ms: Option<i64>,

    /// Disable the per-call timeout
    #[arg(long)]
    pub no_timeout: bool,

    /// Progress detail: off, summary or verbose
    #[arg(long)]
    pub trace: Option<String>,

    /// Model provider
    #[arg(long)]
    pub provider: Option<String>,

    /// Model id
    #[arg(long)]
    pub model: Option<String>,

    /// Thinking level: off, minimal, low, medium, high
    #[arg(long, value_parser = parse_thinking)]
    pub thinking: Option<ThinkingLevel>,

    /// Clamp parameters to the conservative stable profile
    #[arg(long)]
    pub stable: bool,

    /// Keep going when individual calls fail
    #[arg(long)]
    pub tolerate_failures: bool,

    /// Use the mock substrate instead of spawning the model CLI
    #[arg(long)]
    pub mock: bool,
}

impl RunArgs {
    /// Overrides given on the command line; unset flags stay unset.
    pub fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::default();
        if let Some(n) = self.population {
            overrides = overrides.with_population_size(n);
        }
        if let Some(k) = self.aggregation {
            overrides = overrides.with_aggregation_size(k);
        }
        if let Some(t) = self.steps {
            overrides = overrides.with_steps(t);
        }
        if let Some(p) = self.parallel {
            overrides = overrides.with_parallelism(p);
        }
        if let Some(ms) = self.timeout_ms {
            overrides = overrides.with_timeout_ms(ms);
        }
        if let Some(ref mode) = self.trace {
            overrides = overrides.with_trace_mode(mode.as_str());
        }
        if self.no_timeout {
            overrides = overrides.without_timeout();
        }
        overrides
    }

    pub fn profile(&self, base: EngineProfile) -> EngineProfile {
        EngineProfile {
            stable_profile: base.stable_profile || self.stable,
            tolerate_call_failures: base.tolerate_call_failures || self.tolerate_failures,
        }
    }

    pub fn model_ref(&self, base: ModelRef) -> ModelRef {
        ModelRef {
            provider: self.provider.clone().unwrap_or(base.provider),
            id: self.model.clone().unwrap_or(base.id),
            thinking_level: self.thinking.unwrap_or(base.thinking_level),
        }
    }

    fn resolve_question(&self) -> Result<String> {
        let question = if self.question == "-" {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read question from stdin")?;
            buf
        } else {
            self.question.clone()
        };

        let question = question.trim().to_string();
        if question.is_empty() {
            anyhow::bail!("Question cannot be empty");
        }
        Ok(question)
    }
}

fn parse_thinking(s: &str) -> Result<ThinkingLevel, String> {
    ThinkingLevel::from_str(s)
        .ok_or_else(|| format!("unknown thinking level '{s}' (off, minimal, low, medium, high)"))
}

#[derive(Debug, Serialize)]
pub struct RunOutput {
    #[serde(flatten)]
    pub result: RunResult,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let r = &self.result;
        let answer = r.final_answer.as_deref().unwrap_or("(no answer extracted)");
        let mut lines = vec![
            r.final_candidate_text.clone(),
            String::new(),
            format!("{} {}", style("Final answer:").bold(), style(answer).green().bold()),
            format!(
                "Selected candidate #{} by {} ({} votes)",
                r.selected_index,
                r.selected_by.as_str(),
                r.selected_votes
            ),
            format!(
                "{} calls in {:.1}s ({:.2} calls/s), run {}",
                r.total_calls,
                r.total_duration_ms as f64 / 1000.0,
                r.calls_per_second,
                r.run_id
            ),
        ];
        for trace in &r.step_traces {
            lines.push(style(format!(
                "  step {} {}: {}ms, avg call {}ms, {} unique, top {} ({} votes)",
                trace.step,
                trace.phase,
                trace.duration_ms,
                trace.avg_call_ms,
                trace.unique_answers,
                trace.top_answer.as_deref().unwrap_or("-"),
                trace.top_votes
            ))
            .dim()
            .to_string());
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: RunArgs, settings: Settings, json_mode: bool) -> Result<()> {
    let question = args.resolve_question()?;
    let overrides = settings.run.clone().merged_with(args.overrides());
    let normalized =
        normalize(&overrides, args.profile(settings.engine)).map_err(RsaError::from)?;
    let config = normalized.config;
    let model = args.model_ref(settings.model.clone());

    let kind = if args.mock {
        SubstrateType::Mock
    } else {
        settings.substrate.kind
    };
    let substrate = SubstrateRegistry::new()
        .with_process_config(settings.substrate.process.clone())
        .create_by_type(kind);
    let engine = RsaEngine::new(substrate);

    let cancel = CancellationToken::new();
    let ctrl_c = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling run");
                cancel.cancel();
            }
        }
    });

    let progress = (!json_mode && config.trace_mode != TraceMode::Off)
        .then(|| Arc::new(RunProgress::new()));
    let sink = progress
        .clone()
        .map(|p| -> Arc<dyn ProgressSink> { p });

    let result = engine
        .run(&question, &config, &model, Some(cancel), sink)
        .await;
    ctrl_c.abort();

    if let Some(progress) = progress {
        match &result {
            Ok(r) => progress.bar().finish_success(format!(
                "{} calls, answer {}",
                r.total_calls,
                r.final_answer.as_deref().unwrap_or("-")
            )),
            Err(err) => progress.bar().finish_error(err.to_string()),
        }
    }

    output(&RunOutput { result: result? }, json_mode);
    Ok(())
}
