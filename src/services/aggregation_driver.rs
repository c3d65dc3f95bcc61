//! Recursive self-aggregation engine.
//!
//! A run is a sequence of `T` phases over a fixed-size population:
//!
//! 1. **Seed** (step 1): `N` independent calls, one per candidate slot.
//! 2. **Aggregate** (steps 2..=T): for every output slot `i`, sample `K`
//!    candidates of the previous population at offset `step + i` and ask the
//!    model to merge them into one improved candidate.
//!
//! The final population is reduced to a single answer by majority vote.
//!
//! Each phase runs under a child [`CancellationToken`] of the run token. In
//! fail-fast mode the first failing call cancels the phase token, which stops
//! new launches and terminates sibling calls that are still running.

use chrono::Utc;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument};

use crate::domain::errors::{RsaError, RsaResult};
use crate::domain::models::run::calls_per_second;
use crate::domain::models::{
    Candidate, CallOutput, ChunkSink, ConfigOverrides, EngineProfile, ModelRef, Phase,
    Population, ProgressEvent, RunConfig, RunResult, StepTrace, TraceMode,
};
use crate::domain::ports::{NullProgress, ProgressSink, Substrate};
use crate::services::bounded_mapper::{map_with_concurrency, try_map_with_concurrency};
use crate::services::call_executor::CallExecutor;
use crate::services::config_normalizer::normalize;
use crate::services::final_selector::{select, tally_votes, top_bucket};
use crate::services::prompt_builder::{build_aggregate, build_seed};
use crate::services::run_context::{crosses_decile, RunContext, SUMMARY_HEARTBEAT_INTERVAL};
use crate::services::stream_buffer::{preview, LineBuffer};
use crate::services::subset_sampler::sample;

/// Turns one call's streamed output into throttled heartbeats.
struct StreamTap {
    reporter: Reporter,
    ctx: Arc<RunContext>,
    phase: Phase,
    step: usize,
    buffer: Mutex<LineBuffer>,
}

impl StreamTap {
    fn sink(self: &Arc<Self>) -> ChunkSink {
        let tap = Arc::clone(self);
        Arc::new(move |chunk: &str| {
            let lines = tap.lock().push(chunk);
            if let Some(line) = lines.last() {
                tap.beat(line);
            }
        })
    }

    /// Report the trailing partial line once the stream has ended.
    fn finish(&self) {
        let tail = self.lock().finish();
        if let Some(line) = tail {
            self.beat(&line);
        }
    }

    fn beat(&self, line: &str) {
        if self.ctx.try_heartbeat() {
            self.reporter
                .heartbeat(self.phase, self.step, &self.ctx, Some(preview(line)));
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LineBuffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drives populations of model calls through seed and aggregation phases.
#[derive(Clone)]
pub struct RsaEngine {
    executor: CallExecutor,
}

/// Borrowed state shared by every call of one run.
struct RunScope<'a> {
    config: &'a RunConfig,
    model: &'a ModelRef,
    cancel: &'a CancellationToken,
    ctx: Arc<RunContext>,
    reporter: Reporter,
}

/// Emits progress events filtered by trace mode.
#[derive(Clone)]
struct Reporter {
    sink: Arc<dyn ProgressSink>,
    mode: TraceMode,
}

impl Reporter {
    fn emit(&self, event: ProgressEvent) {
        if self.mode != TraceMode::Off {
            self.sink.emit(event);
        }
    }

    fn verbose(&self) -> bool {
        self.mode == TraceMode::Verbose
    }

    fn heartbeat(&self, phase: Phase, step: usize, ctx: &RunContext, preview: Option<String>) {
        let counters = ctx.counters();
        self.emit(ProgressEvent::Heartbeat {
            phase,
            step,
            completed_calls: counters.completed,
            total_calls: counters.total,
            in_flight: counters.in_flight,
            elapsed_ms: ctx.elapsed_ms(),
            preview,
        });
    }

    /// Streamed-output heartbeats, verbose mode only.
    fn stream_tap(
        &self,
        phase: Phase,
        step: usize,
        ctx: &Arc<RunContext>,
    ) -> Option<Arc<StreamTap>> {
        self.verbose().then(|| {
            Arc::new(StreamTap {
                reporter: self.clone(),
                ctx: Arc::clone(ctx),
                phase,
                step,
                buffer: Mutex::new(LineBuffer::default()),
            })
        })
    }

    /// Await `work`, sampling a heartbeat every couple of seconds in summary mode.
    async fn with_heartbeats<F: Future>(
        &self,
        phase: Phase,
        step: usize,
        ctx: &RunContext,
        work: F,
    ) -> F::Output {
        if self.mode != TraceMode::Summary {
            return work.await;
        }

        tokio::pin!(work);
        let mut ticker = tokio::time::interval_at(
            Instant::now() + SUMMARY_HEARTBEAT_INTERVAL,
            SUMMARY_HEARTBEAT_INTERVAL,
        );
        loop {
            tokio::select! {
                biased;
                output = &mut work => return output,
                _ = ticker.tick() => self.heartbeat(phase, step, ctx, None),
            }
        }
    }
}

impl RsaEngine {
    pub fn new(substrate: Arc<dyn Substrate>) -> Self {
        Self {
            executor: CallExecutor::new(substrate),
        }
    }

    /// Normalize `overrides` and run. Per-field rejections are logged, not returned.
    pub async fn run_with_overrides(
        &self,
        question: &str,
        overrides: &ConfigOverrides,
        profile: EngineProfile,
        model: &ModelRef,
        cancel: Option<CancellationToken>,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> RsaResult<RunResult> {
        let normalized = normalize(overrides, profile)?;
        self.run(question, &normalized.config, model, cancel, progress)
            .await
    }

    /// Run the full seed, aggregate, select cycle for `question`.
    ///
    /// `config` is expected to be normalized already.
    pub async fn run(
        &self,
        question: &str,
        config: &RunConfig,
        model: &ModelRef,
        cancel: Option<CancellationToken>,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> RsaResult<RunResult> {
        let ctx = Arc::new(RunContext::new(config.total_calls()));
        let span = tracing::info_span!(
            "rsa_run",
            run_id = %ctx.run_id(),
            substrate = self.executor.substrate_name(),
            model = %model.id,
        );
        let cancel = cancel.unwrap_or_default();
        let scope = RunScope {
            config,
            model,
            cancel: &cancel,
            reporter: Reporter {
                sink: progress.unwrap_or_else(|| Arc::new(NullProgress)),
                mode: config.trace_mode,
            },
            ctx,
        };

        self.run_scoped(question, &scope).instrument(span).await
    }

    async fn run_scoped(&self, question: &str, run: &RunScope<'_>) -> RsaResult<RunResult> {
        let config = run.config;
        let started_at = Utc::now();
        let started = Instant::now();

        info!(
            population_size = config.population_size,
            aggregation_size = config.aggregation_size,
            steps = config.steps,
            parallelism = config.parallelism,
            total_calls = config.total_calls(),
            "starting run"
        );
        run.reporter.emit(ProgressEvent::RunStart {
            total_calls: config.total_calls(),
            population_size: config.population_size,
            aggregation_size: config.aggregation_size,
            steps: config.steps,
            parallelism: config.parallelism,
        });

        let mut population = Population::default();
        let mut step_traces = Vec::with_capacity(config.steps);

        for step in 1..=config.steps {
            if run.cancel.is_cancelled() {
                info!(step, "run cancelled before phase");
                return Err(RsaError::Aborted);
            }

            let phase = Phase::for_step(step);
            let prompts = phase_prompts(question, config, phase, step, &population);
            let (next, trace) = self
                .run_phase(run, phase, step, &prompts, &population)
                .await?;

            run.reporter.emit(ProgressEvent::StepDone {
                phase,
                step,
                trace: trace.clone(),
            });
            step_traces.push(trace);
            population = next;
        }

        let selection = select(&population);
        let final_candidate = population
            .get(selection.index)
            .cloned()
            .unwrap_or_else(Candidate::empty);

        let total_duration_ms = started.elapsed().as_millis() as u64;
        let total_calls = run.ctx.counters().launched;

        info!(
            method = selection.method.as_str(),
            index = selection.index,
            votes = selection.votes,
            answer = selection.answer.as_deref().unwrap_or("<none>"),
            total_calls,
            total_duration_ms,
            "run completed"
        );

        Ok(RunResult {
            run_id: run.ctx.run_id(),
            started_at,
            final_candidate_text: final_candidate.raw_text,
            final_answer: selection.answer,
            selected_by: selection.method,
            selected_index: selection.index,
            selected_votes: selection.votes,
            total_calls,
            total_duration_ms,
            calls_per_second: calls_per_second(total_calls, total_duration_ms),
            step_traces,
            config: config.clone(),
        })
    }

    async fn run_phase(
        &self,
        run: &RunScope<'_>,
        phase: Phase,
        step: usize,
        prompts: &[String],
        previous: &Population,
    ) -> RsaResult<(Population, StepTrace)> {
        let config = run.config;
        info!(phase = phase.as_str(), step, calls = prompts.len(), "phase started");
        run.reporter.emit(ProgressEvent::StepStart {
            phase,
            step,
            total_steps: config.steps,
            calls: prompts.len(),
        });

        let phase_started = Instant::now();
        let phase_cancel = run.cancel.child_token();

        let outcomes: Vec<RsaResult<CallOutput>> = if config.tolerate_call_failures {
            let work = map_with_concurrency(prompts, config.parallelism, |prompt: &String, index| {
                self.call_slot(run, phase, step, index, prompt.clone(), &phase_cancel)
            });
            run.reporter
                .with_heartbeats(phase, step, &run.ctx, work)
                .await
        } else {
            let work = try_map_with_concurrency(prompts, config.parallelism, |prompt: &String, index| {
                self.fail_fast_slot(run, phase, step, index, prompt.clone(), &phase_cancel)
            });
            run.reporter
                .with_heartbeats(phase, step, &run.ctx, work)
                .await?
                .into_iter()
                .map(Ok)
                .collect()
        };

        // Cancellation mid-phase discards whatever the phase produced.
        if run.cancel.is_cancelled() {
            info!(phase = phase.as_str(), step, "run cancelled during phase");
            return Err(RsaError::Aborted);
        }

        let mut candidates = Vec::with_capacity(outcomes.len());
        let mut latencies = Vec::with_capacity(outcomes.len());
        let mut first_error = None;
        for (index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(output) => {
                    latencies.push(output.latency_ms);
                    candidates.push(Candidate::new(output.response_text, output.extracted_answer));
                }
                Err(err) if err.is_aborted() => return Err(err),
                Err(err) => {
                    first_error.get_or_insert(err);
                    candidates.push(previous.get(index).cloned().unwrap_or_else(Candidate::empty));
                }
            }
        }

        if latencies.is_empty() {
            if let Some(err) = first_error {
                warn!(phase = phase.as_str(), step, error = %err, "every call in phase failed");
                return Err(err);
            }
        }

        let failed_calls = candidates.len() - latencies.len();
        if failed_calls > 0 {
            warn!(
                phase = phase.as_str(),
                step,
                failed_calls,
                "phase completed with degraded candidates"
            );
        }

        let population = Population::new(candidates);
        let trace = build_trace(
            phase,
            step,
            phase_started.elapsed().as_millis() as u64,
            &latencies,
            failed_calls,
            &population,
        );
        info!(
            phase = phase.as_str(),
            step,
            duration_ms = trace.duration_ms,
            unique_answers = trace.unique_answers,
            top_votes = trace.top_votes,
            "phase completed"
        );

        Ok((population, trace))
    }

    /// A call whose failure cancels the rest of its phase.
    async fn fail_fast_slot(
        &self,
        run: &RunScope<'_>,
        phase: Phase,
        step: usize,
        index: usize,
        prompt: String,
        phase_cancel: &CancellationToken,
    ) -> RsaResult<CallOutput> {
        let result = self
            .call_slot(run, phase, step, index, prompt, phase_cancel)
            .await;
        if result.is_err() {
            phase_cancel.cancel();
        }
        result
    }

    async fn call_slot(
        &self,
        run: &RunScope<'_>,
        phase: Phase,
        step: usize,
        index: usize,
        prompt: String,
        phase_cancel: &CancellationToken,
    ) -> RsaResult<CallOutput> {
        if phase_cancel.is_cancelled() {
            return Err(RsaError::Aborted);
        }

        let launched_calls = run.ctx.call_launched();
        if run.reporter.verbose() {
            run.reporter.emit(ProgressEvent::CallStart {
                phase,
                step,
                index,
                launched_calls,
                total_calls: run.ctx.total_calls(),
            });
        }

        let tap = run.reporter.stream_tap(phase, step, &run.ctx);
        let result = self
            .executor
            .execute(
                run.model,
                prompt,
                run.config.timeout(),
                phase_cancel,
                tap.as_ref().map(StreamTap::sink),
            )
            .await;
        if let Some(tap) = &tap {
            tap.finish();
        }

        match &result {
            Ok(output) => {
                let completed_calls = run.ctx.call_settled();
                let total_calls = run.ctx.total_calls();
                let report = match run.reporter.mode {
                    TraceMode::Verbose => true,
                    TraceMode::Summary => crosses_decile(completed_calls, total_calls),
                    TraceMode::Off => false,
                };
                if report {
                    run.reporter.emit(ProgressEvent::CallDone {
                        phase,
                        step,
                        index,
                        completed_calls,
                        total_calls,
                        latency_ms: output.latency_ms,
                        preview: output.extracted_answer.as_deref().map(preview),
                    });
                }
            }
            Err(err) => {
                run.ctx.call_dropped();
                if !err.is_aborted() {
                    warn!(
                        phase = phase.as_str(),
                        step,
                        index,
                        kind = err.kind(),
                        error = %err,
                        "model call failed"
                    );
                }
            }
        }

        result
    }
}

fn phase_prompts(
    question: &str,
    config: &RunConfig,
    phase: Phase,
    step: usize,
    previous: &Population,
) -> Vec<String> {
    let n = config.population_size;
    match phase {
        Phase::Seed => (1..=n).map(|i| build_seed(question, i, n)).collect(),
        Phase::Aggregate => (0..n)
            .map(|output_index| {
                let offset = i64::try_from(step + output_index).unwrap_or(i64::MAX);
                let subset = sample(previous.len(), config.aggregation_size, offset);
                build_aggregate(question, &previous.texts_at(&subset), step, config.steps)
            })
            .collect(),
    }
}

fn build_trace(
    phase: Phase,
    step: usize,
    duration_ms: u64,
    latencies: &[u64],
    failed_calls: usize,
    population: &Population,
) -> StepTrace {
    let buckets = tally_votes(population.answers());
    let top = top_bucket(&buckets);
    let avg_call_ms = if latencies.is_empty() {
        0
    } else {
        latencies.iter().sum::<u64>() / latencies.len() as u64
    };

    StepTrace {
        phase,
        step,
        duration_ms,
        call_count: latencies.len() + failed_calls,
        failed_calls,
        avg_call_ms,
        min_call_ms: latencies.iter().copied().min().unwrap_or(0),
        max_call_ms: latencies.iter().copied().max().unwrap_or(0),
        unique_answers: buckets.len(),
        top_answer: top.map(|b| b.display.clone()),
        top_votes: top.map_or(0, |b| b.votes),
    }
}
