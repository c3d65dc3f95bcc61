//! Progress rendering with indicatif.
//!
//! [`RunProgress`] turns engine progress events into a single bar of
//! completed calls. Phase summaries are printed above the bar as they finish.

use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

use crate::domain::models::ProgressEvent;
use crate::domain::ports::ProgressSink;

const PROGRESS_TEMPLATE: &str =
    "{prefix:.bold} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}";

const PROGRESS_CHARS: &str = "█▓▒░ ";

/// Create a progress bar over `total` calls.
pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(PROGRESS_TEMPLATE)
            .expect("Invalid progress bar template")
            .progress_chars(PROGRESS_CHARS),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Extension trait for common progress bar endings
pub trait ProgressBarExt {
    /// Finish with a success message (green checkmark)
    fn finish_success(&self, message: impl Into<String>);

    /// Finish with an error message (red X)
    fn finish_error(&self, message: impl Into<String>);
}

impl ProgressBarExt for ProgressBar {
    fn finish_success(&self, message: impl Into<String>) {
        self.finish_with_message(format!("{} {}", style("✓").green(), message.into()));
    }

    fn finish_error(&self, message: impl Into<String>) {
        self.abandon_with_message(format!("{} {}", style("✗").red(), message.into()));
    }
}

/// Progress sink that draws on a terminal bar.
pub struct RunProgress {
    bar: ProgressBar,
}

impl RunProgress {
    /// Bar drawn on stderr.
    pub fn new() -> Self {
        Self {
            bar: create_progress_bar(0),
        }
    }

    /// Bar that never draws; state is still tracked.
    pub fn hidden() -> Self {
        let bar = create_progress_bar(0);
        bar.set_draw_target(ProgressDrawTarget::hidden());
        Self { bar }
    }

    pub fn bar(&self) -> &ProgressBar {
        &self.bar
    }
}

impl Default for RunProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for RunProgress {
    fn emit(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::RunStart { total_calls, .. } => {
                self.bar.set_length(total_calls as u64);
                self.bar.set_position(0);
            }
            ProgressEvent::StepStart {
                phase,
                step,
                total_steps,
                calls,
            } => {
                self.bar.set_prefix(format!("step {step}/{total_steps}"));
                self.bar.set_message(format!("{phase}: {calls} calls"));
            }
            ProgressEvent::CallStart {
                index,
                launched_calls,
                total_calls,
                ..
            } => {
                self.bar.set_message(format!(
                    "launched #{index} ({launched_calls}/{total_calls})"
                ));
            }
            ProgressEvent::Heartbeat {
                completed_calls,
                in_flight,
                preview,
                ..
            } => {
                self.bar.set_position(completed_calls as u64);
                match preview {
                    Some(text) => self.bar.set_message(text),
                    None => self.bar.set_message(format!("{in_flight} in flight")),
                }
            }
            ProgressEvent::CallDone {
                completed_calls,
                latency_ms,
                preview,
                ..
            } => {
                self.bar.set_position(completed_calls as u64);
                let answer = preview.unwrap_or_else(|| "no answer".to_string());
                self.bar.set_message(format!("{answer} ({latency_ms}ms)"));
            }
            ProgressEvent::StepDone { phase, step, trace } => {
                let top = trace.top_answer.as_deref().unwrap_or("-");
                let mut line = format!(
                    "{} step {step} {phase}: {} calls in {}ms, {} unique, top {} ({} votes)",
                    style("•").cyan(),
                    trace.call_count,
                    trace.duration_ms,
                    trace.unique_answers,
                    style(top).bold(),
                    trace.top_votes,
                );
                if trace.failed_calls > 0 {
                    line.push_str(&format!(
                        ", {}",
                        style(format!("{} degraded", trace.failed_calls)).yellow()
                    ));
                }
                self.bar.println(line);
            }
        }
    }
}
