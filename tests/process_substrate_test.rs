//! Real-process tests for the CLI substrate, driven by shell scripts.

#![cfg(unix)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use rsa_engine::adapters::substrates::{CliProcessConfig, CliProcessSubstrate};
use rsa_engine::domain::models::{CallRequest, ChunkSink};
use rsa_engine::services::normalize;
use rsa_engine::{ConfigOverrides, EngineProfile, ModelRef, RsaEngine, RsaError, Substrate};

/// Write `body` as a shell script and build a substrate that runs it.
fn script_substrate(body: &str, kill_grace_ms: u64) -> (TempDir, CliProcessSubstrate) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path: PathBuf = dir.path().join("model.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");

    // Run through /bin/sh so the script needs no exec bit
    let substrate = CliProcessSubstrate::new(CliProcessConfig {
        binary_path: "/bin/sh".to_string(),
        base_args: vec![path.display().to_string()],
        kill_grace_ms,
        ..Default::default()
    });
    (dir, substrate)
}

fn request(prompt: &str) -> CallRequest {
    CallRequest::new(ModelRef::new("test-provider", "test-model"), prompt)
}

#[tokio::test]
async fn test_stdout_is_the_response() {
    let (_dir, substrate) = script_substrate(
        r#"for last; do :; done
printf 'thinking about: %s\n' "$last"
printf 'Final Answer: 4\n'"#,
        500,
    );

    let output = substrate
        .invoke(request("2+2?"), CancellationToken::new(), None)
        .await
        .expect("script should succeed");

    assert_eq!(output, "thinking about: 2+2?\nFinal Answer: 4\n");
}

#[tokio::test]
async fn test_model_flags_are_passed() {
    let (_dir, substrate) = script_substrate(r#"echo "$@""#, 500);

    let output = substrate
        .invoke(request("p"), CancellationToken::new(), None)
        .await
        .expect("script should succeed");

    assert_eq!(
        output.trim(),
        "--print --provider test-provider --model test-model --thinking medium p"
    );
}

#[tokio::test]
async fn test_nonzero_exit_reports_stderr() {
    let (_dir, substrate) = script_substrate("echo 'rate limited' >&2\nexit 3", 500);

    let err = substrate
        .invoke(request("p"), CancellationToken::new(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, RsaError::Call(ref msg) if msg == "rate limited"));
}

#[tokio::test]
async fn test_empty_stdout_is_call_error() {
    let (_dir, substrate) = script_substrate("exit 0", 500);

    let err = substrate
        .invoke(request("p"), CancellationToken::new(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, RsaError::Call(ref msg) if msg.contains("no output")));
}

#[tokio::test]
async fn test_timeout_terminates_process() {
    let (_dir, substrate) = script_substrate("sleep 30", 500);
    let started = Instant::now();

    let err = substrate
        .invoke(
            request("p").with_timeout(Some(Duration::from_millis(200))),
            CancellationToken::new(),
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, RsaError::Timeout { timeout_ms: 200 }));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_ignored_sigterm_escalates_to_sigkill() {
    // The ignored disposition is inherited by `sleep` as well
    let (_dir, substrate) = script_substrate("trap '' TERM\nsleep 30", 300);
    let started = Instant::now();

    let err = substrate
        .invoke(
            request("p").with_timeout(Some(Duration::from_millis(200))),
            CancellationToken::new(),
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, RsaError::Timeout { .. }));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(500), "grace delay was skipped");
    assert!(elapsed < Duration::from_secs(10), "process was not killed");
}

#[tokio::test]
async fn test_cancel_aborts_running_process() {
    let (_dir, substrate) = script_substrate("sleep 30", 500);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = substrate.invoke(request("p"), cancel, None).await.unwrap_err();

    assert!(err.is_aborted());
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_stdout_is_streamed_in_chunks() {
    let (_dir, substrate) = script_substrate("echo one\nsleep 0.1\necho two", 500);
    let seen = Arc::new(Mutex::new(String::new()));
    let sink_seen = seen.clone();
    let sink: ChunkSink = Arc::new(move |chunk: &str| sink_seen.lock().unwrap().push_str(chunk));

    let output = substrate
        .invoke(request("p"), CancellationToken::new(), Some(sink))
        .await
        .expect("script should succeed");

    assert_eq!(output, "one\ntwo\n");
    assert_eq!(*seen.lock().unwrap(), output);
}

#[tokio::test]
async fn test_multibyte_output_survives_chunking() {
    // 3-byte characters straddle the 4096-byte read boundary
    let (_dir, substrate) = script_substrate(
        r"i=0
while [ $i -lt 3000 ]; do printf '\342\206\222'; i=$((i+1)); done
echo",
        500,
    );
    let seen = Arc::new(Mutex::new(String::new()));
    let sink_seen = seen.clone();
    let sink: ChunkSink = Arc::new(move |chunk: &str| sink_seen.lock().unwrap().push_str(chunk));

    let output = substrate
        .invoke(request("p"), CancellationToken::new(), Some(sink))
        .await
        .expect("script should succeed");

    let expected = format!("{}\n", "→".repeat(3000));
    assert_eq!(output, expected);
    assert_eq!(*seen.lock().unwrap(), expected);
}

#[tokio::test]
async fn test_engine_over_real_processes() {
    let (_dir, substrate) = script_substrate("printf 'Reasoning.\\nFinal Answer: 7\\n'", 500);
    let engine = RsaEngine::new(Arc::new(substrate));
    let config = normalize(
        &ConfigOverrides::default()
            .with_population_size(3)
            .with_aggregation_size(2)
            .with_steps(2)
            .with_trace_mode("off"),
        EngineProfile::default(),
    )
    .expect("valid config")
    .config;

    let result = engine
        .run("What is 3+4?", &config, &ModelRef::default(), None, None)
        .await
        .expect("run should succeed");

    assert_eq!(result.total_calls, 6);
    assert_eq!(result.final_answer.as_deref(), Some("7"));
    assert_eq!(result.selected_votes, 3);
}
