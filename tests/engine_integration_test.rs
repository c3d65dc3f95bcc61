//! End-to-end engine runs against the mock substrate.

mod common;

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use common::{channel, count, drain, mock_engine, run_config};
use rsa_engine::adapters::substrates::MockResponse;
use rsa_engine::domain::models::Phase;
use rsa_engine::{ModelRef, ProgressEvent, RsaError, SelectionMethod};

#[tokio::test(start_paused = true)]
async fn test_total_calls_is_population_times_steps() {
    common::setup_test_logging();
    let (engine, mock) = mock_engine(|_| MockResponse::answer(42));
    let config = run_config(5, 3, 4, 3, "summary");

    let result = engine
        .run("What is 6*7?", &config, &ModelRef::default(), None, None)
        .await
        .expect("run should succeed");

    assert_eq!(result.total_calls, 20);
    assert_eq!(mock.call_count(), 20);
    assert_eq!(result.step_traces.len(), 4);
    assert_eq!(result.step_traces[0].phase, Phase::Seed);
    for (i, trace) in result.step_traces.iter().enumerate() {
        assert_eq!(trace.step, i + 1);
        assert_eq!(trace.call_count, 5);
        assert_eq!(trace.failed_calls, 0);
        if i > 0 {
            assert_eq!(trace.phase, Phase::Aggregate);
        }
    }
    assert!(result.calls_per_second > 0.0);
    assert_eq!(result.config, config);
}

#[tokio::test(start_paused = true)]
async fn test_aggregation_prompts_carry_k_candidates() {
    let (engine, mock) = mock_engine(|seq| {
        MockResponse::success(format!("reasoning #{seq}\nFinal Answer: {}", seq % 2))
    });
    let config = run_config(4, 3, 2, 1, "off");

    engine
        .run("Q?", &config, &ModelRef::default(), None, None)
        .await
        .expect("run should succeed");

    let requests = mock.requests().await;
    for request in &requests[..4] {
        assert!(request.prompt.contains("Q?"));
        assert!(!request.prompt.contains("## Candidate"));
    }
    for request in &requests[4..] {
        assert_eq!(request.prompt.matches("## Candidate ").count(), 3);
        assert!(request.prompt.contains("Aggregation round 2 of 2"));
    }
}

#[tokio::test(start_paused = true)]
async fn test_majority_answer_wins() {
    // Seed only; answers by slot: 12, 12, 7, 12
    let (engine, _) = mock_engine(|seq| match seq {
        2 => MockResponse::answer(7),
        _ => MockResponse::answer(12),
    });
    let config = run_config(4, 2, 1, 1, "off");

    let result = engine
        .run("Q", &config, &ModelRef::default(), None, None)
        .await
        .expect("run should succeed");

    assert_eq!(result.selected_by, SelectionMethod::Majority);
    assert_eq!(result.final_answer.as_deref(), Some("12"));
    assert_eq!(result.selected_votes, 3);
    assert_eq!(result.selected_index, 0);
}

#[tokio::test(start_paused = true)]
async fn test_distinct_answers_fall_back_to_first_candidate() {
    let (engine, _) = mock_engine(MockResponse::answer);
    let config = run_config(3, 1, 1, 3, "off");

    let result = engine
        .run("Q", &config, &ModelRef::default(), None, None)
        .await
        .expect("run should succeed");

    assert_eq!(result.selected_by, SelectionMethod::Deterministic);
    assert_eq!(result.selected_index, 0);
    assert_eq!(result.final_answer.as_deref(), Some("0"));
}

#[tokio::test(start_paused = true)]
async fn test_population_keeps_input_order() {
    // Slot 0 finishes last, slot 3 first
    let (engine, _) = mock_engine(|seq| {
        MockResponse::answer(seq).with_latency(Duration::from_millis(100 * (4 - seq as u64)))
    });
    let config = run_config(4, 1, 1, 4, "off");

    let result = engine
        .run("Q", &config, &ModelRef::default(), None, None)
        .await
        .expect("run should succeed");

    assert_eq!(result.selected_index, 0);
    assert!(result.final_candidate_text.ends_with("Final Answer: 0"));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_aborts_without_next_phase() {
    let (engine, mock) =
        mock_engine(|_| MockResponse::answer(1).with_latency(Duration::from_secs(1)));
    let config = run_config(3, 2, 3, 3, "summary");
    let (progress, mut rx) = channel();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let err = engine
        .run("Q", &config, &ModelRef::default(), Some(cancel), Some(progress))
        .await
        .unwrap_err();

    assert!(matches!(err, RsaError::Aborted));
    assert_eq!(mock.call_count(), 3, "only the seed calls were launched");

    let events = drain(&mut rx);
    assert_eq!(count(&events, "step_done"), 0);
    assert_eq!(count(&events, "step_start"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_first_failure_stops_the_run() {
    // Step 2, second call fails
    let (engine, mock) = mock_engine(|seq| {
        if seq == 3 {
            MockResponse::failure("model crashed")
        } else {
            MockResponse::answer(5)
        }
    });
    let config = run_config(2, 1, 3, 1, "summary");
    let (progress, mut rx) = channel();

    let err = engine
        .run("Q", &config, &ModelRef::default(), None, Some(progress))
        .await
        .unwrap_err();

    assert!(matches!(err, RsaError::Call(ref msg) if msg == "model crashed"));
    assert_eq!(mock.call_count(), 4);

    let events = drain(&mut rx);
    let done_steps: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::StepDone { step, .. } => Some(*step),
            _ => None,
        })
        .collect();
    assert_eq!(done_steps, vec![1]);
}

#[tokio::test(start_paused = true)]
async fn test_call_timeout_surfaces_as_timeout_error() {
    let (engine, _) =
        mock_engine(|_| MockResponse::answer(1).with_latency(Duration::from_secs(10)));
    let mut config = run_config(2, 1, 1, 2, "off");
    config.timeout_ms = 1000;

    let err = engine
        .run("Q", &config, &ModelRef::default(), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, RsaError::Timeout { timeout_ms: 1000 }));
}

#[tokio::test(start_paused = true)]
async fn test_tolerated_seed_failure_yields_empty_candidate() {
    let (engine, _) = mock_engine(|seq| {
        if seq == 1 {
            MockResponse::failure("flaky")
        } else {
            MockResponse::answer(42)
        }
    });
    let mut config = run_config(3, 1, 1, 1, "off");
    config.tolerate_call_failures = true;

    let result = engine
        .run("Q", &config, &ModelRef::default(), None, None)
        .await
        .expect("tolerant run should succeed");

    assert_eq!(result.step_traces[0].failed_calls, 1);
    assert_eq!(result.final_answer.as_deref(), Some("42"));
    assert_eq!(result.selected_votes, 2);
}

#[tokio::test(start_paused = true)]
async fn test_summary_events() {
    let (engine, _) =
        mock_engine(|_| MockResponse::answer(3).with_latency(Duration::from_secs(5)));
    let config = run_config(4, 2, 3, 4, "summary");
    let (progress, mut rx) = channel();

    engine
        .run("Q", &config, &ModelRef::default(), None, Some(progress))
        .await
        .expect("run should succeed");
    let events = drain(&mut rx);

    assert!(matches!(
        events.first(),
        Some(ProgressEvent::RunStart { total_calls: 12, .. })
    ));
    assert!(matches!(events.last(), Some(ProgressEvent::StepDone { step: 3, .. })));
    assert_eq!(count(&events, "step_start"), 3);
    assert_eq!(count(&events, "step_done"), 3);
    assert_eq!(count(&events, "call_start"), 0);

    let call_done = count(&events, "call_done");
    assert!(call_done > 0 && call_done < 12, "call_done sampled: {call_done}");

    // Calls take 5s, so the 2s sampler fires during each phase
    let heartbeats: Vec<&ProgressEvent> =
        events.iter().filter(|e| e.tag() == "heartbeat").collect();
    assert!(heartbeats.len() >= 3);
    assert!(heartbeats
        .iter()
        .all(|e| matches!(e, ProgressEvent::Heartbeat { preview: None, .. })));
}

#[tokio::test(start_paused = true)]
async fn test_verbose_events() {
    let (engine, _) = mock_engine(|_| MockResponse::answer(9));
    let config = run_config(3, 2, 2, 3, "verbose");
    let (progress, mut rx) = channel();

    engine
        .run("Q", &config, &ModelRef::default(), None, Some(progress))
        .await
        .expect("run should succeed");
    let events = drain(&mut rx);

    assert_eq!(count(&events, "call_start"), 6);
    assert_eq!(count(&events, "call_done"), 6);

    let last_done = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::CallDone {
                completed_calls,
                preview,
                ..
            } => Some((*completed_calls, preview.clone())),
            _ => None,
        })
        .last();
    assert_eq!(last_done, Some((6, Some("9".to_string()))));

    // Streamed lines turn into throttled heartbeats with a preview
    assert!(events.iter().any(|e| matches!(
        e,
        ProgressEvent::Heartbeat { preview: Some(p), .. } if p == "Working through it."
    )));
}

#[tokio::test(start_paused = true)]
async fn test_run_ids_are_unique() {
    let (engine, _) = mock_engine(|_| MockResponse::answer(1));
    let config = run_config(1, 1, 1, 1, "off");
    let model = ModelRef::default();

    let a = engine.run("Q", &config, &model, None, None).await.unwrap();
    let b = engine.run("Q", &config, &model, None, None).await.unwrap();
    assert_ne!(a.run_id, b.run_id);
}

#[tokio::test(start_paused = true)]
async fn test_progress_sink_accepts_closures() {
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink_seen = seen.clone();
    let sink = Arc::new(move |event: ProgressEvent| {
        sink_seen.lock().unwrap().push(event.tag());
    });

    let (engine, _) = mock_engine(|_| MockResponse::answer(1));
    let config = run_config(1, 1, 1, 1, "summary");
    engine
        .run("Q", &config, &ModelRef::default(), None, Some(sink))
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.first(), Some(&"run_start"));
    assert_eq!(seen.last(), Some(&"step_done"));
}
