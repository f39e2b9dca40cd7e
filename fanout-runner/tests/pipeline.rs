//! End-to-end runs against real processes.
//!
//! These tests spawn `sh`, `printf`, `cat`, `sed` and friends, so they only
//! run on unix.

#![cfg(unix)]

use fanout_core::domain::pipeline::{ConsumerSpec, PipelineDefinition};
use fanout_core::domain::process::ProcessSpec;
use fanout_core::error::TaskError;
use fanout_runner::{Config, Coordinator, RunReport};
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::TempDir;

async fn run(definition: PipelineDefinition, deadline: Duration) -> RunReport {
    let coordinator = Coordinator::from_definition(&definition, Config::new(deadline))
        .expect("definition should be valid");
    coordinator.run().await
}

fn sh(script: &str) -> ProcessSpec {
    ProcessSpec::new("sh").args(["-c", script])
}

fn read(path: &Path) -> Vec<u8> {
    std::fs::read(path).expect("output should exist")
}

// ============================================================================
// Happy path
// ============================================================================

#[tokio::test]
async fn substitution_runs_independently_on_each_leg() {
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("first.txt");
    let second = dir.path().join("second.txt");

    let definition = PipelineDefinition::new(
        ProcessSpec::new("printf").args(["Anisur Rahman"]),
        vec![
            ConsumerSpec::process("first", ProcessSpec::new("sed").args(["s/e/i/g"]))
                .with_output(&first),
            ConsumerSpec::process("second", ProcessSpec::new("sed").args(["s/e/i/g"]))
                .with_output(&second),
        ],
    );

    let report = run(definition, Duration::from_secs(10)).await;

    assert!(report.is_success(), "{:?}", report.failures());
    assert_eq!(report.producer().unwrap().bytes, 13);
    for path in [&first, &second] {
        let output = String::from_utf8(read(path)).unwrap();
        assert_eq!(output.trim_end(), "Anisur Rahman");
        assert!(!output.contains('e'));
    }
    for consumer in report.consumers() {
        assert_eq!(consumer.bytes, 13);
    }
}

#[tokio::test]
async fn file_legs_receive_identical_copies() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("source.bin");
    let data: Vec<u8> = (0..1024 * 1024).map(|i| (i % 253) as u8).collect();
    std::fs::write(&source, &data).unwrap();

    let outputs: Vec<_> = (0..3)
        .map(|i| dir.path().join(format!("copy-{}.bin", i)))
        .collect();
    let definition = PipelineDefinition::new(
        ProcessSpec::new("cat").args([source.display().to_string()]),
        outputs.iter().map(ConsumerSpec::file).collect(),
    );

    let report = run(definition, Duration::from_secs(20)).await;

    assert!(report.is_success(), "{:?}", report.failures());
    for path in &outputs {
        assert_eq!(read(path), data);
    }
}

#[tokio::test]
async fn empty_producer_output_is_success() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("empty.txt");
    std::fs::write(&output, b"stale").unwrap();

    let definition =
        PipelineDefinition::new(ProcessSpec::new("true"), vec![ConsumerSpec::file(&output)]);

    let report = run(definition, Duration::from_secs(10)).await;

    assert!(report.is_success());
    assert_eq!(report.consumer(0).unwrap().bytes, 0);
    let expected = format!("No data written to {}", output.display());
    assert_eq!(report.warnings(), vec![expected.as_str()]);
    assert!(read(&output).is_empty(), "existing file should be truncated");
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn failing_consumer_fails_the_run() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("ok.txt");

    let definition = PipelineDefinition::new(
        sh("i=0; while [ $i -lt 2000 ]; do echo line $i; i=$((i+1)); done"),
        vec![
            ConsumerSpec::file(&output),
            ConsumerSpec::process("broken", sh("exit 3")),
        ],
    );

    let started = Instant::now();
    let report = run(definition, Duration::from_secs(10)).await;

    assert!(!report.is_success());
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(!report.deadline_exceeded());
    let broken = report.consumer(1).unwrap();
    assert!(matches!(broken.error(), Some(TaskError::ConsumerRuntime { leg: 1, .. })));
}

#[tokio::test]
async fn failing_producer_closes_every_leg() {
    let dir = TempDir::new().unwrap();
    let outputs = [dir.path().join("a.txt"), dir.path().join("b.txt")];

    let definition = PipelineDefinition::new(
        sh("exit 2"),
        outputs.iter().map(ConsumerSpec::file).collect(),
    );

    let report = run(definition, Duration::from_secs(10)).await;

    assert!(!report.is_success());
    let producer = report.producer().unwrap();
    assert!(matches!(producer.error(), Some(TaskError::ProducerRuntime { .. })));
    assert!(report.consumers().iter().all(|outcome| outcome.is_success()));
}

#[tokio::test]
async fn missing_producer_program_is_a_launch_failure() {
    let dir = TempDir::new().unwrap();

    let definition = PipelineDefinition::new(
        ProcessSpec::new("fanout-definitely-missing-program"),
        vec![ConsumerSpec::file(dir.path().join("out.txt"))],
    );

    let report = run(definition, Duration::from_secs(10)).await;

    let failure = report.first_failure().expect("run should fail");
    assert!(matches!(failure.error(), Some(TaskError::ProducerLaunch { .. })));
}

#[tokio::test]
async fn consumer_that_ignores_input_is_a_failure() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("source.bin");
    std::fs::write(&source, vec![b'x'; 1024 * 1024]).unwrap();

    let definition = PipelineDefinition::new(
        ProcessSpec::new("cat").args([source.display().to_string()]),
        vec![ConsumerSpec::process("ignores-input", ProcessSpec::new("true"))],
    );

    let report = run(definition, Duration::from_secs(10)).await;

    assert!(!report.is_success());
    let consumer = report.consumer(0).unwrap();
    match consumer.error() {
        Some(TaskError::ConsumerRuntime { reason, .. }) => {
            assert!(
                reason.contains(&format!("after {} bytes", consumer.bytes)),
                "reason '{}' should match {} delivered bytes",
                reason,
                consumer.bytes
            );
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

// ============================================================================
// Deadline
// ============================================================================

#[tokio::test]
async fn deadline_stops_a_long_running_producer() {
    let dir = TempDir::new().unwrap();

    let definition = PipelineDefinition::new(
        ProcessSpec::new("sleep").args(["30"]),
        vec![ConsumerSpec::file(dir.path().join("out.txt"))],
    );

    let started = Instant::now();
    let report = run(definition, Duration::from_millis(300)).await;

    assert!(!report.is_success());
    assert!(report.deadline_exceeded());
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(
        report.producer().unwrap().error(),
        Some(&TaskError::DeadlineExceeded { deadline_ms: 300 })
    );
}

#[tokio::test]
async fn deadline_stops_a_consumer_that_never_exits() {
    let definition = PipelineDefinition::new(
        ProcessSpec::new("printf").args(["hello"]),
        vec![ConsumerSpec::process("sleeper", ProcessSpec::new("sleep").args(["30"]))],
    );

    let started = Instant::now();
    let report = run(definition, Duration::from_millis(300)).await;

    assert!(!report.is_success());
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(report.consumer(0).unwrap().error().unwrap().is_deadline());
}
