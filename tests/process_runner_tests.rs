//! Integration tests for ProcessRunner against real child processes
//!
//! These tests verify:
//! - Combined stdout/stderr capture and exit codes
//! - Terminating an unresponsive process on request
//! - Keeping the process alive when asked to wait longer
//! - Releasing the child when the unresponsive callback panics

#![cfg(unix)]

use blend_importer::services::{ProcessRunner, ProcessSpec, WaitDecision};
use std::time::{Duration, Instant};

fn shell(script: &str) -> ProcessSpec {
    ProcessSpec::new("/bin/sh").args(["-c", script])
}

fn runner() -> ProcessRunner {
    ProcessRunner::with_poll_interval(Duration::from_millis(20))
}

#[tokio::test]
async fn test_captures_output_and_exit_code() {
    let spec = shell("echo 'C|Props,}'; echo 'warning' 1>&2; exit 3");
    let mut asked = 0;

    let result = runner()
        .run(&spec, Duration::from_secs(10), |_| {
            asked += 1;
            WaitDecision::KeepWaiting
        })
        .await
        .unwrap();

    assert!(result.succeeded);
    assert!(!result.was_cancelled_by_user);
    assert_eq!(result.exit_code, Some(3));
    assert!(result.combined_output.contains("C|Props,}"));
    assert!(result.combined_output.contains("warning"));
    assert_eq!(asked, 0);
}

#[tokio::test]
async fn test_environment_passed_through() {
    let spec = shell("printf '%s' \"$UNREAL_IMPORTER_OUTPUT_FILE\"")
        .env("UNREAL_IMPORTER_OUTPUT_FILE", "/tmp/scene.fbx");

    let result = runner()
        .run(&spec, Duration::from_secs(10), |_| WaitDecision::KeepWaiting)
        .await
        .unwrap();

    assert_eq!(result.combined_output, "/tmp/scene.fbx");
}

#[tokio::test]
async fn test_terminate_unresponsive() {
    let spec = shell("echo started; exec sleep 30");
    let mut elapsed_seen = Vec::new();

    let result = runner()
        .run(&spec, Duration::from_millis(200), |elapsed| {
            elapsed_seen.push(elapsed);
            WaitDecision::Terminate
        })
        .await
        .unwrap();

    assert!(!result.succeeded);
    assert!(result.was_cancelled_by_user);
    assert_eq!(result.exit_code, None);
    assert_eq!(elapsed_seen.len(), 1);
    assert!(elapsed_seen[0] >= Duration::from_millis(200));
    assert!(result.duration < Duration::from_secs(10));
    assert!(result.combined_output.contains("started"));
}

#[tokio::test]
async fn test_keep_waiting_resets_timer() {
    let spec = shell("sleep 1; echo finished");
    let mut asked = 0;

    let result = runner()
        .run(&spec, Duration::from_millis(300), |_| {
            asked += 1;
            WaitDecision::KeepWaiting
        })
        .await
        .unwrap();

    assert!(result.succeeded);
    assert_eq!(result.exit_code, Some(0));
    assert!(result.combined_output.contains("finished"));
    assert!(asked >= 1);
}

#[tokio::test]
async fn test_missing_program_is_not_an_error() {
    let spec = ProcessSpec::new("/nonexistent/blender").arg("-b");

    let result = runner()
        .run(&spec, Duration::from_secs(1), |_| WaitDecision::KeepWaiting)
        .await
        .unwrap();

    assert!(!result.succeeded);
    assert!(!result.was_cancelled_by_user);
    assert!(result.combined_output.is_empty());
}

#[tokio::test]
async fn test_unrepresentable_timeout_never_prompts() {
    let spec = shell("sleep 0.2; echo done");

    let result = runner()
        .run(&spec, Duration::MAX, |_| -> WaitDecision {
            panic!("unresponsive callback must not fire")
        })
        .await
        .unwrap();

    assert!(result.succeeded);
    assert_eq!(result.exit_code, Some(0));
    assert!(result.combined_output.contains("done"));
}

#[cfg(target_os = "linux")]
fn process_gone(pid: &str) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/status", pid)) {
        Ok(status) => status
            .lines()
            .any(|line| line.starts_with("State:") && line.contains('Z')),
        Err(_) => true,
    }
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_child_released_when_callback_panics() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("pid");
    let spec = shell(&format!("echo $$ > '{}'; exec sleep 30", pid_file.display()));

    let task = tokio::spawn(async move {
        runner()
            .run(&spec, Duration::from_millis(300), |_| -> WaitDecision {
                panic!("prompt failed")
            })
            .await
    });

    let err = task.await.unwrap_err();
    assert!(err.is_panic());

    let pid = std::fs::read_to_string(&pid_file).unwrap();
    let pid = pid.trim();
    assert!(!pid.is_empty());

    let deadline = Instant::now() + Duration::from_secs(5);
    while !process_gone(pid) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(process_gone(pid), "child {} still running", pid);
}
