//! Process supervision against real child processes.
#![cfg(unix)]

use std::time::{Duration, Instant};

use live_recorder::supervisor::{CaptureCommand, ProcessSupervisor};

fn shell(script: &str) -> CaptureCommand {
    CaptureCommand {
        program: "sh".into(),
        args: vec!["-c".into(), script.into()],
        working_dir: None,
        owner_id: "rec-1".into(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_ignored_interrupt_escalates_to_kill() {
    let kill_timeout = Duration::from_secs(5);
    let grace = Duration::from_millis(500);
    let supervisor = ProcessSupervisor::new(kill_timeout);

    let handle = supervisor.spawn(shell("trap '' INT; sleep 30")).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    let children = process_utils::descendants(handle.pid());

    let started = Instant::now();
    let outcome = supervisor.stop(&handle, grace).await.unwrap();
    assert!(outcome.forced);
    assert!(!outcome.success);
    assert!(started.elapsed() < grace + kill_timeout);

    assert!(!supervisor.verify_alive(&handle));
    assert_eq!(supervisor.active_count(), 0);
    tokio::time::sleep(Duration::from_millis(200)).await;
    for pid in children {
        assert!(!process_utils::is_process_alive(pid), "descendant {pid} survived");
    }
}

#[tokio::test]
async fn test_interrupt_lets_capture_finish() {
    let supervisor = ProcessSupervisor::new(Duration::from_secs(5));
    let handle = supervisor
        .spawn(shell("trap 'echo finalizing >&2; exit 0' INT; while true; do sleep 0.05; done"))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let outcome = supervisor
        .stop(&handle, Duration::from_secs(5))
        .await
        .unwrap();
    assert!(!outcome.forced);
    assert!(outcome.success);
    assert_eq!(outcome.code, Some(0));
}

#[tokio::test]
async fn test_stop_after_exit_returns_recorded_outcome() {
    let supervisor = ProcessSupervisor::new(Duration::from_secs(5));
    let handle = supervisor.spawn(shell("exit 3")).unwrap();
    let exited = tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .unwrap();
    assert_eq!(exited.code, Some(3));

    let outcome = supervisor
        .stop(&handle, Duration::from_millis(100))
        .await
        .unwrap();
    assert_eq!(outcome, exited);
    assert!(!outcome.forced);
}

#[tokio::test]
async fn test_last_output_keeps_final_stderr_line() {
    let supervisor = ProcessSupervisor::new(Duration::from_secs(5));
    let handle = supervisor
        .spawn(shell("echo 'opening input' >&2; echo 'Connection refused' >&2; exit 1"))
        .unwrap();
    let outcome = tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .unwrap();
    assert!(!outcome.success);

    // the stderr reader may trail the reaper slightly
    let deadline = Instant::now() + Duration::from_secs(2);
    while handle.last_output().as_deref() != Some("Connection refused") {
        assert!(Instant::now() < deadline, "last output was {:?}", handle.last_output());
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
