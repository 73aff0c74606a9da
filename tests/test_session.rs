//! Integration tests for `ShellSession`
//!
//! These run against a real `sh` interpreter.

#![cfg(unix)]

use std::sync::{Arc, OnceLock};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rootshell::{ShellConfig, ShellError, ShellListener, ShellResult, ShellSession};
use tokio::sync::mpsc;

const WAIT: Duration = Duration::from_secs(10);

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

async fn plain_session(config: ShellConfig) -> ShellSession {
    init_logging();
    let session = ShellSession::new(config);
    session.init().await.unwrap();
    session
}

async fn run(session: &ShellSession, script: &str) -> ShellResult {
    tokio::time::timeout(WAIT, session.cmd(script).unwrap().exec())
        .await
        .expect("exec timed out")
        .unwrap()
        .expect("a command was pending")
}

/// Forwards every callback into a channel
struct ChannelListener {
    results: mpsc::UnboundedSender<(String, String, Vec<String>)>,
    broken_pipes: mpsc::UnboundedSender<Vec<String>>,
    broken_count: AtomicUsize,
}

impl ChannelListener {
    fn new() -> (
        Arc<Self>,
        mpsc::UnboundedReceiver<(String, String, Vec<String>)>,
        mpsc::UnboundedReceiver<Vec<String>>,
    ) {
        let (results, results_rx) = mpsc::unbounded_channel();
        let (broken_pipes, broken_rx) = mpsc::unbounded_channel();
        let listener = Arc::new(Self {
            results,
            broken_pipes,
            broken_count: AtomicUsize::new(0),
        });
        (listener, results_rx, broken_rx)
    }
}

impl ShellListener for ChannelListener {
    fn output(&self, command: &str, exit_code: &str, outputs: &[String]) {
        let _ = self
            .results
            .send((command.to_string(), exit_code.to_string(), outputs.to_vec()));
    }

    fn error(&self, command: &str, exit_code: &str, errors: &[String]) {
        let _ = self
            .results
            .send((command.to_string(), exit_code.to_string(), errors.to_vec()));
    }

    fn broken_pipe(&self, _reason: &str, errors: &[String]) {
        self.broken_count.fetch_add(1, Ordering::SeqCst);
        let _ = self.broken_pipes.send(errors.to_vec());
    }
}

#[tokio::test]
async fn test_echo_hello() {
    let session = plain_session(ShellConfig::default()).await;

    let result = run(&session, "echo hello").await;
    assert_eq!(
        result,
        ShellResult {
            command: "echo hello".to_string(),
            exit_code: "0".to_string(),
            outputs: vec!["hello".to_string()],
            errors: Vec::new(),
        }
    );

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_failure_reports_stderr_lines() {
    let session = plain_session(ShellConfig::default()).await;

    let result = run(&session, "echo partial; echo oops 1>&2; false").await;
    assert_eq!(result.exit_code, "1");
    assert!(result.outputs.is_empty());
    assert_eq!(result.errors, vec!["oops"]);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_exit_status_of_exiting_script() {
    let session = plain_session(ShellConfig::default()).await;
    let first_pid = session.pid().await;

    let result = run(&session, "exit 7").await;
    assert_eq!(result.command, "exit 7");
    assert_eq!(result.exit_code, "7");

    assert!(session.is_active().await);
    assert_ne!(session.pid().await, first_pid);
    assert_eq!(run(&session, "echo again").await.outputs, vec!["again"]);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_state_persists_between_commands() {
    let session = plain_session(ShellConfig::default()).await;

    run(&session, "cd / && GREETING=persisted").await;
    let result = run(&session, "pwd; echo $GREETING").await;
    assert_eq!(result.outputs, vec!["/", "persisted"]);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_output_without_trailing_newline() {
    let session = plain_session(ShellConfig::default()).await;

    let result = run(&session, "printf abc").await;
    assert_eq!(result.outputs, vec!["abc"]);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_marker_like_output_is_plain_text() {
    let session = plain_session(ShellConfig::default()).await;

    let result = run(&session, "echo a,0,1; echo 'x,y,z,1'").await;
    assert_eq!(result.outputs, vec!["a,0,1", "x,y,z,1"]);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_splicing_matches_joined_script() {
    let session = plain_session(ShellConfig::default()).await;

    session.enable_splicing_mode();
    session
        .cmd("echo A")
        .unwrap()
        .cmd("echo B")
        .unwrap()
        .cmd("echo C")
        .unwrap();
    let spliced = tokio::time::timeout(WAIT, session.exec())
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    let joined = run(&session, "echo A\necho B\necho C").await;
    assert_eq!(spliced, joined);
    assert_eq!(spliced.outputs, vec!["A", "B", "C"]);

    // Splicing ends with the submission
    session.cmd("echo one").unwrap().cmd("echo two").unwrap();
    let normal = session.exec().await.unwrap().unwrap();
    assert_eq!(normal.outputs, vec!["two"]);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_exec_without_pending_command() {
    let session = plain_session(ShellConfig::default()).await;

    assert_eq!(session.exec().await.unwrap(), None);
    assert_eq!(session.exec_async(None).await.unwrap(), None);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_init_is_idempotent() {
    let session = plain_session(ShellConfig::default()).await;
    let pid = session.pid().await;
    assert!(pid.is_some());

    session.init().await.unwrap();
    assert_eq!(session.pid().await, pid);
    assert!(session.is_active().await);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_async_commands_get_their_own_output() {
    let session = plain_session(ShellConfig::default()).await;
    let (first, mut first_rx, _) = ChannelListener::new();
    let (second, mut second_rx, _) = ChannelListener::new();

    session
        .cmd("sleep 0.2; echo first")
        .unwrap()
        .exec_async(Some(first))
        .await
        .unwrap()
        .unwrap();
    session
        .cmd("echo second")
        .unwrap()
        .exec_async(Some(second))
        .await
        .unwrap()
        .unwrap();

    let (command, exit_code, lines) = tokio::time::timeout(WAIT, first_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(command, "sleep 0.2; echo first");
    assert_eq!(exit_code, "0");
    assert_eq!(lines, vec!["first"]);

    let (command, _, lines) = tokio::time::timeout(WAIT, second_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(command, "echo second");
    assert_eq!(lines, vec!["second"]);

    assert!(first_rx.try_recv().is_err());
    assert!(second_rx.try_recv().is_err());

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_identical_async_commands_both_complete() {
    let session = plain_session(ShellConfig::default()).await;
    let (listener, mut rx, _) = ChannelListener::new();

    let a = session
        .cmd("echo same")
        .unwrap()
        .exec_async(Some(listener.clone()))
        .await
        .unwrap();
    let b = session
        .cmd("echo same")
        .unwrap()
        .exec_async(Some(listener))
        .await
        .unwrap();
    assert_ne!(a, b);

    for _ in 0..2 {
        let (_, _, lines) = tokio::time::timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert_eq!(lines, vec!["same"]);
    }

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_async_without_listener_uses_global_listener() {
    let (listener, mut rx, _) = ChannelListener::new();
    let session = plain_session(ShellConfig::builder().listener(listener).build()).await;

    session
        .cmd("echo global")
        .unwrap()
        .exec_async(None)
        .await
        .unwrap();
    let (_, _, lines) = tokio::time::timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(lines, vec!["global"]);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_broken_pipe_recovers_session() {
    let (listener, _results, mut broken_rx) = ChannelListener::new();
    let session = plain_session(ShellConfig::builder().listener(listener.clone()).build()).await;

    let result = run(&session, "echo boom 1>&2; exit 3").await;
    assert_eq!(result.exit_code, "3");
    assert_eq!(result.errors, vec!["boom"]);

    let errors = tokio::time::timeout(WAIT, broken_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(errors, vec!["boom"]);
    assert_eq!(listener.broken_count.load(Ordering::SeqCst), 1);

    assert!(session.is_active().await);
    assert_eq!(run(&session, "echo fresh").await.outputs, vec!["fresh"]);
    assert_eq!(listener.broken_count.load(Ordering::SeqCst), 1);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_panicking_listener_does_not_break_session() {
    struct Panicky;
    impl ShellListener for Panicky {
        fn output(&self, _command: &str, _exit_code: &str, _outputs: &[String]) {
            panic!("listener bug");
        }
    }

    let session = plain_session(ShellConfig::default()).await;
    session
        .cmd("echo ignored")
        .unwrap()
        .exec_async(Some(Arc::new(Panicky)))
        .await
        .unwrap();

    assert_eq!(run(&session, "echo still alive").await.outputs, vec!["still alive"]);
    assert!(session.is_active().await);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_commands_after_close_fail_without_auto_init() {
    let session = plain_session(ShellConfig::default()).await;
    session.close().await.unwrap();

    assert!(!session.is_active().await);
    let err = session.cmd("echo hi").unwrap_err();
    assert!(err.is_inactive(), "unexpected error: {err}");

    // Closing again is harmless
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_commands_after_close_reinitialise_with_auto_init() {
    let session = plain_session(ShellConfig::builder().auto_init(true).build()).await;
    session.close().await.unwrap();
    assert!(!session.is_active().await);

    let result = run(&session, "echo back").await;
    assert_eq!(result.outputs, vec!["back"]);
    assert!(session.is_active().await);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_close_releases_waiting_exec() {
    let session = plain_session(
        ShellConfig::builder()
            .close_timeout(Duration::from_millis(200))
            .build(),
    )
    .await;

    let waiting = {
        let session = session.clone();
        tokio::spawn(async move { session.cmd("sleep 5").unwrap().exec().await })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(session.in_flight(), 1);

    session.close().await.unwrap();
    let outcome = tokio::time::timeout(WAIT, waiting).await.unwrap().unwrap();
    assert!(matches!(outcome, Err(ShellError::Closed(_))));
    assert_eq!(session.in_flight(), 0);
}

#[tokio::test]
async fn test_exec_timeout() {
    let session = plain_session(
        ShellConfig::builder()
            .exec_timeout(Duration::from_millis(100))
            .build(),
    )
    .await;

    let outcome = session.cmd("sleep 1").unwrap().exec().await;
    assert!(matches!(outcome, Err(ShellError::Timeout(_))));
    assert_eq!(session.in_flight(), 0);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_command_gate_drops_vetoed_scripts() {
    let session = plain_session(
        ShellConfig::builder()
            .command_gate(|script: &str| !script.contains("reboot"))
            .build(),
    )
    .await;

    assert_eq!(session.cmd("reboot").unwrap().exec().await.unwrap(), None);
    assert_eq!(run(&session, "echo allowed").await.outputs, vec!["allowed"]);

    session.set_command_gate(None);
    assert_eq!(
        run(&session, "echo reboot is just text").await.outputs,
        vec!["reboot is just text"]
    );

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_working_directory_and_environment() {
    let dir = tempfile::tempdir().unwrap();
    let session = plain_session(
        ShellConfig::builder()
            .cwd(dir.path())
            .env("ROOTSHELL_TEST_VAR", "configured")
            .build(),
    )
    .await;

    let result = run(&session, "pwd; echo $ROOTSHELL_TEST_VAR").await;
    assert_eq!(
        std::fs::canonicalize(&result.outputs[0]).unwrap(),
        std::fs::canonicalize(dir.path()).unwrap()
    );
    assert_eq!(result.outputs[1], "configured");

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_missing_interpreter_fails_to_spawn() {
    init_logging();
    let session = ShellSession::new(
        ShellConfig::builder()
            .shell_commands("su", "definitely-not-a-shell-xyz")
            .build(),
    );

    assert!(matches!(session.init().await, Err(ShellError::Spawn(_))));
    assert!(!session.is_active().await);
}

#[tokio::test]
async fn test_sync_exec_while_async_commands_in_flight() {
    let session = plain_session(ShellConfig::default()).await;

    let mut receivers = Vec::new();
    for i in 0..5 {
        let (listener, rx, _) = ChannelListener::new();
        session
            .cmd(format!("echo async{i}"))
            .unwrap()
            .exec_async(Some(listener))
            .await
            .unwrap();
        receivers.push(rx);
    }

    let sync = run(&session, "echo sync").await;
    assert_eq!(sync.outputs, vec!["sync"]);

    let received = tokio::time::timeout(
        WAIT,
        futures::future::join_all(receivers.iter_mut().map(|rx| rx.recv())),
    )
    .await
    .unwrap();
    for (i, item) in received.into_iter().enumerate() {
        let (_, _, lines) = item.unwrap();
        assert_eq!(lines, vec![format!("async{i}")]);
    }
    assert_eq!(session.in_flight(), 0);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_commands_queued_behind_exit_run_on_new_interpreter() {
    let session = plain_session(ShellConfig::default()).await;
    let (listener, mut rx, _) = ChannelListener::new();

    session
        .cmd("exit 7")
        .unwrap()
        .exec_async(Some(listener))
        .await
        .unwrap();
    let after = run(&session, "echo after").await;
    assert_eq!(after.exit_code, "0");
    assert_eq!(after.outputs, vec!["after"]);

    let (command, exit_code, lines) = tokio::time::timeout(WAIT, rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(command, "exit 7");
    assert_eq!(exit_code, "7");
    assert!(lines.is_empty());
    assert_eq!(session.in_flight(), 0);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_async_broken_pipe_reports_once() {
    let (listener, mut results, mut broken_rx) = ChannelListener::new();
    let session = plain_session(ShellConfig::builder().listener(listener.clone()).build()).await;

    session
        .cmd("echo boom 1>&2; exit 3")
        .unwrap()
        .exec_async(None)
        .await
        .unwrap();

    let (command, exit_code, lines) = tokio::time::timeout(WAIT, results.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(command, "echo boom 1>&2; exit 3");
    assert_eq!(exit_code, "3");
    assert_eq!(lines, vec!["boom"]);

    let errors = tokio::time::timeout(WAIT, broken_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(errors, vec!["boom"]);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(results.try_recv().is_err());
    assert_eq!(listener.broken_count.load(Ordering::SeqCst), 1);
    assert!(session.is_active().await);

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_cmd_from_broken_pipe_callback_is_queued() {
    struct Requeue {
        session: OnceLock<ShellSession>,
        queued: mpsc::UnboundedSender<bool>,
    }

    impl ShellListener for Requeue {
        fn broken_pipe(&self, _reason: &str, _errors: &[String]) {
            if let Some(session) = self.session.get() {
                let _ = self.queued.send(session.cmd("echo queued").is_ok());
            }
        }
    }

    let (queued, mut queued_rx) = mpsc::unbounded_channel();
    let listener = Arc::new(Requeue {
        session: OnceLock::new(),
        queued,
    });
    let session = plain_session(ShellConfig::builder().listener(listener.clone()).build()).await;
    let _ = listener.session.set(session.clone());

    let broken = run(&session, "echo boom 1>&2; exit 3").await;
    assert_eq!(broken.exit_code, "3");
    assert!(tokio::time::timeout(WAIT, queued_rx.recv())
        .await
        .unwrap()
        .unwrap());

    let requeued = tokio::time::timeout(WAIT, session.exec())
        .await
        .unwrap()
        .unwrap()
        .expect("the callback queued a command");
    assert_eq!(requeued.outputs, vec!["queued"]);

    session.set_listener(None);
    session.close().await.unwrap();
}
