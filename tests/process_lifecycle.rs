// tests/process_lifecycle.rs

#![cfg(unix)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use scriptcast::errors::ScriptcastError;
use scriptcast::process::handle::{KILLED_MARKER, STOPPED_MARKER};
use scriptcast::process::{ProcessHandle, ProcessKind, ProcessSpec};
use scriptcast_test_utils::recorder::Recorder;
use scriptcast_test_utils::{TEST_TIMEOUT, init_tracing, wait_until};

fn shell(script: &str) -> ProcessSpec {
    ProcessSpec::new("sh").arg("-c").arg(script)
}

/// Start `spec`, wait for it to finish and return everything it printed.
fn run_to_end(spec: ProcessSpec, kind: ProcessKind) -> (Arc<ProcessHandle>, String) {
    init_tracing();
    let handle = ProcessHandle::new(spec, kind);
    let recorder = Recorder::attach(&handle.output());

    handle.start().expect("process should start");
    handle.wait_finish(Some(TEST_TIMEOUT)).expect("process should finish");

    assert!(recorder.is_closed(), "output must be closed once finished");
    (handle, recorder.text())
}

#[test]
fn echo_output_is_streamed_and_exit_code_recorded() {
    let (handle, text) = run_to_end(ProcessSpec::new("echo").arg("hello"), ProcessKind::Pipe);

    assert_eq!(text, "hello\n");
    assert!(handle.is_finished());
    assert_eq!(handle.return_code(), Some(0));
    assert!(handle.pid().is_some());
}

#[test]
fn stderr_is_merged_into_output() {
    let (_, text) = run_to_end(shell("echo out; echo err 1>&2"), ProcessKind::Pipe);

    assert!(text.contains("out\n"), "got {text:?}");
    assert!(text.contains("err\n"), "got {text:?}");
}

#[test]
fn non_zero_exit_is_a_normal_finish() {
    let (handle, _) = run_to_end(shell("exit 3"), ProcessKind::Pipe);
    assert_eq!(handle.return_code(), Some(3));
}

#[test]
fn env_and_working_directory_are_applied() {
    let dir = tempfile::tempdir().unwrap();
    let spec = shell("echo \"$GREETING\"; pwd")
        .env("GREETING", "bonjour")
        .working_dir(dir.path());

    let (_, text) = run_to_end(spec, ProcessKind::Pipe);

    let dir_name = dir.path().file_name().unwrap().to_string_lossy().to_string();
    assert!(text.starts_with("bonjour\n"), "got {text:?}");
    assert!(text.contains(&dir_name), "got {text:?}");
}

#[test]
fn starting_twice_fails() {
    init_tracing();
    let handle = ProcessHandle::new(ProcessSpec::new("true"), ProcessKind::Pipe);
    handle.start().unwrap();

    assert!(matches!(handle.start(), Err(ScriptcastError::AlreadyStarted)));
    handle.wait_finish(Some(TEST_TIMEOUT)).unwrap();
}

#[test]
fn spawn_failure_is_reported_and_output_closed() {
    init_tracing();
    let handle = ProcessHandle::new(
        ProcessSpec::new("/definitely/not/a/real/binary"),
        ProcessKind::Pipe,
    );

    match handle.start() {
        Err(ScriptcastError::SpawnFailure { command, .. }) => {
            assert!(command.contains("/definitely/not/a/real/binary"));
        }
        other => panic!("expected SpawnFailure, got {other:?}"),
    }
    assert!(handle.output().is_closed());
}

#[test]
fn stdin_lines_reach_the_process() {
    init_tracing();
    let handle = ProcessHandle::new(shell("read line; echo \"got:$line\""), ProcessKind::Pipe);
    let recorder = Recorder::attach(&handle.output());

    handle.start().unwrap();
    handle.write_to_input("ping");
    handle.wait_finish(Some(TEST_TIMEOUT)).unwrap();

    assert_eq!(recorder.text(), "got:ping\n");
    assert_eq!(handle.return_code(), Some(0));
}

#[test]
fn writing_after_finish_is_a_no_op() {
    let (handle, _) = run_to_end(ProcessSpec::new("true"), ProcessKind::Pipe);
    handle.write_to_input("ignored");
    handle.cleanup();
    handle.write_to_input("ignored again");
}

#[test]
fn finish_listeners_run_in_registration_order() {
    init_tracing();
    let handle = ProcessHandle::new(shell("sleep 0.2"), ProcessKind::Pipe);
    let order = Arc::new(Mutex::new(Vec::new()));

    for n in 0..3 {
        let order = Arc::clone(&order);
        handle.add_finish_listener(Box::new(move || {
            order.lock().unwrap().push(n);
            Ok(())
        }));
    }
    handle.add_finish_listener(Box::new(|| Err(anyhow::anyhow!("listener failed"))));
    {
        let order = Arc::clone(&order);
        handle.add_finish_listener(Box::new(move || {
            order.lock().unwrap().push(99);
            Ok(())
        }));
    }

    handle.start().unwrap();
    handle.wait_finish(Some(TEST_TIMEOUT)).unwrap();

    assert!(wait_until(TEST_TIMEOUT, || order.lock().unwrap().len() == 4));
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 99]);
}

#[test]
fn listener_added_after_finish_runs_synchronously_once() {
    let (handle, _) = run_to_end(ProcessSpec::new("true"), ProcessKind::Pipe);
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    handle.add_finish_listener(Box::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }));

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn stop_terminates_and_marks_output() {
    init_tracing();
    let handle = ProcessHandle::new(shell("echo started; sleep 30"), ProcessKind::Pipe);
    let recorder = Recorder::attach(&handle.output());
    handle.start().unwrap();

    assert!(wait_until(TEST_TIMEOUT, || recorder.text().contains("started")));
    handle.stop();
    handle.wait_finish(Some(TEST_TIMEOUT)).unwrap();

    assert!(recorder.text().contains(STOPPED_MARKER.trim()));
    assert!(recorder.is_closed());
    assert_ne!(handle.return_code(), Some(0));
}

#[test]
fn kill_terminates_and_marks_output() {
    init_tracing();
    let handle = ProcessHandle::new(shell("sleep 30"), ProcessKind::Pipe);
    let recorder = Recorder::attach(&handle.output());
    handle.start().unwrap();

    handle.kill();
    handle.wait_finish(Some(TEST_TIMEOUT)).unwrap();

    assert!(recorder.text().contains(KILLED_MARKER.trim()));
    assert_eq!(handle.return_code(), Some(-9));
}

#[test]
fn stop_reaches_children_in_the_process_group() {
    init_tracing();
    // The background sleep keeps the output pipe open; it must die too.
    let handle = ProcessHandle::new(shell("sleep 30 & wait"), ProcessKind::Pipe);
    let recorder = Recorder::attach(&handle.output());
    handle.start().unwrap();

    std::thread::sleep(Duration::from_millis(200));
    handle.stop();

    handle.wait_finish(Some(TEST_TIMEOUT)).unwrap();
    assert!(recorder.is_closed());
}

#[test]
fn stop_before_start_is_harmless() {
    init_tracing();
    let handle = ProcessHandle::new(ProcessSpec::new("true"), ProcessKind::Pipe);
    handle.stop();
    handle.kill();
    assert!(!handle.is_finished());
    assert_eq!(handle.return_code(), None);
}

#[test]
fn pty_gives_the_process_a_terminal() {
    let (handle, text) = run_to_end(
        shell("if [ -t 0 ] && [ -t 1 ]; then echo tty; else echo notty; fi"),
        ProcessKind::Pty,
    );

    assert_eq!(handle.return_code(), Some(0));
    assert!(text.contains("tty\n"), "got {text:?}");
    assert!(!text.contains("notty"), "got {text:?}");
}

#[test]
fn pty_output_has_normalized_newlines() {
    let (_, text) = run_to_end(shell("printf 'one\\ntwo\\r\\nthree\\n'"), ProcessKind::Pty);

    assert!(text.contains("one\ntwo\nthree\n"), "got {text:?}");
    assert!(!text.contains('\r'), "got {text:?}");
}

#[test]
fn pty_output_keeps_multibyte_characters_intact() {
    let (_, text) = run_to_end(shell("printf 'héllo wörld 😀 €\\n'"), ProcessKind::Pty);

    assert!(text.contains("héllo wörld 😀 €"), "got {text:?}");
    assert!(!text.contains('\u{FFFD}'), "got {text:?}");
}

#[test]
fn pty_input_is_echoed_and_read() {
    init_tracing();
    let handle = ProcessHandle::new(shell("read line; echo \"got:$line\""), ProcessKind::Pty);
    let recorder = Recorder::attach(&handle.output());

    handle.start().unwrap();
    handle.write_to_input("pong");
    handle.wait_finish(Some(TEST_TIMEOUT)).unwrap();

    assert!(recorder.text().contains("got:pong\n"), "got {:?}", recorder.text());
}

#[test]
fn pty_process_can_be_killed() {
    init_tracing();
    let handle = ProcessHandle::new(shell("sleep 30"), ProcessKind::Pty);
    let recorder = Recorder::attach(&handle.output());
    handle.start().unwrap();

    std::thread::sleep(Duration::from_millis(100));
    handle.kill();
    handle.wait_finish(Some(TEST_TIMEOUT)).unwrap();

    assert!(recorder.text().contains(KILLED_MARKER.trim()));
    assert!(recorder.is_closed());
}

#[test]
fn output_observer_can_kill_its_own_process() {
    init_tracing();
    let handle = ProcessHandle::new(shell("echo ERROR; sleep 30"), ProcessKind::Pipe);
    let recorder = Recorder::attach(&handle.output());

    let target = Arc::clone(&handle);
    handle.output().subscribe_fn(
        move |chunk: &String| {
            if chunk.contains("ERROR") {
                target.kill();
            }
            Ok(())
        },
        || Ok(()),
    );
    handle.start().unwrap();

    handle.wait_finish(Some(TEST_TIMEOUT)).unwrap();
    assert_eq!(handle.return_code(), Some(-9));
    assert!(recorder.text().contains(KILLED_MARKER.trim()));
    assert!(recorder.is_closed());
}

#[test]
fn buffered_observer_can_kill_while_output_closes() {
    init_tracing();
    // Closing both descriptors ends the output while the process lives on, so
    // the final batch is flushed from inside the output's close.
    let handle = ProcessHandle::new(
        shell("echo ERROR; exec >&- 2>&-; sleep 30"),
        ProcessKind::Pipe,
    );
    let buffered = handle
        .output()
        .time_buffered(Duration::from_millis(100))
        .replay();

    let target = Arc::clone(&handle);
    buffered.subscribe_fn(
        move |chunk: &String| {
            if chunk.contains("ERROR") {
                target.kill();
            }
            Ok(())
        },
        || Ok(()),
    );
    handle.start().unwrap();

    handle.wait_finish(Some(TEST_TIMEOUT)).unwrap();
    assert_eq!(handle.return_code(), Some(-9));
    buffered.wait_close(Some(TEST_TIMEOUT)).unwrap();
}
