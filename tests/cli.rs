use std::time::Duration;

use assert_cmd::Command;
use predicates::prelude::*;

fn loadwave() -> Command {
    Command::cargo_bin("loadwave").unwrap()
}

#[test]
fn missing_duration_prints_usage() {
    loadwave()
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn non_integer_duration_is_rejected() {
    loadwave()
        .arg("abc")
        .assert()
        .failure()
        .stderr(predicate::str::contains("integer"));
}

#[test]
fn zero_and_negative_durations_are_rejected() {
    for input in ["0", "-3"] {
        loadwave()
            .arg(input)
            .assert()
            .failure()
            .stderr(predicate::str::contains("greater than zero"));
    }
}

#[test]
fn worker_subcommand_is_hidden_from_help() {
    loadwave()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("DURATION_SECS"))
        .stdout(predicate::str::contains("worker").not());
}

#[test]
fn worker_rejects_zero_chunk() {
    loadwave()
        .args(["worker", "memory", "--chunk-mb", "0", "--interval-ms", "100"])
        .write_stdin("")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::function(|err: &str| err.matches("chunk-mb").count() == 1));
}

#[test]
fn extra_argument_is_a_usage_error() {
    loadwave()
        .args(["5", "6"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("unexpected argument '6'"))
        .stderr(predicate::str::contains("subcommand").not());
}

#[cfg(unix)]
#[test]
fn one_second_run_completes() {
    // `logger` may be missing on minimal systems; a failed emission is local to
    // the log worker and does not affect the run.
    loadwave()
        .arg("1")
        .timeout(Duration::from_secs(60))
        .assert()
        .success()
        .stdout(predicate::str::contains("[wave-up] wave=1"))
        .stdout(predicate::str::contains("[deadline-reached]"))
        .stdout(predicate::str::contains("[run-finished]"));
}

/// Runs `sh -c script`, true on exit status 0.
#[cfg(unix)]
fn sh(script: &str) -> bool {
    std::process::Command::new("sh")
        .args(["-c", script])
        .stderr(std::process::Stdio::null())
        .status()
        .unwrap()
        .success()
}

#[cfg(unix)]
#[test]
fn sigterm_shuts_down_cleanly_and_leaves_no_workers() {
    use std::io::Read;
    use std::process::{Command, Stdio};
    use std::time::Instant;

    let mut child = Command::new(env!("CARGO_BIN_EXE_loadwave"))
        .arg("30")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    std::thread::sleep(Duration::from_millis(1500));
    assert!(sh(&format!("kill -TERM {}", child.id())));

    let deadline = Instant::now() + Duration::from_secs(20);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if Instant::now() > deadline {
            let _ = child.kill();
            panic!("orchestrator did not exit after SIGTERM");
        }
        std::thread::sleep(Duration::from_millis(50));
    };
    let mut out = String::new();
    child.stdout.take().unwrap().read_to_string(&mut out).unwrap();

    assert_eq!(status.code(), Some(0), "{out}");
    assert!(out.contains("[shutdown-requested]"), "{out}");
    assert!(out.contains("[run-finished]"), "{out}");
    assert!(!out.contains("[deadline-reached]"), "{out}");

    let pids: Vec<u32> = out
        .lines()
        .filter(|line| line.starts_with("[worker-spawned]"))
        .filter_map(|line| line.split_whitespace().find_map(|t| t.strip_prefix("pid=")))
        .map(|pid| pid.parse().unwrap())
        .collect();
    assert!(pids.len() >= 3, "{out}");
    for pid in pids {
        assert!(!sh(&format!("kill -0 {pid}")), "worker {pid} outlived the run");
    }
}
