//! End-to-end tests: drive the `relaysh` binary through a piped stdin.

use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, ExitStatus, Output, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use pretty_assertions::assert_eq;

fn shell(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_relaysh"));
    cmd.current_dir(dir)
        .env("RELAYSH_HISTORY", "")
        // stdin is a pipe, not a tty, so the line editor prints no prompt.
        .env("TERM", "xterm")
        .env_remove("RELAYSH_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd
}

fn run_script(dir: &Path, script: &str) -> Output {
    let mut child = shell(dir).spawn().expect("spawn relaysh");
    child.stdin.take().unwrap().write_all(script.as_bytes()).unwrap();
    child.wait_with_output().unwrap()
}

fn stdout_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout).lines().map(|l| l.trim().to_string()).collect()
}

fn stderr(output: &Output) -> String { String::from_utf8_lossy(&output.stderr).into_owned() }

#[test]
fn pipe_counts_lines() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_script(dir.path(), "echo a | wc -l\n");
    assert!(output.status.success());
    assert_eq!(stdout_lines(&output), vec!["1", "exit"]);
}

#[test]
fn output_redirect_truncates_on_rerun() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), "").unwrap();
    fs::write(dir.path().join("b.txt"), "").unwrap();

    let output = run_script(dir.path(), "ls > out.txt\nls > out.txt\n");
    assert_eq!(stdout_lines(&output), vec!["exit"]);
    assert_eq!(fs::read_to_string(dir.path().join("out.txt")).unwrap(), "a.txt\nb.txt\nout.txt\n");
}

#[test]
fn append_redirect_accumulates() {
    let dir = tempfile::tempdir().unwrap();
    run_script(dir.path(), "echo one >> log.txt\necho two >> log.txt\n");
    assert_eq!(fs::read_to_string(dir.path().join("log.txt")).unwrap(), "one\ntwo\n");
}

#[test]
fn input_redirect_feeds_first_stage() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("in.txt"), "b\nc\na\n").unwrap();
    let output = run_script(dir.path(), "cat < in.txt | sort\n");
    assert_eq!(stdout_lines(&output), vec!["a", "b", "c", "exit"]);
}

#[test]
fn too_many_stages_spawns_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let line = vec!["touch marker"; 65].join(" | ");
    let output = run_script(dir.path(), &format!("{}\n", line));
    assert!(output.status.success());
    assert!(stderr(&output).contains("Too many pipeline stages"));
    assert!(!dir.path().join("marker").exists());
}

#[test]
fn dangling_pipe_is_reported_and_shell_continues() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_script(dir.path(), "echo lost |\necho kept\n");
    assert!(stderr(&output).contains("Syntax Error"));
    assert_eq!(stdout_lines(&output), vec!["kept", "exit"]);
}

#[test]
fn cd_changes_directory_for_later_commands() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    let output = run_script(dir.path(), "cd sub\npwd -P\n");
    let expected = dir.path().join("sub").canonicalize().unwrap();
    assert_eq!(stdout_lines(&output), vec![expected.display().to_string(), "exit".to_string()]);
}

#[test]
fn cd_to_missing_directory_keeps_cwd() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_script(dir.path(), "cd does-not-exist\npwd -P\n");
    let expected = dir.path().canonicalize().unwrap();
    assert!(stderr(&output).contains("cd: does-not-exist"));
    assert_eq!(stdout_lines(&output), vec![expected.display().to_string(), "exit".to_string()]);
}

#[test]
fn cd_ignores_later_stages() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    run_script(dir.path(), "cd sub | touch marker\n");
    assert!(!dir.path().join("marker").exists());
    assert!(!dir.path().join("sub").join("marker").exists());
}

#[test]
fn bare_words_matching_variables_are_substituted() {
    let dir = tempfile::tempdir().unwrap();
    let mut child = shell(dir.path()).env("RELAY_GREETING", "hello").spawn().unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"echo RELAY_GREETING RELAY_UNSET_WORD\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert_eq!(stdout_lines(&output), vec!["hello RELAY_UNSET_WORD", "exit"]);
}

#[test]
fn children_inherit_the_environment() {
    let dir = tempfile::tempdir().unwrap();
    let mut child = shell(dir.path()).env("RELAY_MARK", "inherited").spawn().unwrap();
    child.stdin.take().unwrap().write_all(b"env > env.txt\n").unwrap();
    child.wait_with_output().unwrap();
    let listing = fs::read_to_string(dir.path().join("env.txt")).unwrap();
    assert!(listing.lines().any(|l| l == "RELAY_MARK=inherited"));
}

#[test]
fn missing_program_is_reported_and_shell_continues() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_script(dir.path(), "relaysh-no-such-program\necho still-here\n");
    assert!(stderr(&output).contains("relaysh-no-such-program: command not found"));
    assert_eq!(stdout_lines(&output), vec!["still-here", "exit"]);
}

#[test]
fn blank_lines_are_no_ops() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_script(dir.path(), "\n   \n\t\necho done\n");
    assert!(stderr(&output).is_empty());
    assert_eq!(stdout_lines(&output), vec!["done", "exit"]);
}

#[test]
fn exit_line_stops_the_shell() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_script(dir.path(), "exit\necho unreachable\n");
    assert!(output.status.success());
    assert!(stdout_lines(&output).is_empty());
}

#[test]
fn end_of_input_exits_successfully() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_script(dir.path(), "");
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(stdout_lines(&output), vec!["exit"]);
}

fn send_line(child: &mut Child, line: &str) {
    let stdin = child.stdin.as_mut().unwrap();
    stdin.write_all(line.as_bytes()).unwrap();
    stdin.flush().unwrap();
}

/// Starts the shell and waits until it has answered one command, so its
/// signal handlers are known to be installed.
fn ready_shell(dir: &Path) -> (Child, BufReader<ChildStdout>) {
    let mut child = shell(dir).spawn().unwrap();
    let mut stdout = BufReader::new(child.stdout.take().unwrap());
    send_line(&mut child, "echo ready\n");
    let mut line = String::new();
    stdout.read_line(&mut line).unwrap();
    assert_eq!(line.trim(), "ready");
    (child, stdout)
}

fn finish(mut child: Child, mut stdout: BufReader<ChildStdout>) -> (ExitStatus, Vec<String>) {
    drop(child.stdin.take());
    let mut rest = String::new();
    stdout.read_to_string(&mut rest).unwrap();
    let status = child.wait().unwrap();
    (status, rest.lines().map(|l| l.trim().to_string()).collect())
}

/// Sends `line`, interrupts the shell a second later, and checks that the
/// whole pipeline went away and the shell read the next line.
fn interrupt_pipeline(line: &str) {
    let dir = tempfile::tempdir().unwrap();
    let (mut child, stdout) = ready_shell(dir.path());
    let pid = Pid::from_raw(child.id() as i32);
    let started = Instant::now();

    send_line(&mut child, line);
    sleep(Duration::from_secs(1));
    kill(pid, Signal::SIGINT).unwrap();
    send_line(&mut child, "echo after\n");

    let (status, lines) = finish(child, stdout);
    assert!(started.elapsed() < Duration::from_secs(20), "shell blocked after SIGINT");
    assert!(status.success());
    assert!(lines.contains(&"after".to_string()));
}

#[test]
fn interrupt_ends_the_job_not_the_shell() {
    interrupt_pipeline("sleep 30\n");
}

#[test]
fn interrupt_ends_every_stage() {
    interrupt_pipeline("sleep 30 | sleep 30\n");
}

#[test]
fn interrupt_reaches_stages_left_after_the_last_one_exits() {
    interrupt_pipeline("sleep 30 | true\n");
}

#[test]
fn idle_shell_survives_termination_signals() {
    let dir = tempfile::tempdir().unwrap();
    let (mut child, stdout) = ready_shell(dir.path());
    let pid = Pid::from_raw(child.id() as i32);

    for sig in [Signal::SIGTERM, Signal::SIGHUP, Signal::SIGUSR1, Signal::SIGINT] {
        kill(pid, sig).unwrap();
    }
    sleep(Duration::from_millis(100));
    send_line(&mut child, "echo alive\n");

    let (status, lines) = finish(child, stdout);
    assert!(status.success());
    assert_eq!(lines, vec!["alive", "exit"]);
}
