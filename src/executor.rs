use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::fs::OpenOptionsExt;

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::signal::Signal;
use nix::sys::wait::{waitid, waitpid, Id, WaitPidFlag, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};
use tracing::{debug, warn};

use crate::builtins;
use crate::environment::Environment;
use crate::error::RshError;
use crate::signals;
use crate::types::*;

/// How the last stage of a pipeline ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitState {
    Exited(i32),
    Signaled(Signal),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Blank line, or an interrupt was already recorded this cycle.
    Skipped,
    Builtin,
    Finished(ExitState),
}

trait WaitStatusExt {
    fn exit_state(self) -> Option<ExitState>;
}

impl WaitStatusExt for WaitStatus {
    fn exit_state(self) -> Option<ExitState> {
        match self {
            WaitStatus::Exited(_, code) => Some(ExitState::Exited(code)),
            WaitStatus::Signaled(_, sig, _) => Some(ExitState::Signaled(sig)),
            _ => None,
        }
    }
}

/// Unidirectional channel between stage `i` (writer) and stage `i + 1` (reader).
struct Channel {
    read: OwnedFd,
    write: OwnedFd,
}

/// Turns compiled pipelines into processes and waits for them.
pub struct Executor<'a> {
    env: &'a Environment,
    /// Stages left running after a fork failure cut their pipeline short.
    strays: Vec<Pid>,
    /// The shell's own process group, set when stdin is a terminal that each
    /// job borrows while it runs.
    terminal: Option<Pid>,
}

impl<'a> Executor<'a> {
    pub fn new(env: &'a Environment) -> Self {
        Executor { env, strays: Vec::new(), terminal: None }
    }

    pub fn attach_terminal(&mut self) {
        if unistd::isatty(libc::STDIN_FILENO).unwrap_or(false) {
            self.terminal = Some(unistd::getpgrp());
        }
    }

    fn hand_terminal(&self, group: Pid) {
        if self.terminal.is_some() {
            if let Err(e) = unistd::tcsetpgrp(io::stdin(), group) {
                debug!(group = group.as_raw(), error = %e, "terminal not handed to job");
            }
        }
    }

    fn reclaim_terminal(&self) {
        if let Some(shell) = self.terminal {
            if let Err(e) = unistd::tcsetpgrp(io::stdin(), shell) {
                warn!(error = %e, "cannot take the terminal back");
            }
        }
    }

    /// Non-blocking poll of stray stages; finished ones are dropped from the list.
    pub fn reap_strays(&mut self) {
        self.strays.retain(|&pid| match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) | Err(Errno::EINTR) => true,
            Ok(status) => {
                debug!(pid = pid.as_raw(), ?status, "reaped stray stage");
                false
            }
            Err(e) => {
                warn!(pid = pid.as_raw(), error = %e, "lost track of stray stage");
                false
            }
        });
    }

    pub fn run(&mut self, pipeline: &Pipeline) -> Result<Completion, RshError> {
        if let Some(sig) = signals::interrupted() {
            debug!(signal = %sig, "pipeline suppressed by earlier interrupt");
            return Ok(Completion::Skipped);
        }
        if pipeline.is_blank() {
            return Ok(Completion::Skipped);
        }

        let first = pipeline.first();
        if let Some(builtin) = first.program().and_then(builtins::lookup) {
            builtin(&first.args[1..])?;
            return Ok(Completion::Builtin);
        }

        let argvs = pipeline.segments().iter().map(argv).collect::<Result<Vec<_>, _>>()?;
        let pids = self.spawn_all(pipeline, &argvs)?;
        self.supervise(&pids)
    }

    /// Creates every channel, then forks every stage into one process group led
    /// by the first stage. Channels are closed in the parent before returning,
    /// on success and on failure alike.
    fn spawn_all(&mut self, pipeline: &Pipeline, argvs: &[Vec<CString>]) -> Result<Vec<Pid>, RshError> {
        let stages = pipeline.segments();
        let channels = (1..stages.len())
            .map(|_| {
                unistd::pipe2(OFlag::O_CLOEXEC)
                    .map(|(read, write)| Channel { read, write })
                    .map_err(RshError::Pipe)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut pids = Vec::with_capacity(stages.len());
        for (index, stage) in stages.iter().enumerate() {
            let group = pids.first().copied();
            match unsafe { unistd::fork() } {
                Ok(ForkResult::Child) => self.exec_stage(index, stage, group, &argvs[index], &channels),
                Ok(ForkResult::Parent { child }) => {
                    // The child does the same; either may run first.
                    if let Err(e) = unistd::setpgid(child, group.unwrap_or(child)) {
                        debug!(pid = child.as_raw(), error = %e, "setpgid from parent");
                    }
                    debug!(stage = index, pid = child.as_raw(), program = ?stage.program(), "spawned stage");
                    pids.push(child);
                }
                Err(source) => {
                    self.reclaim_terminal();
                    self.strays.extend(pids);
                    return Err(RshError::Spawn { stage: index, source });
                }
            }
        }
        Ok(pids)
    }

    /// Blocks until the last stage is gone, then collects the others.
    fn supervise(&mut self, pids: &[Pid]) -> Result<Completion, RshError> {
        let Some((&last, earlier)) = pids.split_last() else {
            return Ok(Completion::Skipped);
        };
        let group = pids[0];

        signals::register(group, last);
        self.hand_terminal(group);
        // Observe the exit without reaping. While the last stage stays a zombie
        // neither its pid nor the group id can be recycled, so the handler may
        // keep signalling the group until every earlier stage is reaped.
        let observed = retry_eintr(|| waitid(Id::Pid(last), WaitPidFlag::WEXITED | WaitPidFlag::WNOWAIT));
        for &pid in earlier {
            match retry_eintr(|| waitpid(pid, None)) {
                Ok(status) => debug!(pid = pid.as_raw(), ?status, "reaped stage"),
                Err(e) => warn!(pid = pid.as_raw(), error = %e, "could not reap stage"),
            }
        }
        signals::clear();

        let reaped = retry_eintr(|| waitpid(last, None));
        self.reclaim_terminal();

        observed.map_err(RshError::Wait)?;
        let status = reaped.map_err(RshError::Wait)?;
        debug!(pid = last.as_raw(), ?status, "pipeline finished");
        Ok(status.exit_state().map_or(Completion::Skipped, Completion::Finished))
    }

    // --- Child side ---

    fn exec_stage(&self, index: usize, stage: &Segment, group: Option<Pid>, argv: &[CString], channels: &[Channel]) -> ! {
        let group = group.unwrap_or_else(unistd::getpid);
        let _ = unistd::setpgid(Pid::from_raw(0), group);
        if self.terminal.is_some() {
            // Still ignoring SIGTTOU here, so a background group may take it.
            let _ = unistd::tcsetpgrp(io::stdin(), group);
        }
        signals::restore_defaults();
        let code = match wire_stage(index, stage, channels) {
            Ok(()) => match unistd::execvpe(&argv[0], argv, self.env.envp()) {
                Ok(never) => match never {},
                Err(Errno::ENOENT) => {
                    eprintln!("relaysh: {}: command not found", argv[0].to_string_lossy());
                    127
                }
                Err(e) => {
                    eprintln!("relaysh: {}: {}", argv[0].to_string_lossy(), e.desc());
                    126
                }
            },
            Err(message) => {
                eprintln!("relaysh: {}", message);
                1
            }
        };
        unsafe { libc::_exit(code) }
    }
}

/// Points stdin/stdout of the current (child) process at the stage's source and
/// destination. Every other descriptor is close-on-exec.
fn wire_stage(index: usize, stage: &Segment, channels: &[Channel]) -> Result<(), String> {
    let input = match &stage.redirect_in {
        Some(path) => Some(File::open(path).map_err(|e| format!("{}: {}", path.display(), e))?),
        None => None,
    };
    let output = match &stage.redirect_out {
        Some(redirect) => Some(open_output(redirect).map_err(|e| format!("{}: {}", redirect.path.display(), e))?),
        None => None,
    };

    let stdin = match (&input, index) {
        (Some(file), _) => Some(file.as_raw_fd()),
        (None, 0) => None,
        (None, i) => Some(channels[i - 1].read.as_raw_fd()),
    };
    let stdout = match (&output, channels.get(index)) {
        (Some(file), _) => Some(file.as_raw_fd()),
        (None, Some(channel)) => Some(channel.write.as_raw_fd()),
        (None, None) => None,
    };

    if let Some(fd) = stdin {
        unistd::dup2(fd, libc::STDIN_FILENO).map_err(|e| format!("cannot wire stdin: {}", e))?;
    }
    if let Some(fd) = stdout {
        unistd::dup2(fd, libc::STDOUT_FILENO).map_err(|e| format!("cannot wire stdout: {}", e))?;
    }
    Ok(())
}

fn open_output(redirect: &OutputRedirect) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).mode(0o644);
    match redirect.mode {
        RedirectMode::Truncate => options.truncate(true),
        RedirectMode::Append => options.append(true),
    };
    options.open(&redirect.path)
}

fn argv(stage: &Segment) -> Result<Vec<CString>, RshError> {
    stage
        .args
        .iter()
        .map(|arg| CString::new(arg.as_str()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| RshError::Syntax("arguments may not contain NUL bytes".into()))
}

fn retry_eintr<T>(mut call: impl FnMut() -> nix::Result<T>) -> nix::Result<T> {
    loop {
        match call() {
            Err(Errno::EINTR) => continue,
            other => return other,
        }
    }
}
