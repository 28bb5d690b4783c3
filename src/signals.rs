//! Relays interactive control signals to the foreground job.
//!
//! The shell installs one handler for every forwarded signal at startup and
//! keeps it for its whole lifetime. The handler only touches the atomics
//! below and calls `kill`; everything else about the foreground job lives on
//! the main loop's side.
//!
//! Every pipeline runs in its own process group, so a relayed signal reaches
//! all of its stages at once.

use std::sync::atomic::{AtomicI32, Ordering};

use nix::errno::Errno;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd::Pid;

use crate::error::RshError;

pub const FORWARDED: [Signal; 7] = [
    Signal::SIGINT,
    Signal::SIGHUP,
    Signal::SIGTERM,
    Signal::SIGQUIT,
    Signal::SIGCHLD,
    Signal::SIGUSR1,
    Signal::SIGUSR2,
];

/// Process group of the running pipeline, 0 when idle.
static FOREGROUND: AtomicI32 = AtomicI32::new(0);
/// Pid of the running pipeline's last stage, 0 when idle.
static FOREGROUND_LAST: AtomicI32 = AtomicI32::new(0);
/// Last signal relayed during this prompt cycle, 0 when none.
static INTERRUPTED: AtomicI32 = AtomicI32::new(0);

extern "C" fn relay(signo: libc::c_int, info: *mut libc::siginfo_t, _context: *mut libc::c_void) {
    let saved = Errno::last_raw();
    let group = FOREGROUND.load(Ordering::SeqCst);
    if group != 0 {
        let sender = if info.is_null() { 0 } else { unsafe { (*info).si_pid() } };
        // An earlier stage exiting also lands here as SIGCHLD. The group
        // ignores it by default, and the pipeline is already launched, so the
        // recorded interrupt suppresses nothing.
        if sender != FOREGROUND_LAST.load(Ordering::SeqCst) {
            INTERRUPTED.store(signo, Ordering::SeqCst);
            unsafe { libc::kill(-group, signo) };
        }
    }
    Errno::set_raw(saved);
}

pub fn install() -> Result<(), RshError> {
    let action = SigAction::new(
        SigHandler::SigAction(relay),
        SaFlags::SA_SIGINFO | SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    for sig in FORWARDED {
        unsafe { signal::sigaction(sig, &action) }.map_err(RshError::SignalInstall)?;
    }
    // Taking the terminal back from a finished job must not stop the shell.
    let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
    unsafe { signal::sigaction(Signal::SIGTTOU, &ignore) }.map_err(RshError::SignalInstall)?;
    Ok(())
}

/// Puts the forwarded signals and SIGTTOU back to their default disposition.
/// Called in a forked child right before `exec`.
pub fn restore_defaults() {
    let default = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    for sig in FORWARDED.into_iter().chain([Signal::SIGTTOU]) {
        let _ = unsafe { signal::sigaction(sig, &default) };
    }
}

// --- Foreground job state ---

/// Start of a prompt cycle: no job, nothing recorded.
pub fn reset() {
    clear();
    INTERRUPTED.store(0, Ordering::SeqCst);
}

/// Makes `group` the relay target. Signals sent by `last` itself are not
/// echoed back to the job.
pub fn register(group: Pid, last: Pid) {
    FOREGROUND_LAST.store(last.as_raw(), Ordering::SeqCst);
    FOREGROUND.store(group.as_raw(), Ordering::SeqCst);
}

pub fn clear() {
    FOREGROUND.store(0, Ordering::SeqCst);
    FOREGROUND_LAST.store(0, Ordering::SeqCst);
}

/// Process group of the running pipeline.
pub fn foreground() -> Option<Pid> {
    match FOREGROUND.load(Ordering::SeqCst) {
        0 => None,
        pid => Some(Pid::from_raw(pid)),
    }
}

pub fn interrupted() -> Option<Signal> {
    match INTERRUPTED.load(Ordering::SeqCst) {
        0 => None,
        signo => Signal::try_from(signo).ok(),
    }
}

/// Serializes tests that touch the process-wide foreground state.
#[cfg(test)]
pub(crate) static TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
pub(crate) fn record_interrupt(sig: Signal) { INTERRUPTED.store(sig as i32, Ordering::SeqCst); }
