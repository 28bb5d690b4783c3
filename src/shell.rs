use std::env;

use nix::sys::signal::Signal;
use tracing::debug;

use crate::compiler;
use crate::environment::Environment;
use crate::error::RshError;
use crate::executor::{Completion, ExitState, Executor};
use crate::signals;
use crate::tokenizer;

/// State that outlives a single prompt cycle.
pub struct Shell<'a> {
    env: &'a Environment,
    executor: Executor<'a>,
    last_status: Option<ExitState>,
}

impl<'a> Shell<'a> {
    pub fn new(env: &'a Environment) -> Self {
        Shell { env, executor: Executor::new(env), last_status: None }
    }

    /// Lends the controlling terminal to each job when stdin is one.
    pub fn with_terminal(mut self) -> Self {
        self.executor.attach_terminal();
        self
    }

    pub fn last_status(&self) -> Option<ExitState> { self.last_status }

    /// Start of a prompt cycle: forget any foreground job and collect strays.
    pub fn begin_cycle(&mut self) {
        if let Some(group) = signals::foreground() {
            debug!(group = group.as_raw(), "dropping stale foreground job");
        }
        signals::reset();
        self.executor.reap_strays();
    }

    pub fn prompt(&self) -> String {
        let cwd = env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "?".to_string());
        format!("{} $ ", cwd)
    }

    pub fn is_exit(line: &str) -> bool { line.trim() == "exit" }

    /// Tokenizes, compiles and runs one line. The compiled pipeline is dropped
    /// as a whole when this returns.
    pub fn process_input(&mut self, line: &str) -> Result<Completion, RshError> {
        let tokens = tokenizer::tokenize(line)?;
        let pipeline = compiler::compile(tokens, self.env)?;
        let completion = self.executor.run(&pipeline)?;
        if let Completion::Finished(state) = completion {
            self.last_status = Some(state);
            debug!(?state, "last stage finished");
            report(state);
        }
        Ok(completion)
    }
}

fn report(state: ExitState) {
    match state {
        ExitState::Exited(_) => {}
        // The terminal already echoed ^C; move the prompt to a fresh line.
        ExitState::Signaled(Signal::SIGINT) => println!(),
        ExitState::Signaled(Signal::SIGPIPE) => {}
        ExitState::Signaled(sig) => eprintln!("relaysh: terminated by {}", sig),
    }
}
