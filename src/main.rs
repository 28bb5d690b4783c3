/*
 * relaysh - A pipeline shell that relays control signals
 *
 * === Overview ===
 * relaysh reads one line at a time, splits it into a pipeline of external
 * commands joined by pipes and file redirections, and runs that pipeline as a
 * graph of OS processes. Interactive control signals (SIGINT, SIGHUP, SIGTERM,
 * SIGQUIT, SIGCHLD, SIGUSR1, SIGUSR2) are relayed to the running foreground
 * pipeline instead of ending the shell.
 *
 * === Layout ===
 *
 * 1.  **Tokenizing (`logos`):**
 * A line becomes WORD / PIPE / REDIRECT tokens. No quoting, no globbing.
 *
 * 2.  **Environment substitution:**
 * The environment is captured once at startup. Any word that is exactly the
 * name of a variable is replaced by its value, in every position.
 *
 * 3.  **Pipeline compilation:**
 * Tokens are grouped into at most 64 segments, each with its arguments and
 * optional input/output redirections. Pure; nothing is opened or spawned.
 *
 * 4.  **Process graph (`nix`):**
 * All channels are created first, then every stage is forked and exec'd into
 * one process group per pipeline. When stdin is a terminal the group gets it
 * for the duration of the job. The shell waits on the last stage and then
 * reaps the rest.
 *
 * 5.  **Signal relay:**
 * One handler per forwarded signal, installed for the shell's lifetime. It only
 * reads a few atomics and calls `kill` on the foreground process group.
 *
 * 6.  **Interactive prompt (`rustyline`):**
 * `<cwd> $ ` prompt, persistent history, `exit` or Ctrl-D to leave.
 */

// --- Modules for Organization ---
mod types;
mod tokenizer;
mod environment;
mod compiler;
mod executor;
mod signals;
mod builtins;
mod config;
mod shell;
mod error;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

use crate::config::ShellConfig;
use crate::environment::Environment;
use crate::error::RshError;
use crate::shell::Shell;

// --- Main Entry Point ---
fn main() {
    let env = Environment::capture();
    let config = ShellConfig::from_env(&env);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = signals::install() {
        eprintln!("relaysh: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run_interactive_shell(Shell::new(&env).with_terminal(), &config) {
        eprintln!("relaysh: A critical error occurred: {}", e);
        std::process::exit(1);
    }
}

/// Runs the interactive shell loop.
fn run_interactive_shell(mut shell: Shell, config: &ShellConfig) -> Result<(), RshError> {
    let mut rl = DefaultEditor::new().map_err(|e| RshError::Init(e.to_string()))?;

    if let Some(ref path) = config.history_path {
        if path.exists() {
            let _ = rl.load_history(path);
        }
    }

    loop {
        shell.begin_cycle();
        let readline = rl.readline(&shell.prompt());

        match readline {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = rl.add_history_entry(line.as_str());
                }
                if Shell::is_exit(&line) {
                    break;
                }
                if let Err(e) = shell.process_input(&line) {
                    eprintln!("relaysh: {}", e);
                }
            }
            Err(ReadlineError::Interrupted) => { // Ctrl-C at the prompt
                println!("^C");
            }
            Err(ReadlineError::Eof) => { // Ctrl-D
                println!("exit");
                break;
            }
            Err(err) => {
                eprintln!("relaysh: Readline error: {}", err);
                break;
            }
        }
    }

    if let Some(ref path) = config.history_path {
        if let Err(e) = rl.save_history(path) {
            tracing::debug!(path = %path.display(), error = %e, "history not saved");
        }
    }
    tracing::debug!(last_status = ?shell.last_status(), "leaving shell");

    Ok(())
}
