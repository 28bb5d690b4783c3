use std::path::PathBuf;

use crate::environment::Environment;

const HISTORY_VAR: &str = "RELAYSH_HISTORY";
const LOG_VAR: &str = "RELAYSH_LOG";
const HISTORY_FILE: &str = ".relaysh_history";
const DEFAULT_LOG_FILTER: &str = "warn";

/// Settings read from the startup environment. The shell takes no flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    pub history_path: Option<PathBuf>,
    pub log_filter: String,
}

impl ShellConfig {
    pub fn from_env(env: &Environment) -> Self {
        let history_path = match env.lookup(HISTORY_VAR) {
            Some("") => None,
            Some(path) => Some(PathBuf::from(path)),
            None => env.lookup("HOME").map(|home| PathBuf::from(home).join(HISTORY_FILE)),
        };
        let log_filter = env
            .lookup(LOG_VAR)
            .filter(|f| !f.is_empty())
            .unwrap_or(DEFAULT_LOG_FILTER)
            .to_string();
        ShellConfig { history_path, log_filter }
    }
}
