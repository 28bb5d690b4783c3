use nix::errno::Errno;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RshError {
    #[error("Initialization failed: {0}")]
    Init(String),
    #[error("Syntax Error: {0}")]
    Syntax(String),
    #[error("Too many pipeline stages (limit is {limit})")]
    CapacityExceeded { limit: usize },
    #[error("Cannot create pipe: {0}")]
    Pipe(Errno),
    #[error("Failed to start stage {stage}: {source}")]
    Spawn { stage: usize, source: Errno },
    #[error("Wait failed: {0}")]
    Wait(Errno),
    #[error("Cannot install signal handlers: {0}")]
    SignalInstall(Errno),
    #[error("{0}")]
    Builtin(String),
}
