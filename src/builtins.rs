use std::env;

use crate::error::RshError;
use crate::types::BuiltinFunction;

/// Builtins run inside the shell process instead of being spawned.
pub fn lookup(name: &str) -> Option<BuiltinFunction> {
    match name {
        "cd" => Some(cd),
        _ => None,
    }
}

fn cd(args: &[String]) -> Result<(), RshError> {
    let target = args.first().ok_or_else(|| RshError::Builtin("cd: missing operand".into()))?;
    env::set_current_dir(target).map_err(|e| RshError::Builtin(format!("cd: {}: {}", target, e)))?;
    tracing::debug!(cwd = %target, "changed directory");
    Ok(())
}
