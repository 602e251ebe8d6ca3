pub mod executor;
pub mod runner;

#[cfg(test)]
pub mod scripted;

pub use executor::{CommandExecutor, CommandResult, ExecOptions, ShellExecutor};
