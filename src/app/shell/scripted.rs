use std::collections::VecDeque;
use std::sync::Mutex;

use crate::app::error::AppError;
use crate::app::shell::executor::{CommandExecutor, CommandResult, ExecOptions};

struct Rule {
    pattern: String,
    responses: VecDeque<CommandResult>,
}

/// In-memory executor for tests: answers by substring match and records every command line.
#[derive(Default)]
pub struct ScriptedExecutor {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<(String, ExecOptions)>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands containing `pattern` answer with `result`. Earlier rules win.
    pub fn on(self, pattern: &str, result: CommandResult) -> Self {
        self.on_sequence(pattern, vec![result])
    }

    /// Answers in order; the last response repeats once the others are used up.
    pub fn on_sequence(self, pattern: &str, results: Vec<CommandResult>) -> Self {
        self.rules.lock().expect("rules").push(Rule {
            pattern: pattern.to_string(),
            responses: results.into(),
        });
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .expect("calls")
            .iter()
            .map(|(command, _)| command.clone())
            .collect()
    }

    pub fn options_for(&self, pattern: &str) -> Option<ExecOptions> {
        self.calls
            .lock()
            .expect("calls")
            .iter()
            .find(|(command, _)| command.contains(pattern))
            .map(|(_, options)| options.clone())
    }

    pub fn count(&self, pattern: &str) -> usize {
        self.calls()
            .iter()
            .filter(|command| command.contains(pattern))
            .count()
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn execute(&self, command: &str, options: &ExecOptions, trace_id: &str) -> CommandResult {
        self.calls
            .lock()
            .expect("calls")
            .push((command.to_string(), options.clone()));

        let mut rules = self.rules.lock().expect("rules");
        for rule in rules.iter_mut() {
            if !command.contains(&rule.pattern) {
                continue;
            }
            let response = if rule.responses.len() > 1 {
                rule.responses.pop_front()
            } else {
                rule.responses.front().cloned()
            };
            if let Some(response) = response {
                return response.map_err(|mut err| {
                    err.trace_id = trace_id.to_string();
                    err
                });
            }
        }
        Err(AppError::non_zero_exit(
            format!("no scripted response for: {command}"),
            trace_id,
        ))
    }
}
