//! ScriptedRunner - in-memory CommandRunner for development and tests.
//!
//! Commands never reach the OS. Each program name can be given a responder
//! closure; unscripted programs succeed with empty output. Every call is
//! recorded so tests can assert on what would have been run.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::errors::DumpError;
use crate::ports::{CommandOutput, CommandRunner, CommandSpec};

type Responder = Box<dyn Fn(&CommandSpec) -> Result<CommandOutput, DumpError> + Send + Sync>;

#[derive(Default)]
pub struct ScriptedRunner {
    available: Mutex<HashSet<String>>,
    responders: HashMap<String, Responder>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark programs as present on the search path.
    pub fn with_available(self, programs: &[&str]) -> Self {
        for program in programs {
            self.make_available(program);
        }
        self
    }

    /// Script the response for a program, matched by its file name.
    pub fn on<F>(mut self, program: &str, responder: F) -> Self
    where
        F: Fn(&CommandSpec) -> Result<CommandOutput, DumpError> + Send + Sync + 'static,
    {
        self.responders
            .insert(program.to_string(), Box::new(responder));
        self
    }

    pub fn make_available(&self, program: &str) {
        lock(&self.available).insert(program.to_string());
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<CommandSpec> {
        lock(&self.calls).clone()
    }

    pub fn calls_to(&self, program: &str) -> Vec<CommandSpec> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.program_name() == program)
            .cloned()
            .collect()
    }

    /// Program names in call order, e.g. `["uname", "curl", "dotnet-dump"]`.
    pub fn program_sequence(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .map(|c| c.program_name().to_string())
            .collect()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, DumpError> {
        lock(&self.calls).push(spec.clone());
        match self.responders.get(spec.program_name()) {
            Some(responder) => responder(spec),
            None => Ok(CommandOutput::success()),
        }
    }

    fn is_available(&self, program: &str) -> bool {
        lock(&self.available).contains(program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_calls_and_dispatches_by_name() {
        let runner = ScriptedRunner::new()
            .with_available(&["curl"])
            .on("uname", |_| Ok(CommandOutput::with_stdout("x86_64\n")));

        let out = runner.run(&CommandSpec::new("uname").arg("-m")).await.unwrap();
        assert_eq!(out.stdout, "x86_64\n");

        let out = runner.run(&CommandSpec::new("/usr/bin/true")).await.unwrap();
        assert!(out.is_success());

        assert_eq!(runner.program_sequence(), vec!["uname", "true"]);
        assert!(runner.is_available("curl"));
        assert!(!runner.is_available("apk"));
    }
}
