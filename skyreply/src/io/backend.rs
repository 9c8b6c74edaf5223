//! Generative backend abstraction.
//!
//! The [`Backend`] trait decouples the pipeline stages from the text
//! generator. [`CommandBackend`] spawns a local command per completion,
//! [`ChatBackend`](crate::io::chat::ChatBackend) talks to an OpenAI-compatible
//! endpoint. Tests use scripted backends that return queued outputs.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::core::router::Persona;
use crate::io::chat::ChatBackend;
use crate::io::config::{BackendConfig, CommandBackendConfig};
use crate::io::process::{ProcessLimits, run_with_input};

/// Lines of stderr quoted in command failure messages.
const STDERR_TAIL_LINES: usize = 5;

/// Persona-aware text generator.
///
/// No structural guarantee on the returned text; it may be empty.
pub trait Backend {
    fn complete(&self, persona: Persona, prompt: &str) -> Result<String>;
}

/// Backend that spawns a configured command and writes the prompt to stdin.
#[derive(Debug, Clone)]
pub struct CommandBackend {
    command: Vec<String>,
    limits: ProcessLimits,
}

impl CommandBackend {
    pub fn new(config: &CommandBackendConfig) -> Self {
        Self {
            command: config.command.clone(),
            limits: ProcessLimits {
                timeout: Duration::from_secs(config.timeout_secs),
                output_limit_bytes: config.output_limit_bytes,
            },
        }
    }
}

impl Backend for CommandBackend {
    #[instrument(
        skip_all,
        fields(persona = %persona, timeout_secs = self.limits.timeout.as_secs())
    )]
    fn complete(&self, persona: Persona, prompt: &str) -> Result<String> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("backend command is empty"))?;
        info!(program = %program, "starting backend command");

        let mut cmd = Command::new(program);
        cmd.args(args);
        let input = command_input(persona, prompt);
        let output = run_with_input(cmd, input.as_bytes(), self.limits)
            .with_context(|| format!("run backend command {program}"))?;

        if output.timed_out {
            warn!(timeout_secs = self.limits.timeout.as_secs(), "backend command timed out");
            return Err(anyhow!("backend command timed out after {:?}", self.limits.timeout));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "backend command failed");
            return Err(anyhow!(
                "backend command failed with status {:?}: {}",
                output.status.code(),
                output.stderr_tail(STDERR_TAIL_LINES)
            ));
        }

        let text = output.stdout_text();
        debug!(chars = text.chars().count(), "backend command completed");
        Ok(text)
    }
}

/// Stdin payload: persona system message, blank line, prompt.
fn command_input(persona: Persona, prompt: &str) -> String {
    format!("{}\n\n{}\n", persona.system_message(), prompt.trim_end())
}

/// Backend chosen by configuration.
pub enum ConfiguredBackend {
    Command(CommandBackend),
    Chat(ChatBackend),
}

impl ConfiguredBackend {
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        match config {
            BackendConfig::Command(cfg) => Ok(Self::Command(CommandBackend::new(cfg))),
            BackendConfig::Chat(cfg) => Ok(Self::Chat(ChatBackend::from_config(cfg)?)),
        }
    }
}

impl Backend for ConfiguredBackend {
    fn complete(&self, persona: Persona, prompt: &str) -> Result<String> {
        match self {
            Self::Command(backend) => backend.complete(persona, prompt),
            Self::Chat(backend) => backend.complete(persona, prompt),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn backend(command: &[&str]) -> CommandBackend {
        CommandBackend::new(&CommandBackendConfig {
            command: command.iter().map(|s| s.to_string()).collect(),
            timeout_secs: 5,
            output_limit_bytes: 10_000,
        })
    }

    #[test]
    fn command_receives_system_message_and_prompt() {
        let out = backend(&["cat"])
            .complete(Persona::Mediator, "reply to this")
            .expect("complete");
        assert!(out.starts_with(Persona::Mediator.system_message()));
        assert!(out.trim_end().ends_with("reply to this"));
    }

    #[test]
    fn non_zero_exit_is_an_error_with_stderr() {
        let err = backend(&["sh", "-c", "echo quota exceeded >&2; exit 2"])
            .complete(Persona::Advocate, "p")
            .unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("quota exceeded"), "{msg}");
    }

    #[test]
    fn empty_output_is_not_an_error() {
        let out = backend(&["true"])
            .complete(Persona::Strategist, "p")
            .expect("complete");
        assert!(out.is_empty());
    }

    #[test]
    fn missing_program_is_an_error() {
        let err = backend(&["skyreply-no-such-program"])
            .complete(Persona::Strategist, "p")
            .unwrap_err();
        assert!(format!("{err:#}").contains("skyreply-no-such-program"));
    }
}
