// A container runtime is docker/podman.

use std::{
    fmt, io,
    process::Output,
    sync::{Arc, LazyLock},
};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::{
    backends::{
        compose::ComposeRequest, container_record::ContainerRecord, docker::Docker,
        podman::Podman,
    },
    fakers::{Command, CommandRunner, FdMode},
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to spawn command {command}: {source}")]
    Spawn { source: io::Error, command: String },

    #[error("command failed with exit code {exit_code:?}: {command}\n{stderr}")]
    CommandFailed {
        exit_code: Option<i32>,
        command: String,
        stderr: String,
    },

    #[error("failed to parse command output: {0}")]
    ParseOutput(String),

    #[error("invalid field {0}: {1}")]
    InvalidField(String, String),

    #[error("No container engine available")]
    NoEngine,
}

impl Error {
    /// Text shown to the user for a failed operation: stderr when the
    /// engine produced some, the error itself otherwise.
    pub fn user_output(&self) -> String {
        match self {
            Error::CommandFailed { stderr, .. } if !stderr.trim().is_empty() => {
                stderr.trim().to_string()
            }
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Docker,
    Podman,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Docker => "docker",
            EngineKind::Podman => "podman",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static CONTAINER_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_.-]*$").unwrap());

/// A container id or name that is safe to pass to the engine CLI.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerRef(String);

impl ContainerRef {
    pub fn new(value: &str) -> Result<Self, Error> {
        if CONTAINER_REF.is_match(value) {
            Ok(ContainerRef(value.to_string()))
        } else {
            Err(Error::InvalidField(
                "container".into(),
                "Must respect the format [a-zA-Z0-9][a-zA-Z0-9_.-]*".into(),
            ))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<std::ffi::OsStr> for ContainerRef {
    fn as_ref(&self) -> &std::ffi::OsStr {
        self.0.as_ref()
    }
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    fn kind(&self) -> EngineKind;
    fn name(&self) -> &'static str {
        self.kind().as_str()
    }
    async fn version(&self) -> Result<String, Error>;
    async fn list_containers(&self) -> Result<Vec<ContainerRecord>, Error>;
    async fn start(&self, container: &ContainerRef) -> Result<String, Error>;
    async fn stop(&self, container: &ContainerRef) -> Result<String, Error>;
    async fn restart(&self, container: &ContainerRef) -> Result<String, Error>;
    async fn logs(&self, container: &ContainerRef, lines: u32) -> Result<String, Error>;
    /// Runs `compose`; a non-zero exit is not an error here, the raw output is returned.
    async fn compose(&self, request: &ComposeRequest) -> Result<Output, Error>;
}

/// Detects the available engine. Podman is preferred when both are installed
/// because it is rootless by default. An explicit `preference` skips the
/// other engine but is still verified with `--version`.
pub async fn get_container_runtime(
    command_runner: CommandRunner,
    preference: Option<EngineKind>,
) -> Option<Arc<dyn ContainerRuntime>> {
    let candidates = match preference {
        Some(kind) => vec![kind],
        None => vec![EngineKind::Podman, EngineKind::Docker],
    };
    let mut failures = Vec::new();
    for kind in candidates {
        let runtime: Arc<dyn ContainerRuntime> = match kind {
            EngineKind::Podman => Arc::new(Podman::new(command_runner.clone())),
            EngineKind::Docker => Arc::new(Docker::new(command_runner.clone())),
        };
        match runtime.version().await {
            Ok(version) => {
                info!(engine = %kind, version = %version, "Container runtime detected");
                return Some(runtime);
            }
            Err(e) => failures.push((kind, e.to_string())),
        }
    }
    info!(failures = ?failures, "No container runtime available");
    None
}

pub(crate) async fn cmd_output(runner: &CommandRunner, mut cmd: Command) -> Result<Output, Error> {
    cmd.stdout = FdMode::Pipe;
    cmd.stderr = FdMode::Pipe;

    let program = cmd.program.to_string_lossy().to_string();
    let args = cmd
        .args
        .iter()
        .map(|arg| arg.to_string_lossy().to_string())
        .collect::<Vec<_>>();

    info!(command = %program, args = ?args, "Executing command");
    let command_str = cmd.to_string();

    let output = runner.output(cmd).await.map_err(|e| {
        error!(error = ?e, command = %program, "Command execution failed");
        Error::Spawn {
            source: e,
            command: command_str,
        }
    })?;

    debug!(exit_code = ?output.status.code(), "Command completed");
    Ok(output)
}

pub(crate) async fn cmd_output_string(runner: &CommandRunner, cmd: Command) -> Result<String, Error> {
    let command_str = cmd.to_string();
    let output = cmd_output(runner, cmd).await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let exit_code = output.status.code();
        error!(exit_code = ?exit_code, stderr = %stderr, "Command failed");
        return Err(Error::CommandFailed {
            exit_code,
            command: command_str,
            stderr,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakers::NullCommandRunnerBuilder;
    use smol::block_on;

    #[test]
    fn container_ref_validation() {
        assert!(ContainerRef::new("3f2a9c1b7d4e").is_ok());
        assert!(ContainerRef::new("ollama_webui.1-x").is_ok());
        assert!(ContainerRef::new("").is_err());
        assert!(ContainerRef::new("-rm").is_err());
        assert!(ContainerRef::new("a b").is_err());
        assert!(ContainerRef::new("x;rm -rf /").is_err());
    }

    #[test]
    fn prefers_podman() {
        let runner = NullCommandRunnerBuilder::new()
            .cmd(&["podman", "--version"], "podman version 5.2.0")
            .cmd(&["docker", "--version"], "Docker version 27.0.3")
            .build();
        let runtime = block_on(get_container_runtime(runner, None)).unwrap();
        assert_eq!(runtime.kind(), EngineKind::Podman);
    }

    #[test]
    fn falls_back_to_docker() {
        let runner = NullCommandRunnerBuilder::new()
            .cmd(&["docker", "--version"], "Docker version 27.0.3")
            .build();
        let runtime = block_on(get_container_runtime(runner, None)).unwrap();
        assert_eq!(runtime.name(), "docker");
    }

    #[test]
    fn no_engine_installed() {
        let runner = NullCommandRunnerBuilder::new().build();
        assert!(block_on(get_container_runtime(runner, None)).is_none());
    }

    #[test]
    fn preference_is_verified() {
        let runner = NullCommandRunnerBuilder::new()
            .cmd(&["podman", "--version"], "podman version 5.2.0")
            .build();
        assert!(block_on(get_container_runtime(runner.clone(), Some(EngineKind::Docker))).is_none());
        let runtime = block_on(get_container_runtime(runner, Some(EngineKind::Podman))).unwrap();
        assert_eq!(runtime.kind(), EngineKind::Podman);
    }

    #[test]
    fn failing_command_carries_stderr() {
        let runner = NullCommandRunnerBuilder::new()
            .cmd_failing(&["docker", "start", "nope"], 1, "Error: No such container: nope")
            .build();
        let err = block_on(cmd_output_string(
            &runner,
            Command::new_with_args("docker", ["start", "nope"]),
        ))
        .unwrap_err();
        assert!(matches!(err, Error::CommandFailed { exit_code: Some(1), .. }));
        assert_eq!(err.user_output(), "Error: No such container: nope");
    }
}
