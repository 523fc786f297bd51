use std::process::Output;

use async_trait::async_trait;
use tracing::debug;

use crate::{
    backends::{
        compose::ComposeRequest,
        container_record::{ContainerRecord, parse_container_list},
        container_runtime::{
            ContainerRef, ContainerRuntime, EngineKind, Error, cmd_output, cmd_output_string,
        },
    },
    fakers::{Command, CommandRunner},
};

pub(crate) struct Docker {
    pub cmd_runner: CommandRunner,
    kind: EngineKind,
}

impl Docker {
    pub fn new(cmd_runner: CommandRunner) -> Self {
        Self {
            cmd_runner,
            kind: EngineKind::Docker,
        }
    }

    /// Same CLI surface, different engine tag on the records.
    pub(crate) fn with_kind(cmd_runner: CommandRunner, kind: EngineKind) -> Self {
        Self { cmd_runner, kind }
    }

    async fn container_cmd(&self, verb: &str, container: &ContainerRef) -> Result<String, Error> {
        let cmd = Command::new_with_args("docker", [verb, container.as_str()]);
        let out = cmd_output_string(&self.cmd_runner, cmd).await?;
        Ok(out.trim().to_string())
    }
}

#[async_trait]
impl ContainerRuntime for Docker {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    async fn version(&self) -> Result<String, Error> {
        let mut cmd = Command::new("docker");
        cmd.arg("--version");

        let output = cmd_output_string(&self.cmd_runner, cmd).await?;

        Ok(output.trim().to_string())
    }

    async fn list_containers(&self) -> Result<Vec<ContainerRecord>, Error> {
        let mut cmd = Command::new("docker");
        cmd.args(["ps", "-a", "--format", "json"]);

        let output = cmd_output_string(&self.cmd_runner, cmd).await?;
        let records = parse_container_list(&output, self.kind)?;
        debug!(engine = %self.kind, count = records.len(), "Listed containers");
        Ok(records)
    }

    async fn start(&self, container: &ContainerRef) -> Result<String, Error> {
        self.container_cmd("start", container).await
    }

    async fn stop(&self, container: &ContainerRef) -> Result<String, Error> {
        self.container_cmd("stop", container).await
    }

    async fn restart(&self, container: &ContainerRef) -> Result<String, Error> {
        self.container_cmd("restart", container).await
    }

    async fn logs(&self, container: &ContainerRef, lines: u32) -> Result<String, Error> {
        let mut cmd = Command::new("docker");
        cmd.arg("logs")
            .arg("--tail")
            .arg(lines.to_string())
            .arg(container);

        let command_str = cmd.to_string();
        let output = cmd_output(&self.cmd_runner, cmd).await?;
        // containers write their logs to both streams
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        if !output.status.success() {
            return Err(Error::CommandFailed {
                exit_code: output.status.code(),
                command: command_str,
                stderr: text,
            });
        }
        Ok(text)
    }

    async fn compose(&self, request: &ComposeRequest) -> Result<Output, Error> {
        cmd_output(&self.cmd_runner, request.to_command()).await
    }
}
