use std::process::Output;

use async_trait::async_trait;

use crate::{
    backends::{
        compose::ComposeRequest,
        container_record::ContainerRecord,
        container_runtime::{ContainerRef, ContainerRuntime, EngineKind, Error},
        docker::Docker,
    },
    fakers::{Command, CommandRunner},
};

pub fn map_docker_to_podman(mut command: Command) -> Command {
    if command.program == "docker" {
        command.program = "podman".into();
    }
    command
}

// This is a wrapper around Docker that maps commands to Podman
pub struct Podman {
    docker: Docker,
}

impl Podman {
    pub fn new(cmd_runner: CommandRunner) -> Self {
        Self {
            docker: Docker::with_kind(cmd_runner.map_cmd(map_docker_to_podman), EngineKind::Podman),
        }
    }
}

#[async_trait]
impl ContainerRuntime for Podman {
    fn kind(&self) -> EngineKind {
        EngineKind::Podman
    }

    async fn version(&self) -> Result<String, Error> {
        self.docker.version().await
    }

    async fn list_containers(&self) -> Result<Vec<ContainerRecord>, Error> {
        self.docker.list_containers().await
    }

    async fn start(&self, container: &ContainerRef) -> Result<String, Error> {
        self.docker.start(container).await
    }

    async fn stop(&self, container: &ContainerRef) -> Result<String, Error> {
        self.docker.stop(container).await
    }

    async fn restart(&self, container: &ContainerRef) -> Result<String, Error> {
        self.docker.restart(container).await
    }

    async fn logs(&self, container: &ContainerRef, lines: u32) -> Result<String, Error> {
        self.docker.logs(container, lines).await
    }

    async fn compose(&self, request: &ComposeRequest) -> Result<Output, Error> {
        self.docker.compose(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakers::{CommandRunnerEvent, NullCommandRunnerBuilder};
    use smol::block_on;

    #[test]
    fn commands_are_sent_to_podman() -> Result<(), Error> {
        let runner = NullCommandRunnerBuilder::new()
            .cmd(&["podman", "stop", "n8n"], "n8n")
            .build();
        let tracker = runner.output_tracker();
        let podman = Podman::new(runner);

        assert_eq!(block_on(podman.stop(&ContainerRef::new("n8n")?))?, "n8n");
        let started: Vec<_> = tracker
            .items()
            .into_iter()
            .filter_map(|e| match e {
                CommandRunnerEvent::Started(_, cmd) => Some(cmd.to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(started, vec!["podman stop n8n"]);
        Ok(())
    }

    #[test]
    fn records_are_tagged_podman() -> Result<(), Error> {
        let runner = NullCommandRunnerBuilder::new()
            .cmd(
                &["podman", "ps", "-a", "--format", "json"],
                r#"[{"Id":"a1b2c3","Names":["archon"],"State":"running"}]"#,
            )
            .build();
        let records = block_on(Podman::new(runner).list_containers())?;
        assert_eq!(records[0].engine, EngineKind::Podman);
        assert_eq!(records[0].name, "archon");
        Ok(())
    }

    #[test]
    fn compose_runs_podman_compose() -> Result<(), Error> {
        use crate::backends::compose::ComposeAction;
        let runner = NullCommandRunnerBuilder::new()
            .cmd(&["podman", "compose", "-f", "/c.yaml", "down"], "")
            .build();
        let output = block_on(
            Podman::new(runner).compose(&ComposeRequest::new("/c.yaml", ComposeAction::Down)),
        )?;
        assert!(output.status.success());
        Ok(())
    }
}
