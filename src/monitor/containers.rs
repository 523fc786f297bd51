use std::{
    collections::BTreeMap,
    ops::ControlFlow,
    path::PathBuf,
    sync::{Arc, RwLock},
};

use futures::executor::block_on;
use tracing::{info, warn};

use crate::backends::{
    ComposeRequest, ContainerRecord, ContainerRef, ContainerRuntime, EngineKind, Error,
    compose::{combined_output, write_compose_log},
    podman::map_docker_to_podman,
};

use super::{MonitorState, PollLoop, PollSettings, Publisher};

/// Every container known to the engine, keyed by id.
pub type ContainerSnapshot = BTreeMap<String, ContainerRecord>;

/// Result of a control call, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    pub output: String,
}

impl CommandOutcome {
    fn from_result(result: Result<String, Error>) -> Self {
        match result {
            Ok(output) => CommandOutcome {
                success: true,
                output,
            },
            Err(e) => CommandOutcome {
                success: false,
                output: e.user_output(),
            },
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum ContainerAction {
    Start,
    Stop,
    Restart,
}

impl ContainerAction {
    fn as_str(&self) -> &'static str {
        match self {
            ContainerAction::Start => "start",
            ContainerAction::Stop => "stop",
            ContainerAction::Restart => "restart",
        }
    }
}

struct Inner {
    runtime: Option<Arc<dyn ContainerRuntime>>,
    snapshot: RwLock<Arc<ContainerSnapshot>>,
    publisher: Publisher<Arc<ContainerSnapshot>>,
    poll_loop: PollLoop,
    compose_root: PathBuf,
}

/// Keeps an in-memory copy of the engine's container list and runs the
/// container control commands.
///
/// Clones share the same state. Control calls block the calling thread
/// until the CLI returns, then re-poll once.
#[derive(Clone)]
pub struct ContainerPoller {
    inner: Arc<Inner>,
}

impl ContainerPoller {
    pub fn new(
        runtime: Option<Arc<dyn ContainerRuntime>>,
        settings: PollSettings,
        compose_root: impl Into<PathBuf>,
    ) -> Self {
        ContainerPoller {
            inner: Arc::new(Inner {
                runtime,
                snapshot: RwLock::new(Arc::new(ContainerSnapshot::new())),
                publisher: Publisher::default(),
                poll_loop: PollLoop::new("container-poller", settings),
                compose_root: compose_root.into(),
            }),
        }
    }

    pub fn engine(&self) -> Option<EngineKind> {
        self.inner.runtime.as_ref().map(|rt| rt.kind())
    }

    pub fn engine_name(&self) -> &'static str {
        self.inner.runtime.as_ref().map(|rt| rt.name()).unwrap_or("none")
    }

    pub fn start(&self) -> bool {
        let weak = Arc::downgrade(&self.inner);
        self.inner.poll_loop.start(move || match weak.upgrade() {
            Some(inner) => {
                ContainerPoller { inner }.refresh();
                ControlFlow::Continue(())
            }
            None => ControlFlow::Break(()),
        })
    }

    pub fn stop(&self) -> bool {
        self.inner.poll_loop.stop()
    }

    pub fn state(&self) -> MonitorState {
        self.inner.poll_loop.state()
    }

    pub fn snapshot(&self) -> Arc<ContainerSnapshot> {
        self.inner
            .snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn container(&self, id: &str) -> Option<ContainerRecord> {
        self.snapshot().get(id).cloned()
    }

    pub fn subscribe(&self) -> async_channel::Receiver<Arc<ContainerSnapshot>> {
        self.inner.publisher.subscribe()
    }

    /// Polls the engine once. On failure the previous snapshot stays in place
    /// and nothing is published.
    pub fn refresh(&self) -> bool {
        let Some(runtime) = &self.inner.runtime else {
            return false;
        };
        match block_on(runtime.list_containers()) {
            Ok(records) => {
                let snapshot: Arc<ContainerSnapshot> = Arc::new(
                    records
                        .into_iter()
                        .map(|record| (record.id.clone(), record))
                        .collect(),
                );
                *self
                    .inner
                    .snapshot
                    .write()
                    .unwrap_or_else(|e| e.into_inner()) = snapshot.clone();
                self.inner.publisher.publish(snapshot);
                true
            }
            Err(e) => {
                warn!(engine = runtime.name(), error = %e, "Container poll failed, keeping previous snapshot");
                false
            }
        }
    }

    fn runtime(&self) -> Result<&Arc<dyn ContainerRuntime>, Error> {
        self.inner.runtime.as_ref().ok_or(Error::NoEngine)
    }

    fn run_action(&self, action: ContainerAction, id: &str) -> Result<String, Error> {
        let runtime = self.runtime()?;
        let container = ContainerRef::new(id)?;
        let fut = async {
            match action {
                ContainerAction::Start => runtime.start(&container).await,
                ContainerAction::Stop => runtime.stop(&container).await,
                ContainerAction::Restart => runtime.restart(&container).await,
            }
        };
        block_on(fut)
    }

    fn act(&self, action: ContainerAction, id: &str) -> CommandOutcome {
        let result = self.run_action(action, id);
        let engine_invoked = !matches!(result, Err(Error::NoEngine | Error::InvalidField(..)));
        match &result {
            Ok(_) => info!(action = action.as_str(), container = id, "Container action succeeded"),
            Err(e) => warn!(action = action.as_str(), container = id, error = %e, "Container action failed"),
        }
        if engine_invoked {
            self.refresh();
        }
        CommandOutcome::from_result(result)
    }

    pub fn start_container(&self, id: &str) -> CommandOutcome {
        self.act(ContainerAction::Start, id)
    }

    pub fn stop_container(&self, id: &str) -> CommandOutcome {
        self.act(ContainerAction::Stop, id)
    }

    pub fn restart_container(&self, id: &str) -> CommandOutcome {
        self.act(ContainerAction::Restart, id)
    }

    /// Last `lines` lines of a container's output. Does not re-poll.
    pub fn logs(&self, id: &str, lines: u32) -> CommandOutcome {
        let result = self.runtime().and_then(|runtime| {
            let container = ContainerRef::new(id)?;
            block_on(runtime.logs(&container, lines))
        });
        CommandOutcome::from_result(result)
    }

    /// Runs `compose up`/`down`. Relative compose files are resolved against
    /// the compose root; the log file, when requested, is always written.
    pub fn run_compose(&self, request: ComposeRequest) -> CommandOutcome {
        let runtime = match self.runtime() {
            Ok(runtime) => runtime,
            Err(e) => return CommandOutcome::from_result(Err(e)),
        };
        let request = request.resolved(&self.inner.compose_root);
        let mut command = request.to_command();
        if runtime.kind() == EngineKind::Podman {
            command = map_docker_to_podman(command);
        }
        info!(command = %command, "Running compose");

        let result = block_on(runtime.compose(&request));
        if let Some(log_file) = &request.log_file {
            if let Err(e) = write_compose_log(log_file, &command, &request, result.as_ref()) {
                warn!(path = %log_file.display(), error = %e, "Failed to write compose log");
            }
        }
        self.refresh();

        match result {
            Ok(output) => {
                let success = output.status.success();
                if !success {
                    warn!(exit_code = ?output.status.code(), "Compose failed");
                }
                CommandOutcome {
                    success,
                    output: combined_output(&output),
                }
            }
            Err(e) => CommandOutcome::from_result(Err(e)),
        }
    }

    /// Stops every container that is running in the current snapshot.
    pub fn stop_all_running(&self) -> Vec<(String, CommandOutcome)> {
        let running: Vec<ContainerRecord> = self
            .snapshot()
            .values()
            .filter(|record| record.is_running())
            .cloned()
            .collect();
        let outcomes = running
            .into_iter()
            .map(|record| {
                let outcome =
                    CommandOutcome::from_result(self.run_action(ContainerAction::Stop, &record.id));
                (record.name, outcome)
            })
            .collect();
        self.refresh();
        outcomes
    }

    /// `<engine> --version`, `None` without a working engine.
    pub fn version(&self) -> Option<String> {
        let runtime = self.runtime().ok()?;
        block_on(runtime.version()).ok()
    }
}
