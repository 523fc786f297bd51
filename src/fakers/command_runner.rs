// thin wrapper around process execution, with a configurable `NullCommandRunner`
// returning predefined outputs, to ease code testing.
// Everything here is `Send + Sync`: the pollers run commands from their own threads.

use std::{
    collections::HashMap,
    fmt,
    future::Future,
    io,
    os::unix::process::ExitStatusExt,
    pin::Pin,
    process::{ExitStatus, Output},
    sync::Arc,
};

use crate::fakers::{Command, OutputTracker};

use async_process::Command as AsyncCommand;
use futures::FutureExt;

pub type OutputFuture = Pin<Box<dyn Future<Output = io::Result<Output>> + Send>>;

#[derive(Debug, Clone)]
pub enum CommandRunnerEvent {
    /// Started command that will return the output
    Started(usize, Command),
    /// `Ok` carries the exit code, `Err` means the process could not be run at all
    Output(usize, Result<Option<i32>, ()>),
}

impl CommandRunnerEvent {
    pub fn event_id(&self) -> usize {
        match self {
            CommandRunnerEvent::Started(id, _) => *id,
            CommandRunnerEvent::Output(id, _) => *id,
        }
    }
    pub fn command(&self) -> Option<&Command> {
        match self {
            CommandRunnerEvent::Started(_, cmd) => Some(cmd),
            CommandRunnerEvent::Output(_, _) => None,
        }
    }
}

#[derive(Clone)]
pub struct CommandRunner {
    pub inner: Arc<dyn InnerCommandRunner>,
    pub output_tracker: OutputTracker<CommandRunnerEvent>,
}

impl CommandRunner {
    pub fn new(inner: Arc<dyn InnerCommandRunner>) -> Self {
        CommandRunner {
            inner,
            output_tracker: OutputTracker::new(),
        }
    }
    pub fn new_null() -> Self {
        NullCommandRunnerBuilder::new().build()
    }
    pub fn new_real() -> Self {
        CommandRunner::new(Arc::new(RealCommandRunner::new()))
    }

    pub fn output_tracker(&self) -> OutputTracker<CommandRunnerEvent> {
        self.output_tracker.enable();
        self.output_tracker.clone()
    }

    fn event_id(&self) -> usize {
        self.output_tracker.len()
    }

    /// Returns a runner that rewrites every command with `f` before running it.
    /// The command log keeps recording into the same tracker.
    pub fn map_cmd(&self, f: impl Fn(Command) -> Command + Send + Sync + 'static) -> Self {
        CommandRunner {
            inner: Arc::new(MappedCommandRunner {
                inner: self.inner.clone(),
                map: Box::new(f),
            }),
            output_tracker: self.output_tracker.clone(),
        }
    }

    pub fn output(&self, command: Command) -> OutputFuture {
        let command = self.inner.wrap_command(command);
        let event_id = self.event_id();
        self.output_tracker
            .push(CommandRunnerEvent::Started(event_id, command.clone()));
        let fut = self.inner.output(command);
        let tracker = self.output_tracker.clone();
        fut.map(move |result| {
            let res_summary = match &result {
                Ok(output) => Ok(output.status.code()),
                Err(_e) => Err(()),
            };
            tracker.push(CommandRunnerEvent::Output(event_id, res_summary));
            result
        })
        .boxed()
    }
}

impl fmt::Debug for CommandRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRunner").finish_non_exhaustive()
    }
}

impl Default for CommandRunner {
    fn default() -> Self {
        CommandRunner::new_null()
    }
}

pub trait InnerCommandRunner: Send + Sync {
    fn wrap_command(&self, command: Command) -> Command {
        command
    }
    fn output(&self, command: Command) -> OutputFuture;
}

#[derive(Clone, Debug, Default)]
pub struct RealCommandRunner {}
impl RealCommandRunner {
    pub fn new() -> Self {
        RealCommandRunner {}
    }
}

impl InnerCommandRunner for RealCommandRunner {
    fn output(&self, command: Command) -> OutputFuture {
        let mut command: AsyncCommand = command.into();
        command.output().boxed()
    }
}

struct MappedCommandRunner {
    inner: Arc<dyn InnerCommandRunner>,
    map: Box<dyn Fn(Command) -> Command + Send + Sync>,
}

impl InnerCommandRunner for MappedCommandRunner {
    fn wrap_command(&self, command: Command) -> Command {
        self.inner.wrap_command((self.map)(command))
    }
    fn output(&self, command: Command) -> OutputFuture {
        self.inner.output(command)
    }
}

type Response = Arc<dyn Fn() -> io::Result<Output> + Send + Sync>;

fn exit_status(code: i32) -> ExitStatus {
    ExitStatus::from_raw(code << 8)
}

/// Builds a runner answering registered commands with canned outputs.
///
/// Commands that were not registered behave like a missing binary
/// (`io::ErrorKind::NotFound`), unless a fallback exit status is set.
#[derive(Default, Clone)]
pub struct NullCommandRunnerBuilder {
    responses: HashMap<Vec<String>, Response>,
    fallback_exit_status: Option<ExitStatus>,
}

impl NullCommandRunnerBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    fn cmd_from_args<T: AsRef<str>>(args: &[T]) -> Command {
        let args: Vec<_> = args.iter().map(|x| x.as_ref()).collect();
        let mut cmd = Command::new(args[0]);
        cmd.args(&args[1..]);
        cmd
    }

    /// Registers a command that succeeds and prints `out` on stdout.
    pub fn cmd<T: AsRef<str>>(&mut self, args: &[T], out: T) -> &mut Self {
        let out_text = out.as_ref().to_string();
        self.cmd_full(Self::cmd_from_args(args), move || Ok(out_text.clone()))
    }

    /// Registers a command that exits with `code` and prints `stderr`.
    pub fn cmd_failing<T: AsRef<str>>(&mut self, args: &[T], code: i32, stderr: T) -> &mut Self {
        let stderr = stderr.as_ref().to_string();
        self.cmd_output(Self::cmd_from_args(args), move || {
            Ok(Output {
                status: exit_status(code),
                stdout: vec![],
                stderr: stderr.clone().into_bytes(),
            })
        })
    }

    pub fn cmd_full(
        &mut self,
        cmd: Command,
        out: impl Fn() -> Result<String, io::Error> + Send + Sync + 'static,
    ) -> &mut Self {
        self.cmd_output(cmd, move || {
            Ok(Output {
                status: exit_status(0),
                stdout: out()?.into_bytes(),
                stderr: vec![],
            })
        })
    }

    pub fn cmd_output(
        &mut self,
        cmd: Command,
        out: impl Fn() -> io::Result<Output> + Send + Sync + 'static,
    ) -> &mut Self {
        let key = NullCommandRunner::key_for_cmd(&cmd);
        self.responses.insert(key, Arc::new(out));
        self
    }

    pub fn fallback(&mut self, status: ExitStatus) -> &mut Self {
        self.fallback_exit_status = Some(status);
        self
    }

    pub fn build(&self) -> CommandRunner {
        let inner = Arc::new(NullCommandRunner {
            responses: self.responses.clone(),
            fallback_exit_status: self.fallback_exit_status,
        });
        CommandRunner::new(inner)
    }
}

#[derive(Default, Clone)]
pub struct NullCommandRunner {
    responses: HashMap<Vec<String>, Response>,
    fallback_exit_status: Option<ExitStatus>,
}

impl NullCommandRunner {
    fn key_for_cmd(command: &Command) -> Vec<String> {
        command
            .to_vec()
            .iter()
            .map(|x| x.to_string_lossy().to_string())
            .collect()
    }
}

impl InnerCommandRunner for NullCommandRunner {
    fn output(&self, command: Command) -> OutputFuture {
        let key = Self::key_for_cmd(&command);
        let result = match (self.responses.get(&key[..]), self.fallback_exit_status) {
            (Some(response), _) => response(),
            (None, Some(status)) => Ok(Output {
                status,
                stdout: vec![],
                stderr: vec![],
            }),
            (None, None) => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: command not found", command.program.to_string_lossy()),
            )),
        };
        async move { result }.boxed()
    }
}
