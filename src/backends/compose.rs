use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    process::Output,
};

use crate::{backends::container_runtime::Error, fakers::Command};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeAction {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeRequest {
    pub file: PathBuf,
    pub project: Option<String>,
    pub action: ComposeAction,
    pub env: Vec<(String, String)>,
    /// Receives the command, its environment, the exit code and the output.
    pub log_file: Option<PathBuf>,
}

impl ComposeRequest {
    pub fn new(file: impl Into<PathBuf>, action: ComposeAction) -> Self {
        Self {
            file: file.into(),
            project: None,
            action,
            env: vec![],
            log_file: None,
        }
    }

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// Resolves a relative compose file against `root`.
    pub fn resolved(mut self, root: &Path) -> Self {
        if self.file.is_relative() {
            self.file = root.join(&self.file);
        }
        self
    }

    /// `docker compose -f <file> [-p <project>] up -d | down`
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new("docker");
        cmd.arg("compose").arg("-f").arg(&self.file);
        if let Some(project) = &self.project {
            cmd.arg("-p").arg(project);
        }
        match self.action {
            ComposeAction::Up => cmd.args(["up", "-d"]),
            ComposeAction::Down => cmd.arg("down"),
        };
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }
}

pub fn combined_output(output: &Output) -> String {
    format!(
        "STDOUT:\n{}\n\nSTDERR:\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

pub fn write_compose_log(
    path: &Path,
    command: &Command,
    request: &ComposeRequest,
    result: Result<&Output, &Error>,
) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(path)?;
    writeln!(file, "Command: {command}")?;
    let env = request
        .env
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(file, "Environment variables: {env}")?;
    match result {
        Ok(output) => {
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".into());
            writeln!(file, "Return code: {code}\n")?;
            write!(file, "{}", combined_output(output))?;
        }
        Err(e) => writeln!(file, "Error: {e}")?,
    }
    Ok(())
}
