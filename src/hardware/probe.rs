use std::{io, path::PathBuf};

use futures::future::BoxFuture;
use tracing::debug;

use crate::fakers::{Command, CommandRunner, FdMode, HostFs};

#[derive(thiserror::Error, Debug)]
pub enum ProbeError {
    #[error("command `{command}` failed: {reason}")]
    CommandFailed { command: String, reason: String },

    #[error("cannot read {path}: {source}")]
    FileUnreadable { path: PathBuf, source: io::Error },

    #[error("no match in {0}")]
    NoMatch(String),

    #[error("not applicable on this platform")]
    UnsupportedPlatform,

    #[error("failed to parse {0}")]
    Parse(String),
}

pub type Probe<'a, T> = (&'static str, BoxFuture<'a, Result<T, ProbeError>>);

/// Runs `probes` in order and returns the first success, or `default`.
/// Later probes are never polled once one has succeeded.
pub async fn first_ok<T>(what: &'static str, probes: Vec<Probe<'_, T>>, default: T) -> T {
    for (name, probe) in probes {
        match probe.await {
            Ok(value) => {
                debug!(probe = name, what, "Probe matched");
                return value;
            }
            Err(e) => debug!(probe = name, what, error = %e, "Probe failed"),
        }
    }
    default
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    Linux,
    MacOs,
    Windows,
    Other,
}

impl HostOs {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "linux" => HostOs::Linux,
            "macos" => HostOs::MacOs,
            "windows" => HostOs::Windows,
            _ => HostOs::Other,
        }
    }
}

/// Facts read once from `sysinfo`; absent values make the probes fall
/// back to commands and files.
#[derive(Debug, Clone, Default)]
pub struct HostFacts {
    pub total_memory_bytes: Option<u64>,
    pub cpu_brand: Option<String>,
    pub cpu_vendor: Option<String>,
    pub cpu_cores: Option<usize>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub kernel_version: Option<String>,
}

impl HostFacts {
    pub fn from_sysinfo() -> Self {
        use sysinfo::System;

        let mut sys = System::new();
        sys.refresh_cpu_list(sysinfo::CpuRefreshKind::everything());
        sys.refresh_memory_specifics(sysinfo::MemoryRefreshKind::everything());
        let cpu = sys.cpus().first();
        HostFacts {
            total_memory_bytes: Some(sys.total_memory()).filter(|m| *m > 0),
            cpu_brand: cpu
                .map(|c| c.brand().trim().to_string())
                .filter(|b| !b.is_empty()),
            cpu_vendor: cpu
                .map(|c| c.vendor_id().trim().to_string())
                .filter(|v| !v.is_empty()),
            cpu_cores: System::physical_core_count().or_else(|| Some(sys.cpus().len()).filter(|n| *n > 0)),
            os_name: System::name(),
            os_version: System::os_version(),
            kernel_version: System::kernel_version(),
        }
    }
}

/// Everything the detector is allowed to look at.
#[derive(Clone, Debug)]
pub struct HostProbe {
    pub runner: CommandRunner,
    pub fs: HostFs,
    pub os: HostOs,
    /// Machine name as reported by the OS, lower case (`x86_64`, `arm64`, ...).
    pub arch: String,
    pub facts: HostFacts,
}

impl HostProbe {
    pub fn new_real(runner: CommandRunner) -> Self {
        let arch = sysinfo::System::cpu_arch();
        HostProbe {
            runner,
            fs: HostFs::new_real(),
            os: HostOs::current(),
            arch: if arch.is_empty() {
                std::env::consts::ARCH.to_string()
            } else {
                arch.to_lowercase()
            },
            facts: HostFacts::from_sysinfo(),
        }
    }

    pub fn new(runner: CommandRunner, fs: HostFs, os: HostOs, arch: &str) -> Self {
        HostProbe {
            runner,
            fs,
            os,
            arch: arch.to_lowercase(),
            facts: HostFacts::default(),
        }
    }

    pub fn with_facts(mut self, facts: HostFacts) -> Self {
        self.facts = facts;
        self
    }

    pub fn is_arm(&self) -> bool {
        matches!(self.arch.as_str(), "aarch64" | "armv7l" | "arm64")
    }

    pub fn is_x86_64(&self) -> bool {
        matches!(self.arch.as_str(), "x86_64" | "amd64")
    }

    pub fn is_apple_silicon(&self) -> bool {
        self.os == HostOs::MacOs && self.is_arm()
    }

    pub fn require_os(&self, os: HostOs) -> Result<(), ProbeError> {
        if self.os == os {
            Ok(())
        } else {
            Err(ProbeError::UnsupportedPlatform)
        }
    }

    pub fn read(&self, path: &str) -> Result<String, ProbeError> {
        self.fs
            .read_to_string(path)
            .map_err(|source| ProbeError::FileUnreadable {
                path: path.into(),
                source,
            })
    }

    pub fn require_exists(&self, path: &str) -> Result<(), ProbeError> {
        if self.fs.exists(path) {
            Ok(())
        } else {
            Err(ProbeError::NoMatch(path.to_string()))
        }
    }

    /// Runs `args` and returns stdout when it exits with 0.
    pub async fn run(&self, args: &[&str]) -> Result<String, ProbeError> {
        let mut cmd = Command::new(args[0]);
        cmd.args(&args[1..]);
        cmd.stdout = FdMode::Pipe;
        cmd.stderr = FdMode::Pipe;
        let command = cmd.to_string();
        debug!(command = %command, "Running probe command");

        let output = self
            .runner
            .output(cmd)
            .await
            .map_err(|e| ProbeError::CommandFailed {
                command: command.clone(),
                reason: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(ProbeError::CommandFailed {
                command,
                reason: format!("exit code {:?}", output.status.code()),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
