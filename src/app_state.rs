// Session state shared by the pages: the detected system, both pollers and
// the few values the user edits (data directory, service URLs).

use std::{
    collections::HashMap,
    os::unix::process::ExitStatusExt,
    path::{Path, PathBuf},
    process::ExitStatus,
    sync::{Arc, Mutex, PoisonError},
};

use futures::executor::block_on;
use tracing::{info, warn};

use crate::{
    backends::{ContainerRuntime, EngineKind, get_container_runtime},
    config::AppConfig,
    env_file::{self, EnvFileError},
    fakers::{CommandRunner, HostFs, NullCommandRunnerBuilder, NullHostFsBuilder},
    hardware::{EngineInfo, HostFacts, HostOs, HostProbe, SystemInfo},
    monitor::{
        CommandOutcome, ContainerPoller, PerformanceMonitor,
        performance::{HostSample, HostSampler, NullSampler, SysinfoSampler},
    },
    services::AiService,
};

pub const FAKE_ENV: &str = "SINGULARITY_LAUNCHER_FAKE";

/// Which host the application talks to. The null variants serve canned
/// outputs and are meant for demos and screenshots.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    Real,
    NullWorking,
    NullEmpty,
    NullNoEngine,
}

impl Backend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "" | "real" => Some(Backend::Real),
            "working" => Some(Backend::NullWorking),
            "empty" => Some(Backend::NullEmpty),
            "no-engine" => Some(Backend::NullNoEngine),
            _ => None,
        }
    }

    pub fn from_env() -> Self {
        let Ok(value) = std::env::var(FAKE_ENV) else {
            return Backend::Real;
        };
        Backend::parse(&value).unwrap_or_else(|| {
            warn!(value = %value, "Unknown {FAKE_ENV} value, using the real host");
            Backend::Real
        })
    }
}

const GIB: u64 = 1024 * 1024 * 1024;

const FAKE_CONTAINERS: &str = r#"{"ID":"3f2a9c1b7d4e","Image":"ollama/ollama:latest","Names":"ollama","State":"running","Status":"Up 2 hours","Ports":"0.0.0.0:11434->11434/tcp"}
{"ID":"5c6d7e8f9a0b","Image":"ghcr.io/open-webui/open-webui:main","Names":"open-webui","State":"running","Status":"Up 2 hours","Ports":"0.0.0.0:3000->8080/tcp"}
{"ID":"9b8c7d6e5f4a","Image":"yanwk/comfyui-boot:latest","Names":"comfyui","State":"exited","Status":"Exited (0) 3 days ago","Ports":""}"#;

fn fake_runner(backend: Backend) -> CommandRunner {
    let mut builder = NullCommandRunnerBuilder::new();
    if backend != Backend::NullNoEngine {
        builder
            .cmd(&["docker", "--version"], "Docker version 27.3.1, build ce12230")
            .cmd(&["docker", "ps", "-a", "--format", "json"], match backend {
                Backend::NullWorking => FAKE_CONTAINERS,
                _ => "",
            })
            // start, stop, restart, logs and compose all succeed silently
            .fallback(ExitStatus::from_raw(0));
    }
    builder
        .cmd(&["nvidia-smi"], "")
        .cmd(
            &["nvidia-smi", "--query-gpu=name,memory.total", "--format=csv,noheader,nounits"],
            "NVIDIA GeForce RTX 4090, 24564",
        )
        .cmd(
            &[
                "nvidia-smi",
                "--query-gpu=utilization.gpu,temperature.gpu,utilization.memory,memory.total",
                "--format=csv,noheader,nounits",
            ],
            "23, 45, 10, 24564",
        );
    builder.build()
}

fn fake_probe(runner: CommandRunner) -> HostProbe {
    let fs = NullHostFsBuilder::new()
        .file("/etc/os-release", "NAME=\"Ubuntu\"\nVERSION_ID=\"24.04\"\n")
        .build();
    HostProbe::new(runner, fs, HostOs::Linux, "x86_64").with_facts(HostFacts {
        total_memory_bytes: Some(64 * GIB),
        cpu_brand: Some("AMD Ryzen 9 7950X 16-Core Processor".into()),
        cpu_vendor: Some("AuthenticAMD".into()),
        cpu_cores: Some(16),
        os_name: Some("Ubuntu".into()),
        os_version: Some("24.04".into()),
        kernel_version: Some("6.8.0".into()),
    })
}

fn fake_sampler() -> NullSampler {
    NullSampler {
        sample: HostSample {
            cpu_usage: Some(17.0),
            cpu_temp: Some(52.0),
            memory_used_bytes: Some(21 * GIB),
            memory_total_bytes: Some(64 * GIB),
            disk_used_bytes: Some(412 * GIB),
            disk_total_bytes: Some(1863 * GIB),
        },
    }
}

/// Everything a page needs to render and act. Clones share the same
/// pollers and session values.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub runner: CommandRunner,
    pub fs: HostFs,
    pub system: Arc<SystemInfo>,
    pub containers: ContainerPoller,
    pub performance: PerformanceMonitor,
    session: Arc<Mutex<Session>>,
}

#[derive(Debug, Default)]
struct Session {
    drive_path: PathBuf,
    service_urls: HashMap<String, String>,
}

impl AppState {
    pub fn new(config: AppConfig, backend: Backend) -> Self {
        let home = gtk::glib::home_dir();
        let preference = config.engine.engine_kind();
        match backend {
            Backend::Real => {
                let runner = CommandRunner::new_real();
                let probe = HostProbe::new_real(runner.clone());
                let runtime = block_on(get_container_runtime(runner.clone(), preference));
                Self::assemble(config, probe, runtime, Box::new(SysinfoSampler::new()), &home)
            }
            fake => {
                info!(backend = ?fake, "Using a fake host");
                let runner = fake_runner(fake);
                let probe = fake_probe(runner.clone());
                let runtime = block_on(get_container_runtime(runner, Some(EngineKind::Docker)));
                Self::assemble(config, probe, runtime, Box::new(fake_sampler()), &home)
            }
        }
    }

    /// Detects the system and builds both pollers. Polling is not started.
    pub fn assemble(
        config: AppConfig,
        probe: HostProbe,
        runtime: Option<Arc<dyn ContainerRuntime>>,
        sampler: Box<dyn HostSampler>,
        home: &Path,
    ) -> Self {
        let containers = ContainerPoller::new(
            runtime,
            config.container_poll_settings(),
            config.compose_root.clone(),
        );
        let engine = match containers.version() {
            Some(version) => EngineInfo {
                name: containers.engine_name().into(),
                version,
                available: true,
            },
            None => EngineInfo::none(),
        };
        let system = block_on(SystemInfo::detect(&probe, engine));

        let drive_path = match env_file::read_drive_path(&config.env_file) {
            Ok(Some(path)) => path,
            Ok(None) => config.drive_path(home),
            Err(e) => {
                warn!(error = %e, "Could not read the env file");
                config.drive_path(home)
            }
        };

        let performance = PerformanceMonitor::new(
            sampler,
            probe.runner.clone(),
            probe.fs.clone(),
            system.cpu.cpu_type,
            system.gpu.gpu_type,
            config.performance_poll_settings(),
        );

        AppState {
            config,
            runner: probe.runner,
            fs: probe.fs,
            system: Arc::new(system),
            containers,
            performance,
            session: Arc::new(Mutex::new(Session {
                drive_path,
                service_urls: HashMap::new(),
            })),
        }
    }

    fn session(&self) -> std::sync::MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn start_polling(&self) {
        self.containers.start();
        self.performance.start();
    }

    pub fn stop_polling(&self) {
        self.containers.stop();
        self.performance.stop();
    }

    pub fn drive_path(&self) -> PathBuf {
        self.session().drive_path.clone()
    }

    /// Creates the directory, writes the env file and remembers the path.
    /// Returns whether the directory was created.
    pub fn save_drive_path(&self, path: &Path) -> Result<bool, EnvFileError> {
        let created = env_file::save_drive_path(&self.config.env_file, path)?;
        self.session().drive_path = path.to_path_buf();
        Ok(created)
    }

    pub fn service_url(&self, service: &AiService) -> String {
        self.session()
            .service_urls
            .get(&service.key())
            .cloned()
            .unwrap_or_else(|| service.default_url.to_string())
    }

    pub fn set_service_url(&self, service: &AiService, url: &str) {
        self.session()
            .service_urls
            .insert(service.key(), url.trim().to_string());
    }

    /// Builds and starts a catalog service from its compose file. Blocks.
    pub fn build_service(&self, service: &AiService) -> CommandOutcome {
        match service.build_request(
            &self.system,
            &self.fs,
            &self.config.compose_root,
            &self.drive_path(),
        ) {
            Ok(request) => self.containers.run_compose(request),
            Err(e) => {
                warn!(service = service.name, error = %e, "Cannot build service");
                CommandOutcome {
                    success: false,
                    output: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backends::ContainerStatus,
        fakers::CommandRunnerEvent,
        hardware::{GpuType, PlatformTag},
        services::find_service,
    };

    fn config(dir: &Path) -> AppConfig {
        AppConfig {
            env_file: dir.join(".env"),
            compose_root: PathBuf::from("/opt/sl"),
            ..Default::default()
        }
    }

    fn working_state(config: AppConfig, home: &Path) -> AppState {
        let runner = fake_runner(Backend::NullWorking);
        let probe = fake_probe(runner.clone());
        let runtime = block_on(get_container_runtime(runner, Some(EngineKind::Docker)));
        AppState::assemble(config, probe, runtime, Box::new(fake_sampler()), home)
    }

    #[test]
    fn backend_names() {
        assert_eq!(Backend::parse("working"), Some(Backend::NullWorking));
        assert_eq!(Backend::parse("Empty"), Some(Backend::NullEmpty));
        assert_eq!(Backend::parse("no-engine"), Some(Backend::NullNoEngine));
        assert_eq!(Backend::parse(""), Some(Backend::Real));
        assert_eq!(Backend::parse("bogus"), None);
    }

    #[test]
    fn working_fake_host() {
        let tmp = tempfile::tempdir().unwrap();
        let state = working_state(config(tmp.path()), Path::new("/home/ada"));
        assert_eq!(state.system.platform, PlatformTag::Nvidia);
        assert_eq!(state.system.gpu.gpu_type, GpuType::Nvidia);
        assert_eq!(state.system.gpu.memory_gb, 24);
        assert_eq!(state.system.memory_gb, 64);
        assert!(state.system.engine.available);
        assert_eq!(state.system.engine.name, "docker");
        assert_eq!(state.system.engine.version, "Docker version 27.3.1, build ce12230");

        assert!(state.containers.refresh());
        let snapshot = state.containers.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot["9b8c7d6e5f4a"].status, ContainerStatus::Stopped);

        let perf = state.performance.sample_now();
        assert_eq!(perf.gpu_usage, 23.0);
        assert_eq!(perf.memory_total_gb, 64);
    }

    #[test]
    fn no_engine_fake_host() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = fake_runner(Backend::NullNoEngine);
        let probe = fake_probe(runner.clone());
        let runtime = block_on(get_container_runtime(runner, None));
        let state = AppState::assemble(
            config(tmp.path()),
            probe,
            runtime,
            Box::new(NullSampler::default()),
            Path::new("/home/ada"),
        );
        assert_eq!(state.system.engine, EngineInfo::none());
        assert_eq!(state.containers.engine_name(), "none");
        assert!(!state.containers.start_container("3f2a9c1b7d4e").success);
    }

    #[test]
    fn drive_path_defaults_saves_and_restores() {
        let tmp = tempfile::tempdir().unwrap();
        let state = working_state(config(tmp.path()), Path::new("/home/ada"));
        assert_eq!(state.drive_path(), PathBuf::from("/home/ada/Singularity"));

        let drive = tmp.path().join("drive");
        assert!(state.save_drive_path(&drive).unwrap());
        assert_eq!(state.drive_path(), drive);

        let restored = working_state(config(tmp.path()), Path::new("/home/ada"));
        assert_eq!(restored.drive_path(), drive);
    }

    #[test]
    fn service_urls_are_per_session() {
        let tmp = tempfile::tempdir().unwrap();
        let state = working_state(config(tmp.path()), Path::new("/home/ada"));
        let ollama = find_service("ollama").unwrap();
        assert_eq!(state.service_url(ollama), "http://localhost:3000");
        state.clone().set_service_url(ollama, " http://gpu-box:3000 ");
        assert_eq!(state.service_url(ollama), "http://gpu-box:3000");
    }

    #[test]
    fn build_service_without_compose_file() {
        let tmp = tempfile::tempdir().unwrap();
        let state = working_state(config(tmp.path()), Path::new("/home/ada"));
        let tracker = state.runner.output_tracker();
        let outcome = state.build_service(find_service("archon").unwrap());
        assert!(!outcome.success);
        assert!(outcome.output.contains("archon-compose.yaml"));
        assert!(
            !tracker
                .items()
                .iter()
                .filter_map(CommandRunnerEvent::command)
                .any(|c| c.to_string().contains("compose"))
        );
    }
}
