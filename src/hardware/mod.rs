//! Host classification: OS, CPU, GPU, memory and special platforms.
//!
//! Every detector walks an ordered chain of probes (files, vendor tools,
//! `sysinfo`) and settles on a value of a small enumeration. Nothing here
//! returns an error: a probe that fails only moves the chain along.

pub mod cpu;
pub mod gpu;
pub mod memory;
pub mod os;
pub mod platform;
pub mod probe;
pub mod profiles;

use tracing::info;

pub use cpu::{CpuInfo, CpuType};
pub use gpu::{GpuInfo, GpuType};
pub use os::OsFamily;
pub use platform::{AppleSiliconVariant, JetsonModel, PlatformTag};
pub use probe::{HostFacts, HostOs, HostProbe, ProbeError};
pub use profiles::{ResourceProfile, compose_file, resource_profile};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInfo {
    pub name: String,
    pub version: String,
    pub available: bool,
}

impl EngineInfo {
    pub fn none() -> Self {
        EngineInfo {
            name: "none".into(),
            version: String::new(),
            available: false,
        }
    }
}

/// Everything known about the host, computed once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemInfo {
    pub os_family: OsFamily,
    pub os_name: String,
    pub os_version: String,
    pub cpu: CpuInfo,
    pub gpu: GpuInfo,
    pub memory_gb: u64,
    pub platform: PlatformTag,
    pub apple_variant: Option<AppleSiliconVariant>,
    pub jetson_model: Option<JetsonModel>,
    pub resource_profile: &'static ResourceProfile,
    pub engine: EngineInfo,
}

impl SystemInfo {
    pub async fn detect(probe: &HostProbe, engine: EngineInfo) -> Self {
        let os_family = os::detect_os_family(probe).await;
        let cpu = cpu::get_cpu_info(probe).await;
        let gpu_type = gpu::detect_gpu_type(probe).await;
        let gpu = gpu::get_gpu_info(probe, gpu_type).await;
        let memory_gb = memory::total_memory_gb(probe).await;
        let platform = platform::detect_platform(probe, gpu_type, cpu.cpu_type).await;

        let jetson_model = match platform {
            PlatformTag::Jetson => Some(platform::detect_jetson_model(probe, memory_gb).await),
            _ => None,
        };
        let apple_variant = match platform {
            PlatformTag::Apple => Some(platform::detect_apple_variant(probe).await),
            _ => None,
        };

        let info = SystemInfo {
            os_family,
            os_name: probe
                .facts
                .os_name
                .clone()
                .unwrap_or_else(|| os_family.as_str().to_string()),
            os_version: probe
                .facts
                .os_version
                .clone()
                .or_else(|| probe.facts.kernel_version.clone())
                .unwrap_or_default(),
            cpu,
            gpu,
            memory_gb,
            platform,
            apple_variant,
            jetson_model,
            resource_profile: resource_profile(apple_variant),
            engine,
        };
        info!(
            os = info.os_family.as_str(),
            cpu = info.cpu.cpu_type.as_str(),
            gpu = info.gpu.gpu_type.as_str(),
            platform = info.platform.as_str(),
            memory_gb = info.memory_gb,
            "Detected system"
        );
        info
    }

    /// Compose file of a catalog service for this machine.
    pub fn compose_file(&self, service_key: &str) -> std::path::PathBuf {
        compose_file(self.platform, self.jetson_model, service_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakers::{HostFs, NullCommandRunnerBuilder, NullHostFsBuilder};
    use smol::block_on;

    fn dgx_station() -> HostProbe {
        let runner = NullCommandRunnerBuilder::new()
            .cmd(&["nvidia-smi"], "ok")
            .cmd(
                &["nvidia-smi", "--query-gpu=name,memory.total", "--format=csv,noheader,nounits"],
                "NVIDIA A100-SXM4-80GB, 81920\n",
            )
            .build();
        let fs = NullHostFsBuilder::new()
            .file("/etc/os-release", "NAME=\"Ubuntu\"\n")
            .file("/etc/dgx-release", "DGX_NAME=\"DGX Server\"")
            .file("/proc/cpuinfo", "vendor_id\t: AuthenticAMD\n")
            .file("/proc/meminfo", "MemTotal:       1056000000 kB\n")
            .build();
        HostProbe::new(runner, fs, HostOs::Linux, "x86_64")
    }

    #[test]
    fn full_detection() {
        let info = block_on(SystemInfo::detect(&dgx_station(), EngineInfo::none()));
        assert_eq!(info.os_family, OsFamily::Ubuntu);
        assert_eq!(info.cpu.cpu_type, CpuType::Amd);
        assert_eq!(info.gpu.gpu_type, GpuType::Nvidia);
        assert_eq!(info.gpu.memory_gb, 80);
        assert_eq!(info.memory_gb, 1007);
        assert_eq!(info.platform, PlatformTag::Dgx);
        assert_eq!(info.jetson_model, None);
        assert_eq!(info.apple_variant, None);
        assert_eq!(info.resource_profile.memory_limit, "8G");
        assert_eq!(
            info.compose_file("ollama"),
            std::path::PathBuf::from("compose/platforms/nvidia/dgx/ollama-compose.yaml")
        );
    }

    #[test]
    fn detection_is_idempotent() {
        let probe = dgx_station();
        let first = block_on(SystemInfo::detect(&probe, EngineInfo::none()));
        let second = block_on(SystemInfo::detect(&probe, EngineInfo::none()));
        assert_eq!(first, second);
    }

    #[test]
    fn apple_machine() {
        let runner = NullCommandRunnerBuilder::new()
            .cmd(&["sysctl", "-n", "machdep.cpu.brand_string"], "Apple M4 Max")
            .cmd(&["sysctl", "-n", "hw.perflevel0.physicalcpu"], "14")
            .cmd(&["sysctl", "-n", "hw.perflevel1.physicalcpu"], "20")
            .cmd(&["sysctl", "-n", "hw.memsize"], "137438953472")
            .build();
        let probe = HostProbe::new(runner, HostFs::new_null(), HostOs::MacOs, "arm64");
        let info = block_on(SystemInfo::detect(&probe, EngineInfo::none()));
        assert_eq!(info.os_family, OsFamily::Mac);
        assert_eq!(info.platform, PlatformTag::Apple);
        assert_eq!(info.apple_variant, Some(AppleSiliconVariant::M4Max));
        assert_eq!(info.memory_gb, 128);
        assert_eq!(info.resource_profile.memory_limit, "32G");
    }

    #[test]
    fn empty_host_degrades_to_defaults() {
        let probe = HostProbe::new(
            crate::fakers::CommandRunner::new_null(),
            HostFs::new_null(),
            HostOs::Other,
            "",
        );
        let info = block_on(SystemInfo::detect(&probe, EngineInfo::none()));
        assert_eq!(info.os_family, OsFamily::Other);
        assert_eq!(info.cpu.cpu_type, CpuType::Unknown);
        assert_eq!(info.gpu, GpuInfo::default());
        assert_eq!(info.memory_gb, 8);
        assert_eq!(info.platform, PlatformTag::Unknown);
        assert!(!info.engine.available);
    }
}
