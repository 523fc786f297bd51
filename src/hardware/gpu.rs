use futures::FutureExt;

use super::probe::{HostOs, HostProbe, ProbeError, first_ok};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuType {
    Nvidia,
    Amd,
    Apple,
    Cpu,
}

impl GpuType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GpuType::Nvidia => "nvidia",
            GpuType::Amd => "amd",
            GpuType::Apple => "apple",
            GpuType::Cpu => "cpu",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpuInfo {
    pub name: String,
    /// GiB, 0 when unknown or shared with the system.
    pub memory_gb: u64,
    pub gpu_type: GpuType,
}

impl Default for GpuInfo {
    fn default() -> Self {
        GpuInfo {
            name: "CPU (No dedicated GPU)".into(),
            memory_gb: 0,
            gpu_type: GpuType::Cpu,
        }
    }
}

async fn nvidia_smi(probe: &HostProbe) -> Result<GpuType, ProbeError> {
    probe.run(&["nvidia-smi"]).await.map(|_| GpuType::Nvidia)
}

fn rocm_dir(probe: &HostProbe) -> Result<GpuType, ProbeError> {
    probe.require_os(HostOs::Linux)?;
    probe.require_exists("/opt/rocm").map(|_| GpuType::Amd)
}

async fn rocminfo(probe: &HostProbe) -> Result<GpuType, ProbeError> {
    probe.require_os(HostOs::Linux)?;
    probe.run(&["rocminfo"]).await.map(|_| GpuType::Amd)
}

async fn lspci(probe: &HostProbe) -> Result<GpuType, ProbeError> {
    probe.require_os(HostOs::Linux)?;
    let out = probe.run(&["lspci"]).await?.to_lowercase();
    if out.contains("amd") && out.contains("vga") {
        Ok(GpuType::Amd)
    } else {
        Err(ProbeError::NoMatch("lspci".into()))
    }
}

async fn wmic_video(probe: &HostProbe) -> Result<GpuType, ProbeError> {
    probe.require_os(HostOs::Windows)?;
    let out = probe
        .run(&["wmic", "path", "win32_VideoController", "get", "name"])
        .await?
        .to_lowercase();
    if out.contains("amd") || out.contains("radeon") {
        Ok(GpuType::Amd)
    } else {
        Err(ProbeError::NoMatch("wmic video controller".into()))
    }
}

pub async fn detect_gpu_type(probe: &HostProbe) -> GpuType {
    first_ok(
        "gpu type",
        vec![
            (
                "apple silicon",
                async {
                    if probe.is_apple_silicon() {
                        Ok(GpuType::Apple)
                    } else {
                        Err(ProbeError::UnsupportedPlatform)
                    }
                }
                .boxed(),
            ),
            ("nvidia-smi", nvidia_smi(probe).boxed()),
            ("rocm", async { rocm_dir(probe) }.boxed()),
            ("rocminfo", rocminfo(probe).boxed()),
            ("lspci", lspci(probe).boxed()),
            ("wmic", wmic_video(probe).boxed()),
        ],
        GpuType::Cpu,
    )
    .await
}

/// `nvidia-smi --query-gpu=name,memory.total`, memory in MiB.
async fn nvidia_info(probe: &HostProbe) -> Result<GpuInfo, ProbeError> {
    let out = probe
        .run(&[
            "nvidia-smi",
            "--query-gpu=name,memory.total",
            "--format=csv,noheader,nounits",
        ])
        .await?;
    let line = out.lines().next().unwrap_or_default();
    let (name, memory) = line
        .split_once(',')
        .ok_or_else(|| ProbeError::Parse(format!("nvidia-smi output {line:?}")))?;
    let memory_mib: f64 = memory
        .trim()
        .parse()
        .map_err(|_| ProbeError::Parse(format!("nvidia-smi memory {memory:?}")))?;
    Ok(GpuInfo {
        name: name.trim().to_string(),
        memory_gb: (memory_mib / 1024.0).round() as u64,
        gpu_type: GpuType::Nvidia,
    })
}

async fn amd_lspci_info(probe: &HostProbe) -> Result<GpuInfo, ProbeError> {
    probe.require_os(HostOs::Linux)?;
    let out = probe.run(&["lspci", "-v"]).await?;
    out.lines()
        .find(|line| line.contains("VGA") && (line.contains("AMD") || line.contains("ATI")))
        .and_then(|line| line.rsplit(':').next())
        .map(|name| GpuInfo {
            name: name.trim().to_string(),
            memory_gb: 0,
            gpu_type: GpuType::Amd,
        })
        .ok_or_else(|| ProbeError::NoMatch("lspci -v".into()))
}

async fn amd_wmic_info(probe: &HostProbe) -> Result<GpuInfo, ProbeError> {
    probe.require_os(HostOs::Windows)?;
    let out = probe
        .run(&["wmic", "path", "win32_VideoController", "get", "name,AdapterRAM"])
        .await?;
    let line = out
        .lines()
        .skip(1)
        .find(|line| {
            let line = line.to_lowercase();
            line.contains("amd") || line.contains("radeon")
        })
        .ok_or_else(|| ProbeError::NoMatch("wmic video controller".into()))?;

    let parts: Vec<&str> = line.split_whitespace().collect();
    let info = match parts.split_last() {
        Some((ram, name)) if !name.is_empty() => match ram.parse::<u64>() {
            Ok(bytes) => GpuInfo {
                name: name.join(" "),
                memory_gb: (bytes as f64 / super::memory::GIB).round() as u64,
                gpu_type: GpuType::Amd,
            },
            Err(_) => GpuInfo {
                name: line.trim().to_string(),
                memory_gb: 0,
                gpu_type: GpuType::Amd,
            },
        },
        _ => return Err(ProbeError::Parse("wmic video controller".into())),
    };
    Ok(info)
}

pub async fn get_gpu_info(probe: &HostProbe, gpu_type: GpuType) -> GpuInfo {
    match gpu_type {
        GpuType::Nvidia => {
            first_ok(
                "gpu info",
                vec![("nvidia-smi query", nvidia_info(probe).boxed())],
                GpuInfo::default(),
            )
            .await
        }
        GpuType::Amd => {
            first_ok(
                "gpu info",
                vec![
                    ("lspci -v", amd_lspci_info(probe).boxed()),
                    ("wmic", amd_wmic_info(probe).boxed()),
                ],
                GpuInfo::default(),
            )
            .await
        }
        GpuType::Apple => GpuInfo {
            name: "Apple Silicon GPU".into(),
            memory_gb: 0,
            gpu_type: GpuType::Apple,
        },
        GpuType::Cpu => GpuInfo::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakers::{CommandRunner, HostFs, NullCommandRunnerBuilder, NullHostFsBuilder};
    use smol::block_on;

    fn linux(runner: CommandRunner, fs: HostFs) -> HostProbe {
        HostProbe::new(runner, fs, HostOs::Linux, "x86_64")
    }

    #[test]
    fn nvidia_detected_and_described() {
        let runner = NullCommandRunnerBuilder::new()
            .cmd(&["nvidia-smi"], "NVIDIA-SMI 550.54")
            .cmd(
                &["nvidia-smi", "--query-gpu=name,memory.total", "--format=csv,noheader,nounits"],
                "NVIDIA GeForce RTX 4090, 24564\n",
            )
            .build();
        let probe = linux(runner, HostFs::new_null());
        let gpu_type = block_on(detect_gpu_type(&probe));
        assert_eq!(gpu_type, GpuType::Nvidia);
        let info = block_on(get_gpu_info(&probe, gpu_type));
        assert_eq!(info.name, "NVIDIA GeForce RTX 4090");
        assert_eq!(info.memory_gb, 24);
    }

    #[test]
    fn amd_through_rocm_dir() {
        let probe = linux(
            CommandRunner::new_null(),
            NullHostFsBuilder::new().dir("/opt/rocm").build(),
        );
        assert_eq!(block_on(detect_gpu_type(&probe)), GpuType::Amd);
    }

    #[test]
    fn amd_through_lspci() {
        let lspci_v = "03:00.0 VGA compatible controller: Advanced Micro Devices, Inc. [AMD/ATI] Navi 31 [Radeon RX 7900 XT/7900 XTX]\n\tFlags: bus master\n";
        let runner = NullCommandRunnerBuilder::new()
            .cmd(&["lspci"], lspci_v)
            .cmd(&["lspci", "-v"], lspci_v)
            .build();
        let probe = linux(runner, HostFs::new_null());
        let gpu_type = block_on(detect_gpu_type(&probe));
        assert_eq!(gpu_type, GpuType::Amd);
        let info = block_on(get_gpu_info(&probe, gpu_type));
        assert_eq!(info.name, "Advanced Micro Devices, Inc. [AMD/ATI] Navi 31 [Radeon RX 7900 XT/7900 XTX]");
        assert_eq!(info.memory_gb, 0);
    }

    #[test]
    fn amd_on_windows() {
        let runner = NullCommandRunnerBuilder::new()
            .cmd(&["wmic", "path", "win32_VideoController", "get", "name"], "Name\nAMD Radeon RX 6800\n")
            .cmd(
                &["wmic", "path", "win32_VideoController", "get", "name,AdapterRAM"],
                "AdapterRAM  Name\nAMD Radeon RX 6800 4293918720\n",
            )
            .build();
        let probe = HostProbe::new(runner, HostFs::new_null(), HostOs::Windows, "x86_64");
        let gpu_type = block_on(detect_gpu_type(&probe));
        assert_eq!(gpu_type, GpuType::Amd);
        let info = block_on(get_gpu_info(&probe, gpu_type));
        assert_eq!(info.name, "AMD Radeon RX 6800");
        assert_eq!(info.memory_gb, 4);
    }

    #[test]
    fn nothing_found_is_cpu() {
        let probe = linux(CommandRunner::new_null(), HostFs::new_null());
        let gpu_type = block_on(detect_gpu_type(&probe));
        assert_eq!(gpu_type, GpuType::Cpu);
        assert_eq!(block_on(get_gpu_info(&probe, gpu_type)), GpuInfo::default());
    }

    #[test]
    fn broken_nvidia_query_falls_back() {
        let runner = NullCommandRunnerBuilder::new()
            .cmd(
                &["nvidia-smi", "--query-gpu=name,memory.total", "--format=csv,noheader,nounits"],
                "garbage",
            )
            .build();
        let probe = linux(runner, HostFs::new_null());
        assert_eq!(block_on(get_gpu_info(&probe, GpuType::Nvidia)), GpuInfo::default());
    }

    #[test]
    fn apple_gpu() {
        let probe = HostProbe::new(CommandRunner::new_null(), HostFs::new_null(), HostOs::MacOs, "arm64");
        assert_eq!(block_on(detect_gpu_type(&probe)), GpuType::Apple);
        assert_eq!(block_on(get_gpu_info(&probe, GpuType::Apple)).name, "Apple Silicon GPU");
    }
}
