use futures::FutureExt;

use super::probe::{HostOs, HostProbe, ProbeError, first_ok};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CpuType {
    Amd,
    Arm,
    Intel,
    Apple,
    Unknown,
}

impl CpuType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CpuType::Amd => "amd",
            CpuType::Arm => "arm",
            CpuType::Intel => "intel",
            CpuType::Apple => "apple",
            CpuType::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuInfo {
    pub brand: String,
    pub cores: usize,
    pub arch: String,
    pub cpu_type: CpuType,
}

fn vendor_in(text: &str, source: &str) -> Result<CpuType, ProbeError> {
    let text = text.to_lowercase();
    if text.contains("amd") {
        Ok(CpuType::Amd)
    } else if text.contains("intel") {
        Ok(CpuType::Intel)
    } else {
        Err(ProbeError::NoMatch(source.into()))
    }
}

fn when(cond: bool, cpu_type: CpuType) -> Result<CpuType, ProbeError> {
    if cond {
        Ok(cpu_type)
    } else {
        Err(ProbeError::UnsupportedPlatform)
    }
}

fn from_cpuinfo(probe: &HostProbe) -> Result<CpuType, ProbeError> {
    probe.require_os(HostOs::Linux)?;
    let content = probe.read("/proc/cpuinfo")?;
    // The vendor lines are enough, flags may mention either vendor.
    let vendor_lines = content
        .lines()
        .filter(|l| l.starts_with("vendor_id") || l.starts_with("model name"))
        .collect::<Vec<_>>()
        .join("\n");
    if vendor_lines.is_empty() {
        vendor_in(&content, "/proc/cpuinfo")
    } else {
        vendor_in(&vendor_lines, "/proc/cpuinfo")
    }
}

async fn from_wmic(probe: &HostProbe) -> Result<CpuType, ProbeError> {
    probe.require_os(HostOs::Windows)?;
    let out = probe.run(&["wmic", "cpu", "get", "name"]).await?;
    vendor_in(&out, "wmic cpu")
}

pub async fn detect_cpu_type(probe: &HostProbe) -> CpuType {
    let vendor = probe.facts.cpu_vendor.clone().unwrap_or_default();
    first_ok(
        "cpu type",
        vec![
            ("apple silicon", async { when(probe.is_apple_silicon(), CpuType::Apple) }.boxed()),
            ("arm machine", async { when(probe.is_arm(), CpuType::Arm) }.boxed()),
            ("sysinfo vendor", async move { vendor_in(&vendor, "sysinfo") }.boxed()),
            ("cpuinfo", async { from_cpuinfo(probe) }.boxed()),
            ("wmic", from_wmic(probe).boxed()),
            ("x86_64", async { when(probe.is_x86_64(), CpuType::Intel) }.boxed()),
        ],
        CpuType::Unknown,
    )
    .await
}

pub async fn get_cpu_info(probe: &HostProbe) -> CpuInfo {
    CpuInfo {
        brand: probe
            .facts
            .cpu_brand
            .clone()
            .unwrap_or_else(|| "Unknown CPU".into()),
        cores: probe.facts.cpu_cores.unwrap_or(4),
        arch: probe.arch.clone(),
        cpu_type: detect_cpu_type(probe).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakers::{CommandRunner, HostFs, NullCommandRunnerBuilder, NullHostFsBuilder};
    use crate::hardware::probe::HostFacts;
    use smol::block_on;

    #[test]
    fn apple_and_arm() {
        let mac = HostProbe::new(CommandRunner::new_null(), HostFs::new_null(), HostOs::MacOs, "arm64");
        assert_eq!(block_on(detect_cpu_type(&mac)), CpuType::Apple);
        let pi = HostProbe::new(CommandRunner::new_null(), HostFs::new_null(), HostOs::Linux, "aarch64");
        assert_eq!(block_on(detect_cpu_type(&pi)), CpuType::Arm);
    }

    #[test]
    fn vendor_from_sysinfo() {
        let probe = HostProbe::new(CommandRunner::new_null(), HostFs::new_null(), HostOs::Linux, "x86_64")
            .with_facts(HostFacts {
                cpu_vendor: Some("AuthenticAMD".into()),
                ..Default::default()
            });
        assert_eq!(block_on(detect_cpu_type(&probe)), CpuType::Amd);
    }

    #[test]
    fn vendor_from_cpuinfo() {
        let fs = NullHostFsBuilder::new()
            .file(
                "/proc/cpuinfo",
                "processor\t: 0\nvendor_id\t: GenuineIntel\nmodel name\t: 13th Gen Intel(R) Core(TM) i7-13700K\nflags\t\t: fpu amd_lbr\n",
            )
            .build();
        let probe = HostProbe::new(CommandRunner::new_null(), fs, HostOs::Linux, "x86_64");
        assert_eq!(block_on(detect_cpu_type(&probe)), CpuType::Intel);
    }

    #[test]
    fn vendor_from_wmic() {
        let runner = NullCommandRunnerBuilder::new()
            .cmd(&["wmic", "cpu", "get", "name"], "Name\nAMD Ryzen 9 7950X 16-Core Processor\n")
            .build();
        let probe = HostProbe::new(runner, HostFs::new_null(), HostOs::Windows, "x86_64");
        assert_eq!(block_on(detect_cpu_type(&probe)), CpuType::Amd);
    }

    #[test]
    fn fallbacks() {
        let x86 = HostProbe::new(CommandRunner::new_null(), HostFs::new_null(), HostOs::Linux, "x86_64");
        assert_eq!(block_on(detect_cpu_type(&x86)), CpuType::Intel);
        let other = HostProbe::new(CommandRunner::new_null(), HostFs::new_null(), HostOs::Other, "riscv64");
        assert_eq!(block_on(detect_cpu_type(&other)), CpuType::Unknown);

        let info = block_on(get_cpu_info(&other));
        assert_eq!(info.brand, "Unknown CPU");
        assert_eq!(info.cores, 4);
        assert_eq!(info.arch, "riscv64");
    }
}
