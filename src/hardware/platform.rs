use std::fmt;

use futures::FutureExt;

use super::{
    cpu::CpuType,
    gpu::GpuType,
    probe::{HostProbe, ProbeError, first_ok},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformTag {
    Dgx,
    Jetson,
    Apple,
    Nvidia,
    Amd,
    Intel,
    Arm,
    Unknown,
}

impl PlatformTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformTag::Dgx => "dgx",
            PlatformTag::Jetson => "jetson",
            PlatformTag::Apple => "apple",
            PlatformTag::Nvidia => "nvidia",
            PlatformTag::Amd => "amd",
            PlatformTag::Intel => "intel",
            PlatformTag::Arm => "arm",
            PlatformTag::Unknown => "unknown",
        }
    }
}

fn dgx(probe: &HostProbe) -> Result<PlatformTag, ProbeError> {
    if probe.fs.exists("/etc/dgx-release") {
        return Ok(PlatformTag::Dgx);
    }
    if probe.read("/proc/cpuinfo")?.contains("NVIDIA DGX") {
        Ok(PlatformTag::Dgx)
    } else {
        Err(ProbeError::NoMatch("dgx markers".into()))
    }
}

fn tag_if(cond: bool, tag: PlatformTag) -> Result<PlatformTag, ProbeError> {
    if cond {
        Ok(tag)
    } else {
        Err(ProbeError::NoMatch(tag.as_str().into()))
    }
}

pub async fn detect_platform(probe: &HostProbe, gpu: GpuType, cpu: CpuType) -> PlatformTag {
    first_ok(
        "platform",
        vec![
            ("dgx", async { dgx(probe) }.boxed()),
            (
                "jetson",
                async {
                    probe
                        .require_exists("/etc/nv_tegra_release")
                        .map(|_| PlatformTag::Jetson)
                }
                .boxed(),
            ),
            ("apple", async { tag_if(probe.is_apple_silicon(), PlatformTag::Apple) }.boxed()),
            ("nvidia gpu", async { tag_if(gpu == GpuType::Nvidia, PlatformTag::Nvidia) }.boxed()),
            ("amd gpu", async { tag_if(gpu == GpuType::Amd, PlatformTag::Amd) }.boxed()),
            (
                "cpu vendor",
                async {
                    match cpu {
                        CpuType::Amd => Ok(PlatformTag::Amd),
                        CpuType::Intel => Ok(PlatformTag::Intel),
                        CpuType::Arm => Ok(PlatformTag::Arm),
                        _ => Err(ProbeError::NoMatch("cpu vendor".into())),
                    }
                }
                .boxed(),
            ),
            ("x86_64", async { tag_if(probe.is_x86_64(), PlatformTag::Intel) }.boxed()),
            ("arm machine", async { tag_if(probe.is_arm(), PlatformTag::Arm) }.boxed()),
        ],
        PlatformTag::Unknown,
    )
    .await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppleSiliconVariant {
    M1Base,
    M1Pro,
    M1Max,
    M1Ultra,
    M1Unknown,
    M2Base,
    M2Pro,
    M2Max,
    M2Ultra,
    M2Unknown,
    M3Base,
    M3Pro,
    M3Max,
    M3Unknown,
    M4Base,
    M4Pro,
    M4Max,
    M4Unknown,
    Unknown,
}

impl AppleSiliconVariant {
    pub fn as_str(&self) -> &'static str {
        use AppleSiliconVariant::*;
        match self {
            M1Base => "M1_BASE",
            M1Pro => "M1_PRO",
            M1Max => "M1_MAX",
            M1Ultra => "M1_ULTRA",
            M1Unknown => "M1_UNKNOWN",
            M2Base => "M2_BASE",
            M2Pro => "M2_PRO",
            M2Max => "M2_MAX",
            M2Ultra => "M2_ULTRA",
            M2Unknown => "M2_UNKNOWN",
            M3Base => "M3_BASE",
            M3Pro => "M3_PRO",
            M3Max => "M3_MAX",
            M3Unknown => "M3_UNKNOWN",
            M4Base => "M4_BASE",
            M4Pro => "M4_PRO",
            M4Max => "M4_MAX",
            M4Unknown => "M4_UNKNOWN",
            Unknown => "UNKNOWN",
        }
    }

    /// Classifies a chip from its brand string and its
    /// performance/efficiency core counts.
    pub fn classify(brand: &str, performance_cores: u32, efficiency_cores: u32) -> Self {
        use AppleSiliconVariant::*;

        // (marker, tiers from the largest down, fallback)
        const GENERATIONS: &[(&str, &[(AppleSiliconVariant, u32, u32)], AppleSiliconVariant)] = &[
            ("M4", &[(M4Max, 14, 20), (M4Pro, 12, 16), (M4Base, 4, 6)], M4Unknown),
            ("M3", &[(M3Max, 12, 16), (M3Pro, 8, 4), (M3Base, 4, 4)], M3Unknown),
            (
                "M2",
                &[(M2Ultra, 8, 16), (M2Max, 8, 8), (M2Pro, 6, 4), (M2Base, 4, 4)],
                M2Unknown,
            ),
            (
                "M1",
                &[(M1Ultra, 8, 16), (M1Max, 8, 8), (M1Pro, 6, 2), (M1Base, 4, 4)],
                M1Unknown,
            ),
        ];

        let Some((_, tiers, fallback)) = GENERATIONS
            .iter()
            .find(|(marker, _, _)| brand.contains(marker))
        else {
            return Unknown;
        };
        tiers
            .iter()
            .find(|(_, p, e)| performance_cores >= *p && efficiency_cores >= *e)
            .map(|(variant, _, _)| *variant)
            .unwrap_or(*fallback)
    }
}

impl fmt::Display for AppleSiliconVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

async fn sysctl_u32(probe: &HostProbe, key: &str) -> u32 {
    match probe.run(&["sysctl", "-n", key]).await {
        Ok(out) => out.trim().parse().unwrap_or(0),
        Err(_) => 0,
    }
}

async fn apple_variant(probe: &HostProbe) -> Result<AppleSiliconVariant, ProbeError> {
    if !probe.is_apple_silicon() {
        return Err(ProbeError::UnsupportedPlatform);
    }
    let brand = probe
        .run(&["sysctl", "-n", "machdep.cpu.brand_string"])
        .await?;
    let performance = sysctl_u32(probe, "hw.perflevel0.physicalcpu").await;
    let efficiency = sysctl_u32(probe, "hw.perflevel1.physicalcpu").await;
    Ok(AppleSiliconVariant::classify(
        brand.trim(),
        performance,
        efficiency,
    ))
}

pub async fn detect_apple_variant(probe: &HostProbe) -> AppleSiliconVariant {
    first_ok(
        "apple silicon variant",
        vec![("sysctl", apple_variant(probe).boxed())],
        AppleSiliconVariant::Unknown,
    )
    .await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JetsonModel {
    OrinNano4Gb,
    OrinNano8Gb,
    OrinNx8Gb,
    OrinNx16Gb,
    Agx32Gb,
    Agx64Gb,
    UnknownJetson,
    Unknown,
}

impl JetsonModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            JetsonModel::OrinNano4Gb => "orin_nano_4gb",
            JetsonModel::OrinNano8Gb => "orin_nano_8gb",
            JetsonModel::OrinNx8Gb => "orin_nx_8gb",
            JetsonModel::OrinNx16Gb => "orin_nx_16gb",
            JetsonModel::Agx32Gb => "agx_32gb",
            JetsonModel::Agx64Gb => "agx_64gb",
            JetsonModel::UnknownJetson => "unknown_jetson",
            JetsonModel::Unknown => "unknown",
        }
    }

    /// Classifies a `/proc/device-tree/model` string.
    pub fn classify(model: &str, memory_gb: u64) -> Self {
        let model = model.to_lowercase();
        if model.contains("orin") {
            if model.contains("nano") {
                return if memory_gb <= 4 {
                    JetsonModel::OrinNano4Gb
                } else {
                    JetsonModel::OrinNano8Gb
                };
            }
            if model.contains("nx") {
                return if memory_gb <= 8 {
                    JetsonModel::OrinNx8Gb
                } else {
                    JetsonModel::OrinNx16Gb
                };
            }
            if model.contains("agx") {
                return if memory_gb <= 32 {
                    JetsonModel::Agx32Gb
                } else {
                    JetsonModel::Agx64Gb
                };
            }
        }
        JetsonModel::UnknownJetson
    }
}

impl fmt::Display for JetsonModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn jetson_model(probe: &HostProbe, memory_gb: u64) -> Result<JetsonModel, ProbeError> {
    probe.require_exists("/etc/nv_tegra_release")?;
    let model = probe.read("/proc/device-tree/model")?;
    Ok(JetsonModel::classify(model.trim_end_matches('\0'), memory_gb))
}

pub async fn detect_jetson_model(probe: &HostProbe, memory_gb: u64) -> JetsonModel {
    first_ok(
        "jetson model",
        vec![("device-tree", async { jetson_model(probe, memory_gb) }.boxed())],
        JetsonModel::Unknown,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakers::{CommandRunner, HostFs, NullCommandRunnerBuilder, NullHostFsBuilder};
    use crate::hardware::probe::HostOs;
    use smol::block_on;

    #[test]
    fn apple_thresholds() {
        use AppleSiliconVariant::*;
        let cases = [
            ("Apple M4 Max", 14, 20, M4Max),
            ("Apple M4 Pro", 12, 16, M4Pro),
            ("Apple M4", 4, 6, M4Base),
            ("Apple M4", 4, 4, M4Unknown),
            ("Apple M3 Max", 12, 16, M3Max),
            ("Apple M3 Pro", 8, 4, M3Pro),
            ("Apple M3", 4, 4, M3Base),
            ("Apple M2 Ultra", 8, 16, M2Ultra),
            ("Apple M2 Max", 8, 8, M2Max),
            ("Apple M2 Max", 8, 4, M2Pro),
            ("Apple M2 Pro", 6, 4, M2Pro),
            ("Apple M2", 4, 4, M2Base),
            ("Apple M1 Ultra", 8, 16, M1Ultra),
            ("Apple M1 Max", 8, 2, M1Pro),
            ("Apple M1 Pro", 6, 2, M1Pro),
            ("Apple M1", 4, 4, M1Base),
            ("Apple M1", 0, 0, M1Unknown),
            ("Intel(R) Core(TM) i9", 8, 0, Unknown),
        ];
        for (brand, p, e, expected) in cases {
            assert_eq!(
                AppleSiliconVariant::classify(brand, p, e),
                expected,
                "{brand} {p}P/{e}E"
            );
        }
    }

    #[test]
    fn apple_variant_from_sysctl() {
        let runner = NullCommandRunnerBuilder::new()
            .cmd(&["sysctl", "-n", "machdep.cpu.brand_string"], "Apple M3 Pro\n")
            .cmd(&["sysctl", "-n", "hw.perflevel0.physicalcpu"], "6\n")
            .cmd(&["sysctl", "-n", "hw.perflevel1.physicalcpu"], "6\n")
            .build();
        let probe = HostProbe::new(runner, HostFs::new_null(), HostOs::MacOs, "arm64");
        assert_eq!(block_on(detect_apple_variant(&probe)), AppleSiliconVariant::M3Base);
    }

    #[test]
    fn missing_efficiency_cores_count_as_zero() {
        let runner = NullCommandRunnerBuilder::new()
            .cmd(&["sysctl", "-n", "machdep.cpu.brand_string"], "Apple M1 Ultra")
            .cmd(&["sysctl", "-n", "hw.perflevel0.physicalcpu"], "16")
            .build();
        let probe = HostProbe::new(runner, HostFs::new_null(), HostOs::MacOs, "arm64");
        assert_eq!(block_on(detect_apple_variant(&probe)), AppleSiliconVariant::M1Unknown);
    }

    #[test]
    fn apple_variant_needs_apple_silicon() {
        let probe = HostProbe::new(CommandRunner::new_null(), HostFs::new_null(), HostOs::MacOs, "x86_64");
        assert_eq!(block_on(detect_apple_variant(&probe)), AppleSiliconVariant::Unknown);
    }

    #[test]
    fn jetson_models() {
        assert_eq!(JetsonModel::classify("NVIDIA Jetson Orin Nano Developer Kit", 4), JetsonModel::OrinNano4Gb);
        assert_eq!(JetsonModel::classify("NVIDIA Jetson Orin Nano Developer Kit", 8), JetsonModel::OrinNano8Gb);
        assert_eq!(JetsonModel::classify("NVIDIA Jetson Orin NX", 8), JetsonModel::OrinNx8Gb);
        assert_eq!(JetsonModel::classify("NVIDIA Jetson Orin NX", 16), JetsonModel::OrinNx16Gb);
        assert_eq!(JetsonModel::classify("Jetson AGX Orin", 32), JetsonModel::Agx32Gb);
        assert_eq!(JetsonModel::classify("Jetson AGX Orin", 64), JetsonModel::Agx64Gb);
        assert_eq!(JetsonModel::classify("NVIDIA Jetson Xavier NX", 8), JetsonModel::UnknownJetson);
    }

    #[test]
    fn jetson_detection_needs_tegra_release() {
        let fs = NullHostFsBuilder::new()
            .file("/proc/device-tree/model", "NVIDIA Jetson AGX Orin\0")
            .build();
        let probe = HostProbe::new(CommandRunner::new_null(), fs, HostOs::Linux, "aarch64");
        assert_eq!(block_on(detect_jetson_model(&probe, 64)), JetsonModel::Unknown);

        let fs = NullHostFsBuilder::new()
            .file("/etc/nv_tegra_release", "# R36 (release)")
            .file("/proc/device-tree/model", "NVIDIA Jetson AGX Orin\0")
            .build();
        let probe = HostProbe::new(CommandRunner::new_null(), fs, HostOs::Linux, "aarch64");
        assert_eq!(block_on(detect_jetson_model(&probe, 64)), JetsonModel::Agx64Gb);
        assert_eq!(block_on(detect_platform(&probe, GpuType::Cpu, CpuType::Arm)), PlatformTag::Jetson);
    }

    #[test]
    fn platform_chain() {
        let plain = HostProbe::new(CommandRunner::new_null(), HostFs::new_null(), HostOs::Linux, "x86_64");
        assert_eq!(block_on(detect_platform(&plain, GpuType::Nvidia, CpuType::Amd)), PlatformTag::Nvidia);
        assert_eq!(block_on(detect_platform(&plain, GpuType::Amd, CpuType::Intel)), PlatformTag::Amd);
        assert_eq!(block_on(detect_platform(&plain, GpuType::Cpu, CpuType::Amd)), PlatformTag::Amd);
        assert_eq!(block_on(detect_platform(&plain, GpuType::Cpu, CpuType::Unknown)), PlatformTag::Intel);

        let dgx = HostProbe::new(
            CommandRunner::new_null(),
            NullHostFsBuilder::new().file("/proc/cpuinfo", "model name : NVIDIA DGX Grace").build(),
            HostOs::Linux,
            "aarch64",
        );
        assert_eq!(block_on(detect_platform(&dgx, GpuType::Nvidia, CpuType::Arm)), PlatformTag::Dgx);

        let riscv = HostProbe::new(CommandRunner::new_null(), HostFs::new_null(), HostOs::Linux, "riscv64");
        assert_eq!(block_on(detect_platform(&riscv, GpuType::Cpu, CpuType::Unknown)), PlatformTag::Unknown);

        let mac = HostProbe::new(CommandRunner::new_null(), HostFs::new_null(), HostOs::MacOs, "arm64");
        assert_eq!(block_on(detect_platform(&mac, GpuType::Apple, CpuType::Apple)), PlatformTag::Apple);
    }
}
