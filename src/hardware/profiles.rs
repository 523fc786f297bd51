use std::path::PathBuf;

use super::platform::{AppleSiliconVariant, JetsonModel, PlatformTag};

/// Container resource defaults for a class of machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceProfile {
    pub memory_limit: &'static str,
    pub cpu_limit: &'static str,
    pub performance_profile: &'static str,
    pub torch_compile_mode: &'static str,
    pub environment: &'static [(&'static str, &'static str)],
}

const M4_TUNING: [(&str, &str); 5] = [
    ("PYTORCH_MPS_PREFER_METAL", "1"),
    ("PYTORCH_MPS_ALLOCATOR_POLICY", "garbage_collection"),
    ("COMFYUI_M4_OPTIMIZATIONS", "1"),
    ("COMFYUI_ADVANCED_SAMPLING", "1"),
    ("COMFYUI_FAST_DECODE", "1"),
];

const fn m4_env(high_vram: &'static str) -> [(&'static str, &'static str); 8] {
    [
        M4_TUNING[0],
        M4_TUNING[1],
        M4_TUNING[2],
        M4_TUNING[3],
        M4_TUNING[4],
        ("COMFYUI_HIGHVRAM", high_vram),
        ("COMFYUI_NORMALVRAM", "1"),
        ("COMFYUI_LOWVRAM", "0"),
    ]
}

const HIGH_VRAM: &[(&str, &str)] = &[
    ("COMFYUI_HIGHVRAM", "1"),
    ("COMFYUI_NORMALVRAM", "1"),
    ("COMFYUI_LOWVRAM", "0"),
];
const NORMAL_VRAM: &[(&str, &str)] = &[
    ("COMFYUI_HIGHVRAM", "0"),
    ("COMFYUI_NORMALVRAM", "1"),
    ("COMFYUI_LOWVRAM", "0"),
];
const LOW_VRAM: &[(&str, &str)] = &[
    ("COMFYUI_HIGHVRAM", "0"),
    ("COMFYUI_NORMALVRAM", "0"),
    ("COMFYUI_LOWVRAM", "1"),
];

const M4_MAX_ENV: [(&str, &str); 8] = m4_env("1");
const M4_ENV: [(&str, &str); 8] = m4_env("0");

const fn profile(
    memory_limit: &'static str,
    cpu_limit: &'static str,
    performance_profile: &'static str,
    environment: &'static [(&'static str, &'static str)],
) -> ResourceProfile {
    ResourceProfile {
        memory_limit,
        cpu_limit,
        performance_profile,
        torch_compile_mode: "default",
        environment,
    }
}

static M4_MAX: ResourceProfile = ResourceProfile {
    torch_compile_mode: "max-autotune",
    ..profile("32G", "0.85", "ultra", &M4_MAX_ENV)
};
static M4_PRO: ResourceProfile = profile("24G", "0.80", "high", &M4_ENV);
static M4_BASE: ResourceProfile = profile("16G", "0.75", "optimized", &M4_ENV);
static M3_MAX: ResourceProfile = profile("24G", "0.80", "high", NORMAL_VRAM);
static M3_PRO: ResourceProfile = profile("18G", "0.75", "balanced", NORMAL_VRAM);
static M3_BASE: ResourceProfile = profile("12G", "0.70", "balanced", LOW_VRAM);
static M2_ULTRA: ResourceProfile = profile("32G", "0.85", "ultra", HIGH_VRAM);
static M2_MAX: ResourceProfile = profile("24G", "0.80", "high", NORMAL_VRAM);
static M2_PRO: ResourceProfile = profile("16G", "0.75", "balanced", NORMAL_VRAM);
static M2_BASE: ResourceProfile = profile("12G", "0.70", "balanced", LOW_VRAM);
static M1_ULTRA: ResourceProfile = profile("24G", "0.80", "high", NORMAL_VRAM);
static M1_MAX: ResourceProfile = profile("18G", "0.75", "balanced", NORMAL_VRAM);
static M1_PRO: ResourceProfile = profile("12G", "0.70", "balanced", LOW_VRAM);
static M1_BASE: ResourceProfile = profile("8G", "0.65", "conservative", LOW_VRAM);
static DEFAULT: ResourceProfile = profile("8G", "0.60", "conservative", LOW_VRAM);

/// Looks up the resource profile of a machine; everything that isn't a
/// known Apple Silicon chip gets the conservative default row.
pub fn resource_profile(variant: Option<AppleSiliconVariant>) -> &'static ResourceProfile {
    use AppleSiliconVariant::*;
    match variant {
        Some(M4Max) => &M4_MAX,
        Some(M4Pro) => &M4_PRO,
        Some(M4Base) => &M4_BASE,
        Some(M3Max) => &M3_MAX,
        Some(M3Pro) => &M3_PRO,
        Some(M3Base) => &M3_BASE,
        Some(M2Ultra) => &M2_ULTRA,
        Some(M2Max) => &M2_MAX,
        Some(M2Pro) => &M2_PRO,
        Some(M2Base) => &M2_BASE,
        Some(M1Ultra) => &M1_ULTRA,
        Some(M1Max) => &M1_MAX,
        Some(M1Pro) => &M1_PRO,
        Some(M1Base) => &M1_BASE,
        _ => &DEFAULT,
    }
}

/// Directory under `compose/platforms` holding the compose files for a platform.
pub fn compose_platform_dir(platform: PlatformTag, jetson: Option<JetsonModel>) -> String {
    match (platform, jetson) {
        (PlatformTag::Dgx, _) => "nvidia/dgx".into(),
        (PlatformTag::Jetson, Some(model)) => format!("nvidia/jetson/{model}"),
        (PlatformTag::Nvidia, _) => "nvidia/rtx".into(),
        (PlatformTag::Amd, _) => "amd".into(),
        (PlatformTag::Apple, _) => "apple".into(),
        _ => "x86".into(),
    }
}

/// Relative path of the compose file of `service_key` on this platform.
pub fn compose_file(
    platform: PlatformTag,
    jetson: Option<JetsonModel>,
    service_key: &str,
) -> PathBuf {
    PathBuf::from("compose/platforms")
        .join(compose_platform_dir(platform, jetson))
        .join(format!("{service_key}-compose.yaml"))
}
