use futures::FutureExt;

use super::probe::{HostOs, HostProbe, ProbeError, first_ok};

pub const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

pub fn bytes_to_gib(bytes: u64) -> u64 {
    (bytes as f64 / GIB).round() as u64
}

fn from_meminfo(probe: &HostProbe) -> Result<u64, ProbeError> {
    probe.require_os(HostOs::Linux)?;
    let content = probe.read("/proc/meminfo")?;
    let kib: u64 = content
        .lines()
        .find(|line| line.starts_with("MemTotal"))
        .and_then(|line| line.split_whitespace().nth(1))
        .ok_or_else(|| ProbeError::NoMatch("/proc/meminfo".into()))?
        .parse()
        .map_err(|_| ProbeError::Parse("MemTotal".into()))?;
    kib.checked_mul(1024)
        .map(bytes_to_gib)
        .ok_or_else(|| ProbeError::Parse("MemTotal out of range".into()))
}

async fn from_sysctl(probe: &HostProbe) -> Result<u64, ProbeError> {
    probe.require_os(HostOs::MacOs)?;
    let out = probe.run(&["sysctl", "-n", "hw.memsize"]).await?;
    out.trim()
        .parse()
        .map(bytes_to_gib)
        .map_err(|_| ProbeError::Parse("hw.memsize".into()))
}

async fn from_wmic(probe: &HostProbe) -> Result<u64, ProbeError> {
    probe.require_os(HostOs::Windows)?;
    let out = probe
        .run(&["wmic", "computersystem", "get", "totalphysicalmemory"])
        .await?;
    out.lines()
        .skip(1)
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| ProbeError::NoMatch("wmic computersystem".into()))?
        .trim()
        .parse()
        .map(bytes_to_gib)
        .map_err(|_| ProbeError::Parse("totalphysicalmemory".into()))
}

/// Total memory in GiB, rounded. 8 when nothing answers.
pub async fn total_memory_gb(probe: &HostProbe) -> u64 {
    let sysinfo_total = probe.facts.total_memory_bytes;
    first_ok(
        "total memory",
        vec![
            (
                "sysinfo",
                async move {
                    sysinfo_total
                        .map(bytes_to_gib)
                        .ok_or(ProbeError::UnsupportedPlatform)
                }
                .boxed(),
            ),
            ("meminfo", async { from_meminfo(probe) }.boxed()),
            ("sysctl", from_sysctl(probe).boxed()),
            ("wmic", from_wmic(probe).boxed()),
        ],
        8,
    )
    .await
}
