use futures::FutureExt;

use super::probe::{HostOs, HostProbe, ProbeError, first_ok};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsFamily {
    Arch,
    PopOs,
    Debian,
    Ubuntu,
    Fedora,
    Linux,
    Mac,
    Windows,
    Other,
}

impl OsFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            OsFamily::Arch => "Arch",
            OsFamily::PopOs => "PopOS",
            OsFamily::Debian => "Debian",
            OsFamily::Ubuntu => "Ubuntu",
            OsFamily::Fedora => "Fedora",
            OsFamily::Linux => "Linux",
            OsFamily::Mac => "Mac",
            OsFamily::Windows => "Windows",
            OsFamily::Other => "Other",
        }
    }
}

// Checked in order: Pop!_OS mentions Ubuntu, so it must come first.
const OS_RELEASE_MARKERS: &[(&str, OsFamily)] = &[
    ("Arch Linux", OsFamily::Arch),
    ("Pop!_OS", OsFamily::PopOs),
    ("Debian", OsFamily::Debian),
    ("Ubuntu", OsFamily::Ubuntu),
    ("Fedora", OsFamily::Fedora),
];

fn from_os_release(probe: &HostProbe) -> Result<OsFamily, ProbeError> {
    probe.require_os(HostOs::Linux)?;
    let content = probe.read("/etc/os-release")?;
    OS_RELEASE_MARKERS
        .iter()
        .find(|(marker, _)| content.contains(marker))
        .map(|(_, family)| *family)
        .ok_or_else(|| ProbeError::NoMatch("/etc/os-release".into()))
}

pub async fn detect_os_family(probe: &HostProbe) -> OsFamily {
    match probe.os {
        HostOs::MacOs => OsFamily::Mac,
        HostOs::Windows => OsFamily::Windows,
        HostOs::Other => OsFamily::Other,
        HostOs::Linux => {
            first_ok(
                "os family",
                vec![("os-release", async { from_os_release(probe) }.boxed())],
                OsFamily::Linux,
            )
            .await
        }
    }
}
