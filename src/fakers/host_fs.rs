// Read-only view of the host filesystem used by the hardware probes,
// with a `NullHostFs` that serves files from memory.

use std::{
    collections::{HashMap, HashSet},
    fmt, io,
    path::{Path, PathBuf},
    sync::Arc,
};

pub trait InnerHostFs: Send + Sync {
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
    fn exists(&self, path: &Path) -> bool;
}

#[derive(Clone)]
pub struct HostFs {
    inner: Arc<dyn InnerHostFs>,
}

impl HostFs {
    pub fn new(inner: Arc<dyn InnerHostFs>) -> Self {
        HostFs { inner }
    }
    pub fn new_real() -> Self {
        HostFs::new(Arc::new(RealHostFs))
    }
    pub fn new_null() -> Self {
        NullHostFsBuilder::new().build()
    }

    pub fn read_to_string(&self, path: impl AsRef<Path>) -> io::Result<String> {
        self.inner.read_to_string(path.as_ref())
    }
    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.inner.exists(path.as_ref())
    }
}

impl Default for HostFs {
    fn default() -> Self {
        HostFs::new_null()
    }
}

impl fmt::Debug for HostFs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFs").finish_non_exhaustive()
    }
}

struct RealHostFs;

impl InnerHostFs for RealHostFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

#[derive(Default, Clone)]
pub struct NullHostFsBuilder {
    files: HashMap<PathBuf, String>,
    dirs: HashSet<PathBuf>,
}

impl NullHostFsBuilder {
    pub fn new() -> Self {
        Default::default()
    }
    /// Registers a readable file.
    pub fn file(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> &mut Self {
        self.files.insert(path.into(), content.into());
        self
    }
    /// Registers a path that exists but can't be read as a file.
    pub fn dir(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.dirs.insert(path.into());
        self
    }
    pub fn build(&self) -> HostFs {
        HostFs::new(Arc::new(NullHostFs {
            files: self.files.clone(),
            dirs: self.dirs.clone(),
        }))
    }
}

struct NullHostFs {
    files: HashMap<PathBuf, String>,
    dirs: HashSet<PathBuf>,
}

impl InnerHostFs for NullHostFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: no such file", path.display()),
            )
        })
    }
    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(path) || self.dirs.contains(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_fs_serves_registered_files() {
        let fs = NullHostFsBuilder::new()
            .file("/etc/os-release", "NAME=\"Fedora Linux\"\n")
            .dir("/opt/rocm")
            .build();
        assert_eq!(
            fs.read_to_string("/etc/os-release").unwrap(),
            "NAME=\"Fedora Linux\"\n"
        );
        assert!(fs.exists("/opt/rocm"));
        assert!(fs.read_to_string("/opt/rocm").is_err());
    }

    #[test]
    fn null_fs_reports_missing_files() {
        let fs = HostFs::new_null();
        assert!(!fs.exists("/etc/nv_tegra_release"));
        let err = fs.read_to_string("/proc/cpuinfo").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
