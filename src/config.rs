use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use crate::{backends::EngineKind, env_file::expand_home, monitor::PollSettings};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_ID: &str = "io.github.singularity.Launcher";
pub const GETTEXT_PACKAGE: &str = "singularity-launcher";
pub const LOCALEDIR: &str = match option_env!("SINGULARITY_LAUNCHER_LOCALEDIR") {
    Some(dir) => dir,
    None => "/usr/share/locale",
};

pub const CONFIG_ENV: &str = "SINGULARITY_LAUNCHER_CONFIG";
pub const LOG_FILE_NAME: &str = "singularity_launcher.log";

const MIN_INTERVAL_SECS: u64 = 1;
const MAX_INTERVAL_SECS: u64 = 5;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("Invalid configuration in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnginePreference {
    #[default]
    Auto,
    Docker,
    Podman,
}

impl EnginePreference {
    pub fn engine_kind(self) -> Option<EngineKind> {
        match self {
            EnginePreference::Auto => None,
            EnginePreference::Docker => Some(EngineKind::Docker),
            EnginePreference::Podman => Some(EngineKind::Podman),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub container_poll_interval_secs: u64,
    pub performance_poll_interval_secs: u64,
    pub join_timeout_ms: u64,
    pub engine: EnginePreference,
    pub compose_root: PathBuf,
    pub env_file: PathBuf,
    pub drive_path: String,
    pub log_tail_lines: u32,
    pub debug_mode: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            container_poll_interval_secs: 5,
            performance_poll_interval_secs: 1,
            join_timeout_ms: 1000,
            engine: EnginePreference::Auto,
            compose_root: PathBuf::from("."),
            env_file: PathBuf::from(".env"),
            drive_path: "~/Singularity".into(),
            log_tail_lines: 100,
            debug_mode: false,
        }
    }
}

impl AppConfig {
    pub fn from_toml(path: &Path, content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `Ok(None)` when the file does not exist.
    pub fn from_file(path: &Path) -> Result<Option<Self>, ConfigError> {
        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml(path, &content).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// `$SINGULARITY_LAUNCHER_CONFIG`, or `config.toml` in the user config dir.
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                gtk::glib::user_config_dir()
                    .join("singularity-launcher")
                    .join("config.toml")
            })
    }

    fn clamp_interval(secs: u64) -> Duration {
        Duration::from_secs(secs.clamp(MIN_INTERVAL_SECS, MAX_INTERVAL_SECS))
    }

    pub fn container_poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Self::clamp_interval(self.container_poll_interval_secs),
            join_timeout: Duration::from_millis(self.join_timeout_ms),
        }
    }

    pub fn performance_poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Self::clamp_interval(self.performance_poll_interval_secs),
            join_timeout: Duration::from_millis(self.join_timeout_ms),
        }
    }

    pub fn drive_path(&self, home: &Path) -> PathBuf {
        expand_home(&self.drive_path, home)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_for_empty_file() {
        let config = AppConfig::from_toml(Path::new("c.toml"), "").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.container_poll_settings().interval, Duration::from_secs(5));
        assert_eq!(config.performance_poll_settings().interval, Duration::from_secs(1));
        assert_eq!(config.container_poll_settings().join_timeout, Duration::from_secs(1));
    }

    #[test]
    fn partial_file_and_engine() {
        let config = AppConfig::from_toml(
            Path::new("c.toml"),
            r#"
                engine = "podman"
                log_tail_lines = 500
                drive_path = "~/ai"
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.engine_kind(), Some(EngineKind::Podman));
        assert_eq!(config.log_tail_lines, 500);
        assert_eq!(config.env_file, PathBuf::from(".env"));
        assert_eq!(config.drive_path(Path::new("/home/ada")), PathBuf::from("/home/ada/ai"));
        assert_eq!(EnginePreference::Auto.engine_kind(), None);
    }

    #[test]
    fn intervals_are_clamped() {
        let config = AppConfig {
            container_poll_interval_secs: 60,
            performance_poll_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.container_poll_settings().interval, Duration::from_secs(5));
        assert_eq!(config.performance_poll_settings().interval, Duration::from_secs(1));
    }

    #[test]
    fn invalid_and_missing_files() {
        let err = AppConfig::from_toml(Path::new("c.toml"), "engine = \"lxc\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));

        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope.toml");
        assert!(AppConfig::from_file(&missing).unwrap().is_none());

        let broken = tmp.path().join("broken.toml");
        fs::write(&broken, "container_poll_interval_secs = \"fast\"").unwrap();
        assert!(matches!(
            AppConfig::from_file(&broken),
            Err(ConfigError::Parse { .. })
        ));
    }
}
