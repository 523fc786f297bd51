use std::path::{Path, PathBuf};

use crate::{
    backends::{ComposeAction, ComposeRequest, ContainerRecord},
    fakers::HostFs,
    hardware::SystemInfo,
    monitor::ContainerSnapshot,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AiService {
    pub name: &'static str,
    pub logo: &'static str,
    pub description: &'static str,
    pub default_url: &'static str,
}

pub const CATALOG: &[AiService] = &[
    AiService {
        name: "Ollama",
        logo: "🦙",
        description: "Run large language models locally",
        default_url: "http://localhost:3000",
    },
    AiService {
        name: "SillyTavern",
        logo: "🍺",
        description: "Advanced chat UI for LLMs",
        default_url: "http://localhost:8008",
    },
    AiService {
        name: "Tavern AI",
        logo: "🏮",
        description: "Character-based chat UI for LLMs",
        default_url: "http://localhost:8080",
    },
    AiService {
        name: "Oobabooga",
        logo: "🤖",
        description: "Text generation web UI",
        default_url: "http://localhost:7860",
    },
    AiService {
        name: "A1111",
        logo: "🖼️",
        description: "Stable Diffusion web UI",
        default_url: "http://localhost:7860",
    },
    AiService {
        name: "ComfyUI",
        logo: "🎨",
        description: "Node-based UI for Stable Diffusion",
        default_url: "http://localhost:8188",
    },
    AiService {
        name: "n8n",
        logo: "⚙️",
        description: "Workflow automation tool",
        default_url: "http://localhost:5678",
    },
    AiService {
        name: "Archon",
        logo: "🧠",
        description: "AI agent framework",
        default_url: "http://localhost:8501",
    },
    AiService {
        name: "Supabase",
        logo: "🗄️",
        description: "Open source Firebase alternative",
        default_url: "http://localhost:8000",
    },
];

#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("Compose file not found: {}", .0.display())]
    MissingComposeFile(PathBuf),
}

/// What the Local AI page can offer for a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceAction {
    /// A matching container runs: open its web UI, or stop/restart it.
    Launch { container_id: String },
    /// A matching container exists but is not running.
    Start { container_id: String },
    /// No container yet: build one from the platform's compose file.
    Build,
}

impl AiService {
    /// `Tavern AI` -> `tavern_ai`
    pub fn key(&self) -> String {
        self.name.to_lowercase().replace(' ', "_")
    }

    pub fn matches(&self, container: &ContainerRecord) -> bool {
        container
            .name
            .to_lowercase()
            .contains(&self.name.to_lowercase())
    }

    /// First container, in id order, whose name contains the service name.
    pub fn find_container<'a>(&self, snapshot: &'a ContainerSnapshot) -> Option<&'a ContainerRecord> {
        snapshot.values().find(|c| self.matches(c))
    }

    pub fn is_running(&self, snapshot: &ContainerSnapshot) -> bool {
        self.find_container(snapshot)
            .is_some_and(ContainerRecord::is_running)
    }

    pub fn action(&self, snapshot: &ContainerSnapshot) -> ServiceAction {
        match self.find_container(snapshot) {
            Some(c) if c.is_running() => ServiceAction::Launch {
                container_id: c.id.clone(),
            },
            Some(c) => ServiceAction::Start {
                container_id: c.id.clone(),
            },
            None => ServiceAction::Build,
        }
    }

    /// `compose up` for this service on this machine, logging to
    /// `<drive>/logs/<key>_build.log`. The compose file stays relative to
    /// `compose_root`.
    pub fn build_request(
        &self,
        system: &SystemInfo,
        fs: &HostFs,
        compose_root: &Path,
        drive: &Path,
    ) -> Result<ComposeRequest, ServiceError> {
        let key = self.key();
        let file = system.compose_file(&key);
        let full_path = compose_root.join(&file);
        if !fs.exists(&full_path) {
            return Err(ServiceError::MissingComposeFile(full_path));
        }
        Ok(ComposeRequest::new(file, ComposeAction::Up)
            .project(key.as_str())
            .env("SINGULARITY_DRIVE", drive.to_string_lossy())
            .env("SERVICE_NAME", key.as_str())
            .log_file(drive.join("logs").join(format!("{key}_build.log"))))
    }
}

pub fn find_service(key: &str) -> Option<&'static AiService> {
    CATALOG.iter().find(|s| s.key() == key)
}
