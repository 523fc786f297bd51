use serde::Deserialize;
use tracing::{debug, warn};

use crate::backends::container_runtime::{EngineKind, Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerStatus {
    Running,
    Stopped,
    Unknown,
}

impl ContainerStatus {
    pub fn from_state(state: &str) -> Self {
        match state.trim().to_ascii_lowercase().as_str() {
            "running" => ContainerStatus::Running,
            "exited" | "created" | "stopped" | "paused" | "dead" | "configured" => {
                ContainerStatus::Stopped
            }
            _ => ContainerStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerStatus::Running => "running",
            ContainerStatus::Stopped => "stopped",
            ContainerStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRecord {
    pub id: String,
    pub name: String,
    pub status: ContainerStatus,
    /// State as reported by the engine, e.g. `exited`.
    pub state: String,
    /// Human readable status, e.g. `Up 2 hours`.
    pub status_text: String,
    pub image: String,
    pub ports: Vec<String>,
    pub engine: EngineKind,
}

impl ContainerRecord {
    pub fn is_running(&self) -> bool {
        self.status == ContainerStatus::Running
    }
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum StringOrList {
    Text(String),
    List(Vec<String>),
}

#[derive(Deserialize, Debug)]
struct PodmanPort {
    #[serde(default)]
    host_ip: String,
    #[serde(default)]
    host_port: u32,
    #[serde(default)]
    container_port: u32,
    #[serde(default)]
    protocol: String,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum RawPorts {
    Text(String),
    List(Vec<PodmanPort>),
}

// Docker prints one object per line with string fields,
// podman prints an array with `Names` and `Ports` as arrays.
#[derive(Deserialize, Debug)]
struct RawContainer {
    #[serde(rename = "ID", alias = "Id")]
    id: Option<String>,
    #[serde(rename = "Names", default)]
    names: Option<StringOrList>,
    #[serde(rename = "Image", default)]
    image: Option<String>,
    #[serde(rename = "State", default)]
    state: Option<serde_json::Value>,
    #[serde(rename = "Status", default)]
    status: Option<String>,
    #[serde(rename = "Ports", default)]
    ports: Option<RawPorts>,
}

impl RawContainer {
    fn into_record(self, engine: EngineKind) -> Result<ContainerRecord, Error> {
        let id = self
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| Error::InvalidField("ID".into(), "missing container id".into()))?;
        let name = match self.names {
            Some(StringOrList::Text(names)) => {
                names.split(',').next().unwrap_or_default().trim().to_string()
            }
            Some(StringOrList::List(names)) => names.into_iter().next().unwrap_or_default(),
            None => String::new(),
        };
        let state = match self.state {
            Some(serde_json::Value::String(s)) => s,
            _ => String::new(),
        };
        let ports = match self.ports {
            Some(RawPorts::Text(ports)) => ports
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
            Some(RawPorts::List(ports)) => ports
                .into_iter()
                .map(|p| {
                    let host_ip = if p.host_ip.is_empty() {
                        "0.0.0.0"
                    } else {
                        &p.host_ip
                    };
                    format!(
                        "{}:{}->{}/{}",
                        host_ip, p.host_port, p.container_port, p.protocol
                    )
                })
                .collect(),
            None => vec![],
        };

        Ok(ContainerRecord {
            status: ContainerStatus::from_state(&state),
            id,
            name,
            state,
            status_text: self.status.unwrap_or_default(),
            image: self.image.unwrap_or_default(),
            ports,
            engine,
        })
    }
}

fn parse_value(value: serde_json::Value, engine: EngineKind) -> Result<ContainerRecord, Error> {
    let raw: RawContainer =
        serde_json::from_value(value).map_err(|e| Error::ParseOutput(e.to_string()))?;
    raw.into_record(engine)
}

/// Parses `<engine> ps -a --format json`.
///
/// Accepts a JSON array or JSON lines. Malformed entries are skipped; the
/// whole output is rejected only when it can't be read at all.
pub fn parse_container_list(output: &str, engine: EngineKind) -> Result<Vec<ContainerRecord>, Error> {
    let output = output.trim();
    if output.is_empty() {
        return Ok(vec![]);
    }

    let values: Vec<Result<serde_json::Value, String>> = if output.starts_with('[') {
        serde_json::from_str::<Vec<serde_json::Value>>(output)
            .map_err(|e| Error::ParseOutput(e.to_string()))?
            .into_iter()
            .map(Ok)
            .collect()
    } else {
        output
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(|e| e.to_string()))
            .collect()
    };

    let total = values.len();
    let mut records = Vec::with_capacity(total);
    for value in values {
        match value.map_err(Error::ParseOutput).and_then(|v| parse_value(v, engine)) {
            Ok(record) => records.push(record),
            Err(e) => warn!(error = %e, "Skipping malformed container entry"),
        }
    }
    debug!(parsed = records.len(), skipped = total - records.len(), "Parsed container list");
    Ok(records)
}
