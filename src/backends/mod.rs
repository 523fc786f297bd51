pub mod compose;
pub mod container_record;
pub mod container_runtime;
pub mod docker;
pub mod podman;

pub use compose::{ComposeAction, ComposeRequest};
pub use container_record::{ContainerRecord, ContainerStatus};
pub use container_runtime::{
    ContainerRef, ContainerRuntime, EngineKind, Error, get_container_runtime,
};
