mod command;
mod command_runner;
mod host_fs;
mod output_tracker;

pub use command::{Command, FdMode};
pub use command_runner::{
    CommandRunner, CommandRunnerEvent, InnerCommandRunner, NullCommandRunnerBuilder,
};
pub use host_fs::{HostFs, InnerHostFs, NullHostFsBuilder};
pub use output_tracker::OutputTracker;
