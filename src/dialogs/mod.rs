pub mod command_log_dialog;
pub mod output_dialog;

pub use command_log_dialog::CommandLogDialog;
pub use output_dialog::OutputDialog;
