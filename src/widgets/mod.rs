mod output_terminal;
mod window;

pub use output_terminal::OutputTerminal;
pub use window::LauncherWindow;
