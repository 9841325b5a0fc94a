//! CLI command handlers. Each command is in its own file.

mod completions;
mod config;
mod files;
mod man;
mod save;

pub use completions::run_completions;
pub use config::run_config;
pub use files::run_files;
pub use man::run_man;
pub use save::{build_request, run_save, zip_choice, SaveOptions};
