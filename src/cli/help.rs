//! CLI help and command-name contract for logging.

use crate::cli::parse::Commands;

/// Command name string for log spans (e.g. "submit", "questions").
pub fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Submit { .. } => "submit",
        Commands::Work { .. } => "work",
        Commands::Status { .. } => "status",
        Commands::Jobs { .. } => "jobs",
        Commands::Questions { .. } => "questions",
        Commands::Presets => "presets",
    }
}
