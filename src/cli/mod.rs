//! The `autonomy` command line.
//!
//! - `Cli`, `Commands`, `RunArgs`: clap definitions and the budget flag layer
//! - `Display`: styled session summaries, score bars and the progress spinner
//! - `ConsoleHumanChannel`: terminal approval prompt for risky actions

mod commands;
mod display;
mod interactive;

pub use commands::{Cli, Commands, ConfigAction, OutputFormat, RunArgs};
pub use display::Display;
pub use interactive::ConsoleHumanChannel;
