//! CLI argument parsing for the susmi-route-worker binary.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "susmi-route-worker", about = "Route and schedule optimization worker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the worker server (default if no subcommand given)
    Serve,
    /// Run database migrations and exit
    Migrate,
}
