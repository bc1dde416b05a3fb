use anyhow::Result;
use clap::{Parser, Subcommand};

mod check_worker;
mod serve;

pub use check_worker::CheckWorkerCommand;
pub use serve::ServeCommand;

#[derive(Parser, Debug)]
#[command(name = "vidpull")]
#[command(about = "Stream YouTube audio extractions back as file downloads")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP download server (default)
    Serve(ServeCommand),
    /// Check that the worker executable is usable and exit
    CheckWorker(CheckWorkerCommand),
}

impl Args {
    pub async fn run(self) -> Result<()> {
        let command = self
            .command
            .unwrap_or(Command::Serve(ServeCommand::default()));

        match command {
            Command::Serve(cmd) => cmd.run().await,
            Command::CheckWorker(cmd) => cmd.run(),
        }
    }
}
