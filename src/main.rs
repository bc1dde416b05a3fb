use anyhow::Result;
use clap::Parser;
use vidpull::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::Args::parse().run().await
}
