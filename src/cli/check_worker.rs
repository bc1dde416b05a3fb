use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result, bail};
use clap::Parser;

#[derive(Parser, Debug)]
pub struct CheckWorkerCommand {
    /// Worker executable to probe
    #[arg(long, default_value = "yt-dlp")]
    pub worker_bin: PathBuf,
}

impl CheckWorkerCommand {
    /// Run `<worker> --version` so a deployment can be sanity-checked
    /// without issuing a download.
    pub fn run(self) -> Result<()> {
        let output = Command::new(&self.worker_bin)
            .arg("--version")
            .output()
            .with_context(|| format!("failed to execute {}", self.worker_bin.display()))?;

        if !output.status.success() {
            bail!(
                "{} --version exited with code {}",
                self.worker_bin.display(),
                output.status.code().unwrap_or(-1)
            );
        }

        let version = String::from_utf8_lossy(&output.stdout);
        println!("Worker: {}", self.worker_bin.display());
        println!("Version: {}", version.trim());
        Ok(())
    }
}
