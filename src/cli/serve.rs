use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::{signal, sync::watch};

use crate::server;
use crate::worker::WorkerConfig;

#[derive(Parser, Debug)]
pub struct ServeCommand {
    /// HTTP server port
    #[arg(short, long, default_value = "5000")]
    pub port: u16,

    /// Worker executable used for extraction
    #[arg(long, default_value = "yt-dlp")]
    pub worker_bin: PathBuf,

    /// Override the user agent presented to upstream hosts
    #[arg(long)]
    pub user_agent: Option<String>,
}

impl Default for ServeCommand {
    fn default() -> Self {
        Self {
            port: 5000,
            worker_bin: PathBuf::from("yt-dlp"),
            user_agent: None,
        }
    }
}

impl ServeCommand {
    pub async fn run(self) -> Result<()> {
        let mut worker = WorkerConfig {
            binary: self.worker_bin,
            ..WorkerConfig::default()
        };
        if let Some(user_agent) = self.user_agent {
            worker.user_agent = user_agent;
        }
        let worker = Arc::new(worker);

        // Shutdown signal
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));

        println!("Using worker binary: {}", worker.binary.display());
        println!("HTTP server listening on http://localhost:{}", self.port);

        let server_handle = {
            let worker = Arc::clone(&worker);
            tokio::spawn(async move {
                if let Err(e) = server::run_server(addr, worker, shutdown_rx).await {
                    eprintln!("[server] Error: {}", e);
                }
            })
        };

        // Wait for Ctrl+C
        signal::ctrl_c().await?;
        println!("\nShutting down...");
        let _ = shutdown_tx.send(true);
        let _ = server_handle.await;

        println!("Done.");
        Ok(())
    }
}
