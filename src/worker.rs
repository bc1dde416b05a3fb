use std::fmt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};

use crate::request::DownloadRequest;

/// Fixed browser-like identification string; some upstream hosts reject
/// requests from obvious download tools.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Worker invocation settings, read-only after startup.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Name or path of the extraction executable.
    pub binary: PathBuf,
    pub user_agent: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("yt-dlp"),
            user_agent: USER_AGENT.to_string(),
        }
    }
}

/// Failure to launch the worker process. No partially-started process is
/// left behind when this is returned.
#[derive(Debug)]
pub struct SpawnError {
    binary: PathBuf,
    source: std::io::Error,
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to launch {}: {}",
            self.binary.display(),
            self.source
        )
    }
}

impl std::error::Error for SpawnError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Build the worker argument vector for a validated request.
///
/// The payload goes to stdout (`-o -`), never to a file, and playlist
/// expansion is off so a playlist-flavored URL still yields a single item.
/// Certificate checks are relaxed: some upstream media hosts present chains
/// the local trust store will not accept.
pub fn build_args(config: &WorkerConfig, request: &DownloadRequest) -> Vec<String> {
    vec![
        request.locator.clone(),
        "-f".into(),
        "bestaudio".into(),
        "-o".into(),
        "-".into(),
        "--no-playlist".into(),
        "--no-check-certificate".into(),
        "--user-agent".into(),
        config.user_agent.clone(),
    ]
}

/// Handle to one running worker, exclusively owned by one request.
pub struct WorkerHandle {
    child: Child,
    stdout: Option<ChildStdout>,
    exit_status: Option<ExitStatus>,
}

/// Spawn a worker for a validated request.
///
/// Stdout is the payload pipe; stderr is drained line by line onto the log
/// as plain diagnostics, never interpreted as a failure signal. Only the
/// exit status decides success. The child is registered for kill-on-drop,
/// so an abandoned handle cannot leak a running process.
pub fn spawn_worker(
    config: &WorkerConfig,
    request: &DownloadRequest,
) -> Result<WorkerHandle, SpawnError> {
    let mut child = Command::new(&config.binary)
        .args(build_args(config, request))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| SpawnError {
            binary: config.binary.clone(),
            source: e,
        })?;

    let stdout = child.stdout.take();

    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                println!("[worker] {}", line);
            }
        });
    }

    Ok(WorkerHandle {
        child,
        stdout,
        exit_status: None,
    })
}

impl WorkerHandle {
    /// Take the payload pipe. Yields `Some` exactly once.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Forcefully stop the worker. Idempotent: safe to call repeatedly and
    /// on a process that has already exited.
    pub fn terminate(&mut self) {
        if self.exit_status.is_none() {
            let _ = self.child.start_kill();
        }
    }

    /// Wait for the worker to exit, caching the status so later callers see
    /// the same result without re-waiting.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        if let Some(status) = self.exit_status {
            return Ok(status);
        }
        let status = self.child.wait().await?;
        self.exit_status = Some(status);
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::validate;

    #[test]
    fn test_argument_vector_shape() {
        let config = WorkerConfig::default();
        let request = validate("https://youtu.be/dQw4w9WgXcQ", Some("mp3")).unwrap();
        let args = build_args(&config, &request);

        assert_eq!(args[0], "https://youtu.be/dQw4w9WgXcQ");
        assert_eq!(args[1], "-f");
        assert_eq!(args[2], "bestaudio");
        assert_eq!(args[3], "-o");
        assert_eq!(args[4], "-");
        assert!(args.contains(&"--no-playlist".to_string()));
        assert!(args.contains(&"--no-check-certificate".to_string()));
        assert_eq!(args.last().unwrap(), &config.user_agent);
    }

    #[test]
    fn test_argv_never_names_an_output_file() {
        let config = WorkerConfig::default();
        let request = validate("https://youtu.be/dQw4w9WgXcQ", Some("wav")).unwrap();
        let args = build_args(&config, &request);

        // `-o` must be followed by `-` (stdout), nothing path-like.
        let pos = args.iter().position(|a| a == "-o").unwrap();
        assert_eq!(args[pos + 1], "-");
    }
}
