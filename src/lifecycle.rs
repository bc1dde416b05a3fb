use std::fmt;

use bytes::Bytes;
use tokio::sync::{mpsc, watch};

use crate::relay::{self, RelayResult};
use crate::request::{self, AudioFormat, ValidationError};
use crate::worker::{self, SpawnError, WorkerConfig};

/// How many relay chunks may sit between the worker pipe and the client
/// connection before the copy stalls.
const SINK_DEPTH: usize = 2;

/// Coarse per-request lifecycle, observable from outside.
///
/// Transitions only move forward; the three terminal states are mutually
/// exclusive and latch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadState {
    Validating,
    Spawning,
    Streaming,
    Succeeded,
    Failed(String),
    Cancelled,
}

impl DownloadState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DownloadState::Succeeded | DownloadState::Failed(_) | DownloadState::Cancelled
        )
    }

    fn rank(&self) -> u8 {
        match self {
            DownloadState::Validating => 0,
            DownloadState::Spawning => 1,
            DownloadState::Streaming => 2,
            _ => 3,
        }
    }
}

/// Watch-backed state cell enforcing forward-only transitions.
pub struct Lifecycle {
    tx: watch::Sender<DownloadState>,
}

impl Lifecycle {
    fn new() -> Self {
        let (tx, _) = watch::channel(DownloadState::Validating);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<DownloadState> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> DownloadState {
        self.tx.borrow().clone()
    }

    /// Advance to `next`. Backward and post-terminal transitions are ignored.
    fn advance(&self, next: DownloadState) {
        self.tx.send_if_modified(move |state| {
            if state.is_terminal() || next.rank() <= state.rank() {
                return false;
            }
            *state = next;
            true
        });
    }
}

/// Why a download could not start. Once streaming has begun, failures no
/// longer surface here; they end up in the lifecycle state instead.
#[derive(Debug)]
pub enum DownloadError {
    Rejected(ValidationError),
    Spawn(SpawnError),
}

impl fmt::Display for DownloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadError::Rejected(e) => write!(f, "{}", e),
            DownloadError::Spawn(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for DownloadError {}

/// A download that passed validation and spawn.
///
/// `body` yields the worker's stdout bytes in order; dropping it is the
/// client-disconnect signal, which the relay task turns into worker
/// termination. `events` reports the coarse lifecycle for an external
/// presentation layer (or a test) to observe.
#[derive(Debug)]
pub struct ActiveDownload {
    pub format: AudioFormat,
    pub worker_id: Option<u32>,
    pub body: mpsc::Receiver<Result<Bytes, std::io::Error>>,
    pub events: watch::Receiver<DownloadState>,
}

/// Run one request through validation and spawn, then hand the byte stream
/// off to a dedicated relay task.
///
/// Exactly one terminal state is reached per call: rejection and spawn
/// failure latch `Failed` here with no process running, and the relay task
/// maps its own outcome otherwise. The terminal state is only published
/// after the worker has been reaped, so observers never see a terminal
/// event while the process is still alive.
pub fn start_download(
    config: &WorkerConfig,
    locator: &str,
    format: Option<&str>,
) -> Result<ActiveDownload, DownloadError> {
    let lifecycle = Lifecycle::new();
    let events = lifecycle.subscribe();

    let request = match request::validate(locator, format) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("[download] rejected: {}", e);
            lifecycle.advance(DownloadState::Failed(e.to_string()));
            return Err(DownloadError::Rejected(e));
        }
    };

    lifecycle.advance(DownloadState::Spawning);
    println!(
        "[download] requested {} as {}",
        request.locator,
        request.format.extension()
    );

    let mut worker = match worker::spawn_worker(config, &request) {
        Ok(worker) => worker,
        Err(e) => {
            eprintln!("[download] {}", e);
            lifecycle.advance(DownloadState::Failed(e.to_string()));
            return Err(DownloadError::Spawn(e));
        }
    };

    let format = request.format;
    let worker_id = worker.id();
    let (sink, body) = mpsc::channel(SINK_DEPTH);

    tokio::spawn(async move {
        lifecycle.advance(DownloadState::Streaming);

        let terminal = match relay::relay(&mut worker, sink).await {
            Ok(RelayResult::Completed) => DownloadState::Succeeded,
            Ok(RelayResult::Incomplete(code)) => {
                eprintln!("[download] worker exited with code {}", code);
                DownloadState::Failed(format!("worker exited with code {}", code))
            }
            Ok(RelayResult::Cancelled) => {
                println!("[download] client disconnected, worker terminated");
                DownloadState::Cancelled
            }
            Err(e) => {
                eprintln!("[download] relay failed: {}", e);
                DownloadState::Failed(e.to_string())
            }
        };

        // Idempotent on the paths that already reaped the worker.
        worker.terminate();
        let _ = worker.wait().await;

        lifecycle.advance(terminal);
    });

    Ok(ActiveDownload {
        format,
        worker_id,
        body,
        events,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_states_only_move_forward() {
        let lifecycle = Lifecycle::new();
        lifecycle.advance(DownloadState::Streaming);
        lifecycle.advance(DownloadState::Spawning);
        assert_eq!(lifecycle.current(), DownloadState::Streaming);
    }

    #[test]
    fn test_terminal_state_latches() {
        let lifecycle = Lifecycle::new();
        lifecycle.advance(DownloadState::Spawning);
        lifecycle.advance(DownloadState::Cancelled);
        lifecycle.advance(DownloadState::Succeeded);
        lifecycle.advance(DownloadState::Failed("late".into()));
        assert_eq!(lifecycle.current(), DownloadState::Cancelled);
    }

    #[test]
    fn test_rejection_never_reaches_spawn() {
        // A binary path that would fail loudly if anything tried to run it.
        let config = WorkerConfig {
            binary: "/nonexistent/worker".into(),
            ..WorkerConfig::default()
        };

        let err = start_download(&config, "", None).unwrap_err();
        assert!(matches!(
            err,
            DownloadError::Rejected(ValidationError::MissingInput)
        ));

        let err = start_download(&config, "not a url", None).unwrap_err();
        assert!(matches!(
            err,
            DownloadError::Rejected(ValidationError::MalformedLocator)
        ));
    }
}
