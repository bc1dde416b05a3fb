use anyhow::{Result, anyhow};
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_util::io::ReaderStream;

use crate::worker::WorkerHandle;

/// Read size for the stdout pipe.
const CHUNK_SIZE: usize = 64 * 1024;

/// How a relay ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayResult {
    /// Pipe drained and the worker exited 0.
    Completed,
    /// Pipe drained but the worker exited nonzero. The client may already
    /// hold a truncated stream; a committed response has no way to say so.
    Incomplete(i32),
    /// The client went away mid-copy. The worker has been terminated and
    /// reaped by the time this is returned.
    Cancelled,
}

/// Sending half of the relay; the response body reads from the other end.
pub type ByteSink = mpsc::Sender<Result<Bytes, std::io::Error>>;

/// Copy worker stdout into the sink chunk by chunk, preserving byte order
/// and never holding more than the channel depth in memory.
///
/// The sink is bounded, so a slow client stalls the copy and, through pipe
/// backpressure, the worker itself. The select races the next chunk against
/// sink closure so a disconnect is noticed even while the worker is silent.
pub async fn relay(worker: &mut WorkerHandle, sink: ByteSink) -> Result<RelayResult> {
    let stdout = worker
        .take_stdout()
        .ok_or_else(|| anyhow!("worker stdout already taken"))?;
    let mut chunks = ReaderStream::with_capacity(stdout, CHUNK_SIZE);

    loop {
        tokio::select! {
            chunk = chunks.next() => match chunk {
                Some(Ok(chunk)) => {
                    if sink.send(Ok(chunk)).await.is_err() {
                        return cancel(worker).await;
                    }
                }
                Some(Err(e)) => {
                    // Fold pipe read errors into the exit-status verdict.
                    eprintln!("[relay] read error on worker stdout: {}", e);
                    break;
                }
                None => break,
            },
            _ = sink.closed() => return cancel(worker).await,
        }
    }

    let status = worker.wait().await?;
    if status.success() {
        Ok(RelayResult::Completed)
    } else {
        Ok(RelayResult::Incomplete(status.code().unwrap_or(-1)))
    }
}

async fn cancel(worker: &mut WorkerHandle) -> Result<RelayResult> {
    worker.terminate();
    let _ = worker.wait().await;
    Ok(RelayResult::Cancelled)
}
