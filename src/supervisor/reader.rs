//! Interpreter output reader tasks.
//!
//! One reader runs per standard stream. Each drives a [`FramedRead`] over
//! the pipe with [`ChunkCodec`] and forwards every decoded fragment as a
//! [`RunEvent`]. The stdout reader additionally feeds each fragment through
//! a [`PromptScanner`] and follows the output event with
//! [`RunEvent::InputRequested`] when a marker completes.
//!
//! Readers keep draining after the subscriber has gone away so the child
//! never blocks on a full pipe.

use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tracing::{debug, warn};

use crate::prompt::PromptScanner;
use crate::supervisor::codec::ChunkCodec;
use crate::supervisor::events::RunEvent;

/// Which standard stream a reader is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Child stdout; scanned for input prompts.
    Stdout,
    /// Child stderr.
    Stderr,
}

impl StreamKind {
    fn label(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// Read `stream` to end-of-stream, emitting one event per decoded chunk.
///
/// Returns once the pipe reports EOF or a read error.
pub async fn run_reader<R>(
    run_id: u64,
    kind: StreamKind,
    stream: R,
    events: mpsc::UnboundedSender<RunEvent>,
) where
    R: AsyncRead + Unpin + Send,
{
    let mut framed = FramedRead::new(stream, ChunkCodec::new());
    let mut scanner = PromptScanner::new();
    let stream_name = kind.label();

    while let Some(item) = framed.next().await {
        match item {
            Ok(chunk) => match kind {
                StreamKind::Stdout => {
                    let prompt = scanner.scan(&chunk);
                    // A closed channel only means nobody is listening.
                    let _ = events.send(RunEvent::Output(chunk));
                    if let Some(prompt_kind) = prompt {
                        debug!(run_id, ?prompt_kind, "interpreter requested input");
                        let _ = events.send(RunEvent::InputRequested { kind: prompt_kind });
                    }
                }
                StreamKind::Stderr => {
                    let _ = events.send(RunEvent::Error(chunk));
                }
            },
            Err(err) => {
                warn!(run_id, stream = stream_name, %err, "read from interpreter failed");
                break;
            }
        }
    }

    debug!(run_id, stream = stream_name, "end of stream");
}
