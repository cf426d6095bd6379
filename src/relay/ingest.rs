use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

use crate::relay::queue::QueueProducer;

/// Enqueues every newline-delimited JSON document read from `reader`.
///
/// Blank lines are skipped and unparseable lines are logged and skipped.
/// Stops at end of input or when the queue is closed. Returns the number of
/// documents enqueued.
pub async fn ingest_json_lines<R>(reader: R, producer: QueueProducer<Value>) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut enqueued = 0usize;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<Value>(line) {
            Ok(doc) => {
                if producer.enqueue(doc).is_err() {
                    warn!("outbound queue closed, stopping ingest");
                    break;
                }
                enqueued += 1;
            }
            Err(e) => warn!(
                error = %e,
                line = %line.chars().take(100).collect::<String>(),
                "skipping invalid JSON line"
            ),
        }
    }

    info!(enqueued, "ingest finished");
    Ok(enqueued)
}
