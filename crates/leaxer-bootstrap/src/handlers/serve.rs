//! `serve` command handler: the interactive smoke-test loop described in
//! §2.1 — one JSON workflow snapshot per stdin line, queue/event activity
//! printed to stdout until EOF. This is a development harness, not the
//! HTTP/WebSocket adapter the spec excludes.

use anyhow::{Context, Result};
use leaxer_core::events::Topic;
use leaxer_core::ports::EventBusPort;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::StreamExt;

use crate::wiring::AppContext;

/// Topics worth echoing to the smoke-test console; `logs.stream` and
/// `hardware.stats` are omitted since they are high-volume and better
/// suited to a real subscriber.
const ECHOED_TOPICS: &[Topic] = &[
    Topic::QueueUpdates,
    Topic::QueueJobCompleted,
    Topic::QueueJobError,
    Topic::GenerationProgress,
    Topic::GenerationComplete,
    Topic::GenerationError,
    Topic::ServerStatus,
];

pub async fn execute(ctx: &AppContext) -> Result<()> {
    let mut event_task_handles = Vec::new();
    for topic in ECHOED_TOPICS {
        let mut stream = ctx.event_bus.subscribe(*topic);
        let handle = tokio::spawn(async move {
            while let Some(Ok(event)) = stream.next().await {
                println!("event: {event:?}");
            }
        });
        event_task_handles.push(handle);
    }

    println!("reading workflow snapshots from stdin, one JSON object per line (Ctrl-D to stop)");
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line).context("parsing workflow snapshot JSON") {
            Ok(snapshot) => match ctx.queue.enqueue(vec![snapshot]).await {
                Ok(ids) => println!("enqueued: {}", ids.join(", ")),
                Err(e) => eprintln!("enqueue failed: {e}"),
            },
            Err(e) => eprintln!("{e}"),
        }
    }

    for handle in event_task_handles {
        handle.abort();
    }
    Ok(())
}
