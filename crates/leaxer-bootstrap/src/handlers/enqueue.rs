//! `enqueue` command handler.

use std::io::Read as _;

use anyhow::{Context, Result};
use leaxer_core::domain::WorkflowSnapshot;

use crate::wiring::AppContext;

/// Read a single JSON workflow snapshot from `source` (`-` for stdin,
/// otherwise a file path).
pub fn read_snapshot(source: &str) -> Result<WorkflowSnapshot> {
    let content = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading workflow snapshot from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source).with_context(|| format!("reading {source}"))?
    };

    serde_json::from_str(&content).context("parsing workflow snapshot JSON")
}

pub async fn execute(ctx: &AppContext, snapshot_source: &str) -> Result<()> {
    let snapshot = read_snapshot(snapshot_source)?;
    let ids = ctx.queue.enqueue(vec![snapshot]).await.context("enqueueing workflow")?;

    for id in ids {
        println!("{id}");
    }
    Ok(())
}
