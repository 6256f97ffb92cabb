//! `clear-pending` command handler.

use anyhow::Result;

use crate::wiring::AppContext;

pub async fn execute(ctx: &AppContext) -> Result<()> {
    ctx.queue.clear_pending().await;
    println!("cleared pending jobs");
    Ok(())
}
