//! `cancel` command handler.

use anyhow::{Context, Result};

use crate::wiring::AppContext;

pub async fn execute(ctx: &AppContext, job_id: &str) -> Result<()> {
    ctx.queue
        .cancel(job_id)
        .await
        .with_context(|| format!("cancelling job {job_id}"))?;
    println!("cancelled {job_id}");
    Ok(())
}
