//! `status` command handler: print the queue's `get_state` snapshot.

use anyhow::Result;
use leaxer_core::domain::Job;

use crate::wiring::AppContext;

fn print_job_row(job: &Job) {
    println!("{:<18} {:<10} {}", job.id, format!("{:?}", job.status).to_lowercase(), job.created_at);
}

pub async fn execute(ctx: &AppContext) -> Result<()> {
    let state = ctx.queue.get_state().await;

    println!("running:");
    match &state.running {
        Some(job) => print_job_row(job),
        None => println!("  (none)"),
    }

    println!("pending ({}):", state.pending_count);
    for job in &state.pending {
        print_job_row(job);
    }

    println!("finished ({}):", state.finished.len());
    for job in &state.finished {
        print_job_row(job);
    }

    println!("total jobs tracked: {}", state.total_count);
    Ok(())
}
