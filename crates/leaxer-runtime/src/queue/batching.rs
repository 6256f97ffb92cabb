//! Pending-job re-ordering policy (§4.5).
//!
//! Partitions a job list into `{finished, running}` (left untouched) and
//! `pending`, then stably re-sorts the pending partition by
//! `cached_model_path` so same-model jobs group together and the Model
//! Server Manager avoids reloads. Stability is what makes the policy
//! correct: jobs sharing a model path (or both lacking one) keep their
//! original FIFO order as the tie-break, rather than an arbitrary one.

use leaxer_core::domain::{Job, JobStatus};

/// Re-order `jobs` in place: non-pending jobs keep their position, pending
/// jobs are stably sorted by `cached_model_path` (missing paths sort
/// first, stable tie-break is original relative order).
pub fn reorder_pending(jobs: &mut [Job]) {
    let mut pending_indices: Vec<usize> = jobs
        .iter()
        .enumerate()
        .filter(|(_, job)| job.status == JobStatus::Pending)
        .map(|(i, _)| i)
        .collect();

    let mut pending_jobs: Vec<Job> = pending_indices.iter().map(|&i| jobs[i].clone()).collect();
    pending_jobs.sort_by(|a, b| a.cached_model_path.cmp(&b.cached_model_path));

    pending_indices.sort_unstable();
    for (slot, job) in pending_indices.into_iter().zip(pending_jobs) {
        jobs[slot] = job;
    }
}
