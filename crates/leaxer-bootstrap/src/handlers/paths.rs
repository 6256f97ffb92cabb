//! `paths` command handler: the "golden truth" diagnostic for path
//! resolution, matching `gglib_cli::handlers::paths`'s role.

use anyhow::{Context, Result};
use leaxer_core::paths::{data_root, pids_dir, queue_state_path};

use crate::wiring::AppContext;

pub fn execute(ctx: &AppContext) -> Result<()> {
    println!("data_root = {}", data_root().context("resolving data_root")?.display());
    println!("pids_dir = {}", pids_dir().context("resolving pids_dir")?.display());
    println!("queue_state_path = {}", queue_state_path().context("resolving queue_state_path")?.display());
    println!("bin_dir = {}", ctx.bin_dir.display());
    Ok(())
}
