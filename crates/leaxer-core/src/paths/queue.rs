//! Queue persistence path resolution.

use std::path::PathBuf;

use super::PathError;
use super::platform::data_root;

/// Path to the single JSON file holding persisted queue state.
pub fn queue_state_path() -> Result<PathBuf, PathError> {
    Ok(data_root()?.join("queue_state.json"))
}
