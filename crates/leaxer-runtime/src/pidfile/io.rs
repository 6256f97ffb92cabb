//! Atomic PID file I/O.
//!
//! Format: two-line text file, `<pid>\n<port>\n`.

use std::fs;
use std::io;
use std::path::PathBuf;

use leaxer_core::paths::pids_dir;

/// PID file content parsed from disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PidFileData {
    pub pid: u32,
    pub port: u16,
}

/// Write a PID file atomically using temp file + rename.
///
/// File naming: `<label>.pid`.
pub fn write_pidfile(label: &str, pid: u32, port: u16) -> io::Result<PathBuf> {
    let dir = pids_dir().map_err(io::Error::other)?;
    fs::create_dir_all(&dir)?;

    let filename = format!("{label}.pid");
    let final_path = dir.join(&filename);
    let temp_path = dir.join(format!("{filename}.tmp"));

    fs::write(&temp_path, format!("{pid}\n{port}\n"))?;
    fs::rename(&temp_path, &final_path)?;

    Ok(final_path)
}

/// Read a PID file's content.
pub fn read_pidfile(label: &str) -> io::Result<PidFileData> {
    let dir = pids_dir().map_err(io::Error::other)?;
    let path = dir.join(format!("{label}.pid"));
    let content = fs::read_to_string(&path)?;
    parse_pidfile_content(&content)
}

/// Delete a PID file. Idempotent: no error if already missing.
pub fn delete_pidfile(label: &str) -> io::Result<()> {
    let dir = pids_dir().map_err(io::Error::other)?;
    let path = dir.join(format!("{label}.pid"));
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// List all PID files in the tracking directory.
///
/// Returns `(label, PidFileData)` pairs for successfully parsed files;
/// silently ignores malformed ones.
pub fn list_pidfiles() -> io::Result<Vec<(String, PidFileData)>> {
    let dir = pids_dir().map_err(io::Error::other)?;

    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut results = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.extension().and_then(|s| s.to_str()) != Some("pid") {
            continue;
        }

        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        if let Ok(content) = fs::read_to_string(&path)
            && let Ok(data) = parse_pidfile_content(&content)
        {
            results.push((stem.to_string(), data));
        }
    }

    Ok(results)
}

fn parse_pidfile_content(content: &str) -> io::Result<PidFileData> {
    let mut lines = content.lines();

    let pid = lines
        .next()
        .and_then(|s| s.trim().parse::<u32>().ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing or invalid PID"))?;

    let port = lines
        .next()
        .and_then(|s| s.trim().parse::<u16>().ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing or invalid port"))?;

    Ok(PidFileData { pid, port })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_pidfile() {
        let label = "test-image-server";
        let path = write_pidfile(label, 98765, 1234).expect("write failed");
        assert!(path.exists());

        let data = read_pidfile(label).expect("read failed");
        assert_eq!(data.pid, 98765);
        assert_eq!(data.port, 1234);

        delete_pidfile(label).expect("delete failed");
        assert!(!path.exists());
        delete_pidfile(label).expect("second delete should be idempotent");
    }
}
