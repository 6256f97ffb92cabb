//! ID generation helpers.

use uuid::Uuid;

/// Generate a 16-hex-character job id.
///
/// Uses the low 64 bits of a v4 UUID rather than its full textual form;
/// job ids appear in log lines and persisted state often enough that the
/// shorter form is worth it.
#[must_use]
pub fn new_job_id() -> String {
    let bytes = Uuid::new_v4().into_bytes();
    let mut low = 0u64;
    for byte in &bytes[8..16] {
        low = (low << 8) | u64::from(*byte);
    }
    format!("{low:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_is_sixteen_hex_chars() {
        let id = new_job_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn job_ids_are_distinct() {
        assert_ne!(new_job_id(), new_job_id());
    }
}
