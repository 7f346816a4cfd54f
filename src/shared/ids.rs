use chrono::{DateTime, Utc};

pub const JOB_ID_SUFFIX_LEN: usize = 6;

/// Builds a job id of the form `YYYYMMDD-HHMMSS-xxxxxx`. The timestamp prefix
/// keeps lexical order equal to creation order at second resolution.
pub fn generate_job_id(now: DateTime<Utc>) -> Result<String, String> {
    let mut bytes = [0_u8; JOB_ID_SUFFIX_LEN / 2];
    getrandom::getrandom(&mut bytes)
        .map_err(|err| format!("failed to generate job id randomness: {err}"))?;
    let suffix = bytes
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<String>();
    Ok(format!("{}-{suffix}", now.format("%Y%m%d-%H%M%S")))
}

/// Job ids double as directory names, so anything outside this alphabet is
/// rejected before it reaches the filesystem.
pub fn validate_job_id(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err("job id must be non-empty".to_string());
    }
    if value
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    {
        return Ok(());
    }
    Err("job id must use only ASCII letters, digits, '-' or '_'".to_string())
}
