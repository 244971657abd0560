/// Job identifiers are opaque strings of the form `job_<32 hex chars>`.
pub type JobId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Prefix shared by every generated job id.
pub const JOB_ID_PREFIX: &str = "job_";

/// Generate a fresh, globally unique job id.
pub fn new_job_id() -> JobId {
    format!("{JOB_ID_PREFIX}{}", uuid::Uuid::new_v4().simple())
}

/// Whether `id` has the shape produced by [`new_job_id`].
///
/// Used before an id is turned into a filesystem path.
pub fn is_valid_job_id(id: &str) -> bool {
    match id.strip_prefix(JOB_ID_PREFIX) {
        Some(hex) => !hex.is_empty() && hex.len() <= 64 && hex.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}
