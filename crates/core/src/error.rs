/// Domain-level errors surfaced by the job store and dispatch protocol.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// A synchronous wait elapsed before the job reached a terminal state.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The job this request was waiting on ended in `failed`.
    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a missing job.
    pub fn job_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "Job",
            id: id.into(),
        }
    }
}
