/// Domain errors: registry assembly and system lookup.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A system definition failed validation (e.g. an empty id).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A second system was registered under an existing id.
    #[error("Conflict: {0}")]
    Conflict(String),
}
