#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Action '{action}' not allowed while job is {status}")]
    InvalidState {
        action: &'static str,
        status: &'static str,
    },
}
