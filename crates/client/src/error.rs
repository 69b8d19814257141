//! Errors reported by the dubbing service client.

/// Classification used for failures that never reached the service.
pub const TRANSPORT_ERROR_CODE: u16 = 0;

/// Errors from the dubbing service client.
///
/// Every variant exposes a human-readable [`message`](Self::message) and
/// a numeric [`code`](Self::code). Callers surface both but never branch
/// on the code.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service answered with a non-2xx status code.
    #[error("Dubbing service error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// The service's `detail` text, or the raw body.
        message: String,
    },

    /// A 2xx response whose body does not match the expected shape,
    /// including a job status the client does not recognize.
    #[error("Malformed response: {0}")]
    Decode(String),

    /// Local I/O failed while preparing a request.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub fn message(&self) -> String {
        match self {
            ApiError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            ApiError::Api { status, .. } => *status,
            ApiError::Request(e) => e.status().map_or(TRANSPORT_ERROR_CODE, |s| s.as_u16()),
            ApiError::Decode(_) | ApiError::Io(_) => TRANSPORT_ERROR_CODE,
        }
    }

    /// Whether the response was received but could not be understood.
    ///
    /// A decode failure is fatal for a polling stream; any other error is
    /// treated as transient.
    pub fn is_decode(&self) -> bool {
        matches!(self, ApiError::Decode(_))
    }
}

/// Extract the human-readable message from an error response body.
///
/// The service reports errors as `{"detail": "..."}`; validation errors
/// carry a structured `detail`, which is kept as compact JSON.
pub(crate) fn error_message(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => match map.get("detail") {
            Some(serde_json::Value::String(detail)) => detail.clone(),
            Some(other) => other.to_string(),
            None => body.to_string(),
        },
        _ => body.to_string(),
    }
}
