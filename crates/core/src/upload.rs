//! Client-side checks applied to a video before it is uploaded.

use std::path::Path;

use crate::error::CoreError;

/// Largest upload the processing service accepts (500 MiB).
pub const MAX_UPLOAD_SIZE: u64 = 500 * 1024 * 1024;

/// Video container extensions the processing service accepts.
pub const ALLOWED_VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "webm"];

/// Validate a file name and size against the upload limits.
pub fn validate_upload(file_name: &str, size_bytes: u64) -> Result<(), CoreError> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    if !ALLOWED_VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        return Err(CoreError::Validation(format!(
            "Invalid file type for {file_name}. Allowed: {}",
            ALLOWED_VIDEO_EXTENSIONS
                .iter()
                .map(|e| format!(".{e}"))
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }

    if size_bytes == 0 {
        return Err(CoreError::Validation(format!("{file_name} is empty")));
    }

    if size_bytes > MAX_UPLOAD_SIZE {
        return Err(CoreError::Validation(format!(
            "File too large. Maximum size: {}MB",
            MAX_UPLOAD_SIZE / (1024 * 1024)
        )));
    }

    Ok(())
}

/// Integer percentage of `sent` out of `total`, clamped to 0-100.
pub fn percent_of(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    ((sent.min(total) as u128 * 100) / total as u128) as u8
}
