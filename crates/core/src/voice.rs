//! Voice generation settings.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const DEFAULT_LANGUAGE_CODE: &str = "a";
pub const DEFAULT_VOICE: &str = "af_heart";
pub const DEFAULT_SPEED: f32 = 1.0;
pub const MIN_SPEED: f32 = 0.5;
pub const MAX_SPEED: f32 = 2.0;

/// Parameters of a generate-voice request.
///
/// Serialized field names match the processing service's request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    /// Target language code, e.g. `a` (American English) or `f` (French).
    pub language_code: String,
    /// Voice identifier within that language.
    pub voice: String,
    /// Speech speed multiplier.
    pub speed: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            language_code: DEFAULT_LANGUAGE_CODE.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            speed: DEFAULT_SPEED,
        }
    }
}

impl VoiceSettings {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.language_code.trim().is_empty() {
            return Err(CoreError::Validation("Language code is required".into()));
        }
        if self.voice.trim().is_empty() {
            return Err(CoreError::Validation("Voice is required".into()));
        }
        if !(MIN_SPEED..=MAX_SPEED).contains(&self.speed) {
            return Err(CoreError::Validation(format!(
                "Speed must be between {MIN_SPEED} and {MAX_SPEED}, got {}",
                self.speed
            )));
        }
        Ok(())
    }
}
