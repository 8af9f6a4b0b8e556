//! Configuration types.

use crate::error::ConfigError;

/// Interview presentation configuration.
///
/// None of these values affect the state machine; they are handed through to
/// renderers and used to seed the transcript.
#[derive(Debug, Clone)]
pub struct InterviewConfig {
    /// Label shown next to interviewer entries (prompts, rejections).
    pub interviewer_label: String,
    /// Label shown next to interviewee entries (answers).
    pub interviewee_label: String,
    /// Optional opening line appended to the transcript on creation.
    pub greeting: Option<String>,
    /// Text a renderer shows while a transform or validation is pending.
    pub typing_marker: String,
}

impl Default for InterviewConfig {
    fn default() -> Self {
        Self {
            interviewer_label: "interviewer".to_string(),
            interviewee_label: "you".to_string(),
            greeting: None,
            typing_marker: "…".to_string(),
        }
    }
}

impl InterviewConfig {
    /// Load from `INTERVIEW_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let typing_marker = match lookup("INTERVIEW_TYPING_MARKER") {
            Some(marker) if marker.trim().is_empty() => {
                return Err(ConfigError::InvalidValue {
                    key: "INTERVIEW_TYPING_MARKER".to_string(),
                    message: "must not be empty".to_string(),
                });
            }
            Some(marker) => marker,
            None => defaults.typing_marker,
        };

        Ok(Self {
            interviewer_label: lookup("INTERVIEW_INTERVIEWER")
                .unwrap_or(defaults.interviewer_label),
            interviewee_label: lookup("INTERVIEW_INTERVIEWEE")
                .unwrap_or(defaults.interviewee_label),
            greeting: lookup("INTERVIEW_GREETING").filter(|g| !g.trim().is_empty()),
            typing_marker,
        })
    }
}
