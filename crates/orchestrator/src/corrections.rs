//! Authoring of correction chunks.
//!
//! A correction is stored as an embedded knowledge chunk starting with
//! [`CORRECTION_MARKER`], so the correction retrieval tier ranks it ahead of
//! ordinary document chunks for similar questions.

use database::knowledge::CORRECTION_MARKER;

use crate::error::OrchestratorError;

/// Longest accepted rendered correction.
pub const MAX_CORRECTION_CHARS: usize = 8_000;

/// An operator's fix for a wrong or incomplete answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correction {
    /// Short label for what went wrong, e.g. `wrong_price`.
    pub error_type: String,
    pub description: Option<String>,
    pub correct_answer: String,
    pub additional_notes: Option<String>,
}

impl Correction {
    pub fn new(error_type: impl Into<String>, correct_answer: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            description: None,
            correct_answer: correct_answer.into(),
            additional_notes: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.additional_notes = Some(notes.into());
        self
    }

    pub(crate) fn validate(&self, max_chars: usize) -> Result<(), OrchestratorError> {
        if self.error_type.trim().is_empty() {
            return Err(OrchestratorError::InvalidRequest("errorType is required".to_string()));
        }
        if self.correct_answer.trim().is_empty() {
            return Err(OrchestratorError::InvalidRequest(
                "correctAnswer is required".to_string(),
            ));
        }
        if self.render().chars().count() > max_chars {
            return Err(OrchestratorError::InvalidRequest(format!(
                "correction exceeds {} characters",
                max_chars
            )));
        }
        Ok(())
    }

    /// Chunk text for this correction.
    ///
    /// Blank optional fields are left out. The error type is repeated in the
    /// trailing keyword line so keyword search can find it too.
    pub fn render(&self) -> String {
        let error_type = self.error_type.trim();
        let mut sections = vec![
            format!("{} {}", CORRECTION_MARKER, error_type),
            "Original Question Context: This correction addresses issues that may arise when users ask similar questions.".to_string(),
        ];
        if let Some(description) = non_blank(&self.description) {
            sections.push(format!("Problem Description: {}", description));
        }
        sections.push(format!("Correct Answer: {}", self.correct_answer.trim()));
        if let Some(notes) = non_blank(&self.additional_notes) {
            sections.push(format!("Additional Notes: {}", notes));
        }
        sections.push(format!("Keywords: correction, improvement, {}", error_type));
        sections.join("\n\n")
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
