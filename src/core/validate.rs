//! Turning raw question input into [`QuestionFields`].
//!
//! Defaults (2 marks, `Medium`, `Understand`) are filled in only by
//! [`validate`], which is used when a question is first built. Updates go
//! through [`QuestionFields::normalized`], which never fills anything in.

use crate::domain::model::{CognitiveLevel, Difficulty, QuestionDraft, QuestionFields};
use crate::utils::error::{BankError, Result};

pub const DEFAULT_MARKS: u32 = 2;
pub const DEFAULT_DIFFICULTY: Difficulty = Difficulty::Medium;
pub const DEFAULT_COGNITIVE_LEVEL: CognitiveLevel = CognitiveLevel::Understand;

pub fn normalize_text(text: &str) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(BankError::EmptyText);
    }
    Ok(trimmed.to_string())
}

/// Spreadsheets hand integers over as `"3"` or `"3.0"`; both mean 3.
pub fn parse_marks(raw: &str) -> Result<u32> {
    let value = raw.trim();
    let invalid = || BankError::InvalidMarks {
        value: raw.to_string(),
    };

    let marks = match value.parse::<i64>() {
        Ok(n) => n,
        Err(_) => {
            let f = value.parse::<f64>().map_err(|_| invalid())?;
            if !f.is_finite() || f.fract() != 0.0 {
                return Err(invalid());
            }
            f as i64
        }
    };

    if marks <= 0 || marks > u32::MAX as i64 {
        return Err(invalid());
    }
    Ok(marks as u32)
}

fn optional_tag(tag: Option<&str>) -> Option<String> {
    tag.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Blank optional fields count as absent and take their default.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

pub fn validate(draft: &QuestionDraft) -> Result<QuestionFields> {
    let text = normalize_text(&draft.text)?;

    let marks = match present(&draft.marks) {
        Some(raw) => parse_marks(raw)?,
        None => DEFAULT_MARKS,
    };
    let difficulty = match present(&draft.difficulty) {
        Some(raw) => raw.parse::<Difficulty>()?,
        None => DEFAULT_DIFFICULTY,
    };
    let cognitive_level = match present(&draft.cognitive_level) {
        Some(raw) => raw.parse::<CognitiveLevel>()?,
        None => DEFAULT_COGNITIVE_LEVEL,
    };

    Ok(QuestionFields {
        text,
        marks,
        difficulty,
        cognitive_level,
        co: optional_tag(draft.co.as_deref()),
        po: optional_tag(draft.po.as_deref()),
    })
}

impl QuestionFields {
    /// Trims text and tags and checks the invariants. No defaults.
    pub fn normalized(self) -> Result<Self> {
        if self.marks == 0 {
            return Err(BankError::InvalidMarks {
                value: self.marks.to_string(),
            });
        }
        Ok(Self {
            text: normalize_text(&self.text)?,
            co: optional_tag(self.co.as_deref()),
            po: optional_tag(self.po.as_deref()),
            ..self
        })
    }
}
