use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::sampler::{BandReport, PaperSelection};
use crate::domain::model::{CognitiveLevel, Difficulty, Subject};
use crate::utils::error::Result;

pub const DEFAULT_EXAM_TYPE: &str = "Internal";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaperItem {
    pub number: usize,
    pub question_id: i64,
    pub text: String,
    pub marks: u32,
    pub difficulty: Difficulty,
    pub cognitive_level: CognitiveLevel,
    pub co: Option<String>,
    pub po: Option<String>,
    pub topic: String,
    pub module_no: i64,
}

/// Everything a document template needs to print one question paper.
#[derive(Debug, Clone, Serialize)]
pub struct PaperDocument {
    pub subject_code: String,
    pub subject_name: String,
    pub exam_type: String,
    pub generated_at: DateTime<Utc>,
    pub total_marks: u64,
    pub complete: bool,
    pub items: Vec<PaperItem>,
    pub bands: Vec<BandReport>,
}

impl PaperDocument {
    pub fn build(subject: &Subject, exam_type: &str, selection: &PaperSelection) -> Self {
        Self::build_at(subject, exam_type, selection, Utc::now())
    }

    pub fn build_at(
        subject: &Subject,
        exam_type: &str,
        selection: &PaperSelection,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let items = selection
            .questions
            .iter()
            .enumerate()
            .map(|(i, placed)| PaperItem {
                number: i + 1,
                question_id: placed.question.id.0,
                text: placed.question.text.clone(),
                marks: placed.question.marks,
                difficulty: placed.question.difficulty,
                cognitive_level: placed.question.cognitive_level,
                co: placed.question.co.clone(),
                po: placed.question.po.clone(),
                topic: placed.placement.topic_name.clone(),
                module_no: placed.placement.module_no,
            })
            .collect();

        Self {
            subject_code: subject.code.clone(),
            subject_name: subject.name.clone(),
            exam_type: exam_type.to_string(),
            generated_at,
            total_marks: selection.total_marks(),
            complete: selection.is_complete(),
            items,
            bands: selection.bands.clone(),
        }
    }

    /// Suggested output name, e.g. `question_paper_CS101.json`.
    pub fn file_name(&self) -> String {
        let code: String = self
            .subject_code
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        format!("question_paper_{}.json", code)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }
}
