//! CSV in and out of the bank.
//!
//! Import files need a header row. Only `question_text` matters; `marks`,
//! `difficulty`, `cognitive_level`, `co` and `po` are optional and any other
//! column is ignored.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::model::{PlacedQuestion, QuestionDraft};
use crate::utils::error::Result;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ImportRow {
    question_text: Option<String>,
    marks: Option<String>,
    difficulty: Option<String>,
    cognitive_level: Option<String>,
    co: Option<String>,
    po: Option<String>,
}

impl From<ImportRow> for QuestionDraft {
    fn from(row: ImportRow) -> Self {
        QuestionDraft {
            text: row.question_text.unwrap_or_default(),
            marks: row.marks,
            difficulty: row.difficulty,
            cognitive_level: row.cognitive_level,
            co: row.co,
            po: row.po,
        }
    }
}

pub fn read_import_rows<R: Read>(reader: R) -> Result<Vec<QuestionDraft>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let mut drafts = Vec::new();
    for row in csv_reader.deserialize::<ImportRow>() {
        drafts.push(row?.into());
    }
    tracing::debug!("Read {} import rows", drafts.len());
    Ok(drafts)
}

pub fn read_import_file<P: AsRef<Path>>(path: P) -> Result<Vec<QuestionDraft>> {
    read_import_rows(File::open(path)?)
}

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    id: i64,
    question_text: &'a str,
    marks: u32,
    difficulty: &'static str,
    cognitive_level: &'static str,
    co: &'a str,
    po: &'a str,
    topic: &'a str,
    module_no: i64,
    subject: &'a str,
}

impl<'a> From<&'a PlacedQuestion> for ExportRow<'a> {
    fn from(placed: &'a PlacedQuestion) -> Self {
        let q = &placed.question;
        ExportRow {
            id: q.id.0,
            question_text: &q.text,
            marks: q.marks,
            difficulty: q.difficulty.as_str(),
            cognitive_level: q.cognitive_level.as_str(),
            co: q.co.as_deref().unwrap_or(""),
            po: q.po.as_deref().unwrap_or(""),
            topic: &placed.placement.topic_name,
            module_no: placed.placement.module_no,
            subject: &placed.placement.subject_code,
        }
    }
}

/// Writes one row per question, header first.
pub fn write_export<W: Write>(writer: W, questions: &[PlacedQuestion]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for placed in questions {
        csv_writer.serialize(ExportRow::from(placed))?;
    }
    if questions.is_empty() {
        csv_writer.write_record([
            "id",
            "question_text",
            "marks",
            "difficulty",
            "cognitive_level",
            "co",
            "po",
            "topic",
            "module_no",
            "subject",
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_export_file<P: AsRef<Path>>(path: P, questions: &[PlacedQuestion]) -> Result<()> {
    write_export(File::create(path)?, questions)
}
