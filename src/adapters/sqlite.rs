//! SQLite-backed store.
//!
//! The schema mirrors the relational layout the bank has always used:
//! `subjects`, `modules`, `topics`, `questions`, joined
//! question → topic → module → subject. Difficulty and cognitive level are
//! stored as their canonical names; rows written by older tools with other
//! spellings are skipped with a warning when read.

use std::path::Path;

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use tracing::{debug, warn};

use crate::domain::model::{
    BankStats, CognitiveLevel, DedupScope, Difficulty, MatchPolicy, Module, ModuleId, NewQuestion,
    PlacedQuestion, Placement, Question, QuestionFields, QuestionFilter, QuestionId, Subject,
    SubjectId, Topic, TopicId, UserId,
};
use crate::domain::ports::{Catalog, QuestionStore};
use crate::utils::error::{BankError, Result};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS subjects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS modules (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    subject_id INTEGER NOT NULL,
    module_no INTEGER NOT NULL,
    title TEXT NOT NULL,
    FOREIGN KEY (subject_id) REFERENCES subjects(id)
);

CREATE TABLE IF NOT EXISTS topics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    module_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    FOREIGN KEY (module_id) REFERENCES modules(id)
);

CREATE TABLE IF NOT EXISTS questions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    topic_id INTEGER NOT NULL,
    question_text TEXT NOT NULL,
    marks INTEGER NOT NULL,
    difficulty TEXT NOT NULL,
    cognitive_level TEXT NOT NULL,
    co TEXT,
    po TEXT,
    created_by INTEGER,
    FOREIGN KEY (topic_id) REFERENCES topics(id)
);

CREATE INDEX IF NOT EXISTS idx_questions_topic ON questions(topic_id);
CREATE INDEX IF NOT EXISTS idx_questions_text ON questions(question_text);
CREATE INDEX IF NOT EXISTS idx_questions_difficulty ON questions(difficulty);
"#;

const QUESTION_COLUMNS: &str =
    "q.id, q.topic_id, q.question_text, q.marks, q.difficulty, q.cognitive_level, q.co, q.po, q.created_by";

const PLACED_SELECT: &str = r#"
    SELECT q.id, q.topic_id, q.question_text, q.marks, q.difficulty, q.cognitive_level,
           q.co, q.po, q.created_by,
           s.id, s.code, m.module_no, m.title, t.name
    FROM questions q
    JOIN topics t ON q.topic_id = t.id
    JOIN modules m ON t.module_id = m.id
    JOIN subjects s ON m.subject_id = s.id
"#;

/// `question_text` with leading and trailing ASCII whitespace removed. Plain
/// `trim()` only strips spaces. Text written through the bank is already
/// trimmed, so this only matters for rows written by other tools.
const TRIMMED_TEXT: &str =
    "trim(question_text, ' ' || char(9) || char(10) || char(11) || char(12) || char(13))";

fn log_and_skip_err<T>(result: rusqlite::Result<T>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Skipping unreadable question row: {}", e);
            None
        }
    }
}

fn conversion_error(idx: usize, err: BankError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn empty_as_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn row_to_question(row: &Row) -> rusqlite::Result<Question> {
    let marks: i64 = row.get(3)?;
    let marks = u32::try_from(marks)
        .ok()
        .filter(|m| *m > 0)
        .ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                Type::Integer,
                Box::new(BankError::InvalidMarks {
                    value: marks.to_string(),
                }),
            )
        })?;

    let difficulty: String = row.get(4)?;
    let difficulty = difficulty
        .parse::<Difficulty>()
        .map_err(|e| conversion_error(4, e))?;
    let cognitive: String = row.get(5)?;
    let cognitive_level = cognitive
        .parse::<CognitiveLevel>()
        .map_err(|e| conversion_error(5, e))?;

    Ok(Question {
        id: QuestionId(row.get(0)?),
        topic_id: TopicId(row.get(1)?),
        text: row.get(2)?,
        marks,
        difficulty,
        cognitive_level,
        co: empty_as_none(row.get(6)?),
        po: empty_as_none(row.get(7)?),
        created_by: row.get::<_, Option<i64>>(8)?.map(UserId),
    })
}

fn row_to_placed(row: &Row) -> rusqlite::Result<PlacedQuestion> {
    Ok(PlacedQuestion {
        question: row_to_question(row)?,
        placement: Placement {
            subject_id: SubjectId(row.get(9)?),
            subject_code: row.get(10)?,
            module_no: row.get(11)?,
            module_title: row.get(12)?,
            topic_name: row.get(13)?,
        },
    })
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        debug!("Opening question bank at {}", path.as_ref().display());
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    fn module(&self, id: ModuleId) -> Result<Option<Module>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, subject_id, module_no, title FROM modules WHERE id = ?1",
                params![id.0],
                |row| {
                    Ok(Module {
                        id: ModuleId(row.get(0)?),
                        subject_id: SubjectId(row.get(1)?),
                        module_no: row.get(2)?,
                        title: row.get(3)?,
                    })
                },
            )
            .optional()?)
    }

    fn placed_where(&self, clause: &str, params: &[&dyn ToSql]) -> Result<Vec<PlacedQuestion>> {
        let sql = format!("{} {}", PLACED_SELECT, clause);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params, row_to_placed)?;
        Ok(rows.filter_map(log_and_skip_err).collect())
    }
}

impl Catalog for SqliteStore {
    fn add_subject(&mut self, code: &str, name: &str) -> Result<Subject> {
        self.conn.execute(
            "INSERT INTO subjects (code, name) VALUES (?1, ?2)",
            params![code, name],
        )?;
        Ok(Subject {
            id: SubjectId(self.conn.last_insert_rowid()),
            code: code.to_string(),
            name: name.to_string(),
        })
    }

    fn add_module(&mut self, subject_id: SubjectId, module_no: i64, title: &str) -> Result<Module> {
        if self.subject(subject_id)?.is_none() {
            return Err(BankError::SubjectNotFound(subject_id));
        }
        self.conn.execute(
            "INSERT INTO modules (subject_id, module_no, title) VALUES (?1, ?2, ?3)",
            params![subject_id.0, module_no, title],
        )?;
        Ok(Module {
            id: ModuleId(self.conn.last_insert_rowid()),
            subject_id,
            module_no,
            title: title.to_string(),
        })
    }

    fn add_topic(&mut self, module_id: ModuleId, name: &str) -> Result<Topic> {
        if self.module(module_id)?.is_none() {
            return Err(BankError::ModuleNotFound(module_id));
        }
        self.conn.execute(
            "INSERT INTO topics (module_id, name) VALUES (?1, ?2)",
            params![module_id.0, name],
        )?;
        Ok(Topic {
            id: TopicId(self.conn.last_insert_rowid()),
            module_id,
            name: name.to_string(),
        })
    }

    fn subject(&self, id: SubjectId) -> Result<Option<Subject>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, code, name FROM subjects WHERE id = ?1",
                params![id.0],
                |row| {
                    Ok(Subject {
                        id: SubjectId(row.get(0)?),
                        code: row.get(1)?,
                        name: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    fn topic(&self, id: TopicId) -> Result<Option<Topic>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, module_id, name FROM topics WHERE id = ?1",
                params![id.0],
                |row| {
                    Ok(Topic {
                        id: TopicId(row.get(0)?),
                        module_id: ModuleId(row.get(1)?),
                        name: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    fn subjects(&self) -> Result<Vec<Subject>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, code, name FROM subjects ORDER BY code")?;
        let rows = stmt.query_map([], |row| {
            Ok(Subject {
                id: SubjectId(row.get(0)?),
                code: row.get(1)?,
                name: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

impl QuestionStore for SqliteStore {
    fn insert(&mut self, question: NewQuestion) -> Result<Question> {
        let NewQuestion {
            topic_id,
            fields,
            created_by,
        } = question;
        self.conn.execute(
            r#"
            INSERT INTO questions (topic_id, question_text, marks, difficulty,
                                   cognitive_level, co, po, created_by)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                topic_id.0,
                fields.text,
                fields.marks,
                fields.difficulty.as_str(),
                fields.cognitive_level.as_str(),
                fields.co,
                fields.po,
                created_by.map(|u| u.0),
            ],
        )?;
        Ok(Question {
            id: QuestionId(self.conn.last_insert_rowid()),
            topic_id,
            text: fields.text,
            marks: fields.marks,
            difficulty: fields.difficulty,
            cognitive_level: fields.cognitive_level,
            co: fields.co,
            po: fields.po,
            created_by,
        })
    }

    fn update(&mut self, id: QuestionId, fields: QuestionFields) -> Result<Question> {
        let changed = self.conn.execute(
            r#"
            UPDATE questions
            SET question_text = ?1, marks = ?2, difficulty = ?3,
                cognitive_level = ?4, co = ?5, po = ?6
            WHERE id = ?7
            "#,
            params![
                fields.text,
                fields.marks,
                fields.difficulty.as_str(),
                fields.cognitive_level.as_str(),
                fields.co,
                fields.po,
                id.0,
            ],
        )?;
        if changed == 0 {
            return Err(BankError::QuestionNotFound(id));
        }
        self.get(id)?.ok_or(BankError::QuestionNotFound(id))
    }

    fn get(&self, id: QuestionId) -> Result<Option<Question>> {
        let sql = format!("SELECT {} FROM questions q WHERE q.id = ?1", QUESTION_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![id.0], row_to_question)
            .optional()?)
    }

    fn delete(&mut self, id: QuestionId) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM questions WHERE id = ?1", params![id.0])?;
        Ok(removed > 0)
    }

    fn delete_owned(&mut self, id: QuestionId, owner: UserId) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM questions WHERE id = ?1 AND created_by = ?2",
            params![id.0, owner.0],
        )?;
        Ok(removed > 0)
    }

    fn exists_with_text(&self, text: &str, scope: DedupScope, policy: MatchPolicy) -> Result<bool> {
        if policy == MatchPolicy::CaseInsensitive {
            // SQLite's NOCASE only folds ASCII, so compare in Rust.
            return Ok(self
                .question_texts(scope)?
                .iter()
                .any(|stored| policy.matches(stored, text)));
        }

        let found: bool = match scope {
            DedupScope::Topic(topic_id) => self.conn.query_row(
                &format!(
                    "SELECT EXISTS(SELECT 1 FROM questions WHERE topic_id = ?1 AND {} = ?2)",
                    TRIMMED_TEXT
                ),
                params![topic_id.0, text],
                |row| row.get(0),
            )?,
            DedupScope::Global => self.conn.query_row(
                &format!("SELECT EXISTS(SELECT 1 FROM questions WHERE {} = ?1)", TRIMMED_TEXT),
                params![text],
                |row| row.get(0),
            )?,
        };
        Ok(found)
    }

    fn question_texts(&self, scope: DedupScope) -> Result<Vec<String>> {
        let texts = match scope {
            DedupScope::Topic(topic_id) => {
                let mut stmt = self
                    .conn
                    .prepare("SELECT question_text FROM questions WHERE topic_id = ?1")?;
                let rows = stmt.query_map(params![topic_id.0], |row| row.get(0))?;
                rows.collect::<rusqlite::Result<Vec<String>>>()?
            }
            DedupScope::Global => {
                let mut stmt = self.conn.prepare("SELECT question_text FROM questions")?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect::<rusqlite::Result<Vec<String>>>()?
            }
        };
        Ok(texts)
    }

    fn list_by_subject_and_difficulty(
        &self,
        subject_id: SubjectId,
        difficulty: Difficulty,
    ) -> Result<Vec<PlacedQuestion>> {
        self.placed_where(
            "WHERE s.id = ?1 AND q.difficulty = ?2 ORDER BY q.id",
            params![subject_id.0, difficulty.as_str()],
        )
    }

    fn search(&self, filter: &QuestionFilter) -> Result<Vec<PlacedQuestion>> {
        let mut conditions = vec!["1=1".to_string()];
        let mut params_vec: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(subject_id) = filter.subject_id {
            params_vec.push(Box::new(subject_id.0));
            conditions.push(format!("s.id = ?{}", params_vec.len()));
        }
        if let Some(module_no) = filter.module_no {
            params_vec.push(Box::new(module_no));
            conditions.push(format!("m.module_no = ?{}", params_vec.len()));
        }
        if let Some(difficulty) = filter.difficulty {
            params_vec.push(Box::new(difficulty.as_str()));
            conditions.push(format!("q.difficulty = ?{}", params_vec.len()));
        }

        let clause = format!(
            "WHERE {} ORDER BY s.code, m.module_no, t.name, q.id",
            conditions.join(" AND ")
        );
        let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        self.placed_where(&clause, &params_refs)
    }

    fn stats(&self) -> Result<BankStats> {
        let subjects: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM subjects", [], |row| row.get(0))?;
        let questions: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM questions", [], |row| row.get(0))?;

        let mut stmt = self
            .conn
            .prepare("SELECT difficulty, COUNT(*) FROM questions GROUP BY difficulty")?;
        let mut by_difficulty: Vec<(Difficulty, usize)> = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .filter_map(log_and_skip_err)
            .filter_map(|(raw, count)| match raw.parse::<Difficulty>() {
                Ok(d) => Some((d, count as usize)),
                Err(_) => {
                    warn!("Ignoring {} question(s) with difficulty {:?}", count, raw);
                    None
                }
            })
            .collect();
        by_difficulty.sort();

        let mut stmt = self.conn.prepare(
            r#"
            SELECT m.module_no, COUNT(q.id)
            FROM questions q
            JOIN topics t ON q.topic_id = t.id
            JOIN modules m ON t.module_id = m.id
            GROUP BY m.module_no
            ORDER BY m.module_no
            "#,
        )?;
        let by_module = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)? as usize)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(BankStats {
            subjects: subjects as usize,
            questions: questions as usize,
            by_difficulty,
            by_module,
        })
    }

    fn atomically<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        match f(self) {
            Ok(value) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.conn.execute_batch("ROLLBACK") {
                    warn!("Rollback failed: {}", rollback);
                }
                Err(e)
            }
        }
    }
}
