use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::utils::error::BankError;

macro_rules! id_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(SubjectId);
id_type!(ModuleId);
id_type!(TopicId);
id_type!(QuestionId);
id_type!(UserId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum CognitiveLevel {
    Remember,
    #[default]
    Understand,
    Apply,
    Analyze,
    Evaluate,
    Create,
}

impl CognitiveLevel {
    pub const ALL: [CognitiveLevel; 6] = [
        CognitiveLevel::Remember,
        CognitiveLevel::Understand,
        CognitiveLevel::Apply,
        CognitiveLevel::Analyze,
        CognitiveLevel::Evaluate,
        CognitiveLevel::Create,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CognitiveLevel::Remember => "Remember",
            CognitiveLevel::Understand => "Understand",
            CognitiveLevel::Apply => "Apply",
            CognitiveLevel::Analyze => "Analyze",
            CognitiveLevel::Evaluate => "Evaluate",
            CognitiveLevel::Create => "Create",
        }
    }
}

/// Case-insensitive lookup of a canonical name, ignoring surrounding whitespace.
fn parse_closed<T: Copy>(
    field: &'static str,
    raw: &str,
    all: &[T],
    name: fn(&T) -> &'static str,
) -> Result<T, BankError> {
    let wanted = raw.trim();
    all.iter()
        .copied()
        .find(|v| name(v).eq_ignore_ascii_case(wanted))
        .ok_or_else(|| BankError::InvalidEnum {
            field,
            value: raw.to_string(),
            allowed: all.iter().map(name).collect::<Vec<_>>().join(", "),
        })
}

impl FromStr for Difficulty {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_closed("difficulty", s, &Difficulty::ALL, Difficulty::as_str)
    }
}

impl FromStr for CognitiveLevel {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_closed("cognitive_level", s, &CognitiveLevel::ALL, CognitiveLevel::as_str)
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for CognitiveLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    pub subject_id: SubjectId,
    pub module_no: i64,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub module_id: ModuleId,
    pub name: String,
}

/// Validated, normalized question content. Everything a question carries
/// except its identity, topic and author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionFields {
    pub text: String,
    pub marks: u32,
    pub difficulty: Difficulty,
    pub cognitive_level: CognitiveLevel,
    pub co: Option<String>,
    pub po: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub topic_id: TopicId,
    pub text: String,
    pub marks: u32,
    pub difficulty: Difficulty,
    pub cognitive_level: CognitiveLevel,
    pub co: Option<String>,
    pub po: Option<String>,
    pub created_by: Option<UserId>,
}

impl Question {
    pub fn fields(&self) -> QuestionFields {
        QuestionFields {
            text: self.text.clone(),
            marks: self.marks,
            difficulty: self.difficulty,
            cognitive_level: self.cognitive_level,
            co: self.co.clone(),
            po: self.po.clone(),
        }
    }
}

/// Unvalidated input as it arrives from a form or an import row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDraft {
    pub text: String,
    pub marks: Option<String>,
    pub difficulty: Option<String>,
    pub cognitive_level: Option<String>,
    pub co: Option<String>,
    pub po: Option<String>,
}

impl QuestionDraft {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn marks(mut self, marks: impl ToString) -> Self {
        self.marks = Some(marks.to_string());
        self
    }

    pub fn difficulty(mut self, difficulty: impl Into<String>) -> Self {
        self.difficulty = Some(difficulty.into());
        self
    }

    pub fn cognitive_level(mut self, level: impl Into<String>) -> Self {
        self.cognitive_level = Some(level.into());
        self
    }

    pub fn outcomes(mut self, co: impl Into<String>, po: impl Into<String>) -> Self {
        self.co = Some(co.into());
        self.po = Some(po.into());
        self
    }
}

/// Row to be written by a store. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuestion {
    pub topic_id: TopicId,
    pub fields: QuestionFields,
    pub created_by: Option<UserId>,
}

/// Where a question sits in the subject/module/topic tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub subject_id: SubjectId,
    pub subject_code: String,
    pub module_no: i64,
    pub module_title: String,
    pub topic_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedQuestion {
    pub question: Question,
    pub placement: Placement,
}

/// Scope in which question text must be unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DedupScope {
    /// Manual entry: unique within one topic.
    Topic(TopicId),
    /// Bulk import: unique across the whole bank.
    Global,
}

impl fmt::Display for DedupScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DedupScope::Topic(id) => write!(f, "topic {}", id),
            DedupScope::Global => f.write_str("the question bank"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    #[default]
    Exact,
    CaseInsensitive,
}

impl MatchPolicy {
    /// Comparison key for `text`: two texts match when their keys are equal.
    pub fn key(&self, text: &str) -> String {
        match self {
            MatchPolicy::Exact => text.trim().to_string(),
            MatchPolicy::CaseInsensitive => text.trim().to_lowercase(),
        }
    }

    pub fn matches(&self, stored: &str, candidate: &str) -> bool {
        self.key(stored) == self.key(candidate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Faculty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn admin(user_id: i64) -> Self {
        Self {
            user_id: UserId(user_id),
            role: Role::Admin,
        }
    }

    pub fn faculty(user_id: i64) -> Self {
        Self {
            user_id: UserId(user_id),
            role: Role::Faculty,
        }
    }

    pub fn is_elevated(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn can_modify(&self, question: &Question) -> bool {
        self.is_elevated() || question.created_by == Some(self.user_id)
    }
}

/// Requested number of questions per difficulty band, kept in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaMap {
    bands: Vec<(Difficulty, i64)>,
}

impl QuotaMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the count for a band. A band set twice keeps its first position.
    pub fn set(&mut self, difficulty: Difficulty, count: i64) -> &mut Self {
        match self.bands.iter_mut().find(|(d, _)| *d == difficulty) {
            Some(entry) => entry.1 = count,
            None => self.bands.push((difficulty, count)),
        }
        self
    }

    pub fn with(mut self, difficulty: Difficulty, count: i64) -> Self {
        self.set(difficulty, count);
        self
    }

    pub fn get(&self, difficulty: Difficulty) -> Option<i64> {
        self.bands.iter().find(|(d, _)| *d == difficulty).map(|(_, c)| *c)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Difficulty, i64)> + '_ {
        self.bands.iter().copied()
    }

    /// Sum of the positive quotas, saturating at `usize::MAX`.
    pub fn requested_total(&self) -> usize {
        self.bands
            .iter()
            .fold(0usize, |total, (_, c)| total.saturating_add(quota_len(*c)))
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }
}

/// A quota as a question count. Non-positive quotas ask for nothing.
pub fn quota_len(count: i64) -> usize {
    usize::try_from(count.max(0)).unwrap_or(usize::MAX)
}

impl FromIterator<(Difficulty, i64)> for QuotaMap {
    fn from_iter<I: IntoIterator<Item = (Difficulty, i64)>>(iter: I) -> Self {
        let mut map = QuotaMap::new();
        for (difficulty, count) in iter {
            map.set(difficulty, count);
        }
        map
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionFilter {
    pub subject_id: Option<SubjectId>,
    pub module_no: Option<i64>,
    pub difficulty: Option<Difficulty>,
}

impl QuestionFilter {
    pub fn accepts(&self, placed: &PlacedQuestion) -> bool {
        self.subject_id.map_or(true, |s| placed.placement.subject_id == s)
            && self.module_no.map_or(true, |m| placed.placement.module_no == m)
            && self.difficulty.map_or(true, |d| placed.question.difficulty == d)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BankStats {
    pub subjects: usize,
    /// Every stored question, including ones whose topic no longer resolves.
    pub questions: usize,
    pub by_difficulty: Vec<(Difficulty, usize)>,
    /// Placed questions only, so the counts may sum to less than `questions`.
    pub by_module: Vec<(i64, usize)>,
}
