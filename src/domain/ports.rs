use crate::domain::model::{
    BankStats, DedupScope, Difficulty, MatchPolicy, Module, ModuleId, NewQuestion, PlacedQuestion, Question,
    QuestionFields, QuestionFilter, QuestionId, Subject, SubjectId, Topic, TopicId, UserId,
};
use crate::utils::error::Result;

/// Subject → module → topic tree the questions hang off.
pub trait Catalog {
    fn add_subject(&mut self, code: &str, name: &str) -> Result<Subject>;
    fn add_module(&mut self, subject_id: SubjectId, module_no: i64, title: &str) -> Result<Module>;
    fn add_topic(&mut self, module_id: ModuleId, name: &str) -> Result<Topic>;

    fn subject(&self, id: SubjectId) -> Result<Option<Subject>>;
    fn topic(&self, id: TopicId) -> Result<Option<Topic>>;
    fn subjects(&self) -> Result<Vec<Subject>>;
}

pub trait QuestionStore {
    fn insert(&mut self, question: NewQuestion) -> Result<Question>;
    fn update(&mut self, id: QuestionId, fields: QuestionFields) -> Result<Question>;
    fn get(&self, id: QuestionId) -> Result<Option<Question>>;
    fn delete(&mut self, id: QuestionId) -> Result<bool>;
    /// Deletes only when `owner` created the question.
    fn delete_owned(&mut self, id: QuestionId, owner: UserId) -> Result<bool>;

    /// True when a question with the (already trimmed) text exists in `scope`.
    fn exists_with_text(&self, text: &str, scope: DedupScope, policy: MatchPolicy) -> Result<bool>;

    /// Raw text of every question in `scope`.
    fn question_texts(&self, scope: DedupScope) -> Result<Vec<String>>;

    /// Every question of `difficulty` whose topic belongs to `subject_id`.
    /// Order is unspecified.
    fn list_by_subject_and_difficulty(
        &self,
        subject_id: SubjectId,
        difficulty: Difficulty,
    ) -> Result<Vec<PlacedQuestion>>;

    /// Ordered by subject code, module number, topic name.
    fn search(&self, filter: &QuestionFilter) -> Result<Vec<PlacedQuestion>>;

    /// `questions` counts every row; `by_module` only rows whose topic resolves.
    fn stats(&self) -> Result<BankStats>;

    /// Runs `f` as one unit of work. Transactional stores make its writes
    /// all-or-nothing.
    fn atomically<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        f(self)
    }
}
