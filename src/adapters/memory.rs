use std::collections::BTreeMap;

use crate::domain::model::{
    BankStats, DedupScope, Difficulty, MatchPolicy, Module, ModuleId, NewQuestion, PlacedQuestion,
    Placement, Question, QuestionFields, QuestionFilter, QuestionId, Subject, SubjectId, Topic,
    TopicId, UserId,
};
use crate::domain::ports::{Catalog, QuestionStore};
use crate::utils::error::{BankError, Result};

/// Store kept entirely in memory. Ids are assigned from 1 upwards, per table,
/// the way an autoincrement column would.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    subjects: BTreeMap<SubjectId, Subject>,
    modules: BTreeMap<ModuleId, Module>,
    topics: BTreeMap<TopicId, Topic>,
    questions: BTreeMap<QuestionId, Question>,
    next_id: [i64; 4],
}

const SUBJECTS: usize = 0;
const MODULES: usize = 1;
const TOPICS: usize = 2;
const QUESTIONS: usize = 3;

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self, table: usize) -> i64 {
        self.next_id[table] += 1;
        self.next_id[table]
    }

    fn placement(&self, topic_id: TopicId) -> Option<Placement> {
        let topic = self.topics.get(&topic_id)?;
        let module = self.modules.get(&topic.module_id)?;
        let subject = self.subjects.get(&module.subject_id)?;
        Some(Placement {
            subject_id: subject.id,
            subject_code: subject.code.clone(),
            module_no: module.module_no,
            module_title: module.title.clone(),
            topic_name: topic.name.clone(),
        })
    }

    /// Questions whose topic resolves all the way up to a subject. Orphans
    /// (such as imports attached to a missing fallback topic) are left out,
    /// as an inner join would.
    fn placed(&self) -> impl Iterator<Item = PlacedQuestion> + '_ {
        self.questions.values().filter_map(|q| {
            self.placement(q.topic_id).map(|placement| PlacedQuestion {
                question: q.clone(),
                placement,
            })
        })
    }
}

impl Catalog for MemoryStore {
    fn add_subject(&mut self, code: &str, name: &str) -> Result<Subject> {
        let id = SubjectId(self.allocate(SUBJECTS));
        let subject = Subject {
            id,
            code: code.to_string(),
            name: name.to_string(),
        };
        self.subjects.insert(id, subject.clone());
        Ok(subject)
    }

    fn add_module(&mut self, subject_id: SubjectId, module_no: i64, title: &str) -> Result<Module> {
        if !self.subjects.contains_key(&subject_id) {
            return Err(BankError::SubjectNotFound(subject_id));
        }
        let id = ModuleId(self.allocate(MODULES));
        let module = Module {
            id,
            subject_id,
            module_no,
            title: title.to_string(),
        };
        self.modules.insert(id, module.clone());
        Ok(module)
    }

    fn add_topic(&mut self, module_id: ModuleId, name: &str) -> Result<Topic> {
        if !self.modules.contains_key(&module_id) {
            return Err(BankError::ModuleNotFound(module_id));
        }
        let id = TopicId(self.allocate(TOPICS));
        let topic = Topic {
            id,
            module_id,
            name: name.to_string(),
        };
        self.topics.insert(id, topic.clone());
        Ok(topic)
    }

    fn subject(&self, id: SubjectId) -> Result<Option<Subject>> {
        Ok(self.subjects.get(&id).cloned())
    }

    fn topic(&self, id: TopicId) -> Result<Option<Topic>> {
        Ok(self.topics.get(&id).cloned())
    }

    fn subjects(&self) -> Result<Vec<Subject>> {
        let mut all: Vec<_> = self.subjects.values().cloned().collect();
        all.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(all)
    }
}

impl QuestionStore for MemoryStore {
    fn insert(&mut self, question: NewQuestion) -> Result<Question> {
        let id = QuestionId(self.allocate(QUESTIONS));
        let NewQuestion {
            topic_id,
            fields,
            created_by,
        } = question;
        let stored = Question {
            id,
            topic_id,
            text: fields.text,
            marks: fields.marks,
            difficulty: fields.difficulty,
            cognitive_level: fields.cognitive_level,
            co: fields.co,
            po: fields.po,
            created_by,
        };
        self.questions.insert(id, stored.clone());
        Ok(stored)
    }

    fn update(&mut self, id: QuestionId, fields: QuestionFields) -> Result<Question> {
        let question = self
            .questions
            .get_mut(&id)
            .ok_or(BankError::QuestionNotFound(id))?;
        question.text = fields.text;
        question.marks = fields.marks;
        question.difficulty = fields.difficulty;
        question.cognitive_level = fields.cognitive_level;
        question.co = fields.co;
        question.po = fields.po;
        Ok(question.clone())
    }

    fn get(&self, id: QuestionId) -> Result<Option<Question>> {
        Ok(self.questions.get(&id).cloned())
    }

    fn delete(&mut self, id: QuestionId) -> Result<bool> {
        Ok(self.questions.remove(&id).is_some())
    }

    fn delete_owned(&mut self, id: QuestionId, owner: UserId) -> Result<bool> {
        match self.questions.get(&id) {
            Some(q) if q.created_by == Some(owner) => Ok(self.questions.remove(&id).is_some()),
            _ => Ok(false),
        }
    }

    fn exists_with_text(&self, text: &str, scope: DedupScope, policy: MatchPolicy) -> Result<bool> {
        Ok(self.questions.values().any(|q| {
            let in_scope = match scope {
                DedupScope::Topic(topic_id) => q.topic_id == topic_id,
                DedupScope::Global => true,
            };
            in_scope && policy.matches(&q.text, text)
        }))
    }

    fn question_texts(&self, scope: DedupScope) -> Result<Vec<String>> {
        Ok(self
            .questions
            .values()
            .filter(|q| match scope {
                DedupScope::Topic(topic_id) => q.topic_id == topic_id,
                DedupScope::Global => true,
            })
            .map(|q| q.text.clone())
            .collect())
    }

    fn list_by_subject_and_difficulty(
        &self,
        subject_id: SubjectId,
        difficulty: Difficulty,
    ) -> Result<Vec<PlacedQuestion>> {
        Ok(self
            .placed()
            .filter(|p| p.placement.subject_id == subject_id && p.question.difficulty == difficulty)
            .collect())
    }

    fn search(&self, filter: &QuestionFilter) -> Result<Vec<PlacedQuestion>> {
        let mut found: Vec<_> = self.placed().filter(|p| filter.accepts(p)).collect();
        found.sort_by(|a, b| {
            (&a.placement.subject_code, a.placement.module_no, &a.placement.topic_name)
                .cmp(&(&b.placement.subject_code, b.placement.module_no, &b.placement.topic_name))
        });
        Ok(found)
    }

    fn stats(&self) -> Result<BankStats> {
        let by_difficulty = Difficulty::ALL
            .iter()
            .map(|d| (*d, self.questions.values().filter(|q| q.difficulty == *d).count()))
            .filter(|(_, count)| *count > 0)
            .collect();

        let mut modules: BTreeMap<i64, usize> = BTreeMap::new();
        for placed in self.placed() {
            *modules.entry(placed.placement.module_no).or_default() += 1;
        }

        Ok(BankStats {
            subjects: self.subjects.len(),
            questions: self.questions.len(),
            by_difficulty,
            by_module: modules.into_iter().collect(),
        })
    }

    fn atomically<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let snapshot = self.clone();
        let result = f(self);
        if result.is_err() {
            *self = snapshot;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::CognitiveLevel;

    fn fields(text: &str, difficulty: Difficulty) -> QuestionFields {
        QuestionFields {
            text: text.to_string(),
            marks: 2,
            difficulty,
            cognitive_level: CognitiveLevel::Understand,
            co: None,
            po: None,
        }
    }

    #[test]
    fn test_add_module_requires_subject() {
        let mut store = MemoryStore::new();
        assert!(matches!(
            store.add_module(SubjectId(1), 1, "Intro"),
            Err(BankError::SubjectNotFound(SubjectId(1)))
        ));
    }

    #[test]
    fn test_delete_owned_respects_author() {
        let mut store = MemoryStore::new();
        let q = store
            .insert(NewQuestion {
                topic_id: TopicId(1),
                fields: fields("Q", Difficulty::Easy),
                created_by: Some(UserId(5)),
            })
            .unwrap();

        assert!(!store.delete_owned(q.id, UserId(6)).unwrap());
        assert!(store.get(q.id).unwrap().is_some());
        assert!(store.delete_owned(q.id, UserId(5)).unwrap());
        assert!(store.get(q.id).unwrap().is_none());
    }

    #[test]
    fn test_atomically_rolls_back_on_error() {
        let mut store = MemoryStore::new();
        let result: Result<()> = store.atomically(|s| {
            s.add_subject("X1", "Scratch")?;
            Err(BankError::EmptyText)
        });
        assert!(result.is_err());
        assert!(store.subjects().unwrap().is_empty());
    }

    #[test]
    fn test_stats_and_search_order() {
        let mut store = MemoryStore::new();
        let b = store.add_subject("B200", "Later").unwrap();
        let a = store.add_subject("A100", "Earlier").unwrap();
        let bm = store.add_module(b.id, 1, "One").unwrap();
        let am2 = store.add_module(a.id, 2, "Two").unwrap();
        let am1 = store.add_module(a.id, 1, "One").unwrap();
        let bt = store.add_topic(bm.id, "Zeta").unwrap();
        let at2 = store.add_topic(am2.id, "Alpha").unwrap();
        let at1 = store.add_topic(am1.id, "Beta").unwrap();

        for (topic, text, d) in [
            (bt.id, "b1", Difficulty::Hard),
            (at2.id, "a2", Difficulty::Easy),
            (at1.id, "a1", Difficulty::Easy),
        ] {
            store
                .insert(NewQuestion {
                    topic_id: topic,
                    fields: fields(text, d),
                    created_by: None,
                })
                .unwrap();
        }

        let order: Vec<_> = store
            .search(&QuestionFilter::default())
            .unwrap()
            .into_iter()
            .map(|p| p.question.text)
            .collect();
        assert_eq!(order, vec!["a1", "a2", "b1"]);

        let stats = store.stats().unwrap();
        assert_eq!(stats.subjects, 2);
        assert_eq!(stats.questions, 3);
        assert_eq!(
            stats.by_difficulty,
            vec![(Difficulty::Easy, 2), (Difficulty::Hard, 1)]
        );
        assert_eq!(stats.by_module, vec![(1, 2), (2, 1)]);
    }

    #[test]
    fn test_stats_count_unplaced_questions_in_total_only() {
        let mut store = MemoryStore::new();
        let subject = store.add_subject("EE201", "Circuits").unwrap();
        let module = store.add_module(subject.id, 3, "AC").unwrap();
        let topic = store.add_topic(module.id, "Phasors").unwrap();

        for (topic_id, text) in [(topic.id, "placed"), (TopicId(99), "orphan")] {
            store
                .insert(NewQuestion {
                    topic_id,
                    fields: fields(text, Difficulty::Medium),
                    created_by: None,
                })
                .unwrap();
        }

        let stats = store.stats().unwrap();
        assert_eq!(stats.questions, 2);
        assert_eq!(stats.by_difficulty, vec![(Difficulty::Medium, 2)]);
        assert_eq!(stats.by_module, vec![(3, 1)]);
        assert_eq!(store.question_texts(DedupScope::Global).unwrap().len(), 2);
    }
}
