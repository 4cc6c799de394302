use rand::Rng;
use serde::Serialize;

use crate::core::guard::DuplicateGuard;
use crate::core::sampler::{PaperSampler, PaperSelection};
use crate::core::validate::validate;
use crate::domain::model::{
    Actor, BankStats, DedupScope, MatchPolicy, NewQuestion, PlacedQuestion, Question,
    QuestionDraft, QuestionFields, QuestionFilter, QuestionId, QuotaMap, SubjectId, TopicId,
    UserId,
};
use crate::domain::ports::{Catalog, QuestionStore};
use crate::utils::error::{BankError, Result};

/// Outcome of one bulk import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub inserted: usize,
    pub skipped_empty: usize,
    pub skipped_duplicate: usize,
    /// Rows that failed validation (bad marks, unknown difficulty...), by 1-based row number.
    pub rejected: Vec<(usize, String)>,
}

impl ImportReport {
    pub fn seen(&self) -> usize {
        self.inserted + self.skipped_empty + self.skipped_duplicate + self.rejected.len()
    }
}

/// Entry point for everything that reads or writes questions.
///
/// Manual entry is deduplicated per topic and records its author. Bulk
/// import is deduplicated across the whole bank and attaches every row to
/// one fallback topic, since imported rows carry no topic of their own.
pub struct QuestionBank<S> {
    store: S,
    guard: DuplicateGuard,
    fallback_topic: TopicId,
}

impl<S: QuestionStore + Catalog> QuestionBank<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            guard: DuplicateGuard::default(),
            fallback_topic: TopicId(1),
        }
    }

    pub fn with_match_policy(mut self, policy: MatchPolicy) -> Self {
        self.guard = DuplicateGuard::new(policy);
        self
    }

    pub fn with_fallback_topic(mut self, topic: TopicId) -> Self {
        self.fallback_topic = topic;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn require_topic(&self, topic_id: TopicId) -> Result<()> {
        match self.store.topic(topic_id)? {
            Some(_) => Ok(()),
            None => Err(BankError::TopicNotFound(topic_id)),
        }
    }

    /// Validates `draft`, checks it against `scope` and stores it.
    ///
    /// A topic scope pins the question to that topic; the global scope
    /// attaches it to the fallback topic.
    pub fn insert_question(
        &mut self,
        draft: &QuestionDraft,
        scope: DedupScope,
        creator: Option<UserId>,
    ) -> Result<Question> {
        let fields = validate(draft)?;
        let topic_id = match scope {
            DedupScope::Topic(topic_id) => topic_id,
            DedupScope::Global => self.fallback_topic,
        };
        self.require_topic(topic_id)?;

        if self.guard.would_duplicate(&self.store, &fields.text, scope)? {
            return Err(BankError::DuplicateQuestion { scope });
        }

        let question = self.store.insert(NewQuestion {
            topic_id,
            fields,
            created_by: creator,
        })?;
        tracing::info!("Added question {} to topic {}", question.id, topic_id);
        Ok(question)
    }

    /// Manual entry by a signed-in user.
    pub fn add_manual(&mut self, topic_id: TopicId, draft: &QuestionDraft, actor: &Actor) -> Result<Question> {
        self.insert_question(draft, DedupScope::Topic(topic_id), Some(actor.user_id))
    }

    /// Imports rows in order. Blank-text rows, text already present anywhere
    /// in the bank (including earlier rows of the same batch), and rows that
    /// fail validation are skipped and counted rather than failing the batch.
    /// Store failures abort the whole import and nothing is kept.
    pub fn import_rows<I>(&mut self, rows: I) -> Result<ImportReport>
    where
        I: IntoIterator<Item = QuestionDraft>,
    {
        self.require_topic(self.fallback_topic)?;
        let guard = self.guard;
        let fallback_topic = self.fallback_topic;

        let report = self.store.atomically(|store| {
            let mut report = ImportReport::default();
            let mut seen = guard.seen_texts(&*store, DedupScope::Global)?;
            for (index, draft) in rows.into_iter().enumerate() {
                let row_no = index + 1;
                if draft.text.trim().is_empty() {
                    report.skipped_empty += 1;
                    continue;
                }
                if seen.contains(&draft.text) {
                    report.skipped_duplicate += 1;
                    continue;
                }
                let fields = match validate(&draft) {
                    Ok(fields) => fields,
                    Err(e) => {
                        tracing::warn!("Import row {} rejected: {}", row_no, e);
                        report.rejected.push((row_no, e.to_string()));
                        continue;
                    }
                };
                seen.insert(&fields.text);
                store.insert(NewQuestion {
                    topic_id: fallback_topic,
                    fields,
                    created_by: None,
                })?;
                report.inserted += 1;
            }
            Ok(report)
        })?;

        tracing::info!(
            "Import finished: {} inserted, {} empty, {} duplicate, {} rejected",
            report.inserted,
            report.skipped_empty,
            report.skipped_duplicate,
            report.rejected.len()
        );
        Ok(report)
    }

    /// Overwrites a question's content. Only its author or an admin may do
    /// this. Changing the text re-checks the topic scope.
    pub fn update_question(&mut self, actor: &Actor, id: QuestionId, fields: QuestionFields) -> Result<Question> {
        let current = self.store.get(id)?.ok_or(BankError::QuestionNotFound(id))?;
        if !actor.can_modify(&current) {
            return Err(BankError::PermissionDenied {
                user: actor.user_id,
                question: id,
            });
        }

        let fields = fields.normalized()?;
        let policy = self.guard.policy();
        let scope = DedupScope::Topic(current.topic_id);
        if !policy.matches(&current.text, &fields.text)
            && self.guard.would_duplicate(&self.store, &fields.text, scope)?
        {
            return Err(BankError::DuplicateQuestion { scope });
        }

        let updated = self.store.update(id, fields)?;
        tracing::info!("User {} edited question {}", actor.user_id, id);
        Ok(updated)
    }

    /// Admins delete any question; everyone else only their own. Returns
    /// whether a row was removed.
    pub fn delete_question(&mut self, actor: &Actor, id: QuestionId) -> Result<bool> {
        let removed = if actor.is_elevated() {
            self.store.delete(id)?
        } else {
            self.store.delete_owned(id, actor.user_id)?
        };
        if removed {
            tracing::info!("User {} deleted question {}", actor.user_id, id);
        } else {
            tracing::warn!("User {} could not delete question {}", actor.user_id, id);
        }
        Ok(removed)
    }

    pub fn generate_paper(&self, subject_id: SubjectId, quotas: &QuotaMap) -> Result<PaperSelection> {
        self.generate_paper_with(subject_id, quotas, &mut rand::rng())
    }

    pub fn generate_paper_with<R: Rng + ?Sized>(
        &self,
        subject_id: SubjectId,
        quotas: &QuotaMap,
        rng: &mut R,
    ) -> Result<PaperSelection> {
        let selection = PaperSampler::new(&self.store).generate_with(subject_id, quotas, rng)?;
        tracing::info!(
            "Generated paper for subject {}: {}/{} questions ({:?})",
            subject_id,
            selection.len(),
            selection.requested_total(),
            selection.outcome
        );
        Ok(selection)
    }

    pub fn search(&self, filter: &QuestionFilter) -> Result<Vec<PlacedQuestion>> {
        self.store.search(filter)
    }

    pub fn stats(&self) -> Result<BankStats> {
        self.store.stats()
    }
}
