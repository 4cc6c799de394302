use std::collections::HashSet;

use crate::domain::model::{DedupScope, MatchPolicy};
use crate::domain::ports::QuestionStore;
use crate::utils::error::Result;

/// Read-only check that keeps text-identical questions out of one scope.
///
/// Manual entry checks [`DedupScope::Topic`]; bulk import checks
/// [`DedupScope::Global`] because imported rows carry no usable topic.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuplicateGuard {
    policy: MatchPolicy,
}

impl DuplicateGuard {
    pub fn new(policy: MatchPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    pub fn would_duplicate<S: QuestionStore>(
        &self,
        store: &S,
        candidate_text: &str,
        scope: DedupScope,
    ) -> Result<bool> {
        let text = candidate_text.trim();
        let found = store.exists_with_text(text, scope, self.policy)?;
        if found {
            tracing::debug!("Duplicate text in {}: {:?}", scope, text);
        }
        Ok(found)
    }

    /// Loads every text in `scope` once, for checking many candidates
    /// against the same scope.
    pub fn seen_texts<S: QuestionStore>(&self, store: &S, scope: DedupScope) -> Result<SeenTexts> {
        let texts = store.question_texts(scope)?;
        tracing::debug!("Loaded {} existing texts from {}", texts.len(), scope);
        Ok(SeenTexts {
            policy: self.policy,
            keys: texts.iter().map(|t| self.policy.key(t)).collect(),
        })
    }
}

/// Texts of one scope, keyed by a [`MatchPolicy`]. Callers add what they
/// write so later candidates see it.
#[derive(Debug, Clone)]
pub struct SeenTexts {
    policy: MatchPolicy,
    keys: HashSet<String>,
}

impl SeenTexts {
    pub fn contains(&self, text: &str) -> bool {
        self.keys.contains(&self.policy.key(text))
    }

    pub fn insert(&mut self, text: &str) {
        self.keys.insert(self.policy.key(text));
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
