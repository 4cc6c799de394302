//! Paper assembly.
//!
//! For every band in a [`QuotaMap`], in map order, the sampler fetches the
//! subject's eligible pool, shuffles it uniformly and takes up to the quota.
//! Bands are concatenated in the same order. A pool smaller than its quota
//! is taken whole: the paper comes back short and the shortfall is recorded
//! in the band's [`BandReport`]. Callers must check [`PaperSelection::is_complete`]
//! (or compare `len()` against [`QuotaMap::requested_total`]) before treating
//! the paper as full.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::domain::model::{quota_len, Difficulty, PlacedQuestion, QuotaMap, SubjectId};
use crate::domain::ports::{Catalog, QuestionStore};
use crate::utils::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionOutcome {
    /// Every positive quota was met.
    Complete,
    /// The subject exists but at least one band ran short.
    Underfilled,
    /// No such subject; every pool was treated as empty.
    UnknownSubject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BandReport {
    pub difficulty: Difficulty,
    pub requested: i64,
    pub available: usize,
    pub selected: usize,
}

impl BandReport {
    pub fn shortfall(&self) -> usize {
        quota_len(self.requested).saturating_sub(self.selected)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperSelection {
    pub subject_id: SubjectId,
    pub outcome: SelectionOutcome,
    pub questions: Vec<PlacedQuestion>,
    pub bands: Vec<BandReport>,
}

impl PaperSelection {
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.outcome == SelectionOutcome::Complete
    }

    pub fn requested_total(&self) -> usize {
        self.bands
            .iter()
            .fold(0usize, |total, b| total.saturating_add(quota_len(b.requested)))
    }

    pub fn shortfall_total(&self) -> usize {
        self.bands
            .iter()
            .fold(0usize, |total, b| total.saturating_add(b.shortfall()))
    }

    pub fn total_marks(&self) -> u64 {
        self.questions.iter().map(|p| p.question.marks as u64).sum()
    }
}

pub struct PaperSampler<'a, S> {
    store: &'a S,
}

impl<'a, S: QuestionStore + Catalog> PaperSampler<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Draws a paper using the thread-local random source.
    pub fn generate(&self, subject_id: SubjectId, quotas: &QuotaMap) -> Result<PaperSelection> {
        self.generate_with(subject_id, quotas, &mut rand::rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(
        &self,
        subject_id: SubjectId,
        quotas: &QuotaMap,
        rng: &mut R,
    ) -> Result<PaperSelection> {
        let subject_known = self.store.subject(subject_id)?.is_some();
        if !subject_known {
            tracing::warn!("Paper requested for unknown subject {}", subject_id);
        }

        let mut questions = Vec::new();
        let mut bands = Vec::new();

        for (difficulty, quota) in quotas.iter() {
            if quota <= 0 {
                bands.push(BandReport {
                    difficulty,
                    requested: quota,
                    available: 0,
                    selected: 0,
                });
                continue;
            }

            let mut pool = if subject_known {
                self.store.list_by_subject_and_difficulty(subject_id, difficulty)?
            } else {
                Vec::new()
            };
            let available = pool.len();

            let wanted = quota_len(quota);
            pool.shuffle(rng);
            pool.truncate(wanted);
            let selected = pool.len();

            tracing::debug!(
                "Band {}: requested {}, available {}, selected {}",
                difficulty,
                quota,
                available,
                selected
            );
            if selected < wanted {
                tracing::warn!(
                    "Band {} short by {} question(s) for subject {}",
                    difficulty,
                    wanted - selected,
                    subject_id
                );
            }

            questions.extend(pool);
            bands.push(BandReport {
                difficulty,
                requested: quota,
                available,
                selected,
            });
        }

        let outcome = if !subject_known {
            SelectionOutcome::UnknownSubject
        } else if bands.iter().any(|b| b.shortfall() > 0) {
            SelectionOutcome::Underfilled
        } else {
            SelectionOutcome::Complete
        };

        Ok(PaperSelection {
            subject_id,
            outcome,
            questions,
            bands,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::core::validate::validate;
    use crate::domain::model::{NewQuestion, QuestionDraft, QuestionId};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    /// Subject with `easy`, `medium` and `hard` questions spread over two
    /// modules, plus a second subject whose questions must never leak in.
    fn fixture(easy: usize, medium: usize, hard: usize) -> (MemoryStore, SubjectId) {
        let mut store = MemoryStore::new();
        let subject = store.add_subject("MA201", "Calculus").unwrap();
        let m1 = store.add_module(subject.id, 1, "Limits").unwrap();
        let m2 = store.add_module(subject.id, 2, "Derivatives").unwrap();
        let t1 = store.add_topic(m1.id, "Continuity").unwrap();
        let t2 = store.add_topic(m2.id, "Chain rule").unwrap();

        let other = store.add_subject("PH101", "Physics").unwrap();
        let om = store.add_module(other.id, 1, "Kinematics").unwrap();
        let ot = store.add_topic(om.id, "Velocity").unwrap();

        let mut add = |topic, text: String, difficulty: &str| {
            store
                .insert(NewQuestion {
                    topic_id: topic,
                    fields: validate(&QuestionDraft::new(text).difficulty(difficulty)).unwrap(),
                    created_by: None,
                })
                .unwrap();
        };
        for (count, band) in [(easy, "Easy"), (medium, "Medium"), (hard, "Hard")] {
            for i in 0..count {
                let topic = if i % 2 == 0 { t1.id } else { t2.id };
                add(topic, format!("{} question {}", band, i), band);
            }
            add(ot.id, format!("Physics {} question", band), band);
        }
        (store, subject.id)
    }

    fn standard_quotas() -> QuotaMap {
        QuotaMap::new()
            .with(Difficulty::Easy, 2)
            .with(Difficulty::Medium, 3)
            .with(Difficulty::Hard, 1)
    }

    #[test]
    fn test_full_pools_fill_every_band() {
        let (store, subject) = fixture(4, 5, 3);
        let paper = PaperSampler::new(&store).generate(subject, &standard_quotas()).unwrap();

        assert_eq!(paper.len(), 6);
        assert!(paper.is_complete());
        assert_eq!(paper.shortfall_total(), 0);
        assert!(paper
            .questions
            .iter()
            .all(|p| p.placement.subject_id == subject));
    }

    #[test]
    fn test_bands_concatenated_in_request_order() {
        let (store, subject) = fixture(4, 5, 3);
        let quotas = QuotaMap::new()
            .with(Difficulty::Hard, 2)
            .with(Difficulty::Easy, 1)
            .with(Difficulty::Medium, 2);
        let paper = PaperSampler::new(&store).generate(subject, &quotas).unwrap();

        let order: Vec<_> = paper.questions.iter().map(|p| p.question.difficulty).collect();
        assert_eq!(
            order,
            vec![
                Difficulty::Hard,
                Difficulty::Hard,
                Difficulty::Easy,
                Difficulty::Medium,
                Difficulty::Medium
            ]
        );
    }

    #[test]
    fn test_non_positive_quota_never_contributes() {
        let (store, subject) = fixture(4, 5, 3);
        let quotas = QuotaMap::new()
            .with(Difficulty::Easy, 0)
            .with(Difficulty::Medium, 2)
            .with(Difficulty::Hard, -4);
        let sampler = PaperSampler::new(&store);

        for _ in 0..20 {
            let paper = sampler.generate(subject, &quotas).unwrap();
            assert_eq!(paper.len(), 2);
            assert!(paper
                .questions
                .iter()
                .all(|p| p.question.difficulty == Difficulty::Medium));
            assert!(paper.is_complete());
        }
    }

    #[test]
    fn test_small_pool_is_taken_whole() {
        let (store, subject) = fixture(2, 0, 0);
        let quotas = QuotaMap::new().with(Difficulty::Easy, 5);
        let paper = PaperSampler::new(&store).generate(subject, &quotas).unwrap();

        let texts: HashSet<_> = paper.questions.iter().map(|p| p.question.text.as_str()).collect();
        assert_eq!(paper.len(), 2);
        assert_eq!(texts, HashSet::from(["Easy question 0", "Easy question 1"]));
        assert_eq!(paper.outcome, SelectionOutcome::Underfilled);
        assert_eq!(paper.bands[0].shortfall(), 3);
        assert_eq!(paper.bands[0].available, 2);
    }

    #[test]
    fn test_length_bounded_by_requested_total() {
        let (store, subject) = fixture(1, 5, 0);
        let paper = PaperSampler::new(&store).generate(subject, &standard_quotas()).unwrap();

        assert!(paper.len() <= 6);
        assert_eq!(paper.len(), 1 + 3);
        assert_eq!(paper.shortfall_total(), 2);
        assert!(!paper.is_complete());
    }

    #[test]
    fn test_selection_is_subset_without_repeats() {
        let (store, subject) = fixture(6, 6, 6);
        let sampler = PaperSampler::new(&store);
        let quotas = QuotaMap::new()
            .with(Difficulty::Easy, 4)
            .with(Difficulty::Medium, 4)
            .with(Difficulty::Hard, 4);

        for _ in 0..50 {
            let paper = sampler.generate(subject, &quotas).unwrap();
            let ids: HashSet<QuestionId> = paper.questions.iter().map(|p| p.question.id).collect();
            assert_eq!(ids.len(), paper.len());

            for band in Difficulty::ALL {
                let pool: HashSet<QuestionId> = store
                    .list_by_subject_and_difficulty(subject, band)
                    .unwrap()
                    .into_iter()
                    .map(|p| p.question.id)
                    .collect();
                assert!(paper
                    .questions
                    .iter()
                    .filter(|p| p.question.difficulty == band)
                    .all(|p| pool.contains(&p.question.id)));
            }
        }
    }

    #[test]
    fn test_unknown_subject_is_explicit() {
        let (store, _) = fixture(3, 3, 3);
        let paper = PaperSampler::new(&store)
            .generate(SubjectId(999), &standard_quotas())
            .unwrap();

        assert!(paper.is_empty());
        assert_eq!(paper.outcome, SelectionOutcome::UnknownSubject);
        assert_eq!(paper.shortfall_total(), 6);
    }

    #[test]
    fn test_subject_without_matching_questions_is_underfilled() {
        let (store, subject) = fixture(0, 0, 0);
        let paper = PaperSampler::new(&store).generate(subject, &standard_quotas()).unwrap();

        assert!(paper.is_empty());
        assert_eq!(paper.outcome, SelectionOutcome::Underfilled);
    }

    #[test]
    fn test_huge_quota_on_empty_subject() {
        let mut store = MemoryStore::new();
        let subject = store.add_subject("EMPTY1", "Nothing yet").unwrap();
        let quotas = QuotaMap::new().with(Difficulty::Easy, i64::MAX);

        let paper = PaperSampler::new(&store).generate(subject.id, &quotas).unwrap();

        assert!(paper.is_empty());
        assert_eq!(paper.outcome, SelectionOutcome::Underfilled);
        assert_eq!(paper.bands[0].shortfall(), quota_len(i64::MAX));
    }

    #[test]
    fn test_huge_quotas_take_whole_pools() {
        let (store, subject) = fixture(4, 5, 3);
        let quotas = QuotaMap::new()
            .with(Difficulty::Easy, i64::MAX)
            .with(Difficulty::Medium, i64::MAX)
            .with(Difficulty::Hard, 100_000_000_000);

        let paper = PaperSampler::new(&store).generate(subject, &quotas).unwrap();

        assert_eq!(paper.len(), 12);
        assert_eq!(quotas.requested_total(), usize::MAX);
        assert_eq!(paper.requested_total(), usize::MAX);
        assert_eq!(paper.shortfall_total(), usize::MAX);
    }

    #[test]
    fn test_same_seed_same_paper() {
        let (store, subject) = fixture(8, 8, 8);
        let sampler = PaperSampler::new(&store);

        let a = sampler
            .generate_with(subject, &standard_quotas(), &mut StdRng::seed_from_u64(42))
            .unwrap();
        let b = sampler
            .generate_with(subject, &standard_quotas(), &mut StdRng::seed_from_u64(42))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_first_position_is_roughly_uniform() {
        let (store, subject) = fixture(4, 0, 0);
        let sampler = PaperSampler::new(&store);
        let quotas = QuotaMap::new().with(Difficulty::Easy, 4);
        let mut rng = StdRng::seed_from_u64(7);

        let runs = 4000;
        let mut first_counts = std::collections::HashMap::new();
        for _ in 0..runs {
            let paper = sampler.generate_with(subject, &quotas, &mut rng).unwrap();
            assert_eq!(paper.len(), 4);
            *first_counts.entry(paper.questions[0].question.id).or_insert(0usize) += 1;
        }

        assert_eq!(first_counts.len(), 4);
        // Expected 1000 each; the bounds sit more than 7 standard deviations out.
        for count in first_counts.values() {
            assert!((800..=1200).contains(count), "skewed first position: {:?}", first_counts);
        }
    }
}
