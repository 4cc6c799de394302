use std::collections::HashSet;

use qbank::core::{Catalog, QuestionStore};
use qbank::domain::model::{
    Actor, Difficulty, QuestionDraft, QuotaMap, SubjectId, TopicId,
};
use qbank::{MemoryStore, PaperDocument, QuestionBank, SelectionOutcome, SqliteStore};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;

/// Subject with 4 easy, 5 medium and 2 hard questions spread over two
/// modules, plus a second subject whose questions must never leak in.
fn populate<S: QuestionStore + Catalog>(store: S) -> (QuestionBank<S>, SubjectId) {
    let mut store = store;
    let subject = store.add_subject("MA101", "Calculus").unwrap();
    let limits = store.add_module(subject.id, 1, "Limits").unwrap();
    let series = store.add_module(subject.id, 2, "Series").unwrap();
    let t1 = store.add_topic(limits.id, "Continuity").unwrap();
    let t2 = store.add_topic(series.id, "Convergence").unwrap();

    let other = store.add_subject("PH101", "Mechanics").unwrap();
    let kinematics = store.add_module(other.id, 1, "Kinematics").unwrap();
    let t3 = store.add_topic(kinematics.id, "Projectiles").unwrap();

    let mut bank = QuestionBank::new(store).with_fallback_topic(t1.id);
    let admin = Actor::admin(1);
    let mut add = |topic: TopicId, text: String, difficulty: &str, marks: u32| {
        bank.add_manual(
            topic,
            &QuestionDraft::new(text).difficulty(difficulty).marks(marks),
            &admin,
        )
        .unwrap();
    };
    for i in 0..4 {
        add(t1.id, format!("Easy limit {}", i), "Easy", 2);
    }
    for i in 0..5 {
        add(t2.id, format!("Medium series {}", i), "Medium", 5);
    }
    for i in 0..2 {
        add(t2.id, format!("Hard series {}", i), "Hard", 10);
    }
    for i in 0..6 {
        add(t3.id, format!("Physics {}", i), "Easy", 2);
    }
    (bank, subject.id)
}

fn sqlite_bank() -> (TempDir, QuestionBank<SqliteStore>, SubjectId) {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::open(dir.path().join("papers.db")).unwrap();
    let (bank, subject) = populate(store);
    (dir, bank, subject)
}

#[test]
fn test_default_paper_shape_on_sqlite() {
    let (_dir, bank, subject) = sqlite_bank();
    let quotas = QuotaMap::new()
        .with(Difficulty::Easy, 2)
        .with(Difficulty::Medium, 3)
        .with(Difficulty::Hard, 1);

    let paper = bank
        .generate_paper_with(subject, &quotas, &mut StdRng::seed_from_u64(11))
        .unwrap();

    assert_eq!(paper.outcome, SelectionOutcome::Complete);
    assert_eq!(paper.len(), 6);
    let bands: Vec<_> = paper.questions.iter().map(|p| p.question.difficulty).collect();
    assert_eq!(
        bands,
        vec![
            Difficulty::Easy,
            Difficulty::Easy,
            Difficulty::Medium,
            Difficulty::Medium,
            Difficulty::Medium,
            Difficulty::Hard
        ]
    );
    assert!(paper.questions.iter().all(|p| p.placement.subject_id == subject));
    assert_eq!(paper.total_marks(), 2 * 2 + 3 * 5 + 10);

    let ids: HashSet<_> = paper.questions.iter().map(|p| p.question.id).collect();
    assert_eq!(ids.len(), paper.len());
}

#[test]
fn test_short_pool_is_reported_not_padded() {
    let (_dir, bank, subject) = sqlite_bank();
    let quotas = QuotaMap::new()
        .with(Difficulty::Hard, 5)
        .with(Difficulty::Easy, 0)
        .with(Difficulty::Medium, -2);

    let paper = bank.generate_paper(subject, &quotas).unwrap();

    assert_eq!(paper.outcome, SelectionOutcome::Underfilled);
    assert_eq!(paper.len(), 2);
    assert!(paper.questions.iter().all(|p| p.question.difficulty == Difficulty::Hard));
    assert_eq!(paper.shortfall_total(), 3);
    assert_eq!(paper.bands[0].available, 2);
    assert_eq!(paper.bands[1].selected, 0);
    assert_eq!(paper.bands[2].selected, 0);
}

#[test]
fn test_unknown_subject_gives_empty_paper() {
    let (_dir, bank, _) = sqlite_bank();
    let quotas = QuotaMap::new().with(Difficulty::Easy, 3);

    let paper = bank.generate_paper(SubjectId(404), &quotas).unwrap();

    assert_eq!(paper.outcome, SelectionOutcome::UnknownSubject);
    assert!(paper.is_empty());
    assert_eq!(paper.bands[0].shortfall(), 3);
}

#[test]
fn test_same_seed_same_paper_across_backends() {
    let (_dir, sqlite, subject) = sqlite_bank();
    let (memory, memory_subject) = populate(MemoryStore::new());
    let quotas = QuotaMap::new()
        .with(Difficulty::Easy, 3)
        .with(Difficulty::Medium, 2);

    let texts = |paper: qbank::PaperSelection| -> Vec<String> {
        paper.questions.into_iter().map(|p| p.question.text).collect()
    };

    let a = sqlite
        .generate_paper_with(subject, &quotas, &mut StdRng::seed_from_u64(99))
        .unwrap();
    let b = sqlite
        .generate_paper_with(subject, &quotas, &mut StdRng::seed_from_u64(99))
        .unwrap();
    let c = memory
        .generate_paper_with(memory_subject, &quotas, &mut StdRng::seed_from_u64(99))
        .unwrap();

    let a = texts(a);
    assert_eq!(a, texts(b));
    // Both stores list pools by question id, so the shuffle lines up.
    assert_eq!(a, texts(c));
}

#[test]
fn test_rendered_paper_written_to_disk() {
    let (dir, bank, subject_id) = sqlite_bank();
    let subject = bank.store().subject(subject_id).unwrap().unwrap();
    let quotas = QuotaMap::new()
        .with(Difficulty::Easy, 1)
        .with(Difficulty::Hard, 1);
    let paper = bank
        .generate_paper_with(subject_id, &quotas, &mut StdRng::seed_from_u64(5))
        .unwrap();

    let document = PaperDocument::build(&subject, "Mid Term", &paper);
    let path = dir.path().join("out").join(document.file_name());
    document.write_json(&path).unwrap();

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(path.file_name().unwrap(), "question_paper_MA101.json");
    assert_eq!(value["subject_name"], "Calculus");
    assert_eq!(value["exam_type"], "Mid Term");
    assert_eq!(value["total_marks"], 12);
    assert_eq!(value["complete"], true);
    assert_eq!(value["items"].as_array().unwrap().len(), 2);
    assert_eq!(value["items"][1]["difficulty"], "Hard");
}
