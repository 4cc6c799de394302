pub mod bank;
pub mod guard;
pub mod sampler;
pub mod validate;

pub use crate::domain::model::{DedupScope, PlacedQuestion, Question, QuestionDraft, QuotaMap};
pub use crate::domain::ports::{Catalog, QuestionStore};
pub use crate::utils::error::Result;
