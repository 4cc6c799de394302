pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{memory::MemoryStore, render::PaperDocument, sqlite::SqliteStore};
pub use config::BankConfig;
pub use core::{
    bank::{ImportReport, QuestionBank},
    guard::DuplicateGuard,
    sampler::{PaperSampler, PaperSelection, SelectionOutcome},
};
pub use utils::error::{BankError, Result};
