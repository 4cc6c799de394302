use crate::domain::model::{DedupScope, ModuleId, QuestionId, SubjectId, TopicId, UserId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BankError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Question text is empty")]
    EmptyText,

    #[error("Invalid {field}: '{value}' (expected one of: {allowed})")]
    InvalidEnum {
        field: &'static str,
        value: String,
        allowed: String,
    },

    #[error("Marks must be a positive integer, got '{value}'")]
    InvalidMarks { value: String },

    #[error("Duplicate question already exists in {scope}")]
    DuplicateQuestion { scope: DedupScope },

    #[error("Subject {0} not found")]
    SubjectNotFound(SubjectId),

    #[error("Module {0} not found")]
    ModuleNotFound(ModuleId),

    #[error("Topic {0} not found")]
    TopicNotFound(TopicId),

    #[error("Question {0} not found")]
    QuestionNotFound(QuestionId),

    #[error("User {user} is not allowed to modify question {question}")]
    PermissionDenied { user: UserId, question: QuestionId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Conflict,
    NotFound,
    Permission,
    Storage,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// Process exit code for a run that ended at this severity. Only `Low`
    /// counts as success.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl BankError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BankError::EmptyText | BankError::InvalidEnum { .. } | BankError::InvalidMarks { .. } => {
                ErrorCategory::Validation
            }
            BankError::DuplicateQuestion { .. } => ErrorCategory::Conflict,
            BankError::SubjectNotFound(_)
            | BankError::ModuleNotFound(_)
            | BankError::TopicNotFound(_)
            | BankError::QuestionNotFound(_) => ErrorCategory::NotFound,
            BankError::PermissionDenied { .. } => ErrorCategory::Permission,
            BankError::DatabaseError(_)
            | BankError::CsvError(_)
            | BankError::IoError(_)
            | BankError::SerializationError(_) => ErrorCategory::Storage,
            BankError::ConfigValidationError { .. }
            | BankError::InvalidConfigValueError { .. }
            | BankError::MissingConfigError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Validation
            | ErrorCategory::Conflict
            | ErrorCategory::NotFound
            | ErrorCategory::Permission => ErrorSeverity::Medium,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            BankError::EmptyText => "Provide non-blank question text".to_string(),
            BankError::InvalidEnum { allowed, .. } => format!("Use one of: {}", allowed),
            BankError::InvalidMarks { .. } => "Marks must be a whole number greater than zero".to_string(),
            BankError::DuplicateQuestion { .. } => {
                "Reword the question or add it to a different topic".to_string()
            }
            BankError::SubjectNotFound(_) => "Run `qbank subject list` to see valid subject ids".to_string(),
            BankError::ModuleNotFound(_) | BankError::TopicNotFound(_) => {
                "Create the parent module/topic first, or check the id".to_string()
            }
            BankError::QuestionNotFound(_) => "Check the question id with `qbank search`".to_string(),
            BankError::PermissionDenied { .. } => {
                "Only the question's author or an admin can change it".to_string()
            }
            BankError::DatabaseError(_) => {
                "Check that the database file is writable and not locked by another process".to_string()
            }
            BankError::CsvError(_) => {
                "Make sure the CSV has a header row with a question_text column".to_string()
            }
            BankError::IoError(_) => "Check file paths and permissions".to_string(),
            BankError::SerializationError(_) => "Output could not be encoded as JSON".to_string(),
            BankError::ConfigValidationError { field, .. }
            | BankError::InvalidConfigValueError { field, .. } => {
                format!("Fix `{}` in the configuration file", field)
            }
            BankError::MissingConfigError { field } => {
                format!("Provide `{}` on the command line or in the configuration file", field)
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Validation => format!("The question was rejected: {}", self),
            ErrorCategory::Conflict => format!("Nothing was added: {}", self),
            ErrorCategory::NotFound => self.to_string(),
            ErrorCategory::Permission => format!("Permission denied: {}", self),
            ErrorCategory::Storage => format!("Storage failure: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, BankError>;
