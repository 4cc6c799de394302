use crate::adapters::render::DEFAULT_EXAM_TYPE;
use crate::domain::model::{Difficulty, MatchPolicy, QuotaMap, TopicId};
use crate::utils::error::{BankError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BankConfig {
    pub database: DatabaseConfig,
    pub import: ImportConfig,
    pub dedup: DedupConfig,
    pub paper: PaperConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "qbank.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Topic every bulk-imported question is attached to.
    pub fallback_topic: i64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self { fallback_topic: 1 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub policy: MatchPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperConfig {
    pub exam_type: String,
    pub easy: i64,
    pub medium: i64,
    pub hard: i64,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            exam_type: DEFAULT_EXAM_TYPE.to_string(),
            easy: 2,
            medium: 3,
            hard: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl BankConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(BankError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Loads `path` when it exists, defaults otherwise.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            tracing::debug!("Loading configuration from {}", path.as_ref().display());
            Self::from_file(path)
        } else {
            tracing::debug!(
                "No configuration at {}, using defaults",
                path.as_ref().display()
            );
            Ok(Self::default())
        }
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| BankError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${QBANK_DB})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;

        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| BankError::ConfigValidationError {
            field: "env_substitution".to_string(),
            message: e.to_string(),
        })?;

        Ok(re
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .to_string())
    }

    pub fn fallback_topic(&self) -> TopicId {
        TopicId(self.import.fallback_topic)
    }

    pub fn default_quotas(&self) -> QuotaMap {
        QuotaMap::new()
            .with(Difficulty::Easy, self.paper.easy)
            .with(Difficulty::Medium, self.paper.medium)
            .with(Difficulty::Hard, self.paper.hard)
    }
}

impl Validate for BankConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_path("database.path", &self.database.path)?;
        validation::validate_non_empty_string("paper.exam_type", &self.paper.exam_type)?;
        validation::validate_non_negative("paper.easy", self.paper.easy)?;
        validation::validate_non_negative("paper.medium", self.paper.medium)?;
        validation::validate_non_negative("paper.hard", self.paper.hard)?;
        validation::validate_one_of(
            "logging.level",
            &self.logging.level,
            &["trace", "debug", "info", "warn", "error"],
        )?;
        validation::validate_one_of("logging.format", &self.logging.format, &["compact", "json"])?;

        if self.import.fallback_topic <= 0 {
            return Err(BankError::InvalidConfigValueError {
                field: "import.fallback_topic".to_string(),
                value: self.import.fallback_topic.to_string(),
                reason: "Topic ids start at 1".to_string(),
            });
        }
        Ok(())
    }
}
