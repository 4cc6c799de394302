use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::core::validate::parse_marks;
use crate::domain::model::{
    Actor, CognitiveLevel, Difficulty, QuestionDraft, QuestionFields, QuestionFilter, QuotaMap,
    Role, SubjectId, UserId,
};
use crate::utils::error::{BankError, Result};

use super::toml_config::BankConfig;

#[derive(Debug, Clone, Parser)]
#[command(name = "qbank")]
#[command(about = "Question bank and exam paper generator")]
pub struct Cli {
    #[arg(long, global = true, default_value = "qbank.toml", help = "Configuration file")]
    pub config: PathBuf,

    #[arg(long, global = true, help = "SQLite database, overrides [database] path")]
    pub db: Option<String>,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Acting user id, required for question commands")]
    pub user: Option<i64>,

    #[arg(long, global = true, value_enum, default_value = "faculty")]
    pub role: RoleArg,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    Admin,
    Faculty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DifficultyArg {
    Easy,
    Medium,
    Hard,
}

impl From<DifficultyArg> for Difficulty {
    fn from(arg: DifficultyArg) -> Self {
        match arg {
            DifficultyArg::Easy => Difficulty::Easy,
            DifficultyArg::Medium => Difficulty::Medium,
            DifficultyArg::Hard => Difficulty::Hard,
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create the database schema
    Init,
    #[command(subcommand)]
    Subject(SubjectCommand),
    #[command(subcommand)]
    Module(ModuleCommand),
    #[command(subcommand)]
    Topic(TopicCommand),
    #[command(subcommand)]
    Question(QuestionCommand),
    /// Bulk import questions from a CSV file
    Import {
        file: PathBuf,
        #[arg(long, help = "Topic imported rows are attached to")]
        topic: Option<i64>,
    },
    /// Export questions to a CSV file
    Export {
        file: PathBuf,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Draw a question paper for one subject
    Generate(GenerateArgs),
    /// List questions matching a filter
    Search(FilterArgs),
    /// Print bank totals
    Stats,
}

#[derive(Debug, Clone, Subcommand)]
pub enum SubjectCommand {
    Add { code: String, name: String },
    List,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ModuleCommand {
    Add {
        #[arg(long)]
        subject: i64,
        #[arg(long)]
        number: i64,
        title: String,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum TopicCommand {
    Add {
        #[arg(long)]
        module: i64,
        name: String,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum QuestionCommand {
    Add {
        #[arg(long)]
        topic: i64,
        #[command(flatten)]
        fields: QuestionArgs,
    },
    Update {
        id: i64,
        #[command(flatten)]
        fields: QuestionArgs,
    },
    Delete {
        id: i64,
    },
}

/// Question content as typed on the command line. On add, unset marks,
/// difficulty and cognitive level take the bank defaults. On update, unset
/// fields keep their stored value.
#[derive(Debug, Clone, Args)]
pub struct QuestionArgs {
    #[arg(long)]
    pub text: Option<String>,
    #[arg(long)]
    pub marks: Option<String>,
    #[arg(long)]
    pub difficulty: Option<String>,
    #[arg(long)]
    pub cognitive_level: Option<String>,
    #[arg(long)]
    pub co: Option<String>,
    #[arg(long)]
    pub po: Option<String>,
}

impl From<QuestionArgs> for QuestionDraft {
    fn from(args: QuestionArgs) -> Self {
        QuestionDraft {
            text: args.text.unwrap_or_default(),
            marks: args.marks,
            difficulty: args.difficulty,
            cognitive_level: args.cognitive_level,
            co: args.co,
            po: args.po,
        }
    }
}

impl QuestionArgs {
    pub fn apply_to(self, mut fields: QuestionFields) -> Result<QuestionFields> {
        if let Some(text) = self.text {
            fields.text = text;
        }
        if let Some(marks) = self.marks {
            fields.marks = parse_marks(&marks)?;
        }
        if let Some(difficulty) = self.difficulty {
            fields.difficulty = difficulty.parse::<Difficulty>()?;
        }
        if let Some(level) = self.cognitive_level {
            fields.cognitive_level = level.parse::<CognitiveLevel>()?;
        }
        if self.co.is_some() {
            fields.co = self.co;
        }
        if self.po.is_some() {
            fields.po = self.po;
        }
        Ok(fields)
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    #[arg(long)]
    pub subject: Option<i64>,
    #[arg(long)]
    pub module: Option<i64>,
    #[arg(long, value_enum)]
    pub difficulty: Option<DifficultyArg>,
}

impl From<&FilterArgs> for QuestionFilter {
    fn from(args: &FilterArgs) -> Self {
        QuestionFilter {
            subject_id: args.subject.map(SubjectId),
            module_no: args.module,
            difficulty: args.difficulty.map(Difficulty::from),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct GenerateArgs {
    #[arg(long)]
    pub subject: i64,
    #[arg(long, allow_negative_numbers = true)]
    pub easy: Option<i64>,
    #[arg(long, allow_negative_numbers = true)]
    pub medium: Option<i64>,
    #[arg(long, allow_negative_numbers = true)]
    pub hard: Option<i64>,
    #[arg(long)]
    pub exam_type: Option<String>,
    #[arg(long, help = "Output directory or .json file for the paper")]
    pub out: Option<PathBuf>,
}

impl GenerateArgs {
    /// Flags override the `[paper]` counts from the config file.
    pub fn quotas(&self, config: &BankConfig) -> QuotaMap {
        let mut quotas = config.default_quotas();
        let overrides = [
            (Difficulty::Easy, self.easy),
            (Difficulty::Medium, self.medium),
            (Difficulty::Hard, self.hard),
        ];
        for (difficulty, count) in overrides {
            if let Some(count) = count {
                quotas.set(difficulty, count);
            }
        }
        quotas
    }

    pub fn exam_type<'a>(&'a self, config: &'a BankConfig) -> &'a str {
        self.exam_type.as_deref().unwrap_or(&config.paper.exam_type)
    }
}

impl Cli {
    /// The acting user. Admin rights must be asked for with `--role admin`.
    pub fn actor(&self) -> Result<Actor> {
        let user = self.user.ok_or_else(|| BankError::MissingConfigError {
            field: "--user".into(),
        })?;
        Ok(Actor {
            user_id: UserId(user),
            role: match self.role {
                RoleArg::Admin => Role::Admin,
                RoleArg::Faculty => Role::Faculty,
            },
        })
    }

    /// Applies command-line overrides on top of the loaded file.
    pub fn apply_overrides(&self, config: &mut BankConfig) {
        if let Some(db) = &self.db {
            config.database.path = db.clone();
        }
        if let Command::Import { topic: Some(topic), .. } = &self.command {
            config.import.fallback_topic = *topic;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_flags_override_config() {
        let cli = Cli::parse_from([
            "qbank", "--db", "exam.db", "generate", "--subject", "3", "--hard", "0", "--easy", "-1",
        ]);
        let mut config = BankConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.database.path, "exam.db");

        let Command::Generate(args) = &cli.command else {
            panic!("expected generate");
        };
        let quotas: Vec<_> = args.quotas(&config).iter().collect();
        assert_eq!(
            quotas,
            vec![(Difficulty::Easy, -1), (Difficulty::Medium, 3), (Difficulty::Hard, 0)]
        );
        assert_eq!(args.exam_type(&config), "Internal");
    }

    #[test]
    fn test_actor_from_flags() {
        let cli = Cli::parse_from(["qbank", "--user", "42", "--role", "faculty", "stats"]);
        let actor = cli.actor().unwrap();
        assert_eq!(actor.user_id, UserId(42));
        assert_eq!(actor.role, Role::Faculty);

        let cli = Cli::parse_from(["qbank", "--user", "1", "--role", "admin", "stats"]);
        assert_eq!(cli.actor().unwrap().role, Role::Admin);
    }

    #[test]
    fn test_actor_defaults_to_faculty() {
        let cli = Cli::parse_from(["qbank", "question", "delete", "5", "--user", "7"]);
        let actor = cli.actor().unwrap();
        assert_eq!(actor.user_id, UserId(7));
        assert_eq!(actor.role, Role::Faculty);
    }

    #[test]
    fn test_actor_requires_user() {
        let cli = Cli::parse_from(["qbank", "question", "delete", "5"]);
        assert!(matches!(
            cli.actor(),
            Err(BankError::MissingConfigError { field }) if field == "--user"
        ));
    }

    #[test]
    fn test_question_add_builds_draft() {
        let cli = Cli::parse_from([
            "qbank", "question", "add", "--topic", "2", "--text", "What is DNS?", "--marks", "4",
        ]);
        let Command::Question(QuestionCommand::Add { topic, fields }) = cli.command else {
            panic!("expected question add");
        };
        let draft = QuestionDraft::from(fields);
        assert_eq!(topic, 2);
        assert_eq!(draft.text, "What is DNS?");
        assert_eq!(draft.marks.as_deref(), Some("4"));
        assert_eq!(draft.difficulty, None);
    }

    #[test]
    fn test_update_keeps_unset_fields() {
        let cli = Cli::parse_from([
            "qbank", "question", "update", "5", "--difficulty", "hard", "--co", "CO3",
        ]);
        let Command::Question(QuestionCommand::Update { id, fields }) = cli.command else {
            panic!("expected question update");
        };
        assert_eq!(id, 5);

        let current = QuestionFields {
            text: "Explain ARP.".into(),
            marks: 4,
            difficulty: Difficulty::Easy,
            cognitive_level: CognitiveLevel::Remember,
            co: None,
            po: Some("PO1".into()),
        };
        let merged = fields.apply_to(current).unwrap();
        assert_eq!(merged.text, "Explain ARP.");
        assert_eq!(merged.marks, 4);
        assert_eq!(merged.difficulty, Difficulty::Hard);
        assert_eq!(merged.co.as_deref(), Some("CO3"));
        assert_eq!(merged.po.as_deref(), Some("PO1"));
    }

    #[test]
    fn test_update_rejects_bad_marks() {
        let args = QuestionArgs {
            text: None,
            marks: Some("2.5".into()),
            difficulty: None,
            cognitive_level: None,
            co: None,
            po: None,
        };
        let current = QuestionFields {
            text: "Q".into(),
            marks: 2,
            difficulty: Difficulty::Medium,
            cognitive_level: CognitiveLevel::Understand,
            co: None,
            po: None,
        };
        assert!(args.apply_to(current).is_err());
    }

    #[test]
    fn test_import_topic_override() {
        let cli = Cli::parse_from(["qbank", "import", "rows.csv", "--topic", "9"]);
        let mut config = BankConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.import.fallback_topic, 9);
    }
}
