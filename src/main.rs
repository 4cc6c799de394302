use std::path::PathBuf;

use clap::Parser;
use qbank::adapters::{csv_feed, render::PaperDocument};
use qbank::config::cli::{
    Cli, Command, GenerateArgs, ModuleCommand, QuestionCommand, SubjectCommand, TopicCommand,
};
use qbank::core::{Catalog, QuestionStore};
use qbank::domain::model::{Actor, ModuleId, QuestionDraft, QuestionFilter, QuestionId, SubjectId, TopicId};
use qbank::utils::{logger, validation::Validate};
use qbank::{BankConfig, BankError, QuestionBank, Result, SelectionOutcome, SqliteStore};

fn main() {
    let cli = Cli::parse();

    let mut config = match BankConfig::load_or_default(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            logger::init_cli_logger(cli.verbose, None);
            exit_with(e);
        }
    };
    cli.apply_overrides(&mut config);

    // 初始化日誌
    match config.logging.format.as_str() {
        "json" => logger::init_json_logger(cli.verbose, Some(&config.logging.level)),
        _ => logger::init_cli_logger(cli.verbose, Some(&config.logging.level)),
    }

    tracing::info!("Starting qbank");
    if cli.verbose {
        tracing::debug!("Config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if let Err(e) = run(&cli, &config) {
        exit_with(e);
    }
}

fn exit_with(e: BankError) -> ! {
    tracing::error!(
        "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    std::process::exit(e.severity().exit_code());
}

fn open_bank(config: &BankConfig) -> Result<QuestionBank<SqliteStore>> {
    let store = SqliteStore::open(&config.database.path)?;
    Ok(QuestionBank::new(store)
        .with_match_policy(config.dedup.policy)
        .with_fallback_topic(config.fallback_topic()))
}

fn run(cli: &Cli, config: &BankConfig) -> Result<()> {
    let mut bank = open_bank(config)?;

    match &cli.command {
        Command::Init => {
            println!("✅ Database ready at {}", config.database.path);
        }
        Command::Subject(SubjectCommand::Add { code, name }) => {
            let subject = bank.store_mut().add_subject(code, name)?;
            println!("✅ Subject {} created: {} {}", subject.id, subject.code, subject.name);
        }
        Command::Subject(SubjectCommand::List) => {
            for subject in bank.store().subjects()? {
                println!("{}\t{}\t{}", subject.id, subject.code, subject.name);
            }
        }
        Command::Module(ModuleCommand::Add { subject, number, title }) => {
            let module = bank.store_mut().add_module(SubjectId(*subject), *number, title)?;
            println!("✅ Module {} created (no. {})", module.id, module.module_no);
        }
        Command::Topic(TopicCommand::Add { module, name }) => {
            let topic = bank.store_mut().add_topic(ModuleId(*module), name)?;
            println!("✅ Topic {} created: {}", topic.id, topic.name);
        }
        Command::Question(command) => run_question(&mut bank, &cli.actor()?, command)?,
        Command::Import { file, .. } => {
            let rows = csv_feed::read_import_file(file)?;
            let report = bank.import_rows(rows)?;
            println!(
                "✅ Imported {} question(s); skipped {} empty, {} duplicate",
                report.inserted, report.skipped_empty, report.skipped_duplicate
            );
            for (row, reason) in &report.rejected {
                println!("⚠️  Row {} rejected: {}", row, reason);
            }
        }
        Command::Export { file, filter } => {
            let questions = bank.search(&QuestionFilter::from(filter))?;
            csv_feed::write_export_file(file, &questions)?;
            println!("📁 Exported {} question(s) to {}", questions.len(), file.display());
        }
        Command::Generate(args) => generate(&bank, config, args)?,
        Command::Search(filter) => {
            for placed in bank.search(&QuestionFilter::from(filter))? {
                let q = &placed.question;
                println!(
                    "{}\t{}\tM{}\t{}\t{}\t{}\t{}",
                    q.id,
                    placed.placement.subject_code,
                    placed.placement.module_no,
                    placed.placement.topic_name,
                    q.difficulty,
                    q.marks,
                    q.text
                );
            }
        }
        Command::Stats => {
            let stats = bank.stats()?;
            println!("Subjects:  {}", stats.subjects);
            println!("Questions: {}", stats.questions);
            for (difficulty, count) in &stats.by_difficulty {
                println!("  {:<8} {}", difficulty.as_str(), count);
            }
            for (module_no, count) in &stats.by_module {
                println!("  Module {:<3} {}", module_no, count);
            }
        }
    }
    Ok(())
}

fn run_question(
    bank: &mut QuestionBank<SqliteStore>,
    actor: &Actor,
    command: &QuestionCommand,
) -> Result<()> {
    match command {
        QuestionCommand::Add { topic, fields } => {
            let draft = QuestionDraft::from(fields.clone());
            let question = bank.add_manual(TopicId(*topic), &draft, actor)?;
            println!("✅ Question {} added", question.id);
        }
        QuestionCommand::Update { id, fields } => {
            let id = QuestionId(*id);
            let current = bank
                .store()
                .get(id)?
                .ok_or(BankError::QuestionNotFound(id))?;
            let merged = fields.clone().apply_to(current.fields())?;
            bank.update_question(actor, id, merged)?;
            println!("✅ Question {} updated", id);
        }
        QuestionCommand::Delete { id } => {
            let id = QuestionId(*id);
            if bank.delete_question(actor, id)? {
                println!("✅ Question {} deleted", id);
            } else {
                println!("⚠️  Question {} not deleted (missing, or not yours)", id);
            }
        }
    }
    Ok(())
}

fn generate(bank: &QuestionBank<SqliteStore>, config: &BankConfig, args: &GenerateArgs) -> Result<()> {
    let subject_id = SubjectId(args.subject);
    let quotas = args.quotas(config);
    let selection = bank.generate_paper(subject_id, &quotas)?;

    let subject = match (selection.outcome, bank.store().subject(subject_id)?) {
        (SelectionOutcome::UnknownSubject, _) | (_, None) => {
            tracing::warn!("Subject {} does not exist, no paper generated", subject_id);
            return Err(BankError::SubjectNotFound(subject_id));
        }
        (_, Some(subject)) => subject,
    };

    for band in selection.bands.iter().filter(|b| b.shortfall() > 0) {
        println!(
            "⚠️  {}: requested {}, only {} available",
            band.difficulty, band.requested, band.available
        );
    }

    let document = PaperDocument::build(&subject, args.exam_type(config), &selection);
    let path = match &args.out {
        Some(out) if out.extension().is_some_and(|ext| ext == "json") => out.clone(),
        Some(dir) => dir.join(document.file_name()),
        None => PathBuf::from(document.file_name()),
    };
    document.write_json(&path)?;

    println!(
        "✅ Paper with {} question(s), {} marks",
        selection.len(),
        selection.total_marks()
    );
    println!("📁 Output saved to: {}", path.display());
    Ok(())
}
