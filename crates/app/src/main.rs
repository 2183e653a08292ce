use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use prep_core::model::{
    CognitiveLevel, ContentState, Difficulty, ExamId, ExamProfile, ExamProfileDraft, Objective,
    SessionId, StudyItem, StudyMode, StudySessionConfig,
};
use services::{ActiveStudy, Catalog, Clock, ItemKind, StudyHost, TemplateGenerator};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod learner;

use learner::SimulatedLearner;

/// Prep sessions never end on their own; stop after this many items.
const DEFAULT_PREP_ITEMS: u32 = 20;

/// With flashcards enabled, every n-th item is a flashcard.
const FLASHCARD_EVERY: u32 = 4;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidMode { raw: String },
    InvalidNumber { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
    InvalidSessionId { raw: String },
    ResumeNeedsDb,
    NoExams,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidMode { raw } => {
                write!(f, "invalid --mode value: {raw} (expected prep, efficient or mock)")
            }
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidSessionId { raw } => write!(f, "invalid --resume value: {raw}"),
            ArgsError::ResumeNeedsDb => write!(f, "--resume needs --db to load the session from"),
            ArgsError::NoExams => write!(f, "catalog defines no exams"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_number<T: std::str::FromStr>(raw: String, flag: &'static str) -> Result<T, ArgsError> {
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw })
}

struct Args {
    catalog: Option<PathBuf>,
    exam: Option<ExamId>,
    mode: StudyMode,
    questions: Option<u32>,
    db: Option<DbTarget>,
    seed: u64,
    flashcards: bool,
    resume: Option<SessionId>,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [--catalog <path>] [--exam <id>] [--mode <prep|efficient|mock>]");
    eprintln!("                      [--questions <n>] [--db <sqlite_url>] [--seed <n>]");
    eprintln!("                      [--flashcards] [--resume <session-id>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  built-in demo exam, --mode efficient, in-memory storage, --seed 42");
    eprintln!("  prep sessions stop after --questions items (default {DEFAULT_PREP_ITEMS})");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  PREP_CATALOG, PREP_DB_URL, RUST_LOG");
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            catalog: std::env::var_os("PREP_CATALOG").map(PathBuf::from),
            exam: None,
            mode: StudyMode::Efficient,
            questions: None,
            db: std::env::var("PREP_DB_URL")
                .ok()
                .map(|raw| DbTarget::parse(&raw))
                .transpose()?,
            seed: 42,
            flashcards: false,
            resume: None,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--catalog" => parsed.catalog = Some(require_value(args, "--catalog")?.into()),
                "--exam" => parsed.exam = Some(ExamId::new(require_value(args, "--exam")?)),
                "--mode" => {
                    let value = require_value(args, "--mode")?;
                    parsed.mode = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidMode { raw: value.clone() })?;
                }
                "--questions" => {
                    let value = require_value(args, "--questions")?;
                    parsed.questions = Some(parse_number(value, "--questions")?);
                }
                "--db" => {
                    let value = require_value(args, "--db")?;
                    parsed.db = Some(DbTarget::parse(&value)?);
                }
                "--seed" => {
                    let value = require_value(args, "--seed")?;
                    parsed.seed = parse_number(value, "--seed")?;
                }
                "--flashcards" => parsed.flashcards = true,
                "--resume" => {
                    let value = require_value(args, "--resume")?;
                    let id = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidSessionId { raw: value.clone() })?;
                    parsed.resume = Some(id);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        if parsed.resume.is_some() && parsed.db.is_none() {
            return Err(ArgsError::ResumeNeedsDb);
        }
        Ok(parsed)
    }

    fn session_config(&self) -> StudySessionConfig {
        let mut config = StudySessionConfig::new(self.mode);
        if self.mode == StudyMode::Efficient
            && let Some(n) = self.questions
        {
            config = config.with_target_questions(n);
        }
        config.spaced_repetition = self.flashcards;
        config
    }
}

/// Where sessions are persisted when `--db` is given.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DbTarget {
    /// `sqlite::memory:` or a `sqlite:file:` URI; passed through untouched.
    Uri(String),
    /// A database file, resolved against the working directory.
    File(PathBuf),
}

impl DbTarget {
    fn parse(raw: &str) -> Result<Self, ArgsError> {
        let trimmed = raw.trim();
        let invalid = || ArgsError::InvalidDbUrl {
            raw: raw.to_owned(),
        };
        if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite:file:") {
            return Ok(Self::Uri(trimmed.to_owned()));
        }

        let path = trimmed
            .strip_prefix("sqlite://")
            .or_else(|| trimmed.strip_prefix("sqlite:"))
            .unwrap_or(trimmed);
        let path = path.split('?').next().unwrap_or_default();
        if path.is_empty() {
            return Err(invalid());
        }
        let path = PathBuf::from(path);
        if path.is_absolute() {
            return Ok(Self::File(path));
        }
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Ok(Self::File(cwd.join(path)))
    }

    /// Connection URL; file targets are created on first open.
    fn url(&self) -> String {
        match self {
            Self::Uri(uri) => uri.clone(),
            Self::File(path) => format!("sqlite://{}?mode=rwc", path.display()),
        }
    }

    fn ensure_parent_dir(&self) -> std::io::Result<()> {
        match self {
            Self::File(path) => match path.parent() {
                Some(parent) => std::fs::create_dir_all(parent),
                None => Ok(()),
            },
            Self::Uri(_) => Ok(()),
        }
    }
}

/// Small four-objective exam used when no catalog is given.
fn demo_profile() -> Result<ExamProfile, Box<dyn std::error::Error>> {
    let mut draft = ExamProfileDraft::new(
        "cloud-foundations",
        "Cloud Foundations (demo)",
        vec![
            Objective::new("1.1", 34.0, CognitiveLevel::Knowledge)
                .with_title("Cloud concepts")
                .with_difficulty(Difficulty::Beginner),
            Objective::new("2.1", 30.0, CognitiveLevel::Application)
                .with_title("Security and compliance"),
            Objective::new("3.1", 26.0, CognitiveLevel::Application)
                .with_title("Core services"),
            Objective::new("4.1", 10.0, CognitiveLevel::Synthesis)
                .with_title("Billing and pricing")
                .with_difficulty(Difficulty::Advanced),
        ],
        65,
        90,
    );
    draft.provider = "Demo".into();
    Ok(draft.validate()?)
}

fn load_catalog(path: Option<&PathBuf>) -> Result<Catalog, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(Catalog::load_from_path(path)?),
        None => Ok(Catalog::single(demo_profile()?)),
    }
}

fn select_profile(
    catalog: &Catalog,
    exam: Option<&ExamId>,
) -> Result<Arc<ExamProfile>, Box<dyn std::error::Error>> {
    match exam {
        Some(id) => Ok(catalog.profile(id)?),
        None => catalog
            .profiles()
            .first()
            .cloned()
            .ok_or_else(|| ArgsError::NoExams.into()),
    }
}

async fn simulate(
    host: &StudyHost,
    active: &mut ActiveStudy,
    learner: &mut SimulatedLearner,
    max_items: u32,
) -> Result<u32, Box<dyn std::error::Error>> {
    let study = host.study();
    let spaced = active.session().config.spaced_repetition;
    let mut items = 0;

    while items < max_items {
        let Some(request) = study.next_request(active) else {
            break;
        };
        let kind = if spaced && items % FLASHCARD_EVERY == FLASHCARD_EVERY - 1 {
            ItemKind::Flashcard
        } else {
            ItemKind::Question
        };
        let state = study.generate(active, &request, kind).await?;
        let secs = learner.think_time();

        let result = match state {
            ContentState::Question {
                item: StudyItem::Question(question),
            } => {
                let pick = learner.choose(
                    &question.objective_id,
                    question.correct_index,
                    question.options.len(),
                );
                study.answer_question(active, pick, secs).await?
            }
            ContentState::Question {
                item: StudyItem::Flashcard(card),
            } => {
                let rating = learner.rate_flashcard(&card.objective_id);
                study.answer_flashcard(active, rating, secs).await?
            }
            other => {
                warn!(?other, "generator left nothing to answer");
                break;
            }
        };
        items += 1;

        if result.break_started {
            info!(answered = active.session().total_questions_answered, "break taken");
            study.end_break(active);
        }
        if result.is_complete {
            break;
        }
    }
    Ok(items)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let args = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let catalog = load_catalog(args.catalog.as_ref())?;
    let profile = select_profile(&catalog, args.exam.as_ref())?;
    let clock = Clock::system();
    let generator = Arc::new(TemplateGenerator);

    let host = match &args.db {
        Some(target) => {
            target.ensure_parent_dir()?;
            StudyHost::new_sqlite(&target.url(), catalog, clock, generator).await?
        }
        None => StudyHost::in_memory(catalog, clock, generator),
    };
    let study = host.study();

    let mut active = match args.resume {
        Some(id) => study.resume(id, Arc::clone(&profile)).await?,
        None => study.start(Arc::clone(&profile), args.session_config()).await?,
    };
    let max_items = match active.session().mode() {
        StudyMode::Prep => args.questions.unwrap_or(DEFAULT_PREP_ITEMS),
        StudyMode::Efficient | StudyMode::Mock => u32::MAX,
    };

    let mut learner = SimulatedLearner::new(args.seed);
    let items = simulate(&host, &mut active, &mut learner, max_items).await?;
    if !active.session().is_complete() {
        study.finish(&mut active).await?;
    }
    info!(session = %active.session().id, items, "simulation finished");

    let prediction = study.prediction(&active);
    let report = serde_json::json!({
        "session_id": active.session().id.to_string(),
        "exam": profile.id().to_string(),
        "mode": active.session().mode(),
        "progress": study.progress(&active),
        "passing": prediction.is_passing(&profile),
        "margin": prediction.margin(),
        "prediction": prediction,
        "style_health": study.style_health(&active),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    let swept = host.sweep_styles();
    if swept > 0 {
        info!(swept, "idle style counters dropped");
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_and_uri_targets_pass_through() {
        assert_eq!(
            DbTarget::parse("sqlite::memory:").unwrap().url(),
            "sqlite::memory:"
        );
        let uri = "sqlite:file:demo?mode=memory&cache=shared";
        assert_eq!(DbTarget::parse(uri).unwrap(), DbTarget::Uri(uri.into()));
    }

    #[test]
    fn file_targets_resolve_to_absolute_paths() {
        let target = DbTarget::parse("sqlite:/tmp/prep/sessions.db").unwrap();
        assert_eq!(target, DbTarget::File(PathBuf::from("/tmp/prep/sessions.db")));
        assert_eq!(target.url(), "sqlite:///tmp/prep/sessions.db?mode=rwc");

        let DbTarget::File(path) = DbTarget::parse("data/sessions.db").unwrap() else {
            panic!("expected a file target");
        };
        assert!(path.is_absolute());
        assert!(path.ends_with("data/sessions.db"));
    }

    #[test]
    fn empty_targets_are_rejected() {
        assert!(DbTarget::parse("  ").is_err());
        assert!(DbTarget::parse("sqlite://").is_err());
    }

    #[test]
    fn efficient_config_takes_question_target() {
        let mut argv = ["--mode", "efficient", "--questions", "12", "--flashcards"]
            .into_iter()
            .map(String::from);
        let args = Args::parse(&mut argv).unwrap();
        let config = args.session_config();
        assert_eq!(config.target_questions, Some(12));
        assert!(config.spaced_repetition);
    }
}
