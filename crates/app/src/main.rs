use std::fmt;

use mastery_core::{DEFAULT_LANGUAGE, TopicState};
use mastery_services::{AppServices, Archive, ProblemRecord, TopicRecord, UserRecord};
use mastery_storage::repository::Storage;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    MissingUser,
    MissingEditorAction,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::MissingUser => write!(f, "--user <username> is required"),
            ArgsError::MissingEditorAction => {
                write!(f, "editor requires exactly one of --grant or --revoke")
            }
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

struct Args {
    db_url: String,
    file: Option<String>,
    username: Option<String>,
    overwrite: bool,
    grant: bool,
    revoke: bool,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            db_url: std::env::var("MASTERY_DB_URL")
                .ok()
                .map_or_else(|| "sqlite://mastery.sqlite3".into(), normalize_sqlite_url),
            file: None,
            username: None,
            overwrite: false,
            grant: false,
            revoke: false,
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = normalize_sqlite_url(value);
                }
                "--file" => {
                    parsed.file = Some(require_value(args, "--file")?);
                }
                "--user" => {
                    parsed.username = Some(require_value(args, "--user")?);
                }
                "--overwrite" => parsed.overwrite = true,
                "--grant" => parsed.grant = true,
                "--revoke" => parsed.revoke = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }

    fn require_user(&self) -> Result<&str, ArgsError> {
        self.username.as_deref().ok_or(ArgsError::MissingUser)
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p mastery -- seed         [--db <sqlite_url>]");
    eprintln!("  cargo run -p mastery -- export       [--db <sqlite_url>] [--file <path>]");
    eprintln!("  cargo run -p mastery -- import       [--db <sqlite_url>] [--file <path>]");
    eprintln!("  cargo run -p mastery -- export-users [--db <sqlite_url>] [--file <path>]");
    eprintln!(
        "  cargo run -p mastery -- import-users [--db <sqlite_url>] [--file <path>] [--overwrite]"
    );
    eprintln!("  cargo run -p mastery -- progress     --user <username> [--db <sqlite_url>]");
    eprintln!(
        "  cargo run -p mastery -- editor       --user <username> --grant|--revoke [--db <sqlite_url>]"
    );
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:mastery.sqlite3");
    eprintln!("  --file mastery-export.json for JSON, users.csv for CSV");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  MASTERY_DB_URL");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Seed,
    Export,
    Import,
    ExportUsers,
    ImportUsers,
    Progress,
    Editor,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "seed" => Some(Self::Seed),
            "export" => Some(Self::Export),
            "import" => Some(Self::Import),
            "export-users" => Some(Self::ExportUsers),
            "import-users" => Some(Self::ImportUsers),
            "progress" => Some(Self::Progress),
            "editor" => Some(Self::Editor),
            _ => None,
        }
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    // Bare paths and sqlite:%s forms become absolute sqlite:// URLs.
    // join() keeps a path that is already absolute as-is.
    let trimmed = raw.trim();
    let path = std::path::Path::new(trimmed.strip_prefix("sqlite:").unwrap_or(trimmed));
    let absolute = std::env::current_dir()
        .unwrap_or_else(|_| std::path::PathBuf::from("."))
        .join(path);
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = match db_url.strip_prefix("sqlite://") {
        Some(rest) => rest.split('?').next().unwrap_or(rest),
        None => {
            return Err(ArgsError::InvalidDbUrl {
                raw: db_url.to_string(),
            }
            .into());
        }
    };
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

const DEMO_USERS: &[(&str, &str, bool)] = &[("edna", "edna", true), ("sam", "sam", false)];

const DEMO_TOPICS: &[(&str, &str, &str, &[&str])] = &[
    ("addition", "Addition", "Adding whole numbers.", &[]),
    (
        "subtraction",
        "Subtraction",
        "Taking one number away from another.",
        &["addition"],
    ),
    (
        "multiplication",
        "Multiplication",
        "Adding the same number many times.",
        &["addition"],
    ),
    (
        "division",
        "Division",
        "Splitting a number into equal parts.",
        &["subtraction", "multiplication"],
    ),
];

const DEMO_PROBLEMS: &[(&str, &str, &str, &[&str])] = &[
    ("addition-1", "addition", "3 + 4 = ?", &["7", "6", "8", "12"]),
    ("addition-2", "addition", "12 + 9 = ?", &["21", "20", "22", "3"]),
    ("subtraction-1", "subtraction", "9 - 5 = ?", &["4", "5", "3", "14"]),
    ("subtraction-2", "subtraction", "23 - 8 = ?", &["15", "16", "14", "31"]),
    ("multiplication-1", "multiplication", "6 * 7 = ?", &["42", "36", "48", "13"]),
    ("multiplication-2", "multiplication", "8 * 9 = ?", &["72", "64", "81", "17"]),
    ("division-1", "division", "36 / 6 = ?", &["6", "5", "7", "30"]),
    ("division-2", "division", "45 / 9 = ?", &["5", "4", "6", "36"]),
];

/// A small arithmetic curriculum, written through the regular import path
/// so seeding exercises the same code as a real transfer. Ids are stable,
/// so running seed twice updates rows instead of duplicating them.
fn demo_archive() -> Archive {
    let users = DEMO_USERS
        .iter()
        .map(|(username, password, is_editor)| UserRecord {
            id: None,
            username: (*username).to_owned(),
            email: None,
            password: (*password).to_owned(),
            language: DEFAULT_LANGUAGE.to_owned(),
            is_student: true,
            is_teacher: false,
            is_editor: *is_editor,
        })
        .collect();

    let topics = DEMO_TOPICS
        .iter()
        .map(|(id, title, description, prerequisites)| TopicRecord {
            id: (*id).to_owned(),
            title: (*title).to_owned(),
            description: (*description).to_owned(),
            prerequisites: prerequisites.iter().map(|p| (*p).to_owned()).collect(),
        })
        .collect();

    let problems = DEMO_PROBLEMS
        .iter()
        .map(|(id, topic_id, text, solutions)| ProblemRecord {
            id: (*id).to_owned(),
            topic_id: (*topic_id).to_owned(),
            text: (*text).to_owned(),
            solutions: solutions.iter().map(|s| (*s).to_owned()).collect(),
        })
        .collect();

    Archive {
        users,
        topics,
        problems,
        scores: Vec::new(),
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None | Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    argv.remove(0);

    let mut iter = argv.into_iter();
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite before dispatching, so every subcommand starts
    // from a ready store. The binary holds the raw storage handle as well:
    // username lookup for `progress` has no business in the service layer.
    log::info!("using database {}", parsed.db_url);
    prepare_sqlite_file(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url).await?;
    let services = AppServices::from_storage(&storage);

    match cmd {
        Command::Seed => {
            let counts = services.transfer().import_archive(demo_archive()).await?;
            println!(
                "Seeded {} users, {} topics and {} problems into {}",
                counts.users, counts.topics, counts.problems, parsed.db_url
            );
            Ok(())
        }
        Command::Export => {
            let path = parsed.file.unwrap_or_else(|| "mastery-export.json".into());
            let json = services.transfer().export_json().await?;
            std::fs::write(&path, json)?;
            println!("Exported the catalogue to {path}");
            Ok(())
        }
        Command::Import => {
            let path = parsed.file.unwrap_or_else(|| "mastery-export.json".into());
            let data = std::fs::read_to_string(&path)?;
            let counts = services.transfer().import_json(&data).await?;
            println!(
                "Imported {} users, {} topics, {} problems and {} scores from {path}",
                counts.users, counts.topics, counts.problems, counts.scores
            );
            Ok(())
        }
        Command::ExportUsers => {
            let path = parsed.file.unwrap_or_else(|| "users.csv".into());
            let data = services.transfer().export_users_csv().await?;
            std::fs::write(&path, data)?;
            println!("Exported user credentials to {path}");
            Ok(())
        }
        Command::ImportUsers => {
            let path = parsed.file.unwrap_or_else(|| "users.csv".into());
            let data = std::fs::read_to_string(&path)?;
            let counts = services
                .transfer()
                .import_users_csv(&data, parsed.overwrite)
                .await?;
            println!("Imported {} users from {path}", counts.users);
            Ok(())
        }
        Command::Progress => {
            let name = parsed.require_user()?;
            let user = match storage.users.find_by_username(name).await? {
                Some(user) => user,
                None => return Err(format!("no such user: {name}").into()),
            };

            let topics = services.topics().list_topics().await?;
            if topics.is_empty() {
                println!("The catalogue is empty; run `seed` or `import` first.");
                return Ok(());
            }
            let report = services.progress().report(user.id()).await?;

            println!("Progress for {}:", user.username());
            for topic in &topics {
                let marker = match report.snapshot.state_of(topic.id()) {
                    TopicState::Completed => "done",
                    TopicState::Active => "open",
                    TopicState::Inactive => "locked",
                };
                println!("  [{marker:>6}] {}", topic.title());
            }

            if !report.recommended.is_empty() {
                println!();
                println!("Recommended next:");
                for topic in &report.recommended {
                    println!("  {}", topic.title());
                }
            }

            if !report.top_active.is_empty() {
                println!();
                println!("Closest to mastery:");
                for entry in &report.top_active {
                    println!("  {:>3.0}%  {}", entry.fraction * 100.0, entry.topic.title());
                }
            }
            Ok(())
        }
        Command::Editor => {
            let name = parsed.require_user()?;
            let grant = match (parsed.grant, parsed.revoke) {
                (true, false) => true,
                (false, true) => false,
                _ => {
                    let err = ArgsError::MissingEditorAction;
                    eprintln!("{err}");
                    print_usage();
                    return Err(err.into());
                }
            };
            services.auth().set_editor(name, grant).await?;
            println!(
                "{} editor access for {name}",
                if grant { "Granted" } else { "Revoked" }
            );
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    pretty_env_logger::init();
    if let Err(err) = run().await {
        // Binary glue prints once and exits nonzero.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
