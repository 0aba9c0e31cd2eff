use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use atc_core::model::Statistics;
use services::speech::spawn_transcription;
use services::{Announcer, AppServices, AudioClip, Clock, LogAnnouncer, TrainingHandle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidSeed { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidSeed { raw } => write!(f, "invalid --seed value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
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
    seed: Option<u64>,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- train       [--db <sqlite_url>] [--seed <u64>]");
    eprintln!("  cargo run -p app -- stats       [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- reset-stats [--db <sqlite_url>]");
    eprintln!();
    eprintln!("While training, each stdin line is a pilot transmission.");
    eprintln!("  /status        print the current snapshot as JSON");
    eprintln!("  /audio <file>  transcribe a recording and submit it");
    eprintln!("  /end           end the session");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:atc-training.sqlite3");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  ATC_DB_URL, ATC_SEED, ATC_STT_URL, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Train,
    Stats,
    ResetStats,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "train" => Some(Self::Train),
            "stats" => Some(Self::Stats),
            "reset-stats" => Some(Self::ResetStats),
            _ => None,
        }
    }
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("ATC_DB_URL")
            .ok()
            .map_or_else(|| normalize_sqlite_url("sqlite:atc-training.sqlite3".into()), normalize_sqlite_url);
        let mut seed = std::env::var("ATC_SEED")
            .ok()
            .and_then(|value| value.parse::<u64>().ok());

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--seed" => {
                    let value = require_value(args, "--seed")?;
                    let parsed: u64 = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidSeed { raw: value.clone() })?;
                    seed = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self { db_url, seed })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
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

/// Prints announcements to stdout, standing in for a speaker.
struct ConsoleAnnouncer;

#[async_trait]
impl Announcer for ConsoleAnnouncer {
    async fn announce(&self, text: &str) {
        println!("ATC > {text}");
    }
}

fn print_statistics(stats: &Statistics) {
    println!("sessions completed : {}", stats.sessions_completed);
    println!("total score        : {}", stats.total_score);
    println!("accuracy           : {}%", stats.accuracy);
    println!("avg response time  : {:.1}s", stats.avg_response_time_secs);
    for record in &stats.recent_sessions {
        println!(
            "  {}  score {:>4}  accuracy {:>3}%  completed {}",
            record.date.format("%Y-%m-%d %H:%M"),
            record.score,
            record.accuracy,
            record.commands_completed
        );
    }
}

async fn train(app: &AppServices) -> Result<(), Box<dyn std::error::Error>> {
    let training = app.training();
    training.start_session().await?;
    println!("Session started. Read back each instruction; /end to finish.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "/end" => break,
            "/status" => {
                let snapshot = training.snapshot().await?;
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            }
            _ if line.starts_with("/audio") => {
                let path = line.trim_start_matches("/audio").trim();
                let bytes = tokio::fs::read(path).await?;
                let transcript = spawn_transcription(app.transcriber(), AudioClip::webm(bytes)).await?;
                match transcript {
                    Ok(text) => {
                        println!("PILOT (transcribed) > {text}");
                        submit(&training, &text).await?;
                    }
                    Err(err) => eprintln!("transcription failed: {err}"),
                }
            }
            _ => submit(&training, line).await?,
        }
    }

    let snapshot = training.end_session().await?;
    let session = &snapshot.session;
    println!(
        "Session ended: score {}, {}/{} correct.",
        session.score(),
        session.correct_responses(),
        session.commands_issued()
    );
    print_statistics(&snapshot.statistics);
    Ok(())
}

async fn submit(training: &TrainingHandle, transcript: &str) -> Result<(), Box<dyn std::error::Error>> {
    match training.submit_response(transcript).await? {
        Some(feedback) => println!("{}", feedback.message),
        None => println!("(no instruction outstanding)"),
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Train,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Train,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let parsed = Args::parse(&mut argv.into_iter()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    prepare_sqlite_file(&parsed.db_url)?;
    let announcer: Arc<dyn Announcer> = match cmd {
        Command::Train => Arc::new(ConsoleAnnouncer),
        Command::Stats | Command::ResetStats => Arc::new(LogAnnouncer),
    };
    let app = AppServices::new_sqlite(&parsed.db_url, Clock::system(), parsed.seed, announcer).await?;

    match cmd {
        Command::Train => train(&app).await?,
        Command::Stats => {
            let stats = app.statistics().load_or_default().await;
            print_statistics(&stats);
        }
        Command::ResetStats => {
            app.training().reset_statistics().await?;
            println!("Statistics reset.");
        }
    }

    app.shutdown().await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, ArgsError> {
        Args::parse(&mut args.iter().map(|s| (*s).to_string()))
    }

    #[test]
    fn seed_and_db_flags_parse() {
        let args = parse(&["--db", "sqlite::memory:", "--seed", "42"]).unwrap();
        assert_eq!(args.db_url, "sqlite::memory:");
        assert_eq!(args.seed, Some(42));
    }

    #[test]
    fn bad_flags_are_reported() {
        assert!(matches!(parse(&["--seed", "abc"]), Err(ArgsError::InvalidSeed { .. })));
        assert!(matches!(parse(&["--db"]), Err(ArgsError::MissingValue { flag: "--db" })));
        assert!(matches!(parse(&["--bogus"]), Err(ArgsError::UnknownArg(_))));
    }

    #[test]
    fn relative_paths_become_absolute_urls() {
        let url = normalize_sqlite_url("sqlite:data/atc.sqlite3".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/atc.sqlite3"));
    }

    #[test]
    fn subcommands_are_recognised() {
        assert_eq!(Command::from_arg("train"), Some(Command::Train));
        assert_eq!(Command::from_arg("reset-stats"), Some(Command::ResetStats));
        assert_eq!(Command::from_arg("ui"), None);
    }
}
