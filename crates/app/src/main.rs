use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use flashdeck_core::import::ImportCandidate;
use flashdeck_core::model::{CardId, Deck, DeckDraft, DeckId, Flashcard, Tag, UserId};
use services::{AppServices, CardService, SyncConfig};
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

const DEFAULT_DB_URL: &str = "sqlite://flashdeck.sqlite3";
const DEFAULT_USER: &str = "local";

#[derive(Debug, PartialEq, Eq)]
enum ArgsError {
    MissingValue {
        flag: &'static str,
    },
    MissingArg {
        command: &'static str,
        name: &'static str,
    },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidPosition {
        raw: String,
    },
    InvalidId {
        raw: String,
    },
    InvalidDbUrl {
        raw: String,
    },
    InvalidTag {
        raw: String,
        reason: String,
    },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArg { command, name } => write!(f, "{command} requires <{name}>"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidPosition { raw } => {
                write!(f, "invalid position: {raw} (positions start at 1)")
            }
            ArgsError::InvalidId { raw } => write!(f, "invalid id: {raw:?}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidTag { raw, reason } => write!(f, "invalid --tag {raw}: {reason}"),
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

fn take(
    args: &mut impl Iterator<Item = String>,
    command: &'static str,
    name: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingArg { command, name })
}

fn parse_id<T: FromStr>(raw: String) -> Result<T, ArgsError> {
    raw.parse().map_err(|_| ArgsError::InvalidId { raw })
}

/// 1-based position as shown by `cards`, converted to an index.
fn parse_position(raw: String) -> Result<usize, ArgsError> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(ArgsError::InvalidPosition { raw }),
    }
}

/// `name` or `name:#rrggbb`.
fn parse_tag(raw: &str) -> Result<Tag, flashdeck_core::Error> {
    let (name, color) = raw.split_once(':').unwrap_or((raw, ""));
    Ok(Tag::new(name, color)?)
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [options] decks");
    eprintln!("  cargo run -p app -- [options] create-deck <name> <description> [--tag <name[:color]>]... [--public]");
    eprintln!("  cargo run -p app -- [options] cards <deck-id>");
    eprintln!("  cargo run -p app -- [options] add <deck-id> [<question> <answer>]");
    eprintln!("  cargo run -p app -- [options] edit <deck-id> <card-id> <question> <answer>");
    eprintln!("  cargo run -p app -- [options] move <deck-id> <from> <to>");
    eprintln!("  cargo run -p app -- [options] delete <deck-id> <card-id>");
    eprintln!("  cargo run -p app -- [options] import <deck-id> <file.json>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>   default {DEFAULT_DB_URL}");
    eprintln!("  --user <id>         default {DEFAULT_USER}");
    eprintln!("  --api <base_url>    use the REST API instead of SQLite");
    eprintln!();
    eprintln!("Positions for move start at 1. Import files hold a JSON array of");
    eprintln!("{{\"question\": ..., \"answer\": ...}} objects.");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  FLASHDECK_DB_URL, FLASHDECK_USER, FLASHDECK_API_URL,");
    eprintln!("  FLASHDECK_DEBOUNCE_MS, FLASHDECK_MAX_CHARS, FLASHDECK_READ_ONLY,");
    eprintln!("  FLASHDECK_REORDER_ROLLBACK, RUST_LOG");
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Decks,
    CreateDeck {
        name: String,
        description: String,
        tags: Vec<Tag>,
        public: bool,
    },
    Cards {
        deck: DeckId,
    },
    Add {
        deck: DeckId,
        content: Option<(String, String)>,
    },
    Edit {
        deck: DeckId,
        card: CardId,
        question: String,
        answer: String,
    },
    Move {
        deck: DeckId,
        from: usize,
        to: usize,
    },
    Delete {
        deck: DeckId,
        card: CardId,
    },
    Import {
        deck: DeckId,
        path: PathBuf,
    },
}

impl Command {
    fn from_positional(
        positional: Vec<String>,
        tags: Vec<Tag>,
        public: bool,
    ) -> Result<Self, ArgsError> {
        let mut args = positional.into_iter();
        let Some(name) = args.next() else {
            return Ok(Self::Decks);
        };

        let command = match name.as_str() {
            "decks" => Self::Decks,
            "create-deck" => Self::CreateDeck {
                name: take(&mut args, "create-deck", "name")?,
                description: take(&mut args, "create-deck", "description")?,
                tags,
                public,
            },
            "cards" => Self::Cards {
                deck: parse_id(take(&mut args, "cards", "deck-id")?)?,
            },
            "add" => {
                let deck = parse_id(take(&mut args, "add", "deck-id")?)?;
                let content = match args.next() {
                    Some(question) => Some((question, take(&mut args, "add", "answer")?)),
                    None => None,
                };
                Self::Add { deck, content }
            }
            "edit" => Self::Edit {
                deck: parse_id(take(&mut args, "edit", "deck-id")?)?,
                card: parse_id(take(&mut args, "edit", "card-id")?)?,
                question: take(&mut args, "edit", "question")?,
                answer: take(&mut args, "edit", "answer")?,
            },
            "move" => Self::Move {
                deck: parse_id(take(&mut args, "move", "deck-id")?)?,
                from: parse_position(take(&mut args, "move", "from")?)?,
                to: parse_position(take(&mut args, "move", "to")?)?,
            },
            "delete" => Self::Delete {
                deck: parse_id(take(&mut args, "delete", "deck-id")?)?,
                card: parse_id(take(&mut args, "delete", "card-id")?)?,
            },
            "import" => Self::Import {
                deck: parse_id(take(&mut args, "import", "deck-id")?)?,
                path: PathBuf::from(take(&mut args, "import", "file")?),
            },
            _ => return Err(ArgsError::UnknownCommand(name)),
        };

        if let Some(extra) = args.next() {
            return Err(ArgsError::UnknownArg(extra));
        }
        Ok(command)
    }
}

struct Args {
    db_url: String,
    user: UserId,
    api: Option<String>,
    command: Command,
}

impl Args {
    /// Returns `Ok(None)` when help was requested.
    fn parse(
        argv: impl IntoIterator<Item = String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<Self>, ArgsError> {
        let mut db_url = env("FLASHDECK_DB_URL")
            .map_or_else(|| DEFAULT_DB_URL.to_string(), normalize_sqlite_url);
        let mut user = env("FLASHDECK_USER").unwrap_or_else(|| DEFAULT_USER.to_string());
        let mut api = env("FLASHDECK_API_URL").filter(|url| !url.trim().is_empty());
        let mut tags = Vec::new();
        let mut public = false;
        let mut positional = Vec::new();

        let mut args = argv.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--user" => user = require_value(&mut args, "--user")?,
                "--api" => api = Some(require_value(&mut args, "--api")?),
                "--tag" => {
                    let raw = require_value(&mut args, "--tag")?;
                    let tag = parse_tag(&raw).map_err(|e| ArgsError::InvalidTag {
                        reason: e.to_string(),
                        raw: raw.clone(),
                    })?;
                    tags.push(tag);
                }
                "--public" => public = true,
                "--help" | "-h" => return Ok(None),
                _ if arg.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => positional.push(arg),
            }
        }

        Ok(Some(Self {
            db_url,
            user: parse_id(user)?,
            api,
            command: Command::from_positional(positional, tags, public)?,
        }))
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") || raw.starts_with("sqlite:file:")
    {
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
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" || db_url.contains("mode=memory") {
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

fn print_decks(decks: &[Deck]) {
    if decks.is_empty() {
        println!("no decks yet");
        return;
    }
    for deck in decks {
        let tags: String = deck.tags.iter().map(|t| format!(" #{}", t.name)).collect();
        let visibility = if deck.is_public { " (public)" } else { "" };
        println!(
            "{:>3}. {} [{}]{}{}",
            deck.order, deck.name, deck.id, visibility, tags
        );
    }
}

fn print_cards(cards: &[Flashcard]) {
    if cards.is_empty() {
        println!("no cards in this deck");
        return;
    }
    for card in cards {
        println!(
            "{:>3}. [{}] {} | {}",
            card.order, card.id, card.question, card.answer
        );
    }
}

async fn open_cards(
    services: &AppServices,
    deck_id: DeckId,
) -> Result<CardService, Box<dyn std::error::Error>> {
    if services.deck_service().deck(&deck_id).is_none() {
        return Err(format!("unknown deck: {deck_id}").into());
    }
    let cards = services.card_service(deck_id);
    cards.load().await?;
    Ok(cards)
}

async fn execute(services: &AppServices, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    let decks = services.deck_service();

    match command {
        Command::Decks => print_decks(&decks.decks()),
        Command::CreateDeck {
            name,
            description,
            tags,
            public,
        } => {
            let draft = DeckDraft::new(name, description)
                .with_tags(tags)
                .public(public);
            let deck = decks.create_deck(draft).await?;
            println!("created deck {} [{}]", deck.name, deck.id);
        }
        Command::Cards { deck } => {
            let cards = open_cards(services, deck).await?;
            print_cards(&cards.cards());
        }
        Command::Add { deck, content } => {
            let cards = open_cards(services, deck).await?;
            let card = match content {
                Some((question, answer)) => cards.add_card(question, answer).await?,
                None => cards.add_blank_card().await?,
            };
            println!("added card {} at position {}", card.id, card.order);
        }
        Command::Edit {
            deck,
            card,
            question,
            answer,
        } => {
            let cards = open_cards(services, deck).await?;
            cards.edit_card(&card, question, answer)?;
            // A one-shot command cannot wait out the debounce window.
            cards.flush_edits().await;
            if let Some(err) = cards.last_error() {
                return Err(err.into());
            }
            println!("updated card {card}");
        }
        Command::Move { deck, from, to } => {
            let cards = open_cards(services, deck).await?;
            if !cards.move_card(from, Some(to)).await? {
                println!("nothing to move");
            }
            print_cards(&cards.cards());
        }
        Command::Delete { deck, card } => {
            let cards = open_cards(services, deck).await?;
            cards.delete_card(&card).await?;
            println!("deleted card {card}");
        }
        Command::Import { deck, path } => {
            let raw = std::fs::read_to_string(&path)?;
            let candidates: Vec<ImportCandidate> = serde_json::from_str(&raw)?;
            let cards = open_cards(services, deck).await?;
            let report = cards.import_cards(candidates).await?;
            for failure in &report.failures {
                eprintln!(
                    "failed to import #{} {:?}: {}",
                    failure.position + 1,
                    failure.question,
                    failure.error
                );
            }
            println!(
                "imported {} cards, {} failed, {} skipped",
                report.confirmed.len(),
                report.failures.len(),
                report.dropped
            );
        }
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let parsed = match Args::parse(std::env::args().skip(1), |key| std::env::var(key).ok()) {
        Ok(Some(args)) => args,
        Ok(None) => {
            print_usage();
            return Ok(());
        }
        Err(e) => {
            eprintln!("{e}");
            print_usage();
            return Err(e.into());
        }
    };

    let config = SyncConfig::from_env();
    let services = match &parsed.api {
        Some(base_url) => {
            info!(%base_url, "using REST storage");
            AppServices::new_http(base_url, parsed.user.clone(), config).await?
        }
        None => {
            prepare_sqlite_file(&parsed.db_url)?;
            AppServices::new_sqlite(&parsed.db_url, parsed.user.clone(), config).await?
        }
    };

    execute(&services, parsed.command).await
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Option<Args>, ArgsError> {
        Args::parse(args.iter().map(|s| (*s).to_string()), |_| None)
    }

    fn command(args: &[&str]) -> Command {
        parse(args).unwrap().unwrap().command
    }

    #[test]
    fn defaults_list_decks() {
        let args = parse(&[]).unwrap().unwrap();
        assert_eq!(args.command, Command::Decks);
        assert_eq!(args.db_url, DEFAULT_DB_URL);
        assert_eq!(args.user, UserId::new(DEFAULT_USER));
        assert!(args.api.is_none());
    }

    #[test]
    fn env_supplies_user_and_api() {
        let args = Args::parse(Vec::<String>::new(), |key| match key {
            "FLASHDECK_USER" => Some("alice".into()),
            "FLASHDECK_API_URL" => Some("http://localhost:3000".into()),
            _ => None,
        })
        .unwrap()
        .unwrap();
        assert_eq!(args.user, UserId::new("alice"));
        assert_eq!(args.api.as_deref(), Some("http://localhost:3000"));
    }

    #[test]
    fn add_with_and_without_content() {
        assert_eq!(
            command(&["add", "d1", "Q", "A"]),
            Command::Add {
                deck: DeckId::new("d1"),
                content: Some(("Q".into(), "A".into())),
            }
        );
        assert_eq!(
            command(&["--user", "bob", "add", "d1"]),
            Command::Add {
                deck: DeckId::new("d1"),
                content: None,
            }
        );
        assert_eq!(
            parse(&["add", "d1", "Q"]).err(),
            Some(ArgsError::MissingArg {
                command: "add",
                name: "answer",
            })
        );
    }

    #[test]
    fn move_positions_are_one_based() {
        assert_eq!(
            command(&["move", "d1", "1", "3"]),
            Command::Move {
                deck: DeckId::new("d1"),
                from: 0,
                to: 2,
            }
        );
        assert!(matches!(
            parse(&["move", "d1", "0", "2"]),
            Err(ArgsError::InvalidPosition { .. })
        ));
    }

    #[test]
    fn create_deck_collects_tags() {
        let cmd = command(&[
            "create-deck",
            "German",
            "verbs",
            "--tag",
            "lang:#ff0000",
            "--tag",
            "daily",
            "--public",
        ]);
        let Command::CreateDeck { tags, public, .. } = cmd else {
            panic!("expected create-deck");
        };
        assert!(public);
        assert_eq!(tags[0].name, "lang");
        assert_eq!(tags[0].color, "#ff0000");
        assert_eq!(tags[1].color, "#000000");

        assert!(matches!(
            parse(&["create-deck", "x", "y", "--tag", " :#fff"]),
            Err(ArgsError::InvalidTag { .. })
        ));
    }

    #[test]
    fn rejects_unknown_input() {
        assert_eq!(
            parse(&["shuffle"]).err(),
            Some(ArgsError::UnknownCommand("shuffle".into()))
        );
        assert_eq!(
            parse(&["--verbose"]).err(),
            Some(ArgsError::UnknownArg("--verbose".into()))
        );
        assert_eq!(
            parse(&["cards", "d1", "extra"]).err(),
            Some(ArgsError::UnknownArg("extra".into()))
        );
        assert_eq!(
            parse(&["--db"]).err(),
            Some(ArgsError::MissingValue { flag: "--db" })
        );
        assert!(matches!(
            parse(&["--user", "  ", "decks"]),
            Err(ArgsError::InvalidId { .. })
        ));
    }

    #[test]
    fn help_short_circuits() {
        assert!(parse(&["cards", "--help"]).unwrap().is_none());
    }

    #[test]
    fn memory_urls_pass_through() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
        assert_eq!(
            normalize_sqlite_url("sqlite:file:x?mode=memory&cache=shared".into()),
            "sqlite:file:x?mode=memory&cache=shared"
        );
        assert!(normalize_sqlite_url("data/dev.sqlite3".into()).starts_with("sqlite://"));
    }
}
