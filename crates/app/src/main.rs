mod play;
mod render;

use std::fmt;
use std::sync::Arc;

use quiz_api::{ApiConfig, HttpApi, InMemoryApi, PracticeApi, RoundApi};
use quiz_core::model::{
    ChallengeDraft, Difficulty, DraftContent, Item, ItemId, LeaderboardSort, PracticeRequest,
    Round, RoundId, RoundKind, RoundSource, VideoUrl,
};
use services::{
    Clock, ControllerConfig, HostService, ParticipantFeed, PracticeSession, RoundController,
    WalletIdentity,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    Missing { flag: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidValue { flag: &'static str, raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::Missing { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidValue { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
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

fn parse_value<T: std::str::FromStr>(raw: String, flag: &'static str) -> Result<T, ArgsError> {
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidValue { flag, raw })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  app play        --id <id> [--kind quiz|fact-check] [--name <name>] [--wallet <addr>]");
    eprintln!("  app play        --demo [--kind ..] [--name <name>]");
    eprintln!("  app play        --kind typing --category <c> [--difficulty ..] [--name <name>]");
    eprintln!("  app play        --kind memory [--difficulty ..] [--name <name>]");
    eprintln!("  app leaderboard --id <id> [--kind ..] [--sort score|name] [--search <term>]");
    eprintln!("  app watch       --id <id> [--kind ..] [--sort score|name]");
    eprintln!("  app host create (--topic <t> | --video <youtube url>) --creator <name>");
    eprintln!("                  --participants <n> --items <n>");
    eprintln!("                  --reward <wei> [--kind ..] [--difficulty easy|medium|hard] [--wallet <addr>]");
    eprintln!("  app host open   --id <id> [--kind ..]");
    eprintln!("  app host hide   --id <id> [--kind ..]");
    eprintln!("  app host link   --id <id> --game <escrow game id> [--kind ..]");
    eprintln!("  app host close  --id <id> [--kind ..]");
    eprintln!();
    eprintln!("Common flags:");
    eprintln!("  --api <url>     backend base url (default http://localhost:5000)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_API_URL, QUIZ_WALLET, QUIZ_TICK_MS, QUIZ_POLL_MS, QUIZ_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Play,
    Leaderboard,
    Watch,
    HostCreate,
    HostOpen,
    HostHide,
    HostLink,
    HostClose,
}

impl Command {
    fn from_args(args: &mut impl Iterator<Item = String>) -> Result<Option<Self>, ArgsError> {
        let Some(first) = args.next() else {
            return Ok(None);
        };
        let cmd = match first.as_str() {
            "play" => Self::Play,
            "leaderboard" => Self::Leaderboard,
            "watch" => Self::Watch,
            "host" => match args.next().as_deref() {
                Some("create") => Self::HostCreate,
                Some("open") => Self::HostOpen,
                Some("hide") => Self::HostHide,
                Some("link") => Self::HostLink,
                Some("close") => Self::HostClose,
                Some(other) => return Err(ArgsError::UnknownCommand(format!("host {other}"))),
                None => {
                    return Err(ArgsError::Missing {
                        flag: "host <create|open|hide|link|close>",
                    });
                }
            },
            "--help" | "-h" | "help" => return Ok(None),
            other => return Err(ArgsError::UnknownCommand(other.to_owned())),
        };
        Ok(Some(cmd))
    }
}

#[derive(Debug, Default)]
struct Args {
    api_url: Option<String>,
    kind: Option<RoundKind>,
    id: Option<RoundId>,
    wallet: Option<String>,
    name: Option<String>,
    demo: bool,
    sort: LeaderboardSort,
    search: Option<String>,
    topic: Option<String>,
    video: Option<String>,
    category: Option<String>,
    game: Option<String>,
    creator: Option<String>,
    participants: Option<u32>,
    items: Option<u32>,
    reward: Option<u128>,
    difficulty: Difficulty,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self {
            wallet: std::env::var("QUIZ_WALLET").ok(),
            ..Self::default()
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--api" => parsed.api_url = Some(require_value(args, "--api")?),
                "--kind" => {
                    let value = require_value(args, "--kind")?;
                    parsed.kind = Some(parse_value(value, "--kind")?);
                }
                "--id" => {
                    let value = require_value(args, "--id")?;
                    parsed.id = Some(parse_value(value, "--id")?);
                }
                "--wallet" => parsed.wallet = Some(require_value(args, "--wallet")?),
                "--name" => parsed.name = Some(require_value(args, "--name")?),
                "--demo" => parsed.demo = true,
                "--sort" => {
                    let value = require_value(args, "--sort")?;
                    parsed.sort = parse_value(value, "--sort")?;
                }
                "--search" => parsed.search = Some(require_value(args, "--search")?),
                "--topic" => parsed.topic = Some(require_value(args, "--topic")?),
                "--video" => parsed.video = Some(require_value(args, "--video")?),
                "--category" => parsed.category = Some(require_value(args, "--category")?),
                "--game" => parsed.game = Some(require_value(args, "--game")?),
                "--creator" => parsed.creator = Some(require_value(args, "--creator")?),
                "--participants" => {
                    let value = require_value(args, "--participants")?;
                    parsed.participants = Some(parse_value(value, "--participants")?);
                }
                "--items" => {
                    let value = require_value(args, "--items")?;
                    parsed.items = Some(parse_value(value, "--items")?);
                }
                "--reward" => {
                    let value = require_value(args, "--reward")?;
                    parsed.reward = Some(parse_value(value, "--reward")?);
                }
                "--difficulty" => {
                    let value = require_value(args, "--difficulty")?;
                    parsed.difficulty = parse_value(value, "--difficulty")?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }

    fn kind(&self) -> RoundKind {
        self.kind.unwrap_or(RoundKind::FactCheck)
    }

    fn source(&self) -> Result<RoundSource, ArgsError> {
        let id = self.id.clone().ok_or(ArgsError::Missing { flag: "--id" })?;
        Ok(RoundSource::new(self.kind(), id))
    }

    fn identity(&self) -> Result<WalletIdentity, ArgsError> {
        self.wallet
            .as_deref()
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .map(WalletIdentity::new)
            .ok_or(ArgsError::Missing {
                flag: "--wallet (or QUIZ_WALLET)",
            })
    }

    fn content(&self) -> Result<DraftContent, ArgsError> {
        match (&self.topic, &self.video) {
            (Some(topic), None) => Ok(DraftContent::Topic(topic.clone())),
            (None, Some(raw)) => VideoUrl::parse(raw)
                .map(DraftContent::Video)
                .map_err(|_| ArgsError::InvalidValue {
                    flag: "--video",
                    raw: raw.clone(),
                }),
            (Some(_), Some(_)) => Err(ArgsError::UnknownArg(
                "--topic and --video are exclusive".into(),
            )),
            (None, None) => Err(ArgsError::Missing {
                flag: "--topic or --video",
            }),
        }
    }

    /// Generator request for `--kind typing|memory`; `None` for hosted kinds.
    fn practice(&self) -> Result<Option<PracticeRequest>, ArgsError> {
        match self.kind() {
            RoundKind::Typing => {
                let category = self
                    .category
                    .clone()
                    .ok_or(ArgsError::Missing { flag: "--category" })?;
                Ok(Some(PracticeRequest::typing(category, self.difficulty)))
            }
            RoundKind::Memory => Ok(Some(PracticeRequest::memory(self.difficulty))),
            _ => Ok(None),
        }
    }

    fn game_id(&self) -> Result<&str, ArgsError> {
        self.game
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .ok_or(ArgsError::Missing { flag: "--game" })
    }

    fn draft(&self) -> Result<ChallengeDraft, ArgsError> {
        Ok(ChallengeDraft {
            kind: self.kind(),
            creator_name: self.creator.clone().ok_or(ArgsError::Missing { flag: "--creator" })?,
            content: self.content()?,
            participants: self
                .participants
                .ok_or(ArgsError::Missing { flag: "--participants" })?,
            item_count: self.items.ok_or(ArgsError::Missing { flag: "--items" })?,
            reward_per_score: self.reward.ok_or(ArgsError::Missing { flag: "--reward" })?,
            difficulty: self.difficulty,
            creator: self.identity()?.participant().clone(),
        })
    }
}

fn http_api(args: &Args) -> Result<HttpApi, Box<dyn std::error::Error>> {
    let env_config = ApiConfig::from_env()?;
    let config = match args.api_url.as_deref() {
        Some(url) => ApiConfig::new(url)?.with_poll_interval(env_config.poll_interval),
        None => env_config,
    };
    tracing::debug!(base_url = config.base_url(), "using backend");
    Ok(HttpApi::new(config)?)
}

/// Offline fact-check round served from memory.
fn demo_api() -> Result<(InMemoryApi, RoundSource), Box<dyn std::error::Error>> {
    let source = RoundSource::new(RoundKind::FactCheck, RoundId::new("demo"));
    let facts = [
        ("f1", "Honey never spoils when sealed.", "true"),
        ("f2", "Lightning never strikes the same place twice.", "false"),
        ("f3", "Octopuses have three hearts.", "true"),
    ];
    let items = facts
        .iter()
        .map(|(id, statement, _)| Item::true_false(ItemId::new(*id), *statement))
        .collect::<Result<Vec<_>, _>>()?;
    let round = Round::new(source.clone(), items, 15)?.with_title("demo facts");

    let api = InMemoryApi::new();
    api.insert_round(round)?;
    api.set_answer_key(
        &source,
        facts
            .iter()
            .map(|(id, _, answer)| (ItemId::new(*id), (*answer).to_owned())),
    )?;
    Ok((api, source))
}

/// Offline generator content for practice games.
fn demo_generator() -> Result<InMemoryApi, Box<dyn std::error::Error>> {
    let api = InMemoryApi::new();
    api.set_generated(
        RoundKind::Typing,
        ["harbor", "lantern", "orbit", "meadow"].map(str::to_owned),
    )?;
    api.set_generated(RoundKind::Memory, ["4", "7", "1", "7", "9"].map(str::to_owned))?;
    Ok(api)
}

fn init_tracing() {
    let filter = std::env::var("QUIZ_LOG").unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let cmd = Command::from_args(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;
    let Some(cmd) = cmd else {
        print_usage();
        return Ok(());
    };

    let args = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    match cmd {
        Command::Play => {
            if let Some(request) = args.practice()? {
                let generator: Arc<dyn PracticeApi> = if args.demo {
                    Arc::new(demo_generator()?)
                } else {
                    Arc::new(http_api(&args)?)
                };
                let session = PracticeSession::new(generator, request);
                let identity = args
                    .identity()
                    .unwrap_or_else(|_| WalletIdentity::new("0xpractice"));
                let ctl = RoundController::new(
                    Arc::new(session.clone()),
                    identity,
                    Clock::default(),
                    ControllerConfig::from_env(),
                );
                return play::run(ctl, session.source(), args.name.clone(), Some(session)).await;
            }
            let (api, source, identity) = if args.demo {
                let (api, source) = demo_api()?;
                let api: Arc<dyn RoundApi> = Arc::new(api);
                let identity = args
                    .identity()
                    .unwrap_or_else(|_| WalletIdentity::new("0xdemo"));
                (api, source, identity)
            } else {
                let api: Arc<dyn RoundApi> = Arc::new(http_api(&args)?);
                (api, args.source()?, args.identity()?)
            };
            let ctl = RoundController::new(
                api,
                identity,
                Clock::default(),
                ControllerConfig::from_env(),
            );
            play::run(ctl, source, args.name.clone(), None).await
        }
        Command::Leaderboard => {
            let api = http_api(&args)?;
            let board = api.leaderboard(&args.source()?).await?;
            let board = board.search(args.search.as_deref().unwrap_or_default());
            println!("{}", render::leaderboard(&board.sorted(args.sort)));
            Ok(())
        }
        Command::Watch => {
            let api = http_api(&args)?;
            let mut feed = ParticipantFeed::subscribe(&api, &args.source()?).with_sort(args.sort);
            if let Some(term) = args.search.clone() {
                feed.set_search(term);
            }
            while let Some(rows) = feed.next().await {
                println!("{}", render::leaderboard(&rows));
            }
            Ok(())
        }
        Command::HostCreate => {
            let host = HostService::new(Arc::new(http_api(&args)?));
            let created = host.create(&args.draft()?).await?;
            println!("created {} {}", args.kind(), created.id);
            println!(
                "escrow required: {} ({} wei)",
                render::format_tokens(created.escrow_budget),
                created.escrow_budget
            );
            Ok(())
        }
        Command::HostOpen => {
            let host = HostService::new(Arc::new(http_api(&args)?));
            host.open(&args.source()?).await?;
            println!("round is open");
            Ok(())
        }
        Command::HostHide => {
            let host = HostService::new(Arc::new(http_api(&args)?));
            host.hide(&args.source()?).await?;
            println!("round is hidden");
            Ok(())
        }
        Command::HostLink => {
            let host = HostService::new(Arc::new(http_api(&args)?));
            let game_id = args.game_id()?;
            host.link(&args.source()?, game_id).await?;
            println!("linked escrow game {game_id}");
            Ok(())
        }
        Command::HostClose => {
            let host = HostService::new(Arc::new(http_api(&args)?));
            let settlement = host.close(&args.source()?).await?;
            println!("{}", render::settlement(&settlement));
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(raw: &[&str]) -> impl Iterator<Item = String> {
        raw.iter().map(|s| (*s).to_owned()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn host_subcommands_are_recognised() {
        let mut it = argv(&["host", "close", "--id", "x"]);
        assert_eq!(
            Command::from_args(&mut it).unwrap(),
            Some(Command::HostClose)
        );
        let args = Args::parse(&mut it).unwrap();
        assert_eq!(args.source().unwrap().id, RoundId::new("x"));
    }

    #[test]
    fn kind_defaults_to_fact_check() {
        let args = Args::parse(&mut argv(&["--id", "abc"])).unwrap();
        assert_eq!(args.source().unwrap().kind, RoundKind::FactCheck);
        let args = Args::parse(&mut argv(&["--id", "abc", "--kind", "quiz"])).unwrap();
        assert_eq!(args.source().unwrap().kind, RoundKind::Quiz);
    }

    #[test]
    fn bad_values_are_reported() {
        assert!(matches!(
            Args::parse(&mut argv(&["--items", "many"])),
            Err(ArgsError::InvalidValue { flag: "--items", .. })
        ));
        assert!(matches!(
            Args::parse(&mut argv(&["--id"])),
            Err(ArgsError::MissingValue { flag: "--id" })
        ));
    }

    #[test]
    fn draft_requires_every_field() {
        let args = Args::parse(&mut argv(&[
            "--topic", "space", "--creator", "host", "--participants", "3", "--items", "10",
            "--wallet", "0xhost",
        ]))
        .unwrap();
        assert!(matches!(
            args.draft(),
            Err(ArgsError::Missing { flag: "--reward" })
        ));
    }

    #[test]
    fn demo_round_is_playable() {
        let (api, source) = demo_api().unwrap();
        assert!(api.is_public(&source));
    }

    #[test]
    fn hide_and_link_subcommands_take_round_ids() {
        let mut it = argv(&["host", "hide", "--id", "q1", "--kind", "quiz"]);
        assert_eq!(Command::from_args(&mut it).unwrap(), Some(Command::HostHide));
        let args = Args::parse(&mut it).unwrap();
        assert_eq!(args.source().unwrap().kind, RoundKind::Quiz);

        let mut it = argv(&["host", "link", "--id", "fc1", "--game", " 12 "]);
        assert_eq!(Command::from_args(&mut it).unwrap(), Some(Command::HostLink));
        let args = Args::parse(&mut it).unwrap();
        assert_eq!(args.game_id().unwrap(), "12");
        assert!(matches!(
            Args::parse(&mut argv(&["--id", "fc1"])).unwrap().game_id(),
            Err(ArgsError::Missing { flag: "--game" })
        ));
    }

    #[test]
    fn video_replaces_topic() {
        let base = [
            "--creator", "host", "--participants", "3", "--items", "4", "--reward", "5",
            "--wallet", "0xhost", "--kind", "quiz",
        ];
        let mut raw = base.to_vec();
        raw.extend(["--video", "https://youtu.be/dQw4w9WgXcQ"]);
        let draft = Args::parse(&mut argv(&raw)).unwrap().draft().unwrap();
        assert!(matches!(draft.content, DraftContent::Video(ref v) if v.video_id() == "dQw4w9WgXcQ"));

        let mut raw = base.to_vec();
        raw.extend(["--video", "https://example.com/clip"]);
        assert!(matches!(
            Args::parse(&mut argv(&raw)).unwrap().draft(),
            Err(ArgsError::InvalidValue { flag: "--video", .. })
        ));
        assert!(matches!(
            Args::parse(&mut argv(&base)).unwrap().draft(),
            Err(ArgsError::Missing { flag: "--topic or --video" })
        ));
    }

    #[test]
    fn practice_kinds_build_generator_requests() {
        let args = Args::parse(&mut argv(&[
            "--kind", "typing", "--category", "animals", "--difficulty", "hard",
        ]))
        .unwrap();
        assert_eq!(
            args.practice().unwrap(),
            Some(PracticeRequest::typing("animals", Difficulty::Hard))
        );
        assert!(matches!(
            Args::parse(&mut argv(&["--kind", "typing"])).unwrap().practice(),
            Err(ArgsError::Missing { flag: "--category" })
        ));
        let args = Args::parse(&mut argv(&["--kind", "memory"])).unwrap();
        assert_eq!(
            args.practice().unwrap(),
            Some(PracticeRequest::memory(Difficulty::default()))
        );
        assert_eq!(Args::parse(&mut argv(&["--id", "x"])).unwrap().practice().unwrap(), None);
    }

    #[tokio::test]
    async fn demo_generator_serves_both_games() {
        let api = demo_generator().unwrap();
        let typing = api
            .generate(&PracticeRequest::typing("demo", Difficulty::Easy))
            .await
            .unwrap();
        assert_eq!(typing.round().len(), 4);
        let memory = api
            .generate(&PracticeRequest::memory(Difficulty::Easy))
            .await
            .unwrap();
        assert_eq!(memory.preview().len(), 5);
    }
}
