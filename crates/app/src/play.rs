//! Terminal play loop: renders snapshots and forwards typed input as controller commands.

use quiz_core::model::{Item, ItemId, RoundSource};
use quiz_core::{Phase, Selection};
use services::{
    Advance, ControllerError, PracticeSession, RoundController, RoundEvent, ValidationError,
};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::render;

type Input = Lines<BufReader<Stdin>>;

/// What a typed line asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Next,
    Quit,
    Choose(String),
}

/// Blank lines advance and `:n` / `:q` always work. Bare `n` / `q` are commands only
/// when the current item does not take free text, where they are valid answers.
fn parse_command(line: &str, item: Option<&Item>) -> Command {
    let line = line.trim();
    match line {
        "" | ":n" | ":next" => return Command::Next,
        ":q" | ":quit" => return Command::Quit,
        _ => {}
    }
    let free_text = item.is_some_and(Item::is_free_text);
    if !free_text {
        match line {
            "n" | "next" => return Command::Next,
            "q" | "quit" => return Command::Quit,
            _ => {}
        }
    }
    if let Some(item) = item {
        if let Ok(n) = line.parse::<usize>() {
            if let Some(option) = n.checked_sub(1).and_then(|i| item.options().get(i)) {
                return Command::Choose(option.clone());
            }
        }
    }
    Command::Choose(line.to_owned())
}

async fn read_line(input: &mut Input) -> std::io::Result<Option<String>> {
    input.next_line().await
}

/// Plays one round. `practice` is set for typing and memory games; a memory sequence
/// is shown until the participant presses enter, then hidden before recall starts.
pub async fn run(
    mut ctl: RoundController,
    source: RoundSource,
    name: Option<String>,
    practice: Option<PracticeSession>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    let round = ctl.load_round(source).await?;
    println!(
        "{} ({} items, {} per item)",
        round.title().unwrap_or("untitled round"),
        round.len(),
        render::format_clock(round.per_item_seconds())
    );

    let preview = practice.map(|p| p.preview()).unwrap_or_default();
    if !preview.is_empty() {
        println!("memorise: {}", preview.join(" "));
        println!("press enter when ready");
        read_line(&mut input).await?.ok_or("input closed before recall")?;
        println!("{}", render::hide_preview());
    }

    join(&mut ctl, &mut input, name).await?;
    println!("{}", render::item(&ctl.current_snapshot()));

    loop {
        tokio::select! {
            Some(event) = ctl.next_event() => {
                if !on_event(&mut ctl, event) {
                    break;
                }
            }
            line = read_line(&mut input) => {
                let Some(line) = line? else {
                    ctl.abort("input closed");
                    break;
                };
                if !on_input(&mut ctl, &line)? {
                    break;
                }
            }
        }
    }

    ctl.shutdown();
    Ok(())
}

async fn join(
    ctl: &mut RoundController,
    input: &mut Input,
    mut name: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        let candidate = match name.take() {
            Some(name) => name,
            None => {
                println!("your name:");
                read_line(input).await?.ok_or("input closed before joining")?
            }
        };
        match ctl.join(&candidate).await {
            Ok(()) => return Ok(()),
            Err(ControllerError::Validation(ValidationError::EmptyName)) => {
                println!("name cannot be empty");
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Returns false once the round is over.
fn on_event(ctl: &mut RoundController, event: RoundEvent) -> bool {
    match event {
        RoundEvent::Tick { remaining } => {
            if let Some(line) = render::tick(remaining) {
                println!("{line}");
            }
            true
        }
        RoundEvent::TimedOut(advance) => {
            println!("time is up");
            show_advance(ctl, advance);
            true
        }
        RoundEvent::Finished(summary) => {
            println!("{}", render::summary(&summary));
            false
        }
        RoundEvent::SubmissionFailed(err) => {
            println!("could not submit answers: {err}");
            println!("{}", render::status(&ctl.current_snapshot()));
            true
        }
        RoundEvent::Aborted { reason } => {
            println!("round aborted: {reason}");
            false
        }
    }
}

/// Returns false when the participant quits.
fn on_input(ctl: &mut RoundController, line: &str) -> Result<bool, ControllerError> {
    let snapshot = ctl.current_snapshot();
    match parse_command(line, snapshot.current_item.as_ref()) {
        Command::Quit => {
            ctl.abort("participant quit");
            return Ok(false);
        }
        Command::Next => {
            let advance = ctl.next()?;
            show_advance(ctl, advance);
        }
        Command::Choose(value) => {
            if snapshot.phase != Phase::Active {
                return Ok(true);
            }
            let Some(id) = snapshot.current_item.as_ref().map(|i| i.id().clone()) else {
                return Ok(true);
            };
            if !choose(ctl, &id, &value)? {
                return Ok(true);
            }
            let advance = ctl.next()?;
            show_advance(ctl, advance);
        }
    }
    Ok(true)
}

/// Record a choice; invalid options are reported and leave the item open.
fn choose(ctl: &mut RoundController, id: &ItemId, value: &str) -> Result<bool, ControllerError> {
    match ctl.select_answer(id, value) {
        Ok(Selection::Recorded) => Ok(true),
        Ok(Selection::Ignored) => Ok(false),
        Err(ControllerError::Validation(err)) => {
            println!("{err}");
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

fn show_advance(ctl: &RoundController, advance: Advance) {
    match advance {
        Advance::Moved { .. } => println!("{}", render::item(&ctl.current_snapshot())),
        Advance::Submitting(_) => println!("{}", render::status(&ctl.current_snapshot())),
        Advance::Ignored => {}
    }
}
