//! Plain-text rendering of controller snapshots and leaderboard rows.

use std::fmt::Write as _;

use quiz_core::model::{LeaderboardEntry, RoundSummary, Settlement};
use quiz_core::{Phase, RoundSnapshot};

const WEI_PER_TOKEN: u128 = 1_000_000_000_000_000_000;

/// `m:ss` countdown label.
pub fn format_clock(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Wei amount as a decimal token value with up to four fractional digits.
pub fn format_tokens(wei: u128) -> String {
    let whole = wei / WEI_PER_TOKEN;
    let frac = (wei % WEI_PER_TOKEN) / (WEI_PER_TOKEN / 10_000);
    if frac == 0 {
        whole.to_string()
    } else {
        let digits = format!("{frac:04}");
        format!("{whole}.{}", digits.trim_end_matches('0'))
    }
}

pub fn item(snapshot: &RoundSnapshot) -> String {
    let mut out = String::new();
    let Some(item) = snapshot.current_item.as_ref() else {
        let _ = writeln!(out, "[{}]", snapshot.phase);
        return out;
    };
    let _ = writeln!(
        out,
        "\n[{}/{}] {}",
        snapshot.current_index + 1,
        snapshot.total,
        item.prompt()
    );
    if item.is_free_text() {
        let _ = writeln!(out, "  (type your answer)");
    }
    for (i, option) in item.options().iter().enumerate() {
        let marker = match snapshot.current_answer() {
            Some(answer) if answer.as_str() == option.as_str() => '*',
            _ => ' ',
        };
        let _ = writeln!(out, " {marker}{}) {option}", i + 1);
    }
    let _ = write!(out, "time left {}", format_clock(snapshot.remaining_seconds));
    out
}

/// Clears the terminal so a memorised sequence is off screen during recall.
pub fn hide_preview() -> String {
    "\x1b[2J\x1b[Hrecall the sequence in order".to_owned()
}

/// Countdown line; only printed every ten seconds and for the last five.
pub fn tick(remaining: u32) -> Option<String> {
    (remaining % 10 == 0 || remaining <= 5).then(|| format!("  ... {}", format_clock(remaining)))
}

pub fn summary(summary: &RoundSummary) -> String {
    let mut out = format!(
        "round finished: {} of {} answered, {} unanswered, {}s",
        summary.answered(),
        summary.total_items(),
        summary.no_answer(),
        summary.duration().num_seconds()
    );
    if let Some(score) = summary.score() {
        let _ = write!(out, ", score {score}");
    }
    out
}

pub fn status(snapshot: &RoundSnapshot) -> String {
    match snapshot.phase {
        Phase::Submitting => "submitting answers...".to_owned(),
        Phase::Active if snapshot.remaining_seconds == 0 => {
            "submission pending: press enter to retry".to_owned()
        }
        phase => format!("[{phase}]"),
    }
}

pub fn leaderboard(rows: &[LeaderboardEntry]) -> String {
    if rows.is_empty() {
        return "no participants yet".to_owned();
    }
    let width = rows.iter().map(|r| r.name.len()).max().unwrap_or(0).max(4);
    let mut out = String::new();
    let _ = writeln!(out, "  #  {:<width$}  score  wallet", "name");
    for (rank, row) in rows.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>3}  {:<width$}  {:>5}  {}",
            rank + 1,
            row.name,
            row.score,
            row.participant
        );
    }
    out
}

pub fn settlement(settlement: &Settlement) -> String {
    let mut out = format!("game {}\n", settlement.game_id());
    for (participant, wei) in settlement.payouts() {
        let _ = writeln!(out, "  {participant}  {}", format_tokens(*wei));
    }
    let _ = write!(out, "total {}", format_tokens(settlement.total()));
    out
}
