use chrono::{Datelike, Local, NaiveDateTime};

use crate::plugins::{Plugin, Tier, command_fn};
use crate::reply::Reply;

/// Current date and time
pub fn plugin() -> Plugin {
    Plugin::new("datetime")
        .command(
            Tier::Public,
            "date",
            command_fn("Returns the current date\nSyntax: datetime date", |_| {
                Ok(Reply::text(format_date(&Local::now().naive_local())))
            }),
        )
        .command(
            Tier::Public,
            "time",
            command_fn("Returns the current time\nSyntax: datetime time", |_| {
                Ok(Reply::text(format_time(&Local::now().naive_local())))
            }),
        )
        .with_help(
            "main",
            &[
                "Provides various date and time services.",
                "Available commands: <strong>date, time</strong>",
            ],
        )
        .with_help("date", &["Returns the current date."])
        .with_help("time", &["Returns the current time."])
}

/// The English ordinal suffix for a day of the month
fn suffix(day: u32) -> &'static str {
    match (day % 10, day) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

/// e.g. `Monday, January 5th, 2026`
fn format_date(now: &NaiveDateTime) -> String {
    format!(
        "{}, {} {}{}, {}",
        now.format("%A"),
        now.format("%B"),
        now.day(),
        suffix(now.day()),
        now.year()
    )
}

/// e.g. `3:07 PM`
fn format_time(now: &NaiveDateTime) -> String {
    now.format("%-I:%M %p").to_string()
}
