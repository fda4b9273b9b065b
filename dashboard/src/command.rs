//! Line commands accepted by the interactive dashboard.

use std::str::FromStr;

use streamstats::{QueryError, SortKey, SortOrder};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Next,
    Prev,
    Page(u32),
    /// Sort by a column.  Without an explicit order the active column flips.
    Sort(SortKey, Option<SortOrder>),
    /// Flip the current sort order.
    Order,
    Limit(u32),
    Search(String),
    Poll(bool),
    Visible(bool),
    Refresh,
    ShowUrl,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command `{0}` (type `help`)")]
    Unknown(String),

    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),

    #[error("`{0}` is not a valid number")]
    BadNumber(String),

    #[error("expected on/off, got `{0}`")]
    BadToggle(String),

    #[error(transparent)]
    Query(#[from] QueryError),
}

pub const HELP: &str = "\
n | next              next page
p | prev              previous page
page <n>              jump to page n
sort <column> [asc|desc]
                      columns: num_participants, created_at, started_at, viewer_count
order                 flip sort order
limit <n>             rows per page (1-1000)
search <text>         filter the loaded page (empty clears)
poll on|off           auto refresh
hide | show           pause/resume while the view is in the background
r | refresh           refetch now
url                   print the shareable query string
q | quit";

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((w, r)) => (w, r.trim()),
            None => (line, ""),
        };

        let cmd = match word.to_ascii_lowercase().as_str() {
            "" | "r" | "refresh" => Command::Refresh,
            "n" | "next" => Command::Next,
            "p" | "prev" => Command::Prev,
            "page" => Command::Page(number(rest, "page")?),
            "limit" => Command::Limit(number(rest, "limit")?),
            "sort" => {
                let mut args = rest.split_whitespace();
                let key = args.next().ok_or(CommandError::MissingArgument("sort"))?;
                let order = args.next().map(str::parse::<SortOrder>).transpose()?;
                Command::Sort(key.parse()?, order)
            }
            "order" => Command::Order,
            "search" | "/" => Command::Search(rest.to_string()),
            "poll" => Command::Poll(toggle(rest)?),
            "hide" => Command::Visible(false),
            "show" => Command::Visible(true),
            "url" => Command::ShowUrl,
            "h" | "help" | "?" => Command::Help,
            "q" | "quit" | "exit" => Command::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(cmd)
    }
}

fn number(arg: &str, name: &'static str) -> Result<u32, CommandError> {
    if arg.is_empty() {
        return Err(CommandError::MissingArgument(name));
    }
    arg.parse().map_err(|_| CommandError::BadNumber(arg.to_string()))
}

fn toggle(arg: &str) -> Result<bool, CommandError> {
    match arg.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        "" => Err(CommandError::MissingArgument("poll")),
        other => Err(CommandError::BadToggle(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<Command, CommandError> {
        s.parse()
    }

    #[test]
    fn navigation() {
        assert_eq!(parse("n"), Ok(Command::Next));
        assert_eq!(parse(" PREV "), Ok(Command::Prev));
        assert_eq!(parse("page 4"), Ok(Command::Page(4)));
        assert_eq!(parse("page"), Err(CommandError::MissingArgument("page")));
        assert_eq!(parse("page x"), Err(CommandError::BadNumber("x".into())));
    }

    #[test]
    fn sorting() {
        assert_eq!(
            parse("sort created_at"),
            Ok(Command::Sort(SortKey::CreatedAt, None))
        );
        assert_eq!(
            parse("sort started_at asc"),
            Ok(Command::Sort(SortKey::StartedAt, Some(SortOrder::Asc)))
        );
        assert!(matches!(
            parse("sort likes"),
            Err(CommandError::Query(QueryError::InvalidSortKey(_)))
        ));
    }

    #[test]
    fn search_keeps_inner_spaces() {
        assert_eq!(parse("search  late night "), Ok(Command::Search("late night".into())));
        assert_eq!(parse("search"), Ok(Command::Search(String::new())));
    }

    #[test]
    fn toggles() {
        assert_eq!(parse("poll off"), Ok(Command::Poll(false)));
        assert_eq!(parse("poll ON"), Ok(Command::Poll(true)));
        assert_eq!(parse("poll maybe"), Err(CommandError::BadToggle("maybe".into())));
        assert_eq!(parse("hide"), Ok(Command::Visible(false)));
    }

    #[test]
    fn blank_line_refreshes() {
        assert_eq!(parse(""), Ok(Command::Refresh));
        assert!(matches!(parse("dance"), Err(CommandError::Unknown(_))));
    }
}
