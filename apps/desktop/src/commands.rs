//! Line commands typed into the viewer.

use serde_json::{Map, Value};
use thiserror::Error;

pub const HELP: &str = "\
commands:
  sort <column>          cycle ascending / descending / unsorted
  search                 open the search form (then: submit key=value ...)
  filter                 choose visible columns (then: submit col ... | submit)
  page <n>               jump to page n
  row <i>                browse rows starting at row i (then: choose <op>)
  ops [i]                table operations, or operations of row i
  post                   create a record (then: submit key=value ...)
  refresh                refetch every grid
  layout desktop|mobile  switch pagination density
  choose <n>             pick entry n of the open menu
  submit [args]          submit the open form
  cancel                 close the open form or menu
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerCommand {
    Sort(String),
    Search,
    Filter,
    Page(u32),
    Row(usize),
    Ops(Option<usize>),
    Post,
    Refresh,
    Layout { desktop: bool },
    Choose(usize),
    Submit(Vec<String>),
    Cancel,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}`, type `help`")]
    Unknown(String),
    #[error("`{command}` needs {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
    #[error("`{0}` is not a valid number")]
    InvalidNumber(String),
    #[error("expected key=value, got `{0}`")]
    InvalidAssignment(String),
}

fn number<T: std::str::FromStr>(
    raw: Option<&str>,
    command: &'static str,
    argument: &'static str,
) -> Result<T, CommandError> {
    let raw = raw.ok_or(CommandError::MissingArgument { command, argument })?;
    raw.parse()
        .map_err(|_| CommandError::InvalidNumber(raw.to_string()))
}

pub fn parse_command(line: &str) -> Result<ViewerCommand, CommandError> {
    let mut words = line.split_whitespace();
    let name = words.next().ok_or(CommandError::Empty)?;
    let command = match name {
        "sort" => ViewerCommand::Sort(
            words
                .next()
                .ok_or(CommandError::MissingArgument {
                    command: "sort",
                    argument: "a column",
                })?
                .to_string(),
        ),
        "search" => ViewerCommand::Search,
        "filter" => ViewerCommand::Filter,
        "page" => ViewerCommand::Page(number(words.next(), "page", "a page number")?),
        "row" => ViewerCommand::Row(number(words.next(), "row", "a row index")?),
        "ops" => match words.next() {
            Some(raw) => ViewerCommand::Ops(Some(number(Some(raw), "ops", "a row index")?)),
            None => ViewerCommand::Ops(None),
        },
        "post" => ViewerCommand::Post,
        "refresh" => ViewerCommand::Refresh,
        "layout" => match words.next() {
            Some("desktop") => ViewerCommand::Layout { desktop: true },
            Some("mobile") => ViewerCommand::Layout { desktop: false },
            _ => {
                return Err(CommandError::MissingArgument {
                    command: "layout",
                    argument: "`desktop` or `mobile`",
                })
            }
        },
        "choose" => ViewerCommand::Choose(number(words.next(), "choose", "an entry number")?),
        "submit" => ViewerCommand::Submit(words.map(str::to_string).collect()),
        "cancel" => ViewerCommand::Cancel,
        "help" | "?" => ViewerCommand::Help,
        "quit" | "exit" => ViewerCommand::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(command)
}

/// Reads `value` as JSON when it parses, otherwise as a plain string.
fn literal(value: &str) -> Value {
    serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()))
}

/// Writes `value` under a dotted `path`, creating nested objects on the way.
fn assign(target: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            target.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(nested) = entry {
                assign(nested, rest, value);
            }
        }
    }
}

/// Applies `key=value` / `outer.inner=value` arguments onto `target`.
pub fn apply_assignments(
    target: &mut Map<String, Value>,
    args: &[String],
) -> Result<(), CommandError> {
    for arg in args {
        let (key, value) = arg
            .split_once('=')
            .filter(|(key, _)| !key.is_empty())
            .ok_or_else(|| CommandError::InvalidAssignment(arg.clone()))?;
        assign(target, key, literal(value));
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
