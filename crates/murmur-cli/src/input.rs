//! Line input parsing.
//!
//! A line starting with `/` is a command; anything else is message text for
//! the open conversation.

use murmur_app::UserCommand;
use murmur_core::RequestResponse;
use thiserror::Error;

/// Help text for `/help`.
pub const HELP: &str = "\
commands:
  /open NAME        open a friend or room
  /add USERNAME     send a friend request
  /accept ID        accept an incoming request
  /reject ID        reject an incoming request
  /block ID         block the sender of an incoming request
  /delete ID        withdraw an outgoing request
  /help             show this help
  /quit             leave
anything else is sent to the open conversation";

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Forward to the session.
    Command(UserCommand),
    /// Show [`HELP`].
    Help,
    /// Blank line.
    Empty,
}

/// Line parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    /// `/something` that is not a command.
    #[error("unknown command /{0} (try /help)")]
    UnknownCommand(String),

    /// A command without its argument.
    #[error("/{command} needs {argument}")]
    MissingArgument {
        /// Command name.
        command: String,
        /// What was expected.
        argument: &'static str,
    },

    /// A request id that is not a number.
    #[error("invalid request id {0:?}")]
    InvalidId(String),
}

/// Parse one line of input.
pub fn parse_line(line: &str) -> Result<Input, InputError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Input::Empty);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Input::Command(UserCommand::Send(line.to_owned())));
    };

    let (name, argument) = match rest.split_once(char::is_whitespace) {
        Some((name, argument)) => (name, argument.trim()),
        None => (rest, ""),
    };
    let required = |what: &'static str| {
        if argument.is_empty() {
            Err(InputError::MissingArgument { command: name.to_owned(), argument: what })
        } else {
            Ok(argument.to_owned())
        }
    };

    let command = match name {
        "help" => return Ok(Input::Help),
        "quit" | "exit" => UserCommand::Quit,
        "open" => UserCommand::Open(required("a name")?),
        "add" => UserCommand::AddFriend(required("a username")?),
        "accept" | "reject" | "block" | "delete" => {
            let response: RequestResponse =
                name.parse().map_err(|_| InputError::UnknownCommand(name.to_owned()))?;
            let raw = required("a request id")?;
            let id = raw.parse().map_err(|_| InputError::InvalidId(raw))?;
            UserCommand::Respond { id, response }
        },
        other => return Err(InputError::UnknownCommand(other.to_owned())),
    };
    Ok(Input::Command(command))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_is_sent() {
        assert_eq!(
            parse_line("  hello there "),
            Ok(Input::Command(UserCommand::Send("hello there".into())))
        );
        assert_eq!(parse_line("   "), Ok(Input::Empty));
    }

    #[test]
    fn commands_parse() {
        assert_eq!(parse_line("/open bob"), Ok(Input::Command(UserCommand::Open("bob".into()))));
        assert_eq!(
            parse_line("/add  carol "),
            Ok(Input::Command(UserCommand::AddFriend("carol".into())))
        );
        assert_eq!(
            parse_line("/delete 12"),
            Ok(Input::Command(UserCommand::Respond { id: 12, response: RequestResponse::Delete }))
        );
        assert_eq!(parse_line("/quit"), Ok(Input::Command(UserCommand::Quit)));
        assert_eq!(parse_line("/help"), Ok(Input::Help));
    }

    #[test]
    fn bad_commands_are_reported() {
        assert_eq!(parse_line("/dance"), Err(InputError::UnknownCommand("dance".into())));
        assert_eq!(parse_line("/accept x"), Err(InputError::InvalidId("x".into())));
        assert_eq!(
            parse_line("/open").unwrap_err().to_string(),
            "/open needs a name"
        );
    }
}
