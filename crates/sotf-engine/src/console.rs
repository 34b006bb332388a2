//! Line-based console standing in for the game UI.
//!
//! Each stdin line is one intent for the local human's turn:
//!
//! - `move <piece> <cell>`: move one of your pieces onto a cell.
//! - `pass`: end the turn without acting.
//!
//! Lines typed outside your turn are ignored by the session.

use sotf_core::TurnIntent;
use tokio::io::{AsyncBufReadExt as _, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Why a console line is not an intent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntentParseError {
    /// The line was blank.
    #[error("empty line")]
    Empty,

    /// The command word is unknown.
    #[error("unknown command {command:?}; try `move <piece> <cell>` or `pass`")]
    UnknownCommand {
        /// The first word of the line.
        command: String,
    },

    /// `move` needs exactly a piece and a cell.
    #[error("usage: move <piece> <cell>")]
    MoveUsage,
}

/// Parse one console line.
pub fn parse_intent(line: &str) -> Result<TurnIntent, IntentParseError> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Err(IntentParseError::Empty);
    };
    match command.to_ascii_lowercase().as_str() {
        "pass" => Ok(TurnIntent::Pass),
        "move" => match (words.next(), words.next(), words.next()) {
            (Some(piece), Some(target), None) => Ok(TurnIntent::Move {
                piece: piece.to_owned(),
                target: target.to_owned(),
            }),
            _ => Err(IntentParseError::MoveUsage),
        },
        _ => Err(IntentParseError::UnknownCommand {
            command: command.to_owned(),
        }),
    }
}

/// Read intents from stdin on a background task.
///
/// The stream closes when stdin does; the session keeps running and every
/// later turn of the local human times out.
pub fn spawn_reader() -> mpsc::UnboundedReceiver<TurnIntent> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match parse_intent(&line) {
                    Ok(intent) => {
                        if tx.send(intent).is_err() {
                            break;
                        }
                    }
                    Err(IntentParseError::Empty) => {}
                    Err(e) => warn!(input = %line, "{e}"),
                },
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin");
                    break;
                }
            }
        }
        debug!("Console closed");
    });
    rx
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_move_and_pass() {
        assert_eq!(
            parse_intent("move SpeciesChip1_1 FieldChip2_3").unwrap(),
            TurnIntent::Move {
                piece: String::from("SpeciesChip1_1"),
                target: String::from("FieldChip2_3"),
            }
        );
        assert_eq!(parse_intent("  PASS ").unwrap(), TurnIntent::Pass);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert_eq!(parse_intent("   "), Err(IntentParseError::Empty));
        assert_eq!(parse_intent("move SpeciesChip1_1"), Err(IntentParseError::MoveUsage));
        assert_eq!(parse_intent("move a b c"), Err(IntentParseError::MoveUsage));
        assert!(matches!(
            parse_intent("jump a b"),
            Err(IntentParseError::UnknownCommand { command }) if command == "jump"
        ));
    }
}
