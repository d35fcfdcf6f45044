//! Operator console.
//!
//! One command per line:
//!
//! ```text
//! foca | bird | ice [row col]
//! fruit <orange|banana|eggplant|lettuce|1..4>
//! clear enemies | clear fruits
//! status | quit
//! ```
//!
//! Spawn and clear commands fan out to every live session.

use crate::game::WorldCommand;
use crate::network::ServerHandle;
use crate::spawn::IceTarget;
use log::{info, warn};
use shared::{EnemyKind, FruitKind};
use std::str::FromStr;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseCommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}`")]
    Unknown(String),
    #[error("unknown fruit `{0}`")]
    UnknownFruit(String),
    #[error("invalid coordinate `{0}`")]
    InvalidCoordinate(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    World(WorldCommand),
    Status,
    Shutdown,
}

impl FromStr for OperatorCommand {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let words: Vec<String> = line.split_whitespace().map(str::to_lowercase).collect();
        let words: Vec<&str> = words.iter().map(String::as_str).collect();

        let command = match words.as_slice() {
            [] => return Err(ParseCommandError::Empty),
            ["foca"] => spawn_enemy(EnemyKind::Foca, IceTarget::default()),
            ["bird"] => spawn_enemy(EnemyKind::Bird, IceTarget::default()),
            ["ice"] => spawn_enemy(EnemyKind::Ice, IceTarget::default()),
            ["ice", row, col] => {
                let target = IceTarget::clamped(parse_coordinate(row)?, parse_coordinate(col)?);
                spawn_enemy(EnemyKind::Ice, target)
            }
            ["ice", ..] => return Err(ParseCommandError::Usage("ice [row col]")),
            ["fruit", name] => OperatorCommand::World(WorldCommand::SpawnFruit(parse_fruit(name)?)),
            ["fruit", ..] => {
                return Err(ParseCommandError::Usage(
                    "fruit <orange|banana|eggplant|lettuce|1..4>",
                ))
            }
            ["clear", "enemies"] => OperatorCommand::World(WorldCommand::ClearEnemies),
            ["clear", "fruits"] => OperatorCommand::World(WorldCommand::ClearFruits),
            ["clear", ..] => return Err(ParseCommandError::Usage("clear <enemies|fruits>")),
            ["status"] => OperatorCommand::Status,
            ["quit"] | ["exit"] => OperatorCommand::Shutdown,
            [other, ..] => return Err(ParseCommandError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

fn spawn_enemy(kind: EnemyKind, ice: IceTarget) -> OperatorCommand {
    OperatorCommand::World(WorldCommand::SpawnEnemy { kind, ice })
}

fn parse_coordinate(word: &str) -> Result<i32, ParseCommandError> {
    word.parse()
        .map_err(|_| ParseCommandError::InvalidCoordinate(word.to_string()))
}

fn parse_fruit(word: &str) -> Result<FruitKind, ParseCommandError> {
    if let Ok(number) = word.parse::<usize>() {
        return number
            .checked_sub(1)
            .and_then(|index| FruitKind::ALL.get(index).copied())
            .ok_or_else(|| ParseCommandError::UnknownFruit(word.to_string()));
    }
    FruitKind::ALL
        .into_iter()
        .find(|kind| kind.name().eq_ignore_ascii_case(word))
        .ok_or_else(|| ParseCommandError::UnknownFruit(word.to_string()))
}

/// Runs one console line. Returns false once the operator asked to quit.
pub async fn execute_line(handle: &ServerHandle, line: &str) -> bool {
    let command = match line.parse::<OperatorCommand>() {
        Ok(command) => command,
        Err(ParseCommandError::Empty) => return true,
        Err(e) => {
            warn!("Ignoring operator input: {}", e);
            return true;
        }
    };

    match command {
        OperatorCommand::World(command) => {
            handle.dispatch(command).await;
        }
        OperatorCommand::Status => {
            let sessions = handle.sessions().await;
            if sessions.is_empty() {
                info!("No clients connected");
            }
            for summary in sessions {
                info!(
                    "Client {} ({}): {:?}, {} phase, {} enemies and {} fruits pending",
                    summary.id,
                    summary.addr,
                    summary.status,
                    if summary.phase.is_bonus() { "bonus" } else { "normal" },
                    summary.enemies,
                    summary.fruits
                );
            }
        }
        OperatorCommand::Shutdown => {
            info!("Shutdown requested from console");
            handle.shutdown();
            return false;
        }
    }
    true
}

/// Consumes console lines until input ends or the operator quits.
pub async fn run_console(mut lines: mpsc::UnboundedReceiver<String>, handle: ServerHandle) {
    while let Some(line) = lines.recv().await {
        if !execute_line(&handle, &line).await {
            break;
        }
    }
}
