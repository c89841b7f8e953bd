//! JankenBot: rock-paper-scissors over private messages.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::Mutex;
use tracing::debug;

use crate::bot::{bot_reply, Bot};
use crate::state::Hub;

const NICK: &str = "JankenBot";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hand {
    Rock,
    Paper,
    Scissors,
}

impl Hand {
    fn parse(word: &str) -> Option<Self> {
        match word {
            "rock" | "r" => Some(Self::Rock),
            "paper" | "p" => Some(Self::Paper),
            "scissors" | "s" => Some(Self::Scissors),
            _ => None,
        }
    }

    fn random() -> Self {
        match rand::thread_rng().gen_range(0..3) {
            0 => Self::Rock,
            1 => Self::Paper,
            _ => Self::Scissors,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Rock => "rock",
            Self::Paper => "paper",
            Self::Scissors => "scissors",
        }
    }

    /// True if `self` beats `other`.
    fn beats(self, other: Self) -> bool {
        matches!(
            (self, other),
            (Self::Rock, Self::Scissors)
                | (Self::Paper, Self::Rock)
                | (Self::Scissors, Self::Paper)
        )
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    wins: u32,
    losses: u32,
    draws: u32,
}

/// Per-player state, keyed by nickname.
#[derive(Debug, Default)]
struct Table {
    /// Players with a game in progress (awaiting a hand).
    playing: HashMap<String, ()>,
    stats: HashMap<String, Tally>,
}

/// Rock-paper-scissors bot on the reserved nickname `JankenBot`.
pub struct JankenBot {
    table: Mutex<Table>,
}

impl JankenBot {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(Table::default()),
        }
    }
}

impl Default for JankenBot {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Bot for JankenBot {
    fn nick(&self) -> &str {
        NICK
    }

    async fn on_message(&self, hub: &Arc<Hub>, sender_uid: &str, sender_nick: &str, text: &str) {
        let command = text.trim().trim_start_matches('!').to_ascii_lowercase();
        debug!(from = %sender_nick, command = %command, "JankenBot message");

        match command.as_str() {
            "help" => {
                for line in [
                    "JankenBot - rock paper scissors",
                    "  start | play       begin a game",
                    "  rock|paper|scissors  play your hand",
                    "  stats              your score",
                    "  quit               abandon the game",
                ] {
                    bot_reply(hub, NICK, sender_uid, line).await;
                }
            }
            "start" | "play" => {
                let mut table = self.table.lock().await;
                table.playing.insert(sender_nick.to_string(), ());
                drop(table);
                bot_reply(
                    hub,
                    NICK,
                    sender_uid,
                    "Game on! Send rock, paper or scissors.",
                )
                .await;
            }
            "stats" => {
                let table = self.table.lock().await;
                let tally = table.stats.get(sender_nick).copied().unwrap_or_default();
                drop(table);
                bot_reply(
                    hub,
                    NICK,
                    sender_uid,
                    &format!(
                        "{}: {} won, {} lost, {} drawn",
                        sender_nick, tally.wins, tally.losses, tally.draws
                    ),
                )
                .await;
            }
            "quit" => {
                let mut table = self.table.lock().await;
                let was_playing = table.playing.remove(sender_nick).is_some();
                drop(table);
                let reply = if was_playing {
                    "Game abandoned. Come back any time."
                } else {
                    "No game in progress. Send start to play."
                };
                bot_reply(hub, NICK, sender_uid, reply).await;
            }
            other => match Hand::parse(other) {
                Some(player_hand) => {
                    let mut table = self.table.lock().await;
                    if table.playing.remove(sender_nick).is_none() {
                        drop(table);
                        bot_reply(hub, NICK, sender_uid, "No game in progress. Send start to play.")
                            .await;
                        return;
                    }
                    let bot_hand = Hand::random();
                    let tally = table.stats.entry(sender_nick.to_string()).or_default();
                    let outcome = if player_hand == bot_hand {
                        tally.draws += 1;
                        "Draw!"
                    } else if player_hand.beats(bot_hand) {
                        tally.wins += 1;
                        "You win!"
                    } else {
                        tally.losses += 1;
                        "I win!"
                    };
                    drop(table);
                    bot_reply(
                        hub,
                        NICK,
                        sender_uid,
                        &format!(
                            "You played {}, I played {}. {} Send start for another round.",
                            player_hand.as_str(),
                            bot_hand.as_str(),
                            outcome
                        ),
                    )
                    .await;
                }
                None => {
                    bot_reply(hub, NICK, sender_uid, "I don't understand that. Send help.").await;
                }
            },
        }
    }
}
