//! Async glue around the synchronous [`Game`].
//!
//! The game sits behind one `tokio::sync::Mutex`, so every command is
//! applied by a single writer. Flows that wait on a player release the
//! lock while they wait.

use crate::battle::BattlePhase;
use crate::creature::{Creature, OwnerId};
use crate::errors::{CollectorResult, NotFoundError};
use crate::game::{Game, TriviaResult};
use crate::persistence::Store;
use crate::prompt::{await_matching, await_reply, Outcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

pub type SharedGame<S> = Arc<Mutex<Game<S>>>;

pub fn shared<S: Store>(game: Game<S>) -> SharedGame<S> {
    Arc::new(Mutex::new(game))
}

/// Advance raids, expeditions and battle timeouts every `period` until
/// `shutdown` turns true or its sender is dropped. Returns the number of
/// ticks run.
pub async fn run_ticker<S: Store>(
    game: SharedGame<S>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut ticks = 0;

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            at = ticker.tick() => {
                let report = game.lock().await.tick(at.into_std());
                ticks += 1;
                debug!(
                    tick = ticks,
                    raid_events = report.raids.len(),
                    expedition_events = report.expeditions.len(),
                    expired_battles = report.expired_battles.len(),
                    "tick"
                );
            }
        }
    }
    info!(ticks, "ticker stopped");
    ticks
}

/// Ask a question and wait for the answer. Silence releases the user
/// without touching their score.
pub async fn play_trivia<S: Store>(
    game: &SharedGame<S>,
    user: &str,
    difficulty: &str,
    replies: &mut mpsc::Receiver<String>,
) -> CollectorResult<Outcome<TriviaResult>> {
    let limit = {
        let mut game = game.lock().await;
        game.ask_trivia(user, difficulty)?;
        game.config().prompt_timeout
    };

    match await_reply(replies, limit).await {
        Outcome::Completed(reply) => Ok(Outcome::Completed(game.lock().await.answer_trivia(user, &reply)?)),
        Outcome::Cancelled => {
            game.lock().await.cancel_trivia(user);
            Ok(Outcome::Cancelled)
        }
    }
}

/// List a creature once the seller confirms. Declining or timing out
/// leaves the collection and market untouched.
pub async fn confirm_listing<S: Store>(
    game: &SharedGame<S>,
    seller: &str,
    creature_id: u32,
    price: u64,
    replies: &mut mpsc::Receiver<bool>,
) -> CollectorResult<Outcome<u32>> {
    let (pending, limit) = {
        let game = game.lock().await;
        (
            game.prepare_listing(seller, creature_id, price)?,
            game.config().market_prompt_timeout,
        )
    };

    match await_reply(replies, limit).await {
        Outcome::Completed(true) => Ok(Outcome::Completed(game.lock().await.commit_listing(pending)?)),
        _ => {
            debug!(seller = %seller, creature_id, "listing abandoned");
            Ok(Outcome::Cancelled)
        }
    }
}

/// Release creatures once the owner confirms.
pub async fn confirm_release<S: Store>(
    game: &SharedGame<S>,
    user: &str,
    ids: &[u32],
    replies: &mut mpsc::Receiver<bool>,
) -> CollectorResult<Outcome<Vec<Creature>>> {
    let limit = {
        let game = game.lock().await;
        for id in ids {
            game.ledger().get(user, *id)?;
        }
        game.config().prompt_timeout
    };

    match await_reply(replies, limit).await {
        Outcome::Completed(true) => Ok(Outcome::Completed(game.lock().await.release(user, ids)?)),
        _ => Ok(Outcome::Cancelled),
    }
}

/// Hand creatures over once the recipient accepts. Returns their new ids.
pub async fn confirm_trade<S: Store>(
    game: &SharedGame<S>,
    from: &str,
    to: &str,
    ids: &[u32],
    replies: &mut mpsc::Receiver<bool>,
) -> CollectorResult<Outcome<Vec<u32>>> {
    let limit = {
        let game = game.lock().await;
        game.profile(to)?;
        for id in ids {
            game.ledger().get(from, *id)?;
        }
        game.config().prompt_timeout
    };

    match await_reply(replies, limit).await {
        Outcome::Completed(true) => Ok(Outcome::Completed(game.lock().await.trade(from, to, ids)?)),
        _ => Ok(Outcome::Cancelled),
    }
}

/// Wait for the challenged user to answer an open challenge. Replies are
/// (user, accept) pairs; only the opponent's count. An unanswered challenge
/// is closed.
pub async fn await_challenge<S: Store>(
    game: &SharedGame<S>,
    channel: &str,
    replies: &mut mpsc::Receiver<(OwnerId, bool)>,
) -> CollectorResult<Outcome<BattlePhase>> {
    let (opponent, limit) = {
        let game = game.lock().await;
        let session = game
            .battle(channel)
            .ok_or_else(|| NotFoundError::Session(channel.to_string()))?;
        (session.opponent.clone(), game.config().prompt_timeout)
    };

    match await_matching(replies, limit, |(user, _)| *user == opponent).await {
        Outcome::Completed((user, accept)) => {
            let now = tokio::time::Instant::now().into_std();
            let phase = game
                .lock()
                .await
                .respond_to_challenge(channel, &user, accept, now)?;
            Ok(Outcome::Completed(phase))
        }
        Outcome::Cancelled => {
            game.lock().await.abandon_challenge(channel)?;
            Ok(Outcome::Cancelled)
        }
    }
}
