//! Scripted walk through the collector core: two trainers start, pick
//! starters, go on a safari, fight a raid and battle each other while the
//! background ticker runs.
//!
//! Usage: pokemon-collector [config.ron]

use pokemon_collector::runtime::{run_ticker, shared};
use pokemon_collector::{BattlePhase, CollectorResult, Game, GameConfig, MemoryStore};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "demo failed");
        std::process::exit(1);
    }
}

async fn run() -> CollectorResult<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => GameConfig::load(Path::new(&path))?,
        None => GameConfig::default(),
    };
    let mut game = Game::builtin(config, MemoryStore::new(), 2024)?;

    for (user, starter) in [("ash", "Pikachu"), ("gary", "Eevee")] {
        game.start(user, user)?;
        let id = game.choose_starter(user, starter)?;
        let info = game.creature_info(user, Some(id))?;
        info!(
            user,
            species = %info.creature.species,
            nature = ?info.creature.nature,
            ability = %info.creature.ability,
            iv_percentage = info.iv_percentage,
            hp = info.stats.hp,
            "starter chosen"
        );
    }

    let now = Instant::now();
    let encounter = game.start_expedition("ash", "forest", now)?;
    info!(species = %encounter.species, creature_id = encounter.creature_id, "safari encounter");

    let raid = game.start_raid("general")?;
    info!(boss = %raid.boss, level = raid.level, hp = raid.hp, "raid spawned");
    game.join_raid("general", "ash")?;
    game.join_raid("general", "gary")?;

    game.challenge("arena", "ash", "gary", now)?;
    game.respond_to_challenge("arena", "gary", true, now)?;
    let mut attacker = "ash";
    loop {
        let report = game.attack("arena", attacker, 1, now)?;
        info!(
            attacker,
            move_name = %report.move_name,
            damage = report.result.damage,
            defender_hp = report.result.defender_hp_after,
            "attack"
        );
        match report.phase {
            BattlePhase::ActiveTurn(next) if next == "ash" => attacker = "ash",
            BattlePhase::ActiveTurn(_) => attacker = "gary",
            phase => {
                info!(?phase, "battle finished");
                break;
            }
        }
    }

    let game = shared(game);
    let period = game.lock().await.config().tick_interval.min(Duration::from_millis(200));
    let (stop, shutdown) = watch::channel(false);
    let ticker = tokio::spawn(run_ticker(game.clone(), period, shutdown));
    tokio::time::sleep(period * 5).await;
    let _ = stop.send(true);
    let ticks = ticker.await.unwrap_or_default();

    let game = game.lock().await;
    for user in ["ash", "gary"] {
        let profile = game.profile(user)?;
        info!(
            user,
            creatures = game.collection(user).len(),
            battle_points = profile.battle_points,
            "trainer summary"
        );
    }
    info!(ticks, leaderboard = ?game.leaderboard(), "demo complete");
    Ok(())
}
