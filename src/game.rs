//! The coordinator every front-end command goes through.
//!
//! `Game` owns all live state: collections, teams, profiles, the market,
//! battle/raid/expedition sessions and trivia. Each command is a method that
//! returns a typed value or a `CollectorError`, and writes the entities it
//! touched back through the injected `Store`.

use crate::attributes::AttributeGenerator;
use crate::battle::{resolve_attack, AttackResult, BattleEnd, BattlePhase, BattleSession, Combatant};
use crate::collection::CollectionLedger;
use crate::config::GameConfig;
use crate::creature::{roll_capture_moves, Creature, OwnerId};
use crate::effort::apply_effort;
use crate::errors::{CollectorError, CollectorResult, NotFoundError, PreconditionError};
use crate::expedition::{Expedition, Location};
use crate::market::{ListingInfo, Market, MarketPage, PendingListing, Purchase};
use crate::persistence::{Bucket, Store};
use crate::profile::{Currency, Profile, ProfileBook};
use crate::raid::{Raid, RaidStrike};
use crate::sessions::SessionRegistry;
use crate::species::{MoveBook, SpeciesCatalog, SpeciesDataProvider};
use crate::stats::DerivedStats;
use crate::team::Team;
use crate::trivia::{Difficulty, Trivia, TriviaAnswer, TriviaQuestion};
use crate::world::WorldData;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use schema::{SpeciesData, Stat};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// HP restored by a Potion used in battle
pub const POTION_HEAL: u16 = 20;
/// Battle points for winning a battle by defeat
pub const BATTLE_WIN_POINTS: u64 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct CreatureInfo {
    pub creature: Creature,
    pub stats: DerivedStats,
    pub iv_percentage: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackReport {
    pub move_name: String,
    pub power: u16,
    pub result: AttackResult,
    pub phase: BattlePhase,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaidEvent {
    Strike {
        channel: String,
        user: OwnerId,
        strike: RaidStrike,
    },
    Defeated {
        channel: String,
        boss: String,
        /// (participant, id of the boss in their collection)
        rewards: Vec<(OwnerId, u32)>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encounter {
    pub user: OwnerId,
    pub location: Location,
    pub species: String,
    pub creature_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpeditionEvent {
    Encounter(Encounter),
    Finished { user: OwnerId, encounters: u32 },
}

/// Everything one tick of the background driver did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub raids: Vec<RaidEvent>,
    pub expeditions: Vec<ExpeditionEvent>,
    pub expired_battles: Vec<(String, BattleEnd)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriviaResult {
    pub answer: TriviaAnswer,
    /// Tokens credited; zero for a wrong answer
    pub reward: u64,
}

pub struct Game<S: Store> {
    config: GameConfig,
    species: Box<dyn SpeciesDataProvider + Send + Sync>,
    moves: MoveBook,
    world: WorldData,
    generator: AttributeGenerator,
    store: S,
    ledger: CollectionLedger,
    teams: HashMap<OwnerId, Team>,
    profiles: ProfileBook,
    market: Market,
    /// Keyed by channel
    battles: SessionRegistry<BattleSession>,
    /// Keyed by channel
    raids: SessionRegistry<Raid>,
    /// Keyed by user
    expeditions: SessionRegistry<Expedition>,
    expedition_levels: HashMap<OwnerId, u8>,
    trivia: Trivia,
    rng: StdRng,
}

impl<S: Store> Game<S> {
    /// Build a game and load all persisted state from `store`.
    pub fn new<P>(
        config: GameConfig,
        species: P,
        moves: MoveBook,
        world: WorldData,
        store: S,
        rng: StdRng,
    ) -> CollectorResult<Self>
    where
        P: SpeciesDataProvider + Send + Sync + 'static,
    {
        config.validate()?;
        world.validate(&species)?;

        let mut ledger = CollectionLedger::new();
        for owner in store.keys(Bucket::Collections)? {
            ledger.install(&owner, store.load_collection(&owner)?)?;
        }
        let mut profiles = ProfileBook::new();
        for user in store.keys(Bucket::Profiles)? {
            if let Some(profile) = store.load_profile(&user)? {
                profiles.install(profile);
            }
        }
        let mut teams = HashMap::new();
        for owner in store.keys(Bucket::Teams)? {
            let team = store.load_team(&owner)?;
            teams.insert(owner, team);
        }
        let mut expedition_levels = HashMap::new();
        for user in store.keys(Bucket::ExpeditionLevels)? {
            if let Some(level) = store.load_expedition_level(&user)? {
                expedition_levels.insert(user, level);
            }
        }
        let market = store.load_market()?;
        let mut trivia = Trivia::new(world.trivia.clone());
        trivia.set_scores(store.load_scores()?);

        info!(
            profiles = profiles.iter().count(),
            listings = market.len(),
            "game state loaded"
        );

        Ok(Game {
            generator: AttributeGenerator::new(config.hidden_ability_chance, config.iv_roll),
            config,
            species: Box::new(species),
            moves,
            world,
            store,
            ledger,
            teams,
            profiles,
            market,
            battles: SessionRegistry::new(),
            raids: SessionRegistry::new(),
            expeditions: SessionRegistry::new(),
            expedition_levels,
            trivia,
            rng,
        })
    }

    /// A game over the compiled-in data set.
    pub fn builtin(config: GameConfig, store: S, seed: u64) -> CollectorResult<Self> {
        Self::new(
            config,
            SpeciesCatalog::builtin()?,
            MoveBook::builtin()?,
            WorldData::builtin()?,
            store,
            StdRng::seed_from_u64(seed),
        )
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn ledger(&self) -> &CollectionLedger {
        &self.ledger
    }

    pub fn market(&self) -> &Market {
        &self.market
    }

    pub fn profile(&self, user: &str) -> CollectorResult<&Profile> {
        self.profiles.get(user)
    }

    pub fn collection(&self, user: &str) -> &[Creature] {
        self.ledger.list(user)
    }

    pub fn battle(&self, channel: &str) -> Option<&BattleSession> {
        self.battles.get(channel)
    }

    pub fn raid(&self, channel: &str) -> Option<&Raid> {
        self.raids.get(channel)
    }

    pub fn expedition(&self, user: &str) -> Option<&Expedition> {
        self.expeditions.get(user)
    }

    // ---- profiles -------------------------------------------------------

    #[instrument(skip(self))]
    pub fn start(&mut self, user: &str, nickname: &str) -> CollectorResult<Profile> {
        let profile = self
            .profiles
            .start(user, nickname, &self.config.default_region)?
            .clone();
        self.ledger.open(user);
        self.teams
            .entry(user.to_string())
            .or_insert_with(|| Team::new(user));
        self.save_user(user)?;
        Ok(profile)
    }

    /// Pick the one starter a profile gets. It is appended and selected.
    #[instrument(skip(self))]
    pub fn choose_starter(&mut self, user: &str, species_name: &str) -> CollectorResult<u32> {
        if self.profiles.get(user)?.starter.is_some() {
            return Err(PreconditionError::StarterAlreadyChosen.into());
        }
        let name = self
            .world
            .starters
            .iter()
            .find(|s| s.eq_ignore_ascii_case(species_name.trim()))
            .cloned()
            .ok_or_else(|| {
                CollectorError::invalid(format!(
                    "{} is not a starter, choose one of {}",
                    species_name,
                    self.world.starters.join(", ")
                ))
            })?;

        let level = self.config.starter_level;
        let id = self.capture_for(user, &name, level)?;
        self.ledger.select(user, id)?;
        self.profiles.get_mut(user)?.starter = Some(name);
        self.save_user(user)?;
        Ok(id)
    }

    #[instrument(skip(self))]
    pub fn gift_tokens(&mut self, from: &str, to: &str, amount: i64) -> CollectorResult<()> {
        self.gift(from, to, Currency::Tokens, amount)
    }

    #[instrument(skip(self))]
    pub fn gift_redeems(&mut self, from: &str, to: &str, amount: i64) -> CollectorResult<()> {
        self.gift(from, to, Currency::Redeems, amount)
    }

    fn gift(&mut self, from: &str, to: &str, currency: Currency, amount: i64) -> CollectorResult<()> {
        self.profiles
            .gift(from, to, currency, amount, &self.config.default_region)?;
        self.save_profile(from)?;
        self.save_profile(to)
    }

    /// Returns the tokens spent.
    #[instrument(skip(self))]
    pub fn buy_item(&mut self, user: &str, item: &str, quantity: u32) -> CollectorResult<u64> {
        let total = self.profiles.buy_item(user, item, quantity, &self.config.shop)?;
        self.save_profile(user)?;
        Ok(total)
    }

    /// Spend one redeem on a creature of `species_name`.
    #[instrument(skip(self))]
    pub fn redeem(&mut self, user: &str, species_name: &str) -> CollectorResult<u32> {
        let name = self.species.get_species(species_name)?.name.clone();
        self.profiles.get_mut(user)?.spend(Currency::Redeems, 1)?;
        let level = self.roll_capture_level();
        let id = self.capture_for(user, &name, level)?;
        self.save_user(user)?;
        Ok(id)
    }

    /// Spend the profile's EV points on one stat of one creature.
    #[instrument(skip(self))]
    pub fn train_evs(&mut self, user: &str, creature_id: u32, stat: Stat, points: u16) -> CollectorResult<DerivedStats> {
        let creature = self.ledger.get(user, creature_id)?;
        let was_full = creature.current_hp >= creature.max_hp(&*self.species)?;
        let mut evs = creature.evs;
        apply_effort(&mut evs, stat, points)?;

        self.profiles
            .get_mut(user)?
            .spend(Currency::EvPoints, points as u64)?;

        let creature = self.ledger.get_mut(user, creature_id)?;
        creature.evs = evs;
        if was_full {
            creature.restore_hp(&*self.species)?;
        }
        let stats = creature.derived_stats(&*self.species)?;
        self.save_user(user)?;
        Ok(stats)
    }

    /// Drop everything the game knows about `user`, including their listings.
    #[instrument(skip(self))]
    pub fn admin_wipe(&mut self, user: &str) -> CollectorResult<()> {
        self.profiles.remove(user);
        self.ledger.forget(user);
        self.teams.remove(user);
        self.expedition_levels.remove(user);
        self.expeditions.destroy(user);
        self.trivia.forget(user);
        let withdrawn = self.market.remove_seller(user);

        self.store.delete_user(user)?;
        self.store.save_scores(self.trivia.scores())?;
        self.store.save_market(&self.market)?;
        info!(user = %user, listings = withdrawn.len(), "user wiped");
        Ok(())
    }

    /// Returns the new balance.
    #[instrument(skip(self))]
    pub fn admin_grant(&mut self, user: &str, currency: Currency, amount: u64) -> CollectorResult<u64> {
        let balance = self.profiles.grant(user, currency, amount)?;
        self.save_profile(user)?;
        Ok(balance)
    }

    pub fn grant_tokens(&mut self, user: &str, amount: u64) -> CollectorResult<u64> {
        self.admin_grant(user, Currency::Tokens, amount)
    }

    pub fn grant_redeems(&mut self, user: &str, amount: u64) -> CollectorResult<u64> {
        self.admin_grant(user, Currency::Redeems, amount)
    }

    // ---- collection -----------------------------------------------------

    pub fn pokedex(&self, species_name: &str) -> CollectorResult<&SpeciesData> {
        self.species.get_species(species_name)
    }

    /// Details of creature `id`, or of the selected creature when `id` is None.
    pub fn creature_info(&self, user: &str, id: Option<u32>) -> CollectorResult<CreatureInfo> {
        let creature = match id {
            Some(id) => self.ledger.get(user, id)?,
            None => self.ledger.require_selected(user)?,
        };
        Ok(CreatureInfo {
            stats: creature.derived_stats(&*self.species)?,
            iv_percentage: creature.iv_percentage(),
            creature: creature.clone(),
        })
    }

    /// Select a creature. Refused while a raid runs in `channel` or while the
    /// user is battling.
    #[instrument(skip(self))]
    pub fn select(&mut self, user: &str, creature_id: u32, channel: &str) -> CollectorResult<()> {
        if self.raids.contains(channel) {
            return Err(PreconditionError::RaidInProgress(channel.to_string()).into());
        }
        if let Some(channel) = self.battle_channel_of(user) {
            return Err(PreconditionError::SessionActive(channel).into());
        }
        self.ledger.select(user, creature_id)?;
        self.save_collection(user)
    }

    #[instrument(skip(self))]
    pub fn release(&mut self, user: &str, ids: &[u32]) -> CollectorResult<Vec<Creature>> {
        if let Some(channel) = self.battle_channel_of(user) {
            return Err(PreconditionError::SessionActive(channel).into());
        }
        let released = self.ledger.remove_many(user, ids)?;
        self.reconcile_team(user, ids);
        self.save_user(user)?;
        info!(user = %user, count = released.len(), "creatures released");
        Ok(released)
    }

    /// Give creatures to another user who has started. Returns their new ids.
    #[instrument(skip(self))]
    pub fn trade(&mut self, from: &str, to: &str, ids: &[u32]) -> CollectorResult<Vec<u32>> {
        self.profiles.get(to)?;
        if let Some(channel) = self.battle_channel_of(from) {
            return Err(PreconditionError::SessionActive(channel).into());
        }
        let new_ids = self.ledger.transfer_many(from, to, ids)?;
        self.reconcile_team(from, ids);
        self.save_user(from)?;
        self.save_user(to)?;
        Ok(new_ids)
    }

    // ---- team -----------------------------------------------------------

    #[instrument(skip(self))]
    pub fn team_add(&mut self, user: &str, slot: u8, creature_id: u32) -> CollectorResult<()> {
        let collection_len = self.ledger.len(user);
        self.teams
            .entry(user.to_string())
            .or_insert_with(|| Team::new(user))
            .add(slot, creature_id, collection_len)?;
        self.save_team(user)
    }

    #[instrument(skip(self))]
    pub fn team_remove(&mut self, user: &str, slot: u8) -> CollectorResult<u32> {
        let id = self
            .teams
            .get_mut(user)
            .ok_or_else(|| PreconditionError::SlotEmpty(slot))?
            .remove(slot)?;
        self.save_team(user)?;
        Ok(id)
    }

    /// (slot, creature) for each filled slot
    pub fn team(&self, user: &str) -> Vec<(u8, &Creature)> {
        self.teams
            .get(user)
            .map(|team| {
                team.members()
                    .filter_map(|(slot, id)| self.ledger.get(user, id).ok().map(|c| (slot, c)))
                    .collect()
            })
            .unwrap_or_default()
    }

    // ---- market ---------------------------------------------------------

    /// First half of listing: nothing changes until `commit_listing`.
    #[instrument(skip(self))]
    pub fn prepare_listing(&self, user: &str, creature_id: u32, price: u64) -> CollectorResult<PendingListing> {
        self.profiles.get(user)?;
        self.market.prepare_listing(&self.ledger, user, creature_id, price)
    }

    #[instrument(skip(self))]
    pub fn commit_listing(&mut self, pending: PendingListing) -> CollectorResult<u32> {
        let seller = pending.seller.clone();
        let creature_id = pending.creature_id;
        if let Some(channel) = self.battle_channel_of(&seller) {
            return Err(PreconditionError::SessionActive(channel).into());
        }
        let listing_id = self.market.commit_listing(&mut self.ledger, pending)?;
        self.reconcile_team(&seller, &[creature_id]);
        self.save_user(&seller)?;
        self.store.save_market(&self.market)?;
        Ok(listing_id)
    }

    #[instrument(skip(self))]
    pub fn withdraw_listing(&mut self, user: &str, listing_id: u32) -> CollectorResult<u32> {
        let id = self.market.withdraw(&mut self.ledger, user, listing_id)?;
        self.save_collection(user)?;
        self.store.save_market(&self.market)?;
        Ok(id)
    }

    #[instrument(skip(self))]
    pub fn buy_listing(&mut self, buyer: &str, listing_id: u32) -> CollectorResult<Purchase> {
        let purchase = self.market.buy(
            &mut self.ledger,
            &mut self.profiles,
            buyer,
            listing_id,
            &self.config.default_region,
        )?;
        self.save_user(buyer)?;
        self.save_profile(&purchase.seller)?;
        self.store.save_market(&self.market)?;
        Ok(purchase)
    }

    pub fn market_page(&self, page: usize) -> CollectorResult<MarketPage> {
        self.market.page(page, self.config.market_page_size)
    }

    pub fn listing_info(&self, listing_id: u32) -> CollectorResult<ListingInfo> {
        self.market.info(&*self.species, listing_id)
    }

    // ---- battles --------------------------------------------------------

    /// Open a challenge in `channel`. Both sides need a selected creature
    /// and neither may already be battling.
    #[instrument(skip(self, now))]
    pub fn challenge(&mut self, channel: &str, challenger: &str, opponent: &str, now: Instant) -> CollectorResult<()> {
        if challenger == opponent {
            return Err(PreconditionError::SelfTarget.into());
        }
        for user in [challenger, opponent] {
            if let Some(active) = self.battle_channel_of(user) {
                return Err(PreconditionError::SessionActive(active).into());
            }
        }
        self.ledger.require_selected(challenger)?;
        self.ledger.require_selected(opponent)?;

        let session = BattleSession::new(challenger, opponent, now, self.config.prompt_timeout)?;
        self.battles.create(channel, session)?;
        info!(channel = %channel, challenger = %challenger, opponent = %opponent, "challenge issued");
        Ok(())
    }

    #[instrument(skip(self, now))]
    pub fn respond_to_challenge(&mut self, channel: &str, user: &str, accept: bool, now: Instant) -> CollectorResult<BattlePhase> {
        let result = self
            .battles
            .require_mut(channel)?
            .respond(user, accept, now)
            .cloned();
        self.settle_battle(channel)?;
        result
    }

    /// Attack with the move in `move_slot` (1-based) of the selected creature.
    #[instrument(skip(self, now))]
    pub fn attack(&mut self, channel: &str, user: &str, move_slot: usize, now: Instant) -> CollectorResult<AttackReport> {
        let defender_id = self.begin_turn(channel, user, now)?;

        let attacker = self.ledger.require_selected(user)?;
        let move_name = move_slot
            .checked_sub(1)
            .and_then(|i| attacker.moves.get(i))
            .cloned()
            .ok_or_else(|| {
                CollectorError::invalid(format!(
                    "move slot {} outside 1..={}",
                    move_slot,
                    attacker.moves.len()
                ))
            })?;
        let power = self.moves.power(&move_name)?;
        let attacking = Combatant::from_creature(attacker, &*self.species)?;
        let defending = Combatant::from_creature(self.ledger.require_selected(&defender_id)?, &*self.species)?;

        let result = resolve_attack(&attacking, &defending, power)?;
        self.ledger.require_selected_mut(&defender_id)?.current_hp = result.defender_hp_after;
        debug!(attacker = %user, defender = %defender_id, move_name = %move_name, damage = result.damage, "attack resolved");

        let phase = self
            .battles
            .require_mut(channel)?
            .record_attack(user, &result, now)?
            .clone();
        if self.settle_battle(channel)?.is_none() {
            self.save_collection(&defender_id)?;
        }

        Ok(AttackReport {
            move_name,
            power,
            result,
            phase,
        })
    }

    /// Use an item from the inventory instead of attacking. A Potion heals
    /// the selected creature; the turn passes either way.
    #[instrument(skip(self, now))]
    pub fn use_item(&mut self, channel: &str, user: &str, item: &str, now: Instant) -> CollectorResult<BattlePhase> {
        self.begin_turn(channel, user, now)?;

        let profile = self.profiles.get_mut(user)?;
        let held = profile
            .inventory
            .keys()
            .find(|name| name.eq_ignore_ascii_case(item.trim()))
            .cloned()
            .ok_or_else(|| NotFoundError::Item(item.to_string()))?;
        profile.consume_item(&held)?;

        if held.eq_ignore_ascii_case("potion") {
            let creature = self.ledger.require_selected_mut(user)?;
            let max = creature.max_hp(&*self.species)?;
            creature.current_hp = creature.current_hp.saturating_add(POTION_HEAL).min(max);
        }

        let phase = self.battles.require_mut(channel)?.pass_turn(user, now)?.clone();
        self.save_user(user)?;
        Ok(phase)
    }

    #[instrument(skip(self))]
    pub fn forfeit(&mut self, channel: &str, user: &str) -> CollectorResult<BattleEnd> {
        self.battles.require_mut(channel)?.forfeit(user)?;
        self.settle_battle(channel)?
            .ok_or_else(|| NotFoundError::Session(channel.to_string()).into())
    }

    /// End every battle whose prompt deadline has passed.
    pub fn expire_battles(&mut self, now: Instant) -> Vec<(String, BattleEnd)> {
        let mut expired = Vec::new();
        for channel in self.battles.keys() {
            let timed_out = self
                .battles
                .get_mut(&channel)
                .is_some_and(|session| session.check_deadline(now));
            if !timed_out {
                continue;
            }
            match self.settle_battle(&channel) {
                Ok(Some(reason)) => expired.push((channel, reason)),
                Ok(None) => {}
                Err(e) => warn!(channel = %channel, error = %e, "failed to close timed out battle"),
            }
        }
        expired
    }

    /// Close a challenge nobody answered in time.
    pub fn abandon_challenge(&mut self, channel: &str) -> CollectorResult<Option<BattleEnd>> {
        if let Some(session) = self.battles.get_mut(channel) {
            if session.phase == BattlePhase::WaitingForChallengeResponse {
                let deadline = session.deadline;
                session.check_deadline(deadline);
            }
        }
        self.settle_battle(channel)
    }

    /// Check the turn and return the other participant. A session that
    /// timed out during the check is closed before the error is returned.
    fn begin_turn(&mut self, channel: &str, user: &str, now: Instant) -> CollectorResult<OwnerId> {
        let session = self.battles.require_mut(channel)?;
        if let Err(e) = session.ensure_turn(user, now) {
            self.settle_battle(channel)?;
            return Err(e);
        }
        Ok(session.other(user)?.to_string())
    }

    fn battle_channel_of(&self, user: &str) -> Option<String> {
        self.battles
            .find(|session| session.is_participant(user))
            .map(|(channel, _)| channel.to_string())
    }

    /// Tear down a session that has ended: both creatures go back to full
    /// HP and a winner by defeat earns battle points.
    fn settle_battle(&mut self, channel: &str) -> CollectorResult<Option<BattleEnd>> {
        let over = self.battles.get(channel).is_some_and(BattleSession::is_over);
        if !over {
            return Ok(None);
        }
        let Some(session) = self.battles.destroy(channel) else {
            return Ok(None);
        };
        let reason = session.end_reason().cloned();

        for user in [&session.challenger, &session.opponent] {
            if let Some(creature) = self.ledger.selected_mut(user) {
                creature.restore_hp(&*self.species)?;
            }
        }
        if let Some(BattleEnd::Defeat { winner, .. }) = &reason {
            if let Ok(profile) = self.profiles.get_mut(winner) {
                profile.credit(Currency::BattlePoints, BATTLE_WIN_POINTS);
            }
        }
        self.save_user(&session.challenger)?;
        self.save_user(&session.opponent)?;
        info!(channel = %channel, reason = ?reason, turns = session.turns_taken, "battle closed");
        Ok(reason)
    }

    // ---- raids ----------------------------------------------------------

    #[instrument(skip(self))]
    pub fn start_raid(&mut self, channel: &str) -> CollectorResult<Raid> {
        if self.raids.contains(channel) {
            return Err(PreconditionError::RaidInProgress(channel.to_string()).into());
        }
        let raid = Raid::spawn(
            &self.world.raid_bosses,
            self.config.raid_level_range.clone(),
            self.config.raid_hp_per_level,
            &mut self.rng,
        )?;
        Ok(self.raids.create(channel, raid)?.clone())
    }

    #[instrument(skip(self))]
    pub fn join_raid(&mut self, channel: &str, user: &str) -> CollectorResult<()> {
        let raid = self.raids.require(channel)?;
        if raid.is_participant(user) {
            return Err(PreconditionError::AlreadyJoined(user.to_string()).into());
        }
        self.ledger.require_selected(user)?;
        self.raids.require_mut(channel)?.join(user)
    }

    /// A participant strikes the boss outside the tick.
    #[instrument(skip(self))]
    pub fn raid_attack(&mut self, channel: &str, user: &str) -> CollectorResult<Vec<RaidEvent>> {
        if !self.raids.require(channel)?.is_participant(user) {
            return Err(PreconditionError::NotAParticipant(user.to_string()).into());
        }
        let attack = self
            .ledger
            .require_selected(user)?
            .derived_stats(&*self.species)?
            .attack;
        Ok(self.strike_raid(channel, user, attack))
    }

    /// One step per participant per raid. Participants whose creature
    /// cannot be found are skipped.
    pub fn tick_raids(&mut self) -> Vec<RaidEvent> {
        let mut events = Vec::new();
        for channel in self.raids.keys() {
            let participants = match self.raids.get(&channel) {
                Some(raid) => raid.participants.clone(),
                None => continue,
            };
            for user in participants {
                if !self.raids.contains(&channel) {
                    break;
                }
                let attack = match self.ledger.selected(&user) {
                    Some(creature) => match creature.derived_stats(&*self.species) {
                        Ok(stats) => stats.attack,
                        Err(e) => {
                            warn!(channel = %channel, user = %user, error = %e, "skipping raid participant");
                            continue;
                        }
                    },
                    None => {
                        warn!(channel = %channel, user = %user, "raid participant has no selected creature");
                        continue;
                    }
                };
                events.extend(self.strike_raid(&channel, &user, attack));
            }
        }
        events
    }

    fn strike_raid(&mut self, channel: &str, user: &str, attack: u16) -> Vec<RaidEvent> {
        let Some(raid) = self.raids.get_mut(channel) else {
            return Vec::new();
        };
        let strike = raid.strike(attack, &mut self.rng);
        debug!(channel = %channel, user = %user, damage = strike.damage, boss_hp = strike.boss_hp_after, "raid strike");

        let mut events = vec![RaidEvent::Strike {
            channel: channel.to_string(),
            user: user.to_string(),
            strike,
        }];
        if strike.defeated {
            events.extend(self.end_raid(channel));
        }
        events
    }

    /// Every participant receives a fresh copy of the boss.
    fn end_raid(&mut self, channel: &str) -> Option<RaidEvent> {
        let raid = self.raids.destroy(channel)?;
        let mut rewards = Vec::new();
        for user in &raid.participants {
            let level = self.roll_capture_level();
            match self.capture_for(user, &raid.boss, level) {
                Ok(id) => {
                    rewards.push((user.clone(), id));
                    if let Err(e) = self.save_collection(user) {
                        warn!(user = %user, error = %e, "failed to save raid reward");
                    }
                }
                Err(e) => warn!(user = %user, error = %e, "failed to award raid boss"),
            }
        }
        info!(channel = %channel, boss = %raid.boss, winners = rewards.len(), "raid boss defeated");
        Some(RaidEvent::Defeated {
            channel: channel.to_string(),
            boss: raid.boss,
            rewards,
        })
    }

    // ---- expeditions ----------------------------------------------------

    /// Start a safari trip. The first encounter happens right away.
    #[instrument(skip(self, now))]
    pub fn start_expedition(&mut self, user: &str, location: &str, now: Instant) -> CollectorResult<Encounter> {
        self.profiles.get(user)?;
        let location = Location::parse(location)?;
        if self.expeditions.contains(user) {
            return Err(PreconditionError::SessionActive(user.to_string()).into());
        }

        let level = *self.expedition_levels.entry(user.to_string()).or_insert(1);
        self.store.save_expedition_level(user, level)?;
        self.expeditions
            .create(user, Expedition::new(user, location, level, now))?;
        info!(user = %user, %location, level, "expedition started");

        match self.encounter(user) {
            Ok(encounter) => Ok(encounter),
            Err(e) => {
                self.expeditions.destroy(user);
                Err(e)
            }
        }
    }

    /// Finish expired trips and give the rest one encounter each.
    pub fn tick_expeditions(&mut self, now: Instant) -> Vec<ExpeditionEvent> {
        let mut events = Vec::new();
        let duration = self.config.expedition_duration;
        for user in self.expeditions.keys() {
            let finished = self
                .expeditions
                .get(&user)
                .is_some_and(|trip| trip.is_finished(now, duration));
            if finished {
                if let Some(trip) = self.expeditions.destroy(&user) {
                    info!(user = %user, encounters = trip.encounters, "expedition finished");
                    events.push(ExpeditionEvent::Finished {
                        user,
                        encounters: trip.encounters,
                    });
                }
                continue;
            }
            match self.encounter(&user) {
                Ok(encounter) => events.push(ExpeditionEvent::Encounter(encounter)),
                Err(e) => warn!(user = %user, error = %e, "skipping expedition encounter"),
            }
        }
        events
    }

    fn encounter(&mut self, user: &str) -> CollectorResult<Encounter> {
        let trip = self.expeditions.require(user)?;
        let (location, level) = (trip.location, trip.level);
        let species = self.world.encounters.roll(location, level, &mut self.rng)?;
        let capture_level = self.roll_capture_level();
        let creature_id = self.capture_for(user, &species, capture_level)?;
        if let Some(trip) = self.expeditions.get_mut(user) {
            trip.encounters += 1;
        }
        self.save_collection(user)?;
        debug!(user = %user, species = %species, creature_id, "wild encounter");
        Ok(Encounter {
            user: user.to_string(),
            location,
            species,
            creature_id,
        })
    }

    /// One background step: raids, expeditions and battle timeouts.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        TickReport {
            raids: self.tick_raids(),
            expeditions: self.tick_expeditions(now),
            expired_battles: self.expire_battles(now),
        }
    }

    // ---- trivia ---------------------------------------------------------

    #[instrument(skip(self))]
    pub fn ask_trivia(&mut self, user: &str, difficulty: &str) -> CollectorResult<TriviaQuestion> {
        let difficulty = Difficulty::parse(difficulty)?;
        Ok(self.trivia.ask(user, difficulty, &mut self.rng)?.clone())
    }

    /// Answer the open question; a correct answer credits the reward.
    #[instrument(skip(self))]
    pub fn answer_trivia(&mut self, user: &str, reply: &str) -> CollectorResult<TriviaResult> {
        let answer = self.trivia.answer(user, reply)?;
        let reward = if answer.correct {
            self.config.trivia_reward(answer.difficulty)
        } else {
            0
        };
        if reward > 0 {
            self.profiles
                .get_or_create(user, &self.config.default_region)
                .credit(Currency::Tokens, reward);
            self.save_profile(user)?;
        }
        self.store.save_scores(self.trivia.scores())?;
        Ok(TriviaResult { answer, reward })
    }

    pub fn cancel_trivia(&mut self, user: &str) -> bool {
        self.trivia.cancel(user)
    }

    pub fn leaderboard(&self) -> Vec<(OwnerId, u32)> {
        self.trivia.leaderboard()
    }

    // ---- helpers --------------------------------------------------------

    fn roll_capture_level(&mut self) -> u8 {
        self.rng.random_range(self.config.capture_level_range.clone())
    }

    /// Generate a creature of `species_name` and append it to `owner`.
    fn capture_for(&mut self, owner: &str, species_name: &str, level: u8) -> CollectorResult<u32> {
        let provider = &*self.species;
        let attributes = self.generator.generate(provider, species_name, &mut self.rng)?;
        let moves = roll_capture_moves(provider.get_species(species_name)?, &mut self.rng);
        let creature = Creature::capture(provider, species_name, attributes, level, owner, moves)?;
        let id = self.ledger.append(owner, creature);
        info!(owner = %owner, species = %species_name, level, creature_id = id, "creature captured");
        Ok(id)
    }

    fn reconcile_team(&mut self, owner: &str, removed: &[u32]) {
        if let Some(team) = self.teams.get_mut(owner) {
            team.reconcile_removals(removed);
        }
    }

    fn save_profile(&mut self, user: &str) -> CollectorResult<()> {
        match self.profiles.get(user) {
            Ok(profile) => self.store.save_profile(profile),
            Err(_) => Ok(()),
        }
    }

    fn save_collection(&mut self, user: &str) -> CollectorResult<()> {
        self.store.save_collection(user, self.ledger.list(user))
    }

    fn save_team(&mut self, user: &str) -> CollectorResult<()> {
        match self.teams.get(user) {
            Some(team) => self.store.save_team(team),
            None => Ok(()),
        }
    }

    fn save_user(&mut self, user: &str) -> CollectorResult<()> {
        self.save_profile(user)?;
        self.save_collection(user)?;
        self.save_team(user)
    }
}
