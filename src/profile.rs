//! User profiles: balances, inventory and starter bookkeeping.

use crate::creature::OwnerId;
use crate::errors::{CollectorError, CollectorResult, NotFoundError, PreconditionError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::Display;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: OwnerId,
    pub nickname: String,
    pub tokens: u64,
    pub redeems: u64,
    pub battle_points: u64,
    pub ev_points: u64,
    pub active_region: String,
    /// Species picked as starter, once chosen
    pub starter: Option<String>,
    /// Item name -> quantity
    #[serde(default)]
    pub inventory: BTreeMap<String, u32>,
    /// Created by a gift or reward before the user ran `start`
    #[serde(default)]
    pub implicit: bool,
}

/// The balances a profile keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Currency {
    #[strum(to_string = "tokens")]
    Tokens,
    #[strum(to_string = "redeems")]
    Redeems,
    #[strum(to_string = "battle points")]
    BattlePoints,
    #[strum(to_string = "EV points")]
    EvPoints,
}

impl Profile {
    pub fn new(user_id: &str, nickname: &str, region: &str) -> Self {
        Profile {
            user_id: user_id.to_string(),
            nickname: nickname.to_string(),
            tokens: 0,
            redeems: 0,
            battle_points: 0,
            ev_points: 0,
            active_region: region.to_string(),
            starter: None,
            inventory: BTreeMap::new(),
            implicit: false,
        }
    }

    pub fn balance(&self, currency: Currency) -> u64 {
        match currency {
            Currency::Tokens => self.tokens,
            Currency::Redeems => self.redeems,
            Currency::BattlePoints => self.battle_points,
            Currency::EvPoints => self.ev_points,
        }
    }

    fn balance_mut(&mut self, currency: Currency) -> &mut u64 {
        match currency {
            Currency::Tokens => &mut self.tokens,
            Currency::Redeems => &mut self.redeems,
            Currency::BattlePoints => &mut self.battle_points,
            Currency::EvPoints => &mut self.ev_points,
        }
    }

    /// Take `amount` out of a balance, or fail without touching it.
    pub fn spend(&mut self, currency: Currency, amount: u64) -> CollectorResult<()> {
        let balance = self.balance_mut(currency);
        if *balance < amount {
            return Err(PreconditionError::InsufficientBalance {
                needed: amount,
                available: *balance,
            }
            .into());
        }
        *balance -= amount;
        Ok(())
    }

    pub fn credit(&mut self, currency: Currency, amount: u64) -> u64 {
        let balance = self.balance_mut(currency);
        *balance = balance.saturating_add(amount);
        *balance
    }

    pub fn item_count(&self, item: &str) -> u32 {
        self.inventory.get(item).copied().unwrap_or(0)
    }

    /// Use one of `item`. Fails with `NotFound(Item)` when none are held.
    pub fn consume_item(&mut self, item: &str) -> CollectorResult<()> {
        match self.item_count(item) {
            0 => Err(NotFoundError::Item(item.to_string()).into()),
            1 => {
                self.inventory.remove(item);
                Ok(())
            }
            count => {
                self.inventory.insert(item.to_string(), count - 1);
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProfileBook {
    profiles: BTreeMap<OwnerId, Profile>,
}

impl ProfileBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a profile. Starting twice is refused; a profile created
    /// implicitly by a gift or reward is adopted with its balances.
    pub fn start(&mut self, user: &str, nickname: &str, region: &str) -> CollectorResult<&Profile> {
        let profile = self
            .profiles
            .entry(user.to_string())
            .or_insert_with(|| Profile {
                implicit: true,
                ..Profile::new(user, nickname, region)
            });
        if !profile.implicit {
            return Err(PreconditionError::AlreadyStarted(user.to_string()).into());
        }
        profile.implicit = false;
        profile.nickname = nickname.to_string();
        info!(user = %user, "profile started");
        Ok(&*profile)
    }

    pub fn contains(&self, user: &str) -> bool {
        self.profiles.contains_key(user)
    }

    pub fn get(&self, user: &str) -> CollectorResult<&Profile> {
        self.profiles
            .get(user)
            .ok_or_else(|| NotFoundError::Profile(user.to_string()).into())
    }

    pub fn get_mut(&mut self, user: &str) -> CollectorResult<&mut Profile> {
        self.profiles
            .get_mut(user)
            .ok_or_else(|| NotFoundError::Profile(user.to_string()).into())
    }

    /// The user's profile, created with zero balances if missing. Such a
    /// profile stays implicit until the user runs `start`.
    pub fn get_or_create(&mut self, user: &str, region: &str) -> &mut Profile {
        self.profiles
            .entry(user.to_string())
            .or_insert_with(|| Profile {
                implicit: true,
                ..Profile::new(user, user, region)
            })
    }

    pub fn install(&mut self, profile: Profile) {
        self.profiles.insert(profile.user_id.clone(), profile);
    }

    pub fn remove(&mut self, user: &str) -> Option<Profile> {
        self.profiles.remove(user)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.values()
    }

    /// Move `amount` of `currency` between two users. The recipient gets a
    /// zero-balance profile if they have none yet.
    pub fn gift(
        &mut self,
        from: &str,
        to: &str,
        currency: Currency,
        amount: i64,
        region: &str,
    ) -> CollectorResult<()> {
        if from == to {
            return Err(CollectorError::invalid(format!("cannot gift {} to yourself", currency)));
        }
        if amount <= 0 {
            return Err(CollectorError::invalid(format!(
                "gift amount must be positive, got {}",
                amount
            )));
        }
        let amount = amount as u64;

        self.get_mut(from)?.spend(currency, amount)?;
        self.get_or_create(to, region).credit(currency, amount);
        info!(from = %from, to = %to, amount, currency = %currency, "gift sent");
        Ok(())
    }

    /// Buy `quantity` of `item` from `shop` (item -> price). Returns the
    /// total cost.
    pub fn buy_item(
        &mut self,
        user: &str,
        item: &str,
        quantity: u32,
        shop: &BTreeMap<String, u64>,
    ) -> CollectorResult<u64> {
        let (name, price) = shop
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(item.trim()))
            .ok_or_else(|| NotFoundError::Item(item.to_string()))?;
        if quantity == 0 {
            return Err(CollectorError::invalid("quantity must be positive"));
        }
        let total = price
            .checked_mul(quantity as u64)
            .ok_or_else(|| CollectorError::invalid("order total overflows"))?;

        let profile = self.get_mut(user)?;
        let held = profile
            .item_count(name)
            .checked_add(quantity)
            .ok_or_else(|| CollectorError::invalid(format!("cannot hold that many {}", name)))?;
        profile.spend(Currency::Tokens, total)?;
        profile.inventory.insert(name.clone(), held);
        debug!(user = %user, item = %name, quantity, total, "item bought");
        Ok(total)
    }

    /// Admin grant. The user must already have a profile.
    pub fn grant(&mut self, user: &str, currency: Currency, amount: u64) -> CollectorResult<u64> {
        let balance = self.get_mut(user)?.credit(currency, amount);
        info!(user = %user, amount, currency = %currency, "balance granted");
        Ok(balance)
    }
}
