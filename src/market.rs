//! Player market: creatures listed for tokens.
//!
//! A listing takes the creature out of the seller's collection until it is
//! bought or withdrawn.

use crate::collection::CollectionLedger;
use crate::creature::{Creature, OwnerId};
use crate::errors::{CollectorError, CollectorResult, NotFoundError, PreconditionError};
use crate::profile::{Currency, ProfileBook};
use crate::species::SpeciesDataProvider;
use crate::stats::{DerivedStats, Evs, Ivs};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: u32,
    pub seller: OwnerId,
    pub price: u64,
    pub creature: Creature,
}

/// A listing the seller still has to confirm. Nothing has been written yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingListing {
    pub seller: OwnerId,
    pub creature_id: u32,
    pub price: u64,
    /// The creature as it was when the listing was prepared
    pub snapshot: Creature,
}

/// One row of a market page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingSummary {
    pub listing_id: u32,
    pub name: String,
    pub level: u8,
    pub seller: OwnerId,
    pub price: u64,
    pub iv_percentage: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketPage {
    pub page: usize,
    pub total_pages: usize,
    pub entries: Vec<ListingSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingInfo {
    pub summary: ListingSummary,
    pub stats: DerivedStats,
    pub ivs: Ivs,
    pub evs: Evs,
    pub nature: String,
    pub ability: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purchase {
    pub listing_id: u32,
    pub seller: OwnerId,
    pub price: u64,
    /// Id of the creature in the buyer's collection
    pub creature_id: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Market {
    listings: BTreeMap<u32, Listing>,
    /// Last listing id handed out; ids are never reused
    last_id: u32,
}

impl Market {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    pub fn get(&self, listing_id: u32) -> CollectorResult<&Listing> {
        self.listings
            .get(&listing_id)
            .ok_or_else(|| NotFoundError::Listing(listing_id).into())
    }

    /// Check a listing request and describe it for confirmation.
    pub fn prepare_listing(
        &self,
        ledger: &CollectionLedger,
        seller: &str,
        creature_id: u32,
        price: u64,
    ) -> CollectorResult<PendingListing> {
        if price == 0 {
            return Err(CollectorError::invalid("price must be positive"));
        }
        let creature = ledger.get(seller, creature_id)?;
        Ok(PendingListing {
            seller: seller.to_string(),
            creature_id,
            price,
            snapshot: creature.clone(),
        })
    }

    /// Publish a confirmed listing. The creature leaves the seller's
    /// collection. Fails if the collection changed since `prepare_listing`.
    pub fn commit_listing(&mut self, ledger: &mut CollectionLedger, pending: PendingListing) -> CollectorResult<u32> {
        let current = ledger.get(&pending.seller, pending.creature_id)?;
        if *current != pending.snapshot {
            return Err(PreconditionError::Stale(format!(
                "creature #{} changed before the listing was confirmed",
                pending.creature_id
            ))
            .into());
        }

        let creature = ledger.remove(&pending.seller, pending.creature_id)?;
        self.last_id += 1;
        let id = self.last_id;
        info!(seller = %pending.seller, listing_id = id, price = pending.price, species = %creature.species, "listing published");
        self.listings.insert(
            id,
            Listing {
                id,
                seller: pending.seller,
                price: pending.price,
                creature,
            },
        );
        Ok(id)
    }

    /// Take a listing down; the creature goes back to the seller.
    pub fn withdraw(&mut self, ledger: &mut CollectionLedger, seller: &str, listing_id: u32) -> CollectorResult<u32> {
        if self.get(listing_id)?.seller != seller {
            return Err(PreconditionError::NotListingOwner(listing_id).into());
        }
        let listing = self
            .listings
            .remove(&listing_id)
            .ok_or(NotFoundError::Listing(listing_id))?;
        let id = ledger.append(seller, listing.creature);
        info!(seller = %seller, listing_id, creature_id = id, "listing withdrawn");
        Ok(id)
    }

    /// Buy a listing: tokens go from buyer to seller, the creature to the
    /// buyer's collection with its original trainer kept.
    pub fn buy(
        &mut self,
        ledger: &mut CollectionLedger,
        profiles: &mut ProfileBook,
        buyer: &str,
        listing_id: u32,
        region: &str,
    ) -> CollectorResult<Purchase> {
        let listing = self.get(listing_id)?;
        if listing.seller == buyer {
            return Err(PreconditionError::OwnListing.into());
        }
        let price = listing.price;
        profiles.get_mut(buyer)?.spend(Currency::Tokens, price)?;

        let listing = self
            .listings
            .remove(&listing_id)
            .ok_or(NotFoundError::Listing(listing_id))?;
        profiles
            .get_or_create(&listing.seller, region)
            .credit(Currency::Tokens, price);
        let creature_id = ledger.append(buyer, listing.creature);

        info!(buyer = %buyer, seller = %listing.seller, listing_id, price, "listing sold");
        Ok(Purchase {
            listing_id,
            seller: listing.seller,
            price,
            creature_id,
        })
    }

    pub fn total_pages(&self, page_size: usize) -> usize {
        self.listings.len().div_ceil(page_size.max(1))
    }

    /// Listings in id order, `page_size` per page, pages numbered from 1.
    pub fn page(&self, page: usize, page_size: usize) -> CollectorResult<MarketPage> {
        let page_size = page_size.max(1);
        let total_pages = self.total_pages(page_size);
        if page == 0 || page > total_pages {
            return Err(CollectorError::invalid(format!(
                "page {} outside 1..={}",
                page, total_pages
            )));
        }

        let entries = self
            .listings
            .values()
            .skip((page - 1) * page_size)
            .take(page_size)
            .map(summarize)
            .collect();
        Ok(MarketPage {
            page,
            total_pages,
            entries,
        })
    }

    /// Full detail for one listing.
    pub fn info<P: SpeciesDataProvider + ?Sized>(&self, provider: &P, listing_id: u32) -> CollectorResult<ListingInfo> {
        let listing = self.get(listing_id)?;
        let creature = &listing.creature;
        Ok(ListingInfo {
            summary: summarize(listing),
            stats: creature.derived_stats(provider)?,
            ivs: creature.ivs,
            evs: creature.evs,
            nature: creature.nature.to_string(),
            ability: creature.ability.clone(),
        })
    }

    /// Drop every listing by `seller`, returning them.
    pub fn remove_seller(&mut self, seller: &str) -> Vec<Listing> {
        let ids: Vec<u32> = self
            .listings
            .values()
            .filter(|l| l.seller == seller)
            .map(|l| l.id)
            .collect();
        ids.iter().filter_map(|id| self.listings.remove(id)).collect()
    }
}

fn summarize(listing: &Listing) -> ListingSummary {
    ListingSummary {
        listing_id: listing.id,
        name: listing.creature.display_name().to_string(),
        level: listing.creature.level,
        seller: listing.seller.clone(),
        price: listing.price,
        iv_percentage: listing.creature.iv_percentage(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creature::test_support::sample_creature;
    use crate::species::SpeciesCatalog;
    use pretty_assertions::assert_eq;

    struct Fixture {
        catalog: SpeciesCatalog,
        ledger: CollectionLedger,
        profiles: ProfileBook,
        market: Market,
    }

    fn fixture() -> Fixture {
        let catalog = SpeciesCatalog::builtin().unwrap();
        let mut ledger = CollectionLedger::new();
        let mut profiles = ProfileBook::new();
        for (user, species) in [("ash", ["Pikachu", "Pidgey"]), ("gary", ["Eevee", "Onix"])] {
            profiles.start(user, user, "Kanto").unwrap();
            for name in species {
                ledger.append(user, sample_creature(&catalog, name, user));
            }
        }
        Fixture {
            catalog,
            ledger,
            profiles,
            market: Market::new(),
        }
    }

    fn list(f: &mut Fixture, seller: &str, id: u32, price: u64) -> u32 {
        let pending = f.market.prepare_listing(&f.ledger, seller, id, price).unwrap();
        f.market.commit_listing(&mut f.ledger, pending).unwrap()
    }

    #[test]
    fn test_prepare_writes_nothing() {
        let f = fixture();
        let pending = f.market.prepare_listing(&f.ledger, "ash", 1, 500).unwrap();

        assert_eq!(pending.snapshot.species, "Pikachu");
        assert_eq!(f.ledger.len("ash"), 2);
        assert!(f.market.is_empty());
    }

    #[test]
    fn test_prepare_rejects_bad_requests() {
        let f = fixture();
        assert!(matches!(
            f.market.prepare_listing(&f.ledger, "ash", 1, 0),
            Err(CollectorError::InvalidArgument(_))
        ));
        assert!(matches!(
            f.market.prepare_listing(&f.ledger, "ash", 3, 10),
            Err(CollectorError::NotFound(_))
        ));
    }

    #[test]
    fn test_commit_removes_and_renumbers() {
        let mut f = fixture();
        let id = list(&mut f, "ash", 1, 500);

        assert_eq!(id, 1);
        assert_eq!(f.ledger.len("ash"), 1);
        assert_eq!(f.ledger.get("ash", 1).unwrap().species, "Pidgey");
        assert_eq!(f.market.get(1).unwrap().creature.species, "Pikachu");
    }

    #[test]
    fn test_commit_refuses_stale_request() {
        let mut f = fixture();
        let pending = f.market.prepare_listing(&f.ledger, "ash", 1, 500).unwrap();
        f.ledger.remove("ash", 1).unwrap();

        let result = f.market.commit_listing(&mut f.ledger, pending);
        assert!(matches!(
            result,
            Err(CollectorError::PreconditionFailed(PreconditionError::Stale(_)))
        ));
        assert!(f.market.is_empty());
        assert_eq!(f.ledger.len("ash"), 1);
    }

    #[test]
    fn test_listing_ids_never_reused() {
        let mut f = fixture();
        let first = list(&mut f, "ash", 1, 100);
        f.market.withdraw(&mut f.ledger, "ash", first).unwrap();
        let second = list(&mut f, "ash", 1, 100);
        assert_eq!((first, second), (1, 2));
    }

    #[test]
    fn test_withdraw_only_by_seller() {
        let mut f = fixture();
        let id = list(&mut f, "ash", 2, 100);

        assert_eq!(
            f.market.withdraw(&mut f.ledger, "gary", id).unwrap_err(),
            PreconditionError::NotListingOwner(id).into()
        );
        let back = f.market.withdraw(&mut f.ledger, "ash", id).unwrap();
        assert_eq!(back, 2);
        assert_eq!(f.ledger.get("ash", 2).unwrap().species, "Pidgey");
        assert!(f.market.get(id).is_err());
    }

    #[test]
    fn test_buy_moves_tokens_and_creature() {
        let mut f = fixture();
        let id = list(&mut f, "ash", 1, 300);
        f.profiles.grant("gary", Currency::Tokens, 500).unwrap();

        let purchase = f.market.buy(&mut f.ledger, &mut f.profiles, "gary", id, "Kanto").unwrap();

        assert_eq!(purchase.creature_id, 3);
        assert_eq!(purchase.seller, "ash");
        assert_eq!(f.profiles.get("gary").unwrap().tokens, 200);
        assert_eq!(f.profiles.get("ash").unwrap().tokens, 300);

        let bought = f.ledger.get("gary", 3).unwrap();
        assert_eq!(bought.species, "Pikachu");
        assert_eq!(bought.owner_id, "gary");
        assert_eq!(bought.original_trainer_id, "ash");
        assert!(f.market.is_empty());
    }

    #[test]
    fn test_buy_refusals_leave_state_alone() {
        let mut f = fixture();
        let id = list(&mut f, "ash", 1, 300);
        f.profiles.grant("ash", Currency::Tokens, 1000).unwrap();
        f.profiles.grant("gary", Currency::Tokens, 100).unwrap();

        assert_eq!(
            f.market.buy(&mut f.ledger, &mut f.profiles, "ash", id, "Kanto").unwrap_err(),
            PreconditionError::OwnListing.into()
        );
        assert_eq!(
            f.market.buy(&mut f.ledger, &mut f.profiles, "gary", id, "Kanto").unwrap_err(),
            PreconditionError::InsufficientBalance {
                needed: 300,
                available: 100
            }
            .into()
        );
        assert!(matches!(
            f.market.buy(&mut f.ledger, &mut f.profiles, "gary", 99, "Kanto"),
            Err(CollectorError::NotFound(NotFoundError::Listing(99)))
        ));
        assert_eq!(f.market.len(), 1);
        assert_eq!(f.ledger.len("gary"), 2);
    }

    #[test]
    fn test_pages() {
        let mut f = fixture();
        for _ in 0..2 {
            list(&mut f, "ash", 1, 100);
            list(&mut f, "gary", 1, 250);
        }

        let first = f.market.page(1, 3).unwrap();
        assert_eq!(first.total_pages, 2);
        assert_eq!(
            first.entries.iter().map(|e| e.listing_id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        let second = f.market.page(2, 3).unwrap();
        assert_eq!(second.entries.len(), 1);
        assert_eq!(second.entries[0].name, "Onix");
        assert_eq!(second.entries[0].iv_percentage, 100);

        assert!(matches!(f.market.page(0, 3), Err(CollectorError::InvalidArgument(_))));
        assert!(matches!(f.market.page(3, 3), Err(CollectorError::InvalidArgument(_))));
    }

    #[test]
    fn test_empty_market_has_no_pages() {
        let market = Market::new();
        assert!(market.page(1, 10).is_err());
    }

    #[test]
    fn test_info_reports_stats() {
        let mut f = fixture();
        let id = list(&mut f, "gary", 1, 100);
        let info = f.market.info(&f.catalog, id).unwrap();

        assert_eq!(info.summary.name, "Eevee");
        assert_eq!(info.ivs, [31; 6]);
        assert_eq!(info.nature, "Hardy");
        // Eevee base HP 55: (110 + 31) * 50 / 100 + 60
        assert_eq!(info.stats.hp, 130);
    }
}
