//! Standing portfolio holdings that survive past end of day.
//!
//! Two parallel books share this shape: long delivery holdings and short-carry
//! holdings (short-first quantity covered at EOD). Merging recomputes the
//! volume-weighted average price; a holding disappears when sold to zero.

use crate::types::{Money, Price, Symbol, Timestamp, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub user_id: UserId,
    pub symbol: Symbol,
    pub qty: i64,
    pub avg_price: Price,
    pub updated_at: Timestamp,
}

impl Holding {
    pub fn market_value(&self, live: Price) -> Money {
        Money::notional(self.qty, live)
    }

    pub fn unrealized_pnl(&self, live: Price) -> Money {
        Money::new(Decimal::from(self.qty) * (live.value() - self.avg_price.value()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct HoldingBook {
    holdings: BTreeMap<(UserId, Symbol), Holding>,
}

impl HoldingBook {
    pub fn new() -> Self {
        Self {
            holdings: BTreeMap::new(),
        }
    }

    pub fn get(&self, user_id: UserId, symbol: &Symbol) -> Option<&Holding> {
        self.holdings.get(&(user_id, symbol.clone()))
    }

    pub fn qty(&self, user_id: UserId, symbol: &Symbol) -> i64 {
        self.get(user_id, symbol).map_or(0, |h| h.qty)
    }

    pub fn for_user(&self, user_id: UserId) -> impl Iterator<Item = &Holding> {
        self.holdings
            .values()
            .filter(move |h| h.user_id == user_id)
    }

    // (old_qty*old_avg + add_qty*add_price) / (old_qty + add_qty)
    pub fn merge(
        &mut self,
        user_id: UserId,
        symbol: Symbol,
        qty: i64,
        price: Price,
        timestamp: Timestamp,
    ) {
        debug_assert!(qty > 0, "merge quantity must be positive");
        let entry = self
            .holdings
            .entry((user_id, symbol.clone()))
            .or_insert_with(|| Holding {
                user_id,
                symbol,
                qty: 0,
                avg_price: price,
                updated_at: timestamp,
            });

        let old_qty = Decimal::from(entry.qty);
        let add_qty = Decimal::from(qty);
        let weighted =
            (old_qty * entry.avg_price.value() + add_qty * price.value()) / (old_qty + add_qty);

        entry.qty += qty;
        entry.avg_price = Price::new_unchecked(weighted);
        entry.updated_at = timestamp;
    }

    // sell-down. removes the record when it reaches zero; returns the reduced
    // quantity (capped at what was held).
    pub fn reduce(
        &mut self,
        user_id: UserId,
        symbol: &Symbol,
        qty: i64,
        timestamp: Timestamp,
    ) -> i64 {
        let key = (user_id, symbol.clone());
        let Some(entry) = self.holdings.get_mut(&key) else {
            return 0;
        };
        let taken = entry.qty.min(qty);
        entry.qty -= taken;
        entry.updated_at = timestamp;
        if entry.qty == 0 {
            self.holdings.remove(&key);
        }
        taken
    }

    pub fn remove(&mut self, user_id: UserId, symbol: &Symbol) -> Option<Holding> {
        self.holdings.remove(&(user_id, symbol.clone()))
    }
}
