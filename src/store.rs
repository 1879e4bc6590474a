// 3.0: the order store. single source of truth for order state, keyed by
// monotonic id so iteration order is creation order.
//
// 3.1: the claim API is the concurrency story. Open -> Processing is a
// conditional single-writer transition: a claim only succeeds if the row is
// still Open, so two overlapping trigger sweeps cannot both execute the same
// order. a lost claim is skipped, never surfaced.

use crate::order::{Order, OrderStatus};
use crate::types::{OrderId, Price, Segment, Symbol, Timestamp, UserId};
use chrono::NaiveDate;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ClaimError {
    // another worker holds or already finished this order
    #[error("claim lost for order {0:?}")]
    ClaimLost(OrderId),

    #[error("order {0:?} not found")]
    NotFound(OrderId),
}

#[derive(Debug, Clone, Default)]
pub struct OrderStore {
    orders: BTreeMap<OrderId, Order>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self {
            orders: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, order: Order) {
        debug_assert!(!self.orders.contains_key(&order.id), "duplicate order id");
        self.orders.insert(order.id, order);
    }

    pub fn get(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    // 3.2: compare-and-swap claim. succeeds only from Open.
    pub fn try_claim(&mut self, id: OrderId) -> Result<Order, ClaimError> {
        let order = self.orders.get_mut(&id).ok_or(ClaimError::NotFound(id))?;
        if order.status != OrderStatus::Open {
            return Err(ClaimError::ClaimLost(id));
        }
        order.status = OrderStatus::Processing;
        Ok(order.clone())
    }

    // Processing -> Open, used when the quote is missing or the trigger did not fire
    pub fn revert_claim(&mut self, id: OrderId) {
        if let Some(order) = self.orders.get_mut(&id) {
            debug_assert!(order.status == OrderStatus::Processing);
            if order.status == OrderStatus::Processing {
                order.status = OrderStatus::Open;
            }
        }
    }

    // Processing -> Closed with the fill recorded
    pub fn close_claimed(&mut self, id: OrderId, fill_price: Price, executed_at: Timestamp) {
        if let Some(order) = self.orders.get_mut(&id) {
            debug_assert!(order.status == OrderStatus::Processing);
            if order.status == OrderStatus::Processing {
                order.status = OrderStatus::Closed;
                order.fill_price = Some(fill_price);
                order.executed_at = Some(executed_at);
            }
        }
    }

    // Open -> Cancelled. returns the row so the caller can refund its block.
    pub fn cancel(&mut self, id: OrderId) -> Option<Order> {
        let order = self.orders.get_mut(&id)?;
        if order.status != OrderStatus::Open {
            return None;
        }
        order.status = OrderStatus::Cancelled;
        Some(order.clone())
    }

    pub fn update_open_terms(&mut self, id: OrderId, qty: i64, trigger: Price) {
        if let Some(order) = self.orders.get_mut(&id) {
            debug_assert!(order.status == OrderStatus::Open);
            order.qty = qty;
            order.trigger_price = Some(trigger);
        }
    }

    // EOD migration: delivery rows leave the live store once they become holdings
    pub fn remove(&mut self, id: OrderId) -> Option<Order> {
        self.orders.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    // open orders in creation order, the trigger sweep's worklist
    pub fn open_ids(&self) -> Vec<OrderId> {
        self.orders
            .values()
            .filter(|o| o.status == OrderStatus::Open)
            .map(|o| o.id)
            .collect()
    }

    pub fn open_for_user(&self, user_id: UserId) -> impl Iterator<Item = &Order> {
        self.orders
            .values()
            .filter(move |o| o.user_id == user_id && o.status == OrderStatus::Open)
    }

    pub fn closed_for_user(&self, user_id: UserId) -> impl Iterator<Item = &Order> {
        self.orders
            .values()
            .filter(move |o| o.user_id == user_id && o.status == OrderStatus::Closed)
    }

    // today's executions for a user, optionally narrowed to one segment
    pub fn closed_on<'a>(
        &'a self,
        user_id: UserId,
        date: NaiveDate,
        utc_offset_secs: i32,
        segment: Option<Segment>,
    ) -> impl Iterator<Item = &'a Order> {
        self.orders.values().filter(move |o| {
            o.user_id == user_id
                && o.status == OrderStatus::Closed
                && segment.map_or(true, |s| o.segment == s)
                && o.executed_at
                    .map_or(false, |t| t.trading_date(utc_offset_secs) == date)
        })
    }

    // signed executed quantity today for (user, symbol): BUY - SELL
    pub fn net_executed_today(
        &self,
        user_id: UserId,
        symbol: &Symbol,
        date: NaiveDate,
        utc_offset_secs: i32,
    ) -> i64 {
        self.closed_on(user_id, date, utc_offset_secs, None)
            .filter(|o| &o.symbol == symbol)
            .map(|o| o.side.sign() * o.qty)
            .sum()
    }

    pub fn symbols_traded_today(
        &self,
        user_id: UserId,
        date: NaiveDate,
        utc_offset_secs: i32,
        segment: Option<Segment>,
    ) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self
            .closed_on(user_id, date, utc_offset_secs, segment)
            .map(|o| o.symbol.clone())
            .collect();
        symbols.sort();
        symbols.dedup();
        symbols
    }

    pub fn user_ids(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self.orders.values().map(|o| o.user_id).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}
