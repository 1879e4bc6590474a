/** 8.1: main engine struct. all state lives here */

use super::results::EngineError;
use crate::config::EngineConfig;
use crate::events::{
    Event, EventId, EventPayload, FundsDepositedEvent, HoldingClosedEvent, UserRegisteredEvent,
};
use crate::funds::FundsAccount;
use crate::order::Order;
use crate::portfolio::HoldingBook;
use crate::quotes::QuoteBoard;
use crate::records::ExitLog;
use crate::store::OrderStore;
use crate::types::{Money, OrderId, Price, Symbol, Timestamp, UserId};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug)]
pub struct Engine {
    pub(super) config: EngineConfig,
    pub(super) users: HashMap<UserId, FundsAccount>,
    pub(super) orders: OrderStore,
    pub(super) long_holdings: HoldingBook,
    pub(super) short_carry: HoldingBook,
    pub(super) exits: ExitLog,
    pub(super) quotes: QuoteBoard,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
    pub(super) next_order_id: u64,
    pub(super) current_time: Timestamp,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            users: HashMap::new(),
            orders: OrderStore::new(),
            long_holdings: HoldingBook::new(),
            short_carry: HoldingBook::new(),
            exits: ExitLog::new(),
            quotes: QuoteBoard::new(),
            events: Vec::new(),
            next_event_id: 1,
            next_order_id: 1,
            current_time: Timestamp::from_millis(0),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, millis: i64) {
        self.current_time = Timestamp::from_millis(self.current_time.as_millis() + millis);
    }

    pub(super) fn today(&self) -> NaiveDate {
        self.current_time.trading_date(self.config.utc_offset_secs)
    }

    pub fn register_user(&mut self, username: &str) -> UserId {
        let id = UserId(self.users.len() as u64 + 1);
        let account = FundsAccount::new(id, username.to_string(), self.current_time);
        self.users.insert(id, account);

        self.emit_event(EventPayload::UserRegistered(UserRegisteredEvent {
            user_id: id,
            username: username.to_string(),
        }));
        id
    }

    pub fn add_funds(&mut self, user_id: UserId, amount: Decimal) -> Result<(), EngineError> {
        let account = self
            .users
            .get_mut(&user_id)
            .ok_or(EngineError::UserNotFound(user_id))?;

        account.deposit(Money::new(amount));
        let new_available = account.available;

        self.emit_event(EventPayload::FundsDeposited(FundsDepositedEvent {
            user_id,
            amount: Money::new(amount),
            new_available,
        }));
        Ok(())
    }

    pub fn get_account(&self, user_id: UserId) -> Option<&FundsAccount> {
        self.users.get(&user_id)
    }

    // oracle push: the host feeds last-traded prices in. a zero or negative
    // price is the oracle saying "no price" and is dropped.
    pub fn update_quote(&mut self, symbol: &str, price: Decimal) -> Result<(), EngineError> {
        let symbol = Symbol::new(symbol).ok_or(EngineError::InvalidSymbol)?;
        if !self.quotes.update(symbol.clone(), price, self.current_time) {
            debug!(%symbol, %price, "dropped unusable quote");
        }
        Ok(())
    }

    pub(super) fn live_price(&self, symbol: &Symbol) -> Result<Price, EngineError> {
        Ok(self
            .quotes
            .last_price(symbol, self.current_time, self.config.quote_ttl_millis)?)
    }

    // today's net executed quantity plus the standing long holding: what a
    // seller is considered to own
    pub(super) fn owned_qty(&self, user_id: UserId, symbol: &Symbol) -> i64 {
        let net = self.orders.net_executed_today(
            user_id,
            symbol,
            self.today(),
            self.config.utc_offset_secs,
        );
        (net + self.long_holdings.qty(user_id, symbol)).max(0)
    }

    pub(super) fn next_order_id(&mut self) -> OrderId {
        let id = OrderId(self.next_order_id);
        self.next_order_id += 1;
        id
    }

    pub(super) fn insert_order(&mut self, order: Order) -> OrderId {
        let id = order.id;
        self.orders.insert(order);
        id
    }

    // manual portfolio maintenance: seed or extend a standing holding
    pub fn add_holding(
        &mut self,
        user_id: UserId,
        symbol: &str,
        qty: i64,
        price: Decimal,
    ) -> Result<(), EngineError> {
        if !self.users.contains_key(&user_id) {
            return Err(EngineError::UserNotFound(user_id));
        }
        let symbol = Symbol::new(symbol).ok_or(EngineError::InvalidSymbol)?;
        if qty <= 0 {
            return Err(EngineError::InvalidQuantity(qty));
        }
        let price = Price::new(price).ok_or(EngineError::InvalidPrice(price))?;

        self.long_holdings
            .merge(user_id, symbol, qty, price, self.current_time);
        Ok(())
    }

    // close a standing holding at its stored average price and refund the
    // proceeds (no exit record: this is bookkeeping, not a market exit)
    pub fn close_holding(&mut self, user_id: UserId, symbol: &str) -> Result<Money, EngineError> {
        let symbol = Symbol::new(symbol).ok_or(EngineError::InvalidSymbol)?;
        if !self.users.contains_key(&user_id) {
            return Err(EngineError::UserNotFound(user_id));
        }

        let holding = self
            .long_holdings
            .remove(user_id, &symbol)
            .ok_or_else(|| EngineError::NoHolding(symbol.clone()))?;

        let refund = Money::notional(holding.qty, holding.avg_price);
        if let Some(account) = self.users.get_mut(&user_id) {
            account.credit(refund);
        }

        self.emit_event(EventPayload::HoldingClosed(HoldingClosedEvent {
            user_id,
            symbol,
            qty: holding.qty,
            refund,
        }));
        Ok(refund)
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), self.current_time, payload);
        self.next_event_id += 1;

        debug!(event_id = event.id.0, payload = ?event.payload, "engine event");

        self.events.push(event);

        if self.events.len() > self.config.max_events {
            let drain_count = self.events.len() - self.config.max_events;
            self.events.drain(0..drain_count);
        }
    }
}
