//! End-of-day settlement.
//!
//! Once the close cutoff has passed: cancel remaining open orders and refund
//! BUY blocks, square off the intraday net per symbol at the live price, then
//! migrate delivery remainders into the standing portfolio (long lots into
//! holdings, short-first remainders covered into short-carry). The whole
//! invocation is one logical transaction: any failure restores the
//! pre-invocation state and the next due check retries. Running it twice on
//! the same day is a no-op the second time.

use super::core::Engine;
use super::results::{EngineError, EodReport, SquareOff};
use crate::events::{
    CancelReason, EodSquareOffEvent, EventPayload, HoldingMigratedEvent, OrderCancelledEvent,
    ShortCarryCoveredEvent,
};
use crate::funds::FundsAccount;
use crate::lots::{Execution, LotBook};
use crate::order::Order;
use crate::portfolio::HoldingBook;
use crate::records::ExitRecord;
use crate::store::OrderStore;
use crate::types::{Money, OrderId, Segment, Side, Symbol, UserId};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{info, warn};

// everything one EOD invocation may touch, cloned up front so a failure can
// put it all back
struct EodSnapshot {
    account: Option<FundsAccount>,
    orders: OrderStore,
    long_holdings: HoldingBook,
    short_carry: HoldingBook,
    exits_len: usize,
    events_len: usize,
    next_order_id: u64,
    next_event_id: u64,
}

impl Engine {
    /// Lazy settlement hook for read/write paths: runs the pipeline once the
    /// cutoff has passed, logging instead of surfacing failures.
    pub fn maybe_run_end_of_day(&mut self, user_id: UserId) {
        if !self.config.is_after_close(self.current_time) {
            return;
        }
        if let Err(err) = self.run_end_of_day(user_id) {
            warn!(user = user_id.0, %err, "end-of-day settlement failed, will retry");
        }
    }

    /// Run the settlement pipeline for one user. Idempotent; safe to invoke
    /// repeatedly per day.
    pub fn run_end_of_day(&mut self, user_id: UserId) -> Result<EodReport, EngineError> {
        if !self.users.contains_key(&user_id) {
            return Err(EngineError::UserNotFound(user_id));
        }

        let snapshot = EodSnapshot {
            account: self.users.get(&user_id).cloned(),
            orders: self.orders.clone(),
            long_holdings: self.long_holdings.clone(),
            short_carry: self.short_carry.clone(),
            exits_len: self.exits.len(),
            events_len: self.events.len(),
            next_order_id: self.next_order_id,
            next_event_id: self.next_event_id,
        };

        match self.settle_day(user_id) {
            Ok(report) => {
                if !report.is_noop() {
                    info!(
                        user = user_id.0,
                        cancelled = report.cancelled_orders,
                        squared = report.square_offs.len(),
                        migrated = report.migrated.len(),
                        covered = report.covered.len(),
                        "end of day settled"
                    );
                }
                Ok(report)
            }
            Err(err) => {
                // roll the whole invocation back; retried on the next due check
                if let Some(account) = snapshot.account {
                    self.users.insert(user_id, account);
                }
                self.orders = snapshot.orders;
                self.long_holdings = snapshot.long_holdings;
                self.short_carry = snapshot.short_carry;
                self.exits.truncate(snapshot.exits_len);
                self.events.truncate(snapshot.events_len);
                self.next_order_id = snapshot.next_order_id;
                self.next_event_id = snapshot.next_event_id;
                Err(err)
            }
        }
    }

    fn settle_day(&mut self, user_id: UserId) -> Result<EodReport, EngineError> {
        let mut report = EodReport::default();

        self.cancel_open_and_refund(user_id, &mut report);
        self.square_off_intraday(user_id, &mut report)?;
        self.migrate_delivery(user_id, &mut report)?;

        Ok(report)
    }

    // step 1: every remaining open order is cancelled; BUY blocks come back
    fn cancel_open_and_refund(&mut self, user_id: UserId, report: &mut EodReport) {
        let open: Vec<OrderId> = self.orders.open_for_user(user_id).map(|o| o.id).collect();

        for id in open {
            // read the block before the transition: a cancelled row no longer
            // reports one
            let refund = self
                .orders
                .get(id)
                .and_then(|o| o.blocked_amount())
                .unwrap_or_else(Money::zero);
            if self.orders.cancel(id).is_none() {
                continue;
            }
            if refund.value() > Decimal::ZERO {
                if let Some(account) = self.users.get_mut(&user_id) {
                    account.credit(refund);
                }
                report.refunded = report.refunded.add(refund);
            }
            report.cancelled_orders += 1;

            self.emit_event(EventPayload::OrderCancelled(OrderCancelledEvent {
                order_id: id,
                user_id,
                reason: CancelReason::EndOfDay,
                refund,
            }));
        }
    }

    // step 2: flatten today's intraday net per symbol at the live price
    fn square_off_intraday(
        &mut self,
        user_id: UserId,
        report: &mut EodReport,
    ) -> Result<(), EngineError> {
        let today = self.today();
        let offset = self.config.utc_offset_secs;

        for symbol in
            self.orders
                .symbols_traded_today(user_id, today, offset, Some(Segment::Intraday))
        {
            let net: i64 = self
                .orders
                .closed_on(user_id, today, offset, Some(Segment::Intraday))
                .filter(|o| o.symbol == symbol)
                .map(|o| o.side.sign() * o.qty)
                .sum();
            if net == 0 {
                continue;
            }

            let live = self.live_price(&symbol)?;
            let qty = net.abs();
            let exit_side = if net > 0 { Side::Sell } else { Side::Buy };
            let notional = Money::notional(qty, live);

            {
                let account = self
                    .users
                    .get_mut(&user_id)
                    .ok_or(EngineError::UserNotFound(user_id))?;
                match exit_side {
                    Side::Sell => account.credit(notional),
                    Side::Buy => account.debit(notional)?,
                }
            }

            let id = self.next_order_id();
            self.insert_order(Order::new_executed(
                id,
                user_id,
                symbol.clone(),
                exit_side,
                qty,
                live,
                Segment::Intraday,
                false,
                None,
                None,
                self.current_time,
            ));

            self.exits.append(ExitRecord {
                user_id,
                symbol: symbol.clone(),
                qty,
                price: live,
                timestamp: self.current_time,
                exit_side,
                segment: Segment::Intraday,
            });

            self.emit_event(EventPayload::EodSquareOff(EodSquareOffEvent {
                user_id,
                symbol: symbol.clone(),
                qty,
                exit_side,
                price: live,
            }));

            report.square_offs.push(SquareOff {
                symbol,
                qty,
                exit_side,
                price: live,
            });
        }

        Ok(())
    }

    // step 3: delivery rows migrate out of the live store. normal sell legs
    // become history records, surviving long lots become holdings, and a
    // short-first remainder is covered at live into short-carry.
    fn migrate_delivery(
        &mut self,
        user_id: UserId,
        report: &mut EodReport,
    ) -> Result<(), EngineError> {
        let mut rows: Vec<Order> = self
            .orders
            .closed_for_user(user_id)
            .filter(|o| o.segment == Segment::Delivery)
            .cloned()
            .collect();
        if rows.is_empty() {
            return Ok(());
        }
        rows.sort_by_key(|o| (o.executed_at, o.id));

        // normal sell legs go to history exactly as they executed. a forced
        // exit already wrote its record when it fired, so skip those.
        for row in rows.iter().filter(|o| o.side == Side::Sell && !o.short_first) {
            if let (Some(price), Some(time)) = (row.fill_price, row.executed_at) {
                let record = ExitRecord {
                    user_id,
                    symbol: row.symbol.clone(),
                    qty: row.qty,
                    price,
                    timestamp: time,
                    exit_side: Side::Sell,
                    segment: Segment::Delivery,
                };
                if !self.exits.contains(&record) {
                    self.exits.append(record);
                }
            }
        }

        // FIFO the day's executions per symbol to find what survives
        let mut books: BTreeMap<Symbol, LotBook> = BTreeMap::new();
        for row in &rows {
            if let Some(exec) = Execution::from_order(row) {
                books
                    .entry(row.symbol.clone())
                    .or_insert_with(LotBook::new)
                    .apply(&exec);
            }
        }

        for (symbol, book) in &books {
            // surviving long lots merge into the standing holding at lot price
            let mut migrated = 0i64;
            for lot in book.open_lots().filter(|l| l.side == Side::Buy) {
                self.long_holdings.merge(
                    user_id,
                    symbol.clone(),
                    lot.remaining,
                    lot.price,
                    self.current_time,
                );
                migrated += lot.remaining;

                self.emit_event(EventPayload::HoldingMigrated(HoldingMigratedEvent {
                    user_id,
                    symbol: symbol.clone(),
                    qty: lot.remaining,
                    price: lot.price,
                }));
            }
            if migrated > 0 {
                report.migrated.push((symbol.clone(), migrated));
            }

            // a short-first remainder is bought back at live and carried
            let short_qty: i64 = book
                .open_lots()
                .filter(|l| l.side == Side::Sell)
                .map(|l| l.remaining)
                .sum();
            if short_qty > 0 {
                let live = self.live_price(symbol)?;
                let cost = Money::notional(short_qty, live);
                let account = self
                    .users
                    .get_mut(&user_id)
                    .ok_or(EngineError::UserNotFound(user_id))?;
                account.debit(cost)?;

                self.short_carry.merge(
                    user_id,
                    symbol.clone(),
                    short_qty,
                    live,
                    self.current_time,
                );

                self.emit_event(EventPayload::ShortCarryCovered(ShortCarryCoveredEvent {
                    user_id,
                    symbol: symbol.clone(),
                    qty: short_qty,
                    cover_price: live,
                }));
                report.covered.push((symbol.clone(), short_qty));
            }
        }

        // the rows have migrated; drop them from the live store
        for row in rows {
            self.orders.remove(row.id);
        }

        Ok(())
    }
}
