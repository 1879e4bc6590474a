//! Stop-loss / target watcher and forced position exits.
//!
//! For every (user, symbol) pair with a nonzero net executed quantity today,
//! look up the protective levels on the most recent position-opening order and
//! force an exit at the live price when one is breached. A level that is unset
//! never participates; the whole sweep is idempotent because an exit zeroes
//! the net quantity it acted on.

use super::core::Engine;
use super::results::{EngineError, ProtectiveExit};
use crate::events::{EventPayload, ExitReason, ProtectiveExitEvent};
use crate::order::Order;
use crate::records::ExitRecord;
use crate::types::{Money, Price, Segment, Side, Symbol, UserId};
use rust_decimal::Decimal;
use tracing::{debug, warn};

// breach test shared by both directions: stoploss is the lower protective
// bound, target the upper profit bound (short-first mirrors by convention)
fn breached(
    live: Price,
    stoploss: Option<Price>,
    target: Option<Price>,
    eps: Decimal,
) -> Option<ExitReason> {
    if let Some(stop) = stoploss {
        if live.at_most(stop, eps) {
            return Some(ExitReason::StoplossHit);
        }
    }
    if let Some(target) = target {
        if live.at_least(target, eps) {
            return Some(ExitReason::TargetHit);
        }
    }
    None
}

impl Engine {
    /// One watcher pass over every position with protective levels.
    pub fn run_protection_sweep(&mut self) -> Vec<ProtectiveExit> {
        let mut exits = Vec::new();
        let today = self.today();
        let offset = self.config.utc_offset_secs;

        for user_id in self.orders.user_ids() {
            for symbol in self
                .orders
                .symbols_traded_today(user_id, today, offset, None)
            {
                let net = self
                    .orders
                    .net_executed_today(user_id, &symbol, today, offset);
                if net == 0 {
                    continue;
                }

                let Some((stoploss, target, segment)) =
                    self.protection_levels(user_id, &symbol, net)
                else {
                    continue;
                };

                let Ok(live) = self.live_price(&symbol) else {
                    // no usable quote; the next sweep retries
                    continue;
                };

                let Some(reason) = breached(live, stoploss, target, self.config.price_epsilon)
                else {
                    continue;
                };

                match self.force_exit(user_id, &symbol, net, live, reason, segment) {
                    Ok(exit) => exits.push(exit),
                    Err(err) => {
                        warn!(user = user_id.0, %symbol, %err, "protective exit failed");
                    }
                }
            }
        }

        exits
    }

    // levels from the most recent closed order today on the position-opening
    // side that carries either level; its segment is the one the exit closes
    fn protection_levels(
        &self,
        user_id: UserId,
        symbol: &Symbol,
        net: i64,
    ) -> Option<(Option<Price>, Option<Price>, Segment)> {
        let opening_side = if net > 0 { Side::Buy } else { Side::Sell };
        self.orders
            .closed_on(user_id, self.today(), self.config.utc_offset_secs, None)
            .filter(|o| {
                &o.symbol == symbol
                    && o.side == opening_side
                    && (o.stoploss.is_some() || o.target.is_some())
            })
            .max_by_key(|o| (o.executed_at, o.id))
            .map(|o| (o.stoploss, o.target, o.segment))
    }

    // segment the most recent opening execution ran in, for manual closes
    fn position_segment(&self, user_id: UserId, symbol: &Symbol, net: i64) -> Segment {
        let opening_side = if net > 0 { Side::Buy } else { Side::Sell };
        self.orders
            .closed_on(user_id, self.today(), self.config.utc_offset_secs, None)
            .filter(|o| &o.symbol == symbol && o.side == opening_side)
            .max_by_key(|o| (o.executed_at, o.id))
            .map(|o| o.segment)
            .unwrap_or(Segment::Intraday)
    }

    /// Close today's net position in a symbol at the live price.
    pub fn close_position(
        &mut self,
        user_id: UserId,
        symbol: &str,
    ) -> Result<ProtectiveExit, EngineError> {
        self.maybe_run_end_of_day(user_id);

        if !self.users.contains_key(&user_id) {
            return Err(EngineError::UserNotFound(user_id));
        }
        let symbol = Symbol::new(symbol).ok_or(EngineError::InvalidSymbol)?;

        let net = self.orders.net_executed_today(
            user_id,
            &symbol,
            self.today(),
            self.config.utc_offset_secs,
        );
        if net == 0 {
            return Err(EngineError::NoPosition(symbol));
        }

        let live = self.live_price(&symbol)?;
        let segment = self.position_segment(user_id, &symbol, net);
        self.force_exit(user_id, &symbol, net, live, ExitReason::ManualClose, segment)
    }

    // the one exit path: net long sells, net short covers, both at live.
    // writes the funds movement, a closed order row, and an exit record.
    fn force_exit(
        &mut self,
        user_id: UserId,
        symbol: &Symbol,
        net: i64,
        live: Price,
        reason: ExitReason,
        segment: Segment,
    ) -> Result<ProtectiveExit, EngineError> {
        debug_assert!(net != 0);
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
                // covering a short pays the market; an overdraft rejects the
                // exit and the next sweep retries
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
            segment,
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
            segment,
        });

        self.emit_event(EventPayload::ProtectiveExit(ProtectiveExitEvent {
            user_id,
            symbol: symbol.clone(),
            qty,
            exit_side,
            price: live,
            reason: reason.clone(),
        }));

        debug!(user = user_id.0, %symbol, qty, %live, "position force-exited");

        Ok(ProtectiveExit {
            user_id,
            symbol: symbol.clone(),
            qty,
            exit_side,
            price: live,
            reason,
        })
    }
}
