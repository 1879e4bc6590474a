//! Read views shaped for the thin API layer.
//!
//! Display money is rounded to two decimals here and only here; the stores
//! keep full precision.

use super::core::Engine;
use super::results::EngineError;
use crate::lots::{Execution, LotBook};
use crate::order::Order;
use crate::portfolio::Holding;
use crate::records::ExitRecord;
use crate::types::{OrderId, Segment, Side, Symbol, Timestamp, UserId};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct FundsView {
    pub username: String,
    pub total_funds: Decimal,
    pub available_funds: Decimal,
}

#[derive(Debug, Clone)]
pub struct OpenOrderView {
    pub id: OrderId,
    pub symbol: Symbol,
    pub side: Side,
    pub qty: i64,
    pub trigger_price: Decimal,
    pub live_price: Option<Decimal>,
    pub segment: Segment,
    pub short_first: bool,
    pub created_at: Timestamp,
    // how far the live price sits from the trigger, when a quote exists
    pub distance: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct PositionView {
    pub symbol: Symbol,
    pub side: Side,
    pub qty: i64,
    pub avg_price: Decimal,
    pub live_price: Option<Decimal>,
    pub unrealized_pnl: Option<Decimal>,
}

// one opened lot with its FIFO-matched exits, the history row shape
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub symbol: Symbol,
    pub open_side: Side,
    pub open_qty: i64,
    pub open_price: Decimal,
    pub opened_at: Timestamp,
    pub matched_qty: i64,
    pub avg_exit_price: Option<Decimal>,
    pub exit_time: Option<Timestamp>,
    pub realized_pnl: Decimal,
    pub remaining_qty: i64,
    pub is_closed: bool,
    pub invested_value: Decimal,
}

#[derive(Debug, Clone)]
pub struct HoldingView {
    pub symbol: Symbol,
    pub qty: i64,
    pub avg_price: Decimal,
    pub current_price: Decimal,
    pub pnl: Decimal,
    // per-share pnl and its ratio to entry, the portfolio screen fields
    pub per_share_pnl: Decimal,
    pub change_pct: Decimal,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct PortfolioView {
    pub funds: Decimal,
    pub holdings: Vec<HoldingView>,
    pub short_carry: Vec<HoldingView>,
}

impl Engine {
    pub fn funds(&self, user_id: UserId) -> Result<FundsView, EngineError> {
        let account = self
            .users
            .get(&user_id)
            .ok_or(EngineError::UserNotFound(user_id))?;
        Ok(FundsView {
            username: account.username.clone(),
            total_funds: account.total_funds.rounded(),
            available_funds: account.available.rounded(),
        })
    }

    /// Open orders newest first, with the live distance to trigger.
    pub fn open_orders(&mut self, user_id: UserId) -> Result<Vec<OpenOrderView>, EngineError> {
        self.maybe_run_end_of_day(user_id);
        if !self.users.contains_key(&user_id) {
            return Err(EngineError::UserNotFound(user_id));
        }

        let mut views: Vec<OpenOrderView> = self
            .orders
            .open_for_user(user_id)
            .map(|order| {
                let trigger = order
                    .trigger_price
                    .map(|p| p.value())
                    .unwrap_or(Decimal::ZERO);
                let live = self.quotes.peek(&order.symbol).map(|p| p.value());
                OpenOrderView {
                    id: order.id,
                    symbol: order.symbol.clone(),
                    side: order.side,
                    qty: order.qty,
                    trigger_price: trigger,
                    live_price: live.map(|l| l.round_dp(2)),
                    segment: order.segment,
                    short_first: order.short_first,
                    created_at: order.created_at,
                    distance: live.map(|l| (l - trigger).abs().round_dp(2)),
                }
            })
            .collect();

        views.sort_by_key(|v| std::cmp::Reverse((v.created_at, v.id)));
        Ok(views)
    }

    /// Today's net positions per symbol, across both segments.
    pub fn positions(&mut self, user_id: UserId) -> Result<Vec<PositionView>, EngineError> {
        self.maybe_run_end_of_day(user_id);
        if !self.users.contains_key(&user_id) {
            return Err(EngineError::UserNotFound(user_id));
        }

        let today = self.today();
        let offset = self.config.utc_offset_secs;
        let mut views = Vec::new();

        for symbol in self.orders.symbols_traded_today(user_id, today, offset, None) {
            let book = self.symbol_book(user_id, &symbol, true);
            let net = book.net_qty();
            if net == 0 {
                continue;
            }

            let side = if net > 0 { Side::Buy } else { Side::Sell };
            let qty = net.abs();
            let avg = book
                .open_avg_price()
                .map(|p| p.value())
                .unwrap_or(Decimal::ZERO);
            let live = self.quotes.peek(&symbol).map(|p| p.value());
            // long gains when live > entry, short gains when live < entry
            let pnl = live.map(|l| {
                (Decimal::from(side.sign()) * (l - avg) * Decimal::from(qty)).round_dp(2)
            });

            views.push(PositionView {
                symbol,
                side,
                qty,
                avg_price: avg.round_dp(2),
                live_price: live.map(|l| l.round_dp(2)),
                unrealized_pnl: pnl,
            });
        }

        Ok(views)
    }

    /// Per-lot trade history over all executions still in the live store.
    pub fn history(&self, user_id: UserId) -> Result<Vec<HistoryEntry>, EngineError> {
        if !self.users.contains_key(&user_id) {
            return Err(EngineError::UserNotFound(user_id));
        }

        let mut books: BTreeMap<Symbol, LotBook> = BTreeMap::new();
        let mut rows: Vec<&Order> = self.orders.closed_for_user(user_id).collect();
        rows.sort_by_key(|o| (o.executed_at, o.id));
        for row in rows {
            if let Some(exec) = Execution::from_order(row) {
                books
                    .entry(row.symbol.clone())
                    .or_insert_with(LotBook::new)
                    .apply(&exec);
            }
        }

        let mut entries = Vec::new();
        for (symbol, book) in &books {
            for lot in book.lots() {
                entries.push(HistoryEntry {
                    symbol: symbol.clone(),
                    open_side: lot.side,
                    open_qty: lot.qty,
                    open_price: lot.price.value().round_dp(2),
                    opened_at: lot.opened_at,
                    matched_qty: lot.matched_qty,
                    avg_exit_price: lot.avg_exit_price().map(|p| p.value().round_dp(2)),
                    exit_time: lot.last_exit,
                    realized_pnl: lot.realized_pnl().rounded(),
                    remaining_qty: lot.remaining,
                    is_closed: lot.is_closed(),
                    invested_value: (lot.price.value() * Decimal::from(lot.matched_qty))
                        .round_dp(2),
                });
            }
        }

        entries.sort_by_key(|e| (e.opened_at, e.symbol.clone()));
        Ok(entries)
    }

    /// Standing holdings with live marks: funds, long book, short-carry book.
    pub fn portfolio(&self, user_id: UserId) -> Result<PortfolioView, EngineError> {
        let account = self
            .users
            .get(&user_id)
            .ok_or(EngineError::UserNotFound(user_id))?;

        let holdings = self
            .long_holdings
            .for_user(user_id)
            .map(|h| self.holding_view(h, Side::Buy))
            .collect();
        let short_carry = self
            .short_carry
            .for_user(user_id)
            .map(|h| self.holding_view(h, Side::Sell))
            .collect();

        Ok(PortfolioView {
            funds: account.available.rounded(),
            holdings,
            short_carry,
        })
    }

    fn holding_view(&self, holding: &Holding, direction: Side) -> HoldingView {
        let entry = holding.avg_price.value();
        // fall back to entry when no quote, leaving pnl flat
        let live = self
            .quotes
            .peek(&holding.symbol)
            .map(|p| p.value())
            .unwrap_or(entry);

        let per_share = Decimal::from(direction.sign()) * (live - entry);
        let pnl = per_share * Decimal::from(holding.qty);
        let pct = if entry.is_zero() {
            Decimal::ZERO
        } else {
            per_share / entry * Decimal::from(100)
        };

        HoldingView {
            symbol: holding.symbol.clone(),
            qty: holding.qty,
            avg_price: entry.round_dp(2),
            current_price: live.round_dp(2),
            pnl: pnl.round_dp(2),
            per_share_pnl: per_share.round_dp(2),
            change_pct: pct.round_dp(2),
            updated_at: holding.updated_at,
        }
    }

    pub fn exit_records(&self, user_id: UserId) -> Vec<ExitRecord> {
        self.exits.for_user(user_id).cloned().collect()
    }

    // today's FIFO book for one symbol; `today_only` narrows to today's rows
    fn symbol_book(&self, user_id: UserId, symbol: &Symbol, today_only: bool) -> LotBook {
        let today = self.today();
        let offset = self.config.utc_offset_secs;

        let mut rows: Vec<&Order> = self
            .orders
            .closed_for_user(user_id)
            .filter(|o| &o.symbol == symbol)
            .filter(|o| {
                !today_only
                    || o.executed_at
                        .map_or(false, |t| t.trading_date(offset) == today)
            })
            .collect();
        rows.sort_by_key(|o| (o.executed_at, o.id));

        let mut book = LotBook::new();
        for row in rows {
            if let Some(exec) = Execution::from_order(row) {
                book.apply(&exec);
            }
        }
        book
    }
}
