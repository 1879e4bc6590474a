//! Order placement, modification, and cancellation.
//!
//! Placement validates everything before the first mutation, so a rejected
//! request leaves the ledger and the order store untouched.

use super::core::Engine;
use super::results::{EngineError, PlaceRequest, PlacementResult, SellPreview};
use super::triggers::TriggerRule;
use crate::events::{
    CancelReason, EventPayload, OrderCancelledEvent, OrderExecutedEvent, OrderModifiedEvent,
    OrderPlacedEvent,
};
use crate::order::{Order, OrderStatus};
use crate::quotes::QuoteError;
use crate::types::{Money, OrderId, Price, Segment, Side, Symbol, UserId};
use rust_decimal::Decimal;

impl Engine {
    /// Place an order per the full lifecycle contract: normalize, quote,
    /// short-sell gate, then immediate execution or an open limit order.
    pub fn place_order(&mut self, request: PlaceRequest) -> Result<PlacementResult, EngineError> {
        // the day settles lazily on the first touch past the cutoff
        self.maybe_run_end_of_day(request.user_id);

        if !self.users.contains_key(&request.user_id) {
            return Err(EngineError::UserNotFound(request.user_id));
        }
        let symbol = Symbol::new(&request.symbol).ok_or(EngineError::InvalidSymbol)?;
        if request.qty <= 0 {
            return Err(EngineError::InvalidQuantity(request.qty));
        }
        if !self.config.is_market_open(self.current_time) {
            return Err(EngineError::MarketClosed);
        }

        // absent or nonpositive trigger price means market order
        let trigger = request.trigger_price.and_then(Price::new);
        let stoploss = request.stoploss.and_then(Price::new);
        let target = request.target.and_then(Price::new);

        let live = match self.live_price(&symbol) {
            Ok(price) => Some(price),
            Err(err) if trigger.is_none() => return Err(err),
            Err(_) => None,
        };

        // sell availability gate
        let requested_qty = request.qty;
        let mut qty = request.qty;
        let mut short_first = false;
        let mut capped_from = None;

        if request.side == Side::Sell {
            let owned = self.owned_qty(request.user_id, &symbol);
            if owned == 0 && !request.allow_short {
                return Ok(PlacementResult::NeedsShortConfirmation {
                    requested_qty,
                    owned_qty: owned,
                });
            }
            if owned < qty {
                if request.allow_short {
                    // selling beyond what is owned opens a short-first leg
                    short_first = true;
                } else {
                    // documented quirk: cap to owned and report, don't reject
                    qty = owned;
                    capped_from = Some(requested_qty);
                }
            }
        }

        match trigger {
            // market order: the quote gate above guaranteed a live price
            None => {
                let fill_price = live.ok_or(EngineError::Quote(QuoteError::Unavailable))?;
                self.execute_at(
                    request.user_id,
                    symbol,
                    request.side,
                    qty,
                    fill_price,
                    request.segment,
                    short_first,
                    stoploss,
                    target,
                    capped_from,
                )
            }
            Some(trigger_price) => match live {
                Some(live_price)
                    if TriggerRule::for_order(request.side, short_first).is_met(
                        live_price,
                        trigger_price,
                        self.config.price_epsilon,
                    ) =>
                {
                    // a buyer never pays above their limit: fill at the better
                    // live price. sells fill at the trigger they asked for.
                    let fill_price = match request.side {
                        Side::Buy => live_price,
                        Side::Sell => trigger_price,
                    };
                    self.execute_at(
                        request.user_id,
                        symbol,
                        request.side,
                        qty,
                        fill_price,
                        request.segment,
                        short_first,
                        stoploss,
                        target,
                        capped_from,
                    )
                }
                _ => self.place_open(
                    request.user_id,
                    symbol,
                    request.side,
                    qty,
                    trigger_price,
                    request.segment,
                    short_first,
                    stoploss,
                    target,
                    capped_from,
                ),
            },
        }
    }

    /// What a sell of `qty` would do, without mutating anything.
    pub fn preview_sell(
        &self,
        user_id: UserId,
        symbol: &str,
        qty: i64,
    ) -> Result<SellPreview, EngineError> {
        if !self.users.contains_key(&user_id) {
            return Err(EngineError::UserNotFound(user_id));
        }
        let symbol = Symbol::new(symbol).ok_or(EngineError::InvalidSymbol)?;
        let owned = self.owned_qty(user_id, &symbol);

        Ok(SellPreview {
            owned_qty: owned,
            can_sell: owned >= qty && qty > 0,
            needs_confirmation: owned == 0,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn execute_at(
        &mut self,
        user_id: UserId,
        symbol: Symbol,
        side: Side,
        qty: i64,
        fill_price: Price,
        segment: Segment,
        short_first: bool,
        stoploss: Option<Price>,
        target: Option<Price>,
        capped_from: Option<i64>,
    ) -> Result<PlacementResult, EngineError> {
        let notional = Money::notional(qty, fill_price);

        {
            let account = self
                .users
                .get_mut(&user_id)
                .ok_or(EngineError::UserNotFound(user_id))?;
            match side {
                Side::Buy => account.debit(notional)?,
                Side::Sell => account.credit(notional),
            }
        }

        let id = self.next_order_id();
        let order = Order::new_executed(
            id,
            user_id,
            symbol.clone(),
            side,
            qty,
            fill_price,
            segment,
            short_first,
            stoploss,
            target,
            self.current_time,
        );
        self.insert_order(order);

        self.emit_event(EventPayload::OrderExecuted(OrderExecutedEvent {
            order_id: id,
            user_id,
            symbol,
            side,
            qty,
            fill_price,
            segment,
            short_first,
        }));

        Ok(PlacementResult::Executed {
            order_id: id,
            qty,
            fill_price,
            segment,
            short_first,
            capped_from,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn place_open(
        &mut self,
        user_id: UserId,
        symbol: Symbol,
        side: Side,
        qty: i64,
        trigger_price: Price,
        segment: Segment,
        short_first: bool,
        stoploss: Option<Price>,
        target: Option<Price>,
        capped_from: Option<i64>,
    ) -> Result<PlacementResult, EngineError> {
        // block the notional for a resting BUY so the eventual fill is funded;
        // refunded on cancel or EOD-cancel
        let blocked = if side == Side::Buy {
            let block = Money::notional(qty, trigger_price);
            let account = self
                .users
                .get_mut(&user_id)
                .ok_or(EngineError::UserNotFound(user_id))?;
            account.debit(block)?;
            block
        } else {
            Money::zero()
        };

        let id = self.next_order_id();
        let order = Order::new_open(
            id,
            user_id,
            symbol.clone(),
            side,
            qty,
            trigger_price,
            segment,
            short_first,
            stoploss,
            target,
            self.current_time,
        );
        self.insert_order(order);

        self.emit_event(EventPayload::OrderPlaced(OrderPlacedEvent {
            order_id: id,
            user_id,
            symbol,
            side,
            qty,
            trigger_price: Some(trigger_price),
            segment,
            short_first,
            blocked,
        }));

        Ok(PlacementResult::Placed {
            order_id: id,
            qty,
            trigger_price,
            segment,
            short_first,
            blocked,
            capped_from,
        })
    }

    /// Change quantity and trigger price of an open order. The BUY block is
    /// recomputed so a later cancel still refunds exactly the blocked amount.
    pub fn modify_order(
        &mut self,
        order_id: OrderId,
        new_qty: i64,
        new_price: Decimal,
    ) -> Result<(), EngineError> {
        if new_qty <= 0 {
            return Err(EngineError::InvalidQuantity(new_qty));
        }
        let new_trigger = Price::new(new_price).ok_or(EngineError::InvalidPrice(new_price))?;

        let order = self
            .orders
            .get(order_id)
            .ok_or(EngineError::OrderNotFound(order_id))?
            .clone();
        if order.status != OrderStatus::Open {
            return Err(EngineError::OrderNotOpen(order_id));
        }

        if order.side == Side::Buy {
            let old_block = order
                .blocked_amount()
                .unwrap_or_else(Money::zero);
            let new_block = Money::notional(new_qty, new_trigger);
            let account = self
                .users
                .get_mut(&order.user_id)
                .ok_or(EngineError::UserNotFound(order.user_id))?;

            // grow the block before touching the order so an overdraft
            // rejects the whole modification
            if new_block.value() > old_block.value() {
                account.debit(new_block.sub(old_block))?;
            } else {
                account.credit(old_block.sub(new_block));
            }
        }

        self.orders.update_open_terms(order_id, new_qty, new_trigger);

        self.emit_event(EventPayload::OrderModified(OrderModifiedEvent {
            order_id,
            old_qty: order.qty,
            new_qty,
            old_trigger: order.trigger_price,
            new_trigger,
        }));
        Ok(())
    }

    /// Cancel an open order. Only a resting BUY blocked funds, so only a BUY
    /// refunds; the refund is exactly trigger price times quantity.
    pub fn cancel_order(&mut self, order_id: OrderId) -> Result<Money, EngineError> {
        let order = self
            .orders
            .get(order_id)
            .ok_or(EngineError::OrderNotFound(order_id))?;
        if order.status != OrderStatus::Open {
            return Err(EngineError::OrderNotOpen(order_id));
        }

        let refund = order.blocked_amount().unwrap_or_else(Money::zero);
        let user_id = order.user_id;

        let cancelled = self.orders.cancel(order_id);
        debug_assert!(cancelled.is_some());

        if refund.value() > Decimal::ZERO {
            if let Some(account) = self.users.get_mut(&user_id) {
                account.credit(refund);
            }
        }

        self.emit_event(EventPayload::OrderCancelled(OrderCancelledEvent {
            order_id,
            user_id,
            reason: CancelReason::UserRequested,
            refund,
        }));
        Ok(refund)
    }
}
