// 8.2: the trigger sweep. periodically re-entered; correctness rests on the
// Open -> Processing claim being conditional, so overlapping sweeps never
// execute the same order twice. a lost claim is skipped in silence.

use super::core::Engine;
use super::results::SweepReport;
use crate::events::{EventPayload, OrderExecutedEvent};
use crate::order::Order;
use crate::store::ClaimError;
use crate::types::{Money, Price, Side};
use rust_decimal::Decimal;
use tracing::{debug, warn};

// 8.2.1: the one place side/short-first maps to a comparison. BUY and
// short-first SELL are entries and fire when the price comes down to the
// level; a normal SELL is an exit and fires when the price rises to it.
// keeping the mirror in a single constructor stops the symmetry from
// drifting apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TriggerRule {
    AtOrBelow,
    AtOrAbove,
}

impl TriggerRule {
    pub(super) fn for_order(side: Side, short_first: bool) -> Self {
        match (side, short_first) {
            (Side::Buy, _) => TriggerRule::AtOrBelow,
            (Side::Sell, true) => TriggerRule::AtOrBelow,
            (Side::Sell, false) => TriggerRule::AtOrAbove,
        }
    }

    pub(super) fn is_met(&self, live: Price, trigger: Price, eps: Decimal) -> bool {
        match self {
            TriggerRule::AtOrBelow => live.at_most(trigger, eps),
            TriggerRule::AtOrAbove => live.at_least(trigger, eps),
        }
    }
}

impl Engine {
    /// One sweep over all open orders in creation order, executing those whose
    /// trigger condition is met by the current quote.
    pub fn run_trigger_sweep(&mut self) -> SweepReport {
        let mut report = SweepReport::default();

        for id in self.orders.open_ids() {
            report.scanned += 1;

            let order = match self.orders.try_claim(id) {
                Ok(order) => order,
                Err(ClaimError::ClaimLost(_)) | Err(ClaimError::NotFound(_)) => {
                    report.claims_lost += 1;
                    continue;
                }
            };

            let Some(trigger) = order.trigger_price else {
                // open orders always carry a trigger; tolerate a bad row by
                // leaving it pending rather than wedging the sweep
                self.orders.revert_claim(id);
                report.still_pending += 1;
                continue;
            };

            let live = match self.live_price(&order.symbol) {
                Ok(price) => price,
                Err(_) => {
                    // no usable quote: release the claim, retry next sweep
                    self.orders.revert_claim(id);
                    report.no_quote += 1;
                    continue;
                }
            };

            let rule = TriggerRule::for_order(order.side, order.short_first);
            if !rule.is_met(live, trigger, self.config.price_epsilon) {
                self.orders.revert_claim(id);
                report.still_pending += 1;
                continue;
            }

            // fill at the trigger price
            if self.fill_claimed(&order, trigger) {
                report.executed.push(id);
                debug!(order_id = id.0, symbol = %order.symbol, %live, %trigger, "trigger fired");
            } else {
                report.claims_lost += 1;
            }
        }

        if !report.executed.is_empty() {
            debug!(executed = report.executed.len(), scanned = report.scanned, "trigger sweep");
        }
        report
    }

    // funds movement for a claimed fill. a resting BUY already blocked its
    // notional at the trigger price and fills at exactly that price, so the
    // block is the payment; a SELL credits its proceeds here.
    fn fill_claimed(&mut self, order: &Order, fill_price: Price) -> bool {
        if order.side == Side::Sell {
            let proceeds = Money::notional(order.qty, fill_price);
            match self.users.get_mut(&order.user_id) {
                Some(account) => account.credit(proceeds),
                None => {
                    warn!(user = order.user_id.0, "fill for unknown user, reverting claim");
                    self.orders.revert_claim(order.id);
                    return false;
                }
            }
        }

        self.orders
            .close_claimed(order.id, fill_price, self.current_time);

        self.emit_event(EventPayload::OrderExecuted(OrderExecutedEvent {
            order_id: order.id,
            user_id: order.user_id,
            symbol: order.symbol.clone(),
            side: order.side,
            qty: order.qty,
            fill_price,
            segment: order.segment,
            short_first: order.short_first,
        }));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn buy_rule_fires_at_or_below() {
        let rule = TriggerRule::for_order(Side::Buy, false);
        let trigger = Price::new_unchecked(dec!(100));
        let eps = dec!(0.01);

        assert!(rule.is_met(Price::new_unchecked(dec!(99)), trigger, eps));
        assert!(rule.is_met(Price::new_unchecked(dec!(100)), trigger, eps));
        assert!(!rule.is_met(Price::new_unchecked(dec!(101)), trigger, eps));
    }

    #[test]
    fn sell_rule_fires_at_or_above() {
        let rule = TriggerRule::for_order(Side::Sell, false);
        let trigger = Price::new_unchecked(dec!(100));
        let eps = dec!(0.01);

        assert!(!rule.is_met(Price::new_unchecked(dec!(99)), trigger, eps));
        assert!(rule.is_met(Price::new_unchecked(dec!(100)), trigger, eps));
        assert!(rule.is_met(Price::new_unchecked(dec!(101)), trigger, eps));
    }

    #[test]
    fn short_first_sell_mirrors_buy() {
        let trigger = Price::new_unchecked(dec!(100));
        let eps = dec!(0.01);

        for live in [dec!(95), dec!(100), dec!(105)] {
            let live = Price::new_unchecked(live);
            assert_eq!(
                TriggerRule::for_order(Side::Sell, true).is_met(live, trigger, eps),
                TriggerRule::for_order(Side::Buy, false).is_met(live, trigger, eps),
            );
        }
    }

    #[test]
    fn epsilon_band_absorbs_near_misses() {
        let rule = TriggerRule::for_order(Side::Sell, false);
        let trigger = Price::new_unchecked(dec!(100));

        // 99.995 is within the band and counts as at-or-above
        assert!(rule.is_met(Price::new_unchecked(dec!(99.995)), trigger, dec!(0.01)));
        assert!(!rule.is_met(Price::new_unchecked(dec!(99.995)), trigger, dec!(0.001)));
    }
}
