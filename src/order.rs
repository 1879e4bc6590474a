// 2.0: order rows and the status state machine.
// Open -> Processing -> {Closed, Open}; Open -> Cancelled. Closed and Cancelled
// are terminal; Processing is a transient claim held by the trigger sweep.

use crate::types::{Money, OrderId, Price, Segment, Side, Symbol, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Open,
    Processing,
    Closed,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Closed | OrderStatus::Cancelled)
    }

    // 2.1: the only legal moves. everything else is a programming error the
    // store refuses.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Open, OrderStatus::Processing)
                | (OrderStatus::Open, OrderStatus::Cancelled)
                | (OrderStatus::Processing, OrderStatus::Closed)
                | (OrderStatus::Processing, OrderStatus::Open)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Open => write!(f, "Open"),
            OrderStatus::Processing => write!(f, "Processing"),
            OrderStatus::Closed => write!(f, "Closed"),
            OrderStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub symbol: Symbol,
    pub side: Side,
    pub qty: i64,
    // limit trigger; None for market orders that executed on placement
    pub trigger_price: Option<Price>,
    pub segment: Segment,
    pub status: OrderStatus,
    // true only for SELL legs opened beyond the owned quantity
    pub short_first: bool,
    pub stoploss: Option<Price>,
    pub target: Option<Price>,
    pub created_at: Timestamp,
    pub fill_price: Option<Price>,
    pub executed_at: Option<Timestamp>,
}

impl Order {
    // a limit order resting until the trigger sweep executes it
    #[allow(clippy::too_many_arguments)]
    pub fn new_open(
        id: OrderId,
        user_id: UserId,
        symbol: Symbol,
        side: Side,
        qty: i64,
        trigger_price: Price,
        segment: Segment,
        short_first: bool,
        stoploss: Option<Price>,
        target: Option<Price>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            user_id,
            symbol,
            side,
            qty,
            trigger_price: Some(trigger_price),
            segment,
            status: OrderStatus::Open,
            short_first,
            stoploss,
            target,
            created_at,
            fill_price: None,
            executed_at: None,
        }
    }

    // an order inserted already executed: market fills, square-offs, forced exits
    #[allow(clippy::too_many_arguments)]
    pub fn new_executed(
        id: OrderId,
        user_id: UserId,
        symbol: Symbol,
        side: Side,
        qty: i64,
        fill_price: Price,
        segment: Segment,
        short_first: bool,
        stoploss: Option<Price>,
        target: Option<Price>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id,
            user_id,
            symbol,
            side,
            qty,
            trigger_price: None,
            segment,
            status: OrderStatus::Closed,
            short_first,
            stoploss,
            target,
            created_at: timestamp,
            fill_price: Some(fill_price),
            executed_at: Some(timestamp),
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Open
    }

    pub fn is_closed(&self) -> bool {
        self.status == OrderStatus::Closed
    }

    // notional blocked from funds while an Open BUY limit rests
    pub fn blocked_amount(&self) -> Option<Money> {
        match (self.side, self.status, self.trigger_price) {
            (Side::Buy, OrderStatus::Open, Some(trigger)) => {
                Some(Money::notional(self.qty, trigger))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn open_buy() -> Order {
        Order::new_open(
            OrderId(1),
            UserId(1),
            Symbol::new("TCS").unwrap(),
            Side::Buy,
            10,
            Price::new_unchecked(dec!(100)),
            Segment::Intraday,
            false,
            None,
            None,
            Timestamp::from_millis(0),
        )
    }

    #[test]
    fn legal_transitions() {
        use OrderStatus::*;
        assert!(Open.can_transition_to(Processing));
        assert!(Open.can_transition_to(Cancelled));
        assert!(Processing.can_transition_to(Closed));
        assert!(Processing.can_transition_to(Open));
    }

    #[test]
    fn terminal_states_stay_terminal() {
        use OrderStatus::*;
        for next in [Open, Processing, Closed, Cancelled] {
            assert!(!Closed.can_transition_to(next));
            assert!(!Cancelled.can_transition_to(next));
        }
        assert!(!Open.can_transition_to(Closed));
        assert!(!Processing.can_transition_to(Cancelled));
    }

    #[test]
    fn blocked_amount_only_for_open_buy() {
        let order = open_buy();
        assert_eq!(order.blocked_amount().unwrap().value(), dec!(1000));

        let mut sell = open_buy();
        sell.side = Side::Sell;
        assert!(sell.blocked_amount().is_none());

        let mut closed = open_buy();
        closed.status = OrderStatus::Closed;
        assert!(closed.blocked_amount().is_none());
    }
}
