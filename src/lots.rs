// 4.0: FIFO lot matching. one symmetric rule produces long books, short books,
// and realized pnl: an execution first consumes the oldest opposite-side lots,
// and whatever is left over opens a new lot in its own direction. ordinary
// long-then-sell and short-first-then-cover both fall out of the same code path.

use crate::order::Order;
use crate::types::{Money, Price, Segment, Side, Symbol, Timestamp};
use rust_decimal::Decimal;

// a closed order row flattened to what the matcher needs
#[derive(Debug, Clone)]
pub struct Execution {
    pub symbol: Symbol,
    pub side: Side,
    pub qty: i64,
    pub price: Price,
    pub time: Timestamp,
    pub segment: Segment,
    pub short_first: bool,
}

impl Execution {
    pub fn from_order(order: &Order) -> Option<Self> {
        if !order.is_closed() {
            return None;
        }
        Some(Self {
            symbol: order.symbol.clone(),
            side: order.side,
            qty: order.qty,
            price: order.fill_price?,
            time: order.executed_at?,
            segment: order.segment,
            short_first: order.short_first,
        })
    }
}

// 4.1: a quantity opened at one price, consumed FIFO by opposite executions.
#[derive(Debug, Clone)]
pub struct Lot {
    pub side: Side,
    pub qty: i64,
    pub price: Price,
    pub opened_at: Timestamp,
    pub segment: Segment,
    pub remaining: i64,
    pub matched_qty: i64,
    // sum of exit price * matched take, for the average exit price
    pub matched_value: Decimal,
    pub last_exit: Option<Timestamp>,
}

impl Lot {
    fn open(exec: &Execution, qty: i64) -> Self {
        Self {
            side: exec.side,
            qty,
            price: exec.price,
            opened_at: exec.time,
            segment: exec.segment,
            remaining: qty,
            matched_qty: 0,
            matched_value: Decimal::ZERO,
            last_exit: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.remaining == 0
    }

    pub fn avg_exit_price(&self) -> Option<Price> {
        if self.matched_qty > 0 {
            Price::new(self.matched_value / Decimal::from(self.matched_qty))
        } else {
            None
        }
    }

    // 4.2: realized pnl on the matched portion. the opening side's sign makes
    // this one formula cover long exits and short covers:
    //   long:  (avg_exit - entry) * matched
    //   short: (entry - avg_exit) * matched
    pub fn realized_pnl(&self) -> Money {
        let entry_value = self.price.value() * Decimal::from(self.matched_qty);
        Money::new(Decimal::from(self.side.sign()) * (self.matched_value - entry_value))
    }
}

// 4.3: per-symbol book of lots in opening order.
#[derive(Debug, Clone, Default)]
pub struct LotBook {
    lots: Vec<Lot>,
}

impl LotBook {
    pub fn new() -> Self {
        Self { lots: Vec::new() }
    }

    // replaying the same ordered execution log always rebuilds the same book
    pub fn from_executions<'a, I>(executions: I) -> Self
    where
        I: IntoIterator<Item = &'a Execution>,
    {
        let mut book = Self::new();
        for exec in executions {
            book.apply(exec);
        }
        book
    }

    pub fn apply(&mut self, exec: &Execution) {
        debug_assert!(exec.qty > 0, "executions carry positive quantity");
        let mut to_match = exec.qty;

        for lot in self
            .lots
            .iter_mut()
            .filter(|lot| lot.side != exec.side && lot.remaining > 0)
        {
            if to_match == 0 {
                break;
            }
            let take = lot.remaining.min(to_match);
            lot.remaining -= take;
            lot.matched_qty += take;
            lot.matched_value += Decimal::from(take) * exec.price.value();
            lot.last_exit = Some(exec.time);
            to_match -= take;
        }

        if to_match > 0 {
            self.lots.push(Lot::open(exec, to_match));
        }
    }

    pub fn lots(&self) -> &[Lot] {
        &self.lots
    }

    pub fn open_lots(&self) -> impl Iterator<Item = &Lot> {
        self.lots.iter().filter(|lot| lot.remaining > 0)
    }

    // signed net: positive long, negative short
    pub fn net_qty(&self) -> i64 {
        self.open_lots()
            .map(|lot| lot.side.sign() * lot.remaining)
            .sum()
    }

    // volume-weighted entry price over the open remainders
    pub fn open_avg_price(&self) -> Option<Price> {
        let mut qty = 0i64;
        let mut value = Decimal::ZERO;
        for lot in self.open_lots() {
            qty += lot.remaining;
            value += Decimal::from(lot.remaining) * lot.price.value();
        }
        if qty > 0 {
            Price::new(value / Decimal::from(qty))
        } else {
            None
        }
    }

    pub fn realized_pnl(&self) -> Money {
        self.lots.iter().map(|lot| lot.realized_pnl()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn exec(side: Side, qty: i64, price: Decimal, time: i64) -> Execution {
        Execution {
            symbol: Symbol::new("TCS").unwrap(),
            side,
            qty,
            price: Price::new_unchecked(price),
            time: Timestamp::from_millis(time),
            segment: Segment::Intraday,
            short_first: false,
        }
    }

    #[test]
    fn buys_stack_as_lots() {
        let log = vec![
            exec(Side::Buy, 10, dec!(100), 1),
            exec(Side::Buy, 5, dec!(110), 2),
        ];
        let book = LotBook::from_executions(&log);

        assert_eq!(book.lots().len(), 2);
        assert_eq!(book.net_qty(), 15);
        // (10*100 + 5*110) / 15
        assert_eq!(
            book.open_avg_price().unwrap().value().round_dp(2),
            dec!(103.33)
        );
    }

    #[test]
    fn sell_consumes_oldest_lot_first() {
        let log = vec![
            exec(Side::Buy, 10, dec!(100), 1),
            exec(Side::Buy, 10, dec!(120), 2),
            exec(Side::Sell, 12, dec!(130), 3),
        ];
        let book = LotBook::from_executions(&log);

        let lots = book.lots();
        // first lot fully consumed, second partially
        assert_eq!(lots[0].remaining, 0);
        assert_eq!(lots[1].remaining, 8);
        assert_eq!(book.net_qty(), 8);

        // realized: 10*(130-100) + 2*(130-120)
        assert_eq!(book.realized_pnl().value(), dec!(320));
    }

    #[test]
    fn excess_sell_opens_short_lot() {
        let log = vec![
            exec(Side::Buy, 5, dec!(100), 1),
            exec(Side::Sell, 8, dec!(90), 2),
        ];
        let book = LotBook::from_executions(&log);

        assert_eq!(book.net_qty(), -3);
        let short = book.open_lots().next().unwrap();
        assert_eq!(short.side, Side::Sell);
        assert_eq!(short.remaining, 3);
        assert_eq!(short.price.value(), dec!(90));

        // the matched 5 realized a loss: 5*(90-100)
        assert_eq!(book.realized_pnl().value(), dec!(-50));
    }

    #[test]
    fn short_cover_mirrors_long_exit() {
        let log = vec![
            exec(Side::Sell, 10, dec!(200), 1),
            exec(Side::Buy, 10, dec!(180), 2),
        ];
        let book = LotBook::from_executions(&log);

        assert_eq!(book.net_qty(), 0);
        // short profits from decline: 10*(200-180)
        assert_eq!(book.realized_pnl().value(), dec!(200));
    }

    #[test]
    fn replay_is_idempotent() {
        let log = vec![
            exec(Side::Buy, 10, dec!(100), 1),
            exec(Side::Sell, 4, dec!(105), 2),
            exec(Side::Sell, 9, dec!(95), 3),
            exec(Side::Buy, 2, dec!(93), 4),
        ];

        let first = LotBook::from_executions(&log);
        let second = LotBook::from_executions(&log);

        assert_eq!(first.net_qty(), second.net_qty());
        assert_eq!(first.realized_pnl().value(), second.realized_pnl().value());
        assert_eq!(first.lots().len(), second.lots().len());
        for (a, b) in first.lots().iter().zip(second.lots()) {
            assert_eq!(a.remaining, b.remaining);
            assert_eq!(a.matched_qty, b.matched_qty);
            assert_eq!(a.matched_value, b.matched_value);
        }
    }

    #[test]
    fn conservation_of_matched_quantity() {
        let log = vec![
            exec(Side::Buy, 7, dec!(50), 1),
            exec(Side::Buy, 3, dec!(55), 2),
            exec(Side::Sell, 6, dec!(60), 3),
        ];
        let book = LotBook::from_executions(&log);

        let matched: i64 = book.lots().iter().map(|l| l.matched_qty).sum();
        assert_eq!(matched, 6);
        assert_eq!(book.net_qty(), 4);
    }
}
