// 1.0: all the primitives live here. nothing in the engine works without these types.
// IDs, symbols, sides, prices, money, timestamps. each is a newtype so the compiler
// catches type mixups.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Timelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub u64);

// 1.1: normalized ticker symbol. construction trims and uppercases, so "  tcs "
// and "TCS" key the same stores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    #[must_use]
    pub fn new(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_uppercase();
        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Buy opens/extends long exposure, Sell reduces it or opens a short-first leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    // +1 for Buy, -1 for Sell. net position math runs on this sign.
    pub fn sign(&self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

// 1.2: Intraday must be flat by the close cutoff, Delivery survives the day as a holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Segment {
    Intraday,
    Delivery,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Intraday => write!(f, "intraday"),
            Segment::Delivery => write!(f, "delivery"),
        }
    }
}

// 1.3: price in quote currency per share. must be positive; zero and negative
// inputs mean "not a price" (unset level, failed quote) and construct as None.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Price(Decimal);

impl Price {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn new_unchecked(value: Decimal) -> Self {
        debug_assert!(value > Decimal::ZERO);
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    // 1.3.1: epsilon-tolerant comparisons. trigger rules treat prices within
    // eps as equal so a near-miss tick neither under- nor over-triggers.
    pub fn at_most(&self, other: Price, eps: Decimal) -> bool {
        self.0 <= other.0 + eps
    }

    pub fn at_least(&self, other: Price, eps: Decimal) -> bool {
        self.0 + eps >= other.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.4: quote currency amount. balances, notionals, pnl, refunds all use this.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money(Decimal);

impl Money {
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    // qty * price, the notional of an execution
    pub fn notional(qty: i64, price: Price) -> Self {
        Self(Decimal::from(qty) * price.value())
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn add(&self, other: Money) -> Self {
        Self(self.0 + other.0)
    }

    pub fn sub(&self, other: Money) -> Self {
        Self(self.0 - other.0)
    }

    pub fn negate(&self) -> Self {
        Self(-self.0)
    }

    pub fn rounded(&self) -> Decimal {
        self.0.round_dp(2)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialOrd for Money {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Money {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, m| acc.add(m))
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, m| acc.add(*m))
    }
}

// 1.5: millisecond timestamp. the engine never reads the wall clock itself;
// the host pushes time in and daily bucketing converts through the exchange
// UTC offset (IST for NSE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    fn to_offset(&self, utc_offset_secs: i32) -> DateTime<FixedOffset> {
        let offset = FixedOffset::east_opt(utc_offset_secs).unwrap_or_else(|| {
            debug_assert!(false, "utc offset out of range");
            FixedOffset::east_opt(0).unwrap()
        });
        DateTime::from_timestamp_millis(self.0)
            .unwrap_or_else(|| DateTime::from_timestamp_millis(0).unwrap())
            .with_timezone(&offset)
    }

    // calendar date at the exchange, used for "today's executions" bucketing
    pub fn trading_date(&self, utc_offset_secs: i32) -> NaiveDate {
        self.to_offset(utc_offset_secs).date_naive()
    }

    pub fn minute_of_day(&self, utc_offset_secs: i32) -> u32 {
        let dt = self.to_offset(utc_offset_secs);
        dt.hour() * 60 + dt.minute()
    }

    pub fn is_weekday(&self, utc_offset_secs: i32) -> bool {
        self.to_offset(utc_offset_secs).weekday().num_days_from_monday() < 5
    }
}
