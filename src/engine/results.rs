// 8.0.2: request/result types and errors for engine operations.

use crate::events::ExitReason;
use crate::funds::FundsError;
use crate::quotes::QuoteError;
use crate::types::{Money, OrderId, Price, Segment, Side, Symbol, UserId};
use rust_decimal::Decimal;

// What a caller hands the engine. Raw strings and decimals on purpose: the
// engine owns normalization and treats a missing or nonpositive trigger as a
// market order, nonpositive protective levels as unset.
#[derive(Debug, Clone)]
pub struct PlaceRequest {
    pub user_id: UserId,
    pub symbol: String,
    pub side: Side,
    pub qty: i64,
    pub trigger_price: Option<Decimal>,
    pub segment: Segment,
    pub stoploss: Option<Decimal>,
    pub target: Option<Decimal>,
    // explicit caller intent to open a short-first position
    pub allow_short: bool,
}

impl PlaceRequest {
    pub fn market(user_id: UserId, symbol: &str, side: Side, qty: i64, segment: Segment) -> Self {
        Self {
            user_id,
            symbol: symbol.to_string(),
            side,
            qty,
            trigger_price: None,
            segment,
            stoploss: None,
            target: None,
            allow_short: false,
        }
    }

    pub fn limit(
        user_id: UserId,
        symbol: &str,
        side: Side,
        qty: i64,
        trigger: Decimal,
        segment: Segment,
    ) -> Self {
        Self {
            trigger_price: Some(trigger),
            ..Self::market(user_id, symbol, side, qty, segment)
        }
    }

    pub fn with_levels(mut self, stoploss: Option<Decimal>, target: Option<Decimal>) -> Self {
        self.stoploss = stoploss;
        self.target = target;
        self
    }

    pub fn allow_short(mut self) -> Self {
        self.allow_short = true;
        self
    }
}

// 8.0.3: placement outcome. NeedsShortConfirmation is a result, not an error:
// nothing was mutated and the caller may re-submit with allow_short set.
#[derive(Debug, Clone)]
pub enum PlacementResult {
    Executed {
        order_id: OrderId,
        qty: i64,
        fill_price: Price,
        segment: Segment,
        short_first: bool,
        // set when a sell was silently capped to the owned quantity
        capped_from: Option<i64>,
    },
    Placed {
        order_id: OrderId,
        qty: i64,
        trigger_price: Price,
        segment: Segment,
        short_first: bool,
        blocked: Money,
        capped_from: Option<i64>,
    },
    NeedsShortConfirmation {
        requested_qty: i64,
        owned_qty: i64,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct SellPreview {
    pub owned_qty: i64,
    pub can_sell: bool,
    pub needs_confirmation: bool,
}

// one trigger-sweep pass over the open orders
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub scanned: usize,
    pub executed: Vec<OrderId>,
    pub no_quote: usize,
    pub still_pending: usize,
    pub claims_lost: usize,
}

#[derive(Debug, Clone)]
pub struct ProtectiveExit {
    pub user_id: UserId,
    pub symbol: Symbol,
    pub qty: i64,
    pub exit_side: Side,
    pub price: Price,
    pub reason: ExitReason,
}

#[derive(Debug, Clone)]
pub struct SquareOff {
    pub symbol: Symbol,
    pub qty: i64,
    pub exit_side: Side,
    pub price: Price,
}

// what one end-of-day invocation did
#[derive(Debug, Clone, Default)]
pub struct EodReport {
    pub cancelled_orders: usize,
    pub refunded: Money,
    pub square_offs: Vec<SquareOff>,
    // (symbol, qty) merged into the long holding book
    pub migrated: Vec<(Symbol, i64)>,
    // (symbol, qty) short-first quantity covered into short-carry
    pub covered: Vec<(Symbol, i64)>,
}

impl EodReport {
    pub fn is_noop(&self) -> bool {
        self.cancelled_orders == 0
            && self.square_offs.is_empty()
            && self.migrated.is_empty()
            && self.covered.is_empty()
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("invalid quantity {0}")]
    InvalidQuantity(i64),

    #[error("invalid price {0}")]
    InvalidPrice(Decimal),

    #[error("symbol is missing or empty")]
    InvalidSymbol,

    #[error("user {0:?} not found")]
    UserNotFound(UserId),

    #[error("order {0:?} not found")]
    OrderNotFound(OrderId),

    #[error("order {0:?} is not open")]
    OrderNotOpen(OrderId),

    #[error("market is closed")]
    MarketClosed,

    #[error("no position to exit in {0}")]
    NoPosition(Symbol),

    #[error("no holding in {0}")]
    NoHolding(Symbol),

    #[error("quote unavailable: {0}")]
    Quote(#[from] QuoteError),

    #[error("funds error: {0}")]
    Funds(#[from] FundsError),
}
