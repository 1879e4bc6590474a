// 5.0: quote board. the engine is agnostic to where prices come from; the host
// pushes last-traded prices in and every read goes through a staleness and
// zero-price filter. a failed oracle read simply never lands here, so the
// pending order retries on the next sweep.

use crate::types::{Price, Symbol, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteUpdate {
    pub price: Price,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QuoteError {
    // no usable price: never quoted, quoted at zero, or past the TTL
    #[error("quote unavailable for symbol")]
    Unavailable,
}

#[derive(Debug, Clone, Default)]
pub struct QuoteBoard {
    quotes: HashMap<Symbol, QuoteUpdate>,
}

impl QuoteBoard {
    pub fn new() -> Self {
        Self {
            quotes: HashMap::new(),
        }
    }

    // zero and negative prices are the oracle's "I don't know" and are dropped
    pub fn update(&mut self, symbol: Symbol, price: Decimal, timestamp: Timestamp) -> bool {
        match Price::new(price) {
            Some(price) => {
                self.quotes.insert(symbol, QuoteUpdate { price, timestamp });
                true
            }
            None => false,
        }
    }

    pub fn last_price(
        &self,
        symbol: &Symbol,
        now: Timestamp,
        ttl_millis: i64,
    ) -> Result<Price, QuoteError> {
        let quote = self.quotes.get(symbol).ok_or(QuoteError::Unavailable)?;
        if now.as_millis() - quote.timestamp.as_millis() > ttl_millis {
            return Err(QuoteError::Unavailable);
        }
        Ok(quote.price)
    }

    // best-effort read for display paths where a missing quote is fine
    pub fn peek(&self, symbol: &Symbol) -> Option<Price> {
        self.quotes.get(symbol).map(|q| q.price)
    }
}
