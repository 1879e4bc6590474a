//! Funds ledger: per-user cash balance.
//!
//! `available` is the spendable balance. A resting BUY limit blocks its
//! notional by direct deduction and the block is refunded on cancel, so
//! debit and credit must stay symmetric on every path that touches an order.

use crate::types::{Money, Timestamp, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundsAccount {
    pub user_id: UserId,
    pub username: String,
    // lifetime deposits, reporting only
    pub total_funds: Money,
    pub available: Money,
    pub created_at: Timestamp,
}

impl FundsAccount {
    pub fn new(user_id: UserId, username: String, timestamp: Timestamp) -> Self {
        Self {
            user_id,
            username,
            total_funds: Money::zero(),
            available: Money::zero(),
            created_at: timestamp,
        }
    }

    pub fn deposit(&mut self, amount: Money) {
        self.available = self.available.add(amount);
        self.total_funds = self.total_funds.add(amount);
    }

    // execution cost or limit block. the engine never lets available go negative.
    pub fn debit(&mut self, amount: Money) -> Result<(), FundsError> {
        if amount.value() > self.available.value() {
            return Err(FundsError::InsufficientFunds {
                requested: amount,
                available: self.available,
            });
        }
        self.available = self.available.sub(amount);
        Ok(())
    }

    // sale proceeds or a cancel refund
    pub fn credit(&mut self, amount: Money) {
        self.available = self.available.add(amount);
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum FundsError {
    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: Money, available: Money },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn account() -> FundsAccount {
        let mut account =
            FundsAccount::new(UserId(1), "asha".to_string(), Timestamp::from_millis(0));
        account.deposit(Money::new(dec!(10000)));
        account
    }

    #[test]
    fn deposit_tracks_total_and_available() {
        let mut account = account();
        account.deposit(Money::new(dec!(2500)));
        assert_eq!(account.available.value(), dec!(12500));
        assert_eq!(account.total_funds.value(), dec!(12500));
    }

    #[test]
    fn debit_rejects_overdraft() {
        let mut account = account();
        let result = account.debit(Money::new(dec!(10001)));
        assert!(matches!(result, Err(FundsError::InsufficientFunds { .. })));
        // no mutation on rejection
        assert_eq!(account.available.value(), dec!(10000));
    }

    #[test]
    fn block_and_refund_round_trip() {
        let mut account = account();
        account.debit(Money::new(dec!(4000))).unwrap();
        assert_eq!(account.available.value(), dec!(6000));
        account.credit(Money::new(dec!(4000)));
        assert_eq!(account.available.value(), dec!(10000));
        // total is untouched by block/refund
        assert_eq!(account.total_funds.value(), dec!(10000));
    }
}
