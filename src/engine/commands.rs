//! Transfer input and output

use serde::{Deserialize, Serialize};

use crate::domain::{Account, Entry, Transfer};

/// Input of one transfer. Validated by the caller: `amount > 0`, both
/// accounts exist and share a currency, and the caller owns the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
}

impl TransferParams {
    pub fn new(from_account_id: i64, to_account_id: i64, amount: i64) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount,
        }
    }

    pub fn is_self_transfer(&self) -> bool {
        self.from_account_id == self.to_account_id
    }

    /// Balance deltas as `(account_id, delta)`, ordered by ascending account
    /// id so every transfer touching the same pair locks rows in the same
    /// order, whatever its direction.
    pub fn balance_updates(&self) -> [(i64, i64); 2] {
        let debit = (self.from_account_id, -self.amount);
        let credit = (self.to_account_id, self.amount);
        if self.from_account_id < self.to_account_id {
            [debit, credit]
        } else {
            [credit, debit]
        }
    }
}

/// Post-commit state of one transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}
