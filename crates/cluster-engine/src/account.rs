//! Account collaborator — balance, debit, credit

use parking_lot::Mutex;

/// Refused account operation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AccountError {
    #[error("Insufficient balance: required {required:.2}, available {available:.2}")]
    Insufficient { required: f64, available: f64 },

    #[error("Invalid amount: {0}")]
    InvalidAmount(f64),
}

/// Player wallet as seen by the engine. Retries, if any, are the
/// implementation's business.
pub trait AccountService: Send + Sync {
    fn balance(&self) -> f64;

    /// Take `amount`; returns the new balance
    fn debit(&self, amount: f64) -> Result<f64, AccountError>;

    /// Add `amount`; returns the new balance
    fn credit(&self, amount: f64) -> f64;
}

/// Local wallet for headless runs and tests
#[derive(Debug, Default)]
pub struct InMemoryAccount {
    balance: Mutex<f64>,
}

impl InMemoryAccount {
    pub fn new(balance: f64) -> Self {
        Self {
            balance: Mutex::new(balance),
        }
    }
}

impl AccountService for InMemoryAccount {
    fn balance(&self) -> f64 {
        *self.balance.lock()
    }

    fn debit(&self, amount: f64) -> Result<f64, AccountError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(AccountError::InvalidAmount(amount));
        }
        let mut balance = self.balance.lock();
        if *balance < amount {
            return Err(AccountError::Insufficient {
                required: amount,
                available: *balance,
            });
        }
        *balance -= amount;
        Ok(*balance)
    }

    fn credit(&self, amount: f64) -> f64 {
        let mut balance = self.balance.lock();
        if amount.is_finite() && amount > 0.0 {
            *balance += amount;
        }
        *balance
    }
}
