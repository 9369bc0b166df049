//! Value release seam.
//!
//! A payout runs after the withdrawal has been debited and may execute
//! arbitrary code, including calls back into the ledger.

use std::sync::Mutex;

use thiserror::Error;

use vault_core::{AccountId, Amount};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayoutError {
    #[error("payout rejected: {0}")]
    Rejected(String),
}

impl PayoutError {
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }
}

/// Releases withdrawn value to the account holder.
pub trait Payout: Send + Sync {
    fn release(&self, account: AccountId, amount: Amount) -> Result<(), PayoutError>;
}

impl<F> Payout for F
where
    F: Fn(AccountId, Amount) -> Result<(), PayoutError> + Send + Sync,
{
    fn release(&self, account: AccountId, amount: Amount) -> Result<(), PayoutError> {
        self(account, amount)
    }
}

/// Payout that only records the release in the trace log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingPayout;

impl Payout for LoggingPayout {
    fn release(&self, account: AccountId, amount: Amount) -> Result<(), PayoutError> {
        tracing::info!(account = %account, amount = %amount, "value released");
        Ok(())
    }
}

/// Payout that keeps every release in memory.
#[derive(Debug, Default)]
pub struct InMemoryPayout {
    releases: Mutex<Vec<(AccountId, Amount)>>,
}

impl InMemoryPayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn releases(&self) -> Vec<(AccountId, Amount)> {
        self.releases.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn total_released(&self) -> Amount {
        self.releases().into_iter().map(|(_, amount)| amount).sum()
    }
}

impl Payout for InMemoryPayout {
    fn release(&self, account: AccountId, amount: Amount) -> Result<(), PayoutError> {
        self.releases
            .lock()
            .map_err(|_| PayoutError::rejected("payout ledger poisoned"))?
            .push((account, amount));
        Ok(())
    }
}
