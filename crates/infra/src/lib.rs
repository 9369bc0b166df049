//! Infrastructure layer: audit log, ledger core, history, read models,
//! price feed and configuration.

pub mod audit_log;
pub mod config;
pub mod history;
pub mod ledger;
pub mod prices;
pub mod projections;

pub use audit_log::{AuditEntry, AuditLog, AuditLogError, EventFilter, InMemoryAuditLog, PublishingAuditLog};
pub use config::{ConfigError, VaultConfig};
pub use history::{HistoryReconstructor, HistoryView, SortOrder};
pub use ledger::{Ledger, LedgerError, Payout, PayoutError};
