use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use vault_accounts::EventKind;
use vault_core::{AccountId, Amount};
use vault_infra::audit_log::AuditEntry;
use vault_infra::history::{HistoryEntry, HistoryView, SortOrder};
use vault_infra::projections::{BalanceMismatch, ConservationReport};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

/// Body of deposit and withdraw requests; `amount` is a decimal coin string.
#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    pub amount: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub order: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EventListQuery {
    pub account: Option<String>,
    pub kind: Option<String>,
    pub from: Option<u64>,
    pub to: Option<u64>,
    pub limit: Option<u32>,
    pub after: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PriceQuery {
    /// Comma-separated identifiers.
    pub ids: Option<String>,
    pub vs_currency: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub account: AccountId,
    pub balance: String,
    pub balance_wei: String,
}

impl BalanceResponse {
    pub fn new(account: AccountId, balance: Amount) -> Self {
        Self {
            account,
            balance: balance.to_ether_string(),
            balance_wei: balance.wei().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EntryResponse {
    pub sequence: u64,
    pub event_id: Uuid,
    pub event_type: String,
    pub kind: EventKind,
    pub account: AccountId,
    pub amount: String,
    pub amount_wei: String,
    pub recorded_at: DateTime<Utc>,
}

impl From<&AuditEntry> for EntryResponse {
    fn from(entry: &AuditEntry) -> Self {
        Self {
            sequence: entry.sequence,
            event_id: entry.event_id,
            event_type: entry.event_type.clone(),
            kind: entry.kind(),
            account: entry.account(),
            amount: entry.amount().to_ether_string(),
            amount_wei: entry.amount().wei().to_string(),
            recorded_at: entry.recorded_at,
        }
    }
}

/// Result of a successful deposit or withdrawal.
#[derive(Debug, Serialize)]
pub struct MutationResponse {
    pub entry: EntryResponse,
    pub balance: BalanceResponse,
}

#[derive(Debug, Serialize)]
pub struct HistoryEntryResponse {
    pub sequence: u64,
    pub event_id: Uuid,
    pub kind: EventKind,
    pub amount: String,
    pub occurred_at: DateTime<Utc>,
}

impl From<&HistoryEntry> for HistoryEntryResponse {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            sequence: entry.sequence,
            event_id: entry.event_id,
            kind: entry.kind,
            amount: entry.amount.to_ether_string(),
            occurred_at: entry.occurred_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub account: AccountId,
    pub order: SortOrder,
    pub complete: bool,
    pub missing: Vec<EventKind>,
    pub entries: Vec<HistoryEntryResponse>,
}

impl HistoryResponse {
    pub fn new(account: AccountId, view: &HistoryView) -> Self {
        Self {
            account,
            order: view.order,
            complete: view.is_complete(),
            missing: view.missing.clone(),
            entries: view.entries.iter().map(HistoryEntryResponse::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EventListResponse {
    pub head: u64,
    pub events: Vec<EntryResponse>,
    /// Pass as `after` to read the next page; absent on the last page.
    pub next_after: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct MismatchResponse {
    pub account: AccountId,
    pub ledger: String,
    pub replayed: String,
}

impl From<&BalanceMismatch> for MismatchResponse {
    fn from(m: &BalanceMismatch) -> Self {
        Self {
            account: m.account,
            ledger: m.ledger.to_ether_string(),
            replayed: m.replayed.to_ether_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConservationResponse {
    pub holds: bool,
    pub head: u64,
    pub accounts_checked: usize,
    pub total_deposited: String,
    pub total_withdrawn: String,
    pub total_held: String,
    pub mismatches: Vec<MismatchResponse>,
}

impl From<&ConservationReport> for ConservationResponse {
    fn from(report: &ConservationReport) -> Self {
        Self {
            holds: report.holds(),
            head: report.head,
            accounts_checked: report.accounts_checked,
            total_deposited: report.total_deposited.to_ether_string(),
            total_withdrawn: report.total_withdrawn.to_ether_string(),
            total_held: report.total_held.to_ether_string(),
            mismatches: report.mismatches.iter().map(MismatchResponse::from).collect(),
        }
    }
}

// -------------------------
// Input parsing helpers
// -------------------------

pub fn parse_account_id(raw: &str) -> Result<AccountId, axum::response::Response> {
    raw.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid account id"))
}

pub fn parse_amount_body(
    body: Result<Json<AmountRequest>, JsonRejection>,
) -> Result<Amount, axum::response::Response> {
    let Json(body) = body.map_err(|e| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_body", e.body_text())
    })?;
    Amount::parse_ether(&body.amount)
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_amount", e.to_string()))
}

pub fn parse_kind(raw: &str) -> Result<EventKind, axum::response::Response> {
    raw.parse()
        .map_err(|e: vault_core::DomainError| {
            errors::json_error(StatusCode::BAD_REQUEST, "invalid_kind", e.to_string())
        })
}

pub fn parse_order(raw: Option<&str>, default: SortOrder) -> Result<SortOrder, axum::response::Response> {
    match raw {
        Some(raw) => raw
            .parse()
            .map_err(|e: vault_infra::history::HistoryError| {
                errors::json_error(StatusCode::BAD_REQUEST, "invalid_order", e.to_string())
            }),
        None => Ok(default),
    }
}
