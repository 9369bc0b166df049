//! Fallback-switching price feed.
//!
//! ```text
//! live ──(threshold consecutive failures)──▶ degraded
//!  ▲                                            │
//!  └──── successful fetch / reset_to_live ──────┘
//! ```
//!
//! While degraded, each id is served from its last good live price or, when
//! there is none, from the static fallback table. Failures never reach the
//! caller; they surface as `degraded` and `last_error` on the snapshot.
//! Retry scheduling is left to whoever calls the feed.
//!
//! Successful live responses are cached per `(ids, currency)` for
//! [`DEFAULT_CACHE_TTL`]; `refresh` and `reset_to_live` bypass the cache.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use super::{PriceError, PriceSource, PriceTable, StaticPriceSource, usable};

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// How long a successful live response is served without asking the source.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// What the feed reports for one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSnapshot {
    pub currency: String,
    pub prices: PriceTable,
    pub degraded: bool,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct FeedState {
    consecutive_failures: u32,
    degraded: bool,
    last_error: Option<String>,
    /// Last usable live price per (currency, id).
    last_good: BTreeMap<(String, String), f64>,
    /// Recent live responses keyed by (currency, ids).
    responses: BTreeMap<(String, Vec<String>), (Instant, PriceTable)>,
}

#[derive(Debug)]
pub struct PriceFeed<S> {
    source: S,
    fallback: StaticPriceSource,
    failure_threshold: u32,
    cache_ttl: Duration,
    symbols: Vec<String>,
    currency: String,
    state: Mutex<FeedState>,
}

impl<S> PriceFeed<S>
where
    S: PriceSource,
{
    /// Feed over `source`, serving `symbols` in `currency` by default.
    pub fn new(source: S, symbols: Vec<String>, currency: impl Into<String>) -> Self {
        Self {
            source,
            fallback: StaticPriceSource::fallback(),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            cache_ttl: DEFAULT_CACHE_TTL,
            symbols,
            currency: currency.into().to_ascii_lowercase(),
            state: Mutex::new(FeedState::default()),
        }
    }

    /// Consecutive failures before switching to fallback prices (at least 1).
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// How long live responses are reused; `Duration::ZERO` disables caching.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_fallback(mut self, fallback: StaticPriceSource) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn is_degraded(&self) -> bool {
        self.lock().degraded
    }

    /// Prices of the configured symbols in the configured currency.
    pub async fn current(&self) -> PriceSnapshot {
        self.get_prices(&self.symbols, &self.currency).await
    }

    /// Fetch `ids` in `currency` from the live source, falling back as needed.
    pub async fn get_prices(&self, ids: &[String], currency: &str) -> PriceSnapshot {
        let currency = currency.to_ascii_lowercase();
        {
            let mut state = self.lock();
            let key = (currency.clone(), ids.to_vec());
            let ttl = self.cache_ttl;
            state.responses.retain(|_, (at, _)| at.elapsed() < ttl);
            if let Some((_, prices)) = state.responses.get(&key) {
                let prices = prices.clone();
                return snapshot(&state, &currency, prices);
            }
        }
        self.fetch_live(ids, &currency).await
    }

    async fn fetch_live(&self, ids: &[String], currency: &str) -> PriceSnapshot {
        let currency = currency.to_ascii_lowercase();
        let fetched = self.source.fetch(ids, &currency).await;

        let mut state = self.lock();
        match fetched {
            Ok(table) => self.record_success(&mut state, ids, &currency, &table),
            Err(e) => self.record_failure(&mut state, ids, &currency, &e),
        }
    }

    /// Forget the failure streak and fetch now. A degraded feed stays degraded
    /// until a fetch succeeds.
    pub async fn refresh(&self) -> PriceSnapshot {
        self.lock().consecutive_failures = 0;
        self.fetch_live(&self.symbols, &self.currency).await
    }

    /// Leave degraded mode and fetch live prices now.
    pub async fn reset_to_live(&self) -> PriceSnapshot {
        {
            let mut state = self.lock();
            state.degraded = false;
            state.consecutive_failures = 0;
            state.last_error = None;
        }
        info!("price feed reset to live");
        self.fetch_live(&self.symbols, &self.currency).await
    }

    fn record_success(
        &self,
        state: &mut FeedState,
        ids: &[String],
        currency: &str,
        table: &PriceTable,
    ) -> PriceSnapshot {
        let prices: PriceTable = ids
            .iter()
            .map(|id| (id.clone(), usable(table.get(id).copied().flatten())))
            .collect();

        for (id, price) in &prices {
            if let Some(price) = price {
                state.last_good.insert((currency.to_string(), id.clone()), *price);
            }
        }

        if state.degraded {
            info!(currency = %currency, "live prices recovered");
        }
        state.degraded = false;
        state.consecutive_failures = 0;
        state.last_error = None;

        if !self.cache_ttl.is_zero() {
            state
                .responses
                .insert((currency.to_string(), ids.to_vec()), (Instant::now(), prices.clone()));
        }

        snapshot(state, currency, prices)
    }

    fn record_failure(
        &self,
        state: &mut FeedState,
        ids: &[String],
        currency: &str,
        error: &PriceError,
    ) -> PriceSnapshot {
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.last_error = Some(error.to_string());

        if !state.degraded && state.consecutive_failures >= self.failure_threshold {
            state.degraded = true;
            warn!(
                failures = state.consecutive_failures,
                error = %error,
                "price source failing, switching to fallback prices"
            );
        } else {
            warn!(failures = state.consecutive_failures, error = %error, "price fetch failed");
        }

        let prices: PriceTable = ids
            .iter()
            .map(|id| {
                let cached = state
                    .last_good
                    .get(&(currency.to_string(), id.clone()))
                    .copied();
                let price = match cached {
                    Some(p) => Some(p),
                    None if state.degraded => self.fallback.price(id, currency),
                    None => None,
                };
                (id.clone(), price)
            })
            .collect();

        snapshot(state, currency, prices)
    }

    fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn snapshot(state: &FeedState, currency: &str, prices: PriceTable) -> PriceSnapshot {
    PriceSnapshot {
        currency: currency.to_string(),
        prices,
        degraded: state.degraded,
        consecutive_failures: state.consecutive_failures,
        last_error: state.last_error.clone(),
    }
}
