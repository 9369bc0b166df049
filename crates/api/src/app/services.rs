//! Service wiring: one ledger, its audit log, history and the price feed.

use std::sync::Arc;

use vault_infra::audit_log::InMemoryAuditLog;
use vault_infra::config::VaultConfig;
use vault_infra::history::{AuditLogSource, HistoryReconstructor};
use vault_infra::ledger::{Ledger, LoggingPayout, Payout};
use vault_infra::prices::{PriceFeed, PriceSource};

pub type SharedAuditLog = Arc<InMemoryAuditLog>;

/// Everything the handlers need, shared behind one `Arc`.
pub struct AppServices {
    pub ledger: Ledger<SharedAuditLog>,
    pub history: HistoryReconstructor<AuditLogSource<SharedAuditLog>>,
    pub prices: PriceFeed<Arc<dyn PriceSource>>,
}

impl std::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppServices")
            .field("ledger", &self.ledger)
            .finish_non_exhaustive()
    }
}

/// Production wiring: logging payout, price source chosen by build features.
pub fn build_services(config: &VaultConfig) -> AppServices {
    build_services_with(config, default_price_source(config), LoggingPayout)
}

pub fn build_services_with(
    config: &VaultConfig,
    price_source: Arc<dyn PriceSource>,
    payout: impl Payout + 'static,
) -> AppServices {
    let audit_log: SharedAuditLog = Arc::new(InMemoryAuditLog::new());

    let ledger = Ledger::with_payout(Arc::clone(&audit_log), payout);
    let history = HistoryReconstructor::new(AuditLogSource::new(audit_log), config.history_order);
    let prices = PriceFeed::new(price_source, config.price_symbols.clone(), config.price_currency.clone())
        .with_failure_threshold(config.price_failure_threshold)
        .with_cache_ttl(config.price_cache_ttl);

    tracing::info!(
        history_order = config.history_order.as_str(),
        price_currency = %config.price_currency,
        price_symbols = config.price_symbols.len(),
        "services ready"
    );

    AppServices {
        ledger,
        history,
        prices,
    }
}

#[cfg(feature = "coingecko")]
fn default_price_source(config: &VaultConfig) -> Arc<dyn PriceSource> {
    Arc::new(vault_infra::prices::CoinGeckoSource::new(config.coingecko_api_key.clone()))
}

#[cfg(not(feature = "coingecko"))]
fn default_price_source(_config: &VaultConfig) -> Arc<dyn PriceSource> {
    Arc::new(vault_infra::prices::StaticPriceSource::fallback())
}
