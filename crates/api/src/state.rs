//! Shared application state.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::services::notifier::Notifier;
use crate::services::payment::PaymentProcessor;

/// Shared state for the API, cheap to clone into every handler.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    notifier: Notifier,
    payments: PaymentProcessor,
}

impl AppState {
    /// Create application state from configuration and a connected pool.
    #[must_use]
    pub fn new(config: ApiConfig, pool: PgPool) -> Self {
        let payments = PaymentProcessor::new(config.payment.clone());
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                notifier: Notifier::default(),
                payments,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    #[must_use]
    pub fn payments(&self) -> &PaymentProcessor {
        &self.inner.payments
    }
}
