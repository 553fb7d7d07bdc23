use std::sync::Arc;

use crate::config::GateConfig;
use crate::gate::PaymentGate;
use crate::provider::PaymentProvider;
use crate::store::GateStore;

/// Shared application state
pub struct AppState<P> {
    pub config: Arc<GateConfig>,
    pub gate: PaymentGate<P>,
}

impl<P: PaymentProvider> AppState<P> {
    pub fn new(config: GateConfig, store: Arc<dyn GateStore>, provider: P) -> Self {
        let gate = PaymentGate::new(
            store,
            provider,
            config.endpoint.clone(),
            config.invoice_memo.clone(),
        );
        Self {
            config: Arc::new(config),
            gate,
        }
    }
}
