use std::sync::Arc;

use crate::engine::otp::OtpLedger;
use crate::external::{LogNotifier, LogPaymentGateway, Notifier, PaymentGateway};
use crate::observability::metrics::Metrics;
use crate::store::{DeliveryStore, UserDirectory};

pub struct AppState {
    pub users: UserDirectory,
    pub deliveries: DeliveryStore,
    pub otp: OtpLedger,
    pub notifier: Arc<dyn Notifier>,
    pub payments: Arc<dyn PaymentGateway>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(otp_ttl_secs: i64) -> Self {
        Self::with_collaborators(
            otp_ttl_secs,
            Arc::new(LogNotifier),
            Arc::new(LogPaymentGateway),
        )
    }

    pub fn with_collaborators(
        otp_ttl_secs: i64,
        notifier: Arc<dyn Notifier>,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            users: UserDirectory::new(),
            deliveries: DeliveryStore::new(),
            otp: OtpLedger::new(otp_ttl_secs),
            notifier,
            payments,
            metrics: Metrics::new(),
        }
    }
}
