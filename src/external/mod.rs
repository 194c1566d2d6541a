use uuid::Uuid;

use crate::error::AppError;

/// Out-of-band channel that hands an OTP code to the customer. The default
/// implementation logs instead of talking to a mail provider; tests swap in
/// recording or failing implementations.
pub trait Notifier: Send + Sync {
    fn send_otp(&self, recipient: &str, code: &str) -> Result<(), AppError>;
}

pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send_otp(&self, recipient: &str, code: &str) -> Result<(), AppError> {
        tracing::info!(recipient = %recipient, code = %code, "otp dispatched");
        Ok(())
    }
}

/// Third-party payment capture. Failures surface as retryable dependency
/// errors and leave the payment status untouched.
pub trait PaymentGateway: Send + Sync {
    fn capture(&self, delivery_id: Uuid, amount: f64) -> Result<(), AppError>;
}

pub struct LogPaymentGateway;

impl PaymentGateway for LogPaymentGateway {
    fn capture(&self, delivery_id: Uuid, amount: f64) -> Result<(), AppError> {
        tracing::info!(delivery_id = %delivery_id, amount = amount, "payment captured");
        Ok(())
    }
}
