use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::Rng;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct OtpRecord {
    pub delivery_id: Uuid,
    pub customer_id: Uuid,
    pub driver_id: Uuid,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

/// Short-lived one-time codes proving physical handoff, keyed by delivery.
/// A resend appends a new record; earlier unexpired codes stay valid until
/// their own expiry, and verification does not consume a record. Expired
/// records are pruned lazily on access.
pub struct OtpLedger {
    records: DashMap<Uuid, Vec<OtpRecord>>,
    ttl: Duration,
}

impl OtpLedger {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            records: DashMap::new(),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Uniform 6-digit numeric code.
    pub fn generate_code() -> String {
        rand::thread_rng().gen_range(100_000..=999_999).to_string()
    }

    /// Persists an already-generated code. The service generates the code
    /// and notifies the customer first, so a code that was never delivered
    /// is never stored.
    pub fn store(&self, delivery_id: Uuid, customer_id: Uuid, driver_id: Uuid, code: String) {
        self.store_at(delivery_id, customer_id, driver_id, code, Utc::now());
    }

    pub fn store_at(
        &self,
        delivery_id: Uuid,
        customer_id: Uuid,
        driver_id: Uuid,
        code: String,
        now: DateTime<Utc>,
    ) {
        let record = OtpRecord {
            delivery_id,
            customer_id,
            driver_id,
            code,
            expires_at: now + self.ttl,
        };
        self.records.entry(delivery_id).or_default().push(record);
    }

    /// Generates, stores and returns a fresh code in one step.
    pub fn issue(&self, delivery_id: Uuid, customer_id: Uuid, driver_id: Uuid) -> String {
        let code = Self::generate_code();
        self.store(delivery_id, customer_id, driver_id, code.clone());
        code
    }

    pub fn verify(&self, delivery_id: Uuid, code: &str) -> bool {
        self.verify_at(delivery_id, code, Utc::now())
    }

    /// True iff any unexpired record for the delivery carries this code.
    /// Takes the clock as an argument so expiry is testable.
    pub fn verify_at(&self, delivery_id: Uuid, code: &str, now: DateTime<Utc>) -> bool {
        let Some(mut entry) = self.records.get_mut(&delivery_id) else {
            return false;
        };

        entry.retain(|record| record.expires_at > now);
        entry.iter().any(|record| record.code == code)
    }
}
