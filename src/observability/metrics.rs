use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub deliveries_created_total: IntCounter,
    pub transitions_total: IntCounterVec,
    pub otp_issued_total: IntCounter,
    pub otp_verifications_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let deliveries_created_total =
            IntCounter::new("deliveries_created_total", "Total deliveries created")
                .expect("valid deliveries_created_total metric");

        let transitions_total = IntCounterVec::new(
            Opts::new("transitions_total", "Status transition attempts by outcome"),
            &["outcome"],
        )
        .expect("valid transitions_total metric");

        let otp_issued_total = IntCounter::new("otp_issued_total", "Total OTP codes issued")
            .expect("valid otp_issued_total metric");

        let otp_verifications_total = IntCounterVec::new(
            Opts::new(
                "otp_verifications_total",
                "OTP verification attempts by outcome",
            ),
            &["outcome"],
        )
        .expect("valid otp_verifications_total metric");

        registry
            .register(Box::new(deliveries_created_total.clone()))
            .expect("register deliveries_created_total");
        registry
            .register(Box::new(transitions_total.clone()))
            .expect("register transitions_total");
        registry
            .register(Box::new(otp_issued_total.clone()))
            .expect("register otp_issued_total");
        registry
            .register(Box::new(otp_verifications_total.clone()))
            .expect("register otp_verifications_total");

        Self {
            registry,
            deliveries_created_total,
            transitions_total,
            otp_issued_total,
            otp_verifications_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
