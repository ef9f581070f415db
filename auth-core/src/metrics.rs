use anyhow::Result;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct AuthMetrics {
    registry: Registry,
    login_attempts: IntCounterVec,
    mfa_events: IntCounterVec,
    token_renewals: IntCounter,
}

impl AuthMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let login_attempts = IntCounterVec::new(
            Opts::new(
                "auth_login_attempts_total",
                "Count of login attempts grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(login_attempts.clone()))?;

        let mfa_events = IntCounterVec::new(
            Opts::new("auth_mfa_events_total", "Count of MFA-related events"),
            &["event"],
        )?;
        registry.register(Box::new(mfa_events.clone()))?;

        let token_renewals = IntCounter::new(
            "auth_token_renewals_total",
            "Count of access tokens minted from refresh sessions",
        )?;
        registry.register(Box::new(token_renewals.clone()))?;

        Ok(Self {
            registry,
            login_attempts,
            mfa_events,
            token_renewals,
        })
    }

    pub fn login_attempt(&self, outcome: &str) {
        self.login_attempts.with_label_values(&[outcome]).inc();
    }

    pub fn mfa_event(&self, event: &str) {
        self.mfa_events.with_label_values(&[event]).inc();
    }

    pub fn token_renewal(&self) {
        self.token_renewals.inc();
    }

    /// Render the registry in the Prometheus text exposition format. The
    /// host application wraps this in whatever transport it serves.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
