use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub rps: u32,
    pub max_concurrency: u32,
}

impl RateLimitPolicy {
    pub const fn new(rps: u32, max_concurrency: u32) -> Self {
        Self {
            rps,
            max_concurrency,
        }
    }
}

// Provider quotas, carried over from the integrations registry. Unlisted
// integrations get the conservative 1 rps / 1 in-flight fallback.
const FALLBACK_POLICY: RateLimitPolicy = RateLimitPolicy::new(1, 1);

pub fn default_rate_limits() -> HashMap<String, RateLimitPolicy> {
    let table: &[(&str, RateLimitPolicy)] = &[
        ("google_sheets", RateLimitPolicy::new(10, 5)),
        ("google_drive", RateLimitPolicy::new(10, 5)),
        ("google_docs", RateLimitPolicy::new(10, 5)),
        ("google_slides", RateLimitPolicy::new(10, 5)),
        ("google_calendar", RateLimitPolicy::new(10, 5)),
        ("slack", RateLimitPolicy::new(1, 1)),
        ("notion", RateLimitPolicy::new(3, 3)),
        ("linkedin", RateLimitPolicy::new(1, 2)),
        ("tiktok", RateLimitPolicy::new(1, 2)),
        ("resend", RateLimitPolicy::new(2, 4)),
        ("twilio", RateLimitPolicy::new(1, 4)),
        ("hubspot", RateLimitPolicy::new(10, 5)),
        ("zapier", RateLimitPolicy::new(5, 5)),
        ("custom_api", RateLimitPolicy::new(1, 4)),
    ];
    table
        .iter()
        .map(|(id, policy)| (id.to_string(), *policy))
        .collect()
}

#[derive(Debug)]
struct IntegrationState {
    window_start: Instant,
    window_count: u32,
    in_flight: u32,
}

#[derive(Clone)]
pub struct IntegrationLimiter {
    policies: Arc<HashMap<String, RateLimitPolicy>>,
    state: Arc<Mutex<HashMap<String, IntegrationState>>>,
}

impl IntegrationLimiter {
    pub fn new(policies: HashMap<String, RateLimitPolicy>) -> Self {
        Self {
            policies: Arc::new(policies),
            state: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn policy(&self, integration_id: &str) -> RateLimitPolicy {
        self.policies
            .get(integration_id)
            .copied()
            .unwrap_or(FALLBACK_POLICY)
    }

    // Takes both an rps token for the current one-second window and a
    // concurrency slot; callers must release() after the provider call.
    pub fn acquire(&self, integration_id: &str) -> bool {
        let policy = self.policy(integration_id);
        let mut state = self.state.lock().expect("limiter mutex poisoned");
        let entry = state
            .entry(integration_id.to_string())
            .or_insert_with(|| IntegrationState {
                window_start: Instant::now(),
                window_count: 0,
                in_flight: 0,
            });

        let now = Instant::now();
        if now.duration_since(entry.window_start) >= Duration::from_secs(1) {
            entry.window_start = now;
            entry.window_count = 0;
        }

        if entry.window_count >= policy.rps.max(1) {
            return false;
        }
        if entry.in_flight >= policy.max_concurrency.max(1) {
            return false;
        }

        entry.window_count += 1;
        entry.in_flight += 1;
        true
    }

    pub fn release(&self, integration_id: &str) {
        let mut state = self.state.lock().expect("limiter mutex poisoned");
        if let Some(entry) = state.get_mut(integration_id) {
            entry.in_flight = entry.in_flight.saturating_sub(1);
        }
    }
}
