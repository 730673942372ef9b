//! Per-provider circuit breaker scoped to a single run.
//!
//! Guards share providers that start failing systematically (IP-level
//! blocking, API outages) so a run stops hammering them.
//!
//! # Circuit States
//!
//! ```text
//! CLOSED (probing) --[N consecutive inconclusive]--> OPEN (skipping, until run ends)
//!    ^
//!    +--[definitive verdict resets the counter]
//! ```
//!
//! There is no half-open state: an open circuit stays open for the rest of
//! the run, and a fresh [`BreakerState`] is created for every run.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::models::ProbeResult;

/// Current state of a provider's circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Probes are issued normally.
    Closed,
    /// Tripped - records for this provider are skipped.
    Open,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
        }
    }
}

/// Configuration for breaker behavior.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive inconclusive results that trip a provider.
    pub trip_threshold: u32,

    /// Whether "provider not supported" results count toward a trip.
    pub count_unsupported: bool,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            trip_threshold: 10,
            count_unsupported: true,
        }
    }
}

#[derive(Debug, Clone)]
struct ProviderCircuit {
    state: CircuitState,
    consecutive_inconclusive: u32,
    last_reason: Option<String>,
}

impl ProviderCircuit {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_inconclusive: 0,
            last_reason: None,
        }
    }
}

/// Snapshot of one provider's circuit for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderStats {
    pub provider: String,
    pub state: CircuitState,
    pub consecutive_inconclusive: u32,
    pub last_reason: Option<String>,
}

/// Thread-safe breaker state for all providers of a run.
#[derive(Clone)]
pub struct BreakerState {
    config: BreakerConfig,
    inner: Arc<Mutex<HashMap<String, ProviderCircuit>>>,
}

impl BreakerState {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Acquires the inner mutex lock, recovering from poison if necessary.
    fn lock_inner(&self) -> std::sync::MutexGuard<'_, HashMap<String, ProviderCircuit>> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned breaker mutex");
            poisoned.into_inner()
        })
    }

    pub fn state(&self, provider: &str) -> CircuitState {
        self.lock_inner()
            .get(provider)
            .map(|c| c.state)
            .unwrap_or(CircuitState::Closed)
    }

    pub fn is_tripped(&self, provider: &str) -> bool {
        self.state(provider) == CircuitState::Open
    }

    pub fn stats(&self, provider: &str) -> ProviderStats {
        let inner = self.lock_inner();
        let circuit = inner.get(provider).cloned().unwrap_or_else(ProviderCircuit::new);
        ProviderStats {
            provider: provider.to_string(),
            state: circuit.state,
            consecutive_inconclusive: circuit.consecutive_inconclusive,
            last_reason: circuit.last_reason,
        }
    }

    /// Feed a probe result for `provider`. Returns true if this call tripped it.
    pub fn record(&self, provider: &str, result: &ProbeResult) -> bool {
        if result.verdict.is_definitive() {
            self.record_definitive(provider);
            return false;
        }
        if result.is_unsupported() && !self.config.count_unsupported {
            return false;
        }
        self.record_inconclusive(provider, &result.reason)
    }

    pub fn record_definitive(&self, provider: &str) {
        let mut inner = self.lock_inner();
        let circuit = inner
            .entry(provider.to_string())
            .or_insert_with(ProviderCircuit::new);
        circuit.consecutive_inconclusive = 0;
    }

    /// Count one inconclusive result. Returns true if the provider tripped now.
    pub fn record_inconclusive(&self, provider: &str, reason: &str) -> bool {
        let mut inner = self.lock_inner();
        let circuit = inner
            .entry(provider.to_string())
            .or_insert_with(ProviderCircuit::new);

        circuit.consecutive_inconclusive += 1;
        circuit.last_reason = Some(reason.to_string());

        if circuit.state == CircuitState::Closed
            && circuit.consecutive_inconclusive >= self.config.trip_threshold
        {
            circuit.state = CircuitState::Open;
            tracing::warn!(
                %provider,
                failures = circuit.consecutive_inconclusive,
                last_reason = %reason,
                "Circuit breaker tripped after {} consecutive inconclusive checks, skipping provider for the rest of the run",
                circuit.consecutive_inconclusive
            );
            return true;
        }
        false
    }

    /// Providers whose circuit is open, sorted by name.
    pub fn tripped_providers(&self) -> Vec<String> {
        let inner = self.lock_inner();
        let mut open: Vec<String> = inner
            .iter()
            .filter(|(_, c)| c.state == CircuitState::Open)
            .map(|(name, _)| name.clone())
            .collect();
        open.sort();
        open
    }
}

impl std::fmt::Debug for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BreakerState")
            .field("config", &self.config)
            .field("tripped", &self.tripped_providers())
            .finish()
    }
}
