//! Provider dispatch table.
//!
//! A provider is a URL pattern plus the probe that understands its share
//! pages. The registry resolves a URL to the first matching entry; adding a
//! provider means appending an entry, not adding a branch.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;

use crate::error::AppError;
use crate::models::ProbeResult;
use crate::traits::Probe;

pub const UNSUPPORTED_PROVIDER_REASON: &str = "provider not supported";
pub const UNRECOGNIZED_LINK_REASON: &str = "unsupported link type";

/// Probe for providers that are recognised but cannot be checked.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedProbe;

#[async_trait]
impl Probe for UnsupportedProbe {
    async fn probe(&self, _url: &str) -> ProbeResult {
        ProbeResult::unsupported(UNSUPPORTED_PROVIDER_REASON)
    }
}

/// One registered provider.
#[derive(Clone)]
pub struct ProviderEntry {
    name: String,
    pattern: Regex,
    probe: Arc<dyn Probe>,
}

impl ProviderEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&self, url: &str) -> bool {
        self.pattern.is_match(url)
    }

    pub fn probe(&self) -> &Arc<dyn Probe> {
        &self.probe
    }
}

impl std::fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_str())
            .finish()
    }
}

/// Ordered table of `{pattern, probe}` pairs.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    entries: Vec<ProviderEntry>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a provider. Earlier entries win when patterns overlap.
    pub fn register(
        mut self,
        name: impl Into<String>,
        pattern: &str,
        probe: Arc<dyn Probe>,
    ) -> Result<Self, AppError> {
        let name = name.into();
        let pattern = Regex::new(pattern).map_err(|e| {
            AppError::ConfigError(format!("Invalid URL pattern for provider '{name}': {e}"))
        })?;
        self.entries.push(ProviderEntry {
            name,
            pattern,
            probe,
        });
        Ok(self)
    }

    /// Register a provider whose links are recognised but never probed.
    pub fn register_unsupported(
        self,
        name: impl Into<String>,
        pattern: &str,
    ) -> Result<Self, AppError> {
        self.register(name, pattern, Arc::new(UnsupportedProbe))
    }

    pub fn resolve(&self, url: &str) -> Option<&ProviderEntry> {
        self.entries.iter().find(|entry| entry.matches(url))
    }

    pub fn provider_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Resolve and probe a URL. Returns the provider name (if any) with the result.
    pub async fn check(&self, url: &str) -> (Option<String>, ProbeResult) {
        match self.resolve(url) {
            Some(entry) => {
                let result = entry.probe.probe(url).await;
                (Some(entry.name.clone()), result)
            }
            None => (None, ProbeResult::inconclusive(UNRECOGNIZED_LINK_REASON)),
        }
    }
}
