use std::sync::Arc;
use std::time::Duration;

use linkpulse_core::error::AppError;
use linkpulse_core::provider::ProviderRegistry;

use crate::baidu::BaiduProbe;
use crate::http::DEFAULT_PROBE_TIMEOUT;
use crate::quark::{DEFAULT_QUARK_API_BASE, QuarkProbe};

pub const QUARK_PATTERN: &str = r"^https?://pan\.quark\.cn/s/";
pub const BAIDU_PATTERN: &str = r"^https?://(pan|yun)\.baidu\.com/(s/|share/init)";

/// Providers whose links are recognised but not checked.
pub const UNSUPPORTED_PROVIDERS: &[(&str, &str)] = &[
    ("aliyun", r"^https?://(www\.)?(aliyundrive\.com|alipan\.com)/s/"),
    ("115", r"^https?://(115\.com|115cdn\.com|anxia\.com)/s/"),
    ("123pan", r"^https?://(www\.)?(123pan\.com|123pan\.cn|123684\.com|123865\.com|123912\.com)/s/"),
    ("xunlei", r"^https?://pan\.xunlei\.com/s/"),
    ("uc", r"^https?://drive\.uc\.cn/s/"),
    ("tianyi", r"^https?://cloud\.189\.cn/(t/|web/share)"),
];

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub timeout: Duration,
    pub quark_api_base: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_PROBE_TIMEOUT,
            quark_api_base: DEFAULT_QUARK_API_BASE.to_string(),
        }
    }
}

impl ProbeConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Registry with every known provider, checked ones first.
pub fn default_registry(config: &ProbeConfig) -> Result<ProviderRegistry, AppError> {
    let quark = QuarkProbe::with_api_base(config.timeout, &config.quark_api_base)?;
    let baidu = BaiduProbe::new(config.timeout)?;

    let mut registry = ProviderRegistry::new()
        .register("quark", QUARK_PATTERN, Arc::new(quark))?
        .register("baidu", BAIDU_PATTERN, Arc::new(baidu))?;

    for (name, pattern) in UNSUPPORTED_PROVIDERS {
        registry = registry.register_unsupported(*name, pattern)?;
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use linkpulse_core::models::Verdict;
    use linkpulse_core::provider::{UNRECOGNIZED_LINK_REASON, UNSUPPORTED_PROVIDER_REASON};

    use super::*;

    fn registry() -> ProviderRegistry {
        default_registry(&ProbeConfig::default()).unwrap()
    }

    fn provider_of(url: &str) -> Option<String> {
        registry().resolve(url).map(|e| e.name().to_string())
    }

    #[test]
    fn test_resolves_checked_providers() {
        assert_eq!(provider_of("https://pan.quark.cn/s/abc123").as_deref(), Some("quark"));
        assert_eq!(provider_of("https://pan.baidu.com/s/1xYz").as_deref(), Some("baidu"));
        assert_eq!(
            provider_of("https://pan.baidu.com/share/init?surl=xYz").as_deref(),
            Some("baidu")
        );
        assert_eq!(provider_of("http://yun.baidu.com/s/1xYz").as_deref(), Some("baidu"));
    }

    #[test]
    fn test_resolves_unsupported_providers() {
        let cases = [
            ("https://www.aliyundrive.com/s/Ab1", "aliyun"),
            ("https://www.alipan.com/s/Ab1", "aliyun"),
            ("https://115.com/s/sw1", "115"),
            ("https://www.123pan.com/s/abc-1", "123pan"),
            ("https://pan.xunlei.com/s/VN1", "xunlei"),
            ("https://drive.uc.cn/s/abc", "uc"),
            ("https://cloud.189.cn/t/abc", "tianyi"),
        ];
        for (url, expected) in cases {
            assert_eq!(provider_of(url).as_deref(), Some(expected), "{url}");
        }
    }

    #[test]
    fn test_unknown_hosts_do_not_resolve() {
        assert!(provider_of("https://example.com/s/abc").is_none());
        assert!(provider_of("https://pan.quark.cn/list").is_none());
        assert!(provider_of("magnet:?xt=urn:btih:abc").is_none());
    }

    #[test]
    fn test_registry_order() {
        let names: Vec<_> = registry().provider_names().map(str::to_string).collect();
        assert_eq!(&names[..2], &["quark", "baidu"]);
        assert_eq!(names.len(), 2 + UNSUPPORTED_PROVIDERS.len());
    }

    #[tokio::test]
    async fn test_unsupported_and_unrecognized_results() {
        let registry = registry();

        let (provider, result) = registry.check("https://pan.xunlei.com/s/VN1").await;
        assert_eq!(provider.as_deref(), Some("xunlei"));
        assert_eq!(result.verdict, Verdict::Inconclusive);
        assert_eq!(result.reason, UNSUPPORTED_PROVIDER_REASON);
        assert!(result.is_unsupported());

        let (provider, result) = registry.check("https://example.com/file.zip").await;
        assert!(provider.is_none());
        assert_eq!(result.reason, UNRECOGNIZED_LINK_REASON);
        assert!(!result.is_unsupported());
    }
}
