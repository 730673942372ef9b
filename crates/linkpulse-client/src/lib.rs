pub mod baidu;
pub mod http;
pub mod providers;
pub mod quark;

pub use baidu::BaiduProbe;
pub use providers::{ProbeConfig, default_registry};
pub use quark::QuarkProbe;
