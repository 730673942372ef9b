pub mod config;
pub mod database;
pub mod pg_source;
pub mod rest_source;

pub use config::{StoreConfig, StoreKind};
pub use database::{Store, StoreSource};
pub use pg_source::PgSource;
pub use rest_source::RestSource;
