pub mod config;
pub mod engine;
pub mod error;
pub mod query;
pub mod store;
pub mod types;

pub use config::StoreConfig;
pub use error::StoreError;
pub use query::{Order, OrderBy, ScanOptions};
pub use store::{DEFAULT_ATTRIBUTE_GROUP, Scan, ScanEntry, Store};
pub use types::value::Value;
