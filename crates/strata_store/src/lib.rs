pub mod config;
pub mod datastore;
mod db;
pub mod lock;
pub mod router;
pub mod schema;
pub mod store;

pub mod api {
    pub use strata_core::api::*;
}

pub mod value {
    pub use strata_core::value::*;
}

pub use strata_core::*;
pub use config::{DatabaseConfig, LimitsConfig, PoolConfig, StoreSettings, StrataConfig};
pub use datastore::{default_sqlite_path, load_or_init_config, open_store};
pub use lock::PartitionLock;
pub use router::PartitionRouter;
pub use store::{ObjectStore, StoreOptions};
