use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use strata_core::{
    DEFAULT_MAX_ARRAY_BYTES, DEFAULT_MAX_STRING_LEN, MAX_READ_LIMIT, NodeKind, StrataError,
    StrataResult,
};

const DEFAULT_CONFIG_NAME: &str = "strata.json";
const DEFAULT_PREFIX: &str = "strata";
const DEFAULT_SQLITE_FILE: &str = "strata.sqlite";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum DatabaseConfig {
    Sqlite { path: Option<String> },
    Postgres { url: String },
    Mysql { url: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolConfig {
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub connect_timeout_ms: Option<u64>,
    pub acquire_timeout_ms: Option<u64>,
    pub idle_timeout_ms: Option<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreSettings {
    pub prefix: Option<String>,
    pub node_kind: Option<NodeKind>,
    pub locking: Option<bool>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub max_string_len: Option<usize>,
    pub max_array_bytes: Option<usize>,
    pub max_read_limit: Option<u32>,
}

impl LimitsConfig {
    pub fn with_defaults() -> Self {
        Self {
            max_string_len: Some(DEFAULT_MAX_STRING_LEN),
            max_array_bytes: Some(DEFAULT_MAX_ARRAY_BYTES),
            max_read_limit: Some(MAX_READ_LIMIT),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StrataConfig {
    pub database: DatabaseConfig,
    pub pool: Option<PoolConfig>,
    pub store: Option<StoreSettings>,
    pub limits: Option<LimitsConfig>,
}

impl StrataConfig {
    pub fn default_sqlite(path: impl Into<String>) -> Self {
        Self {
            database: DatabaseConfig::Sqlite {
                path: Some(path.into()),
            },
            pool: None,
            store: Some(StoreSettings {
                prefix: Some(DEFAULT_PREFIX.to_string()),
                node_kind: Some(NodeKind::Text),
                locking: Some(false),
            }),
            limits: Some(LimitsConfig::with_defaults()),
        }
    }

    pub fn load_or_init(base_dir: &Path, default_sqlite_path: &Path) -> StrataResult<Self> {
        let config_path = base_dir.join(DEFAULT_CONFIG_NAME);
        match fs::read_to_string(&config_path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|err| {
                StrataError::invalid(format!("{}: {err}", config_path.display()))
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                let config = Self::default_sqlite(default_sqlite_path.to_string_lossy());
                config.persist(&config_path)?;
                Ok(config)
            }
            Err(err) => Err(io_failure("read", &config_path, err)),
        }
    }

    fn persist(&self, config_path: &Path) -> StrataResult<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|err| io_failure("create", parent, err))?;
        }
        let payload = serde_json::to_string_pretty(self)
            .map_err(|err| StrataError::backend(format!("serialize config: {err}")))?;
        fs::write(config_path, payload).map_err(|err| io_failure("write", config_path, err))
    }

    pub fn sqlite_path(&self, base_dir: &Path) -> StrataResult<PathBuf> {
        let DatabaseConfig::Sqlite { path } = &self.database else {
            return Err(StrataError::invalid(format!(
                "{} backend has no sqlite file",
                self.backend_name()
            )));
        };
        let file = PathBuf::from(path.as_deref().unwrap_or(DEFAULT_SQLITE_FILE));
        Ok(if file.is_absolute() {
            file
        } else {
            base_dir.join(file)
        })
    }

    pub fn backend_name(&self) -> &'static str {
        match self.database {
            DatabaseConfig::Sqlite { .. } => "sqlite",
            DatabaseConfig::Postgres { .. } => "postgres",
            DatabaseConfig::Mysql { .. } => "mysql",
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.store.as_ref().and_then(|store| store.prefix.as_deref())
    }

    pub fn node_kind(&self) -> NodeKind {
        self.store
            .as_ref()
            .and_then(|store| store.node_kind)
            .unwrap_or_default()
    }

    pub fn locking(&self) -> bool {
        self.store
            .as_ref()
            .and_then(|store| store.locking)
            .unwrap_or(false)
    }

    pub fn enable_locking(&mut self) {
        let store = self.store.get_or_insert(StoreSettings {
            prefix: None,
            node_kind: None,
            locking: None,
        });
        store.locking = Some(true);
    }
}

pub fn locking_flag(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|value| value.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "on" | "yes")
    )
}

fn io_failure(action: &str, path: &Path, err: io::Error) -> StrataError {
    StrataError::backend(format!("{action} {}: {err}", path.display()))
}
