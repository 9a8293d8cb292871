use std::env;
use std::path::{Path, PathBuf};

use crate::config::locking_flag;
use crate::{ObjectStore, StrataConfig, StrataResult};

const DEFAULT_DB_NAME: &str = "strata.sqlite";
const LOCKING_ENV: &str = "STRATA_LOCKING";

pub fn load_or_init_config(base: &Path) -> StrataResult<StrataConfig> {
    load_with_locking_override(base, env::var(LOCKING_ENV).ok().as_deref())
}

fn load_with_locking_override(base: &Path, flag: Option<&str>) -> StrataResult<StrataConfig> {
    let mut config = StrataConfig::load_or_init(base, &default_sqlite_path(base))?;
    if locking_flag(flag) {
        config.enable_locking();
    }
    Ok(config)
}

pub async fn open_store(base: &Path) -> StrataResult<ObjectStore> {
    let config = load_or_init_config(base)?;
    ObjectStore::connect(&config, base).await
}

pub fn default_sqlite_path(base: &Path) -> PathBuf {
    base.join(DEFAULT_DB_NAME)
}

#[cfg(test)]
mod tests {
    use super::load_with_locking_override;
    use crate::{ObjectStore, StrataResult};
    use tempfile::tempdir;

    #[tokio::test]
    async fn locking_flag_overrides_persisted_config() -> StrataResult<()> {
        let dir = tempdir().expect("tempdir");
        let base = dir.path();

        let persisted = load_with_locking_override(base, None)?;
        assert!(!persisted.locking());
        let unlocked = ObjectStore::connect(&persisted, base).await?;
        assert!(!unlocked.locking_enabled());

        let overridden = load_with_locking_override(base, Some("on"))?;
        assert!(overridden.locking());
        assert_eq!(overridden.prefix(), Some("strata"));
        let locked = ObjectStore::connect(&overridden, base).await?;
        assert!(locked.locking_enabled());

        let reread = load_with_locking_override(base, Some("0"))?;
        assert!(!reread.locking());
        Ok(())
    }
}
