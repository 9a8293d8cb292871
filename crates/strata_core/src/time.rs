use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::{StrataError, StrataResult};

// 100,000,000 days after the epoch.
pub const MAX_TIMESTAMP_MILLIS: i64 = 8_640_000_000_000_000;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as i64;
        Self(millis)
    }

    pub fn from_millis(millis: i64) -> StrataResult<Self> {
        let timestamp = Self(millis);
        timestamp.validate()?;
        Ok(timestamp)
    }

    pub fn as_millis(self) -> i64 {
        self.0
    }

    pub fn validate(self) -> StrataResult<()> {
        if (0..=MAX_TIMESTAMP_MILLIS).contains(&self.0) {
            Ok(())
        } else {
            Err(StrataError::invalid(format!(
                "timestamp {} is not a representable instant",
                self.0
            )))
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}
