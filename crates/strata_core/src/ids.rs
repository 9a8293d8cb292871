use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{StrataError, StrataResult};

pub const MAX_NODE_LEN: usize = 255;
pub const MAX_FIELD_LEN: usize = 255;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    #[default]
    Text,
    Integer,
}

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeId {
    Integer(i64),
    Text(String),
}

impl NodeId {
    pub fn text(value: impl Into<String>) -> Self {
        NodeId::Text(value.into())
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            NodeId::Text(_) => NodeKind::Text,
            NodeId::Integer(_) => NodeKind::Integer,
        }
    }

    pub fn parse(kind: NodeKind, raw: &str) -> StrataResult<Self> {
        let node = match kind {
            NodeKind::Text => NodeId::Text(raw.to_string()),
            NodeKind::Integer => NodeId::Integer(
                raw.parse()
                    .map_err(|err| StrataError::invalid(format!("invalid node '{raw}': {err}")))?,
            ),
        };
        node.validate(kind)?;
        Ok(node)
    }

    pub fn validate(&self, expected: NodeKind) -> StrataResult<()> {
        if self.kind() != expected {
            return Err(StrataError::invalid(format!(
                "node {self} does not match configured node kind {expected:?}"
            )));
        }
        if let NodeId::Text(value) = self {
            if value.is_empty() {
                return Err(StrataError::invalid("node id must not be empty"));
            }
            if value.chars().count() > MAX_NODE_LEN {
                return Err(StrataError::invalid(format!(
                    "node id exceeds {MAX_NODE_LEN} characters"
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Text(value) => write!(f, "{value}"),
            NodeId::Integer(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        NodeId::Text(value.to_string())
    }
}

impl From<i64> for NodeId {
    fn from(value: i64) -> Self {
        NodeId::Integer(value)
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPath(String);

impl FieldPath {
    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn parse(raw: &str) -> StrataResult<Self> {
        if raw.is_empty() {
            return Err(StrataError::invalid("field path must not be empty"));
        }
        if raw.chars().count() > MAX_FIELD_LEN {
            return Err(StrataError::invalid(format!(
                "field path exceeds {MAX_FIELD_LEN} characters"
            )));
        }
        let Some(rest) = raw.strip_prefix('.') else {
            return Err(StrataError::invalid(format!(
                "field path '{raw}' must start with '.'"
            )));
        };
        if rest.split('.').any(str::is_empty) {
            return Err(StrataError::invalid(format!(
                "field path '{raw}' has an empty segment"
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn child(&self, name: &str) -> StrataResult<Self> {
        if name.is_empty() {
            return Err(StrataError::invalid("attribute names must not be empty"));
        }
        if name.contains('.') {
            return Err(StrataError::invalid(format!(
                "attribute name '{name}' must not contain '.'"
            )));
        }
        let path = format!("{}.{name}", self.0);
        if path.chars().count() > MAX_FIELD_LEN {
            return Err(StrataError::invalid(format!(
                "field path '{path}' exceeds {MAX_FIELD_LEN} characters"
            )));
        }
        Ok(Self(path))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub(crate) fn split_segments(raw: &str) -> impl Iterator<Item = &str> {
    raw.split('.').skip(1)
}
