use std::collections::BTreeMap;

use serde::Serialize;

use crate::ids::split_segments;
use crate::{FieldPath, StoredValue, StrataError, StrataResult, Timestamp, Value, ValueCodec, ValueKind};

pub fn flatten<'a>(base: &FieldPath, value: &'a Value) -> StrataResult<Vec<(FieldPath, &'a Value)>> {
    let mut leaves = Vec::new();
    flatten_into(base, value, &mut leaves)?;
    Ok(leaves)
}

fn flatten_into<'a>(
    base: &FieldPath,
    value: &'a Value,
    leaves: &mut Vec<(FieldPath, &'a Value)>,
) -> StrataResult<()> {
    match value {
        Value::Object(entries) => {
            for (name, child) in entries {
                flatten_into(&base.child(name)?, child, leaves)?;
            }
        }
        primitive => {
            if base.is_root() {
                return Err(StrataError::invalid(
                    "a primitive value needs a field path below the root",
                ));
            }
            leaves.push((base.clone(), primitive));
        }
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq)]
pub struct StoredLeaf {
    pub kind: ValueKind,
    pub stored: StoredValue,
    pub timestamp: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Observed {
    pub value: Value,
    pub timestamp: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SnapshotNode {
    Leaf(Observed),
    Branch(BTreeMap<String, SnapshotNode>),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Snapshot {
    pub root: BTreeMap<String, SnapshotNode>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&SnapshotNode> {
        let mut segments = split_segments(path);
        let mut current = self.root.get(segments.next()?)?;
        for segment in segments {
            match current {
                SnapshotNode::Branch(children) => current = children.get(segment)?,
                SnapshotNode::Leaf(_) => return None,
            }
        }
        Some(current)
    }

    pub fn leaf(&self, path: &str) -> Option<&Observed> {
        match self.get(path)? {
            SnapshotNode::Leaf(observed) => Some(observed),
            SnapshotNode::Branch(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        fn branch_value(children: &BTreeMap<String, SnapshotNode>) -> Value {
            Value::Object(
                children
                    .iter()
                    .map(|(name, node)| {
                        let value = match node {
                            SnapshotNode::Leaf(observed) => observed.value.clone(),
                            SnapshotNode::Branch(children) => branch_value(children),
                        };
                        (name.clone(), value)
                    })
                    .collect(),
            )
        }
        branch_value(&self.root)
    }
}

// A path that is both a leaf and the prefix of another path is a structural conflict.
pub fn unflatten<I>(leaves: I) -> StrataResult<Snapshot>
where
    I: IntoIterator<Item = (String, StoredLeaf)>,
{
    let sorted: BTreeMap<String, StoredLeaf> = leaves.into_iter().collect();
    let mut snapshot = Snapshot::default();
    for (path, leaf) in sorted {
        let segments: Vec<&str> = split_segments(&path).collect();
        let Some((last, parents)) = segments.split_last() else {
            return Err(StrataError::conflict(format!(
                "path '{path}' addresses the object root"
            )));
        };
        let mut children = &mut snapshot.root;
        for segment in parents {
            let node = children
                .entry((*segment).to_string())
                .or_insert_with(|| SnapshotNode::Branch(BTreeMap::new()));
            children = match node {
                SnapshotNode::Branch(children) => children,
                SnapshotNode::Leaf(_) => {
                    return Err(StrataError::conflict(format!(
                        "path '{path}' descends through leaf '{segment}'"
                    )));
                }
            };
        }
        if children.contains_key(*last) {
            return Err(StrataError::conflict(format!(
                "path '{path}' is both a leaf and an interior node"
            )));
        }
        let value = ValueCodec::decode(leaf.kind, leaf.stored)?;
        children.insert(
            (*last).to_string(),
            SnapshotNode::Leaf(Observed {
                value,
                timestamp: leaf.timestamp,
            }),
        );
    }
    Ok(snapshot)
}
