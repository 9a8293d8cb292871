use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{FieldPath, NodeId, Snapshot, StrataResult, Timestamp, Value, ValueKind};

pub const MAX_READ_LIMIT: u32 = 10_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteReceipt {
    pub id: i64,
    pub field: FieldPath,
    pub kind: ValueKind,
    pub latest: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub value: Value,
    pub timestamp: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchHit {
    pub node: NodeId,
    pub value: Value,
    pub timestamp: Timestamp,
}

#[async_trait]
pub trait ObjectWriteApi {
    async fn insert_object(
        &self,
        node: &NodeId,
        object: &Value,
        timestamp: Timestamp,
    ) -> StrataResult<Vec<WriteReceipt>>;

    async fn insert_field(
        &self,
        node: &NodeId,
        field: &FieldPath,
        value: &Value,
        timestamp: Timestamp,
    ) -> StrataResult<WriteReceipt>;
}

#[async_trait]
pub trait SnapshotApi {
    async fn synthesize_object(&self, node: &NodeId) -> StrataResult<Snapshot>;
    async fn synthesize_object_at(&self, node: &NodeId, at: Timestamp) -> StrataResult<Snapshot>;
}

#[async_trait]
pub trait SeriesApi {
    async fn get_series(
        &self,
        node: &NodeId,
        field: &FieldPath,
        at: Timestamp,
        limit: u32,
    ) -> StrataResult<Vec<SeriesPoint>>;

    async fn search(
        &self,
        field: &FieldPath,
        value: &Value,
        at: Timestamp,
        limit: u32,
    ) -> StrataResult<Vec<SearchHit>>;
}

#[async_trait]
pub trait LifecycleApi {
    async fn exists(&self, node: &NodeId) -> StrataResult<bool>;

    async fn remove(&self, node: &NodeId, confirmed: bool) -> StrataResult<u64>;
}
