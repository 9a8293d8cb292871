use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use log::{debug, info, warn};
use sea_orm::sea_query::{
    Alias, Expr, Iden, MysqlQueryBuilder, Order, PostgresQueryBuilder, Query,
    QueryStatementWriter, SqliteQueryBuilder, Value as SeaValue,
};
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, ExecResult,
    QueryResult, Statement,
};

use crate::db::Observation;
use crate::lock::PartitionLock;
use crate::router::PartitionRouter;
use crate::schema::provision_partitions;
use crate::{DatabaseConfig, StrataConfig};
use strata_core::{
    DEFAULT_MAX_ARRAY_BYTES, DEFAULT_MAX_STRING_LEN, FieldPath, LifecycleApi, MAX_READ_LIMIT,
    NodeId, NodeKind, ObjectWriteApi, SearchHit, SeriesApi, SeriesPoint, Snapshot, SnapshotApi,
    StoredLeaf, StoredValue, StrataError, StrataResult, Timestamp, Value, ValueCodec, ValueKind,
    WriteReceipt, flatten, unflatten,
};

#[derive(Clone)]
pub struct ObjectStore {
    conn: DatabaseConnection,
    backend: DatabaseBackend,
    router: PartitionRouter,
    codec: ValueCodec,
    node_kind: NodeKind,
    max_read_limit: u32,
    lock: PartitionLock,
}

#[derive(Clone, Copy, Debug)]
pub struct StoreOptions {
    pub node_kind: NodeKind,
    pub locking: bool,
    pub max_string_len: usize,
    pub max_array_bytes: usize,
    pub max_read_limit: u32,
}

impl StoreOptions {
    pub fn from_config(config: &StrataConfig) -> Self {
        let defaults = crate::LimitsConfig::with_defaults();
        let limits = config.limits.clone().unwrap_or(defaults);
        Self {
            node_kind: config.node_kind(),
            locking: config.locking(),
            max_string_len: limits.max_string_len.unwrap_or(DEFAULT_MAX_STRING_LEN),
            max_array_bytes: limits.max_array_bytes.unwrap_or(DEFAULT_MAX_ARRAY_BYTES),
            max_read_limit: limits
                .max_read_limit
                .unwrap_or(MAX_READ_LIMIT)
                .clamp(1, MAX_READ_LIMIT),
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum SnapshotFilter {
    Current,
    AsOf(Timestamp),
}

impl ObjectStore {
    pub async fn connect(config: &StrataConfig, base_dir: &Path) -> StrataResult<Self> {
        let router = PartitionRouter::new(config.prefix())?;
        let url = build_connection_url(config, base_dir)?;
        let mut options = ConnectOptions::new(url);
        if let Some(pool) = &config.pool {
            if let Some(max) = pool.max_connections {
                options.max_connections(max);
            }
            if let Some(min) = pool.min_connections {
                options.min_connections(min);
            }
            if let Some(timeout_ms) = pool.connect_timeout_ms {
                options.connect_timeout(Duration::from_millis(timeout_ms));
            }
            if let Some(timeout_ms) = pool.acquire_timeout_ms {
                options.acquire_timeout(Duration::from_millis(timeout_ms));
            }
            if let Some(timeout_ms) = pool.idle_timeout_ms {
                options.idle_timeout(Duration::from_millis(timeout_ms));
            }
        }
        options.sqlx_logging(false);
        let conn = Database::connect(options).await.map_err(StrataError::from)?;
        info!("strata: connected to {} backend", config.backend_name());
        let store = Self::with_connection(conn, router, StoreOptions::from_config(config));
        store.initialize().await?;
        Ok(store)
    }

    pub fn with_connection(
        conn: DatabaseConnection,
        router: PartitionRouter,
        options: StoreOptions,
    ) -> Self {
        let backend = conn.get_database_backend();
        Self {
            conn,
            backend,
            router,
            codec: ValueCodec::new(options.max_string_len, options.max_array_bytes),
            node_kind: options.node_kind,
            max_read_limit: options.max_read_limit,
            lock: PartitionLock::new(options.locking),
        }
    }

    pub async fn initialize(&self) -> StrataResult<()> {
        provision_partitions(
            &self.conn,
            &self.router,
            self.node_kind,
            self.codec.max_string_len(),
        )
        .await
        .map_err(StrataError::from)
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    pub fn router(&self) -> &PartitionRouter {
        &self.router
    }

    pub fn node_kind(&self) -> NodeKind {
        self.node_kind
    }

    pub fn locking_enabled(&self) -> bool {
        self.lock.is_enabled()
    }

    fn check_limit(&self, limit: u32) -> StrataResult<()> {
        if limit == 0 || limit > self.max_read_limit {
            return Err(StrataError::invalid(format!(
                "limit {limit} outside 1..={}",
                self.max_read_limit
            )));
        }
        Ok(())
    }

    // Demotes only rows ordered before the new one; the true maximum is never unmarked.
    async fn write_encoded(
        &self,
        node: &NodeId,
        field: &FieldPath,
        kind: ValueKind,
        stored: &StoredValue,
        timestamp: Timestamp,
    ) -> StrataResult<WriteReceipt> {
        let table = self.router.table(kind);
        let newer = Query::select()
            .expr(Expr::val(1))
            .from(table.clone())
            .and_where(Expr::col(Observation::Node).eq(node_value(node)))
            .and_where(Expr::col(Observation::Field).eq(field.as_str()))
            .and_where(Expr::col(Observation::Latest).eq(true))
            .and_where(Expr::col(Observation::Timestamp).gt(timestamp.as_millis()))
            .limit(1)
            .to_owned();
        let latest = query_one(&self.conn, &newer).await?.is_none();
        let id = self
            .insert_observation(table.clone(), node, field, stored, timestamp, latest)
            .await?;
        if latest {
            let demote = Query::update()
                .table(table)
                .value(Observation::Latest, false)
                .and_where(Expr::col(Observation::Node).eq(node_value(node)))
                .and_where(Expr::col(Observation::Field).eq(field.as_str()))
                .and_where(Expr::col(Observation::Latest).eq(true))
                .and_where(
                    Expr::col(Observation::Timestamp)
                        .lt(timestamp.as_millis())
                        .or(Expr::col(Observation::Timestamp)
                            .eq(timestamp.as_millis())
                            .and(Expr::col(Observation::Id).lt(id))),
                )
                .to_owned();
            let demoted = exec(&self.conn, &demote).await?.rows_affected();
            if demoted > 0 {
                debug!("strata: {node}{field} demoted {demoted} row(s) in favour of id {id}");
            }
        }
        Ok(WriteReceipt {
            id,
            field: field.clone(),
            kind,
            latest,
        })
    }

    async fn insert_observation(
        &self,
        table: Alias,
        node: &NodeId,
        field: &FieldPath,
        stored: &StoredValue,
        timestamp: Timestamp,
        latest: bool,
    ) -> StrataResult<i64> {
        let mut insert = Query::insert();
        insert
            .into_table(table)
            .columns([
                Observation::Node,
                Observation::Field,
                Observation::Value,
                Observation::Timestamp,
                Observation::Latest,
            ])
            .values([
                node_value(node).into(),
                field.as_str().into(),
                stored_value(stored).into(),
                timestamp.as_millis().into(),
                latest.into(),
            ])
            .map_err(|err| StrataError::backend(err.to_string()))?;
        match self.backend {
            DatabaseBackend::Postgres => {
                insert.returning_col(Observation::Id);
                let row = query_one(&self.conn, &insert)
                    .await?
                    .ok_or_else(|| StrataError::backend("insert returned no id"))?;
                Ok(row.try_get("", &col_name(Observation::Id))?)
            }
            _ => {
                let result = exec(&self.conn, &insert).await?;
                Ok(result.last_insert_id() as i64)
            }
        }
    }

    async fn synthesize(&self, node: &NodeId, filter: SnapshotFilter) -> StrataResult<Snapshot> {
        node.validate(self.node_kind)?;
        if let SnapshotFilter::AsOf(at) = filter {
            at.validate()?;
        }
        let _guard = self.lock.shared().await;
        let partitions = join_partitions(
            ValueKind::ALL.map(|kind| self.fetch_snapshot_rows(node, kind, filter)),
        )
        .await?;
        let mut merged: BTreeMap<String, StoredLeaf> = BTreeMap::new();
        let mut repeated = 0usize;
        for rows in partitions {
            for (field, leaf) in rows {
                match merged.get(&field) {
                    Some(existing) => {
                        repeated += 1;
                        if leaf.timestamp >= existing.timestamp {
                            merged.insert(field, leaf);
                        }
                    }
                    None => {
                        merged.insert(field, leaf);
                    }
                }
            }
        }
        if repeated > 0 && matches!(filter, SnapshotFilter::Current) {
            warn!("strata: node {node} has {repeated} extra row(s) marked latest");
        }
        unflatten(merged)
    }

    async fn fetch_snapshot_rows(
        &self,
        node: &NodeId,
        kind: ValueKind,
        filter: SnapshotFilter,
    ) -> StrataResult<Vec<(String, StoredLeaf)>> {
        let mut select = Query::select();
        select
            .columns([Observation::Field, Observation::Value, Observation::Timestamp])
            .from(self.router.table(kind))
            .and_where(Expr::col(Observation::Node).eq(node_value(node)));
        match filter {
            SnapshotFilter::Current => {
                select.and_where(Expr::col(Observation::Latest).eq(true));
            }
            SnapshotFilter::AsOf(at) => {
                select.and_where(Expr::col(Observation::Timestamp).lte(at.as_millis()));
            }
        }
        select
            .order_by(Observation::Timestamp, Order::Asc)
            .order_by(Observation::Id, Order::Asc);
        let rows = query_all(&self.conn, &select).await?;
        rows.iter()
            .map(|row| {
                let field: String = row.try_get("", &col_name(Observation::Field))?;
                let leaf = StoredLeaf {
                    kind,
                    stored: read_stored(kind, row)?,
                    timestamp: read_timestamp(row)?,
                };
                Ok((field, leaf))
            })
            .collect()
    }
}

#[async_trait]
impl ObjectWriteApi for ObjectStore {
    async fn insert_object(
        &self,
        node: &NodeId,
        object: &Value,
        timestamp: Timestamp,
    ) -> StrataResult<Vec<WriteReceipt>> {
        node.validate(self.node_kind)?;
        timestamp.validate()?;
        if !matches!(object, Value::Object(_)) {
            return Err(StrataError::invalid(
                "insert_object expects a plain object at the top level",
            ));
        }
        let encoded = flatten(&FieldPath::root(), object)?
            .into_iter()
            .map(|(field, value)| -> StrataResult<_> {
                let (kind, stored) = self.codec.encode(value)?;
                Ok((field, kind, stored))
            })
            .collect::<StrataResult<Vec<_>>>()?;
        let _guard = self.lock.exclusive().await;
        debug!(
            "strata: writing {} leaf value(s) for node {node} at {timestamp}",
            encoded.len()
        );
        join_partitions(
            encoded
                .iter()
                .map(|(field, kind, stored)| self.write_encoded(node, field, *kind, stored, timestamp)),
        )
        .await
    }

    async fn insert_field(
        &self,
        node: &NodeId,
        field: &FieldPath,
        value: &Value,
        timestamp: Timestamp,
    ) -> StrataResult<WriteReceipt> {
        node.validate(self.node_kind)?;
        require_leaf_path(field)?;
        timestamp.validate()?;
        let (kind, stored) = self.codec.encode(value)?;
        let _guard = self.lock.exclusive().await;
        self.write_encoded(node, field, kind, &stored, timestamp).await
    }
}

#[async_trait]
impl SnapshotApi for ObjectStore {
    async fn synthesize_object(&self, node: &NodeId) -> StrataResult<Snapshot> {
        self.synthesize(node, SnapshotFilter::Current).await
    }

    async fn synthesize_object_at(&self, node: &NodeId, at: Timestamp) -> StrataResult<Snapshot> {
        self.synthesize(node, SnapshotFilter::AsOf(at)).await
    }
}

#[async_trait]
impl SeriesApi for ObjectStore {
    async fn get_series(
        &self,
        node: &NodeId,
        field: &FieldPath,
        at: Timestamp,
        limit: u32,
    ) -> StrataResult<Vec<SeriesPoint>> {
        node.validate(self.node_kind)?;
        require_leaf_path(field)?;
        at.validate()?;
        self.check_limit(limit)?;
        let _guard = self.lock.shared().await;
        for kind in ValueKind::SERIES_PRIORITY {
            let select = Query::select()
                .columns([Observation::Value, Observation::Timestamp])
                .from(self.router.table(kind))
                .and_where(Expr::col(Observation::Node).eq(node_value(node)))
                .and_where(Expr::col(Observation::Field).eq(field.as_str()))
                .and_where(Expr::col(Observation::Timestamp).lte(at.as_millis()))
                .order_by(Observation::Timestamp, Order::Desc)
                .order_by(Observation::Id, Order::Desc)
                .limit(u64::from(limit))
                .to_owned();
            let rows = query_all(&self.conn, &select).await?;
            if rows.is_empty() {
                continue;
            }
            debug!(
                "strata: series {node}{field} served {} row(s) from {kind} partition",
                rows.len()
            );
            return rows
                .iter()
                .map(|row| {
                    Ok(SeriesPoint {
                        value: ValueCodec::decode(kind, read_stored(kind, row)?)?,
                        timestamp: read_timestamp(row)?,
                    })
                })
                .collect();
        }
        Ok(Vec::new())
    }

    async fn search(
        &self,
        field: &FieldPath,
        value: &Value,
        at: Timestamp,
        limit: u32,
    ) -> StrataResult<Vec<SearchHit>> {
        require_leaf_path(field)?;
        at.validate()?;
        self.check_limit(limit)?;
        let (kind, stored) = self.codec.encode(value)?;
        let _guard = self.lock.shared().await;
        let select = Query::select()
            .columns([Observation::Node, Observation::Value, Observation::Timestamp])
            .from(self.router.table(kind))
            .and_where(Expr::col(Observation::Field).eq(field.as_str()))
            .and_where(Expr::col(Observation::Value).eq(stored_value(&stored)))
            .and_where(Expr::col(Observation::Timestamp).lte(at.as_millis()))
            .order_by(Observation::Timestamp, Order::Desc)
            .order_by(Observation::Id, Order::Desc)
            .limit(u64::from(limit))
            .to_owned();
        let rows = query_all(&self.conn, &select).await?;
        rows.iter()
            .map(|row| {
                Ok(SearchHit {
                    node: read_node(self.node_kind, row)?,
                    value: ValueCodec::decode(kind, read_stored(kind, row)?)?,
                    timestamp: read_timestamp(row)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl LifecycleApi for ObjectStore {
    async fn exists(&self, node: &NodeId) -> StrataResult<bool> {
        node.validate(self.node_kind)?;
        let _guard = self.lock.shared().await;
        for kind in ValueKind::ALL {
            let select = Query::select()
                .expr(Expr::val(1))
                .from(self.router.table(kind))
                .and_where(Expr::col(Observation::Node).eq(node_value(node)))
                .limit(1)
                .to_owned();
            if query_one(&self.conn, &select).await?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn remove(&self, node: &NodeId, confirmed: bool) -> StrataResult<u64> {
        if !confirmed {
            return Err(StrataError::confirmation(format!(
                "removing node {node} deletes its whole history; pass confirmed = true"
            )));
        }
        node.validate(self.node_kind)?;
        let _guard = self.lock.exclusive().await;
        let mut removed = 0;
        for kind in ValueKind::ALL {
            let delete = Query::delete()
                .from_table(self.router.table(kind))
                .and_where(Expr::col(Observation::Node).eq(node_value(node)))
                .to_owned();
            removed += exec(&self.conn, &delete).await?.rows_affected();
        }
        info!("strata: removed {removed} observation(s) of node {node}");
        Ok(removed)
    }
}

async fn join_partitions<T, F>(branches: impl IntoIterator<Item = F>) -> StrataResult<Vec<T>>
where
    F: Future<Output = StrataResult<T>>,
{
    let results = join_all(branches).await;
    let failures = results.iter().filter(|result| result.is_err()).count();
    if failures > 1 {
        warn!("strata: {failures} concurrent branches failed; reporting the first");
    }
    results.into_iter().collect()
}

fn require_leaf_path(field: &FieldPath) -> StrataResult<()> {
    if field.is_root() {
        return Err(StrataError::invalid("field path must name an attribute"));
    }
    Ok(())
}

fn node_value(node: &NodeId) -> SeaValue {
    match node {
        NodeId::Text(value) => value.clone().into(),
        NodeId::Integer(value) => (*value).into(),
    }
}

fn stored_value(stored: &StoredValue) -> SeaValue {
    match stored {
        StoredValue::Real(value) => (*value).into(),
        StoredValue::Text(value) => value.clone().into(),
        StoredValue::Flag(value) => (*value).into(),
        StoredValue::Millis(value) => (*value).into(),
    }
}

fn read_stored(kind: ValueKind, row: &QueryResult) -> StrataResult<StoredValue> {
    let column = col_name(Observation::Value);
    Ok(match kind {
        ValueKind::String | ValueKind::Array => StoredValue::Text(row.try_get("", &column)?),
        ValueKind::Number => StoredValue::Real(row.try_get("", &column)?),
        ValueKind::Boolean => StoredValue::Flag(row.try_get("", &column)?),
        ValueKind::Date => StoredValue::Millis(row.try_get("", &column)?),
    })
}

fn read_node(kind: NodeKind, row: &QueryResult) -> StrataResult<NodeId> {
    let column = col_name(Observation::Node);
    Ok(match kind {
        NodeKind::Text => NodeId::Text(row.try_get("", &column)?),
        NodeKind::Integer => NodeId::Integer(row.try_get("", &column)?),
    })
}

fn read_timestamp(row: &QueryResult) -> StrataResult<Timestamp> {
    let millis: i64 = row.try_get("", &col_name(Observation::Timestamp))?;
    Ok(Timestamp(millis))
}

fn col_name(column: impl Iden) -> String {
    column.to_string()
}

fn build_stmt<S: QueryStatementWriter>(
    backend: DatabaseBackend,
    stmt: &S,
) -> (String, sea_orm::sea_query::Values) {
    match backend {
        DatabaseBackend::Postgres => stmt.build(PostgresQueryBuilder),
        DatabaseBackend::MySql => stmt.build(MysqlQueryBuilder),
        _ => stmt.build(SqliteQueryBuilder),
    }
}

async fn exec<C, S>(conn: &C, stmt: &S) -> StrataResult<ExecResult>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let (sql, values) = build_stmt(backend, stmt);
    let result = conn
        .execute(Statement::from_sql_and_values(backend, &sql, values))
        .await?;
    Ok(result)
}

async fn query_all<C, S>(conn: &C, stmt: &S) -> StrataResult<Vec<QueryResult>>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let (sql, values) = build_stmt(backend, stmt);
    let rows = conn
        .query_all(Statement::from_sql_and_values(backend, &sql, values))
        .await?;
    Ok(rows)
}

async fn query_one<C, S>(conn: &C, stmt: &S) -> StrataResult<Option<QueryResult>>
where
    C: ConnectionTrait,
    S: QueryStatementWriter,
{
    let backend = conn.get_database_backend();
    let (sql, values) = build_stmt(backend, stmt);
    let row = conn
        .query_one(Statement::from_sql_and_values(backend, &sql, values))
        .await?;
    Ok(row)
}

fn build_connection_url(config: &StrataConfig, base_dir: &Path) -> StrataResult<String> {
    match &config.database {
        DatabaseConfig::Sqlite { .. } => {
            let path = config.sqlite_path(base_dir)?;
            Ok(format!("sqlite://{}?mode=rwc", path.display()))
        }
        DatabaseConfig::Postgres { url } => Ok(url.clone()),
        DatabaseConfig::Mysql { url } => Ok(url.clone()),
    }
}
