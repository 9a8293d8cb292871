use log::{debug, info};
use sea_orm::{DatabaseBackend, DatabaseConnection, DbErr};
use sea_orm_migration::prelude::*;

use crate::db::Observation;
use crate::router::PartitionRouter;
use strata_core::{NodeKind, ValueKind};

const MAX_VARCHAR_LEN: usize = 255;

struct PartitionLayout<'a> {
    table: &'a str,
    kind: ValueKind,
    node_kind: NodeKind,
    max_string_len: usize,
}

pub async fn provision_partitions(
    conn: &DatabaseConnection,
    router: &PartitionRouter,
    node_kind: NodeKind,
    max_string_len: usize,
) -> Result<(), DbErr> {
    let manager = SchemaManager::new(conn);
    let backend = manager.get_database_backend();
    for kind in ValueKind::ALL {
        let layout = PartitionLayout {
            table: router.table_name(kind),
            kind,
            node_kind,
            max_string_len,
        };
        create_partition_table(&manager, backend, &layout).await?;
        debug!("strata: partition {} ready", layout.table);
    }
    info!(
        "strata: provisioned partitions for prefix '{}' on {backend:?}",
        router.prefix()
    );
    Ok(())
}

async fn create_partition_table(
    manager: &SchemaManager<'_>,
    backend: DatabaseBackend,
    layout: &PartitionLayout<'_>,
) -> Result<(), DbErr> {
    let index_name = format!("{}_node_field_ts_idx", layout.table);
    let mut table = Table::create();
    table
        .table(Alias::new(layout.table))
        .if_not_exists()
        .col(&mut id_col(backend))
        .col(&mut node_col(layout.node_kind))
        .col(
            ColumnDef::new(Observation::Field)
                .string_len(MAX_VARCHAR_LEN as u32)
                .not_null(),
        )
        .col(&mut value_col(layout.kind, layout.max_string_len))
        .col(
            ColumnDef::new(Observation::Timestamp)
                .big_integer()
                .not_null(),
        )
        .col(
            ColumnDef::new(Observation::Latest)
                .boolean()
                .not_null()
                .default(false),
        );
    // MySQL has no CREATE INDEX IF NOT EXISTS; declare the index with the table instead.
    if backend == DatabaseBackend::MySql {
        table.index(
            Index::create()
                .name(&index_name)
                .col(Observation::Node)
                .col(Observation::Field)
                .col(Observation::Timestamp),
        );
    }
    manager.create_table(table.to_owned()).await?;
    if backend != DatabaseBackend::MySql {
        manager
            .create_index(
                Index::create()
                    .name(&index_name)
                    .table(Alias::new(layout.table))
                    .if_not_exists()
                    .col(Observation::Node)
                    .col(Observation::Field)
                    .col(Observation::Timestamp)
                    .to_owned(),
            )
            .await?;
    }
    Ok(())
}

fn id_col(backend: DatabaseBackend) -> ColumnDef {
    let mut col_def = ColumnDef::new(Observation::Id);
    match backend {
        // AUTOINCREMENT is only accepted on an INTEGER PRIMARY KEY.
        DatabaseBackend::Sqlite => {
            col_def.integer();
        }
        _ => {
            col_def.big_integer();
        }
    }
    col_def.not_null().auto_increment().primary_key();
    col_def.to_owned()
}

fn node_col(node_kind: NodeKind) -> ColumnDef {
    let mut col_def = ColumnDef::new(Observation::Node);
    match node_kind {
        NodeKind::Text => {
            col_def.string_len(MAX_VARCHAR_LEN as u32);
        }
        NodeKind::Integer => {
            col_def.big_integer();
        }
    }
    col_def.not_null();
    col_def.to_owned()
}

fn value_col(kind: ValueKind, max_string_len: usize) -> ColumnDef {
    let mut col_def = ColumnDef::new(Observation::Value);
    match kind {
        ValueKind::String if max_string_len <= MAX_VARCHAR_LEN => {
            col_def.string_len(max_string_len.max(1) as u32);
        }
        ValueKind::String | ValueKind::Array => {
            col_def.text();
        }
        ValueKind::Number => {
            col_def.double();
        }
        ValueKind::Boolean => {
            col_def.small_integer();
        }
        ValueKind::Date => {
            col_def.big_integer();
        }
    }
    col_def.not_null();
    col_def.to_owned()
}
