use serde_json::json;
use strata_store::{
    FieldPath, LifecycleApi, NodeId, NodeKind, ObjectStore, ObjectWriteApi, SearchHit, SeriesApi,
    SnapshotApi, StrataConfig, StrataError, StrataResult, Timestamp, Value,
};
use tempfile::tempdir;

async fn open(base: &std::path::Path) -> StrataResult<ObjectStore> {
    let config = StrataConfig::default_sqlite(base.join("strata.sqlite").to_string_lossy());
    ObjectStore::connect(&config, base).await
}

#[tokio::test]
async fn remove_requires_confirmation_then_clears_history() -> StrataResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path()).await?;
    let node = NodeId::text("truck-9");
    assert!(!store.exists(&node).await?);

    store
        .insert_object(
            &node,
            &Value::object([("speed", Value::from(80.0)), ("driver", Value::from("kim"))]),
            Timestamp(100),
        )
        .await?;
    store
        .insert_object(&node, &Value::object([("speed", Value::from(90.0))]), Timestamp(200))
        .await?;
    assert!(store.exists(&node).await?);

    let err = store.remove(&node, false).await.expect_err("unconfirmed");
    assert!(matches!(err, StrataError::ConfirmationRequired { .. }));
    assert!(store.exists(&node).await?);

    let removed = store.remove(&node, true).await?;
    assert_eq!(removed, 3);
    assert!(!store.exists(&node).await?);
    assert!(store.synthesize_object(&node).await?.is_empty());
    assert_eq!(store.remove(&node, true).await?, 0);
    Ok(())
}

#[tokio::test]
async fn remove_leaves_other_nodes_alone() -> StrataResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path()).await?;
    let keep = NodeId::text("keep");
    let drop = NodeId::text("drop");
    for node in [&keep, &drop] {
        store
            .insert_object(node, &Value::object([("on", Value::from(true))]), Timestamp(1))
            .await?;
    }
    store.remove(&drop, true).await?;
    assert!(store.exists(&keep).await?);
    assert!(!store.exists(&drop).await?);
    Ok(())
}

#[tokio::test]
async fn rejected_writes_store_nothing() -> StrataResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path()).await?;
    let node = NodeId::text("log-1");

    let long = "x".repeat(256);
    let err = store
        .insert_object(
            &node,
            &Value::object([("ok", Value::from("short")), ("msg", Value::from(long.as_str()))]),
            Timestamp(1),
        )
        .await
        .expect_err("too long");
    assert!(matches!(err, StrataError::ValueTooLarge { .. }));

    let big_array = Value::List(vec![json!("y".repeat(70_000))]);
    let err = store
        .insert_object(&node, &Value::object([("blob", big_array)]), Timestamp(1))
        .await
        .expect_err("array too large");
    assert!(matches!(err, StrataError::ValueTooLarge { .. }));

    let err = store
        .insert_object(&node, &Value::object([("bad", Value::from(f64::NAN))]), Timestamp(1))
        .await
        .expect_err("nan");
    assert!(matches!(err, StrataError::UnsupportedType { .. }));

    let err = store
        .insert_object(&node, &Value::object([("a", Value::from(1.0))]), Timestamp(-1))
        .await
        .expect_err("negative timestamp");
    assert!(matches!(err, StrataError::InvalidArgument { .. }));

    let err = store
        .insert_object(&node, &Value::from(3.0), Timestamp(1))
        .await
        .expect_err("primitive root");
    assert!(matches!(err, StrataError::InvalidArgument { .. }));

    let err = store
        .insert_object(&NodeId::from(7), &Value::object([("a", Value::from(1.0))]), Timestamp(1))
        .await
        .expect_err("node kind");
    assert!(matches!(err, StrataError::InvalidArgument { .. }));

    let err = store
        .insert_field(&node, &FieldPath::root(), &Value::from(1.0), Timestamp(1))
        .await
        .expect_err("root field");
    assert!(matches!(err, StrataError::InvalidArgument { .. }));

    assert!(!store.exists(&node).await?);
    Ok(())
}

#[tokio::test]
async fn max_length_string_is_accepted() -> StrataResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path()).await?;
    let node = NodeId::text("log-2");
    let exact = "é".repeat(255);
    store
        .insert_object(&node, &Value::object([("msg", Value::from(exact.as_str()))]), Timestamp(1))
        .await?;
    let snapshot = store.synthesize_object(&node).await?;
    assert_eq!(snapshot.leaf(".msg").map(|leaf| leaf.value.clone()), Some(Value::from(exact)));
    Ok(())
}

#[tokio::test]
async fn integer_node_ids_round_trip() -> StrataResult<()> {
    let dir = tempdir().expect("tempdir");
    let base = dir.path();
    let mut config = StrataConfig::default_sqlite(base.join("strata.sqlite").to_string_lossy());
    if let Some(store) = config.store.as_mut() {
        store.prefix = Some("devices".to_string());
        store.node_kind = Some(NodeKind::Integer);
    }
    let store = ObjectStore::connect(&config, base).await?;
    assert_eq!(store.node_kind(), NodeKind::Integer);

    let node = NodeId::parse(NodeKind::Integer, "4021")?;
    store
        .insert_object(&node, &Value::object([("online", Value::from(true))]), Timestamp(3))
        .await?;
    let hits = store
        .search(&FieldPath::parse(".online")?, &Value::from(true), Timestamp(3), 5)
        .await?;
    assert_eq!(
        hits,
        vec![SearchHit {
            node: NodeId::Integer(4021),
            value: Value::from(true),
            timestamp: Timestamp(3),
        }]
    );

    let err = store
        .exists(&NodeId::text("4021"))
        .await
        .expect_err("text id on integer store");
    assert!(matches!(err, StrataError::InvalidArgument { .. }));
    Ok(())
}
