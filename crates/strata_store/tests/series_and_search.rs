use serde_json::json;
use strata_store::{
    FieldPath, NodeId, ObjectStore, ObjectWriteApi, SeriesApi, StrataConfig, StrataError,
    StrataResult, Timestamp, Value,
};
use tempfile::tempdir;

async fn open(base: &std::path::Path) -> StrataResult<ObjectStore> {
    let config = StrataConfig::default_sqlite(base.join("strata.sqlite").to_string_lossy());
    ObjectStore::connect(&config, base).await
}

#[tokio::test]
async fn series_is_newest_first_and_bounded() -> StrataResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path()).await?;
    let node = NodeId::text("thermo");
    let field = FieldPath::parse(".temp")?;
    for (ts, reading) in [(10, 1.0), (20, 2.0), (30, 3.0), (40, 4.0), (50, 5.0)] {
        store
            .insert_object(
                &node,
                &Value::object([("temp", Value::from(reading))]),
                Timestamp(ts),
            )
            .await?;
    }

    let series = store.get_series(&node, &field, Timestamp(35), 2).await?;
    let points: Vec<(Value, i64)> = series
        .into_iter()
        .map(|point| (point.value, point.timestamp.as_millis()))
        .collect();
    assert_eq!(points, vec![(Value::from(3.0), 30), (Value::from(2.0), 20)]);

    let everything = store.get_series(&node, &field, Timestamp(1_000), 100).await?;
    assert_eq!(everything.len(), 5);
    assert_eq!(everything[0].timestamp, Timestamp(50));

    let too_early = store.get_series(&node, &field, Timestamp(5), 10).await?;
    assert!(too_early.is_empty());
    Ok(())
}

#[tokio::test]
async fn series_reads_array_partition() -> StrataResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path()).await?;
    let node = NodeId::text("router");
    let field = FieldPath::parse(".routes")?;
    store
        .insert_field(&node, &field, &Value::List(vec![json!("a")]), Timestamp(1))
        .await?;
    store
        .insert_field(&node, &field, &Value::List(vec![json!("a"), json!("b")]), Timestamp(2))
        .await?;
    let series = store.get_series(&node, &field, Timestamp(10), 10).await?;
    assert_eq!(series.len(), 2);
    assert_eq!(series[0].value, Value::List(vec![json!("a"), json!("b")]));
    Ok(())
}

#[tokio::test]
async fn series_missing_field_is_empty() -> StrataResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path()).await?;
    let series = store
        .get_series(
            &NodeId::text("nobody"),
            &FieldPath::parse(".nothing")?,
            Timestamp(10),
            10,
        )
        .await?;
    assert!(series.is_empty());
    Ok(())
}

#[tokio::test]
async fn read_limits_outside_range_are_rejected() -> StrataResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path()).await?;
    let node = NodeId::text("thermo");
    let field = FieldPath::parse(".temp")?;
    for limit in [0, 10_001] {
        let err = store
            .get_series(&node, &field, Timestamp(10), limit)
            .await
            .expect_err("series limit");
        assert!(matches!(err, StrataError::InvalidArgument { .. }), "{limit}");
        let err = store
            .search(&field, &Value::from(1.0), Timestamp(10), limit)
            .await
            .expect_err("search limit");
        assert!(matches!(err, StrataError::InvalidArgument { .. }), "{limit}");
    }
    let err = store
        .get_series(&node, &FieldPath::root(), Timestamp(10), 1)
        .await
        .expect_err("root path");
    assert!(matches!(err, StrataError::InvalidArgument { .. }));
    Ok(())
}

#[tokio::test]
async fn search_matches_exact_value_up_to_instant() -> StrataResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path()).await?;
    let field = FieldPath::parse(".status")?;
    for (node, status, ts) in [("n1", "on", 10), ("n2", "off", 20), ("n3", "on", 30)] {
        store
            .insert_object(
                &NodeId::text(node),
                &Value::object([("status", Value::from(status))]),
                Timestamp(ts),
            )
            .await?;
    }

    let hits = store
        .search(&field, &Value::from("on"), Timestamp(25), 10)
        .await?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].node, NodeId::text("n1"));
    assert_eq!(hits[0].timestamp, Timestamp(10));

    let hits = store
        .search(&field, &Value::from("on"), Timestamp(40), 10)
        .await?;
    let nodes: Vec<NodeId> = hits.into_iter().map(|hit| hit.node).collect();
    assert_eq!(nodes, vec![NodeId::text("n3"), NodeId::text("n1")]);

    let hits = store
        .search(&field, &Value::from("on"), Timestamp(40), 1)
        .await?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].node, NodeId::text("n3"));
    Ok(())
}

#[tokio::test]
async fn search_routes_by_value_kind() -> StrataResult<()> {
    let dir = tempdir().expect("tempdir");
    let store = open(dir.path()).await?;
    let field = FieldPath::parse(".level")?;
    store
        .insert_field(&NodeId::text("tank"), &field, &Value::from(7.0), Timestamp(5))
        .await?;
    store
        .insert_field(&NodeId::text("silo"), &field, &Value::from("7"), Timestamp(6))
        .await?;

    let numeric = store
        .search(&field, &Value::from(7.0), Timestamp(10), 10)
        .await?;
    assert_eq!(numeric.len(), 1);
    assert_eq!(numeric[0].node, NodeId::text("tank"));
    assert_eq!(numeric[0].value, Value::from(7.0));

    let err = store
        .search(&field, &Value::object([("x", Value::from(1.0))]), Timestamp(10), 10)
        .await
        .expect_err("object search");
    assert!(matches!(err, StrataError::UnsupportedType { .. }));
    Ok(())
}
