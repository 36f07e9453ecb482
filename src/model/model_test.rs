use super::*;

fn status_with(
    ready_for_writes: bool,
    all_replicas_ready: bool,
) -> StatusDocument {
    StatusDocument {
        db: "test".into(),
        name: "test".into(),
        id: "t1".into(),
        status: TableReadiness {
            ready_for_outdated_reads: ready_for_writes,
            ready_for_reads: ready_for_writes,
            ready_for_writes,
            all_replicas_ready,
        },
        shards: vec![
            ShardStatus {
                primary_replicas: vec!["a".into()],
                replicas: vec![
                    ReplicaStatus {
                        server: "a".into(),
                        state: ReplicaState::Ready,
                    },
                    ReplicaStatus {
                        server: "b".into(),
                        state: ReplicaState::Backfilling,
                    },
                ],
            },
            ShardStatus {
                primary_replicas: vec!["a".into()],
                replicas: vec![ReplicaStatus {
                    server: "a".into(),
                    state: ReplicaState::Ready,
                }],
            },
        ],
    }
}

#[test]
fn ready_for_writes_reads_only_its_flag() {
    let status = status_with(true, false);
    assert!(ReadinessCondition::ReadyForWrites.is_satisfied_by(&status));
    assert!(!ReadinessCondition::AllReplicasReady.is_satisfied_by(&status));
}

#[test]
fn all_replicas_ready_reads_only_its_flag() {
    let status = status_with(false, true);
    assert!(!ReadinessCondition::ReadyForWrites.is_satisfied_by(&status));
    assert!(ReadinessCondition::AllReplicasReady.is_satisfied_by(&status));
}

#[test]
fn lagging_replicas_reports_shard_index() {
    let status = status_with(true, false);
    let lagging = status.lagging_replicas();

    assert_eq!(lagging.len(), 1);
    assert_eq!(lagging[0].0, 0);
    assert_eq!(lagging[0].1.server, ServerName::from("b"));
    assert_eq!(lagging[0].1.state, ReplicaState::Backfilling);
}

#[test]
fn status_document_serializes_with_wire_field_names() {
    let json = status_with(true, false).to_pretty_json();

    assert!(json.contains("\"ready_for_writes\": true"));
    assert!(json.contains("\"all_replicas_ready\": false"));
    assert!(json.contains("\"backfilling\""));
    assert!(json.contains("\"primary_replicas\""));
}

#[test]
fn condition_display_matches_wire_name() {
    assert_eq!(ReadinessCondition::ReadyForWrites.to_string(), "ready_for_writes");
    assert_eq!(ReadinessCondition::AllReplicasReady.to_string(), "all_replicas_ready");

    let parsed: ReadinessCondition = serde_json::from_str("\"all_replicas_ready\"").unwrap();
    assert_eq!(parsed, ReadinessCondition::AllReplicasReady);
}

#[test]
fn uniform_config_repeats_the_same_descriptor() {
    let table = TableRef::new("test", "test");
    let a = ServerName::from("a");
    let b = ServerName::from("b");

    let config = TableConfig::uniform(&table, 16, &a, &[a.clone(), b.clone()]);

    assert_eq!(config.shards.len(), 16);
    assert!(config.shards.iter().all(|s| s.primary_replica == a && s.replicas == vec![a.clone(), b.clone()]));
    assert_eq!(config.table_ref(), table);
    assert_eq!(config.servers().into_iter().collect::<Vec<_>>(), vec![a, b]);
}

#[test]
fn table_ref_and_endpoint_display() {
    assert_eq!(TableRef::new("test", "users").to_string(), "test.users");
    let endpoint = Endpoint {
        host: "127.0.0.1".into(),
        port: 28015,
    };
    assert_eq!(endpoint.to_string(), "127.0.0.1:28015");
}

#[test]
fn insert_result_omits_missing_first_error() {
    let json = serde_json::to_string(&InsertResult {
        inserted: 3,
        errors: 0,
        first_error: None,
    })
    .unwrap();
    assert_eq!(json, r#"{"inserted":3,"errors":0}"#);
}
