use std::sync::Arc;
use std::time::Duration;

use replica_recovery::Phase;
use replica_recovery::ReplicaState;
use replica_recovery::ScenarioOrchestrator;

use crate::common::enable_logger;
use crate::common::literal_config;
use crate::common::Harness;
use crate::common::RecordingSupervisor;

#[tokio::test(start_paused = true)]
async fn restarted_cluster_is_writable_while_replica_still_backfills() {
    enable_logger();
    let config = literal_config();
    let harness = Harness::new(&config);

    let report = harness.run(config).await.unwrap();

    assert_eq!(report.rows_loaded, 100_000);
    assert!(report.expansion_status.ready_for_writes());
    assert!(!report.expansion_status.all_replicas_ready());
    assert_eq!(report.expansion_status.shards.len(), 16);
    assert!(report
        .expansion_status
        .shards
        .iter()
        .all(|s| s.replicas.iter().map(|r| r.server.as_str()).collect::<Vec<_>>() == vec!["a", "b"]));

    assert!(report.final_status.ready_for_writes());
    assert!(!report.final_status.all_replicas_ready());
    assert!(report
        .final_status
        .lagging_replicas()
        .iter()
        .all(|(_, r)| r.server.as_str() == "b" && r.state == ReplicaState::Backfilling));

    let availability = report.phase_elapsed(Phase::PostRestartAvailability).unwrap();
    assert!(availability < Duration::from_secs(10), "{availability:?}");
    assert_eq!(report.phases.last().map(|r| r.phase), Some(Phase::Teardown));

    assert_eq!(harness.sim.start_count(), 4);
    harness.assert_torn_down();
}

#[tokio::test(start_paused = true)]
async fn scenario_passes_with_a_single_shard_and_small_chunks() {
    enable_logger();
    let mut config = literal_config();
    config.workload.shard_count = 1;
    config.workload.total_rows = 2_345;
    config.workload.chunk_size = 100;
    let harness = Harness::new(&config);

    let report = harness.run(config).await.unwrap();

    assert_eq!(report.rows_loaded, 2_345);
    assert_eq!(report.final_status.shards.len(), 1);
    harness.assert_torn_down();
}

#[tokio::test(start_paused = true)]
async fn serve_options_reach_the_supervisor_untouched() {
    enable_logger();
    let mut config = literal_config();
    config.workload.total_rows = 5_000;
    config.cluster.command_prefix = vec!["valgrind".into(), "rethinkdb".into()];
    config.cluster.serve_options = vec!["--cache-size".into(), "1024".into()];
    let harness = Harness::new(&config);
    let recorder = Arc::new(RecordingSupervisor::new(harness.sim.clone()));

    ScenarioOrchestrator::new(config, recorder.clone(), harness.sim.clone())
        .run()
        .await
        .unwrap();

    let starts = recorder.starts();
    assert_eq!(starts.len(), 4);
    for options in &starts {
        assert_eq!(options.command_prefix, ["valgrind", "rethinkdb"]);
        assert_eq!(options.extra_options, ["--cache-size", "1024"]);
        assert!(options.wait_until_ready);
    }
    harness.assert_torn_down();
}
