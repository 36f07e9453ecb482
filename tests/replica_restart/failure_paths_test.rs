use std::sync::Arc;
use std::time::Duration;

use replica_recovery::Error;
use replica_recovery::InfrastructureError;
use replica_recovery::Phase;
use replica_recovery::ReadinessCondition;
use replica_recovery::ScenarioOrchestrator;
use replica_recovery::SimFault;
use tokio::time;

use crate::common::config_with_faults;
use crate::common::enable_logger;
use crate::common::FailingRelease;
use crate::common::Harness;

#[tokio::test(start_paused = true)]
async fn short_insert_fails_the_load() {
    enable_logger();
    let config = config_with_faults(&[SimFault::ShortInsert]);
    let harness = Harness::new(&config);

    let failure = harness.run(config).await.unwrap_err();

    assert_eq!(failure.phase, Phase::Load);
    assert!(failure.error.is_assertion());
    assert!(failure.error.to_string().contains("acknowledged 999"));
    harness.assert_torn_down();
}

#[tokio::test(start_paused = true)]
async fn writes_blocked_during_backfill_fails_expansion() {
    enable_logger();
    let config = config_with_faults(&[SimFault::WritesBlockedDuringBackfill]);
    let harness = Harness::new(&config);

    let failure = harness.run(config).await.unwrap_err();

    assert_eq!(failure.phase, Phase::ExpandReplication);
    assert!(failure.error.is_assertion());
    let status = failure.last_status.unwrap();
    assert!(!status.ready_for_writes());
    assert!(!status.lagging_replicas().is_empty());
    harness.assert_torn_down();
}

#[tokio::test(start_paused = true)]
async fn server_never_ready_after_restart_times_out_with_status() {
    enable_logger();
    let config = config_with_faults(&[SimFault::NeverReadyAfterRestart]);
    let harness = Harness::new(&config);

    let failure = harness.run(config).await.unwrap_err();

    assert_eq!(failure.phase, Phase::PostRestartAvailability);
    match &failure.error {
        Error::ReadinessTimeout {
            condition, status, ..
        } => {
            assert_eq!(*condition, Some(ReadinessCondition::ReadyForWrites));
            assert!(!status.ready_for_writes());
            assert!(status.shards.iter().all(|s| s.primary_replicas.is_empty()));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(failure.last_status.is_some());
    harness.assert_torn_down();
}

#[tokio::test(start_paused = true)]
async fn backfill_lost_on_restart_fails_the_backfill_check() {
    enable_logger();
    let config = config_with_faults(&[SimFault::BackfillLostOnRestart]);
    let harness = Harness::new(&config);

    let failure = harness.run(config).await.unwrap_err();

    assert_eq!(failure.phase, Phase::BackfillNotFinished);
    assert!(failure.error.is_assertion());
    assert!(failure.last_status.unwrap().all_replicas_ready());
    harness.assert_torn_down();
}

#[tokio::test(start_paused = true)]
async fn unclean_shutdown_fails_the_restart() {
    enable_logger();
    let config = config_with_faults(&[SimFault::UncleanShutdown]);
    let harness = Harness::new(&config);

    let failure = harness.run(config).await.unwrap_err();

    assert_eq!(failure.phase, Phase::Restart);
    assert!(matches!(
        failure.error,
        Error::Infrastructure(InfrastructureError::UncleanExit { .. })
    ));
    // b was still running and reports the same unclean exit during teardown
    assert!(matches!(
        failure.teardown_error,
        Some(Error::Infrastructure(InfrastructureError::UncleanExit { .. }))
    ));
    harness.assert_torn_down();
}

#[tokio::test(start_paused = true)]
async fn slow_startup_fails_provisioning() {
    enable_logger();
    let mut config = config_with_faults(&[]);
    config.simulation.startup_delay_ms = 60_000;
    let harness = Harness::new(&config);

    let failure = harness.run(config).await.unwrap_err();

    assert_eq!(failure.phase, Phase::Provision);
    assert!(matches!(
        failure.error,
        Error::Infrastructure(InfrastructureError::ServerStart { .. })
    ));
    assert!(failure.last_status.is_none());
    harness.assert_torn_down();
}

#[tokio::test(start_paused = true)]
async fn teardown_failure_fails_a_passing_run() {
    enable_logger();
    let config = config_with_faults(&[]);
    let harness = Harness::new(&config);
    let supervisor = Arc::new(FailingRelease(harness.sim.clone()));

    let failure = ScenarioOrchestrator::new(config, supervisor, harness.sim.clone())
        .run()
        .await
        .unwrap_err();

    assert_eq!(failure.phase, Phase::Teardown);
    assert!(failure.teardown_error.is_none());
    assert!(!failure.last_status.unwrap().all_replicas_ready());
    harness.assert_torn_down();
}

#[tokio::test(start_paused = true)]
async fn shutdown_while_waiting_for_availability_still_tears_down() {
    enable_logger();
    let config = config_with_faults(&[SimFault::NeverReadyAfterRestart]);
    let harness = Harness::new(&config);
    let sim = harness.sim.clone();
    let shutdown = async move {
        while sim.start_count() < 4 {
            time::sleep(Duration::from_millis(50)).await;
        }
        time::sleep(Duration::from_secs(2)).await;
    };

    let failure = ScenarioOrchestrator::new(config, harness.sim.clone(), harness.sim.clone())
        .run_until(shutdown)
        .await
        .unwrap_err();

    assert_eq!(failure.phase, Phase::PostRestartAvailability);
    assert!(failure.error.is_interrupted());
    assert!(failure.teardown_error.is_none());
    assert!(failure.last_status.is_some());
    harness.assert_torn_down();
}
