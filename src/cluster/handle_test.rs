use std::path::PathBuf;
use std::sync::atomic::AtomicU16;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::DataDir;
use crate::Endpoint;
use crate::InfrastructureError;
use crate::ServeOptions;
use crate::ServerHandle;
use crate::ServerName;
use crate::ServerState;

fn serve_options() -> ServeOptions {
    ServeOptions {
        command_prefix: vec![],
        extra_options: vec![],
        wait_until_ready: true,
        startup_timeout: Duration::from_secs(1),
    }
}

/// Supervisor mock that hands out data dirs and ready instances.
fn mock_supervisor() -> MockSupervisor {
    let mut supervisor = MockSupervisor::new();
    supervisor.expect_create_data_dir().returning(|name| {
        Ok(DataDir {
            server: name.clone(),
            path: PathBuf::from(format!("/tmp/{name}_data")),
        })
    });
    let next_port = Arc::new(AtomicU16::new(28015));
    supervisor.expect_start_server().returning(move |dir, _| {
        let port = next_port.fetch_add(1, Ordering::SeqCst);
        Ok(ServerHandle {
            id: format!("{}-{port}", dir.server),
            name: dir.server.clone(),
            data_dir: dir.clone(),
            endpoint: Endpoint {
                host: "127.0.0.1".into(),
                port,
            },
            state: ServerState::Ready,
        })
    });
    supervisor
}

#[tokio::test]
async fn start_requires_an_allocated_data_dir() {
    let mut supervisor = mock_supervisor();
    supervisor.expect_release().times(1).returning(|| Ok(()));
    let mut cluster = ClusterHandle::new(Arc::new(supervisor), Duration::from_secs(1));

    let result = cluster.start(&ServerName::from("a"), &serve_options()).await;

    assert!(matches!(
        result,
        Err(crate::Error::Infrastructure(InfrastructureError::ServerStart { .. }))
    ));
    cluster.teardown().await.unwrap();
}

#[tokio::test]
async fn restart_binds_a_new_instance_to_the_same_data_dir() {
    let mut supervisor = mock_supervisor();
    supervisor.expect_stop_server().times(2).returning(|s, _| {
        s.state = ServerState::Stopped;
        Ok(())
    });
    supervisor.expect_release().times(1).returning(|| Ok(()));
    let mut cluster = ClusterHandle::new(Arc::new(supervisor), Duration::from_secs(1));
    let a = ServerName::from("a");

    cluster.add_data_dir(&a).await.unwrap();
    let first = cluster.start(&a, &serve_options()).await.unwrap().clone();
    assert!(cluster.start(&a, &serve_options()).await.is_err());

    cluster.stop(&a).await.unwrap();
    assert!(cluster.server(&a).is_none());

    let second = cluster.start(&a, &serve_options()).await.unwrap().clone();
    assert_ne!(first.id, second.id);
    assert_eq!(first.data_dir, second.data_dir);
    assert_eq!(cluster.instances().len(), 2);
    assert_eq!(cluster.running().count(), 1);

    cluster.teardown().await.unwrap();
}

#[tokio::test]
async fn stop_of_unknown_server_is_an_error() {
    let mut supervisor = mock_supervisor();
    supervisor.expect_release().returning(|| Ok(()));
    let mut cluster = ClusterHandle::new(Arc::new(supervisor), Duration::from_secs(1));

    let result = cluster.stop(&ServerName::from("z")).await;

    assert!(matches!(
        result,
        Err(crate::Error::Infrastructure(InfrastructureError::ServerNotRunning(_)))
    ));
    cluster.teardown().await.unwrap();
}

#[tokio::test]
async fn teardown_runs_exactly_once() {
    let mut supervisor = mock_supervisor();
    supervisor.expect_stop_server().times(2).returning(|s, _| {
        s.state = ServerState::Stopped;
        Ok(())
    });
    supervisor.expect_release().times(1).returning(|| Ok(()));
    supervisor.expect_force_stop().never();
    let mut cluster = ClusterHandle::new(Arc::new(supervisor), Duration::from_secs(1));

    for name in ["a", "b"] {
        let name = ServerName::from(name);
        cluster.add_data_dir(&name).await.unwrap();
        cluster.start(&name, &serve_options()).await.unwrap();
    }

    cluster.teardown().await.unwrap();
    cluster.teardown().await.unwrap();

    assert!(cluster.is_torn_down());
    assert_eq!(cluster.running().count(), 0);
}

#[tokio::test]
async fn teardown_keeps_going_after_a_failed_stop() {
    let mut supervisor = mock_supervisor();
    supervisor.expect_stop_server().times(2).returning(|s, _| {
        if s.name.as_str() == "a" {
            return Err(InfrastructureError::ServerStop {
                server: s.name.clone(),
                reason: "timed out".into(),
            }
            .into());
        }
        s.state = ServerState::Stopped;
        Ok(())
    });
    supervisor
        .expect_force_stop()
        .withf(|s| s.name.as_str() == "a")
        .times(1)
        .return_const(());
    supervisor.expect_release().times(1).returning(|| Ok(()));
    let mut cluster = ClusterHandle::new(Arc::new(supervisor), Duration::from_secs(1));

    for name in ["a", "b"] {
        let name = ServerName::from(name);
        cluster.add_data_dir(&name).await.unwrap();
        cluster.start(&name, &serve_options()).await.unwrap();
    }

    let result = cluster.teardown().await;

    assert!(matches!(
        result,
        Err(crate::Error::Infrastructure(InfrastructureError::ServerStop { .. }))
    ));
    assert_eq!(cluster.running().count(), 0);
}

#[tokio::test]
async fn drop_without_teardown_force_stops_running_servers() {
    let mut supervisor = mock_supervisor();
    supervisor.expect_force_stop().times(1).return_const(());
    let mut cluster = ClusterHandle::new(Arc::new(supervisor), Duration::from_secs(1));
    let a = ServerName::from("a");

    cluster.add_data_dir(&a).await.unwrap();
    cluster.start(&a, &serve_options()).await.unwrap();

    drop(cluster);
}

#[tokio::test]
async fn data_dir_is_allocated_once_per_server() {
    let mut supervisor = mock_supervisor();
    supervisor.expect_release().returning(|| Ok(()));
    let mut cluster = ClusterHandle::new(Arc::new(supervisor), Duration::from_secs(1));
    let a = ServerName::from("a");

    cluster.add_data_dir(&a).await.unwrap();

    assert!(cluster.add_data_dir(&a).await.is_err());
    cluster.teardown().await.unwrap();
}
