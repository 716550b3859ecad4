// Cluster lifecycle integration tests.
//
// State transitions run against an in-memory launcher; the client tests also
// stand up an in-process controller whose descriptor the launcher publishes
// into the cluster's security directory when it starts.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::MockLauncher;
use ctrlink::{
	AsyncCluster, Cluster, ClusterOptions, ClusterState, ConnectorConfig, ControllerRole, Error, Launcher,
	RetryPolicy, TaskClient,
};
use ctrlink_runtime::testing::TestController;
use tempfile::TempDir;

fn options(root: &TempDir, profile: &str) -> ClusterOptions {
	let config = ConnectorConfig {
		registry_root: root.path().to_path_buf(),
		..ConnectorConfig::default()
	};
	ClusterOptions::with_config(config).profile(profile).auto_create(true)
}

fn cluster_with(launcher: &Arc<MockLauncher>, root: &TempDir) -> AsyncCluster {
	let launcher = Arc::clone(launcher);
	AsyncCluster::new(options(root, "lifecycle"))
		.unwrap()
		.with_launcher_factory(move |_| Ok(Arc::clone(&launcher) as Arc<dyn Launcher>))
}

#[tokio::test]
async fn test_start_then_stop_ends_in_after() {
	let root = TempDir::new().unwrap();
	let launcher = MockLauncher::new();
	let mut cluster = cluster_with(&launcher, &root);
	assert_eq!(cluster.state(), ClusterState::Before);

	cluster.start(4).await.unwrap();
	assert!(cluster.is_running());
	assert_eq!(launcher.last_workers.load(std::sync::atomic::Ordering::SeqCst), 4);

	cluster.stop().await.unwrap();
	assert_eq!(cluster.state(), ClusterState::After);
	assert!(!launcher.is_running());
	assert_eq!(launcher.stops(), 1);
}

#[tokio::test]
async fn test_stop_before_start_is_state_error() {
	let root = TempDir::new().unwrap();
	let launcher = MockLauncher::new();
	let mut cluster = cluster_with(&launcher, &root);

	let err = cluster.stop().await.unwrap_err();
	assert!(err.is_cluster_state(), "{err:?}");
	assert_eq!(launcher.stops(), 0);
}

#[tokio::test]
async fn test_start_while_running_is_state_error() {
	let root = TempDir::new().unwrap();
	let launcher = MockLauncher::new();
	let mut cluster = cluster_with(&launcher, &root);

	cluster.start(2).await.unwrap();
	let err = cluster.start(2).await.unwrap_err();
	assert!(matches!(err, Error::ClusterState(_)), "{err:?}");
	assert_eq!(launcher.starts(), 1);

	cluster.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_after_stop_is_state_error() {
	let root = TempDir::new().unwrap();
	let launcher = MockLauncher::new();
	let mut cluster = cluster_with(&launcher, &root);

	cluster.start(2).await.unwrap();
	cluster.stop().await.unwrap();
	let err = cluster.stop().await.unwrap_err();
	assert!(err.is_cluster_state());
}

#[tokio::test]
async fn test_restart_from_after() {
	let root = TempDir::new().unwrap();
	let launcher = MockLauncher::new();
	let mut cluster = cluster_with(&launcher, &root);

	cluster.start(2).await.unwrap();
	cluster.stop().await.unwrap();
	cluster.start(3).await.unwrap();
	assert!(cluster.is_running());
	assert_eq!(launcher.starts(), 2);
	cluster.close().await.unwrap();
	assert_eq!(cluster.state(), ClusterState::After);
}

#[tokio::test]
async fn test_failed_start_keeps_state() {
	let root = TempDir::new().unwrap();
	let launcher = MockLauncher::new();
	launcher.fail_next_start();
	let mut cluster = cluster_with(&launcher, &root);

	let err = cluster.start(2).await.unwrap_err();
	assert!(matches!(err, Error::LaunchFailed(_)), "{err:?}");
	assert_eq!(cluster.state(), ClusterState::Before);
}

#[tokio::test]
async fn test_profile_directory_is_created_with_subdirectories() {
	let root = TempDir::new().unwrap();
	let cluster = AsyncCluster::new(options(&root, "fresh")).unwrap();

	assert_eq!(cluster.location(), root.path().join("cluster_fresh"));
	assert!(cluster.directory().security_dir().is_dir());
	assert!(cluster.directory().log_dir().is_dir());
}

#[test]
fn test_missing_profile_without_auto_create_fails() {
	let root = TempDir::new().unwrap();
	let profile = format!("absent-{}", std::process::id());
	let err = AsyncCluster::new(options(&root, &profile).auto_create(false)).unwrap_err();
	assert!(matches!(err, Error::ClusterDir(_)), "{err:?}");
}

#[test]
fn test_explicit_directory_is_preferred() {
	let root = TempDir::new().unwrap();
	let explicit = TempDir::new().unwrap();
	let cluster = AsyncCluster::new(options(&root, "ignored").cluster_dir(explicit.path())).unwrap();
	assert_eq!(cluster.location(), explicit.path());
}

#[tokio::test]
async fn test_task_client_from_published_descriptor() {
	let controller = TestController::start(&[("tc", TaskClient::TYPE_NAME)]).await.unwrap();
	let root = TempDir::new().unwrap();
	let descriptor = controller.descriptor("tc");

	let cluster = AsyncCluster::new(options(&root, "published")).unwrap();
	let descriptor_path = cluster.directory().descriptor_path(ControllerRole::Task);
	let launcher = MockLauncher::with_hook(move |_| {
		std::fs::write(&descriptor_path, format!("{descriptor}\n")).unwrap();
	});
	let factory_launcher = Arc::clone(&launcher);
	let mut cluster =
		cluster.with_launcher_factory(move |_| Ok(Arc::clone(&factory_launcher) as Arc<dyn Launcher>));

	cluster.start(1).await.unwrap();
	let retry = RetryPolicy::new(Duration::from_millis(10), 5);
	let client = cluster.get_task_client(Some(retry)).await.unwrap();
	assert_eq!(client.type_name(), TaskClient::TYPE_NAME);

	let again = cluster.get_task_client(Some(retry)).await.unwrap();
	assert!(Arc::ptr_eq(client.capability(), again.capability()));
	assert_eq!(controller.accepted(), 1);

	cluster.stop().await.unwrap();
}

#[tokio::test]
async fn test_client_before_descriptor_is_published_fails_with_context() {
	let root = TempDir::new().unwrap();
	let cluster = AsyncCluster::new(options(&root, "unpublished")).unwrap();
	let expected_path = cluster.directory().descriptor_path(ControllerRole::MultiEngine);

	let err = cluster
		.get_multiengine_client(Some(RetryPolicy::new(Duration::from_millis(1), 3)))
		.await
		.unwrap_err();
	match err {
		Error::ClientConnector {
			source_label, attempts, ..
		} => {
			assert_eq!(source_label, expected_path.display().to_string());
			assert_eq!(attempts, 3);
		}
		other => panic!("unexpected error: {other:?}"),
	}
}

#[tokio::test]
async fn test_async_cluster_drop_stops_running_cluster() {
	let root = TempDir::new().unwrap();
	let launcher = MockLauncher::new();
	let mut cluster = cluster_with(&launcher, &root);

	cluster.start(2).await.unwrap();
	assert!(cluster.is_running());
	drop(cluster);

	// The stop is spawned onto the current runtime.
	tokio::time::sleep(Duration::from_millis(20)).await;
	assert_eq!(launcher.stops(), 1);
	assert!(!launcher.is_running());
}

#[tokio::test]
async fn test_async_cluster_drop_respects_auto_stop_flag() {
	let root = TempDir::new().unwrap();
	let launcher = MockLauncher::new();
	let mut cluster = cluster_with(&launcher, &root);

	cluster.start(2).await.unwrap();
	cluster.set_auto_stop(false);
	drop(cluster);

	tokio::time::sleep(Duration::from_millis(20)).await;
	assert_eq!(launcher.stops(), 0);
	assert!(launcher.is_running());
}

#[test]
fn test_blocking_cluster_drop_stops_running_cluster() {
	let root = TempDir::new().unwrap();
	let launcher = MockLauncher::new();
	let cluster = Cluster::from_async(cluster_with(&launcher, &root)).unwrap();

	cluster.start(2).unwrap();
	assert!(cluster.is_running().unwrap());
	drop(cluster);

	assert_eq!(launcher.stops(), 1);
	assert!(!launcher.is_running());
}

#[test]
fn test_blocking_cluster_drop_respects_auto_stop_flag() {
	let root = TempDir::new().unwrap();
	let launcher = MockLauncher::new();
	let cluster = Cluster::from_async(cluster_with(&launcher, &root)).unwrap();

	cluster.start(2).unwrap();
	cluster.set_auto_stop(false).unwrap();
	drop(cluster);

	assert_eq!(launcher.stops(), 0);
	assert!(launcher.is_running());
}

#[test]
fn test_blocking_cluster_state_errors() {
	let root = TempDir::new().unwrap();
	let launcher = MockLauncher::new();
	let cluster = Cluster::from_async(cluster_with(&launcher, &root)).unwrap();

	assert!(cluster.stop().unwrap_err().is_cluster_state());
	cluster.start(1).unwrap();
	assert!(cluster.start(1).unwrap_err().is_cluster_state());
	cluster.close().unwrap();
	assert_eq!(cluster.state().unwrap(), ClusterState::After);
}
