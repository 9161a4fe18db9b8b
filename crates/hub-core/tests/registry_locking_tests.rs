//! Tests for registry and per-project locking

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use hub_core::{Direction, HubConfig, ProjectId, RegistryStore, SyncEngine, SyncOptions, TemplateStore};
use hub_fs::{LockOptions, NormalizedPath};
use hub_test_utils::TestHub;

fn shell_hub() -> TestHub {
    let mut hub = TestHub::new();
    hub.with_set("shell", &[(".bashrc", "export A=1\n"), (".vimrc", "set nu\n")]);
    hub
}

fn engine(hub: &TestHub, timeout: Duration) -> SyncEngine {
    let config = HubConfig::for_catalog(hub.catalog_path()).with_lock_timeout(timeout);
    SyncEngine::open(&config).unwrap()
}

fn store(hub: &TestHub, timeout: Duration) -> RegistryStore {
    RegistryStore::new(NormalizedPath::new(hub.registry_path())).with_lock_options(LockOptions {
        timeout,
        ..LockOptions::default()
    })
}

#[test]
fn concurrent_transactions_are_serialized() {
    let hub = Arc::new(shell_hub());
    let templates = Arc::new(TemplateStore::load(&NormalizedPath::new(hub.catalog_path())).unwrap());
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let hub = Arc::clone(&hub);
            let templates = Arc::clone(&templates);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let project = ProjectId::resolve(hub.project(&format!("p{i}"))).unwrap();
                let shell = templates.resolve("shell").unwrap();
                let store = store(&hub, Duration::from_secs(10));
                barrier.wait();
                store.transaction(|r| Ok(r.adopt(&project, shell)))
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap().unwrap());
    }

    // Every write landed; none was lost to a stale read
    let registry = store(&hub, Duration::from_secs(1)).load().unwrap();
    assert_eq!(registry.version(), 4);
    assert_eq!(registry.projects().count(), 4);
}

#[test]
fn held_registry_lock_times_out() {
    let hub = shell_hub();
    let holder = store(&hub, Duration::from_secs(1));
    let _held = holder.lock().unwrap();

    let start = Instant::now();
    let err = store(&hub, Duration::from_millis(300)).lock().unwrap_err();
    assert!(err.is_lock_timeout(), "got {err:?}");
    assert!(start.elapsed() >= Duration::from_millis(250));
    assert!(err.to_string().contains("pid"), "holder should be reported: {err}");
}

#[test]
fn second_sync_waits_for_first_then_succeeds() {
    let hub = shell_hub();
    let project_dir = hub.project("api");
    let project = ProjectId::resolve(&project_dir).unwrap();

    let held = store(&hub, Duration::from_secs(1)).lock_project(&project).unwrap();
    let releaser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(300));
        drop(held);
    });

    let start = Instant::now();
    let report = engine(&hub, Duration::from_secs(10))
        .sync(&project_dir, &["shell".to_string()], &SyncOptions::new(Direction::PullOnly))
        .unwrap();
    releaser.join().unwrap();

    assert!(start.elapsed() >= Duration::from_millis(250));
    assert_eq!(report.applied_count(), 2);
}

#[test]
fn sync_never_proceeds_without_the_project_lock() {
    let hub = shell_hub();
    let project_dir = hub.project("api");
    let project = ProjectId::resolve(&project_dir).unwrap();
    let _held = store(&hub, Duration::from_secs(1)).lock_project(&project).unwrap();

    let err = engine(&hub, Duration::from_millis(200))
        .sync(&project_dir, &["shell".to_string()], &SyncOptions::new(Direction::PullOnly))
        .unwrap_err();

    assert!(err.is_lock_timeout(), "got {err:?}");
    hub.assert_missing(&project_dir, ".bashrc");
    hub.assert_missing(&project_dir, ".vimrc");
    assert!(hub.registry_bytes().is_none());
}

#[test]
fn different_projects_sync_concurrently() {
    let hub = Arc::new(shell_hub());
    let dirs: Vec<_> = (0..3).map(|i| hub.project(&format!("p{i}"))).collect();
    let barrier = Arc::new(Barrier::new(dirs.len()));

    let handles: Vec<_> = dirs
        .iter()
        .cloned()
        .map(|dir| {
            let hub = Arc::clone(&hub);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let engine = engine(&hub, Duration::from_secs(10));
                barrier.wait();
                engine.sync(&dir, &["shell".to_string()], &SyncOptions::default())
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap().unwrap().is_success());
    }

    let registry = store(&hub, Duration::from_secs(1)).load().unwrap();
    assert_eq!(registry.version(), 3);
    assert_eq!(registry.projects_using("shell").count(), 3);
}
