use serde_json::json;
use std::sync::Arc;
use vault_sync_core::{
    AuthMethod, Credential, Endpoint, FailureKind, MemoryConnector, MemoryStore,
    MigrationOptions, Mount, PathSet, SecretRecord, Session, Shutdown, SyncConfig, SyncError,
    migrate, run,
};

const SRC: &str = "https://vault-a.internal:8200";
const DST: &str = "https://vault-b.internal:8200";

fn record(value: serde_json::Value) -> SecretRecord {
    value.as_object().cloned().expect("object")
}

fn endpoint(address: &str) -> Endpoint {
    Endpoint::new(address, Credential::new("ghp_example"), AuthMethod::github())
}

fn config() -> SyncConfig {
    SyncConfig::new(endpoint(SRC), endpoint(DST))
}

fn seeded_source() -> Arc<MemoryStore> {
    let store = MemoryStore::new().with_versioned_mount("kv-v2");
    store.insert("secret/a", record(json!({"user": "app", "password": "p1"})));
    store.insert("secret/b/c", record(json!({"token": "t2"})));
    store.insert(
        "kv-v2/data/x",
        record(json!({"data": {"api_key": "k3"}, "metadata": {"version": 4}})),
    );
    Arc::new(store)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn migrates_flat_and_versioned_mounts() {
    let source = seeded_source();
    let destination = Arc::new(MemoryStore::new().with_versioned_mount("kv-v2"));
    let connector = MemoryConnector::new()
        .register(SRC, source.clone())
        .register(DST, destination.clone());

    let report = run(&config(), &connector, &Shutdown::new()).await.unwrap();

    assert_eq!(report.succeeded(), 3);
    assert_eq!(report.failed(), 0);
    assert!(report.is_clean());
    assert_eq!(
        destination.paths(),
        vec!["kv-v2/data/x", "secret/a", "secret/b/c"]
    );
    for path in destination.paths() {
        assert_eq!(destination.get(&path), source.get(&path), "payload of {path}");
    }
    let labels: Vec<_> = report.mounts.iter().map(|m| m.mount.as_str()).collect();
    assert_eq!(labels, vec!["kv-v2/", "secret/"]);
}

#[tokio::test]
async fn writes_once_per_path_with_the_read_record() {
    let source = seeded_source();
    let destination = Arc::new(MemoryStore::new().with_versioned_mount("kv-v2"));
    let connector = MemoryConnector::new()
        .register(SRC, source.clone())
        .register(DST, destination.clone());

    run(&config(), &connector, &Shutdown::new()).await.unwrap();

    let mut writes = destination.writes();
    writes.sort_by(|a, b| a.0.cmp(&b.0));
    let written: Vec<_> = writes.iter().map(|(path, _)| path.as_str()).collect();
    assert_eq!(written, vec!["kv-v2/data/x", "secret/a", "secret/b/c"]);
    for (path, record) in &writes {
        assert_eq!(Some(record.clone()), source.get(path));
    }

    let mut reads = source.reads();
    reads.sort();
    assert_eq!(reads, written);
}

#[tokio::test]
async fn failures_are_classified_and_do_not_block_others() {
    let source = seeded_source();
    source.insert("secret/d", record(json!({"k": "v"})));
    source.fail_read("secret/a");
    let destination = Arc::new(MemoryStore::new().with_versioned_mount("kv-v2"));
    destination.fail_write("kv-v2/data/x");
    let connector = MemoryConnector::new()
        .register(SRC, source.clone())
        .register(DST, destination.clone());

    let report = run(&config(), &connector, &Shutdown::new()).await.unwrap();

    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 2);
    let mut failures: Vec<_> = report
        .failures()
        .map(|(_, failure)| (failure.path.clone(), failure.kind))
        .collect();
    failures.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        failures,
        vec![
            ("kv-v2/data/x".to_string(), FailureKind::Write),
            ("secret/a".to_string(), FailureKind::Read),
        ]
    );
    assert!(destination.writes().iter().all(|(path, _)| path != "secret/a"));
    assert_eq!(destination.paths(), vec!["secret/b/c", "secret/d"]);
}

#[tokio::test]
async fn destination_login_failure_aborts_before_any_read() {
    let source = seeded_source();
    let connector = MemoryConnector::new()
        .register(SRC, source.clone())
        .reject(DST, "permission denied");

    let err = run(&config(), &connector, &Shutdown::new()).await.unwrap_err();

    assert!(matches!(err, SyncError::Auth { ref address, .. } if address == DST));
    assert!(source.reads().is_empty());
    assert_eq!(connector.logins(), vec![SRC]);
}

#[tokio::test]
async fn custom_mounts_replace_defaults() {
    let source = Arc::new(MemoryStore::new().with_versioned_mount("apps"));
    source.insert("apps/data/web/env", record(json!({"PORT": "80"})));
    source.insert("secret/ignored", record(json!({"k": "v"})));
    let destination = Arc::new(MemoryStore::new().with_versioned_mount("apps"));
    let connector = MemoryConnector::new()
        .register(SRC, source)
        .register(DST, destination.clone());

    let config = config().with_mounts(vec![Mount::versioned("apps").unwrap()]);
    let report = run(&config, &connector, &Shutdown::new()).await.unwrap();

    assert_eq!(report.succeeded(), 1);
    assert_eq!(destination.paths(), vec!["apps/data/web/env"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_passes_sum_independent_counts() {
    let source = Arc::new(MemoryStore::new());
    let mut first = PathSet::new();
    let mut second = PathSet::new();
    for i in 0..30 {
        let a = format!("team-a/{i}");
        let b = format!("team-b/{i}");
        source.insert(&a, record(json!({"i": i})));
        source.insert(&b, record(json!({"i": i})));
        first.push(a);
        second.push(b);
    }
    source.fail_read("team-a/3");
    source.fail_read("team-b/7");
    source.fail_read("team-b/8");
    let destination = Arc::new(MemoryStore::new());
    let src = Session::new(SRC, source);
    let dst = Session::new(DST, destination.clone());
    let shutdown = Shutdown::new();
    let options = MigrationOptions {
        concurrency: 4,
        dry_run: false,
    };

    let (left, right) = tokio::join!(
        migrate(&src, &dst, "team-a/", first, options, &shutdown),
        migrate(&src, &dst, "team-b/", second, options, &shutdown),
    );

    assert_eq!((left.succeeded, left.failures.len()), (29, 1));
    assert_eq!((right.succeeded, right.failures.len()), (28, 2));
    assert_eq!(left.attempted() + right.attempted(), 60);
    assert_eq!(destination.paths().len(), 57);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn key_that_is_also_a_directory_is_copied_once() {
    let source = Arc::new(MemoryStore::new().with_versioned_mount("kv-v2"));
    for path in [
        "secret/b",
        "secret/b/c",
        "secret/b/c/d",
        "kv-v2/data/app",
        "kv-v2/data/app/db",
    ] {
        source.insert(path, record(json!({ "at": path })));
    }
    let destination = Arc::new(MemoryStore::new().with_versioned_mount("kv-v2"));
    let connector = MemoryConnector::new()
        .register(SRC, source.clone())
        .register(DST, destination.clone());

    let report = run(&config(), &connector, &Shutdown::new()).await.unwrap();

    let expected = vec![
        "kv-v2/data/app",
        "kv-v2/data/app/db",
        "secret/b",
        "secret/b/c",
        "secret/b/c/d",
    ];
    assert_eq!(report.succeeded(), 5);
    assert_eq!(report.failed(), 0);

    let mut reads = source.reads();
    reads.sort();
    assert_eq!(reads, expected);

    let mut written: Vec<_> = destination.writes().into_iter().map(|(path, _)| path).collect();
    written.sort();
    assert_eq!(written, expected);

    assert_eq!(destination.paths(), expected);
    for path in expected {
        assert_eq!(destination.get(path), source.get(path), "payload of {path}");
    }
}
