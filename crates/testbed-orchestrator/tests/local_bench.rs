//! End-to-end runs of the benchmark state machine with fake collaborators.

use async_trait::async_trait;
use std::path::Path;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use testbed_config::{BenchParameters, NodeParameters};
use testbed_orchestrator::{
    session_name, BenchError, BenchmarkRunner, KeyKind, KeyProvisioner, LaunchCommand,
    LaunchError, LogAnalyzer, ParseError, RunFailure, RunReport, RunState, Supervisor,
    TestbedPaths, Toolchain,
};
use testbed_types::{NodeIdentity, PublicKey};

#[derive(Clone, Default)]
struct FakeKeys {
    generated: Arc<AtomicUsize>,
    fail_after: Option<usize>,
}

#[async_trait]
impl KeyProvisioner for FakeKeys {
    async fn generate(&self, kind: KeyKind, key_file: &Path) -> Result<NodeIdentity, LaunchError> {
        let n = self.generated.fetch_add(1, Ordering::SeqCst);
        if self.fail_after.is_some_and(|limit| n >= limit) {
            return Err(LaunchError::Output {
                command: format!("keygen {}", key_file.display()),
                reason: "simulated failure".to_string(),
            });
        }
        let name = key_file.file_name().unwrap().to_string_lossy();
        Ok(NodeIdentity::new(
            PublicKey::new(format!("{kind:?}-{name}")),
            key_file,
        ))
    }
}

#[derive(Clone, Default)]
struct FakeToolchain {
    builds: Arc<AtomicUsize>,
}

#[async_trait]
impl Toolchain for FakeToolchain {
    async fn build(&self, _failpoints: bool, release: bool) -> Result<(), LaunchError> {
        assert!(release);
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingSupervisor {
    launched: Vec<(String, LaunchCommand)>,
    live: usize,
    teardowns: usize,
    fail_on: Option<String>,
    /// Live session count each time exited sessions were polled.
    exit_polls: Vec<usize>,
    exited: Vec<(String, ExitStatus)>,
}

#[async_trait]
impl Supervisor for RecordingSupervisor {
    fn launch(&mut self, command: &LaunchCommand, log_file: &Path) -> Result<String, LaunchError> {
        let name = session_name(log_file);
        if self.fail_on.as_deref() == Some(name.as_str()) {
            return Err(LaunchError::Output {
                command: command.to_string(),
                reason: "simulated launch failure".to_string(),
            });
        }
        self.launched.push((name.clone(), command.clone()));
        self.live += 1;
        Ok(name)
    }

    async fn teardown_all(&mut self) {
        self.teardowns += 1;
        self.live = 0;
    }

    fn session_count(&self) -> usize {
        self.live
    }

    fn exited_sessions(&mut self) -> Vec<(String, ExitStatus)> {
        self.exit_polls.push(self.live);
        self.exited.clone()
    }
}

impl RecordingSupervisor {
    fn names(&self) -> Vec<&str> {
        self.launched.iter().map(|(n, _)| n.as_str()).collect()
    }

    fn command(&self, name: &str) -> String {
        self.launched
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c.to_string())
            .unwrap()
    }
}

struct FixedAnalyzer {
    calls: Arc<AtomicUsize>,
    fail: bool,
}

impl LogAnalyzer for FixedAnalyzer {
    fn process(&self, logs_dir: &Path, faults: usize) -> Result<RunReport, ParseError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(logs_dir.ends_with("logs"));
        if self.fail {
            return Err(ParseError::MissingLogs {
                role: "primary",
                path: logs_dir.to_path_buf(),
            });
        }
        Ok(RunReport {
            faults,
            ..Default::default()
        })
    }
}

struct Harness {
    runner: BenchmarkRunner<RecordingSupervisor>,
    keys: FakeKeys,
    toolchain: FakeToolchain,
    analyzer_calls: Arc<AtomicUsize>,
    _dir: tempfile::TempDir,
}

fn harness(bench: BenchParameters, keys: FakeKeys, supervisor: RecordingSupervisor, fail_parse: bool) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let toolchain = FakeToolchain::default();
    let analyzer_calls = Arc::new(AtomicUsize::new(0));
    let runner = BenchmarkRunner::new(bench, NodeParameters::default(), TestbedPaths::new(dir.path()))
        .unwrap()
        .with_key_provisioner(keys.clone())
        .with_toolchain(toolchain.clone())
        .with_analyzer(FixedAnalyzer {
            calls: analyzer_calls.clone(),
            fail: fail_parse,
        })
        .with_supervisor(supervisor);
    Harness {
        runner,
        keys,
        toolchain,
        analyzer_calls,
        _dir: dir,
    }
}

fn four_nodes_one_fault() -> BenchParameters {
    BenchParameters::new(4)
        .with_workers(1)
        .with_faults(1)
        .with_rate(1000)
        .with_duration(Duration::from_secs(5))
}

#[tokio::test(start_paused = true)]
async fn test_four_nodes_one_fault_completes() {
    let mut h = harness(four_nodes_one_fault(), FakeKeys::default(), RecordingSupervisor::default(), false);

    let started = tokio::time::Instant::now();
    let report = h.runner.run().await.unwrap();

    assert!(started.elapsed() >= Duration::from_secs(5));
    assert_eq!(report.faults, 1);
    assert_eq!(h.runner.state(), RunState::Complete);
    assert_eq!(
        h.runner.history(),
        &[
            RunState::Idle,
            RunState::Cleaning,
            RunState::Provisioning,
            RunState::Configuring,
            RunState::Launching,
            RunState::Running,
            RunState::Teardown,
            RunState::Parsing,
            RunState::Complete,
        ]
    );

    // Full membership is configured regardless of faults.
    let (committee, worker_cache) = h.runner.topology().unwrap();
    assert_eq!(committee.size(), 4);
    assert_eq!(worker_cache.size(), 4);
    // 4 primary keys, 4 primary network keys, 4 worker keys.
    assert_eq!(h.keys.generated.load(Ordering::SeqCst), 12);
    assert_eq!(h.toolchain.builds.load(Ordering::SeqCst), 1);

    // Clients, then primaries, then workers; index 3 never launched.
    let supervisor = h.runner.supervisor();
    assert_eq!(
        supervisor.names(),
        vec![
            "client-0-0",
            "client-1-0",
            "client-2-0",
            "primary-0",
            "primary-1",
            "primary-2",
            "worker-0-0",
            "worker-1-0",
            "worker-2-0",
        ]
    );
    for i in 0..3 {
        let client = supervisor.command(&format!("client-{i}-0"));
        assert!(client.contains("--rate 334"), "{client}");
        assert!(client.contains("--size 512"), "{client}");
    }
    // Clients know every active worker, and target their own.
    let client = supervisor.command("client-1-0");
    assert!(client.contains("narwhal-benchmark-client /ip4/127.0.0.1/tcp/3010/http"));
    assert!(client.ends_with(
        "--nodes /ip4/127.0.0.1/tcp/3008/http /ip4/127.0.0.1/tcp/3010/http /ip4/127.0.0.1/tcp/3012/http"
    ));

    // Exited sessions were checked once, while every session was still owned.
    assert_eq!(supervisor.exit_polls, vec![9]);
    // Cleaning and teardown both terminated sessions.
    assert_eq!(supervisor.teardowns, 2);
    assert_eq!(supervisor.session_count(), 0);
    assert_eq!(h.analyzer_calls.load(Ordering::SeqCst), 1);

    // Config artifacts were persisted for the node binaries.
    let paths = h.runner.paths();
    let committee: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(paths.committee_file()).unwrap()).unwrap();
    assert_eq!(committee["authorities"].as_object().unwrap().len(), 4);
    let workers: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(paths.workers_file()).unwrap()).unwrap();
    assert_eq!(workers["workers"].as_object().unwrap().len(), 4);
    assert!(paths.parameters_file().exists());
}

#[tokio::test(start_paused = true)]
async fn test_worker_commands_use_global_key_index() {
    let bench = BenchParameters::new(3)
        .with_workers(2)
        .with_rate(600)
        .with_duration(Duration::from_secs(1));
    let mut h = harness(bench, FakeKeys::default(), RecordingSupervisor::default(), false);

    h.runner.run().await.unwrap();

    let supervisor = h.runner.supervisor();
    assert_eq!(supervisor.names().len(), 6 + 3 + 6);
    let worker = supervisor.command("worker-2-1");
    assert!(worker.contains(".worker-5-key.json"), "{worker}");
    assert!(worker.contains(".db-2-1"), "{worker}");
    assert!(worker.contains(".primary-2-key.json"), "{worker}");
    assert!(worker.ends_with("worker --id 1"), "{worker}");

    let primary = supervisor.command("primary-2");
    assert!(primary.contains(".worker-0-key.json"), "{primary}");
    assert!(primary.contains(".db-2 "), "{primary}");
    assert!(primary.ends_with("primary"), "{primary}");

    assert!(supervisor.command("client-0-0").contains("--rate 100"));
}

#[tokio::test(start_paused = true)]
async fn test_keygen_failure_tears_down_and_fails() {
    let keys = FakeKeys {
        fail_after: Some(5),
        ..Default::default()
    };
    let mut h = harness(four_nodes_one_fault(), keys, RecordingSupervisor::default(), false);

    let err = h.runner.run().await.unwrap_err();

    assert!(matches!(err, BenchError::RunFailed(RunFailure::Launch(_))));
    assert_eq!(h.runner.state(), RunState::Failed);
    assert!(!h.runner.history().contains(&RunState::Configuring));
    assert!(h.runner.history().contains(&RunState::Teardown));
    assert!(h.runner.supervisor().names().is_empty());
    assert_eq!(h.runner.supervisor().teardowns, 2);
    assert_eq!(h.analyzer_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_launch_failure_tears_down_started_sessions() {
    let supervisor = RecordingSupervisor {
        fail_on: Some("primary-1".to_string()),
        ..Default::default()
    };
    let mut h = harness(four_nodes_one_fault(), FakeKeys::default(), supervisor, false);

    let started = tokio::time::Instant::now();
    let err = h.runner.run().await.unwrap_err();

    assert!(matches!(err, BenchError::RunFailed(RunFailure::Launch(_))));
    // The run never reached its timed phase.
    assert!(started.elapsed() < Duration::from_secs(5));
    let history = h.runner.history();
    assert!(!history.contains(&RunState::Running));
    assert_eq!(
        &history[history.len() - 2..],
        &[RunState::Teardown, RunState::Failed]
    );

    let supervisor = h.runner.supervisor();
    assert_eq!(supervisor.names(), vec!["client-0-0", "client-1-0", "client-2-0", "primary-0"]);
    assert_eq!(supervisor.exit_polls, vec![4]);
    assert_eq!(supervisor.session_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_parse_failure_fails_after_teardown() {
    let mut h = harness(four_nodes_one_fault(), FakeKeys::default(), RecordingSupervisor::default(), true);

    let err = h.runner.run().await.unwrap_err();

    assert!(matches!(err, BenchError::RunFailed(RunFailure::Parse(_))));
    let history = h.runner.history();
    assert_eq!(
        &history[history.len() - 4..],
        &[RunState::Running, RunState::Teardown, RunState::Parsing, RunState::Failed]
    );
    assert_eq!(h.runner.supervisor().session_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_all_nodes_faulty_launches_nothing() {
    let bench = BenchParameters::new(3)
        .with_faults(3)
        .with_duration(Duration::from_secs(1));
    let mut h = harness(bench, FakeKeys::default(), RecordingSupervisor::default(), false);

    h.runner.run().await.unwrap();

    let (committee, worker_cache) = h.runner.topology().unwrap();
    assert_eq!(committee.size(), 3);
    assert_eq!(worker_cache.size(), 3);
    assert!(h.runner.supervisor().names().is_empty());
    assert_eq!(h.runner.state(), RunState::Complete);
}

#[tokio::test(start_paused = true)]
async fn test_rerun_cleans_previous_state() {
    let mut h = harness(four_nodes_one_fault(), FakeKeys::default(), RecordingSupervisor::default(), false);
    let stale = h.runner.paths().logs_dir().join("primary-3.log");

    h.runner.run().await.unwrap();
    std::fs::write(&stale, "left over").unwrap();
    h.runner.run().await.unwrap();

    assert!(!stale.exists());
    assert_eq!(h.runner.history().first(), Some(&RunState::Idle));
    assert_eq!(h.runner.history().last(), Some(&RunState::Complete));
    assert_eq!(h.runner.history().len(), 9);
}

#[tokio::test(start_paused = true)]
async fn test_two_faults_skip_last_two_nodes_and_their_workers() {
    let bench = BenchParameters::new(4)
        .with_workers(2)
        .with_faults(2)
        .with_rate(1000)
        .with_duration(Duration::from_secs(2));
    let mut h = harness(bench, FakeKeys::default(), RecordingSupervisor::default(), false);

    h.runner.run().await.unwrap();

    let (committee, worker_cache) = h.runner.topology().unwrap();
    assert_eq!(committee.size(), 4);
    assert_eq!(worker_cache.size(), 8);

    let supervisor = h.runner.supervisor();
    assert_eq!(
        supervisor.names(),
        vec![
            "client-0-0",
            "client-0-1",
            "client-1-0",
            "client-1-1",
            "primary-0",
            "primary-1",
            "worker-0-0",
            "worker-0-1",
            "worker-1-0",
            "worker-1-1",
        ]
    );
    for name in supervisor.names() {
        for faulty in ["-2", "-3"] {
            assert!(!name.contains(faulty), "faulty node launched: {name}");
        }
    }
    for i in 0..2 {
        for j in 0..2 {
            let client = supervisor.command(&format!("client-{i}-{j}"));
            assert!(client.contains("--rate 250"), "{client}");
        }
    }
}

#[cfg(unix)]
#[tokio::test(start_paused = true)]
async fn test_sessions_exiting_early_do_not_fail_the_run() {
    use std::os::unix::process::ExitStatusExt;

    let supervisor = RecordingSupervisor {
        exited: vec![("client-0-0".to_string(), ExitStatus::from_raw(256))],
        ..Default::default()
    };
    let mut h = harness(four_nodes_one_fault(), FakeKeys::default(), supervisor, false);

    h.runner.run().await.unwrap();

    assert_eq!(h.runner.state(), RunState::Complete);
    assert_eq!(h.runner.supervisor().exit_polls, vec![9]);
    assert_eq!(h.runner.supervisor().teardowns, 2);
}
