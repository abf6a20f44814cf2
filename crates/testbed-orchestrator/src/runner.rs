//! The local benchmark state machine.
//!
//! ```text
//! Idle → Cleaning → Provisioning → Configuring → Launching → Running
//!                        │              │            │          │
//!                        └──────────────┴─── error ──┴──────────┤
//!                                                               ▼
//!                                  Failed ← (error) ← Parsing ← Teardown
//!                                                       │
//!                                                       ▼
//!                                                    Complete
//! ```
//!
//! Teardown runs on every path out of `Running` or any earlier failure, before
//! an error is returned to the caller.

use crate::commands::{CommandMaker, NodeFiles};
use crate::keys::{ExternalKeyProvisioner, KeyKind, KeyProvisioner};
use crate::logs::{LogAnalyzer, LogCollector, RunReport};
use crate::supervisor::{ProcessSupervisor, Supervisor};
use crate::toolchain::{CargoToolchain, Toolchain};
use crate::{BenchError, LaunchError, RunFailure, TestbedPaths};
use std::time::Duration;
use testbed_config::{write_json, BenchParameters, ConfigError, NodeParameters};
use testbed_types::{
    build_committee, build_worker_cache, rate_share, worker_base_port, Committee, NetworkAddress,
    NodeIdentity, WorkerCache, BASE_PORT,
};
use tracing::{debug, info, warn};

/// Pause after cleanup; removing the stores may take time.
const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Phase of a benchmark run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Cleaning,
    Provisioning,
    Configuring,
    Launching,
    Running,
    Teardown,
    Parsing,
    Complete,
    Failed,
}

/// Flags of a run that are not benchmark parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Run nodes with `-vvv` instead of `-vv`.
    pub debug: bool,
    /// Compile the node crate with failpoints enabled.
    pub failpoints: bool,
    /// Compile and run release binaries.
    pub release: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            debug: false,
            failpoints: false,
            release: true,
        }
    }
}

/// Every identity a run needs, in committee order.
struct Identities {
    primaries: Vec<NodeIdentity>,
    primary_network: Vec<NodeIdentity>,
    /// Indexed by `i * W + j`.
    workers: Vec<NodeIdentity>,
}

/// Drives one local benchmark from cleanup to log hand-off.
pub struct BenchmarkRunner<S: Supervisor = ProcessSupervisor> {
    bench: BenchParameters,
    node: NodeParameters,
    options: RunOptions,
    paths: TestbedPaths,
    commands: CommandMaker,
    keys: Box<dyn KeyProvisioner>,
    toolchain: Box<dyn Toolchain>,
    analyzer: Box<dyn LogAnalyzer>,
    supervisor: S,
    settle_delay: Duration,
    state: RunState,
    history: Vec<RunState>,
    topology: Option<(Committee, WorkerCache)>,
}

impl BenchmarkRunner<ProcessSupervisor> {
    /// Validate the parameters and wire the default collaborators: the node
    /// binary's key commands, cargo, real processes and the log collector.
    ///
    /// Fails with [`BenchError::InvalidParameters`] before anything is touched.
    pub fn new(
        bench: BenchParameters,
        node: NodeParameters,
        paths: TestbedPaths,
    ) -> Result<Self, BenchError> {
        bench.validate().map_err(BenchError::InvalidParameters)?;
        node.validate().map_err(BenchError::InvalidParameters)?;

        let commands = CommandMaker::in_dir(paths.root());
        Ok(Self {
            bench,
            node,
            options: RunOptions::default(),
            keys: Box::new(ExternalKeyProvisioner::new(commands.clone())),
            toolchain: Box::new(CargoToolchain::new(paths.clone())),
            analyzer: Box::new(LogCollector),
            supervisor: ProcessSupervisor::new(),
            commands,
            paths,
            settle_delay: SETTLE_DELAY,
            state: RunState::Idle,
            history: vec![RunState::Idle],
            topology: None,
        })
    }
}

impl<S: Supervisor> BenchmarkRunner<S> {
    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_key_provisioner(mut self, keys: impl KeyProvisioner + 'static) -> Self {
        self.keys = Box::new(keys);
        self
    }

    pub fn with_toolchain(mut self, toolchain: impl Toolchain + 'static) -> Self {
        self.toolchain = Box::new(toolchain);
        self
    }

    pub fn with_analyzer(mut self, analyzer: impl LogAnalyzer + 'static) -> Self {
        self.analyzer = Box::new(analyzer);
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Swap the process supervisor.
    pub fn with_supervisor<T: Supervisor>(self, supervisor: T) -> BenchmarkRunner<T> {
        BenchmarkRunner {
            bench: self.bench,
            node: self.node,
            options: self.options,
            paths: self.paths,
            commands: self.commands,
            keys: self.keys,
            toolchain: self.toolchain,
            analyzer: self.analyzer,
            supervisor,
            settle_delay: self.settle_delay,
            state: self.state,
            history: self.history,
            topology: self.topology,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Every state entered so far, starting with `Idle`.
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    pub fn supervisor(&self) -> &S {
        &self.supervisor
    }

    pub fn paths(&self) -> &TestbedPaths {
        &self.paths
    }

    pub fn bench_parameters(&self) -> &BenchParameters {
        &self.bench
    }

    /// Committee and worker cache of the last run, once configured.
    pub fn topology(&self) -> Option<(&Committee, &WorkerCache)> {
        self.topology.as_ref().map(|(c, w)| (c, w))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Run
    // ═══════════════════════════════════════════════════════════════════════════

    /// Run the benchmark and return the analyzer's report.
    ///
    /// Whatever happens after cleanup, every launched session is terminated
    /// before this returns.
    pub async fn run(&mut self) -> Result<RunReport, BenchError> {
        info!(
            nodes = self.bench.nodes,
            workers = self.bench.workers,
            faults = self.bench.faults,
            rate = self.bench.rate,
            "Starting local benchmark"
        );
        self.history.truncate(1);
        self.topology = None;

        self.transition(RunState::Cleaning);
        self.clean().await;

        let outcome = self.setup_and_run().await;

        for (session, status) in self.supervisor.exited_sessions() {
            warn!(%session, %status, "Session exited before teardown");
        }
        self.transition(RunState::Teardown);
        self.supervisor.teardown_all().await;

        let result = outcome.and_then(|()| {
            self.transition(RunState::Parsing);
            info!("Parsing logs...");
            self.analyzer
                .process(&self.paths.logs_dir(), self.bench.faults)
                .map_err(RunFailure::from)
        });

        match result {
            Ok(report) => {
                self.transition(RunState::Complete);
                Ok(report)
            }
            Err(failure) => {
                warn!(error = %failure, "Benchmark failed");
                self.transition(RunState::Failed);
                Err(BenchError::RunFailed(failure))
            }
        }
    }

    fn transition(&mut self, next: RunState) {
        info!(from = ?self.state, to = ?next, "Run state");
        self.state = next;
        self.history.push(next);
    }

    /// Best-effort removal of everything a previous run left behind.
    async fn clean(&mut self) {
        self.supervisor.teardown_all().await;
        self.paths.clean();
        tokio::time::sleep(self.settle_delay).await;
    }

    async fn setup_and_run(&mut self) -> Result<(), RunFailure> {
        self.transition(RunState::Provisioning);
        info!("Setting up testbed...");
        self.toolchain
            .build(self.options.failpoints, self.options.release)
            .await?;
        let identities = self.provision().await?;

        self.transition(RunState::Configuring);
        let (committee, worker_cache) = self.configure(&identities)?;

        self.transition(RunState::Launching);
        self.launch(&committee, &worker_cache)?;
        self.topology = Some((committee, worker_cache));

        self.transition(RunState::Running);
        info!("Running benchmark ({:?})...", self.bench.duration);
        tokio::time::sleep(self.bench.duration).await;
        Ok(())
    }

    async fn provision(&self) -> Result<Identities, LaunchError> {
        let nodes = self.bench.nodes;

        let mut primaries = Vec::with_capacity(nodes);
        for i in 0..nodes {
            let file = self.paths.primary_key_file(i);
            primaries.push(self.keys.generate(KeyKind::Protocol, &file).await?);
        }

        let mut primary_network = Vec::with_capacity(nodes);
        for i in 0..nodes {
            let file = self.paths.primary_network_key_file(i);
            primary_network.push(self.keys.generate(KeyKind::Network, &file).await?);
        }

        let mut workers = Vec::with_capacity(self.bench.total_workers());
        for k in 0..self.bench.total_workers() {
            let file = self.paths.worker_key_file(k);
            workers.push(self.keys.generate(KeyKind::Network, &file).await?);
        }

        info!(
            primaries = primaries.len(),
            workers = workers.len(),
            "Generated node identities"
        );
        Ok(Identities {
            primaries,
            primary_network,
            workers,
        })
    }

    fn configure(&self, identities: &Identities) -> Result<(Committee, WorkerCache), ConfigError> {
        let committee =
            build_committee(&identities.primaries, &identities.primary_network, BASE_PORT)?;
        write_json(&committee, &self.paths.committee_file())?;

        let worker_cache = build_worker_cache(
            &identities.primaries,
            &identities.workers,
            worker_base_port(BASE_PORT, identities.primaries.len())?,
            self.bench.workers,
        )?;
        write_json(&worker_cache, &self.paths.workers_file())?;

        write_json(&self.node, &self.paths.parameters_file())?;
        Ok((committee, worker_cache))
    }

    /// Clients first, then primaries, then workers; faulty indices skipped.
    /// Nothing waits for a role to be ready before the next is started.
    fn launch(&mut self, committee: &Committee, worker_cache: &WorkerCache) -> Result<(), LaunchError> {
        let plan = self.bench.fault_plan();
        let workers_addresses = worker_cache.workers_addresses(&plan);
        let all_addresses: Vec<NetworkAddress> = workers_addresses
            .iter()
            .flatten()
            .map(|(_, address)| *address)
            .collect();

        // Clients wait for the nodes to come up on their own.
        match rate_share(self.bench.rate, all_addresses.len()) {
            Ok(share) => {
                info!(clients = all_addresses.len(), rate_share = share, "Launching clients");
                for (i, addresses) in workers_addresses.iter().enumerate() {
                    for (id, address) in addresses {
                        let cmd = self.commands.run_client(
                            address,
                            self.bench.tx_size,
                            share,
                            &all_addresses,
                        );
                        self.supervisor
                            .launch(&cmd, &self.paths.client_log_file(i, *id))?;
                    }
                }
            }
            Err(e) => warn!(error = %e, "No active worker; skipping clients"),
        }

        let primaries = committee.primary_addresses(&plan);
        info!(primaries = primaries.len(), "Launching primaries");
        for (i, address) in primaries.iter().enumerate() {
            debug!(node = i, %address, "launching primary");
            let cmd = self
                .commands
                .run_primary(&self.node_files(i), self.options.debug);
            self.supervisor
                .launch(&cmd, &self.paths.primary_log_file(i))?;
        }

        info!(workers = all_addresses.len(), "Launching workers");
        for (i, addresses) in workers_addresses.iter().enumerate() {
            for (id, _) in addresses {
                let files = NodeFiles {
                    worker_keys: self
                        .paths
                        .worker_key_file(i * self.bench.workers + *id as usize),
                    store: self.paths.db_path(i, Some(*id)),
                    ..self.node_files(i)
                };
                let cmd = self.commands.run_worker(&files, *id, self.options.debug);
                self.supervisor
                    .launch(&cmd, &self.paths.worker_log_file(i, *id))?;
            }
        }
        Ok(())
    }

    /// Files of primary `i`. Primaries are given the key of worker 0.
    fn node_files(&self, i: usize) -> NodeFiles {
        NodeFiles {
            primary_keys: self.paths.primary_key_file(i),
            primary_network_keys: self.paths.primary_network_key_file(i),
            worker_keys: self.paths.worker_key_file(0),
            committee: self.paths.committee_file(),
            workers: self.paths.workers_file(),
            store: self.paths.db_path(i, None),
            parameters: self.paths.parameters_file(),
        }
    }
}
