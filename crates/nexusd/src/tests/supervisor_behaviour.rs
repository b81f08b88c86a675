//! Behavioural tests for supervision of real forked workers.

use std::cell::RefCell;
use std::sync::MutexGuard;

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use serde_json::{Map, json};

use super::support::{Sandbox, TEST_TOKEN, builtin_router, fork_lock, wait_for};
use crate::client::ServiceClient;
use crate::signals::ManualSignals;
use crate::supervisor::{
    ForkLauncher, SOCKET_SERVICE, ServiceCatalog, ServiceState, Supervisor,
};

struct SupervisorWorld {
    sandbox: Sandbox,
    supervisor: Supervisor<ForkLauncher, ManualSignals>,
    service: String,
    first_pid: Option<Pid>,
    _fork_guard: MutexGuard<'static, ()>,
}

impl SupervisorWorld {
    fn new() -> Self {
        let fork_guard = fork_lock();
        let sandbox = Sandbox::new(false);
        let launcher = ForkLauncher::new(
            ServiceCatalog::standard(),
            sandbox.context.clone(),
            builtin_router(&sandbox.context),
        );
        let supervisor = Supervisor::new(
            launcher,
            ManualSignals::new(),
            sandbox.context.config().shutdown_timeout(),
        );
        Self {
            sandbox,
            supervisor,
            service: String::new(),
            first_pid: None,
            _fork_guard: fork_guard,
        }
    }

    fn current_pid(&self) -> Option<Pid> {
        self.supervisor.records().first().and_then(|record| record.pid())
    }

    fn client(&self) -> ServiceClient {
        ServiceClient::new(self.sandbox.socket_path(&self.service)).with_token(TEST_TOKEN)
    }

    fn socket_ready(&self) -> bool {
        wait_for(|| self.sandbox.socket_path(&self.service).exists())
    }
}

impl Drop for SupervisorWorld {
    fn drop(&mut self) {
        if self.supervisor.records().iter().any(|record| record.state() != ServiceState::Stopped) {
            self.supervisor.shutdown();
        }
    }
}

#[fixture]
fn world() -> RefCell<SupervisorWorld> {
    RefCell::new(SupervisorWorld::new())
}

#[given("a supervisor with a forked \"{service}\" worker")]
fn given_forked_worker(world: &RefCell<SupervisorWorld>, service: String) {
    let mut state = world.borrow_mut();
    let pid = state
        .supervisor
        .register_service(SOCKET_SERVICE, &service)
        .expect("fork worker");
    state.service = service;
    state.first_pid = Some(pid);
}

#[when("the worker socket becomes available")]
fn when_socket_available(world: &RefCell<SupervisorWorld>) {
    assert!(world.borrow().socket_ready(), "worker never bound its socket");
}

#[when("the worker process is killed")]
fn when_worker_killed(world: &RefCell<SupervisorWorld>) {
    let state = world.borrow();
    assert!(state.socket_ready(), "worker never bound its socket");
    let pid = state.first_pid.expect("worker forked");
    kill(pid, Signal::SIGKILL).expect("kill worker");
}

#[when("the new worker is sent a reload signal at once")]
fn when_reload_during_start(world: &RefCell<SupervisorWorld>) {
    let pid = world.borrow().first_pid.expect("worker forked");
    kill(pid, Signal::SIGHUP).expect("signal worker");
}

#[when("the supervisor shuts down")]
fn when_supervisor_shuts_down(world: &RefCell<SupervisorWorld>) {
    let mut state = world.borrow_mut();
    assert!(state.socket_ready(), "worker never bound its socket");
    state.supervisor.shutdown();
}

#[then("the supervisor restarts the worker")]
fn then_restarted(world: &RefCell<SupervisorWorld>) {
    let mut state = world.borrow_mut();
    let first = state.first_pid;
    let restarted = wait_for(|| {
        state.supervisor.tick().expect("tick");
        state
            .supervisor
            .records()
            .first()
            .is_some_and(|record| record.restarts() >= 1)
    });
    assert!(restarted, "worker was not restarted");
    assert_ne!(state.current_pid(), first);
    assert_eq!(
        state.supervisor.records().first().map(|record| record.state()),
        Some(ServiceState::Running)
    );
}

#[then("a request for \"{path}\" returns the greeting")]
fn then_request_greets(world: &RefCell<SupervisorWorld>, path: String) {
    let state = world.borrow();
    let client = state.client();
    let mut response = None;
    let answered = wait_for(|| {
        response = client.request("GET", &path, Map::new()).ok();
        response.is_some()
    });
    assert!(answered, "worker did not answer");
    assert_eq!(response, Some(json!({ "message": "Hello World!" })));
}

#[then("the worker keeps its original process")]
fn then_same_process(world: &RefCell<SupervisorWorld>) {
    let mut state = world.borrow_mut();
    for _ in 0..20 {
        state.supervisor.tick().expect("tick");
    }
    let record = state.supervisor.records().first().expect("record");
    assert_eq!(record.restarts(), 0);
    assert_eq!(record.pid(), state.first_pid);
}

#[then("every service is stopped")]
fn then_all_stopped(world: &RefCell<SupervisorWorld>) {
    let state = world.borrow();
    assert!(
        state
            .supervisor
            .status()
            .iter()
            .all(|status| status.status == ServiceState::Stopped)
    );
}

#[then("no worker process remains")]
fn then_no_worker(world: &RefCell<SupervisorWorld>) {
    let state = world.borrow();
    let pid = state.current_pid().expect("pid kept after shutdown");
    assert!(kill(pid, None).is_err(), "worker {pid} still alive");
    assert!(!state.sandbox.socket_path(&state.service).exists());
}

#[scenario(
    path = "tests/features/supervisor.feature",
    name = "A forked worker serves requests"
)]
fn forked_worker_serves(#[from(world)] world: RefCell<SupervisorWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/supervisor.feature",
    name = "A killed worker is restarted under a new process"
)]
fn killed_worker_restarts(#[from(world)] world: RefCell<SupervisorWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/supervisor.feature",
    name = "A reload sent while a worker starts does not kill it"
)]
fn early_reload_is_survived(#[from(world)] world: RefCell<SupervisorWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/supervisor.feature",
    name = "Shutdown stops every worker"
)]
fn shutdown_stops_workers(#[from(world)] world: RefCell<SupervisorWorld>) {
    drop(world);
}
