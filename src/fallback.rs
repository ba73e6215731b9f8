//! Local fallback scheduler.
//!
//! Runs the actions the classifier rejected directly on this machine, up to
//! a bounded number at once. Coordination is a polling loop with a fixed
//! sleep between scans: an action starts once every prerequisite produced
//! inside the same batch has finished successfully, and is skipped without
//! running when any of them failed. The external engine is never involved.

use std::collections::HashSet;
use std::io;
use std::num::NonZeroUsize;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use camino::Utf8PathBuf;
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::action::{ActionGraph, ActionId, RawAction};
use crate::cmdline::tokenize;
use crate::runner::forward_lines;

/// Final state of one fallback action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The command exited with status zero.
    Succeeded,
    /// The command exited non-zero or could not be started.
    Failed,
    /// Never started because a prerequisite failed or was skipped.
    Skipped,
}

/// Handle on a running action.
pub trait Worker {
    /// Check for completion without blocking. `Some(true)` means the action
    /// finished successfully.
    ///
    /// # Errors
    ///
    /// Returns an error when the state of the action cannot be queried.
    fn poll(&mut self) -> io::Result<Option<bool>>;
}

/// Starts fallback actions.
pub trait Launcher {
    /// Worker type returned by [`Launcher::launch`].
    type Worker: Worker;

    /// Start `action`.
    ///
    /// # Errors
    ///
    /// Returns an error when the action cannot be started.
    fn launch(&mut self, id: ActionId, action: &RawAction) -> io::Result<Self::Worker>;
}

/// Launches actions as child processes of this one.
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher {
    working_dir: Option<Utf8PathBuf>,
}

impl ProcessLauncher {
    /// Run children in `working_dir` instead of the current directory.
    #[must_use]
    pub const fn new(working_dir: Option<Utf8PathBuf>) -> Self {
        Self { working_dir }
    }
}

/// A spawned child with its output forwarders.
#[derive(Debug)]
pub struct ProcessWorker {
    child: Child,
    forwarders: Vec<JoinHandle<usize>>,
}

impl Worker for ProcessWorker {
    fn poll(&mut self) -> io::Result<Option<bool>> {
        let Some(status) = self.child.try_wait()? else {
            return Ok(None);
        };
        for handle in self.forwarders.drain(..) {
            if handle.join().is_err() {
                warn!("fallback output forwarder panicked");
            }
        }
        Ok(Some(status.success()))
    }
}

impl Launcher for ProcessLauncher {
    type Worker = ProcessWorker;

    fn launch(&mut self, id: ActionId, action: &RawAction) -> io::Result<ProcessWorker> {
        let mut cmd = Command::new(&action.executable);
        cmd.args(tokenize(&action.arguments).into_iter().map(|token| token.value));
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        debug!(action = %id, executable = %action.executable, "starting fallback action");
        let mut child = cmd.spawn()?;
        let label = id.to_string();
        let mut forwarders = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            let action_label = label.clone();
            forwarders.push(forward_lines(stdout, move |line| {
                info!(target: "kumiki::fallback", action = %action_label, "{line}");
            }));
        }
        if let Some(stderr) = child.stderr.take() {
            forwarders.push(forward_lines(stderr, move |line| {
                info!(target: "kumiki::fallback", action = %label, "{line}");
            }));
        }
        Ok(ProcessWorker { child, forwarders })
    }
}

/// Outcomes of one fallback batch, in batch order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FallbackReport {
    outcomes: IndexMap<ActionId, Outcome>,
}

impl FallbackReport {
    /// Outcome of `id`, if it belonged to the batch.
    #[must_use]
    pub fn outcome(&self, id: ActionId) -> Option<Outcome> {
        self.outcomes.get(&id).copied()
    }

    /// Iterate outcomes in batch order.
    pub fn iter(&self) -> impl Iterator<Item = (ActionId, Outcome)> + '_ {
        self.outcomes.iter().map(|(id, outcome)| (*id, *outcome))
    }

    /// Whether every action succeeded. An empty batch succeeds.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.outcomes.values().all(|o| *o == Outcome::Succeeded)
    }

    /// Number of actions with the given outcome.
    #[must_use]
    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.values().filter(|o| **o == outcome).count()
    }
}

enum State<W> {
    Pending,
    Running(W),
    Done(Outcome),
}

/// Bounded-parallel polling scheduler.
#[derive(Debug)]
pub struct FallbackScheduler<L> {
    launcher: L,
    max_parallel: NonZeroUsize,
    poll_interval: Duration,
}

impl<L: Launcher> FallbackScheduler<L> {
    /// Create a scheduler running at most `max_parallel` actions at once.
    #[must_use]
    pub const fn new(launcher: L, max_parallel: NonZeroUsize, poll_interval: Duration) -> Self {
        Self {
            launcher,
            max_parallel,
            poll_interval,
        }
    }

    /// Run `batch` to completion.
    ///
    /// Prerequisites produced outside the batch are assumed to exist. Ids
    /// missing from `graph` are reported as failed.
    pub fn run(&mut self, graph: &ActionGraph, batch: &[ActionId]) -> FallbackReport {
        let members: HashSet<ActionId> = batch.iter().copied().collect();
        let mut states: IndexMap<ActionId, State<L::Worker>> =
            batch.iter().map(|id| (*id, State::Pending)).collect();
        info!(actions = states.len(), max_parallel = self.max_parallel.get(), "running fallback actions");

        loop {
            poll_running(&mut states);
            let unfinished = states.values().filter(|s| !matches!(s, State::Done(_))).count();
            if unfinished == 0 {
                break;
            }
            let progressed = self.start_ready(graph, &members, &mut states);
            let running = states.values().filter(|s| matches!(s, State::Running(_))).count();
            if running == 0 && !progressed {
                skip_stuck(&mut states);
                continue;
            }
            if !self.poll_interval.is_zero() {
                thread::sleep(self.poll_interval);
            }
        }

        let report = FallbackReport {
            outcomes: states
                .into_iter()
                .map(|(id, state)| match state {
                    State::Done(outcome) => (id, outcome),
                    State::Pending | State::Running(_) => (id, Outcome::Failed),
                })
                .collect(),
        };
        info!(
            succeeded = report.count(Outcome::Succeeded),
            failed = report.count(Outcome::Failed),
            skipped = report.count(Outcome::Skipped),
            "fallback actions finished"
        );
        report
    }

    /// Start or skip pending actions. Returns whether any state changed.
    fn start_ready(
        &mut self,
        graph: &ActionGraph,
        members: &HashSet<ActionId>,
        states: &mut IndexMap<ActionId, State<L::Worker>>,
    ) -> bool {
        let mut changed = false;
        let pending: Vec<ActionId> = states
            .iter()
            .filter(|(_, s)| matches!(s, State::Pending))
            .map(|(id, _)| *id)
            .collect();
        for id in pending {
            let running = states.values().filter(|s| matches!(s, State::Running(_))).count();
            if running >= self.max_parallel.get() {
                break;
            }
            let Some(action) = graph.get(id) else {
                warn!(action = %id, "fallback action missing from the graph");
                states.insert(id, State::Done(Outcome::Failed));
                changed = true;
                continue;
            };
            let mut blocked = false;
            let mut failed = false;
            for producer in action.producers().filter(|p| members.contains(p) && *p != id) {
                match states.get(&producer) {
                    Some(State::Done(Outcome::Succeeded)) => {}
                    Some(State::Done(_)) => failed = true,
                    _ => blocked = true,
                }
            }
            if failed {
                warn!(action = %id, "skipping fallback action: a prerequisite failed");
                states.insert(id, State::Done(Outcome::Skipped));
                changed = true;
            } else if !blocked {
                let next = match self.launcher.launch(id, action) {
                    Ok(worker) => State::Running(worker),
                    Err(err) => {
                        warn!(action = %id, error = %err, "failed to start fallback action");
                        State::Done(Outcome::Failed)
                    }
                };
                states.insert(id, next);
                changed = true;
            }
        }
        changed
    }
}

fn poll_running<W: Worker>(states: &mut IndexMap<ActionId, State<W>>) {
    for (id, state) in states.iter_mut() {
        let State::Running(worker) = state else {
            continue;
        };
        match worker.poll() {
            Ok(None) => {}
            Ok(Some(true)) => *state = State::Done(Outcome::Succeeded),
            Ok(Some(false)) => {
                warn!(action = %id, "fallback action failed");
                *state = State::Done(Outcome::Failed);
            }
            Err(err) => {
                warn!(action = %id, error = %err, "lost track of fallback action");
                *state = State::Done(Outcome::Failed);
            }
        }
    }
}

/// Mark every pending action skipped. Only reached when the remaining
/// actions wait on each other.
fn skip_stuck<W>(states: &mut IndexMap<ActionId, State<W>>) {
    for (id, state) in states.iter_mut() {
        if matches!(state, State::Pending) {
            warn!(action = %id, "skipping fallback action: prerequisites never completed");
            *state = State::Done(Outcome::Skipped);
        }
    }
}
