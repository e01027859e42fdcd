//! The layout tick loop.
//!
//! Runs the force simulation as a cancellable scheduled task: one tick every
//! frame interval, each tick bounded and yielding back to the runtime before
//! the next is scheduled. Position snapshots are published through a watch
//! channel; the rendering side pulls the latest snapshot instead of being
//! pushed into.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::graph::{GraphModel, GraphNode};
use crate::simulation::LayoutSimulator;

/// Interval between simulation ticks (roughly one display frame).
const TICK_INTERVAL: Duration = Duration::from_millis(16);

/// Handle on the shared simulator. The tick task and the drag controller both
/// write through this lock; the watch channel is the read side.
pub type SharedSimulator = Arc<Mutex<LayoutSimulator>>;

/// Lock the simulator, recovering from a poisoned lock. A panicked tick task
/// leaves positions merely stale, never invalid.
pub fn lock_simulator(sim: &SharedSimulator) -> std::sync::MutexGuard<'_, LayoutSimulator> {
    sim.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives a [`LayoutSimulator`] on a recurring schedule.
///
/// `start` replaces any previous run: the prior task is aborted first, and it
/// only ever held the prior simulator, so a stale tick can never touch the
/// new node array. `stop` is idempotent and safe to call when not running.
pub struct LayoutLoop {
    task: Option<JoinHandle<()>>,
    simulator: Option<SharedSimulator>,
    snapshot_tx: watch::Sender<Vec<GraphNode>>,
    snapshot_rx: watch::Receiver<Vec<GraphNode>>,
}

impl Default for LayoutLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutLoop {
    pub fn new() -> Self {
        let (snapshot_tx, snapshot_rx) = watch::channel(Vec::new());
        Self {
            task: None,
            simulator: None,
            snapshot_tx,
            snapshot_rx,
        }
    }

    /// Start simulating the given graph, stopping any prior run first.
    ///
    /// An empty graph publishes an empty snapshot and schedules nothing.
    pub fn start(&mut self, model: GraphModel) -> SharedSimulator {
        self.stop();

        let simulator = Arc::new(Mutex::new(LayoutSimulator::new(model)));
        self.simulator = Some(Arc::clone(&simulator));

        if lock_simulator(&simulator).model().is_empty() {
            let _ = self.snapshot_tx.send(Vec::new());
            return simulator;
        }

        let _ = self
            .snapshot_tx
            .send(lock_simulator(&simulator).model().nodes.clone());

        let task_sim = Arc::clone(&simulator);
        let tx = self.snapshot_tx.clone();
        self.task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let snapshot = {
                    let mut sim = lock_simulator(&task_sim);
                    if !sim.is_running() {
                        // Settled. Keep polling: a drag can re-heat alpha.
                        None
                    } else {
                        sim.tick();
                        Some(sim.model().nodes.clone())
                    }
                };
                if let Some(nodes) = snapshot {
                    let _ = tx.send(nodes);
                }
            }
        }));

        simulator
    }

    /// Halt the tick task. Idempotent.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.simulator = None;
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// The simulator of the current run, if one is live.
    pub fn simulator(&self) -> Option<SharedSimulator> {
        self.simulator.clone()
    }

    /// Subscribe to position snapshots.
    pub fn subscribe(&self) -> watch::Receiver<Vec<GraphNode>> {
        self.snapshot_rx.clone()
    }

    /// The most recently published snapshot.
    pub fn latest(&self) -> Vec<GraphNode> {
        self.snapshot_rx.borrow().clone()
    }
}

impl Drop for LayoutLoop {
    fn drop(&mut self) {
        self.stop();
    }
}
