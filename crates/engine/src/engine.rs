use std::sync::{Arc, Weak};
use std::time::Duration;

use fleetsim_common::now_millis;
use fleetsim_kernel::{
    Bot, Fleet, Perturbation, RandomWalk, Snapshot, Task, TaskQueue, TaskRequest,
};
use fleetsim_stream::{BroadcastHub, SubscriberId, Subscription};
use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::runtime::Handle;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::scheduler::TickScheduler;

/// Push-channel handle yielding every published snapshot in order.
pub type SnapshotSubscription = Subscription<Arc<Snapshot>>;

/// Everything the engine guards with its single lock.
struct EngineState {
    fleet: Fleet,
    queue: TaskQueue,
    hub: BroadcastHub<Arc<Snapshot>>,
    scheduler: TickScheduler,
    perturbation: Box<dyn Perturbation>,
}

impl EngineState {
    fn capture(&self) -> Arc<Snapshot> {
        Arc::new(Snapshot::capture(&self.fleet, &self.queue))
    }

    /// Capture the current state and push it to every subscriber.
    fn broadcast(&mut self) -> Arc<Snapshot> {
        let snapshot = self.capture();
        let report = self.hub.publish(&snapshot);
        tracing::debug!(
            tick = snapshot.tick,
            delivered = report.delivered,
            dropped = report.failed.len(),
            "snapshot published"
        );
        snapshot
    }

    fn advance(&mut self, now_ms: u64) -> Arc<Snapshot> {
        let _span = tracing::info_span!("tick", tick = self.fleet.tick() + 1).entered();
        self.fleet.apply_tick(self.perturbation.as_mut(), now_ms);
        self.broadcast()
    }
}

/// The simulation engine. Cheap to clone; all clones share one state.
///
/// Fleet, task queue, subscribers and the tick scheduler sit behind a single
/// mutex. Ticks, task submissions, subscriptions and scheduler changes all
/// take that lock, so no caller ever sees a half-applied tick, and snapshots
/// reach every subscriber in the order they were produced.
#[derive(Clone)]
pub struct Engine {
    shared: Arc<Mutex<EngineState>>,
    runtime: Handle,
}

impl Engine {
    /// Build an engine with the random-walk perturbation model.
    ///
    /// Must be called from within a tokio runtime; the tick task is spawned
    /// onto it. Starts ticking immediately if `config.autostart` is set.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Self::build(config, |rng| -> Box<dyn Perturbation> {
            Box::new(RandomWalk::new(rng))
        })
    }

    /// Build an engine whose ticks apply `perturbation` instead of the random walk.
    pub fn with_perturbation(
        config: EngineConfig,
        perturbation: impl Perturbation + 'static,
    ) -> Result<Self, EngineError> {
        Self::build(config, move |_| -> Box<dyn Perturbation> {
            Box::new(perturbation)
        })
    }

    fn build<F>(config: EngineConfig, make_perturbation: F) -> Result<Self, EngineError>
    where
        F: FnOnce(ChaCha8Rng) -> Box<dyn Perturbation>,
    {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;

        let mut rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let now = now_millis();
        let fleet = Fleet::generate(config.fleet_size, &mut rng, now);
        let mut queue = TaskQueue::new();
        queue.seed_initial(config.initial_tasks, &mut rng, now);

        tracing::info!(
            bots = fleet.len(),
            tasks = queue.len(),
            interval_ms = config.tick_interval.as_millis() as u64,
            seed = ?config.seed,
            "engine assembled"
        );

        let state = EngineState {
            fleet,
            queue,
            hub: BroadcastHub::new(),
            scheduler: TickScheduler::new(config.tick_interval),
            perturbation: make_perturbation(rng),
        };
        let engine = Self {
            shared: Arc::new(Mutex::new(state)),
            runtime,
        };
        if config.autostart {
            engine.start();
        }
        Ok(engine)
    }

    /// Callback handed to the scheduler. Holds only a weak reference so a
    /// dropped engine retires its ticker.
    fn ticker(&self) -> impl FnMut(u64) -> bool + Send + 'static {
        let shared: Weak<Mutex<EngineState>> = Arc::downgrade(&self.shared);
        move |generation| {
            let Some(shared) = shared.upgrade() else {
                return false;
            };
            let mut state = shared.lock();
            if !state.scheduler.is_current(generation) {
                return false;
            }
            state.advance(now_millis());
            true
        }
    }

    /// Begin ticking. Returns false if already running.
    pub fn start(&self) -> bool {
        let ticker = self.ticker();
        self.shared.lock().scheduler.start(&self.runtime, ticker)
    }

    /// Stop ticking. No tick applies or publishes after this returns.
    /// Returns false if already stopped.
    pub fn stop(&self) -> bool {
        self.shared.lock().scheduler.stop()
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().scheduler.is_running()
    }

    /// Current tick interval.
    pub fn interval(&self) -> Duration {
        self.shared.lock().scheduler.interval()
    }

    /// Replace the tick interval, keeping the run state. Fails with
    /// [`EngineError::InvalidInterval`] below 100 ms.
    pub fn reconfigure(&self, interval_ms: u64) -> Result<Duration, EngineError> {
        let interval = Duration::from_millis(interval_ms);
        let ticker = self.ticker();
        let mut state = self.shared.lock();
        state
            .scheduler
            .reconfigure(interval, &self.runtime, ticker)
            .inspect_err(|err| tracing::warn!(%err, "reconfigure rejected"))?;
        Ok(interval)
    }

    /// Validate and append a task, then broadcast.
    pub fn enqueue(&self, request: TaskRequest) -> Result<Task, EngineError> {
        let mut state = self.shared.lock();
        let task = state
            .queue
            .enqueue(request, now_millis())
            .inspect_err(|err| tracing::warn!(%err, "task rejected"))?;
        state.broadcast();
        Ok(task)
    }

    /// Remove the head task. Broadcasts only when something was removed;
    /// `None` means the queue is empty.
    pub fn dequeue(&self) -> Option<Task> {
        let mut state = self.shared.lock();
        let task = state.queue.dequeue()?;
        state.broadcast();
        Some(task)
    }

    /// Apply one tick now, regardless of run state, and broadcast it.
    pub fn step(&self) -> Arc<Snapshot> {
        self.shared.lock().advance(now_millis())
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.shared.lock().capture()
    }

    /// Bots in roster order.
    pub fn bots(&self) -> Vec<Bot> {
        self.shared.lock().fleet.bots().to_vec()
    }

    /// Pending tasks in queue order.
    pub fn tasks(&self) -> Vec<Task> {
        self.shared.lock().queue.list()
    }

    /// Attach an observer. Its first message is the current state.
    pub fn subscribe(&self) -> SnapshotSubscription {
        let mut state = self.shared.lock();
        let current = state.capture();
        state.hub.subscribe(current)
    }

    /// Detach an observer. Safe to repeat or to call after it disconnected.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.shared.lock().hub.unsubscribe(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.lock().hub.len()
    }
}
