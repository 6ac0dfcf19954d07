use fleetsim_common::{BotId, BotStatus, Position, TaskId};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Upper bound of the battery gauge.
pub const BATTERY_MAX: u8 = 100;
/// Per-tick chance that a bot rerolls its status and takes a wide step.
pub const STATUS_CHANGE_PROBABILITY: f64 = 0.15;
/// Speeds are drawn from `[0, MAX_SPEED]`.
pub const MAX_SPEED: f64 = 1.5;
/// Largest per-axis displacement on a status-change tick.
pub const WIDE_STEP: i32 = 20;
/// Largest per-axis displacement on an ordinary tick.
pub const NARROW_STEP: i32 = 8;

/// A simulated robot.
///
/// Field names follow the JSON shape the dashboard consumes, with the
/// position flattened into top-level `x`/`y`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bot {
    pub id: BotId,
    pub name: String,
    pub battery: u8,
    pub status: BotStatus,
    pub current_task: Option<TaskId>,
    pub speed: f64,
    /// Milliseconds since the Unix epoch of the last tick that touched this bot.
    pub last_updated: u64,
    #[serde(flatten)]
    pub position: Position,
}

impl Bot {
    /// Build fleet member `n` with randomized starting conditions.
    pub fn random<R: Rng + ?Sized>(n: usize, rng: &mut R, now_ms: u64) -> Self {
        let status = random_status(rng);
        let current_task =
            (status == BotStatus::Busy).then(|| TaskId::numbered(rng.gen_range(1..=6)));
        Self {
            id: BotId::numbered(n),
            name: format!("BOT-{}", 100 + n),
            battery: rng.gen_range(10..=BATTERY_MAX),
            status,
            current_task,
            speed: random_speed(rng),
            last_updated: now_ms,
            position: Position::new(
                f64::from(rng.gen_range(10..=380_i32)),
                f64::from(rng.gen_range(10..=280_i32)),
            ),
        }
    }

    /// Clamp the battery and drop a task reference held by a non-busy bot.
    fn enforce_invariants(&mut self) {
        self.battery = self.battery.min(BATTERY_MAX);
        if self.status != BotStatus::Busy {
            self.current_task = None;
        }
    }
}

/// One tick's worth of change applied to a single bot.
///
/// The fleet calls this once per bot per tick and re-establishes the bot
/// invariants afterwards, so implementations only describe the dynamics.
pub trait Perturbation: Send {
    fn perturb(&mut self, bot: &mut Bot);
}

/// Unconstrained random walk with battery drain and occasional status changes.
pub struct RandomWalk<R> {
    rng: R,
}

impl<R: Rng + Send> RandomWalk<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng + Send> Perturbation for RandomWalk<R> {
    fn perturb(&mut self, bot: &mut Bot) {
        let rng = &mut self.rng;

        // Battery moves according to the status held going into the tick.
        bot.battery = if bot.status == BotStatus::Charging {
            bot.battery.saturating_add(rng.gen_range(1..=10)).min(BATTERY_MAX)
        } else {
            bot.battery.saturating_sub(rng.gen_range(0..=8))
        };

        let reach = if rng.gen_bool(STATUS_CHANGE_PROBABILITY) {
            let status = random_status(rng);
            bot.status = status;
            bot.current_task =
                (status == BotStatus::Busy).then(|| TaskId::numbered(rng.gen_range(1..=100)));
            bot.speed = random_speed(rng);
            WIDE_STEP
        } else {
            NARROW_STEP
        };

        let dx = rng.gen_range(-reach..=reach);
        let dy = rng.gen_range(-reach..=reach);
        bot.position.translate(f64::from(dx), f64::from(dy));
    }
}

fn random_status<R: Rng + ?Sized>(rng: &mut R) -> BotStatus {
    BotStatus::ALL[rng.gen_range(0..BotStatus::ALL.len())]
}

/// Speed in `[0, MAX_SPEED]`, rounded to two decimals.
fn random_speed<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    (rng.gen_range(0.0..=MAX_SPEED) * 100.0).round() / 100.0
}

/// The fixed set of bots. Members are created once and only ever mutated
/// in place by [`Fleet::apply_tick`].
#[derive(Debug, Clone, Default)]
pub struct Fleet {
    bots: Vec<Bot>,
    tick: u64,
}

impl Fleet {
    /// Create `size` bots numbered from 1.
    pub fn generate<R: Rng + ?Sized>(size: usize, rng: &mut R, now_ms: u64) -> Self {
        let bots = (1..=size).map(|n| Bot::random(n, rng, now_ms)).collect();
        Self { bots, tick: 0 }
    }

    /// Adopt an explicit roster, normalizing each bot's invariants.
    pub fn from_bots(mut bots: Vec<Bot>) -> Self {
        for bot in &mut bots {
            bot.enforce_invariants();
        }
        Self { bots, tick: 0 }
    }

    /// Bots in roster order.
    pub fn bots(&self) -> &[Bot] {
        &self.bots
    }

    pub fn len(&self) -> usize {
        self.bots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bots.is_empty()
    }

    /// Number of ticks applied so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Advance every bot by one tick and stamp it with `now_ms`.
    pub fn apply_tick(&mut self, perturbation: &mut dyn Perturbation, now_ms: u64) {
        for bot in &mut self.bots {
            perturbation.perturb(bot);
            bot.enforce_invariants();
            bot.last_updated = now_ms;
        }
        self.tick += 1;
        tracing::trace!(tick = self.tick, bots = self.bots.len(), "fleet advanced");
    }
}
