use serde::{Deserialize, Serialize};

use crate::fleet::{Bot, Fleet};
use crate::queue::{Task, TaskQueue};

/// A read-only copy of the whole fleet and task queue at one tick.
///
/// Captured by cloning, so later mutation of the fleet or queue never shows
/// through. Serializes as `{ tick, bots, tasks }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Ticks applied to the fleet when this snapshot was taken.
    pub tick: u64,
    pub bots: Vec<Bot>,
    pub tasks: Vec<Task>,
}

impl Snapshot {
    /// Copy the current state of `fleet` and `queue`.
    pub fn capture(fleet: &Fleet, queue: &TaskQueue) -> Self {
        Self {
            tick: fleet.tick(),
            bots: fleet.bots().to_vec(),
            tasks: queue.list(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::RandomWalk;
    use crate::queue::TaskRequest;
    use fleetsim_common::{Priority, TaskKind};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn capture_is_detached_from_later_mutation() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut fleet = Fleet::generate(3, &mut rng, 0);
        let mut queue = TaskQueue::new();
        queue
            .enqueue(TaskRequest::new(TaskKind::Pickup, Priority::Low), 1)
            .unwrap();

        let snap = Snapshot::capture(&fleet, &queue);
        assert_eq!(snap.tick, 0);
        assert_eq!(snap.bots.len(), 3);
        assert_eq!(snap.tasks.len(), 1);

        fleet.apply_tick(&mut RandomWalk::new(rng), 99);
        queue.dequeue();

        assert_eq!(snap.tasks.len(), 1);
        assert!(snap.bots.iter().all(|b| b.last_updated == 0));
        assert_eq!(Snapshot::capture(&fleet, &queue).tick, 1);
    }

    #[test]
    fn snapshot_json_shape() {
        let fleet = Fleet::generate(2, &mut ChaCha8Rng::seed_from_u64(2), 0);
        let snap = Snapshot::capture(&fleet, &TaskQueue::new());
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["tick"], 0);
        assert_eq!(json["bots"].as_array().unwrap().len(), 2);
        assert!(json["tasks"].as_array().unwrap().is_empty());
    }
}
