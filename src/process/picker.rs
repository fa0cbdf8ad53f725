/*!
 * Resource Picker
 * Chooses the resource type an actor names on each request tick
 */

use super::types::RequestPolicy;
use crate::core::id::ResourceId;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

pub struct ResourcePicker {
    policy: RequestPolicy,
    cursor: usize,
    rng: StdRng,
}

impl ResourcePicker {
    pub fn new(policy: RequestPolicy, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            policy,
            cursor: 0,
            rng,
        }
    }

    /// Next type to request among `registered`; `None` if nothing fits
    pub fn pick(&mut self, registered: &[ResourceId]) -> Option<ResourceId> {
        match &self.policy {
            RequestPolicy::Random => registered.choose(&mut self.rng).copied(),
            RequestPolicy::Cycle(order) => {
                // skip entries that are not registered (yet)
                for _ in 0..order.len() {
                    let candidate = order[self.cursor % order.len()];
                    self.cursor = (self.cursor + 1) % order.len();
                    if registered.contains(&candidate) {
                        return Some(candidate);
                    }
                }
                None
            }
        }
    }
}
