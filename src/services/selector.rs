use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use std::sync::{Mutex, PoisonError};

/// Picks reviewers uniformly at random without replacement.
///
/// The random source is owned by the selector so a fixed seed gives
/// reproducible selections.
pub struct ReviewerSelector {
    rng: Mutex<StdRng>,
}

impl ReviewerSelector {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn new(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::seeded)
    }

    /// Return `required` distinct candidates, or all of them (in order) when
    /// `required` is not smaller than the pool.
    pub fn select<T: Clone>(&self, candidates: &[T], required: usize) -> Vec<T> {
        if required >= candidates.len() {
            return candidates.to_vec();
        }

        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        index::sample(&mut *rng, candidates.len(), required)
            .into_iter()
            .map(|i| candidates[i].clone())
            .collect()
    }
}
