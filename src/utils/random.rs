use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Shared random source for sampling and shuffling. Seeded sources replay the
/// same draws, which is what tests rely on.
#[derive(Debug)]
pub struct RandomSource {
    rng: Mutex<StdRng>,
}

impl RandomSource {
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

    pub fn from_optional_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }

    pub fn with_rng<R>(&self, f: impl FnOnce(&mut StdRng) -> R) -> R {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;

    #[test]
    fn same_seed_same_shuffle() {
        let shuffle = |src: &RandomSource| {
            let mut v: Vec<u32> = (0..20).collect();
            src.with_rng(|rng| v.shuffle(rng));
            v
        };
        assert_eq!(shuffle(&RandomSource::seeded(7)), shuffle(&RandomSource::seeded(7)));
    }
}
