//! Deterministic random number generation.
//!
//! RULE: Nothing in the pipeline may call any platform RNG.
//! All randomness flows through StageRng instances derived from the
//! seeds in PipelineConfig.
//!
//! Each stage gets its own RNG stream, seeded deterministically from
//! (stage_seed XOR slot_index). This means:
//!   - Adding a new stage never changes existing stages' streams.
//!   - Each stage's stream is fully reproducible in isolation.

use crate::config::SeedConfig;
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

/// A named, deterministic RNG for a single pipeline stage.
pub struct StageRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl StageRng {
    /// Create a stage RNG from a seed and a stable slot index.
    /// The index must never change once assigned.
    pub fn new(seed: u64, slot_index: u64) -> Self {
        let derived_seed = seed ^ (slot_index.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        Self {
            name: "unnamed",
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        use rand::RngCore;
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Draw a raw u64 (full range).
    pub fn next_u64(&mut self) -> u64 {
        use rand::RngCore;
        self.inner.next_u64()
    }

    /// Roll an index in [0, n).
    pub fn index_below(&mut self, n: usize) -> usize {
        use rand::RngCore;
        assert!(n > 0, "n must be > 0");
        (self.inner.next_u64() % n as u64) as usize
    }

    /// Fisher-Yates shuffle in place.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.index_below(i + 1);
            items.swap(i, j);
        }
    }

    /// Derive an independent child stream, e.g. one per tree.
    pub fn fork(&mut self, name: &'static str) -> StageRng {
        StageRng {
            name,
            inner: Pcg64Mcg::seed_from_u64(self.next_u64()),
        }
    }
}

/// All stage RNGs for a single run, indexed by stable slot.
pub struct RngBank {
    seeds: SeedConfig,
}

impl RngBank {
    pub fn new(seeds: SeedConfig) -> Self {
        Self { seeds }
    }

    pub fn for_stage(&self, slot: StageSlot) -> StageRng {
        let seed = match slot {
            StageSlot::Split      => self.seeds.split,
            StageSlot::Forest     => self.seeds.forest,
            StageSlot::Clustering => self.seeds.clustering,
        };
        StageRng::new(seed, slot as u64).with_name(slot.name())
    }
}

/// Stable stage slot assignments.
/// NEVER reorder or remove entries. Only append.
/// Reordering changes every stage's seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum StageSlot {
    Split = 0,
    Forest = 1,
    Clustering = 2,
}

impl StageSlot {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Split      => "split",
            Self::Forest     => "forest",
            Self::Clustering => "clustering",
        }
    }
}
