//! Node selection for parity placement and fault injection
//!
//! All randomness in the store goes through a `Placement`, so tests can pin
//! down which nodes hold parity and which nodes a fault lands on.

use crate::domain::NodeId;
use crate::generator::CHECK_COUNT;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

/// Source of node choices for the object store
pub trait Placement: Send {
    /// Pick the parity nodes for a new object out of `0..node_count`
    fn parity_nodes(&mut self, node_count: usize) -> [NodeId; CHECK_COUNT];

    /// Pick `count` distinct nodes out of `candidates`
    ///
    /// Callers guarantee `count <= candidates.len()`.
    fn victims(&mut self, candidates: &[NodeId], count: usize) -> Vec<NodeId>;
}

/// Uniformly random choices
pub struct RandomPlacement<R = StdRng> {
    rng: R,
}

impl RandomPlacement<StdRng> {
    /// Seeded from operating system entropy
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_os_rng())
    }

    /// Reproducible choices from a fixed seed
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> RandomPlacement<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng + Send> Placement for RandomPlacement<R> {
    fn parity_nodes(&mut self, node_count: usize) -> [NodeId; CHECK_COUNT] {
        let picks = index::sample(&mut self.rng, node_count, CHECK_COUNT);
        [NodeId::new(picks.index(0)), NodeId::new(picks.index(1))]
    }

    fn victims(&mut self, candidates: &[NodeId], count: usize) -> Vec<NodeId> {
        index::sample(&mut self.rng, candidates.len(), count)
            .iter()
            .map(|i| candidates[i])
            .collect()
    }
}

/// Deterministic choices: fixed parity nodes, victims taken from one end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPlacement {
    parity: [NodeId; CHECK_COUNT],
    from_back: bool,
}

impl FixedPlacement {
    /// Parity on `first` and `second`; faults hit the lowest positions first
    pub fn new(first: usize, second: usize) -> Self {
        Self {
            parity: [NodeId::new(first), NodeId::new(second)],
            from_back: false,
        }
    }

    /// Take fault victims from the highest positions instead
    pub fn victims_from_back(mut self) -> Self {
        self.from_back = true;
        self
    }
}

impl Placement for FixedPlacement {
    fn parity_nodes(&mut self, _node_count: usize) -> [NodeId; CHECK_COUNT] {
        self.parity
    }

    fn victims(&mut self, candidates: &[NodeId], count: usize) -> Vec<NodeId> {
        if self.from_back {
            candidates.iter().rev().take(count).copied().collect()
        } else {
            candidates.iter().take(count).copied().collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_parity_nodes_are_distinct() {
        let mut placement = RandomPlacement::seeded(42);
        for _ in 0..100 {
            let [a, b] = placement.parity_nodes(5);
            assert_ne!(a, b);
            assert!(a.as_usize() < 5 && b.as_usize() < 5);
        }
    }

    #[test]
    fn test_seeded_placement_is_reproducible() {
        let mut first = RandomPlacement::seeded(7);
        let mut second = RandomPlacement::seeded(7);
        for _ in 0..10 {
            assert_eq!(first.parity_nodes(9), second.parity_nodes(9));
        }
    }

    #[test]
    fn test_random_victims() {
        let mut placement = RandomPlacement::seeded(3);
        let candidates: Vec<NodeId> = (10..15).map(NodeId::new).collect();
        let victims = placement.victims(&candidates, 3);

        assert_eq!(victims.len(), 3);
        for victim in &victims {
            assert!(candidates.contains(victim));
        }
        let mut unique = victims.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn test_fixed_placement() {
        let candidates: Vec<NodeId> = (0..4).map(NodeId::new).collect();

        let mut front = FixedPlacement::new(1, 4);
        assert_eq!(front.parity_nodes(5), [NodeId::new(1), NodeId::new(4)]);
        assert_eq!(front.victims(&candidates, 2), vec![NodeId::new(0), NodeId::new(1)]);

        let mut back = FixedPlacement::new(1, 4).victims_from_back();
        assert_eq!(back.victims(&candidates, 1), vec![NodeId::new(3)]);
    }
}
