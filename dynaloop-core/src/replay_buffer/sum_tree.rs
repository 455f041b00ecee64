//! Sum tree for prioritized sampling over a fixed number of slots.
use segment_tree::{ops::MaxIgnoreNaN, SegmentPoint};

const EPS: f64 = 1e-8;

/// Binary tree whose leaves hold slot weights and inner nodes their sums.
///
/// A slot with weight zero is never sampled, which is how free slots are
/// represented.
#[derive(Debug)]
pub struct SumTree {
    alpha: f32,
    capacity: usize,
    tree: Vec<f64>,
    max_tree: SegmentPoint<f32, MaxIgnoreNaN>,
}

impl SumTree {
    pub fn new(capacity: usize, alpha: f32) -> Self {
        debug_assert!(capacity > 0);
        Self {
            alpha,
            capacity,
            tree: vec![0f64; 2 * capacity - 1],
            max_tree: SegmentPoint::build(vec![0f32; capacity], MaxIgnoreNaN),
        }
    }

    /// Recomputes the sums on the path from a leaf to the root.
    ///
    /// Sums are rebuilt from children rather than adjusted by deltas so that a
    /// subtree of free slots sums to exactly zero.
    fn propagate(&mut self, mut ix: usize) {
        while ix > 0 {
            let parent = (ix - 1) / 2;
            self.tree[parent] = self.tree[2 * parent + 1] + self.tree[2 * parent + 2];
            ix = parent;
        }
    }

    fn retrieve(&self, mut ix: usize, mut s: f64) -> usize {
        loop {
            let left = 2 * ix + 1;
            let right = left + 1;
            if left >= self.tree.len() {
                return ix;
            }
            let go_left = (s <= self.tree[left] && self.tree[left] > 0.0) || self.tree[right] <= 0.0;
            if go_left {
                ix = left;
            } else {
                s -= self.tree[left];
                ix = right;
            }
        }
    }

    /// Sum of all weights.
    pub fn total(&self) -> f64 {
        self.tree[0]
    }

    /// Largest raw priority currently stored.
    pub fn max(&self) -> f32 {
        self.max_tree.query(0, self.capacity)
    }

    /// Sets the priority of a slot. The stored weight is `(p + eps)^alpha`.
    pub fn update(&mut self, slot: usize, p: f32) {
        debug_assert!(slot < self.capacity);
        let p = p.max(0.0);
        let w = (p as f64 + EPS).powf(self.alpha as f64);
        self.max_tree.modify(slot, p);
        let ix = slot + self.capacity - 1;
        self.tree[ix] = w;
        self.propagate(ix);
    }

    /// Frees a slot so that it is never sampled.
    pub fn clear(&mut self, slot: usize) {
        debug_assert!(slot < self.capacity);
        self.max_tree.modify(slot, 0.0);
        let ix = slot + self.capacity - 1;
        self.tree[ix] = 0.0;
        self.propagate(ix);
    }

    /// Weight of a slot.
    pub fn weight(&self, slot: usize) -> f64 {
        self.tree[slot + self.capacity - 1]
    }

    /// Slot at cumulative weight `s`, `0 < s <= total()`.
    pub fn get(&self, s: f64) -> usize {
        let ix = self.retrieve(0, s);
        debug_assert!(ix >= (self.capacity - 1));
        ix + 1 - self.capacity
    }

    /// Draws a slot in proportion to its weight, given `u` uniform in `[0, 1)`.
    pub fn sample(&self, u: f64) -> usize {
        self.get(self.total() * (1.0 - u))
    }
}

#[cfg(test)]
mod tests {
    use super::SumTree;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn test_sum_tree_prefix() {
        let data = vec![0.5f32, 0.2, 0.8, 0.3, 1.1, 2.5, 3.9];
        let mut sum_tree = SumTree::new(8, 1.0);
        for ix in 0..data.len() {
            sum_tree.update(ix, data[ix]);
        }

        assert_eq!(sum_tree.get(0.4), 0);
        assert_eq!(sum_tree.get(0.5), 0);
        assert_eq!(sum_tree.get(0.6), 1);
        assert_eq!(sum_tree.get(1.2), 2);
        assert_eq!(sum_tree.get(1.6), 3);
        assert_eq!(sum_tree.get(2.0), 4);
        assert_eq!(sum_tree.get(2.8), 4);
        assert_eq!(sum_tree.max(), 3.9);
    }

    #[test]
    fn test_cleared_slots_are_never_sampled() {
        let mut sum_tree = SumTree::new(5, 1.0);
        for ix in 0..5 {
            sum_tree.update(ix, 1.0);
        }
        sum_tree.clear(0);
        sum_tree.clear(3);
        assert_eq!(sum_tree.max(), 1.0);

        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..10_000 {
            let slot = sum_tree.sample(rng.gen());
            assert!(slot != 0 && slot != 3 && slot < 5, "slot {}", slot);
        }
        let slot = sum_tree.sample(0.999_999_9);
        assert!(slot != 0 && slot != 3);
    }

    #[test]
    fn test_sampling_frequency() {
        let data = [1.0f32, 2.0, 3.0, 4.0];
        let mut sum_tree = SumTree::new(6, 1.0);
        for (ix, p) in data.iter().enumerate() {
            sum_tree.update(ix, *p);
        }
        let mut rng = StdRng::seed_from_u64(1);
        let n = 100_000;
        let mut counts = [0usize; 6];
        for _ in 0..n {
            counts[sum_tree.sample(rng.gen())] += 1;
        }
        for (ix, p) in data.iter().enumerate() {
            let expected = *p as f64 / 10.0;
            let freq = counts[ix] as f64 / n as f64;
            assert!((freq - expected).abs() < 0.01, "{} {}", freq, expected);
        }
        assert_eq!(counts[4] + counts[5], 0);
    }
}
