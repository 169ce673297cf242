use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Source of random orderings for the design generators.
pub trait PermutationSource {
    /// A random ordering of `0..len`.
    fn permutation(&mut self, len: usize) -> Vec<usize>;
}

impl<P: PermutationSource + ?Sized> PermutationSource for &mut P {
    fn permutation(&mut self, len: usize) -> Vec<usize> {
        (**self).permutation(len)
    }
}

/// `items` in a freshly drawn random order.
pub fn permuted<T: Clone, P: PermutationSource + ?Sized>(source: &mut P, items: &[T]) -> Vec<T> {
    source
        .permutation(items.len())
        .into_iter()
        .map(|i| items[i].clone())
        .collect()
}

/// Move `items` into the order given by `order`, a permutation of their indices.
pub fn reorder<T>(items: Vec<T>, order: &[usize]) -> Vec<T> {
    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    order.iter().filter_map(|&i| slots.get_mut(i)?.take()).collect()
}

/// Fisher-Yates permutations driven by any `rand` generator.
#[derive(Debug, Clone)]
pub struct RandomPermutations<R: Rng> {
    rng: R,
}

impl<R: Rng> RandomPermutations<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RandomPermutations<StdRng> {
    /// Same seed, same sequence of permutations.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> PermutationSource for RandomPermutations<R> {
    fn permutation(&mut self, len: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..len).collect();
        order.shuffle(&mut self.rng);
        order
    }
}
