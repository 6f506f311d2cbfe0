//! Batch-parallel execution of the SIMD-linear bulk.
//!
//! The aligned middle of a linear assignment is cut into batches of `lanes`
//! elements. Above [`PARALLEL_THRESHOLD`](crate::PARALLEL_THRESHOLD)
//! elements, with the `parallel` feature, batches are spread over rayon
//! workers in chunks; otherwise they run in order on the current thread.

use crate::cast::Element;
use crate::simd;

#[cfg(feature = "parallel")]
use crate::PARALLEL_THRESHOLD;

// A bound that is `$bound` with the `parallel` feature and empty without it,
// so single-threaded builds accept `Rc`-capturing generators.
macro_rules! parallel_bound {
    ($(#[$doc:meta])* $name:ident: $bound:path) => {
        $(#[$doc])*
        #[cfg(feature = "parallel")]
        pub trait $name: $bound {}
        #[cfg(feature = "parallel")]
        impl<T: $bound + ?Sized> $name for T {}

        $(#[$doc])*
        #[cfg(not(feature = "parallel"))]
        pub trait $name {}
        #[cfg(not(feature = "parallel"))]
        impl<T: ?Sized> $name for T {}
    };
}

parallel_bound!(
    /// Destination elements handed to rayon workers.
    MaybeSend: Send
);
parallel_bound!(
    /// Source expressions read from rayon workers.
    MaybeSync: Sync
);

/// Calls `f(offset, batch)` for every `lanes`-sized batch of `dst`, where
/// `offset` is the position of the batch's first element in `dst`.
///
/// `dst.len()` must be a multiple of `lanes`.
pub(crate) fn for_each_batch<T, F>(dst: &mut [T], lanes: usize, f: F)
where
    T: Element + MaybeSend,
    F: Fn(usize, &mut [T]) + MaybeSync,
{
    debug_assert!(lanes > 0 && dst.len() % lanes == 0);

    #[cfg(feature = "parallel")]
    if dst.len() >= PARALLEL_THRESHOLD && rayon::current_num_threads() > 1 {
        use rayon::prelude::*;

        // Whole batches per task keep the split aligned.
        let per_task = (PARALLEL_THRESHOLD / 4 / lanes).max(1) * lanes;
        tracing::trace!(len = dst.len(), per_task, "splitting linear bulk across workers");
        dst.par_chunks_mut(per_task)
            .enumerate()
            .for_each(|(task, chunk)| {
                let base = task * per_task;
                simd::dispatch_for::<T, _>(chunk.len(), || run_batches(chunk, lanes, base, &f));
            });
        return;
    }

    let len = dst.len();
    simd::dispatch_for::<T, _>(len, || run_batches(dst, lanes, 0, &f));
}

#[inline(always)]
fn run_batches<T, F: Fn(usize, &mut [T])>(dst: &mut [T], lanes: usize, base: usize, f: &F) {
    for (k, batch) in dst.chunks_exact_mut(lanes).enumerate() {
        f(base + k * lanes, batch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_batch_visited_once() {
        let mut dst = vec![0usize; 64];
        for_each_batch(&mut dst, 8, |off, batch| {
            for (j, d) in batch.iter_mut().enumerate() {
                *d += off + j + 1;
            }
        });
        assert_eq!(dst, (1..=64).collect::<Vec<_>>());
    }

    #[test]
    fn test_large_input_offsets() {
        let n = (1 << 16) + 4 * 8;
        let mut dst = vec![0usize; n];
        for_each_batch(&mut dst, 4, |off, batch| {
            for (j, d) in batch.iter_mut().enumerate() {
                *d = off + j;
            }
        });
        assert!(dst.iter().enumerate().all(|(i, &v)| i == v));
    }

    #[test]
    fn test_expressions_satisfy_worker_bounds() {
        fn send<T: MaybeSend>() {}
        fn sync<T: MaybeSync>(_: &T) {}
        send::<num_complex::Complex<f32>>();
        let a = crate::Array::<f64>::zeros(&[2]);
        sync(&(&a + 1.0));
    }

    #[cfg(not(feature = "parallel"))]
    #[test]
    fn test_rc_generator_without_parallel() {
        use std::rc::Rc;
        fn check<T: MaybeSync>(_: &T) {}
        let table = Rc::new(vec![1.0, 2.0, 3.0]);
        let g = crate::generate(&[3], move |i: &[usize]| table[i[0]]);
        check(&g);
    }
}
