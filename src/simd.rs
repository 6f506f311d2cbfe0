//! Runtime instruction-set dispatch for the vectorizable loops.
//!
//! Loops over element types with more than one lane per batch are run under
//! `pulp`'s detected architecture so the compiler can emit wide loads and
//! stores for them. Short loops and single-lane types skip the dispatch.

use std::ops::Add;

use num_traits::Zero;
use smallvec::{smallvec, SmallVec};

use crate::cast::Element;
use crate::SIMD_DISPATCH_THRESHOLD;

/// Whether a loop of `len` elements of `T` is worth dispatching.
#[inline]
pub(crate) const fn wants_dispatch<T: Element>(len: usize) -> bool {
    T::KIND.lanes() > 1 && len >= SIMD_DISPATCH_THRESHOLD
}

/// Runs `f` under the best available instruction set for `T`.
#[inline(always)]
pub(crate) fn dispatch_for<T: Element, R>(len: usize, f: impl FnOnce() -> R) -> R {
    #[cfg(feature = "simd")]
    if wants_dispatch::<T>(len) {
        return pulp::Arch::new().dispatch(f);
    }
    #[cfg(not(feature = "simd"))]
    let _ = len;
    f()
}

/// Sum of a packed slice, accumulated one batch of lanes at a time.
///
/// The per-lane partial sums are folded in lane order after the bulk, so
/// float results can differ from a left-to-right fold in the last bits.
pub(crate) fn sum_slice<T>(data: &[T]) -> T
where
    T: Element + Zero + Add<Output = T>,
{
    let lanes = T::KIND.lanes().max(1);
    dispatch_for::<T, _>(data.len(), || {
        let mut acc: SmallVec<[T; 32]> = smallvec![T::zero(); lanes];
        let mut batches = data.chunks_exact(lanes);
        for batch in &mut batches {
            for (a, &x) in acc.iter_mut().zip(batch) {
                *a = *a + x;
            }
        }
        let tail = batches.remainder().iter().fold(T::zero(), |s, &x| s + x);
        acc.into_iter().fold(T::zero(), |s, a| s + a) + tail
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use num_complex::Complex64;

    #[test]
    fn test_sum_slice_matches_fold() {
        let v: Vec<f64> = (0..1000).map(|i| i as f64 * 0.5).collect();
        let expected: f64 = v.iter().sum();
        assert_relative_eq!(sum_slice(&v), expected, max_relative = 1e-12);

        let ints: Vec<i32> = (1..=37).collect();
        assert_eq!(sum_slice(&ints), 703);
        assert_eq!(sum_slice::<u8>(&[]), 0);
    }

    #[test]
    fn test_sum_slice_complex() {
        let z = [Complex64::new(1.0, 2.0), Complex64::new(3.0, -1.0), Complex64::new(0.5, 0.5)];
        assert_eq!(sum_slice(&z), Complex64::new(4.5, 1.5));
    }

    #[test]
    fn test_dispatch_depends_on_lanes_and_length() {
        assert!(!wants_dispatch::<f64>(SIMD_DISPATCH_THRESHOLD - 1));
        assert!(wants_dispatch::<f64>(SIMD_DISPATCH_THRESHOLD));
        assert_eq!(Complex64::KIND.lanes(), 2);
        assert_eq!(dispatch_for::<f32, _>(10, || 3), 3);
        assert_eq!(dispatch_for::<f32, _>(1000, || 4), 4);
    }
}
