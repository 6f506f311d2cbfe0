//! Generator nodes: values computed from the logical index alone.

use num_traits::{Float, Num, NumCast, One, ToPrimitive, Zero};
use smallvec::{smallvec, SmallVec};

use crate::expression::{Expression, IntoOperand};
use crate::layout::Layout;
use crate::stepper::{Steppable, Stepper};
use crate::strides::unravel_index;
use crate::tags::TensorTag;

/// Function from a multi-index to a value.
pub trait GeneratorFn {
    type Output: Copy;

    fn generate(&self, index: &[usize]) -> Self::Output;
}

impl<F, T> GeneratorFn for F
where
    F: Fn(&[usize]) -> T,
    T: Copy,
{
    type Output = T;

    #[inline]
    fn generate(&self, index: &[usize]) -> T {
        self(index)
    }
}

/// Expression whose element at `index` is `f(index)`.
///
/// Coordinates along size-1 dimensions are clamped to 0 before `f` is
/// called, so a generator can be broadcast against a larger shape without
/// `f` knowing about broadcasting.
#[derive(Clone, Debug)]
pub struct Generator<F> {
    f: F,
    shape: SmallVec<[usize; 8]>,
}

impl<F: GeneratorFn> Generator<F> {
    pub fn new(shape: &[usize], f: F) -> Self {
        Self {
            f,
            shape: SmallVec::from_slice(shape),
        }
    }

    /// Right-aligns `index` against the shape and clamps broadcast coordinates.
    fn normalize(&self, index: &[usize]) -> SmallVec<[usize; 8]> {
        let n = self.shape.len();
        let mut out: SmallVec<[usize; 8]> = smallvec![0; n];
        let skip = index.len().saturating_sub(n);
        let pad = n.saturating_sub(index.len());
        for (k, &i) in index[skip..].iter().enumerate() {
            let d = pad + k;
            out[d] = if self.shape[d] == 1 { 0 } else { i };
        }
        out
    }
}

impl<F: GeneratorFn> Expression for Generator<F> {
    type Elem = F::Output;
    type Tag = TensorTag;
    type Stepper<'a> = GeneratorStepper<'a, F> where Self: 'a;

    const STATIC_LAYOUT: Layout = Layout::RowMajor;
    const CONTIGUOUS_LAYOUT: bool = false;
    const STRIDED_LOOP: bool = false;

    #[inline]
    fn shape(&self) -> &[usize] {
        &self.shape
    }
    #[inline]
    fn layout(&self) -> Layout {
        Layout::RowMajor
    }
    #[inline]
    fn is_contiguous(&self) -> bool {
        false
    }
    fn get(&self, index: &[usize]) -> F::Output {
        self.f.generate(&self.normalize(index))
    }
    #[inline]
    fn has_linear_assign(&self, _strides: &[isize]) -> bool {
        false
    }
    /// Row-major flat position.
    fn linear_get(&self, i: usize) -> F::Output {
        let mut index: SmallVec<[usize; 8]> = smallvec![0; self.shape.len()];
        unravel_index(i, &self.shape, Layout::RowMajor, &mut index);
        self.f.generate(&index)
    }
    fn stepper_begin(&self, shape: &[usize]) -> GeneratorStepper<'_, F> {
        GeneratorStepper {
            f: &self.f,
            shape: &self.shape,
            index: smallvec![0; self.shape.len()],
            dim_offset: shape.len().saturating_sub(self.shape.len()),
            at_end: false,
        }
    }
}

impl<F: GeneratorFn> IntoOperand for Generator<F> {
    type Operand = Self;

    #[inline]
    fn into_operand(self) -> Self {
        self
    }
}

/// Stepper of a [`Generator`]: tracks the logical index.
pub struct GeneratorStepper<'a, F> {
    f: &'a F,
    shape: &'a [usize],
    index: SmallVec<[usize; 8]>,
    dim_offset: usize,
    at_end: bool,
}

impl<F> GeneratorStepper<'_, F> {
    #[inline]
    fn local(&self, dim: usize) -> Option<usize> {
        let d = dim.checked_sub(self.dim_offset)?;
        (self.shape[d] != 1).then_some(d)
    }
}

impl<F> PartialEq for GeneratorStepper<'_, F> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.f, other.f) && self.at_end == other.at_end && self.index == other.index
    }
}

impl<F> Steppable for GeneratorStepper<'_, F> {
    #[inline]
    fn step(&mut self, dim: usize, n: usize) {
        if let Some(d) = self.local(dim) {
            self.index[d] += n;
        }
    }
    #[inline]
    fn step_back(&mut self, dim: usize, n: usize) {
        if let Some(d) = self.local(dim) {
            self.index[d] -= n;
        }
    }
    #[inline]
    fn reset(&mut self, dim: usize) {
        if let Some(d) = self.local(dim) {
            self.index[d] = 0;
        }
    }
    #[inline]
    fn reset_back(&mut self, dim: usize) {
        if let Some(d) = self.local(dim) {
            self.index[d] = self.shape[d].saturating_sub(1);
        }
    }
    #[inline]
    fn to_begin(&mut self) {
        self.index.iter_mut().for_each(|i| *i = 0);
        self.at_end = false;
    }
    fn to_end(&mut self, _layout: Layout) {
        self.index.iter_mut().for_each(|i| *i = 0);
        self.at_end = true;
    }
}

impl<F: GeneratorFn> Stepper for GeneratorStepper<'_, F> {
    type Elem = F::Output;

    #[inline]
    fn get(&self) -> F::Output {
        self.f.generate(&self.index)
    }

    /// Generators are never part of a strided inner run; this steps the last
    /// dimension.
    #[inline]
    fn step_leading(&mut self) {
        if let Some(last) = self.index.len().checked_sub(1) {
            self.index[last] += 1;
        }
    }
}

// ============================================================================
// Builders
// ============================================================================

/// Generator of the given shape computing each element with `f`.
pub fn generate<T: Copy, F: Fn(&[usize]) -> T>(shape: &[usize], f: F) -> Generator<F> {
    Generator::new(shape, f)
}

/// Evenly spaced values `start, start + step, ...` below `stop`.
#[derive(Clone, Copy, Debug)]
pub struct Arange<T> {
    start: T,
    step: T,
}

impl<T: Num + NumCast + Copy> GeneratorFn for Arange<T> {
    type Output = T;

    #[inline]
    fn generate(&self, index: &[usize]) -> T {
        let i = index.last().copied().unwrap_or(0);
        let i: T = NumCast::from(i).unwrap_or_else(T::zero);
        self.start + i * self.step
    }
}

/// One-dimensional range `[start, stop)` with increment `step`.
///
/// A zero or wrong-signed `step` yields an empty range.
pub fn arange<T>(start: T, stop: T, step: T) -> Generator<Arange<T>>
where
    T: Num + NumCast + ToPrimitive + Copy,
{
    let len = match (start.to_f64(), stop.to_f64(), step.to_f64()) {
        (Some(a), Some(b), Some(s)) if s != 0.0 => ((b - a) / s).ceil().max(0.0) as usize,
        _ => 0,
    };
    Generator::new(&[len], Arange { start, step })
}

/// `num` evenly spaced samples over `[start, stop]` (or `[start, stop)`
/// without `endpoint`).
pub fn linspace<T: Float>(start: T, stop: T, num: usize, endpoint: bool) -> Generator<Arange<T>> {
    let intervals = if endpoint { num.saturating_sub(1) } else { num };
    let step = match T::from(intervals) {
        Some(n) if intervals > 0 => (stop - start) / n,
        _ => T::zero(),
    };
    Generator::new(&[num], Arange { start, step })
}

/// Ones on the `k`-th diagonal of an `n x n` matrix.
#[derive(Clone, Copy, Debug)]
pub struct Eye<T> {
    k: isize,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Zero + One + Copy> GeneratorFn for Eye<T> {
    type Output = T;

    #[inline]
    fn generate(&self, index: &[usize]) -> T {
        match index {
            [.., i, j] if *j as isize - *i as isize == self.k => T::one(),
            _ => T::zero(),
        }
    }
}

pub fn eye<T: Zero + One + Copy>(n: usize, k: isize) -> Generator<Eye<T>> {
    Generator::new(
        &[n, n],
        Eye {
            k,
            _marker: std::marker::PhantomData,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_generator_get_and_iter() {
        let g = generate(&[2, 3], |i: &[usize]| i[0] * 10 + i[1]);
        assert_eq!(g.get(&[1, 2]), 12);
        let values: Vec<usize> = g.iter().collect();
        assert_eq!(values, vec![0, 1, 2, 10, 11, 12]);
    }

    #[test]
    fn test_generator_clamps_unit_dims() {
        let g = generate(&[1, 3], |i: &[usize]| i[0] * 100 + i[1]);
        assert_eq!(g.get(&[5, 2]), 2);
        let values: Vec<usize> = crate::StepperIter::new(&g, &[2, 3], Layout::RowMajor).collect();
        assert_eq!(values, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_generator_linear_get_row_major() {
        let g = generate(&[2, 3], |i: &[usize]| i[0] * 10 + i[1]);
        assert_eq!(g.linear_get(4), 11);
    }

    #[test]
    fn test_arange() {
        let a = arange(0i32, 10, 3);
        assert_eq!(a.shape(), &[4]);
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![0, 3, 6, 9]);
        assert_eq!(arange(5i32, 0, 1).shape(), &[0]);
    }

    #[test]
    fn test_linspace() {
        let l = linspace(0.0f64, 1.0, 5, true);
        let v: Vec<f64> = l.iter().collect();
        assert_eq!(v.len(), 5);
        assert_relative_eq!(v[4], 1.0, epsilon = 1e-12);
        assert_relative_eq!(v[1], 0.25, epsilon = 1e-12);
        let open: Vec<f64> = linspace(0.0f64, 1.0, 4, false).iter().collect();
        assert_relative_eq!(open[3], 0.75, epsilon = 1e-12);
    }

    #[test]
    fn test_eye() {
        let e = eye::<f64>(3, 1);
        assert_eq!(e.get(&[0, 1]), 1.0);
        assert_eq!(e.get(&[1, 1]), 0.0);
        assert_eq!(e.iter().filter(|&x| x == 1.0).count(), 2);
    }
}
