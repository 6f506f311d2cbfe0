//! Reductions.
//!
//! [`Reducer`] is lazy: each element folds the reduced axes of its operand
//! when it is read. [`reduce`], [`sum`] and [`prod`] fold a whole expression
//! eagerly; [`sum`] accumulates packed storage in lane-sized batches.

use std::ops::{Add, Mul};

use num_traits::{One, Zero};
use smallvec::{smallvec, SmallVec};

use crate::cast::Element;
use crate::expression::{contiguous_slice, resolved_shape, Expression, IntoOperand};
use crate::layout::Layout;
use crate::simd::sum_slice;
use crate::stepper::{Steppable, Stepper};
use crate::strides::unravel_index;
use crate::{Result, StridedError};

type Dims = SmallVec<[usize; 8]>;

// ============================================================================
// Eager
// ============================================================================

/// Fold `map_fn(x)` over every element of `e` in row-major order.
///
/// # Errors
///
/// Broadcast errors recorded in `e`.
pub fn reduce<E, M, R, U>(e: &E, map_fn: M, reduce_fn: R, init: U) -> Result<U>
where
    E: Expression,
    M: Fn(E::Elem) -> U,
    R: Fn(U, U) -> U,
{
    resolved_shape(e)?;
    let row_ordered = matches!(e.layout(), Layout::RowMajor | Layout::Any);
    if let Some(data) = contiguous_slice(e).filter(|_| row_ordered) {
        return Ok(data.iter().fold(init, |acc, &x| reduce_fn(acc, map_fn(x))));
    }
    Ok(e.iter().fold(init, |acc, x| reduce_fn(acc, map_fn(x))))
}

/// Sum of all elements. Zero for an empty expression.
pub fn sum<E>(e: &E) -> Result<E::Elem>
where
    E: Expression,
    E::Elem: Element + Zero + Add<Output = E::Elem>,
{
    resolved_shape(e)?;
    if let Some(data) = contiguous_slice(e) {
        return Ok(sum_slice(data));
    }
    Ok(e.iter().fold(E::Elem::zero(), |acc, x| acc + x))
}

/// Product of all elements. One for an empty expression.
pub fn prod<E>(e: &E) -> Result<E::Elem>
where
    E: Expression,
    E::Elem: One + Mul<Output = E::Elem>,
{
    reduce(e, |x| x, |a, b| a * b, E::Elem::one())
}

// ============================================================================
// Lazy
// ============================================================================

/// Lazy reduction of `expr` over `axes`.
///
/// The result has the operand's shape with the reduced axes removed. Every
/// read folds `f(acc, x)` from `init` over the reduced coordinates, last
/// axis fastest.
#[derive(Clone)]
pub struct Reducer<E: Expression, F> {
    expr: E,
    f: F,
    init: E::Elem,
    axes: Dims,
    in_shape: Dims,
    shape: Dims,
}

/// Reduce `e` over `axes` with `f`, starting every fold from `init`.
///
/// # Errors
///
/// [`StridedError::InvalidAxis`] if an axis is not below the rank of `e`.
pub fn reduce_axes<E, F>(e: E, axes: &[usize], init: E::Elem, f: F) -> Result<Reducer<E, F>>
where
    E: Expression,
    F: Fn(E::Elem, E::Elem) -> E::Elem,
{
    let in_shape = resolved_shape(&e)?;
    let rank = in_shape.len();
    let mut sorted: Dims = SmallVec::from_slice(axes);
    if let Some(&axis) = sorted.iter().find(|&&a| a >= rank) {
        return Err(StridedError::InvalidAxis { axis, rank });
    }
    sorted.sort_unstable();
    sorted.dedup();
    let shape = (0..rank)
        .filter(|d| !sorted.contains(d))
        .map(|d| in_shape[d])
        .collect();
    Ok(Reducer {
        expr: e,
        f,
        init,
        axes: sorted,
        in_shape,
        shape,
    })
}

pub fn sum_axes<E>(e: E, axes: &[usize]) -> Result<Reducer<E, fn(E::Elem, E::Elem) -> E::Elem>>
where
    E: Expression,
    E::Elem: Zero + Add<Output = E::Elem>,
{
    reduce_axes(e, axes, E::Elem::zero(), plus::<E::Elem> as fn(_, _) -> _)
}

pub fn prod_axes<E>(e: E, axes: &[usize]) -> Result<Reducer<E, fn(E::Elem, E::Elem) -> E::Elem>>
where
    E: Expression,
    E::Elem: One + Mul<Output = E::Elem>,
{
    reduce_axes(e, axes, E::Elem::one(), times::<E::Elem> as fn(_, _) -> _)
}

fn plus<T: Add<Output = T>>(a: T, b: T) -> T {
    a + b
}

fn times<T: Mul<Output = T>>(a: T, b: T) -> T {
    a * b
}

impl<E, F> Reducer<E, F>
where
    E: Expression,
    F: Fn(E::Elem, E::Elem) -> E::Elem,
{
    /// Reduced axes, sorted.
    pub fn axes(&self) -> &[usize] {
        &self.axes
    }

    /// `index` must be a full index into the output shape.
    fn fold_at(&self, index: &[usize]) -> E::Elem {
        let rank = self.in_shape.len();
        let mut full: Dims = smallvec![0; rank];
        let mut kept = index.iter();
        for d in 0..rank {
            if !self.axes.contains(&d) {
                full[d] = kept.next().copied().unwrap_or(0);
            }
        }
        let count: usize = self.axes.iter().map(|&d| self.in_shape[d]).product();
        let mut acc = self.init;
        for _ in 0..count {
            acc = (self.f)(acc, self.expr.get(&full));
            for &d in self.axes.iter().rev() {
                full[d] += 1;
                if full[d] < self.in_shape[d] {
                    break;
                }
                full[d] = 0;
            }
        }
        acc
    }

    /// Right-aligns `index` against the output shape and clamps broadcast
    /// coordinates.
    fn normalize(&self, index: &[usize]) -> Dims {
        let n = self.shape.len();
        let mut out: Dims = smallvec![0; n];
        let skip = index.len().saturating_sub(n);
        let pad = n.saturating_sub(index.len());
        for (k, &i) in index[skip..].iter().enumerate() {
            let d = pad + k;
            out[d] = if self.shape[d] == 1 { 0 } else { i };
        }
        out
    }
}

impl<E, F> Expression for Reducer<E, F>
where
    E: Expression,
    F: Fn(E::Elem, E::Elem) -> E::Elem,
{
    type Elem = E::Elem;
    type Tag = E::Tag;
    type Stepper<'a> = ReducerStepper<'a, E, F> where Self: 'a;

    const STATIC_LAYOUT: Layout = Layout::RowMajor;
    const CONTIGUOUS_LAYOUT: bool = false;
    const STRIDED_LOOP: bool = false;

    #[inline]
    fn shape(&self) -> &[usize] {
        &self.shape
    }
    fn layout(&self) -> Layout {
        Layout::RowMajor
    }
    fn is_contiguous(&self) -> bool {
        false
    }
    fn get(&self, index: &[usize]) -> E::Elem {
        self.fold_at(&self.normalize(index))
    }
    fn has_linear_assign(&self, _strides: &[isize]) -> bool {
        false
    }
    fn linear_get(&self, i: usize) -> E::Elem {
        let mut index: Dims = smallvec![0; self.shape.len()];
        unravel_index(i, &self.shape, Layout::RowMajor, &mut index);
        self.fold_at(&index)
    }
    fn stepper_begin(&self, shape: &[usize]) -> ReducerStepper<'_, E, F> {
        ReducerStepper {
            reducer: self,
            index: smallvec![0; self.shape.len()],
            dim_offset: shape.len().saturating_sub(self.shape.len()),
            at_end: false,
        }
    }
}

impl<E, F> IntoOperand for Reducer<E, F>
where
    E: Expression,
    F: Fn(E::Elem, E::Elem) -> E::Elem,
{
    type Operand = Self;

    #[inline]
    fn into_operand(self) -> Self {
        self
    }
}

/// Stepper of a [`Reducer`]: tracks the output index and folds on read.
pub struct ReducerStepper<'a, E: Expression, F> {
    reducer: &'a Reducer<E, F>,
    index: Dims,
    dim_offset: usize,
    at_end: bool,
}

impl<E: Expression, F> ReducerStepper<'_, E, F> {
    #[inline]
    fn local(&self, dim: usize) -> Option<usize> {
        let d = dim.checked_sub(self.dim_offset)?;
        (self.reducer.shape[d] != 1).then_some(d)
    }
}

impl<E: Expression, F> PartialEq for ReducerStepper<'_, E, F> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.reducer, other.reducer)
            && self.at_end == other.at_end
            && self.index == other.index
    }
}

impl<E: Expression, F> Steppable for ReducerStepper<'_, E, F> {
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
            self.index[d] = self.reducer.shape[d].saturating_sub(1);
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

impl<E, F> Stepper for ReducerStepper<'_, E, F>
where
    E: Expression,
    F: Fn(E::Elem, E::Elem) -> E::Elem,
{
    type Elem = E::Elem;

    #[inline]
    fn get(&self) -> E::Elem {
        self.reducer.fold_at(&self.index)
    }

    #[inline]
    fn step_leading(&mut self) {
        if let Some(last) = self.index.len().checked_sub(1) {
            self.index[last] += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ColumnMajor;
    use crate::{all, dynamic_view, range_step, Array};
    use approx::assert_relative_eq;

    fn grid() -> Array<i64> {
        Array::from_shape_vec(&[2, 3], (1..=6).collect()).unwrap()
    }

    #[test]
    fn test_sum_axes() {
        let a = grid();
        let rows = Array::<i64>::from_expr(&sum_axes(&a, &[1]).unwrap()).unwrap();
        assert_eq!(rows.shape(), &[2]);
        assert_eq!(rows.as_slice(), &[6, 15]);
        let cols = Array::<i64>::from_expr(&sum_axes(&a, &[0]).unwrap()).unwrap();
        assert_eq!(cols.as_slice(), &[5, 7, 9]);
        let all_axes = sum_axes(&a, &[1, 0, 1]).unwrap();
        assert_eq!(all_axes.shape(), &[] as &[usize]);
        assert_eq!(all_axes.get(&[]), 21);
    }

    #[test]
    fn test_reduce_axes_custom_fold() {
        let a = Array::<_>::from_shape_vec(&[2, 2, 2], vec![3, 1, 4, 1, 5, 9, 2, 6]).unwrap();
        let m = reduce_axes(&a, &[0, 2], i32::MIN, |x: i32, y: i32| x.max(y)).unwrap();
        assert_eq!(m.iter().collect::<Vec<_>>(), vec![9, 6]);
    }

    #[test]
    fn test_reduce_axes_invalid_axis() {
        let a = grid();
        assert!(matches!(
            sum_axes(&a, &[2]),
            Err(StridedError::InvalidAxis { axis: 2, rank: 2 })
        ));
    }

    #[test]
    fn test_reducer_in_expression() {
        let a = grid();
        let totals = prod_axes(&a, &[0]).unwrap();
        let shifted = Array::<i64>::from_expr(&(&totals + 1i64)).unwrap();
        assert_eq!(shifted.as_slice(), &[5, 11, 19]);
    }

    #[test]
    fn test_eager_sum_paths_agree() {
        let a = Array::<_>::from_fn(&[7, 9], |i| (i[0] * 9 + i[1]) as f64 * 0.5);
        let c = Array::<f64, ColumnMajor>::from_fn(&[7, 9], |i| (i[0] * 9 + i[1]) as f64 * 0.5);
        let expected = (0..63).map(|x| x as f64 * 0.5).sum::<f64>();
        assert_relative_eq!(sum(&a).unwrap(), expected);
        assert_relative_eq!(sum(&c).unwrap(), expected);
        let strided = dynamic_view(&a, &[range_step(0, 7, 2), all()]).unwrap();
        let strided_expected = (0..7)
            .step_by(2)
            .flat_map(|r| (0..9).map(move |c| (r * 9 + c) as f64 * 0.5))
            .sum::<f64>();
        assert_relative_eq!(sum(&strided).unwrap(), strided_expected);
    }

    #[test]
    fn test_prod_and_reduce() {
        let a = grid();
        assert_eq!(prod(&a).unwrap(), 720);
        let squares = reduce(&a, |x| x * x, |p, q| p + q, 0).unwrap();
        assert_eq!(squares, 91);
        let empty = Array::<i64>::zeros(&[0, 3]);
        assert_eq!(sum(&empty).unwrap(), 0);
        assert_eq!(prod(&empty).unwrap(), 1);
    }

    #[test]
    fn test_reduce_visits_column_major_in_row_order() {
        let c = Array::<i32, ColumnMajor>::from_fn(&[2, 2], |i| (i[0] * 2 + i[1]) as i32);
        let order = reduce(&c, |x| vec![x], |mut p, q| {
            p.extend(q);
            p
        }, Vec::new())
        .unwrap();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }
}
