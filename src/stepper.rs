//! Steppers: per-dimension cursors over expressions.
//!
//! A stepper is bound to a target shape that may have more dimensions than
//! the expression it walks. The difference in rank is the stepper's
//! dimension offset; moving along a dimension below that offset does nothing.
//!
//! Steppers borrow their expression, so the expression cannot be reshaped
//! while one is alive.

use crate::layout::Layout;

/// Movement half of the stepper contract.
///
/// Tuples of [`Stepper`]s implement this by moving every element, which is
/// how composite expressions and (destination, source) pairs advance in
/// lockstep.
pub trait Steppable {
    /// Advance `n` positions along `dim`.
    fn step(&mut self, dim: usize, n: usize);
    /// Move back `n` positions along `dim`.
    fn step_back(&mut self, dim: usize, n: usize);
    /// Snap from the last position of `dim` back to its first.
    fn reset(&mut self, dim: usize);
    /// Snap from the first position of `dim` to its last.
    fn reset_back(&mut self, dim: usize);
    /// Return to the first element.
    fn to_begin(&mut self);
    /// Move past the last element in `layout` traversal order.
    fn to_end(&mut self, layout: Layout);
}

/// A cursor that can also read the element under it.
pub trait Stepper: Steppable + PartialEq {
    type Elem: Copy;

    fn get(&self) -> Self::Elem;

    /// Advance one position in the underlying flat storage.
    ///
    /// Only meaningful inside a contiguous inner run, where it is equivalent
    /// to stepping the innermost dimension.
    fn step_leading(&mut self);
}

/// A stepper over writable storage.
pub trait StepperMut: Stepper {
    fn set(&mut self, value: Self::Elem);
}

// ============================================================================
// Stride cursor
// ============================================================================

/// Position bookkeeping shared by every strided stepper.
///
/// Tracks a signed flat position that starts at `start` and moves by
/// `strides[dim - dim_offset]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrideCursor<'a> {
    strides: &'a [isize],
    backstrides: &'a [isize],
    start: isize,
    pos: isize,
    dim_offset: usize,
}

impl<'a> StrideCursor<'a> {
    /// Cursor over a buffer region of rank `strides.len()` walked with a
    /// target shape of rank `target_rank`.
    pub fn new(strides: &'a [isize], backstrides: &'a [isize], start: isize, target_rank: usize) -> Self {
        debug_assert_eq!(strides.len(), backstrides.len());
        debug_assert!(target_rank >= strides.len());
        Self {
            strides,
            backstrides,
            start,
            pos: start,
            dim_offset: target_rank.saturating_sub(strides.len()),
        }
    }

    #[inline]
    pub fn position(&self) -> isize {
        self.pos
    }

    #[inline]
    pub fn offset_index(&self) -> usize {
        debug_assert!(self.pos >= 0);
        self.pos as usize
    }

    /// Advance one position in flat storage.
    #[inline]
    pub fn step_leading(&mut self) {
        self.pos += 1;
    }

    #[inline]
    fn local(&self, dim: usize) -> Option<usize> {
        dim.checked_sub(self.dim_offset)
    }

    /// One past the last position, reached after a full traversal.
    fn end_position(&self) -> isize {
        self.start + self.backstrides.iter().sum::<isize>() + 1
    }
}

impl Steppable for StrideCursor<'_> {
    #[inline]
    fn step(&mut self, dim: usize, n: usize) {
        if let Some(d) = self.local(dim) {
            self.pos += n as isize * self.strides[d];
        }
    }

    #[inline]
    fn step_back(&mut self, dim: usize, n: usize) {
        if let Some(d) = self.local(dim) {
            self.pos -= n as isize * self.strides[d];
        }
    }

    #[inline]
    fn reset(&mut self, dim: usize) {
        if let Some(d) = self.local(dim) {
            self.pos -= self.backstrides[d];
        }
    }

    #[inline]
    fn reset_back(&mut self, dim: usize) {
        if let Some(d) = self.local(dim) {
            self.pos += self.backstrides[d];
        }
    }

    #[inline]
    fn to_begin(&mut self) {
        self.pos = self.start;
    }

    #[inline]
    fn to_end(&mut self, _layout: Layout) {
        self.pos = self.end_position();
    }
}

// ============================================================================
// Container steppers
// ============================================================================

/// Read-only stepper over a strided buffer.
#[derive(Debug, Clone)]
pub struct ContainerStepper<'a, T> {
    data: &'a [T],
    cursor: StrideCursor<'a>,
}

impl<'a, T> ContainerStepper<'a, T> {
    pub fn new(data: &'a [T], cursor: StrideCursor<'a>) -> Self {
        Self { data, cursor }
    }
}

impl<T> PartialEq for ContainerStepper<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.data.as_ptr(), other.data.as_ptr()) && self.cursor == other.cursor
    }
}

impl<T> Steppable for ContainerStepper<'_, T> {
    #[inline]
    fn step(&mut self, dim: usize, n: usize) {
        self.cursor.step(dim, n)
    }
    #[inline]
    fn step_back(&mut self, dim: usize, n: usize) {
        self.cursor.step_back(dim, n)
    }
    #[inline]
    fn reset(&mut self, dim: usize) {
        self.cursor.reset(dim)
    }
    #[inline]
    fn reset_back(&mut self, dim: usize) {
        self.cursor.reset_back(dim)
    }
    #[inline]
    fn to_begin(&mut self) {
        self.cursor.to_begin()
    }
    #[inline]
    fn to_end(&mut self, layout: Layout) {
        self.cursor.to_end(layout)
    }
}

impl<T: Copy> Stepper for ContainerStepper<'_, T> {
    type Elem = T;

    #[inline]
    fn get(&self) -> T {
        self.data[self.cursor.offset_index()]
    }

    #[inline]
    fn step_leading(&mut self) {
        self.cursor.step_leading();
    }
}

/// Writable stepper over a strided buffer.
#[derive(Debug)]
pub struct ContainerStepperMut<'a, T> {
    data: &'a mut [T],
    cursor: StrideCursor<'a>,
}

impl<'a, T> ContainerStepperMut<'a, T> {
    pub fn new(data: &'a mut [T], cursor: StrideCursor<'a>) -> Self {
        Self { data, cursor }
    }
}

impl<T> PartialEq for ContainerStepperMut<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.data.as_ptr(), other.data.as_ptr()) && self.cursor == other.cursor
    }
}

impl<T> Steppable for ContainerStepperMut<'_, T> {
    #[inline]
    fn step(&mut self, dim: usize, n: usize) {
        self.cursor.step(dim, n)
    }
    #[inline]
    fn step_back(&mut self, dim: usize, n: usize) {
        self.cursor.step_back(dim, n)
    }
    #[inline]
    fn reset(&mut self, dim: usize) {
        self.cursor.reset(dim)
    }
    #[inline]
    fn reset_back(&mut self, dim: usize) {
        self.cursor.reset_back(dim)
    }
    #[inline]
    fn to_begin(&mut self) {
        self.cursor.to_begin()
    }
    #[inline]
    fn to_end(&mut self, layout: Layout) {
        self.cursor.to_end(layout)
    }
}

impl<T: Copy> Stepper for ContainerStepperMut<'_, T> {
    type Elem = T;

    #[inline]
    fn get(&self) -> T {
        self.data[self.cursor.offset_index()]
    }

    #[inline]
    fn step_leading(&mut self) {
        self.cursor.step_leading();
    }
}

impl<T: Copy> StepperMut for ContainerStepperMut<'_, T> {
    #[inline]
    fn set(&mut self, value: T) {
        let i = self.cursor.offset_index();
        self.data[i] = value;
    }
}

// ============================================================================
// N-ary fan-out
// ============================================================================

/// A tuple of steppers read together.
pub trait StepperTuple: Steppable + PartialEq {
    type Elems;

    fn get(&self) -> Self::Elems;
    fn step_leading(&mut self);
}

macro_rules! impl_stepper_tuple {
    ($(($S:ident, $i:tt)),+) => {
        impl<$($S: Stepper),+> Steppable for ($($S,)+) {
            #[inline]
            fn step(&mut self, dim: usize, n: usize) {
                $(self.$i.step(dim, n);)+
            }
            #[inline]
            fn step_back(&mut self, dim: usize, n: usize) {
                $(self.$i.step_back(dim, n);)+
            }
            #[inline]
            fn reset(&mut self, dim: usize) {
                $(self.$i.reset(dim);)+
            }
            #[inline]
            fn reset_back(&mut self, dim: usize) {
                $(self.$i.reset_back(dim);)+
            }
            #[inline]
            fn to_begin(&mut self) {
                $(self.$i.to_begin();)+
            }
            #[inline]
            fn to_end(&mut self, layout: Layout) {
                $(self.$i.to_end(layout);)+
            }
        }

        impl<$($S: Stepper),+> StepperTuple for ($($S,)+) {
            type Elems = ($($S::Elem,)+);

            #[inline]
            fn get(&self) -> Self::Elems {
                ($(self.$i.get(),)+)
            }

            #[inline]
            fn step_leading(&mut self) {
                $(self.$i.step_leading();)+
            }
        }
    };
}

impl_stepper_tuple!((A, 0));
impl_stepper_tuple!((A, 0), (B, 1));
impl_stepper_tuple!((A, 0), (B, 1), (C, 2));
impl_stepper_tuple!((A, 0), (B, 1), (C, 2), (D, 3));
impl_stepper_tuple!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4));
impl_stepper_tuple!((A, 0), (B, 1), (C, 2), (D, 3), (E, 4), (F, 5));

// ============================================================================
// Odometer
// ============================================================================

/// Advance `stepper` to the next element of `shape` in `layout` order.
///
/// `index` holds the current multi-index and is updated in place. Dimensions
/// are scanned from the fastest-varying one: the first that has not reached
/// its last position is stepped and the scan stops; every dimension that
/// wraps is reset. When the slowest dimension wraps, the stepper is moved to
/// its end state and `index` ends up all zeros except for the slowest
/// dimension, which holds its size.
pub fn increment_stepper<S: Steppable + ?Sized>(
    stepper: &mut S,
    index: &mut [usize],
    shape: &[usize],
    layout: Layout,
) {
    let n = shape.len();
    let column_major = layout.is_column_major();
    for k in 0..n {
        let dim = if column_major { k } else { n - 1 - k };
        if index[dim] + 1 < shape[dim] {
            index[dim] += 1;
            stepper.step(dim, 1);
            return;
        }
        index[dim] = 0;
        if k + 1 < n {
            stepper.reset(dim);
        }
    }
    if n > 0 {
        let slowest = if column_major { n - 1 } else { 0 };
        index[slowest] = shape[slowest];
    }
    stepper.to_end(layout);
}

/// Inverse of [`increment_stepper`]. Stepping back from the first element
/// leaves the stepper at its first element.
pub fn decrement_stepper<S: Steppable + ?Sized>(
    stepper: &mut S,
    index: &mut [usize],
    shape: &[usize],
    layout: Layout,
) {
    let n = shape.len();
    let column_major = layout.is_column_major();
    for k in 0..n {
        let dim = if column_major { k } else { n - 1 - k };
        if index[dim] != 0 {
            index[dim] -= 1;
            stepper.step_back(dim, 1);
            return;
        }
        if shape[dim] > 0 {
            index[dim] = shape[dim] - 1;
        }
        if k + 1 < n {
            stepper.reset_back(dim);
        }
    }
    index.iter_mut().for_each(|i| *i = 0);
    stepper.to_begin();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strides::{compute_backstrides, compute_strides};

    fn walk(shape: &[usize], layout: Layout) -> Vec<i32> {
        let size: usize = shape.iter().product();
        let data: Vec<i32> = (0..size as i32).collect();
        let strides = compute_strides(shape, Layout::RowMajor);
        let back = compute_backstrides(shape, &strides);
        let mut st = ContainerStepper::new(&data, StrideCursor::new(&strides, &back, 0, shape.len()));
        let mut index = vec![0; shape.len()];
        let mut out = Vec::new();
        for _ in 0..size {
            out.push(st.get());
            increment_stepper(&mut st, &mut index, shape, layout);
        }
        let mut end = ContainerStepper::new(&data, StrideCursor::new(&strides, &back, 0, shape.len()));
        end.to_end(layout);
        assert!(st == end);
        out
    }

    #[test]
    fn test_odometer_row_major_order() {
        assert_eq!(walk(&[2, 3], Layout::RowMajor), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_odometer_column_major_order() {
        assert_eq!(walk(&[2, 3], Layout::ColumnMajor), vec![0, 3, 1, 4, 2, 5]);
    }

    #[test]
    fn test_odometer_with_unit_dims() {
        assert_eq!(walk(&[1, 3, 1], Layout::RowMajor), vec![0, 1, 2]);
    }

    #[test]
    fn test_odometer_rank_zero() {
        assert_eq!(walk(&[], Layout::RowMajor), vec![0]);
    }

    #[test]
    fn test_broadcast_dim_offset_ignores_leading_dims() {
        let data = [10, 20, 30];
        let strides = [1isize];
        let back = [2isize];
        let mut st = ContainerStepper::new(&data, StrideCursor::new(&strides, &back, 0, 2));
        let shape = [2, 3];
        let mut index = [0, 0];
        let mut out = Vec::new();
        for _ in 0..6 {
            out.push(st.get());
            increment_stepper(&mut st, &mut index, &shape, Layout::RowMajor);
        }
        assert_eq!(out, vec![10, 20, 30, 10, 20, 30]);
    }

    #[test]
    fn test_decrement_reverses_increment() {
        let shape = [2, 3];
        let data: Vec<i32> = (0..6).collect();
        let strides = compute_strides(&shape, Layout::RowMajor);
        let back = compute_backstrides(&shape, &strides);
        let mut st = ContainerStepper::new(&data, StrideCursor::new(&strides, &back, 0, 2));
        let mut index = [0, 0];
        for _ in 0..5 {
            increment_stepper(&mut st, &mut index, &shape, Layout::RowMajor);
        }
        assert_eq!(st.get(), 5);
        let mut seen = vec![st.get()];
        for _ in 0..5 {
            decrement_stepper(&mut st, &mut index, &shape, Layout::RowMajor);
            seen.push(st.get());
        }
        assert_eq!(seen, vec![5, 4, 3, 2, 1, 0]);
        assert_eq!(index, [0, 0]);
    }

    #[test]
    fn test_mut_stepper_writes_through() {
        let shape = [2, 2];
        let mut data = vec![0; 4];
        let strides = compute_strides(&shape, Layout::ColumnMajor);
        let back = compute_backstrides(&shape, &strides);
        {
            let mut st =
                ContainerStepperMut::new(&mut data, StrideCursor::new(&strides, &back, 0, 2));
            let mut index = [0, 0];
            for v in 1..=4 {
                st.set(v);
                increment_stepper(&mut st, &mut index, &shape, Layout::RowMajor);
            }
        }
        assert_eq!(data, vec![1, 3, 2, 4]);
    }
}
