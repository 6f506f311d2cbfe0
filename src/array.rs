//! Owned, resizable dense container.

use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

use smallvec::{smallvec, SmallVec};

use crate::assign::AssignTarget;
use crate::expression::{Expression, IntoOperand};
use crate::layout::{Layout, LayoutTag, RowMajor};
use crate::stepper::{ContainerStepper, ContainerStepperMut, StrideCursor};
use crate::strides::{
    compute_backstrides, compute_strides, data_offset, total_len, unravel_index, CutPoint,
};
use crate::tags::{AssignDispatch, JoinedTag, TensorTag};
use crate::{Result, StridedError};

/// Dense N-dimensional array stored in `L` order.
///
/// Dimensions of size 1 carry stride 0, so an `Array` can be stepped along a
/// broadcast dimension without moving.
#[derive(Clone, Debug, PartialEq)]
pub struct Array<T, L: LayoutTag = RowMajor> {
    data: Vec<T>,
    shape: Vec<usize>,
    strides: Vec<isize>,
    backstrides: Vec<isize>,
    _layout: PhantomData<L>,
}

impl<T, L: LayoutTag> Array<T, L> {
    /// Wrap `data` (in `L` order) with the given shape.
    pub fn from_shape_vec(shape: &[usize], data: Vec<T>) -> Result<Self> {
        let expected = total_len(shape);
        if data.len() != expected {
            return Err(StridedError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        let strides = compute_strides(shape, L::LAYOUT);
        let backstrides = compute_backstrides(shape, &strides);
        Ok(Self {
            data,
            shape: shape.to_vec(),
            strides,
            backstrides,
            _layout: PhantomData,
        })
    }

    /// Array whose element at each multi-index is `f(index)`.
    pub fn from_fn(shape: &[usize], mut f: impl FnMut(&[usize]) -> T) -> Self {
        let strides = compute_strides(shape, L::LAYOUT);
        let backstrides = compute_backstrides(shape, &strides);
        let len = total_len(shape);
        let mut slots: Vec<Option<T>> = (0..len).map(|_| None).collect();
        let mut index: SmallVec<[usize; 8]> = smallvec![0; shape.len()];
        for flat in 0..len {
            unravel_index(flat, shape, Layout::RowMajor, &mut index);
            slots[data_offset(&strides, &index) as usize] = Some(f(&index));
        }
        Self {
            data: slots.into_iter().flatten().collect(),
            shape: shape.to_vec(),
            strides,
            backstrides,
            _layout: PhantomData,
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    #[inline]
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Change the shape without touching the data.
    pub fn reshape(&mut self, shape: &[usize]) -> Result<()> {
        let expected = total_len(shape);
        if expected != self.data.len() {
            return Err(StridedError::SizeMismatch {
                expected,
                actual: self.data.len(),
            });
        }
        self.set_shape(shape);
        Ok(())
    }

    /// Mutable element at a multi-index (right-aligned, unchecked beyond
    /// slice bounds).
    #[inline]
    pub fn element_mut(&mut self, index: &[usize]) -> &mut T {
        let off = data_offset(&self.strides, index) as usize;
        &mut self.data[off]
    }

    fn set_shape(&mut self, shape: &[usize]) {
        self.shape.clear();
        self.shape.extend_from_slice(shape);
        self.strides = compute_strides(shape, L::LAYOUT);
        self.backstrides = compute_backstrides(shape, &self.strides);
    }

    pub(crate) fn storage_parts_mut(&mut self) -> (&mut [T], &[usize], &[isize]) {
        (&mut self.data, &self.shape, &self.strides)
    }
}

impl<T: Copy, L: LayoutTag> Array<T, L> {
    pub fn from_elem(shape: &[usize], value: T) -> Self {
        let strides = compute_strides(shape, L::LAYOUT);
        let backstrides = compute_backstrides(shape, &strides);
        Self {
            data: vec![value; total_len(shape)],
            shape: shape.to_vec(),
            strides,
            backstrides,
            _layout: PhantomData,
        }
    }

    pub fn fill(&mut self, value: T) {
        self.data.iter_mut().for_each(|x| *x = value);
    }
}

impl<T: Copy + Default, L: LayoutTag> Array<T, L> {
    /// Empty one-dimensional array.
    pub fn new() -> Self {
        Self::from_elem(&[0], T::default())
    }

    pub fn zeros(shape: &[usize]) -> Self {
        Self::from_elem(shape, T::default())
    }

    /// Resize to `shape`. Element values are unspecified afterwards unless
    /// the shape is unchanged.
    pub fn resize(&mut self, shape: &[usize]) {
        if self.shape.as_slice() == shape {
            return;
        }
        tracing::debug!(from = ?self.shape, to = ?shape, "resizing array");
        self.data.resize(total_len(shape), T::default());
        self.set_shape(shape);
    }

    /// Evaluate `src` into a fresh array.
    pub fn from_expr<S>(src: &S) -> Result<Self>
    where
        S: Expression,
        JoinedTag<Self, S>: AssignDispatch<Self, S>,
    {
        let mut out = Self::new();
        crate::assign::assign(&mut out, src)?;
        Ok(out)
    }

    /// Evaluate `src` into `self`, resizing to its broadcast shape.
    pub fn assign<S>(&mut self, src: &S) -> Result<()>
    where
        S: Expression,
        JoinedTag<Self, S>: AssignDispatch<Self, S>,
    {
        crate::assign::assign(self, src)
    }
}

impl<T: Copy + Default, L: LayoutTag> Default for Array<T, L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> From<Vec<T>> for Array<T, RowMajor> {
    fn from(data: Vec<T>) -> Self {
        let shape = [data.len()];
        let strides = compute_strides(&shape, Layout::RowMajor);
        let backstrides = compute_backstrides(&shape, &strides);
        Self {
            data,
            shape: shape.to_vec(),
            strides,
            backstrides,
            _layout: PhantomData,
        }
    }
}

impl<T, L: LayoutTag, const N: usize> Index<[usize; N]> for Array<T, L> {
    type Output = T;

    #[inline]
    fn index(&self, index: [usize; N]) -> &T {
        &self.data[data_offset(&self.strides, &index) as usize]
    }
}

impl<T, L: LayoutTag, const N: usize> IndexMut<[usize; N]> for Array<T, L> {
    #[inline]
    fn index_mut(&mut self, index: [usize; N]) -> &mut T {
        let off = data_offset(&self.strides, &index) as usize;
        &mut self.data[off]
    }
}

impl<T, L: LayoutTag> Index<&[usize]> for Array<T, L> {
    type Output = T;

    #[inline]
    fn index(&self, index: &[usize]) -> &T {
        &self.data[data_offset(&self.strides, index) as usize]
    }
}

impl<T: Copy, L: LayoutTag> Expression for Array<T, L> {
    type Elem = T;
    type Tag = TensorTag;
    type Stepper<'a> = ContainerStepper<'a, T> where Self: 'a;

    const STATIC_LAYOUT: Layout = L::LAYOUT;
    const CONTIGUOUS_LAYOUT: bool = true;
    const STRIDED_LOOP: bool = true;

    #[inline]
    fn shape(&self) -> &[usize] {
        &self.shape
    }
    #[inline]
    fn layout(&self) -> Layout {
        L::LAYOUT
    }
    #[inline]
    fn is_contiguous(&self) -> bool {
        true
    }
    #[inline]
    fn get(&self, index: &[usize]) -> T {
        self.data[data_offset(&self.strides, index) as usize]
    }
    #[inline]
    fn has_linear_assign(&self, strides: &[isize]) -> bool {
        self.strides.as_slice() == strides
    }
    #[inline]
    fn linear_get(&self, i: usize) -> T {
        self.data[i]
    }
    #[inline]
    fn strides(&self) -> Option<&[isize]> {
        Some(&self.strides)
    }
    #[inline]
    fn storage(&self) -> Option<&[T]> {
        Some(&self.data)
    }
    #[inline]
    fn check_strides(&self, cut: &mut CutPoint<'_>) -> bool {
        cut.update(&self.strides);
        true
    }
    #[inline]
    fn stepper_begin(&self, shape: &[usize]) -> ContainerStepper<'_, T> {
        ContainerStepper::new(
            &self.data,
            StrideCursor::new(&self.strides, &self.backstrides, 0, shape.len()),
        )
    }
}

impl<T: Copy + Default, L: LayoutTag> AssignTarget for Array<T, L> {
    const RESIZABLE: bool = true;
    type TargetStepper<'a> = ContainerStepperMut<'a, T> where Self: 'a;

    fn resize(&mut self, shape: &[usize]) -> Result<()> {
        Array::resize(self, shape);
        Ok(())
    }

    fn stepper_mut(&mut self, shape: &[usize]) -> ContainerStepperMut<'_, T> {
        ContainerStepperMut::new(
            &mut self.data,
            StrideCursor::new(&self.strides, &self.backstrides, 0, shape.len()),
        )
    }

    fn linear_mut(&mut self) -> Option<&mut [T]> {
        Some(&mut self.data)
    }
}

impl<T: Copy, L: LayoutTag> IntoOperand for Array<T, L> {
    type Operand = Self;

    #[inline]
    fn into_operand(self) -> Self {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ColumnMajor;

    #[test]
    fn test_from_shape_vec_size_check() {
        let err = Array::<f64>::from_shape_vec(&[2, 3], vec![0.0; 5]).unwrap_err();
        assert_eq!(
            err,
            StridedError::SizeMismatch {
                expected: 6,
                actual: 5
            }
        );
    }

    #[test]
    fn test_unit_dims_get_zero_strides() {
        let a = Array::<i32>::zeros(&[3, 1, 4]);
        assert_eq!(a.strides(), Some(&[4isize, 0, 1][..]));
    }

    #[test]
    fn test_column_major_from_fn() {
        let a: Array<usize, ColumnMajor> = Array::from_fn(&[2, 3], |i| i[0] * 10 + i[1]);
        assert_eq!(a.as_slice(), &[0, 10, 1, 11, 2, 12]);
        assert_eq!(a[[1, 2]], 12);
        assert_eq!(a.get(&[0, 1]), 1);
    }

    #[test]
    fn test_index_mut_and_fill() {
        let mut a = Array::<i32>::zeros(&[2, 2]);
        a[[1, 0]] = 5;
        assert_eq!(a.as_slice(), &[0, 0, 5, 0]);
        a.fill(9);
        assert!(a.as_slice().iter().all(|&x| x == 9));
    }

    #[test]
    fn test_resize_and_reshape() {
        let mut a = Array::<f32>::zeros(&[2, 3]);
        a.reshape(&[3, 2]).unwrap();
        assert_eq!(a.shape(), &[3, 2]);
        assert!(a.reshape(&[4, 2]).is_err());
        a.resize(&[4, 5]);
        assert_eq!(a.len(), 20);
        assert_eq!(a.strides(), Some(&[5isize, 1][..]));
    }

    #[test]
    fn test_stepper_walks_storage() {
        let a = Array::<_>::from_shape_vec(&[2, 2], vec![1, 2, 3, 4]).unwrap();
        let values: Vec<i32> = a.iter().collect();
        assert_eq!(values, vec![1, 2, 3, 4]);
    }
}
