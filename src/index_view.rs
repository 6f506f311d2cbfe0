//! One-dimensional views over an explicit list of coordinates.
//!
//! `index_view(a, [[0, 1], [2, 3]])` has shape `[2]` and reads `a[0, 1]`
//! then `a[2, 3]`. `filter` builds the list from a boolean mask.

use smallvec::{smallvec, SmallVec};

use crate::assign::AssignTarget;
use crate::expression::{resolved_shape, Expression, IntoOperand};
use crate::layout::Layout;
use crate::stepper::{Steppable, Stepper, StepperMut};
use crate::strides::{data_offset, unravel_index};
use crate::tags::TensorTag;
use crate::view::StorageMut;
use crate::{Result, StridedError};

type Coords = SmallVec<[usize; 8]>;

/// Position in a list of selected elements, moved only by the innermost
/// dimension of the target shape. A single-element list broadcasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ListCursor {
    pos: usize,
    len: usize,
    dim: usize,
}

impl ListCursor {
    fn new(len: usize, target_rank: usize) -> Self {
        Self {
            pos: 0,
            len,
            dim: target_rank.saturating_sub(1),
        }
    }
}

impl Steppable for ListCursor {
    #[inline]
    fn step(&mut self, dim: usize, n: usize) {
        if dim == self.dim && self.len > 1 {
            self.pos += n;
        }
    }
    #[inline]
    fn step_back(&mut self, dim: usize, n: usize) {
        if dim == self.dim && self.len > 1 {
            self.pos -= n;
        }
    }
    #[inline]
    fn reset(&mut self, dim: usize) {
        if dim == self.dim {
            self.pos -= self.len.saturating_sub(1);
        }
    }
    #[inline]
    fn reset_back(&mut self, dim: usize) {
        if dim == self.dim {
            self.pos += self.len.saturating_sub(1);
        }
    }
    #[inline]
    fn to_begin(&mut self) {
        self.pos = 0;
    }
    #[inline]
    fn to_end(&mut self, _layout: Layout) {
        self.pos = self.len;
    }
}

macro_rules! forward_steppable {
    ([$($g:tt)*] $ty:ty) => {
        impl<$($g)*> Steppable for $ty {
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
    };
}

fn check_index(index: &[usize], shape: &[usize]) -> Result<()> {
    if index.len() != shape.len() || index.iter().zip(shape).any(|(&i, &d)| i >= d) {
        return Err(StridedError::IndexOutOfBounds {
            index: index.to_vec(),
            shape: shape.to_vec(),
        });
    }
    Ok(())
}

/// Coordinates (row-major order) where `mask` is true.
fn mask_coordinates<M>(mask: &M, shape: &[usize]) -> Result<Vec<Coords>>
where
    M: Expression<Elem = bool>,
{
    let mask_shape = resolved_shape(mask)?;
    if mask_shape.as_slice() != shape {
        return Err(StridedError::ShapeMismatch(
            mask_shape.to_vec(),
            shape.to_vec(),
        ));
    }
    let mut out = Vec::new();
    let mut index: Coords = smallvec![0; shape.len()];
    for (flat, keep) in mask.iter().enumerate() {
        if keep {
            unravel_index(flat, shape, Layout::RowMajor, &mut index);
            out.push(index.clone());
        }
    }
    Ok(out)
}

// ============================================================================
// Read-only
// ============================================================================

/// Elements of an expression at a list of coordinates.
#[derive(Debug, Clone)]
pub struct IndexView<E> {
    expr: E,
    indices: Vec<Coords>,
    shape: [usize; 1],
}

impl<E: Expression> IndexView<E> {
    pub fn indices(&self) -> &[Coords] {
        &self.indices
    }
}

/// View of `e` at each coordinate in `indices`.
///
/// # Errors
///
/// [`StridedError::IndexOutOfBounds`] if a coordinate does not address an
/// element of `e`.
pub fn index_view<E, I>(e: E, indices: I) -> Result<IndexView<E>>
where
    E: Expression,
    I: IntoIterator,
    I::Item: AsRef<[usize]>,
{
    let shape = resolved_shape(&e)?;
    let indices = indices
        .into_iter()
        .map(|i| {
            let i = i.as_ref();
            check_index(i, &shape)?;
            Ok(SmallVec::from_slice(i))
        })
        .collect::<Result<Vec<Coords>>>()?;
    let len = indices.len();
    Ok(IndexView {
        expr: e,
        indices,
        shape: [len],
    })
}

/// View of the elements of `e` where `mask` is true, in row-major order.
///
/// # Errors
///
/// [`StridedError::ShapeMismatch`] if `mask` and `e` differ in shape.
pub fn filter<E, M>(e: E, mask: &M) -> Result<IndexView<E>>
where
    E: Expression,
    M: Expression<Elem = bool>,
{
    let shape = resolved_shape(&e)?;
    let indices = mask_coordinates(mask, &shape)?;
    let len = indices.len();
    Ok(IndexView {
        expr: e,
        indices,
        shape: [len],
    })
}

impl<E: Expression> Expression for IndexView<E> {
    type Elem = E::Elem;
    type Tag = E::Tag;
    type Stepper<'a> = IndexStepper<'a, E> where Self: 'a;

    const STATIC_LAYOUT: Layout = Layout::Dynamic;
    const CONTIGUOUS_LAYOUT: bool = false;
    const STRIDED_LOOP: bool = false;

    #[inline]
    fn shape(&self) -> &[usize] {
        &self.shape
    }
    fn layout(&self) -> Layout {
        Layout::Dynamic
    }
    fn is_contiguous(&self) -> bool {
        false
    }
    #[inline]
    fn get(&self, index: &[usize]) -> E::Elem {
        let i = index.last().copied().unwrap_or(0);
        self.expr.get(&self.indices[i])
    }
    fn has_linear_assign(&self, _strides: &[isize]) -> bool {
        false
    }
    #[inline]
    fn linear_get(&self, i: usize) -> E::Elem {
        self.expr.get(&self.indices[i])
    }
    fn stepper_begin(&self, shape: &[usize]) -> IndexStepper<'_, E> {
        IndexStepper {
            expr: &self.expr,
            indices: &self.indices,
            cursor: ListCursor::new(self.indices.len(), shape.len()),
        }
    }
}

impl<E: Expression> IntoOperand for IndexView<E> {
    type Operand = Self;

    #[inline]
    fn into_operand(self) -> Self {
        self
    }
}

pub struct IndexStepper<'a, E> {
    expr: &'a E,
    indices: &'a [Coords],
    cursor: ListCursor,
}

impl<E> PartialEq for IndexStepper<'_, E> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.indices, other.indices) && self.cursor == other.cursor
    }
}

forward_steppable!([E] IndexStepper<'_, E>);

impl<E: Expression> Stepper for IndexStepper<'_, E> {
    type Elem = E::Elem;

    #[inline]
    fn get(&self) -> E::Elem {
        self.expr.get(&self.indices[self.cursor.pos])
    }
    #[inline]
    fn step_leading(&mut self) {
        self.cursor.pos += 1;
    }
}

// ============================================================================
// Writable
// ============================================================================

/// Writable elements of a container at a list of coordinates.
#[derive(Debug)]
pub struct IndexViewMut<'a, T> {
    data: &'a mut [T],
    positions: Vec<usize>,
    shape: [usize; 1],
}

fn positions_of(strides: &[isize], offset: isize, indices: &[Coords]) -> Vec<usize> {
    indices
        .iter()
        .map(|i| (offset + data_offset(strides, i)) as usize)
        .collect()
}

/// Writable counterpart of [`index_view`].
pub fn index_view_mut<'a, S, I>(s: &'a mut S, indices: I) -> Result<IndexViewMut<'a, S::Elem>>
where
    S: StorageMut + ?Sized,
    I: IntoIterator,
    I::Item: AsRef<[usize]>,
{
    let (data, shape, strides, offset) = s.storage_parts_mut();
    let indices = indices
        .into_iter()
        .map(|i| {
            let i = i.as_ref();
            check_index(i, shape)?;
            Ok(SmallVec::from_slice(i))
        })
        .collect::<Result<Vec<Coords>>>()?;
    let positions = positions_of(strides, offset, &indices);
    let len = positions.len();
    Ok(IndexViewMut {
        data,
        positions,
        shape: [len],
    })
}

/// Writable counterpart of [`filter`].
pub fn filter_mut<'a, S, M>(s: &'a mut S, mask: &M) -> Result<IndexViewMut<'a, S::Elem>>
where
    S: StorageMut + ?Sized,
    M: Expression<Elem = bool>,
{
    let (data, shape, strides, offset) = s.storage_parts_mut();
    let indices = mask_coordinates(mask, shape)?;
    let positions = positions_of(strides, offset, &indices);
    let len = positions.len();
    Ok(IndexViewMut {
        data,
        positions,
        shape: [len],
    })
}

impl<T: Copy> IndexViewMut<'_, T> {
    pub fn fill(&mut self, value: T) {
        for &p in &self.positions {
            self.data[p] = value;
        }
    }
}

impl<T: Copy> Expression for IndexViewMut<'_, T> {
    type Elem = T;
    type Tag = TensorTag;
    type Stepper<'b> = PositionStepper<'b, T> where Self: 'b;

    const STATIC_LAYOUT: Layout = Layout::Dynamic;
    const CONTIGUOUS_LAYOUT: bool = false;
    const STRIDED_LOOP: bool = false;

    #[inline]
    fn shape(&self) -> &[usize] {
        &self.shape
    }
    fn layout(&self) -> Layout {
        Layout::Dynamic
    }
    fn is_contiguous(&self) -> bool {
        false
    }
    #[inline]
    fn get(&self, index: &[usize]) -> T {
        let i = index.last().copied().unwrap_or(0);
        self.data[self.positions[i]]
    }
    fn has_linear_assign(&self, _strides: &[isize]) -> bool {
        false
    }
    #[inline]
    fn linear_get(&self, i: usize) -> T {
        self.data[self.positions[i]]
    }
    fn stepper_begin(&self, shape: &[usize]) -> PositionStepper<'_, T> {
        PositionStepper {
            data: &*self.data,
            positions: &self.positions,
            cursor: ListCursor::new(self.positions.len(), shape.len()),
        }
    }
}

impl<T: Copy> AssignTarget for IndexViewMut<'_, T> {
    const RESIZABLE: bool = false;
    type TargetStepper<'b> = PositionStepperMut<'b, T> where Self: 'b;

    fn resize(&mut self, shape: &[usize]) -> Result<()> {
        if shape == self.shape.as_slice() {
            Ok(())
        } else {
            Err(StridedError::ShapeMismatch(self.shape.to_vec(), shape.to_vec()))
        }
    }

    fn stepper_mut(&mut self, shape: &[usize]) -> PositionStepperMut<'_, T> {
        PositionStepperMut {
            cursor: ListCursor::new(self.positions.len(), shape.len()),
            data: &mut *self.data,
            positions: &self.positions,
        }
    }

    fn linear_mut(&mut self) -> Option<&mut [T]> {
        None
    }
}

pub struct PositionStepper<'a, T> {
    data: &'a [T],
    positions: &'a [usize],
    cursor: ListCursor,
}

impl<T> PartialEq for PositionStepper<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.positions, other.positions) && self.cursor == other.cursor
    }
}

pub struct PositionStepperMut<'a, T> {
    data: &'a mut [T],
    positions: &'a [usize],
    cursor: ListCursor,
}

impl<T> PartialEq for PositionStepperMut<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.positions, other.positions) && self.cursor == other.cursor
    }
}

macro_rules! position_stepper {
    ($ty:ident) => {
        forward_steppable!([T] $ty<'_, T>);

        impl<T: Copy> Stepper for $ty<'_, T> {
            type Elem = T;

            #[inline]
            fn get(&self) -> T {
                self.data[self.positions[self.cursor.pos]]
            }
            #[inline]
            fn step_leading(&mut self) {
                self.cursor.pos += 1;
            }
        }
    };
}

position_stepper!(PositionStepper);
position_stepper!(PositionStepperMut);

impl<T: Copy> StepperMut for PositionStepperMut<'_, T> {
    #[inline]
    fn set(&mut self, value: T) {
        self.data[self.positions[self.cursor.pos]] = value;
    }
}
