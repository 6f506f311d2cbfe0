//! The expression contract shared by every node kind.

use smallvec::{smallvec, SmallVec};

use crate::iter::StepperIter;
use crate::layout::{Layout, DEFAULT_TRAVERSAL};
use crate::stepper::{Steppable, Stepper};
use crate::strides::{self, CutPoint};
use crate::tags::ExpressionTag;
use crate::{Result, StridedError};

/// A lazily evaluated N-dimensional array.
///
/// Implemented by containers, function nodes, generators, broadcasts,
/// reducers and views. The assignment engine only talks to nodes through
/// this trait.
///
/// The associated constants are the static half of layout dispatch: they let
/// strategy selection be resolved by monomorphization, while
/// [`layout`](Expression::layout), [`is_contiguous`](Expression::is_contiguous)
/// and [`has_linear_assign`](Expression::has_linear_assign) answer the same
/// questions at runtime.
pub trait Expression {
    type Elem: Copy;
    type Tag: ExpressionTag;
    type Stepper<'a>: Stepper<Elem = Self::Elem>
    where
        Self: 'a;

    /// Layout known from the type alone.
    const STATIC_LAYOUT: Layout;
    /// Whether every value of this type is contiguous in `STATIC_LAYOUT`.
    const CONTIGUOUS_LAYOUT: bool;
    /// Whether steppers of this type can take part in the strided-blocked loop.
    const STRIDED_LOOP: bool;

    fn shape(&self) -> &[usize];

    #[inline]
    fn dimension(&self) -> usize {
        self.shape().len()
    }

    #[inline]
    fn size(&self) -> usize {
        strides::total_len(self.shape())
    }

    /// Runtime layout.
    fn layout(&self) -> Layout;

    /// Whether the elements form one packed block in [`layout`](Expression::layout) order.
    fn is_contiguous(&self) -> bool;

    /// Element at a multi-index.
    ///
    /// The index is right-aligned against the shape. Out-of-range
    /// coordinates panic or return unspecified elements; use
    /// [`at`](Expression::at) for checked access.
    fn get(&self, index: &[usize]) -> Self::Elem;

    /// Bounds-checked element access. `index` must have exactly one
    /// coordinate per dimension. A broadcast error recorded while the
    /// expression was built is returned before any element is read.
    fn at(&self, index: &[usize]) -> Result<Self::Elem> {
        resolved_shape(self)?;
        let shape = self.shape();
        if index.len() != shape.len() || index.iter().zip(shape).any(|(&i, &d)| i >= d) {
            return Err(StridedError::IndexOutOfBounds {
                index: index.to_vec(),
                shape: shape.to_vec(),
            });
        }
        Ok(self.get(index))
    }

    /// Broadcast this expression's shape into `shape` (see
    /// [`strides::broadcast_shape`]). Returns whether the broadcast is trivial.
    fn broadcast_shape(&self, shape: &mut [usize]) -> Result<bool> {
        strides::broadcast_shape(self.shape(), shape)
    }

    /// Whether every leaf of this expression is laid out with exactly
    /// `strides`, so that [`linear_get`](Expression::linear_get) walks it in
    /// the same order as a destination with those strides.
    fn has_linear_assign(&self, strides: &[isize]) -> bool;

    /// Element at flat position `i`. Only meaningful when
    /// [`has_linear_assign`](Expression::has_linear_assign) holds for the
    /// destination's strides.
    fn linear_get(&self, i: usize) -> Self::Elem;

    /// Strides, for nodes backed by strided storage.
    fn strides(&self) -> Option<&[isize]> {
        None
    }

    /// Backing flat storage, for nodes that expose one.
    fn storage(&self) -> Option<&[Self::Elem]> {
        None
    }

    /// Offset of the first element in [`storage`](Expression::storage).
    fn data_offset(&self) -> usize {
        0
    }

    /// Folds every leaf's strides into `cut`. Returns `false` if some leaf
    /// cannot take part in the strided-blocked loop.
    fn check_strides(&self, _cut: &mut CutPoint<'_>) -> bool {
        false
    }

    /// Stepper at the first element, bound to the broadcast target `shape`.
    fn stepper_begin(&self, shape: &[usize]) -> Self::Stepper<'_>;

    /// Stepper past the last element in `layout` order.
    fn stepper_end(&self, shape: &[usize], layout: Layout) -> Self::Stepper<'_> {
        let mut st = self.stepper_begin(shape);
        st.to_end(layout);
        st
    }

    /// Iterate over the elements in row-major order.
    ///
    /// Yields nothing if the operands of the expression do not broadcast;
    /// [`try_iter`](Expression::try_iter) reports that case as an error.
    fn iter(&self) -> StepperIter<'_, Self>
    where
        Self: Sized,
    {
        StepperIter::new(self, self.shape(), DEFAULT_TRAVERSAL)
    }

    /// Like [`iter`](Expression::iter), but fails with the recorded
    /// broadcast error instead of yielding nothing.
    fn try_iter(&self) -> Result<StepperIter<'_, Self>>
    where
        Self: Sized,
    {
        StepperIter::try_new(self, self.shape(), DEFAULT_TRAVERSAL)
    }
}

impl<E: Expression + ?Sized> Expression for &E {
    type Elem = E::Elem;
    type Tag = E::Tag;
    type Stepper<'a> = E::Stepper<'a> where Self: 'a;

    const STATIC_LAYOUT: Layout = E::STATIC_LAYOUT;
    const CONTIGUOUS_LAYOUT: bool = E::CONTIGUOUS_LAYOUT;
    const STRIDED_LOOP: bool = E::STRIDED_LOOP;

    #[inline]
    fn shape(&self) -> &[usize] {
        (**self).shape()
    }
    #[inline]
    fn layout(&self) -> Layout {
        (**self).layout()
    }
    #[inline]
    fn is_contiguous(&self) -> bool {
        (**self).is_contiguous()
    }
    #[inline]
    fn get(&self, index: &[usize]) -> Self::Elem {
        (**self).get(index)
    }
    #[inline]
    fn broadcast_shape(&self, shape: &mut [usize]) -> Result<bool> {
        (**self).broadcast_shape(shape)
    }
    #[inline]
    fn has_linear_assign(&self, strides: &[isize]) -> bool {
        (**self).has_linear_assign(strides)
    }
    #[inline]
    fn linear_get(&self, i: usize) -> Self::Elem {
        (**self).linear_get(i)
    }
    #[inline]
    fn strides(&self) -> Option<&[isize]> {
        (**self).strides()
    }
    #[inline]
    fn storage(&self) -> Option<&[Self::Elem]> {
        (**self).storage()
    }
    #[inline]
    fn data_offset(&self) -> usize {
        (**self).data_offset()
    }
    #[inline]
    fn check_strides(&self, cut: &mut CutPoint<'_>) -> bool {
        (**self).check_strides(cut)
    }
    #[inline]
    fn stepper_begin(&self, shape: &[usize]) -> Self::Stepper<'_> {
        (**self).stepper_begin(shape)
    }
}

/// Conversion into an operand of a function node.
///
/// Expressions convert into themselves, references to expressions are
/// operands through the blanket `&E` implementation, and plain numbers
/// become [`crate::Scalar`]s.
pub trait IntoOperand {
    type Operand: Expression;

    fn into_operand(self) -> Self::Operand;
}

impl<'a, E: Expression + ?Sized> IntoOperand for &'a E {
    type Operand = &'a E;

    #[inline]
    fn into_operand(self) -> Self::Operand {
        self
    }
}

/// Fully broadcast shape of an expression, surfacing any broadcast error
/// recorded while the expression was built.
pub fn resolved_shape<E: Expression + ?Sized>(e: &E) -> Result<SmallVec<[usize; 8]>> {
    let mut shape: SmallVec<[usize; 8]> = smallvec![usize::MAX; e.dimension()];
    e.broadcast_shape(&mut shape)?;
    Ok(shape)
}

/// The elements of `e` as one packed slice, if its storage allows it.
pub fn contiguous_slice<E: Expression + ?Sized>(e: &E) -> Option<&[E::Elem]> {
    if !e.is_contiguous() {
        return None;
    }
    let data = e.storage()?;
    let start = e.data_offset();
    data.get(start..start + e.size())
}
