//! Explicit broadcast nodes.

use smallvec::SmallVec;

use crate::expression::{resolved_shape, Expression, IntoOperand};
use crate::layout::Layout;
use crate::scalar::Scalar;
use crate::strides::{self, broadcastable, CutPoint};
use crate::{Result, StridedError};

/// An expression stretched to a larger shape.
///
/// Reads are forwarded to the wrapped expression with the index
/// right-aligned, so stretched dimensions repeat the same element.
#[derive(Clone, Debug)]
pub struct Broadcast<E> {
    expr: E,
    shape: SmallVec<[usize; 8]>,
}

impl<E: Expression> Broadcast<E> {
    #[inline]
    pub fn inner(&self) -> &E {
        &self.expr
    }

    #[inline]
    fn is_identity(&self) -> bool {
        self.expr.shape() == self.shape.as_slice()
    }
}

/// Broadcast `e` to `shape`.
///
/// # Errors
///
/// [`StridedError::BroadcastMismatch`] if `e` cannot be stretched to `shape`.
pub fn broadcast<E: Expression>(e: E, shape: &[usize]) -> Result<Broadcast<E>> {
    let from = resolved_shape(&e)?;
    if !broadcastable(&from, shape) {
        return Err(StridedError::BroadcastMismatch {
            input: from.to_vec(),
            output: shape.to_vec(),
        });
    }
    Ok(Broadcast {
        expr: e,
        shape: SmallVec::from_slice(shape),
    })
}

/// `value` repeated over `shape`.
pub fn full<T: Copy>(shape: &[usize], value: T) -> Broadcast<Scalar<T>> {
    Broadcast {
        expr: Scalar(value),
        shape: SmallVec::from_slice(shape),
    }
}

pub fn zeros<T: Copy + num_traits::Zero>(shape: &[usize]) -> Broadcast<Scalar<T>> {
    full(shape, T::zero())
}

pub fn ones<T: Copy + num_traits::One>(shape: &[usize]) -> Broadcast<Scalar<T>> {
    full(shape, T::one())
}

impl<E: Expression> Expression for Broadcast<E> {
    type Elem = E::Elem;
    type Tag = E::Tag;
    type Stepper<'a> = E::Stepper<'a> where Self: 'a;

    const STATIC_LAYOUT: Layout = E::STATIC_LAYOUT;
    const CONTIGUOUS_LAYOUT: bool = false;
    const STRIDED_LOOP: bool = E::STRIDED_LOOP;

    #[inline]
    fn shape(&self) -> &[usize] {
        &self.shape
    }
    #[inline]
    fn layout(&self) -> Layout {
        self.expr.layout()
    }
    #[inline]
    fn is_contiguous(&self) -> bool {
        self.is_identity() && self.expr.is_contiguous()
    }
    #[inline]
    fn get(&self, index: &[usize]) -> E::Elem {
        self.expr.get(index)
    }
    fn broadcast_shape(&self, shape: &mut [usize]) -> Result<bool> {
        strides::broadcast_shape(&self.shape, shape)
    }
    fn has_linear_assign(&self, strides: &[isize]) -> bool {
        self.is_identity() && self.expr.has_linear_assign(strides)
    }
    #[inline]
    fn linear_get(&self, i: usize) -> E::Elem {
        self.expr.linear_get(i)
    }
    #[inline]
    fn check_strides(&self, cut: &mut CutPoint<'_>) -> bool {
        self.expr.check_strides(cut)
    }
    #[inline]
    fn stepper_begin(&self, shape: &[usize]) -> E::Stepper<'_> {
        self.expr.stepper_begin(shape)
    }
}

impl<E: Expression> IntoOperand for Broadcast<E> {
    type Operand = Self;

    #[inline]
    fn into_operand(self) -> Self {
        self
    }
}
