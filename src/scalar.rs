//! Rank-0 expression wrapping a single value.

use crate::expression::{Expression, IntoOperand};
use crate::layout::Layout;
use crate::stepper::{Steppable, Stepper};
use crate::strides::CutPoint;
use crate::tags::TensorTag;

/// A value broadcast to any shape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scalar<T>(pub T);

impl<T> Scalar<T> {
    #[inline]
    pub fn new(value: T) -> Self {
        Self(value)
    }

    #[inline]
    pub fn value(&self) -> &T {
        &self.0
    }
}

impl<T: Copy> Expression for Scalar<T> {
    type Elem = T;
    type Tag = TensorTag;
    type Stepper<'a> = ScalarStepper<T> where Self: 'a;

    const STATIC_LAYOUT: Layout = Layout::Any;
    const CONTIGUOUS_LAYOUT: bool = true;
    const STRIDED_LOOP: bool = true;

    #[inline]
    fn shape(&self) -> &[usize] {
        &[]
    }
    #[inline]
    fn layout(&self) -> Layout {
        Layout::Any
    }
    #[inline]
    fn is_contiguous(&self) -> bool {
        true
    }
    #[inline]
    fn get(&self, _index: &[usize]) -> T {
        self.0
    }
    /// A scalar never forces broadcasting work: the target is left as is
    /// and the broadcast is reported trivial.
    #[inline]
    fn broadcast_shape(&self, _shape: &mut [usize]) -> crate::Result<bool> {
        Ok(true)
    }
    #[inline]
    fn has_linear_assign(&self, _strides: &[isize]) -> bool {
        true
    }
    #[inline]
    fn linear_get(&self, _i: usize) -> T {
        self.0
    }
    #[inline]
    fn check_strides(&self, _cut: &mut CutPoint<'_>) -> bool {
        true
    }
    #[inline]
    fn stepper_begin(&self, _shape: &[usize]) -> ScalarStepper<T> {
        ScalarStepper {
            value: self.0,
            at_end: false,
        }
    }
}

/// Stepper of a [`Scalar`]: every move is a no-op except `to_end`.
#[derive(Clone, Copy, Debug)]
pub struct ScalarStepper<T> {
    value: T,
    at_end: bool,
}

impl<T> PartialEq for ScalarStepper<T> {
    fn eq(&self, other: &Self) -> bool {
        self.at_end == other.at_end
    }
}

impl<T> Steppable for ScalarStepper<T> {
    #[inline]
    fn step(&mut self, _dim: usize, _n: usize) {}
    #[inline]
    fn step_back(&mut self, _dim: usize, _n: usize) {}
    #[inline]
    fn reset(&mut self, _dim: usize) {}
    #[inline]
    fn reset_back(&mut self, _dim: usize) {}
    #[inline]
    fn to_begin(&mut self) {
        self.at_end = false;
    }
    #[inline]
    fn to_end(&mut self, _layout: Layout) {
        self.at_end = true;
    }
}

impl<T: Copy> Stepper for ScalarStepper<T> {
    type Elem = T;

    #[inline]
    fn get(&self) -> T {
        self.value
    }
    #[inline]
    fn step_leading(&mut self) {}
}

impl<T: Copy> IntoOperand for Scalar<T> {
    type Operand = Self;

    #[inline]
    fn into_operand(self) -> Self {
        self
    }
}

macro_rules! impl_scalar_operand {
    ($($t:ty),*) => {
        $(impl IntoOperand for $t {
            type Operand = Scalar<$t>;

            #[inline]
            fn into_operand(self) -> Scalar<$t> {
                Scalar(self)
            }
        })*
    };
}

impl_scalar_operand!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, f32, f64, bool);

impl<T: Copy> IntoOperand for num_complex::Complex<T> {
    type Operand = Scalar<Self>;

    #[inline]
    fn into_operand(self) -> Scalar<Self> {
        Scalar(self)
    }
}
