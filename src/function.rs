//! Lazy elementwise function nodes.
//!
//! A [`Function`] combines a tuple of operand expressions through a functor.
//! Its shape is the broadcast of the operand shapes, computed once at
//! construction. Element access and stepping fan out to every operand.

use smallvec::{smallvec, SmallVec};

use crate::expression::{Expression, IntoOperand};
use crate::layout::{compute_layout, fold_layouts, Layout};
use crate::stepper::{Steppable, Stepper, StepperTuple};
use crate::strides::{self, CutPoint};
use crate::tags::ExpressionTag;
use crate::{Result, StridedError};

/// Callable taking a tuple of operand elements.
///
/// Implemented for every closure or function of matching arity, and for the
/// named functors in [`crate::ops`].
pub trait Functor<Args> {
    type Output;

    fn call(&self, args: Args) -> Self::Output;
}

/// A tuple of 1 to 6 operand expressions.
pub trait Operands {
    type Elems;
    type Tag: ExpressionTag;
    type Steppers<'a>: StepperTuple<Elems = Self::Elems>
    where
        Self: 'a;

    const STATIC_LAYOUT: Layout;
    const CONTIGUOUS_LAYOUT: bool;
    const STRIDED_LOOP: bool;

    fn dimension(&self) -> usize;
    /// Folds every operand into `shape`; all operands are visited.
    fn broadcast_shape(&self, shape: &mut [usize]) -> Result<bool>;
    fn layout(&self) -> Layout;
    fn is_contiguous(&self) -> bool;
    fn has_linear_assign(&self, strides: &[isize]) -> bool;
    fn check_strides(&self, cut: &mut CutPoint<'_>) -> bool;
    fn get(&self, index: &[usize]) -> Self::Elems;
    fn linear_get(&self, i: usize) -> Self::Elems;
    fn steppers_begin(&self, shape: &[usize]) -> Self::Steppers<'_>;
}

macro_rules! join_tags {
    (@acc $acc:ty;) => { $acc };
    (@acc $acc:ty; $next:ty $(, $rest:ty)*) => {
        join_tags!(@acc <$acc as ExpressionTag>::Join<$next>; $($rest),*)
    };
    ($first:ty $(, $rest:ty)*) => { join_tags!(@acc $first; $($rest),*) };
}

macro_rules! impl_operands {
    ($(($E:ident, $T:ident, $v:ident, $i:tt)),+) => {
        impl<Func, R, $($T),+> Functor<($($T,)+)> for Func
        where
            Func: Fn($($T),+) -> R,
        {
            type Output = R;

            #[inline(always)]
            fn call(&self, ($($v,)+): ($($T,)+)) -> R {
                self($($v),+)
            }
        }

        impl<$($E: Expression),+> Operands for ($($E,)+) {
            type Elems = ($($E::Elem,)+);
            type Tag = join_tags!($(<$E as Expression>::Tag),+);
            type Steppers<'a> = ($($E::Stepper<'a>,)+) where Self: 'a;

            const STATIC_LAYOUT: Layout = fold_layouts(&[$($E::STATIC_LAYOUT),+]);
            const CONTIGUOUS_LAYOUT: bool = true $(&& $E::CONTIGUOUS_LAYOUT)+;
            const STRIDED_LOOP: bool = true $(&& $E::STRIDED_LOOP)+;

            #[inline]
            fn dimension(&self) -> usize {
                0usize $(.max(self.$i.dimension()))+
            }

            fn broadcast_shape(&self, shape: &mut [usize]) -> Result<bool> {
                let mut trivial = true;
                $(trivial &= self.$i.broadcast_shape(shape)?;)+
                Ok(trivial)
            }

            #[inline]
            fn layout(&self) -> Layout {
                let mut layout = Layout::Any;
                $(layout = compute_layout(layout, self.$i.layout());)+
                layout
            }

            #[inline]
            fn is_contiguous(&self) -> bool {
                true $(&& self.$i.is_contiguous())+
            }

            fn has_linear_assign(&self, strides: &[isize]) -> bool {
                let mut linear = true;
                $(linear &= self.$i.has_linear_assign(strides);)+
                linear
            }

            fn check_strides(&self, cut: &mut CutPoint<'_>) -> bool {
                let mut ok = true;
                $(ok &= self.$i.check_strides(cut);)+
                ok
            }

            #[inline]
            fn get(&self, index: &[usize]) -> Self::Elems {
                ($(self.$i.get(index),)+)
            }

            #[inline]
            fn linear_get(&self, i: usize) -> Self::Elems {
                ($(self.$i.linear_get(i),)+)
            }

            #[inline]
            fn steppers_begin(&self, shape: &[usize]) -> Self::Steppers<'_> {
                ($(self.$i.stepper_begin(shape),)+)
            }
        }
    };
}

impl_operands!((E0, T0, v0, 0));
impl_operands!((E0, T0, v0, 0), (E1, T1, v1, 1));
impl_operands!((E0, T0, v0, 0), (E1, T1, v1, 1), (E2, T2, v2, 2));
impl_operands!((E0, T0, v0, 0), (E1, T1, v1, 1), (E2, T2, v2, 2), (E3, T3, v3, 3));
impl_operands!(
    (E0, T0, v0, 0),
    (E1, T1, v1, 1),
    (E2, T2, v2, 2),
    (E3, T3, v3, 3),
    (E4, T4, v4, 4)
);
impl_operands!(
    (E0, T0, v0, 0),
    (E1, T1, v1, 1),
    (E2, T2, v2, 2),
    (E3, T3, v3, 3),
    (E4, T4, v4, 4),
    (E5, T5, v5, 5)
);

/// Elementwise application of `F` to the operands `O`.
///
/// Construction never fails: a broadcast error between the operands is
/// recorded and reported by [`Expression::broadcast_shape`], which every
/// evaluation entry point calls before reading an element. Use
/// [`Function::try_new`] to get the error immediately.
#[derive(Clone, Debug)]
pub struct Function<F, O> {
    functor: F,
    operands: O,
    shape: SmallVec<[usize; 8]>,
    trivial: bool,
    error: Option<StridedError>,
}

impl<F, O: Operands> Function<F, O> {
    pub fn new(functor: F, operands: O) -> Self {
        let mut shape: SmallVec<[usize; 8]> = smallvec![usize::MAX; operands.dimension()];
        let (trivial, error) = match operands.broadcast_shape(&mut shape) {
            Ok(trivial) => (trivial, None),
            Err(e) => (false, Some(e)),
        };
        if error.is_some() {
            shape.iter_mut().filter(|d| **d == usize::MAX).for_each(|d| *d = 1);
        }
        Self {
            functor,
            operands,
            shape,
            trivial,
            error,
        }
    }

    pub fn try_new(functor: F, operands: O) -> Result<Self> {
        let f = Self::new(functor, operands);
        match f.error {
            Some(e) => Err(e),
            None => Ok(f),
        }
    }

    #[inline]
    pub fn functor(&self) -> &F {
        &self.functor
    }

    #[inline]
    pub fn operands(&self) -> &O {
        &self.operands
    }

    /// Whether every operand already has the node's full shape.
    #[inline]
    pub fn is_trivial_broadcast(&self) -> bool {
        self.trivial
    }
}

impl<F, O> Expression for Function<F, O>
where
    O: Operands,
    F: Functor<O::Elems>,
    F::Output: Copy,
{
    type Elem = F::Output;
    type Tag = O::Tag;
    type Stepper<'a> = FunctionStepper<'a, F, O::Steppers<'a>> where Self: 'a;

    const STATIC_LAYOUT: Layout = O::STATIC_LAYOUT;
    const CONTIGUOUS_LAYOUT: bool = O::CONTIGUOUS_LAYOUT;
    const STRIDED_LOOP: bool = O::STRIDED_LOOP;

    #[inline]
    fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    fn layout(&self) -> Layout {
        self.operands.layout()
    }

    #[inline]
    fn is_contiguous(&self) -> bool {
        self.operands.is_contiguous()
    }

    #[inline]
    fn get(&self, index: &[usize]) -> Self::Elem {
        self.functor.call(self.operands.get(index))
    }

    fn broadcast_shape(&self, shape: &mut [usize]) -> Result<bool> {
        if let Some(e) = &self.error {
            return Err(e.clone());
        }
        Ok(strides::broadcast_shape(&self.shape, shape)? && self.trivial)
    }

    #[inline]
    fn has_linear_assign(&self, strides: &[isize]) -> bool {
        self.operands.has_linear_assign(strides)
    }

    #[inline]
    fn linear_get(&self, i: usize) -> Self::Elem {
        self.functor.call(self.operands.linear_get(i))
    }

    #[inline]
    fn check_strides(&self, cut: &mut CutPoint<'_>) -> bool {
        self.operands.check_strides(cut)
    }

    #[inline]
    fn stepper_begin(&self, shape: &[usize]) -> Self::Stepper<'_> {
        FunctionStepper {
            functor: &self.functor,
            steppers: self.operands.steppers_begin(shape),
        }
    }
}

impl<F, O> IntoOperand for Function<F, O>
where
    Self: Expression,
{
    type Operand = Self;

    #[inline]
    fn into_operand(self) -> Self {
        self
    }
}

/// Stepper of a [`Function`]: moves every operand stepper and applies the
/// functor on read.
pub struct FunctionStepper<'a, F, S> {
    functor: &'a F,
    steppers: S,
}

impl<F, S: PartialEq> PartialEq for FunctionStepper<'_, F, S> {
    fn eq(&self, other: &Self) -> bool {
        self.steppers == other.steppers
    }
}

impl<F, S: StepperTuple> Steppable for FunctionStepper<'_, F, S> {
    #[inline]
    fn step(&mut self, dim: usize, n: usize) {
        self.steppers.step(dim, n)
    }
    #[inline]
    fn step_back(&mut self, dim: usize, n: usize) {
        self.steppers.step_back(dim, n)
    }
    #[inline]
    fn reset(&mut self, dim: usize) {
        self.steppers.reset(dim)
    }
    #[inline]
    fn reset_back(&mut self, dim: usize) {
        self.steppers.reset_back(dim)
    }
    #[inline]
    fn to_begin(&mut self) {
        self.steppers.to_begin()
    }
    #[inline]
    fn to_end(&mut self, layout: Layout) {
        self.steppers.to_end(layout)
    }
}

impl<F, S> Stepper for FunctionStepper<'_, F, S>
where
    S: StepperTuple,
    F: Functor<S::Elems>,
    F::Output: Copy,
{
    type Elem = F::Output;

    #[inline]
    fn get(&self) -> F::Output {
        self.functor.call(self.steppers.get())
    }

    #[inline]
    fn step_leading(&mut self) {
        self.steppers.step_leading()
    }
}
