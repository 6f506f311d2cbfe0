//! Operator overloading and elementwise builders.
//!
//! Every arithmetic operator on an expression returns a lazy [`Function`]
//! node. The right-hand side may be any [`IntoOperand`]: another expression,
//! a reference to one, or a plain number. Numbers on the left are supported
//! for `f32`, `f64`, `i32` and `i64` when they match the element type of the
//! right-hand side.

use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::array::Array;
use crate::broadcast::Broadcast;
use crate::expression::{Expression, IntoOperand};
use crate::function::{Function, Functor};
use crate::functor_view::FunctorView;
use crate::generator::Generator;
use crate::index_view::IndexView;
use crate::layout::LayoutTag;
use crate::reduce::Reducer;
use crate::scalar::Scalar;
use crate::view::{StridedView, StridedViewMut};

// ============================================================================
// Named functors
// ============================================================================

macro_rules! binary_functor {
    ($(#[$doc:meta])* $name:ident, $bound:ident, |$a:ident, $b:ident| $body:expr) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
        pub struct $name;

        impl<A: $bound<B>, B> Functor<(A, B)> for $name {
            type Output = <A as $bound<B>>::Output;

            #[inline(always)]
            fn call(&self, ($a, $b): (A, B)) -> Self::Output {
                $body
            }
        }
    };
}

binary_functor!(
    /// `a + b`
    Plus, Add, |a, b| a + b
);
binary_functor!(
    /// `a - b`
    Minus, Sub, |a, b| a - b
);
binary_functor!(
    /// `a * b`
    Multiplies, Mul, |a, b| a * b
);
binary_functor!(
    /// `a / b`
    Divides, Div, |a, b| a / b
);

/// `-a`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Negate;

impl<A: Neg> Functor<(A,)> for Negate {
    type Output = A::Output;

    #[inline(always)]
    fn call(&self, (a,): (A,)) -> A::Output {
        -a
    }
}

macro_rules! comparison_functor {
    ($name:ident, $bound:ident, |$a:ident, $b:ident| $body:expr) => {
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
        pub struct $name;

        impl<A: $bound<B>, B> Functor<(A, B)> for $name {
            type Output = bool;

            #[inline(always)]
            fn call(&self, ($a, $b): (A, B)) -> bool {
                $body
            }
        }
    };
}

comparison_functor!(Greater, PartialOrd, |a, b| a > b);
comparison_functor!(Less, PartialOrd, |a, b| a < b);
comparison_functor!(GreaterEqual, PartialOrd, |a, b| a >= b);
comparison_functor!(LessEqual, PartialOrd, |a, b| a <= b);
comparison_functor!(EqualTo, PartialEq, |a, b| a == b);

// ============================================================================
// Builders
// ============================================================================

/// `f(x)` for every element of `a`.
pub fn map<A, F>(a: A, f: F) -> Function<F, (A::Operand,)>
where
    A: IntoOperand,
{
    Function::new(f, (a.into_operand(),))
}

/// `f(x, y)` over `a` and `b` broadcast together.
pub fn zip_with<A, B, F>(a: A, b: B, f: F) -> Function<F, (A::Operand, B::Operand)>
where
    A: IntoOperand,
    B: IntoOperand,
{
    Function::new(f, (a.into_operand(), b.into_operand()))
}

/// `f(x, y, z)` over `a`, `b` and `c` broadcast together.
pub fn zip3_with<A, B, C, F>(
    a: A,
    b: B,
    c: C,
    f: F,
) -> Function<F, (A::Operand, B::Operand, C::Operand)>
where
    A: IntoOperand,
    B: IntoOperand,
    C: IntoOperand,
{
    Function::new(f, (a.into_operand(), b.into_operand(), c.into_operand()))
}

macro_rules! comparison_builder {
    ($(#[$doc:meta])* $fn_name:ident, $functor:ident) => {
        $(#[$doc])*
        pub fn $fn_name<A, B>(a: A, b: B) -> Function<$functor, (A::Operand, B::Operand)>
        where
            A: IntoOperand,
            B: IntoOperand,
        {
            Function::new($functor, (a.into_operand(), b.into_operand()))
        }
    };
}

comparison_builder!(
    /// Elementwise `a > b`.
    gt, Greater
);
comparison_builder!(
    /// Elementwise `a < b`.
    lt, Less
);
comparison_builder!(ge, GreaterEqual);
comparison_builder!(le, LessEqual);
comparison_builder!(
    /// Elementwise `a == b`.
    equal, EqualTo
);

// ============================================================================
// Operators
// ============================================================================

macro_rules! binary_op {
    ($Trait:ident, $method:ident, $Functor:ident, [$($g:tt)*] $lhs:ty) => {
        impl<$($g)*, Rhs: IntoOperand> $Trait<Rhs> for $lhs
        where
            $lhs: Expression,
        {
            type Output = Function<$Functor, ($lhs, Rhs::Operand)>;

            #[inline]
            fn $method(self, rhs: Rhs) -> Self::Output {
                Function::new($Functor, (self, rhs.into_operand()))
            }
        }
    };
}

macro_rules! scalar_left_op {
    ($Trait:ident, $method:ident, $Functor:ident, $s:ty, [$($g:tt)*] $rhs:ty) => {
        impl<$($g)*> $Trait<$rhs> for $s
        where
            $rhs: Expression<Elem = $s>,
        {
            type Output = Function<$Functor, (Scalar<$s>, $rhs)>;

            #[inline]
            fn $method(self, rhs: $rhs) -> Self::Output {
                Function::new($Functor, (Scalar(self), rhs))
            }
        }
    };
}

// The generics travel as one bracketed token tree so they can be repeated
// once per scalar type.
macro_rules! scalar_left_ops {
    (@one $g:tt $rhs:ty; $s:ty) => {
        scalar_left_op!(Add, add, Plus, $s, $g $rhs);
        scalar_left_op!(Sub, sub, Minus, $s, $g $rhs);
        scalar_left_op!(Mul, mul, Multiplies, $s, $g $rhs);
        scalar_left_op!(Div, div, Divides, $s, $g $rhs);
    };
    ($g:tt $rhs:ty; $($s:ty),*) => {
        $(scalar_left_ops!(@one $g $rhs; $s);)*
    };
}

macro_rules! impl_expression_ops {
    ($([$($g:tt)*] $node:ty;)*) => {
        $(
            binary_op!(Add, add, Plus, [$($g)*] $node);
            binary_op!(Sub, sub, Minus, [$($g)*] $node);
            binary_op!(Mul, mul, Multiplies, [$($g)*] $node);
            binary_op!(Div, div, Divides, [$($g)*] $node);

            impl<$($g)*> Neg for $node
            where
                $node: Expression,
            {
                type Output = Function<Negate, ($node,)>;

                #[inline]
                fn neg(self) -> Self::Output {
                    Function::new(Negate, (self,))
                }
            }

            scalar_left_ops!([$($g)*] $node; f32, f64, i32, i64);
        )*
    };
}

impl_expression_ops! {
    [T: Copy, L: LayoutTag] Array<T, L>;
    ['a, T: Copy, L: LayoutTag] &'a Array<T, L>;
    [F, O] Function<F, O>;
    ['a, F, O] &'a Function<F, O>;
    [F] Generator<F>;
    ['a, F] &'a Generator<F>;
    [E] Broadcast<E>;
    ['a, E] &'a Broadcast<E>;
    [E] StridedView<E>;
    ['a, E] &'a StridedView<E>;
    ['a, 'v, T: Copy] &'a StridedViewMut<'v, T>;
    [E] IndexView<E>;
    ['a, E] &'a IndexView<E>;
    [E, P] FunctorView<E, P>;
    ['a, E, P] &'a FunctorView<E, P>;
    [E: Expression, F] Reducer<E, F>;
    ['a, E: Expression, F] &'a Reducer<E, F>;
    [T: Copy] Scalar<T>;
}
