//! Optional values stored as a value array plus a flag array.
//!
//! [`OptionalArray`] carries [`OptionalTag`], so assigning into it is routed
//! to the `OptionalTag` specialization below. That specialization knows
//! nothing about broadcasting or evaluation loops: it splits both sides into
//! their value and flag halves and hands each pair back to the ordinary
//! tensor engine.
//!
//! Arithmetic on optionals builds an [`OptionalAssembly`]: the operator is
//! applied to the value halves, and the result is present only where every
//! operand is present.

use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::array::Array;
use crate::assign::AssignTarget;
use crate::expression::{resolved_shape, Expression, IntoOperand};
use crate::function::{Function, Functor};
use crate::layout::{compute_layout, fold_layouts, Layout, LayoutTag, RowMajor};
use crate::ops::{Divides, Minus, Multiplies, Negate, Plus};
use crate::scalar::Scalar;
use crate::stepper::{ContainerStepper, Steppable, Stepper};
use crate::strides::CutPoint;
use crate::view::{dynamic_view, SliceSpec, StridedView};
use crate::tags::{AssignDispatch, OptionalTag, TensorTag};
use crate::{Result, StridedError};

/// An expression of `Option` elements that can be split into values and
/// presence flags of the same shape.
pub trait OptionalExpression: Expression<Tag = OptionalTag> {
    type Values: Expression<Tag = TensorTag>;
    type Flags: Expression<Elem = bool, Tag = TensorTag>;

    fn values(&self) -> &Self::Values;

    fn has_value(&self) -> &Self::Flags;
}

impl<E: OptionalExpression + ?Sized> OptionalExpression for &E {
    type Values = E::Values;
    type Flags = E::Flags;

    #[inline]
    fn values(&self) -> &E::Values {
        (**self).values()
    }

    #[inline]
    fn has_value(&self) -> &E::Flags {
        (**self).has_value()
    }
}

/// A writable optional expression.
pub trait OptionalTarget: Expression<Tag = OptionalTag> {
    type Values: AssignTarget<Tag = TensorTag>;
    type Flags: AssignTarget<Elem = bool, Tag = TensorTag>;

    /// Both halves at once, for independent assignment.
    fn split_mut(&mut self) -> (&mut Self::Values, &mut Self::Flags);
}

/// Dense optional container.
#[derive(Clone, Debug, PartialEq)]
pub struct OptionalArray<T, L: LayoutTag = RowMajor> {
    values: Array<T, L>,
    flags: Array<bool, L>,
}

impl<T: Copy, L: LayoutTag> OptionalArray<T, L> {
    /// # Errors
    ///
    /// [`StridedError::ShapeMismatch`] if the halves differ in shape.
    pub fn new(values: Array<T, L>, flags: Array<bool, L>) -> Result<Self> {
        if values.shape() != flags.shape() {
            return Err(StridedError::ShapeMismatch(
                values.shape().to_vec(),
                flags.shape().to_vec(),
            ));
        }
        Ok(Self { values, flags })
    }

    /// Missing elements take `T::default()` as their stored value.
    pub fn from_options(shape: &[usize], data: Vec<Option<T>>) -> Result<Self>
    where
        T: Default,
    {
        let flags = data.iter().map(Option::is_some).collect();
        let values = data.into_iter().map(Option::unwrap_or_default).collect();
        Self::new(
            Array::from_shape_vec(shape, values)?,
            Array::from_shape_vec(shape, flags)?,
        )
    }

    /// Empty container, resized by the first assignment.
    pub fn empty() -> Self
    where
        T: Default,
    {
        Self {
            values: Array::new(),
            flags: Array::new(),
        }
    }

    pub fn values_mut(&mut self) -> &mut Array<T, L> {
        &mut self.values
    }

    pub fn flags_mut(&mut self) -> &mut Array<bool, L> {
        &mut self.flags
    }

    pub fn into_parts(self) -> (Array<T, L>, Array<bool, L>) {
        (self.values, self.flags)
    }
}

impl<T: Copy, L: LayoutTag> Expression for OptionalArray<T, L> {
    type Elem = Option<T>;
    type Tag = OptionalTag;
    type Stepper<'a> = OptionalStepper<ContainerStepper<'a, T>, ContainerStepper<'a, bool>>
    where
        Self: 'a;

    const STATIC_LAYOUT: Layout = L::LAYOUT;
    const CONTIGUOUS_LAYOUT: bool = true;
    const STRIDED_LOOP: bool = true;

    #[inline]
    fn shape(&self) -> &[usize] {
        self.values.shape()
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
    fn get(&self, index: &[usize]) -> Option<T> {
        self.flags.get(index).then(|| self.values.get(index))
    }
    #[inline]
    fn has_linear_assign(&self, strides: &[isize]) -> bool {
        self.values.has_linear_assign(strides)
    }
    #[inline]
    fn linear_get(&self, i: usize) -> Option<T> {
        self.flags.linear_get(i).then(|| self.values.linear_get(i))
    }
    #[inline]
    fn strides(&self) -> Option<&[isize]> {
        self.values.strides()
    }
    #[inline]
    fn check_strides(&self, cut: &mut CutPoint<'_>) -> bool {
        self.values.check_strides(cut)
    }
    fn stepper_begin(&self, shape: &[usize]) -> Self::Stepper<'_> {
        OptionalStepper {
            values: self.values.stepper_begin(shape),
            flags: self.flags.stepper_begin(shape),
        }
    }
}

impl<T: Copy, L: LayoutTag> IntoOperand for OptionalArray<T, L> {
    type Operand = Self;

    #[inline]
    fn into_operand(self) -> Self {
        self
    }
}

impl<T: Copy, L: LayoutTag> OptionalExpression for OptionalArray<T, L> {
    type Values = Array<T, L>;
    type Flags = Array<bool, L>;

    #[inline]
    fn values(&self) -> &Array<T, L> {
        &self.values
    }

    #[inline]
    fn has_value(&self) -> &Array<bool, L> {
        &self.flags
    }
}

impl<T: Copy + Default, L: LayoutTag> OptionalTarget for OptionalArray<T, L> {
    type Values = Array<T, L>;
    type Flags = Array<bool, L>;

    fn split_mut(&mut self) -> (&mut Array<T, L>, &mut Array<bool, L>) {
        (&mut self.values, &mut self.flags)
    }
}

/// Value and flag steppers moving in lockstep.
pub struct OptionalStepper<V, M> {
    values: V,
    flags: M,
}

impl<V: PartialEq, M: PartialEq> PartialEq for OptionalStepper<V, M> {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values && self.flags == other.flags
    }
}

impl<V: Steppable, M: Steppable> Steppable for OptionalStepper<V, M> {
    #[inline]
    fn step(&mut self, dim: usize, n: usize) {
        self.values.step(dim, n);
        self.flags.step(dim, n);
    }
    #[inline]
    fn step_back(&mut self, dim: usize, n: usize) {
        self.values.step_back(dim, n);
        self.flags.step_back(dim, n);
    }
    #[inline]
    fn reset(&mut self, dim: usize) {
        self.values.reset(dim);
        self.flags.reset(dim);
    }
    #[inline]
    fn reset_back(&mut self, dim: usize) {
        self.values.reset_back(dim);
        self.flags.reset_back(dim);
    }
    #[inline]
    fn to_begin(&mut self) {
        self.values.to_begin();
        self.flags.to_begin();
    }
    #[inline]
    fn to_end(&mut self, layout: Layout) {
        self.values.to_end(layout);
        self.flags.to_end(layout);
    }
}

impl<V: Stepper, M: Stepper<Elem = bool>> Stepper for OptionalStepper<V, M> {
    type Elem = Option<V::Elem>;

    #[inline]
    fn get(&self) -> Option<V::Elem> {
        self.flags.get().then(|| self.values.get())
    }
    #[inline]
    fn step_leading(&mut self) {
        self.values.step_leading();
        self.flags.step_leading();
    }
}

/// A lazy optional expression built from a value expression and a flag
/// expression of the same shape.
#[derive(Clone, Debug)]
pub struct OptionalAssembly<V, M> {
    values: V,
    flags: M,
}

impl<V, M> OptionalAssembly<V, M>
where
    V: Expression<Tag = TensorTag>,
    M: Expression<Elem = bool, Tag = TensorTag>,
{
    /// # Errors
    ///
    /// [`StridedError::ShapeMismatch`] if `values` and `flags` differ in shape.
    pub fn new(values: V, flags: M) -> Result<Self> {
        if values.shape() != flags.shape() {
            return Err(StridedError::ShapeMismatch(
                values.shape().to_vec(),
                flags.shape().to_vec(),
            ));
        }
        Ok(Self { values, flags })
    }

    pub fn into_parts(self) -> (V, M) {
        (self.values, self.flags)
    }
}

impl<V, M> Expression for OptionalAssembly<V, M>
where
    V: Expression<Tag = TensorTag>,
    M: Expression<Elem = bool, Tag = TensorTag>,
{
    type Elem = Option<V::Elem>;
    type Tag = OptionalTag;
    type Stepper<'a> = OptionalStepper<V::Stepper<'a>, M::Stepper<'a>> where Self: 'a;

    const STATIC_LAYOUT: Layout = fold_layouts(&[V::STATIC_LAYOUT, M::STATIC_LAYOUT]);
    const CONTIGUOUS_LAYOUT: bool = V::CONTIGUOUS_LAYOUT && M::CONTIGUOUS_LAYOUT;
    const STRIDED_LOOP: bool = V::STRIDED_LOOP && M::STRIDED_LOOP;

    #[inline]
    fn shape(&self) -> &[usize] {
        self.values.shape()
    }
    #[inline]
    fn layout(&self) -> Layout {
        compute_layout(self.values.layout(), self.flags.layout())
    }
    #[inline]
    fn is_contiguous(&self) -> bool {
        self.values.is_contiguous() && self.flags.is_contiguous()
    }
    #[inline]
    fn get(&self, index: &[usize]) -> Self::Elem {
        self.flags.get(index).then(|| self.values.get(index))
    }
    fn broadcast_shape(&self, shape: &mut [usize]) -> Result<bool> {
        let values = self.values.broadcast_shape(shape)?;
        let flags = self.flags.broadcast_shape(shape)?;
        Ok(values && flags)
    }
    #[inline]
    fn has_linear_assign(&self, strides: &[isize]) -> bool {
        self.values.has_linear_assign(strides) && self.flags.has_linear_assign(strides)
    }
    #[inline]
    fn linear_get(&self, i: usize) -> Self::Elem {
        self.flags.linear_get(i).then(|| self.values.linear_get(i))
    }
    #[inline]
    fn check_strides(&self, cut: &mut CutPoint<'_>) -> bool {
        self.values.check_strides(cut) && self.flags.check_strides(cut)
    }
    fn stepper_begin(&self, shape: &[usize]) -> Self::Stepper<'_> {
        OptionalStepper {
            values: self.values.stepper_begin(shape),
            flags: self.flags.stepper_begin(shape),
        }
    }
}

impl<V, M> OptionalExpression for OptionalAssembly<V, M>
where
    V: Expression<Tag = TensorTag>,
    M: Expression<Elem = bool, Tag = TensorTag>,
{
    type Values = V;
    type Flags = M;

    #[inline]
    fn values(&self) -> &V {
        &self.values
    }

    #[inline]
    fn has_value(&self) -> &M {
        &self.flags
    }
}

/// View of both halves of an optional container through the same slices.
pub fn optional_view<'a, T: Copy, L: LayoutTag>(
    o: &'a OptionalArray<T, L>,
    specs: &[SliceSpec],
) -> Result<OptionalAssembly<StridedView<&'a Array<T, L>>, StridedView<&'a Array<bool, L>>>> {
    Ok(OptionalAssembly {
        values: dynamic_view(&o.values, specs)?,
        flags: dynamic_view(&o.flags, specs)?,
    })
}

// ============================================================================
// Operands and operators
// ============================================================================

/// `true` for any element; the flag half of a plain tensor operand.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Present;

impl<A> Functor<(A,)> for Present {
    type Output = bool;

    #[inline(always)]
    fn call(&self, _: (A,)) -> bool {
        true
    }
}

/// Logical AND of two presence flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BothPresent;

impl Functor<(bool, bool)> for BothPresent {
    type Output = bool;

    #[inline(always)]
    fn call(&self, (a, b): (bool, bool)) -> bool {
        a && b
    }
}

/// Anything that splits into a value half and a flag half.
///
/// Optional containers and assemblies split into their halves. Plain arrays
/// and numbers are always present.
pub trait OptionalOperand {
    type Values: Expression<Tag = TensorTag>;
    type Flags: Expression<Elem = bool, Tag = TensorTag>;

    fn split(self) -> (Self::Values, Self::Flags);
}

impl<'a, T: Copy, L: LayoutTag> OptionalOperand for &'a OptionalArray<T, L> {
    type Values = &'a Array<T, L>;
    type Flags = &'a Array<bool, L>;

    #[inline]
    fn split(self) -> (Self::Values, Self::Flags) {
        (&self.values, &self.flags)
    }
}

impl<V, M> OptionalOperand for OptionalAssembly<V, M>
where
    V: Expression<Tag = TensorTag>,
    M: Expression<Elem = bool, Tag = TensorTag>,
{
    type Values = V;
    type Flags = M;

    #[inline]
    fn split(self) -> (V, M) {
        (self.values, self.flags)
    }
}

impl<'a, V, M> OptionalOperand for &'a OptionalAssembly<V, M>
where
    V: Expression<Tag = TensorTag>,
    M: Expression<Elem = bool, Tag = TensorTag>,
{
    type Values = &'a V;
    type Flags = &'a M;

    #[inline]
    fn split(self) -> (&'a V, &'a M) {
        (&self.values, &self.flags)
    }
}

impl<'a, T: Copy, L: LayoutTag> OptionalOperand for &'a Array<T, L> {
    type Values = &'a Array<T, L>;
    type Flags = Function<Present, (&'a Array<T, L>,)>;

    #[inline]
    fn split(self) -> (Self::Values, Self::Flags) {
        (self, Function::new(Present, (self,)))
    }
}

macro_rules! scalar_optional_operand {
    ($($s:ty),*) => {
        $(
            impl OptionalOperand for $s {
                type Values = Scalar<$s>;
                type Flags = Scalar<bool>;

                #[inline]
                fn split(self) -> (Scalar<$s>, Scalar<bool>) {
                    (Scalar(self), Scalar(true))
                }
            }
        )*
    };
}

scalar_optional_operand!(f32, f64, i32, i64);

type BinaryAssembly<Op, A, B> = OptionalAssembly<
    Function<Op, (<A as OptionalOperand>::Values, <B as OptionalOperand>::Values)>,
    Function<BothPresent, (<A as OptionalOperand>::Flags, <B as OptionalOperand>::Flags)>,
>;

/// `f(x, y)` over the values of `a` and `b`, present where both are.
pub fn zip_optional<A, B, F>(a: A, b: B, f: F) -> BinaryAssembly<F, A, B>
where
    A: OptionalOperand,
    B: OptionalOperand,
{
    let (av, af) = a.split();
    let (bv, bf) = b.split();
    OptionalAssembly {
        values: Function::new(f, (av, bv)),
        flags: Function::new(BothPresent, (af, bf)),
    }
}

/// `f(x)` over the values of `a`; missing elements stay missing.
pub fn map_optional<A, F>(a: A, f: F) -> OptionalAssembly<Function<F, (A::Values,)>, A::Flags>
where
    A: OptionalOperand,
{
    let (values, flags) = a.split();
    OptionalAssembly {
        values: Function::new(f, (values,)),
        flags,
    }
}

macro_rules! optional_binary_op {
    ($Trait:ident, $method:ident, $Functor:ident, [$($g:tt)*] $lhs:ty) => {
        impl<$($g)*, Rhs: OptionalOperand> $Trait<Rhs> for $lhs
        where
            $lhs: OptionalOperand,
        {
            type Output = BinaryAssembly<$Functor, $lhs, Rhs>;

            #[inline]
            fn $method(self, rhs: Rhs) -> Self::Output {
                zip_optional(self, rhs, $Functor)
            }
        }
    };
}

macro_rules! impl_optional_ops {
    ($([$($g:tt)*] $node:ty;)*) => {
        $(
            optional_binary_op!(Add, add, Plus, [$($g)*] $node);
            optional_binary_op!(Sub, sub, Minus, [$($g)*] $node);
            optional_binary_op!(Mul, mul, Multiplies, [$($g)*] $node);
            optional_binary_op!(Div, div, Divides, [$($g)*] $node);

            impl<$($g)*> Neg for $node
            where
                $node: OptionalOperand,
            {
                type Output = OptionalAssembly<
                    Function<Negate, (<$node as OptionalOperand>::Values,)>,
                    <$node as OptionalOperand>::Flags,
                >;

                #[inline]
                fn neg(self) -> Self::Output {
                    map_optional(self, Negate)
                }
            }
        )*
    };
}

impl_optional_ops! {
    ['a, T: Copy, L: LayoutTag] &'a OptionalArray<T, L>;
    [V, M] OptionalAssembly<V, M>;
    ['a, V, M] &'a OptionalAssembly<V, M>;
}

// Both halves are resolved before either is written, so a broadcast error in
// one leaves the destination untouched.
fn check_halves<S: OptionalExpression>(src: &S) -> Result<()> {
    let values = resolved_shape(src.values())?;
    let flags = resolved_shape(src.has_value())?;
    if values != flags {
        return Err(StridedError::ShapeMismatch(values.to_vec(), flags.to_vec()));
    }
    Ok(())
}

impl<D, S> AssignDispatch<D, S> for OptionalTag
where
    D: OptionalTarget,
    S: OptionalExpression,
    TensorTag: AssignDispatch<D::Values, S::Values> + AssignDispatch<D::Flags, S::Flags>,
{
    fn assign_xexpression(dest: &mut D, src: &S) -> Result<()> {
        check_halves(src)?;
        tracing::trace!(shape = ?src.shape(), "assigning optional expression as value and flag halves");
        let (values, flags) = dest.split_mut();
        <TensorTag as AssignDispatch<D::Values, S::Values>>::assign_xexpression(values, src.values())?;
        <TensorTag as AssignDispatch<D::Flags, S::Flags>>::assign_xexpression(flags, src.has_value())
    }

    fn assign_data(dest: &mut D, src: &S, trivial: bool) -> Result<()> {
        check_halves(src)?;
        let (values, flags) = dest.split_mut();
        <TensorTag as AssignDispatch<D::Values, S::Values>>::assign_data(values, src.values(), trivial)?;
        <TensorTag as AssignDispatch<D::Flags, S::Flags>>::assign_data(flags, src.has_value(), trivial)
    }
}
