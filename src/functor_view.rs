//! Views that pass every element through a projection.
//!
//! [`real`] and [`imag`] are the common cases: a complex array seen as its
//! real or imaginary parts. The writable variants store through the
//! projection, so `imag_mut(&mut a)` can be assigned like any container.

use num_complex::Complex;

use crate::assign::AssignTarget;
use crate::expression::{Expression, IntoOperand};
use crate::layout::Layout;
use crate::stepper::{Steppable, Stepper, StepperMut, StrideCursor};
use crate::strides::CutPoint;
use crate::tags::TensorTag;
use crate::view::{StorageMut, StridedViewMut};
use crate::Result;

/// Element-wise read mapping of a view.
pub trait Projection<T> {
    type Output: Copy;

    fn project(&self, value: T) -> Self::Output;
}

/// A projection that can also write a projected value back.
pub trait ProjectionMut<T>: Projection<T> {
    fn store(&self, slot: &mut T, value: Self::Output);
}

impl<T, R: Copy, F: Fn(T) -> R> Projection<T> for F {
    type Output = R;

    #[inline]
    fn project(&self, value: T) -> R {
        self(value)
    }
}

/// Real part.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Real;

/// Imaginary part. Zero for real element types.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Imag;

impl<F: Copy> Projection<Complex<F>> for Real {
    type Output = F;

    #[inline]
    fn project(&self, value: Complex<F>) -> F {
        value.re
    }
}

impl<F: Copy> ProjectionMut<Complex<F>> for Real {
    #[inline]
    fn store(&self, slot: &mut Complex<F>, value: F) {
        slot.re = value;
    }
}

impl<F: Copy> Projection<Complex<F>> for Imag {
    type Output = F;

    #[inline]
    fn project(&self, value: Complex<F>) -> F {
        value.im
    }
}

impl<F: Copy> ProjectionMut<Complex<F>> for Imag {
    #[inline]
    fn store(&self, slot: &mut Complex<F>, value: F) {
        slot.im = value;
    }
}

macro_rules! impl_real_projections {
    ($($t:ty),*) => {
        $(
            impl Projection<$t> for Real {
                type Output = $t;

                #[inline]
                fn project(&self, value: $t) -> $t {
                    value
                }
            }

            impl ProjectionMut<$t> for Real {
                #[inline]
                fn store(&self, slot: &mut $t, value: $t) {
                    *slot = value;
                }
            }

            impl Projection<$t> for Imag {
                type Output = $t;

                #[inline]
                fn project(&self, _value: $t) -> $t {
                    0.0
                }
            }
        )*
    };
}

impl_real_projections!(f32, f64);

// ============================================================================
// Read-only
// ============================================================================

/// `proj(e[i])` for every element of `e`.
#[derive(Clone, Debug)]
pub struct FunctorView<E, P> {
    expr: E,
    proj: P,
}

impl<E, P> FunctorView<E, P> {
    pub fn inner(&self) -> &E {
        &self.expr
    }
}

pub fn functor_view<E, P>(e: E, proj: P) -> FunctorView<E, P>
where
    E: Expression,
    P: Projection<E::Elem>,
{
    FunctorView { expr: e, proj }
}

pub fn real<E>(e: E) -> FunctorView<E, Real>
where
    E: Expression,
    Real: Projection<E::Elem>,
{
    functor_view(e, Real)
}

pub fn imag<E>(e: E) -> FunctorView<E, Imag>
where
    E: Expression,
    Imag: Projection<E::Elem>,
{
    functor_view(e, Imag)
}

impl<E, P> Expression for FunctorView<E, P>
where
    E: Expression,
    P: Projection<E::Elem>,
{
    type Elem = P::Output;
    type Tag = E::Tag;
    type Stepper<'a> = ProjectedStepper<'a, E::Stepper<'a>, P> where Self: 'a;

    const STATIC_LAYOUT: Layout = E::STATIC_LAYOUT;
    const CONTIGUOUS_LAYOUT: bool = false;
    const STRIDED_LOOP: bool = E::STRIDED_LOOP;

    #[inline]
    fn shape(&self) -> &[usize] {
        self.expr.shape()
    }
    #[inline]
    fn layout(&self) -> Layout {
        self.expr.layout()
    }
    #[inline]
    fn is_contiguous(&self) -> bool {
        self.expr.is_contiguous()
    }
    #[inline]
    fn get(&self, index: &[usize]) -> P::Output {
        self.proj.project(self.expr.get(index))
    }
    #[inline]
    fn broadcast_shape(&self, shape: &mut [usize]) -> Result<bool> {
        self.expr.broadcast_shape(shape)
    }
    #[inline]
    fn has_linear_assign(&self, strides: &[isize]) -> bool {
        self.expr.has_linear_assign(strides)
    }
    #[inline]
    fn linear_get(&self, i: usize) -> P::Output {
        self.proj.project(self.expr.linear_get(i))
    }
    #[inline]
    fn strides(&self) -> Option<&[isize]> {
        self.expr.strides()
    }
    #[inline]
    fn check_strides(&self, cut: &mut CutPoint<'_>) -> bool {
        self.expr.check_strides(cut)
    }
    fn stepper_begin(&self, shape: &[usize]) -> Self::Stepper<'_> {
        ProjectedStepper {
            inner: self.expr.stepper_begin(shape),
            proj: &self.proj,
        }
    }
}

impl<E, P> IntoOperand for FunctorView<E, P>
where
    E: Expression,
    P: Projection<E::Elem>,
{
    type Operand = Self;

    #[inline]
    fn into_operand(self) -> Self {
        self
    }
}

/// Wraps an inner stepper and projects what it reads.
pub struct ProjectedStepper<'a, S, P> {
    inner: S,
    proj: &'a P,
}

impl<S: PartialEq, P> PartialEq for ProjectedStepper<'_, S, P> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<S: Steppable, P> Steppable for ProjectedStepper<'_, S, P> {
    #[inline]
    fn step(&mut self, dim: usize, n: usize) {
        self.inner.step(dim, n)
    }
    #[inline]
    fn step_back(&mut self, dim: usize, n: usize) {
        self.inner.step_back(dim, n)
    }
    #[inline]
    fn reset(&mut self, dim: usize) {
        self.inner.reset(dim)
    }
    #[inline]
    fn reset_back(&mut self, dim: usize) {
        self.inner.reset_back(dim)
    }
    #[inline]
    fn to_begin(&mut self) {
        self.inner.to_begin()
    }
    #[inline]
    fn to_end(&mut self, layout: Layout) {
        self.inner.to_end(layout)
    }
}

impl<S: Stepper, P: Projection<S::Elem>> Stepper for ProjectedStepper<'_, S, P> {
    type Elem = P::Output;

    #[inline]
    fn get(&self) -> P::Output {
        self.proj.project(self.inner.get())
    }
    #[inline]
    fn step_leading(&mut self) {
        self.inner.step_leading()
    }
}

// ============================================================================
// Writable
// ============================================================================

/// Writable projection of borrowed storage.
#[derive(Debug)]
pub struct FunctorViewMut<'a, T, P> {
    view: StridedViewMut<'a, T>,
    proj: P,
}

pub fn functor_view_mut<'a, S, P>(s: &'a mut S, proj: P) -> FunctorViewMut<'a, S::Elem, P>
where
    S: StorageMut + ?Sized,
    P: ProjectionMut<S::Elem>,
{
    FunctorViewMut {
        view: StridedViewMut::new(s),
        proj,
    }
}

pub fn real_mut<'a, S>(s: &'a mut S) -> FunctorViewMut<'a, S::Elem, Real>
where
    S: StorageMut + ?Sized,
    Real: ProjectionMut<S::Elem>,
{
    functor_view_mut(s, Real)
}

pub fn imag_mut<'a, S>(s: &'a mut S) -> FunctorViewMut<'a, S::Elem, Imag>
where
    S: StorageMut + ?Sized,
    Imag: ProjectionMut<S::Elem>,
{
    functor_view_mut(s, Imag)
}

impl<T: Copy, P: ProjectionMut<T>> FunctorViewMut<'_, T, P> {
    pub fn fill(&mut self, value: P::Output) {
        let proj = &self.proj;
        self.view.map_inplace(|slot| proj.store(slot, value));
    }
}

impl<T: Copy, P: ProjectionMut<T>> Expression for FunctorViewMut<'_, T, P> {
    type Elem = P::Output;
    type Tag = TensorTag;
    type Stepper<'b> = ProjectedStepper<'b, crate::stepper::ContainerStepper<'b, T>, P> where Self: 'b;

    const STATIC_LAYOUT: Layout = Layout::Dynamic;
    const CONTIGUOUS_LAYOUT: bool = false;
    const STRIDED_LOOP: bool = true;

    #[inline]
    fn shape(&self) -> &[usize] {
        self.view.shape()
    }
    fn layout(&self) -> Layout {
        self.view.layout()
    }
    /// Never packed: the elements are not stored as `P::Output`.
    fn is_contiguous(&self) -> bool {
        false
    }
    #[inline]
    fn get(&self, index: &[usize]) -> P::Output {
        self.proj.project(self.view.get(index))
    }
    fn has_linear_assign(&self, strides: &[isize]) -> bool {
        self.view.has_linear_assign(strides)
    }
    #[inline]
    fn linear_get(&self, i: usize) -> P::Output {
        self.proj.project(self.view.linear_get(i))
    }
    #[inline]
    fn strides(&self) -> Option<&[isize]> {
        self.view.strides()
    }
    fn check_strides(&self, cut: &mut CutPoint<'_>) -> bool {
        self.view.check_strides(cut)
    }
    fn stepper_begin(&self, shape: &[usize]) -> Self::Stepper<'_> {
        ProjectedStepper {
            inner: self.view.stepper_begin(shape),
            proj: &self.proj,
        }
    }
}

impl<T: Copy, P: ProjectionMut<T>> AssignTarget for FunctorViewMut<'_, T, P> {
    const RESIZABLE: bool = false;
    type TargetStepper<'b> = ProjectedStepperMut<'b, T, P> where Self: 'b;

    fn resize(&mut self, shape: &[usize]) -> Result<()> {
        self.view.resize(shape)
    }

    fn stepper_mut(&mut self, shape: &[usize]) -> ProjectedStepperMut<'_, T, P> {
        let (data, strides, backstrides, offset) = self.view.raw_parts_mut();
        ProjectedStepperMut {
            data,
            cursor: StrideCursor::new(strides, backstrides, offset, shape.len()),
            proj: &self.proj,
        }
    }

    fn linear_mut(&mut self) -> Option<&mut [P::Output]> {
        None
    }
}

/// Writable stepper storing through a projection.
pub struct ProjectedStepperMut<'a, T, P> {
    data: &'a mut [T],
    cursor: StrideCursor<'a>,
    proj: &'a P,
}

impl<T, P> PartialEq for ProjectedStepperMut<'_, T, P> {
    fn eq(&self, other: &Self) -> bool {
        self.cursor == other.cursor
    }
}

impl<T, P> Steppable for ProjectedStepperMut<'_, T, P> {
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

impl<T: Copy, P: ProjectionMut<T>> Stepper for ProjectedStepperMut<'_, T, P> {
    type Elem = P::Output;

    #[inline]
    fn get(&self) -> P::Output {
        self.proj.project(self.data[self.cursor.offset_index()])
    }
    #[inline]
    fn step_leading(&mut self) {
        self.cursor.step_leading()
    }
}

impl<T: Copy, P: ProjectionMut<T>> StepperMut for ProjectedStepperMut<'_, T, P> {
    #[inline]
    fn set(&mut self, value: P::Output) {
        let i = self.cursor.offset_index();
        self.proj.store(&mut self.data[i], value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assign, assign_with, dynamic_view_mut, idx, Array, Strategy};
    use approx::assert_relative_eq;

    fn complex_grid() -> Array<Complex<f64>> {
        Array::from_fn(&[2, 3], |i| Complex::new(i[0] as f64, i[1] as f64 + 0.5))
    }

    #[test]
    fn test_real_and_imag_read() {
        let a = complex_grid();
        let re = real(&a);
        let im = imag(&a);
        assert_eq!(re.shape(), &[2, 3]);
        assert_relative_eq!(re.get(&[1, 2]), 1.0);
        assert_relative_eq!(im.get(&[1, 2]), 2.5);
        let summed = Array::<f64>::from_expr(&(&re + &im)).unwrap();
        assert_relative_eq!(summed[[1, 0]], 1.5);
    }

    #[test]
    fn test_imag_of_real_array_is_zero() {
        let a = Array::<_>::from_elem(&[3], 2.0f64);
        assert!(imag(&a).iter().all(|x| x == 0.0));
        assert!(real(&a).iter().all(|x| x == 2.0));
    }

    #[test]
    fn test_closure_projection() {
        let a = Array::<_>::from_shape_vec(&[4], vec![1i32, -2, 3, -4]).unwrap();
        let v = functor_view(&a, |x: i32| x.abs());
        assert_eq!(v.iter().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_imag_mut_assign_writes_through() {
        let mut a = complex_grid();
        let src = Array::<_>::from_shape_vec(&[3], vec![10.0, 20.0, 30.0]).unwrap();
        {
            let mut im = imag_mut(&mut a);
            assign(&mut im, &src).unwrap();
        }
        assert_relative_eq!(a[[1, 2]].im, 30.0);
        assert_relative_eq!(a[[1, 2]].re, 1.0);
    }

    #[test]
    fn test_real_mut_strategies_agree() {
        let src = Array::<_>::from_fn(&[2, 3], |i| (i[0] * 3 + i[1]) as f64);
        for strategy in [Strategy::StridedBlocked, Strategy::Generic] {
            let mut a = complex_grid();
            {
                let mut re = real_mut(&mut a);
                assign_with(&mut re, &src, strategy).unwrap();
            }
            let back = Array::<f64>::from_expr(&real(&a)).unwrap();
            assert_eq!(back.as_slice(), src.as_slice());
        }
    }

    #[test]
    fn test_fill_through_nested_view() {
        let mut a = complex_grid();
        {
            let mut row = dynamic_view_mut(&mut a, &[idx(0)]).unwrap();
            real_mut(&mut row).fill(-1.0);
        }
        assert!(a.as_slice()[..3].iter().all(|c| c.re == -1.0));
        assert_relative_eq!(a[[1, 0]].re, 1.0);
    }
}
