//! The assignment engine: `dest = src` for any pair of expressions.
//!
//! Assignment runs in two phases. Shape resolution broadcasts the source
//! into the destination shape (resizing the destination if it is allowed to)
//! and records whether the broadcast was trivial. Data assignment then picks
//! one of four evaluation strategies from the static traits of both sides
//! and their runtime layout, and runs it.
//!
//! Which specialization runs is decided by the joined [`crate::tags::ExpressionTag`] of
//! destination and source (see [`crate::tags`]).

use smallvec::{smallvec, SmallVec};

use crate::cast::{simd_assignable, AssignCast, Element};
use crate::expression::Expression;
use crate::kernel;
use crate::layout::{compute_layout, select_layout, Layout};
use crate::stepper::StepperMut;
use crate::strides::broadcastable;
use crate::tags::{AssignDispatch, JoinedTag, TensorTag};
use crate::threading::{MaybeSend, MaybeSync};
use crate::{Result, StridedError};

/// An expression that can be written to.
pub trait AssignTarget: Expression {
    /// Whether shape resolution may change the shape.
    const RESIZABLE: bool;

    type TargetStepper<'a>: StepperMut<Elem = Self::Elem>
    where
        Self: 'a;

    /// Change the shape to exactly `shape`.
    fn resize(&mut self, shape: &[usize]) -> Result<()>;

    /// Writable stepper at the first element, bound to `shape`.
    fn stepper_mut(&mut self, shape: &[usize]) -> Self::TargetStepper<'_>;

    /// The elements as one flat slice in [`Expression::linear_get`] order, if
    /// they are packed.
    fn linear_mut(&mut self) -> Option<&mut [Self::Elem]>;
}

/// Evaluation loop used by the data-assignment phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Flat loop over both sides.
    Linear,
    /// Flat loop in vector-width batches with an aligned bulk.
    SimdLinear,
    /// Outer odometer over the non-contiguous dimensions, flat inner run.
    StridedBlocked,
    /// Full N-dimensional odometer over steppers.
    Generic,
}

/// Evaluate `src` into `dest`.
///
/// A resizable destination takes the broadcast shape of `src`. A fixed-shape
/// destination must be a valid broadcast target for `src`.
///
/// # Errors
///
/// [`StridedError::BroadcastMismatch`] or [`StridedError::RankMismatch`] if
/// the shapes are incompatible; `dest` is left untouched in that case.
pub fn assign<D, S>(dest: &mut D, src: &S) -> Result<()>
where
    D: Expression,
    S: Expression,
    JoinedTag<D, S>: AssignDispatch<D, S>,
{
    <JoinedTag<D, S> as AssignDispatch<D, S>>::assign_xexpression(dest, src)
}

/// [`assign`] with a forced evaluation strategy.
///
/// # Errors
///
/// In addition to the shape errors of [`assign`],
/// [`StridedError::StrategyUnavailable`] if `strategy` is not legal for this
/// pair of operands. [`Strategy::Generic`] is always legal.
pub fn assign_with<D, S>(dest: &mut D, src: &S, strategy: Strategy) -> Result<()>
where
    D: AssignTarget,
    D::Elem: Element + MaybeSend,
    S: Expression + MaybeSync,
    S::Elem: AssignCast<D::Elem>,
{
    let trivial = resolve_shape(dest, src)?;
    tracing::trace!(?strategy, shape = ?dest.shape(), trivial, "forced assignment strategy");
    match strategy {
        Strategy::Linear => {
            if !linear_assignable(dest, src, trivial) {
                return Err(StridedError::StrategyUnavailable(strategy));
            }
            kernel::linear_assign(dest, src)
        }
        Strategy::SimdLinear => {
            if select_strategy(dest, src, trivial) != Strategy::SimdLinear {
                return Err(StridedError::StrategyUnavailable(strategy));
            }
            kernel::simd_linear_assign(dest, src)
        }
        Strategy::StridedBlocked => {
            if !(D::STRIDED_LOOP && S::STRIDED_LOOP) {
                return Err(StridedError::StrategyUnavailable(strategy));
            }
            strided_or_generic(dest, src);
            Ok(())
        }
        Strategy::Generic => {
            kernel::generic_assign(dest, src);
            Ok(())
        }
    }
}

/// Strategy [`assign`] uses for `dest = src` once shapes are resolved.
///
/// `trivial` is the result of shape resolution: whether `src` already has the
/// destination's shape.
pub fn select_strategy<D, S>(dest: &D, src: &S, trivial: bool) -> Strategy
where
    D: AssignTarget,
    D::Elem: Element,
    S: Expression,
    S::Elem: AssignCast<D::Elem>,
{
    let simd = simd_assignable::<S::Elem, D::Elem>();
    if linear_assignable(dest, src, trivial) {
        let runtime_contiguous = dest.is_contiguous()
            && src.is_contiguous()
            && compute_layout(dest.layout(), src.layout()) != Layout::Dynamic;
        if simd && (static_contiguous(dest, src) || runtime_contiguous) {
            Strategy::SimdLinear
        } else {
            Strategy::Linear
        }
    } else if D::STRIDED_LOOP && S::STRIDED_LOOP && simd {
        Strategy::StridedBlocked
    } else {
        Strategy::Generic
    }
}

/// Both types are contiguous by construction and their static layouts agree
/// at the destination's rank.
fn static_contiguous<D: Expression, S: Expression>(dest: &D, _src: &S) -> bool {
    let dim = dest.dimension();
    D::CONTIGUOUS_LAYOUT
        && S::CONTIGUOUS_LAYOUT
        && compute_layout(
            select_layout(D::STATIC_LAYOUT, dim),
            select_layout(S::STATIC_LAYOUT, dim),
        ) != Layout::Dynamic
}

/// Flat iteration over both sides visits the same logical elements.
fn linear_assignable<D: AssignTarget, S: Expression>(dest: &D, src: &S, trivial: bool) -> bool {
    trivial
        && (static_contiguous(dest, src)
            || (dest.is_contiguous()
                && dest
                    .strides()
                    .map_or(false, |strides| src.has_linear_assign(strides))))
}

/// Shape-resolution phase. Returns whether the broadcast is trivial.
///
/// Nothing is written to `dest` before every shape check has passed.
pub(crate) fn resolve_shape<D: AssignTarget, S: Expression>(dest: &mut D, src: &S) -> Result<bool> {
    let mut shape: SmallVec<[usize; 8]> = smallvec![usize::MAX; src.dimension()];
    let trivial = src.broadcast_shape(&mut shape)?;
    if D::RESIZABLE {
        dest.resize(&shape)?;
        return Ok(trivial);
    }
    if !broadcastable(&shape, dest.shape()) {
        return Err(StridedError::BroadcastMismatch {
            input: shape.to_vec(),
            output: dest.shape().to_vec(),
        });
    }
    let mut target: SmallVec<[usize; 8]> = SmallVec::from_slice(dest.shape());
    src.broadcast_shape(&mut target)
}

fn strided_or_generic<D, S>(dest: &mut D, src: &S)
where
    D: AssignTarget,
    S: Expression,
    S::Elem: AssignCast<D::Elem>,
    D::Elem: Element,
{
    let sizes = dest
        .strides()
        .and_then(|strides| kernel::loop_sizes(strides, dest.shape(), src));
    match sizes {
        Some(sizes) => kernel::strided_assign(dest, src, &sizes),
        None => {
            tracing::debug!(shape = ?dest.shape(), "no contiguous inner run, using generic loop");
            kernel::generic_assign(dest, src);
        }
    }
}

impl<D, S> AssignDispatch<D, S> for TensorTag
where
    D: AssignTarget,
    D::Elem: Element + MaybeSend,
    S: Expression + MaybeSync,
    S::Elem: AssignCast<D::Elem>,
{
    fn assign_xexpression(dest: &mut D, src: &S) -> Result<()> {
        let trivial = resolve_shape(dest, src)?;
        Self::assign_data(dest, src, trivial)
    }

    fn assign_data(dest: &mut D, src: &S, trivial: bool) -> Result<()> {
        if <S::Elem as AssignCast<D::Elem>>::NEEDS_CAST {
            tracing::trace!(
                from = std::any::type_name::<S::Elem>(),
                to = std::any::type_name::<D::Elem>(),
                "narrowing or sign-changing conversion in assignment"
            );
        }
        let strategy = select_strategy(dest, src, trivial);
        tracing::trace!(?strategy, shape = ?dest.shape(), trivial, "assigning expression");
        match strategy {
            Strategy::SimdLinear => kernel::simd_linear_assign(dest, src),
            Strategy::Linear => kernel::linear_assign(dest, src),
            Strategy::StridedBlocked => {
                strided_or_generic(dest, src);
                Ok(())
            }
            Strategy::Generic => {
                kernel::generic_assign(dest, src);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ColumnMajor;
    use crate::{Array, Scalar};

    #[test]
    fn test_select_linear_for_same_layout_arrays() {
        let a = Array::<f64>::zeros(&[4, 5]);
        let b = Array::<f64>::zeros(&[4, 5]);
        assert_eq!(select_strategy(&a, &b, true), Strategy::SimdLinear);
        assert_eq!(select_strategy(&a, &b, false), Strategy::StridedBlocked);
    }

    #[test]
    fn test_cast_disables_simd() {
        let d = Array::<f32>::zeros(&[4, 5]);
        let s = Array::<f64>::zeros(&[4, 5]);
        assert_eq!(select_strategy(&d, &s, true), Strategy::Linear);
        assert_eq!(select_strategy(&d, &s, false), Strategy::Generic);
    }

    #[test]
    fn test_mixed_layouts_are_not_linear() {
        let d = Array::<f64, ColumnMajor>::zeros(&[4, 5]);
        let s = Array::<f64>::zeros(&[4, 5]);
        assert_eq!(select_strategy(&d, &s, true), Strategy::StridedBlocked);
    }

    #[test]
    fn test_assign_resizes_and_broadcasts() {
        let mut d = Array::<i32>::zeros(&[1]);
        let s = Array::<_>::from_shape_vec(&[2, 3], (0..6).collect()).unwrap();
        assign(&mut d, &s).unwrap();
        assert_eq!(d.shape(), &[2, 3]);
        assert_eq!(d.as_slice(), s.as_slice());
    }

    #[test]
    fn test_scalar_resizes_array_to_rank_zero() {
        let mut d = Array::<f64>::zeros(&[2, 2]);
        assign_with(&mut d, &Scalar(1.5), Strategy::Generic).unwrap();
        assert_eq!(d.shape(), &[] as &[usize]);
        assert_eq!(d.as_slice(), &[1.5]);
    }

    #[test]
    fn test_scalar_fills_fixed_view() {
        let mut d = Array::<f64>::zeros(&[3, 4]);
        {
            let mut v = crate::dynamic_view_mut(
                &mut d,
                &[crate::range(0, 2), crate::range_step(0, 4, 2)],
            )
            .unwrap();
            assign(&mut v, &Scalar(1.5)).unwrap();
            assert_eq!(v.shape(), &[2, 2]);
        }
        for i in 0..3 {
            for j in 0..4 {
                let expected = if i < 2 && j % 2 == 0 { 1.5 } else { 0.0 };
                assert_eq!(d[[i, j]], expected, "element ({i}, {j})");
            }
        }

        let mut whole = Array::<i32>::zeros(&[2, 3]);
        let mut v = crate::dynamic_view_mut(&mut whole, &[]).unwrap();
        assign_with(&mut v, &Scalar(7), Strategy::Generic).unwrap();
        assert_eq!(whole.as_slice(), &[7; 6]);
    }

    #[test]
    fn test_forced_linear_rejected_when_broadcasting() {
        let mut d = Array::<f64>::zeros(&[2, 3]);
        let s = Array::<_>::from_shape_vec(&[2, 1], vec![1.0, 2.0]).unwrap();
        let mut v = crate::dynamic_view_mut(&mut d, &[]).unwrap();
        assert_eq!(
            assign_with(&mut v, &s, Strategy::Linear),
            Err(StridedError::StrategyUnavailable(Strategy::Linear))
        );
        assign_with(&mut v, &s, Strategy::Generic).unwrap();
        assert_eq!(d.as_slice(), &[1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_generator_has_no_strided_loop() {
        let mut d = Array::<usize>::zeros(&[2, 2]);
        let g = crate::generate(&[2, 2], |i: &[usize]| i[0] + i[1]);
        assert!(matches!(
            assign_with(&mut d, &g, Strategy::StridedBlocked),
            Err(StridedError::StrategyUnavailable(_))
        ));
        assign_with(&mut d, &g, Strategy::Generic).unwrap();
        assert_eq!(d.as_slice(), &[0, 1, 1, 2]);
    }
}
