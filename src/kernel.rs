//! Evaluation loops behind the assignment strategies.
//!
//! Every kernel assumes shape resolution already ran: the destination has its
//! final shape and the source broadcasts into it.

use smallvec::{smallvec, SmallVec};

use crate::assign::AssignTarget;
use crate::cast::{AssignCast, Element};
use crate::expression::Expression;
use crate::layout::default_assignable_layout;
use crate::simd;
use crate::stepper::{increment_stepper, Steppable, Stepper, StepperMut};
use crate::strides::{total_len, CutPoint};
use crate::threading::{for_each_batch, MaybeSend, MaybeSync};
use crate::{Result, StridedError, SIMD_BATCH_BYTES};

const NOT_FLAT: &str = "linear assignment needs flat destination storage";

// ============================================================================
// Linear
// ============================================================================

pub(crate) fn linear_assign<D, S>(dest: &mut D, src: &S) -> Result<()>
where
    D: AssignTarget,
    D::Elem: Element,
    S: Expression,
    S::Elem: AssignCast<D::Elem>,
{
    let dst = dest.linear_mut().ok_or(StridedError::IllegalLayout(NOT_FLAT))?;
    for (i, d) in dst.iter_mut().enumerate() {
        *d = src.linear_get(i).assign_cast();
    }
    Ok(())
}

/// Linear loop split into an unaligned scalar prefix, an aligned bulk of
/// whole vector batches, and a scalar suffix.
pub(crate) fn simd_linear_assign<D, S>(dest: &mut D, src: &S) -> Result<()>
where
    D: AssignTarget,
    D::Elem: Element + MaybeSend,
    S: Expression + MaybeSync,
    S::Elem: AssignCast<D::Elem>,
{
    let dst = dest.linear_mut().ok_or(StridedError::IllegalLayout(NOT_FLAT))?;
    let n = dst.len();
    let lanes = <D::Elem as Element>::KIND.lanes().max(1);
    let align_begin = dst.as_ptr().align_offset(SIMD_BATCH_BYTES).min(n);
    let bulk = (n - align_begin) / lanes * lanes;
    let align_end = align_begin + bulk;

    let (head, rest) = dst.split_at_mut(align_begin);
    let (mid, tail) = rest.split_at_mut(bulk);

    for (i, d) in head.iter_mut().enumerate() {
        *d = src.linear_get(i).assign_cast();
    }
    if bulk > 0 {
        for_each_batch(mid, lanes, |offset, batch| {
            let base = align_begin + offset;
            for (j, d) in batch.iter_mut().enumerate() {
                *d = src.linear_get(base + j).assign_cast();
            }
        });
    }
    for (k, d) in tail.iter_mut().enumerate() {
        *d = src.linear_get(align_end + k).assign_cast();
    }
    Ok(())
}

// ============================================================================
// Generic
// ============================================================================

/// Steps destination and source together through every index of the
/// destination shape.
pub(crate) fn generic_assign<D, S>(dest: &mut D, src: &S)
where
    D: AssignTarget,
    D::Elem: Element,
    S: Expression,
    S::Elem: AssignCast<D::Elem>,
{
    let shape: SmallVec<[usize; 8]> = SmallVec::from_slice(dest.shape());
    let size = total_len(&shape);
    if size == 0 {
        return;
    }
    let layout = default_assignable_layout(D::STATIC_LAYOUT);
    let mut index: SmallVec<[usize; 8]> = smallvec![0; shape.len()];
    let mut pair = (dest.stepper_mut(&shape), src.stepper_begin(&shape));
    for _ in 0..size {
        let value = pair.1.get().assign_cast();
        pair.0.set(value);
        increment_stepper(&mut pair, &mut index, &shape, layout);
    }
}

// ============================================================================
// Strided blocked
// ============================================================================

/// Split of the destination shape into an outer odometer and a contiguous
/// inner run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LoopSizes {
    pub(crate) row_major: bool,
    pub(crate) inner: usize,
    pub(crate) outer: usize,
    /// Row-major: number of outer dimensions. Column-major: number of inner
    /// dimensions.
    pub(crate) cut: usize,
}

/// Loop split for assigning `src` into a destination with `dst_strides`, or
/// `None` if no inner run longer than one element exists.
///
/// Rank-1 destinations are treated as row-major.
pub(crate) fn loop_sizes<S: Expression>(
    dst_strides: &[isize],
    shape: &[usize],
    src: &S,
) -> Option<LoopSizes> {
    let n = shape.len();
    if n == 0 {
        return None;
    }
    let last_nonzero = dst_strides.iter().rev().find(|&&s| s != 0);
    let first_nonzero = dst_strides.iter().find(|&&s| s != 0);
    let row_major = if last_nonzero == Some(&1) {
        true
    } else if first_nonzero == Some(&1) {
        false
    } else {
        return None;
    };

    let mut cut_point = CutPoint::new(dst_strides, row_major);
    if !src.check_strides(&mut cut_point) {
        return None;
    }
    // The inner run covers a single dimension.
    let cut = if row_major {
        cut_point.cut().max(n - 1)
    } else {
        cut_point.cut().min(1)
    };

    let head = total_len(&shape[..cut]);
    let tail = total_len(&shape[cut..]);
    let (outer, inner) = if row_major { (head, tail) } else { (tail, head) };
    (inner > 1).then_some(LoopSizes {
        row_major,
        inner,
        outer,
        cut,
    })
}

/// Odometer over the outer dimensions, in the destination's traversal order.
fn next_outer_index(idx: &mut [usize], max_shape: &[usize], row_major: bool) {
    let n = idx.len();
    for k in 0..n {
        let i = if row_major { n - 1 - k } else { k };
        if idx[i] + 1 >= max_shape[i] {
            idx[i] = 0;
        } else {
            idx[i] += 1;
            break;
        }
    }
}

pub(crate) fn strided_assign<D, S>(dest: &mut D, src: &S, sizes: &LoopSizes)
where
    D: AssignTarget,
    D::Elem: Element,
    S: Expression,
    S::Elem: AssignCast<D::Elem>,
{
    let shape: SmallVec<[usize; 8]> = SmallVec::from_slice(dest.shape());
    let (max_shape, step_dim): (SmallVec<[usize; 8]>, usize) = if sizes.row_major {
        (SmallVec::from_slice(&shape[..sizes.cut]), 0)
    } else {
        (SmallVec::from_slice(&shape[sizes.cut..]), sizes.cut)
    };
    let mut idx: SmallVec<[usize; 8]> = smallvec![0; max_shape.len()];

    let mut res = dest.stepper_mut(&shape);
    let mut fct = src.stepper_begin(&shape);

    simd::dispatch_for::<D::Elem, _>(sizes.inner, || {
        for _ in 0..sizes.outer {
            for _ in 0..sizes.inner {
                res.set(fct.get().assign_cast());
                res.step_leading();
                fct.step_leading();
            }
            next_outer_index(&mut idx, &max_shape, sizes.row_major);
            res.to_begin();
            fct.to_begin();
            for (i, &k) in idx.iter().enumerate() {
                res.step(i + step_dim, k);
                fct.step(i + step_dim, k);
            }
        }
    });
}
