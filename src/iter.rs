//! Iteration over any expression, driven by its stepper.

use smallvec::{smallvec, SmallVec};

use crate::expression::Expression;
use crate::layout::Layout;
use crate::stepper::{increment_stepper, Stepper};
use crate::strides::total_len;
use crate::{Result, StridedError};

/// Iterator over the elements of an expression, broadcast to a target shape
/// and enumerated in a chosen layout order.
pub struct StepperIter<'a, E: Expression + 'a> {
    stepper: E::Stepper<'a>,
    shape: SmallVec<[usize; 8]>,
    index: SmallVec<[usize; 8]>,
    layout: Layout,
    remaining: usize,
}

impl<'a, E: Expression> StepperIter<'a, E> {
    /// Iterate `e` broadcast to `shape` in `layout` order.
    ///
    /// If `e` cannot be broadcast to `shape` the iterator is empty.
    pub fn new(e: &'a E, shape: &[usize], layout: Layout) -> Self {
        let remaining = match check_target(e, shape) {
            Ok(()) => total_len(shape),
            Err(_) => 0,
        };
        Self {
            stepper: e.stepper_begin(shape),
            shape: SmallVec::from_slice(shape),
            index: smallvec![0; shape.len()],
            layout,
            remaining,
        }
    }

    /// Like [`new`](StepperIter::new), but fails if `e` cannot be broadcast
    /// to `shape`.
    pub fn try_new(e: &'a E, shape: &[usize], layout: Layout) -> Result<Self> {
        check_target(e, shape)?;
        Ok(Self::new(e, shape, layout))
    }

    /// Multi-index of the element the next call to `next` yields.
    pub fn index(&self) -> &[usize] {
        &self.index
    }
}

fn check_target<E: Expression>(e: &E, shape: &[usize]) -> Result<()> {
    let mut target: SmallVec<[usize; 8]> = SmallVec::from_slice(shape);
    e.broadcast_shape(&mut target)?;
    if target.as_slice() != shape {
        return Err(StridedError::BroadcastMismatch {
            input: e.shape().to_vec(),
            output: shape.to_vec(),
        });
    }
    Ok(())
}

impl<E: Expression> Iterator for StepperIter<'_, E> {
    type Item = E::Elem;

    #[inline]
    fn next(&mut self) -> Option<E::Elem> {
        if self.remaining == 0 {
            return None;
        }
        let value = self.stepper.get();
        self.remaining -= 1;
        increment_stepper(&mut self.stepper, &mut self.index, &self.shape, self.layout);
        Some(value)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<E: Expression> ExactSizeIterator for StepperIter<'_, E> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Array;

    #[test]
    fn test_iter_broadcast_target() {
        let a = Array::<_>::from_shape_vec(&[3], vec![1, 2, 3]).unwrap();
        let values: Vec<i32> = StepperIter::new(&a, &[2, 3], Layout::RowMajor).collect();
        assert_eq!(values, vec![1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn test_iter_column_major_order() {
        let a = Array::<_>::from_shape_vec(&[2, 2], vec![1, 2, 3, 4]).unwrap();
        let values: Vec<i32> = StepperIter::new(&a, &[2, 2], Layout::ColumnMajor).collect();
        assert_eq!(values, vec![1, 3, 2, 4]);
    }

    #[test]
    fn test_iter_empty_shape_yields_nothing() {
        let a = Array::<f64>::zeros(&[0, 3]);
        assert_eq!(a.iter().count(), 0);
    }

    #[test]
    fn test_try_new_rejects_non_broadcastable_target() {
        let a = Array::<_>::from_shape_vec(&[3], vec![1, 2, 3]).unwrap();
        assert!(matches!(
            StepperIter::try_new(&a, &[2, 4], Layout::RowMajor),
            Err(StridedError::BroadcastMismatch { .. })
        ));
        assert_eq!(StepperIter::new(&a, &[2, 4], Layout::RowMajor).count(), 0);
        assert!(StepperIter::try_new(&a, &[2, 3], Layout::RowMajor).is_ok());
    }

    #[test]
    fn test_exact_size() {
        let a = Array::<u8>::zeros(&[4, 5]);
        assert_eq!(a.iter().len(), 20);
    }
}
