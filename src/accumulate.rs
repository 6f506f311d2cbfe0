//! Eager prefix scans.
//!
//! Unlike every other operation in this crate, accumulation is not lazy: the
//! operand is copied into a fresh row-major buffer and scanned in place with
//! `buf[k] = f(buf[k - 1], buf[k])`.

use std::ops::{Add, Mul};

use crate::array::Array;
use crate::expression::{resolved_shape, Expression};
use crate::strides::total_len;
use crate::{Result, StridedError};

/// Scan of `e` with `f`.
///
/// With `axis = None` the scan runs over all elements in row-major order
/// and the result is one-dimensional. With `Some(axis)` every line along
/// `axis` is scanned independently and the result keeps the shape of `e`.
///
/// # Errors
///
/// [`StridedError::InvalidAxis`] if `axis` is not below the rank of `e`,
/// checked before any element is read.
pub fn accumulate<E, F>(f: F, e: &E, axis: Option<usize>) -> Result<Array<E::Elem>>
where
    E: Expression,
    F: Fn(E::Elem, E::Elem) -> E::Elem,
{
    accumulate_with_init(f, |x| x, e, axis)
}

/// [`accumulate`] with `init` applied to the first element of every scanned
/// line before the recurrence runs.
pub fn accumulate_with_init<E, F, I>(
    f: F,
    init: I,
    e: &E,
    axis: Option<usize>,
) -> Result<Array<E::Elem>>
where
    E: Expression,
    F: Fn(E::Elem, E::Elem) -> E::Elem,
    I: Fn(E::Elem) -> E::Elem,
{
    let shape = resolved_shape(e)?;
    if let Some(axis) = axis {
        if axis >= shape.len() {
            return Err(StridedError::InvalidAxis {
                axis,
                rank: shape.len(),
            });
        }
    }

    let mut buf: Vec<E::Elem> = e.iter().collect();
    match axis {
        None => {
            if let Some(first) = buf.first_mut() {
                *first = init(*first);
            }
            for k in 1..buf.len() {
                buf[k] = f(buf[k - 1], buf[k]);
            }
            let len = buf.len();
            Array::from_shape_vec(&[len], buf)
        }
        Some(axis) => {
            let axis_len = shape[axis];
            let inner = total_len(&shape[axis + 1..]);
            let outer = total_len(&shape[..axis]);
            for o in 0..outer {
                for j in 0..inner {
                    let base = o * axis_len * inner + j;
                    if axis_len == 0 {
                        continue;
                    }
                    buf[base] = init(buf[base]);
                    for k in 1..axis_len {
                        let (prev, cur) = (base + (k - 1) * inner, base + k * inner);
                        buf[cur] = f(buf[prev], buf[cur]);
                    }
                }
            }
            Array::from_shape_vec(&shape, buf)
        }
    }
}

/// Running sum.
pub fn cumsum<E>(e: &E, axis: Option<usize>) -> Result<Array<E::Elem>>
where
    E: Expression,
    E::Elem: Add<Output = E::Elem>,
{
    accumulate(|a, b| a + b, e, axis)
}

/// Running product.
pub fn cumprod<E>(e: &E, axis: Option<usize>) -> Result<Array<E::Elem>>
where
    E: Expression,
    E::Elem: Mul<Output = E::Elem>,
{
    accumulate(|a, b| a * b, e, axis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ColumnMajor;
    use crate::{transpose, Array};

    #[test]
    fn test_flat_cumsum() {
        let a = Array::<_>::from_shape_vec(&[4], vec![1, 2, 3, 4]).unwrap();
        let c = accumulate(|x, y| x + y, &a, None).unwrap();
        assert_eq!(c.as_slice(), &[1, 3, 6, 10]);
    }

    #[test]
    fn test_axis_out_of_range() {
        let a = Array::<_>::from_shape_vec(&[4], vec![1, 2, 3, 4]).unwrap();
        assert_eq!(
            cumsum(&a, Some(1)).unwrap_err(),
            StridedError::InvalidAxis { axis: 1, rank: 1 }
        );
    }

    #[test]
    fn test_by_axis() {
        let a = Array::<_>::from_shape_vec(&[2, 3], vec![1, 2, 3, 4, 5, 6]).unwrap();
        let rows = cumsum(&a, Some(1)).unwrap();
        assert_eq!(rows.shape(), &[2, 3]);
        assert_eq!(rows.as_slice(), &[1, 3, 6, 4, 9, 15]);
        let cols = cumprod(&a, Some(0)).unwrap();
        assert_eq!(cols.as_slice(), &[1, 2, 3, 4, 10, 18]);
    }

    #[test]
    fn test_flattened_is_row_major() {
        let c = Array::<i32, ColumnMajor>::from_fn(&[2, 2], |i| (i[0] * 2 + i[1]) as i32);
        let s = cumsum(&c, None).unwrap();
        assert_eq!(s.as_slice(), &[0, 1, 3, 6]);
        let t = transpose(&c, &[]).unwrap();
        assert_eq!(cumsum(&t, None).unwrap().as_slice(), &[0, 2, 3, 6]);
    }

    #[test]
    fn test_init_applied_to_line_heads() {
        let a = Array::<_>::from_shape_vec(&[2, 2], vec![1, 2, 3, 4]).unwrap();
        let r = accumulate_with_init(|x, y| x + y, |x| x * 100, &a, Some(1)).unwrap();
        assert_eq!(r.as_slice(), &[100, 102, 300, 304]);
        let flat = accumulate_with_init(|x, y| x + y, |x| x - 1, &a, None).unwrap();
        assert_eq!(flat.as_slice(), &[0, 2, 5, 9]);
    }

    #[test]
    fn test_empty_axis() {
        let a = Array::<f64>::zeros(&[3, 0]);
        assert_eq!(cumsum(&a, Some(1)).unwrap().shape(), &[3, 0]);
        assert_eq!(cumsum(&a, None).unwrap().shape(), &[0]);
    }
}
