//! Shape and stride arithmetic: broadcasting, offsets, stride computation.
//!
//! Conventions used throughout the crate:
//!
//! - strides are signed element counts (views may reverse a dimension)
//! - a dimension of size 1 always carries stride 0 and backstride 0, so
//!   stepping along a broadcast dimension never moves
//! - index lists are right-aligned against shapes: extra leading indices are
//!   ignored, missing leading indices are treated as 0

use crate::layout::Layout;
use crate::{Result, StridedError};

/// Number of elements of a shape (1 for rank 0).
#[inline]
pub fn total_len(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Broadcast `input` into `output` in place.
///
/// Dimensions are aligned from the right. An `output` entry equal to
/// `usize::MAX` is unset and takes the input size; an output 1 grows to the
/// input size; an input 1 stretches to the output size. Returns `true` when
/// no broadcasting happened, i.e. `input` already equals the resulting shape.
///
/// # Errors
///
/// [`StridedError::RankMismatch`] if `output` has fewer dimensions than
/// `input`, [`StridedError::BroadcastMismatch`] if two sizes differ and
/// neither is 1.
pub fn broadcast_shape(input: &[usize], output: &mut [usize]) -> Result<bool> {
    if output.len() < input.len() {
        return Err(StridedError::RankMismatch(input.len(), output.len()));
    }
    let mut trivial = input.len() == output.len();
    let offset = output.len() - input.len();
    for (i, &size) in input.iter().enumerate().rev() {
        let out = &mut output[offset + i];
        if *out == usize::MAX {
            *out = size;
        } else if *out == 1 {
            *out = size;
            trivial &= size == 1;
        } else if size == 1 {
            trivial = false;
        } else if size != *out {
            return Err(StridedError::BroadcastMismatch {
                input: input.to_vec(),
                output: output.iter().map(|&d| if d == usize::MAX { 1 } else { d }).collect(),
            });
        }
    }
    Ok(trivial)
}

/// Whether `input` can be broadcast into the fixed shape `output` without
/// growing it.
pub fn broadcastable(input: &[usize], output: &[usize]) -> bool {
    if input.len() > output.len() {
        return false;
    }
    input
        .iter()
        .rev()
        .zip(output.iter().rev())
        .all(|(&i, &o)| i == o || i == 1)
}

/// Dot product of `strides` and `index`, both right-aligned.
#[inline]
pub fn data_offset(strides: &[isize], index: &[usize]) -> isize {
    strides
        .iter()
        .rev()
        .zip(index.iter().rev())
        .map(|(&s, &i)| s * i as isize)
        .sum()
}

/// Strides of a packed buffer of the given shape.
///
/// `ColumnMajor` packs from the left; every other layout packs from the
/// right. Size-1 dimensions get stride 0.
pub fn compute_strides(shape: &[usize], layout: Layout) -> Vec<isize> {
    let mut strides = vec![0isize; shape.len()];
    let mut acc = 1isize;
    let mut visit = |i: usize| {
        strides[i] = if shape[i] == 1 { 0 } else { acc };
        acc *= shape[i] as isize;
    };
    if layout.is_column_major() {
        (0..shape.len()).for_each(&mut visit);
    } else {
        (0..shape.len()).rev().for_each(&mut visit);
    }
    strides
}

/// `stride * (size - 1)` per dimension.
pub fn compute_backstrides(shape: &[usize], strides: &[isize]) -> Vec<isize> {
    shape
        .iter()
        .zip(strides)
        .map(|(&d, &s)| s * (d.saturating_sub(1)) as isize)
        .collect()
}

/// Writes the multi-index of the `flat`-th element of `shape` enumerated in
/// `layout` order into `out`.
pub fn unravel_index(mut flat: usize, shape: &[usize], layout: Layout, out: &mut [usize]) {
    debug_assert_eq!(shape.len(), out.len());
    let mut visit = |i: usize| {
        let d = shape[i].max(1);
        out[i] = flat % d;
        flat /= d;
    };
    if layout.is_column_major() {
        (0..shape.len()).for_each(&mut visit);
    } else {
        (0..shape.len()).rev().for_each(&mut visit);
    }
}

/// Inverse of [`unravel_index`]: flat position of `index` within `shape`
/// enumerated in `layout` order.
pub fn ravel_index(index: &[usize], shape: &[usize], layout: Layout) -> usize {
    debug_assert_eq!(shape.len(), index.len());
    let fold = |acc: usize, i: usize| acc * shape[i] + index[i];
    if layout.is_column_major() {
        (0..shape.len()).rev().fold(0, fold)
    } else {
        (0..shape.len()).fold(0, fold)
    }
}

/// Row-major overlap: number of leading destination dimensions left over
/// once the trailing strides of `src` stop matching those of `dst`.
///
/// Returns `dst.len()` if even the last strides differ.
pub fn check_strides_overlap_row(dst: &[isize], src: &[isize]) -> usize {
    let mut d = dst.len();
    let mut s = src.len();
    while s != 0 && d != 0 {
        if dst[d - 1] != src[s - 1] {
            break;
        }
        d -= 1;
        s -= 1;
    }
    d
}

/// Column-major overlap: number of leading dimensions whose strides match.
///
/// Operands of different rank never overlap.
pub fn check_strides_overlap_col(dst: &[isize], src: &[isize]) -> usize {
    if dst.len() != src.len() {
        return 0;
    }
    dst.iter().zip(src).take_while(|(a, b)| a == b).count()
}

/// Accumulates the cut point of the strided-blocked loop across the leaves of
/// an expression tree.
///
/// Row-major cuts keep the maximum over leaves (the outer loop covers
/// dimensions `[0, cut)`); column-major cuts keep the minimum (the inner loop
/// covers dimensions `[0, cut)`).
#[derive(Debug, Clone)]
pub struct CutPoint<'a> {
    dst_strides: &'a [isize],
    row_major: bool,
    cut: usize,
}

impl<'a> CutPoint<'a> {
    pub fn new(dst_strides: &'a [isize], row_major: bool) -> Self {
        let cut = if row_major { 0 } else { dst_strides.len() };
        Self {
            dst_strides,
            row_major,
            cut,
        }
    }

    /// Folds one leaf's strides into the cut.
    pub fn update(&mut self, strides: &[isize]) {
        if self.row_major {
            self.cut = self.cut.max(check_strides_overlap_row(self.dst_strides, strides));
        } else {
            self.cut = self.cut.min(check_strides_overlap_col(self.dst_strides, strides));
        }
    }

    #[inline]
    pub fn cut(&self) -> usize {
        self.cut
    }

    #[inline]
    pub fn is_row_major(&self) -> bool {
        self.row_major
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_shape_fresh_output() {
        let mut out = vec![usize::MAX; 2];
        assert!(broadcast_shape(&[3, 4], &mut out).unwrap());
        assert_eq!(out, vec![3, 4]);
    }

    #[test]
    fn test_broadcast_shape_grows_ones() {
        let mut out = vec![3, 1];
        assert!(!broadcast_shape(&[4], &mut out).unwrap());
        assert_eq!(out, vec![3, 4]);
    }

    #[test]
    fn test_broadcast_shape_lower_rank_not_trivial() {
        let mut out = vec![3, 4];
        assert!(!broadcast_shape(&[4], &mut out).unwrap());
        assert_eq!(out, vec![3, 4]);
    }

    #[test]
    fn test_broadcast_shape_input_one_stretches() {
        let mut out = vec![3, 4];
        assert!(!broadcast_shape(&[1, 4], &mut out).unwrap());
        assert_eq!(out, vec![3, 4]);
    }

    #[test]
    fn test_broadcast_shape_mismatch() {
        let mut out = vec![3, 4];
        let err = broadcast_shape(&[5], &mut out).unwrap_err();
        assert_eq!(
            err,
            StridedError::BroadcastMismatch {
                input: vec![5],
                output: vec![3, 4]
            }
        );
    }

    #[test]
    fn test_broadcast_shape_rank_error() {
        let mut out = vec![4];
        assert!(matches!(
            broadcast_shape(&[3, 4], &mut out),
            Err(StridedError::RankMismatch(2, 1))
        ));
    }

    #[test]
    fn test_broadcastable() {
        assert!(broadcastable(&[4], &[3, 4]));
        assert!(broadcastable(&[1, 4], &[3, 4]));
        assert!(!broadcastable(&[3, 4], &[4]));
        assert!(!broadcastable(&[2, 4], &[3, 4]));
        assert!(broadcastable(&[], &[3, 4]));
    }

    #[test]
    fn test_data_offset_right_aligned() {
        let strides = [12, 4, 1];
        assert_eq!(data_offset(&strides, &[1, 2, 3]), 12 + 8 + 3);
        assert_eq!(data_offset(&strides, &[2, 3]), 8 + 3);
        assert_eq!(data_offset(&strides, &[9, 1, 2, 3]), 12 + 8 + 3);
        assert_eq!(data_offset(&[], &[5]), 0);
    }

    #[test]
    fn test_compute_strides_row_and_col() {
        assert_eq!(compute_strides(&[2, 3, 4], Layout::RowMajor), vec![12, 4, 1]);
        assert_eq!(compute_strides(&[2, 3, 4], Layout::ColumnMajor), vec![1, 2, 6]);
        assert_eq!(compute_strides(&[3, 1, 4], Layout::RowMajor), vec![4, 0, 1]);
        assert_eq!(compute_strides(&[3, 1, 4], Layout::ColumnMajor), vec![1, 0, 3]);
        assert!(compute_strides(&[], Layout::RowMajor).is_empty());
    }

    #[test]
    fn test_backstrides() {
        let shape = [3, 1, 4];
        let strides = compute_strides(&shape, Layout::RowMajor);
        assert_eq!(compute_backstrides(&shape, &strides), vec![8, 0, 3]);
    }

    #[test]
    fn test_unravel_index() {
        let mut idx = [0usize; 3];
        unravel_index(23, &[2, 3, 4], Layout::RowMajor, &mut idx);
        assert_eq!(idx, [1, 2, 3]);
        unravel_index(5, &[2, 3, 4], Layout::RowMajor, &mut idx);
        assert_eq!(idx, [0, 1, 1]);
        unravel_index(5, &[2, 3, 4], Layout::ColumnMajor, &mut idx);
        assert_eq!(idx, [1, 2, 0]);
    }

    #[test]
    fn test_ravel_inverts_unravel() {
        let shape = [2, 3, 4];
        let mut idx = [0usize; 3];
        for layout in [Layout::RowMajor, Layout::ColumnMajor] {
            for flat in 0..24 {
                unravel_index(flat, &shape, layout, &mut idx);
                assert_eq!(ravel_index(&idx, &shape, layout), flat);
            }
        }
        assert_eq!(ravel_index(&[], &[], Layout::RowMajor), 0);
    }

    #[test]
    fn test_check_strides_overlap() {
        assert_eq!(check_strides_overlap_row(&[4, 1], &[4, 1]), 0);
        assert_eq!(check_strides_overlap_row(&[4, 1], &[0, 1]), 1);
        assert_eq!(check_strides_overlap_row(&[4, 1], &[1]), 1);
        assert_eq!(check_strides_overlap_row(&[4, 1], &[1, 3]), 2);
        assert_eq!(check_strides_overlap_col(&[1, 3], &[1, 3]), 2);
        assert_eq!(check_strides_overlap_col(&[1, 3], &[1, 0]), 1);
        assert_eq!(check_strides_overlap_col(&[1, 3], &[1]), 0);
    }

    #[test]
    fn test_cut_point_row_major_takes_max() {
        let dst = [12isize, 4, 1];
        let mut cut = CutPoint::new(&dst, true);
        cut.update(&[12, 4, 1]);
        assert_eq!(cut.cut(), 0);
        cut.update(&[0, 4, 1]);
        assert_eq!(cut.cut(), 1);
        cut.update(&[4, 1]);
        assert_eq!(cut.cut(), 1);
    }

    #[test]
    fn test_cut_point_col_major_takes_min() {
        let dst = [1isize, 2, 6];
        let mut cut = CutPoint::new(&dst, false);
        assert_eq!(cut.cut(), 3);
        cut.update(&[1, 2, 0]);
        assert_eq!(cut.cut(), 2);
        cut.update(&[1, 0, 0]);
        assert_eq!(cut.cut(), 1);
    }
}
