//! Layout tags and layout compatibility rules.

/// Linear-buffer traversal convention of an expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Layout {
    /// Rightmost dimension varies fastest.
    RowMajor,
    /// Leftmost dimension varies fastest.
    ColumnMajor,
    /// Only known at runtime, possibly neither row- nor column-major.
    Dynamic,
    /// Compatible with every other layout (scalars, 0-D and 1-D data).
    Any,
}

/// Traversal order used when a destination does not impose one.
pub const DEFAULT_TRAVERSAL: Layout = Layout::RowMajor;

impl Layout {
    #[inline]
    pub const fn is_row_major(self) -> bool {
        matches!(self, Layout::RowMajor)
    }

    #[inline]
    pub const fn is_column_major(self) -> bool {
        matches!(self, Layout::ColumnMajor)
    }
}

/// Layout of an expression combining two operands.
///
/// `Any` yields to the other side, identical layouts are kept, and every
/// other pairing degrades to `Dynamic`.
pub const fn compute_layout(lhs: Layout, rhs: Layout) -> Layout {
    match (lhs, rhs) {
        (Layout::Any, other) | (other, Layout::Any) => other,
        (Layout::RowMajor, Layout::RowMajor) => Layout::RowMajor,
        (Layout::ColumnMajor, Layout::ColumnMajor) => Layout::ColumnMajor,
        _ => Layout::Dynamic,
    }
}

/// Folds [`compute_layout`] over a list of layouts. An empty list is `Any`.
pub const fn fold_layouts(layouts: &[Layout]) -> Layout {
    let mut acc = Layout::Any;
    let mut i = 0;
    while i < layouts.len() {
        acc = compute_layout(acc, layouts[i]);
        i += 1;
    }
    acc
}

/// Layout an operand of the given rank effectively has.
///
/// Row- and column-major coincide for rank 0 and 1, so both degrade to `Any`.
pub const fn select_layout(layout: Layout, rank: usize) -> Layout {
    if rank <= 1 {
        match layout {
            Layout::RowMajor | Layout::ColumnMajor => Layout::Any,
            other => other,
        }
    } else {
        layout
    }
}

/// Traversal order the generic assignment loop uses for a destination layout.
pub const fn default_assignable_layout(layout: Layout) -> Layout {
    match layout {
        Layout::ColumnMajor => Layout::ColumnMajor,
        _ => DEFAULT_TRAVERSAL,
    }
}

/// Runtime layout of a strided region, if it is packed without gaps.
///
/// Size-1 dimensions are ignored. Rank 0 and 1 contiguous regions report
/// `Any`. Negative strides are never contiguous.
pub fn contiguous_layout(shape: &[usize], strides: &[isize]) -> Option<Layout> {
    let row = is_packed(shape.iter().rev().zip(strides.iter().rev()));
    let col = is_packed(shape.iter().zip(strides.iter()));
    let effective_rank = shape.iter().filter(|&&d| d != 1).count();
    match (row, col) {
        (true, true) if effective_rank <= 1 => Some(Layout::Any),
        (true, true) => Some(Layout::RowMajor),
        (true, false) => Some(Layout::RowMajor),
        (false, true) => Some(Layout::ColumnMajor),
        (false, false) => None,
    }
}

fn is_packed<'a>(dims: impl Iterator<Item = (&'a usize, &'a isize)>) -> bool {
    let mut expected = 1isize;
    for (&dim, &stride) in dims {
        if dim == 1 {
            continue;
        }
        if stride != expected {
            return false;
        }
        expected *= dim as isize;
    }
    true
}

/// Type-level layout choice for containers.
pub trait LayoutTag: Copy + Default + std::fmt::Debug + Send + Sync + 'static {
    const LAYOUT: Layout;
}

/// Row-major storage marker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RowMajor;

/// Column-major storage marker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ColumnMajor;

impl LayoutTag for RowMajor {
    const LAYOUT: Layout = Layout::RowMajor;
}

impl LayoutTag for ColumnMajor {
    const LAYOUT: Layout = Layout::ColumnMajor;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_layout_any_yields() {
        assert_eq!(compute_layout(Layout::Any, Layout::RowMajor), Layout::RowMajor);
        assert_eq!(compute_layout(Layout::ColumnMajor, Layout::Any), Layout::ColumnMajor);
        assert_eq!(compute_layout(Layout::Any, Layout::Any), Layout::Any);
    }

    #[test]
    fn test_compute_layout_mixed_is_dynamic() {
        assert_eq!(compute_layout(Layout::RowMajor, Layout::ColumnMajor), Layout::Dynamic);
        assert_eq!(compute_layout(Layout::Dynamic, Layout::RowMajor), Layout::Dynamic);
    }

    #[test]
    fn test_fold_layouts() {
        assert_eq!(fold_layouts(&[]), Layout::Any);
        assert_eq!(
            fold_layouts(&[Layout::Any, Layout::RowMajor, Layout::RowMajor]),
            Layout::RowMajor
        );
        assert_eq!(
            fold_layouts(&[Layout::RowMajor, Layout::Any, Layout::ColumnMajor]),
            Layout::Dynamic
        );
    }

    #[test]
    fn test_select_layout_low_rank() {
        assert_eq!(select_layout(Layout::ColumnMajor, 1), Layout::Any);
        assert_eq!(select_layout(Layout::ColumnMajor, 2), Layout::ColumnMajor);
        assert_eq!(select_layout(Layout::Dynamic, 0), Layout::Dynamic);
    }

    #[test]
    fn test_contiguous_layout_detection() {
        assert_eq!(contiguous_layout(&[3, 4], &[4, 1]), Some(Layout::RowMajor));
        assert_eq!(contiguous_layout(&[3, 4], &[1, 3]), Some(Layout::ColumnMajor));
        assert_eq!(contiguous_layout(&[3, 4], &[8, 1]), None);
        assert_eq!(contiguous_layout(&[5], &[1]), Some(Layout::Any));
        assert_eq!(contiguous_layout(&[1, 5, 1], &[0, 1, 0]), Some(Layout::Any));
        assert_eq!(contiguous_layout(&[4], &[-1]), None);
        assert_eq!(contiguous_layout(&[], &[]), Some(Layout::Any));
    }
}
