//! Expression tags: the extension point for alternative element semantics.
//!
//! Every node carries an associated [`ExpressionTag`]. Function nodes join the
//! tags of their operands at the type level, and [`crate::assign`] dispatches
//! on the joined tag of destination and source through [`AssignDispatch`].
//! The core engine is implemented for [`TensorTag`]; the optional-value
//! container registers [`OptionalTag`] and decomposes itself into plain
//! tensor assignments (see [`crate::optional`]).

use crate::expression::Expression;
use crate::Result;

/// Type-level tag of an expression kind.
pub trait ExpressionTag: 'static {
    /// Tag of an expression combining `Self` with `Other`.
    type Join<Other: ExpressionTag>: ExpressionTag;
}

/// Ordinary numeric expressions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TensorTag;

/// Expressions of optional values stored as separate value and flag arrays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OptionalTag;

impl ExpressionTag for TensorTag {
    type Join<Other: ExpressionTag> = Other;
}

impl ExpressionTag for OptionalTag {
    type Join<Other: ExpressionTag> = OptionalTag;
}

/// Tag selecting the assignment specialization for `dest = src`.
pub type JoinedTag<D, S> =
    <<D as Expression>::Tag as ExpressionTag>::Join<<S as Expression>::Tag>;

/// Assignment specialization registered for a tag.
///
/// `assign_xexpression` runs the whole assignment including the
/// shape-resolution phase; `assign_data` assumes the destination already has
/// the right shape and `trivial` tells whether the source is broadcast.
pub trait AssignDispatch<D: ?Sized, S: ?Sized> {
    fn assign_xexpression(dest: &mut D, src: &S) -> Result<()>;

    fn assign_data(dest: &mut D, src: &S, trivial: bool) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::TypeId;

    fn join<A: ExpressionTag, B: ExpressionTag>() -> TypeId {
        TypeId::of::<<A as ExpressionTag>::Join<B>>()
    }

    #[test]
    fn test_tag_join_table() {
        assert_eq!(join::<TensorTag, TensorTag>(), TypeId::of::<TensorTag>());
        assert_eq!(join::<TensorTag, OptionalTag>(), TypeId::of::<OptionalTag>());
        assert_eq!(join::<OptionalTag, TensorTag>(), TypeId::of::<OptionalTag>());
        assert_eq!(join::<OptionalTag, OptionalTag>(), TypeId::of::<OptionalTag>());
    }
}
