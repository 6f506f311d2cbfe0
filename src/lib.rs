//! Lazy N-dimensional array expressions with broadcasting and strategy-selecting assignment.
//!
//! Arithmetic on arrays, views, broadcasts and generators builds a tree of
//! lazy nodes. Nothing is computed until the tree is assigned into a
//! destination, at which point the assignment engine resolves the broadcast
//! shape once and picks the fastest legal evaluation loop.
//!
//! # Core Types
//!
//! - [`Array`]: owned, resizable dense container (row- or column-major)
//! - [`Function`]: elementwise combination of 1 to 6 operands through a functor
//! - [`Generator`]: values computed from the logical index alone
//! - [`StridedView`] / [`StridedViewMut`]: shape/stride/offset re-indexing of a parent
//! - [`IndexView`], [`FunctorView`], [`Broadcast`], [`Reducer`]: the remaining node kinds
//! - [`OptionalArray`] / [`OptionalAssembly`]: value + flag expressions plugged in through the tag registry
//!
//! # Evaluation
//!
//! - [`assign`]: broadcast-resolve, resize and evaluate with the selected [`Strategy`]
//! - [`assign_with`]: same, with a forced strategy
//! - [`accumulate`], [`cumsum`], [`cumprod`]: eager scans
//! - [`reduce`], [`sum`], [`prod`], [`sum_axes`]: reductions
//!
//! Every strategy produces identical results; the choice only affects speed:
//!
//! | Strategy | Used when |
//! |---|---|
//! | `SimdLinear` | both sides contiguous, same layout, vectorizable element types |
//! | `Linear` | both sides contiguous, same layout |
//! | `StridedBlocked` | a contiguous inner run exists but the whole range is not flat |
//! | `Generic` | always legal; N-dimensional odometer over steppers |
//!
//! # Example
//!
//! ```rust
//! use strided_expr::{Array, Expression};
//!
//! let a = Array::<_>::from_shape_vec(&[3, 4], (1..=12).map(|x| x as f64).collect()).unwrap();
//! let b = Array::<_>::from_shape_vec(&[4], vec![10.0, 20.0, 30.0, 40.0]).unwrap();
//!
//! // Nothing is evaluated here: `&a + &b` is a lazy node of shape [3, 4].
//! let expr = &a + &b;
//! assert_eq!(expr.shape(), &[3, 4]);
//!
//! let c = Array::<f64>::from_expr(&expr).unwrap();
//! assert_eq!(c[[2, 3]], 52.0);
//! ```
//!
//! # Views
//!
//! ```rust
//! use strided_expr::{dynamic_view_mut, idx, range, Array, Expression};
//!
//! let mut a = Array::<_>::from_shape_vec(&[3, 4], (1..=12).collect::<Vec<i32>>()).unwrap();
//! let mut row = dynamic_view_mut(&mut a, &[idx(1), range(1, 4)]).unwrap();
//! assert_eq!(row.shape(), &[3]);
//! row.fill(0);
//! assert_eq!(a.as_slice(), &[1, 2, 3, 4, 5, 0, 0, 0, 9, 10, 11, 12]);
//! ```

pub mod accumulate;
pub mod array;
pub mod assign;
pub mod broadcast;
pub mod cast;
pub mod expression;
pub mod function;
pub mod functor_view;
pub mod generator;
pub mod index_view;
pub mod iter;
pub(crate) mod kernel;
pub mod layout;
pub mod ops;
pub mod optional;
pub mod reduce;
pub mod scalar;
pub(crate) mod simd;
pub mod stepper;
pub mod strides;
pub mod tags;
pub(crate) mod threading;
pub mod view;

pub use accumulate::{accumulate, accumulate_with_init, cumprod, cumsum};
pub use array::Array;
pub use assign::{assign, assign_with, select_strategy, AssignTarget, Strategy};
pub use broadcast::{broadcast, full, ones, zeros, Broadcast};
pub use cast::{needs_cast, simd_assignable, AssignCast, ElemKind, Element};
pub use expression::{contiguous_slice, resolved_shape, Expression, IntoOperand};
pub use function::{Function, FunctionStepper, Functor, Operands};
pub use functor_view::{
    functor_view, functor_view_mut, imag, imag_mut, real, real_mut, FunctorView, FunctorViewMut,
    Imag, Projection, ProjectionMut, Real,
};
pub use generator::{arange, eye, generate, linspace, Generator, GeneratorFn};
pub use index_view::{filter, filter_mut, index_view, index_view_mut, IndexView, IndexViewMut};
pub use iter::StepperIter;
pub use layout::{compute_layout, ColumnMajor, Layout, LayoutTag, RowMajor};
pub use ops::{
    equal, ge, gt, le, lt, map, zip3_with, zip_with, Divides, EqualTo, Greater, GreaterEqual, Less,
    LessEqual, Minus, Multiplies, Negate, Plus,
};
pub use optional::{
    map_optional, optional_view, zip_optional, OptionalArray, OptionalAssembly, OptionalExpression,
    OptionalOperand, OptionalTarget,
};
pub use reduce::{prod, prod_axes, reduce, reduce_axes, sum, sum_axes, Reducer};
pub use scalar::Scalar;
pub use stepper::{increment_stepper, Steppable, Stepper, StepperMut};
pub use strides::{broadcast_shape, broadcastable, data_offset, ravel_index, unravel_index};
pub use tags::{AssignDispatch, ExpressionTag, JoinedTag, OptionalTag, TensorTag};
pub use threading::{MaybeSend, MaybeSync};
pub use view::{
    all, diagonal, drop, dynamic_view, dynamic_view_mut, idx, keep, newaxis, range, range_from,
    range_step, range_to, strided_view, transpose, transpose_mut, SliceSpec, StorageMut, StridedView,
    StridedViewMut,
};

/// Minimum number of elements in the SIMD-linear bulk before it is split
/// across rayon workers.
pub const PARALLEL_THRESHOLD: usize = 1 << 15;

/// Vector register width assumed for alignment and batch sizing.
pub const SIMD_BATCH_BYTES: usize = 32;

/// Loops shorter than this skip the runtime SIMD dispatch.
pub const SIMD_DISPATCH_THRESHOLD: usize = 64;

/// Error type for expression construction and assignment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StridedError {
    #[error("cannot broadcast shape {input:?} into {output:?}")]
    BroadcastMismatch {
        input: Vec<usize>,
        output: Vec<usize>,
    },
    #[error("rank mismatch: {0} vs {1}")]
    RankMismatch(usize, usize),
    #[error("shape mismatch: {0:?} vs {1:?}")]
    ShapeMismatch(Vec<usize>, Vec<usize>),
    #[error("invalid axis {axis} for rank {rank}")]
    InvalidAxis { axis: usize, rank: usize },
    #[error("index {index:?} out of bounds for shape {shape:?}")]
    IndexOutOfBounds { index: Vec<usize>, shape: Vec<usize> },
    #[error("{given} slices given for an expression of rank {rank}")]
    TooManySlices { given: usize, rank: usize },
    #[error("slice step cannot be zero")]
    ZeroSliceStep,
    #[error("stride and dims length mismatch")]
    StrideLengthMismatch,
    #[error("offset overflow while computing view bounds")]
    OffsetOverflow,
    #[error("size mismatch: expected {expected} elements, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("assignment strategy {0:?} is not legal for these operands")]
    StrategyUnavailable(Strategy),
    #[error("illegal layout state: {0}")]
    IllegalLayout(&'static str),
    #[error("keep/drop slices are read-only; use index_view_mut to write selected elements")]
    IndexListNotWritable,
}

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, StridedError>;
