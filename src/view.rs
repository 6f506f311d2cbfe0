//! Strided views: shape/stride/offset re-indexing of a parent expression.
//!
//! A read-only [`StridedView`] works over any expression. When the parent
//! exposes flat storage the view indexes it directly; otherwise positions
//! are interpreted in the parent's row-major enumeration and mapped back to
//! coordinates on access (the flat adaptor).
//!
//! A [`StridedViewMut`] borrows the storage of a container (or of another
//! mutable view) and writes through to it.

use smallvec::{smallvec, SmallVec};

use crate::array::Array;
use crate::assign::AssignTarget;
use crate::expression::{resolved_shape, Expression, IntoOperand};
use crate::layout::{contiguous_layout, Layout, LayoutTag};
use crate::stepper::{ContainerStepper, ContainerStepperMut, Steppable, Stepper, StrideCursor};
use crate::strides::{compute_strides, data_offset, total_len, unravel_index, CutPoint};
use crate::tags::TensorTag;
use crate::{Result, StridedError};

type Dims = SmallVec<[usize; 8]>;
type Strides = SmallVec<[isize; 8]>;

// ============================================================================
// Slice specifications
// ============================================================================

/// One entry of a slice list.
///
/// Negative positions count from the end of the dimension and ranges are
/// half-open, following Python slicing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SliceSpec {
    /// Select one position and drop the dimension.
    Index(isize),
    /// `start:stop:step`; `None` bounds default to the full extent in the
    /// direction of `step`.
    Range {
        start: Option<isize>,
        stop: Option<isize>,
        step: isize,
    },
    /// Keep the whole dimension.
    All,
    /// Insert a new dimension of size 1.
    NewAxis,
    /// Keep the listed positions, in list order.
    Keep(Vec<isize>),
    /// Keep every position except the listed ones, in ascending order.
    Drop(Vec<isize>),
}

#[inline]
pub fn idx(i: isize) -> SliceSpec {
    SliceSpec::Index(i)
}

#[inline]
pub fn range(start: isize, stop: isize) -> SliceSpec {
    range_step(start, stop, 1)
}

#[inline]
pub fn range_step(start: isize, stop: isize, step: isize) -> SliceSpec {
    SliceSpec::Range {
        start: Some(start),
        stop: Some(stop),
        step,
    }
}

#[inline]
pub fn range_from(start: isize) -> SliceSpec {
    SliceSpec::Range {
        start: Some(start),
        stop: None,
        step: 1,
    }
}

#[inline]
pub fn range_to(stop: isize) -> SliceSpec {
    SliceSpec::Range {
        start: None,
        stop: Some(stop),
        step: 1,
    }
}

#[inline]
pub fn all() -> SliceSpec {
    SliceSpec::All
}

#[inline]
pub fn newaxis() -> SliceSpec {
    SliceSpec::NewAxis
}

pub fn keep(indices: &[isize]) -> SliceSpec {
    SliceSpec::Keep(indices.to_vec())
}

pub fn drop(indices: &[isize]) -> SliceSpec {
    SliceSpec::Drop(indices.to_vec())
}

/// Start position and length of a Python-style slice over `len` elements.
fn normalize_range(
    start: Option<isize>,
    stop: Option<isize>,
    step: isize,
    len: usize,
) -> Result<(isize, usize)> {
    if step == 0 {
        return Err(StridedError::ZeroSliceStep);
    }
    let n = len as isize;
    let wrap = |i: isize| if i < 0 { i + n } else { i };
    if step > 0 {
        let start = start.map_or(0, wrap).clamp(0, n);
        let stop = stop.map_or(n, wrap).clamp(0, n);
        let count = if stop > start {
            (stop - start + step - 1) / step
        } else {
            0
        };
        Ok((start, count as usize))
    } else {
        let start = start.map_or(n - 1, wrap).clamp(-1, n - 1);
        let stop = stop.map_or(-1, |i| wrap(i).clamp(-1, n - 1));
        let count = if start > stop {
            (start - stop - step - 1) / -step
        } else {
            0
        };
        Ok((start, count as usize))
    }
}

/// One output dimension of a slice.
enum Axis {
    Strided { len: usize, stride: isize },
    /// Flat offsets of the selected positions.
    Listed(Vec<isize>),
}

impl Axis {
    fn len(&self) -> usize {
        match self {
            Axis::Strided { len, .. } => *len,
            Axis::Listed(offsets) => offsets.len(),
        }
    }

    #[inline]
    fn offset(&self, k: usize) -> isize {
        match self {
            Axis::Strided { stride, .. } => k as isize * stride,
            Axis::Listed(offsets) => offsets[k],
        }
    }
}

/// A slice list applied to a [`Geometry`].
enum Sliced {
    Strided(Geometry),
    /// Index lists cannot be expressed with strides: the flat position of
    /// every selected element, in row-major order.
    Gathered { shape: Dims, positions: Vec<isize> },
}

/// Geometry of a strided region of some flat space.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Geometry {
    shape: Dims,
    strides: Strides,
    offset: isize,
}

impl Geometry {
    /// Size-1 dimensions never move.
    fn normalized(mut self) -> Self {
        for (s, &d) in self.strides.iter_mut().zip(&self.shape) {
            if d == 1 {
                *s = 0;
            }
        }
        self
    }

    fn backstrides(&self) -> Strides {
        self.shape
            .iter()
            .zip(&self.strides)
            .map(|(&d, &s)| s * d.saturating_sub(1) as isize)
            .collect()
    }

    /// Position `i` of dimension `d`, wrapping negative values.
    fn position(&self, d: usize, i: isize) -> Result<isize> {
        let len = self.shape[d] as isize;
        let pos = if i < 0 { i + len } else { i };
        if pos < 0 || pos >= len {
            return Err(StridedError::IndexOutOfBounds {
                index: vec![i.unsigned_abs()],
                shape: self.shape.to_vec(),
            });
        }
        Ok(pos)
    }

    fn slice(&self, specs: &[SliceSpec]) -> Result<Sliced> {
        let rank = self.shape.len();
        let given = specs.iter().filter(|s| **s != SliceSpec::NewAxis).count();
        if given > rank {
            return Err(StridedError::TooManySlices { given, rank });
        }
        let mut offset = self.offset;
        let mut axes: SmallVec<[Axis; 8]> = SmallVec::new();
        let mut d = 0usize;
        for spec in specs {
            if *spec == SliceSpec::NewAxis {
                axes.push(Axis::Strided { len: 1, stride: 0 });
                continue;
            }
            let (len, stride) = (self.shape[d], self.strides[d]);
            match spec {
                SliceSpec::Index(i) => offset += self.position(d, *i)? * stride,
                SliceSpec::Range { start, stop, step } => {
                    let (first, count) = normalize_range(*start, *stop, *step, len)?;
                    if count > 0 {
                        offset += first * stride;
                    }
                    axes.push(Axis::Strided {
                        len: count,
                        stride: stride * step,
                    });
                }
                SliceSpec::All | SliceSpec::NewAxis => axes.push(Axis::Strided { len, stride }),
                SliceSpec::Keep(list) => {
                    let offsets = list
                        .iter()
                        .map(|&i| Ok(self.position(d, i)? * stride))
                        .collect::<Result<Vec<_>>>()?;
                    axes.push(Axis::Listed(offsets));
                }
                SliceSpec::Drop(list) => {
                    let mut dropped = vec![false; len];
                    for &i in list {
                        dropped[self.position(d, i)? as usize] = true;
                    }
                    let offsets = (0..len)
                        .filter(|&p| !dropped[p])
                        .map(|p| p as isize * stride)
                        .collect();
                    axes.push(Axis::Listed(offsets));
                }
            }
            d += 1;
        }
        axes.extend(
            self.shape[d..]
                .iter()
                .zip(&self.strides[d..])
                .map(|(&len, &stride)| Axis::Strided { len, stride }),
        );

        let shape: Dims = axes.iter().map(Axis::len).collect();
        if axes.iter().any(|a| matches!(a, Axis::Listed(_))) {
            let mut positions = vec![offset];
            for axis in &axes {
                positions = positions
                    .iter()
                    .flat_map(|&p| (0..axis.len()).map(move |k| p + axis.offset(k)))
                    .collect();
            }
            return Ok(Sliced::Gathered { shape, positions });
        }
        let strides = axes
            .iter()
            .map(|a| match a {
                Axis::Strided { stride, .. } => *stride,
                Axis::Listed(_) => 0,
            })
            .collect();
        Ok(Sliced::Strided(
            Geometry {
                shape,
                strides,
                offset,
            }
            .normalized(),
        ))
    }

    fn permuted(&self, perm: &[usize]) -> Result<Geometry> {
        let rank = self.shape.len();
        let perm: Dims = if perm.is_empty() {
            (0..rank).rev().collect()
        } else {
            SmallVec::from_slice(perm)
        };
        if perm.len() != rank {
            return Err(StridedError::RankMismatch(perm.len(), rank));
        }
        let mut seen: SmallVec<[bool; 8]> = smallvec![false; rank];
        for &p in &perm {
            if p >= rank || seen[p] {
                return Err(StridedError::InvalidAxis { axis: p, rank });
            }
            seen[p] = true;
        }
        Ok(Geometry {
            shape: perm.iter().map(|&p| self.shape[p]).collect(),
            strides: perm.iter().map(|&p| self.strides[p]).collect(),
            offset: self.offset,
        })
    }

    fn diagonal(&self, k: isize, axis1: usize, axis2: usize) -> Result<Geometry> {
        let rank = self.shape.len();
        for axis in [axis1, axis2] {
            if axis >= rank {
                return Err(StridedError::InvalidAxis { axis, rank });
            }
        }
        if axis1 == axis2 {
            return Err(StridedError::InvalidAxis { axis: axis2, rank });
        }
        let (d1, d2) = (self.shape[axis1] as isize, self.shape[axis2] as isize);
        let (s1, s2) = (self.strides[axis1], self.strides[axis2]);
        let (len, start) = if k >= 0 {
            (d1.min(d2 - k), k * s2)
        } else {
            ((d1 + k).min(d2), -k * s1)
        };
        let len = len.max(0) as usize;
        let mut out = Geometry {
            shape: Dims::new(),
            strides: Strides::new(),
            offset: self.offset + if len > 0 { start } else { 0 },
        };
        for d in (0..rank).filter(|&d| d != axis1 && d != axis2) {
            out.shape.push(self.shape[d]);
            out.strides.push(self.strides[d]);
        }
        out.shape.push(len);
        out.strides.push(s1 + s2);
        Ok(out.normalized())
    }

    /// Every reachable position must lie in `[0, flat_len)`.
    fn validate(&self, flat_len: usize) -> Result<()> {
        if self.shape.contains(&0) {
            return Ok(());
        }
        let mut min_offset = self.offset;
        let mut max_offset = self.offset;
        for (&d, &s) in self.shape.iter().zip(&self.strides) {
            let last = (d - 1) as isize;
            if s >= 0 {
                max_offset += s * last;
            } else {
                min_offset += s * last;
            }
        }
        if min_offset < 0 || max_offset as usize >= flat_len {
            return Err(StridedError::OffsetOverflow);
        }
        Ok(())
    }
}

// ============================================================================
// Read-only view
// ============================================================================

/// How view positions map to parent elements.
#[derive(Debug, Clone)]
enum FlatMode {
    /// Positions index the parent's flat storage.
    Storage,
    /// Positions index the row-major enumeration of a parent of this shape.
    Adapted(Dims),
}

/// A strided re-indexing of an expression.
///
/// `E` is either an owned expression or a reference to one.
#[derive(Debug, Clone)]
pub struct StridedView<E> {
    expr: E,
    shape: Dims,
    strides: Strides,
    backstrides: Strides,
    offset: isize,
    flat: FlatMode,
    /// Parent positions of an index-list view; `offset` and `strides` then
    /// walk this table instead of the parent.
    gather: Option<Vec<isize>>,
}

impl<E: Expression> StridedView<E> {
    fn parent_geometry(e: &E) -> Result<(Geometry, FlatMode, usize)> {
        if let (Some(data), Some(strides)) = (e.storage(), e.strides()) {
            let geometry = Geometry {
                shape: SmallVec::from_slice(e.shape()),
                strides: SmallVec::from_slice(strides),
                offset: e.data_offset() as isize,
            };
            return Ok((geometry, FlatMode::Storage, data.len()));
        }
        let shape = resolved_shape(e)?;
        let geometry = Geometry {
            strides: compute_strides(&shape, Layout::RowMajor).into_iter().collect(),
            shape: shape.clone(),
            offset: 0,
        };
        let len = total_len(&shape);
        Ok((geometry, FlatMode::Adapted(shape), len))
    }

    fn from_geometry(expr: E, geometry: Geometry, flat: FlatMode) -> Self {
        let backstrides = geometry.backstrides();
        Self {
            expr,
            shape: geometry.shape,
            strides: geometry.strides,
            backstrides,
            offset: geometry.offset,
            flat,
            gather: None,
        }
    }

    fn from_sliced(expr: E, sliced: Sliced, flat: FlatMode) -> Self {
        match sliced {
            Sliced::Strided(geometry) => Self::from_geometry(expr, geometry, flat),
            Sliced::Gathered { shape, positions } => {
                let table = Geometry {
                    strides: compute_strides(&shape, Layout::RowMajor).into_iter().collect(),
                    shape,
                    offset: 0,
                };
                let mut view = Self::from_geometry(expr, table.normalized(), flat);
                view.gather = Some(positions);
                view
            }
        }
    }

    /// The viewed expression.
    #[inline]
    pub fn parent(&self) -> &E {
        &self.expr
    }

    #[inline]
    pub fn offset(&self) -> isize {
        self.offset
    }

    #[inline]
    fn read(&self, pos: isize) -> E::Elem {
        let pos = match &self.gather {
            Some(table) => table[pos as usize],
            None => pos,
        };
        FlatSource::new(&self.expr, &self.flat).read(pos)
    }
}

/// View selecting `specs` from `e`. Missing trailing slices select whole
/// dimensions.
///
/// [`SliceSpec::Keep`] and [`SliceSpec::Drop`] entries turn the view into an
/// index-list view that reads through a table of parent positions.
///
/// # Errors
///
/// [`StridedError::TooManySlices`], [`StridedError::ZeroSliceStep`], or
/// [`StridedError::IndexOutOfBounds`] for an out-of-range single or listed
/// index.
pub fn dynamic_view<E: Expression>(e: E, specs: &[SliceSpec]) -> Result<StridedView<E>> {
    let (parent, flat, _) = StridedView::parent_geometry(&e)?;
    let sliced = parent.slice(specs)?;
    Ok(StridedView::from_sliced(e, sliced, flat))
}

/// View with explicit `shape`, `strides` and `offset`, measured in the
/// parent's flat storage (or row-major enumeration when it has none).
///
/// # Errors
///
/// [`StridedError::StrideLengthMismatch`] if the lengths differ,
/// [`StridedError::OffsetOverflow`] if some element would lie outside the
/// parent.
pub fn strided_view<E: Expression>(
    e: E,
    shape: &[usize],
    strides: &[isize],
    offset: usize,
) -> Result<StridedView<E>> {
    if shape.len() != strides.len() {
        return Err(StridedError::StrideLengthMismatch);
    }
    let (_, flat, flat_len) = StridedView::parent_geometry(&e)?;
    let geometry = Geometry {
        shape: SmallVec::from_slice(shape),
        strides: SmallVec::from_slice(strides),
        offset: offset as isize,
    };
    geometry.validate(flat_len)?;
    Ok(StridedView::from_geometry(e, geometry.normalized(), flat))
}

/// View with axes permuted: output dimension `i` is input dimension
/// `perm[i]`. An empty `perm` reverses the axes.
///
/// # Errors
///
/// [`StridedError::InvalidAxis`] if `perm` is not a permutation.
pub fn transpose<E: Expression>(e: E, perm: &[usize]) -> Result<StridedView<E>> {
    let (parent, flat, _) = StridedView::parent_geometry(&e)?;
    let geometry = parent.permuted(perm)?;
    Ok(StridedView::from_geometry(e, geometry, flat))
}

/// The `k`-th diagonal over `axis1` and `axis2`, appended as the last
/// dimension after the remaining axes.
///
/// # Errors
///
/// [`StridedError::InvalidAxis`] if an axis is out of range or both are equal.
pub fn diagonal<E: Expression>(
    e: E,
    k: isize,
    axis1: usize,
    axis2: usize,
) -> Result<StridedView<E>> {
    let (parent, flat, _) = StridedView::parent_geometry(&e)?;
    let geometry = parent.diagonal(k, axis1, axis2)?;
    Ok(StridedView::from_geometry(e, geometry, flat))
}

impl<E: Expression> Expression for StridedView<E> {
    type Elem = E::Elem;
    type Tag = E::Tag;
    type Stepper<'a> = ViewStepper<'a, E> where Self: 'a;

    const STATIC_LAYOUT: Layout = Layout::Dynamic;
    const CONTIGUOUS_LAYOUT: bool = false;
    const STRIDED_LOOP: bool = true;

    #[inline]
    fn shape(&self) -> &[usize] {
        &self.shape
    }
    fn layout(&self) -> Layout {
        match self.gather {
            Some(_) => Layout::Dynamic,
            None => contiguous_layout(&self.shape, &self.strides).unwrap_or(Layout::Dynamic),
        }
    }
    fn is_contiguous(&self) -> bool {
        self.gather.is_none() && contiguous_layout(&self.shape, &self.strides).is_some()
    }
    #[inline]
    fn get(&self, index: &[usize]) -> E::Elem {
        self.read(self.offset + data_offset(&self.strides, index))
    }
    fn has_linear_assign(&self, strides: &[isize]) -> bool {
        self.strides.as_slice() == strides && self.is_contiguous()
    }
    #[inline]
    fn linear_get(&self, i: usize) -> E::Elem {
        self.read(self.offset + i as isize)
    }
    #[inline]
    fn strides(&self) -> Option<&[isize]> {
        match self.gather {
            Some(_) => None,
            None => Some(&self.strides),
        }
    }
    fn storage(&self) -> Option<&[E::Elem]> {
        match (&self.flat, &self.gather) {
            (FlatMode::Storage, None) => self.expr.storage(),
            _ => None,
        }
    }
    #[inline]
    fn data_offset(&self) -> usize {
        self.offset.max(0) as usize
    }
    fn check_strides(&self, cut: &mut CutPoint<'_>) -> bool {
        cut.update(&self.strides);
        true
    }
    fn stepper_begin(&self, shape: &[usize]) -> ViewStepper<'_, E> {
        ViewStepper {
            source: FlatSource::new(&self.expr, &self.flat),
            gather: self.gather.as_deref(),
            cursor: StrideCursor::new(&self.strides, &self.backstrides, self.offset, shape.len()),
        }
    }
}

impl<E: Expression> IntoOperand for StridedView<E> {
    type Operand = Self;

    #[inline]
    fn into_operand(self) -> Self {
        self
    }
}

/// Reads flat positions of a view's parent.
pub enum FlatSource<'a, E: Expression> {
    Data(&'a [E::Elem]),
    Adapted { expr: &'a E, shape: &'a [usize] },
}

impl<'a, E: Expression> FlatSource<'a, E> {
    fn new(expr: &'a E, flat: &'a FlatMode) -> Self {
        match (flat, expr.storage()) {
            (FlatMode::Storage, Some(data)) => FlatSource::Data(data),
            (FlatMode::Adapted(shape), _) => FlatSource::Adapted { expr, shape },
            (FlatMode::Storage, None) => FlatSource::Adapted {
                expr,
                shape: expr.shape(),
            },
        }
    }

    #[inline]
    fn read(&self, pos: isize) -> E::Elem {
        match self {
            FlatSource::Data(data) => data[pos as usize],
            FlatSource::Adapted { expr, shape } => {
                let mut index: Dims = smallvec![0; shape.len()];
                unravel_index(pos as usize, shape, Layout::RowMajor, &mut index);
                expr.get(&index)
            }
        }
    }
}

/// Stepper of a [`StridedView`].
pub struct ViewStepper<'a, E: Expression> {
    source: FlatSource<'a, E>,
    gather: Option<&'a [isize]>,
    cursor: StrideCursor<'a>,
}

impl<E: Expression> PartialEq for ViewStepper<'_, E> {
    fn eq(&self, other: &Self) -> bool {
        self.cursor == other.cursor
    }
}

impl<E: Expression> Steppable for ViewStepper<'_, E> {
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

impl<E: Expression> Stepper for ViewStepper<'_, E> {
    type Elem = E::Elem;

    #[inline]
    fn get(&self) -> E::Elem {
        let pos = self.cursor.position();
        match self.gather {
            Some(table) => self.source.read(table[pos as usize]),
            None => self.source.read(pos),
        }
    }
    #[inline]
    fn step_leading(&mut self) {
        self.cursor.step_leading()
    }
}

// ============================================================================
// Mutable view
// ============================================================================

/// Containers whose flat storage can be borrowed mutably for a view.
pub trait StorageMut {
    type Elem: Copy;

    /// `(storage, shape, strides, offset of the first element)`.
    fn storage_parts_mut(&mut self) -> (&mut [Self::Elem], &[usize], &[isize], isize);
}

impl<T: Copy, L: LayoutTag> StorageMut for Array<T, L> {
    type Elem = T;

    fn storage_parts_mut(&mut self) -> (&mut [T], &[usize], &[isize], isize) {
        let (data, shape, strides) = Array::<T, L>::storage_parts_mut(self);
        (data, shape, strides, 0)
    }
}

impl<T: Copy> StorageMut for StridedViewMut<'_, T> {
    type Elem = T;

    fn storage_parts_mut(&mut self) -> (&mut [T], &[usize], &[isize], isize) {
        (&mut *self.data, &self.shape, &self.strides, self.offset)
    }
}

/// A writable strided window into borrowed storage.
#[derive(Debug)]
pub struct StridedViewMut<'a, T> {
    data: &'a mut [T],
    shape: Dims,
    strides: Strides,
    backstrides: Strides,
    offset: isize,
}

impl<'a, T: Copy> StridedViewMut<'a, T> {
    fn from_geometry(data: &'a mut [T], geometry: Geometry) -> Self {
        let backstrides = geometry.backstrides();
        Self {
            data,
            shape: geometry.shape,
            strides: geometry.strides,
            backstrides,
            offset: geometry.offset,
        }
    }

    /// View of every element of `s`.
    pub fn new<S: StorageMut<Elem = T> + ?Sized>(s: &'a mut S) -> Self {
        let (data, geometry) = storage_geometry(s);
        Self::from_geometry(data, geometry.normalized())
    }

    #[inline]
    pub fn offset(&self) -> isize {
        self.offset
    }

    /// `(storage, strides, backstrides, offset)`.
    pub(crate) fn raw_parts_mut(&mut self) -> (&mut [T], &[isize], &[isize], isize) {
        (&mut *self.data, &self.strides, &self.backstrides, self.offset)
    }

    /// Set every element of the view to `value`.
    pub fn fill(&mut self, value: T) {
        self.map_inplace(|x| *x = value);
    }

    /// Call `f` on every element in row-major order.
    pub fn map_inplace<F: FnMut(&mut T)>(&mut self, mut f: F) {
        let size = total_len(&self.shape);
        let mut index: Dims = smallvec![0; self.shape.len()];
        for _ in 0..size {
            let pos = self.offset + data_offset(&self.strides, &index);
            f(&mut self.data[pos as usize]);
            for d in (0..index.len()).rev() {
                index[d] += 1;
                if index[d] < self.shape[d] {
                    break;
                }
                index[d] = 0;
            }
        }
    }

    /// Mutable element at a full multi-index.
    ///
    /// # Errors
    ///
    /// [`StridedError::IndexOutOfBounds`] if `index` does not address an
    /// element of the view.
    pub fn get_mut(&mut self, index: &[usize]) -> Result<&mut T> {
        if index.len() != self.shape.len() || index.iter().zip(&self.shape).any(|(&i, &d)| i >= d)
        {
            return Err(StridedError::IndexOutOfBounds {
                index: index.to_vec(),
                shape: self.shape.to_vec(),
            });
        }
        let pos = self.offset + data_offset(&self.strides, index);
        Ok(&mut self.data[pos as usize])
    }

    fn contiguous_range(&self) -> Option<std::ops::Range<usize>> {
        contiguous_layout(&self.shape, &self.strides)?;
        let start = self.offset as usize;
        Some(start..start + total_len(&self.shape))
    }
}

fn storage_geometry<S: StorageMut + ?Sized>(s: &mut S) -> (&mut [S::Elem], Geometry) {
    let (data, shape, strides, offset) = s.storage_parts_mut();
    let geometry = Geometry {
        shape: SmallVec::from_slice(shape),
        strides: SmallVec::from_slice(strides),
        offset,
    };
    (data, geometry)
}

/// Mutable counterpart of [`dynamic_view`].
///
/// # Errors
///
/// As [`dynamic_view`], plus [`StridedError::IndexListNotWritable`] for a
/// [`SliceSpec::Keep`] or [`SliceSpec::Drop`] entry.
pub fn dynamic_view_mut<'a, S: StorageMut + ?Sized>(
    s: &'a mut S,
    specs: &[SliceSpec],
) -> Result<StridedViewMut<'a, S::Elem>> {
    let (data, parent) = storage_geometry(s);
    match parent.slice(specs)? {
        Sliced::Strided(geometry) => Ok(StridedViewMut::from_geometry(data, geometry)),
        Sliced::Gathered { .. } => Err(StridedError::IndexListNotWritable),
    }
}

/// Mutable counterpart of [`transpose`].
pub fn transpose_mut<'a, S: StorageMut + ?Sized>(
    s: &'a mut S,
    perm: &[usize],
) -> Result<StridedViewMut<'a, S::Elem>> {
    let (data, parent) = storage_geometry(s);
    let geometry = parent.permuted(perm)?;
    Ok(StridedViewMut::from_geometry(data, geometry))
}

impl<T: Copy> Expression for StridedViewMut<'_, T> {
    type Elem = T;
    type Tag = TensorTag;
    type Stepper<'b> = ContainerStepper<'b, T> where Self: 'b;

    const STATIC_LAYOUT: Layout = Layout::Dynamic;
    const CONTIGUOUS_LAYOUT: bool = false;
    const STRIDED_LOOP: bool = true;

    #[inline]
    fn shape(&self) -> &[usize] {
        &self.shape
    }
    fn layout(&self) -> Layout {
        contiguous_layout(&self.shape, &self.strides).unwrap_or(Layout::Dynamic)
    }
    fn is_contiguous(&self) -> bool {
        contiguous_layout(&self.shape, &self.strides).is_some()
    }
    #[inline]
    fn get(&self, index: &[usize]) -> T {
        self.data[(self.offset + data_offset(&self.strides, index)) as usize]
    }
    fn has_linear_assign(&self, strides: &[isize]) -> bool {
        self.strides.as_slice() == strides && self.is_contiguous()
    }
    #[inline]
    fn linear_get(&self, i: usize) -> T {
        self.data[self.offset as usize + i]
    }
    #[inline]
    fn strides(&self) -> Option<&[isize]> {
        Some(&self.strides)
    }
    #[inline]
    fn storage(&self) -> Option<&[T]> {
        Some(&*self.data)
    }
    #[inline]
    fn data_offset(&self) -> usize {
        self.offset.max(0) as usize
    }
    fn check_strides(&self, cut: &mut CutPoint<'_>) -> bool {
        cut.update(&self.strides);
        true
    }
    fn stepper_begin(&self, shape: &[usize]) -> ContainerStepper<'_, T> {
        ContainerStepper::new(
            &*self.data,
            StrideCursor::new(&self.strides, &self.backstrides, self.offset, shape.len()),
        )
    }
}

impl<T: Copy> AssignTarget for StridedViewMut<'_, T> {
    const RESIZABLE: bool = false;
    type TargetStepper<'b> = ContainerStepperMut<'b, T> where Self: 'b;

    fn resize(&mut self, shape: &[usize]) -> Result<()> {
        if self.shape.as_slice() == shape {
            Ok(())
        } else {
            Err(StridedError::ShapeMismatch(self.shape.to_vec(), shape.to_vec()))
        }
    }

    fn stepper_mut(&mut self, shape: &[usize]) -> ContainerStepperMut<'_, T> {
        ContainerStepperMut::new(
            &mut *self.data,
            StrideCursor::new(&self.strides, &self.backstrides, self.offset, shape.len()),
        )
    }

    fn linear_mut(&mut self) -> Option<&mut [T]> {
        let range = self.contiguous_range()?;
        self.data.get_mut(range)
    }
}
