//! Element conversion during assignment.
//!
//! Every value written by the assignment engine goes through
//! [`AssignCast::assign_cast`]. Conversions that narrow or change signedness
//! are flagged at compile time through [`AssignCast::NEEDS_CAST`]; they are
//! still performed (with `as` semantics), but the flag keeps them off the
//! vectorized paths and is reported through `tracing`.

use num_complex::Complex;

use crate::SIMD_BATCH_BYTES;

/// Compile-time description of an element type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ElemKind {
    pub size: usize,
    pub signed: bool,
    pub integral: bool,
    pub float: bool,
    pub boolean: bool,
    pub complex: bool,
}

impl ElemKind {
    const fn int<T>(signed: bool) -> Self {
        Self {
            size: std::mem::size_of::<T>(),
            signed,
            integral: true,
            float: false,
            boolean: false,
            complex: false,
        }
    }

    const fn float<T>() -> Self {
        Self {
            size: std::mem::size_of::<T>(),
            signed: true,
            integral: false,
            float: true,
            boolean: false,
            complex: false,
        }
    }

    /// Integers, floats and booleans; complex numbers are not arithmetic.
    #[inline]
    pub const fn is_arithmetic(&self) -> bool {
        !self.complex
    }

    /// Vector lanes of this type in one SIMD batch.
    #[inline]
    pub const fn lanes(&self) -> usize {
        if self.size == 0 {
            1
        } else {
            SIMD_BATCH_BYTES / self.size
        }
    }
}

/// Element types the assignment engine can convert between.
pub trait Element: Copy + 'static {
    const KIND: ElemKind;
}

/// `to` cannot represent every value of `from`.
pub const fn is_narrowing(from: ElemKind, to: ElemKind) -> bool {
    to.is_arithmetic() && (to.size < from.size || (to.integral && from.float))
}

/// Signedness differs between `from` and `to`.
pub const fn has_sign_conversion(from: ElemKind, to: ElemKind) -> bool {
    from.signed != to.signed
}

/// Conversion from `from` to `to` must be flagged as an explicit cast.
pub const fn needs_cast(from: ElemKind, to: ElemKind) -> bool {
    is_narrowing(from, to) || has_sign_conversion(from, to)
}

/// Whether the vectorized strategies may convert `S` into `D`.
///
/// Both types need more than one lane per batch, a boolean source can only
/// feed a boolean destination, and the conversion must not be flagged.
pub const fn simd_assignable<S: Element, D: Element>() -> bool {
    let (s, d) = (S::KIND, D::KIND);
    s.lanes() > 1 && d.lanes() > 1 && !(s.boolean && !d.boolean) && !needs_cast(s, d)
}

/// Conversion of a source element into destination type `D`.
pub trait AssignCast<D: Element>: Element {
    const NEEDS_CAST: bool = needs_cast(Self::KIND, D::KIND);

    fn assign_cast(self) -> D;
}

macro_rules! impl_element {
    (int: $($t:ty => $signed:expr),*) => {
        $(impl Element for $t {
            const KIND: ElemKind = ElemKind::int::<$t>($signed);
        })*
    };
    (float: $($t:ty),*) => {
        $(impl Element for $t {
            const KIND: ElemKind = ElemKind::float::<$t>();
        })*
    };
}

impl_element!(int: u8 => false, u16 => false, u32 => false, u64 => false, usize => false,
    i8 => true, i16 => true, i32 => true, i64 => true, isize => true);
impl_element!(float: f32, f64);

impl Element for bool {
    const KIND: ElemKind = ElemKind {
        size: 1,
        signed: false,
        integral: true,
        float: false,
        boolean: true,
        complex: false,
    };
}

impl<T: Element> Element for Complex<T> {
    const KIND: ElemKind = ElemKind {
        size: std::mem::size_of::<Complex<T>>(),
        signed: false,
        integral: false,
        float: false,
        boolean: false,
        complex: true,
    };
}

macro_rules! impl_numeric_casts {
    (@from $from:ty; [$($to:ty),*]) => {
        $(
            #[allow(clippy::unnecessary_cast)]
            impl AssignCast<$to> for $from {
                #[inline(always)]
                fn assign_cast(self) -> $to {
                    self as $to
                }
            }
        )*
        impl AssignCast<bool> for $from {
            #[inline(always)]
            fn assign_cast(self) -> bool {
                self != (0 as $from)
            }
        }
        impl AssignCast<$from> for bool {
            #[inline(always)]
            fn assign_cast(self) -> $from {
                self as u8 as $from
            }
        }
    };
    ($($from:ty),* ; $to:tt) => {
        $(impl_numeric_casts!(@from $from; $to);)*
    };
}

impl_numeric_casts!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, f32, f64;
    [u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, f32, f64]);

impl AssignCast<bool> for bool {
    #[inline(always)]
    fn assign_cast(self) -> bool {
        self
    }
}

macro_rules! impl_complex_casts {
    (@real $f:ty; $($from:ty),*) => {
        $(impl AssignCast<Complex<$f>> for $from {
            #[inline(always)]
            fn assign_cast(self) -> Complex<$f> {
                Complex::new(self as $f, 0.0)
            }
        })*
    };
    ($($f:ty),*) => {
        $(
            impl_complex_casts!(@real $f; u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, f32, f64);
            impl AssignCast<Complex<$f>> for Complex<f32> {
                #[inline(always)]
                fn assign_cast(self) -> Complex<$f> {
                    Complex::new(self.re as $f, self.im as $f)
                }
            }
            impl AssignCast<Complex<$f>> for Complex<f64> {
                #[inline(always)]
                fn assign_cast(self) -> Complex<$f> {
                    Complex::new(self.re as $f, self.im as $f)
                }
            }
        )*
    };
}

impl_complex_casts!(f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    fn flagged<S: AssignCast<D>, D: Element>() -> bool {
        <S as AssignCast<D>>::NEEDS_CAST
    }

    #[test]
    fn test_same_type_not_flagged() {
        assert!(!flagged::<f64, f64>());
        assert!(!flagged::<i32, i32>());
        assert!(!flagged::<bool, bool>());
    }

    #[test]
    fn test_widening_not_flagged() {
        assert!(!flagged::<f32, f64>());
        assert!(!flagged::<i32, i64>());
        assert!(!flagged::<i32, f64>());
    }

    #[test]
    fn test_narrowing_flagged() {
        assert!(flagged::<f64, f32>());
        assert!(flagged::<i64, i32>());
        assert!(flagged::<f32, i64>());
    }

    #[test]
    fn test_sign_change_flagged() {
        assert!(flagged::<i32, u32>());
        assert!(flagged::<u8, i64>());
        assert!(flagged::<i32, bool>());
    }

    #[test]
    fn test_simd_assignable() {
        assert!(simd_assignable::<f64, f64>());
        assert!(simd_assignable::<f32, f64>());
        assert!(!simd_assignable::<f64, f32>());
        assert!(simd_assignable::<bool, bool>());
        assert!(!simd_assignable::<bool, u8>());
        assert!(simd_assignable::<Complex<f64>, Complex<f64>>());
    }

    #[test]
    fn test_cast_values() {
        let x: i32 = AssignCast::<i32>::assign_cast(3.9f64);
        assert_eq!(x, 3);
        let b: bool = 2u8.assign_cast();
        assert!(b);
        let n: f64 = true.assign_cast();
        assert_eq!(n, 1.0);
        let c: Complex<f64> = 2i32.assign_cast();
        assert_eq!(c, Complex::new(2.0, 0.0));
    }
}
