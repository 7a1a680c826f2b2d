//! Utilities to approximate equality of floating point values.

/// The max epsilon accepted on `f32`s.
pub const F32_MAX_ERROR: f32 = 1e-3;

/// The expected epsilon accepted on `f32`s.
pub const F32_AVG_ERROR: f32 = 1e-5;

/// The max epsilon accepted on `f64`s.
pub const F64_MAX_ERROR: f64 = 1e-6;

/// Absolute-difference equality within a caller-chosen epsilon.
pub trait ApproxEq<Rhs: ?Sized = Self> {
    /// The epsilon type (the scalar the difference is measured in).
    type Epsilon;

    /// Whether `self` and `rhs` differ by less than `eps` everywhere.
    fn approx_eq(&self, rhs: &Rhs, eps: Self::Epsilon) -> bool;
}

impl ApproxEq for f32 {
    type Epsilon = f32;

    fn approx_eq(&self, rhs: &Self, eps: f32) -> bool {
        (self - rhs).abs() < eps
    }
}

impl ApproxEq for f64 {
    type Epsilon = f64;

    fn approx_eq(&self, rhs: &Self, eps: f64) -> bool {
        (self - rhs).abs() < eps
    }
}

impl<T: ApproxEq<Epsilon: Copy>> ApproxEq for [T] {
    type Epsilon = T::Epsilon;

    fn approx_eq(&self, rhs: &Self, eps: T::Epsilon) -> bool {
        self.len() == rhs.len()
            && self
                .iter()
                .zip(rhs)
                .all(|(a, b)| a.approx_eq(b, eps))
    }
}

/// Approximate equality at the default `f32` tolerance.
pub fn approx_eq<A: ApproxEq<B, Epsilon = f32> + ?Sized, B: ?Sized>(a: &A, b: &B) -> bool {
    a.approx_eq(b, F32_AVG_ERROR)
}
