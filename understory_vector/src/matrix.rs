// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Single-precision 3×3 affine matrix used by vector draw tasks.
//!
//! Every composing operation builds an elementary matrix and right-multiplies
//! it into the receiver (`self = self * elementary`), so operations apply in
//! the local frame established by the ones invoked before them:
//!
//! ```
//! use understory_vector::Matrix;
//!
//! let mut m = Matrix::identity();
//! m.translate(10.0, 0.0);
//! m.scale(2.0, 2.0);
//! // The scale happens first when mapping a point, then the translation.
//! assert_eq!(m.transform_point(1.0, 1.0), (12.0, 2.0));
//! ```

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

use core::ops::{Mul, MulAssign};

/// A row-major 3×3 matrix describing a 2D affine map.
///
/// The last row is always `(0, 0, 1)` for matrices built through this API;
/// only the upper 2×3 block carries degrees of freedom.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Matrix {
    /// Matrix entries, indexed as `m[row][column]`.
    pub m: [[f32; 3]; 3],
}

impl Default for Matrix {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    /// The identity matrix.
    pub const IDENTITY: Self = Self {
        m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };

    /// Returns the identity matrix.
    #[inline]
    pub const fn identity() -> Self {
        Self::IDENTITY
    }

    /// Builds a matrix from the six affine coefficients.
    ///
    /// A point maps as `x' = sx * x + shx * y + tx` and
    /// `y' = shy * x + sy * y + ty`.
    #[inline]
    pub const fn from_affine(sx: f32, shy: f32, shx: f32, sy: f32, tx: f32, ty: f32) -> Self {
        Self {
            m: [[sx, shx, tx], [shy, sy, ty], [0.0, 0.0, 1.0]],
        }
    }

    /// Returns `true` if the linear part and the last row are at their
    /// identity values, so the matrix is at most a translation.
    #[inline]
    pub fn is_identity_or_translation(&self) -> bool {
        let m = &self.m;
        m[0][0] == 1.0
            && m[0][1] == 0.0
            && m[1][0] == 0.0
            && m[1][1] == 1.0
            && m[2][0] == 0.0
            && m[2][1] == 0.0
            && m[2][2] == 1.0
    }

    /// Appends a translation by `(dx, dy)`.
    ///
    /// Pure translations accumulate directly into the translation terms;
    /// the result is identical to the general multiplication path.
    pub fn translate(&mut self, dx: f32, dy: f32) {
        if self.is_identity_or_translation() {
            self.m[0][2] += dx;
            self.m[1][2] += dy;
            return;
        }

        let tlm = Self {
            m: [[1.0, 0.0, dx], [0.0, 1.0, dy], [0.0, 0.0, 1.0]],
        };
        self.multiply(&tlm);
    }

    /// Appends a non-uniform scale.
    pub fn scale(&mut self, sx: f32, sy: f32) {
        let scm = Self {
            m: [[sx, 0.0, 0.0], [0.0, sy, 0.0], [0.0, 0.0, 1.0]],
        };
        self.multiply(&scm);
    }

    /// Appends a rotation by `degrees` (clockwise in a y-down space).
    pub fn rotate(&mut self, degrees: f32) {
        let radians = degrees.to_radians();
        let cos_r = radians.cos();
        let sin_r = radians.sin();
        let rtm = Self {
            m: [[cos_r, -sin_r, 0.0], [sin_r, cos_r, 0.0], [0.0, 0.0, 1.0]],
        };
        self.multiply(&rtm);
    }

    /// Appends a skew with the given angles in degrees along each axis.
    pub fn skew(&mut self, skew_x: f32, skew_y: f32) {
        let tan_x = skew_x.to_radians().tan();
        let tan_y = skew_y.to_radians().tan();
        let skm = Self {
            m: [[1.0, tan_x, 0.0], [tan_y, 1.0, 0.0], [0.0, 0.0, 1.0]],
        };
        self.multiply(&skm);
    }

    /// Right-multiplies `other` into this matrix: `self = self * other`.
    pub fn multiply(&mut self, other: &Self) {
        let a = &self.m;
        let b = &other.m;
        let mut out = [[0.0_f32; 3]; 3];
        for (y, row) in out.iter_mut().enumerate() {
            for (x, cell) in row.iter_mut().enumerate() {
                *cell = (a[y][0] * b[0][x]) + (a[y][1] * b[1][x]) + (a[y][2] * b[2][x]);
            }
        }
        self.m = out;
    }

    /// Maps a point through the matrix.
    #[inline]
    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        let m = &self.m;
        (
            m[0][0] * x + m[0][1] * y + m[0][2],
            m[1][0] * x + m[1][1] * y + m[1][2],
        )
    }

    /// Converts to kurbo's affine type.
    ///
    /// Only the upper 2×3 block is carried over.
    #[inline]
    pub fn to_kurbo(&self) -> kurbo::Affine {
        let m = &self.m;
        kurbo::Affine::new([
            f64::from(m[0][0]),
            f64::from(m[1][0]),
            f64::from(m[0][1]),
            f64::from(m[1][1]),
            f64::from(m[0][2]),
            f64::from(m[1][2]),
        ])
    }
}

impl Mul for Matrix {
    type Output = Self;

    #[inline]
    fn mul(mut self, rhs: Self) -> Self {
        self.multiply(&rhs);
        self
    }
}

impl MulAssign for Matrix {
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        self.multiply(&rhs);
    }
}
