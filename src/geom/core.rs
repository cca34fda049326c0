use std::ops::{Add, Mul, Neg, Sub};

use num_complex::Complex64;
use serde::Serialize;

// ─────────────────────────────────────────────────────────────────────────────
// Vec2
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    /// Zero vector.
    pub const ZERO: Self = Self::new(0.0, 0.0);

    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    #[must_use]
    pub const fn length_squared(self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    #[must_use]
    pub const fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y
    }

    /// Unit vector pointing along `angle` degrees.
    #[must_use]
    pub fn from_angle(angle: f64) -> Self {
        let rotor = unit_rotor(angle);
        Self::new(rotor.re, rotor.im)
    }

    const fn to_complex(self) -> Complex64 {
        Complex64::new(self.x, self.y)
    }

    const fn from_complex(c: Complex64) -> Self {
        Self::new(c.re, c.im)
    }
}

impl Default for Vec2 {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Add for Vec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self::Output {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Vec2 {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Point2
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    /// Origin point.
    pub const ORIGIN: Self = Self::new(0.0, 0.0);

    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub const fn to_array(self) -> [f64; 2] {
        [self.x, self.y]
    }

    #[must_use]
    pub const fn to_vec2(self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    #[must_use]
    pub fn distance_to(self, other: Self) -> f64 {
        (self - other).length()
    }

    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Default for Point2 {
    fn default() -> Self {
        Self::ORIGIN
    }
}

impl From<[f64; 2]> for Point2 {
    fn from(arr: [f64; 2]) -> Self {
        Self::new(arr[0], arr[1])
    }
}

impl From<(f64, f64)> for Point2 {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

impl Add<Vec2> for Point2 {
    type Output = Self;
    fn add(self, rhs: Vec2) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub<Vec2> for Point2 {
    type Output = Self;
    fn sub(self, rhs: Vec2) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Sub for Point2 {
    type Output = Vec2;
    fn sub(self, rhs: Self) -> Self::Output {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Angles
// ─────────────────────────────────────────────────────────────────────────────

/// Normalize an angle in degrees to `[0, 360)`.
///
/// Values within [`Tolerance::ANGLE`] of a whole degree snap onto it, so that
/// chains of quarter turns keep comparing equal to 0, 90, 180 and 270.
#[must_use]
pub fn normalize_angle(angle: f64) -> f64 {
    let mut wrapped = angle.rem_euclid(360.0);
    let whole = wrapped.round();
    if (wrapped - whole).abs() <= Tolerance::ANGLE.eps {
        wrapped = whole;
    }
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Compare two angles in degrees modulo a full turn.
#[must_use]
pub fn angle_approx_eq(a: f64, b: f64, tol: Tolerance) -> bool {
    let diff = normalize_angle(a - b);
    diff <= tol.eps || 360.0 - diff <= tol.eps
}

/// Unit phasor `e^{iθ}` for an angle in degrees. Quarter turns are exact.
fn unit_rotor(angle: f64) -> Complex64 {
    let normalized = normalize_angle(angle);
    if normalized == 0.0 {
        Complex64::new(1.0, 0.0)
    } else if normalized == 90.0 {
        Complex64::new(0.0, 1.0)
    } else if normalized == 180.0 {
        Complex64::new(-1.0, 0.0)
    } else if normalized == 270.0 {
        Complex64::new(0.0, -1.0)
    } else {
        Complex64::from_polar(1.0, normalized.to_radians())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transform2
// ─────────────────────────────────────────────────────────────────────────────

/// Rigid planar transform: `p ↦ R(rotation) · M · p + translation`, where `M`
/// reflects across the x-axis when `mirror` is set.
///
/// The reflection is applied first, then the rotation (degrees,
/// counter-clockwise), then the translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Transform2 {
    pub translation: Vec2,
    pub rotation: f64,
    pub mirror: bool,
}

impl Transform2 {
    #[must_use]
    pub const fn identity() -> Self {
        Self {
            translation: Vec2::ZERO,
            rotation: 0.0,
            mirror: false,
        }
    }

    #[must_use]
    pub const fn translate(offset: Vec2) -> Self {
        Self {
            translation: offset,
            rotation: 0.0,
            mirror: false,
        }
    }

    /// Rotation about the origin.
    #[must_use]
    pub fn rotate(angle: f64) -> Self {
        Self {
            translation: Vec2::ZERO,
            rotation: normalize_angle(angle),
            mirror: false,
        }
    }

    /// Rotation about an arbitrary center.
    #[must_use]
    pub fn rotate_about(center: Point2, angle: f64) -> Self {
        Self::translate(center.to_vec2())
            .compose(Self::rotate(angle))
            .compose(Self::translate(-center.to_vec2()))
    }

    /// Reflection across the line through `origin` pointing along `angle`.
    ///
    /// Points on that line, and directions parallel to it, are left unchanged.
    #[must_use]
    pub fn mirror_about_axis(origin: Point2, angle: f64) -> Self {
        let reflect = Self {
            translation: Vec2::ZERO,
            rotation: normalize_angle(2.0 * angle),
            mirror: true,
        };
        Self::translate(origin.to_vec2())
            .compose(reflect)
            .compose(Self::translate(-origin.to_vec2()))
    }

    #[must_use]
    pub fn is_identity(self, tol: Tolerance) -> bool {
        !self.mirror
            && angle_approx_eq(self.rotation, 0.0, tol)
            && tol.approx_zero_f64(self.translation.length())
    }

    /// `self ∘ inner`: the result applies `inner` first, then `self`.
    #[must_use]
    pub fn compose(self, inner: Self) -> Self {
        let inner_rotation = if self.mirror {
            -inner.rotation
        } else {
            inner.rotation
        };
        Self {
            translation: self.apply_vec(inner.translation) + self.translation,
            rotation: normalize_angle(self.rotation + inner_rotation),
            mirror: self.mirror ^ inner.mirror,
        }
    }

    #[must_use]
    pub fn inverse(self) -> Self {
        let rotation = if self.mirror {
            self.rotation
        } else {
            normalize_angle(-self.rotation)
        };
        let linear = Self {
            translation: Vec2::ZERO,
            rotation,
            mirror: self.mirror,
        };
        Self {
            translation: -linear.apply_vec(self.translation),
            ..linear
        }
    }

    #[must_use]
    pub fn apply_vec(self, v: Vec2) -> Vec2 {
        let mut c = v.to_complex();
        if self.mirror {
            c = c.conj();
        }
        Vec2::from_complex(c * unit_rotor(self.rotation))
    }

    #[must_use]
    pub fn apply_point(self, p: Point2) -> Point2 {
        Point2::ORIGIN + self.apply_vec(p.to_vec2()) + self.translation
    }

    /// Map a direction angle (degrees) through the transform.
    #[must_use]
    pub fn apply_angle(self, angle: f64) -> f64 {
        let local = if self.mirror { -angle } else { angle };
        normalize_angle(local + self.rotation)
    }

    #[must_use]
    pub fn approx_eq(self, other: Self, tol: Tolerance) -> bool {
        self.mirror == other.mirror
            && angle_approx_eq(self.rotation, other.rotation, tol)
            && tol.approx_eq_vec2(self.translation, other.translation)
    }
}

impl Default for Transform2 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mul for Transform2 {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self::Output {
        self.compose(rhs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BBox2
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BBox2 {
    pub min: Point2,
    pub max: Point2,
}

impl BBox2 {
    #[must_use]
    pub const fn new(min: Point2, max: Point2) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Point2>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut min = first;
        let mut max = first;
        for p in iter {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        Some(Self::new(min, max))
    }

    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self::new(
            Point2::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            Point2::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        )
    }

    #[must_use]
    pub fn width(self) -> f64 {
        self.max.x - self.min.x
    }

    #[must_use]
    pub fn height(self) -> f64 {
        self.max.y - self.min.y
    }

    #[must_use]
    pub fn center(self) -> Point2 {
        Point2::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tolerance
// ─────────────────────────────────────────────────────────────────────────────

/// Geometric tolerance used throughout the layout engine.
///
/// - `Tolerance::DEFAULT` - Coordinate comparisons (1e-9)
/// - `Tolerance::ANGLE` - Angular comparisons in degrees (1e-9)
/// - `Tolerance::LOOSE` - Coarse comparisons, e.g. accumulated path lengths (1e-6)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub eps: f64,
}

impl Tolerance {
    /// Default geometric tolerance (1e-9).
    pub const DEFAULT: Self = Self { eps: 1e-9 };

    /// Tolerance for angular comparisons in degrees (1e-9).
    pub const ANGLE: Self = Self { eps: 1e-9 };

    /// Loose tolerance for coarse comparisons (1e-6).
    pub const LOOSE: Self = Self { eps: 1e-6 };

    #[must_use]
    pub const fn new(eps: f64) -> Self {
        Self { eps }
    }

    #[must_use]
    pub fn approx_eq_f64(self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.eps
    }

    #[must_use]
    pub fn approx_zero_f64(self, a: f64) -> bool {
        a.abs() <= self.eps
    }

    #[must_use]
    pub fn approx_eq_point2(self, a: Point2, b: Point2) -> bool {
        (a - b).length_squared() <= self.eps * self.eps
    }

    #[must_use]
    pub fn approx_eq_vec2(self, a: Vec2, b: Vec2) -> bool {
        (a - b).length_squared() <= self.eps * self.eps
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
