//! Fixed-point math utilities for deterministic simulation.
//!
//! Positions live on the ground plane. [`Vec2Fixed::y`] is the world's
//! depth axis (the `z` axis of the renderer), height is never simulated.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Build a fixed-point value from an integer ratio, e.g. `ratio(8, 100)` for 0.08.
#[must_use]
pub fn ratio(numerator: i32, denominator: i32) -> Fixed {
    Fixed::from_num(numerator) / Fixed::from_num(denominator)
}

/// Fixed-point 2D vector on the ground plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Depth coordinate (world `z`).
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Create a vector from whole-number coordinates.
    #[must_use]
    pub fn from_ints(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Create a vector from float coordinates.
    ///
    /// Only used at the boundary (spawn jitter, protocol input); values are
    /// quantized immediately so the simulation itself never sees floats.
    #[must_use]
    pub fn from_f32(x: f32, y: f32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Create a vector from external float coordinates.
    ///
    /// Returns `None` for NaN, infinities and values outside the fixed-point
    /// range.
    #[must_use]
    pub fn checked_from_f64(x: f64, y: f64) -> Option<Self> {
        Some(Self::new(Fixed::checked_from_num(x)?, Fixed::checked_from_num(y)?))
    }

    /// Calculate squared distance (avoids sqrt for comparisons).
    ///
    /// Saturates at [`Fixed::MAX`], so far-apart pairs still order after
    /// every pair that fits.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let d = self.offset_to(other);
        d.x.saturating_mul(d.x).saturating_add(d.y.saturating_mul(d.y))
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        fixed_sqrt(self.distance_squared(other))
    }

    /// Euclidean length of this vector.
    #[must_use]
    pub fn length(self) -> Fixed {
        let scale = self.max_component();
        if scale <= Fixed::ONE {
            return fixed_sqrt(self.dot(self));
        }
        let unit = Self::new(self.x / scale, self.y / scale);
        fixed_sqrt(unit.dot(unit)).saturating_mul(scale)
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        self.x * other.x + self.y * other.y
    }

    /// Normalize vector using fixed-point math.
    ///
    /// The zero vector normalizes to zero.
    #[must_use]
    pub fn normalize(self) -> Self {
        // Scale into [-1, 1] first so the squared length cannot overflow.
        let scale = self.max_component();
        if scale == Fixed::ZERO {
            return Self::ZERO;
        }
        let unit = Self::new(self.x / scale, self.y / scale);
        let len = fixed_sqrt(unit.dot(unit));
        Self::new(unit.x / len, unit.y / len)
    }

    /// Move `speed` units in a straight line toward `target`.
    ///
    /// The step is not clamped to the remaining distance, so a unit closer
    /// than `speed` steps past its target. Arrival is decided by range checks
    /// before stepping, never by landing exactly on the target.
    #[must_use]
    pub fn step_toward(self, target: Self, speed: Fixed) -> Self {
        let step = self.offset_to(target).normalize() * speed;
        Self::new(self.x.saturating_add(step.x), self.y.saturating_add(step.y))
    }

    fn offset_to(self, other: Self) -> Self {
        Self::new(other.x.saturating_sub(self.x), other.y.saturating_sub(self.y))
    }

    fn max_component(self) -> Fixed {
        self.x.saturating_abs().max(self.y.saturating_abs())
    }
}

/// Computes the square root of a fixed-point number using binary search.
fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut low = Fixed::ZERO;
    let mut high = if value > Fixed::ONE { value } else { Fixed::ONE };

    // 48 halvings keep the error below the fractional resolution for any
    // on-map distance.
    for _ in 0..48 {
        let mid = low + (high - low) / Fixed::from_num(2);
        let mid_sq = mid.saturating_mul(mid);

        if mid_sq <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    low
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl std::ops::Mul<Fixed> for Vec2Fixed {
    type Output = Self;

    fn mul(self, rhs: Fixed) -> Self::Output {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}
