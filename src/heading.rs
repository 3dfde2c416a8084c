use crate::geo::compass_degrees;
use crate::util::BoundedAngle;
use std::fmt;
use uom::si::angle::degree;
use uom::si::f64::Angle;

#[cfg(any(test, feature = "approx"))]
use approx::{AbsDiffEq, RelativeEq};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The compass direction the device is facing.
///
/// Always in [0°, 360°), clockwise from north. The default heading is north, which is also what
/// a device without any orientation sensor reports for the whole session.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Heading {
    inner: BoundedAngle,
}

impl Heading {
    #[must_use]
    pub fn north() -> Self {
        Self::default()
    }

    /// Wraps any angle onto the compass circle.
    #[must_use]
    pub fn new(angle: impl Into<Angle>) -> Self {
        Self {
            inner: BoundedAngle::new(angle),
        }
    }

    #[must_use]
    pub fn from_degrees(degrees: f64) -> Self {
        Self::new(Angle::new::<degree>(degrees))
    }

    #[must_use]
    pub fn angle(&self) -> Angle {
        self.inner.to_angle()
    }

    /// The heading in degrees, in [0, 360).
    #[must_use]
    pub fn degrees(&self) -> f64 {
        compass_degrees(self.angle())
    }

    /// Rotates a world bearing into this heading's forward-facing frame.
    ///
    /// A bearing straight ahead yields 0°; positive values are to the right. The result is in
    /// [-180°, 180°).
    #[must_use]
    pub fn relative(&self, bearing: Angle) -> Angle {
        Angle::new::<uom::si::angle::radian>(
            BoundedAngle::new(bearing - self.angle()).to_signed_range(),
        )
    }
}

impl fmt::Display for Heading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}°", self.degrees())
    }
}

#[cfg(any(test, feature = "approx"))]
impl AbsDiffEq<Self> for Heading {
    type Epsilon = <f64 as AbsDiffEq>::Epsilon;

    fn default_epsilon() -> Self::Epsilon {
        BoundedAngle::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        self.inner.abs_diff_eq(&other.inner, epsilon)
    }
}

#[cfg(any(test, feature = "approx"))]
impl RelativeEq for Heading {
    fn default_max_relative() -> Self::Epsilon {
        BoundedAngle::default_max_relative()
    }

    fn relative_eq(
        &self,
        other: &Self,
        epsilon: Self::Epsilon,
        max_relative: Self::Epsilon,
    ) -> bool {
        self.inner.relative_eq(&other.inner, epsilon, max_relative)
    }
}
