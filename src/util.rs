use std::f64::consts::{PI, TAU};
use uom::si::angle::radian;
use uom::si::f64::Angle;

#[cfg(any(test, feature = "approx"))]
use approx::{AbsDiffEq, RelativeEq};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An angle that is kept on the compass circle, ie in [0°, 360°).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub(crate) struct BoundedAngle {
    radians: f64,
}

impl BoundedAngle {
    pub(crate) fn new(angle: impl Into<Angle>) -> Self {
        Self {
            radians: wrap_full_turn(angle.into().get::<radian>()),
        }
    }

    pub(crate) fn to_angle(self) -> Angle {
        Angle::new::<radian>(self.radians)
    }

    /// Returns the angle in [-π, π).
    pub(crate) fn to_signed_range(self) -> f64 {
        if self.radians < PI {
            self.radians
        } else {
            self.radians - TAU
        }
    }
}

impl<U: Into<Angle>> From<U> for BoundedAngle {
    fn from(value: U) -> Self {
        BoundedAngle::new(value)
    }
}

/// Wraps radians into [0, 2π).
///
/// `rem_euclid` on a tiny negative input rounds up to exactly 2π, which is outside the range.
pub(crate) fn wrap_full_turn(radians: f64) -> f64 {
    if !radians.is_finite() {
        return 0.;
    }
    let wrapped = radians.rem_euclid(TAU);
    if wrapped >= TAU {
        0.
    } else {
        // also folds -0.0 into +0.0
        wrapped + 0.
    }
}

#[cfg(any(test, feature = "approx"))]
impl AbsDiffEq<Self> for BoundedAngle {
    type Epsilon = f64;

    fn default_epsilon() -> Self::Epsilon {
        1e-9
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        BoundedAngle::new(Angle::new::<radian>(self.radians - other.radians))
            .to_signed_range()
            .abs()
            <= epsilon
    }
}

#[cfg(any(test, feature = "approx"))]
impl RelativeEq for BoundedAngle {
    fn default_max_relative() -> Self::Epsilon {
        f64::default_max_relative()
    }

    fn relative_eq(
        &self,
        other: &Self,
        epsilon: Self::Epsilon,
        max_relative: Self::Epsilon,
    ) -> bool {
        let (lo, hi) = if self.radians <= other.radians {
            (self.radians, other.radians)
        } else {
            (other.radians, self.radians)
        };
        // the circle closes at 0 == 2π
        f64::relative_eq(&lo, &hi, epsilon, max_relative)
            || f64::relative_eq(&(lo + TAU), &hi, epsilon, max_relative)
    }
}

#[cfg(test)]
mod tests {
    use super::{wrap_full_turn, BoundedAngle};
    use approx::{assert_abs_diff_eq, assert_abs_diff_ne, assert_relative_eq};
    use rstest::rstest;
    use std::f64::consts::TAU;
    use uom::si::angle::{degree, radian};
    use uom::si::f64::Angle;

    fn d(degrees: f64) -> Angle {
        Angle::new::<degree>(degrees)
    }

    #[rstest]
    #[case(d(0.), 0.)]
    #[case(d(-90.), 270.)]
    #[case(d(-390.), 330.)]
    #[case(d(360.), 0.)]
    #[case(d(725.), 5.)]
    fn wraps_onto_compass_circle(#[case] input: Angle, #[case] expected_degrees: f64) {
        let bounded = BoundedAngle::new(input);
        assert_relative_eq!(
            bounded.to_angle().get::<radian>(),
            expected_degrees.to_radians(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn tiny_negative_never_rounds_to_full_turn() {
        let wrapped = wrap_full_turn(-1e-18);
        assert!((0. ..TAU).contains(&wrapped), "{wrapped} escaped [0, 2π)");
    }

    #[test]
    fn non_finite_collapses_to_zero() {
        assert_eq!(wrap_full_turn(f64::NAN), 0.);
        assert_eq!(wrap_full_turn(f64::INFINITY), 0.);
    }

    #[test]
    fn negative_zero_is_positive_zero() {
        assert!(wrap_full_turn(-0.).is_sign_positive());
    }

    #[rstest]
    #[case(d(0.), 0.)]
    #[case(d(180.), -180.)]
    #[case(d(359.), -1.)]
    #[case(d(90.), 90.)]
    #[case(d(-90.), -90.)]
    #[case(d(360. + 340.), -20.)]
    fn signed_range(#[case] input: Angle, #[case] expected_degrees: f64) {
        assert_relative_eq!(
            BoundedAngle::new(input).to_signed_range(),
            expected_degrees.to_radians(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn comparison_closes_the_circle() {
        let almost_full = BoundedAngle::new(d(360. - 1e-10));
        let zero = BoundedAngle::new(d(0.));
        assert_abs_diff_eq!(almost_full, zero, epsilon = 1e-9);
        assert_relative_eq!(almost_full, zero, epsilon = 1e-9);
        assert_abs_diff_ne!(BoundedAngle::new(d(10.)), BoundedAngle::new(d(2.)));
    }
}
