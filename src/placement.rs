//! Turning (user, heading, anchor) into a camera-relative position.
//!
//! The camera frame follows the usual scene-graph convention: the viewer sits at the origin
//! looking down negative Z, positive X is to the viewer's right and positive Y is up. Real-world
//! distances are compressed before they reach that frame (see [`PlacementParams`]) so that far
//! away anchors stay on screen while nearby ones keep their relative ordering.
//!
//! Everything here is a pure function of its inputs and allocation-free, so it is safe to run on
//! every rendered frame.

use crate::anchors::{Anchor, AnchorKind, AnchorRegistry};
use crate::geo::{bearing, compass_degrees, distance};
use crate::heading::Heading;
use crate::sensors::UserState;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt;
use uom::si::angle::radian;
use uom::si::f64::{Angle, Length};
use uom::si::length::meter;
use uom::ConstZero;

#[cfg(any(test, feature = "approx"))]
use approx::{AbsDiffEq, RelativeEq};

/// Tunables for mapping real-world geometry into scene units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementParams {
    /// Meters per scene unit.
    pub distance_divisor: f64,
    /// Anchors never appear further than this many scene units away.
    pub cap_units: f64,
    /// Extra push along the view direction so anchors sit in front of the camera origin rather
    /// than on it.
    pub forward_bias: f64,
    /// Height of the ground plane every anchor is placed on.
    pub ground_height: f64,
    /// Self-rotation per render tick for kinds that spin, in radians.
    pub spin_per_tick: f64,
}

impl Default for PlacementParams {
    fn default() -> Self {
        Self {
            distance_divisor: 10.,
            cap_units: 5.,
            forward_bias: 1.,
            ground_height: -0.5,
            spin_per_tick: 0.01,
        }
    }
}

impl PlacementParams {
    /// Returns a description of the first parameter that would make placement produce
    /// non-finite or nonsensical offsets.
    pub fn check(&self) -> Result<(), &'static str> {
        let finite = [
            self.distance_divisor,
            self.cap_units,
            self.forward_bias,
            self.ground_height,
            self.spin_per_tick,
        ]
        .iter()
        .all(|v| v.is_finite());
        if !finite {
            Err("placement parameters must be finite")
        } else if self.distance_divisor <= 0. {
            Err("distance_divisor must be positive")
        } else if self.cap_units < 0. {
            Err("cap_units must not be negative")
        } else {
            Ok(())
        }
    }
}

/// A position in the camera frame, in scene units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Offset(Vector3<f64>);

impl Offset {
    #[must_use]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self(Vector3::new(x, y, z))
    }

    /// Positive is to the viewer's right.
    #[must_use]
    pub fn x(&self) -> f64 {
        self.0.x
    }

    /// Positive is up.
    #[must_use]
    pub fn y(&self) -> f64 {
        self.0.y
    }

    /// Negative is in front of the viewer.
    #[must_use]
    pub fn z(&self) -> f64 {
        self.0.z
    }

    #[must_use]
    pub fn as_vector(&self) -> &Vector3<f64> {
        &self.0
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|c| c.is_finite())
    }
}

impl Default for Offset {
    fn default() -> Self {
        Self(Vector3::zeros())
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x(), self.y(), self.z())
    }
}

#[cfg(any(test, feature = "approx"))]
impl AbsDiffEq<Self> for Offset {
    type Epsilon = f64;

    fn default_epsilon() -> Self::Epsilon {
        1e-9
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        self.0.abs_diff_eq(&other.0, epsilon)
    }
}

#[cfg(any(test, feature = "approx"))]
impl RelativeEq for Offset {
    fn default_max_relative() -> Self::Epsilon {
        f64::default_max_relative()
    }

    fn relative_eq(
        &self,
        other: &Self,
        epsilon: Self::Epsilon,
        max_relative: Self::Epsilon,
    ) -> bool {
        self.0.relative_eq(&other.0, epsilon, max_relative)
    }
}

/// Where one anchor should be drawn right now.
///
/// Results for an unpositioned user are marked invalid and must not be rendered. Their offset,
/// distance and bearing are all zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementResult<'a> {
    anchor: &'a Anchor,
    offset: Offset,
    distance: Length,
    bearing: Angle,
    valid: bool,
}

impl<'a> PlacementResult<'a> {
    fn invalid(anchor: &'a Anchor) -> Self {
        Self {
            anchor,
            offset: Offset::default(),
            distance: Length::ZERO,
            bearing: Angle::ZERO,
            valid: false,
        }
    }

    #[must_use]
    pub fn anchor(&self) -> &'a Anchor {
        self.anchor
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// The camera-relative position, or `None` if the result must not be rendered.
    #[must_use]
    pub fn offset(&self) -> Option<Offset> {
        self.valid.then_some(self.offset)
    }

    /// Real-world great-circle distance to the anchor.
    #[must_use]
    pub fn distance(&self) -> Length {
        self.distance
    }

    /// World bearing from the user to the anchor, clockwise from north.
    #[must_use]
    pub fn bearing(&self) -> Angle {
        self.bearing
    }

    /// [`PlacementResult::bearing`] in degrees, in [0, 360).
    #[must_use]
    pub fn bearing_degrees(&self) -> f64 {
        compass_degrees(self.bearing)
    }
}

/// Computes camera-relative placements for geo-anchored objects.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlacementEngine {
    params: PlacementParams,
}

impl PlacementEngine {
    #[must_use]
    pub fn new(params: PlacementParams) -> Self {
        Self { params }
    }

    #[must_use]
    pub fn params(&self) -> &PlacementParams {
        &self.params
    }

    /// Compresses a real-world distance into scene units: `min(meters / divisor, cap)`.
    #[must_use]
    pub fn scaled_distance(&self, distance: Length) -> f64 {
        let scaled = distance.get::<meter>() / self.params.distance_divisor;
        if scaled.is_nan() {
            return 0.;
        }
        scaled.min(self.params.cap_units)
    }

    /// Places one anchor relative to the user.
    #[must_use]
    pub fn place<'a>(&self, state: &UserState, anchor: &'a Anchor) -> PlacementResult<'a> {
        let Some(user) = state.position else {
            return PlacementResult::invalid(anchor);
        };

        let distance = distance(&user, anchor.position());
        let bearing = bearing(&user, anchor.position());
        let offset = self.offset_for(bearing, self.scaled_distance(distance), state.heading);

        PlacementResult {
            anchor,
            offset,
            distance,
            bearing,
            valid: true,
        }
    }

    /// Places every placeable anchor of `registry`, in registry order, without allocating.
    pub fn place_all<'a>(
        &'a self,
        state: UserState,
        registry: &'a AnchorRegistry,
    ) -> impl ExactSizeIterator<Item = PlacementResult<'a>> + 'a {
        registry
            .placeable()
            .map(move |anchor| self.place(&state, anchor))
    }

    /// Like [`PlacementEngine::place_all`], but overwrites a caller-owned buffer so the same
    /// allocation can be reused every frame.
    pub fn place_all_into<'a>(
        &self,
        state: &UserState,
        registry: &'a AnchorRegistry,
        out: &mut Vec<PlacementResult<'a>>,
    ) {
        out.clear();
        out.extend(registry.placeable().map(|anchor| self.place(state, anchor)));
    }

    /// Places something at a fixed world bearing and an already-scaled distance, independent
    /// of GPS. Only the heading matters, so this works before the first position fix.
    #[must_use]
    pub fn place_at_bearing(
        &self,
        bearing: Angle,
        distance_units: f64,
        heading: Heading,
    ) -> Offset {
        self.offset_for(bearing, distance_units, heading)
    }

    /// How far an anchor of `kind` should rotate about its own vertical axis this tick.
    #[must_use]
    pub fn spin_increment(&self, kind: AnchorKind) -> Angle {
        if kind.spins() {
            Angle::new::<radian>(self.params.spin_per_tick)
        } else {
            Angle::ZERO
        }
    }

    fn offset_for(&self, bearing: Angle, scaled: f64, heading: Heading) -> Offset {
        let relative = heading.relative(bearing).get::<radian>();
        let (sin, cos) = relative.sin_cos();
        Offset::new(
            sin * scaled,
            self.params.ground_height,
            -cos * scaled - self.params.forward_bias,
        )
    }
}
