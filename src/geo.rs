use crate::util::{wrap_full_turn, BoundedAngle};
use std::fmt;
use std::marker::PhantomData;
use uom::si::f64::{Angle, Length};
use uom::si::{
    angle::{degree, radian},
    length::meter,
};
use uom::ConstZero;

#[cfg(any(test, feature = "approx"))]
use approx::{AbsDiffEq, RelativeEq};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Mean radius of the Earth used for all great-circle math in this crate.
#[doc(alias = "R")]
pub const MEAN_EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A latitude/longitude pair on the surface of a spherical Earth.
///
/// Latitude is always in [-90°, 90°] and longitude in [-180°, 180°]; the constructors return
/// `None` for anything else (including NaN and infinities). Altitude is deliberately absent:
/// anchors are pinned to the ground plane.
///
/// <div class="warning">
///
/// Deserializing does not re-check the ranges above. Prefer [`GeoPoint::build`] for untrusted
/// input.
///
/// </div>
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeoPoint {
    latitude: Angle,
    longitude: Angle,
}

impl GeoPoint {
    /// Constructs a point from its components, or `None` if either is out of range.
    #[must_use]
    pub fn build(
        Components {
            latitude,
            longitude,
        }: Components,
    ) -> Option<Self> {
        Some(
            Self::builder()
                .latitude(latitude)?
                .longitude(longitude)?
                .build(),
        )
    }

    /// Provides a constructor for a [`GeoPoint`].
    pub fn builder() -> Builder<MissingLatitude, MissingLongitude> {
        Builder {
            under_construction: GeoPoint {
                latitude: Angle::ZERO,
                longitude: Angle::ZERO,
            },
            has: (PhantomData, PhantomData),
        }
    }

    /// Shorthand for [`GeoPoint::build`] with plain degrees, as delivered by position sources.
    #[must_use]
    pub fn from_degrees(latitude: f64, longitude: f64) -> Option<Self> {
        Self::build(Components {
            latitude: Angle::new::<degree>(latitude),
            longitude: Angle::new::<degree>(longitude),
        })
    }

    /// Degrees north of the equator, in [-90°, 90°].
    #[must_use]
    pub fn latitude(&self) -> Angle {
        self.latitude
    }

    /// Degrees east of the prime meridian, in [-180°, 180°].
    #[must_use]
    pub fn longitude(&self) -> Angle {
        self.longitude
    }

    /// Whether this is the (0°, 0°) placeholder used in anchor configuration to mean "not
    /// configured yet".
    #[must_use]
    pub fn is_unset(&self) -> bool {
        self.latitude.get::<degree>() == 0. && self.longitude.get::<degree>() == 0.
    }

    /// Great-circle distance to `other`; see [`distance`].
    #[must_use]
    pub fn distance_to(&self, other: &GeoPoint) -> Length {
        distance(self, other)
    }

    /// Initial bearing towards `other`; see [`bearing`].
    #[must_use]
    pub fn bearing_to(&self, other: &GeoPoint) -> Angle {
        bearing(self, other)
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lat = self.latitude.get::<degree>();
        let lon = self.longitude.get::<degree>();
        let ns = if lat.is_sign_negative() && lat != 0. { 'S' } else { 'N' };
        let ew = if lon.is_sign_negative() && lon != 0. { 'W' } else { 'E' };
        write!(f, "{:.6}°{ns}, {:.6}°{ew}", lat.abs(), lon.abs())
    }
}

/// Computes the [great-circle distance] between two points using the [haversine formula] on a
/// sphere of radius [`MEAN_EARTH_RADIUS_METERS`].
///
/// The result is symmetric in its arguments, zero for identical points, and finite for every
/// valid pair (antipodal points yield half the circumference).
///
/// [great-circle distance]: https://en.wikipedia.org/wiki/Great-circle_distance
/// [haversine formula]: https://en.wikipedia.org/wiki/Haversine_formula
#[doc(alias = "haversine")]
#[must_use]
pub fn distance(a: &GeoPoint, b: &GeoPoint) -> Length {
    Length::new::<meter>(central_angle(a, b) * MEAN_EARTH_RADIUS_METERS)
}

/// [`distance`] in plain meters.
#[must_use]
pub fn distance_meters(a: &GeoPoint, b: &GeoPoint) -> f64 {
    distance(a, b).get::<meter>()
}

/// Computes the initial bearing (forward azimuth) of the great circle from `from` to `to`.
///
/// The result is in [0°, 360°), clockwise from north. When `from == to` the direction is
/// undefined and 0° is returned.
///
/// See <https://www.movable-type.co.uk/scripts/latlong.html#bearing>.
#[doc(alias = "forward_azimuth")]
#[must_use]
pub fn bearing(from: &GeoPoint, to: &GeoPoint) -> Angle {
    let phi_a = from.latitude.get::<radian>(); // φ1
    let phi_b = to.latitude.get::<radian>(); // φ2
    let delta_lambda = (to.longitude - from.longitude).get::<radian>(); // Δλ

    let y = delta_lambda.sin() * phi_b.cos();
    let x = phi_a.cos() * phi_b.sin() - phi_a.sin() * phi_b.cos() * delta_lambda.cos();

    BoundedAngle::new(Angle::new::<radian>(y.atan2(x))).to_angle()
}

/// [`bearing`] in plain degrees, guaranteed to lie in [0, 360).
#[must_use]
pub fn bearing_degrees(from: &GeoPoint, to: &GeoPoint) -> f64 {
    compass_degrees(bearing(from, to))
}

/// Converts an angle into compass degrees in [0, 360).
pub(crate) fn compass_degrees(angle: Angle) -> f64 {
    wrap_full_turn(angle.get::<radian>()).to_degrees() % 360.
}

/// Central angle (in radians) between two points.
fn central_angle(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let phi_a = a.latitude.get::<radian>();
    let phi_b = b.latitude.get::<radian>();
    let half_delta_phi = (phi_b - phi_a) / 2.;
    let half_delta_lambda = (b.longitude - a.longitude).get::<radian>() / 2.;

    let h = half_delta_phi.sin().powi(2)
        + phi_a.cos() * phi_b.cos() * half_delta_lambda.sin().powi(2);
    // rounding can push h just past 1 for antipodal points
    let h = h.clamp(0., 1.);

    2. * h.sqrt().atan2((1. - h).sqrt())
}

#[cfg(any(test, feature = "approx"))]
impl AbsDiffEq<Self> for GeoPoint {
    type Epsilon = Length;

    fn default_epsilon() -> Self::Epsilon {
        Length::new::<meter>(0.01)
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        distance(self, other) <= epsilon
    }
}

#[cfg(any(test, feature = "approx"))]
impl RelativeEq for GeoPoint {
    fn default_max_relative() -> Self::Epsilon {
        Length::new::<meter>(f64::default_max_relative())
    }

    fn relative_eq(
        &self,
        other: &Self,
        epsilon: Self::Epsilon,
        _max_relative: Self::Epsilon,
    ) -> bool {
        // there is no meaningful "relative" scale for a position on the globe
        self.abs_diff_eq(other, epsilon)
    }
}

/// Argument type for [`GeoPoint::build`].
#[derive(Debug, Default, Clone, Copy)]
#[must_use]
pub struct Components {
    /// Must be in [-90°, 90°].
    pub latitude: Angle,

    /// Must be in [-180°, 180°].
    pub longitude: Angle,
}

/// Used to indicate that a partially-constructed [`GeoPoint`] is missing its latitude.
pub struct MissingLatitude;
/// Used to indicate that a partially-constructed [`GeoPoint`] has its latitude set.
pub struct HasLatitude;
/// Used to indicate that a partially-constructed [`GeoPoint`] is missing its longitude.
pub struct MissingLongitude;
/// Used to indicate that a partially-constructed [`GeoPoint`] has its longitude set.
pub struct HasLongitude;

/// [Builder] for a [`GeoPoint`].
///
/// Construct one through [`GeoPoint::builder`], and finalize with [`Builder::build`].
///
/// [Builder]: https://rust-unofficial.github.io/patterns/patterns/creational/builder.html
#[derive(Debug)]
#[must_use]
pub struct Builder<Latitude, Longitude> {
    under_construction: GeoPoint,
    has: (PhantomData<Latitude>, PhantomData<Longitude>),
}

// manual impls of Clone and Copy to avoid requiring the markers to be Copy + Clone
impl<L1, L2> Clone for Builder<L1, L2> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<L1, L2> Copy for Builder<L1, L2> {}

fn within_degrees(angle: Angle, limit: f64) -> bool {
    // compare in the stored unit so that the limits themselves survive the degree conversion
    let limit = Angle::new::<degree>(limit);
    angle.get::<radian>().is_finite() && -limit <= angle && angle <= limit
}

impl<L1, L2> Builder<L1, L2> {
    /// Sets the latitude of the [`GeoPoint`]-to-be.
    ///
    /// Returns `None` unless the latitude is in [-90°, 90°].
    pub fn latitude(mut self, latitude: impl Into<Angle>) -> Option<Builder<HasLatitude, L2>> {
        let latitude = latitude.into();
        if !within_degrees(latitude, 90.) {
            return None;
        }
        self.under_construction.latitude = latitude;
        Some(Builder {
            under_construction: self.under_construction,
            has: (PhantomData::<HasLatitude>, self.has.1),
        })
    }

    /// Sets the longitude of the [`GeoPoint`]-to-be.
    ///
    /// Returns `None` unless the longitude is in [-180°, 180°].
    pub fn longitude(mut self, longitude: impl Into<Angle>) -> Option<Builder<L1, HasLongitude>> {
        let longitude = longitude.into();
        if !within_degrees(longitude, 180.) {
            return None;
        }
        self.under_construction.longitude = longitude;
        Some(Builder {
            under_construction: self.under_construction,
            has: (self.has.0, PhantomData::<HasLongitude>),
        })
    }
}

impl Builder<HasLatitude, HasLongitude> {
    #[must_use]
    pub fn build(self) -> GeoPoint {
        self.under_construction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use quickcheck::{quickcheck, Arbitrary, TestResult};
    use rstest::rstest;

    fn p(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::from_degrees(lat, lon).expect("test coordinates are in range")
    }

    fn finite(g: &mut quickcheck::Gen) -> f64 {
        // quickcheck hands out NaN and friends -- we ignore those
        loop {
            match f64::arbitrary(g) {
                0. => break 0.,
                f if f.is_normal() => break f,
                _ => {}
            }
        }
    }

    impl Arbitrary for GeoPoint {
        fn arbitrary(g: &mut quickcheck::Gen) -> Self {
            let latitude = finite(g).rem_euclid(180.) - 90.;
            let longitude = finite(g).rem_euclid(360.) - 180.;
            GeoPoint::from_degrees(latitude, longitude).expect("folded into range")
        }

        fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
            let lat = self.latitude.get::<degree>();
            let lon = self.longitude.get::<degree>();
            if lon == 0. {
                Box::new(lat.shrink().filter_map(move |lat| GeoPoint::from_degrees(lat, lon)))
            } else {
                Box::new(lon.shrink().filter_map(move |lon| GeoPoint::from_degrees(lat, lon)))
            }
        }
    }

    #[rstest]
    #[case(90.000001, 0.)]
    #[case(-91., 0.)]
    #[case(0., 180.5)]
    #[case(0., -181.)]
    #[case(f64::NAN, 0.)]
    #[case(0., f64::INFINITY)]
    fn rejects_out_of_range(#[case] lat: f64, #[case] lon: f64) {
        assert_eq!(GeoPoint::from_degrees(lat, lon), None);
    }

    #[rstest]
    #[case(90., 180.)]
    #[case(-90., -180.)]
    #[case(0., 0.)]
    fn accepts_range_edges(#[case] lat: f64, #[case] lon: f64) {
        assert!(GeoPoint::from_degrees(lat, lon).is_some());
    }

    #[test]
    fn builder_and_components_agree() {
        let built = GeoPoint::builder()
            .latitude(Angle::new::<degree>(51.5))
            .expect("latitude is in [-90, 90]")
            .longitude(Angle::new::<degree>(-0.12))
            .expect("longitude is in [-180, 180]")
            .build();
        assert_eq!(Some(built), GeoPoint::from_degrees(51.5, -0.12));
    }

    #[test]
    fn sentinel_is_exactly_zero_zero() {
        assert!(p(0., 0.).is_unset());
        assert!(p(-0., 0.).is_unset());
        assert!(!p(0.0001, 0.).is_unset());
        assert!(!p(0., -0.0001).is_unset());
    }

    #[test]
    fn display() {
        insta::assert_snapshot!(p(35.3619, 138.728), @"35.361900°N, 138.728000°E");
        insta::assert_snapshot!(p(-33.8688, -151.2093), @"33.868800°S, 151.209300°W");
        insta::assert_snapshot!(p(0., 0.), @"0.000000°N, 0.000000°E");
    }

    #[test]
    fn one_ten_thousandth_of_a_degree_north() {
        // 0.0001° of latitude is ~11.1m on a 6371km sphere
        let d = distance_meters(&p(0., 0.), &p(0.0001, 0.));
        assert_relative_eq!(d, 11.119_492_664, epsilon = 1e-6);
    }

    #[rstest]
    // London -> Paris
    #[case(p(51.5074, -0.1278), p(48.8566, 2.3522), 343_556.)]
    // New York -> Los Angeles
    #[case(p(40.7128, -74.006), p(34.0522, -118.2437), 3_935_746.)]
    fn known_distances(#[case] a: GeoPoint, #[case] b: GeoPoint, #[case] meters: f64) {
        assert_relative_eq!(distance_meters(&a, &b), meters, max_relative = 1e-3);
    }

    #[test]
    fn antipodes_are_half_a_circumference() {
        let d = distance_meters(&p(0., 0.), &p(0., 180.));
        assert!(d.is_finite());
        assert_relative_eq!(d, std::f64::consts::PI * MEAN_EARTH_RADIUS_METERS, epsilon = 1e-3);

        let d = distance_meters(&p(90., 0.), &p(-90., 0.));
        assert_relative_eq!(d, std::f64::consts::PI * MEAN_EARTH_RADIUS_METERS, epsilon = 1e-3);
    }

    #[rstest]
    #[case(p(0., 0.), p(1., 0.), 0.)]
    #[case(p(0., 0.), p(0., 1.), 90.)]
    #[case(p(0., 0.), p(-1., 0.), 180.)]
    #[case(p(0., 0.), p(0., -1.), 270.)]
    #[case(p(0., 0.), p(0.0001, 0.0001), 45.)]
    #[case(p(0., 179.9), p(0., -179.9), 90.)]
    fn cardinal_bearings(#[case] from: GeoPoint, #[case] to: GeoPoint, #[case] expected: f64) {
        assert_abs_diff_eq!(bearing_degrees(&from, &to), expected, epsilon = 1e-6);
    }

    #[test]
    fn bearing_between_identical_points_is_stable() {
        let here = p(48.1, 11.5);
        assert_eq!(bearing_degrees(&here, &here), 0.);
    }

    #[test]
    fn bearing_is_not_simply_reversed() {
        // London -> Paris is ~148°, but Paris -> London is not 328°
        let london = p(51.5074, -0.1278);
        let paris = p(48.8566, 2.3522);
        let there = bearing_degrees(&london, &paris);
        let back = bearing_degrees(&paris, &london);
        assert_abs_diff_eq!(there, 148.1, epsilon = 0.1);
        assert!(((there + 180.) - back).abs() > 1.);
    }

    #[test]
    fn colinear_on_meridian() {
        let a = p(10., 5.);
        let b = p(10.5, 5.);
        let c = p(11.25, 5.);
        assert_relative_eq!(
            distance_meters(&a, &c),
            distance_meters(&a, &b) + distance_meters(&b, &c),
            epsilon = 1e-3
        );
    }

    quickcheck! {
        fn distance_is_symmetric(a: GeoPoint, b: GeoPoint) -> bool {
            approx::relative_eq!(
                distance_meters(&a, &b),
                distance_meters(&b, &a),
                epsilon = 1e-6
            )
        }

        fn distance_to_self_is_zero(a: GeoPoint) -> bool {
            distance_meters(&a, &a) == 0.
        }

        fn distance_is_finite_and_bounded(a: GeoPoint, b: GeoPoint) -> bool {
            let d = distance_meters(&a, &b);
            d.is_finite() && d >= 0. && d <= std::f64::consts::PI * MEAN_EARTH_RADIUS_METERS + 1e-3
        }

        fn bearing_in_compass_range(a: GeoPoint, b: GeoPoint) -> bool {
            let deg = bearing_degrees(&a, &b);
            (0. ..360.).contains(&deg)
        }

        fn colinear_points_add_up(lat: f64, lon: f64, step: f64) -> TestResult {
            if !(lat.is_finite() && lon.is_finite() && step.is_finite()) {
                return TestResult::discard();
            }
            // three points marching north along one meridian, staying off the pole
            let lat = lat.rem_euclid(100.) - 60.;
            let lon = lon.rem_euclid(360.) - 180.;
            let step = step.abs().rem_euclid(10.);
            let a = p(lat, lon);
            let b = p(lat + step, lon);
            let c = p(lat + 2. * step, lon);
            TestResult::from_bool(approx::relative_eq!(
                distance_meters(&a, &c),
                distance_meters(&a, &b) + distance_meters(&b, &c),
                epsilon = 1e-3
            ))
        }
    }

    #[test]
    fn serde_roundtrip() {
        let point = p(47.3769, 8.5417);
        let ser = serde_yaml::to_string(&point).unwrap();
        let de = serde_yaml::from_str::<GeoPoint>(&ser).unwrap();
        assert_eq!(point, de);
    }
}
