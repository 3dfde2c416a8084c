use geoanchor::{GeoPoint, Heading, PlacementEngine, PlacementParams};
use uom::si::angle::{degree, radian};
use uom::si::f64::Angle;

fn main() {
    let engine = PlacementEngine::new(PlacementParams::default());
    let tree = GeoPoint::from_degrees(51.5007, -0.1246).expect("coordinates are in range");

    // walking a circle around the tree while always looking at it keeps it dead ahead,
    // at the same scaled distance
    for bearing_from_tree in [0., 90., 180., 270.] {
        let towards_tree = (bearing_from_tree + 180.) % 360.;
        let here = offset_by_meters(&tree, bearing_from_tree, 30.);
        let heading = Heading::from_degrees(towards_tree);

        let offset = engine.place_at_bearing(
            here.bearing_to(&tree),
            engine.scaled_distance(here.distance_to(&tree)),
            heading,
        );
        assert!(offset.x().abs() < 1e-3, "{offset}");
        assert!((offset.z() - -4.).abs() < 1e-2, "{offset}");
    }

    // turning 90 degrees to the right moves the tree to the left edge of the view
    let south_of_tree = offset_by_meters(&tree, 180., 30.);
    let offset = engine.place_at_bearing(
        south_of_tree.bearing_to(&tree),
        engine.scaled_distance(south_of_tree.distance_to(&tree)),
        Heading::from_degrees(90.),
    );
    assert!(offset.x() < -2.9, "{offset}");
}

/// Small-distance flat-earth step, plenty accurate for a few tens of meters.
fn offset_by_meters(from: &GeoPoint, bearing_degrees: f64, meters: f64) -> GeoPoint {
    const METERS_PER_DEGREE: f64 = 111_194.93;
    let bearing = Angle::new::<degree>(bearing_degrees);
    let north = meters * bearing.get::<radian>().cos() / METERS_PER_DEGREE;
    let east = meters * bearing.get::<radian>().sin() / METERS_PER_DEGREE
        / from.latitude().get::<radian>().cos();
    GeoPoint::from_degrees(
        from.latitude().get::<degree>() + north,
        from.longitude().get::<degree>() + east,
    )
    .expect("small steps stay in range")
}
