//! This library places virtual objects anchored to real-world GPS coordinates in front of a
//! camera, so that an AR view can show "the tree is 40 m that way" without any visual tracking.
//!
//! The inputs are the user's position and compass heading, as reported by the device's
//! sensors, plus a list of [`Anchor`]s loaded from configuration. The output, recomputed every
//! frame, is a camera-relative [`Offset`] for each anchor: left/right and forward/back in scene
//! units, with real-world distance compressed so that far-away anchors stay visible.
//!
//! The pieces, leaf-first:
//!
//! - [`geo`] has [`GeoPoint`] and the great-circle [`distance`](geo::distance) and
//!   [`bearing`](geo::bearing) between two points.
//! - [`sensors`] has the [`SensorStateTracker`], which turns raw position and orientation
//!   callbacks into a consistent [`UserState`] snapshot. It decides which orientation source to
//!   trust and how to calibrate one that has no notion of north.
//! - [`anchors`] has the [`AnchorRegistry`], the immutable and ordered set of anchors.
//! - [`placement`] has the [`PlacementEngine`], which is pure: a state and an anchor in, a
//!   [`PlacementResult`] out.
//! - [`session`] wires all of the above into one [`Session`] that a host drives from its sensor
//!   callbacks and render loop, handing results to a [`RenderAdapter`].
//!
//! # Examples
//!
//! A user standing at the equator facing north sees an anchor placed ~11 m due north straight
//! ahead of them:
//!
//! ```
//! use geoanchor::{Config, GeoPoint, Heading, PlacementEngine, UserState};
//!
//! let config = Config::from_toml_str(
//!     r##"
//!     [[anchors]]
//!     id = "santa-1"
//!     latitude = 0.0001
//!     longitude = 0.0
//!     kind = "santa"
//!     name = "Santa Claus"
//!     "##,
//! )
//! .expect("configuration is valid");
//! let registry = config.registry().expect("anchor ids are unique");
//! let engine = PlacementEngine::new(config.placement);
//!
//! let here = GeoPoint::from_degrees(0., 0.).expect("coordinates are in range");
//! let state = UserState::at(here, Heading::north());
//!
//! for placement in engine.place_all(state, &registry) {
//!     let offset = placement.offset().expect("user position is known");
//!     assert!(offset.x().abs() < 1e-9); // dead ahead
//!     assert!(offset.z() < -1.); // and in front of the camera
//!     assert_eq!(offset.y(), -0.5); // at ground height
//! }
//! ```
//!
//! Hosts that want the whole pipeline rather than the pure engine should start a [`Session`]
//! and forward sensor events into it:
//!
//! ```
//! use geoanchor::{
//!     Anchor, Config, Offset, Permissions, PositionSample, RenderAdapter, Session, Transform,
//! };
//! use uom::si::{f64::Time, time::second};
//!
//! struct Scene(Vec<(String, Offset)>);
//!
//! impl RenderAdapter for Scene {
//!     fn place(&mut self, anchor: &Anchor, transform: Transform) {
//!         self.0.push((anchor.name().to_owned(), transform.offset));
//!     }
//! }
//!
//! let config = Config::from_toml_str(
//!     r##"
//!     [[anchors]]
//!     id = "star-1"
//!     latitude = -0.0001
//!     longitude = -0.0001
//!     kind = "star"
//!     name = "Christmas Star"
//!     "##,
//! )
//! .expect("configuration is valid");
//! let mut session = Session::start(&config, Permissions::granted()).expect("permissions granted");
//!
//! let mut scene = Scene(Vec::new());
//! assert_eq!(session.render_tick(&mut scene), 0, "nothing is placed before the first fix");
//!
//! session.on_position_sample(PositionSample {
//!     latitude: 0.,
//!     longitude: 0.,
//!     accuracy: None,
//!     at: Time::new::<second>(1.),
//! });
//! assert_eq!(session.render_tick(&mut scene), 1);
//! assert_eq!(scene.0[0].0, "Christmas Star");
//! ```

mod util;

pub mod anchors;
pub mod config;
pub mod geo;
pub mod heading;
pub mod placement;
pub mod sensors;
pub mod session;

pub use anchors::{Anchor, AnchorId, AnchorKind, AnchorRecord, AnchorRegistry, RegistryError};
pub use config::{Config, ConfigError};
pub use geo::GeoPoint;
pub use heading::Heading;
pub use placement::{Offset, PlacementEngine, PlacementParams, PlacementResult};
pub use sensors::{
    HeadingSample, OrientationSource, PositionError, PositionRequest, PositionSample, Sensor,
    SensorAvailability, SensorStateTracker, UserState,
};
pub use session::{
    Permission, Permissions, RenderAdapter, Session, SessionError, StatusLine, Transform,
};
