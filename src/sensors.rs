//! The single owner of "where is the user and which way are they facing".
//!
//! Position and orientation arrive on two independent streams at very different rates. Both
//! feed one [`SensorStateTracker`] through plain `&mut self` callbacks; everything downstream
//! only ever reads a copied [`UserState`] snapshot. Sensor failures are absorbed here: they are
//! logged and reported through [`SensorAvailability`], but never surface as errors to the
//! placement code.

use crate::geo::GeoPoint;
use crate::heading::Heading;
use tracing::{debug, trace, warn};
use uom::si::f64::{Angle, Length, Time};
use uom::si::{angle::degree, time::second};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A device sensor the tracker depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Sensor {
    Position,
    Orientation,
}

/// Which family of orientation events a heading sample came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum OrientationSource {
    /// Earth-referenced; alpha is used as the heading as-is.
    Absolute,
    /// Device-referenced; alpha runs counter to the compass and has an arbitrary zero.
    Relative,
}

/// One reading from the position source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSample {
    /// Degrees; validated by the tracker rather than by the host.
    pub latitude: f64,
    /// Degrees; validated by the tracker rather than by the host.
    pub longitude: f64,
    pub accuracy: Option<Length>,
    pub at: Time,
}

/// One reading from an orientation source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingSample {
    pub source: OrientationSource,
    /// `None` when the host fired the event without a reading.
    pub alpha: Option<Angle>,
    pub at: Time,
}

/// Failures reported by the position source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PositionError {
    #[error("location permission was denied")]
    PermissionDenied,
    #[error("position is currently unavailable")]
    Unavailable,
    #[error("timed out waiting for a position fix")]
    Timeout,
    #[error("this device has no location capability")]
    Unsupported,
}

/// How the position source should be polled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionRequest {
    pub high_accuracy: bool,
    pub timeout: Time,
    /// How old a cached fix the host may hand out; zero means always fresh.
    pub maximum_age: Time,
}

impl PositionRequest {
    /// The one-shot fix requested while the session starts.
    #[must_use]
    pub fn initial() -> Self {
        Self {
            high_accuracy: true,
            timeout: Time::new::<second>(10.),
            maximum_age: Time::new::<second>(0.),
        }
    }

    /// The continuous watch that runs for the rest of the session.
    #[must_use]
    pub fn watch() -> Self {
        Self {
            high_accuracy: true,
            timeout: Time::new::<second>(27.),
            maximum_age: Time::new::<second>(0.),
        }
    }
}

/// Which sensors the host has reported as present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorAvailability {
    pub position: bool,
    pub orientation: bool,
}

impl Default for SensorAvailability {
    fn default() -> Self {
        Self {
            position: true,
            orientation: true,
        }
    }
}

impl SensorAvailability {
    #[must_use]
    pub fn is_available(&self, sensor: Sensor) -> bool {
        match sensor {
            Sensor::Position => self.position,
            Sensor::Orientation => self.orientation,
        }
    }

    /// Whether placement can only run in a degraded mode.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !(self.position && self.orientation)
    }
}

/// A snapshot of the tracker's best estimate.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UserState {
    pub position: Option<GeoPoint>,
    pub position_accuracy: Option<Length>,
    /// North until the first usable orientation sample arrives.
    pub heading: Heading,
    pub last_position_update: Option<Time>,
    pub last_heading_update: Option<Time>,
}

impl UserState {
    /// A state with only a position set, for callers that drive placement directly.
    #[must_use]
    pub fn at(position: GeoPoint, heading: Heading) -> Self {
        Self {
            position: Some(position),
            heading,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_positioned(&self) -> bool {
        self.position.is_some()
    }

    /// True when no position has been seen or the last one is older than `max_age` at `now`.
    #[must_use]
    pub fn is_position_stale(&self, now: Time, max_age: Time) -> bool {
        is_stale(self.last_position_update, now, max_age)
    }

    /// True when no heading has been seen or the last one is older than `max_age` at `now`.
    #[must_use]
    pub fn is_heading_stale(&self, now: Time, max_age: Time) -> bool {
        is_stale(self.last_heading_update, now, max_age)
    }
}

fn is_stale(last: Option<Time>, now: Time, max_age: Time) -> bool {
    match last {
        None => true,
        Some(at) => now - at > max_age,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum OrientationMode {
    /// No usable sample yet.
    Waiting,
    /// Only relative samples so far; `reference` is the compass value that reads as north.
    Relative { reference: Angle },
    /// An absolute sample has been seen; relative samples are ignored from here on.
    Absolute,
}

/// Owns the current [`UserState`] and applies incoming sensor samples to it.
#[derive(Debug, Clone)]
pub struct SensorStateTracker {
    state: UserState,
    availability: SensorAvailability,
    orientation: OrientationMode,
}

impl Default for SensorStateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorStateTracker {
    /// A tracker with no position, heading north, and both sensors presumed present.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: UserState::default(),
            availability: SensorAvailability::default(),
            orientation: OrientationMode::Waiting,
        }
    }

    /// Overwrites the current position (last writer wins).
    ///
    /// Samples with out-of-range or non-finite coordinates are dropped and the previous
    /// position is kept, as are all samples once the position sensor is marked unavailable.
    pub fn on_position_sample(&mut self, sample: PositionSample) {
        if !self.availability.position {
            trace!("ignoring position sample from an unavailable sensor");
            return;
        }
        let Some(point) = GeoPoint::from_degrees(sample.latitude, sample.longitude) else {
            warn!(
                latitude = sample.latitude,
                longitude = sample.longitude,
                "dropping position sample with invalid coordinates"
            );
            return;
        };

        debug!(%point, at_s = sample.at.get::<second>(), "position updated");
        self.state.position = Some(point);
        self.state.position_accuracy = sample.accuracy;
        self.state.last_position_update = Some(sample.at);
    }

    /// Records a failed position callback. The previous position is kept.
    pub fn on_position_error(&mut self, error: PositionError, at: Time) {
        warn!(%error, at_s = at.get::<second>(), "position source error");
        if error == PositionError::Unsupported {
            self.mark_unavailable(Sensor::Position);
        }
    }

    /// Applies an orientation reading according to the source-priority policy.
    ///
    /// Absolute readings are used directly and permanently lock out relative ones. Until then,
    /// relative readings are converted to compass sense and self-calibrated so that the first
    /// one reads as north.
    pub fn on_heading_sample(&mut self, sample: HeadingSample) {
        if !self.availability.orientation {
            trace!(source = ?sample.source, "ignoring sample from an unavailable compass");
            return;
        }
        let Some(alpha) = sample.alpha else {
            trace!(source = ?sample.source, "orientation event without alpha");
            return;
        };
        if !alpha.get::<degree>().is_finite() {
            warn!(source = ?sample.source, "dropping non-finite orientation sample");
            return;
        }

        let heading = match (sample.source, self.orientation) {
            (OrientationSource::Absolute, mode) => {
                if mode != OrientationMode::Absolute {
                    debug!("absolute orientation available; ignoring relative source from now on");
                    self.orientation = OrientationMode::Absolute;
                }
                Heading::new(alpha)
            }
            (OrientationSource::Relative, OrientationMode::Absolute) => return,
            (OrientationSource::Relative, OrientationMode::Waiting) => {
                let compass = relative_to_compass(alpha);
                debug!(
                    reference_deg = compass.get::<degree>(),
                    "calibrating relative orientation to north"
                );
                self.orientation = OrientationMode::Relative { reference: compass };
                Heading::north()
            }
            (OrientationSource::Relative, OrientationMode::Relative { reference }) => {
                Heading::new(relative_to_compass(alpha) - reference)
            }
        };

        trace!(heading = %heading, "heading updated");
        self.state.heading = heading;
        self.state.last_heading_update = Some(sample.at);
    }

    /// Records that the host lacks `sensor` entirely. The corresponding field keeps its last
    /// value (unset or north if it never reported) for the rest of the session, and later
    /// samples from that sensor are ignored.
    pub fn mark_unavailable(&mut self, sensor: Sensor) {
        let slot = match sensor {
            Sensor::Position => &mut self.availability.position,
            Sensor::Orientation => &mut self.availability.orientation,
        };
        if *slot {
            warn!(?sensor, "sensor unavailable; placement continues degraded");
            *slot = false;
        }
    }

    #[must_use]
    pub fn current_state(&self) -> UserState {
        self.state
    }

    #[must_use]
    pub fn availability(&self) -> SensorAvailability {
        self.availability
    }

    /// Whether an absolute orientation source has taken over.
    #[must_use]
    pub fn has_absolute_orientation(&self) -> bool {
        self.orientation == OrientationMode::Absolute
    }
}

/// Relative alpha increases counter-clockwise; compass headings increase clockwise.
fn relative_to_compass(alpha: Angle) -> Angle {
    Angle::new::<degree>(360.) - alpha
}
