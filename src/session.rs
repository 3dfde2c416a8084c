//! One AR session: the tracker, registry, and engine wired into a single pipeline.
//!
//! Hosts forward sensor callbacks into the session, call [`Session::render_tick`] once per
//! displayed frame, and call [`Session::status_tick`] from whatever timer drives their info
//! text. Optional stages (orientation tracking, anchor placement, a fixed-bearing marker) are
//! switched on and off through [`SessionConfig`] rather than by swapping code paths.

use crate::anchors::{Anchor, AnchorRegistry};
use crate::config::{Config, ConfigError, SessionConfig};
use crate::heading::Heading;
use crate::placement::{Offset, PlacementEngine};
use crate::sensors::{
    HeadingSample, PositionError, PositionSample, Sensor, SensorAvailability, SensorStateTracker,
    UserState,
};
use std::fmt;
use tracing::{debug, error, info};
use uom::si::angle::degree;
use uom::si::f64::{Angle, Length, Time};
use uom::si::length::meter;
use uom::si::time::second;

/// A host permission the session cannot run without.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Camera,
    Location,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Camera => f.write_str("camera"),
            Permission::Location => f.write_str("location"),
        }
    }
}

/// The outcome of the host's permission prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions {
    pub camera: bool,
    pub location: bool,
}

impl Permissions {
    #[must_use]
    pub fn granted() -> Self {
        Self {
            camera: true,
            location: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The user has to restart the session by hand; there is no retry.
    #[error("please allow {0} access to use this experience")]
    PermissionDenied(Permission),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// What the renderer should do with one anchor this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub offset: Offset,
    /// Additional rotation about the anchor's own vertical axis.
    pub spin: Angle,
}

/// Receives placements from the session and draws them.
pub trait RenderAdapter {
    /// Called once per frame for every anchor with a valid placement.
    fn place(&mut self, anchor: &Anchor, transform: Transform);

    /// Called once per frame with the fixed-bearing marker's position, if one is configured.
    fn place_marker(&mut self, _offset: Offset) {}
}

/// The human-readable info line about the nearest anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusLine {
    Nearest { name: String, meters: u64 },
    /// Nothing close enough, or no position yet; the info surface should be hidden.
    Hidden,
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusLine::Nearest { name, meters } => {
                write!(f, "Nearest: {name}\nDistance: {meters}m away")
            }
            StatusLine::Hidden => Ok(()),
        }
    }
}

fn rounded_meters(distance: Length) -> u64 {
    distance.get::<meter>().round() as u64
}

pub struct Session {
    settings: SessionConfig,
    tracker: SensorStateTracker,
    registry: AnchorRegistry,
    engine: PlacementEngine,
    last_status_at: Option<Time>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("anchors", &self.registry.len())
            .field("state", &self.tracker.current_state())
            .field("availability", &self.tracker.availability())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Starts a session once the host's permission prompts have been answered.
    ///
    /// A denied camera or location permission is fatal.
    pub fn start(config: &Config, permissions: Permissions) -> Result<Self, SessionError> {
        for (permission, granted) in [
            (Permission::Camera, permissions.camera),
            (Permission::Location, permissions.location),
        ] {
            if !granted {
                error!(%permission, "permission denied; session not started");
                return Err(SessionError::PermissionDenied(permission));
            }
        }

        config.validate()?;
        let registry = config.registry()?;
        info!(
            anchors = registry.len(),
            placeable = registry.placeable().len(),
            configured = registry.configured_count(),
            "session started"
        );

        Ok(Self {
            settings: config.session.clone(),
            tracker: SensorStateTracker::new(),
            registry,
            engine: PlacementEngine::new(config.placement),
            last_status_at: None,
        })
    }

    pub fn on_position_sample(&mut self, sample: PositionSample) {
        self.tracker.on_position_sample(sample);
    }

    pub fn on_position_error(&mut self, error: PositionError, at: Time) {
        self.tracker.on_position_error(error, at);
    }

    /// Forwards an orientation sample, unless orientation tracking is switched off.
    pub fn on_heading_sample(&mut self, sample: HeadingSample) {
        if self.settings.orientation_tracking {
            self.tracker.on_heading_sample(sample);
        }
    }

    pub fn mark_unavailable(&mut self, sensor: Sensor) {
        self.tracker.mark_unavailable(sensor);
    }

    #[must_use]
    pub fn state(&self) -> UserState {
        self.tracker.current_state()
    }

    #[must_use]
    pub fn availability(&self) -> SensorAvailability {
        self.tracker.availability()
    }

    #[must_use]
    pub fn registry(&self) -> &AnchorRegistry {
        &self.registry
    }

    #[must_use]
    pub fn engine(&self) -> &PlacementEngine {
        &self.engine
    }

    /// Recomputes every placement and hands the valid ones to `adapter`.
    ///
    /// Returns how many anchors were placed. Runs on every frame and does not allocate.
    pub fn render_tick(&self, adapter: &mut impl RenderAdapter) -> usize {
        let state = self.tracker.current_state();

        if let Some(marker) = self.settings.marker {
            adapter.place_marker(self.engine.place_at_bearing(
                Angle::new::<degree>(marker.bearing_degrees),
                marker.distance_units,
                state.heading,
            ));
        }

        if !self.settings.anchor_placement {
            return 0;
        }

        let mut placed = 0;
        for result in self.engine.place_all(state, &self.registry) {
            let Some(offset) = result.offset() else {
                continue;
            };
            let anchor = result.anchor();
            adapter.place(
                anchor,
                Transform {
                    offset,
                    spin: self.engine.spin_increment(anchor.kind()),
                },
            );
            placed += 1;
        }
        placed
    }

    /// The nearest-anchor line for the current state.
    #[must_use]
    pub fn status(&self) -> StatusLine {
        let Some(here) = self.tracker.current_state().position else {
            return StatusLine::Hidden;
        };
        let within = Length::new::<meter>(self.settings.nearest_within_meters);
        match self.registry.nearest(&here, within) {
            Some((anchor, distance)) => StatusLine::Nearest {
                name: anchor.name().to_owned(),
                meters: rounded_meters(distance),
            },
            None => StatusLine::Hidden,
        }
    }

    /// Produces a fresh [`StatusLine`] if the status interval has elapsed since the last one.
    pub fn status_tick(&mut self, now: Time) -> Option<StatusLine> {
        let interval = Time::new::<second>(self.settings.status_interval_secs);
        if let Some(last) = self.last_status_at {
            if now - last < interval {
                return None;
            }
        }
        self.last_status_at = Some(now);
        let status = self.status();
        debug!(status = %status, "status refreshed");
        Some(status)
    }

    /// The text to show when the user taps an anchor, or `None` for an unknown id.
    #[must_use]
    pub fn anchor_info(&self, id: &str) -> Option<String> {
        let anchor = self.registry.get(id)?;
        let distance = match self.tracker.current_state().position {
            Some(here) => format!("{}m away", rounded_meters(here.distance_to(anchor.position()))),
            None => "unknown".to_owned(),
        };
        let mut info = format!("{}\n\nDistance: {distance}", anchor.name());
        if let Some(sign_off) = &self.settings.info_sign_off {
            info.push_str("\n\n");
            info.push_str(sign_off);
        }
        Some(info)
    }

    /// How many anchors have real coordinates, eg "Decorations in neighborhood: 4".
    #[must_use]
    pub fn count_line(&self) -> String {
        format!(
            "{}: {}",
            self.settings.count_label,
            self.registry.configured_count()
        )
    }

    /// The current heading, as the renderer's info overlay shows it.
    #[must_use]
    pub fn heading(&self) -> Heading {
        self.tracker.current_state().heading
    }
}
