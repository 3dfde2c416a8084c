//! geoanchor-replay - drive a placement session from a recorded sensor log
//!
//! Reads a TOML configuration and a JSON-lines event log, feeds the events into a session, and
//! prints one JSON line per render tick with every placed anchor, plus the status line whenever
//! it refreshes.
//!
//! Usage:
//!   geoanchor-replay --config config/neighborhood.toml events.jsonl
//!   cat events.jsonl | geoanchor-replay --config config/neighborhood.toml
//!
//! Event lines look like:
//!   {"t": 0.0, "event": "position", "latitude": 0.00005, "longitude": 0.0, "accuracy": 4.0}
//!   {"t": 0.1, "event": "heading", "source": "absolute", "alpha": 90.0}
//!   {"t": 0.2, "event": "position_error", "error": "timeout"}
//!   {"t": 0.3, "event": "unavailable", "sensor": "orientation"}
//!   {"t": 0.5, "event": "tick"}

use anyhow::Context;
use clap::Parser;
use geoanchor::{
    Anchor, Config, HeadingSample, Offset, OrientationSource, Permissions, PositionError,
    PositionSample, RenderAdapter, Sensor, Session, StatusLine, Transform,
};
use serde::Deserialize;
use serde_json::json;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use uom::si::angle::{degree, radian};
use uom::si::f64::{Angle, Length, Time};
use uom::si::length::meter;
use uom::si::time::second;

/// Replay a recorded sensor log through a geo-anchored placement session
#[derive(Parser, Debug)]
#[command(name = "geoanchor-replay", version, about, long_about = None)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/neighborhood.toml")]
    config: PathBuf,

    /// JSON-lines event log; reads stdin when omitted
    events: Option<PathBuf>,

    /// Replay as though the user denied camera access
    #[arg(long)]
    deny_camera: bool,

    /// Replay as though the user denied location access
    #[arg(long)]
    deny_location: bool,
}

#[derive(Debug, Deserialize)]
struct Event {
    /// Seconds since session start.
    t: f64,
    #[serde(flatten)]
    kind: EventKind,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum EventKind {
    Position {
        latitude: f64,
        longitude: f64,
        /// Meters.
        #[serde(default)]
        accuracy: Option<f64>,
    },
    PositionError {
        error: PositionError,
    },
    Heading {
        source: OrientationSource,
        /// Degrees; absent when the device fired the event without a reading.
        #[serde(default)]
        alpha: Option<f64>,
    },
    Unavailable {
        sensor: Sensor,
    },
    Tick,
}

/// Collects one tick's placements as JSON values.
#[derive(Default)]
struct TickRecorder {
    anchors: Vec<serde_json::Value>,
    marker: Option<Offset>,
}

impl RenderAdapter for TickRecorder {
    fn place(&mut self, anchor: &Anchor, transform: Transform) {
        let offset = transform.offset;
        self.anchors.push(json!({
            "id": anchor.id(),
            "kind": anchor.kind(),
            "offset": [offset.x(), offset.y(), offset.z()],
            "spin": transform.spin.get::<radian>(),
        }));
    }

    fn place_marker(&mut self, offset: Offset) {
        self.marker = Some(offset);
    }
}

/// Applies one event to the session, returning the tick record for `tick` events.
fn apply(session: &mut Session, event: Event) -> Option<serde_json::Value> {
    let at = Time::new::<second>(event.t);
    match event.kind {
        EventKind::Position {
            latitude,
            longitude,
            accuracy,
        } => session.on_position_sample(PositionSample {
            latitude,
            longitude,
            accuracy: accuracy.map(Length::new::<meter>),
            at,
        }),
        EventKind::PositionError { error } => session.on_position_error(error, at),
        EventKind::Heading { source, alpha } => session.on_heading_sample(HeadingSample {
            source,
            alpha: alpha.map(Angle::new::<degree>),
            at,
        }),
        EventKind::Unavailable { sensor } => session.mark_unavailable(sensor),
        EventKind::Tick => {
            let mut recorder = TickRecorder::default();
            session.render_tick(&mut recorder);
            let mut record = json!({
                "t": event.t,
                "heading": session.heading().degrees(),
                "anchors": recorder.anchors,
            });
            if let Some(marker) = recorder.marker {
                record["marker"] = json!([marker.x(), marker.y(), marker.z()]);
            }
            if let Some(status) = session.status_tick(at) {
                record["status"] = match status {
                    StatusLine::Hidden => serde_json::Value::Null,
                    status => json!(status.to_string()),
                };
            }
            return Some(record);
        }
    }
    None
}

/// Replays every line of `input`, writing one JSON line per tick to `out`.
///
/// Returns the number of ticks written.
fn replay(
    session: &mut Session,
    input: impl BufRead,
    mut out: impl Write,
) -> anyhow::Result<usize> {
    let mut ticks = 0;
    for (number, line) in input.lines().enumerate() {
        let line = line.context("reading event log")?;
        if line.trim().is_empty() {
            continue;
        }
        let event: Event = serde_json::from_str(&line)
            .with_context(|| format!("event log line {}", number + 1))?;
        debug!(t = event.t, kind = ?event.kind, "replaying event");

        if let Some(record) = apply(session, event) {
            writeln!(out, "{record}")?;
            ticks += 1;
        }
    }
    Ok(ticks)
}

fn main() -> anyhow::Result<()> {
    // logs go to stderr so stdout stays machine-readable
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    info!(version = env!("CARGO_PKG_VERSION"), "geoanchor-replay starting");

    let config = Config::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let permissions = Permissions {
        camera: !args.deny_camera,
        location: !args.deny_location,
    };
    let mut session = Session::start(&config, permissions)?;

    let input: Box<dyn BufRead> = match &args.events {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("opening {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let ticks = replay(&mut session, input, io::stdout().lock())?;
    info!(ticks, "replay finished");
    Ok(())
}
