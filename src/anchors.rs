//! Geo-anchored objects and the registry that holds them for a session.
//!
//! Anchors are loaded once from configuration and never change afterwards. The registry keeps
//! them in configuration order and applies the authoring safeguard that keeps unconfigured
//! anchors out of the scene: an anchor left at the (0°, 0°) placeholder is skipped, *except*
//! for the very first entry. Existing anchor files rely on that asymmetry.

use crate::geo::{distance, GeoPoint};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};
use uom::si::f64::Length;

/// Unique identifier of an [`Anchor`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnchorId(String);

impl AnchorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnchorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What an anchor looks like. The mesh for each kind is built by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorKind {
    Tree,
    Santa,
    Snowman,
    Present,
    Star,
}

impl AnchorKind {
    pub const ALL: [AnchorKind; 5] = [
        AnchorKind::Tree,
        AnchorKind::Santa,
        AnchorKind::Snowman,
        AnchorKind::Present,
        AnchorKind::Star,
    ];

    /// Whether the renderer should keep this kind spinning about its vertical axis.
    #[must_use]
    pub fn spins(self) -> bool {
        matches!(self, AnchorKind::Star)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AnchorKind::Tree => "tree",
            AnchorKind::Santa => "santa",
            AnchorKind::Snowman => "snowman",
            AnchorKind::Present => "present",
            AnchorKind::Star => "star",
        }
    }
}

impl fmt::Display for AnchorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-axis scale of an anchor's model.
///
/// Written in configuration either as a space-separated string (`"10 10 10"`) or as an array
/// (`[10, 10, 10]`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ScaleRepr", into = "[f64; 3]")]
pub struct Scale(Vector3<f64>);

impl Scale {
    #[must_use]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self(Vector3::new(x, y, z))
    }

    /// Like [`Scale::new`], but rejects non-finite components.
    pub fn try_new(x: f64, y: f64, z: f64) -> Result<Self, RegistryError> {
        let scale = Self::new(x, y, z);
        if scale.0.iter().all(|c| c.is_finite()) {
            Ok(scale)
        } else {
            Err(RegistryError::InvalidScale(format!("{x} {y} {z}")))
        }
    }

    #[must_use]
    pub fn uniform(factor: f64) -> Self {
        Self::new(factor, factor, factor)
    }

    #[must_use]
    pub fn as_vector(&self) -> &Vector3<f64> {
        &self.0
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::uniform(1.)
    }
}

impl From<Scale> for [f64; 3] {
    fn from(scale: Scale) -> Self {
        [scale.0.x, scale.0.y, scale.0.z]
    }
}

impl FromStr for Scale {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RegistryError::InvalidScale(s.to_owned());
        let mut parts = s.split_whitespace().map(f64::from_str);
        let mut next = || parts.next().ok_or_else(invalid)?.map_err(|_| invalid());
        let (x, y, z) = (next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(invalid());
        }
        Self::try_new(x, y, z).map_err(|_| invalid())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScaleRepr {
    Text(String),
    Components([f64; 3]),
}

impl TryFrom<ScaleRepr> for Scale {
    type Error = RegistryError;

    fn try_from(repr: ScaleRepr) -> Result<Self, Self::Error> {
        match repr {
            ScaleRepr::Text(s) => s.parse(),
            ScaleRepr::Components([x, y, z]) => Self::try_new(x, y, z),
        }
    }
}

/// A CSS-style hex colour (`#rgb` or `#rrggbb`) that the renderer tints the model with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ColorHint(String);

impl ColorHint {
    /// The colour as `0xRRGGBB`, with `#rgb` shorthand expanded.
    #[must_use]
    pub fn rgb(&self) -> u32 {
        let digits = &self.0[1..];
        let value = u32::from_str_radix(digits, 16).unwrap_or_default();
        if digits.len() == 3 {
            let (r, g, b) = ((value >> 8) & 0xf, (value >> 4) & 0xf, value & 0xf);
            (r * 0x11) << 16 | (g * 0x11) << 8 | b * 0x11
        } else {
            value
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ColorHint {
    fn default() -> Self {
        Self("#ffffff".to_owned())
    }
}

impl TryFrom<String> for ColorHint {
    type Error = RegistryError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let valid = s.strip_prefix('#').is_some_and(|hex| {
            matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
        });
        if valid {
            Ok(Self(s))
        } else {
            Err(RegistryError::InvalidColor(s))
        }
    }
}

impl From<ColorHint> for String {
    fn from(color: ColorHint) -> Self {
        color.0
    }
}

/// One anchor entry exactly as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorRecord {
    pub id: AnchorId,
    pub latitude: f64,
    pub longitude: f64,
    pub kind: AnchorKind,
    #[serde(default)]
    pub scale: Scale,
    pub name: String,
    #[serde(default)]
    pub color: ColorHint,
}

/// A virtual object pinned to a real-world location.
#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    id: AnchorId,
    name: String,
    position: GeoPoint,
    kind: AnchorKind,
    scale: Scale,
    color: ColorHint,
}

impl Anchor {
    /// Validates a configuration record.
    pub fn from_record(record: AnchorRecord) -> Result<Self, RegistryError> {
        let AnchorRecord {
            id,
            latitude,
            longitude,
            kind,
            scale,
            name,
            color,
        } = record;
        let position = GeoPoint::from_degrees(latitude, longitude).ok_or_else(|| {
            RegistryError::InvalidCoordinates {
                id: id.clone(),
                latitude,
                longitude,
            }
        })?;
        Ok(Self {
            id,
            name,
            position,
            kind,
            scale,
            color,
        })
    }

    #[must_use]
    pub fn id(&self) -> &AnchorId {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn position(&self) -> &GeoPoint {
        &self.position
    }

    #[must_use]
    pub fn kind(&self) -> AnchorKind {
        self.kind
    }

    #[must_use]
    pub fn scale(&self) -> Scale {
        self.scale
    }

    #[must_use]
    pub fn color(&self) -> &ColorHint {
        &self.color
    }
}

/// Problems with anchor configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("anchor id `{0}` is used more than once")]
    DuplicateId(AnchorId),
    #[error("anchor `{id}` has invalid coordinates ({latitude}, {longitude})")]
    InvalidCoordinates {
        id: AnchorId,
        latitude: f64,
        longitude: f64,
    },
    #[error("invalid scale `{0}`, expected three numbers such as \"1 1 1\"")]
    InvalidScale(String),
    #[error("invalid colour `{0}`, expected #rgb or #rrggbb")]
    InvalidColor(String),
}

/// The fixed, ordered set of anchors for a session.
#[derive(Debug, Clone, Default)]
pub struct AnchorRegistry {
    anchors: Vec<Anchor>,
    /// Positions in `anchors` that take part in placement.
    placeable: Vec<usize>,
}

impl AnchorRegistry {
    /// Validates and loads anchors in configuration order.
    pub fn from_records(
        records: impl IntoIterator<Item = AnchorRecord>,
    ) -> Result<Self, RegistryError> {
        let anchors = records
            .into_iter()
            .map(Anchor::from_record)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(anchors)
    }

    /// Loads already-validated anchors, rejecting duplicate ids.
    pub fn new(anchors: Vec<Anchor>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::with_capacity(anchors.len());
        for anchor in &anchors {
            if !seen.insert(anchor.id()) {
                return Err(RegistryError::DuplicateId(anchor.id().clone()));
            }
        }

        let mut placeable = Vec::with_capacity(anchors.len());
        for (index, anchor) in anchors.iter().enumerate() {
            if index > 0 && anchor.position().is_unset() {
                warn!(
                    id = %anchor.id(),
                    name = anchor.name(),
                    "skipping anchor at (0, 0); please set GPS coordinates"
                );
                continue;
            }
            placeable.push(index);
        }

        debug!(
            total = anchors.len(),
            placeable = placeable.len(),
            "anchor registry loaded"
        );
        Ok(Self { anchors, placeable })
    }

    /// Every anchor, in configuration order.
    #[must_use]
    pub fn all(&self) -> &[Anchor] {
        &self.anchors
    }

    /// The anchors that take part in placement, in configuration order.
    ///
    /// Leaves out every anchor still at the (0°, 0°) placeholder, except the first one.
    pub fn placeable(&self) -> impl ExactSizeIterator<Item = &Anchor> + '_ {
        self.placeable.iter().map(|&i| &self.anchors[i])
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Anchor> {
        self.anchors.iter().find(|a| a.id().as_str() == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// How many anchors have real coordinates, ie are not at the (0°, 0°) placeholder.
    ///
    /// Unlike [`AnchorRegistry::placeable`], this does not make an exception for the first one.
    #[must_use]
    pub fn configured_count(&self) -> usize {
        self.anchors
            .iter()
            .filter(|a| !a.position().is_unset())
            .count()
    }

    /// The closest configured anchor strictly within `within` of `from`, with its distance.
    ///
    /// Placeholder anchors never count, regardless of their position in the list. Ties go to
    /// the anchor listed first.
    #[must_use]
    pub fn nearest(&self, from: &GeoPoint, within: Length) -> Option<(&Anchor, Length)> {
        self.anchors
            .iter()
            .filter(|a| !a.position().is_unset())
            .map(|a| (a, distance(from, a.position())))
            .fold(None, |best: Option<(&Anchor, Length)>, (anchor, d)| match best {
                Some((_, best_d)) if best_d <= d => best,
                _ => Some((anchor, d)),
            })
            .filter(|(_, d)| *d < within)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;
    use uom::si::length::meter;

    fn record(id: &str, latitude: f64, longitude: f64, kind: AnchorKind) -> AnchorRecord {
        AnchorRecord {
            id: AnchorId::new(id),
            latitude,
            longitude,
            kind,
            scale: Scale::default(),
            name: id.to_uppercase(),
            color: ColorHint::default(),
        }
    }

    fn ids<'a>(anchors: impl Iterator<Item = &'a Anchor>) -> Vec<&'a str> {
        anchors.map(|a| a.id().as_str()).collect()
    }

    fn m(meters: f64) -> Length {
        Length::new::<meter>(meters)
    }

    #[test]
    fn keeps_configuration_order() {
        let registry = AnchorRegistry::from_records([
            record("c", 1., 1., AnchorKind::Tree),
            record("a", 2., 2., AnchorKind::Star),
            record("b", 3., 3., AnchorKind::Santa),
        ])
        .unwrap();
        assert_eq!(ids(registry.all().iter()), ["c", "a", "b"]);
        assert_eq!(ids(registry.placeable()), ["c", "a", "b"]);
    }

    #[test]
    fn placeholder_anchors_after_the_first_are_skipped() {
        let registry = AnchorRegistry::from_records([
            record("tree-1", 0., 0., AnchorKind::Tree),
            record("santa-1", 0.0001, 0.0001, AnchorKind::Santa),
            record("snowman-1", 0., 0., AnchorKind::Snowman),
            record("star-1", -0.0001, -0.0001, AnchorKind::Star),
        ])
        .unwrap();

        assert_eq!(registry.len(), 4);
        assert_eq!(ids(registry.placeable()), ["tree-1", "santa-1", "star-1"]);
        assert_eq!(registry.configured_count(), 2);
    }

    #[test]
    fn near_zero_is_not_the_placeholder() {
        let registry = AnchorRegistry::from_records([
            record("a", 1., 1., AnchorKind::Tree),
            record("b", 0., 1e-9, AnchorKind::Tree),
        ])
        .unwrap();
        assert_eq!(registry.placeable().len(), 2);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = AnchorRegistry::from_records([
            record("x", 1., 1., AnchorKind::Tree),
            record("x", 2., 2., AnchorKind::Star),
        ])
        .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateId(AnchorId::new("x")));
    }

    #[test]
    fn invalid_coordinates_are_rejected() {
        let err = AnchorRegistry::from_records([record("x", 91., 0., AnchorKind::Tree)])
            .unwrap_err();
        insta::assert_snapshot!(err, @"anchor `x` has invalid coordinates (91, 0)");
    }

    #[test]
    fn lookup_by_id() {
        let registry =
            AnchorRegistry::from_records([record("gift", 1., 1., AnchorKind::Present)]).unwrap();
        assert_eq!(registry.get("gift").map(Anchor::kind), Some(AnchorKind::Present));
        assert!(registry.get("coal").is_none());
    }

    #[test]
    fn nearest_skips_placeholders_and_respects_range() {
        let registry = AnchorRegistry::from_records([
            record("origin", 0., 0., AnchorKind::Tree),
            record("near", 0.001, 0., AnchorKind::Santa),
            record("far", 0.005, 0., AnchorKind::Star),
        ])
        .unwrap();
        let here = GeoPoint::from_degrees(0., 0.).unwrap();

        let (anchor, d) = registry.nearest(&here, m(1000.)).unwrap();
        assert_eq!(anchor.id().as_str(), "near");
        assert_relative_eq!(d.get::<meter>(), 111.194_926_6, epsilon = 1e-3);

        assert!(registry.nearest(&here, m(100.)).is_none());
    }

    #[test]
    fn nearest_ties_go_to_the_first() {
        let registry = AnchorRegistry::from_records([
            record("east", 0., 0.001, AnchorKind::Tree),
            record("west", 0., -0.001, AnchorKind::Tree),
        ])
        .unwrap();
        let here = GeoPoint::from_degrees(0., 0.).unwrap();
        let (anchor, _) = registry.nearest(&here, m(1000.)).unwrap();
        assert_eq!(anchor.id().as_str(), "east");
    }

    #[test]
    fn nearest_in_empty_registry() {
        let registry = AnchorRegistry::default();
        let here = GeoPoint::from_degrees(0., 0.).unwrap();
        assert!(registry.is_empty());
        assert!(registry.nearest(&here, m(1e9)).is_none());
    }

    #[rstest]
    #[case("10 10 10", Scale::uniform(10.))]
    #[case(" 1  2\t3 ", Scale::new(1., 2., 3.))]
    #[case("0.5 0.5 0.5", Scale::uniform(0.5))]
    fn scale_parses(#[case] text: &str, #[case] expected: Scale) {
        assert_eq!(text.parse::<Scale>().unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("1 2")]
    #[case("1 2 3 4")]
    #[case("a b c")]
    #[case("1 NaN 1")]
    fn scale_rejects(#[case] text: &str) {
        assert_eq!(
            text.parse::<Scale>(),
            Err(RegistryError::InvalidScale(text.to_owned()))
        );
    }

    #[rstest]
    #[case(f64::NAN, 1., 1.)]
    #[case(1., f64::INFINITY, 1.)]
    #[case(1., 1., f64::NEG_INFINITY)]
    fn scale_components_must_be_finite(#[case] x: f64, #[case] y: f64, #[case] z: f64) {
        assert!(matches!(
            Scale::try_new(x, y, z),
            Err(RegistryError::InvalidScale(_))
        ));
    }

    #[rstest]
    #[case(r#"scale = [nan, 1.0, 1.0]"#)]
    #[case(r#"scale = [1.0, inf, 1.0]"#)]
    #[case(r#"scale = "1 inf 1""#)]
    fn scale_rejects_non_finite_in_either_form(#[case] line: &str) {
        let record = format!(
            r#"
id = "santa-1"
latitude = 0.0
longitude = 0.0
kind = "santa"
name = "Santa"
{line}
"#
        );
        assert!(toml::from_str::<AnchorRecord>(&record).is_err(), "{line}");
    }

    #[rstest]
    #[case("#0f0", 0x00ff00)]
    #[case("#ffd700", 0xffd700)]
    #[case("#FFF", 0xffffff)]
    fn color_rgb(#[case] text: &str, #[case] expected: u32) {
        let color = ColorHint::try_from(text.to_owned()).unwrap();
        assert_eq!(color.rgb(), expected);
    }

    #[rstest]
    #[case("0f0")]
    #[case("#12345")]
    #[case("#ggg")]
    fn color_rejects(#[case] text: &str) {
        assert!(ColorHint::try_from(text.to_owned()).is_err());
    }

    #[test]
    fn only_stars_spin() {
        let spinning: Vec<_> = AnchorKind::ALL.into_iter().filter(|k| k.spins()).collect();
        assert_eq!(spinning, [AnchorKind::Star]);
    }

    #[test]
    fn record_serde_accepts_both_scale_forms() {
        let yaml = "
id: star-1
latitude: -0.0001
longitude: -0.0001
kind: star
scale: 2 2 2
name: Christmas Star
color: '#ffd700'
";
        let from_text: AnchorRecord = serde_yaml::from_str(yaml).unwrap();
        let from_array: AnchorRecord =
            serde_yaml::from_str(&yaml.replace("scale: 2 2 2", "scale: [2, 2, 2]")).unwrap();
        assert_eq!(from_text, from_array);
        assert_eq!(from_text.scale, Scale::uniform(2.));

        let back: AnchorRecord =
            serde_yaml::from_str(&serde_yaml::to_string(&from_text).unwrap()).unwrap();
        assert_eq!(back, from_text);
    }
}
