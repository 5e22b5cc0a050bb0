use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use time::OffsetDateTime;

/// One car position reported by the telemetry feed.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct PositionSample {
    pub driver_number: u32,
    pub x: f64,
    pub y: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Default)]
pub enum CarLocation {
    #[default]
    NoLocation,
    Pitlane,
    PitOut,
    OutLap,
    OnTrack,
    OutOfRace,
    Stopped,
}

impl CarLocation {
    /// Racing on circuit, as opposed to pitting or out of the session.
    pub fn is_circulating(self) -> bool {
        matches!(self, CarLocation::OnTrack | CarLocation::OutLap)
    }

    pub fn is_retired(self) -> bool {
        matches!(self, CarLocation::OutOfRace | CarLocation::Stopped)
    }
}

/// Per-car timing tick.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct TimingUpdate {
    pub driver_number: u32,
    pub lap: i32,
    #[serde(default)]
    pub sector1: Duration,
    #[serde(default)]
    pub sector2: Duration,
    #[serde(default)]
    pub sector3: Duration,
    #[serde(default)]
    pub location: CarLocation,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl TimingUpdate {
    /// A zero sector means the lap was not fully timed (safety car, missing data).
    pub fn all_sectors_timed(&self) -> bool {
        !self.sector1.is_zero() && !self.sector2.is_zero() && !self.sector3.is_zero()
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self { Self { x, y } }

    /// Source coordinates are truncated toward zero.
    pub fn from_sample(sample: &PositionSample) -> Self {
        Self { x: sample.x as i32, y: sample.y as i32 }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Bounds {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
}

impl Bounds {
    pub fn x_range(&self) -> f64 { f64::from(self.max_x) - f64::from(self.min_x) }
    pub fn y_range(&self) -> f64 { f64::from(self.max_y) - f64::from(self.min_y) }
}

/// A circuit layout can change from one season to the next, so geometry is
/// keyed by name and the year the layout was introduced.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackKey {
    pub name: String,
    pub year: i32,
}

impl TrackKey {
    pub fn new(name: impl Into<String>, year: i32) -> Self {
        Self { name: name.into(), year }
    }
}

/// Reconstructed outline and pit lane of one circuit layout.
///
/// Points are in the feed's coordinate space. The bounding box covers the
/// outline only.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackGeometry {
    pub name: String,
    pub year_created: i32,
    #[serde(default)]
    pub outline: Vec<Point>,
    #[serde(default)]
    pub pitlane: Vec<Point>,
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
    #[serde(default)]
    pub rotation: f64,
}

impl TrackGeometry {
    pub fn empty(name: impl Into<String>, year_created: i32, rotation: f64) -> Self {
        Self {
            name: name.into(),
            year_created,
            outline: vec![],
            pitlane: vec![],
            min_x: 0,
            max_x: 0,
            min_y: 0,
            max_y: 0,
            rotation,
        }
    }

    pub fn key(&self) -> TrackKey { TrackKey::new(self.name.clone(), self.year_created) }

    pub fn bounds(&self) -> Bounds {
        Bounds { min_x: self.min_x, max_x: self.max_x, min_y: self.min_y, max_y: self.max_y }
    }

    pub fn set_bounds(&mut self, b: Bounds) {
        self.min_x = b.min_x;
        self.max_x = b.max_x;
        self.min_y = b.min_y;
        self.max_y = b.max_y;
    }

    /// Usable for layout as soon as there is an outline.
    pub fn has_outline(&self) -> bool { !self.outline.is_empty() }

    pub fn has_pitlane(&self) -> bool { !self.pitlane.is_empty() }
}

/// Per-circuit display correction. Not derivable from position data.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct TrackConfig {
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub axes_swapped: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackConfigTable {
    entries: HashMap<String, TrackConfig>,
}

impl TrackConfigTable {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, name: impl Into<String>, cfg: TrackConfig) -> Option<TrackConfig> {
        self.entries.insert(name.into(), cfg)
    }

    pub fn get(&self, name: &str) -> Option<&TrackConfig> { self.entries.get(name) }

    /// Tracks without an entry use no rotation and normal axes.
    pub fn resolve(&self, name: &str) -> TrackConfig {
        self.entries.get(name).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn merge(&mut self, other: TrackConfigTable) {
        self.entries.extend(other.entries);
    }
}

impl FromIterator<(String, TrackConfig)> for TrackConfigTable {
    fn from_iter<I: IntoIterator<Item = (String, TrackConfig)>>(iter: I) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

/// Display transform for one viewport size.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct TrackLayout {
    pub scale: f64,
    pub x_offset: i32,
    pub y_offset: i32,
    pub rotation: f64,
}
