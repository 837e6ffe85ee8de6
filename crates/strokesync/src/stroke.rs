use std::time::{SystemTime, UNIX_EPOCH};

use glam::Vec3;
use serde::{Deserialize, Serialize};

pub type Point3 = Vec3;

/// Event tag used when a payload carries no channel name of its own.
pub const DEFAULT_SOURCE_EVENT: &str = "message";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 3]", into = "[f32; 3]")]
pub struct Color3 {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color3 {
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.r, self.g, self.b)
    }

    pub fn from_vec3(v: Vec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl Default for Color3 {
    fn default() -> Self {
        Self::WHITE
    }
}

impl From<[f32; 3]> for Color3 {
    fn from(c: [f32; 3]) -> Self {
        Self::new(c[0], c[1], c[2])
    }
}

impl From<Color3> for [f32; 3] {
    fn from(c: Color3) -> Self {
        c.to_array()
    }
}

/// One continuous drawn line.
///
/// Strokes are immutable: the `with_*` methods return a modified copy.
/// `index` is the sender's frame number and is only unique within the
/// recent history of a single peer.
#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    index: i32,
    timestamp: i64,
    color: Color3,
    points: Vec<Point3>,
    source_event: String,
}

impl Stroke {
    /// Snapshot a stroke for sending, stamped with the current time.
    pub fn new(index: i32, color: Color3, points: Vec<Point3>) -> Self {
        Self {
            index,
            timestamp: now_millis(),
            color,
            points,
            source_event: DEFAULT_SOURCE_EVENT.to_string(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_source_event(mut self, source_event: impl Into<String>) -> Self {
        self.source_event = source_event.into();
        self
    }

    pub fn with_points(mut self, points: Vec<Point3>) -> Self {
        self.points = points;
        self
    }

    pub fn index(&self) -> i32 {
        self.index
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn color(&self) -> Color3 {
        self.color
    }

    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    pub fn source_event(&self) -> &str {
        &self.source_event
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn into_points(self) -> Vec<Point3> {
        self.points
    }
}

/// Milliseconds since the Unix epoch, or 0 if the clock is before it.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
