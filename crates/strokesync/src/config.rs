//! Session configuration.
//!
//! Everything the host application tunes at construction time. The struct
//! deserializes strictly (unknown keys are rejected) and every field has a
//! default, so a YAML file only needs the keys it changes:
//!
//! ```yaml
//! profile: json_base64
//! axis_scale: [0.01, 0.01, 0.1]
//! min_points: 3
//! ```

use std::path::Path;
use std::time::Duration;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::codec::geometry::{COLOR_DIVISOR, POINT_DIVISOR};
use crate::codec::wrapper::{
    DEFAULT_OSC_ADDRESS, DEFAULT_PEER_ID, INBOUND_FRAME_EVENT, OUTBOUND_STROKE_EVENT,
};
use crate::codec::{PayloadWrapper, WireOptions, WireProfile};
use crate::net::tracking::{DEFAULT_RECENT_WINDOW, MAX_RECENT_WINDOW};
use crate::stroke::Color3;
use crate::transform::{CoordinateTransform, SpaceTransform};

pub const DEFAULT_MIN_POINTS: usize = 3;
pub const DEFAULT_SEND_INTERVAL_MS: u64 = 100;
pub const DEFAULT_LOCAL_BIND: &str = "0.0.0.0:0";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub profile: WireProfile,
    pub peer_id: String,
    pub osc_address: String,
    pub inbound_event: String,
    pub outbound_event: String,
    pub point_divisor: f32,
    pub color_divisor: f32,
    pub fallback_color: Color3,
    pub axis_scale: Vec3,
    pub space_transform: Option<SpaceTransform>,
    pub min_points: usize,
    pub recent_window: usize,
    pub send_interval_ms: u64,
    pub local_bind: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            profile: WireProfile::default(),
            peer_id: DEFAULT_PEER_ID.to_string(),
            osc_address: DEFAULT_OSC_ADDRESS.to_string(),
            inbound_event: INBOUND_FRAME_EVENT.to_string(),
            outbound_event: OUTBOUND_STROKE_EVENT.to_string(),
            point_divisor: POINT_DIVISOR,
            color_divisor: COLOR_DIVISOR,
            fallback_color: Color3::WHITE,
            axis_scale: Vec3::ONE,
            space_transform: None,
            min_points: DEFAULT_MIN_POINTS,
            recent_window: DEFAULT_RECENT_WINDOW,
            send_interval_ms: DEFAULT_SEND_INTERVAL_MS,
            local_bind: DEFAULT_LOCAL_BIND.to_string(),
        }
    }
}

impl SessionConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_yaml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, v) in [
            ("point_divisor", self.point_divisor),
            ("color_divisor", self.color_divisor),
        ] {
            if !v.is_finite() || v == 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be finite and non-zero, got {v}"
                )));
            }
        }
        if !self.axis_scale.is_finite() {
            return Err(ConfigError::Invalid("axis_scale must be finite".into()));
        }
        if self.recent_window > MAX_RECENT_WINDOW {
            return Err(ConfigError::Invalid(format!(
                "recent_window must be at most {MAX_RECENT_WINDOW}, got {}",
                self.recent_window
            )));
        }
        if let Some(space) = &self.space_transform {
            if !space.is_valid() {
                return Err(ConfigError::Invalid(
                    "space_transform needs finite components and a non-zero rotation".into(),
                ));
            }
        }
        if self.send_interval_ms == 0 {
            return Err(ConfigError::Invalid("send_interval_ms must be > 0".into()));
        }
        if self.inbound_event.is_empty() || self.outbound_event.is_empty() {
            return Err(ConfigError::Invalid("event names must not be empty".into()));
        }
        if !self.osc_address.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "osc_address must start with '/', got {:?}",
                self.osc_address
            )));
        }
        Ok(())
    }

    pub fn send_interval(&self) -> Duration {
        Duration::from_millis(self.send_interval_ms)
    }

    pub fn wire_options(&self) -> WireOptions {
        WireOptions {
            peer_id: self.peer_id.clone(),
            osc_address: self.osc_address.clone(),
            inbound_event: self.inbound_event.clone(),
            outbound_event: self.outbound_event.clone(),
            point_divisor: self.point_divisor,
            color_divisor: self.color_divisor,
            fallback_color: self.fallback_color,
        }
    }

    pub fn wrapper(&self) -> PayloadWrapper {
        PayloadWrapper::new(self.profile, self.wire_options())
    }

    pub fn transform(&self) -> CoordinateTransform {
        CoordinateTransform::new(
            self.axis_scale,
            self.space_transform.map(|t| t.to_affine()),
        )
    }
}
