//! Typed payloads of the live sync channel and the REST stats/config surface.
//!
//! Every inbound message is a tagged variant; unknown fields are ignored,
//! unknown event kinds fail to decode and are dropped by the channel.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::pose::CameraType;

/// Backend → dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum SyncEvent {
    FrameUpdate(FrameUpdate),
    Stats(StatsPatch),
    ConfigUpdated(ConfigPatch),
    NewCommand(CommandEntry),
    Error(Notice),
    Status(Notice),
}

/// Dashboard → backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum ClientIntent {
    StartCamera,
    StopCamera,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FrameUpdate {
    /// base64 JPEG
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub inference_time: Option<f64>,
    /// Active HID tokens, in dispatch order
    #[serde(default)]
    pub instruction: Vec<String>,
    /// Active pose-action labels
    #[serde(default)]
    pub state: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Notice {
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// History entries carry no type; they are all sent commands
    #[default]
    Command,
    Detection,
    #[serde(other)]
    Info,
}

/// One entry of the command/detection log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEntry {
    /// Unix seconds
    pub timestamp: f64,
    #[serde(rename = "type", default)]
    pub kind: CommandKind,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl CommandEntry {
    pub fn text(&self) -> String {
        match (&self.message, &self.data) {
            (Some(m), _) => m.clone(),
            (None, Some(d)) => d.to_string(),
            (None, None) => String::new(),
        }
    }
}

/// Displayed detection statistics.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Stats {
    pub fps: f64,
    pub detections: u64,
    pub inference_time: f64,
    pub is_running: bool,
    pub current_fps: f64,
}

/// Partial stats, as pushed by `stats` events or returned by the poll.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detections: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inference_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_running: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_fps: Option<f64>,
}

impl Stats {
    /// Overwrites only the fields present in `patch`.
    pub fn merge(&mut self, patch: &StatsPatch) {
        if let Some(v) = patch.fps {
            self.fps = v;
        }
        if let Some(v) = patch.detections {
            self.detections = v;
        }
        if let Some(v) = patch.inference_time {
            self.inference_time = v;
        }
        if let Some(v) = patch.is_running {
            self.is_running = v;
        }
        if let Some(v) = patch.current_fps {
            self.current_fps = v;
        }
    }
}

pub const FPS_LIMIT_MIN: u32 = 1;
pub const FPS_LIMIT_MAX: u32 = 60;

/// Local mirror of the backend's live configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveConfig {
    pub confidence_threshold: f64,
    pub fps_limit: u32,
    #[serde(default)]
    pub camera_type: CameraType,
    #[serde(default)]
    pub target_ip: String,
    pub send_commands_enabled: bool,
    #[serde(default)]
    pub detection_enabled: bool,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            fps_limit: 30,
            camera_type: CameraType::default(),
            target_ip: String::new(),
            send_commands_enabled: false,
            detection_enabled: false,
        }
    }
}

/// A change to a subset of the recognized config options.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_type: Option<CameraType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_commands_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection_enabled: Option<bool>,
}

impl ConfigPatch {
    pub fn is_empty(&self) -> bool {
        *self == ConfigPatch::default()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(v) = self.confidence_threshold {
            if !(0.0..=1.0).contains(&v) {
                return Err(ValidationError::ConfigOutOfRange {
                    field: "confidence_threshold",
                    value: v.to_string(),
                });
            }
        }
        if let Some(v) = self.fps_limit {
            if !(FPS_LIMIT_MIN..=FPS_LIMIT_MAX).contains(&v) {
                return Err(ValidationError::ConfigOutOfRange {
                    field: "fps_limit",
                    value: v.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl LiveConfig {
    pub fn merge(&mut self, patch: &ConfigPatch) {
        if let Some(v) = patch.confidence_threshold {
            self.confidence_threshold = v;
        }
        if let Some(v) = patch.fps_limit {
            self.fps_limit = v;
        }
        if let Some(v) = patch.camera_type {
            self.camera_type = v;
        }
        if let Some(v) = &patch.target_ip {
            self.target_ip = v.clone();
        }
        if let Some(v) = patch.send_commands_enabled {
            self.send_commands_enabled = v;
        }
        if let Some(v) = patch.detection_enabled {
            self.detection_enabled = v;
        }
    }
}
