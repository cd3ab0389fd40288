use std::collections::BTreeMap;
use std::fmt;
use std::ops::Sub;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// COCO / MoveNet の 17 キーポイント
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(usize)]
pub enum KeypointName {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl KeypointName {
    pub const COUNT: usize = 17;

    /// 定義順の全キーポイント
    pub const ALL: [KeypointName; KeypointName::COUNT] = [
        Self::Nose,
        Self::LeftEye,
        Self::RightEye,
        Self::LeftEar,
        Self::RightEar,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// ワイヤ上の識別子 (snake_case)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nose => "nose",
            Self::LeftEye => "left_eye",
            Self::RightEye => "right_eye",
            Self::LeftEar => "left_ear",
            Self::RightEar => "right_ear",
            Self::LeftShoulder => "left_shoulder",
            Self::RightShoulder => "right_shoulder",
            Self::LeftElbow => "left_elbow",
            Self::RightElbow => "right_elbow",
            Self::LeftWrist => "left_wrist",
            Self::RightWrist => "right_wrist",
            Self::LeftHip => "left_hip",
            Self::RightHip => "right_hip",
            Self::LeftKnee => "left_knee",
            Self::RightKnee => "right_knee",
            Self::LeftAnkle => "left_ankle",
            Self::RightAnkle => "right_ankle",
        }
    }

    /// 表示用ラベル (例: "LEFT shoulder")
    pub fn label(&self) -> String {
        let spaced = self.as_str().replace('_', " ");
        for side in ["left", "right"] {
            if let Some(rest) = spaced.strip_prefix(side) {
                return format!("{}{}", side.to_uppercase(), rest);
            }
        }
        spaced
    }
}

impl fmt::Display for KeypointName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeypointName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|k| k.as_str() == s)
            .copied()
            .ok_or_else(|| ValidationError::UnknownKeypoint(s.to_string()))
    }
}

/// 2次元座標 / ベクトル。ワイヤ上は `[x, y]`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for Vec2 {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Vec2> for [f64; 2] {
    fn from(v: Vec2) -> Self {
        [v.x, v.y]
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// キーポイント → 座標
pub type KeypointMap = BTreeMap<KeypointName, Vec2>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypoint_count() {
        assert_eq!(KeypointName::COUNT, 17);
        assert_eq!(KeypointName::ALL.len(), 17);
    }

    #[test]
    fn test_keypoint_from_index() {
        assert_eq!(KeypointName::from_index(0), Some(KeypointName::Nose));
        assert_eq!(KeypointName::from_index(16), Some(KeypointName::RightAnkle));
        assert_eq!(KeypointName::from_index(17), None);
    }

    #[test]
    fn test_all_matches_discriminant() {
        for (i, kp) in KeypointName::ALL.iter().enumerate() {
            assert_eq!(*kp as usize, i);
        }
    }

    #[test]
    fn test_from_str() {
        assert_eq!("left_shoulder".parse::<KeypointName>().unwrap(), KeypointName::LeftShoulder);
        assert!("left_toe".parse::<KeypointName>().is_err());
    }

    #[test]
    fn test_serde_name_matches_as_str() {
        for kp in KeypointName::ALL {
            let json = serde_json::to_string(&kp).unwrap();
            assert_eq!(json, format!("\"{}\"", kp.as_str()));
        }
    }

    #[test]
    fn test_unknown_name_rejected_in_map() {
        let result: Result<KeypointMap, _> = serde_json::from_str(r#"{"tail": [1.0, 2.0]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_label() {
        assert_eq!(KeypointName::LeftShoulder.label(), "LEFT shoulder");
        assert_eq!(KeypointName::Nose.label(), "nose");
    }

    #[test]
    fn test_vec2_wire_format() {
        let v: Vec2 = serde_json::from_str("[100, 50.5]").unwrap();
        assert_eq!(v, Vec2::new(100.0, 50.5));
        assert_eq!(serde_json::to_string(&Vec2::new(-20.0, 20.0)).unwrap(), "[-20.0,20.0]");
    }

    #[test]
    fn test_vec2_sub() {
        assert_eq!(Vec2::new(80.0, 70.0) - Vec2::new(100.0, 50.0), Vec2::new(-20.0, 20.0));
    }
}
