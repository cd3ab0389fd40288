use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ValidationError;
use crate::pose::keypoint::{KeypointMap, KeypointName, Vec2};
use crate::pose::keys::validate_keys;
use crate::pose::normalize::capture_to_relative;

/// base からの相対ベクトル (リモートのマッチャーが使う正規形)
pub type RelativeVectors = BTreeMap<KeypointName, Vec2>;

/// 既定の類似度閾値
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.95;

/// 生座標を取得したカメラのレンズプロファイル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CameraType {
    /// 72° 標準レンズ
    #[default]
    #[serde(rename = "72camera")]
    Standard72,
    /// 120° 横方向歪みレンズ
    #[serde(rename = "120width_camera")]
    Wide120,
}

impl CameraType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard72 => "72camera",
            Self::Wide120 => "120width_camera",
        }
    }
}

impl fmt::Display for CameraType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CameraType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "72camera" => Ok(Self::Standard72),
            "120width_camera" => Ok(Self::Wide120),
            other => Err(ValidationError::UnknownCameraType(other.to_string())),
        }
    }
}

fn check_duplicates(core: &[KeypointName]) -> Result<(), ValidationError> {
    for (i, kp) in core.iter().enumerate() {
        if core[..i].contains(kp) {
            return Err(ValidationError::DuplicateCoreKeypoint(*kp));
        }
    }
    Ok(())
}

/// relative のキー集合が core - base と一致するか
fn check_vectors(
    base: KeypointName,
    core: &[KeypointName],
    relative: &RelativeVectors,
) -> Result<(), ValidationError> {
    let missing: Vec<KeypointName> = core
        .iter()
        .filter(|k| **k != base && !relative.contains_key(k))
        .copied()
        .collect();
    let extra: Vec<KeypointName> = relative
        .keys()
        .filter(|k| **k == base || !core.contains(k))
        .copied()
        .collect();
    if missing.is_empty() && extra.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::InconsistentVectors { missing, extra })
    }
}

/// 生座標を持たないテンプレート。base / core は固定
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyShape {
    base: KeypointName,
    core: Vec<KeypointName>,
    relative: RelativeVectors,
}

impl LegacyShape {
    pub fn new(
        base: KeypointName,
        core: Vec<KeypointName>,
        relative: RelativeVectors,
    ) -> Result<Self, ValidationError> {
        check_duplicates(&core)?;
        check_vectors(base, &core, &relative)?;
        Ok(Self { base, core, relative })
    }
}

/// 生座標を持つテンプレート。base / core を変えると relative を全再計算
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedShape {
    base: KeypointName,
    core: Vec<KeypointName>,
    raw: KeypointMap,
    relative: RelativeVectors,
}

impl RecordedShape {
    pub fn new(
        base: KeypointName,
        core: Vec<KeypointName>,
        raw: KeypointMap,
    ) -> Result<Self, ValidationError> {
        check_duplicates(&core)?;
        let relative = capture_to_relative(&raw, base, &core)?;
        Ok(Self { base, core, raw, relative })
    }

    /// カタログから読んだ値をそのまま保持 (バックエンド確定値)
    fn from_parts(
        base: KeypointName,
        core: Vec<KeypointName>,
        raw: KeypointMap,
        relative: RelativeVectors,
    ) -> Result<Self, ValidationError> {
        check_duplicates(&core)?;
        check_vectors(base, &core, &relative)?;
        Ok(Self { base, core, raw, relative })
    }

    pub fn raw(&self) -> &KeypointMap {
        &self.raw
    }
}

/// テンプレートの幾何情報。生座標の有無で振る舞いが分かれる
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateShape {
    Legacy(LegacyShape),
    Recorded(RecordedShape),
}

impl TemplateShape {
    pub fn base(&self) -> KeypointName {
        match self {
            Self::Legacy(s) => s.base,
            Self::Recorded(s) => s.base,
        }
    }

    pub fn core(&self) -> &[KeypointName] {
        match self {
            Self::Legacy(s) => &s.core,
            Self::Recorded(s) => &s.core,
        }
    }

    pub fn relative(&self) -> &RelativeVectors {
        match self {
            Self::Legacy(s) => &s.relative,
            Self::Recorded(s) => &s.relative,
        }
    }

    pub fn raw(&self) -> Option<&KeypointMap> {
        match self {
            Self::Legacy(_) => None,
            Self::Recorded(s) => Some(&s.raw),
        }
    }

    /// 生座標から relative を再計算できるか
    pub fn is_recomputable(&self) -> bool {
        matches!(self, Self::Recorded(_))
    }

    /// base と core (順序込み) が一致するか
    pub fn same_structure(&self, other: &TemplateShape) -> bool {
        self.base() == other.base() && self.core() == other.core()
    }
}

/// 姿勢テンプレート
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TemplateRecord", into = "TemplateRecord")]
pub struct PoseTemplate {
    pub index: u32,
    pub name: String,
    pub inner_flag: bool,
    pub enabled: bool,
    pub similarity_threshold: f64,
    pub camera_type: CameraType,
    pub keys: Vec<String>,
    pub shape: TemplateShape,
}

impl PoseTemplate {
    /// クライアント側で作る新規ドラフト
    pub fn draft(index: u32, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            inner_flag: false,
            enabled: true,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            camera_type: CameraType::default(),
            keys: Vec::new(),
            shape: TemplateShape::Legacy(LegacyShape {
                base: KeypointName::Nose,
                core: Vec::new(),
                relative: RelativeVectors::new(),
            }),
        }
    }

    pub fn base(&self) -> KeypointName {
        self.shape.base()
    }

    pub fn core(&self) -> &[KeypointName] {
        self.shape.core()
    }

    pub fn relative(&self) -> &RelativeVectors {
        self.shape.relative()
    }

    pub fn raw(&self) -> Option<&KeypointMap> {
        self.shape.raw()
    }

    /// base を変更。生座標がなければ拒否 (同値は許可)
    pub fn set_base(&mut self, base: KeypointName) -> Result<(), ValidationError> {
        match &mut self.shape {
            TemplateShape::Legacy(s) if s.base == base => Ok(()),
            TemplateShape::Legacy(_) => Err(ValidationError::FrozenStructure { index: self.index }),
            TemplateShape::Recorded(s) => {
                let relative = capture_to_relative(&s.raw, base, &s.core)?;
                s.base = base;
                s.relative = relative;
                Ok(())
            }
        }
    }

    /// core を変更。生座標がなければ拒否 (同値は許可)
    pub fn set_core(&mut self, core: Vec<KeypointName>) -> Result<(), ValidationError> {
        check_duplicates(&core)?;
        match &mut self.shape {
            TemplateShape::Legacy(s) if s.core == core => Ok(()),
            TemplateShape::Legacy(_) => Err(ValidationError::FrozenStructure { index: self.index }),
            TemplateShape::Recorded(s) => {
                let relative = capture_to_relative(&s.raw, s.base, &core)?;
                s.core = core;
                s.relative = relative;
                Ok(())
            }
        }
    }

    /// 新しい生座標を取り込み、現在の base / core で relative を再計算する。
    /// 失敗時はテンプレートを変更しない
    pub fn record(&mut self, raw: KeypointMap) -> Result<(), ValidationError> {
        let recorded = RecordedShape::new(self.base(), self.core().to_vec(), raw)?;
        self.shape = TemplateShape::Recorded(recorded);
        Ok(())
    }

    /// 保存前チェック
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ValidationError::ThresholdOutOfRange(self.similarity_threshold));
        }
        if self.enabled {
            validate_keys(&self.keys)?;
        }
        Ok(())
    }
}

fn default_enabled() -> bool {
    true
}

fn default_similarity_threshold() -> f64 {
    DEFAULT_SIMILARITY_THRESHOLD
}

/// カタログの JSON 表現
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TemplateRecord {
    index: u32,
    name: String,
    #[serde(default)]
    inner_flag: bool,
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default = "default_similarity_threshold")]
    similarity_threshold: f64,
    #[serde(default)]
    camera_type: CameraType,
    #[serde(default)]
    keys: Vec<String>,
    basekeypoints: KeypointName,
    #[serde(default)]
    list_corekeypoints: Vec<KeypointName>,
    #[serde(default)]
    value_dict: RelativeVectors,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    raw_keypoints: Option<KeypointMap>,
}

impl TryFrom<TemplateRecord> for PoseTemplate {
    type Error = ValidationError;

    fn try_from(record: TemplateRecord) -> Result<Self, Self::Error> {
        if !(0.0..=1.0).contains(&record.similarity_threshold) {
            return Err(ValidationError::ThresholdOutOfRange(record.similarity_threshold));
        }
        let base = record.basekeypoints;
        let core = record.list_corekeypoints;
        let mut relative = record.value_dict;
        // 旧カタログは base 自身の [0, 0] を含む
        relative.remove(&base);

        let shape = match record.raw_keypoints {
            Some(raw) => TemplateShape::Recorded(RecordedShape::from_parts(base, core, raw, relative)?),
            None => TemplateShape::Legacy(LegacyShape::new(base, core, relative)?),
        };

        Ok(Self {
            index: record.index,
            name: record.name,
            inner_flag: record.inner_flag,
            enabled: record.enabled,
            similarity_threshold: record.similarity_threshold,
            camera_type: record.camera_type,
            keys: record.keys,
            shape,
        })
    }
}

impl From<PoseTemplate> for TemplateRecord {
    fn from(t: PoseTemplate) -> Self {
        let (basekeypoints, list_corekeypoints, value_dict, raw_keypoints) = match t.shape {
            TemplateShape::Legacy(s) => (s.base, s.core, s.relative, None),
            TemplateShape::Recorded(s) => (s.base, s.core, s.relative, Some(s.raw)),
        };
        Self {
            index: t.index,
            name: t.name,
            inner_flag: t.inner_flag,
            enabled: t.enabled,
            similarity_threshold: t.similarity_threshold,
            camera_type: t.camera_type,
            keys: t.keys,
            basekeypoints,
            list_corekeypoints,
            value_dict,
            raw_keypoints,
        }
    }
}

/// デコード済みカタログ
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    pub templates: Vec<PoseTemplate>,
    /// 読み飛ばしたエントリの index。バックエンド上には存在するので採番で避ける
    pub skipped: Vec<u32>,
}

/// カタログ配列をエントリ単位でデコードする。
/// 不正なエントリは警告して飛ばし、残りは読み込む
pub fn decode_catalog(body: &str) -> Result<Catalog, serde_json::Error> {
    let entries: Vec<serde_json::Value> = serde_json::from_str(body)?;
    let mut catalog = Catalog::default();
    for entry in entries {
        let index = entry
            .get("index")
            .and_then(|v| v.as_u64())
            .and_then(|v| u32::try_from(v).ok());
        match serde_json::from_value::<PoseTemplate>(entry) {
            Ok(template) => catalog.templates.push(template),
            Err(e) => {
                warn!("skipping catalog entry {:?}: {}", index, e);
                catalog.skipped.extend(index);
            }
        }
    }
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use KeypointName::*;

    fn raw_upper_body() -> KeypointMap {
        KeypointMap::from([
            (Nose, Vec2::new(100.0, 50.0)),
            (LeftShoulder, Vec2::new(80.0, 70.0)),
            (RightShoulder, Vec2::new(120.0, 70.0)),
            (LeftWrist, Vec2::new(60.0, 20.0)),
        ])
    }

    const LEGACY_JSON: &str = r#"{
        "name": "RaiseLeft",
        "index": 3,
        "inner_flag": false,
        "similarity_threshold": 0.9,
        "keys": ["j"],
        "basekeypoints": "left_shoulder",
        "list_corekeypoints": ["left_shoulder", "left_elbow", "left_wrist"],
        "value_dict": {
            "left_shoulder": [0, 0],
            "left_elbow": [-10.5, -40.0],
            "left_wrist": [-12.0, -90.0]
        },
        "pose_img": "raise_left.jpg"
    }"#;

    #[test]
    fn test_decode_legacy_catalog_entry() {
        let t: PoseTemplate = serde_json::from_str(LEGACY_JSON).unwrap();
        assert_eq!(t.index, 3);
        assert!(t.enabled);
        assert_eq!(t.camera_type, CameraType::Standard72);
        assert_eq!(t.base(), LeftShoulder);
        assert!(!t.shape.is_recomputable());
        // base の [0, 0] は落とす
        assert!(!t.relative().contains_key(&LeftShoulder));
        assert_eq!(t.relative()[&LeftWrist], Vec2::new(-12.0, -90.0));
    }

    #[test]
    fn test_decode_rejects_missing_vector() {
        let json = r#"{
            "name": "x", "index": 1,
            "basekeypoints": "nose",
            "list_corekeypoints": ["nose", "left_wrist"],
            "value_dict": {}
        }"#;
        let err = serde_json::from_str::<PoseTemplate>(json).unwrap_err();
        assert!(err.to_string().contains("do not match"));
    }

    #[test]
    fn test_catalog_skips_invalid_entry() {
        let body = format!(
            r#"[{}, {{
                "name": "broken", "index": 9,
                "basekeypoints": "nose",
                "list_corekeypoints": ["nose", "left_wrist"],
                "value_dict": {{"left_wrist": [1, 1], "right_wrist": [2, 2]}}
            }}, {{"name": "no index"}}]"#,
            LEGACY_JSON
        );
        let catalog = decode_catalog(&body).unwrap();
        assert_eq!(catalog.templates.len(), 1);
        assert_eq!(catalog.templates[0].index, 3);
        assert_eq!(catalog.skipped, vec![9]);
    }

    #[test]
    fn test_catalog_not_an_array() {
        assert!(decode_catalog(r#"{"templates": []}"#).is_err());
    }

    #[test]
    fn test_decode_rejects_duplicate_core() {
        let json = r#"{
            "name": "x", "index": 1,
            "basekeypoints": "nose",
            "list_corekeypoints": ["left_wrist", "left_wrist"],
            "value_dict": {"left_wrist": [1, 1]}
        }"#;
        assert!(serde_json::from_str::<PoseTemplate>(json).is_err());
    }

    #[test]
    fn test_decode_rejects_unknown_keypoint() {
        let json = r#"{
            "name": "x", "index": 1,
            "basekeypoints": "chin",
            "list_corekeypoints": [],
            "value_dict": {}
        }"#;
        assert!(serde_json::from_str::<PoseTemplate>(json).is_err());
    }

    #[test]
    fn test_encode_round_trip_keeps_raw() {
        let mut t = PoseTemplate::draft(7, "Wave");
        t.record(raw_upper_body()).unwrap();
        t.set_core(vec![Nose, LeftWrist]).unwrap();
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["basekeypoints"], "nose");
        assert_eq!(json["camera_type"], "72camera");
        assert!(json["raw_keypoints"].is_object());
        let back: PoseTemplate = serde_json::from_value(json).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_legacy_structure_is_frozen() {
        let mut t: PoseTemplate = serde_json::from_str(LEGACY_JSON).unwrap();
        let before = t.clone();
        assert_eq!(t.set_base(Nose), Err(ValidationError::FrozenStructure { index: 3 }));
        assert_eq!(
            t.set_core(vec![LeftShoulder, LeftWrist]),
            Err(ValidationError::FrozenStructure { index: 3 })
        );
        assert_eq!(t, before);
    }

    #[test]
    fn test_legacy_same_value_is_not_a_change() {
        let mut t: PoseTemplate = serde_json::from_str(LEGACY_JSON).unwrap();
        assert!(t.set_base(LeftShoulder).is_ok());
        assert!(t.set_core(vec![LeftShoulder, LeftElbow, LeftWrist]).is_ok());
    }

    #[test]
    fn test_recorded_base_change_recomputes_everything() {
        let mut t = PoseTemplate::draft(1, "p");
        t.record(raw_upper_body()).unwrap();
        t.set_core(vec![Nose, LeftShoulder, LeftWrist]).unwrap();
        assert_eq!(t.relative()[&LeftShoulder], Vec2::new(-20.0, 20.0));

        t.set_base(LeftShoulder).unwrap();
        assert_eq!(t.relative().len(), 2);
        assert_eq!(t.relative()[&Nose], Vec2::new(20.0, -20.0));
        assert_eq!(t.relative()[&LeftWrist], Vec2::new(-20.0, -50.0));
        assert!(!t.relative().contains_key(&LeftShoulder));
    }

    #[test]
    fn test_recorded_rejects_base_missing_from_capture() {
        let mut t = PoseTemplate::draft(1, "p");
        t.record(raw_upper_body()).unwrap();
        t.set_core(vec![LeftWrist]).unwrap();
        let before = t.clone();
        assert_eq!(t.set_base(RightAnkle), Err(ValidationError::MissingKeypoint(RightAnkle)));
        assert_eq!(t, before);
    }

    #[test]
    fn test_set_core_rejects_duplicates() {
        let mut t = PoseTemplate::draft(1, "p");
        t.record(raw_upper_body()).unwrap();
        assert_eq!(
            t.set_core(vec![LeftWrist, Nose, LeftWrist]),
            Err(ValidationError::DuplicateCoreKeypoint(LeftWrist))
        );
    }

    #[test]
    fn test_draft_defaults() {
        let t = PoseTemplate::draft(4, "New");
        assert!(t.enabled);
        assert!(t.relative().is_empty());
        assert!(t.raw().is_none());
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_validate_keys_only_when_enabled() {
        let mut t = PoseTemplate::draft(4, "New");
        t.keys = vec!["w".to_string(), String::new()];
        assert_eq!(t.validate(), Err(ValidationError::UnresolvedKey { position: 1 }));
        t.enabled = false;
        assert!(t.validate().is_ok());
    }

    #[test]
    fn test_validate_threshold_range() {
        let mut t = PoseTemplate::draft(4, "New");
        t.similarity_threshold = 1.5;
        assert_eq!(t.validate(), Err(ValidationError::ThresholdOutOfRange(1.5)));
    }

    #[test]
    fn test_camera_type_parse() {
        assert_eq!("120width_camera".parse::<CameraType>().unwrap(), CameraType::Wide120);
        assert!("fisheye".parse::<CameraType>().is_err());
    }
}
