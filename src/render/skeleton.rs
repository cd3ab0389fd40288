use crate::pose::normalize::{to_display, CanvasSize};
use crate::pose::{KeypointName, PoseTemplate, Vec2};

/// 骨格の接続定義 (開始キーポイント, 終了キーポイント)
pub const SKELETON_CONNECTIONS: [(KeypointName, KeypointName); 13] = [
    // 右腕
    (KeypointName::RightShoulder, KeypointName::RightElbow),
    (KeypointName::RightElbow, KeypointName::RightWrist),
    // 左腕
    (KeypointName::LeftShoulder, KeypointName::LeftElbow),
    (KeypointName::LeftElbow, KeypointName::LeftWrist),
    // 頭と肩
    (KeypointName::Nose, KeypointName::RightShoulder),
    (KeypointName::Nose, KeypointName::LeftShoulder),
    // 胴体
    (KeypointName::RightShoulder, KeypointName::RightHip),
    (KeypointName::LeftShoulder, KeypointName::LeftHip),
    (KeypointName::RightHip, KeypointName::LeftHip),
    // 下半身
    (KeypointName::RightHip, KeypointName::RightKnee),
    (KeypointName::RightKnee, KeypointName::RightAnkle),
    (KeypointName::LeftHip, KeypointName::LeftKnee),
    (KeypointName::LeftKnee, KeypointName::LeftAnkle),
];

/// 背景色 (RGB)
pub const BACKGROUND_COLOR: u32 = 0x0F172A;

/// 骨格線の色 (RGB)
pub const SKELETON_COLOR: u32 = 0x60A5FA; // 青

/// core 連結線 (破線) の色 (RGB)
pub const CORE_PATH_COLOR: u32 = 0x10B981;

/// 基準キーポイントの色 (RGB)
pub const BASE_COLOR: u32 = 0x10B981; // 緑

/// core キーポイントの色 (RGB)
pub const CORE_COLOR: u32 = 0xF59E0B; // 琥珀

/// その他キーポイントの色 (RGB)
pub const OTHER_COLOR: u32 = 0xEF4444; // 赤

/// キーポイントの役割。各点はちょうど1つに分類される
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerRole {
    Base,
    Core,
    Other,
}

impl MarkerRole {
    pub fn color(&self) -> u32 {
        match self {
            Self::Base => BASE_COLOR,
            Self::Core => CORE_COLOR,
            Self::Other => OTHER_COLOR,
        }
    }
}

/// 描画プリミティブ
#[derive(Debug, Clone, PartialEq)]
pub enum DrawPrimitive {
    Background { color: u32 },
    Line { from: Vec2, to: Vec2, color: u32, dashed: bool },
    Marker { keypoint: KeypointName, at: Vec2, role: MarkerRole },
}

/// テンプレートを描画プリミティブ列に変換する (副作用なし)。
///
/// 順序: 背景 → 骨格線 → core 破線 → キーポイント。
/// 位置が求まらないキーポイントとそれに接する線は黙って省く。
pub fn render_template(template: &PoseTemplate, canvas: CanvasSize) -> Vec<DrawPrimitive> {
    let points = to_display(&template.shape, canvas);
    let base = template.base();
    let core = template.core();

    let mut out = vec![DrawPrimitive::Background { color: BACKGROUND_COLOR }];

    for (start, end) in SKELETON_CONNECTIONS.iter() {
        if let (Some(from), Some(to)) = (points.get(start), points.get(end)) {
            out.push(DrawPrimitive::Line { from: *from, to: *to, color: SKELETON_COLOR, dashed: false });
        }
    }

    for pair in core.windows(2) {
        if let (Some(from), Some(to)) = (points.get(&pair[0]), points.get(&pair[1])) {
            out.push(DrawPrimitive::Line { from: *from, to: *to, color: CORE_PATH_COLOR, dashed: true });
        }
    }

    for (keypoint, at) in points.iter() {
        let role = if *keypoint == base {
            MarkerRole::Base
        } else if core.contains(keypoint) {
            MarkerRole::Core
        } else {
            MarkerRole::Other
        };
        out.push(DrawPrimitive::Marker { keypoint: *keypoint, at: *at, role });
    }

    out
}
