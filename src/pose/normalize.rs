//! 座標の正規化: 生座標 → base 相対ベクトル、およびキャンバス座標への変換。
//! すべて純関数で状態を持たない。

use std::collections::BTreeMap;

use crate::error::ValidationError;
use crate::pose::keypoint::{KeypointMap, KeypointName, Vec2};
use crate::pose::template::{RelativeVectors, TemplateShape};

/// 生座標をキャンバスに収めるときの余白 (両端合計, px)
pub const FIT_MARGIN: f64 = 40.0;

/// 相対ベクトル表示時のクランプ余白 (px)
pub const CLAMP_MARGIN: f64 = 20.0;

/// 相対ベクトル表示の経験的スケール: min(w, h) / 500 * 0.8
const RELATIVE_SCALE_DIVISOR: f64 = 500.0;
const RELATIVE_SCALE_FACTOR: f64 = 0.8;

/// 描画先キャンバスのサイズ (px)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

impl CanvasSize {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }
}

/// キーポイント → キャンバス座標
pub type DisplayPoints = BTreeMap<KeypointName, Vec2>;

/// core の各点 (base を除く) について `raw[k] - raw[base]` を計算する。
/// 部分更新はせず、常に全ベクトルを作り直す。
pub fn capture_to_relative(
    raw: &KeypointMap,
    base: KeypointName,
    core: &[KeypointName],
) -> Result<RelativeVectors, ValidationError> {
    let origin = *raw.get(&base).ok_or(ValidationError::MissingKeypoint(base))?;
    core.iter()
        .filter(|k| **k != base)
        .map(|k| {
            let p = raw.get(k).ok_or(ValidationError::MissingKeypoint(*k))?;
            Ok((*k, *p - origin))
        })
        .collect()
}

/// 生座標をキャンバスに収める。
///
/// バウンディングボックスを等倍以下 (拡大しない) でスケールして中央に配置し、
/// ライブ映像に合わせて左右反転する。
pub fn fit_absolute(raw: &KeypointMap, canvas: CanvasSize) -> DisplayPoints {
    let mut points = raw.values();
    let Some(first) = points.next() else {
        return DisplayPoints::new();
    };
    let (mut min_x, mut max_x, mut min_y, mut max_y) = (first.x, first.x, first.y, first.y);
    for p in points {
        min_x = min_x.min(p.x);
        max_x = max_x.max(p.x);
        min_y = min_y.min(p.y);
        max_y = max_y.max(p.y);
    }

    let box_w = max_x - min_x;
    let box_h = max_y - min_y;
    let dimension = box_w.max(box_h);
    let available = (canvas.width - FIT_MARGIN)
        .min(canvas.height - FIT_MARGIN)
        .max(0.0);
    let scale = if dimension > 0.0 {
        (available / dimension).min(1.0)
    } else {
        1.0
    };

    let offset_x = (canvas.width - box_w * scale) / 2.0;
    let offset_y = (canvas.height - box_h * scale) / 2.0;

    raw.iter()
        .map(|(k, p)| {
            // x' = max_x - (x - min_x) を min_x 基準で配置
            let mirrored = max_x - p.x;
            let at = Vec2::new(offset_x + mirrored * scale, offset_y + (p.y - min_y) * scale);
            (*k, at)
        })
        .collect()
}

/// 相対ベクトルのみのテンプレートを表示する。
///
/// base をキャンバス中央に置き、固定スケールで配置する。x 方向は反転し、
/// 全点を余白内にクランプして画面外に出さない。
pub fn place_relative(
    base: KeypointName,
    relative: &RelativeVectors,
    canvas: CanvasSize,
) -> DisplayPoints {
    let center = canvas.center();
    let scale = canvas.width.min(canvas.height) / RELATIVE_SCALE_DIVISOR * RELATIVE_SCALE_FACTOR;

    let clamp = |v: Vec2| {
        Vec2::new(
            CLAMP_MARGIN.max((canvas.width - CLAMP_MARGIN).min(v.x)),
            CLAMP_MARGIN.max((canvas.height - CLAMP_MARGIN).min(v.y)),
        )
    };

    let mut points = DisplayPoints::new();
    points.insert(base, clamp(center));
    for (k, d) in relative {
        let at = Vec2::new(center.x - d.x * scale, center.y + d.y * scale);
        points.insert(*k, clamp(at));
    }
    points
}

/// 表現に依らずキャンバス座標を返す
pub fn to_display(shape: &TemplateShape, canvas: CanvasSize) -> DisplayPoints {
    match shape {
        TemplateShape::Recorded(s) => fit_absolute(s.raw(), canvas),
        TemplateShape::Legacy(_) => place_relative(shape.base(), shape.relative(), canvas),
    }
}
