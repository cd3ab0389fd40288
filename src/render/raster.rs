//! プリミティブ列を 0RGB ピクセルバッファに焼き込む。ウィンドウ非依存
use crate::pose::Vec2;
use crate::render::skeleton::DrawPrimitive;

/// キーポイントの半径 (px)
pub const MARKER_RADIUS: i32 = 8;

/// 破線の実線部 / 空白部の長さ (px)
const DASH_ON: usize = 8;
const DASH_OFF: usize = 4;

const SHADOW_COLOR: u32 = 0x000000;

pub struct Framebuffer {
    pixels: Vec<u32>,
    width: usize,
    height: usize,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            pixels: vec![0; width * height],
            width,
            height,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// 範囲外は None
    pub fn pixel(&self, x: i32, y: i32) -> Option<u32> {
        self.index(x, y).map(|i| self.pixels[i])
    }

    pub fn draw(&mut self, primitives: &[DrawPrimitive]) {
        for primitive in primitives {
            match *primitive {
                DrawPrimitive::Background { color } => self.pixels.fill(color),
                DrawPrimitive::Line { from, to, color, dashed } => self.line(from, to, color, dashed),
                DrawPrimitive::Marker { at, role, .. } => {
                    let (x, y) = round(at);
                    self.disc(x + 1, y + 1, SHADOW_COLOR);
                    self.disc(x, y, role.color());
                }
            }
        }
    }

    /// 長軸方向に1pxずつ進める。dashed なら進んだ距離で実線/空白を切り替える
    fn line(&mut self, from: Vec2, to: Vec2, color: u32, dashed: bool) {
        let (x0, y0) = round(from);
        let (x1, y1) = round(to);
        let steps = (x1 - x0).abs().max((y1 - y0).abs()) as usize;
        for i in 0..=steps {
            if dashed && i % (DASH_ON + DASH_OFF) >= DASH_ON {
                continue;
            }
            let t = if steps == 0 { 0.0 } else { i as f64 / steps as f64 };
            let x = x0 as f64 + (x1 - x0) as f64 * t;
            let y = y0 as f64 + (y1 - y0) as f64 * t;
            self.put(x.round() as i32, y.round() as i32, color);
        }
    }

    fn disc(&mut self, cx: i32, cy: i32, color: u32) {
        let r = MARKER_RADIUS;
        for dy in -r..=r {
            // この行の半幅
            let half = ((r * r - dy * dy) as f64).sqrt() as i32;
            for x in cx - half..=cx + half {
                self.put(x, cy + dy, color);
            }
        }
    }

    fn put(&mut self, x: i32, y: i32, color: u32) {
        if let Some(i) = self.index(x, y) {
            self.pixels[i] = color;
        }
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        let (x, y) = (usize::try_from(x).ok()?, usize::try_from(y).ok()?);
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }
}

fn round(v: Vec2) -> (i32, i32) {
    (v.x.round() as i32, v.y.round() as i32)
}
