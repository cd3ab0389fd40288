use anyhow::Result;
use minifb::{Key, KeyRepeat, Window, WindowOptions};

use crate::render::raster::Framebuffer;
use crate::render::skeleton::DrawPrimitive;

/// minifb ウィンドウにプリミティブを表示する
pub struct MinifbRenderer {
    window: Window,
    frame: Framebuffer,
}

impl MinifbRenderer {
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self> {
        let options = WindowOptions {
            resize: false,
            ..WindowOptions::default()
        };
        Ok(Self {
            window: Window::new(title, width, height, options)?,
            frame: Framebuffer::new(width, height),
        })
    }

    /// ESC で閉じる
    pub fn is_open(&self) -> bool {
        self.window.is_open() && !self.window.is_key_down(Key::Escape)
    }

    pub fn is_key_pressed(&self, key: Key) -> bool {
        self.window.is_key_pressed(key, KeyRepeat::No)
    }

    pub fn set_title(&mut self, title: &str) {
        self.window.set_title(title);
    }

    pub fn draw_primitives(&mut self, primitives: &[DrawPrimitive]) {
        self.frame.draw(primitives);
    }

    pub fn update(&mut self) -> Result<()> {
        self.window
            .update_with_buffer(self.frame.pixels(), self.frame.width(), self.frame.height())?;
        Ok(())
    }
}
