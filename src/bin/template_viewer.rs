use anyhow::{Context, Result};
use std::time::Duration;

use camera_hid::backend::{Backend, HttpBackend};
use camera_hid::config::{Config, DEFAULT_CONFIG_PATH};
use camera_hid::pose::{decode_catalog, key_display, PoseTemplate};
use camera_hid::render::{render_template, Key, MinifbRenderer};

/// カタログを読み込む。引数があれば JSON ファイル、なければバックエンドから
async fn load_catalog(config: &Config) -> Result<Vec<PoseTemplate>> {
    if let Some(path) = std::env::args().nth(1) {
        let content = std::fs::read_to_string(&path).with_context(|| format!("failed to read {}", path))?;
        return Ok(decode_catalog(&content)?.templates);
    }
    let backend = HttpBackend::new(config.backend.base_url.clone(), config.backend.request_timeout())?;
    Ok(backend.list_templates().await?.templates)
}

fn title(template: &PoseTemplate, position: usize, total: usize) -> String {
    let keys: Vec<String> = template.keys.iter().map(|k| key_display(k)).collect();
    format!(
        "[{}/{}] #{} {} [{}]",
        position + 1,
        total,
        template.index,
        template.name,
        keys.join(" ")
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load_or_default(DEFAULT_CONFIG_PATH);

    println!("Template Viewer");
    println!("←/→: switch template, ESC: exit");

    let templates = load_catalog(&config).await?;
    if templates.is_empty() {
        println!("No templates in catalog");
        return Ok(());
    }
    println!("{} templates loaded", templates.len());

    let canvas = config.canvas.size();
    let mut renderer = MinifbRenderer::new("Template Viewer", config.canvas.width, config.canvas.height)?;

    let mut current = 0;
    let mut dirty = true;

    while renderer.is_open() {
        if renderer.is_key_pressed(Key::Right) {
            current = (current + 1) % templates.len();
            dirty = true;
        }
        if renderer.is_key_pressed(Key::Left) {
            current = (current + templates.len() - 1) % templates.len();
            dirty = true;
        }

        if dirty {
            let template = &templates[current];
            renderer.draw_primitives(&render_template(template, canvas));
            renderer.set_title(&title(template, current, templates.len()));
            dirty = false;
        }
        renderer.update()?;

        // 描画は静止画なので約60Hzで十分
        std::thread::sleep(Duration::from_millis(16));
    }

    println!("Shutting down...");
    Ok(())
}
