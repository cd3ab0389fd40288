use anyhow::{Context, Result};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use camera_hid::backend::{Backend, HttpBackend};
use camera_hid::capture::{self, CaptureState};
use camera_hid::config::{Config, LogConfig, DEFAULT_CONFIG_PATH};
use camera_hid::console::{UserCommand, HELP};
use camera_hid::dashboard::{Dashboard, NoticeLevel};
use camera_hid::pose::{key_display, PoseTemplate};
use camera_hid::sync::{self, ChannelHandle};

fn init_logging(config: &LogConfig) -> Result<String> {
    std::fs::create_dir_all(&config.dir)?;
    let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = format!("{}/dashboard_{}.log", config.dir, ts);
    let file = std::fs::File::create(&path).with_context(|| format!("failed to create {}", path))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
    Ok(path)
}

#[tokio::main]
async fn main() -> Result<()> {
    let (config, load_error) = match Config::load(DEFAULT_CONFIG_PATH) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    let log_path = init_logging(&config.log)?;

    info!("camera-hid dashboard ({})", env!("GIT_VERSION"));
    info!("Log: {}", log_path);
    if let Some(e) = load_error {
        warn!("{}: {}; using defaults", DEFAULT_CONFIG_PATH, e);
    }
    info!("Backend: {}", config.backend.base_url);
    info!("Sync: {}", config.sync.addr);

    let backend: Arc<dyn Backend> = Arc::new(HttpBackend::new(
        config.backend.base_url.clone(),
        config.backend.request_timeout(),
    )?);
    let mut dashboard = Dashboard::new(Arc::clone(&backend), config.capture.countdown_secs);
    dashboard.refresh().await;

    let (event_tx, mut event_rx) = mpsc::channel(64);
    let (channel, _channel_task) =
        sync::channel::spawn(config.sync.addr.clone(), config.sync.reconnect_delay(), event_tx);
    let (stats_tx, mut stats_rx) = mpsc::channel(4);
    let _poller = sync::poll::spawn(Arc::clone(&backend), config.sync.poll_interval(), stats_tx);
    let (capture_tx, mut capture_rx) = mpsc::channel(1);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let fetch_timeout = config.capture.fetch_timeout();

    println!("=== Camera HID Dashboard ===");
    println!("{} templates loaded. Type help for commands.", dashboard.templates().len());
    prompt()?;

    loop {
        let was_armed = dashboard.capture_armed();
        tokio::select! {
            Some(event) = event_rx.recv() => dashboard.handle_channel(event),
            Some(patch) = stats_rx.recv() => dashboard.merge_polled_stats(patch),
            Some((id, result)) = capture_rx.recv() => {
                dashboard.complete_capture(id, result);
                if let Some(draft) = dashboard.draft() {
                    print_template(&draft.template);
                }
            }
            _ = ticker.tick(), if was_armed => {
                match dashboard.tick_capture() {
                    Some(id) => {
                        println!("capturing...");
                        let backend = Arc::clone(&backend);
                        let tx = capture_tx.clone();
                        tokio::spawn(async move {
                            let result = capture::fetch_snapshot(backend.as_ref(), fetch_timeout).await;
                            let _ = tx.send((id, result)).await;
                        });
                    }
                    None => {
                        if let CaptureState::ArmedCountdown(n) = dashboard.capture_state() {
                            println!("{}...", n);
                        }
                    }
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match UserCommand::parse(&line) {
                    Ok(Some(UserCommand::Quit)) => break,
                    Ok(Some(command)) => run_command(&mut dashboard, &channel, command).await,
                    Ok(None) => {}
                    Err(e) => println!("{}", e),
                }
                if !was_armed && dashboard.capture_armed() {
                    ticker.reset();
                    if let CaptureState::ArmedCountdown(n) = dashboard.capture_state() {
                        println!("hold the pose: {}...", n);
                    }
                }
                print_notifications(&mut dashboard);
                prompt()?;
                continue;
            }
        }
        print_notifications(&mut dashboard);
    }

    info!("shutting down");
    Ok(())
}

async fn run_command(dashboard: &mut Dashboard, channel: &ChannelHandle, command: UserCommand) {
    match command {
        UserCommand::Start | UserCommand::Stop => {
            let start = command == UserCommand::Start;
            if let Some(intent) = dashboard.request_session(start) {
                if !channel.send(intent).await {
                    println!("sync channel is not running");
                }
            }
        }
        UserCommand::Stats => print_stats(dashboard),
        UserCommand::Config => print_config(dashboard),
        UserCommand::Set(patch) => {
            if dashboard.update_config(patch).await.is_ok() {
                print_config(dashboard);
            }
        }
        UserCommand::List => {
            if dashboard.reload_templates().await.is_ok() {
                print_templates(dashboard.templates());
            }
        }
        UserCommand::Show(index) => match dashboard.template(index) {
            Some(t) => print_template(t),
            None => println!("no template with index {}", index),
        },
        UserCommand::New(name) => {
            if let Ok(draft) = dashboard.new_draft(&name).await {
                print_template(&draft.template);
            }
        }
        UserCommand::Edit(index) => {
            if let Ok(draft) = dashboard.edit(index) {
                print_template(&draft.template);
            }
        }
        UserCommand::Close => {
            if dashboard.close_draft() {
                println!("draft discarded");
            }
        }
        UserCommand::Name(name) => edited(dashboard, |d| d.rename(&name)),
        UserCommand::Base(base) => edited(dashboard, |d| d.set_base(base)),
        UserCommand::Core(core) => edited(dashboard, |d| d.set_core(core)),
        UserCommand::Keys(keys) => edited(dashboard, |d| d.set_keys(keys)),
        UserCommand::Threshold(v) => edited(dashboard, |d| d.set_threshold(v)),
        UserCommand::Enable(enabled) => edited(dashboard, |d| d.set_enabled(enabled)),
        UserCommand::Camera(camera_type) => edited(dashboard, |d| d.set_camera_type(camera_type)),
        UserCommand::Capture => {
            let _ = dashboard.start_capture();
        }
        UserCommand::Cancel => {
            if dashboard.cancel_capture() {
                println!("capture cancelled");
            }
        }
        UserCommand::Save => {
            let _ = dashboard.save_draft().await;
        }
        UserCommand::Delete(index) => {
            let _ = dashboard.delete_template(index).await;
        }
        UserCommand::Log => {
            for line in dashboard.log().lines() {
                println!("  {}", line);
            }
        }
        UserCommand::Clear => dashboard.clear_log(),
        UserCommand::Help => println!("{}", HELP),
        UserCommand::Quit => {}
    }
}

/// Apply a draft edit and show the result.
fn edited<F>(dashboard: &mut Dashboard, f: F)
where
    F: FnOnce(&mut Dashboard) -> camera_hid::Result<()>,
{
    if f(dashboard).is_ok() {
        if let Some(draft) = dashboard.draft() {
            print_template(&draft.template);
        }
    }
}

fn prompt() -> Result<()> {
    print!("> ");
    std::io::stdout().flush()?;
    Ok(())
}

fn print_notifications(dashboard: &mut Dashboard) {
    for note in dashboard.take_notifications() {
        let tag = match note.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warn",
            NoticeLevel::Error => "error",
        };
        println!("[{}] {}", tag, note.message);
    }
}

fn print_stats(dashboard: &Dashboard) {
    let s = dashboard.stats();
    println!(
        "running: {}  fps: {:.1} ({:.1} current)  inference: {:.1}ms  detections: {}",
        s.is_running, s.fps, s.current_fps, s.inference_time, s.detections
    );
    let keys: Vec<String> = dashboard.instructions().iter().map(|k| key_display(k)).collect();
    println!("instruction: [{}]", keys.join(" "));
    println!("state: [{}]", dashboard.actions().join(", "));
    match dashboard.preview() {
        Some(jpeg) => println!("preview: {} bytes", jpeg.len()),
        None => println!("preview: none"),
    }
    println!("connected: {}", dashboard.is_connected());
}

fn print_config(dashboard: &Dashboard) {
    let c = dashboard.config();
    println!("confidence_threshold = {}", c.confidence_threshold);
    println!("fps_limit = {}", c.fps_limit);
    println!("camera_type = {}", c.camera_type);
    println!("target_ip = {:?}", c.target_ip);
    println!("send_commands_enabled = {}", c.send_commands_enabled);
    println!("detection_enabled = {}", c.detection_enabled);
}

fn print_templates(templates: &[PoseTemplate]) {
    if templates.is_empty() {
        println!("(no templates)");
    }
    for t in templates {
        let keys: Vec<String> = t.keys.iter().map(|k| key_display(k)).collect();
        println!(
            "{:>3} {} {:<20} [{}]",
            t.index,
            if t.enabled { "●" } else { "○" },
            t.name,
            keys.join(" ")
        );
    }
}

fn print_template(t: &PoseTemplate) {
    println!("#{} {}{}", t.index, t.name, if t.inner_flag { " (built-in)" } else { "" });
    println!("  enabled: {}  threshold: {}  camera: {}", t.enabled, t.similarity_threshold, t.camera_type);
    let keys: Vec<String> = t
        .keys
        .iter()
        .map(|k| if k.is_empty() { "_".to_string() } else { key_display(k) })
        .collect();
    println!("  keys: [{}]", keys.join(" "));
    println!(
        "  base: {}  core: [{}]  {}",
        t.base().label(),
        t.core().iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", "),
        if t.shape.is_recomputable() { "recorded" } else { "legacy" }
    );
    for (k, v) in t.relative() {
        println!("    {:<16} [{:.1}, {:.1}]", k.as_str(), v.x, v.y);
    }
}
