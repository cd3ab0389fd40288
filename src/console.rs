//! Line commands for the interactive dashboard.

use crate::error::ValidationError;
use crate::pose::{CameraType, KeypointName};
use crate::sync::event::ConfigPatch;

/// Stands for an unassigned key slot in `keys`.
pub const EMPTY_KEY_SLOT: &str = "_";

pub const HELP: &str = "\
  start | stop             start/stop detection on the backend
  stats | config           show stats / live config
  set <field> <value>      confidence | fps | camera | ip | send | detect
  list | show <index>      list templates / show one
  new <name>               open a new draft
  edit <index>             open a template for editing
  close                    discard the open draft
  name <text>              rename the draft
  base <keypoint>          base keypoint (needs a capture)
  core <kp,kp,...>         core keypoints (needs a capture)
  keys <tok> ...           key tokens, _ for an empty slot
  threshold <0..1>         similarity threshold
  enable | disable         toggle the draft
  camera <type>            72camera | 120width_camera
  capture | cancel         countdown capture into the draft
  save | delete <index>    persist the draft / delete a template
  log | clear              command log
  help | q

New template: new, capture, then base/core and keys, then save.
A draft has no structure until its first capture.";

#[derive(Debug, Clone, PartialEq)]
pub enum UserCommand {
    Start,
    Stop,
    Stats,
    Config,
    Set(ConfigPatch),
    List,
    Show(u32),
    New(String),
    Edit(u32),
    Close,
    Name(String),
    Base(KeypointName),
    Core(Vec<KeypointName>),
    Keys(Vec<String>),
    Threshold(f64),
    Enable(bool),
    Camera(CameraType),
    Capture,
    Cancel,
    Save,
    Delete(u32),
    Log,
    Clear,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown command: {0} (try help)")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

impl UserCommand {
    /// `Ok(None)` for a blank line.
    pub fn parse(line: &str) -> Result<Option<Self>, ParseError> {
        let line = line.trim();
        let (cmd, rest) = match line.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (line, ""),
        };

        let command = match cmd {
            "" => return Ok(None),
            "start" => Self::Start,
            "stop" => Self::Stop,
            "stats" => Self::Stats,
            "config" => Self::Config,
            "set" => Self::Set(parse_set(rest)?),
            "list" | "ls" => Self::List,
            "show" => Self::Show(parse_index(rest, "show <index>")?),
            "new" => Self::New(non_empty(rest, "new <name>")?),
            "edit" => Self::Edit(parse_index(rest, "edit <index>")?),
            "close" => Self::Close,
            "name" => Self::Name(non_empty(rest, "name <text>")?),
            "base" => Self::Base(non_empty(rest, "base <keypoint>")?.parse()?),
            "core" => Self::Core(parse_core(rest)?),
            "keys" => Self::Keys(
                rest.split_whitespace()
                    .map(|t| if t == EMPTY_KEY_SLOT { String::new() } else { t.to_lowercase() })
                    .collect(),
            ),
            "threshold" => Self::Threshold(parse_float(rest, "threshold <0..1>")?),
            "enable" => Self::Enable(true),
            "disable" => Self::Enable(false),
            "camera" => Self::Camera(non_empty(rest, "camera <72camera|120width_camera>")?.parse()?),
            "capture" => Self::Capture,
            "cancel" => Self::Cancel,
            "save" => Self::Save,
            "delete" | "rm" => Self::Delete(parse_index(rest, "delete <index>")?),
            "log" => Self::Log,
            "clear" => Self::Clear,
            "help" | "?" => Self::Help,
            "q" | "quit" | "exit" => Self::Quit,
            other => return Err(ParseError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }
}

fn non_empty(rest: &str, usage: &'static str) -> Result<String, ParseError> {
    if rest.is_empty() {
        Err(ParseError::Usage(usage))
    } else {
        Ok(rest.to_string())
    }
}

fn parse_index(rest: &str, usage: &'static str) -> Result<u32, ParseError> {
    rest.parse().map_err(|_| ParseError::Usage(usage))
}

fn parse_float(rest: &str, usage: &'static str) -> Result<f64, ParseError> {
    rest.parse().map_err(|_| ParseError::Usage(usage))
}

fn parse_bool(value: &str, usage: &'static str) -> Result<bool, ParseError> {
    match value {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        _ => Err(ParseError::Usage(usage)),
    }
}

/// Comma and/or space separated; an empty list is allowed.
fn parse_core(rest: &str) -> Result<Vec<KeypointName>, ParseError> {
    rest.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<KeypointName>().map_err(ParseError::from))
        .collect()
}

fn parse_set(rest: &str) -> Result<ConfigPatch, ParseError> {
    const USAGE: &str = "set <confidence|fps|camera|ip|send|detect> <value>";
    let (field, value) = rest.split_once(char::is_whitespace).ok_or(ParseError::Usage(USAGE))?;
    let value = value.trim();
    let mut patch = ConfigPatch::default();
    match field {
        "confidence" => patch.confidence_threshold = Some(parse_float(value, USAGE)?),
        "fps" => patch.fps_limit = Some(value.parse().map_err(|_| ParseError::Usage(USAGE))?),
        "camera" => patch.camera_type = Some(value.parse()?),
        "ip" => patch.target_ip = Some(value.to_string()),
        "send" => patch.send_commands_enabled = Some(parse_bool(value, USAGE)?),
        "detect" => patch.detection_enabled = Some(parse_bool(value, USAGE)?),
        _ => return Err(ParseError::Usage(USAGE)),
    }
    Ok(patch)
}
