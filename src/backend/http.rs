use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::Backend;
use crate::error::{Error, Result};
use crate::pose::{decode_catalog, Catalog, KeypointMap, PoseTemplate};
use crate::sync::event::{CommandEntry, ConfigPatch, LiveConfig, StatsPatch};

const POSE_CONFIGS: &str = "/api/pose_configs";
const SAVE_POSE_CONFIG: &str = "/api/save_pose_config";
const DELETE_POSE_CONFIG: &str = "/api/delete_pose_config";
const LATEST_KEYPOINTS: &str = "/api/latest_keypoints";
const CONFIG: &str = "/api/config";
const STATS: &str = "/api/stats";
const COMMANDS: &str = "/api/commands";

/// reqwest-backed client for the detection backend's REST API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

#[derive(Debug, Default, Deserialize)]
struct DeleteResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SnapshotResponse {
    #[serde(default)]
    keypoints: Option<KeypointMap>,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Non-2xx responses become `Rejected`, carrying the backend's message if any.
async fn check(operation: &'static str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.message.or(b.error))
        .unwrap_or_else(|| format!("HTTP {status}"));
    Err(Error::Rejected { operation, message })
}

/// `{keypoints: {...}}`, `{}` and `null` all arrive here; only a non-empty map is a person.
fn parse_snapshot(body: &str) -> Result<Option<KeypointMap>> {
    let parsed: Option<SnapshotResponse> = serde_json::from_str(body)?;
    Ok(parsed
        .and_then(|s| s.keypoints)
        .filter(|keypoints| !keypoints.is_empty()))
}

/// Command history entries. Ones without `message`/`data` keep their
/// remaining fields (command bytes, result, state) as `data`.
fn parse_history(body: &str) -> Result<Vec<CommandEntry>> {
    let entries: Vec<serde_json::Value> = serde_json::from_str(body)?;
    let mut history = Vec::with_capacity(entries.len());
    for entry in entries {
        let mut parsed: CommandEntry = match serde_json::from_value(entry.clone()) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("skipping history entry: {}", e);
                continue;
            }
        };
        if parsed.message.is_none() && parsed.data.is_none() {
            if let serde_json::Value::Object(mut fields) = entry {
                fields.remove("timestamp");
                fields.remove("type");
                parsed.data = Some(serde_json::Value::Object(fields));
            }
        }
        history.push(parsed);
    }
    Ok(history)
}

#[async_trait]
impl Backend for HttpBackend {
    async fn list_templates(&self) -> Result<Catalog> {
        let response = self.client.get(self.url(POSE_CONFIGS)).send().await?;
        let body = check("list templates", response).await?.text().await?;
        let catalog = decode_catalog(&body)?;
        debug!("loaded {} templates ({} skipped)", catalog.templates.len(), catalog.skipped.len());
        Ok(catalog)
    }

    async fn save_template(&self, template: &PoseTemplate) -> Result<()> {
        let response = self
            .client
            .post(self.url(SAVE_POSE_CONFIG))
            .json(template)
            .send()
            .await?;
        check("save template", response).await?;
        Ok(())
    }

    async fn delete_template(&self, index: u32) -> Result<()> {
        let response = self
            .client
            .post(self.url(DELETE_POSE_CONFIG))
            .json(&json!({ "index": index }))
            .send()
            .await?;
        let body = check("delete template", response).await?.text().await?;
        let reply: DeleteResponse = serde_json::from_str(&body)?;
        if reply.success {
            Ok(())
        } else {
            Err(Error::Rejected {
                operation: "delete template",
                message: reply
                    .message
                    .unwrap_or_else(|| format!("template {index} was not deleted")),
            })
        }
    }

    async fn latest_keypoints(&self) -> Result<Option<KeypointMap>> {
        let response = self.client.get(self.url(LATEST_KEYPOINTS)).send().await?;
        let body = check("fetch keypoints", response).await?.text().await?;
        parse_snapshot(&body)
    }

    async fn fetch_config(&self) -> Result<LiveConfig> {
        let response = self.client.get(self.url(CONFIG)).send().await?;
        let body = check("fetch config", response).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn update_config(&self, patch: &ConfigPatch) -> Result<()> {
        let response = self
            .client
            .post(self.url(CONFIG))
            .json(patch)
            .send()
            .await?;
        let body = check("update config", response).await?.text().await?;
        let reply: StatusResponse = serde_json::from_str(&body)?;
        if reply.status == "success" {
            Ok(())
        } else {
            Err(Error::Rejected {
                operation: "update config",
                message: reply.message.unwrap_or(reply.status),
            })
        }
    }

    async fn fetch_stats(&self) -> Result<StatsPatch> {
        let response = self.client.get(self.url(STATS)).send().await?;
        let body = check("fetch stats", response).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn recent_commands(&self, count: usize) -> Result<Vec<CommandEntry>> {
        let response = self
            .client
            .get(self.url(COMMANDS))
            .query(&[("count", count)])
            .send()
            .await?;
        let body = check("fetch command history", response).await?.text().await?;
        parse_history(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{KeypointName, Vec2};
    use crate::sync::event::CommandKind;

    #[test]
    fn test_snapshot_with_person() {
        let body = r#"{"keypoints": {"nose": [100, 50], "left_shoulder": [80, 70]}}"#;
        let keypoints = parse_snapshot(body).unwrap().unwrap();
        assert_eq!(keypoints[&KeypointName::Nose], Vec2::new(100.0, 50.0));
        assert_eq!(keypoints.len(), 2);
    }

    #[test]
    fn test_snapshot_without_person() {
        assert_eq!(parse_snapshot("null").unwrap(), None);
        assert_eq!(parse_snapshot("{}").unwrap(), None);
        assert_eq!(parse_snapshot(r#"{"keypoints": {}}"#).unwrap(), None);
    }

    #[test]
    fn test_snapshot_with_unknown_keypoint_fails() {
        let body = r#"{"keypoints": {"tail": [1, 2]}}"#;
        assert!(matches!(parse_snapshot(body), Err(Error::Decode(_))));
    }

    #[test]
    fn test_history_keeps_command_fields_as_data() {
        let body = r#"[
            {"command": "0100", "result": true, "timestamp": 1700000000.0, "state": ["Forward"]},
            {"timestamp": 1700000001.0, "type": "detection", "message": "Attack"},
            {"command": "no timestamp"}
        ]"#;
        let history = parse_history(body).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, CommandKind::Command);
        assert_eq!(
            history[0].data,
            Some(json!({"command": "0100", "result": true, "state": ["Forward"]}))
        );
        assert_eq!(history[1].text(), "Attack");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let backend = HttpBackend::new("http://127.0.0.1:5000/", Duration::from_secs(3)).unwrap();
        assert_eq!(backend.url(STATS), "http://127.0.0.1:5000/api/stats");
    }
}
