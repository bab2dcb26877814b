//! Cue engine session: workspace handshake and recursive cue discovery.
//!
//! Every query to the cue engine is answered on `/reply` + the query address
//! with a single JSON string argument:
//! `{"status": "ok", "data": ...}`.

use serde::Deserialize;
use serde_json::Value;

use super::reply::AttributeValue;
use crate::cue::{Cue, QlabCue, QlabRegistry};
use crate::error::{ConnectionError, ParseError, SyncError};
use crate::osc::{Correlator, OscArg, Reply};
use crate::timecode;

pub const REPLY_PREFIX: &str = "/reply";
const STATUS_OK: &str = "ok";

/// Response address for a cue engine query.
pub fn reply_address(query_address: &str) -> String {
    format!("{}{}", REPLY_PREFIX, query_address)
}

/// The JSON envelope carried by every cue engine reply.
#[derive(Debug, Clone, Deserialize)]
pub struct QlabReply {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub data: Value,
}

impl QlabReply {
    pub fn parse(reply: &Reply) -> Result<Self, ParseError> {
        let text = match reply.args.first() {
            Some(OscArg::String(text)) => text,
            other => {
                return Err(ParseError::new(
                    &reply.address,
                    format!("expected a JSON string argument, got {:?}", other),
                ))
            }
        };

        serde_json::from_str(text).map_err(|e| ParseError::new(&reply.address, e.to_string()))
    }

    /// The payload, or a parse error if the console reported a failure.
    pub fn into_data(self, address: &str) -> Result<Value, ParseError> {
        if self.status == STATUS_OK {
            Ok(self.data)
        } else {
            Err(ParseError::new(
                address,
                format!("status {:?}", self.status),
            ))
        }
    }
}

#[derive(Debug, Deserialize)]
struct WorkspaceEntry {
    #[serde(rename = "uniqueID")]
    unique_id: String,
    #[serde(default, rename = "displayName")]
    display_name: String,
}

/// One node of the nested cue list tree. Children stay raw so a malformed
/// child can be skipped without losing its siblings.
#[derive(Debug, Deserialize)]
struct CueEntry {
    #[serde(rename = "uniqueID")]
    unique_id: String,
    #[serde(default)]
    number: Value,
    #[serde(default)]
    name: String,
    #[serde(default, rename = "listName")]
    list_name: String,
    #[serde(default, rename = "type")]
    cue_type: String,
    #[serde(default)]
    cues: Vec<Value>,
}

impl CueEntry {
    fn to_cue(&self) -> QlabCue {
        let number = AttributeValue::from_json(&self.number)
            .as_f64()
            .unwrap_or_default();
        let label = if self.name.is_empty() {
            &self.list_name
        } else {
            &self.name
        };

        QlabCue::new(Cue::new(&self.unique_id, number, label), &self.cue_type)
    }
}

/// Send one query and unwrap the JSON envelope of its reply.
async fn query_data(
    correlator: &Correlator,
    address: &str,
    args: Vec<OscArg>,
) -> Result<Value, SyncError> {
    let reply = correlator
        .query(address, &reply_address(address), args)
        .await?;
    Ok(QlabReply::parse(&reply)?.into_data(address)?)
}

fn handshake_error(e: SyncError) -> ConnectionError {
    match e {
        SyncError::Query(e) => ConnectionError::Query(e),
        SyncError::Parse(e) => ConnectionError::Handshake(e.to_string()),
        SyncError::Connection(e) => e,
        other => ConnectionError::Handshake(other.to_string()),
    }
}

/// Ask the cue engine for its open workspaces and pick the first one.
pub async fn discover_workspace(correlator: &Correlator) -> Result<String, ConnectionError> {
    let data = query_data(correlator, "/workspaces", vec![])
        .await
        .map_err(handshake_error)?;

    let workspaces: Vec<WorkspaceEntry> = serde_json::from_value(data)
        .map_err(|e| ConnectionError::Handshake(format!("unreadable workspace list: {}", e)))?;

    let workspace = workspaces
        .into_iter()
        .next()
        .ok_or_else(|| ConnectionError::Handshake("no open workspaces".to_string()))?;

    log::info!(
        "Using workspace {} ({})",
        workspace.display_name,
        workspace.unique_id
    );
    Ok(workspace.unique_id)
}

/// Connect to `workspace_id`, sending `passcode` when one is configured.
pub async fn connect_workspace(
    correlator: &Correlator,
    workspace_id: &str,
    passcode: Option<&str>,
) -> Result<(), ConnectionError> {
    let address = format!("/workspace/{}/connect", workspace_id);
    let args = passcode
        .map(|p| vec![OscArg::String(p.to_string())])
        .unwrap_or_default();

    let data = query_data(correlator, &address, args)
        .await
        .map_err(handshake_error)?;

    match data.as_str() {
        Some(STATUS_OK) => Ok(()),
        other => Err(ConnectionError::Handshake(format!(
            "workspace {} refused connection: {:?}",
            workspace_id, other
        ))),
    }
}

/// Rebuild the cue tree of `workspace_id` from scratch.
///
/// Failing to read the cue lists aborts the pass. Attribute queries that
/// fail are logged and leave the field at its default.
pub async fn sync_qlab(
    correlator: &Correlator,
    workspace_id: &str,
    fps: u32,
) -> Result<QlabRegistry, SyncError> {
    let address = format!("/workspace/{}/cueLists", workspace_id);
    let data = query_data(correlator, &address, vec![]).await?;
    let Value::Array(entries) = data else {
        let reason = "cue lists are not an array";
        return Err(ParseError::new(reply_address(&address), reason).into());
    };

    let mut registry = QlabRegistry::new();
    for entry in &entries {
        insert_entry(&mut registry, entry, None);
    }

    let backfill = Backfill {
        correlator,
        workspace_id,
        fps,
    };
    for uid in registry.uids() {
        backfill.apply(&mut registry, &uid).await;
    }

    log::info!(
        "Synchronized {} cues in {} cue lists from workspace {}",
        registry.len(),
        registry.roots().count(),
        workspace_id
    );
    Ok(registry)
}

/// Register `entry` under `parent`, then descend into its nested cues. An
/// entry that does not parse is skipped along with everything nested in it.
fn insert_entry(registry: &mut QlabRegistry, value: &Value, parent: Option<&str>) {
    let entry = match CueEntry::deserialize(value) {
        Ok(entry) => entry,
        Err(e) => {
            log::warn!(
                "Skipping malformed cue under {}: {}",
                parent.unwrap_or("the workspace"),
                e
            );
            return;
        }
    };

    let cue = entry.to_cue();
    let inserted = match parent {
        Some(parent) => registry.add_child(parent, cue),
        None => registry.add_root(cue),
    };

    if let Err(e) = inserted {
        log::warn!("Skipping cue {}: {}", entry.unique_id, e);
        return;
    }

    for child in &entry.cues {
        insert_entry(registry, child, Some(&entry.unique_id));
    }
}

struct Backfill<'a> {
    correlator: &'a Correlator,
    workspace_id: &'a str,
    fps: u32,
}

impl Backfill<'_> {
    async fn attribute(&self, uid: &str, name: &str) -> Option<AttributeValue> {
        let address = format!("/workspace/{}/cue_id/{}/{}", self.workspace_id, uid, name);
        match query_data(self.correlator, &address, vec![]).await {
            Ok(data) => Some(AttributeValue::from_json(&data)),
            Err(e) => {
                log::warn!("Leaving {} of cue {} unset: {}", name, uid, e);
                None
            }
        }
    }

    async fn apply(&self, registry: &mut QlabRegistry, uid: &str) {
        let has_file_target = self
            .attribute(uid, "hasFileTargets")
            .await
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let file_target = if has_file_target {
            self.attribute(uid, "fileTarget")
                .await
                .and_then(|v| v.as_text().map(str::to_string))
        } else {
            None
        };

        let has_cue_target = self
            .attribute(uid, "hasCueTargets")
            .await
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let cue_target_id = if has_cue_target {
            self.attribute(uid, "cueTargetId")
                .await
                .and_then(|v| v.as_text().map(str::to_string))
        } else {
            None
        };

        let duration = self.number(uid, "duration").await;
        let pre_wait = self.number(uid, "preWait").await;
        let post_wait = self.number(uid, "postWait").await;
        let timecode = self
            .attribute(uid, "timecodeTrigger")
            .await
            .and_then(|v| v.as_text().and_then(|t| timecode::decode_remote(t, self.fps)));

        let Some(cue) = registry.get_mut(uid) else {
            return;
        };
        cue.file_target = file_target;
        cue.cue_target_id = cue_target_id;
        if let Some(duration) = duration {
            cue.duration = duration;
        }
        if let Some(pre_wait) = pre_wait {
            cue.pre_wait = pre_wait;
        }
        if let Some(post_wait) = post_wait {
            cue.post_wait = post_wait;
        }
        cue.cue.timecode = timecode;
    }

    async fn number(&self, uid: &str, name: &str) -> Option<f64> {
        let value = self.attribute(uid, name).await?;
        let number = value.as_f64();
        if number.is_none() {
            log::warn!("Leaving {} of cue {} unset: not a number {:?}", name, uid, value);
        }
        number
    }
}
