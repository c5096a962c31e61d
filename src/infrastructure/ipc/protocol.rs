//! Wire protocol for the local IPC socket (spec §4.7/§6): a length-delimited
//! JSON request/reply pair and the command set a client may issue.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::IpcError;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    GetStatus,
    GetStats,
    GetRegime,
    ForceCheck { symbol: Option<String> },
    ReloadConfig,
    Shutdown,
}

impl Command {
    pub fn parse(type_name: &str, data: &serde_json::Value) -> Result<Self, IpcError> {
        match type_name {
            "GET_STATUS" => Ok(Command::GetStatus),
            "GET_STATS" => Ok(Command::GetStats),
            "GET_REGIME" => Ok(Command::GetRegime),
            "FORCE_CHECK" => Ok(Command::ForceCheck {
                symbol: data.get("symbol").and_then(|v| v.as_str()).map(|s| s.to_string()),
            }),
            "RELOAD_CONFIG" => Ok(Command::ReloadConfig),
            "SHUTDOWN" => Ok(Command::Shutdown),
            other => Err(IpcError::UnknownCommand { command: other.to_string() }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcRequest {
    #[serde(rename = "type")]
    pub type_name: String,
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Success,
    Error,
    Queued,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcReply {
    pub request_id: String,
    pub status: ReplyStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IpcReply {
    pub fn success(request_id: String, data: serde_json::Value) -> Self {
        IpcReply { request_id, status: ReplyStatus::Success, timestamp: Utc::now(), data, error: None }
    }

    pub fn queued(request_id: String) -> Self {
        IpcReply {
            request_id,
            status: ReplyStatus::Queued,
            timestamp: Utc::now(),
            data: serde_json::Value::Null,
            error: None,
        }
    }

    pub fn error(request_id: String, error: String) -> Self {
        IpcReply {
            request_id,
            status: ReplyStatus::Error,
            timestamp: Utc::now(),
            data: serde_json::Value::Null,
            error: Some(error),
        }
    }
}

/// Implemented by the service controller; the transport in `server.rs`
/// never interprets a command's meaning, only decodes/encodes frames and
/// dispatches to this trait.
#[async_trait]
pub trait IpcHandler: Send + Sync {
    async fn handle(&self, command: Command, request_id: String) -> IpcReply;
}
