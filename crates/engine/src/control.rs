//! Control messages posted by controlled pages.

use serde::Serialize;
use serde_json::Value;
use shellcache_core::Error;

use crate::lifecycle::ActivateReport;
use crate::worker::Worker;

/// Recognised commands, identified by the message's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// `{ "type": "SKIP_WAITING" }`
    SkipWaiting,
    /// `{ "type": "CLEAR_CACHE" }`
    ClearCache,
}

impl ControlCommand {
    /// Decode a posted message. Anything unrecognised is `None`.
    pub fn parse(data: &Value) -> Option<Self> {
        match data.get("type")?.as_str()? {
            "SKIP_WAITING" => Some(Self::SkipWaiting),
            "CLEAR_CACHE" => Some(Self::ClearCache),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum MessageOutcome {
    SkipWaiting { activation: Option<ActivateReport> },
    ClearCache { deleted: Vec<String>, failed: Vec<String> },
    Ignored,
}

impl Worker {
    /// Handle a control message. Unrecognised messages are ignored.
    pub async fn message(&self, data: &Value) -> Result<MessageOutcome, Error> {
        let Some(command) = ControlCommand::parse(data) else {
            tracing::debug!("ignoring unrecognised control message");
            return Ok(MessageOutcome::Ignored);
        };

        match command {
            ControlCommand::SkipWaiting => {
                let activation = self.skip_waiting().await?;
                Ok(MessageOutcome::SkipWaiting { activation })
            }
            ControlCommand::ClearCache => {
                // The shell is not re-precached here; the next install does that.
                let names = self.db().generation_names().await?;
                let (deleted, failed) = self.delete_generations(names).await;
                tracing::info!(deleted = deleted.len(), failed = failed.len(), "cleared all caches");
                Ok(MessageOutcome::ClearCache { deleted, failed })
            }
        }
    }
}
