//! Append-only command history

use instrument_shared::{CommandResult, CommandStatus};
use tokio::sync::RwLock;

/// Selects history entries; unset fields match everything
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub device_id: Option<String>,
    pub status: Option<CommandStatus>,
}

impl HistoryFilter {
    fn matches(&self, result: &CommandResult) -> bool {
        self.device_id
            .as_deref()
            .map_or(true, |id| result.device_id == id)
            && self.status.map_or(true, |s| result.status == s)
    }
}

/// Finished commands, oldest first
#[derive(Debug, Default)]
pub struct CommandHistory {
    entries: RwLock<Vec<CommandResult>>,
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, result: CommandResult) {
        self.entries.write().await.push(result);
    }

    /// Copy of every entry
    pub async fn snapshot(&self) -> Vec<CommandResult> {
        self.entries.read().await.clone()
    }

    pub async fn filter(&self, filter: &HistoryFilter) -> Vec<CommandResult> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
