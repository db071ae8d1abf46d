use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

pub const DEFAULT_OPLOG_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OpLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct OpLogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: OpLevel,
    pub message: String,
}

/// In-memory operational log kept for manual inspection. Oldest entries
/// are dropped once `capacity` is reached.
#[derive(Clone)]
pub struct OpLog {
    entries: Arc<RwLock<VecDeque<OpLogEntry>>>,
    capacity: usize,
}

impl OpLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
        }
    }

    pub async fn push(&self, level: OpLevel, message: impl Into<String>) {
        let mut log = self.entries.write().await;
        log.push_back(OpLogEntry {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        });
        while log.len() > self.capacity {
            log.pop_front();
        }
    }

    pub async fn info(&self, message: impl Into<String>) {
        self.push(OpLevel::Info, message).await;
    }

    pub async fn warn(&self, message: impl Into<String>) {
        self.push(OpLevel::Warn, message).await;
    }

    pub async fn error(&self, message: impl Into<String>) {
        self.push(OpLevel::Error, message).await;
    }

    /// Most recent `limit` entries, oldest first.
    pub async fn recent(&self, limit: usize) -> Vec<OpLogEntry> {
        let log = self.entries.read().await;
        let start = log.len().saturating_sub(limit);
        log.iter().skip(start).cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for OpLog {
    fn default() -> Self {
        Self::new(DEFAULT_OPLOG_CAPACITY)
    }
}
