use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use kondate_core::api::ProgressSink;
use kondate_core::executor::progress::ProgressUpdate;

/// Renders progress as log lines; the default sink for headless runs.
#[derive(Default)]
pub struct TextProgressSink;

impl TextProgressSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProgressSink for TextProgressSink {
    async fn notify_progress(&self, session_id: &str, update: &ProgressUpdate) {
        info!(
            "PROGRESS {} ({}/{} tasks, {}%): {}",
            session_id, update.completed, update.total, update.pct, update.label
        );
    }

    async fn notify_complete(
        &self,
        session_id: &str,
        text: &str,
        _payload: Option<Value>,
        confirmation: Option<Value>,
    ) {
        if confirmation.is_some() {
            info!("AWAITING CONFIRMATION {}: {}", session_id, text);
        } else {
            info!("COMPLETE {}: {}", session_id, text);
        }
    }
}
