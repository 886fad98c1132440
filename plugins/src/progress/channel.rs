use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use kondate_core::api::ProgressSink;
use kondate_core::executor::progress::ProgressUpdate;

/// One delivered notification.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Progress {
        session_id: String,
        update: ProgressUpdate,
    },
    Complete {
        session_id: String,
        text: String,
        payload: Option<Value>,
        confirmation: Option<Value>,
    },
}

/// Forwards notifications into an unbounded channel; the receiving side
/// owns delivery (a websocket pump, a test assertion, ...).
pub struct ChannelProgressSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgressSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ProgressSink for ChannelProgressSink {
    async fn notify_progress(&self, session_id: &str, update: &ProgressUpdate) {
        let _ = self.tx.send(ProgressEvent::Progress {
            session_id: session_id.to_string(),
            update: update.clone(),
        });
    }

    async fn notify_complete(
        &self,
        session_id: &str,
        text: &str,
        payload: Option<Value>,
        confirmation: Option<Value>,
    ) {
        let _ = self.tx.send(ProgressEvent::Complete {
            session_id: session_id.to_string(),
            text: text.to_string(),
            payload,
            confirmation,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_flow_through_the_channel() {
        let (sink, mut rx) = ChannelProgressSink::new();

        sink.notify_progress("s1", &ProgressUpdate::new(1, 2, "recipe.step"))
            .await;
        sink.notify_complete("s1", "done", None, None).await;

        assert!(matches!(
            rx.recv().await,
            Some(ProgressEvent::Progress { .. })
        ));
        match rx.recv().await {
            Some(ProgressEvent::Complete { text, .. }) => assert_eq!(text, "done"),
            other => panic!("expected Complete, got {:?}", other),
        }
    }
}
