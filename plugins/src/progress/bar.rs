use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde_json::Value;

use kondate_core::api::ProgressSink;
use kondate_core::executor::progress::ProgressUpdate;

/// Visual progress bars for interactive terminal runs; one bar per
/// session, finished on completion.
pub struct BarProgressSink {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl BarProgressSink {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn bar_for(&self, session_id: &str, total: u64) -> ProgressBar {
        let mut bars = self.bars.lock().expect("progress bar registry poisoned");
        bars.entry(session_id.to_string())
            .or_insert_with(|| {
                let bar = self.multi.add(ProgressBar::new(total));
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template(
                            "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} tasks ({percent}%) {msg}",
                        )
                        .unwrap()
                        .progress_chars("█▓▒░  "),
                );
                bar
            })
            .clone()
    }
}

impl Default for BarProgressSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProgressSink for BarProgressSink {
    async fn notify_progress(&self, session_id: &str, update: &ProgressUpdate) {
        let bar = self.bar_for(session_id, update.total as u64);
        bar.set_length(update.total as u64);
        bar.set_position(update.completed as u64);
        bar.set_message(update.label.clone());
    }

    async fn notify_complete(
        &self,
        session_id: &str,
        text: &str,
        _payload: Option<Value>,
        _confirmation: Option<Value>,
    ) {
        let bar = self
            .bars
            .lock()
            .expect("progress bar registry poisoned")
            .remove(session_id);
        if let Some(bar) = bar {
            bar.finish_with_message(text.to_string());
        }
    }
}
