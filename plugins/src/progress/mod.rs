//! Progress sink implementations.

mod bar;
mod channel;
mod text;

pub use bar::BarProgressSink;
pub use channel::{ChannelProgressSink, ProgressEvent};
pub use text::TextProgressSink;
