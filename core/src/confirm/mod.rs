//! Pause/persist/resume protocol around the executor.
//!
//! `Running → AwaitingConfirmation → {Resumed→Running | Cancelled}`.
//! A `NeedsConfirmation` execution result pauses the chain: the snapshot
//! needed to resume is persisted under the session id, the user gets a
//! templated question, and nothing advances until the next turn tagged as
//! a confirmation response. Paused state is single-use: it is deleted
//! eagerly at the start of every resume attempt.

mod coordinator;
mod paused;
mod reply;

pub use coordinator::{ConfirmationCoordinator, ConfirmationOutcome};
pub use paused::{PausedState, PausedStateStore};
pub use reply::{parse_reply, DisambiguationStrategy, ReplyIntent};
