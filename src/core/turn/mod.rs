//! Turn-taking for one call: who is speaking, what has been said, and what
//! happens when the caller talks over the assistant.

pub mod controller;
pub mod events;
pub mod history;
pub mod interruption;
pub mod state;
pub mod utterance;


pub use controller::{CallBackends, InFlightTurn, TurnController, TurnSettings};
pub use events::CallEvent;
pub use history::{ConversationHistory, DEFAULT_HISTORY_WINDOW, HistoryEntry, Role};
pub use interruption::{INTERRUPTED_MARKER, InterruptionReport, heard_fraction, truncate_to_heard};
pub use state::TurnState;
pub use utterance::Utterance;
