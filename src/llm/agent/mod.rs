//! The tool-calling loop.
//!
//! ```text
//! RoundController
//!   +-- ChatBackend (streamed completions)
//!   +-- ToolCallAccumulator (fragments -> calls, per round)
//!   +-- ToolExecutor (registry lookup, timeout, failure capture)
//!   +-- RoundObserver (UI and speech side effects)
//! ```
//!
//! Each round streams one completion. A round that produces text ends the
//! turn; a silent round hands its tool calls to the next one. The last round
//! is always offered without tools.

pub mod accumulator;
pub mod executor;
pub mod round;
pub mod types;

pub use accumulator::ToolCallAccumulator;
pub use executor::{ToolExecutor, ToolOutcome};
pub use round::{NoopObserver, RoundController, RoundObserver};
pub use types::{RoundState, StopReason, TurnOutcome};
