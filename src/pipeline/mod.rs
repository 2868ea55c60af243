//! Conversation pipeline: prompt turns in, ordered speech out.

pub mod coordinator;
pub mod messages;
pub mod scheduler;
pub mod segmenter;
pub mod speak_queue;

pub use coordinator::{ConversationCoordinator, CoordinatorParts};
pub use messages::{SpeakItem, TurnTrigger};
pub use scheduler::SpeakScheduler;
pub use speak_queue::SpeakQueue;
