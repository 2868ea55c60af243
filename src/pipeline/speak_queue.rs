//! The shared speech queue.
//!
//! Items are kept in arrival order and stably sorted by `speak_index` on
//! every pop, so paragraphs of one round keep their relative order while a
//! lower index always goes first. Pushing wakes the scheduler through a
//! [`Notify`] permit, so a push that races the scheduler's idle wait is never
//! lost.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use super::messages::SpeakItem;
use crate::session::{AnswerId, SessionStatus};

#[derive(Debug)]
pub struct SpeakQueue {
    items: Mutex<Vec<SpeakItem>>,
    notify: Notify,
    session: Arc<SessionStatus>,
}

impl SpeakQueue {
    pub fn new(session: Arc<SessionStatus>) -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            notify: Notify::new(),
            session,
        }
    }

    /// Enqueue `item`. Speech for an interrupted answer is refused; end
    /// markers are always accepted. Returns whether the item was queued.
    pub fn push(&self, item: SpeakItem) -> bool {
        if !item.is_end_marker && self.session.is_break_requested(item.answer_id) {
            tracing::debug!(answer_id = %item.answer_id, "refusing speech for interrupted answer");
            return false;
        }
        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(item);
        self.notify.notify_one();
        true
    }

    /// Remove the item with the lowest `speak_index`.
    pub fn pop(&self) -> Option<SpeakItem> {
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        if items.is_empty() {
            return None;
        }
        items.sort_by_key(|item| item.speak_index);
        Some(items.remove(0))
    }

    /// Drop queued speech for `answer_id`, keeping its end marker.
    pub fn discard_answer(&self, answer_id: AnswerId) -> usize {
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        let before = items.len();
        items.retain(|item| item.is_end_marker || item.answer_id != answer_id);
        before - items.len()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait for a push, at most `poll`.
    pub async fn wait(&self, poll: Duration) {
        let _ = tokio::time::timeout(poll, self.notify.notified()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> (Arc<SessionStatus>, SpeakQueue) {
        let session = Arc::new(SessionStatus::default());
        let queue = SpeakQueue::new(Arc::clone(&session));
        (session, queue)
    }

    #[test]
    fn pops_lowest_index_first() {
        let (_, queue) = queue();
        let id = AnswerId::new();
        queue.push(SpeakItem::speech("late", 2, id));
        queue.push(SpeakItem::speech("early", 1, id));
        assert_eq!(queue.pop().and_then(|i| i.text).as_deref(), Some("early"));
        assert_eq!(queue.pop().and_then(|i| i.text).as_deref(), Some("late"));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn equal_indices_keep_arrival_order() {
        let (_, queue) = queue();
        let id = AnswerId::new();
        queue.push(SpeakItem::speech("a", 5, id));
        queue.push(SpeakItem::speech("b", 5, id));
        queue.push(SpeakItem::end_marker(5, id));
        queue.push(SpeakItem::speech("first", 4, id));
        let order: Vec<_> = std::iter::from_fn(|| queue.pop())
            .map(|i| i.text.unwrap_or_else(|| "<end>".into()))
            .collect();
        assert_eq!(order, vec!["first", "a", "b", "<end>"]);
    }

    #[test]
    fn interrupted_answer_only_accepts_end_marker() {
        let (session, queue) = queue();
        let id = AnswerId::new();
        session.request_break(id);
        assert!(!queue.push(SpeakItem::speech("nope", 1, id)));
        assert!(queue.push(SpeakItem::end_marker(1, id)));
        assert!(queue.push(SpeakItem::speech("other", 2, AnswerId::new())));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn discard_keeps_markers_and_other_answers() {
        let (_, queue) = queue();
        let old = AnswerId::new();
        let new = AnswerId::new();
        queue.push(SpeakItem::speech("x", 1, old));
        queue.push(SpeakItem::end_marker(1, old));
        queue.push(SpeakItem::speech("y", 2, new));
        assert_eq!(queue.discard_answer(old), 1);
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn push_before_wait_is_not_lost() {
        let (_, queue) = queue();
        queue.push(SpeakItem::end_marker(0, AnswerId::new()));
        let start = std::time::Instant::now();
        queue.wait(Duration::from_secs(5)).await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
