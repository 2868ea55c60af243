//! Process-wide session status shared by every engine.
//!
//! One [`SessionStatus`] exists per process and is passed around as an
//! `Arc`. Flags are atomics; identifiers sit behind short-lived mutexes that
//! are never held across an await point.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

/// How many re-armed answers are remembered for late waiters.
const REARM_MEMORY: usize = 32;

/// Identifier of one assistant answer (one turn).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerId(uuid::Uuid);

impl AnswerId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for AnswerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AnswerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What the microphone side is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RecordState {
    #[default]
    Idle = 0,
    Recording = 1,
    Processing = 2,
}

impl RecordState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Recording,
            2 => Self::Processing,
            _ => Self::Idle,
        }
    }
}

/// Serializable view of the session, broadcast to hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub is_listening: bool,
    pub is_audio_enabled: bool,
    pub is_live_mode: bool,
    pub record_state: RecordState,
    pub speak_counter: u64,
    pub active_answer_id: Option<AnswerId>,
    pub break_requested_id: Option<AnswerId>,
}

#[derive(Debug, Default)]
struct ListenState {
    rearmed: VecDeque<AnswerId>,
    generation: u64,
}

/// Shared session state.
#[derive(Debug)]
pub struct SessionStatus {
    is_listening: AtomicBool,
    is_audio_enabled: AtomicBool,
    is_live_mode: AtomicBool,
    record_state: AtomicU8,
    speak_counter: AtomicU64,
    active_answer_id: Mutex<Option<AnswerId>>,
    latest_requested_id: Mutex<Option<AnswerId>>,
    break_requested_id: Mutex<Option<AnswerId>>,
    listen: Mutex<ListenState>,
    listen_notify: Notify,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::new(true)
    }
}

impl SessionStatus {
    pub fn new(audio_enabled: bool) -> Self {
        Self {
            is_listening: AtomicBool::new(false),
            is_audio_enabled: AtomicBool::new(audio_enabled),
            is_live_mode: AtomicBool::new(false),
            record_state: AtomicU8::new(RecordState::Idle as u8),
            speak_counter: AtomicU64::new(0),
            active_answer_id: Mutex::new(None),
            latest_requested_id: Mutex::new(None),
            break_requested_id: Mutex::new(None),
            listen: Mutex::new(ListenState::default()),
            listen_notify: Notify::new(),
        }
    }

    // ── Flags ─────────────────────────────────────────────────

    pub fn is_listening(&self) -> bool {
        self.is_listening.load(Ordering::SeqCst)
    }

    /// Enable or disable voice capture. Enabling wakes the capture loop.
    pub fn set_listening(&self, on: bool) {
        self.is_listening.store(on, Ordering::SeqCst);
        if !on {
            self.set_record_state(RecordState::Idle);
        }
        self.listen.lock().unwrap_or_else(|e| e.into_inner()).generation += 1;
        self.listen_notify.notify_waiters();
    }

    pub fn is_audio_enabled(&self) -> bool {
        self.is_audio_enabled.load(Ordering::SeqCst)
    }

    pub fn set_audio_enabled(&self, on: bool) {
        self.is_audio_enabled.store(on, Ordering::SeqCst);
    }

    pub fn is_live_mode(&self) -> bool {
        self.is_live_mode.load(Ordering::SeqCst)
    }

    pub fn set_live_mode(&self, on: bool) {
        self.is_live_mode.store(on, Ordering::SeqCst);
    }

    pub fn record_state(&self) -> RecordState {
        RecordState::from_u8(self.record_state.load(Ordering::SeqCst))
    }

    pub fn set_record_state(&self, state: RecordState) {
        self.record_state.store(state as u8, Ordering::SeqCst);
    }

    // ── Speak ordering ────────────────────────────────────────

    /// Allocate the next speak index. Strictly increasing for the process.
    pub fn next_speak_index(&self) -> u64 {
        self.speak_counter.fetch_add(1, Ordering::SeqCst)
    }

    // ── Answers and interruption ──────────────────────────────

    /// Record `id` as the newest requested answer. Any answer requested
    /// earlier that has not started yet is superseded.
    pub fn request_answer(&self, id: AnswerId) {
        *self
            .latest_requested_id
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(id);
    }

    /// True when a newer answer was requested after `id`.
    pub fn is_superseded(&self, id: AnswerId) -> bool {
        let latest = *self
            .latest_requested_id
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        latest.is_some_and(|latest| latest != id)
    }

    /// Mark `id` as the answer currently being produced.
    pub fn begin_answer(&self, id: AnswerId) {
        *self
            .active_answer_id
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(id);
    }

    /// Clear the active answer if it is still `id`.
    pub fn finish_answer(&self, id: AnswerId) {
        let mut active = self
            .active_answer_id
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if *active == Some(id) {
            *active = None;
        }
    }

    pub fn active_answer(&self) -> Option<AnswerId> {
        *self
            .active_answer_id
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Ask the producer and the speak queue to abandon `id`.
    pub fn request_break(&self, id: AnswerId) {
        *self
            .break_requested_id
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(id);
    }

    /// Break whatever answer is active; returns it.
    pub fn break_active(&self) -> Option<AnswerId> {
        let active = self.active_answer();
        if let Some(id) = active {
            self.request_break(id);
        }
        active
    }

    pub fn break_requested_id(&self) -> Option<AnswerId> {
        *self
            .break_requested_id
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_break_requested(&self, id: AnswerId) -> bool {
        self.break_requested_id() == Some(id)
    }

    // ── Listening re-arm ──────────────────────────────────────

    /// Signal that `id` has finished speaking and capture may resume.
    pub fn rearm_listening(&self, id: AnswerId) {
        {
            let mut listen = self.listen.lock().unwrap_or_else(|e| e.into_inner());
            if listen.rearmed.len() >= REARM_MEMORY {
                listen.rearmed.pop_front();
            }
            listen.rearmed.push_back(id);
        }
        self.listen_notify.notify_waiters();
    }

    /// Wait until `id` is re-armed or listening is toggled.
    pub async fn wait_for_rearm(&self, id: AnswerId) {
        let start = self
            .listen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .generation;
        loop {
            let notified = self.listen_notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let mut listen = self.listen.lock().unwrap_or_else(|e| e.into_inner());
                if let Some(pos) = listen.rearmed.iter().position(|r| *r == id) {
                    listen.rearmed.remove(pos);
                    return;
                }
                if listen.generation != start {
                    return;
                }
            }
            notified.await;
        }
    }

    /// Wait until listening is enabled.
    pub async fn wait_until_listening(&self) {
        loop {
            let notified = self.listen_notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_listening() {
                return;
            }
            notified.await;
        }
    }

    // ── Snapshot ──────────────────────────────────────────────

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            is_listening: self.is_listening(),
            is_audio_enabled: self.is_audio_enabled(),
            is_live_mode: self.is_live_mode(),
            record_state: self.record_state(),
            speak_counter: self.speak_counter.load(Ordering::SeqCst),
            active_answer_id: self.active_answer(),
            break_requested_id: self.break_requested_id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn speak_indices_strictly_increase() {
        let session = SessionStatus::default();
        let a = session.next_speak_index();
        let b = session.next_speak_index();
        assert!(b > a);
        assert_eq!(session.snapshot().speak_counter, 2);
    }

    #[test]
    fn break_targets_only_the_named_answer() {
        let session = SessionStatus::default();
        let first = AnswerId::new();
        let second = AnswerId::new();
        session.begin_answer(first);
        assert_eq!(session.break_active(), Some(first));
        assert!(session.is_break_requested(first));
        assert!(!session.is_break_requested(second));
    }

    #[test]
    fn newer_request_supersedes_pending_answer() {
        let session = SessionStatus::default();
        let pending = AnswerId::new();
        let newest = AnswerId::new();
        assert!(!session.is_superseded(pending));
        session.request_answer(pending);
        session.request_answer(newest);
        assert!(session.is_superseded(pending));
        assert!(!session.is_superseded(newest));
    }

    #[test]
    fn answer_id_serializes_as_uuid_string() {
        let id = AnswerId::new();
        let json = serde_json::to_value(id).unwrap_or_default();
        assert_eq!(json, serde_json::Value::String(id.to_string()));
        let back: AnswerId = serde_json::from_value(json).unwrap_or_default();
        assert_eq!(back, id);
    }

    #[test]
    fn finish_answer_keeps_newer_answer() {
        let session = SessionStatus::default();
        let old = AnswerId::new();
        let new = AnswerId::new();
        session.begin_answer(new);
        session.finish_answer(old);
        assert_eq!(session.active_answer(), Some(new));
        session.finish_answer(new);
        assert_eq!(session.active_answer(), None);
    }

    #[test]
    fn record_state_round_trips() {
        let session = SessionStatus::default();
        session.set_record_state(RecordState::Processing);
        assert_eq!(session.record_state(), RecordState::Processing);
        session.set_listening(false);
        assert_eq!(session.record_state(), RecordState::Idle);
    }

    #[test]
    fn snapshot_serializes() {
        let session = SessionStatus::new(false);
        let json = serde_json::to_value(session.snapshot()).unwrap_or_default();
        assert_eq!(json["is_audio_enabled"], false);
        assert_eq!(json["record_state"], "idle");
        assert!(json["active_answer_id"].is_null());
    }

    #[tokio::test]
    async fn rearm_before_wait_is_not_lost() {
        let session = SessionStatus::default();
        let id = AnswerId::new();
        session.rearm_listening(id);
        tokio::time::timeout(Duration::from_secs(1), session.wait_for_rearm(id))
            .await
            .unwrap_or_else(|_| unreachable!("rearm was recorded"));
    }

    #[tokio::test]
    async fn rearm_for_other_answer_does_not_wake() {
        let session = Arc::new(SessionStatus::default());
        let mine = AnswerId::new();
        session.rearm_listening(AnswerId::new());
        let waited =
            tokio::time::timeout(Duration::from_millis(50), session.wait_for_rearm(mine)).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn listening_toggle_wakes_waiters() {
        let session = Arc::new(SessionStatus::default());
        let waiter = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.wait_until_listening().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        session.set_listening(true);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap_or_else(|_| unreachable!("waiter woke"))
            .unwrap_or_else(|_| unreachable!("waiter did not panic"));
    }
}
