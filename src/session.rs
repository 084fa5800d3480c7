//! Caller-local conversation memory.
//!
//! One chat session owns one memory; it is not shared across sessions and
//! never persisted. The window is a fixed-length rolling buffer - oldest
//! turns are discarded beyond the cap, and that is the only eviction
//! policy. Recall lets an elliptical follow-up ("what about EMEA?") reuse
//! the most recent program from earlier turns.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::intent::{IntentKind, TimeScope};

/// Turns remembered per session
pub const MEMORY_WINDOW: usize = 10;

/// What one turn contributed to the conversation
#[derive(Debug, Clone)]
pub struct TurnRecord {
    pub question: String,
    pub kind: IntentKind,
    pub programs: Vec<String>,
    pub region: Option<String>,
    pub time: TimeScope,
    pub asked_at: DateTime<Utc>,
}

/// Rolling window of recent turns for one chat session
#[derive(Debug)]
pub struct ConversationMemory {
    session_id: Uuid,
    turns: VecDeque<TurnRecord>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            turns: VecDeque::with_capacity(MEMORY_WINDOW),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Record a completed turn, discarding the oldest beyond the window
    pub fn remember(&mut self, record: TurnRecord) {
        if self.turns.len() == MEMORY_WINDOW {
            self.turns.pop_front();
        }
        self.turns.push_back(record);
    }

    /// Most recent turn first
    pub fn recent(&self) -> impl Iterator<Item = &TurnRecord> {
        self.turns.iter().rev()
    }

    /// The most recently mentioned programs, if any turn had some
    pub fn last_programs(&self) -> Option<&[String]> {
        self.recent()
            .find(|t| !t.programs.is_empty())
            .map(|t| t.programs.as_slice())
    }

    /// The most recently mentioned region, if any
    pub fn last_region(&self) -> Option<&str> {
        self.recent()
            .find_map(|t| t.region.as_deref())
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new()
    }
}
