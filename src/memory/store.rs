//! Bounded conversation window
//!
//! Keeps the last `window` utterances of one chat session in insertion
//! order. The oldest entry is evicted first once the window is exceeded.

use crate::models::Utterance;
use std::collections::VecDeque;

pub const DEFAULT_WINDOW: usize = 10;

/// Conversation memory for a single session
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    window: usize,
    /// VecDeque for O(1) push/evict at both ends
    utterances: VecDeque<Utterance>,
}

impl ConversationMemory {
    /// Create a memory holding at most `window` utterances (minimum 1)
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            utterances: VecDeque::with_capacity(window + 1),
        }
    }

    /// Append an utterance, evicting the oldest ones beyond the window
    pub fn append(&mut self, utterance: Utterance) {
        self.utterances.push_back(utterance);
        while self.utterances.len() > self.window {
            self.utterances.pop_front();
        }
    }

    /// Owned copy of the current window. Later appends are not visible
    /// through a snapshot taken earlier.
    pub fn snapshot(&self) -> Vec<Utterance> {
        self.utterances.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.utterances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utterances.is_empty()
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn clear(&mut self) {
        self.utterances.clear();
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn test_append_within_window() {
        let mut memory = ConversationMemory::new(4);
        memory.append(Utterance::user("Halo INA"));
        memory.append(Utterance::assistant("Halo! Ada yang bisa saya bantu?"));

        assert_eq!(memory.len(), 2);
        assert_eq!(memory.snapshot()[0].role(), Role::User);
        assert_eq!(memory.snapshot()[1].role(), Role::Assistant);
    }

    #[test]
    fn test_evicts_oldest_beyond_window() {
        let window = 5;
        let mut memory = ConversationMemory::new(window);

        for i in 0..=window {
            memory.append(Utterance::user(format!("Pertanyaan {}", i)));
        }

        let texts: Vec<String> = memory
            .snapshot()
            .iter()
            .map(|u| u.text().to_string())
            .collect();

        assert_eq!(memory.len(), window);
        assert_eq!(
            texts,
            vec![
                "Pertanyaan 1",
                "Pertanyaan 2",
                "Pertanyaan 3",
                "Pertanyaan 4",
                "Pertanyaan 5"
            ]
        );
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut memory = ConversationMemory::new(3);
        memory.append(Utterance::user("a"));

        let snapshot = memory.snapshot();
        memory.append(Utterance::user("b"));
        memory.append(Utterance::user("c"));
        memory.append(Utterance::user("d"));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].text(), "a");
    }

    #[test]
    fn test_zero_window_is_clamped() {
        let mut memory = ConversationMemory::new(0);
        memory.append(Utterance::user("a"));
        memory.append(Utterance::user("b"));

        assert_eq!(memory.window(), 1);
        assert_eq!(memory.len(), 1);
        assert_eq!(memory.snapshot()[0].text(), "b");
    }

    #[test]
    fn test_clear_keeps_window() {
        let mut memory = ConversationMemory::default();
        memory.append(Utterance::user("Modal saya 20 juta"));
        memory.append(Utterance::assistant("Baik, saya hitung"));

        memory.clear();
        assert!(memory.is_empty());
        assert_eq!(memory.window(), DEFAULT_WINDOW);
    }
}
