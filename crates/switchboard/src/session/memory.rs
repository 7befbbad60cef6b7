//! Bounded conversational memory.

use std::collections::VecDeque;

use crate::llm::Message;

use super::chunker::count_tokens;

/// Ordered log of prior turns, bounded by total token size.
///
/// Oldest turns are evicted first once an append would exceed the budget. A
/// turn that alone exceeds the budget is still kept; everything evictable is
/// dropped before it.
///
/// Turns appended between [`begin_pinned`](Self::begin_pinned) and
/// [`release_pinned`](Self::release_pinned) are never evicted in between, so a
/// message that was split into chunks cannot lose its own head while its tail
/// is still being sent. The budget may be exceeded while a pin is held.
///
/// Not synchronized: callers serialize access (the session holds it behind a mutex).
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    turns: VecDeque<Entry>,
    total_tokens: usize,
    budget: usize,
    pinning: bool,
    pinned: usize,
}

#[derive(Debug, Clone)]
struct Entry {
    turn: Message,
    tokens: usize,
}

impl ConversationMemory {
    pub fn new(budget_tokens: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            total_tokens: 0,
            budget: budget_tokens,
            pinning: false,
            pinned: 0,
        }
    }

    /// Append a turn, evicting the oldest unpinned turns until it fits.
    pub fn append(&mut self, turn: Message) {
        let tokens = count_tokens(&turn.content);

        while self.total_tokens + tokens > self.budget && self.evict_oldest() {}

        self.turns.push_back(Entry { turn, tokens });
        self.total_tokens += tokens;
        if self.pinning {
            self.pinned += 1;
        }
    }

    /// Start pinning: turns appended from now on survive eviction until released.
    ///
    /// Any pin left over from an exchange that never released is dropped first.
    pub fn begin_pinned(&mut self) {
        self.pinning = true;
        self.pinned = 0;
    }

    /// Unpin the in-flight sequence and trim back to the budget, keeping the newest turn.
    pub fn release_pinned(&mut self) {
        self.pinning = false;
        self.pinned = 0;
        while self.total_tokens > self.budget && self.turns.len() > 1 && self.evict_oldest() {}
    }

    /// Snapshot of the turns, oldest first.
    pub fn history(&self) -> Vec<Message> {
        self.turns.iter().map(|e| e.turn.clone()).collect()
    }

    /// Drop every turn and any pin.
    pub fn reset(&mut self) {
        self.turns.clear();
        self.total_tokens = 0;
        self.pinning = false;
        self.pinned = 0;
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn total_tokens(&self) -> usize {
        self.total_tokens
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Remove the oldest evictable turn. Returns false when only pinned turns remain.
    fn evict_oldest(&mut self) -> bool {
        if self.turns.len() <= self.pinned {
            return false;
        }
        match self.turns.pop_front() {
            Some(entry) => {
                self.total_tokens -= entry.tokens;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    /// Four bytes per token, so "aaaa" costs exactly one.
    fn turn(tokens: usize, tag: char) -> Message {
        Message::user(tag.to_string().repeat(tokens * 4))
    }

    fn tags(memory: &ConversationMemory) -> String {
        memory
            .history()
            .iter()
            .map(|m| m.content.chars().next().unwrap_or('-'))
            .collect()
    }

    #[test]
    fn appends_in_order_within_budget() {
        let mut memory = ConversationMemory::new(10);
        memory.append(turn(2, 'a'));
        memory.append(Message::assistant("bbbb"));

        let history = memory.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(memory.total_tokens(), 3);
    }

    #[test]
    fn evicts_oldest_first_when_over_budget() {
        let mut memory = ConversationMemory::new(6);
        memory.append(turn(2, 'a'));
        memory.append(turn(2, 'b'));
        memory.append(turn(2, 'c'));
        assert_eq!(tags(&memory), "abc");

        memory.append(turn(3, 'd'));
        assert_eq!(tags(&memory), "cd");
        assert_eq!(memory.total_tokens(), 5);
    }

    #[test]
    fn total_never_exceeds_budget_across_appends() {
        let mut memory = ConversationMemory::new(9);
        for (i, size) in [1, 4, 2, 5, 3, 3, 1, 4, 2].into_iter().enumerate() {
            memory.append(turn(size, char::from(b'a' + i as u8)));
            assert!(memory.total_tokens() <= memory.budget());
        }
    }

    #[test]
    fn oversized_turn_is_kept_alone() {
        let mut memory = ConversationMemory::new(4);
        memory.append(turn(1, 'a'));
        memory.append(turn(1, 'b'));
        memory.append(turn(10, 'c'));

        assert_eq!(tags(&memory), "c");
        assert_eq!(memory.total_tokens(), 10);

        memory.append(turn(1, 'd'));
        assert_eq!(tags(&memory), "d");
    }

    #[test]
    fn history_is_a_snapshot() {
        let mut memory = ConversationMemory::new(10);
        memory.append(turn(1, 'a'));
        let snapshot = memory.history();
        memory.append(turn(1, 'b'));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(memory.len(), 2);
    }

    #[test]
    fn reset_clears_everything() {
        let mut memory = ConversationMemory::new(10);
        memory.begin_pinned();
        memory.append(turn(3, 'a'));
        memory.reset();

        assert!(memory.is_empty());
        assert_eq!(memory.total_tokens(), 0);

        // Pin is gone too: old turns are evictable again.
        memory.append(turn(6, 'b'));
        memory.append(turn(6, 'c'));
        assert_eq!(tags(&memory), "c");
    }

    #[test]
    fn pinned_turns_survive_until_released() {
        let mut memory = ConversationMemory::new(4);
        memory.append(turn(2, 'a'));

        memory.begin_pinned();
        memory.append(turn(2, 'b'));
        memory.append(turn(2, 'c'));
        memory.append(turn(2, 'd'));

        // 'a' was evictable, the in-flight sequence is not.
        assert_eq!(tags(&memory), "bcd");
        assert_eq!(memory.total_tokens(), 6);

        memory.release_pinned();
        assert_eq!(tags(&memory), "cd");
        assert!(memory.total_tokens() <= memory.budget());
    }

    #[test]
    fn begin_pinned_drops_stale_pin() {
        let mut memory = ConversationMemory::new(4);
        memory.begin_pinned();
        memory.append(turn(2, 'a'));
        memory.append(turn(2, 'b'));

        memory.begin_pinned();
        memory.append(turn(2, 'c'));
        assert_eq!(tags(&memory), "bc");
    }

    #[test]
    fn release_keeps_newest_turn_even_if_oversized() {
        let mut memory = ConversationMemory::new(2);
        memory.begin_pinned();
        memory.append(turn(1, 'a'));
        memory.append(turn(5, 'b'));
        memory.release_pinned();

        assert_eq!(tags(&memory), "b");
    }
}
