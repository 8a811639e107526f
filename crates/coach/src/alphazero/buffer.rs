//! Bounded example containers
//!
//! `IterationBuffer` holds the examples generated in one iteration;
//! `HistoryWindow` keeps the most recent iterations for training.
//! Both are FIFO: on overflow the oldest entry is evicted first.

use std::collections::VecDeque;

use log::warn;
use serde::{Deserialize, Serialize};

use super::{Episode, TrainingExample};

/// Bounded FIFO of training examples, in generation order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IterationBuffer {
    /// Maximum number of examples to store
    capacity: usize,

    examples: VecDeque<TrainingExample>,
}

impl IterationBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "IterationBuffer capacity must be positive");
        Self {
            capacity,
            examples: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Add a single example, evicting the oldest one when full.
    /// Returns the evicted example, if any.
    pub fn append(&mut self, example: TrainingExample) -> Option<TrainingExample> {
        let evicted = if self.examples.len() == self.capacity {
            self.examples.pop_front()
        } else {
            None
        };
        self.examples.push_back(example);
        evicted
    }

    /// Append an episode's examples in order. Returns how many were evicted.
    pub fn append_episode(&mut self, episode: Episode) -> usize {
        episode
            .examples
            .into_iter()
            .filter_map(|ex| self.append(ex))
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrainingExample> {
        self.examples.iter()
    }
}

/// Bounded FIFO of iteration buffers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryWindow {
    /// Maximum number of iterations kept
    depth: usize,

    iterations: VecDeque<IterationBuffer>,

    /// Newest training iteration whose self-play has been added
    #[serde(default)]
    last_iteration: Option<usize>,
}

impl HistoryWindow {
    pub fn new(depth: usize) -> Self {
        assert!(depth > 0, "HistoryWindow depth must be positive");
        Self {
            depth,
            iterations: VecDeque::new(),
            last_iteration: None,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of iterations held
    pub fn len(&self) -> usize {
        self.iterations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iterations.is_empty()
    }

    /// Total examples across all iterations
    pub fn num_examples(&self) -> usize {
        self.iterations.iter().map(IterationBuffer::len).sum()
    }

    pub fn iterations(&self) -> impl Iterator<Item = &IterationBuffer> {
        self.iterations.iter()
    }

    /// Add a completed iteration. Call once per iteration, never mid-iteration.
    /// Returns the number of old iterations evicted to stay within `depth`.
    pub fn push_iteration(&mut self, iteration: IterationBuffer) -> usize {
        self.iterations.push_back(iteration);
        self.trim()
    }

    /// Add the self-play of training iteration `iteration` and remember it as
    /// committed. Returns the number of old iterations evicted.
    pub fn commit(&mut self, iteration: usize, buffer: IterationBuffer) -> usize {
        self.last_iteration = Some(iteration);
        self.push_iteration(buffer)
    }

    /// Newest committed training iteration, if any was recorded.
    pub fn last_iteration(&self) -> Option<usize> {
        self.last_iteration
    }

    /// Whether the self-play of `iteration` is already part of this history.
    pub fn is_committed(&self, iteration: usize) -> bool {
        self.last_iteration.is_some_and(|last| iteration <= last)
    }

    /// Evict the oldest iterations until at most `depth` remain.
    pub fn trim(&mut self) -> usize {
        let mut evicted = 0;
        while self.iterations.len() > self.depth {
            warn!(
                "Removing the oldest entry in training history (len = {})",
                self.iterations.len()
            );
            self.iterations.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Change the window depth (e.g. after loading a checkpoint written with a
    /// different configuration) and trim to it.
    pub fn set_depth(&mut self, depth: usize) -> usize {
        assert!(depth > 0, "HistoryWindow depth must be positive");
        self.depth = depth;
        self.trim()
    }

    /// All windowed examples, oldest iteration first. Callers must shuffle
    /// before training.
    pub fn flatten(&self) -> Vec<TrainingExample> {
        let mut out = Vec::with_capacity(self.num_examples());
        for iteration in &self.iterations {
            out.extend(iteration.iter().cloned());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Player;

    fn make_example(tag: u32) -> TrainingExample {
        TrainingExample {
            state_encoding: tag.to_le_bytes().to_vec(),
            recorded_player: Player::First,
            policy_target: vec![1.0],
            value_target: 0.0,
        }
    }

    fn tag(example: &TrainingExample) -> u32 {
        u32::from_le_bytes(example.state_encoding[..4].try_into().unwrap())
    }

    fn make_episode(range: std::ops::Range<u32>) -> Episode {
        Episode {
            examples: range.map(make_example).collect(),
            outcome: 1.0,
            terminal_player: Player::Second,
            turns: 0,
            truncated: false,
        }
    }

    fn buffer_with(tags: std::ops::Range<u32>, capacity: usize) -> IterationBuffer {
        let mut buffer = IterationBuffer::new(capacity);
        buffer.append_episode(make_episode(tags));
        buffer
    }

    #[test]
    fn test_buffer_append_and_len() {
        let mut buffer = IterationBuffer::new(3);
        assert!(buffer.is_empty());

        assert_eq!(buffer.append(make_example(1)), None);
        assert_eq!(buffer.append(make_example(2)), None);
        assert_eq!(buffer.append(make_example(3)), None);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_buffer_evicts_oldest() {
        let mut buffer = IterationBuffer::new(2);
        buffer.append(make_example(1));
        buffer.append(make_example(2));

        let evicted = buffer.append(make_example(3)).unwrap();
        assert_eq!(tag(&evicted), 1);
        assert_eq!(buffer.len(), 2);

        let tags: Vec<u32> = buffer.iter().map(tag).collect();
        assert_eq!(tags, vec![2, 3]);
    }

    #[test]
    fn test_buffer_keeps_last_hundred_of_two_episodes() {
        let mut buffer = IterationBuffer::new(100);
        assert_eq!(buffer.append_episode(make_episode(0..50)), 0);
        assert_eq!(buffer.append_episode(make_episode(50..110)), 10);

        assert_eq!(buffer.len(), 100);
        let tags: Vec<u32> = buffer.iter().map(tag).collect();
        // all 60 of the second episode plus the most recent 40 of the first
        assert_eq!(tags, (10..110).collect::<Vec<_>>());
    }

    #[test]
    fn test_history_evicts_oldest_iteration() {
        let mut history = HistoryWindow::new(2);
        assert_eq!(history.push_iteration(buffer_with(0..2, 10)), 0);
        assert_eq!(history.push_iteration(buffer_with(2..4, 10)), 0);
        assert_eq!(history.push_iteration(buffer_with(4..7, 10)), 1);

        assert_eq!(history.len(), 2);
        assert_eq!(history.num_examples(), 5);
        let tags: Vec<u32> = history.flatten().iter().map(tag).collect();
        assert_eq!(tags, vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_history_set_depth_trims() {
        let mut history = HistoryWindow::new(5);
        for i in 0..4 {
            history.push_iteration(buffer_with(i * 2..i * 2 + 2, 10));
        }
        assert_eq!(history.set_depth(1), 3);
        assert_eq!(history.len(), 1);
        let tags: Vec<u32> = history.flatten().iter().map(tag).collect();
        assert_eq!(tags, vec![6, 7]);
    }

    #[test]
    fn test_history_serde_preserves_order() {
        let mut history = HistoryWindow::new(3);
        history.push_iteration(buffer_with(0..3, 10));
        history.push_iteration(buffer_with(3..5, 2));

        let json = serde_json::to_string(&history).unwrap();
        let restored: HistoryWindow = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, history);
        assert_eq!(restored.iterations().nth(1).unwrap().capacity(), 2);
    }

    #[test]
    fn test_commit_records_last_iteration() {
        let mut history = HistoryWindow::new(1);
        assert!(!history.is_committed(1));

        history.commit(1, buffer_with(0..2, 10));
        history.commit(2, buffer_with(2..4, 10));
        assert_eq!(history.len(), 1);
        assert_eq!(history.last_iteration(), Some(2));
        assert!(history.is_committed(1));
        assert!(history.is_committed(2));
        assert!(!history.is_committed(3));

        let json = serde_json::to_string(&history).unwrap();
        let restored: HistoryWindow = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.last_iteration(), Some(2));

        // files written before the field existed load as uncommitted
        let legacy = r#"{"depth": 3, "iterations": []}"#;
        let restored: HistoryWindow = serde_json::from_str(legacy).unwrap();
        assert_eq!(restored.last_iteration(), None);
    }
}
