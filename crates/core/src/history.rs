//! Snapshot-based undo/redo

/// Maximum number of snapshots kept, including the current one.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Clone, Debug)]
pub struct UndoHistory<T: Clone> {
    stack: Vec<T>,
    cursor: usize,
    limit: usize,
}

impl<T: Clone> UndoHistory<T> {
    pub fn new(initial: T) -> Self {
        Self::with_limit(initial, DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_limit(initial: T, limit: usize) -> Self {
        Self {
            stack: vec![initial],
            cursor: 0,
            limit: limit.max(1),
        }
    }

    /// Record a new current state, dropping anything that could be redone
    pub fn push_snapshot(&mut self, value: T) {
        if self.cursor + 1 < self.stack.len() {
            self.stack.truncate(self.cursor + 1);
        }
        self.stack.push(value);
        if self.stack.len() > self.limit {
            let excess = self.stack.len() - self.limit;
            self.stack.drain(..excess);
        }
        self.cursor = self.stack.len().saturating_sub(1);
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.stack.len()
    }

    pub fn undo(&mut self) -> Option<T> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        Some(self.stack[self.cursor].clone())
    }

    pub fn redo(&mut self) -> Option<T> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        Some(self.stack[self.cursor].clone())
    }

    pub fn current(&self) -> &T {
        &self.stack[self.cursor]
    }

    pub fn clear_with(&mut self, value: T) {
        self.stack.clear();
        self.stack.push(value);
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::UndoHistory;

    #[test]
    fn undo_redo_flow() {
        let mut history = UndoHistory::new(vec![1]);
        history.push_snapshot(vec![1, 2]);
        history.push_snapshot(vec![1, 2, 3]);

        assert_eq!(history.undo(), Some(vec![1, 2]));
        assert_eq!(history.undo(), Some(vec![1]));
        assert_eq!(history.undo(), None);

        assert_eq!(history.redo(), Some(vec![1, 2]));
        history.push_snapshot(vec![9]);
        assert_eq!(history.redo(), None);
        assert_eq!(history.current(), &vec![9]);
    }

    #[test]
    fn limit_drops_oldest_entries() {
        let mut history = UndoHistory::with_limit(0, 3);
        for value in 1..=5 {
            history.push_snapshot(value);
        }

        assert_eq!(history.undo(), Some(4));
        assert_eq!(history.undo(), Some(3));
        assert_eq!(history.undo(), None);
    }

    #[test]
    fn clear_with_resets_both_directions() {
        let mut history = UndoHistory::new("a");
        history.push_snapshot("b");
        history.clear_with("c");
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }
}
