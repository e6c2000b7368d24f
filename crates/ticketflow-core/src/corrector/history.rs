/// Rollback stack of previous SQL texts, newest last.
#[derive(Debug, Clone)]
pub struct SqlHistory {
    entries: Vec<String>,
    capacity: usize,
}

impl Default for SqlHistory {
    fn default() -> Self {
        Self::new(20)
    }
}

impl SqlHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Pushes the text that is about to be replaced. The oldest entry is
    /// dropped once the stack is full.
    pub fn record(&mut self, previous: String) {
        if self.entries.len() == self.capacity {
            self.entries.remove(0);
        }
        self.entries.push(previous);
    }

    pub fn undo(&mut self) -> Option<String> {
        self.entries.pop()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_drops_oldest() {
        let mut h = SqlHistory::new(2);
        h.record("a".into());
        h.record("b".into());
        h.record("c".into());
        assert_eq!(h.len(), 2);
        assert_eq!(h.undo().as_deref(), Some("c"));
        assert_eq!(h.undo().as_deref(), Some("b"));
        assert_eq!(h.undo(), None);
        assert!(h.is_empty());
    }
}
