//! Monotonic id allocation for channels and shared pool entries

use crate::types::Id;

/// Hands out unique, non-zero ids
///
/// Ids read back from disk are kept as-is through [`IdManager::generate`],
/// which also advances the counter so fresh ids never collide with them.
#[derive(Debug, Default, Clone)]
pub struct IdManager {
    last: Id,
}

impl IdManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `id` unchanged when it is already valid, otherwise a fresh one
    pub fn generate(&mut self, id: Id) -> Id {
        if id != 0 {
            self.set(id);
            return id;
        }
        self.last += 1;
        self.last
    }

    /// Make sure future ids are greater than `id`
    pub fn set(&mut self, id: Id) {
        self.last = self.last.max(id);
    }

    pub fn last(&self) -> Id {
        self.last
    }

    pub fn reset(&mut self) {
        self.last = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_fresh_ids() {
        let mut ids = IdManager::new();
        assert_eq!(ids.generate(0), 1);
        assert_eq!(ids.generate(0), 2);
    }

    #[test]
    fn test_loaded_ids_advance_counter() {
        let mut ids = IdManager::new();
        assert_eq!(ids.generate(10), 10);
        assert_eq!(ids.generate(0), 11);

        ids.set(3);
        assert_eq!(ids.last(), 11);
    }
}
