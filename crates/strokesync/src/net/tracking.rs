use std::collections::VecDeque;

pub const DEFAULT_RECENT_WINDOW: usize = 10;

/// Upper bound accepted from configuration. `admit` is a linear scan.
pub const MAX_RECENT_WINDOW: usize = 4096;

/// Bounded FIFO of recently admitted stroke indices.
///
/// Re-seeing an index does not refresh its position. Once `capacity` newer
/// indices have been admitted the old one is forgotten and a retransmission
/// of it is admitted again.
#[derive(Debug, Clone)]
pub struct RecentIdWindow {
    ids: VecDeque<i32>,
    capacity: usize,
}

impl Default for RecentIdWindow {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_WINDOW)
    }
}

impl RecentIdWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            ids: VecDeque::with_capacity(capacity.min(MAX_RECENT_WINDOW).saturating_add(1)),
            capacity,
        }
    }

    pub fn admit(&mut self, index: i32) -> bool {
        if self.ids.contains(&index) {
            return false;
        }

        self.ids.push_back(index);
        while self.ids.len() > self.capacity {
            self.ids.pop_front();
        }
        true
    }

    pub fn contains(&self, index: i32) -> bool {
        self.ids.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.ids.iter().copied()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}
