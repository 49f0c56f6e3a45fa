use std::collections::VecDeque;

use crate::error::MonitorError;

/// Fixed-capacity sliding window. Appends at the tail and drops from the
/// head, so iteration order is always arrival order.
#[derive(Clone, Debug)]
pub struct WindowBuffer<T> {
    data: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> WindowBuffer<T> {
    pub fn with_capacity(capacity: usize) -> Result<Self, MonitorError> {
        if capacity == 0 {
            return Err(MonitorError::ZeroCapacity);
        }
        Ok(Self {
            data: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    pub fn push(&mut self, value: T) {
        if self.data.len() == self.capacity {
            self.data.pop_front();
        }
        self.data.push_back(value);
    }

    #[cfg(test)]
    pub fn extend(&mut self, values: impl IntoIterator<Item = T>) {
        for value in values {
            self.push(value);
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[cfg(test)]
    pub fn latest(&self) -> Option<&T> {
        self.data.back()
    }

    /// Owned copy of the current window, oldest first.
    pub fn snapshot(&self) -> Vec<T> {
        self.data.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}

/// Most-recent-first log with a fixed number of rows.
#[derive(Clone, Debug)]
pub struct RollingLog<T> {
    rows: VecDeque<T>,
    capacity: usize,
}

impl<T> RollingLog<T> {
    pub fn with_capacity(capacity: usize) -> Result<Self, MonitorError> {
        if capacity == 0 {
            return Err(MonitorError::ZeroCapacity);
        }
        Ok(Self {
            rows: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    pub fn record(&mut self, row: T) {
        self.rows.push_front(row);
        self.rows.truncate(self.capacity);
    }

    /// Newest row first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.rows.iter()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }
}
