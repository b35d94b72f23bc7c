//! # Double-Buffered Batches
//!
//! Tear-free hand-off of variable-length batches from one writer to any
//! number of readers.
//!
//! ## Architecture
//!
//! ```text
//!                    ┌─────────────────────────────┐
//!                    │        DoubleBuffer         │
//!                    │                             │
//!                    │  ┌─────────┐  ┌─────────┐   │
//!                    │  │ Slot A  │  │ Slot B  │   │
//!                    │  └────┬────┘  └────┬────┘   │
//!                    │       │            │        │
//!                    │  ┌────┴────────────┴────┐   │
//!                    │  │   Front Index (0/1)  │   │
//!                    │  └──────────────────────┘   │
//!                    └─────────────────────────────┘
//!                              │
//!              ┌───────────────┴───────────────┐
//!              ▼                               ▼
//!      ┌──────────────┐                ┌──────────────┐
//!      │   publish    │                │ take/front   │
//!      │  (Listener)  │                │ (Frame loop) │
//!      └──────────────┘                └──────────────┘
//! ```
//!
//! ## Protocol
//!
//! 1. Writer takes the back slot out under the lock
//! 2. Writer fills it with the lock released
//! 3. Writer stores it back and flips the front index under the lock
//!
//! Readers get an `Arc` of the front slot. A slot a reader still holds is
//! never refilled; the writer allocates a fresh one instead, so a
//! snapshot stays frozen at swap time.

use std::sync::Arc;

use parking_lot::Mutex;

struct Buffers<T> {
    slots: [Arc<Vec<T>>; 2],
    front: usize,
    changed: bool,
    generation: u64,
}

/// Two alternating buffers addressed by a front index.
pub struct DoubleBuffer<T> {
    buffers: Mutex<Buffers<T>>,
}

impl<T> DoubleBuffer<T> {
    /// Creates a double buffer with two empty slots.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffers: Mutex::new(Buffers {
                slots: [Arc::new(Vec::new()), Arc::new(Vec::new())],
                front: 0,
                changed: false,
                generation: 0,
            }),
        }
    }

    /// Publishes `batch` as the new front buffer.
    pub fn publish(&self, batch: Vec<T>) {
        self.swap_in(Arc::new(batch));
    }

    /// Fills the back buffer in place, then publishes it.
    ///
    /// The back buffer is cleared before `fill` runs. Its allocation is
    /// reused unless a reader still holds it.
    pub fn publish_with<F>(&self, fill: F)
    where
        F: FnOnce(&mut Vec<T>),
    {
        let back = {
            let mut buffers = self.buffers.lock();
            let back = buffers.front ^ 1;
            std::mem::take(&mut buffers.slots[back])
        };

        let mut batch = Arc::try_unwrap(back).unwrap_or_default();
        batch.clear();
        fill(&mut batch);

        self.swap_in(Arc::new(batch));
    }

    fn swap_in(&self, batch: Arc<Vec<T>>) {
        let mut buffers = self.buffers.lock();
        let back = buffers.front ^ 1;
        buffers.slots[back] = batch;
        buffers.front = back;
        buffers.changed = true;
        buffers.generation += 1;
    }

    /// Snapshot of the front buffer if it changed since the last take.
    pub fn take_if_changed(&self) -> Option<Arc<Vec<T>>> {
        let mut buffers = self.buffers.lock();
        if !buffers.changed {
            return None;
        }
        buffers.changed = false;
        Some(Arc::clone(&buffers.slots[buffers.front]))
    }

    /// Snapshot of the front buffer, leaving the changed flag alone.
    #[must_use]
    pub fn front(&self) -> Arc<Vec<T>> {
        let buffers = self.buffers.lock();
        Arc::clone(&buffers.slots[buffers.front])
    }

    /// Whether a batch is pending.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.buffers.lock().changed
    }

    /// Number of publishes so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.buffers.lock().generation
    }
}

impl<T> Default for DoubleBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for DoubleBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let buffers = self.buffers.lock();
        f.debug_struct("DoubleBuffer")
            .field("front", &buffers.front)
            .field("front_len", &buffers.slots[buffers.front].len())
            .field("changed", &buffers.changed)
            .field("generation", &buffers.generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_buffer_has_no_update() {
        let db: DoubleBuffer<u32> = DoubleBuffer::new();
        assert!(db.take_if_changed().is_none());
        assert!(db.front().is_empty());
        assert_eq!(db.generation(), 0);
    }

    #[test]
    fn test_take_once_per_publish() {
        let db = DoubleBuffer::new();
        db.publish(vec![1, 2, 3]);

        assert_eq!(*db.take_if_changed().unwrap(), vec![1, 2, 3]);
        assert!(db.take_if_changed().is_none());
        // Front stays readable after the take
        assert_eq!(*db.front(), vec![1, 2, 3]);
    }

    #[test]
    fn test_publish_with_alternates_slots() {
        let db = DoubleBuffer::new();
        db.publish_with(|batch| batch.extend([1, 2]));
        db.publish_with(|batch| batch.push(3));

        assert_eq!(db.generation(), 2);
        assert_eq!(*db.take_if_changed().unwrap(), vec![3]);
    }

    #[test]
    fn test_held_snapshot_is_frozen() {
        let db = DoubleBuffer::new();
        db.publish(vec![10, 20]);
        let held = db.take_if_changed().unwrap();

        // Two publishes cycle through both slots, including the one `held` came from
        db.publish_with(|batch| batch.push(30));
        db.publish_with(|batch| batch.push(40));

        assert_eq!(*held, vec![10, 20]);
        assert_eq!(*db.front(), vec![40]);
    }

    #[test]
    fn test_back_buffer_allocation_reused() {
        let db = DoubleBuffer::new();
        db.publish(Vec::with_capacity(64));
        db.publish(Vec::new());

        // Back slot now holds the 64-capacity vec and nobody references it
        db.publish_with(|batch| {
            assert!(batch.capacity() >= 64);
            batch.push(1u8);
        });
        assert_eq!(*db.front(), vec![1]);
    }
}
