//! Replace-whole slot with a changed flag.

use parking_lot::Mutex;

struct SlotState<T> {
    value: Option<T>,
    changed: bool,
    generation: u64,
}

/// Holds the latest published value until a reader moves it out.
///
/// Publishing twice before a read keeps only the second value.
pub struct ChangedSlot<T> {
    state: Mutex<SlotState<T>>,
}

impl<T> ChangedSlot<T> {
    /// Creates an empty slot.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                value: None,
                changed: false,
                generation: 0,
            }),
        }
    }

    /// Replaces the stored value and raises the changed flag.
    pub fn publish(&self, value: T) {
        let mut state = self.state.lock();
        state.value = Some(value);
        state.changed = true;
        state.generation += 1;
    }

    /// Moves the value out if it changed since the last take.
    ///
    /// Never waits for new data.
    pub fn take_if_changed(&self) -> Option<T> {
        let mut state = self.state.lock();
        if !state.changed {
            return None;
        }
        state.changed = false;
        state.value.take()
    }

    /// Whether a value is pending.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.state.lock().changed
    }

    /// Number of publishes so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }
}

impl<T> Default for ChangedSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for ChangedSlot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ChangedSlot")
            .field("changed", &state.changed)
            .field("generation", &state.generation)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_once_per_publish() {
        let slot = ChangedSlot::new();
        assert!(slot.take_if_changed().is_none());

        slot.publish(vec![1, 2, 3]);
        assert!(slot.is_changed());
        assert_eq!(slot.take_if_changed(), Some(vec![1, 2, 3]));
        assert!(slot.take_if_changed().is_none());
        assert!(!slot.is_changed());
    }

    #[test]
    fn test_last_write_wins() {
        let slot = ChangedSlot::new();
        slot.publish("first");
        slot.publish("second");

        assert_eq!(slot.generation(), 2);
        assert_eq!(slot.take_if_changed(), Some("second"));
        assert!(slot.take_if_changed().is_none());
    }
}
