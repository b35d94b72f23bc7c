//! # Per-Entity Synchronization Primitives
//!
//! ## The Problem
//!
//! ```text
//! Listener thread:  WRITE decoded entities
//! Frame loop:       READ the latest entity state
//!
//! One lock for everything:   rays wait on camera poses
//! No lock:                   torn snapshots
//! ```
//!
//! ## The Solution
//!
//! Every entity owns its own lock, and the data write and the changed
//! flag flip happen in the same critical section. Ray batches are double
//! buffered so a reader's snapshot is frozen at swap time.

mod double_buffer;
mod drain_map;
mod slot;

pub use double_buffer::DoubleBuffer;
pub use drain_map::DrainMap;
pub use slot::ChangedSlot;
