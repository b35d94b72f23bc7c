//! # MIMIC Core - The Entity Store
//!
//! Holds the latest decoded state of every tracked entity and hands it to
//! a per-frame consumer without blocking or tearing.
//!
//! ## Buffering Policies
//!
//! | Entity        | Writer                | Reader                     |
//! |---------------|-----------------------|----------------------------|
//! | ModelPoints   | replace whole         | move out, clear flag       |
//! | CameraPoses   | upsert by camera id   | drain everything           |
//! | Rays          | fill back, swap front | snapshot front, clear flag |
//! | DebugFrames   | upsert by spotter id  | take by spotter id         |
//! | Intersections | replace whole         | move out, clear flag       |
//!
//! ## Example
//!
//! ```rust
//! use mimic_core::EntityStore;
//! use mimic_protocol::{decode, encode_intersections, Point3};
//!
//! let store = EntityStore::new();
//! let frame = encode_intersections(&[Point3::new(1.0, 2.0, 3.0)]).unwrap();
//! store.apply(decode(&frame).unwrap());
//!
//! assert_eq!(store.take_intersections_if_changed().unwrap().len(), 1);
//! assert!(store.take_intersections_if_changed().is_none());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod store;
pub mod sync;

pub use store::{Applied, EntityStore};
pub use sync::{ChangedSlot, DoubleBuffer, DrainMap};
