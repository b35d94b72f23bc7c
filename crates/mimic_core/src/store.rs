//! # Entity Store
//!
//! One independently synchronized entity per decoded message shape.
//! The listener writes through [`EntityStore::apply`]; the frame loop
//! reads through the `take_*` and `drain_*` accessors.

use std::collections::HashMap;
use std::sync::Arc;

use mimic_protocol::{DebugFrame, DecodedMessage, Mat4x4, MessageKind, ModelPoints, Point3, Ray};

use crate::sync::{ChangedSlot, DoubleBuffer, DrainMap};

/// What [`EntityStore::apply`] did with a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    /// Model points replaced; number of points.
    ModelPoints(usize),
    /// Camera pose upserted for this camera id.
    CameraPose(u8),
    /// Ray batch published; number of rays.
    Rays(usize),
    /// Debug frame upserted for this spotter id.
    DebugFrame(u8),
    /// Intersections replaced; number of points.
    Intersections(usize),
    /// Message kind that carries no entity state.
    Ignored(MessageKind),
}

impl Applied {
    /// True if an entity was written.
    #[must_use]
    pub const fn is_stored(&self) -> bool {
        !matches!(self, Self::Ignored(_))
    }
}

/// Latest state of every tracked entity.
///
/// Each entity has its own lock; updates to distinct entities never
/// contend with each other.
#[derive(Debug, Default)]
pub struct EntityStore {
    model_points: ChangedSlot<ModelPoints>,
    cameras: DrainMap<u8, Mat4x4>,
    rays: DoubleBuffer<Ray>,
    frames: DrainMap<u8, DebugFrame>,
    intersections: ChangedSlot<Vec<Point3>>,
}

impl EntityStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes a decoded message to its entity.
    pub fn apply(&self, message: DecodedMessage) -> Applied {
        match message {
            DecodedMessage::ModelPoints(points) => {
                let count = points.len();
                self.model_points.publish(points);
                Applied::ModelPoints(count)
            }
            DecodedMessage::CameraPose { camera_id, pose } => {
                self.cameras.upsert(camera_id, pose);
                Applied::CameraPose(camera_id)
            }
            DecodedMessage::Rays(rays) => {
                let count = rays.len();
                self.rays.publish(rays);
                Applied::Rays(count)
            }
            DecodedMessage::DebugFrame { spotter_id, frame } => {
                self.frames.upsert(spotter_id, frame);
                Applied::DebugFrame(spotter_id)
            }
            DecodedMessage::Intersections(points) => {
                let count = points.len();
                self.intersections.publish(points);
                Applied::Intersections(count)
            }
            other @ (DecodedMessage::HelloRequest { .. }
            | DecodedMessage::HelloReply { .. }
            | DecodedMessage::Command { .. }) => Applied::Ignored(other.kind()),
        }
    }

    /// Model points if they changed since the last take.
    pub fn take_model_points(&self) -> Option<ModelPoints> {
        self.model_points.take_if_changed()
    }

    /// Ray batch snapshot if it changed since the last take.
    pub fn take_rays_if_changed(&self) -> Option<Arc<Vec<Ray>>> {
        self.rays.take_if_changed()
    }

    /// Intersections if they changed since the last take.
    pub fn take_intersections_if_changed(&self) -> Option<Vec<Point3>> {
        self.intersections.take_if_changed()
    }

    /// Removes and returns the pending frame of `spotter_id`.
    pub fn take_debug_frame(&self, spotter_id: u8) -> Option<DebugFrame> {
        self.frames.take(&spotter_id)
    }

    /// Removes and returns every pending debug frame.
    pub fn drain_debug_frames(&self) -> HashMap<u8, DebugFrame> {
        self.frames.drain()
    }

    /// Removes and returns every pending camera pose.
    pub fn drain_cameras(&self) -> HashMap<u8, Mat4x4> {
        self.cameras.drain()
    }

    /// Current ray batch without consuming the changed flag.
    #[must_use]
    pub fn rays(&self) -> Arc<Vec<Ray>> {
        self.rays.front()
    }

    /// Underlying ray double buffer.
    #[must_use]
    pub fn ray_buffer(&self) -> &DoubleBuffer<Ray> {
        &self.rays
    }
}
