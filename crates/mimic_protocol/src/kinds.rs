//! # Message and Command Kinds
//!
//! Closed sets shared with the tracker. Both are transmitted as `u32`
//! ordinals; the order of the variants IS the wire format.

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Kind of an inbound or outbound message, first field of every header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MessageKind {
    /// Unset. Never valid on the wire.
    None = 0,
    /// Spotter -> tracker: registration request.
    HelloReq = 1,
    /// Tracker -> spotter: registration reply with the assigned id.
    HelloRep = 2,
    /// Tracked model points.
    Payload = 3,
    /// Control command, see [`CommandKind`].
    Command = 4,
    /// Pose of one spotter camera.
    DebugCameraPose = 5,
    /// Batch of rays cast from all spotters.
    DebugRays = 6,
    /// Raw frame from one spotter.
    DebugFrame = 7,
    /// Triangulated ray intersections.
    DebugIntersections = 8,
}

impl MessageKind {
    /// All kinds in ordinal order.
    pub const ALL: [Self; 9] = [
        Self::None,
        Self::HelloReq,
        Self::HelloRep,
        Self::Payload,
        Self::Command,
        Self::DebugCameraPose,
        Self::DebugRays,
        Self::DebugFrame,
        Self::DebugIntersections,
    ];

    /// Maps a wire ordinal to a kind.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnknownMessageKind`] for ordinals outside the set.
    pub fn from_u32(value: u32) -> Result<Self, DecodeError> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(DecodeError::UnknownMessageKind(value))
    }

    /// Wire ordinal.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    /// Size of one record for kinds whose payload is a flat record array.
    #[must_use]
    pub const fn record_stride(self) -> Option<usize> {
        match self {
            Self::Payload | Self::DebugIntersections => Some(crate::Point3::SIZE),
            Self::DebugRays => Some(crate::Ray::SIZE),
            _ => None,
        }
    }
}

/// Command sent from the client to the tracker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum CommandKind {
    /// Unset.
    None = 0,
    /// Ask the spotters for a single frame.
    GrabFrame = 1,
    /// Run camera pose estimation.
    EstimatePose = 2,
    /// Spotters send grayscale debug frames.
    SendGrayscale = 3,
    /// Spotters send binarized debug frames.
    SendBinarized = 4,
    /// Tracker dumps the current rays to disk.
    SaveRaysToFile = 5,
    /// Spotters dump their frames to disk.
    SaveFramesToFile = 6,
    /// Match the tracked points against the model.
    MatchModel = 7,
    /// Set the binarization threshold; payload is one byte.
    BinarizationThreshold = 8,
    /// Spotters stop sending debug frames.
    NoFrames = 9,
    /// Shut the whole tracking system down.
    StopSystem = 10,
    /// Tracker starts sending debug messages.
    StartDebugging = 11,
    /// Tracker stops sending debug messages.
    StopDebugging = 12,
}

impl CommandKind {
    /// All kinds in ordinal order.
    pub const ALL: [Self; 13] = [
        Self::None,
        Self::GrabFrame,
        Self::EstimatePose,
        Self::SendGrayscale,
        Self::SendBinarized,
        Self::SaveRaysToFile,
        Self::SaveFramesToFile,
        Self::MatchModel,
        Self::BinarizationThreshold,
        Self::NoFrames,
        Self::StopSystem,
        Self::StartDebugging,
        Self::StopDebugging,
    ];

    /// Maps a wire ordinal to a command kind.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnknownCommandKind`] for ordinals outside the set.
    pub fn from_u32(value: u32) -> Result<Self, DecodeError> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(DecodeError::UnknownCommandKind(value))
    }

    /// Wire ordinal.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    /// Snake-case name, as accepted by [`str::parse`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::GrabFrame => "grab_frame",
            Self::EstimatePose => "estimate_pose",
            Self::SendGrayscale => "send_grayscale",
            Self::SendBinarized => "send_binarized",
            Self::SaveRaysToFile => "save_rays_to_file",
            Self::SaveFramesToFile => "save_frames_to_file",
            Self::MatchModel => "match_model",
            Self::BinarizationThreshold => "binarization_threshold",
            Self::NoFrames => "no_frames",
            Self::StopSystem => "stop_system",
            Self::StartDebugging => "start_debugging",
            Self::StopDebugging => "stop_debugging",
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for CommandKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown command: {s}"))
    }
}
