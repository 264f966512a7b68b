//! Opt-in read-back of the aerial-perspective volume for debug overlays.
//!
//! The pipeline publishes a snapshot of the first slice after each compute
//! on a bounded channel. Publishing never blocks: when the consumer falls
//! behind, snapshots are dropped.

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use glam::Vec3;
use tracing::trace;

use crate::lut::Texel;

/// First aerial-perspective slice of one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct ReadbackSnapshot {
    /// Index of the `compute` call that produced the snapshot.
    pub frame: u64,
    pub camera_position: Vec3,
    /// Froxel grid width and height.
    pub width: u32,
    pub height: u32,
    /// Distance covered by the first slice.
    pub slice_distance: f32,
    /// World-space direction through each froxel, row-major.
    pub directions: Vec<Vec3>,
    /// First-slice texels, row-major.
    pub texels: Vec<Texel>,
}

/// Producer half, owned by the pipeline.
#[derive(Clone, Debug)]
pub struct ReadbackSender {
    sender: Sender<ReadbackSnapshot>,
}

/// Consumer half, handed to the host.
#[derive(Clone, Debug)]
pub struct ReadbackReceiver {
    receiver: Receiver<ReadbackSnapshot>,
}

/// Create a read-back channel holding at most `capacity` snapshots.
pub fn readback_channel(capacity: usize) -> (ReadbackSender, ReadbackReceiver) {
    let (sender, receiver) = bounded(capacity.max(1));
    (ReadbackSender { sender }, ReadbackReceiver { receiver })
}

impl ReadbackSender {
    /// Offer a snapshot without blocking. Returns whether it was queued.
    pub fn publish(&self, snapshot: ReadbackSnapshot) -> bool {
        match self.sender.try_send(snapshot) {
            Ok(()) => true,
            Err(TrySendError::Full(snapshot)) => {
                trace!(frame = snapshot.frame, "Read-back queue full, snapshot dropped");
                false
            }
            Err(TrySendError::Disconnected(snapshot)) => {
                trace!(frame = snapshot.frame, "Read-back consumer gone, snapshot dropped");
                false
            }
        }
    }
}

impl ReadbackReceiver {
    /// Next queued snapshot, if any.
    pub fn try_recv(&self) -> Option<ReadbackSnapshot> {
        self.receiver.try_recv().ok()
    }

    /// Drain every queued snapshot, oldest first.
    pub fn drain(&self) -> Vec<ReadbackSnapshot> {
        self.receiver.try_iter().collect()
    }
}

/// Line segment for a debug overlay.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DebugLine {
    pub start: Vec3,
    pub end: Vec3,
    pub color: [f32; 4],
}

/// One line per froxel from the camera to the end of the first slice,
/// colored by its in-scatter with the transmittance in alpha.
pub fn debug_lines(snapshot: &ReadbackSnapshot) -> Vec<DebugLine> {
    snapshot
        .directions
        .iter()
        .zip(&snapshot.texels)
        .map(|(direction, texel)| DebugLine {
            start: snapshot.camera_position,
            end: snapshot.camera_position + *direction * snapshot.slice_distance,
            color: *texel,
        })
        .collect()
}
