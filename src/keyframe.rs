// Keyframe snapshots and the animation timeline.
//
// The timeline stores immutable snapshots ordered by timestamp and exposes
// ordered access only; interpolation between keyframes lives in `animate`.

use crate::camera::CameraPose;
use crate::control_points::ControlPointSet;
use crate::geometry::KeptSide;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Stable identifier for a keyframe; survives in-place replacement
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct KeyframeId(pub u64);

/// Per-channel display state saved with each keyframe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelState {
    pub visible: bool,
    pub opacity: f64,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            visible: true,
            opacity: 1.0,
        }
    }
}

/// Everything a keyframe captures besides its identity and timestamp.
/// Also the shape of an interpolated animation state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub control_points: ControlPointSet,
    pub camera: CameraPose,
    pub channels: Vec<ChannelState>,
    /// Index into the volume time series
    pub time_index: usize,
    pub kept_side: KeptSide,
}

/// An immutable saved state tagged with a user-chosen timestamp.
/// Edits produce a replacement keyframe under the same identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub id: KeyframeId,
    pub timestamp: f64,
    pub snapshot: SceneSnapshot,
}

/// The two keyframes bracketing a query timestamp. Queries outside the
/// timeline's range, or exactly on a keyframe, yield a degenerate
/// zero-width bracket (clamped, never extrapolated).
#[derive(Debug, Clone, Copy)]
pub struct Bracket<'a> {
    pub before: &'a Keyframe,
    pub after: &'a Keyframe,
}

impl Bracket<'_> {
    pub fn is_degenerate(&self) -> bool {
        self.before.id == self.after.id
    }

    /// Fractional position of `timestamp` within the bracket, clamped to [0, 1]
    pub fn parameter(&self, timestamp: f64) -> f64 {
        let span = self.after.timestamp - self.before.timestamp;
        if span <= 0.0 {
            0.0
        } else {
            ((timestamp - self.before.timestamp) / span).clamp(0.0, 1.0)
        }
    }
}

/// Ordered sequence of keyframes. One keyframe supports static viewing;
/// animation needs at least two.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timeline {
    frames: Vec<Keyframe>,
    next_id: u64,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn can_animate(&self) -> bool {
        self.frames.len() >= 2
    }

    /// Keyframes ordered by timestamp
    pub fn list(&self) -> &[Keyframe] {
        &self.frames
    }

    pub fn get(&self, id: KeyframeId) -> Option<&Keyframe> {
        self.frames.iter().find(|k| k.id == id)
    }

    /// Save a snapshot at the given timestamp. Duplicate timestamps are
    /// rejected and leave the timeline unchanged.
    pub fn save(&mut self, timestamp: f64, snapshot: SceneSnapshot) -> Result<KeyframeId> {
        self.check_timestamp(timestamp, None)?;
        let id = KeyframeId(self.next_id);
        self.next_id += 1;
        let at = self
            .frames
            .partition_point(|k| k.timestamp < timestamp);
        self.frames.insert(
            at,
            Keyframe {
                id,
                timestamp,
                snapshot,
            },
        );
        log::debug!("Saved keyframe {:?} at timestamp {}.", id, timestamp);
        Ok(id)
    }

    /// Replace an existing keyframe's timestamp and snapshot, keeping its
    /// identifier.
    pub fn replace(
        &mut self,
        id: KeyframeId,
        timestamp: f64,
        snapshot: SceneSnapshot,
    ) -> Result<()> {
        self.check_timestamp(timestamp, Some(id))?;
        let i = self.position(id)?;
        self.frames.remove(i);
        let at = self
            .frames
            .partition_point(|k| k.timestamp < timestamp);
        self.frames.insert(
            at,
            Keyframe {
                id,
                timestamp,
                snapshot,
            },
        );
        Ok(())
    }

    pub fn remove(&mut self, id: KeyframeId) -> Result<Keyframe> {
        let i = self.position(id)?;
        Ok(self.frames.remove(i))
    }

    /// The two keyframes bracketing the query timestamp, clamped to the
    /// timeline's range. A query exactly on a keyframe returns that keyframe
    /// as both endpoints. None only when the timeline is empty.
    pub fn nearest_bracket(&self, timestamp: f64) -> Option<Bracket<'_>> {
        let first = self.frames.first()?;
        let last = self.frames.last()?;
        if timestamp <= first.timestamp {
            return Some(Bracket {
                before: first,
                after: first,
            });
        }
        if timestamp >= last.timestamp {
            return Some(Bracket {
                before: last,
                after: last,
            });
        }
        let at = self
            .frames
            .partition_point(|k| k.timestamp < timestamp);
        let after = &self.frames[at];
        if after.timestamp == timestamp {
            return Some(Bracket {
                before: after,
                after,
            });
        }
        Some(Bracket {
            before: &self.frames[at - 1],
            after,
        })
    }

    fn check_timestamp(&self, timestamp: f64, ignore: Option<KeyframeId>) -> Result<()> {
        if !timestamp.is_finite() {
            return Err(Error::InvalidTimestamp(timestamp));
        }
        let taken = self
            .frames
            .iter()
            .any(|k| k.timestamp == timestamp && Some(k.id) != ignore);
        if taken {
            return Err(Error::DuplicateTimestamp(timestamp));
        }
        Ok(())
    }

    fn position(&self, id: KeyframeId) -> Result<usize> {
        self.frames
            .iter()
            .position(|k| k.id == id)
            .ok_or(Error::InvalidReference {
                kind: "keyframe",
                id: id.0,
            })
    }
}
