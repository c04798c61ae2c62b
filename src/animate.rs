// Interpolation of saved keyframes into per-frame animation states.
//
// Control points are matched pairwise by stable identifier; a point present
// in only one bracketing keyframe fades in or out through its weight instead
// of popping. The spline itself is never interpolated in coefficient space:
// callers re-solve the TPS on the interpolated point set for every output
// frame, which is what keeps the surface passing through the moving points.

use crate::camera;
use crate::control_points::{ControlPoint, ControlPointId, ControlPointSet};
use crate::geometry::Axis;
use crate::keyframe::{ChannelState, SceneSnapshot, Timeline};
use crate::tps::{self, TpsConfig, TpsModel};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Points faded below this weight are dropped from the re-solve
const FADED_WEIGHT_EPS: f64 = 1e-9;

/// A fully interpolated snapshot for one output timestamp.
/// Transient; computed on demand and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationState {
    pub timestamp: f64,
    pub snapshot: SceneSnapshot,
}

/// Interpolate the timeline at the requested timestamp.
///
/// Stateless and side-effect-free: repeated calls with the same timestamp
/// return the same state. Timestamps outside the timeline's range clamp to
/// the nearest keyframe; a parameter of exactly 0 or 1 reproduces the
/// bracketing keyframe's state.
pub fn evaluate(timeline: &Timeline, timestamp: f64) -> Result<AnimationState> {
    let bracket = timeline.nearest_bracket(timestamp).ok_or(Error::EmptyTimeline)?;
    if bracket.is_degenerate() {
        return Ok(AnimationState {
            timestamp,
            snapshot: bracket.before.snapshot.clone(),
        });
    }

    let t = bracket.parameter(timestamp);
    let a = &bracket.before.snapshot;
    let b = &bracket.after.snapshot;
    if t == 0.0 {
        return Ok(AnimationState {
            timestamp,
            snapshot: a.clone(),
        });
    }
    if t == 1.0 {
        return Ok(AnimationState {
            timestamp,
            snapshot: b.clone(),
        });
    }

    let time_a = a.time_index as f64;
    let time_b = b.time_index as f64;
    let snapshot = SceneSnapshot {
        control_points: interpolate_control_points(&a.control_points, &b.control_points, t),
        camera: camera::interpolate(&a.camera, &b.camera, t),
        channels: interpolate_channels(&a.channels, &b.channels, t),
        time_index: (time_a + (time_b - time_a) * t).round() as usize,
        kept_side: a.kept_side,
    };
    Ok(AnimationState {
        timestamp,
        snapshot,
    })
}

/// Re-solve the clipping surface for an interpolated state.
///
/// Fully faded points are dropped first so a disappearing point releases
/// the surface instead of pinning it; partially faded points rely on the
/// configured regularization to soften their pull.
pub fn resolve_surface(
    state: &AnimationState,
    axis: Axis,
    config: &TpsConfig,
) -> Result<TpsModel> {
    let active = ControlPointSet {
        points: state
            .snapshot
            .control_points
            .iter()
            .filter(|cp| cp.weight > FADED_WEIGHT_EPS)
            .copied()
            .collect(),
    };
    tps::solve(&active, axis, config)
}

fn interpolate_control_points(
    a: &ControlPointSet,
    b: &ControlPointSet,
    t: f64,
) -> ControlPointSet {
    let b_by_id: HashMap<ControlPointId, &ControlPoint> =
        b.iter().map(|cp| (cp.id, cp)).collect();

    let mut points = Vec::with_capacity(a.len().max(b.len()));
    for cp in a.iter() {
        match b_by_id.get(&cp.id) {
            Some(other) => points.push(ControlPoint {
                id: cp.id,
                position: cp.position + (other.position - cp.position) * t,
                weight: cp.weight + (other.weight - cp.weight) * t,
            }),
            // Present only before the bracket: fade out in place.
            None => points.push(ControlPoint {
                id: cp.id,
                position: cp.position,
                weight: cp.weight * (1.0 - t),
            }),
        }
    }
    // Present only after the bracket: fade in at its destination.
    for cp in b.iter() {
        if a.get(cp.id).is_none() {
            points.push(ControlPoint {
                id: cp.id,
                position: cp.position,
                weight: cp.weight * t,
            });
        }
    }
    ControlPointSet { points }
}

fn interpolate_channels(a: &[ChannelState], b: &[ChannelState], t: f64) -> Vec<ChannelState> {
    let nearer = |ca: &ChannelState, cb: &ChannelState| {
        if t < 0.5 {
            ca.visible
        } else {
            cb.visible
        }
    };
    let mut channels: Vec<ChannelState> = a
        .iter()
        .zip(b.iter())
        .map(|(ca, cb)| ChannelState {
            visible: nearer(ca, cb),
            opacity: ca.opacity + (cb.opacity - ca.opacity) * t,
        })
        .collect();
    // Channel counts can differ when a volume gains channels mid-series;
    // the longer list supplies the extras unchanged.
    let longer = if a.len() > b.len() { a } else { b };
    channels.extend(longer.iter().skip(channels.len()).cloned());
    channels
}

/// Evenly spaced output timestamps for an animation export.
///
/// Frames are yielded in strict timestamp order so the external encoder
/// receives a correctly ordered sequence; frame `i + 1` never depends on
/// frame `i`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePlan {
    start: f64,
    end: f64,
    frames_per_unit: f64,
}

impl FramePlan {
    pub fn new(start: f64, end: f64, frames_per_unit: f64) -> Result<Self> {
        if !start.is_finite() {
            return Err(Error::InvalidTimestamp(start));
        }
        if !end.is_finite() || end < start {
            return Err(Error::InvalidTimestamp(end));
        }
        if !(frames_per_unit > 0.0) || !frames_per_unit.is_finite() {
            return Err(Error::InvalidFrameRate(frames_per_unit));
        }
        Ok(Self {
            start,
            end,
            frames_per_unit,
        })
    }

    pub fn frame_count(&self) -> usize {
        ((self.end - self.start) * self.frames_per_unit).floor() as usize + 1
    }

    /// Frame indices and their timestamps in ascending order
    pub fn timestamps(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        (0..self.frame_count()).map(move |i| (i, self.start + i as f64 / self.frames_per_unit))
    }
}

/// Evaluate every frame of a plan in timestamp order
pub fn evaluate_plan<'a>(
    timeline: &'a Timeline,
    plan: FramePlan,
) -> impl Iterator<Item = Result<AnimationState>> + 'a {
    plan.timestamps()
        .collect::<Vec<_>>()
        .into_iter()
        .map(move |(_, ts)| evaluate(timeline, ts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_points::ControlPointStore;
    use crate::geometry::Point3D;

    fn snapshot_with_points(offset: f64) -> SceneSnapshot {
        // Matching stable ids across keyframes: 0, 1, 2.
        let base = [
            (0.0, 0.0, 0.0),
            (10.0, 0.0, 0.0),
            (0.0, 10.0, 0.0),
        ];
        let mut store = ControlPointStore::new();
        for &(x, y, z) in &base {
            store.add_point(Point3D::new(x + offset, y, z), None);
        }
        SceneSnapshot {
            control_points: store.list_points(),
            time_index: 0,
            ..SceneSnapshot::default()
        }
    }

    fn translated_timeline() -> Timeline {
        let mut tl = Timeline::new();
        tl.save(0.0, snapshot_with_points(0.0)).unwrap();
        tl.save(10.0, snapshot_with_points(5.0)).unwrap();
        tl
    }

    #[test]
    fn test_uniform_translation_interpolates_linearly() {
        let tl = translated_timeline();
        let state = evaluate(&tl, 5.0).unwrap();
        let expected = snapshot_with_points(2.5);
        for (cp, want) in state
            .snapshot
            .control_points
            .iter()
            .zip(expected.control_points.iter())
        {
            assert_eq!(cp.id, want.id);
            assert!((cp.position - want.position).norm() < 1e-12);
        }
    }

    #[test]
    fn test_endpoints_reproduce_keyframes_exactly() {
        let tl = translated_timeline();
        assert_eq!(
            evaluate(&tl, 0.0).unwrap().snapshot,
            tl.list()[0].snapshot
        );
        assert_eq!(
            evaluate(&tl, 10.0).unwrap().snapshot,
            tl.list()[1].snapshot
        );
        // Clamped outside the range too.
        assert_eq!(
            evaluate(&tl, -5.0).unwrap().snapshot,
            tl.list()[0].snapshot
        );
        assert_eq!(
            evaluate(&tl, 99.0).unwrap().snapshot,
            tl.list()[1].snapshot
        );
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let tl = translated_timeline();
        let a = evaluate(&tl, 3.7).unwrap();
        let b = evaluate(&tl, 3.7).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_timeline_errors() {
        let tl = Timeline::new();
        assert!(matches!(
            evaluate(&tl, 0.0).unwrap_err(),
            Error::EmptyTimeline
        ));
    }

    #[test]
    fn test_unmatched_points_fade_by_weight() {
        let mut before = snapshot_with_points(0.0);
        let mut after = before.clone();
        // A point only in the earlier keyframe, and one only in the later.
        before.control_points.points.push(ControlPoint {
            id: ControlPointId(100),
            position: Point3D::new(5.0, 5.0, 5.0),
            weight: 1.0,
        });
        after.control_points.points.push(ControlPoint {
            id: ControlPointId(200),
            position: Point3D::new(-5.0, -5.0, -5.0),
            weight: 2.0,
        });

        let mut tl = Timeline::new();
        tl.save(0.0, before).unwrap();
        tl.save(1.0, after).unwrap();

        let state = evaluate(&tl, 0.25).unwrap();
        let fading_out = state.snapshot.control_points.get(ControlPointId(100)).unwrap();
        assert!((fading_out.weight - 0.75).abs() < 1e-12);
        assert_eq!(fading_out.position, Point3D::new(5.0, 5.0, 5.0));

        let fading_in = state.snapshot.control_points.get(ControlPointId(200)).unwrap();
        assert!((fading_in.weight - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_resolve_surface_tracks_interpolated_points() {
        let tl = translated_timeline();
        let state = evaluate(&tl, 5.0).unwrap();
        let model = resolve_surface(&state, Axis::Z, &TpsConfig::default()).unwrap();
        for cp in state.snapshot.control_points.iter() {
            let (u, v) = Axis::Z.project(&cp.position);
            assert!((model.height(u, v) - cp.position.z).abs() < 1e-6);
        }
    }

    #[test]
    fn test_time_index_rounds_to_nearest() {
        let mut tl = Timeline::new();
        let mut a = snapshot_with_points(0.0);
        a.time_index = 0;
        let mut b = snapshot_with_points(5.0);
        b.time_index = 10;
        tl.save(0.0, a).unwrap();
        tl.save(1.0, b).unwrap();

        assert_eq!(evaluate(&tl, 0.26).unwrap().snapshot.time_index, 3);
        assert_eq!(evaluate(&tl, 0.75).unwrap().snapshot.time_index, 8);
    }

    #[test]
    fn test_frame_plan_is_ordered_and_inclusive() {
        let plan = FramePlan::new(2.0, 4.0, 2.0).unwrap();
        let stamps: Vec<(usize, f64)> = plan.timestamps().collect();
        assert_eq!(stamps.len(), 5);
        assert_eq!(stamps[0], (0, 2.0));
        assert!((stamps[4].1 - 4.0).abs() < 1e-12);
        assert!(stamps.windows(2).all(|w| w[0].1 < w[1].1));
    }

    #[test]
    fn test_frame_plan_validation() {
        assert!(matches!(
            FramePlan::new(0.0, -1.0, 30.0).unwrap_err(),
            Error::InvalidTimestamp(_)
        ));
        assert!(matches!(
            FramePlan::new(0.0, 1.0, 0.0).unwrap_err(),
            Error::InvalidFrameRate(_)
        ));
    }

    #[test]
    fn test_evaluate_plan_yields_every_frame() {
        let tl = translated_timeline();
        let plan = FramePlan::new(0.0, 10.0, 1.0).unwrap();
        let states: Vec<AnimationState> = evaluate_plan(&tl, plan)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(states.len(), 11);
        // Strictly increasing timestamps, one state per frame.
        assert!(states.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }
}
