//! # Localisation module
//!
//! This module provides the robot's pose in the world frame. Raw odometry is
//! produced by whichever backend drives the robot (the simulation or the
//! network) and written into a [`PoseCell`]. The [`OdomFrame`] then maps that
//! raw odometry into the world frame, anchored by `setpose` commands.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::sync::{Arc, Mutex};
use nalgebra::{Isometry2, Vector2};
use serde::{Deserialize, Serialize};

// Internal
use comms_if::{eqpt::odom::OdomSample, tc::PoseSpec};
use util::maths::{ang_dist, wrap_pi};
use crate::robot_if::PoseSource;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The pose (position and heading) of the robot in a planar frame.
///
/// The heading is measured anticlockwise from the positive X axis and is
/// always kept in (-pi, pi].
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Pose {
    /// The position in meters
    pub position_m: Vector2<f64>,

    /// The heading in radians
    pub heading_rad: f64
}

/// Shared cell holding the most recent raw odometry pose.
///
/// Backends write into the cell from their own thread, the controller takes a
/// snapshot once per cycle. The last write wins.
#[derive(Debug, Clone, Default)]
pub struct PoseCell {
    pose: Arc<Mutex<Option<Pose>>>
}

/// Maps raw odometry into the world frame.
///
/// The anchor is the transform from the odometry frame into the world frame,
/// initially the identity.
#[derive(Debug, Copy, Clone)]
pub struct OdomFrame {
    anchor: Isometry2<f64>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    /// Create a new pose, wrapping the heading into (-pi, pi].
    pub fn new(x_m: f64, y_m: f64, heading_rad: f64) -> Self {
        Self {
            position_m: Vector2::new(x_m, y_m),
            heading_rad: wrap_pi(heading_rad)
        }
    }

    pub fn x(&self) -> f64 {
        self.position_m[0]
    }

    pub fn y(&self) -> f64 {
        self.position_m[1]
    }

    /// Build the isometry which takes points in the robot body frame into the
    /// frame this pose is expressed in.
    pub fn to_isometry(&self) -> Isometry2<f64> {
        Isometry2::new(self.position_m, self.heading_rad)
    }

    pub fn from_isometry(iso: &Isometry2<f64>) -> Self {
        Self::new(
            iso.translation.vector[0],
            iso.translation.vector[1],
            iso.rotation.angle()
        )
    }

    /// Straight line distance to another pose.
    pub fn distance_to(&self, other: &Pose) -> f64 {
        (other.position_m - self.position_m).norm()
    }

    /// Absolute direction from this pose's position to another pose's
    /// position. Returns zero if the positions coincide.
    pub fn bearing_to(&self, other: &Pose) -> f64 {
        let delta = other.position_m - self.position_m;
        delta[1].atan2(delta[0])
    }

    /// Wrapped heading error from this pose's heading to the given heading.
    pub fn heading_error_to(&self, heading_rad: f64) -> f64 {
        ang_dist(self.heading_rad, heading_rad)
    }
}

impl From<PoseSpec> for Pose {
    fn from(spec: PoseSpec) -> Self {
        Pose::new(spec.x, spec.y, spec.theta)
    }
}

impl From<&OdomSample> for Pose {
    fn from(sample: &OdomSample) -> Self {
        Pose::new(sample.x_m, sample.y_m, sample.theta_rad)
    }
}

impl PoseCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new pose, replacing the previous one.
    pub fn set(&self, pose: Pose) {
        let mut p = self.pose.lock()
            .expect("PoseCell: pose mutex poisoned");

        *p = Some(pose);
    }

    /// Get a copy of the latest pose, if any has been written yet.
    pub fn get(&self) -> Option<Pose> {
        *self.pose.lock()
            .expect("PoseCell: pose mutex poisoned")
    }
}

impl PoseSource for PoseCell {
    fn latest(&self) -> Option<Pose> {
        self.get()
    }
}

impl OdomFrame {
    pub fn new() -> Self {
        Self {
            anchor: Isometry2::identity()
        }
    }

    /// Re-anchor the frame so that the raw odometry pose `raw` maps onto the
    /// world pose `world`.
    pub fn set_pose(&mut self, raw: &Pose, world: &Pose) {
        self.anchor = world.to_isometry() * raw.to_isometry().inverse();
    }

    /// Map a raw odometry pose into the world frame.
    pub fn to_world(&self, raw: &Pose) -> Pose {
        Pose::from_isometry(&(self.anchor * raw.to_isometry()))
    }
}

impl Default for OdomFrame {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn assert_pose_near(a: &Pose, b: &Pose) {
        assert!(a.distance_to(b) < 1e-9, "{:?} != {:?}", a, b);
        assert!(a.heading_error_to(b.heading_rad).abs() < 1e-9, "{:?} != {:?}", a, b);
    }

    #[test]
    fn test_pose_geometry() {
        let p = Pose::new(1.0, 1.0, 3.0 * PI);
        assert!((p.heading_rad - PI).abs() < 1e-12);

        let goal = Pose::new(1.0, 3.0, 0.0);
        assert!((p.distance_to(&goal) - 2.0).abs() < 1e-12);
        assert!((p.bearing_to(&goal) - FRAC_PI_2).abs() < 1e-12);
        assert_eq!(p.bearing_to(&p), 0.0);
        assert!((p.heading_error_to(-PI + 0.1) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_isometry_conversion() {
        let p = Pose::new(-0.5, 2.0, -2.0);
        assert_pose_near(&Pose::from_isometry(&p.to_isometry()), &p);
    }

    #[test]
    fn test_odom_frame_identity() {
        let frame = OdomFrame::new();
        let raw = Pose::new(0.3, -0.2, 0.7);
        assert_pose_near(&frame.to_world(&raw), &raw);
    }

    #[test]
    fn test_odom_frame_reanchor() {
        let mut frame = OdomFrame::new();

        // Odometry says (1, 0, 0) but the robot is really at (0, 0, pi/2)
        let raw = Pose::new(1.0, 0.0, 0.0);
        let world = Pose::new(0.0, 0.0, FRAC_PI_2);
        frame.set_pose(&raw, &world);
        assert_pose_near(&frame.to_world(&raw), &world);

        // Driving 1 m forward in odometry is driving 1 m along world +Y
        let raw_moved = Pose::new(2.0, 0.0, 0.0);
        assert_pose_near(&frame.to_world(&raw_moved), &Pose::new(0.0, 1.0, FRAC_PI_2));

        // Turning in odometry turns in the world
        let raw_turned = Pose::new(1.0, 0.0, FRAC_PI_2);
        assert_pose_near(&frame.to_world(&raw_turned), &Pose::new(0.0, 0.0, PI));
    }

    #[test]
    fn test_pose_cell_last_write_wins() {
        let cell = PoseCell::new();
        assert_eq!(cell.latest(), None);

        let writer = cell.clone();
        let jh = std::thread::spawn(move || {
            writer.set(Pose::new(1.0, 0.0, 0.0));
            writer.set(Pose::new(2.0, 0.0, 0.0));
        });
        jh.join().unwrap();

        assert_eq!(cell.latest(), Some(Pose::new(2.0, 0.0, 0.0)));
    }
}
