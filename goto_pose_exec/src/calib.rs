//! # Velocity calibration
//!
//! Real motors don't move at all below some demand. This module finds the
//! smallest linear and angular velocity demands which actually move the
//! robot, which are the values to use as `min_linear_velocity` and
//! `min_angular_velocity` in the locomotion parameters.
//!
//! Each velocity is ramped up from zero in fixed steps. At each step the
//! demand is held for a number of cycles and the odometry is checked for
//! motion. The robot is stopped between steps.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::sync::{Arc, atomic::{AtomicBool, Ordering}};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use comms_if::eqpt::cmd_vel::VelocityCmd;
use util::time::Ticker;
use crate::{
    loc::Pose,
    robot_if::{wait_for_pose, PoseSource, SinkError, VelocitySink}
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the calibration ramps.
#[derive(Debug, Clone, Deserialize)]
pub struct CalibParams {
    /// Linear velocity increment between steps
    pub linear_step_ms: f64,

    /// Angular velocity increment between steps
    pub angular_step_rads: f64,

    /// Cycles each demand is held for before checking for motion
    pub hold_ticks: u32,

    /// Translation which counts as motion
    pub linear_threshold_m: f64,

    /// Rotation which counts as motion
    pub angular_threshold_rad: f64
}

/// The result of calibration. A velocity is `None` if no demand up to the
/// maximum moved the robot.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct CalibReport {
    pub min_linear_velocity: Option<f64>,
    pub min_angular_velocity: Option<f64>
}

/// Runs the calibration ramps against a robot.
pub struct Calibrator {
    params: CalibParams,

    /// How long to wait for the first odometry sample
    first_pose_timeout_s: f64,

    /// Raised by another thread to stop calibrating
    cancel: Arc<AtomicBool>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CalibError {
    #[error("Calibration parameter {0} must be positive, found {1}")]
    NotPositive(&'static str, f64),

    #[error("No odometry was received within {0} s")]
    NoFirstPose(f64),

    #[error("Odometry was lost during calibration")]
    PoseLost,

    #[error("Calibration was cancelled")]
    Cancelled,

    #[error("Could not command the robot: {0}")]
    SinkError(#[from] SinkError)
}

#[derive(Debug, Copy, Clone)]
enum Axis {
    Linear,
    Angular
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CalibParams {
    /// Check the ramps will terminate and the thresholds are meaningful.
    pub fn validate(&self) -> Result<(), CalibError> {
        let positive = [
            ("linear_step_ms", self.linear_step_ms),
            ("angular_step_rads", self.angular_step_rads),
            ("linear_threshold_m", self.linear_threshold_m),
            ("angular_threshold_rad", self.angular_threshold_rad)
        ];

        for (name, value) in positive.iter() {
            if !(value.is_finite() && *value > 0.0) {
                return Err(CalibError::NotPositive(*name, *value))
            }
        }

        if self.hold_ticks == 0 {
            return Err(CalibError::NotPositive("hold_ticks", 0.0))
        }

        Ok(())
    }
}

impl Default for CalibParams {
    fn default() -> Self {
        Self {
            linear_step_ms: 0.005,
            angular_step_rads: 0.02,
            hold_ticks: 10,
            linear_threshold_m: 0.002,
            angular_threshold_rad: 0.005
        }
    }
}

impl Calibrator {
    /// Create a new calibrator, the parameters are validated here.
    ///
    /// Raising `cancel` stops the robot and ends calibration with
    /// [`CalibError::Cancelled`].
    pub fn new(
        params: CalibParams,
        first_pose_timeout_s: f64,
        cancel: Arc<AtomicBool>
    ) -> Result<Self, CalibError> {
        params.validate()?;

        Ok(Self {
            params,
            first_pose_timeout_s,
            cancel
        })
    }

    /// Find the smallest linear and angular velocities that move the robot,
    /// searching up to the given maximums.
    pub fn find_minimum_velocities<S, V, T>(
        &self,
        source: &S,
        sink: &V,
        ticker: &mut T,
        max_linear_velocity: f64,
        max_angular_velocity: f64
    ) -> Result<CalibReport, CalibError>
    where
        S: PoseSource + ?Sized,
        V: VelocitySink + ?Sized,
        T: Ticker + ?Sized
    {
        info!("Calibrating minimum velocities");

        wait_for_pose(source, ticker, self.first_pose_timeout_s)
            .ok_or(CalibError::NoFirstPose(self.first_pose_timeout_s))?;

        let min_linear_velocity = self.ramp(
            Axis::Linear,
            source, sink, ticker,
            self.params.linear_step_ms,
            max_linear_velocity
        )?;

        let min_angular_velocity = self.ramp(
            Axis::Angular,
            source, sink, ticker,
            self.params.angular_step_rads,
            max_angular_velocity
        )?;

        let report = CalibReport {
            min_linear_velocity,
            min_angular_velocity
        };

        info!("Calibration complete: {:?}", report);

        Ok(report)
    }

    fn ramp<S, V, T>(
        &self,
        axis: Axis,
        source: &S,
        sink: &V,
        ticker: &mut T,
        step: f64,
        max: f64
    ) -> Result<Option<f64>, CalibError>
    where
        S: PoseSource + ?Sized,
        V: VelocitySink + ?Sized,
        T: Ticker + ?Sized
    {
        // Multiples of the step rather than accumulating, so the demands are exact
        let mut k = 1u32;
        loop {
            let demand = step * k as f64;
            if demand > max {
                warn!("No {:?} demand up to {} moved the robot", axis, max);
                return Ok(None)
            }

            let start = source.latest().ok_or(CalibError::PoseLost)?;

            let cmd = match axis {
                Axis::Linear => VelocityCmd::new(demand, 0.0),
                Axis::Angular => VelocityCmd::new(0.0, demand)
            };

            for _ in 0..self.params.hold_ticks {
                if self.cancel.load(Ordering::Relaxed) {
                    sink.publish(&VelocityCmd::stop())?;
                    return Err(CalibError::Cancelled)
                }
                sink.publish(&cmd)?;
                ticker.wait();
            }
            sink.publish(&VelocityCmd::stop())?;

            let end = source.latest().ok_or(CalibError::PoseLost)?;
            let moved = motion(axis, &start, &end);

            debug!("{:?} demand {:.4}: moved {:.5}", axis, demand, moved);

            let threshold = match axis {
                Axis::Linear => self.params.linear_threshold_m,
                Axis::Angular => self.params.angular_threshold_rad
            };

            if moved >= threshold {
                info!("Minimum {:?} velocity: {}", axis, demand);
                return Ok(Some(demand))
            }

            k += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn motion(axis: Axis, start: &Pose, end: &Pose) -> f64 {
    match axis {
        Axis::Linear => start.distance_to(end),
        Axis::Angular => start.heading_error_to(end.heading_rad).abs()
    }
}
