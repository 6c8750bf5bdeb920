//! # Pose controllers module
//!
//! This module provides the two control laws used to drive to a goal pose.
//! Each controller is a small state machine stepped once per cycle with the
//! current pose. It returns the velocity command for that cycle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::f64::consts::{FRAC_PI_2, PI};
use log::debug;
use serde::Serialize;

// Internal
use super::{LocomotionParams, StatusReport};
use crate::loc::Pose;
use comms_if::{eqpt::cmd_vel::VelocityCmd, tc::ControlLaw};
use util::maths::{clamp_magnitude, wrap_pi};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Divide and conquer controller: orient toward the goal, drive to it, then
/// turn to the goal heading.
#[derive(Debug, Clone)]
pub struct SequentialCtrl {
    phase: CtrlPhase
}

/// MIMO controller: drive position and heading error down together, then
/// finish with an in place turn to the goal heading.
#[derive(Debug, Clone)]
pub struct SimultaneousCtrl {
    phase: CtrlPhase
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The phase a controller is in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum CtrlPhase {
    /// No goal is being executed
    Idle,

    /// Turning in place to face the goal position
    Orienting,

    /// Driving forward toward the goal position
    Going,

    /// Driving position and heading together (simultaneous law only)
    Converging,

    /// Turning in place to the goal heading
    FinalOrienting,

    /// The goal has been reached
    Done
}

/// A controller for one of the control laws.
#[derive(Debug, Clone)]
pub enum Controller {
    Sequential(SequentialCtrl),
    Simultaneous(SimultaneousCtrl)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Controller {
    /// Create a new controller for the given law, ready to start a goal.
    pub fn new(law: ControlLaw) -> Self {
        match law {
            ControlLaw::Sequential => Controller::Sequential(SequentialCtrl::new()),
            ControlLaw::Simultaneous => Controller::Simultaneous(SimultaneousCtrl::new())
        }
    }

    pub fn phase(&self) -> CtrlPhase {
        match self {
            Controller::Sequential(c) => c.phase,
            Controller::Simultaneous(c) => c.phase
        }
    }

    /// Calculate the command for this cycle.
    pub fn step(
        &mut self,
        pose: &Pose,
        goal: &Pose,
        params: &LocomotionParams,
        report: &mut StatusReport
    ) -> VelocityCmd {
        let cmd = match self {
            Controller::Sequential(c) => c.step(pose, goal, params, report),
            Controller::Simultaneous(c) => c.step(pose, goal, params, report)
        };

        report.phase = self.phase();
        cmd
    }
}

impl SequentialCtrl {
    pub fn new() -> Self {
        Self {
            phase: CtrlPhase::Orienting
        }
    }

    pub fn step(
        &mut self,
        pose: &Pose,
        goal: &Pose,
        params: &LocomotionParams,
        report: &mut StatusReport
    ) -> VelocityCmd {
        let range_m = pose.distance_to(goal);
        let bearing_error_rad = pose.heading_error_to(pose.bearing_to(goal));
        let heading_error_rad = pose.heading_error_to(goal.heading_rad);

        report.range_m = range_m;
        report.bearing_error_rad = bearing_error_rad;
        report.heading_error_rad = heading_error_rad;

        // Transitions are taken immediately so every cycle produces the
        // command of the phase it ends in
        loop {
            match self.phase {
                CtrlPhase::Orienting => {
                    if range_m <= params.position_tolerance {
                        self.transition(CtrlPhase::FinalOrienting);
                    }
                    else if bearing_error_rad.abs() > params.angle_tolerance_orienting {
                        return rotate_in_place(bearing_error_rad, params.angle_gain_dq, params)
                    }
                    else {
                        self.transition(CtrlPhase::Going);
                    }
                },
                CtrlPhase::Going => {
                    if range_m <= params.position_tolerance {
                        self.transition(CtrlPhase::FinalOrienting);
                    }
                    else if bearing_error_rad.abs() > FRAC_PI_2 {
                        // Goal has fallen behind, face it again
                        self.transition(CtrlPhase::Orienting);
                    }
                    else {
                        let linear_ms = clamp_magnitude(
                            params.position_gain_dq * range_m,
                            params.min_linear_velocity,
                            params.max_linear_velocity
                        );

                        let angular_rads = if bearing_error_rad.abs() > params.angle_tolerance_going {
                            clamp_magnitude(
                                params.angle_gain_dq * bearing_error_rad,
                                params.min_angular_velocity,
                                params.max_angular_velocity
                            )
                        }
                        else {
                            0.0
                        };

                        return VelocityCmd::new(linear_ms, angular_rads)
                    }
                },
                CtrlPhase::FinalOrienting => {
                    if heading_error_rad.abs() > params.angle_tolerance_orienting {
                        return rotate_in_place(heading_error_rad, params.angle_gain_dq, params)
                    }
                    self.transition(CtrlPhase::Done);
                },
                _ => return VelocityCmd::stop()
            }
        }
    }

    fn transition(&mut self, next: CtrlPhase) {
        debug!("Sequential: {:?} -> {:?}", self.phase, next);
        self.phase = next;
    }
}

impl Default for SequentialCtrl {
    fn default() -> Self {
        Self::new()
    }
}

impl SimultaneousCtrl {
    pub fn new() -> Self {
        Self {
            phase: CtrlPhase::Converging
        }
    }

    pub fn step(
        &mut self,
        pose: &Pose,
        goal: &Pose,
        params: &LocomotionParams,
        report: &mut StatusReport
    ) -> VelocityCmd {
        let range_m = pose.distance_to(goal);
        let bearing_rad = pose.bearing_to(goal);
        let heading_error_rad = pose.heading_error_to(goal.heading_rad);

        report.range_m = range_m;
        report.bearing_error_rad = pose.heading_error_to(bearing_rad);
        report.heading_error_rad = heading_error_rad;

        loop {
            match self.phase {
                CtrlPhase::Converging => {
                    if range_m <= params.position_tolerance {
                        self.transition(CtrlPhase::FinalOrienting);
                        continue
                    }

                    let mut alpha = pose.heading_error_to(bearing_rad);
                    let mut beta = wrap_pi(goal.heading_rad - bearing_rad);
                    let mut direction = 1.0;

                    // Goal is behind, drive backwards to it
                    if alpha.abs() > FRAC_PI_2 {
                        alpha = wrap_pi(alpha + PI);
                        beta = wrap_pi(beta + PI);
                        direction = -1.0;
                    }

                    report.alpha_rad = alpha;
                    report.beta_rad = beta;

                    let k_alpha = params.angle_gain_mimo;
                    let k_beta = params.beta_gain_mimo();

                    let linear_ms = direction * clamp_magnitude(
                        params.position_gain_mimo * range_m,
                        params.min_linear_velocity,
                        params.max_linear_velocity
                    );

                    // Combined angular error, the angular demand is k_alpha times this
                    let combined_rad = alpha + (k_beta / k_alpha) * beta;

                    let angular_rads = if combined_rad.abs() > params.angle_tolerance_going {
                        clamp_magnitude(
                            k_alpha * combined_rad,
                            params.min_angular_velocity,
                            params.max_angular_velocity
                        )
                    }
                    else {
                        0.0
                    };

                    return VelocityCmd::new(linear_ms, angular_rads)
                },
                CtrlPhase::FinalOrienting => {
                    if heading_error_rad.abs() > params.angle_tolerance_orienting {
                        return rotate_in_place(heading_error_rad, params.angle_gain_mimo, params)
                    }
                    self.transition(CtrlPhase::Done);
                },
                _ => return VelocityCmd::stop()
            }
        }
    }

    fn transition(&mut self, next: CtrlPhase) {
        debug!("Simultaneous: {:?} -> {:?}", self.phase, next);
        self.phase = next;
    }
}

impl Default for SimultaneousCtrl {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Angular only command turning toward zero heading error.
fn rotate_in_place(error_rad: f64, gain: f64, params: &LocomotionParams) -> VelocityCmd {
    VelocityCmd::new(
        0.0,
        clamp_magnitude(
            gain * error_rad,
            params.min_angular_velocity,
            params.max_angular_velocity
        )
    )
}
