//! Pose control module state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, trace};
use serde::Serialize;

// Internal
use super::*;
use crate::loc::Pose;
use comms_if::{eqpt::cmd_vel::VelocityCmd, tc::ControlLaw};
use util::module::State;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct PoseCtrl {
    params: LocomotionParams,

    /// Executing mode
    mode: PoseCtrlMode,

    /// Goal being driven to, if any
    goal: Option<Pose>,

    /// Controller for the current goal
    controller: Option<Controller>,

    report: StatusReport
}

/// The status report containing the errors and phase of the current cycle.
#[derive(Debug, Copy, Clone, Serialize)]
pub struct StatusReport {
    /// Phase the controller finished the cycle in
    pub phase: CtrlPhase,

    /// Distance to the goal position
    pub range_m: f64,

    /// Error between the robot heading and the direction to the goal
    pub bearing_error_rad: f64,

    /// Error between the robot heading and the goal heading
    pub heading_error_rad: f64,

    /// Simultaneous law alpha term (after any reversal)
    pub alpha_rad: f64,

    /// Simultaneous law beta term (after any reversal)
    pub beta_rad: f64,

    /// True on the cycle the goal is reached
    pub goal_reached: bool
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Potential errors that can occur during processing of the module.
#[derive(Debug, thiserror::Error)]
pub enum PoseCtrlError {
    #[error("Invalid locomotion parameters: {0}")]
    InvalidParams(ParamsError),

    /// A goal is already loaded. Abort the current goal before starting a
    /// new one.
    #[error("Attempted to begin a goal while one is already being executed")]
    GoalAlreadyLoaded,

    /// Attempted to use a goal with non-finite values.
    #[error("Goal pose {0:?} is not finite")]
    InvalidGoal(Pose),

    /// Attempted to control with a non-finite pose.
    #[error("Current pose {0:?} is not finite")]
    InvalidPose(Pose)
}

/// The possible modes of execution of PoseCtrl.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PoseCtrlMode {
    Off,
    Executing,
    GoalReached
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for PoseCtrl {
    type InitData = LocomotionParams;
    type InitError = PoseCtrlError;

    type InputData = Pose;
    type OutputData = Option<VelocityCmd>;
    type StatusReport = StatusReport;
    type ProcError = PoseCtrlError;

    /// Intiailise the PoseCtrl module from a set of locomotion parameters.
    fn init(params: LocomotionParams) -> Result<Self, PoseCtrlError> {
        params.validate().map_err(PoseCtrlError::InvalidParams)?;

        info!("PoseCtrl parameters:");
        match util::params::echo(&params) {
            Ok(s) => {
                for line in s.lines() {
                    info!("    {}", line);
                }
            },
            Err(e) => debug!("Could not echo parameters: {}", e)
        }

        Ok(Self {
            params,
            mode: PoseCtrlMode::Off,
            goal: None,
            controller: None,
            report: StatusReport::default()
        })
    }

    /// Process pose control.
    ///
    /// `pose` is the current pose of the robot in the world frame. If no goal
    /// is being executed no command is produced. Otherwise the controller is
    /// stepped, and on the cycle the goal is reached the stop command is
    /// produced and the module returns to `Off` on the next call.
    fn proc(
        &mut self,
        pose: &Pose
    ) -> Result<(Option<VelocityCmd>, StatusReport), PoseCtrlError> {

        self.report = StatusReport::default();

        if let PoseCtrlMode::GoalReached = self.mode {
            self.abort_goal();
        }

        let (goal, controller) = match (self.goal, self.controller.as_mut()) {
            (Some(g), Some(c)) => (g, c),
            _ => return Ok((None, self.report))
        };

        if !is_finite(pose) {
            return Err(PoseCtrlError::InvalidPose(*pose))
        }

        let cmd = controller.step(pose, &goal, &self.params, &mut self.report);

        trace!(
            "PoseCtrl {:?}: range {:.4} m, bearing err {:.4} rad, heading err {:.4} rad -> {:?}",
            self.report.phase,
            self.report.range_m,
            self.report.bearing_error_rad,
            self.report.heading_error_rad,
            cmd
        );

        if self.report.phase == CtrlPhase::Done {
            self.report.goal_reached = true;
            self.mode = PoseCtrlMode::GoalReached;
        }

        Ok((Some(cmd), self.report))
    }
}

impl PoseCtrl {

    /// Begin driving to a new goal with the given law.
    ///
    /// Execution begins on the next call to `proc`. Starting a goal while
    /// another is executing is an error, abort the current one first.
    pub fn begin_goal(&mut self, law: ControlLaw, goal: Pose) -> Result<(), PoseCtrlError> {
        if self.mode == PoseCtrlMode::Executing {
            return Err(PoseCtrlError::GoalAlreadyLoaded)
        }

        if !is_finite(&goal) {
            return Err(PoseCtrlError::InvalidGoal(goal))
        }

        debug!("PoseCtrl: begin {:?} goal to {:?}", law, goal);

        self.goal = Some(goal);
        self.controller = Some(Controller::new(law));
        self.mode = PoseCtrlMode::Executing;

        Ok(())
    }

    /// Stop executing the current goal, if there is one.
    pub fn abort_goal(&mut self) {
        self.goal = None;
        self.controller = None;
        self.mode = PoseCtrlMode::Off;
    }

    pub fn mode(&self) -> PoseCtrlMode {
        self.mode
    }
}

impl Default for StatusReport {
    fn default() -> Self {
        Self {
            phase: CtrlPhase::Idle,
            range_m: 0.0,
            bearing_error_rad: 0.0,
            heading_error_rad: 0.0,
            alpha_rad: 0.0,
            beta_rad: 0.0,
            goal_reached: false
        }
    }
}

fn is_finite(pose: &Pose) -> bool {
    pose.x().is_finite() && pose.y().is_finite() && pose.heading_rad.is_finite()
}
