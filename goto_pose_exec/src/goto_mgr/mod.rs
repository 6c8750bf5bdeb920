//! # Goal manager
//!
//! The goal manager (GotoMgr) executes telecommands from the command script.
//! `setpose` re-anchors the odometry frame so the robot's current odometry
//! maps onto the given world pose. `goto1` and `goto2` run the control loop
//! until the goal is reached, its cycle budget runs out, or the cancel flag
//! is raised.
//!
//! Each cycle of the control loop:
//!  1. Takes a snapshot of the latest raw odometry pose
//!  1. Maps it into the world frame
//!  1. Steps PoseCtrl and publishes the resulting command
//!  1. Archives the cycle and waits for the next one

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod report;

pub use report::*;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::io::{self, BufRead, Write};
use std::sync::{Arc, atomic::{AtomicBool, Ordering}};
use log::{debug, error, info, warn};
use thiserror::Error;

// Internal
use comms_if::{eqpt::cmd_vel::VelocityCmd, tc::{ControlLaw, Tc}};
use util::{
    archive::{Archiver, ArchiveError},
    module::State,
    script_interpreter::{Command, PendingTc, ScriptInterpreter, ScriptStop},
    time::Ticker
};
use crate::{
    loc::{OdomFrame, Pose},
    pose_ctrl::{LocomotionParams, PoseCtrl, PoseCtrlError},
    robot_if::{wait_for_pose, PoseSource, SinkError, VelocitySink}
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Configuration of the goal manager, taken from the command line.
#[derive(Debug, Clone)]
pub struct GotoMgrConfig {
    /// Optional limit on how long a single goal may run for
    pub goal_timeout_s: Option<f64>,

    /// How long `setpose` waits for the first odometry sample
    pub first_pose_timeout_s: f64,

    /// Wait for the user to press enter after each telecommand
    pub step_mode: bool
}

pub struct GotoMgr {
    pose_ctrl: PoseCtrl,

    frame: OdomFrame,

    config: GotoMgrConfig,

    /// Raised by another thread to abandon the current goal and the script
    cancel: Arc<AtomicBool>,

    archiver: Archiver,

    /// Number of goals started so far
    num_goals: usize
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum GotoMgrError {
    #[error("Pose control error: {0}")]
    PoseCtrlError(#[from] PoseCtrlError),

    #[error("No odometry was received within {0} s")]
    NoPose(f64),

    #[error("Could not command the robot: {0}")]
    SinkError(#[from] SinkError)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl GotoMgr {
    /// Create a new goal manager.
    ///
    /// The parameters are validated here, invalid parameters are an error.
    pub fn new(
        params: LocomotionParams,
        config: GotoMgrConfig,
        archiver: Archiver
    ) -> Result<Self, GotoMgrError> {
        Ok(Self {
            pose_ctrl: PoseCtrl::init(params)?,
            frame: OdomFrame::new(),
            config,
            cancel: Arc::new(AtomicBool::new(false)),
            archiver,
            num_goals: 0
        })
    }

    /// Get a handle to the cancel flag. Raising it stops the current goal with
    /// a stop command and ends script processing.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// The current odometry frame anchor.
    pub fn frame(&self) -> &OdomFrame {
        &self.frame
    }

    /// Run every telecommand in the script in order.
    ///
    /// Processing ends at the end of the script, at the first malformed line,
    /// or when the cancel flag is raised. Goals which time out are reported
    /// and processing continues with the next telecommand.
    pub fn run_script<S, V, T>(
        &mut self,
        si: &mut ScriptInterpreter,
        source: &S,
        sink: &V,
        ticker: &mut T
    ) -> Result<ScriptSummary, GotoMgrError>
    where
        S: PoseSource + ?Sized,
        V: VelocitySink + ?Sized,
        T: Ticker + ?Sized
    {
        let mut num_tcs_run = 0;
        let mut reports = Vec::new();

        let stop = loop {
            if self.cancel.load(Ordering::Relaxed) {
                warn!("Script cancelled");
                break RunStop::Cancelled
            }

            let cmd = match si.next_tc() {
                PendingTc::Some(c) => c,
                PendingTc::Stop(s) => {
                    match s {
                        ScriptStop::EndOfScript => info!("End of script reached"),
                        ScriptStop::Malformed { line_num, ref line, ref reason } => error!(
                            "Malformed command on line {} (\"{}\"): {}. No further commands \
                             will be run.",
                            line_num, line, reason
                        )
                    }
                    break RunStop::Script(s)
                }
            };

            info!("Line {}: {:?}", cmd.line_num, cmd.tc);

            if let Some(report) = self.exec_tc(&cmd.tc, source, sink, ticker)? {
                reports.push(report);
            }
            num_tcs_run += 1;

            if self.config.step_mode {
                prompt_and_continue(&cmd);
            }
        };

        Ok(ScriptSummary {
            num_tcs_run,
            reports,
            stop
        })
    }

    /// Execute a single telecommand, returning the goal report if it was a goal.
    pub fn exec_tc<S, V, T>(
        &mut self,
        tc: &Tc,
        source: &S,
        sink: &V,
        ticker: &mut T
    ) -> Result<Option<GoalReport>, GotoMgrError>
    where
        S: PoseSource + ?Sized,
        V: VelocitySink + ?Sized,
        T: Ticker + ?Sized
    {
        match tc {
            Tc::SetPose(p) => {
                self.set_pose(Pose::from(*p), source, ticker)?;
                Ok(None)
            },
            Tc::Goto { law, goal } => self
                .goto(*law, Pose::from(*goal), source, sink, ticker)
                .map(Some)
        }
    }

    /// Re-anchor the odometry frame so that the robot's current odometry maps
    /// onto `world`.
    ///
    /// If no odometry has been received yet this waits for it, up to the
    /// configured first pose timeout.
    pub fn set_pose<S, T>(
        &mut self,
        world: Pose,
        source: &S,
        ticker: &mut T
    ) -> Result<(), GotoMgrError>
    where
        S: PoseSource + ?Sized,
        T: Ticker + ?Sized
    {
        let raw = wait_for_pose(source, ticker, self.config.first_pose_timeout_s)
            .ok_or(GotoMgrError::NoPose(self.config.first_pose_timeout_s))?;

        self.frame.set_pose(&raw, &world);

        info!(
            "Pose set to ({:.3}, {:.3}, {:.3}) from odometry ({:.3}, {:.3}, {:.3})",
            world.x(), world.y(), world.heading_rad,
            raw.x(), raw.y(), raw.heading_rad
        );

        Ok(())
    }

    /// Drive to a goal pose using the given law.
    ///
    /// Outcomes other than `Reached` publish a stop command before returning.
    /// If the loop fails the goal is aborted and a stop is attempted before
    /// the error is returned.
    pub fn goto<S, V, T>(
        &mut self,
        law: ControlLaw,
        goal: Pose,
        source: &S,
        sink: &V,
        ticker: &mut T
    ) -> Result<GoalReport, GotoMgrError>
    where
        S: PoseSource + ?Sized,
        V: VelocitySink + ?Sized,
        T: Ticker + ?Sized
    {
        self.num_goals += 1;

        info!(
            "Goal {}: {} to ({:.3}, {:.3}, {:.3})",
            self.num_goals, law.verb(), goal.x(), goal.y(), goal.heading_rad
        );

        self.pose_ctrl.begin_goal(law, goal)?;

        let result = self.goal_loop(law, goal, source, sink, ticker);

        self.pose_ctrl.abort_goal();

        let report = match result {
            Ok(r) => r,
            Err(e) => {
                if let Err(se) = sink.publish(&VelocityCmd::stop()) {
                    error!("Could not stop the robot after a failed goal: {}", se);
                }
                return Err(e)
            }
        };

        match report.outcome {
            GoalOutcome::Reached => info!(
                "Goal {} reached in {} cycles ({:.2} s)",
                report.goal_num, report.num_ticks, report.duration_s
            ),
            o => warn!(
                "Goal {} ended {:?} after {} cycles ({:.2} s), remaining range {:?} m",
                report.goal_num, o, report.num_ticks, report.duration_s, report.final_range_m
            )
        }

        Ok(report)
    }

    fn goal_loop<S, V, T>(
        &mut self,
        law: ControlLaw,
        goal: Pose,
        source: &S,
        sink: &V,
        ticker: &mut T
    ) -> Result<GoalReport, GotoMgrError>
    where
        S: PoseSource + ?Sized,
        V: VelocitySink + ?Sized,
        T: Ticker + ?Sized
    {
        let period_s = ticker.period().as_secs_f64();
        let max_ticks = self.config.goal_timeout_s
            .map(|t| (t / period_s).ceil() as u64);

        let mut num_ticks: u64 = 0;
        let mut num_cmds: u64 = 0;
        let mut last_pose: Option<Pose> = None;
        let mut warned_no_pose = false;

        let outcome = loop {
            if self.cancel.load(Ordering::Relaxed) {
                break GoalOutcome::Cancelled
            }
            if let Some(m) = max_ticks {
                if num_ticks >= m {
                    break GoalOutcome::TimedOut
                }
            }

            match source.latest() {
                Some(raw) => {
                    let pose = self.frame.to_world(&raw);
                    last_pose = Some(pose);

                    let (cmd, report) = self.pose_ctrl.proc(&pose)?;

                    if let Some(cmd) = cmd {
                        sink.publish(&cmd)?;
                        num_cmds += 1;

                        let rec = TickRecord::new(self.num_goals, num_ticks, &pose, &cmd, &report);
                        if let Err(e) = self.archiver.serialise(rec) {
                            archive_warn(e);
                        }
                    }

                    if report.goal_reached {
                        break GoalOutcome::Reached
                    }
                },
                None => {
                    if !warned_no_pose {
                        warn!("No odometry available, waiting");
                        warned_no_pose = true;
                    }
                }
            }

            ticker.wait();
            num_ticks += 1;
        };

        // The controller's last command is already a stop when the goal is reached
        if outcome != GoalOutcome::Reached {
            debug!("Stopping the robot");
            sink.publish(&VelocityCmd::stop())?;
            num_cmds += 1;
        }

        Ok(GoalReport {
            goal_num: self.num_goals,
            law,
            goal,
            outcome,
            num_ticks,
            num_cmds,
            duration_s: num_ticks as f64 * period_s,
            final_pose: last_pose,
            final_range_m: last_pose.map(|p| p.distance_to(&goal)),
            final_heading_error_rad: last_pose.map(|p| p.heading_error_to(goal.heading_rad))
        })
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn archive_warn(e: ArchiveError) {
    warn!("Could not archive control cycle: {}", e);
}

/// Block until the user presses enter.
fn prompt_and_continue(cmd: &Command) {
    print!("Line {} done, press Enter to continue...", cmd.line_num);
    io::stdout().flush().ok();

    let mut line = String::new();
    if let Err(e) = io::stdin().lock().read_line(&mut line) {
        warn!("Could not read from stdin, continuing: {}", e);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        loc::PoseCell,
        pose_ctrl::test_params,
        sim_robot::{SimRobot, SimRobotParams}
    };
    use std::{cell::RefCell, path::PathBuf};
    use util::time::NoWait;

    const RATE_HZ: f64 = 20.0;

    fn config() -> GotoMgrConfig {
        GotoMgrConfig {
            goal_timeout_s: None,
            first_pose_timeout_s: 1.0,
            step_mode: false
        }
    }

    fn mgr(config: GotoMgrConfig) -> GotoMgr {
        GotoMgr::new(test_params(), config, Archiver::disabled()).unwrap()
    }

    fn script(s: &str) -> ScriptInterpreter {
        ScriptInterpreter::from_script(s, PathBuf::from("test.txt"), "data").unwrap()
    }

    /// Sink which records every command and forwards it to a robot.
    struct RecordingSink<'a> {
        robot: &'a SimRobot,
        cmds: RefCell<Vec<VelocityCmd>>
    }

    impl<'a> RecordingSink<'a> {
        fn new(robot: &'a SimRobot) -> Self {
            Self {
                robot,
                cmds: RefCell::new(Vec::new())
            }
        }
    }

    impl<'a> VelocitySink for RecordingSink<'a> {
        fn publish(&self, cmd: &VelocityCmd) -> Result<(), SinkError> {
            self.cmds.borrow_mut().push(*cmd);
            self.robot.publish(cmd)
        }
    }

    #[test]
    fn test_sample_script() {
        let robot = SimRobot::lockstep(SimRobotParams::default(), 1.0 / RATE_HZ);
        let mut gm = mgr(config());
        let mut si = script(
            "parameters.toml\n\
             setpose    0   0  0\n\
             goto1      0 1.2  0\n\
             goto2      0   0  0\n"
        );

        let summary = gm.run_script(&mut si, &robot, &robot, &mut NoWait::new(RATE_HZ)).unwrap();

        assert_eq!(summary.num_tcs_run, 3);
        assert_eq!(summary.stop, RunStop::Script(ScriptStop::EndOfScript));
        assert_eq!(summary.reports.len(), 2);

        let p = test_params();
        for r in summary.reports.iter() {
            assert_eq!(r.outcome, GoalOutcome::Reached);
            assert!(r.final_range_m.unwrap() <= p.position_tolerance);
            assert!(r.final_heading_error_rad.unwrap().abs() <= p.angle_tolerance_orienting);
        }
        assert_eq!(summary.reports[0].law, ControlLaw::Sequential);
        assert_eq!(summary.reports[1].law, ControlLaw::Simultaneous);
        assert_eq!(summary.reports[1].goal_num, 2);
    }

    #[test]
    fn test_setpose_then_goto_same_pose_sends_single_stop() {
        let robot = SimRobot::lockstep(
            SimRobotParams {
                initial_pose: [3.0, -1.0, 2.0],
                ..Default::default()
            },
            1.0 / RATE_HZ
        );
        let sink = RecordingSink::new(&robot);
        let mut gm = mgr(config());
        let mut si = script("parameters.toml\nsetpose 0 0 0\ngoto2 0 0 0\n");

        let summary = gm.run_script(&mut si, &robot, &sink, &mut NoWait::new(RATE_HZ)).unwrap();

        assert_eq!(*sink.cmds.borrow(), vec![VelocityCmd::stop()]);
        assert_eq!(summary.reports[0].outcome, GoalOutcome::Reached);
        assert_eq!(summary.reports[0].num_cmds, 1);
        assert_eq!(summary.reports[0].num_ticks, 0);
    }

    #[test]
    fn test_setpose_reanchors_goals() {
        // Odometry starts somewhere arbitrary, setpose says that's the origin
        let robot = SimRobot::lockstep(
            SimRobotParams {
                initial_pose: [5.0, 5.0, -1.0],
                ..Default::default()
            },
            1.0 / RATE_HZ
        );
        let mut gm = mgr(config());
        let mut si = script("parameters.toml\nsetpose 0 0 0\ngoto1 1 0 0\n");

        let summary = gm.run_script(&mut si, &robot, &robot, &mut NoWait::new(RATE_HZ)).unwrap();
        let report = &summary.reports[0];
        assert_eq!(report.outcome, GoalOutcome::Reached);

        // 1 m along the robot's initial heading in odometry
        let raw = robot.latest().unwrap();
        assert!((raw.x() - (5.0 + (-1f64).cos())).abs() < 0.03, "{:?}", raw);
        assert!((raw.y() - (5.0 + (-1f64).sin())).abs() < 0.03, "{:?}", raw);
        assert!((gm.frame().to_world(&raw).x() - 1.0).abs() < 0.03);
    }

    #[test]
    fn test_malformed_line_stops_processing() {
        let robot = SimRobot::lockstep(SimRobotParams::default(), 1.0 / RATE_HZ);
        let mut gm = mgr(config());
        let mut si = script("parameters.toml\ngoto1 0.5 0 0\ngoto1 x 0 0\ngoto1 1 0 0\n");

        let summary = gm.run_script(&mut si, &robot, &robot, &mut NoWait::new(RATE_HZ)).unwrap();

        assert_eq!(summary.num_tcs_run, 1);
        assert!(matches!(
            summary.stop,
            RunStop::Script(ScriptStop::Malformed { line_num: 3, .. })
        ));
        assert!((robot.latest().unwrap().x() - 0.5).abs() < 0.03);
    }

    #[test]
    fn test_goal_timeout() {
        // Dead zone larger than the maximum speed, the robot can never move
        let robot = SimRobot::lockstep(
            SimRobotParams {
                dead_zone_linear_ms: 1.0,
                dead_zone_angular_rads: 10.0,
                ..Default::default()
            },
            1.0 / RATE_HZ
        );
        let sink = RecordingSink::new(&robot);
        let mut gm = mgr(GotoMgrConfig {
            goal_timeout_s: Some(2.01),
            ..config()
        });

        let report = gm.goto(
            ControlLaw::Sequential,
            Pose::new(1.0, 1.0, 0.0),
            &robot,
            &sink,
            &mut NoWait::new(RATE_HZ)
        ).unwrap();

        assert_eq!(report.outcome, GoalOutcome::TimedOut);
        assert_eq!(report.num_ticks, 41);
        assert_eq!(sink.cmds.borrow().last(), Some(&VelocityCmd::stop()));
        assert_eq!(report.num_cmds as usize, sink.cmds.borrow().len());

        // The manager can run another goal afterwards
        let report = gm.goto(
            ControlLaw::Simultaneous,
            Pose::new(0.0, 0.0, 0.0),
            &robot,
            &sink,
            &mut NoWait::new(RATE_HZ)
        ).unwrap();
        assert_eq!(report.outcome, GoalOutcome::Reached);
    }

    #[test]
    fn test_cancel() {
        let robot = SimRobot::lockstep(SimRobotParams::default(), 1.0 / RATE_HZ);
        let sink = RecordingSink::new(&robot);
        let mut gm = mgr(config());
        gm.cancel_handle().store(true, Ordering::Relaxed);

        let report = gm.goto(
            ControlLaw::Sequential,
            Pose::new(1.0, 0.0, 0.0),
            &robot,
            &sink,
            &mut NoWait::new(RATE_HZ)
        ).unwrap();
        assert_eq!(report.outcome, GoalOutcome::Cancelled);
        assert_eq!(*sink.cmds.borrow(), vec![VelocityCmd::stop()]);

        let mut si = script("parameters.toml\ngoto1 1 0 0\n");
        let summary = gm.run_script(&mut si, &robot, &sink, &mut NoWait::new(RATE_HZ)).unwrap();
        assert_eq!(summary.stop, RunStop::Cancelled);
        assert_eq!(summary.num_tcs_run, 0);
    }

    #[test]
    fn test_cancel_from_another_thread_mid_goal() {
        let robot = SimRobot::real_time(SimRobotParams::default());
        let sink = RecordingSink::new(&robot);
        let mut gm = mgr(config());

        let cancel = gm.cancel_handle();
        let jh = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(300));
            cancel.store(true, Ordering::Relaxed);
        });

        let mut si = script("parameters.toml\nsetpose 0 0 0\ngoto1 5 0 0\ngoto2 0 0 0\n");
        let summary = gm.run_script(
            &mut si, &robot, &sink, &mut util::time::Rate::new(RATE_HZ)
        ).unwrap();
        jh.join().unwrap();

        assert_eq!(summary.stop, RunStop::Cancelled);
        assert_eq!(summary.num_tcs_run, 2);
        assert_eq!(summary.reports.len(), 1);
        assert_eq!(summary.reports[0].outcome, GoalOutcome::Cancelled);

        let cmds = sink.cmds.borrow();
        assert!(cmds.len() > 1);
        assert_eq!(*cmds.last().unwrap(), VelocityCmd::stop());
        assert_eq!(robot.current_cmd(), VelocityCmd::stop());
    }

    #[test]
    fn test_setpose_without_odometry() {
        let cell = PoseCell::new();
        let mut gm = mgr(config());

        assert!(matches!(
            gm.set_pose(Pose::new(0.0, 0.0, 0.0), &cell, &mut NoWait::new(RATE_HZ)),
            Err(GotoMgrError::NoPose(_))
        ));
    }
}
