//! # Simulated robot
//!
//! An ideal differential drive robot, used to run the controller without any
//! hardware. Velocity commands are integrated into a raw odometry pose, which
//! is published into a [`PoseCell`] as real odometry would be.
//!
//! Two modes are provided:
//!
//! - Lockstep: every published command advances the robot by exactly one
//!   cycle. Combined with `util::time::NoWait` this runs a goal as fast as
//!   the CPU allows and is fully deterministic.
//! - Real time: a background thread integrates the latest command at its own
//!   rate, independently of the controller.
//!
//! Commands whose magnitude is inside the configured dead zone produce no
//! motion, mimicking motors which need a minimum demand to overcome friction.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{Arc, Mutex, atomic::{AtomicBool, Ordering}},
    thread::{self, JoinHandle}
};
use log::debug;
use serde::Deserialize;

use comms_if::eqpt::cmd_vel::VelocityCmd;
use util::time::{Rate, Ticker};
use crate::{
    loc::{Pose, PoseCell},
    robot_if::{PoseSource, SinkError, VelocitySink}
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters of the simulated robot. Missing fields take their default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimRobotParams {
    /// Linear demands with a smaller magnitude than this produce no motion
    pub dead_zone_linear_ms: f64,

    /// Angular demands with a smaller magnitude than this produce no motion
    pub dead_zone_angular_rads: f64,

    /// Raw odometry pose the robot starts at, `[x, y, theta]`
    pub initial_pose: [f64; 3],

    /// Integration rate of the real time simulation
    pub sim_rate_hz: f64
}

/// A simulated differential drive robot.
pub struct SimRobot {
    params: SimRobotParams,

    /// Time step of one integration in lockstep mode
    lockstep_dt_s: Option<f64>,

    /// Current raw pose and the command being executed
    state: Arc<Mutex<SimState>>,

    pose_cell: PoseCell,

    bg_run: Arc<AtomicBool>,
    bg_jh: Option<JoinHandle<()>>
}

#[derive(Debug, Copy, Clone)]
struct SimState {
    pose: Pose,
    cmd: VelocityCmd
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimRobot {
    /// Create a robot which moves by exactly `dt_s` each time a command is published.
    pub fn lockstep(params: SimRobotParams, dt_s: f64) -> Self {
        let state = SimState::new(&params);
        let pose_cell = PoseCell::new();
        pose_cell.set(state.pose);

        Self {
            params,
            lockstep_dt_s: Some(dt_s),
            state: Arc::new(Mutex::new(state)),
            pose_cell,
            bg_run: Arc::new(AtomicBool::new(false)),
            bg_jh: None
        }
    }

    /// Create a robot simulated in real time by a background thread.
    pub fn real_time(params: SimRobotParams) -> Self {
        let state = Arc::new(Mutex::new(SimState::new(&params)));
        let pose_cell = PoseCell::new();
        let bg_run = Arc::new(AtomicBool::new(true));

        let state_clone = state.clone();
        let pose_cell_clone = pose_cell.clone();
        let bg_run_clone = bg_run.clone();
        let params_clone = params.clone();

        let bg_jh = Some(thread::spawn(move || {
            bg_thread(params_clone, state_clone, pose_cell_clone, bg_run_clone)
        }));

        Self {
            params,
            lockstep_dt_s: None,
            state,
            pose_cell,
            bg_run,
            bg_jh
        }
    }

    /// The command currently being executed.
    pub fn current_cmd(&self) -> VelocityCmd {
        self.state.lock()
            .expect("SimRobot: state mutex poisoned")
            .cmd
    }
}

impl PoseSource for SimRobot {
    fn latest(&self) -> Option<Pose> {
        self.pose_cell.get()
    }
}

impl VelocitySink for SimRobot {
    fn publish(&self, cmd: &VelocityCmd) -> Result<(), SinkError> {
        let mut state = self.state.lock()
            .expect("SimRobot: state mutex poisoned");

        state.cmd = *cmd;

        if let Some(dt_s) = self.lockstep_dt_s {
            state.integrate(&self.params, dt_s);
            self.pose_cell.set(state.pose);
        }

        Ok(())
    }
}

impl Drop for SimRobot {
    fn drop(&mut self) {
        self.bg_run.store(false, Ordering::Relaxed);

        if let Some(jh) = self.bg_jh.take() {
            jh.join().ok();
        }
    }
}

impl Default for SimRobotParams {
    fn default() -> Self {
        Self {
            dead_zone_linear_ms: 0.0,
            dead_zone_angular_rads: 0.0,
            initial_pose: [0.0; 3],
            sim_rate_hz: 100.0
        }
    }
}

impl SimState {
    fn new(params: &SimRobotParams) -> Self {
        let [x, y, theta] = params.initial_pose;

        Self {
            pose: Pose::new(x, y, theta),
            cmd: VelocityCmd::stop()
        }
    }

    /// Advance the pose by `dt_s` under the current command.
    ///
    /// The robot follows an exact circular arc for constant velocities.
    fn integrate(&mut self, params: &SimRobotParams, dt_s: f64) {
        let v = apply_dead_zone(self.cmd.linear_ms, params.dead_zone_linear_ms);
        let w = apply_dead_zone(self.cmd.angular_rads, params.dead_zone_angular_rads);

        let theta = self.pose.heading_rad;
        let (dx, dy) = if w.abs() < 1e-9 {
            (v * dt_s * theta.cos(), v * dt_s * theta.sin())
        }
        else {
            let r = v / w;
            (
                r * ((theta + w * dt_s).sin() - theta.sin()),
                -r * ((theta + w * dt_s).cos() - theta.cos())
            )
        };

        self.pose = Pose::new(
            self.pose.x() + dx,
            self.pose.y() + dy,
            theta + w * dt_s
        );
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn apply_dead_zone(value: f64, dead_zone: f64) -> f64 {
    if value.abs() < dead_zone {
        0.0
    }
    else {
        value
    }
}

/// Background thread integrating the robot motion in real time.
fn bg_thread(
    params: SimRobotParams,
    state: Arc<Mutex<SimState>>,
    pose_cell: PoseCell,
    run: Arc<AtomicBool>
) {
    let mut rate = Rate::new(params.sim_rate_hz);
    let dt_s = rate.period().as_secs_f64();

    debug!("SimRobot running in real time at {} Hz", params.sim_rate_hz);

    // Publish the initial pose straight away
    {
        let state = state.lock().expect("SimRobot: state mutex poisoned");
        pose_cell.set(state.pose);
    }

    while run.load(Ordering::Relaxed) {
        rate.wait();

        let pose = {
            let mut state = state.lock().expect("SimRobot: state mutex poisoned");
            state.integrate(&params, dt_s);
            state.pose
        };

        pose_cell.set(pose);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::{f64::consts::FRAC_PI_2, time::Duration};

    const FIRST_POSE_WAIT: Duration = Duration::from_millis(200);

    #[test]
    fn test_lockstep_straight_line() {
        let robot = SimRobot::lockstep(SimRobotParams::default(), 0.1);
        assert_eq!(robot.latest(), Some(Pose::new(0.0, 0.0, 0.0)));

        for _ in 0..10 {
            robot.publish(&VelocityCmd::new(0.5, 0.0)).unwrap();
        }

        let pose = robot.latest().unwrap();
        assert!((pose.x() - 0.5).abs() < 1e-9);
        assert!(pose.y().abs() < 1e-12);
        assert_eq!(pose.heading_rad, 0.0);
    }

    #[test]
    fn test_lockstep_arc() {
        let robot = SimRobot::lockstep(SimRobotParams::default(), 0.01);

        // Quarter circle of radius 1 m
        for _ in 0..100 {
            robot.publish(&VelocityCmd::new(FRAC_PI_2, FRAC_PI_2)).unwrap();
        }

        let pose = robot.latest().unwrap();
        assert!((pose.x() - 1.0).abs() < 1e-6, "{:?}", pose);
        assert!((pose.y() - 1.0).abs() < 1e-6, "{:?}", pose);
        assert!((pose.heading_rad - FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn test_dead_zone() {
        let params = SimRobotParams {
            dead_zone_linear_ms: 0.05,
            dead_zone_angular_rads: 0.2,
            initial_pose: [1.0, 2.0, 0.5],
            ..Default::default()
        };
        let robot = SimRobot::lockstep(params, 0.1);

        robot.publish(&VelocityCmd::new(0.04, -0.19)).unwrap();
        assert_eq!(robot.latest(), Some(Pose::new(1.0, 2.0, 0.5)));

        robot.publish(&VelocityCmd::new(0.0, 0.2)).unwrap();
        let pose = robot.latest().unwrap();
        assert!((pose.heading_rad - 0.52).abs() < 1e-9);
    }

    #[test]
    fn test_real_time() {
        let robot = SimRobot::real_time(SimRobotParams::default());
        thread::sleep(FIRST_POSE_WAIT);
        assert_eq!(robot.latest(), Some(Pose::new(0.0, 0.0, 0.0)));

        robot.publish(&VelocityCmd::new(1.0, 0.0)).unwrap();
        thread::sleep(Duration::from_millis(200));
        robot.publish(&VelocityCmd::stop()).unwrap();

        let pose = robot.latest().unwrap();
        assert!(pose.x() > 0.05, "{:?}", pose);
        assert!(pose.x() < 1.0, "{:?}", pose);
        assert_eq!(robot.current_cmd(), VelocityCmd::stop());
    }
}
