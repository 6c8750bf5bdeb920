//! # Pose control module
//!
//! Pose control (PoseCtrl) drives the robot from its current pose to a goal
//! pose. The module is stepped once per cycle with the current world frame
//! pose and produces the velocity command for that cycle.
//!
//! Two laws are available, selected per goal:
//!
//! - Sequential (`goto1`): turn to face the goal, drive to it with heading
//!   correction, then turn in place to the goal heading.
//! - Simultaneous (`goto2`): drive using the range, bearing (alpha) and final
//!   heading (beta) errors together, then turn in place to the goal heading.
//!
//! Every non-zero component of a command has a magnitude inside the limits
//! given in the parameters. The final command of every goal is the stop
//! command.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod controllers;
mod params;
mod state;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use controllers::*;
pub use params::*;
pub use state::*;

#[cfg(test)]
pub(crate) use params::test::test_params;

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        loc::Pose,
        robot_if::{PoseSource, VelocitySink},
        sim_robot::{SimRobot, SimRobotParams}
    };
    use comms_if::{eqpt::cmd_vel::VelocityCmd, tc::ControlLaw};
    use std::f64::consts::{FRAC_PI_2, PI};
    use util::module::State;

    const DT_S: f64 = 0.05;
    const MAX_TICKS: usize = 4000;

    /// Drive a lockstep simulated robot from `start` to `goal`, returning every command sent and
    /// the final pose.
    fn run_goal(law: ControlLaw, start: Pose, goal: Pose) -> (Vec<VelocityCmd>, Pose) {
        let params = test_params();
        let robot = SimRobot::lockstep(
            SimRobotParams {
                initial_pose: [start.x(), start.y(), start.heading_rad],
                ..Default::default()
            },
            DT_S
        );

        let mut pose_ctrl = PoseCtrl::init(params).unwrap();
        pose_ctrl.begin_goal(law, goal).unwrap();

        let mut cmds = Vec::new();
        for _ in 0..MAX_TICKS {
            let pose = robot.latest().unwrap();
            let (cmd, report) = pose_ctrl.proc(&pose).unwrap();
            let cmd = cmd.expect("No command while executing a goal");

            robot.publish(&cmd).unwrap();
            cmds.push(cmd);

            if report.goal_reached {
                return (cmds, robot.latest().unwrap())
            }
        }

        panic!("{:?} goal {:?} from {:?} not reached in {} ticks", law, goal, start, MAX_TICKS);
    }

    /// Check every command is in band and that only the last one is a stop.
    fn check_cmds(cmds: &[VelocityCmd]) {
        let p = test_params();

        for (i, c) in cmds.iter().enumerate() {
            let lin = c.linear_ms.abs();
            let ang = c.angular_rads.abs();
            assert!(
                lin == 0.0 || (lin >= p.min_linear_velocity && lin <= p.max_linear_velocity),
                "Linear demand out of band at {}: {:?}", i, c
            );
            assert!(
                ang == 0.0 || (ang >= p.min_angular_velocity && ang <= p.max_angular_velocity),
                "Angular demand out of band at {}: {:?}", i, c
            );
            assert_eq!(c.is_stop(), i == cmds.len() - 1, "Unexpected stop state at {}: {:?}", i, c);
        }
    }

    fn check_reached(final_pose: &Pose, goal: &Pose) {
        let p = test_params();
        assert!(
            final_pose.distance_to(goal) <= p.position_tolerance,
            "Final pose {:?} too far from {:?}", final_pose, goal
        );
        assert!(
            final_pose.heading_error_to(goal.heading_rad).abs() <= p.angle_tolerance_orienting,
            "Final pose {:?} heading too far from {:?}", final_pose, goal
        );
    }

    #[test]
    fn test_sequential_converges() {
        let start = Pose::new(0.0, 0.0, 0.0);
        let goal = Pose::new(0.0, 1.2, 0.0);
        let (cmds, final_pose) = run_goal(ControlLaw::Sequential, start, goal);

        check_cmds(&cmds);
        check_reached(&final_pose, &goal);

        // Turns left to face +Y before driving
        assert_eq!(cmds[0].linear_ms, 0.0);
        assert!(cmds[0].angular_rads > 0.0);
    }

    #[test]
    fn test_simultaneous_converges() {
        let start = Pose::new(0.0, 0.0, 0.0);
        let goal = Pose::new(0.0, 1.2, 0.0);
        let (cmds, final_pose) = run_goal(ControlLaw::Simultaneous, start, goal);

        check_cmds(&cmds);
        check_reached(&final_pose, &goal);

        // Drives and turns at the same time from the start
        assert!(cmds[0].linear_ms > 0.0);
        assert!(cmds[0].angular_rads > 0.0);
    }

    #[test]
    fn test_sequential_straight_ahead_does_not_turn() {
        let start = Pose::new(0.0, 0.0, 0.0);
        let goal = Pose::new(1.2, 0.0, 0.0);
        let (cmds, final_pose) = run_goal(ControlLaw::Sequential, start, goal);

        check_cmds(&cmds);
        check_reached(&final_pose, &goal);
        assert!(cmds.iter().all(|c| c.angular_rads == 0.0));
        assert!(cmds[..cmds.len() - 1].iter().all(|c| c.linear_ms > 0.0));
    }

    #[test]
    fn test_zero_distance_goal_single_stop() {
        for law in [ControlLaw::Sequential, ControlLaw::Simultaneous].iter() {
            let pose = Pose::new(0.0, 0.0, 0.0);
            let (cmds, final_pose) = run_goal(*law, pose, pose);

            assert_eq!(cmds, vec![VelocityCmd::stop()]);
            assert_eq!(final_pose, pose);
        }
    }

    #[test]
    fn test_goal_at_position_only_rotates() {
        for law in [ControlLaw::Sequential, ControlLaw::Simultaneous].iter() {
            let start = Pose::new(0.5, 0.5, 0.0);
            let goal = Pose::new(0.5, 0.5, -FRAC_PI_2);
            let (cmds, final_pose) = run_goal(*law, start, goal);

            check_cmds(&cmds);
            check_reached(&final_pose, &goal);
            assert!(cmds.iter().all(|c| c.linear_ms == 0.0));
            assert!(cmds[0].angular_rads < 0.0);
        }
    }

    #[test]
    fn test_simultaneous_reverses_to_goal_behind() {
        let start = Pose::new(0.0, 0.0, 0.0);
        let goal = Pose::new(-1.0, 0.0, 0.0);
        let (cmds, final_pose) = run_goal(ControlLaw::Simultaneous, start, goal);

        check_cmds(&cmds);
        check_reached(&final_pose, &goal);
        assert!(cmds[0].linear_ms < 0.0);
        assert!(cmds.iter().all(|c| c.linear_ms <= 0.0));
    }

    #[test]
    fn test_both_laws_converge_to_various_goals() {
        let start = Pose::new(0.0, 0.0, 0.0);
        let goals = [
            Pose::new(1.0, 1.0, FRAC_PI_2),
            Pose::new(-0.5, 0.8, -2.0),
            Pose::new(2.0, 0.0, PI),
            Pose::new(-1.0, -1.0, 0.0)
        ];

        for law in [ControlLaw::Sequential, ControlLaw::Simultaneous].iter() {
            for goal in goals.iter() {
                let (cmds, final_pose) = run_goal(*law, start, *goal);
                check_cmds(&cmds);
                check_reached(&final_pose, goal);
            }
        }
    }

    #[test]
    fn test_module_modes() {
        let mut pose_ctrl = PoseCtrl::init(test_params()).unwrap();
        let pose = Pose::new(0.0, 0.0, 0.0);

        // Nothing to do without a goal
        let (cmd, report) = pose_ctrl.proc(&pose).unwrap();
        assert_eq!(cmd, None);
        assert_eq!(report.phase, CtrlPhase::Idle);

        pose_ctrl.begin_goal(ControlLaw::Sequential, Pose::new(1.0, 0.0, 0.0)).unwrap();
        assert_eq!(pose_ctrl.mode(), PoseCtrlMode::Executing);
        assert!(matches!(
            pose_ctrl.begin_goal(ControlLaw::Sequential, pose),
            Err(PoseCtrlError::GoalAlreadyLoaded)
        ));

        let (cmd, report) = pose_ctrl.proc(&pose).unwrap();
        assert!(cmd.unwrap().linear_ms > 0.0);
        assert_eq!(report.phase, CtrlPhase::Going);

        assert!(matches!(
            pose_ctrl.proc(&Pose::new(f64::NAN, 0.0, 0.0)),
            Err(PoseCtrlError::InvalidPose(_))
        ));

        pose_ctrl.abort_goal();
        assert_eq!(pose_ctrl.mode(), PoseCtrlMode::Off);
        assert_eq!(pose_ctrl.proc(&pose).unwrap().0, None);

        assert!(matches!(
            pose_ctrl.begin_goal(ControlLaw::Simultaneous, Pose::new(0.0, f64::INFINITY, 0.0)),
            Err(PoseCtrlError::InvalidGoal(_))
        ));
    }

    #[test]
    fn test_goal_reached_returns_to_off() {
        let mut pose_ctrl = PoseCtrl::init(test_params()).unwrap();
        let pose = Pose::new(0.0, 0.0, 0.0);

        pose_ctrl.begin_goal(ControlLaw::Simultaneous, pose).unwrap();
        let (cmd, report) = pose_ctrl.proc(&pose).unwrap();
        assert_eq!(cmd, Some(VelocityCmd::stop()));
        assert!(report.goal_reached);
        assert_eq!(pose_ctrl.mode(), PoseCtrlMode::GoalReached);

        assert_eq!(pose_ctrl.proc(&pose).unwrap().0, None);
        assert_eq!(pose_ctrl.mode(), PoseCtrlMode::Off);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let mut params = test_params();
        params.max_linear_velocity = -1.0;
        assert!(matches!(PoseCtrl::init(params), Err(PoseCtrlError::InvalidParams(_))));
    }
}
