//! # Robot interface
//!
//! The controller only needs two things from a robot: the latest odometry pose
//! and somewhere to send velocity commands. Both the simulated robot and the
//! network clients implement these traits.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::info;

use comms_if::eqpt::cmd_vel::VelocityCmd;
use util::time::Ticker;
use crate::loc::Pose;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Provides raw odometry poses.
pub trait PoseSource {
    /// The most recent raw pose, or `None` if nothing has been received yet.
    fn latest(&self) -> Option<Pose>;
}

/// Accepts velocity commands for the robot.
pub trait VelocitySink {
    fn publish(&self, cmd: &VelocityCmd) -> Result<(), SinkError>;
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Could not serialise the velocity command: {0}")]
    SerialiseError(comms_if::eqpt::MessageError),

    #[error("Could not send the velocity command: {0}")]
    SendError(comms_if::net::zmq::Error)
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Wait for the source to provide a pose, ticking until one arrives or
/// `timeout_s` has passed.
///
/// Real-time sources fill their pose from a background thread, so nothing may
/// be available straight after they're created.
pub fn wait_for_pose<S, T>(source: &S, ticker: &mut T, timeout_s: f64) -> Option<Pose>
where
    S: PoseSource + ?Sized,
    T: Ticker + ?Sized
{
    let period_s = ticker.period().as_secs_f64();
    let max_ticks = (timeout_s / period_s).ceil().max(1.0) as u64;

    let mut ticks = 0;
    loop {
        if let Some(p) = source.latest() {
            return Some(p)
        }
        if ticks >= max_ticks {
            return None
        }
        if ticks == 0 {
            info!("Waiting for odometry...");
        }
        ticker.wait();
        ticks += 1;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{loc::PoseCell, sim_robot::{SimRobot, SimRobotParams}};
    use util::time::{NoWait, Rate};

    #[test]
    fn test_wait_for_pose() {
        let cell = PoseCell::new();
        assert_eq!(wait_for_pose(&cell, &mut NoWait::new(20.0), 1.0), None);

        cell.set(Pose::new(1.0, 0.0, 0.0));
        assert_eq!(
            wait_for_pose(&cell, &mut NoWait::new(20.0), 0.0),
            Some(Pose::new(1.0, 0.0, 0.0))
        );

        // Real-time robots publish their first pose from a background thread
        let robot = SimRobot::real_time(SimRobotParams::default());
        assert!(wait_for_pose(&robot, &mut Rate::new(100.0), 1.0).is_some());
    }
}
