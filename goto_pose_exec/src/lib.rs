//! # Go-to-pose library.
//!
//! This library allows the executables and benchmarks in the workspace to access items defined
//! inside the go-to-pose crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Velocity calibration - finds the smallest demands which move the robot
pub mod calib;

/// Goal manager - executes the command script
pub mod goto_mgr;

/// Localisation module - raw odometry and the world frame anchor
pub mod loc;

/// Network clients - odometry subscriber and velocity command publisher
#[cfg(feature = "net")]
pub mod net_client;

/// Pose control module - the control laws driving the robot to a goal pose
pub mod pose_ctrl;

/// Robot interface - traits implemented by every robot backend
pub mod robot_if;

/// Simulated robot - differential drive kinematics with an actuator dead zone
pub mod sim_robot;
