//! # Simulated robot server
//!
//! Runs a simulated differential drive robot as a separate process, so the `net` backend of
//! `goto_pose_exec` can be used without hardware. The robot subscribes to velocity commands and
//! publishes its odometry, just as a real robot driver would.
//!
//! If no command arrives for `cmd_timeout_s` the robot is stopped.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::time::{Duration, Instant};
use color_eyre::{Report, eyre::WrapErr};
use log::{info, warn};
use serde::Deserialize;

use comms_if::{
    eqpt::{
        cmd_vel::{VelocityCmd, CMD_VEL_TOPIC},
        from_message,
        odom::{OdomSample, ODOM_TOPIC},
        to_message
    },
    net::{zmq, MonitoredSocket, SocketOptions}
};
use pose_lib::{
    robot_if::{PoseSource, VelocitySink},
    sim_robot::{SimRobot, SimRobotParams}
};
use util::{
    logger::{logger_init, LevelFilter},
    session::Session,
    time::{Rate, Ticker}
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Network parameters of the simulated robot, read from `sim_robot.toml` alongside the robot's
/// own parameters.
#[derive(Debug, Deserialize)]
struct SimServerParams {
    /// Endpoint to bind the odometry publisher to, e.g. `"tcp://*:5010"`
    odom_bind_endpoint: String,

    /// Endpoint to bind the velocity command subscriber to, e.g. `"tcp://*:5011"`
    cmd_vel_bind_endpoint: String,

    /// Rate at which odometry is published
    odom_rate_hz: f64,

    /// The robot is stopped if no command arrives for this long
    cmd_timeout_s: f64
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    let session = Session::new("sim_robot", "sessions")
        .wrap_err("Failed to create the session")?;

    logger_init(LevelFilter::Info, &session)
        .wrap_err("Failed to initialise logging")?;

    info!("Simulated Robot\n");

    // ---- LOAD PARAMETERS ----

    let server_params: SimServerParams = util::params::load("sim_robot.toml")
        .wrap_err("Could not load the simulated robot server params")?;
    let robot_params: SimRobotParams = util::params::load("sim_robot.toml")
        .wrap_err("Could not load the simulated robot params")?;

    info!("Robot parameters: {:?}", robot_params);

    // ---- INITIALISE NETWORK ----

    let ctx = zmq::Context::new();

    let odom_socket = MonitoredSocket::new(
        &ctx,
        zmq::PUB,
        SocketOptions {
            bind: true,
            linger: 1,
            send_timeout: 10,
            ..Default::default()
        },
        &server_params.odom_bind_endpoint
    ).wrap_err("Failed to create the odometry socket")?;

    let cmd_vel_socket = MonitoredSocket::new(
        &ctx,
        zmq::SUB,
        SocketOptions {
            bind: true,
            linger: 1,
            recv_timeout: 0,
            ..Default::default()
        },
        &server_params.cmd_vel_bind_endpoint
    ).wrap_err("Failed to create the velocity command socket")?;

    cmd_vel_socket.set_subscribe(CMD_VEL_TOPIC.as_bytes())
        .wrap_err("Failed to subscribe to velocity commands")?;

    info!("Network initialised");

    // ---- MAIN LOOP ----

    let robot = SimRobot::real_time(robot_params);
    let cmd_timeout = Duration::from_secs_f64(server_params.cmd_timeout_s);
    let mut last_cmd_instant: Option<Instant> = None;
    let mut rate = Rate::new(server_params.odom_rate_hz);

    info!("Running");

    loop {
        // Take every command that's arrived, the last one wins
        loop {
            let msg = match cmd_vel_socket.recv_string(0) {
                Ok(Ok(s)) => s,
                Ok(Err(_)) => {
                    warn!("Non UTF-8 velocity command");
                    continue
                },
                Err(zmq::Error::EAGAIN) => break,
                Err(e) => return Err(e).wrap_err("Error receiving velocity commands")
            };

            match from_message::<VelocityCmd>(CMD_VEL_TOPIC, &msg) {
                Ok(cmd) => {
                    robot.publish(&cmd).wrap_err("Could not command the robot")?;
                    last_cmd_instant = Some(Instant::now());
                },
                Err(e) => warn!("Could not parse velocity command: {}", e)
            }
        }

        // Command watchdog
        if let Some(t) = last_cmd_instant {
            if Instant::now() - t > cmd_timeout {
                warn!("No velocity command for {:?}, stopping", cmd_timeout);
                robot.publish(&VelocityCmd::stop()).wrap_err("Could not stop the robot")?;
                last_cmd_instant = None;
            }
        }

        if let Some(pose) = robot.latest() {
            let sample = OdomSample::now(pose.x(), pose.y(), pose.heading_rad);
            match to_message(ODOM_TOPIC, &sample) {
                Ok(msg) => if let Err(e) = odom_socket.send(&msg, 0) {
                    warn!("Could not publish odometry: {}", e);
                },
                Err(e) => warn!("Could not serialise odometry: {}", e)
            }
        }

        rate.wait();
    }
}
