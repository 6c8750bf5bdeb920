//! # Network clients
//!
//! Clients used to drive a robot running in another process (a real robot, or the `sim_robot`
//! executable):
//!
//! - `OdomClient` subscribes to the robot's odometry and keeps the latest sample in a
//!   [`PoseCell`].
//! - `CmdVelClient` publishes velocity commands to the robot.
//!
//! Both connect to endpoints bound by the robot, given in `net.toml`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{sync::{Arc, atomic::{AtomicBool, Ordering}}, thread::{self, JoinHandle}};
use log::{error, warn};

use comms_if::{
    eqpt::{
        cmd_vel::{VelocityCmd, CMD_VEL_TOPIC},
        from_message,
        odom::{OdomSample, ODOM_TOPIC},
        to_message
    },
    net::{zmq, MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions}
};
use crate::{
    loc::{Pose, PoseCell},
    robot_if::{PoseSource, SinkError, VelocitySink}
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Subscribes to odometry published by the robot.
pub struct OdomClient {
    bg_jh: Option<JoinHandle<()>>,
    bg_run: Arc<AtomicBool>,
    pose_cell: PoseCell
}

/// Publishes velocity commands to the robot.
pub struct CmdVelClient {
    socket: MonitoredSocket
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum NetClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not subscribe to the {0} topic: {1}")]
    SubscribeError(&'static str, zmq::Error)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl OdomClient {
    /// Connect to the robot's odometry publisher.
    ///
    /// This does not wait for the robot to be running, use [`PoseSource::latest`] to see if any
    /// odometry has arrived.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, NetClientError> {
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            connect_timeout: 1000,
            linger: 1,
            recv_timeout: 10,
            conflate: true,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(
            ctx,
            zmq::SUB,
            socket_options,
            &params.odom_endpoint
        ).map_err(NetClientError::SocketError)?;

        socket.set_subscribe(ODOM_TOPIC.as_bytes())
            .map_err(|e| NetClientError::SubscribeError(ODOM_TOPIC, e))?;

        let bg_run = Arc::new(AtomicBool::new(true));
        let pose_cell = PoseCell::new();

        let bg_run_clone = bg_run.clone();
        let pose_cell_clone = pose_cell.clone();

        let bg_jh = Some(thread::spawn(move || {
            bg_thread(socket, bg_run_clone, pose_cell_clone)
        }));

        Ok(Self {
            bg_jh,
            bg_run,
            pose_cell
        })
    }
}

impl PoseSource for OdomClient {
    fn latest(&self) -> Option<Pose> {
        self.pose_cell.get()
    }
}

impl Drop for OdomClient {
    fn drop(&mut self) {
        self.bg_run.store(false, Ordering::Relaxed);

        if let Some(jh) = self.bg_jh.take() {
            jh.join().ok();
        }
    }
}

impl CmdVelClient {
    /// Connect to the robot's velocity command subscriber.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, NetClientError> {
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            connect_timeout: 1000,
            linger: 100,
            send_timeout: 10,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(
            ctx,
            zmq::PUB,
            socket_options,
            &params.cmd_vel_endpoint
        ).map_err(NetClientError::SocketError)?;

        Ok(Self { socket })
    }

    /// True if the robot is connected.
    pub fn connected(&self) -> bool {
        self.socket.connected()
    }
}

impl VelocitySink for CmdVelClient {
    /// Publish the command. If the robot isn't connected the command is dropped, as with any
    /// publisher without subscribers.
    fn publish(&self, cmd: &VelocityCmd) -> Result<(), SinkError> {
        let msg = to_message(CMD_VEL_TOPIC, cmd)
            .map_err(SinkError::SerialiseError)?;

        self.socket.send(&msg, 0)
            .map_err(SinkError::SendError)
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Background thread, updates the pose cell whenever the robot publishes odometry.
fn bg_thread(socket: MonitoredSocket, run: Arc<AtomicBool>, pose_cell: PoseCell) {
    while run.load(Ordering::Relaxed) {
        let msg = match socket.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => {
                warn!("Non UTF-8 odometry message");
                continue
            },
            Err(zmq::Error::EAGAIN) => continue,
            Err(e) => {
                error!("Error receiving odometry: {}", e);
                break
            }
        };

        match from_message::<OdomSample>(ODOM_TOPIC, &msg) {
            Ok(sample) => pose_cell.set(Pose::from(&sample)),
            Err(e) => warn!("Could not parse odometry message: {}", e)
        }
    }
}
