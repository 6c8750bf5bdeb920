//! Main go-to-pose executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session and logging
//!     - Load the command script and the locomotion parameters it names
//!     - Connect to the robot (simulated or over the network)
//!     - For each telecommand in the script:
//!         - `setpose`: re-anchor the odometry frame
//!         - `goto1`/`goto2`: run the control loop until the goal ends
//!     - Save the goal reports into the session
//!
//! With `--calibrate` the script's telecommands are not run, instead the minimum velocities which
//! move the robot are found and reported.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::Ordering;
use color_eyre::{Report, eyre::{WrapErr, eyre}};
use log::{info, warn};
use structopt::StructOpt;

// Internal
use pose_lib::{
    calib::{CalibError, CalibParams, Calibrator},
    goto_mgr::{GotoMgr, GotoMgrConfig},
    pose_ctrl::LocomotionParams,
    robot_if::{PoseSource, VelocitySink},
    sim_robot::{SimRobot, SimRobotParams}
};
use util::{
    archive::Archiver,
    host,
    logger::{logger_init, LevelFilter},
    script_interpreter::ScriptInterpreter,
    session::Session,
    time::{NoWait, Rate, Ticker}
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Script run when none is given on the command line, relative to the software root.
const DEFAULT_SCRIPT: &str = "data/goToPoseInput.txt";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Drive a differential drive robot through a script of goal poses.
#[derive(Debug, StructOpt)]
#[structopt(name = "goto_pose_exec")]
struct Opt {
    /// The command script to run. Relative paths are resolved from the software root.
    #[structopt(parse(from_os_str))]
    script: Option<PathBuf>,

    /// Control loop rate in Hz
    #[structopt(long, default_value = "20")]
    rate_hz: f64,

    /// Give up on a goal after this many seconds
    #[structopt(long)]
    timeout_s: Option<f64>,

    /// How long `setpose` waits for odometry, in seconds
    #[structopt(long, default_value = "5")]
    first_pose_timeout_s: f64,

    /// Robot to drive: `sim`, `sim-lockstep` or `net`
    #[structopt(long, default_value = "sim")]
    backend: Backend,

    /// Wait for Enter after each telecommand
    #[structopt(long)]
    step: bool,

    /// Find the minimum velocities which move the robot instead of running the script
    #[structopt(long)]
    calibrate: bool
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Copy, Clone)]
enum Backend {
    /// Simulated robot running in real time in a background thread
    Sim,

    /// Simulated robot advancing one cycle per command, without waiting
    SimLockstep,

    /// A robot connected over the network
    Net
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sim" => Ok(Backend::Sim),
            "sim-lockstep" => Ok(Backend::SimLockstep),
            "net" => Ok(Backend::Net),
            b => Err(format!("Unknown backend \"{}\", expected sim, sim-lockstep or net", b))
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {

    color_eyre::install()?;

    let opt = Opt::from_args();

    if !(opt.rate_hz.is_finite() && opt.rate_hz > 0.0) {
        return Err(eyre!("The rate must be positive, found {}", opt.rate_hz));
    }

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new(
        "goto_pose_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Go-To-Pose Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);
    info!("Options: {:?}", opt);

    // ---- LOAD SCRIPT AND PARAMETERS ----

    let script_path = match opt.script {
        Some(ref p) if p.is_absolute() => p.clone(),
        Some(ref p) => host::get_sw_root()
            .wrap_err("Failed to find the software root")?
            .join(p),
        None => host::get_sw_root()
            .wrap_err("Failed to find the software root")?
            .join(DEFAULT_SCRIPT)
    };

    info!("Loading script from {:?}", script_path);

    let mut si = ScriptInterpreter::new(&script_path)
        .wrap_err("Failed to load script")?;

    info!("Loaded script {:?} contains {} TCs", si.script_path(), si.get_num_tcs());

    let loco_params: LocomotionParams = util::params::load_path(si.params_path())
        .wrap_err("Could not load the locomotion parameters")?;

    info!("Locomotion parameters loaded from {:?}", si.params_path());

    // ---- INITIALISE MODULES ----

    let archiver = Archiver::from_path(&session, "goto_mgr/cycles.csv")
        .wrap_err("Failed to create the cycle archive")?;

    let mut goto_mgr = GotoMgr::new(
        loco_params.clone(),
        GotoMgrConfig {
            goal_timeout_s: opt.timeout_s,
            first_pose_timeout_s: opt.first_pose_timeout_s,
            step_mode: opt.step
        },
        archiver
    ).wrap_err("Failed to initialise the GotoMgr")?;

    info!("GotoMgr init complete\n");

    // Ctrl-C ends the current goal (or calibration) with a stop command rather than killing the
    // process mid-goal
    let cancel = goto_mgr.cancel_handle();
    ctrlc::set_handler(move || {
        warn!("Ctrl-C received, cancelling");
        cancel.store(true, Ordering::Relaxed);
    }).wrap_err("Failed to set the Ctrl-C handler")?;

    // ---- RUN ----

    let mut exec = Exec {
        opt: &opt,
        session: &session,
        goto_mgr: &mut goto_mgr,
        si: &mut si,
        loco_params: &loco_params
    };

    match opt.backend {
        Backend::Sim => {
            let robot = SimRobot::real_time(load_sim_params());
            exec.run(&robot, &robot, &mut Rate::new(opt.rate_hz))?;
        },
        Backend::SimLockstep => {
            let robot = SimRobot::lockstep(load_sim_params(), 1.0 / opt.rate_hz);
            exec.run(&robot, &robot, &mut NoWait::new(opt.rate_hz))?;
        },
        #[cfg(feature = "net")]
        Backend::Net => {
            use pose_lib::net_client::{CmdVelClient, OdomClient};

            let net_params: comms_if::net::NetParams = util::params::load("net.toml")
                .wrap_err("Could not load net params")?;

            let zmq_ctx = comms_if::net::zmq::Context::new();

            let odom_client = OdomClient::new(&zmq_ctx, &net_params)
                .wrap_err("Failed to initialise the OdomClient")?;
            info!("OdomClient initialised");

            let cmd_vel_client = CmdVelClient::new(&zmq_ctx, &net_params)
                .wrap_err("Failed to initialise the CmdVelClient")?;
            info!("CmdVelClient initialised");

            if !cmd_vel_client.connected() {
                warn!(
                    "Robot is not yet connected on {}, commands are dropped until it is",
                    net_params.cmd_vel_endpoint
                );
            }

            exec.run(&odom_client, &cmd_vel_client, &mut Rate::new(opt.rate_hz))?;
        },
        #[cfg(not(feature = "net"))]
        Backend::Net => return Err(eyre!("This executable was built without the net feature")),
    }

    // ---- SHUTDOWN ----

    info!("End of execution");

    session.exit();

    Ok(())
}

/// Everything needed to run the script against a robot backend.
struct Exec<'a> {
    opt: &'a Opt,
    session: &'a Session,
    goto_mgr: &'a mut GotoMgr,
    si: &'a mut ScriptInterpreter,
    loco_params: &'a LocomotionParams
}

impl<'a> Exec<'a> {
    fn run<S, V, T>(&mut self, source: &S, sink: &V, ticker: &mut T) -> Result<(), Report>
    where
        S: PoseSource,
        V: VelocitySink,
        T: Ticker
    {
        if self.opt.calibrate {
            let calib_params: CalibParams = match util::params::load("calib.toml") {
                Ok(p) => p,
                Err(e) => {
                    warn!("Using default calibration parameters: {}", e);
                    CalibParams::default()
                }
            };

            let calibrator = Calibrator::new(
                calib_params,
                self.opt.first_pose_timeout_s,
                self.goto_mgr.cancel_handle()
            ).wrap_err("Invalid calibration parameters")?;

            let report = match calibrator.find_minimum_velocities(
                source,
                sink,
                ticker,
                self.loco_params.max_linear_velocity,
                self.loco_params.max_angular_velocity
            ) {
                Ok(r) => r,
                Err(CalibError::Cancelled) => {
                    warn!("Calibration cancelled, no report saved");
                    return Ok(())
                },
                Err(e) => return Err(e).wrap_err("Calibration failed")
            };

            self.session.save("calib_report.json", report);

            return Ok(())
        }

        let summary = self.goto_mgr.run_script(self.si, source, sink, ticker)
            .wrap_err("Error while running the script")?;

        info!(
            "Ran {} TCs, {} goals, stopped with {:?}",
            summary.num_tcs_run,
            summary.reports.len(),
            summary.stop
        );

        self.session.save("goal_reports.json", summary);

        Ok(())
    }
}

/// Load the simulated robot parameters, falling back to an ideal robot.
fn load_sim_params() -> SimRobotParams {
    match util::params::load("sim_robot.toml") {
        Ok(p) => p,
        Err(e) => {
            warn!("Using default simulated robot parameters: {}", e);
            SimRobotParams::default()
        }
    }
}
