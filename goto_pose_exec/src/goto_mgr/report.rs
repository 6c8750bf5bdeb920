//! Goal reports and archive records

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

use comms_if::{eqpt::cmd_vel::VelocityCmd, tc::ControlLaw};
use util::script_interpreter::ScriptStop;
use crate::{loc::Pose, pose_ctrl::{CtrlPhase, StatusReport}};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Summary of one goal, saved into the session once the goal ends.
#[derive(Debug, Clone, Serialize)]
pub struct GoalReport {
    /// Number of the goal within this execution, starting at 1
    pub goal_num: usize,

    pub law: ControlLaw,

    /// The goal pose in the world frame
    pub goal: Pose,

    pub outcome: GoalOutcome,

    /// Number of control cycles run
    pub num_ticks: u64,

    /// Number of velocity commands sent, including the final stop
    pub num_cmds: u64,

    /// Nominal duration of the goal (cycles times the cycle period)
    pub duration_s: f64,

    /// Last world frame pose seen, if any pose was received
    pub final_pose: Option<Pose>,

    /// Remaining distance to the goal position
    pub final_range_m: Option<f64>,

    /// Remaining error to the goal heading
    pub final_heading_error_rad: Option<f64>
}

/// Summary of running a whole command script.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptSummary {
    /// Number of telecommands executed
    pub num_tcs_run: usize,

    /// Reports for each goal executed, in order
    pub reports: Vec<GoalReport>,

    /// Why processing ended
    pub stop: RunStop
}

/// One row of the per-cycle archive.
#[derive(Debug, Clone, Serialize)]
pub struct TickRecord {
    /// Seconds since the session started
    pub session_time_s: f64,
    pub goal_num: usize,
    pub tick: u64,
    pub x_m: f64,
    pub y_m: f64,
    pub heading_rad: f64,
    pub phase: CtrlPhase,
    pub range_m: f64,
    pub bearing_error_rad: f64,
    pub heading_error_rad: f64,
    pub alpha_rad: f64,
    pub beta_rad: f64,
    pub linear_ms: f64,
    pub angular_rads: f64
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// How a goal ended.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum GoalOutcome {
    /// Position and heading are within tolerance
    Reached,

    /// The goal's cycle budget ran out
    TimedOut,

    /// The cancel flag was raised
    Cancelled
}

/// Why script processing ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RunStop {
    /// The interpreter ran out of commands, either at the end of the script
    /// or at a malformed line
    Script(#[serde(serialize_with = "serialize_script_stop")] ScriptStop),

    /// The cancel flag was raised
    Cancelled
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TickRecord {
    pub fn new(
        goal_num: usize,
        tick: u64,
        pose: &Pose,
        cmd: &VelocityCmd,
        report: &StatusReport
    ) -> Self {
        Self {
            session_time_s: util::session::get_elapsed_seconds(),
            goal_num,
            tick,
            x_m: pose.x(),
            y_m: pose.y(),
            heading_rad: pose.heading_rad,
            phase: report.phase,
            range_m: report.range_m,
            bearing_error_rad: report.bearing_error_rad,
            heading_error_rad: report.heading_error_rad,
            alpha_rad: report.alpha_rad,
            beta_rad: report.beta_rad,
            linear_ms: cmd.linear_ms,
            angular_rads: cmd.angular_rads
        }
    }
}

fn serialize_script_stop<S>(stop: &ScriptStop, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer
{
    match stop {
        ScriptStop::EndOfScript => serializer.serialize_str("EndOfScript"),
        ScriptStop::Malformed { line_num, reason, .. } => serializer.collect_str(
            &format_args!("Malformed line {}: {}", line_num, reason)
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summary_json() {
        let summary = ScriptSummary {
            num_tcs_run: 1,
            reports: vec![GoalReport {
                goal_num: 1,
                law: ControlLaw::Simultaneous,
                goal: Pose::new(1.0, 2.0, 0.5),
                outcome: GoalOutcome::TimedOut,
                num_ticks: 40,
                num_cmds: 41,
                duration_s: 2.0,
                final_pose: None,
                final_range_m: None,
                final_heading_error_rad: None
            }],
            stop: RunStop::Script(ScriptStop::Malformed {
                line_num: 3,
                line: String::from("goto1 1 1"),
                reason: String::from("Expected 4 fields")
            })
        };

        let value = serde_json::to_value(&summary).unwrap();

        assert_eq!(value["stop"], json!({"Script": "Malformed line 3: Expected 4 fields"}));
        assert_eq!(value["reports"][0]["outcome"], json!("TimedOut"));
        assert_eq!(value["reports"][0]["law"], json!("Simultaneous"));
        assert_eq!(value["reports"][0]["goal"]["heading_rad"], json!(0.5));
        assert!(value["reports"][0]["final_pose"].is_null());

        let cancelled = serde_json::to_value(&RunStop::Cancelled).unwrap();
        assert_eq!(cancelled, json!("Cancelled"));
    }
}
