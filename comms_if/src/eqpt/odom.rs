//! # Odometry messages

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{serde::ts_milliseconds, DateTime, Utc};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Topic on which odometry samples are published.
pub const ODOM_TOPIC: &str = "odom";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A pose estimate from wheel odometry.
///
/// The pose is relative to wherever the odometry was started, not to the world.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct OdomSample {
    /// UTC timestamp at which the sample was taken
    #[serde(with = "ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// X position in meters
    pub x_m: f64,

    /// Y position in meters
    pub y_m: f64,

    /// Heading in radians
    pub theta_rad: f64
}

impl OdomSample {
    /// Create a new sample stamped with the current time.
    pub fn now(x_m: f64, y_m: f64, theta_rad: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            x_m,
            y_m,
            theta_rad
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::eqpt::{cmd_vel::*, from_message, to_message, MessageError};

    #[test]
    fn test_odom_message() {
        let sample = OdomSample::now(1.0, -0.5, 0.25);
        let msg = to_message(ODOM_TOPIC, &sample).unwrap();
        assert!(msg.starts_with("odom {"));

        let back: OdomSample = from_message(ODOM_TOPIC, &msg).unwrap();
        assert_eq!(back.x_m, 1.0);
        assert_eq!(back.y_m, -0.5);
        assert_eq!(back.theta_rad, 0.25);
    }

    #[test]
    fn test_message_topic_mismatch() {
        let msg = to_message(CMD_VEL_TOPIC, &VelocityCmd::stop()).unwrap();

        assert!(matches!(
            from_message::<OdomSample>(ODOM_TOPIC, &msg),
            Err(MessageError::WrongTopic { .. })
        ));
        assert!(matches!(
            from_message::<OdomSample>(ODOM_TOPIC, "odom"),
            Err(MessageError::MissingPayload)
        ));
    }
}
