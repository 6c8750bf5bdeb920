//! # Telecommand module
//!
//! Telecommands are the instructions read from the go-to-pose command stream.
//! Each one is a verb followed by a pose:
//!
//! - `setpose x y theta`: the robot is currently at this pose, re-anchor odometry to it.
//! - `goto1 x y theta`: drive to the pose with the sequential (divide-and-conquer) law.
//! - `goto2 x y theta`: drive to the pose with the simultaneous (MIMO) law.
//!
//! Positions are in meters, headings in radians.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Serialize, Deserialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A planar pose as given in a telecommand.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseSpec {
    /// X position in meters
    pub x: f64,

    /// Y position in meters
    pub y: f64,

    /// Heading in radians, anticlockwise from the X axis
    pub theta: f64
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The control law used to drive to a goal pose.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlLaw {
    /// Divide and conquer: orient, drive, then reorient.
    Sequential,

    /// MIMO: drive position and orientation together.
    Simultaneous
}

/// A telecommand.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum Tc {
    /// Set the current absolute pose of the robot.
    SetPose(PoseSpec),

    /// Drive to the goal pose using the given law.
    Goto {
        law: ControlLaw,
        goal: PoseSpec
    }
}

/// Possible parsing errors.
#[derive(Debug, Error, PartialEq)]
pub enum TcParseError {
    #[error("Expected a verb followed by 3 numbers, found {0} fields")]
    WrongNumberOfFields(usize),

    #[error("Field \"{0}\" is not a valid number")]
    InvalidNumber(String),

    #[error("\"{0}\" is not a recognised command")]
    UnknownVerb(String)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Tc {

    /// Parse a TC from its verb and the three pose fields.
    ///
    /// The numbers are checked before the verb, so a line with bad numbers is
    /// always reported as invalid rather than unknown.
    pub fn parse(verb: &str, args: &[&str]) -> Result<Self, TcParseError> {
        if args.len() != 3 {
            return Err(TcParseError::WrongNumberOfFields(args.len() + 1))
        }

        let mut vals = [0f64; 3];
        for (v, a) in vals.iter_mut().zip(args.iter()) {
            *v = a.parse()
                .map_err(|_| TcParseError::InvalidNumber(a.to_string()))?;

            if !v.is_finite() {
                return Err(TcParseError::InvalidNumber(a.to_string()))
            }
        }

        let pose = PoseSpec {
            x: vals[0],
            y: vals[1],
            theta: vals[2]
        };

        match verb {
            "setpose" => Ok(Tc::SetPose(pose)),
            "goto1" => Ok(Tc::Goto {
                law: ControlLaw::Sequential,
                goal: pose
            }),
            "goto2" => Ok(Tc::Goto {
                law: ControlLaw::Simultaneous,
                goal: pose
            }),
            v => Err(TcParseError::UnknownVerb(v.to_string()))
        }
    }
}

impl ControlLaw {
    /// The verb used for this law in the command stream.
    pub fn verb(&self) -> &'static str {
        match self {
            ControlLaw::Sequential => "goto1",
            ControlLaw::Simultaneous => "goto2"
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_verbs() {
        assert_eq!(
            Tc::parse("setpose", &["1", "-2.5", "0.3"]),
            Ok(Tc::SetPose(PoseSpec { x: 1.0, y: -2.5, theta: 0.3 }))
        );
        assert_eq!(
            Tc::parse("goto1", &["0", "1.2", "0"]),
            Ok(Tc::Goto {
                law: ControlLaw::Sequential,
                goal: PoseSpec { x: 0.0, y: 1.2, theta: 0.0 }
            })
        );
        assert_eq!(
            Tc::parse("goto2", &["0", "0", "3.14"]).map(|t| match t {
                Tc::Goto { law, .. } => law.verb(),
                _ => "",
            }),
            Ok("goto2")
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            Tc::parse("goto1", &["0", "x", "0"]),
            Err(TcParseError::InvalidNumber(String::from("x")))
        );
        assert_eq!(
            Tc::parse("goto1", &["0", "nan", "0"]),
            Err(TcParseError::InvalidNumber(String::from("nan")))
        );
        assert_eq!(
            Tc::parse("goto1", &["0", "0"]),
            Err(TcParseError::WrongNumberOfFields(3))
        );
        assert_eq!(
            Tc::parse("Goto1", &["0", "0", "0"]),
            Err(TcParseError::UnknownVerb(String::from("Goto1")))
        );
    }
}
