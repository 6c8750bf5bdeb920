//! Locomotion parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for pose control, loaded from the file named at the top of the
/// command script.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LocomotionParams {

    /// Distance from the goal under which the position is considered reached
    pub position_tolerance: f64,

    /// Heading error under which an orientation (in place rotation) is
    /// considered complete
    pub angle_tolerance_orienting: f64,

    /// Heading error under which no correction is applied while driving
    pub angle_tolerance_going: f64,

    /// Sequential law linear velocity gain, applied to the distance to goal
    pub position_gain_dq: f64,

    /// Sequential law angular velocity gain, applied to the heading error
    pub angle_gain_dq: f64,

    /// Simultaneous law linear velocity gain (k_rho)
    pub position_gain_mimo: f64,

    /// Simultaneous law gain on the bearing error alpha (k_alpha)
    pub angle_gain_mimo: f64,

    /// Simultaneous law gain on the final heading error beta (k_beta).
    ///
    /// Must be negative. If not given it is `-0.5 * position_gain_mimo`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beta_gain_mimo: Option<f64>,

    /// Smallest non-zero linear velocity demand, in m/s
    pub min_linear_velocity: f64,

    /// Largest linear velocity demand, in m/s
    pub max_linear_velocity: f64,

    /// Smallest non-zero angular velocity demand, in rad/s
    pub min_angular_velocity: f64,

    /// Largest angular velocity demand, in rad/s
    pub max_angular_velocity: f64
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
pub enum ParamsError {
    #[error("{0} must be positive and finite, found {1}")]
    NotPositive(&'static str, f64),

    #[error("beta_gain_mimo must be negative and finite, found {0}")]
    BetaGainNotNegative(f64),

    #[error("{0} must be finite and not negative, found {1}")]
    Negative(&'static str, f64),

    #[error("Minimum {0} velocity ({1}) is greater than the maximum ({2})")]
    BadLimits(&'static str, f64, f64)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LocomotionParams {

    /// The gain on beta used by the simultaneous law.
    pub fn beta_gain_mimo(&self) -> f64 {
        self.beta_gain_mimo
            .unwrap_or(-0.5 * self.position_gain_mimo)
    }

    /// Check the parameters describe a usable controller.
    pub fn validate(&self) -> Result<(), ParamsError> {
        let positives = [
            ("position_tolerance", self.position_tolerance),
            ("angle_tolerance_orienting", self.angle_tolerance_orienting),
            ("angle_tolerance_going", self.angle_tolerance_going),
            ("position_gain_dq", self.position_gain_dq),
            ("angle_gain_dq", self.angle_gain_dq),
            ("position_gain_mimo", self.position_gain_mimo),
            ("angle_gain_mimo", self.angle_gain_mimo),
            ("max_linear_velocity", self.max_linear_velocity),
            ("max_angular_velocity", self.max_angular_velocity)
        ];
        for (name, val) in positives.iter() {
            if !(val.is_finite() && *val > 0.0) {
                return Err(ParamsError::NotPositive(*name, *val))
            }
        }

        let beta = self.beta_gain_mimo();
        if !(beta.is_finite() && beta < 0.0) {
            return Err(ParamsError::BetaGainNotNegative(beta))
        }

        let mins = [
            ("min_linear_velocity", self.min_linear_velocity),
            ("min_angular_velocity", self.min_angular_velocity)
        ];
        for (name, val) in mins.iter() {
            if !(val.is_finite() && *val >= 0.0) {
                return Err(ParamsError::Negative(*name, *val))
            }
        }

        if self.min_linear_velocity > self.max_linear_velocity {
            return Err(ParamsError::BadLimits(
                "linear", self.min_linear_velocity, self.max_linear_velocity
            ))
        }
        if self.min_angular_velocity > self.max_angular_velocity {
            return Err(ParamsError::BadLimits(
                "angular", self.min_angular_velocity, self.max_angular_velocity
            ))
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use util::params;

    pub(crate) const TEST_PARAMS: &str = r#"
        position_tolerance = 0.02
        angle_tolerance_orienting = 0.02
        angle_tolerance_going = 0.05
        position_gain_dq = 0.5
        angle_gain_dq = 2.0
        position_gain_mimo = 0.5
        angle_gain_mimo = 1.5
        min_linear_velocity = 0.02
        max_linear_velocity = 0.3
        min_angular_velocity = 0.1
        max_angular_velocity = 1.0
    "#;

    /// Parameters shared by the controller tests.
    pub(crate) fn test_params() -> LocomotionParams {
        params::from_str(TEST_PARAMS).unwrap()
    }

    #[test]
    fn test_load_and_validate() {
        let p = test_params();
        assert_eq!(p.position_tolerance, 0.02);
        assert_eq!(p.beta_gain_mimo, None);
        assert_eq!(p.beta_gain_mimo(), -0.25);
        assert_eq!(p.validate(), Ok(()));
    }

    #[test]
    fn test_missing_field_is_an_error() {
        let s = TEST_PARAMS.replace("angle_gain_dq = 2.0", "");
        assert!(params::from_str::<LocomotionParams>(&s).is_err());
    }

    #[test]
    fn test_round_trip() {
        let mut p = test_params();
        let echoed = params::echo(&p).unwrap();
        assert_eq!(params::from_str::<LocomotionParams>(&echoed).unwrap(), p);

        p.beta_gain_mimo = Some(-0.4);
        let echoed = params::echo(&p).unwrap();
        assert_eq!(params::from_str::<LocomotionParams>(&echoed).unwrap(), p);
    }

    #[test]
    fn test_validation_errors() {
        let mut p = test_params();
        p.position_tolerance = 0.0;
        assert!(matches!(p.validate(), Err(ParamsError::NotPositive("position_tolerance", _))));

        let mut p = test_params();
        p.beta_gain_mimo = Some(0.1);
        assert_eq!(p.validate(), Err(ParamsError::BetaGainNotNegative(0.1)));

        let mut p = test_params();
        p.min_angular_velocity = 2.0;
        assert_eq!(p.validate(), Err(ParamsError::BadLimits("angular", 2.0, 1.0)));

        let mut p = test_params();
        p.min_linear_velocity = f64::NAN;
        assert!(matches!(p.validate(), Err(ParamsError::Negative("min_linear_velocity", _))));
    }

    #[test]
    fn test_shipped_parameter_file() {
        let data_dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../data");

        let p: LocomotionParams = params::load_path(data_dir.join("locomotionParameters.toml"))
            .unwrap();
        assert_eq!(p.validate(), Ok(()));
        assert_eq!(p, test_params());

        // The default script names the same file
        let si = util::script_interpreter::ScriptInterpreter::new(
            data_dir.join("goToPoseInput.txt")
        ).unwrap();
        let from_script: LocomotionParams = params::load_path(si.params_path()).unwrap();
        assert_eq!(from_script, p);
    }
}
